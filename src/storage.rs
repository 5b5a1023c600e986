use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs::{self, File};
use tokio::io::ErrorKind;
use uuid::Uuid;

use crate::sanitize::{sanitize_name, unique_name};
use crate::stream::content_type_for;

/// In-flight uploads live here; `list` skips directories and sanitized
/// names cannot reach inside.
const UPLOAD_TEMP_DIR: &str = ".uploads";
const UPLOAD_TEMP_SUFFIX: &str = ".part";

/// Flat media directory; the directory itself is the index.
#[derive(Clone, Debug)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub async fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// Joins a re-sanitized name onto the root; never escapes the store.
    fn resolve(&self, name: &str) -> (String, PathBuf) {
        let name = sanitize_name(name);
        let path = self.root.join(&name);
        (name, path)
    }

    pub async fn list(&self) -> Result<Vec<MediaFile>, StorageError> {
        let mut dir = fs::read_dir(&self.root).await?;
        let mut files = Vec::new();

        while let Some(entry) = dir.next_entry().await? {
            // Names that do not survive sanitization could never be
            // streamed or deleted through the API.
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if sanitize_name(&name) != name {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                // Removed between read_dir and stat.
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            if !metadata.is_file() {
                continue;
            }
            files.push(MediaFile::from_metadata(name, &metadata));
        }

        files.sort_by(|a, b| b.mtime.cmp(&a.mtime).then_with(|| a.name.cmp(&b.name)));
        Ok(files)
    }

    pub async fn stat(&self, name: &str) -> Result<MediaFile, StorageError> {
        let (name, path) = self.resolve(name);
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(StorageError::NotFound),
            Err(err) => return Err(err.into()),
        };
        if !metadata.is_file() {
            return Err(StorageError::NotFound);
        }
        Ok(MediaFile::from_metadata(name, &metadata))
    }

    /// Opens the file first and stats through the handle, so a file that
    /// vanishes after the lookup is reported as missing rather than racing.
    pub async fn open(&self, name: &str) -> Result<(File, MediaFile), StorageError> {
        let (name, path) = self.resolve(name);
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(StorageError::NotFound),
            Err(err) => return Err(err.into()),
        };
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(StorageError::NotFound);
        }
        Ok((file, MediaFile::from_metadata(name, &metadata)))
    }

    /// Deletes a stored file. Existence check and removal are separate steps.
    pub async fn delete(&self, name: &str) -> Result<String, StorageError> {
        let media = self.stat(name).await?;
        match fs::remove_file(self.root.join(&media.name)).await {
            Ok(()) => Ok(media.name),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(err) => Err(err.into()),
        }
    }

    pub fn upload_temp_dir(&self) -> PathBuf {
        self.root.join(UPLOAD_TEMP_DIR)
    }

    /// Returns a fresh temp path for an incoming upload, creating the temp
    /// directory on first use.
    pub async fn upload_temp_path(&self) -> io::Result<PathBuf> {
        let dir = self.upload_temp_dir();
        fs::create_dir_all(&dir).await?;
        Ok(dir.join(format!("{}{UPLOAD_TEMP_SUFFIX}", Uuid::new_v4())))
    }

    /// Picks a collision-free final name for `raw_name` and moves the
    /// finished temp file into place.
    pub async fn commit_upload(
        &self,
        temp_path: &Path,
        raw_name: &str,
    ) -> Result<MediaFile, StorageError> {
        let candidate = sanitize_name(raw_name);
        let name = unique_name(&self.root, &candidate).await?;
        let target = self.root.join(&name);
        fs::rename(temp_path, &target).await?;
        let metadata = fs::metadata(&target).await?;
        Ok(MediaFile::from_metadata(name, &metadata))
    }

    /// Removes upload temp files older than `ttl`, returning how many were deleted.
    pub async fn sweep_upload_temp(&self, ttl: Duration) -> io::Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;
        let mut dir = match fs::read_dir(self.upload_temp_dir()).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err),
        };
        while let Some(entry) = dir.next_entry().await? {
            let Ok(modified) = entry.metadata().await.and_then(|meta| meta.modified()) else {
                continue;
            };
            let Ok(age) = now.duration_since(modified) else {
                continue;
            };
            if age >= ttl {
                fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[derive(Debug)]
pub enum StorageError {
    NotFound,
    Io(io::Error),
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::Io(err)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct MediaFile {
    pub name: String,
    pub size: u64,
    /// Milliseconds since the Unix epoch.
    pub mtime: i64,
    #[serde(rename = "type")]
    pub content_type: String,
}

impl MediaFile {
    fn from_metadata(name: String, metadata: &Metadata) -> Self {
        let mtime = metadata
            .modified()
            .map(|ts| DateTime::<Utc>::from(ts).timestamp_millis())
            .unwrap_or_default();
        let content_type = content_type_for(&name);
        Self {
            name,
            size: metadata.len(),
            mtime,
            content_type,
        }
    }
}
