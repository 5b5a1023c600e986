//! 上传临时文件：写完后再改名进入存储目录。

use std::path::PathBuf;
use tokio::fs::{self, File};

use crate::storage::{MediaFile, MediaStore, StorageError};

/// 存储目录内的隐藏临时文件，未提交前不会出现在列表中。
pub struct TempUpload {
    temp_path: PathBuf,
    file: File,
    written: u64,
}

impl TempUpload {
    /// 在存储目录中创建新的临时文件。
    pub async fn create(store: &MediaStore) -> Result<Self, StorageError> {
        let temp_path = store.upload_temp_path().await?;
        let file = File::create(&temp_path).await?;
        Ok(Self {
            temp_path,
            file,
            written: 0,
        })
    }

    /// 返回临时文件的可写句柄。
    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    pub fn record_written(&mut self, bytes: u64) -> u64 {
        self.written += bytes;
        self.written
    }

    /// 放弃并清理临时文件。
    pub async fn cleanup(self) {
        drop(self.file);
        let _ = fs::remove_file(&self.temp_path).await;
    }

    /// 同步落盘并以不冲突的名称移入存储目录。
    pub async fn finalize(
        self,
        store: &MediaStore,
        raw_name: &str,
    ) -> Result<MediaFile, StorageError> {
        if let Err(err) = self.file.sync_all().await {
            let _ = fs::remove_file(&self.temp_path).await;
            return Err(err.into());
        }
        drop(self.file);

        match store.commit_upload(&self.temp_path, raw_name).await {
            Ok(media) => Ok(media),
            Err(err) => {
                let _ = fs::remove_file(&self.temp_path).await;
                Err(err)
            }
        }
    }
}
