//! multipart 上传处理器。

use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::{Extension, Multipart};
use axum::response::Json as JsonResponse;
use futures_util::stream::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::atomic::TempUpload;
use crate::config::FALLBACK_NAME;
use crate::error::ApiError;
use crate::storage::MediaStore;

/// 表单中承载文件内容的字段名。
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug)]
pub struct UploadConfig {
    /// 单个文件的最大字节数，0 表示不限制。
    pub max_size: u64,
    pub temp_ttl: std::time::Duration,
}

#[derive(Serialize)]
pub(crate) struct UploadResponse {
    name: String,
}

/// 接收 `file` 字段并写入存储目录，返回最终保存的文件名。
pub async fn upload_video(
    Extension(storage): Extension<Arc<MediaStore>>,
    Extension(upload): Extension<Arc<UploadConfig>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<JsonResponse<UploadResponse>, ApiError> {
    let mut multipart =
        multipart.map_err(|err| ApiError::BadRequest(format!("invalid multipart body: {err}")))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(err.to_string()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            debug!(field = field.name().unwrap_or_default(), "skip multipart field");
            continue;
        }
        let raw_name = field
            .file_name()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(FALLBACK_NAME)
            .to_string();
        let (name, size) = receive_field(&storage, &upload, field, &raw_name).await?;
        info!(name, original = raw_name, size, "upload complete");
        return Ok(JsonResponse(UploadResponse { name }));
    }

    Err(ApiError::BadRequest("no file selected".into()))
}

async fn receive_field(
    storage: &MediaStore,
    upload: &UploadConfig,
    mut field: Field<'_>,
    raw_name: &str,
) -> Result<(String, u64), ApiError> {
    let mut temp = TempUpload::create(storage).await?;
    let write_result: Result<(), ApiError> = async {
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|err| ApiError::BadRequest(err.to_string()))?;
            if chunk.is_empty() {
                continue;
            }
            let total = temp.record_written(chunk.len() as u64);
            if upload.max_size > 0 && total > upload.max_size {
                return Err(ApiError::PayloadTooLarge(upload.max_size));
            }
            temp.file_mut()
                .write_all(&chunk)
                .await
                .map_err(|err| ApiError::Internal(err.to_string()))?;
        }
        Ok(())
    }
    .await;
    if let Err(err) = write_result {
        warn!(name = raw_name, "upload aborted");
        temp.cleanup().await;
        return Err(err);
    }

    let media = temp.finalize(storage, raw_name).await?;
    Ok((media.name, media.size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body as AxumBody;
    use axum::extract::FromRequest;
    use axum::http::{Request, header};
    use std::time::Duration;
    use tempfile::tempdir;

    const BOUNDARY: &str = "XBOUNDARYX";

    fn make_storage() -> (tempfile::TempDir, Arc<MediaStore>) {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("videos");
        std::fs::create_dir_all(&root).expect("create store root");
        (temp, Arc::new(MediaStore::new(root)))
    }

    fn make_upload_config(max_size: u64) -> Arc<UploadConfig> {
        Arc::new(UploadConfig {
            max_size,
            temp_ttl: Duration::from_secs(60),
        })
    }

    fn multipart_body(field: &str, filename: &str, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn make_multipart(body: Vec<u8>) -> Result<Multipart, MultipartRejection> {
        let request = Request::builder()
            .method("POST")
            .uri("/api/videos")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(AxumBody::from(body))
            .expect("request");
        Multipart::from_request(request, &()).await
    }

    #[tokio::test]
    async fn upload_sanitizes_and_disambiguates() {
        let (_temp, storage) = make_storage();
        let upload = make_upload_config(0);

        for expected in ["evil.mp4", "evil-1.mp4"] {
            let multipart = make_multipart(multipart_body("file", "../../evil.mp4", b"data")).await;
            let JsonResponse(response) = upload_video(
                Extension(storage.clone()),
                Extension(upload.clone()),
                multipart,
            )
            .await
            .expect("upload failed");
            assert_eq!(response.name, expected);
        }

        let files = storage.list().await.unwrap();
        assert_eq!(files.len(), 2);
        assert!(storage.root_path().join("evil.mp4").is_file());
    }

    #[tokio::test]
    async fn upload_without_file_field_is_bad_request() {
        let (_temp, storage) = make_storage();
        let upload = make_upload_config(0);
        let multipart = make_multipart(multipart_body("other", "a.mp4", b"data")).await;
        let result = upload_video(Extension(storage.clone()), Extension(upload), multipart).await;

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
        assert!(storage.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_over_limit_is_rejected_and_cleaned() {
        let (_temp, storage) = make_storage();
        let upload = make_upload_config(4);
        let multipart = make_multipart(multipart_body("file", "big.mp4", b"too large")).await;
        let result = upload_video(Extension(storage.clone()), Extension(upload), multipart).await;

        assert!(matches!(result, Err(ApiError::PayloadTooLarge(4))));
        let leftovers = std::fs::read_dir(storage.upload_temp_dir()).unwrap().count();
        assert_eq!(leftovers, 0);
        assert!(storage.list().await.unwrap().is_empty());
    }
}
