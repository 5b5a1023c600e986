//! 媒体列表、播放、下载与删除处理器。

use axum::extract::{Extension, Path};
use axum::http::{HeaderMap, header};
use axum::response::{Json as JsonResponse, Response};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::range::resolve_range;
use crate::storage::{MediaFile, MediaStore};
use crate::stream::{Disposition, serve_media};

#[derive(Serialize)]
pub(crate) struct ListResponse {
    files: Vec<MediaFile>,
}

#[derive(Serialize)]
pub(crate) struct NameResponse {
    name: String,
}

/// 列出全部媒体文件，按修改时间倒序。
pub async fn list_videos(
    Extension(storage): Extension<Arc<MediaStore>>,
) -> Result<JsonResponse<ListResponse>, ApiError> {
    let files = storage.list().await?;
    info!(count = files.len(), "list videos");
    Ok(JsonResponse(ListResponse { files }))
}

/// 在线播放，支持单区间 Range 请求。
pub async fn stream_video(
    Path(name): Path<String>,
    request_headers: HeaderMap,
    Extension(storage): Extension<Arc<MediaStore>>,
) -> Result<Response, ApiError> {
    send_file(&name, &request_headers, &storage, Disposition::Inline).await
}

/// 以附件形式下载。
pub async fn download_video(
    Path(name): Path<String>,
    request_headers: HeaderMap,
    Extension(storage): Extension<Arc<MediaStore>>,
) -> Result<Response, ApiError> {
    send_file(&name, &request_headers, &storage, Disposition::Attachment).await
}

async fn send_file(
    name: &str,
    request_headers: &HeaderMap,
    storage: &MediaStore,
    disposition: Disposition,
) -> Result<Response, ApiError> {
    let (file, media) = storage.open(name).await?;
    let range = resolve_range(request_headers.get(header::RANGE), media.size)?;
    debug!(
        name = media.name,
        size = media.size,
        ranged = range.is_some(),
        ?disposition,
        "send file"
    );
    serve_media(file, &media, range, disposition).await
}

/// 删除媒体文件。
pub async fn delete_video(
    Path(name): Path<String>,
    Extension(storage): Extension<Arc<MediaStore>>,
) -> Result<JsonResponse<NameResponse>, ApiError> {
    let name = storage.delete(&name).await?;
    info!(name, "delete video");
    Ok(JsonResponse(NameResponse { name }))
}
