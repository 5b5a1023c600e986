//! 媒体流式输出：完整响应（200）与部分响应（206）。

use axum::body::Body as AxumBody;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::io::SeekFrom;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::config::STREAM_CHUNK_SIZE;
use crate::error::ApiError;
use crate::range::ByteRange;
use crate::storage::MediaFile;

/// 响应体的呈现方式。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

/// 按扩展名推断 MIME 类型，未知扩展名回退为 `application/octet-stream`。
pub fn content_type_for(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn header_value(value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value).map_err(|_| ApiError::Internal("响应头构建失败".into()))
}

/// 输出文件内容；`range` 为空时返回完整文件。
///
/// 读取以固定大小分块进行，客户端断开时响应体被丢弃，文件句柄随之释放。
pub async fn serve_media(
    mut file: File,
    media: &MediaFile,
    range: Option<ByteRange>,
    disposition: Disposition,
) -> Result<Response, ApiError> {
    let total = media.size;
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, header_value(&media.content_type)?);
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if disposition == Disposition::Attachment {
        headers.insert(
            header::CONTENT_DISPOSITION,
            header_value(&format!("attachment; filename=\"{}\"", media.name))?,
        );
    }

    let Some(range) = range else {
        headers.insert(header::CONTENT_LENGTH, header_value(&total.to_string())?);
        let stream = ReaderStream::with_capacity(file.take(total), STREAM_CHUNK_SIZE);
        return Ok((StatusCode::OK, headers, AxumBody::from_stream(stream)).into_response());
    };

    let length = range.length();
    debug!(name = media.name, start = range.start, end = range.end, length, "range accepted");
    file.seek(SeekFrom::Start(range.start))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    headers.insert(header::CONTENT_RANGE, header_value(&range.content_range(total))?);
    headers.insert(header::CONTENT_LENGTH, header_value(&length.to_string())?);
    let stream = ReaderStream::with_capacity(file.take(length), STREAM_CHUNK_SIZE);
    Ok((
        StatusCode::PARTIAL_CONTENT,
        headers,
        AxumBody::from_stream(stream),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use tempfile::tempdir;

    use crate::storage::MediaStore;

    fn sample_bytes(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    async fn open_sample(len: usize) -> (tempfile::TempDir, MediaStore, Vec<u8>) {
        let temp = tempdir().expect("tempdir");
        let store = MediaStore::new(temp.path().to_path_buf());
        let data = sample_bytes(len);
        std::fs::write(temp.path().join("clip.mp4"), &data).expect("write sample");
        (temp, store, data)
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes()
            .to_vec()
    }

    #[tokio::test]
    async fn full_response_without_range() {
        let (_temp, store, data) = open_sample(1000).await;
        let (file, media) = store.open("clip.mp4").await.unwrap();
        let response = serve_media(file, &media, None, Disposition::Inline)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_LENGTH], "1000");
        assert_eq!(headers[header::CONTENT_TYPE], "video/mp4");
        assert!(headers.get(header::CONTENT_RANGE).is_none());
        assert!(headers.get(header::CONTENT_DISPOSITION).is_none());
        assert_eq!(body_bytes(response).await, data);
    }

    #[tokio::test]
    async fn partial_response_matches_source_slice() {
        let (_temp, store, data) = open_sample(1000).await;
        for (start, end) in [(0, 0), (500, 699), (0, 999), (999, 999), (123, 456)] {
            let (file, media) = store.open("clip.mp4").await.unwrap();
            let range = ByteRange { start, end };
            let response = serve_media(file, &media, Some(range), Disposition::Inline)
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
            let headers = response.headers();
            assert_eq!(
                headers[header::CONTENT_RANGE],
                format!("bytes {start}-{end}/1000").as_str()
            );
            assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
            let expected_len = (end - start + 1) as usize;
            assert_eq!(
                headers[header::CONTENT_LENGTH],
                expected_len.to_string().as_str()
            );
            let body = body_bytes(response).await;
            assert_eq!(body.len(), expected_len);
            assert_eq!(body, &data[start as usize..=end as usize]);
        }
    }

    #[tokio::test]
    async fn large_file_streams_in_chunks() {
        let len = STREAM_CHUNK_SIZE * 3 + 17;
        let (_temp, store, data) = open_sample(len).await;
        let (file, media) = store.open("clip.mp4").await.unwrap();
        let response = serve_media(file, &media, None, Disposition::Inline)
            .await
            .unwrap();

        let mut body = response.into_body();
        let mut received = Vec::new();
        let mut frames = 0;
        while let Some(frame) = body.frame().await {
            let chunk = frame.expect("frame").into_data().expect("data frame");
            assert!(chunk.len() <= STREAM_CHUNK_SIZE);
            received.extend_from_slice(&chunk);
            frames += 1;
        }
        assert!(frames >= 4);
        assert_eq!(received, data);
    }

    #[tokio::test]
    async fn attachment_sets_content_disposition() {
        let (_temp, store, _data) = open_sample(10).await;
        let (file, media) = store.open("clip.mp4").await.unwrap();
        let response = serve_media(file, &media, None, Disposition::Attachment)
            .await
            .unwrap();
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"clip.mp4\""
        );
    }

    #[test]
    fn content_type_falls_back_to_octet_stream() {
        assert_eq!(content_type_for("clip.mp4"), "video/mp4");
        assert_eq!(content_type_for("song.mp3"), "audio/mpeg");
        assert_eq!(content_type_for("blob.zzzunknown"), "application/octet-stream");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }

    #[cfg(target_os = "linux")]
    fn open_handles_to(path: &std::path::Path) -> usize {
        let target = std::fs::canonicalize(path).expect("canonicalize");
        std::fs::read_dir("/proc/self/fd")
            .expect("read /proc/self/fd")
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| std::fs::read_link(entry.path()).ok())
            .filter(|link| *link == target)
            .count()
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn dropping_body_mid_stream_releases_file() {
        let len = STREAM_CHUNK_SIZE * 4;
        let (temp, store, _data) = open_sample(len).await;
        let path = temp.path().join("clip.mp4");
        assert_eq!(open_handles_to(&path), 0);

        let (file, media) = store.open("clip.mp4").await.unwrap();
        let range = ByteRange {
            start: 10,
            end: (len - 1) as u64,
        };
        let response = serve_media(file, &media, Some(range), Disposition::Inline)
            .await
            .unwrap();
        let mut body = response.into_body();
        let frame = body.frame().await.expect("first frame").expect("frame");
        assert!(frame.into_data().expect("data frame").len() <= STREAM_CHUNK_SIZE);
        assert_eq!(open_handles_to(&path), 1);

        drop(body);
        // tokio closes the std handle once no blocking read holds it.
        for _ in 0..50 {
            if open_handles_to(&path) == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(open_handles_to(&path), 0);
    }
}
