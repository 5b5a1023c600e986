//! 清理中断上传遗留临时文件的后台任务。

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::UPLOAD_CLEAN_INTERVAL_SECS;
use crate::storage::MediaStore;
use crate::upload::UploadConfig;

/// 启动后台任务；`temp_ttl` 为 0 时不启动。
pub fn spawn_background_tasks(storage: Arc<MediaStore>, upload: Arc<UploadConfig>) {
    if upload.temp_ttl.is_zero() {
        return;
    }

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(UPLOAD_CLEAN_INTERVAL_SECS));
        loop {
            interval.tick().await;
            match storage.sweep_upload_temp(upload.temp_ttl).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "removed stale upload temp files"),
                Err(err) => warn!(error = %err, "upload temp cleanup failed"),
            }
        }
    });
}
