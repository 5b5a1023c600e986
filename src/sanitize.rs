//! 文件名清洗与重名处理。

use std::io;
use std::path::Path;
use tokio::fs;

use crate::config::FALLBACK_NAME;

/// 将客户端提供的文件名映射为安全的单层文件名。
///
/// 去掉所有目录部分（`/` 与 `\` 均视为分隔符），并把 `[A-Za-z0-9._- ]`
/// 以外的字符逐个替换为 `_`。结果不会为空，也不会是 `.` 或 `..`。
pub fn sanitize_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-' | ' ') {
                ch
            } else {
                '_'
            }
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => FALLBACK_NAME.to_string(),
        _ => cleaned,
    }
}

/// 若目录中已存在同名文件，则在扩展名前追加 `-1`、`-2`… 直到找到空闲名称。
///
/// 检查与随后的写入之间不是原子的：并发上传同名文件时仍可能相互覆盖。
pub async fn unique_name(dir: &Path, candidate: &str) -> io::Result<String> {
    if !fs::try_exists(dir.join(candidate)).await? {
        return Ok(candidate.to_string());
    }

    let path = Path::new(candidate);
    let stem = path
        .file_stem()
        .map(|value| value.to_string_lossy().into_owned())
        .unwrap_or_else(|| candidate.to_string());
    let extension = path
        .extension()
        .map(|value| format!(".{}", value.to_string_lossy()))
        .unwrap_or_default();

    let mut counter: u64 = 1;
    loop {
        let name = format!("{stem}-{counter}{extension}");
        if !fs::try_exists(dir.join(&name)).await? {
            return Ok(name);
        }
        counter += 1;
    }
}
