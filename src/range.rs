//! Range 请求头解析：单一区间，严格校验。

use axum::http::HeaderValue;

/// 已解析的闭区间 `[start, end]`，满足 `start <= end < total`。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// 生成 `Content-Range` 响应头的值。
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RangeError {
    /// 语法错误：非 `bytes=` 单位、非数字偏移等。
    Malformed,
    /// 语法可识别但无法满足（越界、逆序、后缀区间、多区间、空文件）。
    Unsatisfiable { total: u64 },
}

/// 按文件总长解析 Range 头；未携带时返回 `Ok(None)`，调用方应返回完整内容。
pub fn resolve_range(
    value: Option<&HeaderValue>,
    total: u64,
) -> Result<Option<ByteRange>, RangeError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| RangeError::Malformed)?;
    let Some(ranges) = value.trim().strip_prefix("bytes=") else {
        return Err(RangeError::Malformed);
    };
    let unsatisfiable = RangeError::Unsatisfiable { total };
    if ranges.contains(',') {
        return Err(unsatisfiable);
    }

    let (start_part, end_part) = ranges.split_once('-').ok_or(RangeError::Malformed)?;
    let (start_part, end_part) = (start_part.trim(), end_part.trim());
    if start_part.is_empty() {
        // Suffix ranges (`bytes=-N`) are not served.
        if end_part.is_empty() || !is_digits(end_part) {
            return Err(RangeError::Malformed);
        }
        return Err(unsatisfiable);
    }

    let start = parse_offset(start_part)?;
    let end = if end_part.is_empty() {
        total.checked_sub(1).ok_or(RangeError::Unsatisfiable { total })?
    } else {
        parse_offset(end_part)?
    };

    if total == 0 || start > end || start >= total || end >= total {
        return Err(unsatisfiable);
    }
    Ok(Some(ByteRange { start, end }))
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

fn parse_offset(value: &str) -> Result<u64, RangeError> {
    if !is_digits(value) {
        return Err(RangeError::Malformed);
    }
    value.parse().map_err(|_| RangeError::Malformed)
}
