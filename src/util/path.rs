use std::path::{Path, PathBuf};
use uuid::Uuid;
use crate::error::{AppError, AppResult};

/// 只保留字母数字和 `.-_`，去掉路径分隔符等危险字符
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename);

    base.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '-' || *c == '_')
        .collect::<String>()
        .trim_matches('.')
        .to_string()
}

/// 取最后一个 `.` 之后的部分并转小写；没有扩展名返回 None
pub fn file_extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() || stem.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// 校验上传文件名并返回小写扩展名
pub fn validate_upload_name(filename: &str, allowed: &[&str]) -> AppResult<String> {
    if filename.trim().is_empty() {
        return Err(AppError::Validation("No file selected".to_string()));
    }

    match file_extension(filename) {
        Some(ext) if allowed.contains(&ext.as_str()) => Ok(ext),
        Some(ext) => Err(AppError::Validation(format!(
            "File type '.{}' is not allowed, expected one of: {}",
            ext,
            allowed.join(", ")
        ))),
        None => Err(AppError::Validation(format!(
            "File has no extension, expected one of: {}",
            allowed.join(", ")
        ))),
    }
}

/// 原名主干保留的最大字节数，保证整个文件名远低于 255 字节的系统上限
pub const MAX_STEM_BYTES: usize = 100;

/// 生成唯一文件名：`<uuid>_<清洗后的原名主干>.<ext>`
pub fn unique_upload_name(original: &str, ext: &str) -> String {
    let stem = original
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(original);
    let stem = sanitize_filename(stem);
    let stem = truncate_on_char_boundary(&stem, MAX_STEM_BYTES).trim_end_matches('.');
    let stem = if stem.is_empty() { "upload" } else { stem };

    format!("{}_{}.{}", Uuid::new_v4().simple(), stem, ext)
}

fn truncate_on_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// 外部转换器把输出写到同目录，仅替换扩展名
pub fn converted_output_path(input: &Path, out_dir: &Path, target_ext: &str) -> PathBuf {
    let file_name = input
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_default()
        .with_extension(target_ext);
    out_dir.join(file_name)
}
