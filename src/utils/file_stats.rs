use crate::utils::error::Result;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::Path;

/// 檔案資訊，供管理介面顯示設定檔與輸出檔
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FileStats {
    pub path: String,
    pub relative_path: String,
    pub size_bytes: u64,
    pub size_human: String,
    pub created: String,
}

pub fn human_readable_size(size: u64) -> String {
    let mut value = size as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if value < 1024.0 {
            return format!("{:.1} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1} PB", value)
}

pub fn file_stats(full_path: &Path, project_root: &Path) -> Result<FileStats> {
    let metadata = std::fs::metadata(full_path)?;
    let absolute = std::fs::canonicalize(full_path)?;

    // 部分檔案系統不支援建立時間，退回修改時間
    let created: DateTime<Local> = metadata
        .created()
        .or_else(|_| metadata.modified())
        .map(DateTime::from)?;

    let relative_path = std::fs::canonicalize(project_root)
        .ok()
        .and_then(|root| absolute.strip_prefix(root).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| full_path.to_path_buf());

    Ok(FileStats {
        path: absolute.display().to_string(),
        relative_path: relative_path.display().to_string(),
        size_bytes: metadata.len(),
        size_human: human_readable_size(metadata.len()),
        created: created.format("%Y-%m-%d %H:%M:%S").to_string(),
    })
}
