use crate::error::{AppError, FileError};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从磁盘读到的一份题目 JSON 文本
#[derive(Debug, Clone)]
pub struct JsonSource {
    pub path: PathBuf,
    pub text: String,
}

impl JsonSource {
    /// 文件名（用于日志和输出文件命名）
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }
}

/// 读取单个 JSON 文件的原始文本（不做解析，解析交给序列化器）
pub async fn load_json_text(json_file_path: &Path) -> Result<JsonSource> {
    let text = fs::read_to_string(json_file_path)
        .await
        .with_context(|| format!("无法读取JSON文件: {}", json_file_path.display()))?;

    Ok(JsonSource {
        path: json_file_path.to_path_buf(),
        text,
    })
}

/// 从文件夹中加载所有 JSON 文件，按文件名排序
pub async fn load_all_json_files(folder_path: &str) -> Result<Vec<JsonSource>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        return Err(AppError::File(FileError::DirectoryNotFound {
            path: folder_path.to_string(),
        })
        .into());
    }

    let mut paths = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_json_text(&path).await {
            Ok(source) => sources.push(source),
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {}", path.display(), e);
            }
        }
    }

    Ok(sources)
}
