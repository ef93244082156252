//! 警告写入服务 - 业务能力层
//!
//! 只负责"写 warn.txt"能力，不关心流程

use crate::services::validator::Finding;
use anyhow::Result;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// 警告写入服务
///
/// 职责：
/// - 将未能通过校验的文件及其问题写入 warn.txt
/// - 每次只处理一个文件
/// - 不关心流程顺序
pub struct WarnWriter {
    warn_file_path: String,
}

impl WarnWriter {
    /// 创建新的警告写入服务
    pub fn new() -> Self {
        Self {
            warn_file_path: "warn.txt".to_string(),
        }
    }

    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            warn_file_path: path.into(),
        }
    }

    /// 写入警告信息
    ///
    /// # 参数
    /// - `file_name`: 被拒绝的文件名
    /// - `findings`: 校验问题
    pub async fn write(&self, file_name: &str, findings: &[Finding]) -> Result<()> {
        debug!("写入警告: 文件 {} | 问题数: {}", file_name, findings.len());

        let mut warn_msg = format!("文件 {} | 问题 {} 个\n", file_name, findings.len());
        for finding in findings {
            warn_msg.push_str(&format!("  - {}\n", finding));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.warn_file_path)
            .await?;
        file.write_all(warn_msg.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}

impl Default for WarnWriter {
    fn default() -> Self {
        Self::new()
    }
}
