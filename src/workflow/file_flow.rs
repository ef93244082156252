//! 题目文件处理流程 - 流程层
//!
//! 核心职责：定义"一个文件"的完整处理流程
//!
//! 流程顺序：
//! 1. 文本 → Absorb（解析 + 校验）
//! 2. 通过 → 规范化文本写入输出目录
//! 3. 拒绝 → 问题写入 warn.txt（兜底）

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::models::JsonSource;
use crate::services::exporter::export_to_path;
use crate::services::repository::QuestionRepository;
use crate::services::serializer::TextFormat;
use crate::services::validator::{Finding, Severity};
use crate::services::WarnWriter;
use crate::utils::truncate_text;
use crate::workflow::reconciler::{AbsorbOutcome, SyncReconciler};

/// 文件处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileResult {
    /// 校验通过，已写出规范化文件
    Accepted { output: PathBuf, count: usize },
    /// 校验未通过，问题已写入 warn.txt
    Rejected { findings: usize },
}

impl FileResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, FileResult::Accepted { .. })
    }
}

/// 题目文件处理流程
///
/// - 每个文件使用独立的仓库和协调器，文件之间互不影响
/// - 只依赖业务能力（services）
pub struct FileFlow {
    warn_writer: WarnWriter,
    output_folder: PathBuf,
    fallback_file_name: String,
    format: TextFormat,
    event_capacity: usize,
    verbose_logging: bool,
}

impl FileFlow {
    /// 创建新的文件处理流程
    pub fn new(config: &Config) -> Self {
        Self {
            warn_writer: WarnWriter::with_path(config.warn_file.clone()),
            output_folder: PathBuf::from(&config.output_folder),
            fallback_file_name: config.export_file_name.clone(),
            format: config.text_format(),
            event_capacity: config.event_capacity,
            verbose_logging: config.verbose_logging,
        }
    }

    pub async fn run(&self, source: &JsonSource, file_index: usize) -> Result<FileResult> {
        let file_name = source.file_name();
        info!("[文件 {}] 📄 {}", file_index, file_name);

        let repository = QuestionRepository::with_event_capacity(self.event_capacity);
        let mut reconciler = SyncReconciler::new(repository, self.format);

        match reconciler.absorb_text(source.text.as_str()).await {
            AbsorbOutcome::Accepted { count, warnings } => {
                for w in &warnings {
                    warn!("[文件 {}] ⚠️ {}", file_index, w);
                }
                if count == 0 {
                    warn!("[文件 {}] ⚠️ 文件中没有题目，写入 warn.txt", file_index);
                    let finding = Finding::general(Severity::Warning, AppError::NothingToExport.to_string());
                    self.warn_writer.write(&file_name, &[finding]).await?;
                    return Ok(FileResult::Rejected { findings: 1 });
                }
                if self.verbose_logging {
                    self.log_questions(file_index, &reconciler);
                }

                let target = self.output_path(&file_name);
                let output = export_to_path(reconciler.questions(), &target, self.format).await?;
                info!("[文件 {}] ✓ 校验通过: {} 道题目", file_index, count);
                Ok(FileResult::Accepted { output, count })
            }
            AbsorbOutcome::Rejected { findings } => {
                warn!(
                    "[文件 {}] ❌ 校验未通过: {} 个问题，写入 warn.txt",
                    file_index,
                    findings.len()
                );
                if self.verbose_logging {
                    for f in &findings {
                        warn!("[文件 {}]   - {}", file_index, f);
                    }
                }
                self.warn_writer.write(&file_name, &findings).await?;
                Ok(FileResult::Rejected {
                    findings: findings.len(),
                })
            }
        }
    }

    fn output_path(&self, file_name: &str) -> PathBuf {
        let name = if file_name.is_empty() {
            self.fallback_file_name.as_str()
        } else {
            file_name
        };
        self.output_folder.join(Path::new(name))
    }

    // ========== 日志辅助方法 ==========

    fn log_questions(&self, file_index: usize, reconciler: &SyncReconciler) {
        for q in reconciler.questions() {
            info!(
                "[文件 {}]   Q#{}: {}",
                file_index,
                q.question_number,
                truncate_text(&q.question_text, 40)
            );
        }
    }
}
