//! 快照服务 - 业务能力层
//!
//! 整个编辑器状态的唯一持久化方式：把全部题目（含 id）连同导出文件名
//! 存成一个 JSON 文件。这是内部格式，不是交付给考试平台的文本格式。

use crate::error::{AppError, AppResult};
use crate::models::question::{Question, QuestionId};
use crate::services::validator::Finding;
use crate::workflow::reconciler::SyncReconciler;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::info;

/// 快照里的一条题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredRecord")]
pub struct SnapshotRecord {
    pub id: QuestionId,
    #[serde(flatten)]
    pub question: Question,
}

#[derive(Deserialize)]
struct StoredRecord {
    id: QuestionId,
    #[serde(flatten)]
    question: Question,
}

// 反序列化时 Question::id 会被重新生成，这里改回快照中的 id
impl From<StoredRecord> for SnapshotRecord {
    fn from(stored: StoredRecord) -> Self {
        Self {
            id: stored.id,
            question: Question {
                id: stored.id,
                ..stored.question
            },
        }
    }
}

impl SnapshotRecord {
    fn into_question(self) -> Question {
        self.question
    }
}

/// 编辑器快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub saved_at: DateTime<Local>,
    pub export_file_name: String,
    pub questions: Vec<SnapshotRecord>,
}

impl Snapshot {
    /// 记录当前状态
    pub fn capture(reconciler: &SyncReconciler, export_file_name: impl Into<String>) -> Self {
        Self {
            saved_at: Local::now(),
            export_file_name: export_file_name.into(),
            questions: reconciler
                .questions()
                .iter()
                .map(|q| SnapshotRecord {
                    id: q.id,
                    question: q.clone(),
                })
                .collect(),
        }
    }

    /// 恢复到协调器中（整体替换并重新生成文本）
    ///
    /// 返回导出文件名和恢复后题目的校验结果；有问题也照常恢复。
    pub fn restore(self, reconciler: &mut SyncReconciler) -> (String, Vec<Finding>) {
        let questions = self
            .questions
            .into_iter()
            .map(SnapshotRecord::into_question)
            .collect();
        let findings = reconciler.install(questions);
        (self.export_file_name, findings)
    }

    /// 写入磁盘
    pub async fn save(&self, path: &Path) -> AppResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .await
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
        info!("💾 快照已保存: {} ({} 道题目)", path.display(), self.questions.len());
        Ok(())
    }

    /// 从磁盘读取
    pub async fn load(path: &Path) -> AppResult<Self> {
        let json = fs::read_to_string(path)
            .await
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        let snapshot: Snapshot = serde_json::from_str(&json)
            .map_err(|e| AppError::snapshot_decode_failed(path.display().to_string(), e))?;
        info!("📂 快照已读取: {} ({} 道题目)", path.display(), snapshot.questions.len());
        Ok(snapshot)
    }
}
