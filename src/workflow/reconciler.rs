//! 同步协调器 - 流程层
//!
//! 持有题目仓库和文本缓冲区，只通过两个互斥的转换保持二者一致：
//!
//! - **Project**（题目 → 文本）：总是成功，用当前题目重新生成文本
//! - **Absorb**（文本 → 题目）：解析 + 校验，全部通过才整体替换题目，
//!   否则题目和文本都保持原样
//!
//! 所有修改都需要 `&mut self`，同一时间只可能有一个转换在进行。

use crate::models::question::Question;
use crate::services::repository::QuestionRepository;
use crate::services::serializer::{from_text, into_question, to_text, TextFormat};
use crate::services::validator::{
    has_blocking, validate_questions, validate_record_set, Finding, Severity,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// 同步状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    /// 正在解析/校验文本，界面应禁止新的同步操作
    Validating,
}

/// Absorb 的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbsorbOutcome {
    /// 已替换全部题目；`warnings` 为不阻断的软提示
    Accepted { count: usize, warnings: Vec<Finding> },
    /// 被拒绝，题目与文本均未改变
    Rejected { findings: Vec<Finding> },
}

impl AbsorbOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AbsorbOutcome::Accepted { .. })
    }

    pub fn findings(&self) -> &[Finding] {
        match self {
            AbsorbOutcome::Accepted { warnings, .. } => warnings,
            AbsorbOutcome::Rejected { findings } => findings,
        }
    }
}

// 异步期间把状态置为 Validating，离开作用域（包括 future 被丢弃）时恢复
struct BusyGuard<'a>(&'a watch::Sender<SyncState>);

impl<'a> BusyGuard<'a> {
    fn enter(state: &'a watch::Sender<SyncState>) -> Self {
        state.send_replace(SyncState::Validating);
        Self(state)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(SyncState::Idle);
    }
}

/// 同步协调器
pub struct SyncReconciler {
    repository: QuestionRepository,
    text: String,
    format: TextFormat,
    state: watch::Sender<SyncState>,
}

impl SyncReconciler {
    /// 接管一个仓库，并立即生成文本
    pub fn new(repository: QuestionRepository, format: TextFormat) -> Self {
        let (state, _) = watch::channel(SyncState::Idle);
        let mut reconciler = Self {
            repository,
            text: String::new(),
            format,
            state,
        };
        reconciler.project();
        reconciler
    }

    pub fn repository(&self) -> &QuestionRepository {
        &self.repository
    }

    pub fn questions(&self) -> &[Question] {
        self.repository.questions()
    }

    /// 当前文本缓冲区
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn format(&self) -> TextFormat {
        self.format
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// 订阅同步状态变化
    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// 用户直接编辑文本；题目不变，直到 Absorb 成功
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// 切换输出格式并重新生成文本
    pub fn set_format(&mut self, format: TextFormat) {
        self.format = format;
        self.project();
    }

    /// Project：题目 → 文本
    pub fn project(&mut self) {
        self.text = to_text(self.repository.questions(), self.format);
        debug!("文本已刷新: {} 道题目, {} 字节", self.repository.len(), self.text.len());
    }

    /// 对仓库执行一次修改，然后立即 Project
    pub fn mutate<T>(&mut self, op: impl FnOnce(&mut QuestionRepository) -> T) -> T {
        let result = op(&mut self.repository);
        self.project();
        result
    }

    /// 表单视图使用的校验（不阻断）
    pub fn validate_records(&self) -> Vec<Finding> {
        validate_questions(self.repository.questions())
    }

    /// Absorb：文本缓冲区 → 题目（同步执行）
    pub fn absorb_now(&mut self) -> AbsorbOutcome {
        let prepared = prepare(&self.text);
        self.commit(prepared)
    }

    /// Absorb：文本缓冲区 → 题目
    ///
    /// 解析和校验放到阻塞线程池执行，完成后在当前任务提交。
    pub async fn absorb(&mut self) -> AbsorbOutcome {
        let text = self.text.clone();
        let prepared = {
            let _busy = BusyGuard::enter(&self.state);
            tokio::task::spawn_blocking(move || prepare(&text)).await
        };

        let prepared = prepared.unwrap_or_else(|e| {
            Err(vec![Finding::general(
                Severity::Error,
                format!("Validation task failed: {}", e),
            )])
        });
        self.commit(prepared)
    }

    /// 用外部文本（如导入文件）做 Absorb
    ///
    /// 成功时文本缓冲区变为规范化后的文本；失败时缓冲区保持不变。
    pub async fn absorb_text(&mut self, text: impl Into<String>) -> AbsorbOutcome {
        let previous = std::mem::replace(&mut self.text, text.into());
        let outcome = self.absorb().await;
        if !outcome.is_accepted() {
            self.text = previous;
        }
        outcome
    }

    /// 安装外部已有的题目（快照恢复），不阻断，只记录问题
    pub fn install(&mut self, questions: Vec<Question>) -> Vec<Finding> {
        let findings = validate_questions(&questions);
        if has_blocking(&findings) {
            warn!("⚠️ 恢复的题目存在 {} 个问题", findings.len());
        }
        self.repository.replace_all(questions);
        self.project();
        findings
    }

    fn commit(&mut self, prepared: Result<(Vec<Question>, Vec<Finding>), Vec<Finding>>) -> AbsorbOutcome {
        match prepared {
            Ok((questions, warnings)) => {
                let count = questions.len();
                self.repository.replace_all(questions);
                self.project();
                info!("✓ 文本同步成功: {} 道题目, {} 个提示", count, warnings.len());
                AbsorbOutcome::Accepted { count, warnings }
            }
            Err(findings) => {
                warn!("⚠️ 文本无效，未同步: {} 个问题", findings.len());
                AbsorbOutcome::Rejected { findings }
            }
        }
    }
}

// 解析 + 校验 + 转换；不触碰任何状态
fn prepare(text: &str) -> Result<(Vec<Question>, Vec<Finding>), Vec<Finding>> {
    let items = from_text(text).map_err(|e| vec![Finding::general(Severity::Error, e.to_string())])?;

    let findings = validate_record_set(&items);
    if has_blocking(&findings) {
        return Err(findings);
    }

    let mut questions = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let converted = item
            .as_record()
            .ok_or_else(|| format!("item {} is not an object", index))
            .and_then(|record| into_question(record).map_err(|e| e.to_string()));
        match converted {
            Ok(question) => questions.push(question),
            Err(e) => {
                return Err(vec![Finding::general(
                    Severity::Error,
                    format!("Question at index {} could not be read: {}", index, e),
                )])
            }
        }
    }

    Ok((questions, findings))
}
