//! 题目仓库 - 业务能力层
//!
//! 唯一持有题目列表的组件。所有结构性修改之后都按题号重新排序，
//! 并通过广播通道通知订阅者。拒绝类情况以 `RepositoryWarning` 返回，
//! 不 panic，由调用方决定是否提示用户。

use crate::models::question::{Difficulty, OptionMap, Question, QuestionDraft, QuestionId};
use crate::services::validator::{validate_questions, Finding};
use std::collections::BTreeSet;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

/// 默认的事件通道容量
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// 题目至少要有的选项数
pub const MIN_OPTIONS: usize = 2;

/// 仓库变更事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryEvent {
    Added(QuestionId),
    Updated(QuestionId),
    Removed(QuestionId),
    /// 整体替换（批量导入、文本同步、快照恢复）
    Reloaded { count: usize },
    /// 题号被重新编排
    Renumbered,
}

/// 批量导入模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// 丢弃现有题目
    Replace,
    /// 追加到现有题目之后
    Append,
}

/// 可整体替换的单个字段
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    QuestionNumber(u32),
    QuestionText(String),
    Subject(Option<String>),
    Topic(Option<String>),
    Explanation(Option<String>),
    Difficulty(Option<Difficulty>),
    SectionId(Option<String>),
}

/// 单条题目的修改命令
#[derive(Debug, Clone, PartialEq)]
pub enum QuestionUpdate {
    /// 修改选项键，文本保持不变
    RenameOptionKey { old: String, new: String },
    /// 修改选项文本，键保持不变
    SetOptionValue { key: String, value: String },
    /// 直接设置正确答案
    SetCorrectAnswer { key: String },
    SetField(FieldValue),
}

/// 仓库拒绝执行的原因
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryWarning {
    #[error("Question {0} not found.")]
    NotFound(QuestionId),

    #[error("Minimum {min} options required.")]
    MinimumOptions { min: usize },

    #[error("Option key '{key}' already exists.")]
    DuplicateOptionKey { key: String },

    #[error("Option key '{key}' does not exist.")]
    UnknownOption { key: String },
}

/// 题目仓库
pub struct QuestionRepository {
    questions: Vec<Question>,
    events: broadcast::Sender<RepositoryEvent>,
}

impl QuestionRepository {
    /// 创建空仓库
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// 指定事件通道容量创建
    pub fn with_event_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            questions: Vec::new(),
            events,
        }
    }

    /// 订阅变更事件
    pub fn subscribe(&self) -> broadcast::Receiver<RepositoryEvent> {
        self.events.subscribe()
    }

    /// 当前题目（已按题号排序）
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// 下一个可用题号：当前最大值 + 1，空仓库为 1
    pub fn next_question_number(&self) -> u32 {
        self.free_numbers(1).into_iter().next().unwrap_or(1)
    }

    // 从最大值 + 1 起依次取未占用的题号；到达 u32::MAX 后从 1 开始找空位
    fn free_numbers(&self, count: usize) -> Vec<u32> {
        let used: BTreeSet<u32> = self.questions.iter().map(|q| q.question_number).collect();
        let mut candidate = used.last().map_or(Some(1), |max| max.checked_add(1)).unwrap_or(1);

        let mut numbers = Vec::with_capacity(count);
        while numbers.len() < count {
            if !used.contains(&candidate) {
                numbers.push(candidate);
            }
            candidate = candidate.checked_add(1).unwrap_or(1);
        }
        numbers
    }

    /// 按当前状态做一次完整校验（不阻断任何操作）
    pub fn validate(&self) -> Vec<Finding> {
        validate_questions(&self.questions)
    }

    /// 新增题目，返回新 id
    pub fn add(&mut self, draft: QuestionDraft) -> QuestionId {
        let number = draft
            .question_number
            .filter(|n| *n > 0)
            .unwrap_or_else(|| self.next_question_number());
        let question = build_question(draft, number, OptionMap::two_empty());
        let id = question.id;

        debug!("新增题目 Q#{} ({})", question.question_number, id);
        self.questions.push(question);
        self.sort();
        self.emit(RepositoryEvent::Added(id));
        id
    }

    /// 修改单条题目
    pub fn update(&mut self, id: QuestionId, update: QuestionUpdate) -> Result<(), RepositoryWarning> {
        let question = self.get_mut(id)?;

        match update {
            QuestionUpdate::RenameOptionKey { old, new } => {
                let new = new.trim();
                // 输入过程中键可能暂时为空，此时不处理
                if new.is_empty() || new == old {
                    return Ok(());
                }
                if question.options.contains_key(new) {
                    return Err(RepositoryWarning::DuplicateOptionKey {
                        key: new.to_string(),
                    });
                }
                // 答案与键按大小写不敏感匹配，"B" 也指向键 b
                let was_answer = question.resolved_answer() == Some(old.as_str());
                if !question.options.rename(&old, new) {
                    return Err(RepositoryWarning::UnknownOption { key: old });
                }
                if was_answer {
                    question.correct_answer = new.to_string();
                }
            }
            QuestionUpdate::SetOptionValue { key, value } => {
                if !question.options.contains_key(&key) {
                    return Err(RepositoryWarning::UnknownOption { key });
                }
                question.options.insert(key, value);
            }
            QuestionUpdate::SetCorrectAnswer { key } => {
                question.correct_answer = key;
            }
            QuestionUpdate::SetField(field) => apply_field(question, field),
        }

        self.sort();
        self.emit(RepositoryEvent::Updated(id));
        Ok(())
    }

    /// 删除题目
    pub fn remove(&mut self, id: QuestionId) -> Result<Question, RepositoryWarning> {
        let pos = self
            .questions
            .iter()
            .position(|q| q.id == id)
            .ok_or(RepositoryWarning::NotFound(id))?;
        let removed = self.questions.remove(pos);

        debug!("删除题目 Q#{} ({})", removed.question_number, id);
        self.emit(RepositoryEvent::Removed(id));
        Ok(removed)
    }

    /// 删除选项；少于两个时拒绝。删掉的是正确答案时改指第一个剩余选项。
    pub fn remove_option(&mut self, id: QuestionId, key: &str) -> Result<(), RepositoryWarning> {
        let question = self.get_mut(id)?;

        if question.options.len() <= MIN_OPTIONS {
            return Err(RepositoryWarning::MinimumOptions { min: MIN_OPTIONS });
        }
        let was_answer = question.resolved_answer() == Some(key);
        if question.options.remove(key).is_none() {
            return Err(RepositoryWarning::UnknownOption { key: key.to_string() });
        }
        if was_answer {
            question.correct_answer = question.options.first_key().unwrap_or_default().to_string();
        }

        self.emit(RepositoryEvent::Updated(id));
        Ok(())
    }

    /// 新增一个空选项，返回新键
    ///
    /// 依次尝试 `a..z`，全部占用后使用 `opt{N}`（N = 当前选项数 + 1）。
    pub fn add_option(&mut self, id: QuestionId) -> Result<String, RepositoryWarning> {
        let question = self.get_mut(id)?;
        let key = next_option_key(&question.options);
        question.options.insert(key.clone(), "");

        self.emit(RepositoryEvent::Updated(id));
        Ok(key)
    }

    /// 复制题目：新 id、新题号，题干加上复制标记
    pub fn duplicate(&mut self, id: QuestionId) -> Result<QuestionId, RepositoryWarning> {
        let original = self.get(id).ok_or(RepositoryWarning::NotFound(id))?;

        let mut copy = original.clone();
        copy.id = QuestionId::new();
        copy.question_text = format!(
            "(Copy of Q#{}) {}",
            original.question_number, original.question_text
        );
        copy.question_number = self.next_question_number();
        let new_id = copy.id;

        self.questions.push(copy);
        self.sort();
        self.emit(RepositoryEvent::Added(new_id));
        Ok(new_id)
    }

    /// 批量导入（模板等）
    ///
    /// - `Replace`：题号取草稿自带的，否则按输入顺序从 1 开始
    /// - `Append`：忽略草稿题号，从当前最大值 + 1 起连续编号
    pub fn load_bulk(&mut self, drafts: Vec<QuestionDraft>, mode: LoadMode) -> Vec<QuestionId> {
        let appended = match mode {
            LoadMode::Replace => Vec::new(),
            LoadMode::Append => self.free_numbers(drafts.len()),
        };

        let incoming: Vec<Question> = drafts
            .into_iter()
            .enumerate()
            .map(|(index, draft)| {
                let number = match mode {
                    LoadMode::Replace => draft
                        .question_number
                        .filter(|n| *n > 0)
                        .unwrap_or_else(|| u32::try_from(index + 1).unwrap_or(u32::MAX)),
                    LoadMode::Append => appended[index],
                };
                build_question(draft, number, OptionMap::from_pairs([("a", "Opt A"), ("b", "Opt B")]))
            })
            .collect();
        let ids: Vec<QuestionId> = incoming.iter().map(|q| q.id).collect();

        debug!("批量导入 {} 道题目 ({:?})", incoming.len(), mode);
        match mode {
            LoadMode::Replace => self.questions = incoming,
            LoadMode::Append => self.questions.extend(incoming),
        }
        self.sort();
        self.emit(RepositoryEvent::Reloaded {
            count: self.questions.len(),
        });
        ids
    }

    /// 用已经校验过的题目整体替换
    pub fn replace_all(&mut self, questions: Vec<Question>) {
        self.questions = questions;
        self.sort();
        self.emit(RepositoryEvent::Reloaded {
            count: self.questions.len(),
        });
    }

    /// 按当前顺序重新编号为 1..n
    pub fn renumber(&mut self) {
        for (index, question) in self.questions.iter_mut().enumerate() {
            question.question_number = index as u32 + 1;
        }
        self.emit(RepositoryEvent::Renumbered);
    }

    fn get_mut(&mut self, id: QuestionId) -> Result<&mut Question, RepositoryWarning> {
        self.questions
            .iter_mut()
            .find(|q| q.id == id)
            .ok_or(RepositoryWarning::NotFound(id))
    }

    fn sort(&mut self) {
        self.questions.sort_by_key(|q| q.question_number);
    }

    fn emit(&self, event: RepositoryEvent) {
        // 没有订阅者时发送会失败，属于正常情况
        let _ = self.events.send(event);
    }
}

impl Default for QuestionRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn build_question(draft: QuestionDraft, number: u32, default_options: OptionMap) -> Question {
    let options = draft.options.unwrap_or(default_options);
    let correct_answer = draft
        .correct_answer
        .filter(|a| !a.is_empty())
        .or_else(|| options.first_key().map(str::to_string))
        .unwrap_or_default();

    Question {
        id: QuestionId::new(),
        question_number: number,
        question_text: draft.question_text.unwrap_or_default(),
        options,
        correct_answer,
        subject: non_empty(draft.subject),
        topic: non_empty(draft.topic),
        explanation: draft.explanation,
        difficulty: draft.difficulty,
        section_id: non_empty(draft.section_id),
    }
}

fn apply_field(question: &mut Question, field: FieldValue) {
    match field {
        FieldValue::QuestionNumber(n) => question.question_number = n,
        FieldValue::QuestionText(text) => question.question_text = text,
        FieldValue::Subject(v) => question.subject = v,
        FieldValue::Topic(v) => question.topic = v,
        FieldValue::Explanation(v) => question.explanation = v,
        FieldValue::Difficulty(v) => question.difficulty = v,
        FieldValue::SectionId(v) => question.section_id = v,
    }
}

fn next_option_key(options: &OptionMap) -> String {
    ('a'..='z')
        .map(String::from)
        .find(|k| !options.contains_key(k))
        .unwrap_or_else(|| format!("opt{}", options.len() + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(text: &str, options: &[(&str, &str)], answer: &str) -> QuestionDraft {
        QuestionDraft {
            question_text: Some(text.to_string()),
            options: Some(OptionMap::from_pairs(options.iter().copied())),
            correct_answer: Some(answer.to_string()),
            ..Default::default()
        }
    }

    fn numbers(repo: &QuestionRepository) -> Vec<u32> {
        repo.questions().iter().map(|q| q.question_number).collect()
    }

    #[test]
    fn add_fills_defaults() {
        let mut repo = QuestionRepository::new();
        let id = repo.add(QuestionDraft::default());
        let q = repo.get(id).unwrap();
        assert_eq!(q.question_number, 1);
        assert_eq!(q.options, OptionMap::two_empty());
        assert_eq!(q.correct_answer, "a");
        assert_eq!(q.subject, None);

        let second = repo.add(QuestionDraft::with_text("Next"));
        assert_eq!(repo.get(second).unwrap().question_number, 2);
    }

    #[test]
    fn add_keeps_list_sorted() {
        let mut repo = QuestionRepository::new();
        repo.add(QuestionDraft {
            question_number: Some(5),
            ..Default::default()
        });
        repo.add(QuestionDraft {
            question_number: Some(2),
            ..Default::default()
        });
        repo.add(QuestionDraft::default());
        assert_eq!(numbers(&repo), vec![2, 5, 6]);
    }

    #[test]
    fn rename_moves_value_and_repoints_answer() {
        let mut repo = QuestionRepository::new();
        let id = repo.add(draft("Q", &[("a", "X"), ("b", "Y")], "a"));
        repo.update(
            id,
            QuestionUpdate::RenameOptionKey {
                old: "a".into(),
                new: " first ".into(),
            },
        )
        .unwrap();
        let q = repo.get(id).unwrap();
        assert_eq!(q.options.get("first"), Some("X"));
        assert!(!q.options.contains_key("a"));
        assert_eq!(q.correct_answer, "first");
        assert_eq!(q.options.first_key(), Some("first"));
    }

    #[test]
    fn rename_onto_existing_key_is_refused() {
        let mut repo = QuestionRepository::new();
        let id = repo.add(draft("Q", &[("a", "X"), ("b", "Y")], "a"));
        let before = repo.get(id).unwrap().clone();
        let result = repo.update(
            id,
            QuestionUpdate::RenameOptionKey {
                old: "a".into(),
                new: "b".into(),
            },
        );
        assert_eq!(
            result,
            Err(RepositoryWarning::DuplicateOptionKey { key: "b".into() })
        );
        assert_eq!(repo.get(id).unwrap(), &before);
    }

    #[test]
    fn rename_to_empty_is_a_no_op() {
        let mut repo = QuestionRepository::new();
        let id = repo.add(draft("Q", &[("a", "X"), ("b", "Y")], "a"));
        let before = repo.get(id).unwrap().clone();
        repo.update(
            id,
            QuestionUpdate::RenameOptionKey {
                old: "a".into(),
                new: "   ".into(),
            },
        )
        .unwrap();
        assert_eq!(repo.get(id).unwrap(), &before);
    }

    #[test]
    fn set_option_value_and_answer() {
        let mut repo = QuestionRepository::new();
        let id = repo.add(draft("Q", &[("a", "X"), ("b", "Y")], "a"));
        repo.update(
            id,
            QuestionUpdate::SetOptionValue {
                key: "b".into(),
                value: "Why".into(),
            },
        )
        .unwrap();
        repo.update(id, QuestionUpdate::SetCorrectAnswer { key: "B".into() })
            .unwrap();
        let q = repo.get(id).unwrap();
        assert_eq!(q.options.get("b"), Some("Why"));
        assert_eq!(q.correct_answer, "B");
        assert_eq!(q.resolved_answer(), Some("b"));
    }

    #[test]
    fn set_number_resorts() {
        let mut repo = QuestionRepository::new();
        let first = repo.add(QuestionDraft::default());
        repo.add(QuestionDraft::default());
        repo.update(first, QuestionUpdate::SetField(FieldValue::QuestionNumber(9)))
            .unwrap();
        assert_eq!(repo.questions().last().unwrap().id, first);
    }

    #[test]
    fn remove_option_refuses_below_minimum() {
        let mut repo = QuestionRepository::new();
        let id = repo.add(draft("Q", &[("a", "X"), ("b", "Y")], "a"));
        let before = repo.get(id).unwrap().clone();
        assert_eq!(
            repo.remove_option(id, "a"),
            Err(RepositoryWarning::MinimumOptions { min: 2 })
        );
        assert_eq!(repo.get(id).unwrap(), &before);
    }

    #[test]
    fn removing_correct_option_reassigns_answer() {
        let mut repo = QuestionRepository::new();
        let id = repo.add(draft("Q", &[("a", "X"), ("b", "Y"), ("c", "Z")], "b"));
        repo.remove_option(id, "b").unwrap();
        let q = repo.get(id).unwrap();
        assert_eq!(q.correct_answer, "a");
        assert!(q.options.contains_key(&q.correct_answer));
    }

    #[test]
    fn add_option_uses_letters_then_opt_n() {
        let mut repo = QuestionRepository::new();
        let id = repo.add(draft("Q", &[("a", "X"), ("c", "Y")], "a"));
        assert_eq!(repo.add_option(id).unwrap(), "b");
        assert_eq!(repo.add_option(id).unwrap(), "d");

        let letters: Vec<(String, String)> = ('a'..='z').map(|c| (c.to_string(), "v".to_string())).collect();
        let full = repo.add(QuestionDraft {
            options: Some(OptionMap::from_pairs(letters)),
            ..Default::default()
        });
        assert_eq!(repo.add_option(full).unwrap(), "opt27");
        assert_eq!(repo.get(full).unwrap().options.get("opt27"), Some(""));
    }

    #[test]
    fn duplicate_marks_copy() {
        let mut repo = QuestionRepository::new();
        let id = repo.add(draft("Capital of France?", &[("a", "Paris"), ("b", "Rome")], "a"));
        repo.add(QuestionDraft::default());
        let copy = repo.duplicate(id).unwrap();
        let q = repo.get(copy).unwrap();
        assert_ne!(copy, id);
        assert_eq!(q.question_number, 3);
        assert_eq!(q.question_text, "(Copy of Q#1) Capital of France?");
        assert_eq!(q.options, repo.get(id).unwrap().options);
    }

    #[test]
    fn remove_only_touches_target() {
        let mut repo = QuestionRepository::new();
        let a = repo.add(QuestionDraft::default());
        let b = repo.add(QuestionDraft::default());
        let removed = repo.remove(a).unwrap();
        assert_eq!(removed.id, a);
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.get(b).unwrap().question_number, 2);
        assert_eq!(repo.remove(a), Err(RepositoryWarning::NotFound(a)));
    }

    #[test]
    fn append_renumbers_after_max() {
        let mut repo = QuestionRepository::new();
        repo.add(QuestionDraft {
            question_number: Some(5),
            ..Default::default()
        });
        let ids = repo.load_bulk(
            vec![
                QuestionDraft::with_text("one"),
                QuestionDraft {
                    question_number: Some(1),
                    ..QuestionDraft::with_text("two")
                },
                QuestionDraft::with_text("three"),
            ],
            LoadMode::Append,
        );
        let got: Vec<_> = ids
            .iter()
            .map(|id| {
                let q = repo.get(*id).unwrap();
                (q.question_text.as_str(), q.question_number)
            })
            .collect();
        assert_eq!(got, vec![("one", 6), ("two", 7), ("three", 8)]);
    }

    #[test]
    fn replace_uses_explicit_numbers_or_position() {
        let mut repo = QuestionRepository::new();
        repo.add(QuestionDraft::default());
        repo.load_bulk(
            vec![
                QuestionDraft {
                    question_number: Some(10),
                    ..Default::default()
                },
                QuestionDraft::default(),
            ],
            LoadMode::Replace,
        );
        assert_eq!(numbers(&repo), vec![2, 10]);
        assert_eq!(repo.questions()[0].options.get("a"), Some("Opt A"));
    }

    #[test]
    fn renumber_closes_gaps() {
        let mut repo = QuestionRepository::new();
        for n in [3, 8, 20] {
            repo.add(QuestionDraft {
                question_number: Some(n),
                ..Default::default()
            });
        }
        repo.renumber();
        assert_eq!(numbers(&repo), vec![1, 2, 3]);
    }

    #[test]
    fn subscribers_receive_events() {
        let mut repo = QuestionRepository::new();
        let mut rx = repo.subscribe();
        let id = repo.add(QuestionDraft::default());
        repo.remove(id).unwrap();
        assert_eq!(rx.try_recv().unwrap(), RepositoryEvent::Added(id));
        assert_eq!(rx.try_recv().unwrap(), RepositoryEvent::Removed(id));
    }

    #[test]
    fn validate_flags_direct_mutation_problems() {
        let mut repo = QuestionRepository::new();
        let id = repo.add(QuestionDraft::default());
        let findings = repo.validate();
        assert!(findings.iter().any(|f| f.field.as_deref() == Some("question_text")));
        assert!(findings.iter().all(|f| f.question_id == Some(id)));
    }

    #[test]
    fn rename_repoints_answer_written_in_other_case() {
        let mut repo = QuestionRepository::new();
        let id = repo.add(draft("Q", &[("a", "X"), ("b", "Y")], "A"));
        repo.update(
            id,
            QuestionUpdate::RenameOptionKey {
                old: "a".into(),
                new: "x".into(),
            },
        )
        .unwrap();
        let q = repo.get(id).unwrap();
        assert_eq!(q.correct_answer, "x");
        assert_eq!(q.resolved_answer(), Some("x"));
    }

    #[test]
    fn remove_option_reassigns_answer_written_in_other_case() {
        let mut repo = QuestionRepository::new();
        let id = repo.add(draft("Q", &[("a", "X"), ("b", "Y"), ("c", "Z")], "B"));
        repo.remove_option(id, "b").unwrap();
        let q = repo.get(id).unwrap();
        assert_eq!(q.correct_answer, "a");
        assert_eq!(q.resolved_answer(), Some("a"));
        assert!(repo.validate().is_empty());
    }

    #[test]
    fn set_option_value_refuses_unknown_key() {
        let mut repo = QuestionRepository::new();
        let id = repo.add(draft("Q", &[("a", "X"), ("b", "Y")], "a"));
        let before = repo.get(id).unwrap().clone();
        for key in ["c", ""] {
            assert_eq!(
                repo.update(
                    id,
                    QuestionUpdate::SetOptionValue {
                        key: key.into(),
                        value: "Z".into(),
                    },
                ),
                Err(RepositoryWarning::UnknownOption { key: key.into() })
            );
        }
        assert_eq!(repo.get(id).unwrap(), &before);
    }

    #[test]
    fn numbering_past_u32_max_reuses_free_numbers() {
        let mut repo = QuestionRepository::new();
        repo.add(QuestionDraft {
            question_number: Some(u32::MAX),
            ..Default::default()
        });
        repo.add(QuestionDraft {
            question_number: Some(1),
            ..Default::default()
        });
        assert_eq!(repo.next_question_number(), 2);

        let ids = repo.load_bulk(
            vec![QuestionDraft::default(), QuestionDraft::default()],
            LoadMode::Append,
        );
        let appended: Vec<u32> = ids.iter().map(|id| repo.get(*id).unwrap().question_number).collect();
        assert_eq!(appended, vec![2, 3]);
        assert_eq!(numbers(&repo), vec![1, 2, 3, u32::MAX]);
    }
}
