//! 题目校验服务 - 业务能力层
//!
//! 纯函数：检查单条记录与整个记录集，结果以 `Finding` 列表返回，
//! 从不报错、从不修改输入。是否阻断操作由调用方决定。

use crate::models::question::{Difficulty, Question, QuestionId};
use crate::models::raw::{exceeds_number_range, positive_integer, RawField, RawItem, RawOptions, RawRecord};
use phf::phf_set;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::fmt;

/// 文本格式中允许出现的字段
static SCHEMA_FIELDS: phf::Set<&'static str> = phf_set! {
    "question_number",
    "question_text",
    "options",
    "correct_answer",
    "subject",
    "topic",
    "explanation",
    "difficulty",
    "section_id",
};

/// 结构化状态里可能携带的内部记账字段
static INTERNAL_FIELDS: phf::Set<&'static str> = phf_set! {
    "id",
    "_isDirty",
};

/// 已知字段策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownKeys {
    /// 只允许文本格式的九个字段
    Wire,
    /// 额外容忍内部字段 `id`、`_isDirty`
    Structured,
}

impl KnownKeys {
    fn allows(self, name: &str) -> bool {
        SCHEMA_FIELDS.contains(name)
            || (self == KnownKeys::Structured && INTERNAL_FIELDS.contains(name))
    }
}

/// 严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// 硬错误：阻断同步
    Error,
    /// 软提示：只报告，不阻断
    Warning,
}

/// 记录指代：题号（原样）或数组下标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordRef {
    /// 合法的题号
    Number(u32),
    /// 存在但不合法的题号，按 JSON 原文显示
    Raw(String),
    /// 没有题号时用下标指代
    Index(usize),
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordRef::Number(n) => write!(f, "{}", n),
            RecordRef::Raw(s) => write!(f, "{}", s),
            RecordRef::Index(i) => write!(f, "(at index {})", i),
        }
    }
}

/// 一条校验结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    pub question_id: Option<QuestionId>,
    pub record: Option<RecordRef>,
    pub field: Option<String>,
    pub message: String,
}

impl Finding {
    /// 与具体记录绑定的硬错误
    pub fn error(record: RecordRef, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            question_id: None,
            record: Some(record),
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// 不针对任何记录的全局结果
    pub fn general(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            question_id: None,
            record: None,
            field: None,
            message: message.into(),
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Error
    }

    fn with_id(mut self, id: Option<QuestionId>) -> Self {
        self.question_id = id;
        self
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut prefix = String::new();
        if let Some(record) = &self.record {
            prefix.push_str(&format!("Q#{}", record));
        }
        if let Some(field) = &self.field {
            prefix.push_str(&format!(" (Field: {})", field));
        }
        if prefix.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", prefix.trim_start(), self.message)
        }
    }
}

/// 是否存在阻断性的结果
pub fn has_blocking(findings: &[Finding]) -> bool {
    findings.iter().any(Finding::is_blocking)
}

fn record_ref(record: &RawRecord, index: usize) -> RecordRef {
    match record.value("question_number") {
        None | Some(JsonValue::Null) => RecordRef::Index(index),
        Some(value) => match positive_integer(value) {
            Some(n) => RecordRef::Number(n),
            None => RecordRef::Raw(match value {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            }),
        },
    }
}

fn is_blank_string(value: Option<&JsonValue>) -> bool {
    !matches!(value, Some(JsonValue::String(s)) if !s.trim().is_empty())
}

/// 校验单条记录
///
/// `index` 只在记录没有题号时用于指代。所有检查都会执行，不会短路。
pub fn validate_record(record: &RawRecord, index: usize, policy: KnownKeys) -> Vec<Finding> {
    let at = record_ref(record, index);
    let mut findings = Vec::new();

    if record.question_number().is_none() {
        let message = match record.value("question_number") {
            Some(value) if exceeds_number_range(value) => format!(
                "'question_number' is out of range. Must be at most {}.",
                u32::MAX
            ),
            _ => "'question_number' must be a positive integer.".to_string(),
        };
        findings.push(Finding::error(at.clone(), "question_number", message));
    }

    if is_blank_string(record.value("question_text")) {
        findings.push(Finding::error(
            at.clone(),
            "question_text",
            "'question_text' must be a non-empty string.",
        ));
    }

    let option_keys = check_options(record, &at, &mut findings);
    check_correct_answer(record, option_keys.as_deref(), &at, &mut findings);
    check_optional_fields(record, &at, &mut findings);

    let mut seen = HashSet::new();
    for (name, _) in record.fields() {
        if !seen.insert(name) {
            findings.push(Finding::error(
                at.clone(),
                name,
                format!("Field '{}' appears more than once.", name),
            ));
        } else if !policy.allows(name) {
            findings.push(Finding::error(
                at.clone(),
                name,
                format!("Unrecognized field '{}' found.", name),
            ));
        }
    }

    findings
}

// 返回选项键（options 是对象时），供正确答案检查使用
fn check_options(record: &RawRecord, at: &RecordRef, findings: &mut Vec<Finding>) -> Option<Vec<String>> {
    let entries = match record.get("options") {
        Some(RawField::Options(RawOptions::Entries(entries))) => &entries.0,
        _ => {
            findings.push(Finding::error(
                at.clone(),
                "options",
                "'options' must be an object with at least two key-value pairs.",
            ));
            return None;
        }
    };

    if entries.len() < 2 {
        findings.push(Finding::error(
            at.clone(),
            "options",
            "'options' must be an object with at least two key-value pairs.",
        ));
    } else {
        for (key, value) in entries {
            if is_blank_string(Some(value)) {
                findings.push(Finding::error(
                    at.clone(),
                    format!("options.{}", key),
                    format!("Option '{}' value must be a non-empty string.", key),
                ));
            }
            if key.trim().is_empty() {
                findings.push(Finding::error(at.clone(), "options", "Option keys cannot be empty."));
            }
        }
        let unique: HashSet<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        if unique.len() != entries.len() {
            findings.push(Finding::error(
                at.clone(),
                "options",
                "Option keys must be unique within a question.",
            ));
        }
    }

    Some(entries.iter().map(|(k, _)| k.clone()).collect())
}

fn check_correct_answer(
    record: &RawRecord,
    option_keys: Option<&[String]>,
    at: &RecordRef,
    findings: &mut Vec<Finding>,
) {
    let answer = match record.value("correct_answer") {
        Some(JsonValue::String(s)) if !s.trim().is_empty() => s,
        _ => {
            findings.push(Finding::error(
                at.clone(),
                "correct_answer",
                "'correct_answer' must be a non-empty string.",
            ));
            return;
        }
    };

    let Some(keys) = option_keys else {
        findings.push(Finding::error(
            at.clone(),
            "correct_answer",
            format!(
                "'correct_answer' (\"{}\") specified, but no valid 'options' object found.",
                answer
            ),
        ));
        return;
    };

    let wanted = answer.to_lowercase();
    if !keys.iter().any(|k| k.to_lowercase() == wanted) {
        findings.push(Finding::error(
            at.clone(),
            "correct_answer",
            format!(
                "'correct_answer' (\"{}\") must match an existing option key (case-insensitive). Available options: {}.",
                answer,
                keys.join(", ")
            ),
        ));
    }
}

fn check_optional_fields(record: &RawRecord, at: &RecordRef, findings: &mut Vec<Finding>) {
    for name in ["subject", "topic", "section_id"] {
        match record.value(name) {
            None | Some(JsonValue::Null) => {}
            Some(JsonValue::String(s)) if !s.trim().is_empty() => {}
            Some(_) => findings.push(Finding::error(
                at.clone(),
                name,
                format!("'{}', if present and not null, must be a non-empty string.", name),
            )),
        }
    }

    match record.value("explanation") {
        None | Some(JsonValue::Null) | Some(JsonValue::String(_)) => {}
        Some(_) => findings.push(Finding::error(
            at.clone(),
            "explanation",
            "'explanation', if present and not null, must be a string.",
        )),
    }

    match record.value("difficulty") {
        None | Some(JsonValue::Null) => {}
        Some(JsonValue::String(s)) if Difficulty::from_str(s).is_some() => {}
        Some(_) => findings.push(Finding::error(
            at.clone(),
            "difficulty",
            "'difficulty', if present and not null, must be 'Easy', 'Medium', 'Hard', or an empty string.",
        )),
    }
}

/// 题号连续性检查：排序后找到第一个间隔 > 1 的位置，最多报一次
fn check_sequential(numbers: &[u32]) -> Option<Finding> {
    let mut sorted = numbers.to_vec();
    sorted.sort_unstable();
    sorted.windows(2).find(|w| w[1] - w[0] > 1).map(|w| {
        Finding::general(
            Severity::Warning,
            format!(
                "Question numbers are not strictly sequential (e.g., gap detected after Q#{}). Please ensure numbers are consecutive.",
                w[0]
            ),
        )
    })
}

fn validate_items<'a>(
    items: impl Iterator<Item = (Option<QuestionId>, &'a RawItem)> + Clone,
    policy: KnownKeys,
) -> Vec<Finding> {
    let mut findings = Vec::new();

    let numbers: Vec<u32> = items
        .clone()
        .filter_map(|(_, item)| item.as_record().and_then(RawRecord::question_number))
        .collect();
    findings.extend(check_sequential(&numbers));

    let mut encountered = HashSet::new();
    for (index, (id, item)) in items.enumerate() {
        let record = match item {
            RawItem::Record(record) => record,
            RawItem::NotObject(_) => {
                findings.push(
                    Finding::error(
                        RecordRef::Index(index),
                        "question",
                        "Each item in the array must be a question object.",
                    )
                    .with_id(id),
                );
                continue;
            }
        };

        findings.extend(
            validate_record(record, index, policy)
                .into_iter()
                .map(|f| f.with_id(id)),
        );

        if let Some(n) = record.question_number() {
            if !encountered.insert(n) {
                findings.push(
                    Finding::error(
                        RecordRef::Number(n),
                        "question_number",
                        format!(
                            "'question_number' is duplicated. Must be unique across all questions. (Occurred at index {})",
                            index
                        ),
                    )
                    .with_id(id),
                );
            }
        }
    }

    findings
}

/// 校验原始记录集（文本同步、导入使用）
pub fn validate_record_set(items: &[RawItem]) -> Vec<Finding> {
    validate_items(items.iter().map(|item| (None, item)), KnownKeys::Wire)
}

/// 校验结构化题目集（表单视图使用），结果带上题目 id
pub fn validate_questions(questions: &[Question]) -> Vec<Finding> {
    let items: Vec<(QuestionId, RawItem)> = questions
        .iter()
        .map(|q| (q.id, RawItem::Record(RawRecord::from_question(q))))
        .collect();
    validate_items(
        items.iter().map(|(id, item)| (Some(*id), item)),
        KnownKeys::Structured,
    )
}
