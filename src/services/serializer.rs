//! 文本序列化服务 - 业务能力层
//!
//! 结构化题目 ↔ 规范 JSON 文本。只负责编码/解码，不分配 id、不做校验。

use crate::models::question::{Question, QuestionId};
use crate::models::raw::{RawItem, RawRecord};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextFormat {
    /// 两空格缩进
    #[default]
    Pretty,
    /// 单行
    Compact,
}

impl TextFormat {
    pub fn from_pretty(pretty: bool) -> Self {
        if pretty {
            TextFormat::Pretty
        } else {
            TextFormat::Compact
        }
    }
}

/// 文本解析失败
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("JSON content cannot be empty. It should be an array, e.g., '[]'.")]
    Empty,

    #[error("Invalid JSON syntax: {0}. (Check for missing/extra commas, quotes, or brackets)")]
    Syntax(String),

    #[error("Invalid format: Top level of JSON must be an array of question objects.")]
    NotArray,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDocument {
    Array(Vec<RawItem>),
    Other(JsonValue),
}

/// 题目集 → JSON 文本
///
/// 不输出 `id`；字段顺序固定；未设置的可选字段输出为 `null`。
pub fn to_text(questions: &[Question], format: TextFormat) -> String {
    let result = match format {
        TextFormat::Pretty => serde_json::to_string_pretty(questions),
        TextFormat::Compact => serde_json::to_string(questions),
    };
    // 字段全是字符串/数字/有序 map，编码不会失败
    result.unwrap_or_else(|e| {
        tracing::error!("序列化题目失败: {}", e);
        String::from("[]")
    })
}

/// JSON 文本 → 原始记录
///
/// 空文本、语法错误、顶层不是数组三种失败互相区分。
pub fn from_text(text: &str) -> Result<Vec<RawItem>, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    match serde_json::from_str::<RawDocument>(text) {
        Ok(RawDocument::Array(items)) => Ok(items),
        Ok(RawDocument::Other(_)) => Err(ParseError::NotArray),
        Err(e) => Err(ParseError::Syntax(e.to_string())),
    }
}

/// 已通过校验的原始记录 → 结构化题目（分配新的 id）
pub fn into_question(record: &RawRecord) -> Result<Question, serde_json::Error> {
    let mut question: Question = serde_json::from_value(record.to_value())?;
    question.id = QuestionId::new();
    Ok(question)
}
