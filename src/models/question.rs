//! 题目数据模型
//!
//! 结构化的题目记录（表单编辑用）以及它在 JSON 文本中的字段布局。
//! 字段声明顺序即序列化顺序，不要随意调整。

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// 进程内唯一的题目 ID
///
/// 只用于界面标识和查找，不出现在导出的 JSON 中，用户不可编辑。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuestionId(Uuid);

impl QuestionId {
    /// 生成新的随机 ID（UUID v4）
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QuestionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 难度
///
/// `""` 在文本中表示"未指定"，与 `null` 语义相同，但保留原样以便无损往返。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    #[serde(rename = "")]
    NotSpecified,
}

impl Difficulty {
    /// 文本中的取值
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
            Difficulty::NotSpecified => "",
        }
    }

    /// 从文本取值解析（精确匹配，区分大小写）
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Easy" => Some(Difficulty::Easy),
            "Medium" => Some(Difficulty::Medium),
            "Hard" => Some(Difficulty::Hard),
            "" => Some(Difficulty::NotSpecified),
            _ => None,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 选项表：选项键 → 选项文本
///
/// 按插入顺序保存。反序列化时保留重复键，交给校验器报告，
/// 而不是像普通 map 那样静默保留最后一个。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionMap {
    entries: Vec<(String, String)>,
}

impl OptionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 两个空选项 `a`、`b`（新建题目的默认值）
    pub fn two_empty() -> Self {
        Self::from_pairs([("a", ""), ("b", "")])
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn first_key(&self) -> Option<&str> {
        self.entries.first().map(|(k, _)| k.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// 大小写不敏感地查找键，返回原始写法
    pub fn find_key_ignore_case(&self, key: &str) -> Option<&str> {
        let wanted = key.to_lowercase();
        self.keys().find(|k| k.to_lowercase() == wanted)
    }

    /// 设置选项文本：键已存在则原位替换，否则追加到末尾
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// 删除选项，返回原来的文本
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// 原位改名（保持位置和文本）。旧键不存在时返回 false。
    ///
    /// 不检查新键是否冲突，冲突判断由调用方负责。
    pub fn rename(&mut self, old: &str, new: impl Into<String>) -> bool {
        match self.entries.iter_mut().find(|(k, _)| k == old) {
            Some(entry) => {
                entry.0 = new.into();
                true
            }
            None => false,
        }
    }

    /// 是否存在重复键（区分大小写）
    pub fn has_duplicate_keys(&self) -> bool {
        self.entries
            .iter()
            .enumerate()
            .any(|(i, (k, _))| self.entries[..i].iter().any(|(prev, _)| prev == k))
    }
}

impl Serialize for OptionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OptionMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OptionMapVisitor;

        impl<'de> Visitor<'de> for OptionMapVisitor {
            type Value = OptionMap;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an object mapping option keys to option text")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(4));
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    entries.push((k, v));
                }
                Ok(OptionMap { entries })
            }
        }

        deserializer.deserialize_map(OptionMapVisitor)
    }
}

/// 一道题目
///
/// `id` 不参与序列化；可选字段为 `None` 时输出 `null`，缺省与 `null` 等价。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(skip)]
    pub id: QuestionId,

    #[serde(deserialize_with = "deserialize_question_number")]
    pub question_number: u32,
    pub question_text: String,
    pub options: OptionMap,
    pub correct_answer: String,

    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub section_id: Option<String>,
}

impl Question {
    /// 只比较会出现在文本里的字段（忽略 `id`）
    pub fn same_content(&self, other: &Question) -> bool {
        self.question_number == other.question_number
            && self.question_text == other.question_text
            && self.options == other.options
            && self.correct_answer == other.correct_answer
            && self.subject == other.subject
            && self.topic == other.topic
            && self.explanation == other.explanation
            && self.difficulty == other.difficulty
            && self.section_id == other.section_id
    }

    /// 正确答案实际对应的选项键（大小写不敏感）
    pub fn resolved_answer(&self) -> Option<&str> {
        self.options.find_key_ignore_case(&self.correct_answer)
    }
}

/// 部分填写的题目，用于新建、模板与批量导入
///
/// 未填写的字段由仓库按默认规则补齐。
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct QuestionDraft {
    pub question_number: Option<u32>,
    pub question_text: Option<String>,
    pub options: Option<OptionMap>,
    pub correct_answer: Option<String>,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub explanation: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub section_id: Option<String>,
}

impl QuestionDraft {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            question_text: Some(text.into()),
            ..Default::default()
        }
    }
}

impl From<&Question> for QuestionDraft {
    fn from(q: &Question) -> Self {
        Self {
            question_number: Some(q.question_number),
            question_text: Some(q.question_text.clone()),
            options: Some(q.options.clone()),
            correct_answer: Some(q.correct_answer.clone()),
            subject: q.subject.clone(),
            topic: q.topic.clone(),
            explanation: q.explanation.clone(),
            difficulty: q.difficulty,
            section_id: q.section_id.clone(),
        }
    }
}

// 题号既可能写成整数，也可能写成 1.0 这样的整值浮点数
fn deserialize_question_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    struct NumberVisitor;

    impl<'de> Visitor<'de> for NumberVisitor {
        type Value = u32;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a positive integer question number")
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            u32::try_from(value)
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| E::custom(format!("question_number out of range: {}", value)))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            u64::try_from(value)
                .map_err(|_| E::custom(format!("question_number must be positive: {}", value)))
                .and_then(|v| self.visit_u64(v))
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            if value.fract() != 0.0 || value < 1.0 || value > f64::from(u32::MAX) {
                return Err(E::custom(format!("question_number must be a positive integer: {}", value)));
            }
            Ok(value as u32)
        }
    }

    deserializer.deserialize_any(NumberVisitor)
}
