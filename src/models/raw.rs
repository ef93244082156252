//! 原始记录
//!
//! 从文本解析出来、尚未校验的题目。字段按出现顺序保存，
//! 重复字段与 `options` 中的重复键都原样保留，供校验器报告。

use crate::models::question::Question;
use serde::de::{MapAccess, Visitor};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// `options` 字段的原始形态
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawOptions {
    /// JSON 对象：按顺序保存全部键值（含重复键）
    Entries(OptionEntries),
    /// 其他任何 JSON 值（数组、字符串、null ……）
    Other(JsonValue),
}

/// 有序的选项键值对
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionEntries(pub Vec<(String, JsonValue)>);

impl<'de> Deserialize<'de> for OptionEntries {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = OptionEntries;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a JSON object")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((k, v)) = access.next_entry::<String, JsonValue>()? {
                    entries.push((k, v));
                }
                Ok(OptionEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// 单个字段的原始值
#[derive(Debug, Clone, PartialEq)]
pub enum RawField {
    Options(RawOptions),
    Value(JsonValue),
}

impl RawField {
    /// 转回普通 JSON 值（重复键以最后一个为准）
    pub fn to_value(&self) -> JsonValue {
        match self {
            RawField::Value(v) | RawField::Options(RawOptions::Other(v)) => v.clone(),
            RawField::Options(RawOptions::Entries(entries)) => {
                let mut map = Map::new();
                for (k, v) in &entries.0 {
                    map.insert(k.clone(), v.clone());
                }
                JsonValue::Object(map)
            }
        }
    }

    pub fn as_value(&self) -> Option<&JsonValue> {
        match self {
            RawField::Value(v) => Some(v),
            RawField::Options(_) => None,
        }
    }
}

/// 一条原始题目记录（JSON 对象）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Vec<(String, RawField)>,
}

impl RawRecord {
    pub fn fields(&self) -> impl Iterator<Item = (&str, &RawField)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// 取字段（重复时取第一个）
    pub fn get(&self, name: &str) -> Option<&RawField> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// 取非 options 字段的值
    pub fn value(&self, name: &str) -> Option<&JsonValue> {
        self.get(name).and_then(RawField::as_value)
    }

    /// 合法题号（正整数）；类型不对或缺失时为 None
    pub fn question_number(&self) -> Option<u32> {
        self.value("question_number").and_then(positive_integer)
    }

    /// 转为普通 JSON 对象（用于类型化反序列化）
    pub fn to_value(&self) -> JsonValue {
        let mut map = Map::new();
        for (k, v) in &self.fields {
            map.insert(k.clone(), v.to_value());
        }
        JsonValue::Object(map)
    }

    /// 从结构化题目构造（保留选项中的重复键，不含 id）
    pub fn from_question(question: &Question) -> Self {
        let mut record = RawRecord::default();
        if let Ok(JsonValue::Object(map)) = serde_json::to_value(question) {
            for (k, v) in map {
                if k == "options" {
                    let entries = question
                        .options
                        .iter()
                        .map(|(key, text)| (key.to_string(), JsonValue::String(text.to_string())))
                        .collect();
                    record.fields.push((
                        k,
                        RawField::Options(RawOptions::Entries(OptionEntries(entries))),
                    ));
                } else {
                    record.fields.push((k, RawField::Value(v)));
                }
            }
        }
        record
    }
}

impl<'de> Deserialize<'de> for RawRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = RawRecord;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a question object")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut fields = Vec::new();
                while let Some(key) = access.next_key::<String>()? {
                    let field = if key == "options" {
                        RawField::Options(access.next_value::<RawOptions>()?)
                    } else {
                        RawField::Value(access.next_value::<JsonValue>()?)
                    };
                    fields.push((key, field));
                }
                Ok(RawRecord { fields })
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

/// 顶层数组中的一个元素
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawItem {
    Record(RawRecord),
    /// 不是 JSON 对象的元素
    NotObject(JsonValue),
}

impl RawItem {
    pub fn as_record(&self) -> Option<&RawRecord> {
        match self {
            RawItem::Record(r) => Some(r),
            RawItem::NotObject(_) => None,
        }
    }
}

impl From<RawRecord> for RawItem {
    fn from(record: RawRecord) -> Self {
        RawItem::Record(record)
    }
}

/// 正整数判定：整数或整值浮点数，且在 1..=u32::MAX 之内
pub fn positive_integer(value: &JsonValue) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok().filter(|n| *n > 0);
    }
    match value.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= 1.0 && f <= f64::from(u32::MAX) => Some(f as u32),
        _ => None,
    }
}

/// 是否为超出 u32 范围的正整数
pub fn exceeds_number_range(value: &JsonValue) -> bool {
    if let Some(n) = value.as_u64() {
        return n > u64::from(u32::MAX);
    }
    match value.as_f64() {
        Some(f) => f.fract() == 0.0 && f > f64::from(u32::MAX),
        None => false,
    }
}
