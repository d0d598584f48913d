//! 任务模型
//!
//! 一个任务 = 一条目标记录 + 要在该记录上提交的字段值

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::models::outcome::{Outcome, OutcomeStatus};

/// 目标记录引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRef {
    /// 原始引用（通常是记录详情页地址，仅用于识别，不会被直接打开）
    pub reference: String,
    /// 嵌在记录地址中的稳定标识，用于在列表中找链接并确认到达
    pub path_token: String,
    /// 列表页找不到链接时用于搜索缩小范围的文本
    pub search_text: Option<String>,
}

impl TargetRef {
    pub fn new(reference: impl Into<String>) -> Self {
        let reference = reference.into();
        let path_token = derive_path_token(&reference);
        Self {
            reference,
            path_token,
            search_text: None,
        }
    }

    pub fn with_path_token(mut self, token: impl Into<String>) -> Self {
        self.path_token = token.into();
        self
    }

    pub fn with_search_text(mut self, text: impl Into<String>) -> Self {
        self.search_text = Some(text.into());
        self
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reference)
    }
}

/// 从记录引用推导路径标识
///
/// 地址形式取去掉末尾斜杠的 path（例如 `/manager/project/details/42`），
/// 其它形式直接视为标识本身。
pub fn derive_path_token(reference: &str) -> String {
    let trimmed = reference.trim();
    match Url::parse(trimmed) {
        Ok(url) => {
            let path = url.path().trim_end_matches('/');
            if path.is_empty() {
                trimmed.to_string()
            } else {
                path.to_string()
            }
        }
        Err(_) => trimmed.trim_end_matches('/').to_string(),
    }
}

/// 地址中是否出现完整的路径标识（其后只能是结尾、`/`、`?` 或 `#`）
///
/// `/project/4` 不会误匹配 `/project/42`。
pub fn url_carries_token(url: &str, token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    url.match_indices(token).any(|(at, _)| {
        matches!(
            url[at + token.len()..].chars().next(),
            None | Some('/') | Some('?') | Some('#')
        )
    })
}

/// 字段值：单值或有序的多值
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    One(String),
    Many(Vec<String>),
}

impl FieldValue {
    /// 所有标签（单值时只有一个）
    pub fn labels(&self) -> Vec<&str> {
        match self {
            FieldValue::One(v) => vec![v.as_str()],
            FieldValue::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    /// 作为单值使用（多值时以逗号连接）
    pub fn as_scalar(&self) -> String {
        match self {
            FieldValue::One(v) => v.clone(),
            FieldValue::Many(vs) => vs.join(", "),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::One(v) => v.trim().is_empty(),
            FieldValue::Many(vs) => vs.iter().all(|v| v.trim().is_empty()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::One(v.to_string())
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(vs: Vec<&str>) -> Self {
        FieldValue::Many(vs.into_iter().map(str::to_string).collect())
    }
}

// 工作流文件里单值可能写成字符串、整数或布尔（例如工位号 0）
impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{SeqAccess, Visitor};

        struct FieldValueVisitor;

        impl<'de> Visitor<'de> for FieldValueVisitor {
            type Value = FieldValue;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string, number, boolean or list of strings")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(FieldValue::One(value.to_string()))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(FieldValue::One(value.to_string()))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(FieldValue::One(value.to_string()))
            }

            fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(FieldValue::One(value.to_string()))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut values = Vec::new();
                while let Some(v) = seq.next_element::<String>()? {
                    values.push(v);
                }
                Ok(FieldValue::Many(values))
            }
        }

        deserializer.deserialize_any(FieldValueVisitor)
    }
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed,
}

/// 一个批处理任务
///
/// 处理过程中只读；只有在得到最终结果时才通过 `attach_outcome` 修改。
#[derive(Debug, Clone)]
pub struct Job {
    /// 队列中的位置（从 1 开始）
    pub ordinal: usize,
    pub target: TargetRef,
    pub fields: BTreeMap<String, FieldValue>,
    status: JobStatus,
    outcome: Option<Outcome>,
}

impl Job {
    pub fn new(ordinal: usize, target: TargetRef, fields: BTreeMap<String, FieldValue>) -> Self {
        Self {
            ordinal,
            target,
            fields,
            status: JobStatus::Pending,
            outcome: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// 挂上最终结果；每个任务只能挂一次，重复调用返回 false 且不覆盖
    pub fn attach_outcome(&mut self, outcome: Outcome) -> bool {
        if self.outcome.is_some() {
            return false;
        }
        self.status = match outcome.status {
            OutcomeStatus::Success => JobStatus::Succeeded,
            OutcomeStatus::Failure => JobStatus::Failed,
        };
        self.outcome = Some(outcome);
        true
    }

    /// 取字段值，空白值视为未提供
    pub fn value_of(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field).filter(|v| !v.is_blank())
    }
}
