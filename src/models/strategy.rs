//! 定位策略
//!
//! 一个逻辑控件（"登录按钮"、"Comments 输入框"）可以通过多种方式在页面上找到。
//! 每种方式是一个 `Strategy`，按调用方声明的顺序依次尝试。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 单个定位策略
///
/// 在工作流文件中写作 `{ by = "css", selector = "#login" }` 这种形式。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Strategy {
    /// 部署方提供的覆盖选择器，永远最先尝试
    Override { selector: String },
    /// 按 ARIA 角色 + 可访问名称匹配（名称为不区分大小写的正则）
    Role { role: String, name: String },
    /// 按可见文本匹配；`exact` 为 false 时 `pattern` 是不区分大小写的正则
    Text {
        pattern: String,
        #[serde(default)]
        exact: bool,
    },
    /// 按关联的 `<label>` 文本（精确匹配）
    Label { text: String },
    /// CSS 选择器
    Css { selector: String },
    /// 链接地址包含某个片段的 `<a>`
    Href { contains: String },
    /// 在某个容器内按文本精确匹配，例如列表框中的选项
    TextWithin { container: String, text: String },
}

impl Strategy {
    pub fn css(selector: impl Into<String>) -> Self {
        Strategy::Css {
            selector: selector.into(),
        }
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Strategy::Role {
            role: role.into(),
            name: name.into(),
        }
    }

    /// 正则文本匹配
    pub fn text(pattern: impl Into<String>) -> Self {
        Strategy::Text {
            pattern: pattern.into(),
            exact: false,
        }
    }

    pub fn exact_text(text: impl Into<String>) -> Self {
        Strategy::Text {
            pattern: text.into(),
            exact: true,
        }
    }

    pub fn label(text: impl Into<String>) -> Self {
        Strategy::Label { text: text.into() }
    }

    pub fn href(contains: impl Into<String>) -> Self {
        Strategy::Href {
            contains: contains.into(),
        }
    }

    pub fn within(container: impl Into<String>, text: impl Into<String>) -> Self {
        Strategy::TextWithin {
            container: container.into(),
            text: text.into(),
        }
    }

    pub fn override_selector(selector: impl Into<String>) -> Self {
        Strategy::Override {
            selector: selector.into(),
        }
    }

    pub fn is_override(&self) -> bool {
        matches!(self, Strategy::Override { .. })
    }

    /// 校验策略本身是否合法（正则能否编译、选择器是否为空）
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Strategy::Override { selector } | Strategy::Css { selector } => {
                if selector.trim().is_empty() {
                    return Err("选择器不能为空".to_string());
                }
            }
            Strategy::Role { role, name } => {
                if role.trim().is_empty() {
                    return Err("角色不能为空".to_string());
                }
                regex::Regex::new(name).map_err(|e| format!("角色名称正则无效: {}", e))?;
            }
            Strategy::Text { pattern, exact } => {
                if !exact {
                    regex::Regex::new(pattern).map_err(|e| format!("文本正则无效: {}", e))?;
                }
            }
            Strategy::Label { text } | Strategy::Href { contains: text } => {
                if text.is_empty() {
                    return Err("匹配文本不能为空".to_string());
                }
            }
            Strategy::TextWithin { container, text } => {
                if container.trim().is_empty() || text.is_empty() {
                    return Err("容器与文本都不能为空".to_string());
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Override { selector } => write!(f, "override={}", selector),
            Strategy::Role { role, name } => write!(f, "role={}[name=/{}/i]", role, name),
            Strategy::Text { pattern, exact: true } => write!(f, "text=\"{}\"", pattern),
            Strategy::Text { pattern, .. } => write!(f, "text=/{}/i", pattern),
            Strategy::Label { text } => write!(f, "label=\"{}\"", text),
            Strategy::Css { selector } => write!(f, "css={}", selector),
            Strategy::Href { contains } => write!(f, "href*={}", contains),
            Strategy::TextWithin { container, text } => {
                write!(f, "{} >> text=\"{}\"", container, text)
            }
        }
    }
}

/// 把覆盖策略稳定地移到列表最前，其余保持声明顺序
pub fn with_overrides_first(candidates: &[Strategy]) -> Vec<Strategy> {
    let (overrides, rest): (Vec<&Strategy>, Vec<&Strategy>) =
        candidates.iter().partition(|s| s.is_override());
    overrides.into_iter().chain(rest).cloned().collect()
}
