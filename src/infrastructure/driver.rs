//! 浏览器驱动能力 - 基础设施层
//!
//! 核心流程只依赖这个 trait，不直接接触 chromiumoxide。
//! 每个方法都是一个挂起点，并且都带显式超时。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DriverResult;
use crate::models::strategy::Strategy;

/// 已定位控件的句柄
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    pub id: u64,
    /// 便于日志阅读的描述，例如 `button#login`
    pub description: String,
}

impl ElementHandle {
    pub fn new(id: u64, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
        }
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(#{})", self.description, self.id)
    }
}

/// 会话 cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieEntry {
    pub name: String,
    pub value: String,
    pub domain: String,
}

impl CookieEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
        }
    }
}

/// 被拦截的提交请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl SubmissionRequest {
    /// 不区分大小写地读取请求头
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 设置请求头（已存在则覆盖）
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name.to_string(), value)),
        }
    }
}

/// 请求改写函数：返回 `Some` 表示用改写后的请求继续，`None` 表示原样放行
pub type SubmissionRewriter =
    Arc<dyn Fn(&SubmissionRequest) -> Option<SubmissionRequest> + Send + Sync>;

/// 页面快照，两部分各自尽力获取
#[derive(Debug, Clone, Default)]
pub struct PageCapture {
    pub markup: Option<String>,
    pub image_png: Option<Vec<u8>>,
}

/// 浏览器驱动
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> DriverResult<()>;

    async fn current_url(&self) -> DriverResult<String>;

    /// 按单个策略定位第一个可见控件，在 `timeout` 内轮询
    async fn locate(&self, strategy: &Strategy, timeout: Duration) -> DriverResult<ElementHandle>;

    async fn click(&self, element: &ElementHandle) -> DriverResult<()>;

    async fn fill(&self, element: &ElementHandle, value: &str) -> DriverResult<()>;

    async fn press_key(&self, element: &ElementHandle, key: &str) -> DriverResult<()>;

    /// 在选择控件上一次性选中全部标签；控件不支持时返回 `ActionRejected`
    async fn select_options(&self, element: &ElementHandle, labels: &[String])
        -> DriverResult<()>;

    /// 在原生多选框上追加选中一个标签，不影响已选项
    async fn add_selected_option(&self, element: &ElementHandle, label: &str) -> DriverResult<()>;

    async fn is_checked(&self, element: &ElementHandle) -> DriverResult<bool>;

    /// 读取控件当前呈现的值（选择框为选中项文本）
    async fn read_value(&self, element: &ElementHandle) -> DriverResult<String>;

    /// 确保表单内存在指定名称的隐藏字段并写入值；返回是否新建
    async fn set_hidden_field(
        &self,
        form: &ElementHandle,
        name: &str,
        value: &str,
    ) -> DriverResult<bool>;

    async fn wait_for_visible(&self, strategy: &Strategy, timeout: Duration) -> DriverResult<()>;

    async fn wait_for_network_settle(&self, timeout: Duration) -> DriverResult<()>;

    async fn read_cookies(&self) -> DriverResult<Vec<CookieEntry>>;

    /// 拦截匹配 `url_pattern`（通配符）的请求并交给 `rewriter` 改写
    async fn intercept_submission(
        &self,
        url_pattern: &str,
        rewriter: SubmissionRewriter,
    ) -> DriverResult<()>;

    async fn capture_page(&self) -> PageCapture;
}
