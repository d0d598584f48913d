//! 错误类型
//!
//! 区分两类错误：
//! - 致命错误（配置、登录、会话循环失效）：终止整个运行
//! - 任务级错误（定位失败、导航不匹配或中断、驱动错误）：只记录到当前任务的 Outcome

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误（缺少必填输入等），在任何会话操作之前终止
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 登录失败（凭据被拒绝或找不到提交按钮）
    #[error("登录失败: {reason}")]
    Authentication { reason: String },

    /// 重新登录后仍然被踢回登录页
    #[error("会话连续两次失效 (检查点: {label})，终止运行")]
    SessionInvalidationLoop { label: String },

    /// 所有候选定位策略均失败
    #[error(transparent)]
    Resolution(#[from] ResolutionFailure),

    /// 到达了某个页面，但不是目标记录
    #[error("导航不匹配: 期望地址包含 '{expected_token}'，实际为 {actual_url}")]
    NavigationMismatch {
        expected_token: String,
        actual_url: String,
    },

    /// 导航途中反复被踢回登录页，重新登录后没有余下的轮次
    #[error("导航到 '{expected_token}' 途中重新登录 {reauths} 次，仍未到达记录")]
    NavigationInterrupted {
        expected_token: String,
        reauths: usize,
    },

    /// 浏览器驱动错误
    #[error("浏览器错误: {0}")]
    Driver(#[from] DriverError),

    /// 文件读写错误
    #[error("文件错误: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// 是否为致命错误（需要终止整个批次）
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Config(_)
                | AppError::Authentication { .. }
                | AppError::SessionInvalidationLoop { .. }
        )
    }

    /// 错误分类标签，写入任务结果用于分诊
    pub fn kind(&self) -> FailureKind {
        match self {
            AppError::Config(_) => FailureKind::Configuration,
            AppError::Authentication { .. } => FailureKind::Authentication,
            AppError::SessionInvalidationLoop { .. } => FailureKind::SessionInvalidationLoop,
            AppError::Resolution(_) => FailureKind::Resolution,
            AppError::NavigationMismatch { .. } => FailureKind::NavigationMismatch,
            AppError::NavigationInterrupted { .. } => FailureKind::NavigationInterrupted,
            AppError::Driver(_) => FailureKind::Driver,
            AppError::Io(_) => FailureKind::Io,
        }
    }

    pub fn authentication(reason: impl Into<String>) -> Self {
        AppError::Authentication {
            reason: reason.into(),
        }
    }
}

/// 错误种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Configuration,
    Authentication,
    SessionInvalidationLoop,
    Resolution,
    NavigationMismatch,
    NavigationInterrupted,
    Driver,
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Configuration => "configuration",
            FailureKind::Authentication => "authentication",
            FailureKind::SessionInvalidationLoop => "session_invalidation_loop",
            FailureKind::Resolution => "resolution",
            FailureKind::NavigationMismatch => "navigation_mismatch",
            FailureKind::NavigationInterrupted => "navigation_interrupted",
            FailureKind::Driver => "driver",
            FailureKind::Io => "io",
        };
        f.write_str(s)
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量不存在
    #[error("缺少必填环境变量 {var_name}")]
    EnvVarNotFound { var_name: String },

    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },

    /// 工作流文件无效
    #[error("工作流文件无效 ({path}): {reason}")]
    InvalidWorkflow { path: String, reason: String },

    /// 任务队列为空
    #[error("任务队列为空")]
    EmptyQueue,

    /// 任务缺少必填字段
    #[error("任务 {ordinal} 缺少必填字段 '{field}'")]
    MissingRequiredField { ordinal: usize, field: String },
}

/// 浏览器驱动错误
#[derive(Debug, Error)]
pub enum DriverError {
    /// 元素未找到
    #[error("元素未找到: {strategy}")]
    NotFound { strategy: String },

    /// 元素存在但不可见
    #[error("元素不可见: {strategy}")]
    NotVisible { strategy: String },

    /// 元素拒绝了操作（如对非 select 控件执行选择）
    #[error("操作被拒绝: {reason}")]
    ActionRejected { reason: String },

    /// 等待超时
    #[error("等待超时 ({duration:?}): {what}")]
    Timeout { what: String, duration: Duration },

    /// 导航失败
    #[error("导航到 {url} 失败: {reason}")]
    NavigationFailed { url: String, reason: String },

    /// CDP 协议或脚本执行错误
    #[error("CDP 错误: {0}")]
    Protocol(String),
}

impl From<chromiumoxide::error::CdpError> for DriverError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        DriverError::Protocol(err.to_string())
    }
}

impl From<serde_json::Error> for DriverError {
    fn from(err: serde_json::Error) -> Self {
        DriverError::Protocol(format!("JSON 解析失败: {}", err))
    }
}

/// 单次定位尝试的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Matched,
    NotFound,
    NotVisible,
    ActionRejected,
    TimedOut,
    Failed,
}

/// 定位尝试记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub strategy: String,
    pub outcome: AttemptOutcome,
    pub detail: Option<String>,
    pub elapsed_ms: u128,
}

/// 定位失败：列表中的每个策略都已尝试
#[derive(Debug, Clone, Error)]
#[error("无法定位 '{target}'，已尝试 {} 个策略", .attempts.len())]
pub struct ResolutionFailure {
    pub target: String,
    pub attempts: Vec<Attempt>,
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

/// 驱动结果类型
pub type DriverResult<T> = Result<T, DriverError>;
