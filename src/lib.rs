//! # Call Log Submit
//!
//! 在需要登录的 Web 管理后台中，按队列为多条记录批量提交通话记录表单
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露驱动能力
//! - `BrowserDriver` - 驱动能力接口，核心逻辑只依赖它
//! - `ChromiumDriver` - 基于 CDP 的实现，唯一的 page owner
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `LocatorResolver` - 按候选策略顺序定位控件
//! - `SessionManager` - 登录与会话检查点（两次失效即终止）
//! - `CsrfBridge` - 双重提交令牌（隐藏字段 + 请求体）
//! - `NavigationController` - 菜单 → 列表 → 记录
//! - `FormFillEngine` - 单选 / 多选 / 文本字段填写
//! - `DiagnosticCapture` - 失败快照（HTML + 截图）
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个任务"的完整处理流程
//! - `JobCtx` - 上下文封装（序号 + 软警告）
//! - `JobFlow` - 流程编排（导航 → 打开表单 → 填写 → 提交 → 确认）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 登录一次，逐个处理任务并隔离故障
//! - `orchestrator/app` - 浏览器生命周期与运行报告
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::BrowsingContext;
pub use config::Config;
pub use error::{AppError, AppResult, ConfigError, FailureKind, ResolutionFailure};
pub use infrastructure::{BrowserDriver, ChromiumDriver};
pub use models::{Job, Outcome, RunReport, Strategy};
pub use orchestrator::{App, BatchOrchestrator};
pub use workflow::{JobCtx, JobFlow};
