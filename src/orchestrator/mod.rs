//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和资源调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用生命周期
//! - 获取浏览上下文（启动或连接浏览器）
//! - 构建批处理器并运行
//! - 无论成败都关闭浏览上下文
//! - 输出统计、写入运行报告
//!
//! ### `batch_processor` - 批量任务处理器
//! - 登录一次
//! - 按顺序处理任务队列，每个任务一个隔离边界
//! - 失败时保存诊断快照并记录结果，继续下一个任务
//!
//! ## 层次关系
//!
//! ```text
//! app (BrowsingContext 生命周期)
//!     ↓
//! batch_processor (处理 Vec<Job>)
//!     ↓
//! workflow::JobFlow (处理单个 Job)
//!     ↓
//! services (能力层：session / navigation / form_fill / csrf / diagnostics)
//!     ↓
//! infrastructure (基础设施：BrowserDriver)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：app 管资源，batch_processor 管队列
//! 2. **资源隔离**：只有编排层持有 Browser
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure
//! 4. **无业务逻辑**：只做调度和统计，不做具体业务判断

pub mod app;
pub mod batch_processor;

// 重新导出主要类型
pub use app::App;
pub use batch_processor::BatchOrchestrator;
