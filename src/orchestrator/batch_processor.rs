//! 批量任务处理器 - 编排层
//!
//! ## 职责
//!
//! 1. **登录一次**：整个队列共用一个会话
//! 2. **顺序处理**：同一会话同一时间只能驱动一个任务，不做并发
//! 3. **故障隔离**：任务级错误在这里被捕获，保存快照后记入该任务的结果
//! 4. **致命错误**：登录失败、会话循环失效直接终止整个运行
//!
//! 每个任务恰好得到一个 `Outcome`，失败的任务不会在本次运行中重试。

use std::sync::Arc;

use chrono::Local;
use tracing::{error, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::BrowserDriver;
use crate::models::job::Job;
use crate::models::outcome::{Outcome, RunReport};
use crate::services::{CsrfBridge, DiagnosticCapture, LocatorResolver, SessionManager};
use crate::utils::logging;
use crate::workflow::{JobCtx, JobFlow};

/// 批量任务处理器
pub struct BatchOrchestrator {
    session: SessionManager,
    flow: JobFlow,
    diagnostics: DiagnosticCapture,
}

impl BatchOrchestrator {
    pub fn new(session: SessionManager, flow: JobFlow, diagnostics: DiagnosticCapture) -> Self {
        Self {
            session,
            flow,
            diagnostics,
        }
    }

    /// 由配置组装全部能力，驱动可以是真实浏览器也可以是测试替身
    pub fn from_config(driver: Arc<dyn BrowserDriver>, config: &Config) -> AppResult<Self> {
        let resolver = LocatorResolver::new(driver.clone(), config.timeouts.attempt);
        let diagnostics = DiagnosticCapture::new(driver, config.artifacts_dir.clone());
        let csrf = CsrfBridge::new(resolver.clone(), config.csrf.clone());
        let session = SessionManager::new(
            resolver.clone(),
            csrf,
            diagnostics.clone(),
            config.entry_url.clone(),
            config.entry_pattern.as_deref(),
            config.credentials.clone(),
            config.workflow.login.clone(),
            config.timeouts.settle,
        )?;
        let flow = JobFlow::new(resolver, config);
        Ok(Self::new(session, flow, diagnostics))
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// 处理整个队列
    ///
    /// 任务级错误不会从这里逃出；返回 `Err` 只意味着致命错误，
    /// 此时已处理任务的结果仍挂在各自的 `Job` 上。
    pub async fn run(&mut self, jobs: &mut [Job]) -> AppResult<RunReport> {
        let started_at = Local::now();
        self.session.authenticate().await?;

        let total = jobs.len();
        for job in jobs.iter_mut() {
            logging::log_job_start(job.ordinal, total, &job.target.reference);
            let mut ctx = JobCtx::new(job, total);

            let result = self.flow.run(&mut self.session, job, &mut ctx).await;
            let outcome = match result {
                Ok(()) => Outcome::success(job.ordinal, job.target.reference.clone(), ctx.warnings),
                Err(e) => {
                    error!("{} ❌ {}", ctx.tag(), e);
                    let artifacts = self.diagnostics.capture(&ctx.capture_label(e.kind())).await;
                    let outcome = Outcome::failure(
                        job.ordinal,
                        job.target.reference.clone(),
                        &e,
                        artifacts,
                        ctx.warnings,
                    );
                    if e.is_fatal() {
                        logging::log_job_outcome(&outcome);
                        job.attach_outcome(outcome);
                        error!("❌ 致命错误，终止剩余 {} 个任务", total.saturating_sub(job.ordinal));
                        return Err(e);
                    }
                    outcome
                }
            };

            logging::log_job_outcome(&outcome);
            if !job.attach_outcome(outcome) {
                warn!("[任务 {}] 结果已存在，忽略重复结果", job.ordinal);
            }
        }

        let outcomes = jobs.iter().filter_map(|j| j.outcome().cloned()).collect();
        Ok(RunReport::new(started_at, outcomes))
    }
}
