//! 任务处理流程 - 流程层
//!
//! 核心职责：定义"一个任务"的完整处理流程
//!
//! 流程顺序：
//! 1. 导航到目标记录（菜单 → 列表 → 记录）
//! 2. 打开表单并等待就绪
//! 3. 按字段填写
//! 4. 提交 → 等待网络空闲 → 等待成功提示（尽力）

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::models::job::Job;
use crate::models::strategy::Strategy;
use crate::services::{FormFillEngine, LocatorResolver, NavigationController, SessionManager};
use crate::workflow::job_ctx::JobCtx;

/// 任务处理流程
///
/// - 编排单个任务的完整流程
/// - 不持有浏览器资源，只依赖业务能力（services）
/// - 会话状态由调用方以 `&mut SessionManager` 传入
pub struct JobFlow {
    resolver: LocatorResolver,
    navigation: NavigationController,
    form: FormFillEngine,
    settle_timeout: Duration,
    confirm_timeout: Duration,
    verbose_logging: bool,
}

impl JobFlow {
    pub fn new(resolver: LocatorResolver, config: &Config) -> Self {
        let workflow = &config.workflow;
        Self {
            navigation: NavigationController::new(
                resolver.clone(),
                workflow.navigation.clone(),
                config.timeouts.settle,
            ),
            form: FormFillEngine::new(
                resolver.clone(),
                workflow.form.clone(),
                config.timeouts.confirm,
            ),
            resolver,
            settle_timeout: config.timeouts.settle,
            confirm_timeout: config.timeouts.confirm,
            verbose_logging: config.verbose_logging,
        }
    }

    pub async fn run(
        &self,
        session: &mut SessionManager,
        job: &Job,
        ctx: &mut JobCtx,
    ) -> AppResult<()> {
        let tag = ctx.tag();
        info!("{} 目标: {}", tag, job.target);
        if self.verbose_logging {
            self.log_fields(&tag, job);
        }

        // ========== 1. 导航 ==========
        self.navigation.reach(session, &job.target).await?;

        // ========== 2. 打开表单 ==========
        let spec = self.form.spec();
        if !spec.open.is_empty() {
            self.resolver.click("打开表单按钮", &spec.open).await?;
            info!("{} ✓ 已打开表单", tag);
        }
        if !spec.ready.is_empty() {
            if let Err(e) = self.resolver.resolve("表单就绪标志", &spec.ready).await {
                warn!("{} ⚠️ 未观察到表单就绪标志，继续填写: {}", tag, e);
            }
        }

        // ========== 3. 填写 ==========
        let report = self.form.fill(&job.fields).await?;
        info!(
            "{} 字段: 已填 {} 个，跳过 {} 个",
            tag,
            report.applied.len(),
            report.skipped.len()
        );
        ctx.warnings.extend(report.warnings);

        // ========== 4. 提交 ==========
        info!("{} 📤 提交表单...", tag);
        self.resolver.click("提交按钮", &spec.submit).await?;

        if let Err(e) = self
            .resolver
            .driver()
            .wait_for_network_settle(self.settle_timeout)
            .await
        {
            warn!("{} ⚠️ 提交后网络未在限时内空闲: {}", tag, e);
        }

        if let Some(selector) = &spec.confirm {
            let confirm = Strategy::css(selector.clone());
            match self
                .resolver
                .driver()
                .wait_for_visible(&confirm, self.confirm_timeout)
                .await
            {
                Ok(()) => info!("{} ✓ 已看到提交成功提示", tag),
                Err(e) => {
                    let message = format!("未观察到提交成功提示 {}: {}", selector, e);
                    warn!("{} ⚠️ {}", tag, message);
                    ctx.warnings.push(message);
                }
            }
        }

        info!("{} ✓ 任务完成", tag);
        Ok(())
    }

    // ========== 日志辅助方法 ==========

    fn log_fields(&self, tag: &str, job: &Job) {
        for (name, value) in &job.fields {
            debug!(
                "{}   {} = {}",
                tag,
                name,
                crate::utils::logging::truncate_text(&value.as_scalar(), 60)
            );
        }
    }
}
