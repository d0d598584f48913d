//! 应用生命周期 - 编排层
//!
//! 浏览上下文在整次运行期间只获取一次，运行结束时无条件关闭（包括致命错误）。

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::browser::BrowsingContext;
use crate::config::Config;
use crate::infrastructure::{BrowserDriver, ChromiumDriver};
use crate::models::outcome::RunReport;
use crate::orchestrator::batch_processor::BatchOrchestrator;
use crate::utils::logging;

/// 应用主结构
pub struct App {
    config: Config,
    context: BrowsingContext,
}

impl App {
    /// 初始化应用：获取浏览上下文
    pub async fn initialize(config: Config) -> Result<Self> {
        logging::log_startup(&config);
        let context = BrowsingContext::acquire(&config.browser).await?;
        Ok(Self { config, context })
    }

    /// 运行整个队列并释放浏览器
    pub async fn run(self) -> Result<RunReport> {
        let Self { config, context } = self;
        let driver: Arc<dyn BrowserDriver> = Arc::new(
            ChromiumDriver::new(context.page().clone())
                .with_action_timeout(config.timeouts.action),
        );
        let mut jobs = config.jobs.clone();

        let result = match BatchOrchestrator::from_config(driver.clone(), &config) {
            Ok(mut orchestrator) => orchestrator.run(&mut jobs).await,
            Err(e) => Err(e),
        };

        drop(driver);
        context.close().await;

        match result {
            Ok(report) => {
                logging::print_final_stats(&report, &config.output_log_file);
                match report.write_json(&config.artifacts_dir).await {
                    Ok(path) => info!("📝 运行报告: {}", path.display()),
                    Err(e) => warn!("⚠️ 写入运行报告失败: {:#}", e),
                }
                Ok(report)
            }
            Err(e) => {
                let done = jobs.iter().filter(|j| j.outcome().is_some()).count();
                error!(
                    "❌ 运行因致命错误终止 (已处理 {}/{} 个任务): {}",
                    done,
                    jobs.len(),
                    e
                );
                for outcome in jobs.iter().filter_map(|j| j.outcome()) {
                    logging::log_job_outcome(outcome);
                }
                Err(e.into())
            }
        }
    }
}
