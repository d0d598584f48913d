use std::process::ExitCode;

use anyhow::Result;
use call_log_submit::utils::logging;
use call_log_submit::{App, Config, RunReport};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    // 配置错误在任何浏览器操作之前终止
    let config = match Config::from_env().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ 配置错误: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // 初始化日志
    if let Err(e) = logging::init(config.verbose_logging, &config.output_log_file) {
        eprintln!("⚠️ 日志初始化失败: {:#}", e);
    }

    match run(config).await {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            error!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<RunReport> {
    App::initialize(config).await?.run().await
}
