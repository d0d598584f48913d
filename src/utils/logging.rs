/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{BrowserMode, Config};
use crate::models::outcome::{Outcome, RunReport};

/// 初始化日志：同时输出到终端和日志文件
///
/// `RUST_LOG` 优先；未设置时按 `verbose` 选择 debug 或 info。
pub fn init(verbose: bool, log_file_path: &str) -> Result<()> {
    init_log_file(log_file_path)?;
    let file = OpenOptions::new()
        .append(true)
        .open(log_file_path)
        .with_context(|| format!("无法打开日志文件 {}", log_file_path))?;

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("call_log_submit={}", default_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .context("日志系统已初始化")?;
    Ok(())
}

/// 初始化日志文件
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n通话记录批量提交日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息（不输出密码）
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 通话记录批量提交");
    match &config.browser {
        BrowserMode::Launch { headless, .. } => {
            info!("🌐 浏览器: 新启动 ({})", if *headless { "无头" } else { "有界面" })
        }
        BrowserMode::Connect { port } => info!("🌐 浏览器: 连接调试端口 {}", port),
    }
    info!("🔗 登录入口: {}", config.entry_url);
    info!(
        "👤 用户: {} / 密码: {}",
        config.credentials.username,
        mask_secret(&config.credentials.password)
    );
    info!("📋 任务数: {}", config.jobs.len());
    info!("{}", "=".repeat(60));
}

/// 记录任务开始信息
pub fn log_job_start(ordinal: usize, total: usize, target: &str) {
    info!("\n{}", "─".repeat(60));
    info!("📄 开始处理任务 {}/{}: {}", ordinal, total, target);
    info!("{}", "─".repeat(60));
}

/// 记录任务结果
pub fn log_job_outcome(outcome: &Outcome) {
    if outcome.is_success() {
        info!("[任务 {}] ✅ 成功", outcome.ordinal);
        for w in &outcome.warnings {
            warn!("[任务 {}]   ⚠️ {}", outcome.ordinal, w);
        }
    } else {
        error!(
            "[任务 {}] ❌ 失败 ({}): {}",
            outcome.ordinal,
            outcome
                .error_kind
                .map(|k| k.to_string())
                .unwrap_or_default(),
            outcome.error_summary.as_deref().unwrap_or("")
        );
        for path in &outcome.artifacts {
            info!("[任务 {}]   📸 {}", outcome.ordinal, path.display());
        }
    }
}

/// 打印最终统计信息
pub fn print_final_stats(report: &RunReport, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!("完成时间: {}", report.finished_at.format("%Y-%m-%d %H:%M:%S"));
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", report.succeeded, report.total());
    info!("❌ 失败: {}", report.failed);
    for outcome in report.outcomes.iter().filter(|o| !o.is_success()) {
        info!(
            "   任务 {} ({}): {}",
            outcome.ordinal,
            truncate_text(&outcome.target, 60),
            outcome.error_summary.as_deref().unwrap_or("")
        );
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

/// 遮蔽敏感值，只保留长度提示
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        "(空)".to_string()
    } else {
        "*".repeat(secret.chars().count().min(8))
    }
}
