//! 诊断快照服务 - 业务能力层
//!
//! 只负责"把当前页面存下来"能力，不关心流程

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::infrastructure::BrowserDriver;

/// 诊断快照
///
/// 职责：
/// - 失败时保存页面 HTML 与整页截图
/// - 文件名 = 标签 + 时间戳
/// - 写入失败只记录日志，绝不覆盖原始错误
#[derive(Clone)]
pub struct DiagnosticCapture {
    driver: Arc<dyn BrowserDriver>,
    dir: PathBuf,
}

impl DiagnosticCapture {
    pub fn new(driver: Arc<dyn BrowserDriver>, dir: impl Into<PathBuf>) -> Self {
        Self {
            driver,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 保存快照，返回成功写入的文件
    pub async fn capture(&self, label: &str) -> Vec<PathBuf> {
        let stem = format!(
            "{}-{}",
            sanitize_label(label),
            chrono::Local::now().format("%Y%m%d-%H%M%S%.3f")
        );
        debug!("保存诊断快照: {}", stem);

        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            warn!("⚠️ 无法创建诊断目录 {}: {}", self.dir.display(), e);
            return Vec::new();
        }

        let capture = self.driver.capture_page().await;
        let mut written = Vec::new();

        if let Some(markup) = capture.markup {
            let path = self.dir.join(format!("{}.html", stem));
            match tokio::fs::write(&path, markup).await {
                Ok(()) => written.push(path),
                Err(e) => warn!("⚠️ 写入 HTML 快照失败 {}: {}", path.display(), e),
            }
        }
        if let Some(png) = capture.image_png {
            let path = self.dir.join(format!("{}.png", stem));
            match tokio::fs::write(&path, png).await {
                Ok(()) => written.push(path),
                Err(e) => warn!("⚠️ 写入截图失败 {}: {}", path.display(), e),
            }
        }

        if !written.is_empty() {
            info!("📸 已保存诊断快照: {}", stem);
        }
        written
    }
}

/// 标签只保留字母、数字、`-` 与 `_`
pub fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('-');
    if trimmed.is_empty() {
        "capture".to_string()
    } else {
        trimmed.to_string()
    }
}
