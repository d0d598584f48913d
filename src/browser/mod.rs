//! 浏览器资源
//!
//! 一次运行只持有一个浏览上下文，运行结束时无条件关闭。

pub mod connection;
pub mod headless;

use anyhow::Result;
use chromiumoxide::{Browser, Page};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BrowserMode;

pub use connection::connect_to_browser_and_page;
pub use headless::launch_browser;

/// 浏览上下文
///
/// 职责：
/// - 按配置启动或连接浏览器
/// - 持有 Browser、Page 与事件处理任务
/// - `close` 释放全部资源；忘记调用时 Drop 至少结束事件任务
pub struct BrowsingContext {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    launched: bool,
}

impl BrowsingContext {
    pub async fn acquire(mode: &BrowserMode) -> Result<Self> {
        let (browser, handler, page, launched) = match mode {
            BrowserMode::Launch {
                headless,
                executable,
            } => {
                let (b, h, p) = launch_browser(*headless, executable.as_deref()).await?;
                (b, h, p, true)
            }
            BrowserMode::Connect { port } => {
                let (b, h, p) = connect_to_browser_and_page(*port).await?;
                (b, h, p, false)
            }
        };
        Ok(Self {
            browser,
            page,
            handler,
            launched,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 关闭浏览上下文
    ///
    /// 自己启动的浏览器整个关闭；连接的浏览器只关闭本次新建的页面。
    pub async fn close(mut self) {
        if self.launched {
            if let Err(e) = self.browser.close().await {
                warn!("⚠️ 关闭浏览器失败: {}", e);
            }
            if let Err(e) = self.browser.wait().await {
                debug!("等待浏览器进程退出失败: {}", e);
            }
        } else if let Err(e) = self.page.clone().close().await {
            warn!("⚠️ 关闭页面失败: {}", e);
        }
        info!("✓ 浏览器资源已释放");
    }
}

impl Drop for BrowsingContext {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
