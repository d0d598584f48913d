use anyhow::{Context, Result};
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// 连接到已开启调试端口的浏览器，并新建一个空白页
///
/// 返回浏览器、事件处理任务和页面；处理任务由调用方负责结束。
pub async fn connect_to_browser_and_page(port: u16) -> Result<(Browser, JoinHandle<()>, Page)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, mut handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        e
    })?;
    debug!("浏览器连接成功");

    // 在后台处理浏览器事件
    let handler_task = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let pages = browser.pages().await?;
    debug!("浏览器中已有 {} 个页面，新建独立页面", pages.len());

    // 不复用已有页面，避免干扰操作者正在使用的标签页
    let page = browser
        .new_page("about:blank")
        .await
        .context("创建空白页面失败")?;

    Ok((browser, handler_task, page))
}
