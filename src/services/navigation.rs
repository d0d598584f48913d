//! 导航服务 - 业务能力层
//!
//! 从登录后的页面走到目标记录：菜单 → 列表 → 记录链接。
//! 从不直接打开记录地址，目标系统依赖按顺序浏览建立的会话状态。

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::job::{url_carries_token, TargetRef};
use crate::models::strategy::Strategy;
use crate::models::surface::NavigationSpec;
use crate::services::locator::{merge_failures, LocatorResolver};
use crate::services::session::SessionManager;

/// 因重新登录而从头导航的最多轮数
const MAX_PASSES: usize = 2;

/// 导航控制器
///
/// 职责：
/// - 打开记录列表（必要时先展开折叠菜单）
/// - 在列表中点击指向目标记录的链接（必要时先搜索缩小范围）
/// - 每一步之后确认会话仍然有效
/// - 确认最终到达的地址确实是目标记录
pub struct NavigationController {
    resolver: LocatorResolver,
    spec: NavigationSpec,
    settle_timeout: Duration,
}

impl NavigationController {
    pub fn new(resolver: LocatorResolver, spec: NavigationSpec, settle_timeout: Duration) -> Self {
        Self {
            resolver,
            spec,
            settle_timeout,
        }
    }

    /// 到达目标记录页
    ///
    /// 找不到控件返回 `Resolution`；到达了页面但地址不含目标标识返回 `NavigationMismatch`；
    /// 最后一轮中又被踢回登录页返回 `NavigationInterrupted`。
    pub async fn reach(&self, session: &mut SessionManager, target: &TargetRef) -> AppResult<()> {
        info!("🧭 导航到记录: {}", target.path_token);

        // 检查点上重新登录后页面回到首页，从菜单重新走一遍
        let started = session.session().reauth_count;
        let mut pass = 0;
        loop {
            pass += 1;
            let reauths = session.session().reauth_count;

            self.open_listing().await?;
            self.settle("打开列表").await;
            session.assert_authenticated("after-open-listing").await?;
            if session.session().reauth_count != reauths {
                self.check_restart(session, target, pass, started)?;
                info!("重新登录后重新打开列表");
                continue;
            }

            self.open_record(target).await?;
            self.settle("打开记录").await;
            session.assert_authenticated("after-open-record").await?;
            if session.session().reauth_count != reauths {
                self.check_restart(session, target, pass, started)?;
                info!("重新登录后重新导航到记录");
                continue;
            }
            break;
        }

        let url = self.resolver.driver().current_url().await?;
        if !url_carries_token(&url, &target.path_token) {
            warn!("⚠️ 到达的页面不是目标记录: {}", url);
            return Err(AppError::NavigationMismatch {
                expected_token: target.path_token.clone(),
                actual_url: url,
            });
        }

        info!("✓ 已到达记录页: {}", url);
        Ok(())
    }

    /// 重新登录后是否还能从头再走一轮
    fn check_restart(
        &self,
        session: &SessionManager,
        target: &TargetRef,
        pass: usize,
        started: usize,
    ) -> AppResult<()> {
        if pass < MAX_PASSES {
            return Ok(());
        }
        let reauths = session.session().reauth_count - started;
        warn!("⚠️ 导航途中已重新登录 {} 次，放弃本条记录", reauths);
        Err(AppError::NavigationInterrupted {
            expected_token: target.path_token.clone(),
            reauths,
        })
    }

    async fn open_listing(&self) -> AppResult<()> {
        let first = match self.resolver.click("记录列表入口", &self.spec.listing).await {
            Ok(_) => return Ok(()),
            Err(e) => e,
        };

        debug!("列表入口不可见，尝试展开菜单");
        if self
            .resolver
            .click("展开菜单", &self.spec.reveal_menu)
            .await
            .is_err()
        {
            return Err(first.into());
        }

        match self.resolver.click("记录列表入口", &self.spec.listing).await {
            Ok(_) => Ok(()),
            Err(second) => Err(merge_failures("记录列表入口", vec![first, second]).into()),
        }
    }

    async fn open_record(&self, target: &TargetRef) -> AppResult<()> {
        let link = [Strategy::href(target.path_token.clone())];
        let first = match self.resolver.click("记录链接", &link).await {
            Ok(_) => return Ok(()),
            Err(e) => e,
        };

        if !self.spec.search_enabled {
            return Err(first.into());
        }

        let query = search_query(target);
        info!("🔍 列表中未见记录链接，搜索: {}", query);
        let driver = self.resolver.driver().clone();
        let searched = self
            .resolver
            .resolve_with("列表搜索框", &self.spec.search_input, move |d, el| {
                let query = query.clone();
                Box::pin(async move {
                    d.fill(el, &query).await?;
                    d.press_key(el, "Enter").await
                })
            })
            .await;
        if let Err(e) = searched {
            debug!("没有可用的搜索框: {}", e);
            return Err(first.into());
        }
        if let Err(e) = driver.wait_for_network_settle(self.settle_timeout).await {
            debug!("搜索后网络未空闲: {}", e);
        }

        match self.resolver.click("记录链接", &link).await {
            Ok(_) => Ok(()),
            Err(second) => Err(merge_failures("记录链接", vec![first, second]).into()),
        }
    }

    async fn settle(&self, step: &str) {
        if let Err(e) = self
            .resolver
            .driver()
            .wait_for_network_settle(self.settle_timeout)
            .await
        {
            warn!("⚠️ {}后网络未在限时内空闲: {}", step, e);
        }
    }
}

/// 搜索文本：优先用显式给出的，否则取路径标识最后一段
pub fn search_query(target: &TargetRef) -> String {
    if let Some(text) = target.search_text.as_deref().filter(|t| !t.trim().is_empty()) {
        return text.trim().to_string();
    }
    target
        .path_token
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(&target.path_token)
        .to_string()
}
