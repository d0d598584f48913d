//! 会话管理 - 业务能力层
//!
//! 登录一次，并在流程中任意检查点证明"仍处于登录状态"。
//! 远端可能随时让会话静默失效（表现为被重定向回登录页），
//! 每次失效只重新登录一次；重新登录后仍在登录页即为致命错误。

use std::time::Duration;

use chrono::{DateTime, Local};
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::config::Credentials;
use crate::error::{AppError, AppResult};
use crate::models::strategy::Strategy;
use crate::models::surface::LoginSpec;
use crate::services::csrf::CsrfBridge;
use crate::services::diagnostics::DiagnosticCapture;
use crate::services::locator::LocatorResolver;

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Invalidated,
    Reauthenticating,
    Fatal,
}

/// 当前会话
#[derive(Debug, Clone)]
pub struct Session {
    pub user: String,
    pub state: SessionState,
    pub established_at: Option<DateTime<Local>>,
    /// 本次运行中重新登录的次数
    pub reauth_count: usize,
    /// 连续检测到失效的次数，成功检查后清零
    consecutive_invalidations: usize,
}

impl Session {
    fn new(user: &str) -> Self {
        Self {
            user: user.to_string(),
            state: SessionState::Unauthenticated,
            established_at: None,
            reauth_count: 0,
            consecutive_invalidations: 0,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }
}

/// 会话管理器
///
/// 持有唯一的 `Session`，导航与表单流程通过 `&mut SessionManager` 调用检查点。
pub struct SessionManager {
    resolver: LocatorResolver,
    csrf: CsrfBridge,
    diagnostics: DiagnosticCapture,
    entry_url: String,
    entry_pattern: Regex,
    credentials: Credentials,
    login: LoginSpec,
    settle_timeout: Duration,
    interception_installed: bool,
    session: Session,
}

impl SessionManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        resolver: LocatorResolver,
        csrf: CsrfBridge,
        diagnostics: DiagnosticCapture,
        entry_url: impl Into<String>,
        entry_pattern: Option<&str>,
        credentials: Credentials,
        login: LoginSpec,
        settle_timeout: Duration,
    ) -> AppResult<Self> {
        let entry_url = entry_url.into();
        let pattern = match entry_pattern {
            Some(p) => p.to_string(),
            None => derive_entry_pattern(&entry_url),
        };
        let entry_pattern = Regex::new(&pattern).map_err(|e| {
            AppError::Config(crate::error::ConfigError::EnvVarParseFailed {
                var_name: "LOGIN_URL_PATTERN".to_string(),
                value: format!("{} ({})", pattern, e),
                expected_type: "regex".to_string(),
            })
        })?;
        let session = Session::new(&credentials.username);

        Ok(Self {
            resolver,
            csrf,
            diagnostics,
            entry_url,
            entry_pattern,
            credentials,
            login,
            settle_timeout,
            interception_installed: false,
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// 当前地址是否为登录入口
    pub fn is_entry_point(&self, url: &str) -> bool {
        self.entry_pattern.is_match(url)
    }

    /// 首次登录
    ///
    /// 登录后仍停留在入口页视为凭据被拒绝，保存快照并终止运行。
    pub async fn authenticate(&mut self) -> AppResult<()> {
        info!("🔐 开始登录: {}", self.entry_url);
        self.session.state = SessionState::Authenticating;

        if let Err(e) = self.submit_credentials().await {
            return Err(self.fail_authentication(e).await);
        }

        let url = self.current_url().await?;
        if self.is_entry_point(&url) {
            let err = AppError::authentication(format!(
                "提交后仍停留在登录页 {}（凭据被拒绝或提交未生效）",
                url
            ));
            return Err(self.fail_authentication(err).await);
        }

        self.mark_authenticated();
        self.wait_until_ready().await;
        info!("✓ 登录成功: {} → {}", self.session.user, url);
        Ok(())
    }

    /// 检查点：确认仍处于登录状态
    ///
    /// 检测到失效时只重新登录一次再检查；连续两次失效为致命错误。
    pub async fn assert_authenticated(&mut self, label: &str) -> AppResult<()> {
        loop {
            let url = self.current_url().await?;
            if !self.is_entry_point(&url) {
                if self.session.consecutive_invalidations > 0 {
                    info!("✓ [{}] 重新登录后会话已恢复", label);
                }
                self.mark_authenticated();
                debug!("[{}] 会话有效: {}", label, url);
                return Ok(());
            }

            self.session.consecutive_invalidations += 1;
            self.session.state = SessionState::Invalidated;
            warn!(
                "⚠️ [{}] 会话失效，被重定向到登录页 (连续第 {} 次)",
                label, self.session.consecutive_invalidations
            );

            if self.session.consecutive_invalidations >= 2 {
                self.session.state = SessionState::Fatal;
                error!("❌ [{}] 重新登录后仍被踢回登录页，终止运行", label);
                self.diagnostics
                    .capture(&format!("{}-session-loop", label))
                    .await;
                return Err(AppError::SessionInvalidationLoop {
                    label: label.to_string(),
                });
            }

            self.session.state = SessionState::Reauthenticating;
            self.session.reauth_count += 1;
            info!("🔐 [{}] 重新登录 (第 {} 次)", label, self.session.reauth_count);
            if let Err(e) = self.submit_credentials().await {
                return Err(self.fail_authentication(e).await);
            }
        }
    }

    /// 打开入口页，填写凭据并提交
    async fn submit_credentials(&mut self) -> AppResult<()> {
        let driver = self.resolver.driver().clone();
        driver
            .navigate(&self.entry_url)
            .await
            .map_err(|e| AppError::authentication(format!("无法打开登录页: {}", e)))?;

        if let Some(token) = self.csrf.harvest().await {
            if !self.interception_installed {
                self.csrf.install_interception(&token).await;
                self.interception_installed = true;
            }
            self.csrf.inject(&self.login.form, &token).await;
        }

        self.resolver
            .fill("用户名", &self.login.username, &self.credentials.username)
            .await
            .map_err(|e| AppError::authentication(format!("无法填写用户名: {}", e)))?;

        self.resolver
            .fill("密码", &self.login.password, &self.credentials.password)
            .await
            .map_err(|e| AppError::authentication(format!("无法填写密码: {}", e)))?;

        if let Some(workplace) = self.credentials.workplace.clone() {
            if let Err(e) = self
                .resolver
                .select("Work Place", &self.login.workplace, &[workplace.clone()])
                .await
            {
                warn!("⚠️ 无法设置 Work Place = \"{}\": {}", workplace, e);
            }
        }

        if let Some(desk) = self.credentials.desk_number.clone() {
            if let Err(e) = self
                .resolver
                .fill("Desk Number", &self.login.desk_number, &desk)
                .await
            {
                warn!("⚠️ 无法填写 Desk Number: {}", e);
            }
        }

        if let Some(want) = self.credentials.remember_me {
            self.set_remember_me(want).await;
        }

        self.resolver
            .click("登录按钮", &self.login.submit)
            .await
            .map_err(|e| AppError::authentication(format!("找不到登录按钮: {}", e)))?;

        if let Err(e) = driver.wait_for_network_settle(self.settle_timeout).await {
            warn!("⚠️ 登录后网络未在限时内空闲: {}", e);
        }
        Ok(())
    }

    /// 只有状态不同才点击
    async fn set_remember_me(&self, want: bool) {
        let result = self
            .resolver
            .resolve_with("Remember Me", &self.login.remember_me, move |d, el| {
                Box::pin(async move {
                    let checked = d.is_checked(el).await?;
                    if checked != want {
                        d.click(el).await?;
                    }
                    Ok(())
                })
            })
            .await;
        match result {
            Ok(_) => debug!("Remember Me = {}", want),
            Err(_) => info!("Remember Me 复选框未找到（继续）"),
        }
    }

    /// 登录后尽力等待就绪标志
    async fn wait_until_ready(&self) {
        if let Some(selector) = &self.login.ready_selector {
            let strategy = Strategy::css(selector.clone());
            if let Err(e) = self
                .resolver
                .driver()
                .wait_for_visible(&strategy, self.settle_timeout)
                .await
            {
                warn!("⚠️ 登录后就绪标志 {} 未出现: {}", selector, e);
            }
        }
    }

    fn mark_authenticated(&mut self) {
        self.session.state = SessionState::Authenticated;
        self.session.consecutive_invalidations = 0;
        if self.session.established_at.is_none() {
            self.session.established_at = Some(Local::now());
        }
    }

    async fn fail_authentication(&mut self, err: AppError) -> AppError {
        self.session.state = SessionState::Fatal;
        error!("❌ 登录失败: {}", err);
        self.diagnostics.capture("login-failed").await;
        err
    }

    async fn current_url(&self) -> AppResult<String> {
        Ok(self.resolver.driver().current_url().await?)
    }
}

/// 由入口地址推导"在登录页"的匹配规则
///
/// 从地址开头锚定到入口路径，后面只允许斜杠、查询串或锚点。
/// 入口就是站点根时匹配整个根地址。
pub fn derive_entry_pattern(entry_url: &str) -> String {
    match url::Url::parse(entry_url) {
        Ok(url) => {
            let origin = url.origin().ascii_serialization();
            let path = url.path().trim_end_matches('/');
            format!(
                r"^{}{}/?(?:[?#].*)?$",
                regex::escape(&origin),
                regex::escape(path)
            )
        }
        Err(_) => format!("^{}", regex::escape(entry_url)),
    }
}
