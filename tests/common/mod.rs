//! 测试用的脚本化浏览器驱动
//!
//! 元素按策略的显示文本登记（例如 `css=#username`），点击效果按次序脚本化。

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use call_log_submit::config::{BrowserMode, Config, Credentials, CsrfSettings, Timeouts};
use call_log_submit::error::{DriverError, DriverResult};
use call_log_submit::infrastructure::{
    BrowserDriver, CookieEntry, ElementHandle, PageCapture, SubmissionRewriter,
};
use call_log_submit::models::{FieldValue, Job, Strategy, TargetRef, WorkflowFile};

pub const BASE: &str = "https://portal.test";
pub const LOGIN_URL: &str = "https://portal.test/manager/login";
pub const HOME_URL: &str = "https://portal.test/manager/dashboard";
pub const LISTING_URL: &str = "https://portal.test/manager/projects";

pub const USERNAME: &str = "css=#username";
pub const PASSWORD: &str = "css=#password";
pub const LOGIN_BUTTON: &str = "role=button[name=/login/i]";
pub const LOGIN_FORM: &str = "css=form:has(input[type=\"password\"])";
pub const LISTING: &str = r"text=/^\s*Projects?\s*$/i";
pub const OPEN_FORM: &str = r"role=button[name=/call\s*log/i]";
pub const FORM_READY: &str = r"role=dialog[name=/call\s*log/i]";
pub const SUBMIT: &str = "role=button[name=/submit details/i]";
pub const COMM_TYPE: &str = "label=\"Communication Type\"";
pub const COMM_WITH: &str = "label=\"Communicate With Client\"";
pub const CALL_TYPE: &str = "label=\"Call\"";
pub const COMMENTS: &str = "label=\"Comments\"";
pub const TRANSFER: &str = r"role=button[name=/^\s*>\s*$/i]";

pub fn record_url(n: usize) -> String {
    format!("{}/manager/project/details/{}", BASE, n)
}

pub fn record_token(n: usize) -> String {
    format!("/manager/project/details/{}", n)
}

pub fn record_link(n: usize) -> String {
    format!("href*={}", record_token(n))
}

pub fn option_key(label: &str) -> String {
    format!("[role=\"listbox\"] >> text=\"{}\"", label)
}

/// 点击（或回车）产生的效果
#[derive(Debug, Clone)]
pub enum Effect {
    /// 跳转到地址
    Navigate(String),
    /// 提交登录：被接受则跳到首页，否则停在登录页
    SubmitLogin,
    /// 让另一个元素变为可见
    Reveal(String),
    Nothing,
}

#[derive(Debug, Clone)]
pub enum Kind {
    Input,
    Select { options: Vec<String>, multiple: bool },
    Checkbox,
    Button,
    Form,
    Other,
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub kind: Kind,
    pub visible: bool,
    pub value: String,
    pub checked: bool,
    /// 第 i 次点击使用第 i 个效果，用完后重复最后一个
    pub on_click: Vec<Effect>,
    pub on_enter: Vec<Effect>,
    clicks: usize,
}

impl FakeElement {
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            visible: true,
            value: String::new(),
            checked: false,
            on_click: Vec::new(),
            on_enter: Vec::new(),
            clicks: 0,
        }
    }

    pub fn input() -> Self {
        Self::new(Kind::Input)
    }

    pub fn button() -> Self {
        Self::new(Kind::Button)
    }

    pub fn select(options: &[&str], multiple: bool) -> Self {
        Self::new(Kind::Select {
            options: options.iter().map(|s| s.to_string()).collect(),
            multiple,
        })
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn on_click(mut self, effects: Vec<Effect>) -> Self {
        self.on_click = effects;
        self
    }

    pub fn on_enter(mut self, effects: Vec<Effect>) -> Self {
        self.on_enter = effects;
        self
    }

    fn next_click_effect(&mut self) -> Effect {
        let effect = self
            .on_click
            .get(self.clicks)
            .or_else(|| self.on_click.last())
            .cloned()
            .unwrap_or(Effect::Nothing);
        self.clicks += 1;
        effect
    }
}

#[derive(Default)]
struct State {
    url: String,
    elements: HashMap<String, FakeElement>,
    handles: HashMap<u64, String>,
    next_handle: u64,
    calls: Vec<String>,
    login_count: usize,
    accepted_logins: Option<usize>,
    cookies: Vec<CookieEntry>,
    hidden_fields: BTreeMap<String, String>,
    interceptors: Vec<(String, SubmissionRewriter)>,
    captures: usize,
}

/// 脚本化驱动
#[derive(Clone, Default)]
pub struct ScriptedDriver {
    state: Arc<Mutex<State>>,
}

impl ScriptedDriver {
    pub fn new(url: &str) -> Self {
        let driver = Self::default();
        driver.lock().url = url.to_string();
        driver
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn insert(&self, key: impl Into<String>, element: FakeElement) {
        self.lock().elements.insert(key.into(), element);
    }

    pub fn remove(&self, key: &str) {
        self.lock().elements.remove(key);
    }

    pub fn set_url(&self, url: &str) {
        self.lock().url = url.to_string();
    }

    pub fn url(&self) -> String {
        self.lock().url.clone()
    }

    pub fn add_cookie(&self, name: &str, value: &str) {
        self.lock().cookies.push(CookieEntry::new(name, value));
    }

    /// 只接受前 n 次登录，之后的提交都停留在登录页
    pub fn accept_logins(&self, n: usize) {
        self.lock().accepted_logins = Some(n);
    }

    pub fn login_count(&self) -> usize {
        self.lock().login_count
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn value_of(&self, key: &str) -> String {
        self.lock()
            .elements
            .get(key)
            .map(|e| e.value.clone())
            .unwrap_or_default()
    }

    pub fn checked(&self, key: &str) -> bool {
        self.lock()
            .elements
            .get(key)
            .map(|e| e.checked)
            .unwrap_or(false)
    }

    pub fn hidden_field(&self, name: &str) -> Option<String> {
        self.lock().hidden_fields.get(name).cloned()
    }

    pub fn interceptor(&self) -> Option<(String, SubmissionRewriter)> {
        self.lock().interceptors.first().cloned()
    }

    pub fn capture_count(&self) -> usize {
        self.lock().captures
    }

    /// 点击过某个元素的次数
    pub fn clicks_on(&self, key: &str) -> usize {
        let needle = format!("click {}", key);
        self.calls().iter().filter(|c| **c == needle).count()
    }

    fn key_of(state: &State, element: &ElementHandle) -> DriverResult<String> {
        state
            .handles
            .get(&element.id)
            .cloned()
            .ok_or_else(|| DriverError::Protocol(format!("未知句柄 {}", element)))
    }

    fn apply(state: &mut State, effect: Effect) {
        match effect {
            Effect::Navigate(url) => state.url = url,
            Effect::SubmitLogin => {
                state.login_count += 1;
                let accepted = state
                    .accepted_logins
                    .map(|n| state.login_count <= n)
                    .unwrap_or(true);
                if accepted {
                    state.url = HOME_URL.to_string();
                }
            }
            Effect::Reveal(key) => {
                if let Some(el) = state.elements.get_mut(&key) {
                    el.visible = true;
                }
            }
            Effect::Nothing => {}
        }
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn navigate(&self, url: &str) -> DriverResult<()> {
        let mut state = self.lock();
        state.calls.push(format!("navigate {}", url));
        state.url = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.lock().url.clone())
    }

    async fn locate(&self, strategy: &Strategy, _timeout: Duration) -> DriverResult<ElementHandle> {
        let key = strategy.to_string();
        let mut state = self.lock();
        state.calls.push(format!("locate {}", key));
        match state.elements.get(&key) {
            None => Err(DriverError::NotFound { strategy: key }),
            Some(el) if !el.visible => Err(DriverError::NotVisible { strategy: key }),
            Some(_) => {
                state.next_handle += 1;
                let id = state.next_handle;
                state.handles.insert(id, key.clone());
                Ok(ElementHandle::new(id, key))
            }
        }
    }

    async fn click(&self, element: &ElementHandle) -> DriverResult<()> {
        let mut state = self.lock();
        let key = Self::key_of(&state, element)?;
        state.calls.push(format!("click {}", key));
        let effect = match state.elements.get_mut(&key) {
            Some(el) => {
                if let Kind::Checkbox = el.kind {
                    el.checked = !el.checked;
                }
                el.next_click_effect()
            }
            None => return Err(DriverError::NotFound { strategy: key }),
        };
        Self::apply(&mut state, effect);
        Ok(())
    }

    async fn fill(&self, element: &ElementHandle, value: &str) -> DriverResult<()> {
        let mut state = self.lock();
        let key = Self::key_of(&state, element)?;
        state.calls.push(format!("fill {} = {}", key, value));
        match state.elements.get_mut(&key) {
            Some(el) if matches!(el.kind, Kind::Input) => {
                el.value = value.to_string();
                Ok(())
            }
            _ => Err(DriverError::ActionRejected {
                reason: format!("{} 不是输入框", key),
            }),
        }
    }

    async fn press_key(&self, element: &ElementHandle, key_name: &str) -> DriverResult<()> {
        let mut state = self.lock();
        let key = Self::key_of(&state, element)?;
        state.calls.push(format!("press {} {}", key, key_name));
        let effects = state
            .elements
            .get(&key)
            .map(|e| e.on_enter.clone())
            .unwrap_or_default();
        if key_name == "Enter" {
            for effect in effects {
                Self::apply(&mut state, effect);
            }
        }
        Ok(())
    }

    async fn select_options(&self, element: &ElementHandle, labels: &[String]) -> DriverResult<()> {
        let mut state = self.lock();
        let key = Self::key_of(&state, element)?;
        state.calls.push(format!("select {} = {:?}", key, labels));
        let el = state
            .elements
            .get_mut(&key)
            .ok_or_else(|| DriverError::NotFound {
                strategy: key.clone(),
            })?;
        match &el.kind {
            Kind::Select { options, multiple } => {
                if labels.len() > 1 && !multiple {
                    return Err(DriverError::ActionRejected {
                        reason: "单选控件不能多选".into(),
                    });
                }
                if let Some(missing) = labels.iter().find(|l| !options.contains(l)) {
                    return Err(DriverError::ActionRejected {
                        reason: format!("没有选项 {}", missing),
                    });
                }
                el.value = labels.join(", ");
                Ok(())
            }
            _ => Err(DriverError::ActionRejected {
                reason: format!("{} 不是选择控件", key),
            }),
        }
    }

    async fn add_selected_option(&self, element: &ElementHandle, label: &str) -> DriverResult<()> {
        let mut state = self.lock();
        let key = Self::key_of(&state, element)?;
        state.calls.push(format!("add {} = {}", key, label));
        let el = state
            .elements
            .get_mut(&key)
            .ok_or_else(|| DriverError::NotFound {
                strategy: key.clone(),
            })?;
        match &el.kind {
            Kind::Select {
                options,
                multiple: true,
            } => {
                if !options.iter().any(|o| o == label) {
                    return Err(DriverError::ActionRejected {
                        reason: format!("没有选项 {}", label),
                    });
                }
                if el.value.is_empty() {
                    el.value = label.to_string();
                } else if !el.value.split(", ").any(|v| v == label) {
                    el.value = format!("{}, {}", el.value, label);
                }
                Ok(())
            }
            _ => Err(DriverError::ActionRejected {
                reason: format!("{} 不是多选框", key),
            }),
        }
    }

    async fn is_checked(&self, element: &ElementHandle) -> DriverResult<bool> {
        let state = self.lock();
        let key = Self::key_of(&state, element)?;
        Ok(state.elements.get(&key).map(|e| e.checked).unwrap_or(false))
    }

    async fn read_value(&self, element: &ElementHandle) -> DriverResult<String> {
        let state = self.lock();
        let key = Self::key_of(&state, element)?;
        Ok(state
            .elements
            .get(&key)
            .map(|e| e.value.clone())
            .unwrap_or_default())
    }

    async fn set_hidden_field(
        &self,
        _form: &ElementHandle,
        name: &str,
        value: &str,
    ) -> DriverResult<bool> {
        let mut state = self.lock();
        state.calls.push(format!("hidden {}", name));
        Ok(state
            .hidden_fields
            .insert(name.to_string(), value.to_string())
            .is_none())
    }

    async fn wait_for_visible(&self, strategy: &Strategy, timeout: Duration) -> DriverResult<()> {
        let key = strategy.to_string();
        let state = self.lock();
        match state.elements.get(&key) {
            Some(el) if el.visible => Ok(()),
            _ => Err(DriverError::Timeout {
                what: key,
                duration: timeout,
            }),
        }
    }

    async fn wait_for_network_settle(&self, _timeout: Duration) -> DriverResult<()> {
        Ok(())
    }

    async fn read_cookies(&self) -> DriverResult<Vec<CookieEntry>> {
        Ok(self.lock().cookies.clone())
    }

    async fn intercept_submission(
        &self,
        url_pattern: &str,
        rewriter: SubmissionRewriter,
    ) -> DriverResult<()> {
        let mut state = self.lock();
        state.calls.push(format!("intercept {}", url_pattern));
        state.interceptors.push((url_pattern.to_string(), rewriter));
        Ok(())
    }

    async fn capture_page(&self) -> PageCapture {
        let mut state = self.lock();
        state.captures += 1;
        PageCapture {
            markup: Some(format!("<html><body>{}</body></html>", state.url)),
            image_png: Some(vec![0x89, b'P', b'N', b'G']),
        }
    }
}

/// 登录页控件
pub fn with_login_page(driver: &ScriptedDriver) {
    driver.insert(USERNAME, FakeElement::input());
    driver.insert(PASSWORD, FakeElement::input());
    driver.insert(LOGIN_FORM, FakeElement::new(Kind::Form));
    driver.insert(
        LOGIN_BUTTON,
        FakeElement::button().on_click(vec![Effect::SubmitLogin]),
    );
}

/// 一个完整可用的门户：登录页、项目列表、n 条记录、通话记录表单
pub fn portal(records: usize) -> ScriptedDriver {
    let driver = ScriptedDriver::new("about:blank");
    with_login_page(&driver);
    driver.insert(
        LISTING,
        FakeElement::button().on_click(vec![Effect::Navigate(LISTING_URL.into())]),
    );
    for n in 1..=records {
        driver.insert(
            record_link(n),
            FakeElement::button().on_click(vec![Effect::Navigate(record_url(n))]),
        );
    }
    driver.insert(OPEN_FORM, FakeElement::button());
    driver.insert(FORM_READY, FakeElement::new(Kind::Other));
    driver.insert(SUBMIT, FakeElement::button());
    driver.insert(
        COMM_TYPE,
        FakeElement::select(&["Microsoft Team", "Phone", "Email"], false),
    );
    driver.insert(
        COMM_WITH,
        FakeElement::select(&["Successfully Communicated", "Left Message"], true),
    );
    driver.insert(CALL_TYPE, FakeElement::select(&["Inbound", "Outbound"], false));
    driver.insert(COMMENTS, FakeElement::input());
    driver
}

/// 快速超时的测试配置
pub fn config(artifacts: &std::path::Path, jobs: Vec<Job>) -> Config {
    Config {
        browser: BrowserMode::Connect { port: 9222 },
        entry_url: LOGIN_URL.to_string(),
        entry_pattern: None,
        credentials: Credentials {
            username: "agent01".into(),
            password: "s3cret".into(),
            ..Default::default()
        },
        artifacts_dir: artifacts.to_path_buf(),
        output_log_file: artifacts.join("output.txt").display().to_string(),
        verbose_logging: false,
        timeouts: Timeouts {
            attempt: Duration::from_millis(200),
            settle: Duration::from_millis(100),
            confirm: Duration::from_millis(100),
            action: Duration::from_millis(500),
        },
        csrf: CsrfSettings::default(),
        workflow: WorkflowFile::default(),
        jobs,
    }
}

/// 针对第 n 条记录的任务
pub fn job(ordinal: usize, record: usize, fields: &[(&str, FieldValue)]) -> Job {
    let fields = fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    Job::new(ordinal, TargetRef::new(record_url(record)), fields)
}

/// 按测试配置组装会话管理器
pub fn session(
    driver: &ScriptedDriver,
    config: &Config,
) -> call_log_submit::services::SessionManager {
    use call_log_submit::services::{CsrfBridge, DiagnosticCapture, LocatorResolver, SessionManager};

    let driver: Arc<dyn BrowserDriver> = Arc::new(driver.clone());
    let resolver = LocatorResolver::new(driver.clone(), config.timeouts.attempt);
    let diagnostics = DiagnosticCapture::new(driver, config.artifacts_dir.clone());
    let csrf = CsrfBridge::new(resolver.clone(), config.csrf.clone());
    SessionManager::new(
        resolver,
        csrf,
        diagnostics,
        config.entry_url.clone(),
        config.entry_pattern.as_deref(),
        config.credentials.clone(),
        config.workflow.login.clone(),
        config.timeouts.settle,
    )
    .unwrap()
}

pub fn resolver(driver: &ScriptedDriver) -> call_log_submit::services::LocatorResolver {
    call_log_submit::services::LocatorResolver::new(
        Arc::new(driver.clone()),
        Duration::from_millis(200),
    )
}

/// 目录中文件名以 `prefix` 开头的文件
pub fn files_with_prefix(dir: &std::path::Path, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|n| n.starts_with(prefix))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
