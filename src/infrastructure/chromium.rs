//! Chromium 驱动 - 基础设施层
//!
//! 持有唯一的 page 资源，把 `BrowserDriver` 的能力翻译成 CDP 调用与页面内脚本

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, HeaderEntry, RequestPattern,
    RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::PostDataEntry;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::types::Binary;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::error::{DriverError, DriverResult};
use crate::infrastructure::driver::{
    BrowserDriver, CookieEntry, ElementHandle, PageCapture, SubmissionRequest, SubmissionRewriter,
};
use crate::models::job::url_carries_token;
use crate::models::strategy::Strategy;

const HANDLE_ATTR: &str = "data-cls-handle";
const POLL_INTERVAL: Duration = Duration::from_millis(200);
const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// 在页面内按单个策略查找控件的脚本，`__SPEC__` 与 `__HANDLE__` 由调用方替换
const LOCATE_JS: &str = r#"
(() => {
    const spec = __SPEC__;
    const handle = __HANDLE__;
    const text = (el) => (el.innerText || el.textContent || '').trim();
    const visible = (el) => {
        if (!el || !el.isConnected) return false;
        const style = window.getComputedStyle(el);
        if (style.visibility === 'hidden' || style.display === 'none') return false;
        const r = el.getBoundingClientRect();
        return r.width > 0 && r.height > 0;
    };
    const accName = (el) => {
        const aria = el.getAttribute('aria-label');
        if (aria) return aria.trim();
        const by = el.getAttribute('aria-labelledby');
        if (by) {
            const t = by.split(/\s+/).map((id) => document.getElementById(id)).filter(Boolean).map(text).join(' ');
            if (t) return t;
        }
        if (el.labels && el.labels.length) return text(el.labels[0]);
        if (el.tagName === 'INPUT' && ['submit', 'button', 'reset'].includes(el.type)) return (el.value || '').trim();
        return text(el) || (el.getAttribute('title') || '').trim() || (el.getAttribute('placeholder') || '').trim();
    };
    const roles = {
        button: 'button, input[type=submit], input[type=button], input[type=reset], [role=button]',
        link: 'a[href], [role=link]',
        combobox: 'select:not([multiple]), [role=combobox]',
        listbox: 'select[multiple], [role=listbox]',
        textbox: 'input:not([type]), input[type=text], input[type=email], input[type=password], textarea, [role=textbox]',
        searchbox: 'input[type=search], [role=searchbox]',
        checkbox: 'input[type=checkbox], [role=checkbox]',
        dialog: 'dialog, [role=dialog]',
        navigation: 'nav, [role=navigation]',
    };
    const innermost = (list) => list.filter((el) => !list.some((o) => o !== el && el.contains(o)));
    const textual = 'a, button, [role=button], [role=link], [role=option], [role=menuitem], label, span, div, li, td, p, h1, h2, h3, h4, h5, h6, input[type=submit], input[type=button]';
    let found = [];
    switch (spec.by) {
        case 'override':
        case 'css':
            found = Array.from(document.querySelectorAll(spec.selector));
            break;
        case 'role': {
            const re = new RegExp(spec.name, 'i');
            const sel = roles[spec.role] || `[role="${spec.role}"]`;
            found = Array.from(document.querySelectorAll(sel)).filter((el) => re.test(accName(el)));
            break;
        }
        case 'text': {
            const re = spec.exact ? null : new RegExp(spec.pattern, 'i');
            const match = (t) => (re ? re.test(t) : t === spec.pattern);
            found = innermost(Array.from(document.querySelectorAll(textual))
                .filter((el) => match(el.tagName === 'INPUT' ? (el.value || '').trim() : text(el))));
            break;
        }
        case 'label': {
            const clean = (t) => t.replace(/\s*\*\s*$/, '').trim();
            const controls = Array.from(document.querySelectorAll('label'))
                .filter((l) => clean(text(l)) === spec.text)
                .map((l) => l.control || (l.htmlFor && document.getElementById(l.htmlFor)) || l.querySelector('input, select, textarea'))
                .filter(Boolean);
            const aria = Array.from(document.querySelectorAll('[aria-label]'))
                .filter((el) => el.getAttribute('aria-label').trim() === spec.text);
            found = controls.concat(aria);
            break;
        }
        case 'text_within':
            found = innermost(Array.from(document.querySelectorAll(spec.container))
                .flatMap((c) => Array.from(c.querySelectorAll('*')))
                .filter((el) => text(el) === spec.text));
            break;
    }
    if (found.length === 0) return { status: 'not_found' };
    const el = found.find(visible);
    if (!el) return { status: 'not_visible' };
    el.setAttribute('data-cls-handle', String(handle));
    return { status: 'found', description: el.tagName.toLowerCase() + (el.id ? '#' + el.id : '') };
})()
"#;

/// 列出页面上所有链接，由 Rust 侧按路径边界挑选
const LINKS_JS: &str = r#"
(() => {
    const visible = (el) => {
        if (!el || !el.isConnected) return false;
        const style = window.getComputedStyle(el);
        if (style.visibility === 'hidden' || style.display === 'none') return false;
        const r = el.getBoundingClientRect();
        return r.width > 0 && r.height > 0;
    };
    return Array.from(document.querySelectorAll('a[href]')).map((a) => ({
        href: a.href,
        raw: a.getAttribute('href') || '',
        visible: visible(a),
    }));
})()
"#;

/// 给第 `__INDEX__` 个链接打上句柄
const MARK_LINK_JS: &str = r#"
(() => {
    const a = document.querySelectorAll('a[href]')[__INDEX__];
    if (!a) return { status: 'not_found' };
    a.setAttribute('data-cls-handle', String(__HANDLE__));
    return { status: 'found', description: 'a' + (a.id ? '#' + a.id : '') };
})()
"#;

#[derive(Debug, Deserialize)]
struct LinkInfo {
    href: String,
    #[serde(default)]
    raw: String,
    visible: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum LinkMatch {
    Visible(usize),
    Hidden,
    Missing,
}

/// 按文档顺序取第一个带完整路径标识的可见链接
fn pick_link(links: &[LinkInfo], token: &str) -> LinkMatch {
    let mut hidden = false;
    for (index, link) in links.iter().enumerate() {
        if !url_carries_token(&link.href, token) && !url_carries_token(&link.raw, token) {
            continue;
        }
        if link.visible {
            return LinkMatch::Visible(index);
        }
        hidden = true;
    }
    if hidden {
        LinkMatch::Hidden
    } else {
        LinkMatch::Missing
    }
}

/// 拦截到的请求体以 base64 分段给出，拼接后按 UTF-8 还原
fn decode_post_body(entries: &[PostDataEntry]) -> Option<String> {
    let mut raw = Vec::new();
    for entry in entries {
        let Some(bytes) = &entry.bytes else { continue };
        let encoded: &str = bytes.as_ref();
        match BASE64.decode(encoded) {
            Ok(chunk) => raw.extend(chunk),
            Err(e) => {
                warn!("请求体分段无法解码: {}", e);
                return None;
            }
        }
    }
    if raw.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(&raw).into_owned())
}

/// 给一次页面操作加上时限
async fn bounded<T>(
    what: &str,
    limit: Duration,
    action: impl Future<Output = DriverResult<T>>,
) -> DriverResult<T> {
    match tokio::time::timeout(limit, action).await {
        Ok(result) => result,
        Err(_) => Err(DriverError::Timeout {
            what: what.to_string(),
            duration: limit,
        }),
    }
}

#[derive(Debug, Deserialize)]
struct LocateReply {
    status: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActionReply {
    ok: bool,
    #[serde(default)]
    reason: Option<String>,
}

/// Chromium 驱动
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 把定位策略翻译成页面内脚本
/// - 不认识任务 / 字段 / 会话
pub struct ChromiumDriver {
    page: Page,
    next_handle: AtomicU64,
    interceptors: Mutex<Vec<JoinHandle<()>>>,
    action_timeout: Duration,
}

impl ChromiumDriver {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            next_handle: AtomicU64::new(1),
            interceptors: Mutex::new(Vec::new()),
            action_timeout: DEFAULT_ACTION_TIMEOUT,
        }
    }

    /// 单次导航 / 点击 / 按键 / 脚本的时限
    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    /// 获取 page 的引用（用于关闭等生命周期操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    async fn eval(&self, js_code: impl Into<String>) -> DriverResult<JsonValue> {
        let js_code = js_code.into();
        bounded("evaluate", self.action_timeout, async {
            let result = self.page.evaluate(js_code).await?;
            let json_value: JsonValue = result.into_value()?;
            Ok::<_, DriverError>(json_value)
        })
        .await
    }

    /// 执行 JS 代码并反序列化为指定类型
    async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> DriverResult<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    fn selector_of(element: &ElementHandle) -> String {
        format!("[{}=\"{}\"]", HANDLE_ATTR, element.id)
    }

    /// 在句柄对应的元素上执行一段脚本，脚本中以 `el` 引用该元素
    async fn eval_on<T: DeserializeOwned>(
        &self,
        element: &ElementHandle,
        body: &str,
    ) -> DriverResult<T> {
        let selector = serde_json::to_string(&Self::selector_of(element))?;
        let script = format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return null; {} }})()",
            selector, body
        );
        let value = self.eval(script).await?;
        if value.is_null() {
            return Err(DriverError::NotFound {
                strategy: element.to_string(),
            });
        }
        Ok(serde_json::from_value(value)?)
    }

    async fn locate_once(&self, strategy: &Strategy, handle: u64) -> DriverResult<LocateReply> {
        if let Strategy::Href { contains } = strategy {
            return self.locate_link(contains, handle).await;
        }
        let spec = serde_json::to_string(strategy)?;
        let script = LOCATE_JS
            .replace("__SPEC__", &spec)
            .replace("__HANDLE__", &handle.to_string());
        self.eval_as(script).await
    }

    async fn locate_link(&self, token: &str, handle: u64) -> DriverResult<LocateReply> {
        let links: Vec<LinkInfo> = self.eval_as(LINKS_JS).await?;
        let status = match pick_link(&links, token) {
            LinkMatch::Visible(index) => {
                let script = MARK_LINK_JS
                    .replace("__INDEX__", &index.to_string())
                    .replace("__HANDLE__", &handle.to_string());
                return self.eval_as(script).await;
            }
            LinkMatch::Hidden => "not_visible",
            LinkMatch::Missing => "not_found",
        };
        Ok(LocateReply {
            status: status.to_string(),
            description: None,
        })
    }

    /// 点击 / 按键等需要真实输入事件的操作，作用在句柄对应的元素上
    async fn find(&self, element: &ElementHandle) -> DriverResult<chromiumoxide::Element> {
        Ok(self.page.find_element(Self::selector_of(element)).await?)
    }
}

impl Drop for ChromiumDriver {
    fn drop(&mut self) {
        if let Ok(tasks) = self.interceptors.lock() {
            for task in tasks.iter() {
                task.abort();
            }
        }
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn navigate(&self, url: &str) -> DriverResult<()> {
        debug!("导航到: {}", url);
        bounded("navigate", self.action_timeout, async {
            self.page
                .goto(url)
                .await
                .map_err(|e| DriverError::NavigationFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
            Ok::<_, DriverError>(())
        })
        .await
    }

    async fn current_url(&self) -> DriverResult<String> {
        bounded("current url", self.action_timeout, async {
            Ok::<_, DriverError>(self.page.url().await?.unwrap_or_default())
        })
        .await
    }

    async fn locate(&self, strategy: &Strategy, timeout: Duration) -> DriverResult<ElementHandle> {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let deadline = Instant::now() + timeout;
        let mut last_status = String::from("not_found");

        loop {
            // 页面跳转中执行上下文可能被销毁，视为暂未找到
            match self.locate_once(strategy, handle).await {
                Ok(reply) if reply.status == "found" => {
                    let description = reply.description.unwrap_or_else(|| "element".to_string());
                    return Ok(ElementHandle::new(handle, description));
                }
                Ok(reply) => last_status = reply.status,
                Err(e) => debug!("定位脚本执行失败 ({}): {}", strategy, e),
            }

            if Instant::now() + POLL_INTERVAL > deadline {
                break;
            }
            sleep(POLL_INTERVAL).await;
        }

        let strategy = strategy.to_string();
        Err(if last_status == "not_visible" {
            DriverError::NotVisible { strategy }
        } else {
            DriverError::NotFound { strategy }
        })
    }

    async fn click(&self, element: &ElementHandle) -> DriverResult<()> {
        bounded("click", self.action_timeout, async {
            let el = self.find(element).await?;
            el.scroll_into_view().await?;
            el.click().await?;
            Ok::<_, DriverError>(())
        })
        .await
    }

    async fn fill(&self, element: &ElementHandle, value: &str) -> DriverResult<()> {
        let editable: bool = self
            .eval_on(
                element,
                "if (!('value' in el) || el.disabled || el.readOnly) return false; \
                 el.focus(); el.value = ''; return true;",
            )
            .await?;
        if !editable {
            return Err(DriverError::ActionRejected {
                reason: format!("{} 不可编辑", element),
            });
        }
        bounded("type text", self.action_timeout, async {
            self.find(element).await?.type_str(value).await?;
            Ok::<_, DriverError>(())
        })
        .await?;
        let _: bool = self
            .eval_on(
                element,
                "el.dispatchEvent(new Event('input', { bubbles: true })); \
                 el.dispatchEvent(new Event('change', { bubbles: true })); return true;",
            )
            .await?;
        Ok(())
    }

    async fn press_key(&self, element: &ElementHandle, key: &str) -> DriverResult<()> {
        bounded("press key", self.action_timeout, async {
            self.find(element).await?.press_key(key).await?;
            Ok::<_, DriverError>(())
        })
        .await
    }

    async fn select_options(
        &self,
        element: &ElementHandle,
        labels: &[String],
    ) -> DriverResult<()> {
        let labels_json = serde_json::to_string(labels)?;
        let body = format!(
            r#"
            const labels = {labels_json};
            if (el.tagName !== 'SELECT') return {{ ok: false, reason: 'not a <select>' }};
            if (labels.length > 1 && !el.multiple) return {{ ok: false, reason: 'multi-select unsupported' }};
            const norm = (s) => String(s).trim().toLowerCase();
            const opts = Array.from(el.options);
            const missing = labels.filter((l) => !opts.some((o) => norm(o.label || o.text) === norm(l)));
            if (missing.length) return {{ ok: false, reason: 'missing options: ' + missing.join(', ') }};
            opts.forEach((o) => {{ o.selected = labels.some((l) => norm(l) === norm(o.label || o.text)); }});
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            if (window.jQuery) {{ try {{ window.jQuery(el).trigger('change'); }} catch (e) {{}} }}
            return {{ ok: true }};
            "#
        );
        let reply: ActionReply = self.eval_on(element, &body).await?;
        if reply.ok {
            Ok(())
        } else {
            Err(DriverError::ActionRejected {
                reason: reply.reason.unwrap_or_else(|| "select rejected".to_string()),
            })
        }
    }

    async fn add_selected_option(&self, element: &ElementHandle, label: &str) -> DriverResult<()> {
        let label_json = serde_json::to_string(label)?;
        let body = format!(
            r#"
            const label = {label_json};
            if (el.tagName !== 'SELECT' || !el.multiple) return {{ ok: false, reason: 'not a <select multiple>' }};
            const norm = (s) => String(s).trim().toLowerCase();
            const opt = Array.from(el.options).find((o) => norm(o.label || o.text) === norm(label));
            if (!opt) return {{ ok: false, reason: 'missing option: ' + label }};
            opt.selected = true;
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            if (window.jQuery) {{ try {{ window.jQuery(el).trigger('change'); }} catch (e) {{}} }}
            return {{ ok: true }};
            "#
        );
        let reply: ActionReply = self.eval_on(element, &body).await?;
        if reply.ok {
            Ok(())
        } else {
            Err(DriverError::ActionRejected {
                reason: reply.reason.unwrap_or_else(|| "select rejected".to_string()),
            })
        }
    }

    async fn is_checked(&self, element: &ElementHandle) -> DriverResult<bool> {
        self.eval_on(
            element,
            "return !!el.checked || el.getAttribute('aria-checked') === 'true';",
        )
        .await
    }

    async fn read_value(&self, element: &ElementHandle) -> DriverResult<String> {
        // 第三方下拉组件会把真实 select 隐藏，把选中项渲染在相邻节点里
        self.eval_on(
            element,
            r#"
            if (el.tagName === 'SELECT') {
                const rendered = el.nextElementSibling && el.nextElementSibling.querySelector('.select2-selection__rendered, .chosen-single, .filter-option');
                if (rendered && rendered.innerText.trim()) return rendered.innerText.trim();
                return Array.from(el.selectedOptions).map((o) => (o.label || o.text).trim()).join(', ');
            }
            if ('value' in el) return String(el.value);
            return (el.innerText || el.textContent || '').trim();
            "#,
        )
        .await
    }

    async fn set_hidden_field(
        &self,
        form: &ElementHandle,
        name: &str,
        value: &str,
    ) -> DriverResult<bool> {
        let name_json = serde_json::to_string(name)?;
        let value_json = serde_json::to_string(value)?;
        let body = format!(
            r#"
            const name = {name_json};
            let input = Array.from(el.querySelectorAll('input')).find((i) => i.name === name);
            let created = false;
            if (!input) {{
                input = document.createElement('input');
                input.type = 'hidden';
                input.name = name;
                el.appendChild(input);
                created = true;
            }}
            input.value = {value_json};
            return created;
            "#
        );
        self.eval_on(form, &body).await
    }

    async fn wait_for_visible(&self, strategy: &Strategy, timeout: Duration) -> DriverResult<()> {
        self.locate(strategy, timeout).await.map(|_| ())
    }

    async fn wait_for_network_settle(&self, timeout: Duration) -> DriverResult<()> {
        #[derive(Deserialize, PartialEq)]
        struct Snapshot {
            ready: String,
            resources: u64,
        }

        let deadline = Instant::now() + timeout;
        let mut previous: Option<Snapshot> = None;
        let mut stable_polls = 0;

        while Instant::now() < deadline {
            let snapshot: Option<Snapshot> = self
                .eval_as(
                    "({ ready: document.readyState, resources: performance.getEntriesByType('resource').length })",
                )
                .await
                .ok();

            match snapshot {
                Some(s) if s.ready == "complete" && previous.as_ref() == Some(&s) => {
                    stable_polls += 1;
                    if stable_polls >= 2 {
                        return Ok(());
                    }
                }
                Some(s) => {
                    stable_polls = 0;
                    previous = Some(s);
                }
                None => {
                    stable_polls = 0;
                    previous = None;
                }
            }
            sleep(Duration::from_millis(250)).await;
        }

        Err(DriverError::Timeout {
            what: "network settle".to_string(),
            duration: timeout,
        })
    }

    async fn read_cookies(&self) -> DriverResult<Vec<CookieEntry>> {
        let cookies = bounded("read cookies", self.action_timeout, async {
            Ok::<_, DriverError>(self.page.get_cookies().await?)
        })
        .await?;
        Ok(cookies
            .into_iter()
            .map(|c| CookieEntry {
                name: c.name,
                value: c.value,
                domain: c.domain,
            })
            .collect())
    }

    async fn intercept_submission(
        &self,
        url_pattern: &str,
        rewriter: SubmissionRewriter,
    ) -> DriverResult<()> {
        let mut events = self.page.event_listener::<EventRequestPaused>().await?;

        let pattern = RequestPattern::builder()
            .url_pattern(url_pattern)
            .request_stage(RequestStage::Request)
            .build();
        self.page
            .execute(EnableParams::builder().pattern(pattern).build())
            .await?;
        debug!("已启用请求拦截: {}", url_pattern);

        let page = self.page.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let headers = match serde_json::to_value(&event.request.headers) {
                    Ok(JsonValue::Object(map)) => map
                        .into_iter()
                        .map(|(k, v)| (k, v.as_str().map(str::to_string).unwrap_or_default()))
                        .collect(),
                    _ => Vec::new(),
                };
                let request = SubmissionRequest {
                    url: event.request.url.clone(),
                    method: event.request.method.clone(),
                    headers,
                    body: event
                        .request
                        .post_data_entries
                        .as_deref()
                        .and_then(decode_post_body),
                };

                let mut params = ContinueRequestParams::new(event.request_id.clone());
                if let Some(rewritten) = rewriter(&request) {
                    debug!("改写提交请求: {} {}", rewritten.method, rewritten.url);
                    params.post_data = rewritten
                        .body
                        .map(|body| Binary::from(BASE64.encode(body.as_bytes())));
                    params.headers = Some(
                        rewritten
                            .headers
                            .iter()
                            .map(|(k, v)| HeaderEntry::new(k.clone(), v.clone()))
                            .collect(),
                    );
                }
                if let Err(e) = page.execute(params).await {
                    warn!("放行被拦截的请求失败: {}", e);
                }
            }
        });

        if let Ok(mut tasks) = self.interceptors.lock() {
            tasks.push(task);
        }
        Ok(())
    }

    async fn capture_page(&self) -> PageCapture {
        let limit = self.action_timeout;
        let markup = match bounded("page content", limit, async {
            Ok::<_, DriverError>(self.page.content().await?)
        })
        .await
        {
            Ok(html) => Some(html),
            Err(e) => {
                warn!("获取页面 HTML 失败: {}", e);
                None
            }
        };

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        let image_png = match bounded("screenshot", limit, async {
            Ok::<_, DriverError>(self.page.screenshot(params).await?)
        })
        .await
        {
            Ok(png) => Some(png),
            Err(e) => {
                warn!("页面截图失败: {}", e);
                None
            }
        };

        PageCapture { markup, image_png }
    }
}

#[cfg(test)]
mod tests {
    use base64::Engine as _;

    use super::*;

    fn link(href: &str, visible: bool) -> LinkInfo {
        LinkInfo {
            href: href.to_string(),
            raw: href.trim_start_matches("https://portal.example.net").to_string(),
            visible,
        }
    }

    #[test]
    fn record_link_skips_longer_ids_with_the_same_prefix() {
        let links = vec![
            link("https://portal.example.net/manager/project/details/42", true),
            link("https://portal.example.net/manager/project/details/4", true),
        ];
        assert_eq!(
            pick_link(&links, "/manager/project/details/4"),
            LinkMatch::Visible(1)
        );
        assert_eq!(
            pick_link(&links, "/manager/project/details/42"),
            LinkMatch::Visible(0)
        );
    }

    #[test]
    fn record_link_reports_hidden_and_missing() {
        let links = vec![
            link("https://portal.example.net/manager/project/details/42", true),
            link("https://portal.example.net/manager/project/details/4?tab=log", false),
        ];
        assert_eq!(
            pick_link(&links, "/manager/project/details/4"),
            LinkMatch::Hidden
        );
        assert_eq!(
            pick_link(&links, "/manager/project/details/5"),
            LinkMatch::Missing
        );
    }

    #[test]
    fn post_body_is_rebuilt_from_base64_chunks() {
        let entries: Vec<PostDataEntry> = serde_json::from_value(serde_json::json!([
            { "bytes": BASE64.encode("username=alice&") },
            {},
            { "bytes": BASE64.encode("csrf_token=abc") },
        ]))
        .unwrap();
        assert_eq!(
            decode_post_body(&entries).as_deref(),
            Some("username=alice&csrf_token=abc")
        );
        assert_eq!(decode_post_body(&[]), None);
    }

    #[tokio::test]
    async fn stalled_action_turns_into_timeout() {
        let result: DriverResult<()> = bounded(
            "click",
            Duration::from_millis(20),
            std::future::pending::<DriverResult<()>>(),
        )
        .await;
        match result {
            Err(DriverError::Timeout { what, duration }) => {
                assert_eq!(what, "click");
                assert_eq!(duration, Duration::from_millis(20));
            }
            other => panic!("unexpected: {:?}", other),
        }

        let done = bounded("click", Duration::from_millis(20), async { Ok::<_, DriverError>(7) }).await;
        assert_eq!(done.unwrap(), 7);
    }
}
