//! CSRF 令牌桥接 - 业务能力层
//!
//! 目标系统使用双重提交 cookie：cookie 中的令牌必须同时出现在提交内容里。
//! 同时在 DOM 层（隐藏字段）和网络层（请求体）补上令牌。

use std::sync::Arc;

use phf::phf_set;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::config::CsrfSettings;
use crate::infrastructure::{SubmissionRequest, SubmissionRewriter};
use crate::models::strategy::Strategy;
use crate::services::locator::LocatorResolver;

/// 常见框架使用的令牌 cookie 名（小写）
static KNOWN_TOKEN_COOKIES: phf::Set<&'static str> = phf_set! {
    "xsrf-token",
    "csrf-token",
    "csrftoken",
    "csrf_token",
    "_csrf",
    "_csrf_token",
    "x-csrf-token",
};

/// 从会话 cookie 中取出的令牌
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityToken {
    pub cookie_name: String,
    pub value: String,
}

/// CSRF 令牌桥接
#[derive(Clone)]
pub struct CsrfBridge {
    resolver: LocatorResolver,
    settings: CsrfSettings,
}

impl CsrfBridge {
    pub fn new(resolver: LocatorResolver, settings: CsrfSettings) -> Self {
        Self { resolver, settings }
    }

    /// 判断 cookie 名是否符合令牌命名约定
    pub fn is_token_cookie(&self, name: &str) -> bool {
        self.settings
            .cookie_names
            .iter()
            .any(|n| n.eq_ignore_ascii_case(name))
            || KNOWN_TOKEN_COOKIES.contains(name.to_ascii_lowercase().as_str())
    }

    /// 读取会话 cookie，取第一个名称匹配的值
    ///
    /// 找不到令牌不是错误：部分部署不需要它，只记录一条降级警告。
    pub async fn harvest(&self) -> Option<SecurityToken> {
        let cookies = match self.resolver.driver().read_cookies().await {
            Ok(cookies) => cookies,
            Err(e) => {
                warn!("⚠️ 读取 cookie 失败，继续但不带 CSRF 令牌: {}", e);
                return None;
            }
        };

        let found = cookies.into_iter().find(|c| self.is_token_cookie(&c.name));
        match found {
            Some(cookie) => {
                let value = urlencoding::decode(&cookie.value)
                    .map(|v| v.into_owned())
                    .unwrap_or(cookie.value);
                info!("✓ 找到 CSRF 令牌 cookie: {}", cookie.name);
                Some(SecurityToken {
                    cookie_name: cookie.name,
                    value,
                })
            }
            None => {
                warn!("⚠️ 未找到 CSRF 令牌 cookie，继续登录（置信度降低）");
                None
            }
        }
    }

    /// 确保登录表单上有携带令牌的隐藏字段，返回写入的字段数
    pub async fn inject(&self, form: &[Strategy], token: &SecurityToken) -> usize {
        let resolved = match self.resolver.resolve("登录表单", form).await {
            Ok(r) => r,
            Err(e) => {
                warn!("⚠️ 未找到登录表单，跳过隐藏字段注入: {}", e);
                return 0;
            }
        };

        let mut written = 0;
        for name in &self.settings.field_names {
            match self
                .resolver
                .driver()
                .set_hidden_field(&resolved.handle, name, &token.value)
                .await
            {
                Ok(created) => {
                    debug!(
                        "隐藏字段 {} 已{}",
                        name,
                        if created { "创建" } else { "更新" }
                    );
                    written += 1;
                }
                Err(e) => warn!("⚠️ 写入隐藏字段 {} 失败: {}", name, e),
            }
        }
        written
    }

    /// 注册登录提交请求的拦截改写
    pub async fn install_interception(&self, token: &SecurityToken) {
        let value = token.value.clone();
        let fields = self.settings.field_names.clone();
        let rewriter: SubmissionRewriter =
            Arc::new(move |request: &SubmissionRequest| augment_submission(request, &value, &fields));

        if let Err(e) = self
            .resolver
            .driver()
            .intercept_submission(&self.settings.submission_pattern, rewriter)
            .await
        {
            warn!("⚠️ 无法拦截登录提交请求，仅依赖隐藏字段: {}", e);
        }
    }
}

/// 在提交请求体中补上令牌
///
/// 已有同名字段时不动；表单编码和 JSON 两种请求体都支持，其它类型原样放行。
/// 请求体变化后重新计算 Content-Length。
pub fn augment_submission(
    request: &SubmissionRequest,
    token: &str,
    field_names: &[String],
) -> Option<SubmissionRequest> {
    if !request.method.eq_ignore_ascii_case("POST") {
        return None;
    }
    let content_type = request
        .header("content-type")
        .unwrap_or("application/x-www-form-urlencoded")
        .to_ascii_lowercase();
    let body = request.body.clone().unwrap_or_default();

    let new_body = if content_type.contains("application/json") {
        let mut json: JsonValue = if body.trim().is_empty() {
            JsonValue::Object(Default::default())
        } else {
            serde_json::from_str(&body).ok()?
        };
        let object = json.as_object_mut()?;
        let mut changed = false;
        for name in field_names {
            if !object.contains_key(name) {
                object.insert(name.clone(), JsonValue::String(token.to_string()));
                changed = true;
            }
        }
        if !changed {
            return None;
        }
        serde_json::to_string(&json).ok()?
    } else if content_type.contains("application/x-www-form-urlencoded") {
        let present: Vec<String> = form_urlencoded::parse(body.as_bytes())
            .map(|(k, _)| k.into_owned())
            .collect();
        let missing: Vec<&String> = field_names
            .iter()
            .filter(|n| !present.iter().any(|p| p == *n))
            .collect();
        if missing.is_empty() {
            return None;
        }
        let mut serializer = form_urlencoded::Serializer::new(body);
        for name in missing {
            serializer.append_pair(name, token);
        }
        serializer.finish()
    } else {
        debug!("提交请求体类型 {} 不改写", content_type);
        return None;
    };

    let mut rewritten = request.clone();
    if rewritten.header("content-length").is_some() {
        rewritten.set_header("Content-Length", new_body.len().to_string());
    }
    rewritten.body = Some(new_body);
    Some(rewritten)
}
