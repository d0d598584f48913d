//! 控件定位服务 - 业务能力层
//!
//! 一个通用算法：按顺序尝试候选策略，第一个"找到 + 可见 + 操作成功"的胜出。
//! 点击、填写、选择、读取只是最后一步操作不同。

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tracing::{debug, info};

use crate::error::{Attempt, AttemptOutcome, DriverError, DriverResult, ResolutionFailure};
use crate::infrastructure::{BrowserDriver, ElementHandle};
use crate::models::strategy::{with_overrides_first, Strategy};

/// 定位成功的结果
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    pub handle: ElementHandle,
    pub value: T,
    pub strategy: Strategy,
    pub attempts: Vec<Attempt>,
}

/// 控件定位器
///
/// 职责：
/// - 严格按声明顺序尝试策略（覆盖策略永远最先）
/// - 每次尝试单独限时，失败被吞掉并继续下一个
/// - 记录每次尝试，全部失败时随 `ResolutionFailure` 返回
#[derive(Clone)]
pub struct LocatorResolver {
    driver: Arc<dyn BrowserDriver>,
    attempt_timeout: Duration,
}

impl LocatorResolver {
    pub fn new(driver: Arc<dyn BrowserDriver>, attempt_timeout: Duration) -> Self {
        Self {
            driver,
            attempt_timeout,
        }
    }

    pub fn driver(&self) -> &Arc<dyn BrowserDriver> {
        &self.driver
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// 通用解析：对每个候选先定位，再执行 `action`
    pub async fn resolve_with<T, F>(
        &self,
        target: &str,
        candidates: &[Strategy],
        action: F,
    ) -> Result<Resolved<T>, ResolutionFailure>
    where
        F: for<'a> Fn(&'a dyn BrowserDriver, &'a ElementHandle) -> BoxFuture<'a, DriverResult<T>>,
    {
        let ordered = with_overrides_first(candidates);
        let mut attempts = Vec::with_capacity(ordered.len());
        let driver = self.driver.as_ref();

        for strategy in ordered {
            let started = Instant::now();
            let run = async {
                let handle = driver
                    .locate(&strategy, self.attempt_timeout)
                    .await
                    .map_err(|e| (false, e))?;
                let value = action(driver, &handle).await.map_err(|e| (true, e))?;
                Ok::<_, (bool, DriverError)>((handle, value))
            };

            // 定位本身会轮询到超时，这里多留一点余量给操作
            let bound = self.attempt_timeout + self.attempt_timeout / 2;
            let result = match tokio::time::timeout(bound, run).await {
                Ok(r) => r,
                Err(_) => Err((
                    false,
                    DriverError::Timeout {
                        what: strategy.to_string(),
                        duration: bound,
                    },
                )),
            };
            let elapsed_ms = started.elapsed().as_millis();

            match result {
                Ok((handle, value)) => {
                    info!("定位成功 → [{}] {}", target, strategy);
                    attempts.push(Attempt {
                        strategy: strategy.to_string(),
                        outcome: AttemptOutcome::Matched,
                        detail: Some(handle.description.clone()),
                        elapsed_ms,
                    });
                    return Ok(Resolved {
                        handle,
                        value,
                        strategy,
                        attempts,
                    });
                }
                Err((acted, err)) => {
                    let outcome = classify(acted, &err);
                    debug!(
                        "定位尝试失败 [{}] {} → {:?} ({} ms): {}",
                        target, strategy, outcome, elapsed_ms, err
                    );
                    attempts.push(Attempt {
                        strategy: strategy.to_string(),
                        outcome,
                        detail: Some(err.to_string()),
                        elapsed_ms,
                    });
                }
            }
        }

        debug!("[{}] 所有 {} 个候选策略均失败", target, attempts.len());
        Err(ResolutionFailure {
            target: target.to_string(),
            attempts,
        })
    }

    /// 只定位，不操作
    pub async fn resolve(
        &self,
        target: &str,
        candidates: &[Strategy],
    ) -> Result<Resolved<()>, ResolutionFailure> {
        self.resolve_with(target, candidates, |_, _| Box::pin(async { Ok(()) }))
            .await
    }

    /// 找到并点击
    pub async fn click(
        &self,
        target: &str,
        candidates: &[Strategy],
    ) -> Result<Resolved<()>, ResolutionFailure> {
        self.resolve_with(target, candidates, |d, el| d.click(el)).await
    }

    /// 找到并填写
    pub async fn fill(
        &self,
        target: &str,
        candidates: &[Strategy],
        value: &str,
    ) -> Result<Resolved<()>, ResolutionFailure> {
        let value = value.to_string();
        self.resolve_with(target, candidates, move |d, el| {
            let value = value.clone();
            Box::pin(async move { d.fill(el, &value).await })
        })
        .await
    }

    /// 找到并选择（一次选中全部标签）
    pub async fn select(
        &self,
        target: &str,
        candidates: &[Strategy],
        labels: &[String],
    ) -> Result<Resolved<()>, ResolutionFailure> {
        let labels = labels.to_vec();
        self.resolve_with(target, candidates, move |d, el| {
            let labels = labels.clone();
            Box::pin(async move { d.select_options(el, &labels).await })
        })
        .await
    }

    /// 找到并追加选中一个标签
    pub async fn add_option(
        &self,
        target: &str,
        candidates: &[Strategy],
        label: &str,
    ) -> Result<Resolved<()>, ResolutionFailure> {
        let label = label.to_string();
        self.resolve_with(target, candidates, move |d, el| {
            let label = label.clone();
            Box::pin(async move { d.add_selected_option(el, &label).await })
        })
        .await
    }

    /// 找到并读取当前值
    pub async fn read(
        &self,
        target: &str,
        candidates: &[Strategy],
    ) -> Result<Resolved<String>, ResolutionFailure> {
        self.resolve_with(target, candidates, |d, el| d.read_value(el))
            .await
    }
}

fn classify(acted: bool, err: &DriverError) -> AttemptOutcome {
    match err {
        DriverError::Timeout { .. } => AttemptOutcome::TimedOut,
        _ if acted => AttemptOutcome::ActionRejected,
        DriverError::NotFound { .. } => AttemptOutcome::NotFound,
        DriverError::NotVisible { .. } => AttemptOutcome::NotVisible,
        DriverError::ActionRejected { .. } => AttemptOutcome::ActionRejected,
        _ => AttemptOutcome::Failed,
    }
}

/// 合并两次解析失败的尝试记录（例如"先展开菜单再重试"）
pub fn merge_failures(target: &str, failures: Vec<ResolutionFailure>) -> ResolutionFailure {
    ResolutionFailure {
        target: target.to_string(),
        attempts: failures.into_iter().flat_map(|f| f.attempts).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_distinguishes_locate_from_action_failures() {
        let not_found = DriverError::NotFound {
            strategy: "css=#x".into(),
        };
        assert_eq!(classify(false, &not_found), AttemptOutcome::NotFound);
        assert_eq!(classify(true, &not_found), AttemptOutcome::ActionRejected);

        let timeout = DriverError::Timeout {
            what: "css=#x".into(),
            duration: Duration::from_secs(1),
        };
        assert_eq!(classify(true, &timeout), AttemptOutcome::TimedOut);
    }

    #[test]
    fn merged_failure_keeps_attempt_order() {
        let a = ResolutionFailure {
            target: "menu".into(),
            attempts: vec![Attempt {
                strategy: "css=a".into(),
                outcome: AttemptOutcome::NotFound,
                detail: None,
                elapsed_ms: 1,
            }],
        };
        let b = ResolutionFailure {
            target: "menu".into(),
            attempts: vec![Attempt {
                strategy: "css=b".into(),
                outcome: AttemptOutcome::NotVisible,
                detail: None,
                elapsed_ms: 2,
            }],
        };
        let merged = merge_failures("列表入口", vec![a, b]);
        assert_eq!(merged.target, "列表入口");
        let order: Vec<&str> = merged.attempts.iter().map(|a| a.strategy.as_str()).collect();
        assert_eq!(order, vec!["css=a", "css=b"]);
    }
}
