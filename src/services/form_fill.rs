//! 表单填写服务 - 业务能力层
//!
//! 按字段声明的控件类型分派：单选、多选列表、自由文本。

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{AppResult, ResolutionFailure};
use crate::models::job::FieldValue;
use crate::models::strategy::Strategy;
use crate::models::surface::{ControlKind, FieldSpec, FormSpec};
use crate::services::locator::{merge_failures, LocatorResolver};

/// 单个表单的填写结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillReport {
    /// 成功写入的字段
    pub applied: Vec<String>,
    /// 未提供值而跳过的字段
    pub skipped: Vec<String>,
    /// 软警告（可选字段未设置、选择未确认、部分标签未选中）
    pub warnings: Vec<String>,
}

impl FillReport {
    fn warn(&mut self, message: String) {
        warn!("⚠️ {}", message);
        self.warnings.push(message);
    }
}

/// 表单填写引擎
///
/// 职责：
/// - 按表单声明顺序逐个处理字段
/// - 未提供值的字段直接跳过，不填默认值
/// - 必填字段定位失败使任务失败，可选字段只记警告
pub struct FormFillEngine {
    resolver: LocatorResolver,
    spec: FormSpec,
    confirm_timeout: Duration,
}

impl FormFillEngine {
    pub fn new(resolver: LocatorResolver, spec: FormSpec, confirm_timeout: Duration) -> Self {
        Self {
            resolver,
            spec,
            confirm_timeout,
        }
    }

    pub fn spec(&self) -> &FormSpec {
        &self.spec
    }

    /// 填写全部字段
    pub async fn fill(&self, values: &BTreeMap<String, FieldValue>) -> AppResult<FillReport> {
        let mut report = FillReport::default();

        for field in &self.spec.fields {
            let Some(value) = values.get(&field.name).filter(|v| !v.is_blank()) else {
                debug!("字段 {} 未提供值，跳过", field.name);
                report.skipped.push(field.name.clone());
                continue;
            };

            let result = match field.kind {
                ControlKind::SingleChoice => {
                    self.fill_single(field, &value.as_scalar(), &mut report).await
                }
                ControlKind::MultiChoice => self.fill_multi(field, value, &mut report).await,
                ControlKind::FreeText => self.fill_text(field, &value.as_scalar()).await,
            };

            match result {
                Ok(()) => {
                    info!("✓ 字段已填写: {}", field.name);
                    report.applied.push(field.name.clone());
                }
                Err(failure) if field.required => return Err(failure.into()),
                Err(failure) => {
                    report.warn(format!("可选字段 {} 未设置: {}", field.name, failure));
                }
            }
        }

        for name in values.keys() {
            if self.spec.field(name).is_none() {
                report.warn(format!("表单中没有声明字段 {}，忽略其值", name));
            }
        }

        Ok(report)
    }

    /// 单选：按可见标签选中，再等待控件显示该标签
    async fn fill_single(
        &self,
        field: &FieldSpec,
        label: &str,
        report: &mut FillReport,
    ) -> Result<(), ResolutionFailure> {
        let candidates = field.candidates();
        let labels = [label.to_string()];

        let selected = match self.resolver.select(&field.name, &candidates, &labels).await {
            Ok(resolved) => resolved.strategy,
            Err(first) => {
                debug!("{} 不是原生下拉框，改为展开后点击选项", field.name);
                let opened = self
                    .resolver
                    .click(&field.name, &candidates)
                    .await
                    .map_err(|second| merge_failures(&field.name, vec![first.clone(), second]))?;
                let option = self.option_candidates(label);
                self.resolver
                    .click(&format!("{} → {}", field.name, label), &option)
                    .await
                    .map_err(|third| merge_failures(&field.name, vec![first, third]))?;
                opened.strategy
            }
        };

        if !self.confirm_selection(&selected, label).await {
            report.warn(format!(
                "{} 选择 \"{}\" 后未观察到控件显示该值",
                field.name, label
            ));
        }
        Ok(())
    }

    /// 多选：先尝试一次性选中，不行再逐项追加或点击移入
    async fn fill_multi(
        &self,
        field: &FieldSpec,
        value: &FieldValue,
        report: &mut FillReport,
    ) -> Result<(), ResolutionFailure> {
        let labels: Vec<String> = value
            .labels()
            .into_iter()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        let candidates = field.candidates();

        let bulk = match self.resolver.select(&field.name, &candidates, &labels).await {
            Ok(_) => return Ok(()),
            Err(e) => e,
        };
        debug!("{} 不支持一次多选，逐项选择 {} 个标签", field.name, labels.len());

        let mut selected = 0;
        let mut failures = vec![bulk];
        let mut transfer_available = true;
        // 原生多选框逐个追加；确认是组件后不再尝试
        let mut native = true;
        for label in &labels {
            if native
                && self
                    .resolver
                    .add_option(&field.name, &candidates, label)
                    .await
                    .is_ok()
            {
                selected += 1;
                continue;
            }

            let option = self.option_candidates(label);
            match self
                .resolver
                .click(&format!("{} → {}", field.name, label), &option)
                .await
            {
                Ok(_) => {
                    selected += 1;
                    native = false;
                    if transfer_available {
                        transfer_available = self.move_into_selected(&field.name).await;
                    }
                }
                Err(e) => {
                    report.warn(format!("{} 中找不到选项 \"{}\"，继续", field.name, label));
                    failures.push(e);
                }
            }
        }

        if selected == 0 {
            return Err(merge_failures(&field.name, failures));
        }
        info!("{}: 已选中 {}/{} 个标签", field.name, selected, labels.len());
        Ok(())
    }

    /// 自由文本：候选列表本身包含备用的文本控件查询
    async fn fill_text(&self, field: &FieldSpec, text: &str) -> Result<(), ResolutionFailure> {
        self.resolver
            .fill(&field.name, &field.candidates(), text)
            .await
            .map(|_| ())
    }

    /// 点击双列表控件的"移入"按钮；没有该按钮时返回 false
    async fn move_into_selected(&self, field: &str) -> bool {
        if self.spec.transfer.is_empty() {
            return false;
        }
        match self
            .resolver
            .click(&format!("{} 移入按钮", field), &self.spec.transfer)
            .await
        {
            Ok(_) => true,
            Err(_) => {
                debug!("{} 没有移入按钮，点击选项即视为选中", field);
                false
            }
        }
    }

    fn option_candidates(&self, label: &str) -> Vec<Strategy> {
        vec![
            Strategy::within(self.spec.listbox_container.clone(), label),
            Strategy::role("option", format!("^\\s*{}\\s*$", regex::escape(label))),
        ]
    }

    /// 在限时内轮询控件的显示值
    async fn confirm_selection(&self, strategy: &Strategy, label: &str) -> bool {
        let driver = self.resolver.driver();
        let deadline = Instant::now() + self.confirm_timeout;
        let wanted = label.trim().to_lowercase();

        loop {
            let attempt = async {
                let handle = driver
                    .locate(strategy, self.resolver.attempt_timeout())
                    .await?;
                driver.read_value(&handle).await
            };
            match attempt.await {
                Ok(shown) if shown.to_lowercase().contains(&wanted) => return true,
                Ok(shown) => debug!("控件当前显示 \"{}\"，等待 \"{}\"", shown, label),
                Err(e) => debug!("读取控件值失败: {}", e),
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }
}
