use crate::error::ConfigError;
use crate::models::job::{FieldValue, Job, TargetRef};
use crate::models::strategy::Strategy;
use crate::models::surface::{FormSpec, LoginSpec, NavigationSpec};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

/// 工作流文件
///
/// ```toml
/// [navigation]
/// listing = [{ by = "override", selector = "#menu-projects" }]
///
/// [[jobs]]
/// target = "https://portal.example.net/manager/project/details/42"
/// [jobs.fields]
/// "Communication Type" = "Microsoft Team"
/// "Communicate With Client" = ["Successfully Communicated"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkflowFile {
    pub login: LoginSpec,
    pub navigation: NavigationSpec,
    pub form: FormSpec,
    pub jobs: Vec<JobEntry>,
}

/// 工作流文件中的一条任务
#[derive(Debug, Clone, Deserialize)]
pub struct JobEntry {
    pub target: String,
    #[serde(default)]
    pub path_token: Option<String>,
    #[serde(default)]
    pub search_text: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl JobEntry {
    fn target_ref(&self) -> TargetRef {
        let mut target = TargetRef::new(self.target.clone());
        if let Some(token) = self.path_token.as_deref().filter(|t| !t.trim().is_empty()) {
            target = target.with_path_token(token.trim());
        }
        if let Some(text) = &self.search_text {
            target = target.with_search_text(text.clone());
        }
        target
    }
}

impl WorkflowFile {
    /// 按声明顺序生成任务队列，序号从 1 开始
    pub fn jobs(&self) -> Vec<Job> {
        self.jobs
            .iter()
            .enumerate()
            .map(|(idx, entry)| Job::new(idx + 1, entry.target_ref(), entry.fields.clone()))
            .collect()
    }

    /// 校验所有策略与必填字段
    pub fn validate(&self, jobs: &[Job], origin: &str) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidWorkflow {
            path: origin.to_string(),
            reason,
        };

        let login = &self.login;
        let nav = &self.navigation;
        let form = &self.form;
        let groups: [(&str, &[Strategy]); 14] = [
            ("login.username", login.username.as_slice()),
            ("login.password", login.password.as_slice()),
            ("login.workplace", login.workplace.as_slice()),
            ("login.desk_number", login.desk_number.as_slice()),
            ("login.remember_me", login.remember_me.as_slice()),
            ("login.submit", login.submit.as_slice()),
            ("login.form", login.form.as_slice()),
            ("navigation.listing", nav.listing.as_slice()),
            ("navigation.reveal_menu", nav.reveal_menu.as_slice()),
            ("navigation.search_input", nav.search_input.as_slice()),
            ("form.open", form.open.as_slice()),
            ("form.ready", form.ready.as_slice()),
            ("form.submit", form.submit.as_slice()),
            ("form.transfer", form.transfer.as_slice()),
        ];
        for (name, strategies) in groups {
            for s in strategies {
                s.validate().map_err(|e| invalid(format!("{} 中的 {}: {}", name, s, e)))?;
            }
        }
        for field in &form.fields {
            for s in field.overrides.iter().chain(field.fallbacks.iter()) {
                s.validate()
                    .map_err(|e| invalid(format!("字段 '{}' 中的 {}: {}", field.name, s, e)))?;
            }
        }
        for required in form.fields.iter().filter(|f| f.required) {
            for job in jobs {
                if job.value_of(&required.name).is_none() {
                    return Err(ConfigError::MissingRequiredField {
                        ordinal: job.ordinal,
                        field: required.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// 从 TOML 文件加载工作流
pub async fn load_workflow_file(path: &Path) -> Result<WorkflowFile> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取工作流文件: {}", path.display()))?;

    let workflow: WorkflowFile = toml::from_str(&content)
        .with_context(|| format!("无法解析工作流文件: {}", path.display()))?;

    tracing::info!(
        "已加载工作流文件 {}: {} 个任务, {} 个字段声明",
        path.display(),
        workflow.jobs.len(),
        workflow.form.fields.len()
    );

    Ok(workflow)
}
