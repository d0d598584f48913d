use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::job::{FieldValue, Job};
use crate::models::loaders::{load_workflow_file, WorkflowFile};
use crate::models::strategy::Strategy;

/// 浏览器获取方式
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BrowserMode {
    /// 启动新的浏览器
    Launch {
        headless: bool,
        executable: Option<PathBuf>,
    },
    /// 连接已经开着调试端口的浏览器
    Connect { port: u16 },
}

/// 各挂起点的超时
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Timeouts {
    /// 单个定位策略的尝试时长
    pub attempt: Duration,
    /// 等待网络空闲
    pub settle: Duration,
    /// 等待选择确认 / 提交成功提示
    pub confirm: Duration,
    /// 单次页面操作（导航、点击、按键、脚本）
    pub action: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            attempt: Duration::from_millis(5_000),
            settle: Duration::from_millis(20_000),
            confirm: Duration::from_millis(15_000),
            action: Duration::from_millis(30_000),
        }
    }
}

/// CSRF 令牌设置
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsrfSettings {
    /// 额外的令牌 cookie 名（优先于内置约定）
    pub cookie_names: Vec<String>,
    /// 令牌写入的表单字段名
    pub field_names: Vec<String>,
    /// 需要拦截的登录提交请求地址（通配符）
    pub submission_pattern: String,
}

impl Default for CsrfSettings {
    fn default() -> Self {
        Self {
            cookie_names: Vec::new(),
            field_names: vec!["_token".to_string()],
            submission_pattern: "*login*".to_string(),
        }
    }
}

/// 登录凭据
#[derive(Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub workplace: Option<String>,
    pub desk_number: Option<String>,
    pub remember_me: Option<bool>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("workplace", &self.workplace)
            .field("desk_number", &self.desk_number)
            .field("remember_me", &self.remember_me)
            .finish()
    }
}

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    pub browser: BrowserMode,
    /// 登录入口地址
    pub entry_url: String,
    /// 判断"当前在登录页"的正则，默认由入口地址推导
    pub entry_pattern: Option<String>,
    pub credentials: Credentials,
    /// 诊断快照与运行报告目录
    pub artifacts_dir: PathBuf,
    /// 输出日志文件
    pub output_log_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    pub timeouts: Timeouts,
    pub csrf: CsrfSettings,
    /// 界面声明（登录页、导航、表单）
    pub workflow: WorkflowFile,
    /// 有序任务队列
    pub jobs: Vec<Job>,
}

/// 单任务模式下环境变量与表单字段的对应关系
const ENV_FIELDS: [(&str, &str); 4] = [
    ("COMM_TYPE", "Communication Type"),
    ("COMM_WITH_CLIENT", "Communicate With Client"),
    ("CALL_TYPE", "Call Type"),
    ("COMMENTS", "Comments"),
];

impl Config {
    /// 从进程环境加载；`JOBS_FILE` 指向的工作流文件会被一起读入
    pub async fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        let workflow = match non_empty(&vars, "JOBS_FILE") {
            Some(path) => Some(
                load_workflow_file(Path::new(&path))
                    .await
                    .map_err(|e| ConfigError::InvalidWorkflow {
                        path: path.clone(),
                        reason: format!("{:#}", e),
                    })?,
            ),
            None => None,
        };
        Self::from_vars(&vars, workflow)
    }

    /// 从给定变量表构建并校验配置
    pub fn from_vars(
        vars: &HashMap<String, String>,
        workflow: Option<WorkflowFile>,
    ) -> Result<Self, ConfigError> {
        let entry_url = required(vars, "LOGIN_URL")?;
        url::Url::parse(&entry_url).map_err(|_| ConfigError::EnvVarParseFailed {
            var_name: "LOGIN_URL".to_string(),
            value: entry_url.clone(),
            expected_type: "URL".to_string(),
        })?;

        let credentials = Credentials {
            username: required(vars, "LOGIN_USERNAME")?,
            password: required(vars, "LOGIN_PASSWORD")?,
            workplace: non_empty(vars, "WORKPLACE"),
            desk_number: non_empty(vars, "DESK_NUMBER"),
            remember_me: non_empty(vars, "REMEMBER_ME").map(|v| parse_flag(&v)),
        };

        let browser = match non_empty(vars, "BROWSER_DEBUG_PORT") {
            Some(port) => BrowserMode::Connect {
                port: parse_var("BROWSER_DEBUG_PORT", &port, "u16")?,
            },
            None => BrowserMode::Launch {
                headless: non_empty(vars, "HEADED").is_none()
                    && non_empty(vars, "PWDEBUG").is_none(),
                executable: non_empty(vars, "CHROME_EXECUTABLE").map(PathBuf::from),
            },
        };

        let defaults = Timeouts::default();
        let timeouts = Timeouts {
            attempt: millis(vars, "ATTEMPT_TIMEOUT_MS", defaults.attempt)?,
            settle: millis(vars, "SETTLE_TIMEOUT_MS", defaults.settle)?,
            confirm: millis(vars, "CONFIRM_TIMEOUT_MS", defaults.confirm)?,
            action: millis(vars, "ACTION_TIMEOUT_MS", defaults.action)?,
        };

        let mut csrf = CsrfSettings::default();
        if let Some(names) = non_empty(vars, "CSRF_COOKIE_NAMES") {
            csrf.cookie_names = split_list(&names);
        }
        if let Some(names) = non_empty(vars, "CSRF_FIELD_NAMES") {
            csrf.field_names = split_list(&names);
        }
        if let Some(pattern) = non_empty(vars, "CSRF_SUBMISSION_PATTERN") {
            csrf.submission_pattern = pattern;
        }

        let (mut workflow, origin) = match workflow {
            Some(w) => (w, vars.get("JOBS_FILE").cloned().unwrap_or_default()),
            None => (single_job_workflow(vars)?, "environment".to_string()),
        };
        apply_selector_overrides(vars, &mut workflow);

        let jobs = workflow.jobs();
        if jobs.is_empty() {
            return Err(ConfigError::EmptyQueue);
        }
        workflow.validate(&jobs, &origin)?;

        let entry_pattern = non_empty(vars, "LOGIN_URL_PATTERN");
        if let Some(pattern) = &entry_pattern {
            regex::Regex::new(pattern).map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: "LOGIN_URL_PATTERN".to_string(),
                value: pattern.clone(),
                expected_type: "regex".to_string(),
            })?;
        }

        Ok(Self {
            browser,
            entry_url,
            entry_pattern,
            credentials,
            artifacts_dir: PathBuf::from(
                non_empty(vars, "ARTIFACTS_DIR").unwrap_or_else(|| "artifacts".to_string()),
            ),
            output_log_file: non_empty(vars, "OUTPUT_LOG_FILE")
                .unwrap_or_else(|| "output.txt".to_string()),
            verbose_logging: non_empty(vars, "VERBOSE_LOGGING")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            timeouts,
            csrf,
            workflow,
            jobs,
        })
    }
}

/// 环境变量里的选择器覆盖，排在对应策略表最前面；两种队列来源都生效
fn apply_selector_overrides(vars: &HashMap<String, String>, workflow: &mut WorkflowFile) {
    if let Some(selector) = non_empty(vars, "POST_LOGIN_READY_SELECTOR") {
        workflow.login.ready_selector = Some(selector);
    }
    if let Some(selector) = non_empty(vars, "CALL_LOG_BUTTON_SELECTOR") {
        workflow.form.open.insert(0, Strategy::override_selector(selector));
    }
    if let Some(selector) = non_empty(vars, "FORM_SUBMIT_SELECTOR") {
        workflow.form.submit.insert(0, Strategy::override_selector(selector));
    }
    if let Some(selector) = non_empty(vars, "CONFIRM_SELECTOR") {
        workflow.form.confirm = Some(selector);
    }
    if let Some(selector) = non_empty(vars, "LISTING_SELECTOR") {
        workflow
            .navigation
            .listing
            .insert(0, Strategy::override_selector(selector));
    }
}

/// 没有工作流文件时，用 `PROJECT_URL` 等变量构建单任务队列
fn single_job_workflow(vars: &HashMap<String, String>) -> Result<WorkflowFile, ConfigError> {
    let project_url = required(vars, "PROJECT_URL")?;
    let mut workflow = WorkflowFile::default();

    let mut entry = crate::models::loaders::JobEntry {
        target: project_url,
        path_token: non_empty(vars, "PROJECT_PATH_TOKEN"),
        search_text: non_empty(vars, "PROJECT_SEARCH_TEXT"),
        fields: Default::default(),
    };
    for (var, field) in ENV_FIELDS {
        if let Some(value) = non_empty(vars, var) {
            // 多选值用 | 分隔
            let value = if value.contains('|') {
                FieldValue::Many(split_on(&value, '|'))
            } else {
                FieldValue::One(value)
            };
            entry.fields.insert(field.to_string(), value);
        }
    }
    workflow.jobs.push(entry);
    Ok(workflow)
}

fn non_empty(vars: &HashMap<String, String>, name: &str) -> Option<String> {
    vars.get(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    non_empty(vars, name).ok_or_else(|| ConfigError::EnvVarNotFound {
        var_name: name.to_string(),
    })
}

fn parse_var<T: std::str::FromStr>(
    name: &str,
    value: &str,
    expected: &str,
) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::EnvVarParseFailed {
        var_name: name.to_string(),
        value: value.to_string(),
        expected_type: expected.to_string(),
    })
}

fn millis(
    vars: &HashMap<String, String>,
    name: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match non_empty(vars, name) {
        Some(v) => Ok(Duration::from_millis(parse_var(name, &v, "毫秒数")?)),
        None => Ok(default),
    }
}

/// `true` / `yes` / `1` 视为开启
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "1" | "on"
    )
}

fn split_list(value: &str) -> Vec<String> {
    split_on(value, ',')
}

fn split_on(value: &str, sep: char) -> Vec<String> {
    value
        .split(sep)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
