//! 目标应用的界面声明
//!
//! 登录页、导航入口、记录表单上每个逻辑控件的候选定位策略。
//! 全部是数据：部署方可以在工作流文件里覆盖，不需要改代码。

use serde::{Deserialize, Serialize};

use crate::models::strategy::Strategy;

/// 登录页控件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginSpec {
    pub username: Vec<Strategy>,
    pub password: Vec<Strategy>,
    pub workplace: Vec<Strategy>,
    pub desk_number: Vec<Strategy>,
    pub remember_me: Vec<Strategy>,
    pub submit: Vec<Strategy>,
    /// 登录表单本身（用于注入隐藏的 token 字段）
    pub form: Vec<Strategy>,
    /// 登录后证明页面已就绪的 CSS 选择器（尽力等待）
    pub ready_selector: Option<String>,
}

impl Default for LoginSpec {
    fn default() -> Self {
        Self {
            username: vec![
                Strategy::css("#username"),
                Strategy::css("input[name=\"username\"]"),
                Strategy::label("Username"),
                Strategy::css("input[type=\"email\"]"),
            ],
            password: vec![
                Strategy::css("#password"),
                Strategy::css("input[name=\"password\"]"),
                Strategy::css("input[type=\"password\"]"),
            ],
            workplace: vec![Strategy::label("Work Place"), Strategy::css("select")],
            desk_number: vec![
                Strategy::label("Desk Number"),
                Strategy::css("input[name*=\"desk\" i]"),
            ],
            remember_me: vec![
                Strategy::label("Remember Me"),
                Strategy::css("input[type=\"checkbox\"][name*=\"remember\" i]"),
            ],
            submit: vec![
                Strategy::role("button", "login"),
                Strategy::css("button[type=\"submit\"]"),
                Strategy::css("input[type=\"submit\"]"),
                Strategy::text(r"^\s*Login\s*$"),
                Strategy::text("Sign in|Sign In"),
            ],
            form: vec![
                Strategy::css("form:has(input[type=\"password\"])"),
                Strategy::css("form"),
            ],
            ready_selector: None,
        }
    }
}

/// 从登录后的页面走到目标记录所需的控件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationSpec {
    /// 打开记录列表的入口（菜单项、链接）
    pub listing: Vec<Strategy>,
    /// 展开被折叠的菜单
    pub reveal_menu: Vec<Strategy>,
    /// 列表页上的搜索框（可选的缩小范围步骤）
    pub search_input: Vec<Strategy>,
    /// 是否在找不到记录链接时尝试搜索
    pub search_enabled: bool,
}

impl Default for NavigationSpec {
    fn default() -> Self {
        Self {
            listing: vec![
                Strategy::text(r"^\s*Projects?\s*$"),
                Strategy::css("a[href*=\"/project\"]"),
                Strategy::role("link", "projects?"),
                Strategy::within("nav, [role=\"navigation\"], aside", "Projects"),
            ],
            reveal_menu: vec![
                Strategy::css(".navbar-toggler, .sidebar-toggle, .menu-toggle"),
                Strategy::css("[aria-expanded=\"false\"]"),
                Strategy::role("button", "menu|toggle navigation"),
            ],
            search_input: vec![
                Strategy::css("input[type=\"search\"]"),
                Strategy::role("searchbox", ".*"),
                Strategy::css("input[name*=\"search\" i]"),
            ],
            search_enabled: true,
        }
    }
}

/// 字段控件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    /// 单选（下拉框）
    SingleChoice,
    /// 多选列表
    MultiChoice,
    /// 自由文本
    FreeText,
}

/// 表单上的一个逻辑字段
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    /// 逻辑名称，即任务 `fields` 中的键
    pub name: String,
    pub kind: ControlKind,
    /// 页面上的标签文本，默认与名称相同
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub required: bool,
    /// 最先尝试的部署方覆盖
    #[serde(default)]
    pub overrides: Vec<Strategy>,
    /// 内置策略都失败后再试的备选
    #[serde(default)]
    pub fallbacks: Vec<Strategy>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: ControlKind) -> Self {
        Self {
            name: name.into(),
            kind,
            label: None,
            required: false,
            overrides: Vec::new(),
            fallbacks: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_fallbacks(mut self, fallbacks: Vec<Strategy>) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    pub fn label_text(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// 定位字段控件的完整候选列表
    pub fn candidates(&self) -> Vec<Strategy> {
        let label = self.label_text();
        let role = match self.kind {
            ControlKind::SingleChoice => "combobox",
            ControlKind::MultiChoice => "listbox",
            ControlKind::FreeText => "textbox",
        };
        let mut list = self.overrides.clone();
        list.push(Strategy::label(label));
        list.push(Strategy::role(role, format!("^{}$", regex::escape(label))));
        list.extend(self.fallbacks.iter().cloned());
        list
    }
}

/// 记录页上的表单
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormSpec {
    /// 打开表单（弹窗）的按钮
    pub open: Vec<Strategy>,
    /// 表单已打开的标志
    pub ready: Vec<Strategy>,
    pub submit: Vec<Strategy>,
    /// 提交成功提示的 CSS 选择器（尽力等待）
    pub confirm: Option<String>,
    /// 列表框容器，用于按项点击的回退
    pub listbox_container: String,
    /// 双列表控件中"移入已选"的按钮
    pub transfer: Vec<Strategy>,
    pub fields: Vec<FieldSpec>,
}

impl Default for FormSpec {
    fn default() -> Self {
        Self {
            open: vec![
                Strategy::role("button", r"call\s*log"),
                Strategy::text(r"\bCall\s*Log\b"),
            ],
            ready: vec![
                Strategy::role("dialog", r"call\s*log"),
                Strategy::role("button", "submit details"),
                Strategy::text("SUBMIT DETAILS"),
            ],
            submit: vec![
                Strategy::role("button", "submit details"),
                Strategy::text("SUBMIT DETAILS"),
                Strategy::css("button[type=\"submit\"]"),
            ],
            confirm: None,
            listbox_container: "[role=\"listbox\"]".to_string(),
            transfer: vec![
                Strategy::role("button", r"^\s*>\s*$"),
                Strategy::css("[data-icon=\"chevron-right\"]"),
                Strategy::css(".mdi-chevron-right"),
            ],
            fields: default_call_log_fields(),
        }
    }
}

impl FormSpec {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// 通话记录表单的默认字段
pub fn default_call_log_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("Communication Type", ControlKind::SingleChoice),
        FieldSpec::new("Communicate With Client", ControlKind::MultiChoice),
        FieldSpec::new("Call Type", ControlKind::SingleChoice).with_label("Call"),
        FieldSpec::new("Comments", ControlKind::FreeText).with_fallbacks(vec![
            Strategy::css("textarea"),
            Strategy::css("input[name*=\"comment\" i]"),
        ]),
    ]
}
