//! 任务处理上下文
//!
//! 封装"我正在处理队列中的第几个任务"这一信息，并收集过程中的软警告

use std::fmt::Display;

use crate::models::job::Job;

/// 任务处理上下文
#[derive(Debug, Clone)]
pub struct JobCtx {
    /// 任务在队列中的序号（从1开始）
    pub ordinal: usize,

    /// 队列总数（仅用于日志显示）
    pub total: usize,

    /// 目标记录的路径标识
    pub path_token: String,

    /// 不影响结果的警告
    pub warnings: Vec<String>,
}

impl JobCtx {
    pub fn new(job: &Job, total: usize) -> Self {
        Self {
            ordinal: job.ordinal,
            total,
            path_token: job.target.path_token.clone(),
            warnings: Vec::new(),
        }
    }

    /// 日志前缀
    pub fn tag(&self) -> String {
        format!("[任务 {}]", self.ordinal)
    }

    /// 诊断快照标签
    pub fn capture_label(&self, kind: impl Display) -> String {
        format!("job-{}-{}", self.ordinal, kind)
    }
}

impl Display for JobCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[任务 {}/{} 记录#{}]",
            self.ordinal, self.total, self.path_token
        )
    }
}
