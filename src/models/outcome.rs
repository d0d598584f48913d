//! 任务结果与运行报告

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, FailureKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Failure,
}

/// 单个任务的最终结果，每个任务恰好产生一个
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub ordinal: usize,
    pub target: String,
    pub status: OutcomeStatus,
    pub error_kind: Option<FailureKind>,
    pub error_summary: Option<String>,
    pub artifacts: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

impl Outcome {
    pub fn success(ordinal: usize, target: impl Into<String>, warnings: Vec<String>) -> Self {
        Self {
            ordinal,
            target: target.into(),
            status: OutcomeStatus::Success,
            error_kind: None,
            error_summary: None,
            artifacts: Vec::new(),
            warnings,
        }
    }

    pub fn failure(
        ordinal: usize,
        target: impl Into<String>,
        error: &AppError,
        artifacts: Vec<PathBuf>,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            ordinal,
            target: target.into(),
            status: OutcomeStatus::Failure,
            error_kind: Some(error.kind()),
            error_summary: Some(error.to_string()),
            artifacts,
            warnings,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// 整次运行的结构化报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<Outcome>,
}

impl RunReport {
    pub fn new(started_at: DateTime<Local>, outcomes: Vec<Outcome>) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        let failed = outcomes.len() - succeeded;
        Self {
            started_at,
            finished_at: Local::now(),
            succeeded,
            failed,
            outcomes,
        }
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// 只有零失败才算成功
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// 把报告写入目录，返回文件路径
    pub async fn write_json(&self, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("无法创建目录: {}", dir.display()))?;
        let path = dir.join(format!(
            "run-report-{}.json",
            self.finished_at.format("%Y%m%d-%H%M%S")
        ));
        let body = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("无法写入运行报告: {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_and_final_status() {
        let err = AppError::NavigationMismatch {
            expected_token: "/details/2".into(),
            actual_url: "https://x/dashboard".into(),
        };
        let outcomes = vec![
            Outcome::success(1, "a", vec![]),
            Outcome::failure(2, "b", &err, vec![PathBuf::from("job-2.png")], vec![]),
            Outcome::success(3, "c", vec!["确认提示未出现".into()]),
        ];
        let report = RunReport::new(Local::now(), outcomes);
        assert_eq!(report.total(), 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert!(!report.is_success());
        assert_eq!(
            report.outcomes[1].error_kind,
            Some(FailureKind::NavigationMismatch)
        );
    }

    #[test]
    fn report_is_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let report = RunReport::new(Local::now(), vec![Outcome::success(1, "a", vec![])]);
        let path = tokio_test::block_on(report.write_json(dir.path())).unwrap();
        let body = std::fs::read_to_string(path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["succeeded"], 1);
        assert_eq!(parsed["outcomes"][0]["status"], "success");
    }
}
