mod common;

use std::sync::Arc;

use call_log_submit::error::{AppError, FailureKind};
use call_log_submit::models::{FieldValue, JobStatus, OutcomeStatus};
use call_log_submit::{BatchOrchestrator, BrowserDriver};
use common::*;

fn call_log_fields() -> Vec<(&'static str, FieldValue)> {
    vec![
        ("Communication Type", "Microsoft Team".into()),
        (
            "Communicate With Client",
            vec!["Successfully Communicated"].into(),
        ),
        ("Call Type", "Inbound".into()),
        ("Comments", "季度回访".into()),
    ]
}

fn orchestrator(driver: &ScriptedDriver, config: &call_log_submit::Config) -> BatchOrchestrator {
    let driver: Arc<dyn BrowserDriver> = Arc::new(driver.clone());
    BatchOrchestrator::from_config(driver, config).unwrap()
}

#[tokio::test]
async fn every_job_gets_exactly_one_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let driver = portal(3);
    let fields = call_log_fields();
    let mut jobs = vec![job(1, 1, &fields), job(2, 2, &fields), job(3, 3, &fields)];
    let config = config(dir.path(), jobs.clone());

    let report = orchestrator(&driver, &config).run(&mut jobs).await.unwrap();

    assert_eq!(report.total(), 3);
    assert_eq!(report.succeeded, 3);
    assert!(report.is_success());
    let ordinals: Vec<usize> = report.outcomes.iter().map(|o| o.ordinal).collect();
    assert_eq!(ordinals, vec![1, 2, 3]);
    assert!(jobs.iter().all(|j| j.status() == JobStatus::Succeeded));
    assert_eq!(driver.login_count(), 1);
    assert_eq!(driver.clicks_on(SUBMIT), 3);
}

#[tokio::test]
async fn failing_job_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let driver = portal(3);
    driver.remove(&record_link(2));
    let fields = call_log_fields();
    let mut jobs = vec![job(1, 1, &fields), job(2, 2, &fields), job(3, 3, &fields)];
    let config = config(dir.path(), jobs.clone());

    let report = orchestrator(&driver, &config).run(&mut jobs).await.unwrap();

    let statuses: Vec<OutcomeStatus> = report.outcomes.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![
            OutcomeStatus::Success,
            OutcomeStatus::Failure,
            OutcomeStatus::Success
        ]
    );
    assert_eq!(report.failed, 1);
    assert!(!report.is_success());

    let failed = &report.outcomes[1];
    assert_eq!(failed.error_kind, Some(FailureKind::Resolution));
    assert!(failed.error_summary.as_deref().unwrap().contains("记录链接"));
    assert_eq!(failed.artifacts.len(), 2);
    assert!(failed.artifacts.iter().all(|p| p.exists()));
    assert_eq!(files_with_prefix(dir.path(), "job-2-resolution").len(), 2);
    assert_eq!(driver.clicks_on(SUBMIT), 2);
}

#[tokio::test]
async fn mismatch_is_tagged_distinctly_in_the_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let driver = portal(2);
    driver.insert(
        record_link(1),
        FakeElement::button().on_click(vec![Effect::Navigate(HOME_URL.into())]),
    );
    let fields = call_log_fields();
    let mut jobs = vec![job(1, 1, &fields), job(2, 2, &fields)];
    let config = config(dir.path(), jobs.clone());

    let report = orchestrator(&driver, &config).run(&mut jobs).await.unwrap();

    assert_eq!(
        report.outcomes[0].error_kind,
        Some(FailureKind::NavigationMismatch)
    );
    assert!(report.outcomes[1].is_success());
}

#[tokio::test]
async fn partial_multi_choice_still_submits() {
    let dir = tempfile::tempdir().unwrap();
    let driver = portal(1);
    driver.insert(COMM_WITH, FakeElement::new(Kind::Other));
    driver.insert(option_key("A"), FakeElement::button());
    driver.insert(option_key("B"), FakeElement::button());
    let mut jobs = vec![job(
        1,
        1,
        &[("Communicate With Client", vec!["A", "B", "missing"].into())],
    )];
    let config = config(dir.path(), jobs.clone());

    let report = orchestrator(&driver, &config).run(&mut jobs).await.unwrap();

    let outcome = &report.outcomes[0];
    assert!(outcome.is_success());
    assert!(outcome.warnings.iter().any(|w| w.contains("missing")));
    assert_eq!(driver.clicks_on(SUBMIT), 1);
}

#[tokio::test]
async fn session_loop_mid_batch_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let driver = portal(3);
    driver.accept_logins(1);
    // 打开第 2 条记录时会话被踢掉，重新登录也无效
    driver.insert(
        record_link(2),
        FakeElement::button().on_click(vec![Effect::Navigate(LOGIN_URL.into())]),
    );
    let fields = call_log_fields();
    let mut jobs = vec![job(1, 1, &fields), job(2, 2, &fields), job(3, 3, &fields)];
    let config = config(dir.path(), jobs.clone());

    let err = orchestrator(&driver, &config)
        .run(&mut jobs)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::SessionInvalidationLoop { .. }));
    assert_eq!(jobs[0].status(), JobStatus::Succeeded);
    assert_eq!(jobs[1].status(), JobStatus::Failed);
    assert_eq!(
        jobs[1].outcome().unwrap().error_kind,
        Some(FailureKind::SessionInvalidationLoop)
    );
    assert!(jobs[2].outcome().is_none());
    assert_eq!(driver.clicks_on(&record_link(3)), 0);
}

#[tokio::test]
async fn rejected_login_aborts_before_any_job() {
    let dir = tempfile::tempdir().unwrap();
    let driver = portal(1);
    driver.accept_logins(0);
    let mut jobs = vec![job(1, 1, &call_log_fields())];
    let config = config(dir.path(), jobs.clone());

    let err = orchestrator(&driver, &config)
        .run(&mut jobs)
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(jobs[0].outcome().is_none());
    assert_eq!(driver.clicks_on(LISTING), 0);
}
