mod common;

use call_log_submit::error::AppError;
use call_log_submit::infrastructure::SubmissionRequest;
use call_log_submit::services::SessionState;
use common::*;

fn login_navigations(driver: &ScriptedDriver) -> usize {
    let needle = format!("navigate {}", LOGIN_URL);
    driver.calls().iter().filter(|c| **c == needle).count()
}

#[tokio::test]
async fn authenticate_then_assert_does_not_log_in_again() {
    let dir = tempfile::tempdir().unwrap();
    let driver = portal(1);
    let config = config(dir.path(), vec![]);
    let mut session = session(&driver, &config);

    session.authenticate().await.unwrap();
    session.assert_authenticated("after-login").await.unwrap();

    assert_eq!(driver.login_count(), 1);
    assert_eq!(login_navigations(&driver), 1);
    assert_eq!(session.session().reauth_count, 0);
    assert_eq!(session.session().state, SessionState::Authenticated);
    assert_eq!(driver.value_of(USERNAME), "agent01");
    assert_eq!(driver.value_of(PASSWORD), "s3cret");
}

#[tokio::test]
async fn single_invalidation_is_healed_by_one_relogin() {
    let dir = tempfile::tempdir().unwrap();
    let driver = portal(1);
    let config = config(dir.path(), vec![]);
    let mut session = session(&driver, &config);
    session.authenticate().await.unwrap();

    // 远端让会话静默失效
    driver.set_url(&format!("{}?expired=1", LOGIN_URL));
    session.assert_authenticated("after-open-listing").await.unwrap();

    assert_eq!(driver.login_count(), 2);
    assert_eq!(session.session().reauth_count, 1);
    assert!(session.session().is_authenticated());
}

#[tokio::test]
async fn second_consecutive_invalidation_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let driver = portal(1);
    driver.accept_logins(1);
    let config = config(dir.path(), vec![]);
    let mut session = session(&driver, &config);
    session.authenticate().await.unwrap();

    driver.set_url(LOGIN_URL);
    let err = session
        .assert_authenticated("after-open-record")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::SessionInvalidationLoop { ref label } if label == "after-open-record"
    ));
    assert!(err.is_fatal());
    assert_eq!(driver.login_count(), 2);
    assert_eq!(session.session().state, SessionState::Fatal);
    assert!(!files_with_prefix(dir.path(), "after-open-record-session-loop").is_empty());
}

#[tokio::test]
async fn rejected_credentials_abort_with_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let driver = portal(1);
    driver.accept_logins(0);
    let config = config(dir.path(), vec![]);
    let mut session = session(&driver, &config);

    let err = session.authenticate().await.unwrap_err();

    assert!(matches!(err, AppError::Authentication { .. }));
    let files = files_with_prefix(dir.path(), "login-failed");
    assert_eq!(files.len(), 2);
    assert!(files.iter().any(|f| f.ends_with(".html")));
    assert!(files.iter().any(|f| f.ends_with(".png")));
}

#[tokio::test]
async fn missing_submit_control_is_an_authentication_failure() {
    let dir = tempfile::tempdir().unwrap();
    let driver = portal(1);
    driver.remove(LOGIN_BUTTON);
    let config = config(dir.path(), vec![]);
    let mut session = session(&driver, &config);

    let err = session.authenticate().await.unwrap_err();
    assert!(matches!(err, AppError::Authentication { .. }));
    assert_eq!(driver.login_count(), 0);
}

#[tokio::test]
async fn optional_login_controls_are_best_effort() {
    let dir = tempfile::tempdir().unwrap();
    let driver = portal(1);
    driver.insert(
        "label=\"Remember Me\"",
        FakeElement::new(Kind::Checkbox),
    );
    let mut config = config(dir.path(), vec![]);
    // 页面上没有 Work Place 与 Desk Number 控件
    config.credentials.workplace = Some("Head Office".into());
    config.credentials.desk_number = Some("D-12".into());
    config.credentials.remember_me = Some(true);
    let mut session = session(&driver, &config);

    session.authenticate().await.unwrap();

    assert!(driver.checked("label=\"Remember Me\""));
    assert_eq!(driver.clicks_on("label=\"Remember Me\""), 1);
}

#[tokio::test]
async fn remember_me_is_left_alone_when_already_in_wanted_state() {
    let dir = tempfile::tempdir().unwrap();
    let driver = portal(1);
    let mut checkbox = FakeElement::new(Kind::Checkbox);
    checkbox.checked = true;
    driver.insert("label=\"Remember Me\"", checkbox);
    let mut config = config(dir.path(), vec![]);
    config.credentials.remember_me = Some(true);
    let mut session = session(&driver, &config);

    session.authenticate().await.unwrap();
    assert_eq!(driver.clicks_on("label=\"Remember Me\""), 0);
}

#[tokio::test]
async fn csrf_token_is_mirrored_into_form_and_submission() {
    let dir = tempfile::tempdir().unwrap();
    let driver = portal(1);
    driver.add_cookie("laravel_session", "opaque");
    driver.add_cookie("XSRF-TOKEN", "tok%2Fen%3D");
    let config = config(dir.path(), vec![]);
    let mut session = session(&driver, &config);

    session.authenticate().await.unwrap();

    assert_eq!(driver.hidden_field("_token").as_deref(), Some("tok/en="));

    let (pattern, rewriter) = driver.interceptor().expect("登录提交应被拦截");
    assert_eq!(pattern, "*login*");
    let request = SubmissionRequest {
        url: LOGIN_URL.into(),
        method: "POST".into(),
        headers: vec![(
            "Content-Type".into(),
            "application/x-www-form-urlencoded".into(),
        )],
        body: Some("username=agent01&password=s3cret".into()),
    };
    let rewritten = (rewriter.as_ref())(&request).unwrap();
    assert_eq!(
        rewritten.body.as_deref(),
        Some("username=agent01&password=s3cret&_token=tok%2Fen%3D")
    );
}

#[tokio::test]
async fn missing_csrf_cookie_degrades_without_aborting() {
    let dir = tempfile::tempdir().unwrap();
    let driver = portal(1);
    let config = config(dir.path(), vec![]);
    let mut session = session(&driver, &config);

    session.authenticate().await.unwrap();

    assert!(driver.hidden_field("_token").is_none());
    assert!(driver.interceptor().is_none());
}

#[tokio::test]
async fn interception_is_installed_once_across_relogins() {
    let dir = tempfile::tempdir().unwrap();
    let driver = portal(1);
    driver.add_cookie("csrftoken", "abc");
    let config = config(dir.path(), vec![]);
    let mut session = session(&driver, &config);

    session.authenticate().await.unwrap();
    driver.set_url(LOGIN_URL);
    session.assert_authenticated("after-open-listing").await.unwrap();

    let intercepts = driver
        .calls()
        .iter()
        .filter(|c| c.starts_with("intercept "))
        .count();
    assert_eq!(intercepts, 1);
}
