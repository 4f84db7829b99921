use std::time::Duration;

use factlens_common::ExtractError;
use factlens_render::loader::PageLoadController;
use factlens_render::profile::{GENERIC, WECHAT};
use factlens_render::session::LoadSignal;
use factlens_render::testing::{FakeEvent, FakeSession, FakeSessionFactory};
use tokio_util::sync::CancellationToken;
use url::Url;

fn article_url() -> Url {
    Url::parse("https://example.com/article").unwrap()
}

fn expect_err(
    outcome: Result<Box<dyn factlens_render::RenderSession>, ExtractError>,
) -> ExtractError {
    match outcome {
        Ok(_) => panic!("expected the load to fail"),
        Err(err) => err,
    }
}

#[tokio::test(start_paused = true)]
async fn finished_signal_loads_first_try() {
    let factory = FakeSessionFactory::new(vec![
        FakeSession::new().with_events(vec![FakeEvent::Signal(LoadSignal::Finished)]),
    ]);
    let log = factory.log();
    let controller = PageLoadController::new(&factory, &GENERIC, CancellationToken::new());

    let mut session = controller.run(&article_url()).await.expect("load succeeds");

    assert_eq!(log.opened(), 1);
    assert_eq!(log.disposed(), 0, "winning session is handed back live");
    session.dispose().await.unwrap();
    assert_eq!(log.disposed(), 1);
}

#[tokio::test(start_paused = true)]
async fn stopped_load_completes_after_the_grace_window() {
    let factory = FakeSessionFactory::new(vec![
        FakeSession::new().with_events(vec![FakeEvent::Signal(LoadSignal::Stopped)]),
    ]);
    let controller = PageLoadController::new(&factory, &GENERIC, CancellationToken::new());

    let started = tokio::time::Instant::now();
    let mut session = controller.run(&article_url()).await.expect("optimistic success");
    let elapsed = started.elapsed();

    assert!(elapsed >= GENERIC.stop_grace, "waited out the grace window: {elapsed:?}");
    assert!(elapsed < GENERIC.attempt_timeout);
    session.dispose().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn finished_signal_preempts_the_grace_timer() {
    let factory = FakeSessionFactory::new(vec![FakeSession::new().with_events(vec![
        FakeEvent::Signal(LoadSignal::Stopped),
        FakeEvent::Delay(Duration::from_secs(1)),
        FakeEvent::Signal(LoadSignal::Finished),
    ])]);
    let controller = PageLoadController::new(&factory, &GENERIC, CancellationToken::new());

    let started = tokio::time::Instant::now();
    let mut session = controller.run(&article_url()).await.expect("load succeeds");

    assert!(started.elapsed() < GENERIC.stop_grace);
    session.dispose().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failures_retry_to_exhaustion() {
    let failing = || {
        FakeSession::new().with_events(vec![FakeEvent::Signal(LoadSignal::Failed(
            "connection reset".into(),
        ))])
    };
    let factory = FakeSessionFactory::new(vec![failing(), failing(), failing()]);
    let log = factory.log();
    let controller = PageLoadController::new(&factory, &GENERIC, CancellationToken::new());

    let started = tokio::time::Instant::now();
    let err = expect_err(controller.run(&article_url()).await);

    match err {
        ExtractError::LoadFailure { attempts, last } => {
            assert_eq!(attempts, GENERIC.max_attempts);
            assert!(last.contains("connection reset"));
        }
        other => panic!("expected LoadFailure, got {other:?}"),
    }
    assert_eq!(log.opened(), 3, "one fresh session per attempt");
    assert_eq!(log.disposed(), 3, "every failed session torn down");
    let backoffs = GENERIC.retry_backoff * (GENERIC.max_attempts - 1);
    assert!(started.elapsed() >= backoffs, "backoff observed between attempts");
}

#[tokio::test(start_paused = true)]
async fn hung_pages_time_out_per_attempt() {
    let factory = FakeSessionFactory::new(vec![
        FakeSession::new(),
        FakeSession::new(),
        FakeSession::new(),
    ]);
    let log = factory.log();
    let controller = PageLoadController::new(&factory, &GENERIC, CancellationToken::new());

    let err = expect_err(controller.run(&article_url()).await);

    match err {
        ExtractError::LoadTimeout { attempts, url } => {
            assert_eq!(attempts, GENERIC.max_attempts);
            assert!(url.contains("example.com"));
        }
        other => panic!("expected LoadTimeout, got {other:?}"),
    }
    assert_eq!(log.disposed(), 3);
}

#[tokio::test(start_paused = true)]
async fn final_attempt_timeout_wins_over_an_earlier_failure() {
    let factory = FakeSessionFactory::new(vec![
        FakeSession::new().with_events(vec![FakeEvent::Signal(LoadSignal::Failed(
            "connection reset".into(),
        ))]),
        // The remaining attempts hang until the ceiling.
        FakeSession::new(),
        FakeSession::new(),
    ]);
    let controller = PageLoadController::new(&factory, &GENERIC, CancellationToken::new());

    let err = expect_err(controller.run(&article_url()).await);

    assert!(
        matches!(err, ExtractError::LoadTimeout { .. }),
        "last attempt timed out, got {err:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn final_attempt_failure_wins_over_earlier_timeouts() {
    let factory = FakeSessionFactory::new(vec![
        FakeSession::new(),
        FakeSession::new(),
        FakeSession::new().with_events(vec![FakeEvent::Signal(LoadSignal::Failed(
            "tab crashed".into(),
        ))]),
    ]);
    let controller = PageLoadController::new(&factory, &GENERIC, CancellationToken::new());

    let err = expect_err(controller.run(&article_url()).await);

    match err {
        ExtractError::LoadFailure { last, .. } => assert!(last.contains("tab crashed")),
        other => panic!("expected LoadFailure, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn cancel_after_first_failure_stops_the_retry_loop() {
    let cancel = CancellationToken::new();
    let factory = FakeSessionFactory::new(vec![
        FakeSession::new().with_events(vec![
            FakeEvent::Cancel(cancel.clone()),
            FakeEvent::Signal(LoadSignal::Failed("gone".into())),
        ]),
        // A second attempt would consume this and fail the count asserts.
        FakeSession::new(),
    ]);
    let log = factory.log();
    let controller = PageLoadController::new(&factory, &GENERIC, cancel);

    let err = expect_err(controller.run(&article_url()).await);

    assert!(matches!(err, ExtractError::Cancelled));
    assert_eq!(log.opened(), 1, "no new attempt after cancellation");
    assert_eq!(log.disposed(), 1, "cancelled session torn down");
}

#[tokio::test(start_paused = true)]
async fn already_cancelled_token_short_circuits() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let factory = FakeSessionFactory::new(vec![FakeSession::new()]);
    let log = factory.log();
    let controller = PageLoadController::new(&factory, &GENERIC, cancel);

    let err = expect_err(controller.run(&article_url()).await);

    assert!(matches!(err, ExtractError::Cancelled));
    assert_eq!(log.opened(), 0);
}

#[tokio::test(start_paused = true)]
async fn persistent_interstitial_is_waited_out_then_ignored() {
    let factory = FakeSessionFactory::new(vec![FakeSession::new()
        .with_events(vec![FakeEvent::Signal(LoadSignal::Finished)])
        .with_title("环境异常")]);
    let controller = PageLoadController::new(&factory, &WECHAT, CancellationToken::new());

    let started = tokio::time::Instant::now();
    let mut session = controller.run(&article_url()).await.expect("proceeds anyway");

    assert!(
        started.elapsed() >= Duration::from_secs(10),
        "polled the interstitial before giving up on it"
    );
    session.dispose().await.unwrap();
}
