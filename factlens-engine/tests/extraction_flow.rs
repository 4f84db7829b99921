use std::sync::Arc;
use std::time::Duration;

use factlens_config::ImageConfig;
use factlens_engine::result::DIRECT_IMAGE_MARKER;
use factlens_engine::ExtractionOrchestrator;
use factlens_render::session::LoadSignal;
use factlens_render::testing::{FakeEvent, FakeSession, FakeSessionFactory};
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn orchestrator(sessions: Vec<FakeSession>) -> (ExtractionOrchestrator, Arc<factlens_render::testing::SessionLog>) {
    let factory = Arc::new(FakeSessionFactory::new(sessions));
    let log = factory.log();
    let orch = ExtractionOrchestrator::new(factory, ImageConfig::default()).without_image_probe();
    (orch, log)
}

fn story_page() -> String {
    let paragraphs: String = (0..8)
        .map(|i| {
            format!(
                "<p>Paragraph {i} of the flood report, with enough running text \
                 that the content extractor treats this as a genuine article body \
                 rather than navigation or boilerplate noise.</p>"
            )
        })
        .collect();
    format!(
        r#"<html><head><title>Flood Report</title></head><body>
        <article><h1>Flood Report</h1>
        {paragraphs}
        <img src="/images/flood.jpg" data-real-width="800" data-real-height="600">
        <img src="/images/tiny.jpg" data-real-width="50" data-real-height="50">
        <img src="/images/anim.gif" data-real-width="500" data-real-height="400">
        </article></body></html>"#
    )
}

fn loaded_session(evals: Vec<Value>) -> FakeSession {
    let mut session = FakeSession::new()
        .with_events(vec![FakeEvent::Signal(LoadSignal::Finished)])
        .with_title("Flood Report");
    for value in evals {
        session = session.with_eval(Ok(value));
    }
    session
}

#[tokio::test]
async fn image_url_by_extension_skips_rendering() {
    let (orch, log) = orchestrator(vec![]);

    let result = orch.extract("http://example.com/photo.jpg").await;

    assert!(result.success);
    assert_eq!(result.images, vec!["http://example.com/photo.jpg"]);
    assert_eq!(result.content, DIRECT_IMAGE_MARKER);
    assert_eq!(log.opened(), 0, "no render session for direct images");
}

#[tokio::test]
async fn image_url_by_content_type_skips_rendering() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/pic"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "image/png"))
        .mount(&server)
        .await;

    let factory = Arc::new(FakeSessionFactory::new(vec![]));
    let log = factory.log();
    let orch = ExtractionOrchestrator::new(factory, ImageConfig::default());

    let url = format!("{}/pic", server.uri());
    let result = orch.extract(&url).await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.images, vec![url]);
    assert_eq!(log.opened(), 0);
}

#[tokio::test(start_paused = true)]
async fn full_pipeline_extracts_and_filters() {
    // evaluate call order: image settle, then the readiness capture.
    let session = loaded_session(vec![Value::Null, Value::String(story_page())]);
    let (orch, log) = orchestrator(vec![session]);

    let result = orch.extract("https://news.example.com/story").await;

    assert!(result.success, "error: {:?}", result.error);
    assert!(result.title.contains("Flood Report"));
    assert_eq!(
        result.images,
        vec!["https://news.example.com/images/flood.jpg"]
    );
    assert!(!result.content.contains("tiny.jpg"));
    assert!(!result.content.contains("anim.gif"));
    assert!(result.text_content.contains("Paragraph 3"));
    assert_eq!(log.opened(), 1);
    assert_eq!(log.disposed(), 1, "session torn down after capture");
}

#[tokio::test(start_paused = true)]
async fn late_readiness_succeeds_via_the_extra_capture() {
    // Settle, then three not-ready capture checks, then the extra one hits.
    let session = loaded_session(vec![
        Value::Null,
        Value::Null,
        Value::Null,
        Value::Null,
        Value::String(story_page()),
    ]);
    let (orch, log) = orchestrator(vec![session]);

    let result = orch.extract("https://news.example.com/slow").await;

    assert!(result.success, "error: {:?}", result.error);
    assert!(result.text_content.contains("flood report"));
    assert_eq!(log.disposed(), 1);
}

#[tokio::test(start_paused = true)]
async fn never_ready_page_reports_content_too_short() {
    // Every evaluate returns null: the page never passes the readiness check.
    let session = loaded_session(vec![]);
    let (orch, log) = orchestrator(vec![session]);

    let result = orch.extract("https://news.example.com/empty").await;

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("too short"));
    assert_eq!(log.disposed(), 1, "failed session still torn down");
}

#[tokio::test]
async fn cancel_tears_down_the_active_session() {
    // A session that never signals keeps the load attempt in flight.
    let (orch, log) = orchestrator(vec![FakeSession::new()]);
    let orch = Arc::new(orch);

    let task = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.extract("https://news.example.com/hang").await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    orch.cancel();

    let result = task.await.unwrap();
    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("cancelled"));
    assert_eq!(log.disposed(), 1);
}

#[tokio::test]
async fn invalid_inputs_never_open_a_session() {
    let (orch, log) = orchestrator(vec![FakeSession::new()]);

    for bad in [
        "".to_string(),
        "not a url".to_string(),
        "ftp://example.com/x".to_string(),
        format!("https://e.com/{}", "a".repeat(3000)),
    ] {
        let result = orch.extract(&bad).await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("invalid input"));
    }
    assert_eq!(log.opened(), 0);
}
