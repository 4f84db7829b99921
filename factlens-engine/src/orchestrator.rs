use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use factlens_common::ExtractError;
use factlens_config::{FactlensConfig, ImageConfig};
use factlens_extract::urlnorm::MAX_URL_LEN;
use factlens_extract::{
    collect_from_html, extract_article, rewrite_content, FilterPolicy,
};
use factlens_render::session::dispose_quietly;
use factlens_render::{
    classify, ChromeSessionFactory, ContentReadinessProbe, PageLoadController, PlatformProfile,
    SessionFactory,
};
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use crate::result::ExtractionResult;

/// In-page readiness checks before the capture is declared too short.
const CAPTURE_ATTEMPTS: u32 = 3;
/// Wall-clock bound on the direct-image metadata probe.
const IMAGE_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Extensions that identify a direct image URL without any network probe.
const IMAGE_EXTENSIONS: &[&str] = &["webp", "jpg", "jpeg", "png"];

/// Front door of the pipeline: validates input, drives the load controller
/// and readiness probe, and turns rendered HTML into an [`ExtractionResult`].
///
/// Each request gets its own cancellation token, tracked in a registry keyed
/// by request id. [`ExtractionOrchestrator::cancel`] targets the most recent
/// live request, so a cancel can never land on a stale or already-disposed
/// session.
pub struct ExtractionOrchestrator {
    factory: Arc<dyn SessionFactory>,
    images: ImageConfig,
    http: reqwest::Client,
    probe_direct_images: bool,
    active: Mutex<ActiveRequests>,
}

#[derive(Default)]
struct ActiveRequests {
    tokens: HashMap<Uuid, CancellationToken>,
    order: Vec<Uuid>,
}

struct RenderedPage {
    html: String,
    document_title: String,
}

impl ExtractionOrchestrator {
    pub fn new(factory: Arc<dyn SessionFactory>, images: ImageConfig) -> Self {
        Self {
            factory,
            images,
            http: reqwest::Client::new(),
            probe_direct_images: true,
            active: Mutex::new(ActiveRequests::default()),
        }
    }

    /// Wire up a Chrome-backed orchestrator from configuration.
    pub fn from_config(config: &FactlensConfig) -> Self {
        let factory = ChromeSessionFactory::new(
            config.browser.webdriver_url.clone(),
            config.browser.headless,
            config.browser.blocked_hosts.clone(),
        );
        Self::new(Arc::new(factory), config.images.clone())
    }

    /// Disable the network metadata probe for direct-image detection.
    /// Extension-based detection still applies.
    pub fn without_image_probe(mut self) -> Self {
        self.probe_direct_images = false;
        self
    }

    /// Extract title, content, and images from `raw_url`. Never returns an
    /// error directly; failures are folded into the result shape.
    pub async fn extract(&self, raw_url: &str) -> ExtractionResult {
        let url = match validate_url(raw_url) {
            Ok(u) => u,
            Err(err) => {
                tracing::warn!(url = raw_url, error = %err, "rejected extraction input");
                return ExtractionResult::failure(raw_url, &err);
            }
        };

        if self.is_direct_image(&url).await {
            tracing::info!(url = %url, "input is a direct image; skipping render");
            return ExtractionResult::direct_image(url.as_str());
        }

        let request_id = Uuid::new_v4();
        let token = self.register(request_id);
        tracing::info!(%request_id, url = %url, "starting extraction");

        let outcome = self.run_pipeline(&url, &token).await;
        self.unregister(request_id);

        match outcome {
            Ok(result) => result,
            Err(err) => {
                if err.is_cancelled() {
                    tracing::info!(%request_id, "extraction cancelled");
                } else {
                    tracing::error!(%request_id, error = %err, "extraction failed");
                }
                ExtractionResult::failure(url.as_str(), &err)
            }
        }
    }

    /// Cancel the most recently started extraction still in flight.
    pub fn cancel(&self) {
        let active = match self.active.lock() {
            Ok(a) => a,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(token) = active.order.last().and_then(|id| active.tokens.get(id)) {
            token.cancel();
        }
    }

    /// Cancel one specific request by id.
    pub fn cancel_request(&self, request_id: Uuid) {
        let active = match self.active.lock() {
            Ok(a) => a,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(token) = active.tokens.get(&request_id) {
            token.cancel();
        }
    }

    fn register(&self, request_id: Uuid) -> CancellationToken {
        let token = CancellationToken::new();
        let mut active = match self.active.lock() {
            Ok(a) => a,
            Err(poisoned) => poisoned.into_inner(),
        };
        active.tokens.insert(request_id, token.clone());
        active.order.push(request_id);
        token
    }

    fn unregister(&self, request_id: Uuid) {
        let mut active = match self.active.lock() {
            Ok(a) => a,
            Err(poisoned) => poisoned.into_inner(),
        };
        active.tokens.remove(&request_id);
        active.order.retain(|id| *id != request_id);
    }

    async fn run_pipeline(
        &self,
        url: &Url,
        token: &CancellationToken,
    ) -> Result<ExtractionResult, ExtractError> {
        let profile = classify(url);
        let page = self.render_page(url, profile, token).await?;
        self.assemble(url, profile, page)
    }

    async fn render_page(
        &self,
        url: &Url,
        profile: &PlatformProfile,
        token: &CancellationToken,
    ) -> Result<RenderedPage, ExtractError> {
        let controller = PageLoadController::new(self.factory.as_ref(), profile, token.clone());
        let mut session = controller.run(url).await?;

        let probe = ContentReadinessProbe::new(profile);
        probe.settle(session.as_mut()).await;

        let captured = match probe.capture_html(session.as_mut(), CAPTURE_ATTEMPTS).await {
            Ok(html) => Ok(html),
            Err(ExtractError::ContentTooShort(issue)) => {
                // One last check; slow pages regularly become ready just
                // after the probe's own retries run out.
                tracing::debug!(issue = %issue, "capture retries exhausted; one extra check");
                probe.capture_html(session.as_mut(), 1).await
            }
            Err(err) => Err(err),
        };

        let html = match captured {
            Ok(html) => html,
            Err(err) => {
                dispose_quietly(session.as_mut()).await;
                return Err(err);
            }
        };

        let document_title = session.title().await.unwrap_or_default();
        dispose_quietly(session.as_mut()).await;

        if token.is_cancelled() {
            return Err(ExtractError::Cancelled);
        }
        Ok(RenderedPage {
            html,
            document_title,
        })
    }

    fn assemble(
        &self,
        url: &Url,
        profile: &PlatformProfile,
        page: RenderedPage,
    ) -> Result<ExtractionResult, ExtractError> {
        let article = extract_article(&page.html, url)?;

        // Candidates come from the full rendered document, not the article
        // body: the readability pass drops the probe-written attributes.
        let candidates = collect_from_html(&page.html, url);
        let policy = FilterPolicy {
            blocked_domains: self.images.blocked_domains.clone(),
            blocked_formats: self.images.blocked_formats.clone(),
            size_exceptions: profile.size_exceptions.to_vec(),
        };
        let outcome = policy.select(&candidates);

        let accepted: HashSet<String> = outcome.accepted.iter().cloned().collect();
        let content = rewrite_content(&article.content, url, &accepted);

        let title = if article.title.is_empty() {
            page.document_title
        } else {
            article.title
        };

        tracing::info!(
            url = %url,
            images = outcome.accepted.len(),
            preview = ?outcome.preview(),
            text_len = article.text_content.len(),
            "extraction complete"
        );
        Ok(ExtractionResult {
            success: true,
            title,
            content,
            text_content: article.text_content,
            images: outcome.accepted,
            url: url.to_string(),
            error: None,
        })
    }

    /// Direct-image detection: by extension first, then (when enabled) a
    /// bounded metadata probe. Probe failures mean "not an image" and the
    /// normal pipeline proceeds.
    async fn is_direct_image(&self, url: &Url) -> bool {
        let path_ext = url
            .path_segments()
            .and_then(|segments| segments.last().map(str::to_lowercase))
            .and_then(|last| last.rsplit_once('.').map(|(_, ext)| ext.to_string()))
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()));
        // CDN links often carry the format as a trailing query value.
        let full = url.as_str().to_lowercase();
        let query_ext = IMAGE_EXTENSIONS
            .iter()
            .any(|ext| full.ends_with(&format!("={ext}")) || full.ends_with(&format!(".{ext}")));
        if path_ext || query_ext {
            return true;
        }
        if !self.probe_direct_images {
            return false;
        }
        let response = self
            .http
            .head(url.as_str())
            .timeout(IMAGE_PROBE_TIMEOUT)
            .send()
            .await;
        match response {
            Ok(resp) => resp
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|ct| ct.starts_with("image/")),
            Err(err) => {
                tracing::debug!(url = %url, error = %err, "image metadata probe failed");
                false
            }
        }
    }
}

fn validate_url(raw: &str) -> Result<Url, ExtractError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ExtractError::InvalidInput("empty URL".into()));
    }
    if raw.len() > MAX_URL_LEN {
        return Err(ExtractError::InvalidInput(format!(
            "URL exceeds {MAX_URL_LEN} characters"
        )));
    }
    let url = Url::parse(raw)
        .map_err(|e| ExtractError::InvalidInput(format!("unparseable URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ExtractError::InvalidInput(format!(
            "unsupported scheme: {}",
            url.scheme()
        )));
    }
    Ok(url)
}
