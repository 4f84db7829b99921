use std::time::Duration;

use factlens_common::ExtractError;
use serde_json::Value;
use tokio::time::sleep;

use crate::profile::PlatformProfile;
use crate::scripts::ProbeScripts;
use crate::session::RenderSession;

const MIN_CAPTURED_HTML: usize = 300;
const RETRY_AFTER_SHORT: Duration = Duration::from_millis(1500);
const RETRY_AFTER_ERROR: Duration = Duration::from_secs(1);

/// Settles page content on a loaded session and captures its HTML.
///
/// "Loaded" does not mean "ready": images may still be decoding, lazy loaders
/// may not have fired, and interstitials clear asynchronously. The probe runs
/// the settle scripts, waits out the quiet period, then captures with
/// in-page readiness checks and bounded retries.
pub struct ContentReadinessProbe<'a> {
    profile: &'a PlatformProfile,
}

impl<'a> ContentReadinessProbe<'a> {
    pub fn new(profile: &'a PlatformProfile) -> Self {
        Self { profile }
    }

    /// Run the settle scripts. Script failures are logged and tolerated; a
    /// page that rejects instrumentation can still yield usable HTML.
    pub async fn settle(&self, session: &mut dyn RenderSession) {
        if let Err(err) = session.evaluate(ProbeScripts::image_settle()).await {
            tracing::warn!(error = %err, "image settle script failed");
        }
        if self.profile.scroll_probe {
            if let Err(err) = session.evaluate(ProbeScripts::lazy_scroll()).await {
                tracing::warn!(error = %err, "lazy scroll script failed");
            }
        }
        sleep(self.profile.settle_delay).await;
    }

    /// Capture the serialized document, allowing up to `attempts` in-page
    /// readiness checks before giving up with `ContentTooShort`.
    pub async fn capture_html(
        &self,
        session: &mut dyn RenderSession,
        attempts: u32,
    ) -> Result<String, ExtractError> {
        let script = ProbeScripts::capture(self.profile.min_text_len);
        let mut last_issue = String::from("no capture attempted");

        for attempt in 1..=attempts {
            let retry_wait = match session.evaluate(&script).await {
                Ok(Value::String(html)) if html.len() > MIN_CAPTURED_HTML => {
                    return Ok(html);
                }
                Ok(Value::String(html)) => {
                    last_issue = format!("captured document is only {} bytes", html.len());
                    RETRY_AFTER_SHORT
                }
                Ok(Value::Null) => {
                    last_issue = "page not ready or body text below threshold".into();
                    RETRY_AFTER_SHORT
                }
                Ok(other) => {
                    last_issue = format!("unexpected capture result: {other}");
                    RETRY_AFTER_ERROR
                }
                Err(err) => {
                    last_issue = err.to_string();
                    RETRY_AFTER_ERROR
                }
            };
            tracing::debug!(attempt, issue = %last_issue, "content capture not ready");
            if attempt < attempts {
                sleep(retry_wait).await;
            }
        }

        Err(ExtractError::ContentTooShort(last_issue))
    }
}
