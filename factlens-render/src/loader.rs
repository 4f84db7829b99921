use std::future;
use std::time::Duration;

use factlens_common::ExtractError;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::profile::PlatformProfile;
use crate::session::{dispose_quietly, LoadSignal, RenderSession, SessionFactory};

const INTERSTITIAL_MAX_POLLS: u32 = 10;
const INTERSTITIAL_POLL: Duration = Duration::from_secs(1);

/// Drives a page load to a usable document, owning retries, the stop-grace
/// timer, the per-attempt ceiling, and cancellation.
///
/// Each attempt runs on a fresh session; a renderer wedged by one attempt
/// cannot leak into the next. On success the live session is handed back for
/// readiness probing.
pub struct PageLoadController<'a> {
    factory: &'a dyn SessionFactory,
    profile: &'a PlatformProfile,
    cancel: CancellationToken,
}

enum AttemptError {
    Failed(String),
    TimedOut,
    Cancelled,
}

enum AttemptOutcome {
    Failed(String),
    TimedOut,
}

impl<'a> PageLoadController<'a> {
    pub fn new(
        factory: &'a dyn SessionFactory,
        profile: &'a PlatformProfile,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            factory,
            profile,
            cancel,
        }
    }

    /// Load `url`, retrying per the profile. Returns the live session once
    /// the page is usable.
    pub async fn run(&self, url: &Url) -> Result<Box<dyn RenderSession>, ExtractError> {
        // The most recent attempt decides how exhaustion is reported.
        let mut last_outcome: Option<AttemptOutcome> = None;

        for attempt in 1..=self.profile.max_attempts {
            if self.cancel.is_cancelled() {
                return Err(ExtractError::Cancelled);
            }

            tracing::info!(
                url = %url,
                attempt,
                max = self.profile.max_attempts,
                profile = self.profile.name,
                "starting load attempt"
            );

            match self.factory.open(self.profile).await {
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "session open failed");
                    last_outcome = Some(AttemptOutcome::Failed(err.to_string()));
                }
                Ok(mut session) => match self.run_attempt(session.as_mut(), url).await {
                    Ok(()) => {
                        if let Err(err) = self.wait_out_interstitial(session.as_mut()).await {
                            dispose_quietly(session.as_mut()).await;
                            return Err(err);
                        }
                        tracing::info!(url = %url, attempt, "page load succeeded");
                        return Ok(session);
                    }
                    Err(AttemptError::Cancelled) => {
                        dispose_quietly(session.as_mut()).await;
                        return Err(ExtractError::Cancelled);
                    }
                    Err(AttemptError::TimedOut) => {
                        tracing::warn!(attempt, "attempt hit the load ceiling");
                        last_outcome = Some(AttemptOutcome::TimedOut);
                        dispose_quietly(session.as_mut()).await;
                    }
                    Err(AttemptError::Failed(msg)) => {
                        tracing::warn!(attempt, error = %msg, "load attempt failed");
                        last_outcome = Some(AttemptOutcome::Failed(msg));
                        dispose_quietly(session.as_mut()).await;
                    }
                },
            }

            if self.cancel.is_cancelled() {
                return Err(ExtractError::Cancelled);
            }
            if attempt < self.profile.max_attempts {
                tokio::select! {
                    _ = sleep(self.profile.retry_backoff) => {}
                    _ = self.cancel.cancelled() => return Err(ExtractError::Cancelled),
                }
            }
        }

        match last_outcome {
            Some(AttemptOutcome::TimedOut) => Err(ExtractError::LoadTimeout {
                attempts: self.profile.max_attempts,
                url: url.to_string(),
            }),
            Some(AttemptOutcome::Failed(msg)) => Err(ExtractError::LoadFailure {
                attempts: self.profile.max_attempts,
                last: msg,
            }),
            None => Err(ExtractError::LoadFailure {
                attempts: self.profile.max_attempts,
                last: "page never finished loading".into(),
            }),
        }
    }

    /// Single attempt as a race between the signal stream, the stop-grace
    /// timer, the attempt ceiling, and cancellation. First resolution wins;
    /// at most one outcome is ever produced per attempt.
    async fn run_attempt(
        &self,
        session: &mut dyn RenderSession,
        url: &Url,
    ) -> Result<(), AttemptError> {
        session
            .start_load(url)
            .await
            .map_err(|e| AttemptError::Failed(e.to_string()))?;

        let deadline = Instant::now() + self.profile.attempt_timeout;
        let mut grace_deadline: Option<Instant> = None;

        loop {
            let grace_at = grace_deadline;
            let grace_fired = async move {
                match grace_at {
                    Some(at) => sleep_until(at).await,
                    None => future::pending().await,
                }
            };

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(AttemptError::Cancelled),
                _ = sleep_until(deadline) => return Err(AttemptError::TimedOut),
                _ = grace_fired => {
                    // Spinner stopped and nothing contradicted it within the
                    // grace window; treat the page as usable.
                    tracing::debug!("treating stopped load as complete");
                    return Ok(());
                }
                signal = session.next_signal() => match signal {
                    Ok(LoadSignal::Finished) => return Ok(()),
                    Ok(LoadSignal::Failed(msg)) => return Err(AttemptError::Failed(msg)),
                    Ok(LoadSignal::Stopped) => {
                        if grace_deadline.is_none() {
                            grace_deadline = Some(Instant::now() + self.profile.stop_grace);
                        }
                    }
                    Err(err) => return Err(AttemptError::Failed(err.to_string())),
                },
            }
        }
    }

    /// Poll the title until anti-bot interstitial markers clear. If they
    /// never do, proceed anyway and let content capture make the call.
    async fn wait_out_interstitial(
        &self,
        session: &mut dyn RenderSession,
    ) -> Result<(), ExtractError> {
        let markers = self.profile.interstitial_markers;
        if markers.is_empty() {
            return Ok(());
        }
        for _ in 0..INTERSTITIAL_MAX_POLLS {
            let title = match session.title().await {
                Ok(t) => t,
                Err(err) => {
                    tracing::debug!(error = %err, "title read failed during interstitial poll");
                    return Ok(());
                }
            };
            if !markers.iter().any(|m| title.contains(m)) {
                return Ok(());
            }
            tracing::debug!(title = %title, "interstitial detected; waiting");
            tokio::select! {
                _ = sleep(INTERSTITIAL_POLL) => {}
                _ = self.cancel.cancelled() => return Err(ExtractError::Cancelled),
            }
        }
        tracing::warn!("interstitial never cleared; proceeding with capture");
        Ok(())
    }
}
