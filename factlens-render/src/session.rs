use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::profile::PlatformProfile;

/// Raw engine-level load notifications, before any retry or grace-timer
/// interpretation is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSignal {
    /// The engine reported a fully finished load.
    Finished,
    /// Navigation failed outright (DNS, TLS, connection reset).
    Failed(String),
    /// The load spinner stopped without a completion signal. Common on pages
    /// holding a long-lived connection open after the document is usable.
    Stopped,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session already disposed")]
    Disposed,
    #[error("navigation has not been started")]
    NotStarted,
    #[error("webdriver error: {0}")]
    Driver(String),
    #[error("script evaluation failed: {0}")]
    Script(String),
    #[error("session teardown failed: {0}")]
    Cleanup(String),
}

/// One live rendering surface for a single page load.
///
/// Implementations surface raw [`LoadSignal`]s and leave all policy (retries,
/// grace timers, timeouts, cancellation) to the caller. `next_signal` must be
/// cancel-safe: dropping its future and calling it again must not lose a
/// signal.
#[async_trait]
pub trait RenderSession: Send {
    /// Begin navigating to `url`. Returns once navigation is underway;
    /// progress arrives through [`RenderSession::next_signal`].
    async fn start_load(&mut self, url: &Url) -> Result<(), SessionError>;

    /// Await the next raw load signal for the current navigation.
    async fn next_signal(&mut self) -> Result<LoadSignal, SessionError>;

    /// Evaluate JavaScript in the page and return its completion value.
    async fn evaluate(&mut self, script: &str) -> Result<Value, SessionError>;

    /// Current document title.
    async fn title(&mut self) -> Result<String, SessionError>;

    /// Serialized DOM of the current document.
    async fn html(&mut self) -> Result<String, SessionError>;

    /// Tear the session down. Idempotent; all other methods return
    /// [`SessionError::Disposed`] afterwards.
    async fn dispose(&mut self) -> Result<(), SessionError>;
}

/// Creates fresh sessions. Each retry attempt gets a brand-new session so a
/// wedged renderer from a previous attempt cannot poison the next one.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, profile: &PlatformProfile) -> Result<Box<dyn RenderSession>, SessionError>;
}

/// Dispose a session, logging instead of propagating teardown failures.
/// Cleanup problems must never mask the primary extraction outcome.
pub async fn dispose_quietly(session: &mut dyn RenderSession) {
    if let Err(err) = session.dispose().await {
        tracing::warn!(error = %err, "session teardown failed; continuing");
    }
}
