//! Common types and utilities shared across Factlens crates.
//!
//! This crate defines the error taxonomy of the extraction pipeline and the
//! centralised tracing/logging initialisation. It is intentionally
//! lightweight so that every other crate can depend on it without pulling in
//! browser or HTML-processing machinery.
//!
//! # Overview
//!
//! - [`ExtractError`] and [`Result`]: shared error handling for the whole
//!   extraction pipeline
//! - [`observability`]: rolling-file `tracing` setup used by binaries and
//!   integration tests

use serde::{Deserialize, Serialize};

pub mod observability;

/// Error taxonomy for a single extraction request.
///
/// Attempt-level failures are retried inside the load controller; only the
/// final outcome after exhausting retries (or an immediate `InvalidInput` /
/// `ParseFailure`) reaches the caller. `Cancelled` always overrides a
/// concurrently-forming failure and is never collapsed into a generic error
/// string.
#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    /// The input URL was malformed or over the length cap. Fatal, no retry.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Every load attempt failed (network/DNS/TLS). Carries the attempt
    /// count and the last underlying error.
    #[error("failed to load page after {attempts} attempts: {last}")]
    LoadFailure { attempts: u32, last: String },

    /// A load attempt hit the per-attempt wall-clock ceiling and no attempts
    /// remain. Counted separately from `LoadFailure` for diagnostics.
    #[error("page load timed out after {attempts} attempts: {url}")]
    LoadTimeout { attempts: u32, url: String },

    /// User-initiated stop. Not an error in the diagnostic sense; it
    /// short-circuits remaining attempts and skips extraction.
    #[error("extraction cancelled")]
    Cancelled,

    /// The readiness probe judged the rendered page materially empty after
    /// its bounded in-page retries.
    #[error("page content too short: {0}")]
    ContentTooShort(String),

    /// Both the primary and the fallback extraction path yielded nothing.
    #[error("unable to parse article content")]
    ParseFailure,

    /// A render-session operation failed outside the retried load path
    /// (script evaluation, source capture on a disposed session, ...).
    #[error("render session error: {0}")]
    Session(#[from] anyhow::Error),
}

impl ExtractError {
    /// True for outcomes that should short-circuit everything else.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExtractError::Cancelled)
    }
}

/// Convenient alias for results that use [`ExtractError`].
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Structured verdict returned by the external authenticity-analysis
/// service. The service itself is an external collaborator; only the
/// request/response contract lives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    /// Probability in `[0, 1]` that the analysed content is genuine.
    pub probability: f64,
    /// Coarse classification derived from the probability.
    #[serde(rename = "type")]
    pub kind: VerdictKind,
    /// Short natural-language justification.
    pub explanation: String,
    /// Per-dimension analysis points (source reliability, tone, imagery).
    #[serde(default)]
    pub analysis_points: Vec<AnalysisPoint>,
    /// Fragments judged fabricated; present only for mixed/fake verdicts.
    #[serde(default)]
    pub fake_parts: Vec<FakePart>,
}

/// Coarse authenticity classification. Wire format is the integer code used
/// by the analysis service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum VerdictKind {
    /// Probability >= 0.8.
    LikelyGenuine,
    /// 0.2 < probability < 0.8.
    PartiallyFabricated,
    /// Probability <= 0.2.
    LikelyFabricated,
}

impl TryFrom<u8> for VerdictKind {
    type Error = String;

    fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
        match code {
            1 => Ok(VerdictKind::LikelyGenuine),
            2 => Ok(VerdictKind::PartiallyFabricated),
            3 => Ok(VerdictKind::LikelyFabricated),
            other => Err(format!("unknown verdict code: {other}")),
        }
    }
}

impl From<VerdictKind> for u8 {
    fn from(kind: VerdictKind) -> u8 {
        match kind {
            VerdictKind::LikelyGenuine => 1,
            VerdictKind::PartiallyFabricated => 2,
            VerdictKind::LikelyFabricated => 3,
        }
    }
}

/// One dimension of the analysis (e.g. source reliability).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisPoint {
    pub description: String,
    pub status: AnalysisStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Positive,
    Warning,
    Negative,
}

/// A fragment of the source text judged fabricated, quoted verbatim so the
/// caller can locate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FakePart {
    pub text: String,
    pub reason: String,
}
