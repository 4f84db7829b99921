//! Heuristic accept/reject filtering of image candidates.
//!
//! The filter is a pure function of a candidate and the policy; it performs
//! no I/O, which is what keeps the whole pipeline unit-testable without a
//! browser in the loop.

use std::collections::HashMap;

use url::Url;

use crate::images::ImageCandidate;

/// Smallest acceptable dimension. Anything under this is a thumbnail,
/// tracker pixel, or UI chrome rather than an article photo.
pub const MIN_DIMENSION: u32 = 201;
/// Largest acceptable dimension; beyond this are banners and sprite sheets.
pub const MAX_DIMENSION: u32 = 4400;
/// Hard cap on accepted images per extraction.
pub const MAX_IMAGES: usize = 10;
/// Cap when images are surfaced for visual preview.
pub const MAX_PREVIEW: usize = 4;

/// Why a candidate was rejected. First matching rule wins and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    LoadFailed,
    Transparency,
    BlockedFormat,
    BlockedDomain,
    PlaceholderSize,
    BadDimensions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accepted,
    Rejected(RejectReason),
}

/// Filtering policy: configured blocklists plus the platform's placeholder
/// dimensions.
#[derive(Debug, Clone)]
pub struct FilterPolicy {
    /// Hostname substrings whose images are ad/tracking assets.
    pub blocked_domains: Vec<String>,
    /// Lowercase extensions that never qualify (animation/vector assets).
    pub blocked_formats: Vec<String>,
    /// Exact dimensions of known default-avatar placeholders.
    pub size_exceptions: Vec<(u32, u32)>,
}

impl FilterPolicy {
    /// Decide one candidate. Pure; rules apply in fixed precedence.
    pub fn evaluate(&self, candidate: &ImageCandidate) -> Decision {
        use RejectReason::*;

        if candidate.load_failed {
            return Decision::Rejected(LoadFailed);
        }
        if candidate.has_transparency {
            // Alpha pixels mean logos, icons, and watermarks.
            return Decision::Rejected(Transparency);
        }
        if let Some(ext) = url_extension(&candidate.normalized_url) {
            if self.blocked_formats.iter().any(|f| f == &ext) {
                return Decision::Rejected(BlockedFormat);
            }
        }
        if let Some(host) = url_host(&candidate.normalized_url) {
            if self.blocked_domains.iter().any(|d| host.contains(d.as_str())) {
                return Decision::Rejected(BlockedDomain);
            }
        }
        if self
            .size_exceptions
            .iter()
            .any(|&(w, h)| candidate.width == w && candidate.height == h)
        {
            return Decision::Rejected(PlaceholderSize);
        }
        let w = candidate.width;
        let h = candidate.height;
        if (w == 0 && h == 0)
            || w < MIN_DIMENSION
            || h < MIN_DIMENSION
            || w > MAX_DIMENSION
            || h > MAX_DIMENSION
        {
            return Decision::Rejected(BadDimensions);
        }
        Decision::Accepted
    }

    /// Run the filter over an already-deduplicated candidate list, keeping
    /// first-seen order and capping at [`MAX_IMAGES`].
    pub fn select(&self, candidates: &[ImageCandidate]) -> FilterOutcome {
        let mut accepted = Vec::new();
        let mut rejected: HashMap<RejectReason, usize> = HashMap::new();

        for candidate in candidates {
            match self.evaluate(candidate) {
                Decision::Accepted if accepted.len() < MAX_IMAGES => {
                    accepted.push(candidate.normalized_url.clone());
                }
                Decision::Accepted => {}
                Decision::Rejected(reason) => {
                    *rejected.entry(reason).or_insert(0) += 1;
                }
            }
        }

        tracing::debug!(
            accepted = accepted.len(),
            rejected = rejected.values().sum::<usize>(),
            "image filtering complete"
        );
        FilterOutcome { accepted, rejected }
    }
}

/// Result of a filtering pass: kept URLs plus per-reason reject counts for
/// diagnostics.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub accepted: Vec<String>,
    pub rejected: HashMap<RejectReason, usize>,
}

impl FilterOutcome {
    /// Leading slice suitable for visual preview surfaces.
    pub fn preview(&self) -> &[String] {
        let cap = self.accepted.len().min(MAX_PREVIEW);
        &self.accepted[..cap]
    }
}

fn url_host(normalized: &str) -> Option<String> {
    Url::parse(normalized)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
}

fn url_extension(normalized: &str) -> Option<String> {
    let url = Url::parse(normalized).ok()?;
    let last = url.path_segments()?.last()?.to_lowercase();
    let (_, ext) = last.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> FilterPolicy {
        FilterPolicy {
            blocked_domains: vec!["adserver.com".into(), "doubleclick.net".into()],
            blocked_formats: vec!["gif".into(), "svg".into()],
            size_exceptions: vec![(272, 272)],
        }
    }

    fn candidate(url: &str, w: u32, h: u32) -> ImageCandidate {
        ImageCandidate {
            normalized_url: url.to_string(),
            width: w,
            height: h,
            load_failed: false,
            has_transparency: false,
        }
    }

    #[test]
    fn minimum_dimension_boundary() {
        let p = policy();
        let at = candidate("https://e.com/a.jpg", MIN_DIMENSION, MIN_DIMENSION);
        let below = candidate("https://e.com/b.jpg", MIN_DIMENSION - 1, MIN_DIMENSION);
        assert_eq!(p.evaluate(&at), Decision::Accepted);
        assert_eq!(
            p.evaluate(&below),
            Decision::Rejected(RejectReason::BadDimensions)
        );
    }

    #[test]
    fn zero_dimensions_always_rejected() {
        let p = policy();
        let c = candidate("https://e.com/unknown.jpg", 0, 0);
        assert_eq!(p.evaluate(&c), Decision::Rejected(RejectReason::BadDimensions));
    }

    #[test]
    fn oversized_is_rejected() {
        let p = policy();
        let c = candidate("https://e.com/banner.jpg", MAX_DIMENSION + 1, 600);
        assert_eq!(p.evaluate(&c), Decision::Rejected(RejectReason::BadDimensions));
    }

    #[test]
    fn precedence_load_failure_first() {
        let p = policy();
        let mut c = candidate("https://adserver.com/x.gif", 0, 0);
        c.load_failed = true;
        c.has_transparency = true;
        assert_eq!(p.evaluate(&c), Decision::Rejected(RejectReason::LoadFailed));
    }

    #[test]
    fn transparency_beats_format_and_domain() {
        let p = policy();
        let mut c = candidate("https://adserver.com/logo.gif", 500, 500);
        c.has_transparency = true;
        assert_eq!(p.evaluate(&c), Decision::Rejected(RejectReason::Transparency));
    }

    #[test]
    fn blocked_format_and_domain() {
        let p = policy();
        assert_eq!(
            p.evaluate(&candidate("https://e.com/anim.gif", 500, 500)),
            Decision::Rejected(RejectReason::BlockedFormat)
        );
        assert_eq!(
            p.evaluate(&candidate("https://sub.adserver.com/real.jpg", 500, 500)),
            Decision::Rejected(RejectReason::BlockedDomain)
        );
    }

    #[test]
    fn placeholder_dimensions_rejected_exactly() {
        let p = policy();
        assert_eq!(
            p.evaluate(&candidate("https://e.com/avatar.jpg", 272, 272)),
            Decision::Rejected(RejectReason::PlaceholderSize)
        );
        assert_eq!(
            p.evaluate(&candidate("https://e.com/photo.jpg", 272, 273)),
            Decision::Accepted
        );
    }

    #[test]
    fn is_deterministic() {
        let p = policy();
        let c = candidate("https://e.com/photo.jpg", 640, 480);
        for _ in 0..8 {
            assert_eq!(p.evaluate(&c), Decision::Accepted);
        }
    }

    #[test]
    fn select_caps_and_counts() {
        let p = policy();
        let mut candidates: Vec<_> = (0..12)
            .map(|i| candidate(&format!("https://e.com/{i}.jpg"), 640, 480))
            .collect();
        candidates.push(candidate("https://e.com/t.gif", 640, 480));

        let outcome = p.select(&candidates);
        assert_eq!(outcome.accepted.len(), MAX_IMAGES);
        assert_eq!(outcome.accepted[0], "https://e.com/0.jpg");
        assert_eq!(outcome.rejected[&RejectReason::BlockedFormat], 1);
        assert_eq!(outcome.preview().len(), MAX_PREVIEW);
    }
}
