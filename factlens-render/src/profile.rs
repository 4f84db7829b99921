use std::time::Duration;
use url::Url;

/// Per-platform load and readiness policy.
///
/// Profiles are plain data records; adding a platform means adding a record
/// and a match arm in [`classify`], not new control flow elsewhere.
#[derive(Debug, Clone)]
pub struct PlatformProfile {
    pub name: &'static str,
    /// Total load attempts before the whole operation fails.
    pub max_attempts: u32,
    /// Pause between failed attempts.
    pub retry_backoff: Duration,
    /// How long after a bare `Stopped` signal to wait for a real completion
    /// before treating the stop as a successful load.
    pub stop_grace: Duration,
    /// Hard ceiling on a single attempt.
    pub attempt_timeout: Duration,
    /// Quiet period after readiness scripts before capturing HTML.
    pub settle_delay: Duration,
    /// Run the incremental-scroll pass to flush lazy-loaded images.
    pub scroll_probe: bool,
    /// Minimum body text length the capture script demands.
    pub min_text_len: usize,
    /// Use a mobile in-app identity instead of a desktop browser one.
    pub mobile_identity: bool,
    /// Title substrings that indicate an anti-bot interstitial page.
    pub interstitial_markers: &'static [&'static str],
    /// Exact dimensions rejected outright by the image filter. Covers
    /// platform default-avatar placeholders rendered at a fixed size.
    pub size_exceptions: &'static [(u32, u32)],
}

pub static GENERIC: PlatformProfile = PlatformProfile {
    name: "generic",
    max_attempts: 3,
    retry_backoff: Duration::from_secs(2),
    stop_grace: Duration::from_secs(6),
    attempt_timeout: Duration::from_secs(30),
    settle_delay: Duration::from_secs(2),
    scroll_probe: false,
    min_text_len: 100,
    mobile_identity: false,
    interstitial_markers: &["Just a moment"],
    size_exceptions: &[],
};

/// WeChat official-account articles load slowly, lazy-load aggressively, and
/// sit behind an environment-check interstitial, so everything is more
/// patient here.
pub static WECHAT: PlatformProfile = PlatformProfile {
    name: "wechat",
    max_attempts: 5,
    retry_backoff: Duration::from_secs(3),
    stop_grace: Duration::from_secs(12),
    attempt_timeout: Duration::from_secs(45),
    settle_delay: Duration::from_secs(2),
    scroll_probe: true,
    min_text_len: 50,
    mobile_identity: true,
    interstitial_markers: &["环境异常", "验证"],
    size_exceptions: &[(272, 272)],
};

/// Pick the policy record for a URL by hostname.
pub fn classify(url: &Url) -> &'static PlatformProfile {
    match url.host_str() {
        Some(host) if host == "mp.weixin.qq.com" => &WECHAT,
        _ => &GENERIC,
    }
}
