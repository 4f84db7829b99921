use rand::prelude::SliceRandom;

use crate::profile::PlatformProfile;

/// Browser identity presented to the page: user agent plus the viewport and
/// locale that have to stay consistent with it.
#[derive(Debug, Clone)]
pub struct BrowserIdentity {
    pub user_agent: &'static str,
    pub viewport: (u32, u32),
    pub languages: &'static [&'static str],
}

static DESKTOP_POOL: &[BrowserIdentity] = &[
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                     (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36 Edg/142.0.0.0",
        viewport: (1920, 1080),
        languages: &["en-US", "en"],
    },
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                     (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36",
        viewport: (1920, 1080),
        languages: &["en-US", "en"],
    },
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                     (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36",
        viewport: (1440, 900),
        languages: &["en-US", "en"],
    },
];

/// WeChat article pages check for the in-app webview; an embedded Android
/// MicroMessenger identity is required to get article markup at all.
static WECHAT_MOBILE: BrowserIdentity = BrowserIdentity {
    user_agent: "Mozilla/5.0 (Linux; Android 14; Pixel 7 Build/UQ1A.240105.004; wv) \
                 AppleWebKit/537.36 (KHTML, like Gecko) Version/4.0 Chrome/122.0.6261.120 \
                 Mobile Safari/537.36 XWEB/1160065 MMWEBSDK/20231202 \
                 MicroMessenger/8.0.47.2560(0x28002F35) WeChat/arm64 Weixin \
                 NetType/WIFI Language/zh_CN ABI/arm64",
    viewport: (414, 896),
    languages: &["zh-CN", "zh", "en"],
};

impl BrowserIdentity {
    /// Pick an identity matching the profile: the fixed in-app one for mobile
    /// platforms, a random plausible desktop one otherwise.
    pub fn for_profile(profile: &PlatformProfile) -> BrowserIdentity {
        if profile.mobile_identity {
            return WECHAT_MOBILE.clone();
        }
        let mut rng = rand::thread_rng();
        DESKTOP_POOL
            .choose(&mut rng)
            .cloned()
            .unwrap_or_else(|| DESKTOP_POOL[0].clone())
    }
}
