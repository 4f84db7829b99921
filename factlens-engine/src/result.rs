use factlens_common::ExtractError;
use serde::{Deserialize, Serialize};

/// Marker used as the content body when the input URL was itself an image
/// and rendering was skipped entirely.
pub const DIRECT_IMAGE_MARKER: &str = "URL points to an image file";

/// Final outcome of one extraction request, serialized for callers in the
/// shape downstream consumers expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub success: bool,
    pub title: String,
    /// Article HTML with images already filtered and rewritten to absolute
    /// normalized URLs.
    pub content: String,
    /// Capped plain text.
    pub text_content: String,
    /// Absolute normalized image URLs, first-seen order, at most ten.
    pub images: Vec<String>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionResult {
    pub fn failure(url: &str, err: &ExtractError) -> Self {
        Self {
            success: false,
            title: String::new(),
            content: String::new(),
            text_content: String::new(),
            images: Vec::new(),
            url: url.to_string(),
            error: Some(err.to_string()),
        }
    }

    /// Single-image result for URLs that resolve directly to an image.
    pub fn direct_image(url: &str) -> Self {
        Self {
            success: true,
            title: String::new(),
            content: DIRECT_IMAGE_MARKER.to_string(),
            text_content: DIRECT_IMAGE_MARKER.to_string(),
            images: vec![url.to_string()],
            url: url.to_string(),
            error: None,
        }
    }
}
