//! Title/body extraction from rendered HTML: readability first, boilerplate
//! stripping as the fallback.

use dom_query::Document;
use dom_smoothie::{Config, Readability};
use factlens_common::ExtractError;
use url::Url;

/// Hard cap on plain text handed downstream.
pub const TEXT_CAP: usize = 20_000;
/// Marker appended when the cap truncates text; silent loss would skew any
/// downstream length-sensitive analysis.
const TRUNCATION_MARKER: &str = "...";

/// Text-density threshold for the readability pass. Deliberately low so
/// short posts survive; the default tuning discards them.
const CHAR_THRESHOLD: usize = 100;

/// Minimum fallback text length to count as a real article body.
const MIN_FALLBACK_TEXT: usize = 50;

/// Boilerplate stripped before judging the fallback body.
const BOILERPLATE_TAGS: &str =
    "script, style, iframe, embed, object, nav, header, footer, aside, form, noscript";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub title: String,
    /// Article body HTML, before image filtering rewrites it.
    pub content: String,
    /// Plain text, capped at [`TEXT_CAP`] characters.
    pub text_content: String,
}

/// Extract title and body from rendered HTML.
///
/// Primary path is a readability pass; when that yields nothing, the body is
/// stripped of boilerplate and used directly if it still has non-trivial
/// text or at least one image. A body emptied by stripping gets one retry
/// against the unstripped markup before `ParseFailure`.
pub fn extract_article(html: &str, url: &Url) -> Result<ExtractedArticle, ExtractError> {
    if let Some(article) = readability_pass(html, url) {
        return Ok(article);
    }
    tracing::debug!(url = %url, "readability yielded nothing; trying fallback body");
    fallback_pass(html).ok_or(ExtractError::ParseFailure)
}

fn readability_pass(html: &str, url: &Url) -> Option<ExtractedArticle> {
    let config = Config {
        char_threshold: CHAR_THRESHOLD,
        ..Default::default()
    };
    let mut readability = Readability::new(html, Some(url.as_str()), Some(config)).ok()?;
    let article = readability.parse().ok()?;

    let text = article.text_content.trim().to_string();
    if text.is_empty() {
        return None;
    }
    Some(ExtractedArticle {
        title: article.title.trim().to_string(),
        content: article.content.to_string(),
        text_content: cap_text(&text),
    })
}

fn fallback_pass(html: &str) -> Option<ExtractedArticle> {
    let doc = Document::from(html);
    let title = doc.select("title").text().trim().to_string();

    let stripped = Document::from(html);
    stripped.select(BOILERPLATE_TAGS).remove();
    if let Some(article) = body_as_article(&stripped, &title) {
        return Some(article);
    }
    // Stripping can eat everything on markup-soup pages; the raw body is
    // still better than reporting failure.
    body_as_article(&doc, &title)
}

fn body_as_article(doc: &Document, title: &str) -> Option<ExtractedArticle> {
    let body = doc.select("body");
    if !body.exists() {
        return None;
    }
    let text = body.text().trim().to_string();
    let has_image = body.select("img").exists();
    if text.len() < MIN_FALLBACK_TEXT && !has_image {
        return None;
    }
    Some(ExtractedArticle {
        title: title.to_string(),
        content: body.inner_html().to_string(),
        text_content: cap_text(&text),
    })
}

fn cap_text(text: &str) -> String {
    if text.chars().count() <= TEXT_CAP {
        return text.to_string();
    }
    let mut capped: String = text.chars().take(TEXT_CAP).collect();
    capped.push_str(TRUNCATION_MARKER);
    capped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://example.com/story").unwrap()
    }

    fn article_page(paragraphs: usize) -> String {
        let body: String = (0..paragraphs)
            .map(|i| {
                format!(
                    "<p>Paragraph {i} carries enough narrative text to register as \
                     article content for density scoring purposes in the parser.</p>"
                )
            })
            .collect();
        format!(
            "<html><head><title>Test Story</title></head>\
             <body><article><h1>Test Story</h1>{body}</article></body></html>"
        )
    }

    #[test]
    fn readability_extracts_a_normal_article() {
        let got = extract_article(&article_page(8), &url()).unwrap();
        assert!(got.title.contains("Test Story"));
        assert!(got.text_content.contains("Paragraph 3"));
        assert!(got.content.contains("<p>"));
    }

    #[test]
    fn fallback_accepts_a_body_with_only_an_image() {
        let html = r#"<html><head><title>Pic</title></head>
            <body><img src="https://example.com/only.jpg"></body></html>"#;
        let got = extract_article(html, &url()).unwrap();
        assert!(got.content.contains("only.jpg"));
    }

    #[test]
    fn fallback_retries_unstripped_body() {
        // Everything is inside boilerplate tags, so stripping leaves nothing;
        // the unstripped body still qualifies on text length.
        let filler = "real words ".repeat(20);
        let html = format!(
            "<html><body><nav>{filler}</nav><footer>{filler}</footer></body></html>"
        );
        let got = extract_article(&html, &url()).unwrap();
        assert!(got.text_content.contains("real words"));
    }

    #[test]
    fn empty_page_is_a_parse_failure() {
        let err = extract_article("<html><body><p>hi</p></body></html>", &url()).unwrap_err();
        assert!(matches!(err, ExtractError::ParseFailure));
    }

    #[test]
    fn long_text_is_capped_with_a_marker() {
        let capped = cap_text(&"字".repeat(TEXT_CAP + 5));
        assert_eq!(capped.chars().count(), TEXT_CAP + TRUNCATION_MARKER.len());
        assert!(capped.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(cap_text("short"), "short");
    }
}
