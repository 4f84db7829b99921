//! Image candidate collection from rendered HTML, plus the content rewrite
//! that keeps article markup consistent with the filter's decisions.

use std::collections::{HashMap, HashSet};

use dom_query::{Document, Selection};
use url::Url;

use crate::urlnorm::normalize_url;

/// Attribute aliases probed for the effective image URL, in priority order.
/// Lazy-load libraries stash the real source under a data attribute and
/// leave `src` pointing at a placeholder, so `src` alone is not enough.
const SRC_ALIASES: &[&str] = &[
    "src",
    "data-src",
    "data-lazy-src",
    "data-original-src",
    "data-img-src",
    "data-image-src",
    "data-lazyload-src",
];

/// Dimension attribute aliases. The probe-written real sizes come first;
/// declared markup sizes are a fallback.
const WIDTH_ALIASES: &[&str] = &[
    "data-real-width",
    "width",
    "data-width",
    "data-original-width",
    "data-lazy-width",
];
const HEIGHT_ALIASES: &[&str] = &[
    "data-real-height",
    "height",
    "data-height",
    "data-original-height",
    "data-lazy-height",
];

/// Tags removed wholesale from article content before serving it on.
const EMBED_TAGS: &str = "video, audio, iframe, embed, object";

/// One prospective article image, keyed by its normalized URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    pub normalized_url: String,
    pub width: u32,
    pub height: u32,
    pub load_failed: bool,
    pub has_transparency: bool,
}

impl ImageCandidate {
    fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

fn parse_dimension(raw: &str) -> u32 {
    let digits: String = raw.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

fn attr_by_alias(sel: &Selection, aliases: &[&str]) -> Option<String> {
    for alias in aliases {
        if let Some(value) = sel.attr(alias) {
            let value = value.trim().to_string();
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

/// Pick the best URL out of a `srcset` value: the entry with the largest
/// width descriptor, falling back to the first entry.
fn pick_from_srcset(srcset: &str) -> Option<String> {
    let mut best: Option<(u64, String)> = None;
    let mut first: Option<String> = None;
    for entry in srcset.split(',') {
        let mut parts = entry.split_whitespace();
        let Some(candidate_url) = parts.next() else {
            continue;
        };
        if first.is_none() {
            first = Some(candidate_url.to_string());
        }
        let width = parts
            .next()
            .and_then(|d| d.strip_suffix('w'))
            .and_then(|w| w.parse::<u64>().ok())
            .unwrap_or(0);
        if best.as_ref().map_or(true, |(w, _)| width > *w) {
            best = Some((width, candidate_url.to_string()));
        }
    }
    best.map(|(_, u)| u).or(first)
}

fn is_image_typed(sel: &Selection) -> bool {
    sel.attr("type")
        .is_some_and(|t| t.trim().to_ascii_lowercase().starts_with("image/"))
}

fn resolve_source(sel: &Selection) -> Option<String> {
    if let Some(direct) = attr_by_alias(sel, SRC_ALIASES) {
        return Some(direct);
    }
    sel.attr("srcset")
        .and_then(|s| pick_from_srcset(&s))
}

fn candidate_from(sel: &Selection, base: &Url) -> Option<ImageCandidate> {
    let raw = resolve_source(sel)?;
    let normalized_url = normalize_url(base, &raw)?;
    let width = attr_by_alias(sel, WIDTH_ALIASES).map_or(0, |v| parse_dimension(&v));
    let height = attr_by_alias(sel, HEIGHT_ALIASES).map_or(0, |v| parse_dimension(&v));
    Some(ImageCandidate {
        normalized_url,
        width,
        height,
        load_failed: sel.attr("data-load-failed").is_some(),
        has_transparency: sel.attr("data-has-transparency").is_some(),
    })
}

/// Collect image candidates from a rendered document, deduplicated by
/// normalized URL in first-seen order. When duplicates disagree, the one
/// carrying known (non-zero) dimensions wins the merge.
pub fn collect_candidates(doc: &Document, base: &Url) -> Vec<ImageCandidate> {
    let mut ordered: Vec<ImageCandidate> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for node in doc.select("img, picture source").nodes() {
        let sel = Selection::from(*node);
        // <source> elements also carry video/audio variants; only the
        // image-typed ones are candidates.
        if node.node_name().as_deref() == Some("source") && !is_image_typed(&sel) {
            continue;
        }
        let Some(candidate) = candidate_from(&sel, base) else {
            continue;
        };
        match index.get(&candidate.normalized_url) {
            Some(&at) => {
                if candidate.has_dimensions() && !ordered[at].has_dimensions() {
                    ordered[at] = candidate;
                }
            }
            None => {
                index.insert(candidate.normalized_url.clone(), ordered.len());
                ordered.push(candidate);
            }
        }
    }

    tracing::debug!(candidates = ordered.len(), "collected image candidates");
    ordered
}

/// [`collect_candidates`] over raw HTML, for callers that do not hold a
/// parsed document.
pub fn collect_from_html(html: &str, base: &Url) -> Vec<ImageCandidate> {
    collect_candidates(&Document::from(html), base)
}

/// Rewrite article content so it only references images that survived
/// filtering: embeds are removed, rejected images are removed, and kept
/// images get their `src` pinned to the absolute normalized URL.
pub fn rewrite_content(content_html: &str, base: &Url, accepted: &HashSet<String>) -> String {
    let doc = Document::from(content_html);

    doc.select(EMBED_TAGS).remove();
    // <source> variants are redundant once the <img> src is pinned.
    doc.select("picture source").remove();

    let nodes: Vec<_> = doc.select("img").nodes().to_vec();
    for node in nodes {
        let sel = Selection::from(node);
        let keep = resolve_source(&sel)
            .and_then(|raw| normalize_url(base, &raw))
            .filter(|normalized| accepted.contains(normalized));
        match keep {
            Some(normalized) => {
                sel.set_attr("src", &normalized);
                // Responsive variants would let renderers swap in URLs that
                // never went through the filter.
                sel.remove_attr("srcset");
                sel.remove_attr("sizes");
            }
            None => sel.remove(),
        }
    }

    doc.select("body").inner_html().to_string()
}
