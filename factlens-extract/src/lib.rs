//! HTML post-processing: article extraction, image candidate collection,
//! filtering, and URL normalization. Everything here is pure with respect to
//! I/O (input HTML in, structured results out), so the whole pipeline tests
//! without a browser.

pub mod article;
pub mod filter;
pub mod images;
pub mod urlnorm;

pub use article::{extract_article, ExtractedArticle};
pub use filter::{Decision, FilterOutcome, FilterPolicy, RejectReason};
pub use images::{collect_candidates, collect_from_html, rewrite_content, ImageCandidate};
pub use urlnorm::normalize_url;
