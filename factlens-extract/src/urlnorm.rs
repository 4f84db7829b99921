use url::Url;

/// Longest raw URL worth resolving; anything bigger is junk or abuse.
pub const MAX_URL_LEN: usize = 2048;

/// Resolve `raw` against `base` and normalize it into the canonical form
/// used as the image dedup key: fragment stripped, query parameters sorted
/// by key in ordinal (locale-independent) order.
///
/// Returns `None` for non-http(s) schemes, unresolvable references, and
/// oversized inputs. Idempotent over its own output.
pub fn normalize_url(base: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.len() > MAX_URL_LEN {
        return None;
    }
    let mut resolved = base.join(raw).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    resolved.set_fragment(None);

    if resolved.query().is_some() {
        let mut pairs: Vec<(String, String)> = resolved
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if pairs.is_empty() {
            resolved.set_query(None);
        } else {
            // Stable sort keeps repeated keys in document order.
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            for (k, v) in &pairs {
                serializer.append_pair(k, v);
            }
            let query = serializer.finish();
            resolved.set_query(Some(&query));
        }
    }

    Some(resolved.to_string())
}
