//! In-page JavaScript used by the readiness probe.
//!
//! Every script follows the WebDriver async-script convention: the injected
//! completion callback is `arguments[0]`, and the script must call it exactly
//! once. [`crate::session::RenderSession::evaluate`] assumes this shape.

/// Scripts that settle page content and capture it once stable.
pub struct ProbeScripts;

impl ProbeScripts {
    /// Wait (bounded) for images to finish loading, then write the measured
    /// dimensions back onto each element as `data-real-width`/`-height`.
    ///
    /// Extraction happens later on serialized HTML, where layout information
    /// is gone; the writeback is how real rendered sizes survive the trip.
    /// Images that failed get `data-load-failed`, and images with any
    /// transparent pixels (sampled, tainted canvases skipped) get
    /// `data-has-transparency` so the filter can spot icons and logos.
    pub fn image_settle() -> &'static str {
        r#"
        var done = arguments[0];
        (async () => {
            const imgs = Array.from(document.querySelectorAll('img'));
            // Per-image bound: one broken image must not stall the probe.
            await Promise.all(imgs.map(img => new Promise(resolve => {
                if (img.complete) return resolve();
                const timer = setTimeout(resolve, 3000);
                const settle = () => { clearTimeout(timer); resolve(); };
                img.addEventListener('load', settle, { once: true });
                img.addEventListener('error', settle, { once: true });
            })));
            for (const img of imgs) {
                img.setAttribute('data-real-width', String(img.naturalWidth || 0));
                img.setAttribute('data-real-height', String(img.naturalHeight || 0));
                if (img.complete && img.naturalWidth === 0) {
                    img.setAttribute('data-load-failed', 'true');
                    continue;
                }
                if (!img.complete) continue;
                try {
                    const canvas = document.createElement('canvas');
                    const w = Math.min(img.naturalWidth, 64);
                    const h = Math.min(img.naturalHeight, 64);
                    if (w === 0 || h === 0) continue;
                    canvas.width = w;
                    canvas.height = h;
                    const ctx = canvas.getContext('2d');
                    ctx.drawImage(img, 0, 0, w, h);
                    const data = ctx.getImageData(0, 0, w, h).data;
                    for (let i = 3; i < data.length; i += 16) {
                        if (data[i] < 255) {
                            img.setAttribute('data-has-transparency', 'true');
                            break;
                        }
                    }
                } catch (e) {
                    // Cross-origin image taints the canvas; skip sampling.
                }
            }
            done(imgs.length);
        })().catch(e => done(String(e)));
        "#
    }

    /// Scroll down in fixed steps until the page height stops growing, then
    /// jump back to the top. Flushes lazy-loaded images into the DOM.
    pub fn lazy_scroll() -> &'static str {
        r#"
        var done = arguments[0];
        (async () => {
            const step = 500;
            let stable = 0;
            let lastHeight = document.body.scrollHeight;
            for (let i = 0; i < 60 && stable < 3; i++) {
                window.scrollBy(0, step);
                await new Promise(r => setTimeout(r, 100));
                const h = document.body.scrollHeight;
                const bottom = window.scrollY + window.innerHeight >= h;
                if (h === lastHeight && bottom) {
                    stable += 1;
                } else {
                    stable = 0;
                }
                lastHeight = h;
            }
            window.scrollTo(0, 0);
            done(lastHeight);
        })().catch(e => done(String(e)));
        "#
    }

    /// Capture the serialized document once it looks like a real article:
    /// `readyState` complete and at least `min_text_len` characters of body
    /// text. Returns the HTML string, or `null` when the page is not ready.
    pub fn capture(min_text_len: usize) -> String {
        format!(
            r#"
        var done = arguments[0];
        try {{
            const ready = document.readyState === 'complete';
            const text = document.body ? (document.body.innerText || '') : '';
            if (ready && text.trim().length >= {min_text_len}) {{
                done(document.documentElement.outerHTML);
            }} else {{
                done(null);
            }}
        }} catch (e) {{
            done(null);
        }}
        "#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_embeds_the_threshold() {
        let s = ProbeScripts::capture(50);
        assert!(s.contains(">= 50"));
        assert!(s.contains("outerHTML"));
    }

    #[test]
    fn scripts_take_the_async_callback() {
        for s in [
            ProbeScripts::image_settle().to_string(),
            ProbeScripts::lazy_scroll().to_string(),
            ProbeScripts::capture(100),
        ] {
            assert!(s.contains("arguments[0]"));
        }
    }
}
