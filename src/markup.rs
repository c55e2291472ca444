//! Streaming markup rewrites shared by the extractor and site hooks: link absolutisation and
//! selector-driven element removal.

use lol_html::{element, HtmlRewriter, Settings};
use thiserror::Error;
use url::Url;

/// Attributes that carry a URL and are resolved against the page's base URL.
const URL_ATTRIBUTES: &[&str] = &[
    "href",
    "src",
    "action",
    "cite",
    "background",
    "longdesc",
    "poster",
];

/// Failure to rewrite a markup fragment.
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("could not rewrite markup: {0}")]
    Rewrite(#[from] lol_html::errors::RewritingError),
}

/// Escape text for use in element content or a double-quoted attribute value.
pub fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Resolve every relative link in `html` against `base`. Values that cannot be joined are kept.
pub fn absolutize_links(html: &str, base: &Url) -> Result<String, RewriteError> {
    let mut output = Vec::with_capacity(html.len());
    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![element!("*", |el| {
                for attr in URL_ATTRIBUTES {
                    let Some(value) = el.get_attribute(attr) else {
                        continue;
                    };
                    if let Ok(absolute) = base.join(value.trim()) {
                        if absolute.as_str() != value {
                            el.set_attribute(attr, absolute.as_str())?;
                        }
                    }
                }
                Ok(())
            })],
            ..Default::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );
    rewriter.write(html.as_bytes())?;
    rewriter.end()?;
    Ok(String::from_utf8_lossy(&output).into_owned())
}

/// Remove every element matching any of `selectors`, content included.
pub fn remove_matching(html: &str, selectors: &[&str]) -> Result<String, RewriteError> {
    if selectors.is_empty() {
        return Ok(html.to_string());
    }
    let mut handlers = Vec::with_capacity(selectors.len());
    for selector in selectors {
        // element! unwraps its own parse, so reject bad selectors here first.
        selector
            .parse::<lol_html::Selector>()
            .map_err(|e| RewriteError::InvalidSelector {
                selector: selector.to_string(),
                reason: e.to_string(),
            })?;
        handlers.push(element!(selector, |el| {
            el.remove();
            Ok(())
        }));
    }

    let mut output = Vec::with_capacity(html.len());
    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: handlers,
            ..Default::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );
    rewriter.write(html.as_bytes())?;
    rewriter.end()?;
    Ok(String::from_utf8_lossy(&output).into_owned())
}
