//! Content sanitizer. Reduces an extracted chapter fragment to safe, minimal markup.
//!
//! Scripts, styles, embedded objects, frames, form controls and images are dropped with their
//! content; comments and processing instructions are dropped; attention-getting and unknown tags
//! are unwrapped (content kept); attributes outside a small allow-list are removed.
//! Sanitizing already-sanitized markup changes nothing.

use crate::markup::escape;
use lol_html::html_content::Element;
use lol_html::{doc_comments, element, HtmlRewriter, Settings};
use scraper::{ElementRef, Html};
use tracing::warn;

/// Removed together with everything inside them. Raw-text elements (`xmp`, `noembed`,
/// `plaintext`) belong here: unwrapping them would turn their unparsed text into live markup.
const KILL_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "head", "title", "meta", "link", "base",
    "xmp", "noembed", "plaintext",
    "object", "embed", "applet", "param", "iframe", "frame", "frameset", "noframes",
    "button", "input", "select", "option", "optgroup", "textarea", "datalist", "keygen", "output",
    "img", "picture", "source", "svg", "math", "canvas", "audio", "video", "track", "map", "area",
];

/// Kept as-is (minus unsafe attributes). Anything not listed here or in [KILL_TAGS] is unwrapped.
const SAFE_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "address", "article", "aside", "b", "bdi", "bdo", "big", "blockquote",
    "br", "caption", "center", "cite", "code", "col", "colgroup", "dd", "del", "dfn", "div", "dl",
    "dt", "em", "figcaption", "figure", "font", "footer", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hr", "i", "ins", "kbd", "li", "mark", "ol", "p", "pre", "q", "rp", "rt", "ruby",
    "s", "samp", "section", "small", "span", "strike", "strong", "sub", "sup", "table", "tbody",
    "td", "tfoot", "th", "thead", "time", "tr", "tt", "u", "ul", "var", "wbr",
];

const SAFE_ATTRIBUTES: &[&str] = &[
    "abbr", "align", "alt", "border", "cellpadding", "cellspacing", "cite", "class", "color",
    "colspan", "datetime", "dir", "face", "headers", "height", "href", "lang", "name", "rowspan",
    "scope", "size", "span", "start", "summary", "title", "type", "valign", "width",
];

/// Return a sanitized copy of `fragment`. Never fails: if the rewriter itself errors, the
/// fragment degrades to its escaped text content.
pub fn sanitize(fragment: &str) -> String {
    match rewrite(fragment) {
        Ok(clean) => clean,
        Err(e) => {
            warn!("sanitizer could not rewrite fragment ({}); keeping text only", e);
            text_only(fragment)
        }
    }
}

fn rewrite(fragment: &str) -> Result<String, lol_html::errors::RewritingError> {
    let mut output = Vec::with_capacity(fragment.len());
    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![element!("*", |el| {
                clean_element(el);
                Ok(())
            })],
            document_content_handlers: vec![doc_comments!(|c| {
                c.remove();
                Ok(())
            })],
            ..Default::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );
    rewriter.write(fragment.as_bytes())?;
    rewriter.end()?;
    Ok(String::from_utf8_lossy(&output).into_owned())
}

fn clean_element(el: &mut Element<'_, '_>) {
    let tag = el.tag_name();
    if KILL_TAGS.contains(&tag.as_str()) {
        el.remove();
        return;
    }
    if !SAFE_TAGS.contains(&tag.as_str()) {
        el.remove_and_keep_content();
        return;
    }
    let unsafe_attributes: Vec<String> = el
        .attributes()
        .iter()
        .filter(|a| !is_safe_attribute(&a.name(), &a.value()))
        .map(|a| a.name())
        .collect();
    for name in unsafe_attributes {
        el.remove_attribute(&name);
    }
}

/// Schemes a link may carry. Relative links and fragments have no scheme and are kept.
const SAFE_SCHEMES: &[&str] = &["http", "https", "mailto", "ftp", "file"];

fn is_safe_attribute(name: &str, value: &str) -> bool {
    if !SAFE_ATTRIBUTES.contains(&name) {
        return false;
    }
    if name == "href" || name == "cite" {
        return match link_scheme(&decode_attribute(name, value)) {
            Some(scheme) => SAFE_SCHEMES.contains(&scheme.as_str()),
            None => true,
        };
    }
    true
}

/// The attribute value as a browser sees it, with character references decoded.
/// `raw` is the value as written in the source.
fn decode_attribute(name: &str, raw: &str) -> String {
    let markup = format!(r#"<a {}="{}"></a>"#, name, raw.replace('"', "&quot;"));
    let doc = Html::parse_fragment(&markup);
    doc.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find_map(|el| el.value().attr(name).map(str::to_string))
        .unwrap_or_default()
}

/// Lowercased URL scheme, if `url` has one. Tabs, newlines and leading controls are ignored the
/// way URL parsers ignore them.
fn link_scheme(url: &str) -> Option<String> {
    let url: String = url
        .trim_start_matches(|c: char| c <= ' ')
        .chars()
        .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
        .collect();
    let (scheme, _) = url.split_once(':')?;
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then(|| scheme.to_ascii_lowercase())
}

fn text_only(fragment: &str) -> String {
    let text: String = Html::parse_fragment(fragment).root_element().text().collect();
    let text = text.trim();
    if text.is_empty() {
        String::new()
    } else {
        format!("<p>{}</p>", escape(text))
    }
}
