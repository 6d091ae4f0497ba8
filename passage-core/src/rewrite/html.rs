//! HTML document rewriting
//!
//! Steps run in a fixed order, each on the previous step's output:
//!
//! 1. drop tracking `<script src>` tags and ad `<iframe>`s
//! 2. inject `<base href="{origin}/">` (synthesizing `<head>` when missing)
//! 3. drop `Content-Security-Policy` / `X-Frame-Options` meta tags
//! 4. absolutize `href`, `src` and `srcset` attribute values
//! 5. absolutize `url()` in `style` attributes and `<style>` blocks, and `<form action>`
//! 6. insert the protection snippet before `</head>`
//! 7. drop `dns-prefetch` / `preconnect` links

use super::css::{self, quoted_value, CssPatterns};
use super::{absolutize, script};
use regex::{Captures, Regex};
use url::Url;

/// Substrings identifying analytics and tracking scripts
pub const TRACKING_SCRIPTS: &[&str] = &[
    "ga.js",
    "analytics.js",
    "gtag.js",
    "fbevents.js",
    "pixel.js",
    "tracker.js",
    "tracking.js",
    "telemetry.js",
    "gtm.js",
    "tag-manager",
    "hotjar",
    "clarity.ms",
    "mouseflow",
    "fullstory",
    "heap.js",
];

/// Substrings identifying ad-serving iframe sources
pub const AD_IFRAME_HOSTS: &[&str] = &["doubleclick", "googlesyndication", "advertising", "adservice"];

#[derive(Debug)]
pub(crate) struct HtmlPatterns {
    script_src: Regex,
    iframe_src: Regex,
    base_tag: Regex,
    head_open: Regex,
    head_close: Regex,
    html_open: Regex,
    security_meta: Regex,
    tag: Regex,
    link_attr: Regex,
    srcset_attr: Regex,
    style_attr: Regex,
    style_block: Regex,
    leak_link: Regex,
}

impl HtmlPatterns {
    pub(crate) fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            script_src: Regex::new(
                r#"(?is)<script\b[^>]*?\bsrc\s*=\s*["']([^"']*)["'][^>]*>\s*</script\s*>"#,
            )?,
            iframe_src: Regex::new(
                r#"(?is)<iframe\b[^>]*?\bsrc\s*=\s*["']([^"']*)["'][^>]*>.*?</iframe\s*>"#,
            )?,
            base_tag: Regex::new(r"(?i)<base\b")?,
            head_open: Regex::new(r"(?i)<head\b[^>]*>")?,
            head_close: Regex::new(r"(?i)</head\s*>")?,
            html_open: Regex::new(r"(?i)<html\b[^>]*>")?,
            security_meta: Regex::new(
                r#"(?i)<meta\b[^>]*\bhttp-equiv\s*=\s*["']?\s*(?:content-security-policy|x-frame-options)\b[^>]*>"#,
            )?,
            tag: Regex::new(r"<([a-zA-Z][a-zA-Z0-9:-]*)\b[^>]*>")?,
            link_attr: Regex::new(r#"(?i)(\s)(href|src|action)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)?,
            srcset_attr: Regex::new(r#"(?i)(\s)(srcset)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)?,
            style_attr: Regex::new(r#"(?i)(\s)(style)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)?,
            style_block: Regex::new(r"(?is)(<style\b[^>]*>)(.*?)(</style\s*>)")?,
            leak_link: Regex::new(
                r#"(?i)<link\b[^>]*\brel\s*=\s*["']?\s*(?:dns-prefetch|preconnect)\b[^>]*>"#,
            )?,
        })
    }
}

pub(crate) fn rewrite(html: &HtmlPatterns, styles: &CssPatterns, document: &str, origin: &Url) -> String {
    let document = strip_trackers(html, document);
    let document = inject_base(html, &document, origin);
    let document = html.security_meta.replace_all(&document, "").into_owned();
    let document = rewrite_tags(html, styles, &document, origin);
    let document = rewrite_style_blocks(html, styles, &document, origin);
    let document = inject_guard(html, &document, origin);
    html.leak_link.replace_all(&document, "").into_owned()
}

fn strip_trackers(html: &HtmlPatterns, document: &str) -> String {
    let document = html.script_src.replace_all(document, |caps: &Captures| {
        let src = caps[1].to_ascii_lowercase();
        if TRACKING_SCRIPTS.iter().any(|name| src.contains(name)) {
            log::debug!("Removed tracking script {}", &caps[1]);
            "<!-- tracking removed -->".to_string()
        } else {
            caps[0].to_string()
        }
    });

    html.iframe_src
        .replace_all(&document, |caps: &Captures| {
            let src = caps[1].to_ascii_lowercase();
            if AD_IFRAME_HOSTS.iter().any(|host| src.contains(host)) {
                "<!-- ad removed -->".to_string()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

fn inject_base(html: &HtmlPatterns, document: &str, origin: &Url) -> String {
    if html.base_tag.is_match(document) {
        return document.to_string();
    }

    let base = format!(r#"<base href="{}">"#, origin.as_str());
    if let Some(head) = html.head_open.find(document) {
        insert_at(document, head.end(), &base)
    } else if let Some(root) = html.html_open.find(document) {
        insert_at(document, root.end(), &format!("<head>{}</head>", base))
    } else {
        format!("<head>{}</head>{}", base, document)
    }
}

/// Per-tag attribute pass (steps 4 and 5)
fn rewrite_tags(html: &HtmlPatterns, styles: &CssPatterns, document: &str, origin: &Url) -> String {
    html.tag
        .replace_all(document, |caps: &Captures| {
            let tag = &caps[0];
            let is_form = caps[1].eq_ignore_ascii_case("form");

            let tag = html.link_attr.replace_all(tag, |attr: &Captures| {
                if attr[2].eq_ignore_ascii_case("action") && !is_form {
                    return attr[0].to_string();
                }
                rewrite_attr(attr, |value| absolutize(origin, value))
            });
            let tag = html
                .srcset_attr
                .replace_all(&tag, |attr: &Captures| rewrite_attr(attr, |value| rewrite_srcset(value, origin)));
            html.style_attr
                .replace_all(&tag, |attr: &Captures| {
                    rewrite_attr(attr, |value| {
                        let rewritten = css::rewrite(styles, value, origin);
                        (rewritten != value).then_some(rewritten)
                    })
                })
                .into_owned()
        })
        .into_owned()
}

/// Rebuild `{space}{name}={quote}{value}{quote}`, keeping the original on `None`
fn rewrite_attr(attr: &Captures, rewrite: impl FnOnce(&str) -> Option<String>) -> String {
    let (value, quote) = quoted_value(attr, 3);
    match rewrite(value) {
        Some(rewritten) if quote == "'" || !rewritten.contains('"') => {
            format!("{}{}={}{}{}", &attr[1], &attr[2], quote, rewritten, quote)
        }
        _ => attr[0].to_string(),
    }
}

/// Resolve each `url [descriptor]` candidate; `None` when nothing changed
fn rewrite_srcset(srcset: &str, origin: &Url) -> Option<String> {
    if srcset.contains("data:") {
        return None;
    }

    let mut changed = false;
    let candidates: Vec<String> = srcset
        .split(',')
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .map(|candidate| {
            let (url, descriptor) = match candidate.split_once(char::is_whitespace) {
                Some((url, descriptor)) => (url, Some(descriptor.trim())),
                None => (candidate, None),
            };
            let url = match absolutize(origin, url) {
                Some(absolute) => {
                    changed = true;
                    absolute
                }
                None => url.to_string(),
            };
            match descriptor {
                Some(descriptor) if !descriptor.is_empty() => format!("{} {}", url, descriptor),
                _ => url,
            }
        })
        .collect();

    changed.then(|| candidates.join(", "))
}

fn rewrite_style_blocks(html: &HtmlPatterns, styles: &CssPatterns, document: &str, origin: &Url) -> String {
    html.style_block
        .replace_all(document, |caps: &Captures| {
            format!("{}{}{}", &caps[1], css::rewrite(styles, &caps[2], origin), &caps[3])
        })
        .into_owned()
}

fn inject_guard(html: &HtmlPatterns, document: &str, origin: &Url) -> String {
    if document.contains(script::GUARD_MARKER) {
        return document.to_string();
    }

    let guard = script::protection_script(origin);
    match html.head_close.find(document) {
        Some(close) => insert_at(document, close.start(), &guard),
        None => format!("{}{}", guard, document),
    }
}

fn insert_at(document: &str, at: usize, fragment: &str) -> String {
    let mut out = String::with_capacity(document.len() + fragment.len());
    out.push_str(&document[..at]);
    out.push_str(fragment);
    out.push_str(&document[at..]);
    out
}
