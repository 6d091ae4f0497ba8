//! Response rewriting so third-party documents render under the proxy origin
//!
//! [`Rewriter`] holds the compiled patterns; build it once and share it.
//! Rewriting never fails as a whole: a value that cannot be resolved is left
//! exactly as it was.

pub mod css;
pub mod html;
pub mod script;

use url::Url;

/// Text rewriter for HTML documents and CSS stylesheets
#[derive(Debug)]
pub struct Rewriter {
    html: html::HtmlPatterns,
    css: css::CssPatterns,
}

impl Rewriter {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self { html: html::HtmlPatterns::new()?, css: css::CssPatterns::new()? })
    }

    /// Rewrite a document fetched from `origin` (see [`html`] for the steps)
    pub fn rewrite_html(&self, document: &str, origin: &Url) -> String {
        html::rewrite(&self.html, &self.css, document, origin)
    }

    /// Absolutize `url()` and `@import` references in a stylesheet
    pub fn rewrite_css(&self, stylesheet: &str, origin: &Url) -> String {
        css::rewrite(&self.css, stylesheet, origin)
    }
}

/// Root URL of the target's origin, e.g. `https://example.com/`
pub fn origin_root(target: &Url) -> Option<Url> {
    let origin = target.origin();
    if !origin.is_tuple() {
        return None;
    }
    Url::parse(&format!("{}/", origin.ascii_serialization())).ok()
}

/// Resolve a reference against `origin`.
///
/// `None` means "leave it alone": the value is empty, a fragment,
/// protocol-relative, already absolute under any scheme (`https:`, `data:`,
/// `javascript:`, `mailto:`...), or does not resolve.
pub fn absolutize(origin: &Url, value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.starts_with('#') || value.starts_with("//") {
        return None;
    }
    if Url::parse(value).is_ok() {
        return None;
    }
    origin.join(value).ok().map(String::from)
}
