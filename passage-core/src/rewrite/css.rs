//! Stylesheet rewriting: `url()` and `@import` references

use super::absolutize;
use regex::{Captures, Regex};
use url::Url;

#[derive(Debug)]
pub(crate) struct CssPatterns {
    url_ref: Regex,
    import: Regex,
}

impl CssPatterns {
    pub(crate) fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            // Unquoted values never start with `&` so entity-quoted ones stay put
            url_ref: Regex::new(
                r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)"'\s&][^)"'\s]*))\s*\)"#,
            )?,
            import: Regex::new(r#"(?i)@import\s+(?:"([^"]*)"|'([^']*)')"#)?,
        })
    }
}

/// Value of the first participating quoted/unquoted group, with its quote
pub(crate) fn quoted_value<'t>(caps: &Captures<'t>, first_group: usize) -> (&'t str, &'static str) {
    if let Some(m) = caps.get(first_group) {
        (m.as_str(), "\"")
    } else if let Some(m) = caps.get(first_group + 1) {
        (m.as_str(), "'")
    } else {
        (caps.get(first_group + 2).map_or("", |m| m.as_str()), "")
    }
}

pub(crate) fn rewrite(patterns: &CssPatterns, stylesheet: &str, origin: &Url) -> String {
    let stylesheet = patterns.url_ref.replace_all(stylesheet, |caps: &Captures| {
        let (value, quote) = quoted_value(caps, 1);
        match absolutize(origin, value) {
            Some(absolute) => format!("url({quote}{absolute}{quote})"),
            None => caps[0].to_string(),
        }
    });

    patterns
        .import
        .replace_all(&stylesheet, |caps: &Captures| {
            let (value, quote) = quoted_value(caps, 1);
            match absolutize(origin, value) {
                Some(absolute) => format!("@import {quote}{absolute}{quote}"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
