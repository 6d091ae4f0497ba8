//! Matching primitives for blocklist entries

use regex::{Regex, RegexBuilder};

/// Exact hostname or parent-domain match: `example.com` matches
/// `example.com` and `cdn.example.com`, never `badexample.com`.
pub fn matches_domain(domain: &str, host: &str) -> bool {
    let domain = normalize_host(domain);
    let host = normalize_host(host);
    if domain.is_empty() {
        return false;
    }

    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

/// Compile a user pattern, matched case-insensitively against `host + path`
pub fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).size_limit(1 << 20).build()
}

fn normalize_host(host: &str) -> &str {
    host.trim().trim_end_matches('.')
}
