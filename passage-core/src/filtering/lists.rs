//! Built-in domain lists
//!
//! Both lists match the hostname itself or any of its parent domains.

/// Advertising and tracking networks
pub const AD_DOMAINS: &[&str] = &[
    "doubleclick.net",
    "googlesyndication.com",
    "googleadservices.com",
    "facebook.net",
    "analytics.google.com",
    "google-analytics.com",
    "adservice.google.com",
    "pagead2.googlesyndication.com",
    "ads.yahoo.com",
    "advertising.com",
    "advertising.amazon.com",
    "ad.doubleclick.net",
    "static.ads-twitter.com",
    "ads-api.twitter.com",
    "scorecardresearch.com",
    "quantserve.com",
    "outbrain.com",
    "taboola.com",
    "moatads.com",
    "adsrvr.org",
    "adnxs.com",
    "rubiconproject.com",
    "criteo.com",
    "pubmatic.com",
    "openx.net",
    "contextweb.com",
    "adsystem.com",
    "adtech.de",
    "adzerk.net",
    "amazon-adsystem.com",
    "buysellads.com",
    "carbonads.com",
    "chitika.com",
];

/// Known-bad hosts. Deliberately short: the public test endpoints of the
/// major safe-browsing services, so the malicious path can be exercised.
pub const MALICIOUS_DOMAINS: &[&str] = &[
    "testsafebrowsing.appspot.com",
    "malware.testing.google.test",
    "ianfette.org",
    "wicar.org",
];

/// Return the first list entry matching `host` or one of its parents
pub fn find_suffix_match<'a>(list: &[&'a str], host: &str) -> Option<&'a str> {
    list.iter().copied().find(|domain| super::matcher::matches_domain(domain, host))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_match_on_label_boundary() {
        assert_eq!(find_suffix_match(AD_DOMAINS, "doubleclick.net"), Some("doubleclick.net"));
        assert_eq!(
            find_suffix_match(AD_DOMAINS, "stats.g.doubleclick.net"),
            Some("doubleclick.net")
        );
        assert_eq!(find_suffix_match(AD_DOMAINS, "notdoubleclick.net"), None);
        assert_eq!(find_suffix_match(AD_DOMAINS, "example.com"), None);
    }
}
