//! URL canonicalization, the domain blocklist, and the trusted-source
//! lookup. All pure functions over fixed tables.

use once_cell::sync::OnceCell;
use regex::Regex;

/// Domains whose results are never usable as citations: shorteners,
/// social networks, and known content farms.
const BLOCKED_DOMAINS: &[&str] = &[
    "bit.ly",
    "t.co",
    "tinyurl.com",
    "facebook.com",
    "twitter.com",
    "x.com",
    "instagram.com",
    "tiktok.com",
    "pinterest.com",
    "reddit.com",
    "quora.com",
    "medium.com",
];

/// Known publishers we can attribute by name.
const TRUSTED_SOURCES: &[(&str, &str)] = &[
    ("phnompenhpost.com", "The Phnom Penh Post"),
    ("khmertimeskh.com", "Khmer Times"),
    ("cambodianess.com", "Cambodianess"),
    ("vodenglish.news", "VOD English"),
    ("tourismcambodia.com", "Tourism Cambodia"),
    ("evisa.gov.kh", "Cambodia e-Visa"),
    ("bbc.com", "BBC"),
    ("reuters.com", "Reuters"),
    ("aljazeera.com", "Al Jazeera"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedSource {
    pub publisher: &'static str,
}

/// Canonical form used for dedup and grounding comparison: scheme kept,
/// `www.` stripped from the host, trailing slash stripped.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    static RE_WWW: OnceCell<Regex> = OnceCell::new();
    let re = RE_WWW.get_or_init(|| Regex::new(r"^(https?://)www\.").unwrap());
    re.replace(trimmed, "$1").to_string()
}

/// Host part of a URL, lowercased, without `www.`; empty when unparseable.
fn host_of(url: &str) -> String {
    static RE_HOST: OnceCell<Regex> = OnceCell::new();
    let re = RE_HOST.get_or_init(|| Regex::new(r"^https?://([^/:?#]+)").unwrap());
    re.captures(url.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
        .map(|h| h.strip_prefix("www.").map(str::to_string).unwrap_or(h))
        .unwrap_or_default()
}

pub fn is_blocked_domain(url: &str) -> bool {
    let host = host_of(url);
    if host.is_empty() {
        // Unparseable URLs are unusable as citations; treat as blocked.
        return true;
    }
    BLOCKED_DOMAINS
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")))
}

pub fn find_trusted_source(url: &str) -> Option<TrustedSource> {
    let host = host_of(url);
    TRUSTED_SOURCES
        .iter()
        .find(|(d, _)| host == *d || host.ends_with(&format!(".{d}")))
        .map(|(_, publisher)| TrustedSource { publisher })
}
