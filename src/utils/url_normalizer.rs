// URL and domain canonicalization for feed matching
// Feed entries and looked-up URLs pass through the same functions so that
// membership checks compare like with like

use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use url::{Host, Url};

// =============================================================================
// STATIC PATTERNS
// =============================================================================

lazy_static! {
    /// Runs of slashes inside a path
    static ref DUPLICATE_SLASHES: Regex = Regex::new(r"/{2,}").expect("Invalid slash pattern regex");

    /// Query parameters that only carry campaign tracking state
    static ref TRACKING_PARAMS: HashSet<&'static str> = [
        "utm_source",
        "utm_medium",
        "utm_campaign",
        "utm_term",
        "utm_content",
        "gclid",
        "fbclid",
        "mc_cid",
        "mc_eid",
        "vero_conv",
        "vero_id",
    ]
    .into_iter()
    .collect();
}

// =============================================================================
// URL NORMALIZATION
// =============================================================================

/// Canonicalize an http(s) URL.
///
/// Lowercases and punycodes the host, drops default ports and the fragment,
/// strips tracking parameters and collapses duplicate path slashes. Returns
/// `None` for unparsable input and non-http(s) schemes. The output is a fixed
/// point: normalizing it again yields the same string.
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.host_str()?;

    // The url crate already lowercases, IDNA-encodes the host and hides
    // default ports; an explicit default port survives only on re-serialization
    if (url.scheme() == "http" && url.port() == Some(80))
        || (url.scheme() == "https" && url.port() == Some(443))
    {
        url.set_port(None).ok()?;
    }

    url.set_fragment(None);

    let has_tracking = url
        .query_pairs()
        .any(|(key, _)| TRACKING_PARAMS.contains(key.as_ref()));
    if has_tracking {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !TRACKING_PARAMS.contains(key.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    if url.path().contains("//") {
        let collapsed = DUPLICATE_SLASHES.replace_all(url.path(), "/").into_owned();
        url.set_path(&collapsed);
    }

    Some(url.to_string())
}

/// Lowercased ASCII hostname of a URL, or `None` when it has no host
pub fn hostname_of(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    url.host_str().map(|h| h.to_lowercase())
}

// =============================================================================
// DOMAIN NORMALIZATION
// =============================================================================

/// Canonicalize a bare domain: trimmed, lowercased, punycoded and without
/// trailing dots. Domains without a `.` are rejected.
pub fn normalize_domain(input: &str) -> Option<String> {
    let trimmed = input.trim().to_lowercase();
    let trimmed = trimmed.trim_end_matches('.');
    if trimmed.is_empty() || !trimmed.contains('.') {
        return None;
    }

    match Host::parse(trimmed).ok()? {
        Host::Domain(domain) => Some(domain),
        Host::Ipv4(addr) => Some(addr.to_string()),
        Host::Ipv6(_) => None,
    }
}

/// True for IPv4 and bracketed IPv6 hosts, which have no domain hierarchy
pub fn is_ip_literal(host: &str) -> bool {
    matches!(Host::parse(host), Ok(Host::Ipv4(_)) | Ok(Host::Ipv6(_)))
}

/// Registrable domain (public suffix plus one label) of a hostname
pub fn registrable_domain(host: &str) -> Option<String> {
    let host = host.trim_end_matches('.');
    psl::domain_str(host).map(str::to_string)
}

/// Split a domain into its leading label and the remainder after the first dot
pub fn split_first_label(domain: &str) -> Option<(&str, &str)> {
    let (label, rest) = domain.split_once('.')?;
    if label.is_empty() || rest.is_empty() {
        return None;
    }
    Some((label, rest))
}

/// Stable key for a URL: lowercase hex SHA-256
pub fn url_hash(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.as_bytes()))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_url_basics() {
        assert_eq!(
            normalize_url("http://Example.COM:80/phish").as_deref(),
            Some("http://example.com/phish")
        );
        assert_eq!(
            normalize_url("https://example.com:443/a#frag").as_deref(),
            Some("https://example.com/a")
        );
        assert_eq!(
            normalize_url("https://example.com:8443/a").as_deref(),
            Some("https://example.com:8443/a")
        );
    }

    #[test]
    fn test_normalize_url_strips_tracking_params() {
        assert_eq!(
            normalize_url("https://example.com/p?utm_source=x&id=7&fbclid=abc").as_deref(),
            Some("https://example.com/p?id=7")
        );
        assert_eq!(
            normalize_url("https://example.com/p?gclid=1").as_deref(),
            Some("https://example.com/p")
        );
    }

    #[test]
    fn test_normalize_url_collapses_slashes() {
        assert_eq!(
            normalize_url("https://example.com//a///b/").as_deref(),
            Some("https://example.com/a/b/")
        );
    }

    #[test]
    fn test_normalize_url_punycodes_host() {
        let normalized = normalize_url("https://BÜCHER.example/x").unwrap();
        assert!(normalized.starts_with("https://xn--bcher-kva.example/"));
    }

    #[test]
    fn test_normalize_url_rejects_other_schemes() {
        assert!(normalize_url("ftp://example.com/file").is_none());
        assert!(normalize_url("javascript:alert(1)").is_none());
        assert!(normalize_url("not a url").is_none());
    }

    #[test]
    fn test_normalize_url_is_idempotent() {
        let inputs = [
            "http://Example.com:80/phish",
            "https://a.example.com//x//y?utm_term=z&q=1%202#top",
            "https://bücher.example/über?a=b c",
            "http://example.com",
            "https://example.com/?",
            "https://user:pw@Example.com:443//login?mc_eid=1",
        ];
        for input in inputs {
            let once = normalize_url(input).unwrap();
            let twice = normalize_url(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {}", input);
        }
    }

    fn arbitrary_url() -> impl Strategy<Value = String> {
        let scheme = prop::sample::select(vec!["http", "https", "HTTPS"]);
        let host = prop_oneof![
            "[a-zA-Z][a-zA-Z0-9]{0,10}(\\.[a-zA-Z][a-zA-Z0-9-]{0,6}[a-zA-Z0-9])?\\.(com|org|co\\.uk|example)",
            Just("bücher.example".to_string()),
        ];
        let port = prop::option::of(prop_oneof![Just(80u16), Just(443u16), 1u16..=65535]);
        let path = prop::collection::vec("[a-zA-Z0-9_.~-]{0,8}", 0..5);
        let query = prop::collection::vec(
            (
                prop::sample::select(vec!["utm_source", "utm_campaign", "fbclid", "gclid", "id", "q", "page"]),
                "[a-zA-Z0-9]{0,6}",
            ),
            0..4,
        );
        let fragment = prop::option::of("[a-z0-9]{0,6}");

        (scheme, host, port, path, query, fragment).prop_map(
            |(scheme, host, port, path, query, fragment)| {
                let mut url = format!("{}://{}", scheme, host);
                if let Some(port) = port {
                    url.push_str(&format!(":{}", port));
                }
                url.push('/');
                url.push_str(&path.join("/"));
                if !query.is_empty() {
                    let pairs: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                    url.push('?');
                    url.push_str(&pairs.join("&"));
                }
                if let Some(fragment) = fragment {
                    url.push('#');
                    url.push_str(&fragment);
                }
                url
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 512,
            ..ProptestConfig::default()
        })]

        #[test]
        fn test_normalize_url_is_idempotent_for_generated_urls(raw in arbitrary_url()) {
            let once = normalize_url(&raw);
            prop_assert!(once.is_some(), "rejected {}", raw);
            let once = once.unwrap();
            prop_assert_eq!(normalize_url(&once), Some(once.clone()));

            let parsed = Url::parse(&once).unwrap();
            prop_assert!(parsed.fragment().is_none());
            prop_assert!(!parsed.path().contains("//"));
            prop_assert!(parsed.query_pairs().all(|(k, _)| !TRACKING_PARAMS.contains(k.as_ref())));
            let host = parsed.host_str().unwrap();
            prop_assert!(host.is_ascii());
            prop_assert_eq!(host.to_string(), host.to_lowercase());
        }
    }

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain(" Example.COM. ").as_deref(), Some("example.com"));
        assert_eq!(normalize_domain("example.com...").as_deref(), Some("example.com"));
        assert_eq!(
            normalize_domain("bücher.example").as_deref(),
            Some("xn--bcher-kva.example")
        );
        assert!(normalize_domain("localhost").is_none());
        assert!(normalize_domain("").is_none());
        assert!(normalize_domain("...").is_none());
    }

    #[test]
    fn test_registrable_domain() {
        assert_eq!(
            registrable_domain("www.a.example.co.uk").as_deref(),
            Some("example.co.uk")
        );
        assert_eq!(registrable_domain("a.b.c.com").as_deref(), Some("c.com"));
        assert_eq!(registrable_domain("google.com").as_deref(), Some("google.com"));
    }

    #[test]
    fn test_is_ip_literal() {
        assert!(is_ip_literal("1.2.3.4"));
        assert!(is_ip_literal("[::1]"));
        assert!(!is_ip_literal("example.com"));
        assert!(!is_ip_literal("3.4.example"));
    }

    #[test]
    fn test_split_first_label() {
        assert_eq!(split_first_label("google.com"), Some(("google", "com")));
        assert_eq!(split_first_label("example.co.uk"), Some(("example", "co.uk")));
        assert_eq!(split_first_label("localhost"), None);
    }

    #[test]
    fn test_url_hash_is_hex_sha256() {
        let hash = url_hash("https://example.com");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, url_hash("https://example.com"));
    }
}
