// Chat-facing verdict text

use crate::models::verdict::VerdictLevel;

/// Reasons shown in a group reply
const MAX_REASONS: usize = 3;

/// Hostname with dots defanged so chat clients do not linkify it
fn redact_domain(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => parsed.host_str().unwrap_or_default().replace('.', "[.]"),
        Err(_) => url.to_string(),
    }
}

/// Reply posted into a group chat for one scanned URL
pub fn format_group_verdict(level: VerdictLevel, reasons: &[String], url: &str) -> String {
    let advice = match level {
        VerdictLevel::Malicious => "Do NOT open.",
        VerdictLevel::Benign => "Looks okay, stay vigilant.",
        VerdictLevel::Suspicious => "Use caution.",
    };

    let mut text = format!(
        "Link scan: {}\nDomain: {}\n{}",
        level.as_str().to_uppercase(),
        redact_domain(url),
        advice
    );

    let shown: Vec<&str> = reasons
        .iter()
        .take(MAX_REASONS)
        .map(String::as_str)
        .collect();
    let why = shown.join("; ");
    if !why.is_empty() {
        text.push_str("\nWhy: ");
        text.push_str(&why);
    }
    text
}

/// Reply posted when a scan could not be completed
pub fn format_failure_notice(url: &str) -> String {
    format!("Link scan: ERROR\nURL: {}\nScan failed. Please try again later.", url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malicious_with_reasons() {
        let reasons = vec![
            "Known phishing (OpenPhish)".to_string(),
            "b".to_string(),
            "c".to_string(),
            "d".to_string(),
        ];
        let text = format_group_verdict(VerdictLevel::Malicious, &reasons, "https://evil.example.com/x");
        assert_eq!(
            text,
            "Link scan: MALICIOUS\nDomain: evil[.]example[.]com\nDo NOT open.\nWhy: Known phishing (OpenPhish); b; c"
        );
    }

    #[test]
    fn test_benign_without_reasons() {
        let text = format_group_verdict(VerdictLevel::Benign, &[], "https://example.com");
        assert_eq!(text, "Link scan: BENIGN\nDomain: example[.]com\nLooks okay, stay vigilant.");
    }

    #[test]
    fn test_unparseable_url_is_shown_verbatim() {
        let text = format_group_verdict(VerdictLevel::Suspicious, &[], "not a url");
        assert!(text.contains("Domain: not a url\nUse caution."));
    }

    #[test]
    fn test_failure_notice() {
        assert_eq!(
            format_failure_notice("https://a.test"),
            "Link scan: ERROR\nURL: https://a.test\nScan failed. Please try again later."
        );
    }
}
