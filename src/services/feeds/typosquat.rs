// Typosquat detection against a popularity allowlist
// Catches single-edit lookalikes: a dropped character, an inserted character,
// an adjacent swap or hyphenation of the second-level label

use std::collections::{HashMap, HashSet};

use crate::models::signals::{TyposquatMatch, TyposquatMethod};
use crate::utils::url_normalizer::{is_ip_literal, normalize_domain, registrable_domain};

/// Labels shorter than this produce no deletion variants
const MIN_LABEL_LEN: usize = 4;

/// Parsed top-domains list
#[derive(Debug, Default, Clone)]
pub struct TopDomains {
    exact: HashSet<String>,
    /// Single-character deletion of a top domain's label -> that top domain
    variants: HashMap<String, String>,
}

/// Second-level label and public suffix of a domain
fn split_label(domain: &str) -> Option<(String, String)> {
    let suffix = match psl::suffix_str(domain) {
        Some(suffix) if suffix.len() < domain.len() => suffix,
        _ => domain.rsplit_once('.').map(|(_, tld)| tld)?,
    };
    let prefix = domain.strip_suffix(suffix)?.strip_suffix('.')?;
    let label = prefix.rsplit('.').next()?;
    if label.is_empty() {
        return None;
    }
    Some((label.to_string(), suffix.to_string()))
}

/// Every string obtained by removing exactly one character
fn deletions(label: &[char]) -> impl Iterator<Item = String> + '_ {
    (0..label.len()).map(move |skip| {
        label
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != skip)
            .map(|(_, c)| *c)
            .collect()
    })
}

impl TopDomains {
    /// Parse a top-domains file: plain domains or CSV rows where the first
    /// domain-shaped field is taken (Majestic Million layout)
    pub fn parse(raw: &str) -> Self {
        let domains = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                line.split(',')
                    .filter_map(|field| normalize_domain(field.trim_matches('"')))
                    .find(|domain| domain.chars().any(|c| c.is_ascii_alphabetic()))
            });
        Self::from_domains(domains)
    }

    pub fn from_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut exact = HashSet::new();
        let mut variants = HashMap::new();

        for domain in domains {
            let Some(domain) = normalize_domain(domain.as_ref()) else {
                continue;
            };
            if let Some((label, suffix)) = split_label(&domain) {
                let chars: Vec<char> = label.chars().collect();
                if chars.len() >= MIN_LABEL_LEN {
                    for variant in deletions(&chars) {
                        variants
                            .entry(format!("{}.{}", variant, suffix))
                            .or_insert_with(|| domain.clone());
                    }
                }
            }
            exact.insert(domain);
        }

        Self { exact, variants }
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.exact.contains(domain)
    }

    /// Look for a popular domain that `host` imitates.
    ///
    /// Both the full hostname and its registrable domain are tried. An exact
    /// allowlist member is never a typosquat.
    pub fn find_typosquat(&self, host: &str) -> Option<TyposquatMatch> {
        // An address cannot imitate a domain
        if self.exact.is_empty() || is_ip_literal(host) {
            return None;
        }

        let host = host.trim_end_matches('.').to_lowercase();
        let mut candidates = vec![host.clone()];
        if let Some(registrable) = registrable_domain(&host) {
            if registrable != host {
                candidates.push(registrable);
            }
        }

        if candidates.iter().any(|c| self.exact.contains(c)) {
            return None;
        }

        candidates.iter().find_map(|c| self.match_candidate(c))
    }

    fn match_candidate(&self, candidate: &str) -> Option<TyposquatMatch> {
        let found = |target: &str, method| TyposquatMatch {
            target: target.to_string(),
            method,
        };

        if let Some(target) = self.variants.get(candidate) {
            return Some(found(target, TyposquatMethod::MissingChar));
        }

        let (label, suffix) = split_label(candidate)?;

        if label.contains('-') {
            let collapsed = format!("{}.{}", label.replace('-', ""), suffix);
            if self.exact.contains(&collapsed) {
                return Some(found(&collapsed, TyposquatMethod::Hyphen));
            }
        }

        let chars: Vec<char> = label.chars().collect();

        if chars.len() >= MIN_LABEL_LEN {
            for variant in deletions(&chars) {
                let target = format!("{}.{}", variant, suffix);
                if self.exact.contains(&target) {
                    return Some(found(&target, TyposquatMethod::ExtraChar));
                }
            }
        }

        for i in 0..chars.len().saturating_sub(1) {
            if chars[i] == chars[i + 1] {
                continue;
            }
            let mut swapped = chars.clone();
            swapped.swap(i, i + 1);
            let target = format!("{}.{}", swapped.iter().collect::<String>(), suffix);
            if self.exact.contains(&target) {
                return Some(found(&target, TyposquatMethod::Swap));
            }
        }

        None
    }
}
