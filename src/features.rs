use std::collections::HashMap;
use std::net::IpAddr;

use crate::models::FeatureVector;

/// Extract the structural feature vector from a raw URL.
///
/// Never fails: anything that cannot be parsed degrades to zero-valued
/// features. All features, including the character-presence flags, are
/// measured on the scheme-normalized string.
pub fn extract(url: &str) -> FeatureVector {
    let normalized = normalize(url);
    let host = raw_host(&normalized);

    FeatureVector {
        url_length: normalized.chars().count() as u32,
        num_dots: count_char(&normalized, '.'),
        // Raw dot count of the hostname, not a segment count: `www.a.b.co` gives 3.
        num_subdomains: host.as_deref().map(|h| count_char(h, '.')).unwrap_or(0),
        has_ip: flag(host.as_deref().is_some_and(|h| h.parse::<IpAddr>().is_ok())),
        has_http: flag(normalized.contains("http://")),
        has_https: flag(normalized.contains("https://")),
        has_at_symbol: flag(normalized.contains('@')),
        has_hyphen: flag(normalized.contains('-')),
    }
}

/// Prepend `http://` unless the URL already carries an http(s) scheme.
pub fn normalize(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}

/// Shannon entropy of `s` in bits per character.
pub fn shannon_entropy(s: &str) -> f64 {
    let total = s.chars().count();
    if total == 0 {
        return 0.0;
    }

    let mut counts: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *counts.entry(c).or_insert(0) += 1;
    }

    counts
        .values()
        .map(|&n| {
            let p = n as f64 / total as f64;
            -p * p.log2()
        })
        .sum()
}

/// The hostname exactly as written: the authority after `://` up to the first
/// `/`, `?` or `#`, after the last `@`, without the port, with IPv6 brackets
/// stripped, lowercased. Nothing is percent-decoded or canonicalized, so
/// `0x7f000001` stays a name rather than becoming `127.0.0.1`.
fn raw_host(normalized: &str) -> Option<String> {
    let (_, rest) = normalized.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let host = match host_port.split_once('[') {
        Some((_, bracketed)) => bracketed.split_once(']').map_or(bracketed, |(h, _)| h),
        None => host_port.split_once(':').map_or(host_port, |(h, _)| h),
    };
    (!host.is_empty()).then(|| host.to_lowercase())
}

fn count_char(s: &str, needle: char) -> u32 {
    s.chars().filter(|&c| c == needle).count() as u32
}

fn flag(b: bool) -> u8 {
    u8::from(b)
}
