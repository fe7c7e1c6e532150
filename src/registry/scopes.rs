use once_cell::sync::Lazy;
use regex::Regex;

/// E1, E1A, E1B, E2, E2A, E2B
pub(crate) static SCOPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"E[12][AB]?").expect("valid scope regex"));

/// Scope codes found in `text`, uppercased, first-seen order, no repeats.
pub fn scope_codes(text: &str) -> Vec<String> {
    let upper = text.to_uppercase();
    let mut out: Vec<String> = Vec::new();
    for m in SCOPE_RE.find_iter(&upper) {
        if !out.iter().any(|s| s == m.as_str()) {
            out.push(m.as_str().to_string());
        }
    }
    out
}

/// Scope codes from the part of a certificate number after its last `/`.
pub fn scopes_from_certificate(certificate: &str) -> Vec<String> {
    match certificate.rsplit_once('/') {
        Some((_, suffix)) if !suffix.trim().is_empty() => scope_codes(suffix),
        _ => Vec::new(),
    }
}
