//! Full-text lookup: find the certificate number anywhere in the visible page
//! text and read the holder details from the surrounding characters.
//!
//! Presence of the certificate is sufficient for a match. The name read from
//! the context is informational and is not compared with the queried name.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Node};

use super::query::{normalize_text, RegistryQuery};
use super::scopes::scopes_from_certificate;
use super::ListingMatch;
use crate::common::constants::MATCH_CONTEXT_CHARS;

const HIDDEN_ELEMENTS: &[&str] = &["head", "script", "style", "noscript", "template"];

/// `D.M.YYYY` (optionally with single spaces after the dots) or `YYYY-MM-DD`.
pub(crate) static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2}\.\s?\d{1,2}\.\s?\d{4}|\d{4}-\d{2}-\d{2})").expect("valid date regex")
});

static AUTHORIZATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)opr[aá]vn[\p{L}]*\s*(?:č\.|čís\.|číslo|no\.)?\s*:?\s*([A-Za-z0-9/\-]*\d[A-Za-z0-9/\-]*)",
    )
    .expect("valid authorization regex")
});

/// All text nodes outside of non-rendered elements, whitespace collapsed.
pub fn flatten_visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut pieces: Vec<&str> = Vec::new();
    for node in document.tree.root().descendants() {
        if let Node::Text(text) = node.value() {
            let hidden = node.ancestors().any(|ancestor| {
                matches!(ancestor.value(), Node::Element(el) if HIDDEN_ELEMENTS.contains(&el.name()))
            });
            if !hidden {
                pieces.push(&**text);
            }
        }
    }
    normalize_text(&pieces.join(" "))
}

/// Byte range of the certificate in `text`, matched case-insensitively and
/// bounded by non-word characters or the text edges.
pub fn find_certificate(text: &str, certificate: &str) -> Option<(usize, usize)> {
    let pattern = format!(r"(?i)(?:^|\W)({})(?:\W|$)", regex::escape(certificate));
    let re = Regex::new(&pattern).ok()?;
    let hit = re.captures(text)?.get(1)?;
    Some((hit.start(), hit.end()))
}

fn chars_back(text: &str, from: usize, count: usize) -> usize {
    if count == 0 {
        return from;
    }
    text[..from]
        .char_indices()
        .rev()
        .nth(count - 1)
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn chars_forward(text: &str, from: usize, count: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(count)
        .map(|(i, _)| from + i)
        .unwrap_or(text.len())
}

/// A capitalized alphabetic word of two or more letters, e.g. `Novák` or `O'Neil`.
fn is_name_token(word: &str) -> bool {
    let mut chars = word.chars();
    let starts_upper = chars.next().map_or(false, char::is_uppercase);
    starts_upper
        && word.chars().count() >= 2
        && word.chars().all(|c| c.is_alphabetic() || c == '\'' || c == '-')
}

fn name_pair(first: &str, second: &str) -> Option<String> {
    let second = second.trim_end_matches(|c| matches!(c, ',' | ';' | ':'));
    (is_name_token(first) && is_name_token(second)).then(|| format!("{} {}", first, second))
}

/// Two adjacent name tokens: the closest pair in front of the hit, else the
/// first pair after it.
fn holder_name(before: &str, after: &str) -> Option<String> {
    let before: Vec<&str> = before.split_whitespace().collect();
    let closest_before = before
        .windows(2)
        .rev()
        .find_map(|pair| name_pair(pair[0], pair[1]));
    closest_before.or_else(|| {
        let after: Vec<&str> = after.split_whitespace().collect();
        after.windows(2).find_map(|pair| name_pair(pair[0], pair[1]))
    })
}

fn first_date(text: &str) -> Option<String> {
    DATE_RE
        .find(text)
        .map(|m| m.as_str().chars().filter(|c| !c.is_whitespace()).collect())
}

pub fn search(html: &str, query: &RegistryQuery) -> Option<ListingMatch> {
    let text = flatten_visible_text(html);
    let (start, end) = find_certificate(&text, query.certificate_number())?;

    let window_start = chars_back(&text, start, MATCH_CONTEXT_CHARS);
    let window_end = chars_forward(&text, end, MATCH_CONTEXT_CHARS);
    let window = &text[window_start..window_end];
    let before = &text[window_start..start];
    let from_hit = &text[start..window_end];
    let after = &text[end..window_end];

    // Empty when the listing shows no name next to the certificate.
    let full_name = holder_name(before, after).unwrap_or_default();
    let valid_until = first_date(from_hit).or_else(|| first_date(window));
    let authorization_number = AUTHORIZATION_RE
        .captures(after)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    Some(ListingMatch {
        full_name,
        certificate_number: query.certificate_number().to_string(),
        authorization_number,
        scopes: scopes_from_certificate(query.certificate_number()),
        valid_until,
    })
}
