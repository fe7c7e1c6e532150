//! Row-oriented lookup over `<tr>` elements of the listing.
//!
//! Cells are classified by shape and keyword; a row matches only when both the
//! holder name and the certificate agree with the query.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::query::{normalize_text, RegistryQuery, CERT_RE, NAME_RE};
use super::scopes::{scope_codes, scopes_from_certificate, SCOPE_RE};
use super::text_search::DATE_RE;
use super::ListingMatch;

static ROW_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("valid row selector"));
static CELL_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td, th").expect("valid cell selector"));

static AUTHORIZATION_CELL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)opr[aá]vn").expect("valid authorization regex"));
static VALIDITY_CELL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)platnost|do\s*:").expect("valid validity regex"));

const MIN_CELLS: usize = 3;

/// One classified listing row. Unclassified fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingRow {
    pub name: String,
    pub certificate: String,
    pub authorization: String,
    pub validity: String,
    pub scope: String,
}

fn cell_text(cell: ElementRef<'_>) -> String {
    normalize_text(&cell.text().collect::<Vec<_>>().join(" "))
}

fn first_cell<'a>(cells: &'a [String], pred: impl Fn(&str) -> bool) -> Option<&'a String> {
    cells.iter().find(|c| pred(c))
}

fn classify(cells: &[String]) -> ListingRow {
    let certificate = first_cell(cells, |c| {
        c.contains('/') && (SCOPE_RE.is_match(c) || CERT_RE.is_match(c))
    });
    let name = first_cell(cells, |c| NAME_RE.is_match(c));
    let authorization = first_cell(cells, |c| AUTHORIZATION_CELL_RE.is_match(c));
    let validity = first_cell(cells, |c| VALIDITY_CELL_RE.is_match(c));
    let scope = cells
        .iter()
        .map(|c| scope_codes(c))
        .find(|codes| !codes.is_empty())
        .map(|codes| codes.join(","));

    ListingRow {
        name: name.cloned().unwrap_or_default(),
        certificate: certificate.cloned().unwrap_or_default(),
        authorization: authorization.cloned().unwrap_or_default(),
        validity: validity.cloned().unwrap_or_default(),
        scope: scope.unwrap_or_default(),
    }
}

/// Rows with at least three cells that carry a name or a certificate.
pub fn parse_listing(html: &str) -> Vec<ListingRow> {
    let document = Html::parse_document(html);
    document
        .select(&ROW_SEL)
        .filter_map(|tr| {
            let cells: Vec<String> = tr.select(&CELL_SEL).map(cell_text).collect();
            if cells.len() < MIN_CELLS {
                return None;
            }
            let row = classify(&cells);
            (!row.name.is_empty() || !row.certificate.is_empty()).then_some(row)
        })
        .collect()
}

pub fn pick_best_match(rows: &[ListingRow], query: &RegistryQuery) -> Option<ListingMatch> {
    let wanted_name = query.full_name().to_lowercase();
    let wanted_cert = query.certificate_number().to_lowercase();

    rows.iter()
        .find(|row| {
            let cert = row.certificate.to_lowercase();
            row.name.to_lowercase() == wanted_name
                && !cert.is_empty()
                && (cert == wanted_cert || cert.contains(&wanted_cert))
        })
        .map(|row| {
            let mut scopes = scopes_from_certificate(&row.certificate);
            if scopes.is_empty() {
                scopes = scope_codes(&row.scope);
            }
            ListingMatch {
                full_name: row.name.clone(),
                certificate_number: row.certificate.clone(),
                authorization_number: (!row.authorization.is_empty())
                    .then(|| row.authorization.clone()),
                scopes,
                valid_until: DATE_RE.find(&row.validity).map(|m| {
                    m.as_str().chars().filter(|c| !c.is_whitespace()).collect()
                }),
            }
        })
}

pub fn search(html: &str, query: &RegistryQuery) -> Option<ListingMatch> {
    pick_best_match(&parse_listing(html), query)
}
