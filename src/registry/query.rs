use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Two or more letter sequences (any script, plus `'` and `-`) separated by whitespace.
pub(crate) static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{L}'\-]+(?:\s+[\p{L}'\-]+)+$").expect("valid name regex"));

/// `<digits>/<scope tokens>`, e.g. `123456/E1A,E2B`.
pub(crate) static CERT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{3,}/[A-Za-z0-9,;\s]+$").expect("valid certificate regex"));

static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Trim and collapse inner whitespace runs to single spaces.
pub fn normalize_text(s: &str) -> String {
    WS_RE.replace_all(s.trim(), " ").into_owned()
}

/// Why a query was refused before any network access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryRejection {
    InvalidName,
    InvalidCertificate,
}

/// A validated lookup request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryQuery {
    full_name: String,
    certificate_number: String,
}

impl RegistryQuery {
    pub fn parse(full_name: &str, certificate_number: &str) -> Result<Self, QueryRejection> {
        let full_name = normalize_text(full_name);
        let certificate_number = normalize_text(certificate_number);

        if !NAME_RE.is_match(&full_name) {
            return Err(QueryRejection::InvalidName);
        }
        if !CERT_RE.is_match(&certificate_number) {
            return Err(QueryRejection::InvalidCertificate);
        }
        Ok(Self {
            full_name,
            certificate_number,
        })
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn certificate_number(&self) -> &str {
        &self.certificate_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_czech_names_and_scoped_certificates() {
        let q = RegistryQuery::parse("  Jiří   Dvořák ", " 123456/E1A,E2B ").unwrap();
        assert_eq!(q.full_name(), "Jiří Dvořák");
        assert_eq!(q.certificate_number(), "123456/E1A,E2B");

        assert!(RegistryQuery::parse("Anna-Marie O'Neil Nováková", "0042/E2").is_ok());
    }

    #[test]
    fn single_token_names_are_rejected() {
        assert_eq!(
            RegistryQuery::parse("Novák", "123456/E1A").unwrap_err(),
            QueryRejection::InvalidName
        );
        assert_eq!(
            RegistryQuery::parse("   ", "123456/E1A").unwrap_err(),
            QueryRejection::InvalidName
        );
        assert_eq!(
            RegistryQuery::parse("Jan Novák 3", "123456/E1A").unwrap_err(),
            QueryRejection::InvalidName
        );
    }

    #[test]
    fn malformed_certificates_are_rejected() {
        for cert in ["12/E1A", "123456", "123456/", "ABC/E1A", "123456/E1A!", "123456-E1A"] {
            assert_eq!(
                RegistryQuery::parse("Jan Novák", cert).unwrap_err(),
                QueryRejection::InvalidCertificate,
                "{cert} should be rejected"
            );
        }
    }

    #[test]
    fn name_is_checked_before_certificate() {
        assert_eq!(
            RegistryQuery::parse("X", "bad").unwrap_err(),
            QueryRejection::InvalidName
        );
    }
}
