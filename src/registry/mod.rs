//! Technician lookup against the TIČR registry listing.

pub mod matcher;
pub mod outcome;
pub mod query;
pub mod scopes;
pub mod table;
pub mod text_search;

pub use matcher::RegistryMatcher;
pub use outcome::{
    MatchStatus, MatchedHolder, NotFoundReason, RegistryMatch, Snapshot, VerifiedHolder,
};
pub use query::{QueryRejection, RegistryQuery};
pub use scopes::scopes_from_certificate;

/// Holder details extracted from the listing by either lookup strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingMatch {
    pub full_name: String,
    pub certificate_number: String,
    pub authorization_number: Option<String>,
    pub scopes: Vec<String>,
    pub valid_until: Option<String>,
}
