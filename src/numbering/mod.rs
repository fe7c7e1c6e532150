//! Evidence numbers for revision reports and verification protocols.

pub mod generator;
pub mod scheme;

pub use generator::EvidenceNumberGenerator;
pub use scheme::{DocumentClass, EvidenceNumber};
