use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::common::constants::{PROTOCOL_PREFIX, PROTOCOL_SEQUENCE_WIDTH, REVISION_PREFIX};
use crate::common::error::RevizeError;

/// Category of generated document; decides prefix, padding and scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentClass {
    /// Inspection revision report, `RZ-<project>-<seq>-<year>`.
    Revision,
    /// Verification protocol, `VV-<project>-<seq:03>-<year>`.
    #[serde(rename = "vv")]
    VerificationProtocol,
}

impl DocumentClass {
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentClass::Revision => REVISION_PREFIX,
            DocumentClass::VerificationProtocol => PROTOCOL_PREFIX,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentClass::Revision => "revision",
            DocumentClass::VerificationProtocol => "vv",
        }
    }

    /// Protocol sequences restart every calendar year; revision sequences don't.
    pub fn is_year_scoped(&self) -> bool {
        matches!(self, DocumentClass::VerificationProtocol)
    }

    /// Leading part every number of this class in `project_id` shares.
    pub fn scan_prefix(&self, project_id: i64) -> String {
        format!("{}-{}-", self.prefix(), project_id)
    }

    /// Trailing part a number must carry to count for `year`, if the class is year scoped.
    pub fn scan_suffix(&self, year: i32) -> Option<String> {
        self.is_year_scoped().then(|| format!("-{}", year))
    }
}

impl fmt::Display for DocumentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentClass {
    type Err = RevizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vv" | "protocol" => Ok(DocumentClass::VerificationProtocol),
            "revision" | "rz" => Ok(DocumentClass::Revision),
            other => Err(RevizeError::Validation(format!(
                "unknown document class '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvidenceNumber {
    pub class: DocumentClass,
    pub project_id: i64,
    pub sequence: u32,
    pub year: i32,
}

impl EvidenceNumber {
    /// Sequence of `number` if it is a well-formed number of `class` in
    /// `project_id` (and `year`, for year-scoped classes).
    pub fn sequence_in_scope(
        number: &str,
        class: DocumentClass,
        project_id: i64,
        year: i32,
    ) -> Option<u32> {
        let parts: Vec<&str> = number.split('-').collect();
        if parts.len() != 4 {
            return None;
        }
        if parts[0] != class.prefix() || parts[1] != project_id.to_string() {
            return None;
        }
        if class.is_year_scoped() && parts[3] != year.to_string() {
            return None;
        }
        parts[2].parse().ok()
    }
}

impl fmt::Display for EvidenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.class {
            DocumentClass::VerificationProtocol => write!(
                f,
                "{}-{}-{:0width$}-{}",
                self.class.prefix(),
                self.project_id,
                self.sequence,
                self.year,
                width = PROTOCOL_SEQUENCE_WIDTH
            ),
            DocumentClass::Revision => write!(
                f,
                "{}-{}-{}-{}",
                self.class.prefix(),
                self.project_id,
                self.sequence,
                self.year
            ),
        }
    }
}
