use chrono::{Datelike, NaiveDate};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::scheme::{DocumentClass, EvidenceNumber};
use crate::common::error::{Result, RevizeError};
use crate::observability::metrics as obs;
use crate::storage::Storage;

/// Issues per-project evidence numbers by scanning the numbers already in use.
///
/// There is no lock: two writers can compute the same number. The storage's
/// unique constraint rejects the loser with `SequenceConflict`, and
/// [`generate_and_assign`](Self::generate_and_assign) rescans and tries again.
#[derive(Clone)]
pub struct EvidenceNumberGenerator {
    storage: Arc<dyn Storage>,
    max_attempts: u32,
}

impl EvidenceNumberGenerator {
    pub fn new(storage: Arc<dyn Storage>, max_attempts: u32) -> Self {
        Self {
            storage,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Next free number for `project_id`; reads only.
    pub async fn next_number(
        &self,
        project_id: i64,
        class: DocumentClass,
        reference_date: NaiveDate,
    ) -> Result<EvidenceNumber> {
        let year = reference_date.year();
        let prefix = class.scan_prefix(project_id);
        let suffix = class.scan_suffix(year);

        let existing = self
            .storage
            .evidence_numbers(class, project_id, &prefix, suffix.as_deref())
            .await?;
        let max_sequence = existing
            .iter()
            .filter_map(|n| EvidenceNumber::sequence_in_scope(n, class, project_id, year))
            .max()
            .unwrap_or(0);

        debug!(
            project_id,
            class = class.as_str(),
            scanned = existing.len(),
            max_sequence,
            "Scanned evidence numbers"
        );
        let sequence = max_sequence.checked_add(1).ok_or_else(|| {
            RevizeError::Conflict(format!(
                "no {} numbers left for project {} in {}",
                class.prefix(),
                project_id,
                year
            ))
        })?;
        Ok(EvidenceNumber {
            class,
            project_id,
            sequence,
            year,
        })
    }

    /// Compute a number and hand it to `insert`, retrying on `SequenceConflict`.
    ///
    /// Any other error from `insert` is returned as is. After `max_attempts`
    /// conflicts the result is `SequenceExhausted`.
    #[instrument(skip(self, insert))]
    pub async fn generate_and_assign<T, F, Fut>(
        &self,
        project_id: i64,
        class: DocumentClass,
        reference_date: NaiveDate,
        mut insert: F,
    ) -> Result<T>
    where
        F: FnMut(EvidenceNumber) -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        for attempt in 1..=self.max_attempts {
            let number = self.next_number(project_id, class, reference_date).await?;
            match insert(number).await {
                Ok(inserted) => {
                    obs::numbering::number_assigned(class.as_str());
                    info!(number = %number, attempt, "Evidence number assigned");
                    return Ok(inserted);
                }
                Err(RevizeError::SequenceConflict { number: taken }) => {
                    obs::numbering::sequence_conflict(class.as_str());
                    warn!(number = %taken, attempt, "Evidence number taken concurrently, rescanning");
                }
                Err(e) => return Err(e),
            }
        }

        obs::numbering::allocation_exhausted(class.as_str());
        warn!(project_id, attempts = self.max_attempts, "Evidence number allocation exhausted");
        Err(RevizeError::SequenceExhausted {
            attempts: self.max_attempts,
        })
    }
}
