//! Warning ledger
//!
//! Per-member ordered warning lists backed by a write-through document.
//!
//! Mutations build the next ledger state, persist it, and only then publish
//! it to readers. A failed write therefore leaves the in-memory ledger exactly
//! as it was. Readers never wait on document I/O.

use crate::types::{SubjectId, WarningRecord};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use strike_store::{JsonDocument, StoreError};
use tokio::sync::Mutex;

/// Persisted ledger shape: member ID to warnings in append order
pub type LedgerDocument = BTreeMap<SubjectId, Vec<WarningRecord>>;

/// Warning ledger with write-through persistence
#[derive(Debug)]
pub struct WarningLedger {
    entries: RwLock<LedgerDocument>,
    document: JsonDocument<LedgerDocument>,
    /// Serializes build-persist-publish cycles
    writer: Mutex<()>,
}

impl WarningLedger {
    /// Load the ledger from its document
    ///
    /// # Errors
    /// Returns `StoreError` if the document exists but cannot be read or decoded
    pub async fn open(document: JsonDocument<LedgerDocument>) -> Result<Self, StoreError> {
        let mut entries = document.load().await?;
        // an empty list and a missing key mean the same thing
        entries.retain(|_, records| !records.is_empty());

        tracing::info!(
            path = %document.path().display(),
            subjects = entries.len(),
            "warning ledger loaded"
        );

        Ok(Self {
            entries: RwLock::new(entries),
            document,
            writer: Mutex::new(()),
        })
    }

    /// Append a warning and return the member's new warning count
    ///
    /// The count is returned only after the ledger is durably written.
    ///
    /// # Errors
    /// Returns `StoreError` if the write fails; the warning is not recorded
    pub async fn append(
        &self,
        subject: &SubjectId,
        record: WarningRecord,
    ) -> Result<usize, StoreError> {
        let _writer = self.writer.lock().await;

        let mut next = self.entries.read().clone();
        let records = next.entry(subject.clone()).or_default();
        records.push(record);
        let count = records.len();

        self.document.write(&next).await?;
        *self.entries.write() = next;

        tracing::debug!(%subject, count, "warning appended");
        Ok(count)
    }

    /// All warnings for a member, oldest first; empty if none
    #[must_use]
    pub fn list(&self, subject: &SubjectId) -> Vec<WarningRecord> {
        self.entries
            .read()
            .get(subject)
            .cloned()
            .unwrap_or_default()
    }

    /// Current warning count for a member
    #[must_use]
    pub fn count(&self, subject: &SubjectId) -> usize {
        self.entries.read().get(subject).map_or(0, Vec::len)
    }

    /// Remove every warning for a member
    ///
    /// Returns how many warnings were cleared. A member without warnings is a
    /// no-op and touches nothing on disk.
    ///
    /// # Errors
    /// Returns `StoreError` if the write fails; the warnings are kept
    pub async fn reset(&self, subject: &SubjectId) -> Result<usize, StoreError> {
        let _writer = self.writer.lock().await;

        let mut next = self.entries.read().clone();
        let Some(cleared) = next.remove(subject) else {
            return Ok(0);
        };

        self.document.write(&next).await?;
        *self.entries.write() = next;

        tracing::debug!(%subject, cleared = cleared.len(), "warnings reset");
        Ok(cleared.len())
    }

    /// Number of members with at least one warning
    #[must_use]
    pub fn subject_count(&self) -> usize {
        self.entries.read().len()
    }

    /// Total warnings across all members
    #[must_use]
    pub fn total_warnings(&self) -> usize {
        self.entries.read().values().map(Vec::len).sum()
    }
}
