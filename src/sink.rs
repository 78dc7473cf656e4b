//! Persistence seam for sampled records.
//!
//! The sink is the only durable state: the user ledger and the resumability set are both
//! derived from it at startup.

use crate::error::LoadError;
use crate::record::NormalizedRecord;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};

pub trait ReviewSink {
    /// Distinct user ids ever stored.
    fn known_users(&self) -> Result<Vec<String>, LoadError>;

    /// Categories already persisted: any stored row or an explicit completion marker.
    fn completed_categories(&self) -> Result<Vec<String>, LoadError>;

    /// Store one category's kept set and mark it completed, atomically.
    /// An empty batch still records the marker. On error nothing is visible.
    fn write_category(&self, category: &str, records: &[NormalizedRecord]) -> Result<(), LoadError>;
}

/// In-process sink for dry runs and tests. Writes are all-or-nothing like the relational
/// sink, and failures can be injected per category.
#[derive(Default)]
pub struct MemorySink {
    inner: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    rows: Vec<NormalizedRecord>,
    markers: BTreeSet<String>,
    fail_on: BTreeMap<String, FailMode>,
    write_calls: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FailMode {
    /// Fail before anything is staged.
    Reject,
    /// Stage half the batch, then fail; the staged half must not survive.
    MidBatch,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed rows as if persisted by an earlier run (no markers are written).
    pub fn with_rows(rows: Vec<NormalizedRecord>) -> Self {
        let sink = Self::default();
        sink.inner.lock().rows = rows;
        sink
    }

    /// Make the next write for `category` fail halfway through the batch.
    pub fn fail_mid_batch(&self, category: impl Into<String>) {
        self.inner.lock().fail_on.insert(category.into(), FailMode::MidBatch);
    }

    /// Make the next write for `category` fail outright.
    pub fn reject_writes(&self, category: impl Into<String>) {
        self.inner.lock().fail_on.insert(category.into(), FailMode::Reject);
    }

    pub fn rows(&self) -> Vec<NormalizedRecord> {
        self.inner.lock().rows.clone()
    }

    pub fn rows_for(&self, category: &str) -> Vec<NormalizedRecord> {
        self.inner.lock().rows.iter().filter(|r| r.filename == category).cloned().collect()
    }

    pub fn write_calls(&self) -> u64 {
        self.inner.lock().write_calls
    }
}

impl ReviewSink for MemorySink {
    fn known_users(&self) -> Result<Vec<String>, LoadError> {
        let st = self.inner.lock();
        let users: BTreeSet<&str> = st.rows.iter().filter_map(|r| r.user_id.as_deref()).collect();
        Ok(users.into_iter().map(str::to_string).collect())
    }

    fn completed_categories(&self) -> Result<Vec<String>, LoadError> {
        let st = self.inner.lock();
        let mut done: BTreeSet<String> = st.markers.clone();
        done.extend(st.rows.iter().map(|r| r.filename.clone()));
        Ok(done.into_iter().collect())
    }

    fn write_category(&self, category: &str, records: &[NormalizedRecord]) -> Result<(), LoadError> {
        let mut st = self.inner.lock();
        st.write_calls += 1;

        // Stage into a transaction buffer; only a full success is committed.
        let mut staged: Vec<NormalizedRecord> = Vec::with_capacity(records.len());
        match st.fail_on.remove(category) {
            Some(FailMode::Reject) => {
                return Err(LoadError::Persistence(format!("insert into {category} rejected")));
            }
            Some(FailMode::MidBatch) => {
                staged.extend(records.iter().take(records.len() / 2).cloned());
                drop(staged);
                return Err(LoadError::Persistence(format!(
                    "insert into {category} failed mid-batch; rolled back"
                )));
            }
            None => staged.extend(records.iter().cloned()),
        }

        st.rows.extend(staged);
        st.markers.insert(category.to_string());
        Ok(())
    }
}
