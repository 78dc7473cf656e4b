//! Per-category quota sampling with known-user priority.
//!
//! The sampler borrows the ledger for the whole scan, so classification always sees the
//! ledger as it stood when the category started. Finalization keeps every priority record
//! (even past the cap) and fills remaining room with new-user records in arrival order.

use crate::ledger::UserLedger;
use crate::record::NormalizedRecord;

pub const DEFAULT_MAX_KEPT: usize = 50_000;

/// Whether the scan should keep feeding candidates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Priority alone fills the cap (immediately, for a cap of 0): the kept set cannot
    /// change any more.
    Stop,
}

pub struct QuotaSampler<'a> {
    ledger: &'a UserLedger,
    cap: usize,
    priority: Vec<NormalizedRecord>,
    other: Vec<NormalizedRecord>,
}

impl<'a> QuotaSampler<'a> {
    pub fn new(ledger: &'a UserLedger, cap: usize) -> Self {
        Self { ledger, cap, priority: Vec::new(), other: Vec::new() }
    }

    pub fn offer(&mut self, record: NormalizedRecord) -> Flow {
        let known = record.user_id.as_deref().is_some_and(|u| self.ledger.contains(u));
        if known {
            self.priority.push(record);
        } else {
            self.other.push(record);
        }
        self.flow()
    }

    /// `Stop` once priority records alone fill the cap.
    pub fn flow(&self) -> Flow {
        if self.priority.len() >= self.cap { Flow::Stop } else { Flow::Continue }
    }

    pub fn priority_len(&self) -> usize {
        self.priority.len()
    }

    pub fn other_len(&self) -> usize {
        self.other.len()
    }

    pub fn finalize(self) -> SampledCategory {
        let priority_kept = self.priority.len();
        let other_seen = self.other.len();
        let room = self.cap.saturating_sub(priority_kept);

        let mut kept = self.priority;
        kept.extend(self.other.into_iter().take(room));
        let other_kept = kept.len() - priority_kept;

        SampledCategory { kept, priority_kept, other_kept, other_seen }
    }
}

/// Finalized kept set for one category, priority records first.
#[derive(Debug, Default)]
pub struct SampledCategory {
    pub kept: Vec<NormalizedRecord>,
    pub priority_kept: usize,
    pub other_kept: usize,
    /// New-user candidates seen during the scan, kept or not.
    pub other_seen: usize,
}

impl SampledCategory {
    pub fn user_ids(&self) -> impl Iterator<Item = &str> {
        self.kept.iter().filter_map(|r| r.user_id.as_deref())
    }

    pub fn len(&self) -> usize {
        self.kept.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}
