//! Category processing: one category file at a time through
//! open → decompress → reassemble → filter → sample → persist, with resumability.
//!
//! Per-category state lives in `process_category`; the only state carried across categories
//! is the user ledger (rebuilt from the sink at start) and the completed-filenames set.

use crate::codec::{bytes_read, Compression, CountingReader};
use crate::config::LoaderOptions;
use crate::date::CutoffDate;
use crate::error::LoadError;
use crate::ledger::UserLedger;
use crate::listing::{category_name, review_files, FileListing};
use crate::mem::MemoryGuard;
use crate::progress::{make_run_progress, make_scan_progress};
use crate::reassemble::ReassembledLines;
use crate::record::{NormalizedRecord, Rejection, RecordFilter};
use crate::sampler::{Flow, QuotaSampler, SampledCategory};
use crate::sink::ReviewSink;
use crate::snapshot::write_snapshot;
use crate::source::StreamOpener;
use crate::util::init_tracing_once;
use ahash::AHashSet;
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Accepted-row interval between progress log lines.
const LOG_EVERY_ACCEPTED: u64 = 50_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CategoryState {
    Pending,
    /// Already completed by an earlier run; never opened.
    Skipped,
    Streaming,
    Sampled,
    Persisted,
    Completed,
}

/// Why a category scan ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Priority records alone filled the cap.
    CapReached,
    /// Scan budget of non-blank lines spent.
    ScanBudget,
    /// Source ran out first.
    Exhausted,
}

#[derive(Clone, Debug, Default)]
pub struct ScanStats {
    /// Non-blank lines consumed (what the scan budget counts).
    pub lines_scanned: u64,
    pub accepted: u64,
    pub malformed: u64,
    pub before_cutoff: u64,
    /// Compressed bytes pulled from the transport.
    pub compressed_bytes: u64,
    pub stop: Option<StopReason>,
}

#[derive(Clone, Debug)]
pub struct CategoryReport {
    pub name: String,
    pub location: String,
    /// Last state reached. A failed category stays at `Streaming` or `Sampled`.
    pub state: CategoryState,
    pub scan: ScanStats,
    pub priority_kept: usize,
    pub other_kept: usize,
    /// Users first seen in this category's kept set.
    pub ledger_added: usize,
    pub error: Option<String>,
}

impl CategoryReport {
    fn new(name: &str, location: &str) -> Self {
        Self {
            name: name.to_string(),
            location: location.to_string(),
            state: CategoryState::Pending,
            scan: ScanStats::default(),
            priority_kept: 0,
            other_kept: 0,
            ledger_added: 0,
            error: None,
        }
    }

    fn advance(&mut self, to: CategoryState) {
        tracing::debug!(category = %self.name, from = ?self.state, to = ?to, "category state");
        self.state = to;
    }

    pub fn kept(&self) -> usize {
        self.priority_kept + self.other_kept
    }

    pub fn is_completed(&self) -> bool {
        self.state == CategoryState::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub categories: Vec<CategoryReport>,
    /// Every record persisted during this run, in processing order.
    pub records: Vec<NormalizedRecord>,
    /// Product ids kept per completed category (join key for product metadata).
    pub products_by_category: BTreeMap<String, BTreeSet<String>>,
    /// Ledger size rebuilt from the sink, and at the end of the run.
    pub ledger_seed: usize,
    pub ledger_size: usize,
    pub snapshot_rows: Option<usize>,
}

impl RunReport {
    pub fn completed(&self) -> impl Iterator<Item = &CategoryReport> {
        self.categories.iter().filter(|c| c.is_completed())
    }
    pub fn skipped(&self) -> impl Iterator<Item = &CategoryReport> {
        self.categories.iter().filter(|c| c.state == CategoryState::Skipped)
    }
    pub fn failed(&self) -> impl Iterator<Item = &CategoryReport> {
        self.categories.iter().filter(|c| c.is_failed())
    }
    pub fn category(&self, name: &str) -> Option<&CategoryReport> {
        self.categories.iter().find(|c| c.name == name)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ReviewLoader {
    pub(crate) opts: LoaderOptions,
}

impl ReviewLoader {
    pub fn new() -> Self {
        Self { opts: LoaderOptions::default() }
    }

    pub fn with_options(opts: LoaderOptions) -> Self {
        Self { opts }
    }

    // -------- Builder methods --------
    pub fn review_marker(mut self, marker: impl AsRef<str>) -> Self { self.opts = self.opts.with_review_marker(marker); self }
    pub fn max_kept(mut self, n: usize) -> Self { self.opts = self.opts.with_max_kept(n); self }
    pub fn scan_budget(mut self, lines: u64) -> Self { self.opts = self.opts.with_scan_budget(lines); self }
    pub fn cutoff(mut self, cutoff: CutoffDate) -> Self { self.opts = self.opts.with_cutoff(cutoff); self }
    pub fn chunk_bytes(mut self, bytes: usize) -> Self { self.opts = self.opts.with_chunk_bytes(bytes); self }
    pub fn snapshot(mut self, path: Option<&Path>) -> Self { self.opts = self.opts.with_snapshot(path); self }
    pub fn only_categories(mut self, re: Option<Regex>) -> Self { self.opts = self.opts.with_category_filter(re); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }

    pub fn options(&self) -> &LoaderOptions {
        &self.opts
    }

    /// Discover category files through `listing`, keep review files, and process them.
    pub fn run(&self, listing: &dyn FileListing, opener: &dyn StreamOpener, sink: &dyn ReviewSink) -> Result<RunReport> {
        init_tracing_once();
        let all = listing.list().context("fetching file list")?;
        tracing::info!("Found {} total files", all.len());

        let mut reviews = review_files(&all, &self.opts.review_marker);
        if let Some(re) = &self.opts.category_filter {
            reviews.retain(|loc| re.is_match(&category_name(loc)));
        }
        if reviews.is_empty() {
            tracing::warn!(marker = %self.opts.review_marker, "No review files found; check the listing and marker.");
        } else {
            tracing::info!("Found {} review files", reviews.len());
            for f in &reviews {
                tracing::debug!("  - {}", f);
            }
        }
        self.process(&reviews, opener, sink)
    }

    /// Process the given category locations in order.
    ///
    /// Startup queries against the sink are fatal on failure; per-category transport and
    /// persistence failures are isolated and recorded in the report.
    pub fn process(&self, locations: &[String], opener: &dyn StreamOpener, sink: &dyn ReviewSink) -> Result<RunReport> {
        init_tracing_once();
        let mut ledger = UserLedger::from_ids(sink.known_users().context("loading known users")?);
        let mut completed: AHashSet<String> =
            sink.completed_categories().context("loading completed categories")?.into_iter().collect();

        let mut report = RunReport { ledger_seed: ledger.len(), ..Default::default() };
        tracing::info!(known_users = ledger.len(), completed = completed.len(), "Resume state loaded");

        let pb = self.opts.progress.then(|| make_run_progress(locations.len() as u64, "Categories"));
        for location in locations {
            let cat = self.process_category(location, opener, sink, &mut ledger, &mut completed, &mut report);
            report.categories.push(cat);
            if let Some(pb) = &pb {
                pb.inc(1);
            }
        }
        if let Some(pb) = pb {
            pb.finish_with_message("done");
        }
        report.ledger_size = ledger.len();

        if let Some(path) = &self.opts.snapshot_path {
            report.snapshot_rows = self.export_snapshot(path, &report.records);
        }

        tracing::info!(
            completed = report.completed().count(),
            skipped = report.skipped().count(),
            failed = report.failed().count(),
            records = report.records.len(),
            total_users = report.ledger_size,
            "Run finished"
        );
        Ok(report)
    }

    fn process_category(
        &self,
        location: &str,
        opener: &dyn StreamOpener,
        sink: &dyn ReviewSink,
        ledger: &mut UserLedger,
        completed: &mut AHashSet<String>,
        run: &mut RunReport,
    ) -> CategoryReport {
        let name = category_name(location);
        let mut rep = CategoryReport::new(&name, location);

        if completed.contains(&name) {
            tracing::info!("Skipping {} - already processed", name);
            rep.advance(CategoryState::Skipped);
            return rep;
        }

        tracing::info!(category = %name, previous_users = ledger.len(), "Streaming {}", location);
        rep.advance(CategoryState::Streaming);
        let sampled = match self.scan_category(location, &name, opener, ledger, &mut rep.scan) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(category = %name, error = %e, "Category aborted while streaming; continuing with next");
                rep.error = Some(e.to_string());
                return rep;
            }
        };
        rep.advance(CategoryState::Sampled);
        rep.priority_kept = sampled.priority_kept;
        rep.other_kept = sampled.other_kept;
        tracing::info!(
            category = %name,
            lines = rep.scan.lines_scanned,
            valid = rep.scan.accepted,
            malformed = rep.scan.malformed,
            before_cutoff = rep.scan.before_cutoff,
            stop = ?rep.scan.stop,
            "Read {} valid rows from {} total lines", rep.scan.accepted, rep.scan.lines_scanned
        );

        if let Err(e) = sink.write_category(&name, &sampled.kept) {
            tracing::warn!(category = %name, error = %e, "Batch rolled back; category will be retried next run");
            rep.error = Some(e.to_string());
            return rep;
        }
        rep.advance(CategoryState::Persisted);

        rep.ledger_added = ledger.absorb(sampled.user_ids());
        completed.insert(name.clone());
        let products = run.products_by_category.entry(name.clone()).or_default();
        products.extend(sampled.kept.iter().filter_map(|r| r.parent_asin.clone()));
        run.records.extend(sampled.kept);
        rep.advance(CategoryState::Completed);

        tracing::info!(
            category = %name,
            kept = rep.kept(),
            priority = rep.priority_kept,
            new_users = rep.other_kept,
            total_users = ledger.len(),
            "Saved {} to database", name
        );
        rep
    }

    /// Stream one category and return its finalized kept set.
    /// The ledger is only read here; it is updated by the caller after persistence.
    fn scan_category(
        &self,
        location: &str,
        name: &str,
        opener: &dyn StreamOpener,
        ledger: &UserLedger,
        stats: &mut ScanStats,
    ) -> Result<SampledCategory, LoadError> {
        let raw = opener.open(location)?;
        let (counting, counter) = CountingReader::new(raw);
        let decoded = Compression::from_name(location)
            .decoder(Box::new(counting))
            .map_err(|e| LoadError::transport(location, e))?;
        let lines = ReassembledLines::with_chunk_size(decoded, self.opts.chunk_bytes);

        let filter = RecordFilter::new(self.opts.cutoff);
        let budget = self.opts.scan_budget;
        let mut sampler = QuotaSampler::new(ledger, self.opts.max_kept);
        let mut guard = MemoryGuard::default();
        let pb = self.opts.progress.then(|| make_scan_progress(budget, name));

        let scan = || -> Result<StopReason, LoadError> {
            if sampler.flow() == Flow::Stop {
                return Ok(StopReason::CapReached);
            }
            if budget == 0 {
                return Ok(StopReason::ScanBudget);
            }
            for line in lines {
                let line = line.map_err(|e| LoadError::transport(location, e))?;
                if line.trim().is_empty() {
                    continue;
                }
                stats.lines_scanned += 1;
                if let Some(pb) = &pb {
                    pb.inc(1);
                }

                match filter.accept(&line, name) {
                    Ok(rec) => {
                        stats.accepted += 1;
                        if stats.accepted % LOG_EVERY_ACCEPTED == 0 {
                            tracing::info!(category = %name, "Processed {} valid rows so far...", stats.accepted);
                        }
                        if sampler.offer(rec) == Flow::Stop {
                            return Ok(StopReason::CapReached);
                        }
                    }
                    Err(Rejection::Malformed) => stats.malformed += 1,
                    Err(Rejection::BeforeCutoff) => stats.before_cutoff += 1,
                }

                if stats.lines_scanned >= budget {
                    return Ok(StopReason::ScanBudget);
                }
                guard.tick();
            }
            Ok(StopReason::Exhausted)
        };
        let outcome = scan();

        stats.compressed_bytes = bytes_read(&counter);
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        stats.stop = Some(outcome?);
        Ok(sampler.finalize())
    }

    fn export_snapshot(&self, path: &Path, records: &[NormalizedRecord]) -> Option<usize> {
        if records.is_empty() {
            tracing::info!("No new data to process; snapshot not written");
            return None;
        }
        match write_snapshot(path, records) {
            Ok(n) => {
                tracing::info!(path = %path.display(), rows = n, "Snapshot saved");
                Some(n)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %format!("{e:#}"), "Snapshot export failed");
                None
            }
        }
    }
}
