//! Progress reporting: an overall bar over categories and a per-category scan bar.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Optional global MultiProgress so the run bar and category bars render together.
static GLOBAL_MP: OnceLock<Arc<MultiProgress>> = OnceLock::new();

/// Install a global MultiProgress used by all subsequently created bars.
/// Safe to call once; additional calls are ignored.
pub fn set_global_multiprogress(mp: Arc<MultiProgress>) {
    let _ = GLOBAL_MP.set(mp);
}

fn new_bar(total: u64) -> ProgressBar {
    match GLOBAL_MP.get() {
        Some(mp) => mp.add(ProgressBar::new(total)),
        None => ProgressBar::new(total),
    }
}

fn styled(pb: ProgressBar, template: &str, label: &str) -> ProgressBar {
    if let Ok(style) = ProgressStyle::with_template(template) {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    if !label.is_empty() {
        pb.set_message(label.to_string());
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Count-style bar over categories.
pub fn make_run_progress(total_categories: u64, label: &str) -> ProgressBar {
    styled(
        new_bar(total_categories),
        "{spinner:.green} {msg} {pos}/{len} [{bar:.cyan/blue}] {percent:>3}%  \
         elapsed: {elapsed_precise}  eta: {eta_precise}",
        label,
    )
}

/// Lines scanned for one category, out of the scan budget.
pub fn make_scan_progress(scan_budget: u64, category: &str) -> ProgressBar {
    styled(
        new_bar(scan_budget),
        "{spinner:.green} {msg} {pos}/{len} lines [{bar:.cyan/blue}] {percent:>3}%  \
         lines/s: {per_sec}  elapsed: {elapsed_precise}",
        category,
    )
}
