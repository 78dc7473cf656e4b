//! Cooperative low-memory backoff for long category scans.
//!
//! Sampling buffers grow with the scan budget; when the host runs short we yield briefly
//! instead of racing the OOM killer. Memory is sampled at most every `REFRESH_EVERY`.

use parking_lot::Mutex;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use sysinfo::{System, SystemExt};

const REFRESH_EVERY: Duration = Duration::from_millis(500);
const BACKOFF: Duration = Duration::from_millis(25);

struct MemState {
    sys: System,
    last_check: Option<Instant>, // None until the first refresh
    last_frac: f64, // available / total
}

static STATE: OnceLock<Mutex<MemState>> = OnceLock::new();

/// Recent estimate of the available memory fraction (0.0..=1.0).
pub fn available_memory_fraction() -> f64 {
    let m = STATE.get_or_init(|| {
        Mutex::new(MemState { sys: System::new(), last_check: None, last_frac: 1.0 })
    });
    let mut st = m.lock();
    let now = Instant::now();
    if st.last_check.map_or(true, |t| now.duration_since(t) >= REFRESH_EVERY) {
        st.sys.refresh_memory();
        let total = st.sys.total_memory() as f64;
        let avail = st.sys.available_memory() as f64;
        st.last_frac = if total > 0.0 { (avail / total).clamp(0.0, 1.0) } else { 1.0 };
        st.last_check = Some(now);
    }
    st.last_frac
}

/// Per-scan throttle: checks memory every `every` lines and sleeps while under `threshold`.
#[derive(Debug, Clone)]
pub struct MemoryGuard {
    threshold: f64,
    every: u64,
    seen: u64,
}

impl MemoryGuard {
    pub fn new(threshold: f64, every: u64) -> Self {
        Self { threshold, every: every.max(1), seen: 0 }
    }

    #[inline]
    pub fn tick(&mut self) {
        self.seen += 1;
        if self.seen % self.every == 0 && available_memory_fraction() < self.threshold {
            std::thread::sleep(BACKOFF);
        }
    }
}

impl Default for MemoryGuard {
    fn default() -> Self {
        Self::new(0.10, 1024)
    }
}
