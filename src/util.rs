use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

static INIT_ONCE: std::sync::Once = std::sync::Once::new();
pub fn init_tracing_once() {
    INIT_ONCE.call_once(|| {
        let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
    });
}

// -------- robust file ops with backoff (local mirrors on NAS/USB, AV scanners) --------

/// Transient OS errors worth retrying (mostly Windows sharing/AV codes).
fn is_retriable_io_error(e: &io::Error) -> bool {
    // 5 access denied (AV/share), 32 sharing violation, 33 lock violation,
    // 21 device not ready, 1006 volume altered, 1117 device I/O error,
    // 1224 user-mapped section open.
    matches!(e.raw_os_error(), Some(5 | 21 | 32 | 33 | 1006 | 1117 | 1224))
}

/// Run `op` up to `tries` times with linear backoff while it fails transiently.
fn with_backoff<T>(tries: usize, delay_ms: u64, mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    let tries = tries.max(1);
    let mut last_err = None;
    for i in 0..tries {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if is_retriable_io_error(&e) && i + 1 < tries => {
                last_err = Some(e);
                sleep(Duration::from_millis(delay_ms.saturating_mul((i + 1) as u64)));
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "retries exhausted")))
}

pub fn open_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> io::Result<File> {
    with_backoff(tries, delay_ms, || File::open(path))
}

pub fn create_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> io::Result<File> {
    with_backoff(tries, delay_ms, || File::create(path))
}

/// Promote `tmp` to `dest`, replacing any existing file.
/// Falls back to copy+remove when rename is refused (cross-device, sharing).
pub fn replace_file_atomic_backoff(tmp: &Path, dest: &Path) -> Result<()> {
    let (tries, delay_ms) = (20usize, 50u64);
    if dest.exists() {
        with_backoff(tries, delay_ms, || fs::remove_file(dest))
            .with_context(|| format!("remove {}", dest.display()))?;
    }
    if with_backoff(tries, delay_ms, || fs::rename(tmp, dest)).is_ok() {
        return Ok(());
    }
    with_backoff(tries, delay_ms, || fs::copy(tmp, dest))
        .with_context(|| format!("copy {} -> {}", tmp.display(), dest.display()))?;
    with_backoff(tries, delay_ms, || fs::remove_file(tmp))
        .with_context(|| format!("remove {}", tmp.display()))?;
    Ok(())
}
