#![allow(dead_code)]

use reviewetl::{LoadError, NormalizedRecord, StreamOpener};
use serde_json::json;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 2021-06-15T00:00:00Z, comfortably after the default 2020-01-01 cutoff.
pub const AFTER_CUTOFF_MS: i64 = 1_623_715_200_000;
/// 2001-09-09, well before the cutoff.
pub const BEFORE_CUTOFF_MS: i64 = 1_000_000_000_000;
pub const CUTOFF_2020_MS: i64 = 1_577_836_800_000;

/// A source-shaped review line for `user` at `ts_ms`.
pub fn review_line(user: &str, asin: &str, ts_ms: i64) -> String {
    json!({
        "rating": 5.0,
        "title": format!("review by {user}"),
        "text": "Works as described.",
        "images": [],
        "asin": asin,
        "parent_asin": format!("P-{asin}"),
        "user_id": user,
        "timestamp": ts_ms,
        "helpful_vote": 1,
        "verified_purchase": true
    })
    .to_string()
}

/// Join lines with `\n`, terminating the last one.
pub fn jsonl(lines: &[String]) -> Vec<u8> {
    let mut out = Vec::new();
    for l in lines {
        out.extend_from_slice(l.as_bytes());
        out.push(b'\n');
    }
    out
}

pub fn gzip_bytes(raw: &[u8]) -> Vec<u8> {
    let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
    enc.write_all(raw).unwrap();
    enc.finish().unwrap()
}

/// Write a gzip-compressed `.jsonl.gz` file containing the provided lines.
pub fn write_gz_lines(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, gzip_bytes(&jsonl(lines))).unwrap();
}

/// Write a compressed `.jsonl.zst` file containing the provided lines.
pub fn write_zst_lines(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let f = File::create(path).unwrap();
    let mut enc = zstd::stream::write::Encoder::new(f, 3).unwrap();
    for l in lines {
        writeln!(&mut enc, "{}", l).unwrap();
    }
    enc.finish().unwrap();
}

/// A persisted row as an earlier run would have left it.
pub fn stored_row(user: &str, category: &str) -> NormalizedRecord {
    NormalizedRecord {
        user_id: Some(user.to_string()),
        parent_asin: Some("P-OLD".into()),
        asin: Some("OLD".into()),
        rating: Some(4.0),
        title: None,
        review_text: None,
        images: None,
        review_timestamp: AFTER_CUTOFF_MS,
        verified_purchase: Some(true),
        helpful_vote: 0,
        filename: category.to_string(),
    }
}

/// In-memory transport: location -> bytes, with per-location open counts and
/// a shared count of bytes handed to the consumer.
#[derive(Default)]
pub struct FakeOpener {
    files: BTreeMap<String, Vec<u8>>,
    failing: BTreeMap<String, usize>,
    opens: parking_lot::Mutex<BTreeMap<String, u64>>,
    pub bytes_served: Arc<AtomicU64>,
}

impl FakeOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, location: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(location.to_string(), bytes);
        self
    }

    /// Serve the first `after` bytes of `location`, then fail the read.
    pub fn failing_after(mut self, location: &str, bytes: Vec<u8>, after: usize) -> Self {
        self.files.insert(location.to_string(), bytes);
        self.failing.insert(location.to_string(), after);
        self
    }

    pub fn opens(&self, location: &str) -> u64 {
        self.opens.lock().get(location).copied().unwrap_or(0)
    }

    pub fn total_opens(&self) -> u64 {
        self.opens.lock().values().sum()
    }
}

impl StreamOpener for FakeOpener {
    fn open(&self, location: &str) -> Result<Box<dyn Read>, LoadError> {
        *self.opens.lock().entry(location.to_string()).or_default() += 1;
        let bytes = self
            .files
            .get(location)
            .cloned()
            .ok_or_else(|| LoadError::transport(location, "404 Not Found"))?;
        let fail_after = self.failing.get(location).copied();
        Ok(Box::new(MeteredReader {
            inner: Cursor::new(bytes),
            served: self.bytes_served.clone(),
            pos: 0,
            fail_after,
        }))
    }
}

/// Counts bytes served and optionally breaks the connection partway.
pub struct MeteredReader<R: Read> {
    pub inner: R,
    pub served: Arc<AtomicU64>,
    pub pos: usize,
    pub fail_after: Option<usize>,
}

impl<R: Read> Read for MeteredReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let so_far = self.pos;
        let buf = match self.fail_after {
            Some(limit) if so_far >= limit => {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer"));
            }
            Some(limit) => {
                let room = (limit - so_far).min(buf.len());
                &mut buf[..room]
            }
            None => buf,
        };
        let n = self.inner.read(buf)?;
        self.pos += n;
        self.served.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Reader that hands out at most `step` bytes per call, to force chunk boundaries.
pub struct Trickle<R: Read> {
    pub inner: R,
    pub step: usize,
}

impl<R: Read> Read for Trickle<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.step.min(buf.len());
        self.inner.read(&mut buf[..n])
    }
}
