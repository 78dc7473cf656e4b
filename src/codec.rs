use std::io::{self, Read};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use flate2::read::MultiGzDecoder;
use zstd::stream::read::Decoder as ZstdDecoder;

/// Compression of a category source, chosen from its filename suffix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Zstd,
    Plain,
}

impl Compression {
    pub fn from_name(name: &str) -> Self {
        let path = name.split(['?', '#']).next().unwrap_or(name).to_ascii_lowercase();
        if path.ends_with(".gz") {
            Compression::Gzip
        } else if path.ends_with(".zst") {
            Compression::Zstd
        } else {
            Compression::Plain
        }
    }

    pub fn suffix(self) -> Option<&'static str> {
        match self {
            Compression::Gzip => Some(".gz"),
            Compression::Zstd => Some(".zst"),
            Compression::Plain => None,
        }
    }

    /// Wrap a raw byte stream in the matching decompressor.
    ///
    /// Gzip is decoded as multi-member (concatenated streams are common in mirrors).
    /// Zstd requests `window_log_max(31)` up front to avoid "Frame requires too much memory".
    pub fn decoder<'a>(self, raw: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Compression::Gzip => Box::new(MultiGzDecoder::new(raw)),
            Compression::Zstd => {
                let mut dec = ZstdDecoder::new(raw)?;
                dec.window_log_max(31)?;
                Box::new(dec)
            }
            Compression::Plain => raw,
        })
    }
}

/// A `Read` wrapper that counts compressed bytes pulled from the transport.
pub struct CountingReader<R: Read> {
    inner: R,
    counter: Arc<AtomicU64>,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R) -> (Self, Arc<AtomicU64>) {
        let counter = Arc::new(AtomicU64::new(0));
        (Self { inner, counter: counter.clone() }, counter)
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

pub fn bytes_read(counter: &AtomicU64) -> u64 {
    counter.load(Ordering::Relaxed)
}
