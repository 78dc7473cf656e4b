//! Opening category sources as raw (still compressed) byte streams.

use crate::error::LoadError;
use crate::util::open_with_backoff;
use reqwest::blocking::Client;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

pub trait StreamOpener {
    /// Open `location` for sequential reading. Decompression is the caller's concern.
    fn open(&self, location: &str) -> Result<Box<dyn Read>, LoadError>;
}

/// Blocking HTTP for `http(s)://` locations, plain file reads for everything else.
/// No retry: a failed download is reported and the category is retried on the next run.
pub struct TransportOpener {
    client: Client,
}

impl TransportOpener {
    pub fn new(timeout: Option<Duration>) -> Result<Self, LoadError> {
        let mut builder = Client::builder();
        // reqwest's blocking client defaults to a 30s total timeout; large category files
        // stream far longer than that, so only an explicit timeout is applied.
        builder = builder.timeout(timeout);
        let client = builder.build().map_err(|e| LoadError::transport("http client", e))?;
        Ok(Self { client })
    }
}

impl StreamOpener for TransportOpener {
    fn open(&self, location: &str) -> Result<Box<dyn Read>, LoadError> {
        if is_remote(location) {
            let resp = self
                .client
                .get(location)
                .send()
                .and_then(|r| r.error_for_status())
                .map_err(|e| LoadError::transport(location, e))?;
            Ok(Box::new(resp))
        } else {
            let f = open_with_backoff(Path::new(location), 16, 50)
                .map_err(|e| LoadError::transport(location, e))?;
            Ok(Box::new(f))
        }
    }
}

pub fn is_remote(location: &str) -> bool {
    let l = location.trim_start().to_ascii_lowercase();
    l.starts_with("http://") || l.starts_with("https://")
}
