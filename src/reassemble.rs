//! Chunk-to-line reassembly over a decompressing byte stream.
//!
//! `LineReassembler` is the explicit pending-bytes state; `ReassembledLines` drives it
//! from any `Read` one chunk at a time and yields complete lines lazily, so a consumer
//! can stop early without pulling the rest of the source.

use std::io::{self, Read};

pub const DEFAULT_CHUNK_BYTES: usize = 8 * 1024;

/// Pending bytes carried between chunks. Complete lines are split off the front;
/// the tail (possibly empty) waits for the next chunk.
#[derive(Debug, Default)]
pub struct LineReassembler {
    pending: Vec<u8>,
    // Start of the unconsumed region; compacted on the next push.
    start: usize,
}

impl LineReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        if self.start > 0 {
            self.pending.drain(..self.start);
            self.start = 0;
        }
        self.pending.extend_from_slice(chunk);
    }

    /// Split the next complete line off the buffer, without its `\n` (or `\r\n`).
    pub fn next_line(&mut self) -> Option<String> {
        let rest = &self.pending[self.start..];
        let nl = rest.iter().position(|&b| b == b'\n')?;
        let line = decode_line(&rest[..nl]);
        self.start += nl + 1;
        Some(line)
    }

    /// Drain whatever is left once the source is exhausted. A non-empty tail is a final,
    /// unterminated line.
    pub fn finish(&mut self) -> Option<String> {
        let rest = &self.pending[self.start..];
        let out = if rest.is_empty() { None } else { Some(decode_line(rest)) };
        self.pending.clear();
        self.start = 0;
        out
    }

    /// Bytes buffered but not yet emitted as a line.
    pub fn pending_len(&self) -> usize {
        self.pending.len() - self.start
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Lazy line sequence over `R`. Reads happen only when the buffer holds no complete line.
/// After an I/O error the iterator yields that error once and then ends.
pub struct ReassembledLines<R: Read> {
    inner: R,
    state: LineReassembler,
    chunk: Vec<u8>,
    done: bool,
}

impl<R: Read> ReassembledLines<R> {
    pub fn new(inner: R) -> Self {
        Self::with_chunk_size(inner, DEFAULT_CHUNK_BYTES)
    }

    pub fn with_chunk_size(inner: R, chunk_bytes: usize) -> Self {
        Self {
            inner,
            state: LineReassembler::new(),
            chunk: vec![0u8; chunk_bytes.max(1)],
            done: false,
        }
    }
}

impl<R: Read> Iterator for ReassembledLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(line) = self.state.next_line() {
                return Some(Ok(line));
            }
            if self.done {
                return None;
            }
            match self.inner.read(&mut self.chunk) {
                Ok(0) => {
                    self.done = true;
                    return self.state.finish().map(Ok);
                }
                Ok(n) => self.state.push(&self.chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.done = true;
                    self.state.finish();
                    return Some(Err(e));
                }
            }
        }
    }
}
