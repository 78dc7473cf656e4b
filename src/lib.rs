mod config;
mod date;
mod error;
mod util;
mod mem;
mod progress;

mod codec;
mod reassemble;
mod record;
mod ledger;
mod sampler;

mod listing;
mod source;
mod sink;
mod postgres;
mod snapshot;
mod processor;

pub use crate::config::{DbConfig, LoaderOptions, DEFAULT_BASE_URL, DEFAULT_REVIEW_MARKER, DEFAULT_SCAN_BUDGET, DEFAULT_SNAPSHOT};
pub use crate::date::CutoffDate;
pub use crate::error::LoadError;
pub use crate::processor::{CategoryReport, CategoryState, ReviewLoader, RunReport, ScanStats, StopReason};

// Streaming building blocks.
pub use crate::codec::{Compression, CountingReader};
pub use crate::reassemble::{LineReassembler, ReassembledLines, DEFAULT_CHUNK_BYTES};
pub use crate::record::{NormalizedRecord, RawRecord, RecordFilter, Rejection};
pub use crate::ledger::UserLedger;
pub use crate::sampler::{Flow, QuotaSampler, SampledCategory, DEFAULT_MAX_KEPT};

// Collaborators: listing, transport, persistence, export.
pub use crate::listing::{category_name, parse_catalog_links, review_files, DirectoryListing, FileListing, HttpCatalogListing, StaticListing};
pub use crate::source::{is_remote, StreamOpener, TransportOpener};
pub use crate::sink::{MemorySink, ReviewSink};
pub use crate::postgres::{build_insert_sql, PostgresSink, REVIEW_COLUMNS};
pub use crate::snapshot::{snapshot_schema, write_snapshot};

// Progress and memory helpers for the binary.
pub use crate::progress::set_global_multiprogress;
pub use crate::mem::{available_memory_fraction, MemoryGuard};
pub use crate::util::init_tracing_once;
