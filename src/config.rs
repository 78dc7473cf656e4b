use crate::date::CutoffDate;
use crate::error::LoadError;
use crate::reassemble::DEFAULT_CHUNK_BYTES;
use crate::sampler::DEFAULT_MAX_KEPT;
use regex::Regex;
use sqlx::postgres::PgConnectOptions;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "https://amazon-reviews-2023.github.io/";
pub const DEFAULT_REVIEW_MARKER: &str = "review_categories";
pub const DEFAULT_SCAN_BUDGET: u64 = 300_000;
pub const DEFAULT_SNAPSHOT: &str = "amazon_review2_only.parquet";

/// Loader options with sensible defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct LoaderOptions {
    pub review_marker: String,      // substring identifying review files (vs. metadata)
    pub max_kept: usize,            // per-category cap on kept records
    pub scan_budget: u64,           // per-category cap on non-blank lines scanned
    pub cutoff: CutoffDate,         // inclusive lower bound on review timestamps
    pub chunk_bytes: usize,         // decompressed bytes pulled per read
    pub snapshot_path: Option<PathBuf>,
    pub category_filter: Option<Regex>,
    pub progress: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            review_marker: DEFAULT_REVIEW_MARKER.to_string(),
            max_kept: DEFAULT_MAX_KEPT,
            scan_budget: DEFAULT_SCAN_BUDGET,
            cutoff: CutoffDate::default(),
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            snapshot_path: Some(PathBuf::from(DEFAULT_SNAPSHOT)),
            category_filter: None,
            progress: true,
        }
    }
}

impl LoaderOptions {
    pub fn with_review_marker(mut self, marker: impl AsRef<str>) -> Self {
        self.review_marker = marker.as_ref().trim().to_lowercase();
        self
    }
    pub fn with_max_kept(mut self, n: usize) -> Self {
        self.max_kept = n;
        self
    }
    pub fn with_scan_budget(mut self, lines: u64) -> Self {
        self.scan_budget = lines;
        self
    }
    pub fn with_cutoff(mut self, cutoff: CutoffDate) -> Self {
        self.cutoff = cutoff;
        self
    }
    pub fn with_chunk_bytes(mut self, bytes: usize) -> Self {
        self.chunk_bytes = bytes.max(1);
        self
    }
    pub fn with_snapshot(mut self, path: Option<&Path>) -> Self {
        self.snapshot_path = path.map(Path::to_path_buf);
        self
    }
    pub fn with_category_filter(mut self, re: Option<Regex>) -> Self {
        self.category_filter = re;
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
}

/// Database connection parameters, read from the environment (`.env` honored by the binary).
/// Missing values are kept as `None` and only reported when a connection is attempted.
#[derive(Clone, Debug, Default)]
pub struct DbConfig {
    pub host: Option<String>,
    pub port: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub dbname: Option<String>,
}

impl DbConfig {
    pub fn from_env() -> Self {
        let var = |k: &str| std::env::var(k).ok().filter(|v| !v.trim().is_empty());
        Self {
            host: var("DB_HOST"),
            port: var("DB_PORT"),
            user: var("DB_USER"),
            password: var("DB_PASSWORD"),
            dbname: var("DBNAME"),
        }
    }

    pub fn connect_options(&self) -> Result<PgConnectOptions, LoadError> {
        let missing: Vec<&str> = [
            ("DB_HOST", &self.host),
            ("DB_PORT", &self.port),
            ("DB_USER", &self.user),
            ("DB_PASSWORD", &self.password),
            ("DBNAME", &self.dbname),
        ]
        .iter()
        .filter(|(_, v)| v.is_none())
        .map(|(k, _)| *k)
        .collect();
        if !missing.is_empty() {
            return Err(LoadError::Configuration(format!("missing {}", missing.join(", "))));
        }

        let port: u16 = self
            .port
            .as_deref()
            .unwrap_or_default()
            .trim()
            .parse()
            .map_err(|e| LoadError::Configuration(format!("invalid DB_PORT: {e}")))?;

        Ok(PgConnectOptions::new()
            .host(self.host.as_deref().unwrap_or_default())
            .port(port)
            .username(self.user.as_deref().unwrap_or_default())
            .password(self.password.as_deref().unwrap_or_default())
            .database(self.dbname.as_deref().unwrap_or_default()))
    }
}
