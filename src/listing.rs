//! Category file discovery: the catalog page, a local mirror, or a fixed list.

use crate::codec::Compression;
use crate::error::LoadError;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;
use walkdir::WalkDir;

/// Returns an ordered list of absolute download locations (URLs or local paths).
pub trait FileListing {
    fn list(&self) -> Result<Vec<String>, LoadError>;
}

/// Keep only review files (the marker is matched case-insensitively).
pub fn review_files(all: &[String], marker: &str) -> Vec<String> {
    let marker = marker.to_lowercase();
    all.iter().filter(|u| u.to_lowercase().contains(&marker)).cloned().collect()
}

/// Canonical category name: last path segment, minus query string and compression suffix.
/// `.../review_categories/All_Beauty.jsonl.gz` -> `All_Beauty.jsonl`
pub fn category_name(location: &str) -> String {
    let path = location.split(['?', '#']).next().unwrap_or(location);
    let last = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match Compression::from_name(last).suffix() {
        Some(sfx) if last.to_ascii_lowercase().ends_with(sfx) => last[..last.len() - sfx.len()].to_string(),
        _ => last.to_string(),
    }
}

// ----------------------------- Catalog page ------------------------------------

/// Scrapes the dataset's catalog page. Download links live in the page's second table.
pub struct HttpCatalogListing {
    base_url: String,
    client: Client,
}

impl HttpCatalogListing {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, LoadError> {
        let base_url = base_url.into();
        let mut builder = Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build().map_err(|e| LoadError::transport(&base_url, e))?;
        Ok(Self { base_url, client })
    }
}

impl FileListing for HttpCatalogListing {
    fn list(&self) -> Result<Vec<String>, LoadError> {
        let body = self
            .client
            .get(&self.base_url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(|e| LoadError::transport(&self.base_url, e))?;
        tracing::info!(url = %self.base_url, "Index page loaded");
        parse_catalog_links(&body, &self.base_url)
    }
}

const TABLE_PATTERN: &str = r"(?is)<table\b.*?</table\s*>";
const HREF_PATTERN: &str = r#"(?is)<a\b[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)')"#;

/// Extract anchors from the second `<table>` of the catalog page, in document order.
/// Relative hrefs are resolved against `base_url` the way a browser would.
pub fn parse_catalog_links(html: &str, base_url: &str) -> Result<Vec<String>, LoadError> {
    let base = Url::parse(base_url).map_err(|e| LoadError::transport(base_url, e))?;
    let table_re = Regex::new(TABLE_PATTERN).map_err(|e| LoadError::Configuration(e.to_string()))?;
    let href_re = Regex::new(HREF_PATTERN).map_err(|e| LoadError::Configuration(e.to_string()))?;
    let table = table_re
        .find_iter(html)
        .nth(1)
        .ok_or_else(|| LoadError::transport(base_url, "catalog page has no download table"))?;

    let links = href_re
        .captures_iter(table.as_str())
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str().trim())
        .filter(|href| !href.is_empty())
        .map(|href| base.join(href).map(String::from).map_err(|e| LoadError::transport(href, e)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(links)
}

// ----------------------------- Local mirror ------------------------------------

/// Walks a local mirror for `.jsonl`, `.jsonl.gz` and `.jsonl.zst` files (sorted).
pub struct DirectoryListing {
    root: PathBuf,
}

impl DirectoryListing {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FileListing for DirectoryListing {
    fn list(&self) -> Result<Vec<String>, LoadError> {
        if !self.root.is_dir() {
            return Err(LoadError::transport(self.root.display().to_string(), "not a directory"));
        }
        let mut out: Vec<String> = WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().to_lowercase();
                let is_jsonl = name.ends_with(".jsonl") || name.ends_with(".jsonl.gz") || name.ends_with(".jsonl.zst");
                is_jsonl.then(|| e.path().to_string_lossy().into_owned())
            })
            .collect();
        out.sort();
        Ok(out)
    }
}

/// A fixed list, e.g. from the command line.
pub struct StaticListing(pub Vec<String>);

impl FileListing for StaticListing {
    fn list(&self) -> Result<Vec<String>, LoadError> {
        Ok(self.0.clone())
    }
}
