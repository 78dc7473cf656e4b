//! Columnar export of every record normalized during a run.
//!
//! Convenience artifact for offline analysis; the database stays authoritative.

use crate::record::NormalizedRecord;
use crate::util::{create_with_backoff, replace_file_atomic_backoff};
use anyhow::{Context, Result};
use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::path::Path;
use std::sync::Arc;

/// Rows per Arrow record batch.
const BATCH_ROWS: usize = 64 * 1024;

pub fn snapshot_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("user_id", DataType::Utf8, true),
        Field::new("parent_asin", DataType::Utf8, true),
        Field::new("asin", DataType::Utf8, true),
        Field::new("rating", DataType::Float64, true),
        Field::new("title", DataType::Utf8, true),
        Field::new("review_text", DataType::Utf8, true),
        Field::new("images", DataType::Utf8, true),
        Field::new("review_timestamp", DataType::Int64, false),
        Field::new("verified_purchase", DataType::Boolean, true),
        Field::new("helpful_vote", DataType::Int64, false),
        Field::new("filename", DataType::Utf8, false),
    ]))
}

fn text_col(rows: &[NormalizedRecord], f: impl Fn(&NormalizedRecord) -> Option<&str>) -> ArrayRef {
    Arc::new(rows.iter().map(f).collect::<StringArray>())
}

fn to_batch(schema: &Arc<Schema>, rows: &[NormalizedRecord]) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        text_col(rows, |r| r.user_id.as_deref()),
        text_col(rows, |r| r.parent_asin.as_deref()),
        text_col(rows, |r| r.asin.as_deref()),
        Arc::new(rows.iter().map(|r| r.rating).collect::<Float64Array>()),
        text_col(rows, |r| r.title.as_deref()),
        text_col(rows, |r| r.review_text.as_deref()),
        text_col(rows, |r| r.images.as_deref()),
        Arc::new(Int64Array::from(rows.iter().map(|r| r.review_timestamp).collect::<Vec<i64>>())),
        Arc::new(rows.iter().map(|r| r.verified_purchase).collect::<BooleanArray>()),
        Arc::new(Int64Array::from(rows.iter().map(|r| r.helpful_vote).collect::<Vec<i64>>())),
        Arc::new(rows.iter().map(|r| Some(r.filename.as_str())).collect::<StringArray>()),
    ];
    RecordBatch::try_new(schema.clone(), columns).context("build snapshot record batch")
}

/// Write `rows` to `path` as Parquet (snappy). The file appears atomically.
/// Returns the number of rows written.
pub fn write_snapshot(path: &Path, rows: &[NormalizedRecord]) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let tmp = path.with_extension("parquet.tmp");
    let file = create_with_backoff(&tmp, 16, 50).with_context(|| format!("create {}", tmp.display()))?;

    let schema = snapshot_schema();
    let props = WriterProperties::builder().set_compression(Compression::SNAPPY).build();
    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props)).context("open parquet writer")?;
    for chunk in rows.chunks(BATCH_ROWS) {
        writer.write(&to_batch(&schema, chunk)?).context("write parquet batch")?;
    }
    writer.close().context("finalize parquet footer")?;

    replace_file_atomic_backoff(&tmp, path)?;
    Ok(rows.len())
}
