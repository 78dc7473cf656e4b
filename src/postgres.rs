//! PostgreSQL sink.
//!
//! Writes each category's kept set into `review_data` and records the category in
//! `review_categories_done`, inside one transaction. The loader is synchronous, so the
//! sink owns a current-thread Tokio runtime and blocks on each sqlx call.
//!
//! | Table                    | Role                                              |
//! |--------------------------|---------------------------------------------------|
//! | `review_data`            | sampled reviews; source of the user ledger        |
//! | `review_categories_done` | explicit completion marker, also for empty sets   |

use crate::config::DbConfig;
use crate::error::LoadError;
use crate::record::NormalizedRecord;
use crate::sink::ReviewSink;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tokio::runtime::{Builder, Runtime};

pub const REVIEW_TABLE: &str = "review_data";

pub const REVIEW_COLUMNS: [&str; 11] = [
    "user_id",
    "parent_asin",
    "asin",
    "rating",
    "title",
    "review_text",
    "images",
    "review_timestamp",
    "verified_purchase",
    "helpful_vote",
    "filename",
];

/// Rows per INSERT statement; keeps binds well under the 65535 parameter limit.
const INSERT_CHUNK_ROWS: usize = 1000;

const SCHEMA: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS review_data (
        id SERIAL PRIMARY KEY,
        user_id TEXT,
        parent_asin TEXT,
        asin TEXT,
        rating DOUBLE PRECISION,
        title TEXT,
        review_text TEXT,
        images TEXT,
        review_timestamp BIGINT,
        verified_purchase BOOLEAN,
        helpful_vote BIGINT,
        filename TEXT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE INDEX IF NOT EXISTS idx_review_user_id ON review_data(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_review_filename ON review_data(filename)",
    "CREATE TABLE IF NOT EXISTS review_categories_done (
        filename TEXT PRIMARY KEY,
        kept_count BIGINT NOT NULL,
        completed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )",
];

/// Multi-row INSERT for `num_rows` reviews with `$n` placeholders.
pub fn build_insert_sql(num_rows: usize) -> String {
    let cols = REVIEW_COLUMNS.len();
    let mut sql = format!("INSERT INTO {} ({}) VALUES ", REVIEW_TABLE, REVIEW_COLUMNS.join(", "));
    for row in 0..num_rows {
        if row > 0 {
            sql.push_str(", ");
        }
        sql.push('(');
        for col in 0..cols {
            if col > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&format!("${}", row * cols + col + 1));
        }
        sql.push(')');
    }
    sql
}

pub struct PostgresSink {
    rt: Runtime,
    pool: PgPool,
}

impl PostgresSink {
    /// Connect using environment-supplied parameters. Any failure here is a configuration
    /// error and fatal to the run.
    pub fn connect(cfg: &DbConfig) -> Result<Self, LoadError> {
        let opts = cfg.connect_options()?;
        let rt = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| LoadError::Configuration(format!("tokio runtime: {e}")))?;
        let pool = rt
            .block_on(PgPoolOptions::new().max_connections(1).connect_with(opts))
            .map_err(|e| LoadError::Configuration(format!("cannot connect to PostgreSQL: {e}")))?;
        tracing::info!("Connected to PostgreSQL");
        Ok(Self { rt, pool })
    }

    /// Create the review and marker tables when absent.
    pub fn ensure_schema(&self) -> Result<(), LoadError> {
        self.rt
            .block_on(async {
                for stmt in SCHEMA {
                    sqlx::query(stmt).execute(&self.pool).await?;
                }
                Ok::<_, sqlx::Error>(())
            })
            .map_err(|e| LoadError::Persistence(format!("schema bootstrap: {e}")))
    }

    fn fetch_strings(&self, sql: &str, col: &str) -> Result<Vec<String>, LoadError> {
        self.rt
            .block_on(async {
                let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
                rows.iter()
                    .map(|r| r.try_get::<Option<String>, _>(col))
                    .filter_map(|v| v.transpose())
                    .collect::<Result<Vec<String>, sqlx::Error>>()
            })
            .map_err(|e| LoadError::Persistence(e.to_string()))
    }
}

impl ReviewSink for PostgresSink {
    fn known_users(&self) -> Result<Vec<String>, LoadError> {
        self.fetch_strings("SELECT DISTINCT user_id FROM review_data WHERE user_id IS NOT NULL", "user_id")
    }

    fn completed_categories(&self) -> Result<Vec<String>, LoadError> {
        self.fetch_strings(
            "SELECT DISTINCT filename FROM review_data WHERE filename IS NOT NULL \
             UNION SELECT filename FROM review_categories_done",
            "filename",
        )
    }

    fn write_category(&self, category: &str, records: &[NormalizedRecord]) -> Result<(), LoadError> {
        self.rt
            .block_on(async {
                // Dropping `tx` on any early return rolls the whole batch back.
                let mut tx = self.pool.begin().await?;
                for chunk in records.chunks(INSERT_CHUNK_ROWS) {
                    let sql = build_insert_sql(chunk.len());
                    let mut q = sqlx::query(&sql);
                    for r in chunk {
                        q = q
                            .bind(&r.user_id)
                            .bind(&r.parent_asin)
                            .bind(&r.asin)
                            .bind(r.rating)
                            .bind(&r.title)
                            .bind(&r.review_text)
                            .bind(&r.images)
                            .bind(r.review_timestamp)
                            .bind(r.verified_purchase)
                            .bind(r.helpful_vote)
                            .bind(&r.filename);
                    }
                    q.execute(&mut *tx).await?;
                }
                sqlx::query(
                    "INSERT INTO review_categories_done (filename, kept_count) VALUES ($1, $2) \
                     ON CONFLICT (filename) DO UPDATE \
                     SET kept_count = EXCLUDED.kept_count, completed_at = CURRENT_TIMESTAMP",
                )
                .bind(category)
                .bind(records.len() as i64)
                .execute(&mut *tx)
                .await?;
                tx.commit().await
            })
            .map_err(|e| LoadError::Persistence(format!("{category}: {e}")))?;
        tracing::info!(category, rows = records.len(), "Successfully inserted records");
        Ok(())
    }
}
