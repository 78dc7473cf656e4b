//! Review record shapes and the per-line filter/mapper.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::date::CutoffDate;

/// One source line as published. Every field is optional and extracted on its own: a
/// badly typed value becomes `None` instead of rejecting the whole line. Extra fields
/// are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    #[serde(deserialize_with = "lenient_text")]
    pub user_id: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub parent_asin: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub asin: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub rating: Option<f64>,
    #[serde(deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub text: Option<String>,
    pub images: Option<Value>,
    /// Milliseconds since the epoch.
    #[serde(deserialize_with = "lenient_i64")]
    pub timestamp: Option<i64>,
    #[serde(deserialize_with = "lenient_bool")]
    pub verified_purchase: Option<bool>,
    #[serde(deserialize_with = "lenient_i64")]
    pub helpful_vote: Option<i64>,
}

/// Strings as-is, numbers and booleans as their JSON text, anything else `None`.
fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        v @ (Value::Number(_) | Value::Bool(_)) => Some(v.to_string()),
        _ => None,
    })
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Integers, floats (truncated toward zero) and numeric strings.
fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let as_int = |f: f64| f.is_finite().then_some(f as i64);
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(as_int)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().and_then(as_int))
        }
        _ => None,
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => Some(b),
        _ => None,
    })
}

/// A review in persistence shape. `None` is stored as NULL.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedRecord {
    pub user_id: Option<String>,
    pub parent_asin: Option<String>,
    pub asin: Option<String>,
    pub rating: Option<f64>,
    pub title: Option<String>,
    pub review_text: Option<String>,
    /// JSON text for arrays/objects, plain text for scalars.
    pub images: Option<String>,
    pub review_timestamp: i64,
    pub verified_purchase: Option<bool>,
    pub helpful_vote: i64,
    /// Category this record was sampled from.
    pub filename: String,
}

impl RawRecord {
    pub fn normalize(self, category: &str) -> NormalizedRecord {
        NormalizedRecord {
            user_id: self.user_id,
            parent_asin: self.parent_asin,
            asin: self.asin,
            rating: self.rating,
            title: self.title,
            review_text: self.text,
            images: self.images.and_then(images_to_text),
            review_timestamp: self.timestamp.unwrap_or(0),
            verified_purchase: self.verified_purchase,
            helpful_vote: self.helpful_vote.unwrap_or(0),
            filename: category.to_string(),
        }
    }
}

fn images_to_text(v: Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s),
        v @ (Value::Array(_) | Value::Object(_)) => Some(v.to_string()),
        other => Some(other.to_string()),
    }
}

/// Why a line produced no candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    Malformed,
    BeforeCutoff,
}

/// Parses lines and applies the timestamp cutoff. The cutoff is resolved to ms once.
#[derive(Clone, Copy, Debug)]
pub struct RecordFilter {
    cutoff_ms: i64,
}

impl RecordFilter {
    pub fn new(cutoff: CutoffDate) -> Self {
        Self { cutoff_ms: cutoff.as_millis() }
    }

    pub fn from_millis(cutoff_ms: i64) -> Self {
        Self { cutoff_ms }
    }

    pub fn cutoff_millis(&self) -> i64 {
        self.cutoff_ms
    }

    pub fn accept(&self, line: &str, category: &str) -> Result<NormalizedRecord, Rejection> {
        // Only a line that is not a JSON object is malformed; field types are forgiven.
        let obj: Map<String, Value> = serde_json::from_str(line).map_err(|_| Rejection::Malformed)?;
        let raw = RawRecord::deserialize(Value::Object(obj)).map_err(|_| Rejection::Malformed)?;
        if raw.timestamp.unwrap_or(0) < self.cutoff_ms {
            return Err(Rejection::BeforeCutoff);
        }
        Ok(raw.normalize(category))
    }
}
