use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Filter value meaning "no category assigned", distinct from the empty "all" value.
pub const UNCATEGORIZED_FILTER: &str = "uncategorized";

/// Older spelling of [`UNCATEGORIZED_FILTER`], still accepted.
const UNCATEGORIZED_FILTER_ALIAS: &str = "__uncategorized__";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemRow {
    pub name: String,
    pub difficulty: String,
    pub question: String,
    /// Raw tag field as found in the source; decoded at normalization time.
    pub tags: Value,
    pub url: String,
    pub time_limit: String,
    pub memory_limit: String,
}

/// Copy of the joined problem taken when a response is normalized.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemSnapshot {
    pub name: String,
    pub question: String,
    pub tags: Vec<String>,
    pub url: String,
    pub time_limit: String,
    pub memory_limit: String,
}

/// Metrics recorded on a response record. Every field is optional because
/// older generation runs wrote partial matrices.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfusionMatrix {
    pub accuracy: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1: Option<f64>,
    pub true_positives: Option<u64>,
    pub false_positives: Option<u64>,
    pub false_negatives: Option<u64>,
    pub true_negatives: Option<u64>,
}

impl ConfusionMatrix {
    pub fn has_counts(&self) -> bool {
        self.true_positives.is_some()
            || self.false_positives.is_some()
            || self.false_negatives.is_some()
            || self.true_negatives.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalResponse {
    pub id: String,
    pub problem_id: String,
    pub problem_name: String,
    #[serde(rename = "type")]
    pub response_type: String,
    pub model: String,
    pub trace: String,
    pub difficulty: String,
    pub confusion_matrix: Option<ConfusionMatrix>,
    pub inputs: Vec<String>,
    pub expected_outputs: Vec<String>,
    pub generated_outputs: Vec<String>,
    pub problem_snapshot: Option<ProblemSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub category_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Annotation {
    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }
}

/// Fields to merge into an annotation. `None` leaves the stored value alone;
/// an empty `category_id` clears the assignment.
#[derive(Debug, Clone, Default)]
pub struct AnnotationPatch {
    pub description: Option<String>,
    pub category_id: Option<String>,
}

/// What is read from and written to the local store and the remote endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistencePayload {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub annotations: BTreeMap<String, Annotation>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    #[serde(flatten)]
    pub state: PersistencePayload,
    pub exported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Uncategorized,
    Category(String),
}

impl CategoryFilter {
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim() {
            "" => Self::All,
            UNCATEGORIZED_FILTER | UNCATEGORIZED_FILTER_ALIAS => Self::Uncategorized,
            id => Self::Category(id.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pub difficulty: String,
    pub response_type: String,
    pub category: CategoryFilter,
    pub search: String,
    pub show_submitted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub size: usize,
}

impl Pagination {
    pub fn new(page: usize, size: usize) -> Self {
        Self {
            page: page.max(1),
            size: size.max(1),
        }
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|id| !id.trim().is_empty()))
}

// Older exports carry either RFC 3339 strings or epoch milliseconds.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match value {
        Value::String(raw) => DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        Value::Number(number) => number.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    };
    Ok(parsed)
}
