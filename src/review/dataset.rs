use std::collections::BTreeSet;

use serde_json::{Map, Value};
use thiserror::Error;

use super::fields::raw_text_field;
use crate::model::ProblemRow;

/// Column maps recognised in the keyed-by-index problem export.
const PROBLEM_COLUMNS: &[&str] = &[
    "name",
    "question",
    "difficulty",
    "tags",
    "url",
    "time_limit",
    "memory_limit",
    "input_output",
];

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset is not valid JSON")]
    Json {
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line} is not valid JSON")]
    JsonLine {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported dataset shape: {0}")]
    UnsupportedShape(&'static str),
}

pub fn parse_problem_source(text: &str) -> Result<Vec<ProblemRow>, DatasetError> {
    let value: Value =
        serde_json::from_str(text).map_err(|source| DatasetError::Json { source })?;

    match value {
        Value::Array(rows) => Ok(rows.iter().map(decode_problem_row).collect()),
        Value::Object(columns) if is_columnar(&columns) => Ok(decode_columnar(&columns)),
        Value::Object(_) => Err(DatasetError::UnsupportedShape(
            "object without index-keyed problem columns",
        )),
        _ => Err(DatasetError::UnsupportedShape(
            "expected an array of problem rows",
        )),
    }
}

/// Accepts a JSON array of records or one JSON record per line.
pub fn parse_response_source(text: &str) -> Result<Vec<Value>, DatasetError> {
    if text.trim_start().starts_with('[') {
        let value: Value =
            serde_json::from_str(text).map_err(|source| DatasetError::Json { source })?;
        return match value {
            Value::Array(records) => Ok(records),
            _ => Err(DatasetError::UnsupportedShape(
                "expected an array of response records",
            )),
        };
    }

    let mut records = Vec::new();
    for (offset, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record = serde_json::from_str::<Value>(trimmed).map_err(|source| {
            DatasetError::JsonLine {
                line: offset + 1,
                source,
            }
        })?;
        records.push(record);
    }

    Ok(records)
}

fn is_columnar(columns: &Map<String, Value>) -> bool {
    columns
        .get("question")
        .or_else(|| columns.get("name"))
        .is_some_and(Value::is_object)
}

fn decode_columnar(columns: &Map<String, Value>) -> Vec<ProblemRow> {
    let column_maps = PROBLEM_COLUMNS
        .iter()
        .filter_map(|column| {
            columns
                .get(*column)
                .and_then(Value::as_object)
                .map(|values| (*column, values))
        })
        .collect::<Vec<_>>();

    let keys = column_maps
        .iter()
        .flat_map(|(_, values)| values.keys().cloned())
        .collect::<BTreeSet<String>>();

    order_index_keys(keys)
        .into_iter()
        .map(|key| {
            let mut row = Map::new();
            for (column, values) in &column_maps {
                if let Some(value) = values.get(&key) {
                    row.insert((*column).to_string(), value.clone());
                }
            }
            decode_problem_row(&Value::Object(row))
        })
        .collect()
}

/// Numeric index keys sort numerically so "10" follows "9"; anything else
/// keeps lexicographic order.
fn order_index_keys(keys: BTreeSet<String>) -> Vec<String> {
    let mut keys = keys.into_iter().collect::<Vec<_>>();
    if keys.iter().all(|key| key.trim().parse::<u64>().is_ok()) {
        keys.sort_by_key(|key| key.trim().parse::<u64>().unwrap_or(u64::MAX));
    }
    keys
}

fn decode_problem_row(value: &Value) -> ProblemRow {
    let Some(record) = value.as_object() else {
        return ProblemRow::default();
    };

    ProblemRow {
        name: raw_text_field(record, "name"),
        difficulty: raw_text_field(record, "difficulty"),
        question: raw_text_field(record, "question"),
        tags: record.get("tags").cloned().unwrap_or(Value::Null),
        url: raw_text_field(record, "url"),
        time_limit: raw_text_field(record, "time_limit"),
        memory_limit: raw_text_field(record, "memory_limit"),
    }
}
