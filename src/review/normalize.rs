use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use super::fields::{Decoded, f64_field, text_field, text_list_field, u64_field};
use super::problem_index::{IndexedProblem, ProblemIndex};
use super::tags::parse_tags;
use crate::model::{CanonicalResponse, ConfusionMatrix, ProblemSnapshot};

const ID_FIELDS: &[&str] = &["id", "response_id", "responseId"];
const PROBLEM_ID_FIELDS: &[&str] = &["problem_id", "problemId"];
const PROBLEM_NAME_FIELDS: &[&str] = &["problem_name", "problemName"];
const TYPE_FIELDS: &[&str] = &["type", "response_type"];
const MODEL_FIELDS: &[&str] = &["model"];
const DIFFICULTY_FIELDS: &[&str] = &["difficulty"];
const CONFUSION_FIELDS: &[&str] = &["confusion_matrix", "confusionMatrix"];
const INPUT_FIELDS: &[&str] = &["inputs"];
const EXPECTED_FIELDS: &[&str] = &["expected_outputs", "expectedOutputs"];
const GENERATED_FIELDS: &[&str] = &["generated_outputs", "generatedOutputs"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub joined_by_position: usize,
    pub joined_by_name: usize,
    pub unjoined: usize,
    pub generated_ids: usize,
    pub defaulted_fields: usize,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub responses: Vec<CanonicalResponse>,
    /// Distinct non-empty response types of this batch only.
    pub types: BTreeSet<String>,
    pub stats: NormalizeStats,
}

enum Join<'a> {
    Position(&'a IndexedProblem),
    Name(&'a IndexedProblem),
    Miss,
}

impl<'a> Join<'a> {
    fn problem(&self) -> Option<&'a IndexedProblem> {
        match self {
            Self::Position(problem) | Self::Name(problem) => Some(problem),
            Self::Miss => None,
        }
    }
}

pub fn normalize(raw: &[Value], index: &ProblemIndex) -> NormalizedBatch {
    let empty = Map::new();
    let mut batch = NormalizedBatch {
        responses: Vec::with_capacity(raw.len()),
        ..NormalizedBatch::default()
    };

    for value in raw {
        let record = value.as_object().unwrap_or(&empty);
        let response = normalize_record(record, index, &mut batch.stats);
        if !response.response_type.is_empty() {
            batch.types.insert(response.response_type.clone());
        }
        batch.responses.push(response);
    }

    debug!(
        responses = batch.responses.len(),
        types = batch.types.len(),
        joined_by_position = batch.stats.joined_by_position,
        joined_by_name = batch.stats.joined_by_name,
        unjoined = batch.stats.unjoined,
        generated_ids = batch.stats.generated_ids,
        defaulted_fields = batch.stats.defaulted_fields,
        "normalized response batch"
    );

    batch
}

fn normalize_record(
    record: &Map<String, Value>,
    index: &ProblemIndex,
    stats: &mut NormalizeStats,
) -> CanonicalResponse {
    let id = match text_field(record, ID_FIELDS) {
        Decoded::Found(id) => id,
        Decoded::Fallback(_) => {
            stats.generated_ids += 1;
            generate_response_id()
        }
    };

    let problem_id = text_field(record, PROBLEM_ID_FIELDS).into_inner();
    let problem_name = text_field(record, PROBLEM_NAME_FIELDS).into_inner();

    let join = resolve_join(index, &problem_id, &problem_name);
    match join {
        Join::Position(_) => stats.joined_by_position += 1,
        Join::Name(_) => stats.joined_by_name += 1,
        Join::Miss => stats.unjoined += 1,
    }
    let problem = join.problem();

    let difficulty = match text_field(record, DIFFICULTY_FIELDS) {
        Decoded::Found(explicit) => explicit,
        Decoded::Fallback(_) => problem
            .map(|problem| problem.row.difficulty.trim().to_string())
            .unwrap_or_default(),
    };

    let response_type = text_field(record, TYPE_FIELDS);
    let model = text_field(record, MODEL_FIELDS);
    let inputs = text_list_field(record, INPUT_FIELDS);
    let expected_outputs = text_list_field(record, EXPECTED_FIELDS);
    let generated_outputs = text_list_field(record, GENERATED_FIELDS);

    stats.defaulted_fields += [
        response_type.is_fallback(),
        model.is_fallback(),
        inputs.is_fallback(),
        expected_outputs.is_fallback(),
        generated_outputs.is_fallback(),
    ]
    .into_iter()
    .filter(|defaulted| *defaulted)
    .count();

    CanonicalResponse {
        id,
        problem_id: if problem_id.is_empty() {
            problem.map(IndexedProblem::position_key).unwrap_or_default()
        } else {
            problem_id
        },
        problem_name: if problem_name.is_empty() {
            problem
                .map(|problem| problem.row.name.trim().to_string())
                .unwrap_or_default()
        } else {
            problem_name
        },
        response_type: response_type.into_inner(),
        model: model.into_inner(),
        trace: render_trace(record.get("trace")),
        difficulty,
        confusion_matrix: decode_confusion_matrix(record),
        inputs: inputs.into_inner(),
        expected_outputs: expected_outputs.into_inner(),
        generated_outputs: generated_outputs.into_inner(),
        problem_snapshot: problem.map(snapshot),
    }
}

fn resolve_join<'a>(index: &'a ProblemIndex, problem_id: &str, problem_name: &str) -> Join<'a> {
    if !problem_id.is_empty() {
        if let Some(problem) = index.by_position(problem_id) {
            return Join::Position(problem);
        }
    }
    if let Some(problem) = index.by_name(problem_name) {
        return Join::Name(problem);
    }
    Join::Miss
}

fn generate_response_id() -> String {
    format!("gen-{}", Uuid::new_v4().simple())
}

/// Text traces are kept verbatim; structured ones are pretty-printed. Object
/// keys serialize in sorted order, so the rendering is stable across runs.
fn render_trace(raw: Option<&Value>) -> String {
    match raw {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

fn decode_confusion_matrix(record: &Map<String, Value>) -> Option<ConfusionMatrix> {
    let matrix = CONFUSION_FIELDS
        .iter()
        .find_map(|key| record.get(*key))
        .and_then(Value::as_object)?;

    Some(ConfusionMatrix {
        accuracy: f64_field(matrix, &["accuracy"]),
        precision: f64_field(matrix, &["precision"]),
        recall: f64_field(matrix, &["recall"]),
        f1: f64_field(matrix, &["f1_score", "f1", "f1Score"]),
        true_positives: u64_field(matrix, &["true_positives", "tp", "truePositives"]),
        false_positives: u64_field(matrix, &["false_positives", "fp", "falsePositives"]),
        false_negatives: u64_field(matrix, &["false_negatives", "fn", "falseNegatives"]),
        true_negatives: u64_field(matrix, &["true_negatives", "tn", "trueNegatives"]),
    })
}

fn snapshot(problem: &IndexedProblem) -> ProblemSnapshot {
    let row = &problem.row;
    ProblemSnapshot {
        name: row.name.trim().to_string(),
        question: row.question.clone(),
        tags: parse_tags(&row.tags),
        url: row.url.clone(),
        time_limit: row.time_limit.clone(),
        memory_limit: row.memory_limit.clone(),
    }
}

