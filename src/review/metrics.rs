use std::collections::BTreeMap;
use std::ops::AddAssign;

use serde::Serialize;

use crate::model::{CanonicalResponse, ConfusionMatrix};

const EMPTY_OUTPUT_MARKERS: &[&str] = &["n/a", "na", "none", "null", "error", "no_code_extracted"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionCounts {
    pub true_positives: u64,
    pub true_negatives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
}

impl ConfusionCounts {
    /// Scores each test case: both empty is TN, only expected empty is FP,
    /// only generated empty is FN, equal is TP, anything else is FP.
    pub fn from_outputs(expected: &[String], generated: &[String]) -> Option<Self> {
        if expected.len() != generated.len() {
            return None;
        }

        let mut counts = Self::default();
        for (expected, generated) in expected.iter().zip(generated) {
            let expected = normalize_output(expected);
            let generated = normalize_output(generated);
            match (expected.is_empty(), generated.is_empty()) {
                (true, true) => counts.true_negatives += 1,
                (true, false) => counts.false_positives += 1,
                (false, true) => counts.false_negatives += 1,
                (false, false) if expected == generated => counts.true_positives += 1,
                (false, false) => counts.false_positives += 1,
            }
        }
        Some(counts)
    }

    pub fn from_recorded(matrix: &ConfusionMatrix) -> Option<Self> {
        if !matrix.has_counts() {
            return None;
        }
        Some(Self {
            true_positives: matrix.true_positives.unwrap_or(0),
            true_negatives: matrix.true_negatives.unwrap_or(0),
            false_positives: matrix.false_positives.unwrap_or(0),
            false_negatives: matrix.false_negatives.unwrap_or(0),
        })
    }

    pub fn total(&self) -> u64 {
        self.true_positives + self.true_negatives + self.false_positives + self.false_negatives
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positives + self.true_negatives, self.total())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn f1(&self) -> f64 {
        let precision = self.precision();
        let recall = self.recall();
        if precision + recall == 0.0 {
            return 0.0;
        }
        2.0 * precision * recall / (precision + recall)
    }

    pub fn specificity(&self) -> f64 {
        ratio(self.true_negatives, self.true_negatives + self.false_positives)
    }

    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            true_positives: self.true_positives,
            true_negatives: self.true_negatives,
            false_positives: self.false_positives,
            false_negatives: self.false_negatives,
            total_samples: self.total(),
            accuracy: self.accuracy(),
            precision: self.precision(),
            recall: self.recall(),
            f1_score: self.f1(),
            specificity: self.specificity(),
        }
    }
}

impl AddAssign for ConfusionCounts {
    fn add_assign(&mut self, other: Self) {
        self.true_positives += other.true_positives;
        self.true_negatives += other.true_negatives;
        self.false_positives += other.false_positives;
        self.false_negatives += other.false_negatives;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub true_positives: u64,
    pub true_negatives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    pub total_samples: u64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub specificity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerformanceSummary {
    pub by_type: BTreeMap<String, ConfusionCounts>,
    pub overall: ConfusionCounts,
    pub counted: usize,
    pub backfilled: usize,
    pub skipped: usize,
}

/// Aggregates counts per response type. Responses without recorded counts
/// are scored from their outputs when possible.
pub fn summarize(responses: &[CanonicalResponse]) -> PerformanceSummary {
    let mut summary = PerformanceSummary::default();

    for response in responses {
        let recorded = response
            .confusion_matrix
            .as_ref()
            .and_then(ConfusionCounts::from_recorded);
        let counts = match recorded {
            Some(counts) => counts,
            None => {
                let derived = (!response.expected_outputs.is_empty())
                    .then(|| {
                        ConfusionCounts::from_outputs(
                            &response.expected_outputs,
                            &response.generated_outputs,
                        )
                    })
                    .flatten();
                let Some(counts) = derived else {
                    summary.skipped += 1;
                    continue;
                };
                summary.backfilled += 1;
                counts
            }
        };

        *summary
            .by_type
            .entry(response.response_type.clone())
            .or_default() += counts;
        summary.overall += counts;
        summary.counted += 1;
    }

    summary
}

fn normalize_output(output: &str) -> String {
    let normalized = output.trim().to_lowercase();
    if EMPTY_OUTPUT_MARKERS.contains(&normalized.as_str()) {
        return String::new();
    }
    normalized
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64
}
