use std::collections::BTreeSet;

use serde_json::Value;
use tracing::info;

use super::annotations::AnnotationStore;
use super::dataset::{DatasetError, parse_problem_source, parse_response_source};
use super::normalize::{NormalizeStats, normalize};
use super::problem_index::ProblemIndex;
use super::query::{self, ResultPage};
use crate::model::{CanonicalResponse, Filters, Pagination, ProblemRow};

/// Everything one review session owns: loaded datasets, derived responses,
/// annotations and the current query state.
pub struct ReviewSession {
    index: ProblemIndex,
    raw_responses: Vec<Value>,
    responses: Vec<CanonicalResponse>,
    types: BTreeSet<String>,
    last_stats: NormalizeStats,
    annotations: AnnotationStore,
    filters: Filters,
    pagination: Pagination,
}

impl ReviewSession {
    pub fn new(annotations: AnnotationStore, page_size: usize) -> Self {
        Self {
            index: ProblemIndex::default(),
            raw_responses: Vec::new(),
            responses: Vec::new(),
            types: BTreeSet::new(),
            last_stats: NormalizeStats::default(),
            annotations,
            filters: Filters::default(),
            pagination: Pagination::new(1, page_size),
        }
    }

    /// Parses the problem source and swaps it in. Already loaded responses are
    /// re-joined against the new index. On error nothing changes.
    pub fn load_problems(&mut self, text: &str) -> Result<usize, DatasetError> {
        let rows = parse_problem_source(text)?;
        Ok(self.replace_problems(rows))
    }

    pub fn replace_problems(&mut self, rows: Vec<ProblemRow>) -> usize {
        self.index.rebuild(rows);
        info!(
            problems = self.index.len(),
            difficulties = self.index.difficulties().count(),
            "problem index rebuilt"
        );
        if !self.raw_responses.is_empty() {
            self.renormalize();
        }
        self.index.len()
    }

    pub fn load_responses(&mut self, text: &str) -> Result<usize, DatasetError> {
        let records = parse_response_source(text)?;
        Ok(self.replace_responses(records))
    }

    pub fn replace_responses(&mut self, records: Vec<Value>) -> usize {
        self.raw_responses = records;
        self.renormalize();
        self.responses.len()
    }

    /// Re-joins the loaded records against the current problem index.
    pub fn renormalize(&mut self) {
        let batch = normalize(&self.raw_responses, &self.index);
        self.responses = batch.responses;
        self.types = batch.types;
        self.last_stats = batch.stats;
        info!(
            responses = self.responses.len(),
            types = self.types.len(),
            unjoined = self.last_stats.unjoined,
            "responses normalized"
        );
    }

    pub fn responses(&self) -> &[CanonicalResponse] {
        &self.responses
    }

    pub fn response(&self, response_id: &str) -> Option<&CanonicalResponse> {
        self.responses
            .iter()
            .find(|response| response.id == response_id)
    }

    pub fn problem_index(&self) -> &ProblemIndex {
        &self.index
    }

    pub fn last_stats(&self) -> &NormalizeStats {
        &self.last_stats
    }

    pub fn difficulty_options(&self) -> Vec<&str> {
        self.index.difficulties().collect()
    }

    pub fn type_options(&self) -> Vec<&str> {
        self.types.iter().map(String::as_str).collect()
    }

    pub fn annotations(&self) -> &AnnotationStore {
        &self.annotations
    }

    pub fn annotations_mut(&mut self) -> &mut AnnotationStore {
        &mut self.annotations
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn set_filters(&mut self, filters: Filters) {
        self.filters = filters;
        self.pagination.page = 1;
    }

    pub fn set_page_size(&mut self, size: usize) {
        self.pagination = Pagination::new(1, size);
    }

    /// Not clamped; an out-of-range page yields an empty result.
    pub fn set_page(&mut self, page: usize) {
        self.pagination.page = page.max(1);
    }

    pub fn current_page(&self) -> ResultPage<'_> {
        query::page(
            &self.responses,
            &self.filters,
            &self.annotations,
            self.pagination,
        )
    }
}
