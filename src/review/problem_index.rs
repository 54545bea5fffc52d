use std::collections::{BTreeSet, HashMap};

use crate::model::ProblemRow;

/// A problem row together with its 1-based position in the source collection.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedProblem {
    pub position: usize,
    pub row: ProblemRow,
}

impl IndexedProblem {
    pub fn position_key(&self) -> String {
        self.position.to_string()
    }
}

/// Lookup tables over one problem-source load.
#[derive(Debug, Clone, Default)]
pub struct ProblemIndex {
    problems: Vec<IndexedProblem>,
    by_position: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
    difficulties: BTreeSet<String>,
}

impl ProblemIndex {
    pub fn build(rows: Vec<ProblemRow>) -> Self {
        let mut index = Self {
            problems: Vec::with_capacity(rows.len()),
            ..Self::default()
        };

        for (offset, row) in rows.into_iter().enumerate() {
            let position = offset + 1;
            let slot = index.problems.len();

            index.by_position.insert(position.to_string(), slot);

            let name = row.name.trim();
            if !name.is_empty() {
                index.by_name.insert(name.to_string(), slot);
            }

            let difficulty = row.difficulty.trim();
            if !difficulty.is_empty() {
                index.difficulties.insert(difficulty.to_string());
            }

            index.problems.push(IndexedProblem { position, row });
        }

        index
    }

    /// Replaces every table at once; nothing from the previous load survives.
    pub fn rebuild(&mut self, rows: Vec<ProblemRow>) {
        *self = Self::build(rows);
    }

    pub fn by_position(&self, key: &str) -> Option<&IndexedProblem> {
        self.by_position
            .get(key.trim())
            .and_then(|slot| self.problems.get(*slot))
    }

    pub fn by_name(&self, name: &str) -> Option<&IndexedProblem> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return None;
        }
        self.by_name
            .get(trimmed)
            .and_then(|slot| self.problems.get(*slot))
    }

    pub fn difficulties(&self) -> impl Iterator<Item = &str> {
        self.difficulties.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }
}
