use serde::Serialize;

use super::annotations::AnnotationView;
use crate::model::{CanonicalResponse, CategoryFilter, Filters, Pagination};

#[derive(Debug, Clone, Serialize)]
pub struct ResultPage<'a> {
    pub items: Vec<&'a CanonicalResponse>,
    pub total: usize,
    pub page: usize,
    pub size: usize,
    pub page_count: usize,
}

#[cfg(test)]
impl ResultPage<'_> {
    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.id.as_str()).collect()
    }
}

pub fn page<'a, A>(
    responses: &'a [CanonicalResponse],
    filters: &Filters,
    annotations: &A,
    pagination: Pagination,
) -> ResultPage<'a>
where
    A: AnnotationView + ?Sized,
{
    let needle = filters.search.trim().to_lowercase();
    let matching = responses
        .iter()
        .filter(|response| matches(response, filters, &needle, annotations))
        .collect::<Vec<_>>();

    let size = pagination.size.max(1);
    let total = matching.len();
    let start = pagination.page.saturating_sub(1).saturating_mul(size);
    let items = if start >= total {
        Vec::new()
    } else {
        let end = start.saturating_add(size).min(total);
        matching[start..end].to_vec()
    };

    ResultPage {
        items,
        total,
        page: pagination.page,
        size,
        page_count: total.div_ceil(size).max(1),
    }
}

fn matches<A>(response: &CanonicalResponse, filters: &Filters, needle: &str, annotations: &A) -> bool
where
    A: AnnotationView + ?Sized,
{
    if !filters.difficulty.is_empty() && response.difficulty != filters.difficulty {
        return false;
    }
    if !filters.response_type.is_empty() && response.response_type != filters.response_type {
        return false;
    }

    let annotation = annotations.annotation(&response.id);
    let category_id = annotation.and_then(|annotation| annotation.category_id.as_deref());

    let category_matches = match &filters.category {
        CategoryFilter::All => true,
        // A reference to a deleted category counts as uncategorized.
        CategoryFilter::Uncategorized => {
            category_id.is_none_or(|id| !annotations.category_id_is_valid(id))
        }
        CategoryFilter::Category(wanted) => {
            annotations.category_id_is_valid(wanted) && category_id == Some(wanted.as_str())
        }
    };
    if !category_matches {
        return false;
    }

    if !filters.show_submitted && annotation.is_some_and(|annotation| annotation.is_submitted()) {
        return false;
    }

    if needle.is_empty() {
        return true;
    }

    let description = annotation
        .map(|annotation| annotation.description.as_str())
        .unwrap_or_default();
    let haystack = [
        response.id.as_str(),
        response.problem_id.as_str(),
        response.problem_name.as_str(),
        response.model.as_str(),
        response.response_type.as_str(),
        description,
    ]
    .join(" ")
    .to_lowercase();

    haystack.contains(needle)
}
