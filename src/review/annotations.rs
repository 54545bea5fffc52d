use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::model::{Annotation, AnnotationPatch, Category, ExportPayload, PersistencePayload};
use crate::persistence::PersistenceGateway;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnnotationError {
    #[error("category name must not be empty")]
    EmptyCategoryName,

    #[error("unknown category: {0}")]
    UnknownCategory(String),
}

/// Which parts of an import were applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub categories_replaced: bool,
    pub annotations_replaced: bool,
}

/// Read access used by the query layer.
pub trait AnnotationView {
    fn annotation(&self, response_id: &str) -> Option<&Annotation>;
    fn category_id_is_valid(&self, category_id: &str) -> bool;
}

/// Categories and per-response annotations. Every mutation is saved through
/// the gateway before the call returns.
pub struct AnnotationStore {
    categories: Vec<Category>,
    annotations: BTreeMap<String, Annotation>,
    gateway: PersistenceGateway,
}

impl AnnotationStore {
    pub fn open(gateway: PersistenceGateway) -> Self {
        let payload = gateway.load();
        Self::from_payload(payload, gateway)
    }

    pub async fn open_with_remote(gateway: PersistenceGateway) -> Self {
        let payload = gateway.load_with_remote().await;
        Self::from_payload(payload, gateway)
    }

    fn from_payload(payload: PersistencePayload, gateway: PersistenceGateway) -> Self {
        debug!(
            categories = payload.categories.len(),
            annotations = payload.annotations.len(),
            "loaded annotation state"
        );
        Self {
            categories: payload.categories,
            annotations: payload.annotations,
            gateway,
        }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category(&self, category_id: &str) -> Option<&Category> {
        self.categories
            .iter()
            .find(|category| category.id == category_id)
    }

    pub fn annotations(&self) -> &BTreeMap<String, Annotation> {
        &self.annotations
    }

    pub fn create_category(&mut self, name: &str) -> Result<Category, AnnotationError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(AnnotationError::EmptyCategoryName);
        }

        let category = Category {
            id: format!("cat-{}", Uuid::new_v4().simple()),
            name: trimmed.to_string(),
        };
        self.categories.push(category.clone());
        info!(category_id = %category.id, name = %category.name, "created category");
        self.persist();

        Ok(category)
    }

    /// Returns false when the name is blank or the category does not exist.
    pub fn rename_category(&mut self, category_id: &str, new_name: &str) -> bool {
        let trimmed = new_name.trim();
        if trimmed.is_empty() {
            return false;
        }
        let Some(category) = self
            .categories
            .iter_mut()
            .find(|category| category.id == category_id)
        else {
            return false;
        };

        category.name = trimmed.to_string();
        info!(category_id = %category_id, name = %trimmed, "renamed category");
        self.persist();
        true
    }

    /// Removes the category and clears every annotation that pointed at it.
    pub fn delete_category(&mut self, category_id: &str) -> bool {
        let before = self.categories.len();
        self.categories.retain(|category| category.id != category_id);
        if self.categories.len() == before {
            return false;
        }

        let mut cleared = 0_usize;
        for annotation in self.annotations.values_mut() {
            if annotation.category_id.as_deref() == Some(category_id) {
                annotation.category_id = None;
                cleared += 1;
            }
        }

        info!(category_id = %category_id, cleared_annotations = cleared, "deleted category");
        self.persist();
        true
    }

    pub fn upsert_annotation(
        &mut self,
        response_id: &str,
        patch: AnnotationPatch,
    ) -> Result<&Annotation, AnnotationError> {
        let category_id = match patch.category_id {
            None => None,
            Some(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    Some(None)
                } else if self.category_id_is_valid(trimmed) {
                    Some(Some(trimmed.to_string()))
                } else {
                    return Err(AnnotationError::UnknownCategory(trimmed.to_string()));
                }
            }
        };

        let annotation = self.annotations.entry(response_id.to_string()).or_default();
        if let Some(description) = patch.description {
            annotation.description = description;
        }
        if let Some(category_id) = category_id {
            annotation.category_id = category_id;
        }

        debug!(response_id = %response_id, "updated annotation");
        self.persist();

        Ok(&self.annotations[response_id])
    }

    /// Flips the submitted state and returns whether the response is now submitted.
    pub fn toggle_submitted(&mut self, response_id: &str) -> bool {
        let annotation = self.annotations.entry(response_id.to_string()).or_default();
        annotation.submitted_at = match annotation.submitted_at {
            Some(_) => None,
            None => Some(Utc::now()),
        };
        let submitted = annotation.is_submitted();

        info!(response_id = %response_id, submitted, "toggled submitted state");
        self.persist();
        submitted
    }

    pub fn snapshot(&self) -> PersistencePayload {
        PersistencePayload {
            categories: self.categories.clone(),
            annotations: self.annotations.clone(),
        }
    }

    pub fn export(&self) -> ExportPayload {
        ExportPayload {
            state: self.snapshot(),
            exported_at: Utc::now(),
        }
    }

    /// Replaces categories and annotations wholesale, each only when its field
    /// is well-typed; an ill-typed field leaves the current value in place.
    pub fn import(&mut self, payload: &Value) -> ImportOutcome {
        let categories = payload
            .get("categories")
            .and_then(|value| serde_json::from_value::<Vec<Category>>(value.clone()).ok());
        let annotations = payload.get("annotations").and_then(|value| {
            serde_json::from_value::<BTreeMap<String, Annotation>>(value.clone()).ok()
        });

        let outcome = ImportOutcome {
            categories_replaced: categories.is_some(),
            annotations_replaced: annotations.is_some(),
        };

        if let Some(categories) = categories {
            self.categories = categories;
        }
        if let Some(annotations) = annotations {
            self.annotations = annotations;
        }

        info!(
            categories_replaced = outcome.categories_replaced,
            annotations_replaced = outcome.annotations_replaced,
            "imported annotation state"
        );
        if outcome.categories_replaced || outcome.annotations_replaced {
            self.persist();
        }

        outcome
    }

    pub async fn flush(&mut self) {
        self.gateway.flush().await;
    }

    fn persist(&mut self) {
        let payload = self.snapshot();
        self.gateway.save(&payload);
    }
}

impl AnnotationView for AnnotationStore {
    fn annotation(&self, response_id: &str) -> Option<&Annotation> {
        self.annotations.get(response_id)
    }

    fn category_id_is_valid(&self, category_id: &str) -> bool {
        self.categories
            .iter()
            .any(|category| category.id == category_id)
    }
}

impl AnnotationView for PersistencePayload {
    fn annotation(&self, response_id: &str) -> Option<&Annotation> {
        self.annotations.get(response_id)
    }

    fn category_id_is_valid(&self, category_id: &str) -> bool {
        self.categories
            .iter()
            .any(|category| category.id == category_id)
    }
}
