use anyhow::Result;
use tracing::{info, warn};

use super::context::RecordedDatasets;
use crate::config::Settings;
use crate::persistence::{DatasetRecord, LocalStore, SqliteStore};

pub fn run(settings: &Settings) -> Result<()> {
    info!(
        cache_root = %settings.cache_root.display(),
        remote_url = %settings.remote_url.as_deref().unwrap_or("(local only)"),
        "status requested"
    );

    if !settings.db_path.exists() {
        warn!(path = %settings.db_path.display(), "review database missing");
        return Ok(());
    }

    let store = SqliteStore::open(&settings.db_path)?;
    info!(
        path = %settings.db_path.display(),
        schema_version = %store.metadata("db_schema_version")?.unwrap_or_default(),
        "review database"
    );

    let recorded = RecordedDatasets::read(&store)?;
    log_dataset("problems", recorded.problems.as_ref());
    log_dataset("responses", recorded.responses.as_ref());

    let state = store.read()?.unwrap_or_default();
    let submitted = state
        .annotations
        .values()
        .filter(|annotation| annotation.is_submitted())
        .count();
    let described = state
        .annotations
        .values()
        .filter(|annotation| !annotation.description.trim().is_empty())
        .count();
    let categorized = state
        .annotations
        .values()
        .filter(|annotation| annotation.category_id.is_some())
        .count();

    let updated_at = store
        .annotations_updated_at()?
        .map(|ts| ts.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());

    info!(
        categories = state.categories.len(),
        annotations = state.annotations.len(),
        submitted,
        described,
        categorized,
        updated_at = %updated_at,
        "annotation state"
    );

    Ok(())
}

fn log_dataset(kind: &str, record: Option<&DatasetRecord>) {
    match record {
        Some(record) => info!(
            kind,
            path = %record.path,
            records = record.record_count,
            sha256 = %record.sha256,
            loaded_at = %record.loaded_at,
            "dataset"
        ),
        None => warn!(kind, "dataset not loaded"),
    }
}
