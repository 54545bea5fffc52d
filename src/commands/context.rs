use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::model::ProblemRow;
use crate::persistence::{
    DatasetRecord, HttpRemote, PersistenceGateway, SqliteStore, SyncDebouncer,
};
use crate::review::{AnnotationStore, ReviewSession, parse_problem_source};
use crate::util::{read_text, sha256_file};

pub(crate) const PROBLEMS_DATASET: &str = "problems";
pub(crate) const RESPONSES_DATASET: &str = "responses";

pub(crate) struct RecordedDatasets {
    pub(crate) problems: Option<DatasetRecord>,
    pub(crate) responses: Option<DatasetRecord>,
}

impl RecordedDatasets {
    pub(crate) fn read(store: &SqliteStore) -> Result<Self> {
        Ok(Self {
            problems: store.dataset(PROBLEMS_DATASET)?,
            responses: store.dataset(RESPONSES_DATASET)?,
        })
    }
}

pub(crate) fn open_annotations(settings: &Settings, runtime: &Runtime) -> Result<AnnotationStore> {
    let store = SqliteStore::open(&settings.db_path)?;
    open_annotations_with(settings, runtime, store)
}

fn open_annotations_with(
    settings: &Settings,
    runtime: &Runtime,
    store: SqliteStore,
) -> Result<AnnotationStore> {
    let Some(url) = &settings.remote_url else {
        return Ok(AnnotationStore::open(PersistenceGateway::local_only(
            Box::new(store),
        )));
    };

    let remote = HttpRemote::new(url, settings.remote_timeout)?;
    let debouncer = SyncDebouncer::new(
        Arc::new(remote),
        runtime.handle().clone(),
        settings.sync_debounce,
    );
    let gateway = PersistenceGateway::with_remote(Box::new(store), debouncer);
    info!(remote_url = %url, "remote annotation sync enabled");

    Ok(runtime.block_on(AnnotationStore::open_with_remote(gateway)))
}

/// Opens the annotation state and reloads the datasets recorded by `load`.
pub(crate) fn open_session(settings: &Settings, runtime: &Runtime) -> Result<ReviewSession> {
    let store = SqliteStore::open(&settings.db_path)?;
    let recorded = RecordedDatasets::read(&store)?;

    let annotations = open_annotations_with(settings, runtime, store)?;
    let mut session = ReviewSession::new(annotations, settings.page_size);

    if let Some(record) = &recorded.problems {
        let text = read_recorded(record)?;
        session
            .load_problems(&text)
            .with_context(|| format!("failed to parse problem source {}", record.path))?;
    }
    if let Some(record) = &recorded.responses {
        let text = read_recorded(record)?;
        session
            .load_responses(&text)
            .with_context(|| format!("failed to parse response source {}", record.path))?;
    }

    if recorded.responses.is_none() {
        warn!("no response dataset loaded yet; run `trace-review load --responses <path>`");
    }
    if session.problem_index().is_empty() && !session.responses().is_empty() {
        warn!("no problem rows available; responses are shown without problem metadata");
    }

    let stats = session.last_stats();
    debug!(
        problems = session.problem_index().len(),
        responses = session.responses().len(),
        joined_by_position = stats.joined_by_position,
        joined_by_name = stats.joined_by_name,
        unjoined = stats.unjoined,
        "review session ready"
    );

    Ok(session)
}

pub(crate) fn recorded_problem_rows(store: &SqliteStore) -> Result<Vec<ProblemRow>> {
    let Some(record) = store.dataset(PROBLEMS_DATASET)? else {
        return Ok(Vec::new());
    };
    let text = read_recorded(&record)?;
    parse_problem_source(&text)
        .with_context(|| format!("failed to parse problem source {}", record.path))
}

fn read_recorded(record: &DatasetRecord) -> Result<String> {
    let path = Path::new(&record.path);
    let current_hash = sha256_file(path)?;
    if current_hash != record.sha256 {
        warn!(
            path = %path.display(),
            recorded = %record.sha256,
            current = %current_hash,
            "dataset changed since it was loaded"
        );
    }
    read_text(path)
}
