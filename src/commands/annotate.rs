use anyhow::Result;
use tokio::runtime::Runtime;
use tracing::{info, warn};

use super::context::open_session;
use crate::cli::{AnnotateArgs, ToggleSubmittedArgs};
use crate::config::Settings;
use crate::model::AnnotationPatch;
use crate::review::ReviewSession;

pub fn run(settings: &Settings, runtime: &Runtime, args: AnnotateArgs) -> Result<()> {
    let mut session = open_session(settings, runtime)?;
    let id = args.id.trim();
    warn_if_unknown(&session, id);

    let annotation = session.annotations_mut().upsert_annotation(
        id,
        AnnotationPatch {
            description: args.description,
            category_id: args.category,
        },
    )?;
    info!(
        response_id = %id,
        category_id = %annotation.category_id.as_deref().unwrap_or(""),
        description_chars = annotation.description.chars().count(),
        "annotation saved"
    );

    runtime.block_on(session.annotations_mut().flush());
    Ok(())
}

pub fn toggle_submitted(
    settings: &Settings,
    runtime: &Runtime,
    args: ToggleSubmittedArgs,
) -> Result<()> {
    let mut session = open_session(settings, runtime)?;
    let id = args.id.trim();
    warn_if_unknown(&session, id);

    let submitted = session.annotations_mut().toggle_submitted(id);
    println!("{}", if submitted { "submitted" } else { "unsubmitted" });

    runtime.block_on(session.annotations_mut().flush());
    Ok(())
}

// Annotations are keyed by id only, so ids absent from the current dataset
// are still accepted.
fn warn_if_unknown(session: &ReviewSession, id: &str) {
    if session.response(id).is_none() {
        warn!(response_id = %id, "response id not present in the loaded dataset");
    }
}
