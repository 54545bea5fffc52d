use anyhow::{Context, Result, bail};
use serde_json::Value;
use tokio::runtime::Runtime;
use tracing::info;

use super::context::open_annotations;
use crate::cli::{ExportArgs, ImportArgs};
use crate::config::Settings;
use crate::util::{read_text, write_json_pretty};

pub fn run(settings: &Settings, runtime: &Runtime, args: ExportArgs) -> Result<()> {
    let store = open_annotations(settings, runtime)?;
    let payload = store.export();

    write_json_pretty(&args.out, &payload)?;
    info!(
        path = %args.out.display(),
        categories = payload.state.categories.len(),
        annotations = payload.state.annotations.len(),
        "exported annotation state"
    );
    Ok(())
}

pub fn import(settings: &Settings, runtime: &Runtime, args: ImportArgs) -> Result<()> {
    let text = read_text(&args.source)?;
    let payload: Value = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {}", args.source.display()))?;
    if !payload.is_object() {
        bail!("import payload must be a JSON object: {}", args.source.display());
    }

    let mut store = open_annotations(settings, runtime)?;
    let outcome = store.import(&payload);
    if !outcome.categories_replaced && !outcome.annotations_replaced {
        bail!(
            "nothing imported from {}: neither categories nor annotations were well-formed",
            args.source.display()
        );
    }

    runtime.block_on(store.flush());
    Ok(())
}
