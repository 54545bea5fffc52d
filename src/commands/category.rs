use std::io::{self, Write};

use anyhow::{Result, bail};
use tokio::runtime::Runtime;
use tracing::warn;

use super::context::open_annotations;
use crate::cli::CategoryCommand;
use crate::config::Settings;

pub fn run(settings: &Settings, runtime: &Runtime, command: CategoryCommand) -> Result<()> {
    let mut store = open_annotations(settings, runtime)?;

    match command {
        CategoryCommand::List => {
            let mut output = io::BufWriter::new(io::stdout().lock());
            for category in store.categories() {
                let assigned = store
                    .annotations()
                    .values()
                    .filter(|annotation| annotation.category_id.as_deref() == Some(category.id.as_str()))
                    .count();
                writeln!(output, "{}\t{}\t{} assigned", category.id, category.name, assigned)?;
            }
            output.flush()?;
            return Ok(());
        }
        CategoryCommand::Add { name } => {
            let category = store.create_category(&name)?;
            println!("{}", category.id);
        }
        CategoryCommand::Rename { id, name } => {
            if name.trim().is_empty() {
                warn!(category_id = %id, "blank category name ignored");
            } else if !store.rename_category(&id, &name) {
                bail!("unknown category: {id}");
            }
        }
        CategoryCommand::Delete { id } => {
            if !store.delete_category(&id) {
                bail!("unknown category: {id}");
            }
        }
    }

    runtime.block_on(store.flush());
    Ok(())
}
