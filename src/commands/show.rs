use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tokio::runtime::Runtime;

use super::context::open_session;
use crate::cli::ShowArgs;
use crate::config::Settings;
use crate::model::{Annotation, CanonicalResponse};
use crate::review::AnnotationView;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShowOutput<'a> {
    response: &'a CanonicalResponse,
    annotation: Option<&'a Annotation>,
    category_name: Option<&'a str>,
}

pub fn run(settings: &Settings, runtime: &Runtime, args: ShowArgs) -> Result<()> {
    let session = open_session(settings, runtime)?;
    let id = args.id.trim();

    let Some(response) = session.response(id) else {
        bail!("no response with id {id}");
    };

    let annotations = session.annotations();
    let annotation = annotations.annotation(id);
    let output = ShowOutput {
        response,
        annotation,
        category_name: annotation
            .and_then(|annotation| annotation.category_id.as_deref())
            .and_then(|category_id| annotations.category(category_id))
            .map(|category| category.name.as_str()),
    };

    let mut writer = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut writer, &output)
        .context("failed to serialize response output")?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
