use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::runtime::Runtime;
use tracing::info;

use super::context::open_session;
use crate::cli::QueryArgs;
use crate::config::Settings;
use crate::model::{CanonicalResponse, CategoryFilter, Filters};
use crate::review::{AnnotationStore, AnnotationView, ResultPage};

#[derive(Debug, Serialize)]
struct QueryItem<'a> {
    id: &'a str,
    problem_id: &'a str,
    problem_name: &'a str,
    #[serde(rename = "type")]
    response_type: &'a str,
    model: &'a str,
    difficulty: &'a str,
    category: Option<&'a str>,
    description: &'a str,
    submitted_at: Option<String>,
    joined: bool,
}

#[derive(Debug, Serialize)]
struct QueryOutput<'a> {
    total: usize,
    page: usize,
    page_size: usize,
    page_count: usize,
    returned: usize,
    difficulty_options: Vec<&'a str>,
    type_options: Vec<&'a str>,
    items: Vec<QueryItem<'a>>,
}

pub fn run(settings: &Settings, runtime: &Runtime, args: QueryArgs) -> Result<()> {
    let mut session = open_session(settings, runtime)?;

    session.set_filters(Filters {
        difficulty: args.difficulty.trim().to_string(),
        response_type: args.response_type.trim().to_string(),
        category: CategoryFilter::from_raw(&args.category),
        search: args.search.clone(),
        show_submitted: args.show_submitted,
    });
    if let Some(size) = args.page_size {
        session.set_page_size(size);
    }
    session.set_page(args.page);

    let page = session.current_page();
    info!(
        total = page.total,
        page = page.page,
        page_count = page.page_count,
        returned = page.items.len(),
        "query completed"
    );

    let annotations = session.annotations();
    let items = page
        .items
        .iter()
        .map(|response| to_item(response, annotations))
        .collect::<Vec<_>>();

    if args.json {
        let output = QueryOutput {
            total: page.total,
            page: page.page,
            page_size: page.size,
            page_count: page.page_count,
            returned: items.len(),
            difficulty_options: session.difficulty_options(),
            type_options: session.type_options(),
            items,
        };
        write_json(&output)
    } else {
        write_text(&page, &items)
    }
}

fn to_item<'a>(response: &'a CanonicalResponse, annotations: &'a AnnotationStore) -> QueryItem<'a> {
    let annotation = annotations.annotation(&response.id);
    let category = annotation
        .and_then(|annotation| annotation.category_id.as_deref())
        .and_then(|id| annotations.category(id))
        .map(|category| category.name.as_str());

    QueryItem {
        id: &response.id,
        problem_id: &response.problem_id,
        problem_name: &response.problem_name,
        response_type: &response.response_type,
        model: &response.model,
        difficulty: &response.difficulty,
        category,
        description: annotation
            .map(|annotation| annotation.description.as_str())
            .unwrap_or_default(),
        submitted_at: annotation
            .and_then(|annotation| annotation.submitted_at)
            .map(|ts| ts.to_rfc3339()),
        joined: response.problem_snapshot.is_some(),
    }
}

fn write_json<T: Serialize>(output: &T) -> Result<()> {
    let mut writer = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut writer, output)
        .context("failed to serialize query json output")?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

fn write_text(page: &ResultPage<'_>, items: &[QueryItem<'_>]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(
        output,
        "Results: {} total, page {}/{} ({} per page)",
        page.total, page.page, page.page_count, page.size
    )?;

    for item in items {
        let problem = if item.problem_name.is_empty() {
            "(unknown problem)"
        } else {
            item.problem_name
        };
        writeln!(
            output,
            "{}\t#{} {}\t{}\t{}\t{}",
            item.id,
            item.problem_id,
            problem,
            item.response_type,
            item.model,
            item.difficulty
        )?;
        if let Some(category) = item.category {
            writeln!(output, "\tcategory: {category}")?;
        }
        if !item.description.is_empty() {
            writeln!(output, "\tnote: {}", item.description)?;
        }
        if let Some(submitted_at) = &item.submitted_at {
            writeln!(output, "\tsubmitted: {submitted_at}")?;
        }
    }

    output.flush()?;
    Ok(())
}
