use std::collections::BTreeMap;
use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::runtime::Runtime;
use tracing::info;

use super::context::open_session;
use crate::cli::SummaryArgs;
use crate::config::Settings;
use crate::review::{ConfusionCounts, MetricsReport, summarize};

#[derive(Debug, Serialize)]
struct SummaryOutput {
    responses: usize,
    counted: usize,
    backfilled: usize,
    skipped: usize,
    by_type: BTreeMap<String, MetricsReport>,
    overall: MetricsReport,
}

pub fn run(settings: &Settings, runtime: &Runtime, args: SummaryArgs) -> Result<()> {
    let session = open_session(settings, runtime)?;
    let responses = session.responses();
    let summary = summarize(responses);

    info!(
        responses = responses.len(),
        counted = summary.counted,
        backfilled = summary.backfilled,
        skipped = summary.skipped,
        "performance summary computed"
    );

    if args.json {
        let output = SummaryOutput {
            responses: responses.len(),
            counted: summary.counted,
            backfilled: summary.backfilled,
            skipped: summary.skipped,
            by_type: summary
                .by_type
                .iter()
                .map(|(response_type, counts)| (response_type.clone(), counts.report()))
                .collect(),
            overall: summary.overall.report(),
        };
        let mut writer = io::BufWriter::new(io::stdout().lock());
        serde_json::to_writer_pretty(&mut writer, &output)
            .context("failed to serialize summary json output")?;
        writeln!(writer)?;
        writer.flush()?;
        return Ok(());
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(
        output,
        "Responses: {} (counted={} backfilled={} skipped={})",
        responses.len(),
        summary.counted,
        summary.backfilled,
        summary.skipped
    )?;
    for (response_type, counts) in &summary.by_type {
        let label = if response_type.is_empty() {
            "(untyped)"
        } else {
            response_type.as_str()
        };
        write_block(&mut output, label, counts)?;
    }
    write_block(&mut output, "overall", &summary.overall)?;
    output.flush()?;
    Ok(())
}

fn write_block(output: &mut impl Write, label: &str, counts: &ConfusionCounts) -> Result<()> {
    writeln!(output)?;
    writeln!(output, "=== {label} ===")?;
    writeln!(output, "Accuracy: {:.3}", counts.accuracy())?;
    writeln!(output, "Precision: {:.3}", counts.precision())?;
    writeln!(output, "Recall: {:.3}", counts.recall())?;
    writeln!(output, "F1 Score: {:.3}", counts.f1())?;
    writeln!(output, "Specificity: {:.3}", counts.specificity())?;
    writeln!(output, "Total Samples: {}", counts.total())?;
    writeln!(
        output,
        "TP={} FP={} FN={} TN={}",
        counts.true_positives, counts.false_positives, counts.false_negatives, counts.true_negatives
    )?;
    Ok(())
}
