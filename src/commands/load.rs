use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::info;

use super::context::{PROBLEMS_DATASET, RESPONSES_DATASET, recorded_problem_rows};
use crate::cli::LoadArgs;
use crate::config::Settings;
use crate::persistence::{DatasetRecord, SqliteStore};
use crate::review::{ProblemIndex, normalize, parse_problem_source, parse_response_source};
use crate::util::{now_utc_string, read_text, sha256_file};

pub fn run(settings: &Settings, args: LoadArgs) -> Result<()> {
    if args.problems.is_none() && args.responses.is_none() {
        bail!("nothing to load: pass --problems and/or --responses");
    }

    let store = SqliteStore::open(&settings.db_path)?;

    // Parse everything before recording anything so a bad file leaves the
    // previously loaded datasets in place.
    let problems = match &args.problems {
        Some(path) => {
            let text = read_text(path)?;
            let rows = parse_problem_source(&text)
                .with_context(|| format!("failed to parse problem source {}", path.display()))?;
            Some((path, rows))
        }
        None => None,
    };
    let responses = match &args.responses {
        Some(path) => {
            let text = read_text(path)?;
            let records = parse_response_source(&text)
                .with_context(|| format!("failed to parse response source {}", path.display()))?;
            Some((path, records))
        }
        None => None,
    };

    // Resolve every record before writing any, so a failure here leaves the
    // metadata untouched.
    let problems_record = match &problems {
        Some((path, rows)) => Some(dataset_record(path, rows.len())?),
        None => None,
    };
    let responses_record = match &responses {
        Some((path, records)) => Some(dataset_record(path, records.len())?),
        None => None,
    };

    let rows = match &problems {
        Some((_, rows)) => rows.clone(),
        None => recorded_problem_rows(&store)?,
    };
    let index = ProblemIndex::build(rows);

    let mut to_record = Vec::new();
    if let Some(record) = &problems_record {
        to_record.push((PROBLEMS_DATASET, record));
    }
    if let Some(record) = &responses_record {
        to_record.push((RESPONSES_DATASET, record));
    }
    store.record_datasets(&to_record)?;

    if let Some(record) = &problems_record {
        info!(
            path = %record.path,
            problems = record.record_count,
            difficulties = %index.difficulties().collect::<Vec<_>>().join(","),
            "loaded problem source"
        );
    }

    if let (Some(record), Some((_, records))) = (&responses_record, &responses) {
        let batch = normalize(records, &index);
        info!(
            path = %record.path,
            responses = batch.responses.len(),
            types = %batch.types.iter().cloned().collect::<Vec<_>>().join(","),
            joined_by_position = batch.stats.joined_by_position,
            joined_by_name = batch.stats.joined_by_name,
            unjoined = batch.stats.unjoined,
            generated_ids = batch.stats.generated_ids,
            "loaded response source"
        );
    }

    Ok(())
}

fn dataset_record(path: &Path, record_count: usize) -> Result<DatasetRecord> {
    let absolute = path
        .canonicalize()
        .with_context(|| format!("failed to resolve {}", path.display()))?;
    Ok(DatasetRecord {
        path: absolute.display().to_string(),
        sha256: sha256_file(&absolute)?,
        record_count,
        loaded_at: now_utc_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;

    struct Workspace {
        root: PathBuf,
        settings: Settings,
    }

    impl Workspace {
        fn new() -> Self {
            let root = std::env::temp_dir()
                .join(format!("trace-review-load-{}", uuid::Uuid::new_v4().simple()));
            fs::create_dir_all(&root).expect("create workspace");
            let settings = Settings {
                cache_root: root.clone(),
                db_path: root.join("review.sqlite"),
                remote_url: None,
                sync_debounce: Duration::from_millis(800),
                remote_timeout: Duration::from_millis(3000),
                page_size: 25,
            };
            Self { root, settings }
        }

        fn file(&self, name: &str, contents: &str) -> PathBuf {
            let path = self.root.join(name);
            fs::write(&path, contents).expect("write fixture");
            path
        }

        fn store(&self) -> SqliteStore {
            SqliteStore::open(&self.settings.db_path).expect("open store")
        }
    }

    impl Drop for Workspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.root);
        }
    }

    #[test]
    fn records_both_datasets() {
        let workspace = Workspace::new();
        let problems = workspace.file("problems.json", r#"[{"name": "fib", "difficulty": "EASY"}]"#);
        let responses = workspace.file(
            "responses.jsonl",
            "{\"id\": \"a\", \"problem_name\": \"fib\"}\n{\"id\": \"b\"}\n",
        );

        run(
            &workspace.settings,
            LoadArgs {
                problems: Some(problems),
                responses: Some(responses),
            },
        )
        .expect("load succeeds");

        let store = workspace.store();
        let problems = store.dataset(PROBLEMS_DATASET).expect("read").expect("recorded");
        let responses = store.dataset(RESPONSES_DATASET).expect("read").expect("recorded");
        assert_eq!(problems.record_count, 1);
        assert_eq!(responses.record_count, 2);
        assert_eq!(problems.sha256.len(), 64);
    }

    #[test]
    fn bad_response_file_records_nothing() {
        let workspace = Workspace::new();
        let problems = workspace.file("problems.json", r#"[{"name": "fib"}]"#);
        let broken = workspace.file("responses.jsonl", "{\"id\": \"a\"}\n{oops\n");

        let result = run(
            &workspace.settings,
            LoadArgs {
                problems: Some(problems.clone()),
                responses: Some(broken),
            },
        );
        assert!(result.is_err());

        let missing = run(
            &workspace.settings,
            LoadArgs {
                problems: Some(problems),
                responses: Some(workspace.root.join("absent.jsonl")),
            },
        );
        assert!(missing.is_err());

        let store = workspace.store();
        assert_eq!(store.dataset(PROBLEMS_DATASET).expect("read"), None);
        assert_eq!(store.dataset(RESPONSES_DATASET).expect("read"), None);
    }
}
