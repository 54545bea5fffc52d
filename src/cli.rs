use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "trace-review",
    version,
    about = "Reconcile generated responses with problem metadata and annotate them"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    #[arg(
        long,
        global = true,
        env = "TRACE_REVIEW_CACHE_ROOT",
        default_value = ".cache/trace-review"
    )]
    pub cache_root: PathBuf,

    #[arg(long, global = true, env = "TRACE_REVIEW_DB_PATH")]
    pub db_path: Option<PathBuf>,

    #[arg(long, global = true, env = "TRACE_REVIEW_REMOTE_URL")]
    pub remote_url: Option<String>,

    #[arg(
        long,
        global = true,
        env = "TRACE_REVIEW_SYNC_DEBOUNCE_MS",
        default_value_t = 800
    )]
    pub sync_debounce_ms: u64,

    #[arg(
        long,
        global = true,
        env = "TRACE_REVIEW_REMOTE_TIMEOUT_MS",
        default_value_t = 3000
    )]
    pub remote_timeout_ms: u64,

    #[arg(long, global = true, env = "TRACE_REVIEW_PAGE_SIZE", default_value_t = 25)]
    pub page_size: usize,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Load(LoadArgs),
    Query(QueryArgs),
    Show(ShowArgs),
    #[command(subcommand)]
    Category(CategoryCommand),
    Annotate(AnnotateArgs),
    ToggleSubmitted(ToggleSubmittedArgs),
    Export(ExportArgs),
    Import(ImportArgs),
    Summary(SummaryArgs),
    Status,
}

#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    #[arg(long)]
    pub problems: Option<PathBuf>,

    #[arg(long)]
    pub responses: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[arg(long, default_value = "")]
    pub difficulty: String,

    #[arg(long = "type", default_value = "")]
    pub response_type: String,

    /// Category id, or `uncategorized` for responses without one.
    #[arg(long, default_value = "")]
    pub category: String,

    #[arg(long, default_value = "")]
    pub search: String,

    #[arg(long, default_value_t = false)]
    pub show_submitted: bool,

    #[arg(long, default_value_t = 1)]
    pub page: usize,

    #[arg(long)]
    pub page_size: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    #[arg(long)]
    pub id: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CategoryCommand {
    List,
    Add {
        #[arg(long)]
        name: String,
    },
    Rename {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
    },
    Delete {
        #[arg(long)]
        id: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct AnnotateArgs {
    #[arg(long)]
    pub id: String,

    #[arg(long)]
    pub description: Option<String>,

    /// Category id; pass an empty value to clear the assignment.
    #[arg(long)]
    pub category: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ToggleSubmittedArgs {
    #[arg(long)]
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    #[arg(long = "from")]
    pub source: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct SummaryArgs {
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
