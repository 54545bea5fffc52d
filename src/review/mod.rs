mod annotations;
mod dataset;
mod fields;
mod metrics;
mod normalize;
mod problem_index;
mod query;
mod session;
mod tags;

pub use annotations::{AnnotationStore, AnnotationView};
pub use dataset::{parse_problem_source, parse_response_source};
pub use metrics::{ConfusionCounts, MetricsReport, summarize};
pub use normalize::normalize;
pub use problem_index::ProblemIndex;
pub use query::ResultPage;
pub use session::ReviewSession;
