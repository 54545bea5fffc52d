pub mod annotate;
pub mod category;
mod context;
pub mod export;
pub mod load;
pub mod query;
pub mod show;
pub mod status;
pub mod summary;
