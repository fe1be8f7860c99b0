//! Programme filtering: text analysis, rating checks, and cross-run
//! deduplication of EPG programmes.

pub mod analyze;
pub mod dedup;
pub mod error;
pub mod pipeline;
pub mod source;

pub use analyze::{extract_created_year, extract_episode_info};
pub use dedup::{DedupStore, Fingerprint, RecordedMatch};
pub use error::FilterError;
pub use pipeline::{FilterCriteria, FilterPipeline, RunStats};
pub use source::json_lines;
