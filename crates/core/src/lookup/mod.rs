//! Patient lookup: search, classify, match and extract.

pub mod classifier;
pub mod extract;
pub mod matcher;
mod orchestrator;

pub use classifier::{SearchResult, classify};
pub use matcher::{CandidateRow, find_match};
pub use orchestrator::{LookupEngine, LookupReport};
