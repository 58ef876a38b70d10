// src/feed/mod.rs
//! Feed data model plus the pure pieces of the fetch cycle: text cleanup and merging.

pub mod merge;
pub mod normalize;
pub mod types;

pub use merge::{merge_results, MergeStats, DEFAULT_CAPACITY};
pub use types::{
    FactCheck, FactCheckStatus, Location, ResultItem, SearchState, SessionSnapshot,
};
