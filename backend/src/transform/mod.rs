//! Row-to-case transformation.
//!
//! - Grouper: dedup by transaction id, then cluster rows into case groups
//! - Allocator: monotonic ids and reference numbers
//! - Synthesizer: one case per group
//! - Pipeline: end-to-end import against a store

pub mod allocator;
pub mod grouper;
pub mod pipeline;
pub mod synthesizer;

pub use allocator::{IdAllocator, Watermark};
pub use grouper::{dedup_rows, group_rows, CaseGroup, GroupKey, SkippedRow};
pub use pipeline::*;
pub use synthesizer::{synthesize_case, synthesize_cases};
