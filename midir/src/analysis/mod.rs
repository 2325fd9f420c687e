//! Control-flow analyses
//!
//! Both analyses read the edge sets left by [`crate::cfg::build_cfg`] and
//! return owned values holding block handles. Any IR mutation invalidates
//! them.

pub mod dominators;
pub mod loops;

pub use dominators::{DominatorMap, compute_dominators};
pub use loops::{
    Loop, LoopForest, LoopId, LoopSummary, find_loops, find_loops_with, format_loops,
    summarize_loops,
};
