//! midir Library
//!
//! Compiler middle-end: an arena-based IR of functions, basic blocks and
//! instructions, with CFG construction, dominator and natural-loop analysis,
//! and block-local constant folding and peephole passes.

pub mod analysis;
pub mod cfg;
pub mod config;
pub mod error;
pub mod ir;
pub mod opt;
pub mod samples;

pub use analysis::{DominatorMap, LoopForest, compute_dominators, find_loops};
pub use cfg::{CfgReport, build_cfg, build_cfg_strict};
pub use config::Config;
pub use error::{IrError, Result};
pub use ir::{BlockId, Function, InstId, Instruction, Program, Value};
pub use opt::{OptLevel, OptimizationPipeline, run_constant_folding, run_peephole};
