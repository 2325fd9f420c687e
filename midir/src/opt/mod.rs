//! Optimization passes
//!
//! Passes are block-local rewrites of the instruction stream. Uses of a
//! rewritten instruction are redirected across the whole function, so no
//! operand is ever left pointing at a removed instruction. Passes never touch
//! terminators, but the pipeline can rebuild the CFG of changed functions.

mod constant_fold;
mod peephole;

pub use constant_fold::{ConstantFolding, fold_binop, fold_block};
pub use peephole::{Peephole, optimize_block};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cfg::build_cfg;
use crate::config::OptConfig;
use crate::ir::{Function, Program};

/// Optimization pass trait
pub trait OptimizationPass {
    /// Name of the optimization pass
    fn name(&self) -> &'static str;

    /// Run the optimization pass on a function
    /// Returns true if any changes were made
    fn run_on_function(&self, func: &mut Function) -> bool;
}

/// Fold constant `mul`/`shr`/`shl`/`and` in every block of `func`
pub fn run_constant_folding(func: &mut Function) -> bool {
    ConstantFolding.run_on_function(func)
}

/// Apply peephole rewrites to every block of `func`
pub fn run_peephole(func: &mut Function) -> bool {
    Peephole.run_on_function(func)
}

/// Optimization pipeline
pub struct OptimizationPipeline {
    passes: Vec<Box<dyn OptimizationPass>>,
    max_iterations: usize,
    rebuild_cfg: bool,
}

impl OptimizationPipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            max_iterations: 10,
            rebuild_cfg: true,
        }
    }

    /// Create pipeline for the given optimization level
    pub fn for_level(level: OptLevel) -> Self {
        let mut pipeline = Self::new();

        match level {
            OptLevel::Debug => {
                // No optimizations in debug mode
            }
            OptLevel::Release => {
                // Identities first, then folding
                pipeline.add_pass(Box::new(Peephole));
                pipeline.add_pass(Box::new(ConstantFolding));
            }
        }

        pipeline
    }

    /// Create pipeline from the `[opt]` configuration section
    pub fn from_config(config: &OptConfig) -> Self {
        let mut pipeline = Self::for_level(config.level);
        pipeline.set_max_iterations(config.max_iterations);
        pipeline.set_rebuild_cfg(config.rebuild_cfg);
        pipeline
    }

    /// Add an optimization pass
    pub fn add_pass(&mut self, pass: Box<dyn OptimizationPass>) {
        self.passes.push(pass);
    }

    /// Set maximum iterations for fixed-point optimization (at least one)
    pub fn set_max_iterations(&mut self, n: usize) {
        self.max_iterations = n.max(1);
    }

    /// Rebuild the CFG of every function a pass changed
    pub fn set_rebuild_cfg(&mut self, rebuild: bool) {
        self.rebuild_cfg = rebuild;
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run all passes on a program
    pub fn optimize(&self, program: &mut Program) -> OptimizationStats {
        let mut stats = OptimizationStats::new();

        for func in program.functions_mut() {
            let func_stats = self.optimize_function(func);
            stats.merge(&func_stats);
        }

        info!(
            iterations = stats.iterations,
            rewrites = stats.total(),
            "optimized program"
        );
        stats
    }

    /// Run all passes on a single function until fixed point
    pub fn optimize_function(&self, func: &mut Function) -> OptimizationStats {
        let mut stats = OptimizationStats::new();
        if self.passes.is_empty() {
            return stats;
        }

        let mut iteration = 0;
        let mut any_change = false;

        loop {
            let mut changed = false;
            iteration += 1;

            for pass in &self.passes {
                if pass.run_on_function(func) {
                    changed = true;
                    stats.record_pass(pass.name());
                }
            }

            any_change |= changed;
            if !changed || iteration >= self.max_iterations {
                break;
            }
        }

        if any_change && self.rebuild_cfg {
            build_cfg(func);
        }

        debug!(
            function = func.name(),
            iterations = iteration,
            changed = any_change,
            "optimized function"
        );
        stats.iterations = iteration;
        stats
    }
}

impl Default for OptimizationPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Optimization level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptLevel {
    #[default]
    Debug,
    Release,
}

/// Statistics from optimization passes
#[derive(Debug, Default)]
pub struct OptimizationStats {
    /// Number of iterations run (the largest over merged functions)
    pub iterations: usize,
    /// Pass execution counts
    pub pass_counts: HashMap<String, usize>,
}

impl OptimizationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pass(&mut self, name: &str) {
        *self.pass_counts.entry(name.to_string()).or_insert(0) += 1;
    }

    pub fn merge(&mut self, other: &OptimizationStats) {
        self.iterations = self.iterations.max(other.iterations);
        for (name, count) in &other.pass_counts {
            *self.pass_counts.entry(name.clone()).or_insert(0) += count;
        }
    }

    /// Number of pass runs that changed something
    pub fn total(&self) -> usize {
        self.pass_counts.values().sum()
    }

    pub fn count(&self, pass: &str) -> usize {
        self.pass_counts.get(pass).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinOp, InstKind};

    /// `x * (4 * 0)` then `(4 and 1)` folded away
    fn mixed() -> Function {
        let mut func = Function::new("mixed");
        let x = func.add_param("x");
        let entry = func.add_block("entry").unwrap();
        let four = func.add_constant(4, "4");
        let zero = func.add_constant(0, "0");
        let one = func.add_constant(1, "1");
        let a = func.binary(entry, BinOp::Mul, four, zero).unwrap();
        let b = func.binary(entry, BinOp::And, four, one).unwrap();
        let c = func.binary(entry, BinOp::Mul, x, a).unwrap();
        let d = func.binary(entry, BinOp::Add, c, b).unwrap();
        func.ret(entry, Some(d)).unwrap();
        func
    }

    #[test]
    fn test_debug_level_has_no_passes() {
        let pipeline = OptimizationPipeline::for_level(OptLevel::Debug);
        assert!(pipeline.pass_names().is_empty());

        let mut func = mixed();
        let stats = pipeline.optimize_function(&mut func);
        assert_eq!(stats.total(), 0);
        assert_eq!(func.count_insts(InstKind::Mul), 2);
    }

    #[test]
    fn test_release_pass_order() {
        let pipeline = OptimizationPipeline::for_level(OptLevel::Release);
        assert_eq!(pipeline.pass_names(), ["peephole", "constant_folding"]);
    }

    #[test]
    fn test_release_reaches_fixpoint() {
        let pipeline = OptimizationPipeline::for_level(OptLevel::Release);
        let mut func = mixed();
        let stats = pipeline.optimize_function(&mut func);

        // Only the add survives, with both operands folded to zero
        assert_eq!(func.count_insts(InstKind::Mul), 0);
        assert_eq!(func.count_insts(InstKind::And), 0);
        assert_eq!(func.count_insts(InstKind::Add), 1);
        assert!(stats.count("peephole") >= 1);
        assert!(stats.count("constant_folding") >= 1);
        // The final iteration observed no change
        assert!(stats.iterations >= 2);

        let again = pipeline.optimize_function(&mut func);
        assert_eq!(again.total(), 0);
        assert_eq!(again.iterations, 1);
    }

    #[test]
    fn test_max_iterations_bounds_the_loop() {
        let mut pipeline = OptimizationPipeline::for_level(OptLevel::Release);
        pipeline.set_max_iterations(1);
        let mut func = mixed();
        let stats = pipeline.optimize_function(&mut func);
        assert_eq!(stats.iterations, 1);
    }

    #[test]
    fn test_zero_max_iterations_still_runs_once() {
        let mut pipeline = OptimizationPipeline::for_level(OptLevel::Release);
        pipeline.set_max_iterations(0);
        let mut func = mixed();
        assert_eq!(pipeline.optimize_function(&mut func).iterations, 1);
    }

    #[test]
    fn test_stats_merge() {
        let mut a = OptimizationStats::new();
        a.record_pass("peephole");
        a.iterations = 2;
        let mut b = OptimizationStats::new();
        b.record_pass("peephole");
        b.record_pass("constant_folding");
        b.iterations = 3;

        a.merge(&b);
        assert_eq!(a.count("peephole"), 2);
        assert_eq!(a.count("constant_folding"), 1);
        assert_eq!(a.total(), 3);
        assert_eq!(a.iterations, 3);
    }

    #[test]
    fn test_free_functions() {
        let mut func = mixed();
        assert!(run_peephole(&mut func));
        assert!(run_constant_folding(&mut func));
        assert!(!run_peephole(&mut func));
        assert!(!run_constant_folding(&mut func));
    }

    #[test]
    fn test_opt_level_names() {
        assert_eq!(
            serde_json::to_string(&OptLevel::Release).unwrap(),
            "\"release\""
        );
        let level: OptLevel = serde_json::from_str("\"debug\"").unwrap();
        assert_eq!(level, OptLevel::Debug);
    }
}
