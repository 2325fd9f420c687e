//! Control-Flow Graph construction
//!
//! Jump targets are stored by name. [`build_cfg`] resolves the names against
//! the blocks of the function, clears every edge set and derives edges from
//! each block's terminator. It is the only writer of block edge sets; re-run
//! it after anything that touches terminators.
//!
//! Unresolved names are tolerated: the target stays `None`, contributes no
//! edge and is listed in the returned [`CfgReport`]. [`build_cfg_strict`]
//! turns them into an error.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{IrError, Result};
use crate::ir::{BlockId, Function};

/// A jump target name that matches no block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedTarget {
    /// Block holding the jump
    pub block: String,
    /// Name that failed to resolve
    pub target: String,
}

/// Outcome of a CFG build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CfgReport {
    pub unresolved: Vec<UnresolvedTarget>,
    /// Number of distinct edges derived
    pub edges: usize,
}

impl CfgReport {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    pub fn into_result(self, function: &str) -> Result<()> {
        if self.unresolved.is_empty() {
            Ok(())
        } else {
            Err(IrError::UnresolvedTargets {
                function: function.to_string(),
                targets: self.unresolved,
            })
        }
    }
}

/// Resolve jump targets and rebuild predecessor/successor sets from scratch
pub fn build_cfg(func: &mut Function) -> CfgReport {
    let mut report = CfgReport::default();
    let function = func.name().to_string();

    // Phase 1: resolve every target name of every control transfer
    let by_name: HashMap<String, BlockId> = func
        .blocks()
        .map(|(id, b)| (b.name().to_string(), id))
        .collect();

    for block in func.block_ids() {
        let block_name = func.block_name(block).to_string();
        let insts = func.block(block).insts().to_vec();
        for id in insts {
            let Some(inst) = func.inst_mut(id) else {
                continue;
            };
            for target in inst.targets_mut() {
                target.block = by_name.get(&target.name).copied();
                if target.block.is_none() {
                    warn!(
                        function = %function,
                        block = %block_name,
                        target = %target.name,
                        "unresolved jump target"
                    );
                    report.unresolved.push(UnresolvedTarget {
                        block: block_name.clone(),
                        target: target.name.clone(),
                    });
                }
            }
        }
    }

    // Phase 2: drop stale edges
    for block in func.block_ids() {
        func.block_mut(block).clear_edges();
    }

    // Phase 3: derive edges from terminators only
    for block in func.block_ids() {
        let succs = func
            .terminator(block)
            .and_then(|t| func.inst(t))
            .map(|inst| inst.successors())
            .unwrap_or_default();
        for succ in succs {
            if func.block_mut(block).succs.insert(succ) {
                report.edges += 1;
            }
            func.block_mut(succ).preds.insert(block);
        }
    }

    debug!(
        function = func.name(),
        edges = report.edges,
        unresolved = report.unresolved.len(),
        "built CFG"
    );
    report
}

/// Like [`build_cfg`], but fails when any target name is unresolved.
/// Edges are still rebuilt before the error is returned.
pub fn build_cfg_strict(func: &mut Function) -> Result<()> {
    let report = build_cfg(func);
    report.into_result(func.name())
}

/// Blocks reachable from the entry, in depth-first preorder
pub fn reachable_blocks(func: &Function) -> Vec<BlockId> {
    let Some(entry) = func.entry() else {
        return Vec::new();
    };

    let mut visited = BTreeSet::new();
    let mut order = Vec::new();
    let mut stack = vec![entry];

    while let Some(block) = stack.pop() {
        if !visited.insert(block) {
            continue;
        }
        order.push(block);
        // Reverse so the first successor is visited first
        for &succ in func.block(block).successors().iter().rev() {
            if !visited.contains(&succ) {
                stack.push(succ);
            }
        }
    }

    order
}

/// Check the edge invariants: successors equal the blocks named by the
/// terminator, and every edge is recorded on both ends. Names are looked up
/// afresh, so a stale or never-built CFG is detected; names matching no
/// block contribute nothing.
pub fn verify_cfg(func: &Function) -> Result<()> {
    for (id, block) in func.blocks() {
        let expected: BTreeSet<BlockId> = func
            .terminator(id)
            .and_then(|t| func.inst(t))
            .map(|inst| {
                inst.targets()
                    .iter()
                    .filter_map(|t| func.block_by_name(&t.name))
                    .collect()
            })
            .unwrap_or_default();
        if &expected != block.successors() {
            return Err(IrError::invalid_cfg(
                func.name(),
                format!("successors of `{}` do not match its terminator", block.name()),
            ));
        }
        for &succ in block.successors() {
            if !func.block(succ).predecessors().contains(&id) {
                return Err(IrError::invalid_cfg(
                    func.name(),
                    format!(
                        "`{}` -> `{}` missing from predecessors of `{}`",
                        block.name(),
                        func.block_name(succ),
                        func.block_name(succ)
                    ),
                ));
            }
        }
        for &pred in block.predecessors() {
            if !func.block(pred).successors().contains(&id) {
                return Err(IrError::invalid_cfg(
                    func.name(),
                    format!(
                        "`{}` lists predecessor `{}` without a matching successor edge",
                        block.name(),
                        func.block_name(pred)
                    ),
                ));
            }
        }
    }
    Ok(())
}
