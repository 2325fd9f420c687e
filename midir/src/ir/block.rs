//! Basic Blocks
//!
//! A basic block is an ordered list of instruction handles plus the edge
//! sets derived by the CFG builder. Edge sets are only written by
//! [`crate::cfg::build_cfg`].

use std::collections::BTreeSet;

use super::{BlockId, InstId};

/// A basic block: straight-line instructions, the last of which may be a
/// terminator
#[derive(Debug, Clone)]
pub struct BasicBlock {
    /// Block name (unique within its function)
    pub(crate) name: String,
    /// Instructions in program order
    pub(crate) insts: Vec<InstId>,
    pub(crate) preds: BTreeSet<BlockId>,
    pub(crate) succs: BTreeSet<BlockId>,
}

impl BasicBlock {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            insts: Vec::new(),
            preds: BTreeSet::new(),
            succs: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn insts(&self) -> &[InstId] {
        &self.insts
    }

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    /// Last instruction of the block, terminator or not
    pub fn last_inst(&self) -> Option<InstId> {
        self.insts.last().copied()
    }

    pub fn predecessors(&self) -> &BTreeSet<BlockId> {
        &self.preds
    }

    pub fn successors(&self) -> &BTreeSet<BlockId> {
        &self.succs
    }

    pub(crate) fn clear_edges(&mut self) {
        self.preds.clear();
        self.succs.clear();
    }

    pub(crate) fn position_of(&self, inst: InstId) -> Option<usize> {
        self.insts.iter().position(|&i| i == inst)
    }
}
