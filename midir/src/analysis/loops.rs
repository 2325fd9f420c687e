//! Natural loop discovery
//!
//! Every CFG edge `latch -> header` where the header dominates the latch is a
//! back edge and yields one [`Loop`]. Several loops may share a header.
//!
//! - Body: backward walk over predecessors starting at the latch. The header
//!   is part of the body but never expanded; unreachable predecessors are
//!   skipped.
//! - Exits: members with at least one successor outside the body.
//! - Nesting: the parent of a loop is the smallest other loop whose body is a
//!   strict superset of its own (lowest discovery index on ties). Depth is the
//!   number of parent links up to a root.
//!
//! Loops are numbered in discovery order: blocks in function order, and for
//! each block its successors in block order.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use super::dominators::{DominatorMap, compute_dominators};
use crate::ir::{BlockId, Function};

/// Index of a loop in its [`LoopForest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoopId(pub u32);

impl LoopId {
    pub fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for LoopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loop{}", self.0)
    }
}

/// A natural loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loop {
    header: BlockId,
    latch: BlockId,
    blocks: BTreeSet<BlockId>,
    exits: BTreeSet<BlockId>,
    parent: Option<LoopId>,
    children: Vec<LoopId>,
    depth: usize,
}

impl Loop {
    pub fn header(&self) -> BlockId {
        self.header
    }

    /// Source of the back edge
    pub fn latch(&self) -> BlockId {
        self.latch
    }

    /// Member blocks, header included
    pub fn blocks(&self) -> &BTreeSet<BlockId> {
        &self.blocks
    }

    /// Members with an edge leaving the loop
    pub fn exits(&self) -> &BTreeSet<BlockId> {
        &self.exits
    }

    pub fn parent(&self) -> Option<LoopId> {
        self.parent
    }

    pub fn children(&self) -> &[LoopId] {
        &self.children
    }

    /// 0 for outermost loops
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn contains(&self, block: BlockId) -> bool {
        self.blocks.contains(&block)
    }

    pub fn is_innermost(&self) -> bool {
        self.children.is_empty()
    }
}

/// All loops of a function with their nesting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopForest {
    loops: Vec<Loop>,
}

impl LoopForest {
    pub fn len(&self) -> usize {
        self.loops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    pub fn get(&self, id: LoopId) -> Option<&Loop> {
        self.loops.get(id.index())
    }

    /// Loops in discovery order
    pub fn iter(&self) -> impl Iterator<Item = (LoopId, &Loop)> {
        self.loops
            .iter()
            .enumerate()
            .map(|(i, l)| (LoopId::new(i), l))
    }

    /// Outermost loops in discovery order
    pub fn roots(&self) -> Vec<LoopId> {
        self.iter()
            .filter(|(_, l)| l.parent.is_none())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn loops_with_header(&self, header: BlockId) -> Vec<LoopId> {
        self.iter()
            .filter(|(_, l)| l.header == header)
            .map(|(id, _)| id)
            .collect()
    }

    /// Deepest loop containing `block`; the smaller body wins between loops of
    /// equal depth, then the earlier one.
    pub fn innermost_loop_containing(&self, block: BlockId) -> Option<LoopId> {
        self.iter()
            .filter(|(_, l)| l.contains(block))
            .min_by_key(|(id, l)| (std::cmp::Reverse(l.depth), l.blocks.len(), *id))
            .map(|(id, _)| id)
    }
}

/// Find the natural loops of `func`. The CFG must be built.
pub fn find_loops(func: &Function) -> LoopForest {
    let doms = compute_dominators(func);
    find_loops_with(func, &doms)
}

/// Like [`find_loops`] with precomputed dominators
pub fn find_loops_with(func: &Function, doms: &DominatorMap) -> LoopForest {
    let mut loops = Vec::new();

    for (latch, block) in func.blocks() {
        for &header in block.successors() {
            if doms.dominates(header, latch) {
                loops.push(discover_loop(func, doms, header, latch));
            }
        }
    }

    link_parents(&mut loops);

    debug!(function = func.name(), loops = loops.len(), "found loops");
    LoopForest { loops }
}

fn discover_loop(func: &Function, doms: &DominatorMap, header: BlockId, latch: BlockId) -> Loop {
    let mut blocks = BTreeSet::from([header]);
    let mut worklist = vec![latch];

    while let Some(current) = worklist.pop() {
        if !blocks.insert(current) {
            continue;
        }
        for &pred in func.block(current).predecessors() {
            if !blocks.contains(&pred) && doms.is_reachable(pred) {
                worklist.push(pred);
            }
        }
    }

    let exits = blocks
        .iter()
        .copied()
        .filter(|&b| {
            func.block(b)
                .successors()
                .iter()
                .any(|succ| !blocks.contains(succ))
        })
        .collect();

    Loop {
        header,
        latch,
        blocks,
        exits,
        parent: None,
        children: Vec::new(),
        depth: 0,
    }
}

fn link_parents(loops: &mut [Loop]) {
    let parents: Vec<Option<LoopId>> = (0..loops.len())
        .map(|i| {
            let inner = &loops[i].blocks;
            loops
                .iter()
                .enumerate()
                .filter(|&(j, outer)| {
                    j != i && outer.blocks.len() > inner.len() && outer.blocks.is_superset(inner)
                })
                .min_by_key(|&(j, outer)| (outer.blocks.len(), j))
                .map(|(j, _)| LoopId::new(j))
        })
        .collect();

    for (i, parent) in parents.iter().enumerate() {
        loops[i].parent = *parent;
        if let Some(p) = parent {
            loops[p.index()].children.push(LoopId::new(i));
        }
    }

    // Parents strictly grow, so every chain ends at a root
    for i in 0..loops.len() {
        let mut depth = 0;
        let mut current = parents[i];
        while let Some(p) = current {
            depth += 1;
            current = parents[p.index()];
        }
        loops[i].depth = depth;
    }
}

// ============================================================================
// Reporting
// ============================================================================

/// Serializable description of one loop, blocks by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopSummary {
    pub id: usize,
    pub header: String,
    pub latch: String,
    pub blocks: Vec<String>,
    pub exits: Vec<String>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub depth: usize,
    pub innermost: bool,
}

/// Summaries of every loop, in discovery order
pub fn summarize_loops(func: &Function, forest: &LoopForest) -> Vec<LoopSummary> {
    let names = |set: &BTreeSet<BlockId>| -> Vec<String> {
        set.iter().map(|&b| func.block_name(b).to_string()).collect()
    };

    forest
        .iter()
        .map(|(id, l)| LoopSummary {
            id: id.index(),
            header: func.block_name(l.header).to_string(),
            latch: func.block_name(l.latch).to_string(),
            blocks: names(&l.blocks),
            exits: names(&l.exits),
            parent: l.parent.map(LoopId::index),
            children: l.children.iter().map(|c| c.index()).collect(),
            depth: l.depth,
            innermost: l.is_innermost(),
        })
        .collect()
}

/// Human-readable nesting report: roots in discovery order, children
/// indented below their parent.
pub fn format_loops(func: &Function, forest: &LoopForest) -> String {
    let mut out = format!("Loop Analysis for Function: {}\n", func.name());
    out.push_str(&"=".repeat(40));
    out.push('\n');

    if forest.is_empty() {
        out.push_str("No loops found.\n");
        return out;
    }

    for root in forest.roots() {
        format_loop(func, forest, root, 0, &mut out);
    }
    out
}

fn format_loop(func: &Function, forest: &LoopForest, id: LoopId, indent: usize, out: &mut String) {
    let Some(l) = forest.get(id) else {
        return;
    };
    let pad = "  ".repeat(indent);
    let names = |set: &BTreeSet<BlockId>| {
        set.iter()
            .map(|&b| func.block_name(b))
            .collect::<Vec<_>>()
            .join(" ")
    };

    out.push_str(&format!("{pad}Loop (Depth: {}):\n", l.depth));
    out.push_str(&format!("{pad}  Header: {}\n", func.block_name(l.header)));
    out.push_str(&format!("{pad}  Latch: {}\n", func.block_name(l.latch)));
    out.push_str(&format!("{pad}  Blocks: {}\n", names(&l.blocks)));
    if !l.exits.is_empty() {
        out.push_str(&format!("{pad}  Exit blocks: {}\n", names(&l.exits)));
    }
    let innermost = if l.is_innermost() { "Yes" } else { "No" };
    out.push_str(&format!("{pad}  Innermost: {innermost}\n\n"));

    for &child in &l.children {
        format_loop(func, forest, child, indent + 1, out);
    }
}
