//! Dominator analysis
//!
//! Iterative set-intersection fixpoint over the blocks reachable from the
//! entry. `dom(entry) = {entry}`; every other reachable block starts at the
//! full reachable set and shrinks to `{b} ∪ ⋂ dom(p)` over its reachable
//! predecessors until a whole pass changes nothing. Unreachable blocks carry
//! no dominator information.
//!
//! Relies on the edge sets produced by [`crate::cfg::build_cfg`].

use std::collections::BTreeSet;

use tracing::trace;

use crate::cfg::reachable_blocks;
use crate::ir::{BlockId, Function};

/// Dominator sets, one per reachable block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DominatorMap {
    entry: Option<BlockId>,
    /// Indexed by block; `None` for unreachable blocks
    sets: Vec<Option<BTreeSet<BlockId>>>,
}

impl DominatorMap {
    pub fn entry(&self) -> Option<BlockId> {
        self.entry
    }

    /// Blocks dominating `block` (including itself)
    pub fn dominators(&self, block: BlockId) -> Option<&BTreeSet<BlockId>> {
        self.sets.get(block.index()).and_then(|s| s.as_ref())
    }

    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.dominators(block).is_some()
    }

    /// Whether `a` dominates `b`. False when `b` is unreachable.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        self.dominators(b).is_some_and(|set| set.contains(&a))
    }

    pub fn strictly_dominates(&self, a: BlockId, b: BlockId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Closest strict dominator of `block`; `None` for the entry and for
    /// unreachable blocks.
    ///
    /// Dominators of a block form a chain, so the closest one is the strict
    /// dominator with the largest dominator set of its own.
    pub fn immediate_dominator(&self, block: BlockId) -> Option<BlockId> {
        self.dominators(block)?
            .iter()
            .copied()
            .filter(|&d| d != block)
            .max_by_key(|&d| self.dominators(d).map_or(0, |s| s.len()))
    }

    /// Number of blocks with dominator information
    pub fn len(&self) -> usize {
        self.sets.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(block, dominators)` for every reachable block, in block order
    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &BTreeSet<BlockId>)> {
        self.sets
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|set| (BlockId::new(i), set)))
    }
}

/// Compute the dominator sets of every block reachable from the entry
pub fn compute_dominators(func: &Function) -> DominatorMap {
    let Some(entry) = func.entry() else {
        return DominatorMap::default();
    };

    let reachable = reachable_blocks(func);
    let all: BTreeSet<BlockId> = reachable.iter().copied().collect();

    let mut sets: Vec<Option<BTreeSet<BlockId>>> = vec![None; func.num_blocks()];
    for &block in &reachable {
        sets[block.index()] = Some(if block == entry {
            BTreeSet::from([entry])
        } else {
            all.clone()
        });
    }

    let mut iterations = 0usize;
    let mut changed = true;
    while changed {
        changed = false;
        iterations += 1;

        for &block in &reachable {
            if block == entry {
                continue;
            }
            let mut new_set: Option<BTreeSet<BlockId>> = None;
            for pred in func.block(block).predecessors() {
                let Some(pred_set) = sets[pred.index()].as_ref() else {
                    // Unreachable predecessor
                    continue;
                };
                new_set = Some(match new_set {
                    None => pred_set.clone(),
                    Some(acc) => acc.intersection(pred_set).copied().collect(),
                });
            }
            let mut new_set = new_set.unwrap_or_default();
            new_set.insert(block);

            if sets[block.index()].as_ref() != Some(&new_set) {
                sets[block.index()] = Some(new_set);
                changed = true;
            }
        }
    }

    trace!(
        function = func.name(),
        iterations,
        reachable = reachable.len(),
        "computed dominators"
    );

    DominatorMap {
        entry: Some(entry),
        sets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples;

    fn dom_names(func: &Function, doms: &DominatorMap, block: &str) -> Option<Vec<String>> {
        let id = func.block_by_name(block)?;
        doms.dominators(id).map(|set| {
            set.iter()
                .map(|&b| func.block_name(b).to_string())
                .collect()
        })
    }

    fn analyzed(edges: &[(&str, &[&str])]) -> (Function, DominatorMap) {
        let func = samples::from_edges("g", edges).unwrap();
        let doms = compute_dominators(&func);
        (func, doms)
    }

    #[test]
    fn test_diamond() {
        let (func, doms) = analyzed(&[
            ("A", &["B", "C"]),
            ("B", &["D"]),
            ("C", &["D"]),
            ("D", &[]),
        ]);
        assert_eq!(dom_names(&func, &doms, "A").unwrap(), ["A"]);
        assert_eq!(dom_names(&func, &doms, "B").unwrap(), ["A", "B"]);
        assert_eq!(dom_names(&func, &doms, "C").unwrap(), ["A", "C"]);
        assert_eq!(dom_names(&func, &doms, "D").unwrap(), ["A", "D"]);
    }

    #[test]
    fn test_every_reachable_block_dominates_itself() {
        let func = samples::loop_graph_5().unwrap();
        let doms = compute_dominators(&func);
        let entry = func.entry().unwrap();
        assert_eq!(doms.dominators(entry).unwrap().len(), 1);
        for (block, set) in doms.iter() {
            assert!(set.contains(&block));
            assert!(set.contains(&entry));
        }
        assert_eq!(doms.len(), func.num_blocks());
    }

    #[test]
    fn test_loop_header_dominates_body() {
        let (func, doms) = analyzed(&[
            ("A", &["B"]),
            ("B", &["C", "D"]),
            ("C", &[]),
            ("D", &["E"]),
            ("E", &["B"]),
        ]);
        assert_eq!(dom_names(&func, &doms, "E").unwrap(), ["A", "B", "D", "E"]);
        let b = func.block_by_name("B").unwrap();
        let e = func.block_by_name("E").unwrap();
        assert!(doms.dominates(b, e));
        assert!(doms.strictly_dominates(b, e));
        assert!(!doms.strictly_dominates(e, e));
        assert!(!doms.dominates(e, b));
    }

    #[test]
    fn test_unreachable_blocks_have_no_info() {
        // E only jumps into the graph; nothing reaches it
        let (func, doms) = analyzed(&[
            ("A", &["B"]),
            ("B", &[]),
            ("E", &["B"]),
        ]);
        let e = func.block_by_name("E").unwrap();
        let b = func.block_by_name("B").unwrap();
        assert!(!doms.is_reachable(e));
        assert!(doms.dominators(e).is_none());
        // The unreachable predecessor does not weaken B's set
        assert_eq!(dom_names(&func, &doms, "B").unwrap(), ["A", "B"]);
        assert!(!doms.dominates(e, b));
        assert_eq!(doms.len(), 2);
    }

    #[test]
    fn test_unreachable_cycle_has_no_info() {
        let (func, doms) = analyzed(&[("A", &[]), ("X", &["Y"]), ("Y", &["X"])]);
        assert_eq!(dom_names(&func, &doms, "X"), None);
        assert_eq!(dom_names(&func, &doms, "Y"), None);
    }

    #[test]
    fn test_immediate_dominator() {
        let (func, doms) = analyzed(&[
            ("A", &["B"]),
            ("B", &["C", "D"]),
            ("C", &["E"]),
            ("D", &["E"]),
            ("E", &[]),
        ]);
        let id = |name| func.block_by_name(name).unwrap();
        assert_eq!(doms.immediate_dominator(id("A")), None);
        assert_eq!(doms.immediate_dominator(id("B")), Some(id("A")));
        assert_eq!(doms.immediate_dominator(id("C")), Some(id("B")));
        assert_eq!(doms.immediate_dominator(id("E")), Some(id("B")));
    }

    #[test]
    fn test_empty_function() {
        let func = Function::new("empty");
        let doms = compute_dominators(&func);
        assert!(doms.is_empty());
        assert_eq!(doms.entry(), None);
        assert_eq!(doms.iter().count(), 0);
    }

    #[test]
    fn test_self_loop_entry() {
        let (func, doms) = analyzed(&[("A", &["A", "B"]), ("B", &[])]);
        assert_eq!(dom_names(&func, &doms, "A").unwrap(), ["A"]);
        assert_eq!(dom_names(&func, &doms, "B").unwrap(), ["A", "B"]);
    }
}
