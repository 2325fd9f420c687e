//! Peephole optimizer
//!
//! Algebraic identities on `mul`, `and` and `shr`:
//!
//! | pattern                 | result        |
//! |-------------------------|---------------|
//! | `mul x, 0` / `mul 0, x` | `0`           |
//! | `mul x, 1` / `mul 1, x` | `x`           |
//! | `mul x, 2^k`            | `shl x, k`    |
//! | `and x, 0` / `and 0, x` | `0`           |
//! | `and x, -1`             | `x`           |
//! | `and x, x`              | `x`           |
//! | `shr x, 0`              | `x`           |
//! | `shr x, n` with n >= 32 | `0`           |
//! | `shr 0, n`              | `0`           |
//!
//! After each rewrite the scan of the block restarts from the top, so a block
//! is left at a fixpoint.

use tracing::debug;

use super::OptimizationPass;
use crate::ir::{BinOp, BlockId, Function, InstId, Instruction, Value};

/// Peephole pass
pub struct Peephole;

impl OptimizationPass for Peephole {
    fn name(&self) -> &'static str {
        "peephole"
    }

    fn run_on_function(&self, func: &mut Function) -> bool {
        let mut changed = false;
        for block in func.block_ids() {
            changed |= optimize_block(func, block);
        }
        changed
    }
}

/// Replacement chosen for a matched instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rewrite {
    /// A fresh constant
    Constant(i32),
    /// An existing operand
    Operand(Value),
    /// `shl value, amount` in place of a multiplication
    Shl { value: Value, amount: i32 },
}

/// Rewrite `block` until no pattern matches
pub fn optimize_block(func: &mut Function, block: BlockId) -> bool {
    let mut changed = false;

    'scan: loop {
        let insts = func.block(block).insts().to_vec();
        for id in insts {
            let Some(rewrite) = func.inst(id).and_then(|inst| match_rewrite(func, inst)) else {
                continue;
            };
            if apply(func, id, rewrite) {
                changed = true;
                continue 'scan;
            }
        }
        break;
    }

    changed
}

fn match_rewrite(func: &Function, inst: &Instruction) -> Option<Rewrite> {
    let Instruction::Binary { op, lhs, rhs } = *inst else {
        return None;
    };
    let l = func.constant_value(lhs);
    let r = func.constant_value(rhs);

    match op {
        BinOp::Mul => {
            if l == Some(0) || r == Some(0) {
                Some(Rewrite::Constant(0))
            } else if l == Some(1) {
                Some(Rewrite::Operand(rhs))
            } else if r == Some(1) {
                Some(Rewrite::Operand(lhs))
            } else if let Some(k) = r.and_then(log2_exact) {
                Some(Rewrite::Shl { value: lhs, amount: k })
            } else {
                l.and_then(log2_exact)
                    .map(|k| Rewrite::Shl { value: rhs, amount: k })
            }
        }
        BinOp::And => {
            if l == Some(0) || r == Some(0) {
                Some(Rewrite::Constant(0))
            } else if l == Some(-1) {
                Some(Rewrite::Operand(rhs))
            } else if r == Some(-1) || lhs == rhs {
                Some(Rewrite::Operand(lhs))
            } else {
                None
            }
        }
        BinOp::Shr => match r? {
            0 => Some(Rewrite::Operand(lhs)),
            n if n >= 32 => Some(Rewrite::Constant(0)),
            _ if l == Some(0) => Some(Rewrite::Constant(0)),
            _ => None,
        },
        BinOp::Add | BinOp::Sub | BinOp::Shl => None,
    }
}

fn apply(func: &mut Function, id: InstId, rewrite: Rewrite) -> bool {
    let result = match rewrite {
        Rewrite::Constant(c) => {
            let value = func.add_constant(c, c.to_string());
            func.replace_inst_with_value(id, value).map(|_| ())
        }
        Rewrite::Operand(value) => func.replace_inst_with_value(id, value).map(|_| ()),
        Rewrite::Shl { value, amount } => {
            let amount = func.add_constant(amount, amount.to_string());
            func.replace_inst(id, Instruction::binary(BinOp::Shl, value, amount))
                .map(|_| ())
        }
    };

    match result {
        Ok(()) => {
            debug!(function = func.name(), %id, ?rewrite, "peephole rewrite");
            true
        }
        Err(e) => {
            debug!(function = func.name(), %id, error = %e, "peephole rewrite skipped");
            false
        }
    }
}

/// `k` such that `x == 2^k`, for positive powers of two
fn log2_exact(x: i32) -> Option<i32> {
    (x > 0 && x & (x - 1) == 0).then(|| x.trailing_zeros() as i32)
}
