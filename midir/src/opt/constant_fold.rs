//! Constant folding
//!
//! Evaluates `mul`, `shr`, `shl` and `and` when both operands are constants.
//! Arithmetic is 32-bit two's complement with wrapping; `shr` is a logical
//! shift. Shift amounts outside `0..=31` leave the instruction alone.

use tracing::debug;

use super::OptimizationPass;
use crate::ir::{BinOp, BlockId, Function, Instruction};

/// Constant folding pass
pub struct ConstantFolding;

impl OptimizationPass for ConstantFolding {
    fn name(&self) -> &'static str {
        "constant_folding"
    }

    fn run_on_function(&self, func: &mut Function) -> bool {
        let mut changed = false;
        for block in func.block_ids() {
            changed |= fold_block(func, block);
        }
        changed
    }
}

/// Fold every foldable instruction of `block`, front to back. A fold
/// rewrites uses across the whole function, so later instructions of the
/// same block can become foldable within the same scan.
pub fn fold_block(func: &mut Function, block: BlockId) -> bool {
    let mut changed = false;
    let mut index = 0;

    while let Some(&id) = func.block(block).insts().get(index) {
        let Some(result) = func.inst(id).and_then(|inst| try_fold(func, inst)) else {
            index += 1;
            continue;
        };

        let folded = func.add_constant(result, result.to_string());
        match func.replace_inst_with_value(id, folded) {
            Ok(rewritten) => {
                debug!(function = func.name(), %id, result, rewritten, "folded constant");
                changed = true;
                // The slot at `index` now holds the next instruction
            }
            Err(_) => index += 1,
        }
    }

    changed
}

fn try_fold(func: &Function, inst: &Instruction) -> Option<i32> {
    let Instruction::Binary { op, lhs, rhs } = inst else {
        return None;
    };
    let lhs = func.constant_value(*lhs)?;
    let rhs = func.constant_value(*rhs)?;
    fold_binop(*op, lhs, rhs)
}

/// Evaluate a foldable operator; `None` for other operators and for
/// out-of-range shift amounts.
pub fn fold_binop(op: BinOp, lhs: i32, rhs: i32) -> Option<i32> {
    match op {
        BinOp::Mul => Some(lhs.wrapping_mul(rhs)),
        BinOp::And => Some(lhs & rhs),
        BinOp::Shl => shift_amount(rhs).map(|n| ((lhs as u32) << n) as i32),
        BinOp::Shr => shift_amount(rhs).map(|n| ((lhs as u32) >> n) as i32),
        BinOp::Add | BinOp::Sub => None,
    }
}

fn shift_amount(rhs: i32) -> Option<u32> {
    u32::try_from(rhs).ok().filter(|&n| n < 32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{InstKind, Instruction};

    /// `entry: %r = op a, b; return %r` with constant operands
    fn single_op(op: BinOp, a: i32, b: i32) -> (Function, BlockId) {
        let mut func = Function::new("fold");
        let entry = func.add_block("entry").unwrap();
        let a = func.add_constant(a, a.to_string());
        let b = func.add_constant(b, b.to_string());
        let r = func.binary(entry, op, a, b).unwrap();
        func.ret(entry, Some(r)).unwrap();
        (func, entry)
    }

    fn returned_constant(func: &Function, block: BlockId) -> Option<i32> {
        let ret = func.terminator(block)?;
        match func.inst(ret)? {
            Instruction::Return { value: Some(v) } => func.constant_value(*v),
            _ => None,
        }
    }

    fn fold(op: BinOp, a: i32, b: i32) -> Option<i32> {
        let (mut func, entry) = single_op(op, a, b);
        assert!(ConstantFolding.run_on_function(&mut func));
        assert_eq!(func.block(entry).len(), 1);
        returned_constant(&func, entry)
    }

    #[test]
    fn test_mul() {
        assert_eq!(fold(BinOp::Mul, 5, 3), Some(15));
    }

    #[test]
    fn test_and() {
        assert_eq!(fold(BinOp::And, 5, 3), Some(1));
        assert_eq!(fold(BinOp::And, i32::MAX, 1), Some(1));
    }

    #[test]
    fn test_shr() {
        assert_eq!(fold(BinOp::Shr, 8, 2), Some(2));
    }

    #[test]
    fn test_shl() {
        assert_eq!(fold(BinOp::Shl, 2, 3), Some(16));
    }

    #[test]
    fn test_shr_is_logical() {
        assert_eq!(fold(BinOp::Shr, -1, 28), Some(15));
        assert_eq!(fold(BinOp::Shr, i32::MIN, 31), Some(1));
    }

    #[test]
    fn test_wrapping_semantics() {
        assert_eq!(fold(BinOp::Mul, i32::MAX, 2), Some(-2));
        assert_eq!(fold(BinOp::Shl, 1, 31), Some(i32::MIN));
    }

    #[test]
    fn test_shift_out_of_range_is_not_folded() {
        for amount in [-1, 32, 40] {
            let (mut func, entry) = single_op(BinOp::Shl, 1, amount);
            assert!(!ConstantFolding.run_on_function(&mut func));
            assert_eq!(func.block(entry).len(), 2);

            let (mut func, _) = single_op(BinOp::Shr, 1, amount);
            assert!(!ConstantFolding.run_on_function(&mut func));
        }
    }

    #[test]
    fn test_add_and_sub_are_not_folded() {
        let (mut func, _) = single_op(BinOp::Add, 1, 2);
        assert!(!ConstantFolding.run_on_function(&mut func));
        let (mut func, _) = single_op(BinOp::Sub, 1, 2);
        assert!(!ConstantFolding.run_on_function(&mut func));
    }

    #[test]
    fn test_non_constant_operand_untouched() {
        let mut func = Function::new("f");
        let x = func.add_param("x");
        let entry = func.add_block("entry").unwrap();
        let three = func.add_constant(3, "3");
        let mul = func.binary(entry, BinOp::Mul, x, three).unwrap();
        func.ret(entry, Some(mul)).unwrap();

        assert!(!ConstantFolding.run_on_function(&mut func));
        assert_eq!(func.count_insts(InstKind::Mul), 1);
    }

    #[test]
    fn test_fresh_constant_per_fold() {
        let mut func = Function::new("f");
        let entry = func.add_block("entry").unwrap();
        let two = func.add_constant(2, "2");
        let a = func.binary(entry, BinOp::Mul, two, two).unwrap();
        let b = func.binary(entry, BinOp::Mul, two, two).unwrap();
        let sum = func.binary(entry, BinOp::Add, a, b).unwrap();
        func.ret(entry, Some(sum)).unwrap();

        assert!(ConstantFolding.run_on_function(&mut func));
        let Some(Instruction::Binary { lhs, rhs, .. }) = func.inst(sum.as_inst().unwrap()) else {
            panic!("add should survive");
        };
        // Same integer, distinct constants
        assert_ne!(lhs, rhs);
        assert_eq!(func.constant_value(*lhs), Some(4));
        assert_eq!(func.constant_value(*rhs), Some(4));
        assert_eq!(func.constant(lhs.as_const().unwrap()).unwrap().name, "4");
    }

    #[test]
    fn test_chained_folds_in_one_scan() {
        let mut func = Function::new("f");
        let entry = func.add_block("entry").unwrap();
        let two = func.add_constant(2, "2");
        let three = func.add_constant(3, "3");
        let mul = func.binary(entry, BinOp::Mul, two, three).unwrap();
        let shl = func.binary(entry, BinOp::Shl, mul, two).unwrap();
        func.ret(entry, Some(shl)).unwrap();

        assert!(fold_block(&mut func, entry));
        assert_eq!(returned_constant(&func, entry), Some(24));
        assert!(!fold_block(&mut func, entry));
    }

    #[test]
    fn test_uses_rewritten_in_other_blocks() {
        let mut func = Function::new("f");
        let entry = func.add_block("entry").unwrap();
        let exit = func.add_block("exit").unwrap();
        let five = func.add_constant(5, "5");
        let three = func.add_constant(3, "3");
        let mul = func.binary(entry, BinOp::Mul, five, three).unwrap();
        func.jump(entry, "exit").unwrap();
        func.ret(exit, Some(mul)).unwrap();

        assert!(ConstantFolding.run_on_function(&mut func));
        assert!(!func.is_live(mul));
        assert_eq!(returned_constant(&func, exit), Some(15));
    }

    #[test]
    fn test_idempotent_at_fixpoint() {
        let (mut func, _) = single_op(BinOp::Mul, 6, 7);
        assert!(ConstantFolding.run_on_function(&mut func));
        let constants = func.constants().len();
        assert!(!ConstantFolding.run_on_function(&mut func));
        assert_eq!(func.constants().len(), constants);
    }

    #[test]
    fn test_fold_binop_table() {
        assert_eq!(fold_binop(BinOp::Mul, -4, 3), Some(-12));
        assert_eq!(fold_binop(BinOp::And, -1, 0x0f0f), Some(0x0f0f));
        assert_eq!(fold_binop(BinOp::Shl, 3, 0), Some(3));
        assert_eq!(fold_binop(BinOp::Shr, 3, 32), None);
        assert_eq!(fold_binop(BinOp::Add, 1, 1), None);
    }
}
