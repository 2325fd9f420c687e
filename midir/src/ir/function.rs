//! Functions
//!
//! A function owns its parameters, constants, blocks and an instruction
//! arena. Instruction handles stay valid until the instruction is removed;
//! removal goes through [`Function::replace_inst_with_value`] or
//! [`Function::replace_inst`] which rewrite every use first.

use tracing::trace;

use super::block::BasicBlock;
use super::instr::{BinOp, CmpOp, InstKind, Instruction, PhiIncoming};
use super::{BlockId, ConstId, Constant, InstId, ParamId, Parameter, Value};
use crate::error::{IrError, Result};

#[derive(Debug, Clone)]
struct InstSlot {
    inst: Instruction,
    block: BlockId,
}

/// A function with explicit control flow (first block is entry)
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    params: Vec<Parameter>,
    constants: Vec<Constant>,
    blocks: Vec<BasicBlock>,
    /// Instruction arena; `None` marks a removed instruction
    insts: Vec<Option<InstSlot>>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            constants: Vec::new(),
            blocks: Vec::new(),
            insts: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ------------------------------------------------------------------
    // Parameters and constants
    // ------------------------------------------------------------------

    pub fn add_param(&mut self, name: impl Into<String>) -> Value {
        let id = ParamId::new(self.params.len());
        self.params.push(Parameter { name: name.into() });
        Value::Param(id)
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn param(&self, id: ParamId) -> Option<&Parameter> {
        self.params.get(id.index())
    }

    /// Create a new constant. Constants are never interned: two calls with
    /// the same value yield two distinct values.
    pub fn add_constant(&mut self, value: i32, name: impl Into<String>) -> Value {
        let id = ConstId::new(self.constants.len());
        self.constants.push(Constant {
            value,
            name: name.into(),
        });
        Value::Const(id)
    }

    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    pub fn constant(&self, id: ConstId) -> Option<&Constant> {
        self.constants.get(id.index())
    }

    /// Integer payload when `value` is a constant of this function
    pub fn constant_value(&self, value: Value) -> Option<i32> {
        value
            .as_const()
            .and_then(|id| self.constant(id))
            .map(|c| c.value)
    }

    // ------------------------------------------------------------------
    // Blocks
    // ------------------------------------------------------------------

    pub fn add_block(&mut self, name: impl Into<String>) -> Result<BlockId> {
        let name = name.into();
        if self.block_by_name(&name).is_some() {
            return Err(IrError::duplicate_block(&self.name, name));
        }
        let id = BlockId::new(self.blocks.len());
        self.blocks.push(BasicBlock::new(name));
        Ok(id)
    }

    /// # Panics
    /// Panics if `id` was not created by this function.
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn get_block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.index())
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.index()]
    }

    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &BasicBlock)> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (BlockId::new(i), b))
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + use<> {
        (0..self.blocks.len()).map(BlockId::new)
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Entry block (the first block), `None` for an empty function
    pub fn entry(&self) -> Option<BlockId> {
        if self.blocks.is_empty() {
            None
        } else {
            Some(BlockId(0))
        }
    }

    pub fn block_by_name(&self, name: &str) -> Option<BlockId> {
        self.blocks
            .iter()
            .position(|b| b.name == name)
            .map(BlockId::new)
    }

    pub fn block_name(&self, id: BlockId) -> &str {
        &self.block(id).name
    }

    // ------------------------------------------------------------------
    // Instructions
    // ------------------------------------------------------------------

    pub fn inst(&self, id: InstId) -> Option<&Instruction> {
        self.slot(id).map(|s| &s.inst)
    }

    pub(crate) fn inst_mut(&mut self, id: InstId) -> Option<&mut Instruction> {
        self.insts
            .get_mut(id.index())
            .and_then(|s| s.as_mut())
            .map(|s| &mut s.inst)
    }

    /// Block currently holding the instruction
    pub fn inst_block(&self, id: InstId) -> Option<BlockId> {
        self.slot(id).map(|s| s.block)
    }

    fn slot(&self, id: InstId) -> Option<&InstSlot> {
        self.insts.get(id.index()).and_then(|s| s.as_ref())
    }

    /// Instructions of `block` in program order
    pub fn block_insts(&self, block: BlockId) -> impl Iterator<Item = (InstId, &Instruction)> {
        self.block(block)
            .insts
            .iter()
            .filter_map(move |&id| self.inst(id).map(|inst| (id, inst)))
    }

    /// All live instructions, block by block
    pub fn insts(&self) -> impl Iterator<Item = (InstId, &Instruction)> {
        self.blocks
            .iter()
            .flat_map(|b| b.insts.iter())
            .filter_map(|&id| self.inst(id).map(|inst| (id, inst)))
    }

    pub fn num_insts(&self) -> usize {
        self.blocks.iter().map(|b| b.insts.len()).sum()
    }

    /// Number of live instructions of the given kind
    pub fn count_insts(&self, kind: InstKind) -> usize {
        self.insts().filter(|(_, inst)| inst.kind() == kind).count()
    }

    /// Terminator of `block`: its last instruction when that is a control
    /// transfer
    pub fn terminator(&self, block: BlockId) -> Option<InstId> {
        let last = self.block(block).last_inst()?;
        self.inst(last)
            .filter(|inst| inst.is_terminator())
            .map(|_| last)
    }

    /// Whether `value` refers to something this function currently owns
    pub fn is_live(&self, value: Value) -> bool {
        match value {
            Value::Param(id) => id.index() < self.params.len(),
            Value::Const(id) => id.index() < self.constants.len(),
            Value::Inst(id) => self.slot(id).is_some(),
        }
    }

    fn check_inst(&self, inst: &Instruction) -> Result<()> {
        for operand in inst.operands() {
            if !self.is_live(operand) {
                return Err(IrError::invalid_value(&self.name, operand));
            }
        }
        if let Instruction::Phi { incoming } = inst {
            for inc in incoming {
                if self.get_block(inc.block).is_none() {
                    return Err(IrError::unknown_block(&self.name, inc.block));
                }
            }
        }
        Ok(())
    }

    fn check_block(&self, block: BlockId) -> Result<()> {
        if self.get_block(block).is_none() {
            return Err(IrError::unknown_block(&self.name, block));
        }
        Ok(())
    }

    fn alloc(&mut self, block: BlockId, inst: Instruction) -> InstId {
        let id = InstId::new(self.insts.len());
        self.insts.push(Some(InstSlot { inst, block }));
        id
    }

    /// Append an instruction at the end of `block`
    pub fn append(&mut self, block: BlockId, inst: Instruction) -> Result<InstId> {
        self.check_block(block)?;
        self.check_inst(&inst)?;
        let id = self.alloc(block, inst);
        self.block_mut(block).insts.push(id);
        Ok(id)
    }

    /// Insert an instruction at `index` within `block` (clamped to the end)
    pub fn insert(&mut self, block: BlockId, index: usize, inst: Instruction) -> Result<InstId> {
        self.check_block(block)?;
        self.check_inst(&inst)?;
        let id = self.alloc(block, inst);
        let insts = &mut self.block_mut(block).insts;
        let index = index.min(insts.len());
        insts.insert(index, id);
        Ok(id)
    }

    pub fn binary(&mut self, block: BlockId, op: BinOp, lhs: Value, rhs: Value) -> Result<Value> {
        self.append(block, Instruction::binary(op, lhs, rhs))
            .map(Value::Inst)
    }

    pub fn cmp(&mut self, block: BlockId, op: CmpOp, lhs: Value, rhs: Value) -> Result<Value> {
        self.append(block, Instruction::cmp(op, lhs, rhs))
            .map(Value::Inst)
    }

    pub fn jump(&mut self, block: BlockId, target: impl Into<String>) -> Result<InstId> {
        self.append(block, Instruction::jump(target))
    }

    pub fn cond_jump(
        &mut self,
        block: BlockId,
        cond: Value,
        if_true: impl Into<String>,
        if_false: impl Into<String>,
    ) -> Result<InstId> {
        self.append(block, Instruction::cond_jump(cond, if_true, if_false))
    }

    pub fn ret(&mut self, block: BlockId, value: Option<Value>) -> Result<InstId> {
        self.append(block, Instruction::ret(value))
    }

    /// Empty phi node; fill it with [`Function::add_incoming`]
    pub fn phi(&mut self, block: BlockId) -> Result<Value> {
        self.append(block, Instruction::phi()).map(Value::Inst)
    }

    pub fn add_incoming(&mut self, phi: Value, pred: BlockId, value: Value) -> Result<()> {
        self.check_block(pred)?;
        if !self.is_live(value) {
            return Err(IrError::invalid_value(&self.name, value));
        }
        let name = self.name.clone();
        match phi.as_inst().and_then(|id| self.inst_mut(id)) {
            Some(Instruction::Phi { incoming }) => {
                incoming.push(PhiIncoming { block: pred, value });
                Ok(())
            }
            _ => Err(IrError::invalid_value(name, phi)),
        }
    }

    /// Rename every target of `inst` called `from` to `to` and mark it
    /// unresolved. Block edges stay stale until the CFG is rebuilt.
    /// Returns the number of targets renamed.
    pub fn retarget(&mut self, inst: InstId, from: &str, to: &str) -> usize {
        let Some(inst) = self.inst_mut(inst) else {
            return 0;
        };
        let mut count = 0;
        for target in inst.targets_mut() {
            if target.name == from {
                target.name = to.to_string();
                target.block = None;
                count += 1;
            }
        }
        count
    }

    // ------------------------------------------------------------------
    // Use rewriting
    // ------------------------------------------------------------------

    /// Instructions using `value` as an operand, in program order
    pub fn users(&self, value: Value) -> Vec<InstId> {
        self.insts()
            .filter(|(_, inst)| inst.uses(value))
            .map(|(id, _)| id)
            .collect()
    }

    /// Rewrite every use of `old` in every live instruction of the function.
    /// Returns the number of operands rewritten.
    pub fn replace_all_uses_with(&mut self, old: Value, new: Value) -> usize {
        if old == new {
            return 0;
        }
        let mut count = 0;
        for slot in self.insts.iter_mut().flatten() {
            count += slot.inst.replace_uses(old, new);
        }
        count
    }

    /// Detach and drop an instruction. Callers must have rewritten its uses;
    /// the replace helpers below do that.
    pub(crate) fn remove_inst(&mut self, id: InstId) -> Option<Instruction> {
        let slot = self.insts.get_mut(id.index())?.take()?;
        let block = &mut self.blocks[slot.block.index()];
        if let Some(pos) = block.position_of(id) {
            block.insts.remove(pos);
        }
        Some(slot.inst)
    }

    /// Replace instruction `id` by an existing value: every use of `id`
    /// becomes a use of `new`, then `id` is removed.
    /// Returns the number of operands rewritten.
    pub fn replace_inst_with_value(&mut self, id: InstId, new: Value) -> Result<usize> {
        let old = Value::Inst(id);
        if !self.is_live(old) {
            return Err(IrError::invalid_value(&self.name, old));
        }
        if new == old || !self.is_live(new) {
            return Err(IrError::invalid_value(&self.name, new));
        }
        let rewritten = self.replace_all_uses_with(old, new);
        self.remove_inst(id);
        trace!(function = %self.name, %old, %new, rewritten, "replaced instruction");
        Ok(rewritten)
    }

    /// Put `inst` at the position of `id`, redirect all uses of `id` to it and
    /// remove `id`. `inst` must not use `id` itself.
    pub fn replace_inst(&mut self, id: InstId, inst: Instruction) -> Result<InstId> {
        let old = Value::Inst(id);
        let block = self
            .inst_block(id)
            .ok_or_else(|| IrError::invalid_value(&self.name, old))?;
        if inst.uses(old) {
            return Err(IrError::invalid_value(&self.name, old));
        }
        self.check_inst(&inst)?;

        let new_id = self.alloc(block, inst);
        let insts = &mut self.block_mut(block).insts;
        if let Some(pos) = insts.iter().position(|&i| i == id) {
            insts[pos] = new_id;
        }
        if let Some(slot) = self.insts[id.index()].take() {
            trace!(function = %self.name, old = ?slot.inst.kind(), %new_id, "replaced instruction in place");
        }
        self.replace_all_uses_with(old, Value::Inst(new_id));
        Ok(new_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_block_function() -> (Function, BlockId, BlockId, Value) {
        let mut func = Function::new("f");
        let x = func.add_param("x");
        let entry = func.add_block("entry").unwrap();
        let exit = func.add_block("exit").unwrap();
        (func, entry, exit, x)
    }

    #[test]
    fn test_insert_in_middle_keeps_terminator_last() {
        let (mut func, entry, exit, x) = two_block_function();
        let one = func.add_constant(1, "1");
        let sub = func.binary(entry, BinOp::Sub, x, one).unwrap();
        func.jump(entry, "exit").unwrap();
        func.ret(exit, None).unwrap();

        let add = func
            .insert(entry, 1, Instruction::binary(BinOp::Add, x, one))
            .unwrap();
        let order = func.block(entry).insts().to_vec();
        assert_eq!(order.len(), 3);
        assert_eq!(Value::Inst(order[0]), sub);
        assert_eq!(order[1], add);
        assert_eq!(func.inst_block(add), Some(entry));

        crate::cfg::build_cfg(&mut func);
        let succs: Vec<_> = func.block(entry).successors().iter().copied().collect();
        assert_eq!(succs, [exit]);
    }

    #[test]
    fn test_insert_past_terminator_drops_edges() {
        let (mut func, entry, exit, x) = two_block_function();
        func.jump(entry, "exit").unwrap();
        func.ret(exit, None).unwrap();

        // Index is clamped to the end of the block
        let add = func
            .insert(entry, 99, Instruction::binary(BinOp::Add, x, x))
            .unwrap();
        assert_eq!(func.block(entry).last_inst(), Some(add));

        crate::cfg::build_cfg(&mut func);
        assert_eq!(func.terminator(entry), None);
        assert!(func.block(entry).successors().is_empty());
        assert!(func.block(exit).predecessors().is_empty());
    }

    #[test]
    fn test_insert_rejects_foreign_operand() {
        let (mut func, entry, _, x) = two_block_function();
        let bogus = Value::Inst(InstId(42));
        let err = func
            .insert(entry, 0, Instruction::binary(BinOp::Mul, x, bogus))
            .unwrap_err();
        assert!(matches!(err, IrError::InvalidValue { .. }));
        assert!(func.block(entry).is_empty());
    }

    #[test]
    fn test_duplicate_block_rejected() {
        let mut func = Function::new("f");
        func.add_block("A").unwrap();
        let err = func.add_block("A").unwrap_err();
        assert!(matches!(err, IrError::DuplicateBlock { .. }));
        assert_eq!(func.num_blocks(), 1);
    }

    #[test]
    fn test_entry_is_first_block() {
        let mut func = Function::new("f");
        assert_eq!(func.entry(), None);
        let a = func.add_block("A").unwrap();
        func.add_block("B").unwrap();
        assert_eq!(func.entry(), Some(a));
        assert_eq!(func.block_by_name("B"), Some(BlockId(1)));
        assert_eq!(func.block_by_name("Z"), None);
    }

    #[test]
    fn test_constants_are_not_interned() {
        let mut func = Function::new("f");
        let a = func.add_constant(7, "7");
        let b = func.add_constant(7, "7");
        assert_ne!(a, b);
        assert_eq!(func.constant_value(a), Some(7));
        assert_eq!(func.constant_value(b), Some(7));
    }

    #[test]
    fn test_append_rejects_foreign_operand() {
        let (mut func, entry, _, x) = two_block_function();
        let bogus = Value::Inst(InstId(99));
        let err = func.binary(entry, BinOp::Add, x, bogus).unwrap_err();
        assert!(matches!(err, IrError::InvalidValue { .. }));
        assert!(func.block(entry).is_empty());
    }

    #[test]
    fn test_append_rejects_unknown_block() {
        let (mut func, _, _, x) = two_block_function();
        let err = func.ret(BlockId(7), Some(x)).unwrap_err();
        assert!(matches!(err, IrError::UnknownBlock { .. }));
    }

    #[test]
    fn test_terminator_only_when_last_is_control_transfer() {
        let (mut func, entry, exit, x) = two_block_function();
        let c = func.add_constant(2, "2");
        func.binary(entry, BinOp::Mul, x, c).unwrap();
        assert_eq!(func.terminator(entry), None);
        let jump = func.jump(entry, "exit").unwrap();
        assert_eq!(func.terminator(entry), Some(jump));
        assert_eq!(func.terminator(exit), None);
    }

    #[test]
    fn test_replace_all_uses_crosses_blocks() {
        let (mut func, entry, exit, x) = two_block_function();
        let c = func.add_constant(3, "3");
        let mul = func.binary(entry, BinOp::Mul, x, c).unwrap();
        func.jump(entry, "exit").unwrap();
        let ret = func.ret(exit, Some(mul)).unwrap();

        let rewritten = func.replace_all_uses_with(mul, x);
        assert_eq!(rewritten, 1);
        assert_eq!(func.inst(ret), Some(&Instruction::ret(Some(x))));
        assert!(func.users(mul).is_empty());
    }

    #[test]
    fn test_replace_inst_with_value_removes_instruction() {
        let (mut func, entry, exit, x) = two_block_function();
        let one = func.add_constant(1, "1");
        let mul = func.binary(entry, BinOp::Mul, x, one).unwrap();
        let ret = func.ret(exit, Some(mul)).unwrap();

        func.replace_inst_with_value(mul.as_inst().unwrap(), x).unwrap();

        assert!(!func.is_live(mul));
        assert!(func.block(entry).is_empty());
        assert_eq!(func.inst(ret), Some(&Instruction::ret(Some(x))));
    }

    #[test]
    fn test_replace_inst_with_itself_is_rejected() {
        let (mut func, entry, _, x) = two_block_function();
        let and = func.binary(entry, BinOp::And, x, x).unwrap();
        let id = and.as_inst().unwrap();
        assert!(func.replace_inst_with_value(id, and).is_err());
        assert!(func.is_live(and));
    }

    #[test]
    fn test_replace_inst_keeps_position_and_redirects_uses() {
        let (mut func, entry, _, x) = two_block_function();
        let eight = func.add_constant(8, "8");
        let three = func.add_constant(3, "3");
        let mul = func.binary(entry, BinOp::Mul, x, eight).unwrap();
        let ret = func.ret(entry, Some(mul)).unwrap();

        let shl = func
            .replace_inst(mul.as_inst().unwrap(), Instruction::binary(BinOp::Shl, x, three))
            .unwrap();

        assert_eq!(func.block(entry).insts(), &[shl, ret]);
        assert_eq!(func.inst(ret), Some(&Instruction::ret(Some(Value::Inst(shl)))));
        assert_eq!(func.count_insts(InstKind::Mul), 0);
        assert_eq!(func.count_insts(InstKind::Shl), 1);
    }

    #[test]
    fn test_phi_incoming() {
        let (mut func, entry, exit, x) = two_block_function();
        let phi = func.phi(exit).unwrap();
        func.add_incoming(phi, entry, x).unwrap();
        assert_eq!(func.users(x), vec![phi.as_inst().unwrap()]);

        let err = func.add_incoming(phi, BlockId(9), x).unwrap_err();
        assert!(matches!(err, IrError::UnknownBlock { .. }));
        let err = func.add_incoming(x, entry, x).unwrap_err();
        assert!(matches!(err, IrError::InvalidValue { .. }));
    }
}
