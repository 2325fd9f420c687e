//! Instruction set

use super::{BlockId, Value};

/// Kind tag of an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstKind {
    Add,
    Mul,
    Sub,
    And,
    Shl,
    Shr,
    Cmp,
    Jump,
    CondJump,
    Return,
    Phi,
}

impl InstKind {
    /// Control-transfer kinds; one of these ends a block
    pub fn is_terminator(self) -> bool {
        matches!(self, InstKind::Jump | InstKind::CondJump | InstKind::Return)
    }
}

/// Binary arithmetic / bitwise operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Mul,
    Sub,
    And,
    Shl,
    /// Logical (unsigned) right shift
    Shr,
}

impl BinOp {
    pub fn kind(self) -> InstKind {
        match self {
            BinOp::Add => InstKind::Add,
            BinOp::Mul => InstKind::Mul,
            BinOp::Sub => InstKind::Sub,
            BinOp::And => InstKind::And,
            BinOp::Shl => InstKind::Shl,
            BinOp::Shr => InstKind::Shr,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Mul => "mul",
            BinOp::Sub => "sub",
            BinOp::And => "and",
            BinOp::Shl => "shl",
            BinOp::Shr => "shr",
        }
    }
}

/// Comparison relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            CmpOp::Eq => "eq",
            CmpOp::Ne => "ne",
            CmpOp::Lt => "lt",
            CmpOp::Le => "le",
            CmpOp::Gt => "gt",
            CmpOp::Ge => "ge",
        }
    }
}

/// Symbolic jump target. `block` is filled in by the CFG builder and is
/// `None` while the name is unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpTarget {
    pub name: String,
    pub block: Option<BlockId>,
}

impl JumpTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            block: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.block.is_some()
    }
}

/// One `[value, predecessor]` pair of a phi node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhiIncoming {
    pub block: BlockId,
    pub value: Value,
}

/// IR instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// `%dest = op lhs, rhs`
    Binary { op: BinOp, lhs: Value, rhs: Value },
    /// `%dest = cmp.rel lhs, rhs`
    Cmp { op: CmpOp, lhs: Value, rhs: Value },
    /// `jump target`
    Jump { target: JumpTarget },
    /// `if (cond) (jump t) else (jump f)`
    CondJump {
        cond: Value,
        if_true: JumpTarget,
        if_false: JumpTarget,
    },
    /// `return [value]`
    Return { value: Option<Value> },
    /// `%dest = phi [value, pred], ...`
    Phi { incoming: Vec<PhiIncoming> },
}

impl Instruction {
    pub fn binary(op: BinOp, lhs: Value, rhs: Value) -> Self {
        Instruction::Binary { op, lhs, rhs }
    }

    pub fn cmp(op: CmpOp, lhs: Value, rhs: Value) -> Self {
        Instruction::Cmp { op, lhs, rhs }
    }

    pub fn jump(target: impl Into<String>) -> Self {
        Instruction::Jump {
            target: JumpTarget::new(target),
        }
    }

    pub fn cond_jump(cond: Value, if_true: impl Into<String>, if_false: impl Into<String>) -> Self {
        Instruction::CondJump {
            cond,
            if_true: JumpTarget::new(if_true),
            if_false: JumpTarget::new(if_false),
        }
    }

    pub fn ret(value: Option<Value>) -> Self {
        Instruction::Return { value }
    }

    pub fn phi() -> Self {
        Instruction::Phi {
            incoming: Vec::new(),
        }
    }

    pub fn kind(&self) -> InstKind {
        match self {
            Instruction::Binary { op, .. } => op.kind(),
            Instruction::Cmp { .. } => InstKind::Cmp,
            Instruction::Jump { .. } => InstKind::Jump,
            Instruction::CondJump { .. } => InstKind::CondJump,
            Instruction::Return { .. } => InstKind::Return,
            Instruction::Phi { .. } => InstKind::Phi,
        }
    }

    pub fn is_terminator(&self) -> bool {
        self.kind().is_terminator()
    }

    /// Ordered operand list
    pub fn operands(&self) -> Vec<Value> {
        match self {
            Instruction::Binary { lhs, rhs, .. } | Instruction::Cmp { lhs, rhs, .. } => {
                vec![*lhs, *rhs]
            }
            Instruction::Jump { .. } => Vec::new(),
            Instruction::CondJump { cond, .. } => vec![*cond],
            Instruction::Return { value } => value.iter().copied().collect(),
            Instruction::Phi { incoming } => incoming.iter().map(|inc| inc.value).collect(),
        }
    }

    fn operands_mut(&mut self) -> Vec<&mut Value> {
        match self {
            Instruction::Binary { lhs, rhs, .. } | Instruction::Cmp { lhs, rhs, .. } => {
                vec![lhs, rhs]
            }
            Instruction::Jump { .. } => Vec::new(),
            Instruction::CondJump { cond, .. } => vec![cond],
            Instruction::Return { value } => value.iter_mut().collect(),
            Instruction::Phi { incoming } => incoming.iter_mut().map(|inc| &mut inc.value).collect(),
        }
    }

    pub fn uses(&self, value: Value) -> bool {
        self.operands().contains(&value)
    }

    /// Rewrite every operand equal to `old` into `new`.
    /// Returns the number of operands rewritten.
    pub fn replace_uses(&mut self, old: Value, new: Value) -> usize {
        let mut count = 0;
        for operand in self.operands_mut() {
            if *operand == old {
                *operand = new;
                count += 1;
            }
        }
        count
    }

    /// Symbolic targets of a control transfer (true target first)
    pub fn targets(&self) -> Vec<&JumpTarget> {
        match self {
            Instruction::Jump { target } => vec![target],
            Instruction::CondJump { if_true, if_false, .. } => vec![if_true, if_false],
            _ => Vec::new(),
        }
    }

    pub(crate) fn targets_mut(&mut self) -> Vec<&mut JumpTarget> {
        match self {
            Instruction::Jump { target } => vec![target],
            Instruction::CondJump { if_true, if_false, .. } => vec![if_true, if_false],
            _ => Vec::new(),
        }
    }

    /// Resolved successor blocks; unresolved targets contribute nothing
    pub fn successors(&self) -> Vec<BlockId> {
        self.targets().iter().filter_map(|t| t.block).collect()
    }
}
