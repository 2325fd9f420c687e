//! Intermediate Representation
//!
//! Functions are made of basic blocks, basic blocks of instructions. All
//! values of a function (parameters, constants, instructions) live in
//! arenas owned by the [`Function`] and are referenced through small `Copy`
//! handles, so rewriting an instruction can never leave a dangling operand.
//!
//! Control transfers name their targets textually; the CFG builder in
//! [`crate::cfg`] resolves those names and derives block edges.

mod block;
mod function;
mod instr;
pub mod pretty;
mod program;

pub use block::BasicBlock;
pub use function::Function;
pub use instr::{BinOp, CmpOp, InstKind, Instruction, JumpTarget, PhiIncoming};
pub use pretty::{NameContext, format_function, format_function_cfg, format_inst};
pub use program::Program;

use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl $name {
            pub fn new(index: usize) -> Self {
                Self(index as u32)
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

entity_id!(
    /// Handle to a function parameter
    ParamId,
    "param"
);
entity_id!(
    /// Handle to a function-owned integer constant
    ConstId,
    "const"
);
entity_id!(
    /// Handle to an instruction in the function's instruction arena
    InstId,
    "inst"
);
entity_id!(
    /// Handle to a basic block of a function
    BlockId,
    "bb"
);

/// Kind tag of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Parameter,
    Constant,
    Instruction,
}

/// Operand reference. Equality is identity: two constants holding the same
/// integer are distinct values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Param(ParamId),
    Const(ConstId),
    Inst(InstId),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Param(_) => ValueKind::Parameter,
            Value::Const(_) => ValueKind::Constant,
            Value::Inst(_) => ValueKind::Instruction,
        }
    }

    pub fn as_inst(&self) -> Option<InstId> {
        match self {
            Value::Inst(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_const(&self) -> Option<ConstId> {
        match self {
            Value::Const(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<InstId> for Value {
    fn from(id: InstId) -> Self {
        Value::Inst(id)
    }
}

impl From<ConstId> for Value {
    fn from(id: ConstId) -> Self {
        Value::Const(id)
    }
}

impl From<ParamId> for Value {
    fn from(id: ParamId) -> Self {
        Value::Param(id)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Param(id) => id.fmt(f),
            Value::Const(id) => id.fmt(f),
            Value::Inst(id) => id.fmt(f),
        }
    }
}

/// Named formal parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
}

/// Immutable 32-bit integer constant with its display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constant {
    pub value: i32,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_kind() {
        assert_eq!(Value::Param(ParamId(0)).kind(), ValueKind::Parameter);
        assert_eq!(Value::Const(ConstId(1)).kind(), ValueKind::Constant);
        assert_eq!(Value::Inst(InstId(2)).kind(), ValueKind::Instruction);
    }

    #[test]
    fn test_value_identity() {
        // Same index, different arenas: distinct values
        assert_ne!(Value::Param(ParamId(0)), Value::Const(ConstId(0)));
        assert_eq!(Value::from(InstId(3)), Value::Inst(InstId(3)));
        assert_eq!(Value::Inst(InstId(3)).as_inst(), Some(InstId(3)));
        assert_eq!(Value::Param(ParamId(3)).as_inst(), None);
    }

    #[test]
    fn test_display_handles() {
        assert_eq!(BlockId(4).to_string(), "bb4");
        assert_eq!(Value::Inst(InstId(7)).to_string(), "inst7");
    }
}
