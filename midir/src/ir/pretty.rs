//! Textual IR dumps
//!
//! Display names are assigned by a [`NameContext`] in order of first
//! reference: parameters and constants print their own name, instructions get
//! sequential `%vN` names. A fresh context is used for every function dump.

use std::collections::HashMap;

use super::{Function, InstId, Instruction, Value};

/// Naming state for one dump
#[derive(Debug, Default)]
pub struct NameContext {
    names: HashMap<Value, String>,
    next_id: usize,
}

impl NameContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stable display name of `value`, assigned on first request
    pub fn value_name(&mut self, func: &Function, value: Value) -> String {
        if let Some(name) = self.names.get(&value) {
            return name.clone();
        }
        let name = match value {
            Value::Param(id) => func
                .param(id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| format!("<{id}>")),
            Value::Const(id) => func
                .constant(id)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| format!("<{id}>")),
            Value::Inst(_) => {
                let name = format!("%v{}", self.next_id);
                self.next_id += 1;
                name
            }
        };
        self.names.insert(value, name.clone());
        name
    }
}

/// Render one instruction
pub fn format_inst(func: &Function, ctx: &mut NameContext, id: InstId) -> String {
    let Some(inst) = func.inst(id) else {
        return "[INVALID]".to_string();
    };
    let this = Value::Inst(id);

    match inst {
        Instruction::Binary { op, lhs, rhs } => {
            let dest = ctx.value_name(func, this);
            let lhs = ctx.value_name(func, *lhs);
            let rhs = ctx.value_name(func, *rhs);
            format!("{dest} = {} {lhs}, {rhs}", op.mnemonic())
        }
        Instruction::Cmp { op, lhs, rhs } => {
            let dest = ctx.value_name(func, this);
            let lhs = ctx.value_name(func, *lhs);
            let rhs = ctx.value_name(func, *rhs);
            format!("{dest} = cmp.{} {lhs}, {rhs}", op.mnemonic())
        }
        Instruction::Jump { target } => format!("jump {}", target.name),
        Instruction::CondJump { cond, if_true, if_false } => {
            let cond = ctx.value_name(func, *cond);
            format!(
                "if ({cond}) (jump {}) else (jump {})",
                if_true.name, if_false.name
            )
        }
        Instruction::Return { value: Some(v) } => {
            format!("return {}", ctx.value_name(func, *v))
        }
        Instruction::Return { value: None } => "return".to_string(),
        Instruction::Phi { incoming } => {
            let dest = ctx.value_name(func, this);
            if incoming.is_empty() {
                return format!("{dest} = phi");
            }
            let entries: Vec<_> = incoming
                .iter()
                .map(|inc| match func.get_block(inc.block) {
                    Some(pred) if func.is_live(inc.value) => {
                        format!("[{}, {}]", ctx.value_name(func, inc.value), pred.name())
                    }
                    // Dangling pair: never produced through the checked builders
                    _ => "[INVALID]".to_string(),
                })
                .collect();
            format!("{dest} = phi {}", entries.join(", "))
        }
    }
}

fn format_header(func: &Function, ctx: &mut NameContext) -> String {
    let params: Vec<_> = (0..func.params().len())
        .map(|i| ctx.value_name(func, Value::Param(super::ParamId::new(i))))
        .collect();
    format!("function {}({})\n", func.name(), params.join(", "))
}

/// Format a single function
pub fn format_function(func: &Function) -> String {
    let mut ctx = NameContext::new();
    let mut out = format_header(func, &mut ctx);

    for (_, block) in func.blocks() {
        out.push_str(&format!("{}:\n", block.name()));
        for &inst in block.insts() {
            out.push_str(&format!("  {}\n", format_inst(func, &mut ctx, inst)));
        }
    }

    out
}

/// Format a function with the predecessor and successor sets of every block
pub fn format_function_cfg(func: &Function) -> String {
    let mut ctx = NameContext::new();
    let mut out = format_header(func, &mut ctx);

    let names = |set: &std::collections::BTreeSet<super::BlockId>| {
        set.iter()
            .map(|&b| func.block_name(b))
            .collect::<Vec<_>>()
            .join(", ")
    };

    for (_, block) in func.blocks() {
        out.push_str(&format!(
            "{}:  ; preds = [{}] succs = [{}]\n",
            block.name(),
            names(block.predecessors()),
            names(block.successors())
        ));
        for &inst in block.insts() {
            out.push_str(&format!("  {}\n", format_inst(func, &mut ctx, inst)));
        }
    }

    out
}
