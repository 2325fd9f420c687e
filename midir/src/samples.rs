//! Built-in sample programs
//!
//! Every sample comes back with its CFG built.

use crate::cfg::build_cfg;
use crate::error::Result;
use crate::ir::{BinOp, CmpOp, Function, Program};

/// Build a control-flow skeleton from `(block, successors)` pairs, in block
/// order. No successors emits `return`, one emits `jump`, two emit a
/// conditional jump on the parameter `cond`. Successors past the second are
/// ignored.
pub fn from_edges(name: &str, edges: &[(&str, &[&str])]) -> Result<Function> {
    let mut func = Function::new(name);
    let cond = func.add_param("cond");

    let mut blocks = Vec::with_capacity(edges.len());
    for (block, _) in edges {
        blocks.push(func.add_block(*block)?);
    }

    for (&(_, succs), &block) in edges.iter().zip(&blocks) {
        match succs {
            [] => func.ret(block, None)?,
            [target] => func.jump(block, *target)?,
            [if_true, if_false, ..] => func.cond_jump(block, cond, *if_true, *if_false)?,
        };
    }

    build_cfg(&mut func);
    Ok(func)
}

/// `A:B, B:{C,D}, C:ret, D:E, E:B`
pub fn loop_graph_1() -> Result<Function> {
    from_edges(
        "loop_graph_1",
        &[
            ("A", &["B"]),
            ("B", &["C", "D"]),
            ("C", &[]),
            ("D", &["E"]),
            ("E", &["B"]),
        ],
    )
}

/// `A:B, B:C, C:{D,F}, D:{E,F}, E:B, F:ret`
pub fn loop_graph_2() -> Result<Function> {
    from_edges(
        "loop_graph_2",
        &[
            ("A", &["B"]),
            ("B", &["C"]),
            ("C", &["D", "F"]),
            ("D", &["E", "F"]),
            ("E", &["B"]),
            ("F", &[]),
        ],
    )
}

/// Loop headed by B nested in a loop headed by the entry
pub fn loop_graph_3() -> Result<Function> {
    from_edges(
        "loop_graph_3",
        &[
            ("A", &["B"]),
            ("B", &["C", "D"]),
            ("C", &["E", "F"]),
            ("D", &["F"]),
            ("E", &[]),
            ("F", &["G"]),
            ("G", &["B", "H"]),
            ("H", &["A"]),
        ],
    )
}

/// Acyclic
pub fn loop_graph_4() -> Result<Function> {
    from_edges(
        "loop_graph_4",
        &[
            ("A", &["B"]),
            ("B", &["C", "F"]),
            ("C", &["D"]),
            ("D", &[]),
            ("E", &["D"]),
            ("F", &["E", "G"]),
            ("G", &["D"]),
        ],
    )
}

/// Two sibling loops (C-D, E-F) inside an outer loop headed by B
pub fn loop_graph_5() -> Result<Function> {
    from_edges(
        "loop_graph_5",
        &[
            ("A", &["B"]),
            ("B", &["C", "J"]),
            ("C", &["D"]),
            ("D", &["E", "C"]),
            ("E", &["F"]),
            ("F", &["E", "G"]),
            ("G", &["H", "I"]),
            ("H", &["B"]),
            ("I", &["K"]),
            ("J", &["C"]),
            ("K", &[]),
        ],
    )
}

/// Branchy graph with a back edge F -> B and several join points
pub fn dominator_example() -> Result<Function> {
    from_edges(
        "dominator_example",
        &[
            ("A", &["B"]),
            ("B", &["C", "E"]),
            ("C", &["D"]),
            ("D", &["G"]),
            ("E", &["D", "F"]),
            ("F", &["H", "B"]),
            ("G", &["I", "C"]),
            ("H", &["G", "I"]),
            ("I", &[]),
        ],
    )
}

/// Factorial in phi form
pub fn factorial() -> Result<Function> {
    let mut f = Function::new("factorial");
    let n = f.add_param("n");
    let one = f.add_constant(1, "one");

    let entry = f.add_block("entry")?;
    let cond = f.add_block("loopCond")?;
    let body = f.add_block("loopBody")?;
    let after = f.add_block("afterLoop")?;

    f.jump(entry, "loopCond")?;

    let i = f.phi(cond)?;
    let result = f.phi(cond)?;
    let cmp = f.cmp(cond, CmpOp::Gt, i, one)?;
    f.cond_jump(cond, cmp, "loopBody", "afterLoop")?;

    let mul = f.binary(body, BinOp::Mul, result, i)?;
    let sub = f.binary(body, BinOp::Sub, i, one)?;
    f.jump(body, "loopCond")?;

    f.add_incoming(i, entry, n)?;
    f.add_incoming(i, body, sub)?;
    f.add_incoming(result, entry, one)?;
    f.add_incoming(result, body, mul)?;

    f.ret(after, Some(result))?;

    build_cfg(&mut f);
    Ok(f)
}

/// Recursive-style factorial with a base case
pub fn conditional_factorial() -> Result<Function> {
    let mut f = Function::new("conditional_factorial");
    let n = f.add_param("n");
    let one = f.add_constant(1, "one");

    let entry = f.add_block("entry")?;
    let check = f.add_block("check")?;
    let base = f.add_block("base")?;
    let recurse = f.add_block("recurse")?;

    f.jump(entry, "check")?;
    let cmp = f.cmp(check, CmpOp::Le, n, one)?;
    f.cond_jump(check, cmp, "base", "recurse")?;
    f.ret(base, Some(one))?;
    let n_minus_one = f.binary(recurse, BinOp::Sub, n, one)?;
    let result = f.binary(recurse, BinOp::Mul, n, n_minus_one)?;
    f.ret(recurse, Some(result))?;

    build_cfg(&mut f);
    Ok(f)
}

/// Straight-line arithmetic with foldable and simplifiable instructions
pub fn arithmetic() -> Result<Function> {
    let mut f = Function::new("arithmetic");
    let x = f.add_param("x");
    let zero = f.add_constant(0, "zero");
    let one = f.add_constant(1, "one");
    let two = f.add_constant(2, "two");
    let three = f.add_constant(3, "three");
    let five = f.add_constant(5, "five");
    let eight = f.add_constant(8, "eight");
    let all_ones = f.add_constant(-1, "all_ones");

    let entry = f.add_block("entry")?;
    let exit = f.add_block("exit")?;

    let a = f.binary(entry, BinOp::Mul, five, three)?;
    let b = f.binary(entry, BinOp::Shl, two, three)?;
    let c = f.binary(entry, BinOp::Mul, x, eight)?;
    let d = f.binary(entry, BinOp::And, c, all_ones)?;
    let e = f.binary(entry, BinOp::Mul, d, one)?;
    let g = f.binary(entry, BinOp::Shr, e, zero)?;
    let h = f.binary(entry, BinOp::Add, a, b)?;
    f.jump(entry, "exit")?;

    let sum = f.binary(exit, BinOp::Add, g, h)?;
    f.ret(exit, Some(sum))?;

    build_cfg(&mut f);
    Ok(f)
}

/// Every sample, in a stable order
pub fn program() -> Result<Program> {
    let mut program = Program::new();
    for func in [
        factorial()?,
        conditional_factorial()?,
        arithmetic()?,
        dominator_example()?,
        loop_graph_1()?,
        loop_graph_2()?,
        loop_graph_3()?,
        loop_graph_4()?,
        loop_graph_5()?,
    ] {
        program.push_function(func);
    }
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::verify_cfg;

    #[test]
    fn test_samples_have_consistent_cfgs() {
        let program = program().unwrap();
        assert_eq!(program.functions().len(), 9);
        for func in program.functions() {
            verify_cfg(func).unwrap();
        }
    }

    #[test]
    fn test_from_edges_rejects_duplicate_blocks() {
        assert!(from_edges("dup", &[("A", &[]), ("A", &[])]).is_err());
    }

    #[test]
    fn test_from_edges_shapes() {
        let func = from_edges("shapes", &[("A", &["B", "C"]), ("B", &["C"]), ("C", &[])]).unwrap();
        let a = func.entry().unwrap();
        assert_eq!(func.block(a).successors().len(), 2);
        let c = func.block_by_name("C").unwrap();
        assert_eq!(func.block(c).predecessors().len(), 2);
    }
}
