use std::collections::HashMap;

use crate::program::{ArgType, Opcode};
use crate::test_support::{arg, instr, run, run_code, var};

fn bool_result(opcode: Opcode, a: (ArgType, &str), b: (ArgType, &str)) -> String {
    let instructions = vec![
        instr(Opcode::Defvar, vec![var("GF@r")]),
        instr(opcode, vec![var("GF@r"), arg(a.0, a.1), arg(b.0, b.1)]),
        instr(Opcode::Write, vec![var("GF@r")]),
    ];
    let outcome = run(instructions, HashMap::new(), "");
    assert_eq!(outcome.exit_code, Some(0));
    outcome.stdout
}

#[test]
fn lt_gt_order_same_kind_operands() {
    assert_eq!(
        bool_result(Opcode::Lt, (ArgType::Int, "1"), (ArgType::Int, "2")),
        "true"
    );
    assert_eq!(
        bool_result(Opcode::Gt, (ArgType::Str, "b"), (ArgType::Str, "a")),
        "true"
    );
    assert_eq!(
        bool_result(Opcode::Lt, (ArgType::Bool, "false"), (ArgType::Bool, "true")),
        "true"
    );
}

#[test]
fn lt_with_nil_is_53() {
    let instructions = vec![
        instr(Opcode::Defvar, vec![var("GF@r")]),
        instr(
            Opcode::Lt,
            vec![var("GF@r"), arg(ArgType::Nil, "nil"), arg(ArgType::Int, "1")],
        ),
    ];
    assert_eq!(run_code(instructions, HashMap::new(), ""), 53);
}

#[test]
fn eq_nil_equals_only_nil() {
    assert_eq!(
        bool_result(Opcode::Eq, (ArgType::Nil, "nil"), (ArgType::Nil, "nil")),
        "true"
    );
    assert_eq!(
        bool_result(Opcode::Eq, (ArgType::Nil, "nil"), (ArgType::Int, "0")),
        "false"
    );
}

#[test]
fn eq_same_kind_by_value() {
    assert_eq!(
        bool_result(Opcode::Eq, (ArgType::Int, "5"), (ArgType::Int, "5")),
        "true"
    );
    assert_eq!(
        bool_result(Opcode::Eq, (ArgType::Str, "a"), (ArgType::Str, "b")),
        "false"
    );
}

#[test]
fn eq_mixed_non_nil_kinds_is_53() {
    let instructions = vec![
        instr(Opcode::Defvar, vec![var("GF@r")]),
        instr(
            Opcode::Eq,
            vec![var("GF@r"), arg(ArgType::Int, "0"), arg(ArgType::Str, "0")],
        ),
    ];
    assert_eq!(run_code(instructions, HashMap::new(), ""), 53);
}

#[test]
fn logic_operators() {
    let instructions = vec![
        instr(Opcode::Defvar, vec![var("GF@a")]),
        instr(
            Opcode::And,
            vec![var("GF@a"), arg(ArgType::Bool, "true"), arg(ArgType::Bool, "false")],
        ),
        instr(Opcode::Write, vec![var("GF@a")]),
        instr(Opcode::Defvar, vec![var("GF@b")]),
        instr(
            Opcode::Or,
            vec![var("GF@b"), arg(ArgType::Bool, "true"), arg(ArgType::Bool, "false")],
        ),
        instr(Opcode::Write, vec![var("GF@b")]),
        instr(Opcode::Defvar, vec![var("GF@c")]),
        instr(Opcode::Not, vec![var("GF@c"), arg(ArgType::Bool, "false")]),
        instr(Opcode::Write, vec![var("GF@c")]),
    ];
    let outcome = run(instructions, HashMap::new(), "");
    assert_eq!(outcome.exit_code, Some(0));
    assert_eq!(outcome.stdout, "falsetruetrue");
}
