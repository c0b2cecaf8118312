//! Shared helpers for the engine test suite: small builders for instructions and a
//! `run` harness that executes a program against in-memory stdin/stdout/stderr buffers
//! and returns the observable outcome, mirroring the teacher's own
//! "construct instructions, run, assert on state" test harness.

use std::collections::HashMap;
use std::io::Cursor;

use crate::engine::Engine;
use crate::program::{Arg, ArgType, Instruction, Opcode, Program};
use crate::error::RuntimeError;

pub fn arg(arg_type: ArgType, text: &str) -> Arg {
    Arg {
        arg_type,
        text: text.to_string(),
    }
}

pub fn var(name: &str) -> Arg {
    arg(ArgType::Var, name)
}

pub fn instr(opcode: Opcode, args: Vec<Arg>) -> Instruction {
    Instruction { opcode, args }
}

pub struct Outcome {
    pub exit_code: Option<i32>,
    pub error: Option<RuntimeError>,
    pub stdout: String,
    pub stderr: String,
}

/// Builds a `Program` from `instructions` and `labels`, runs it against `input`, and
/// captures stdout/stderr. Never panics on a `RuntimeError` — callers inspect `outcome`.
pub fn run(instructions: Vec<Instruction>, labels: HashMap<String, usize>, input: &str) -> Outcome {
    let program = Program::new(instructions, labels);
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let result = {
        let mut engine = Engine::new(program, Cursor::new(input.as_bytes()), &mut stdout, &mut stderr);
        engine.run()
    };
    let (exit_code, error) = match result {
        Ok(code) => (Some(code), None),
        Err(err) => (None, Some(err)),
    };
    Outcome {
        exit_code,
        error,
        stdout: String::from_utf8(stdout).unwrap(),
        stderr: String::from_utf8(stderr).unwrap(),
    }
}

/// Convenience for tests that only care about the resulting exit code, whether it came
/// from `EXIT`/falling off the end or from a `RuntimeError`.
pub fn run_code(instructions: Vec<Instruction>, labels: HashMap<String, usize>, input: &str) -> i32 {
    let outcome = run(instructions, labels, input);
    match (outcome.exit_code, outcome.error) {
        (Some(code), _) => code,
        (None, Some(err)) => err.exit_code(),
        (None, None) => unreachable!(),
    }
}
