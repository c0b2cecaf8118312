use std::convert::TryFrom;
use std::io::{BufRead, Write};

use crate::error::RuntimeError;
use crate::frame::Frames;
use crate::program::{Arg, ArgType, Opcode, Program};
use crate::value::{decode_string_literal, Value, ValueKind};

/// Either a program ran to completion (falling off the end yields 0, `EXIT` yields its
/// own code) or it was stopped by a [`RuntimeError`].
pub type RunResult = Result<i32, RuntimeError>;

/// The interpreter loop: owns all mutable VM state and dispatches one instruction at a
/// time. Generic over the input/output streams so tests can swap in in-memory buffers
/// instead of real stdio.
pub struct Engine<R, W1, W2> {
    program: Program,
    frames: Frames,
    pc: usize,
    data_stack: Vec<Value>,
    call_stack: Vec<usize>,
    input: R,
    stdout: W1,
    stderr: W2,
    instructions_processed: u64,
}

/// Integer division rounding toward negative infinity, independent of the divisor's
/// sign (`i64::div_euclid` rounds toward non-negative remainder instead, which agrees
/// with floor division only when the divisor is positive). Uses the wrapping
/// operators so `i64::MIN / -1` (the one pair that overflows `i64`) wraps back to
/// `i64::MIN` instead of panicking; `b == 0` is guarded by the caller before this runs.
fn floor_div(a: i64, b: i64) -> i64 {
    let q = a.wrapping_div(b);
    let r = a.wrapping_rem(b);
    if r != 0 && (r < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

impl<R: BufRead, W1: Write, W2: Write> Engine<R, W1, W2> {
    pub fn new(program: Program, input: R, stdout: W1, stderr: W2) -> Engine<R, W1, W2> {
        Engine {
            program,
            frames: Frames::new(),
            pc: 0,
            data_stack: Vec::new(),
            call_stack: Vec::new(),
            input,
            stdout,
            stderr,
            instructions_processed: 0,
        }
    }

    /// Runs until `EXIT`, a `RuntimeError`, or the instruction stream is exhausted.
    pub fn run(&mut self) -> RunResult {
        while self.pc < self.program.instruction_count() {
            if let Some(code) = self.step()? {
                return Ok(code);
            }
        }
        Ok(0)
    }

    /// Executes the instruction at the current program counter. Returns `Ok(Some(code))`
    /// if the instruction was `EXIT`, `Ok(None)` to keep running, or `Err` on failure.
    fn step(&mut self) -> Result<Option<i32>, RuntimeError> {
        let instruction = self.program.instruction(self.pc).clone();
        self.instructions_processed += 1;
        let mut next_pc = self.pc + 1;

        use Opcode::*;
        match instruction.opcode {
            Move => {
                self.check_declared(instruction.arg(0))?;
                let value = self.symbol_value(instruction.arg(1))?;
                self.assign_var(instruction.arg(0), value)?;
            }
            Createframe => self.frames.create_frame(),
            Pushframe => self.frames.push_frame()?,
            Popframe => self.frames.pop_frame()?,
            Defvar => {
                let name = &instruction.arg(0).text;
                // contains() raises 55 first if the frame itself is missing.
                if self.frames.contains(name)? {
                    return Err(RuntimeError::VariableRedefined(name.clone()));
                }
                self.frames.declare(name)?;
            }
            Call => {
                let label = &instruction.arg(0).text;
                let target = self
                    .program
                    .resolve_label(label)
                    .ok_or_else(|| RuntimeError::UndefinedLabel(label.clone()))?;
                self.call_stack.push(next_pc);
                next_pc = target;
            }
            Return => {
                next_pc = self
                    .call_stack
                    .pop()
                    .ok_or(RuntimeError::MissingValue("call stack is empty"))?;
            }
            Pushs => {
                let value = self.symbol_value(instruction.arg(0))?;
                self.data_stack.push(value);
            }
            Pops => {
                self.check_declared(instruction.arg(0))?;
                let value = self
                    .data_stack
                    .pop()
                    .ok_or(RuntimeError::MissingValue("data stack is empty"))?;
                self.assign_var(instruction.arg(0), value)?;
            }
            Add | Sub | Mul | Idiv => {
                self.check_declared(instruction.arg(0))?;
                let a = self.symbol_int("arithmetic", instruction.arg(1))?;
                let b = self.symbol_int("arithmetic", instruction.arg(2))?;
                let result = match instruction.opcode {
                    Add => a.wrapping_add(b),
                    Sub => a.wrapping_sub(b),
                    Mul => a.wrapping_mul(b),
                    Idiv => {
                        if b == 0 {
                            return Err(RuntimeError::DivisionByZero);
                        }
                        floor_div(a, b)
                    }
                    _ => unreachable!(),
                };
                self.assign_var(instruction.arg(0), Value::Int(result))?;
            }
            Lt | Gt => {
                self.check_declared(instruction.arg(0))?;
                let a = self.symbol_value(instruction.arg(1))?;
                let b = self.symbol_value(instruction.arg(2))?;
                let ordering = Self::order_values("LT/GT", &a, &b)?;
                let result = match instruction.opcode {
                    Lt => ordering == std::cmp::Ordering::Less,
                    Gt => ordering == std::cmp::Ordering::Greater,
                    _ => unreachable!(),
                };
                self.assign_var(instruction.arg(0), Value::Bool(result))?;
            }
            Eq => {
                self.check_declared(instruction.arg(0))?;
                let a = self.symbol_value(instruction.arg(1))?;
                let b = self.symbol_value(instruction.arg(2))?;
                let result = Self::values_equal("EQ", &a, &b)?;
                self.assign_var(instruction.arg(0), Value::Bool(result))?;
            }
            And | Or => {
                self.check_declared(instruction.arg(0))?;
                let a = self.symbol_bool("AND/OR", instruction.arg(1))?;
                let b = self.symbol_bool("AND/OR", instruction.arg(2))?;
                let result = match instruction.opcode {
                    And => a && b,
                    Or => a || b,
                    _ => unreachable!(),
                };
                self.assign_var(instruction.arg(0), Value::Bool(result))?;
            }
            Not => {
                self.check_declared(instruction.arg(0))?;
                let a = self.symbol_bool("NOT", instruction.arg(1))?;
                self.assign_var(instruction.arg(0), Value::Bool(!a))?;
            }
            Int2char => {
                self.check_declared(instruction.arg(0))?;
                let code = self.symbol_int("INT2CHAR", instruction.arg(1))?;
                let ch = u32::try_from(code)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or(RuntimeError::InvalidCodepoint(code))?;
                self.assign_var(instruction.arg(0), Value::Str(ch.to_string()))?;
            }
            Stri2int => {
                self.check_declared(instruction.arg(0))?;
                let s = self.symbol_str("STRI2INT", instruction.arg(1))?;
                let idx = self.symbol_int("STRI2INT", instruction.arg(2))?;
                let ch = Self::char_at(&s, idx)?;
                self.assign_var(instruction.arg(0), Value::Int(ch as i64))?;
            }
            Read => {
                self.check_declared(instruction.arg(0))?;
                let kind = self.read_type(instruction.arg(1))?;
                let value = self.read_line_as(kind);
                self.assign_var(instruction.arg(0), value)?;
            }
            Write => {
                let value = self.symbol_value(instruction.arg(0))?;
                write!(self.stdout, "{}", value.render())
                    .expect("write to configured stdout sink failed");
            }
            Concat => {
                self.check_declared(instruction.arg(0))?;
                let a = self.symbol_str("CONCAT", instruction.arg(1))?;
                let b = self.symbol_str("CONCAT", instruction.arg(2))?;
                self.assign_var(instruction.arg(0), Value::Str(format!("{}{}", a, b)))?;
            }
            Strlen => {
                self.check_declared(instruction.arg(0))?;
                let s = self.symbol_str("STRLEN", instruction.arg(1))?;
                self.assign_var(instruction.arg(0), Value::Int(s.chars().count() as i64))?;
            }
            Getchar => {
                self.check_declared(instruction.arg(0))?;
                let s = self.symbol_str("GETCHAR", instruction.arg(1))?;
                let idx = self.symbol_int("GETCHAR", instruction.arg(2))?;
                let ch = Self::char_at(&s, idx)?;
                self.assign_var(instruction.arg(0), Value::Str(ch.to_string()))?;
            }
            Setchar => {
                self.check_declared(instruction.arg(0))?;
                let idx = self.symbol_int("SETCHAR", instruction.arg(1))?;
                let replacement = self.symbol_str("SETCHAR", instruction.arg(2))?;
                let name = &instruction.arg(0).text;
                let current = self.frames.value_of(name)?.clone();
                let base = match current.kind() {
                    Some(ValueKind::Str) => current.as_str().unwrap().to_string(),
                    _ => {
                        return Err(RuntimeError::expected_kind(
                            "SETCHAR",
                            ValueKind::Str,
                            current.type_name(),
                        ))
                    }
                };
                let replacement_ch = replacement
                    .chars()
                    .next()
                    .ok_or(RuntimeError::StringIndexOutOfRange {
                        index: idx,
                        length: 0,
                    })?;
                let mut chars: Vec<char> = base.chars().collect();
                if idx < 0 || idx as usize >= chars.len() {
                    return Err(RuntimeError::StringIndexOutOfRange {
                        index: idx,
                        length: chars.len(),
                    });
                }
                chars[idx as usize] = replacement_ch;
                self.frames.assign(name, Value::Str(chars.into_iter().collect()))?;
            }
            Type => {
                self.check_declared(instruction.arg(0))?;
                let name_or_literal = instruction.arg(1);
                let rendered = if name_or_literal.arg_type == ArgType::Var {
                    let value = self.frames.value_of_allow_uninit(&name_or_literal.text)?;
                    value.type_name().to_string()
                } else {
                    self.decode_literal(name_or_literal)?.type_name().to_string()
                };
                self.assign_var(instruction.arg(0), Value::Str(rendered))?;
            }
            Label => {}
            Jump => {
                let label = &instruction.arg(0).text;
                next_pc = self
                    .program
                    .resolve_label(label)
                    .ok_or_else(|| RuntimeError::UndefinedLabel(label.clone()))?;
            }
            Jumpifeq | Jumpifneq => {
                let a = self.symbol_value(instruction.arg(1))?;
                let b = self.symbol_value(instruction.arg(2))?;
                let equal = Self::values_equal("JUMPIFEQ/JUMPIFNEQ", &a, &b)?;
                let take = match instruction.opcode {
                    Jumpifeq => equal,
                    Jumpifneq => !equal,
                    _ => unreachable!(),
                };
                if take {
                    let label = &instruction.arg(0).text;
                    next_pc = self
                        .program
                        .resolve_label(label)
                        .ok_or_else(|| RuntimeError::UndefinedLabel(label.clone()))?;
                }
            }
            Exit => {
                let code = self.symbol_int("EXIT", instruction.arg(0))?;
                if !(0..=49).contains(&code) {
                    return Err(RuntimeError::ExitCodeOutOfRange(code));
                }
                self.pc = next_pc;
                return Ok(Some(code as i32));
            }
            Dprint => {
                let value = self.symbol_value(instruction.arg(0))?;
                write!(self.stderr, "{}", value.render())
                    .expect("write to configured stderr sink failed");
            }
            Break => self.dump_state(),
        }

        self.pc = next_pc;
        Ok(None)
    }

    fn decode_literal(&self, arg: &Arg) -> Result<Value, RuntimeError> {
        match arg.arg_type {
            ArgType::Int => arg
                .text
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| RuntimeError::type_mismatch("literal", format!("\"{}\" is not a valid int", arg.text))),
            ArgType::Bool => Ok(Value::Bool(arg.text == "true")),
            ArgType::Str => Ok(Value::Str(decode_string_literal(&arg.text))),
            ArgType::Nil => Ok(Value::Nil),
            ArgType::Var | ArgType::Label | ArgType::Type => {
                unreachable!("not a literal-bearing arg type")
            }
        }
    }

    /// Resolves an argument as a symbol: a `var` reference (checked defined + init) or a
    /// decoded literal.
    fn symbol_value(&self, arg: &Arg) -> Result<Value, RuntimeError> {
        match arg.arg_type {
            ArgType::Var => self.frames.value_of(&arg.text).cloned(),
            _ => self.decode_literal(arg),
        }
    }

    /// Checks that `arg` names a declared variable (54 if not, 55 if its frame is
    /// missing), without touching its value. Callers check the destination this way
    /// *before* resolving any operand symbols, mirroring `interpret.py`'s
    /// `check_var_defined` gate, which every var-writing handler runs first.
    fn check_declared(&self, arg: &Arg) -> Result<(), RuntimeError> {
        let name = &arg.text;
        if !self.frames.contains(name)? {
            return Err(RuntimeError::UndefinedVariable(name.clone()));
        }
        Ok(())
    }

    fn assign_var(&mut self, arg: &Arg, value: Value) -> Result<(), RuntimeError> {
        self.frames.assign(&arg.text, value)
    }

    fn symbol_int(&self, opcode: &'static str, arg: &Arg) -> Result<i64, RuntimeError> {
        let value = self.symbol_value(arg)?;
        value
            .as_int()
            .ok_or_else(|| RuntimeError::expected_kind(opcode, ValueKind::Int, value.type_name()))
    }

    fn symbol_str(&self, opcode: &'static str, arg: &Arg) -> Result<String, RuntimeError> {
        let value = self.symbol_value(arg)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RuntimeError::expected_kind(opcode, ValueKind::Str, value.type_name()))
    }

    fn symbol_bool(&self, opcode: &'static str, arg: &Arg) -> Result<bool, RuntimeError> {
        let value = self.symbol_value(arg)?;
        value
            .as_bool()
            .ok_or_else(|| RuntimeError::expected_kind(opcode, ValueKind::Bool, value.type_name()))
    }

    fn read_type(&self, arg: &Arg) -> Result<ValueKind, RuntimeError> {
        match arg.text.as_str() {
            "int" => Ok(ValueKind::Int),
            "bool" => Ok(ValueKind::Bool),
            "string" => Ok(ValueKind::Str),
            other => Err(RuntimeError::type_mismatch(
                "READ",
                format!("\"{}\" is not a readable type", other),
            )),
        }
    }

    /// READ never fails outward: a bad or missing line becomes NIL.
    fn read_line_as(&mut self, kind: ValueKind) -> Value {
        let mut line = String::new();
        let read = self.input.read_line(&mut line).unwrap_or(0);
        if read == 0 {
            return Value::Nil;
        }
        let line = line.trim_end_matches(['\n', '\r']);
        match kind {
            ValueKind::Int => line.parse::<i64>().map(Value::Int).unwrap_or(Value::Nil),
            ValueKind::Bool => Value::Bool(line.eq_ignore_ascii_case("true")),
            ValueKind::Str => Value::Str(line.to_string()),
            ValueKind::Nil => Value::Nil,
        }
    }

    fn char_at(s: &str, idx: i64) -> Result<char, RuntimeError> {
        if idx < 0 {
            return Err(RuntimeError::StringIndexOutOfRange {
                index: idx,
                length: s.chars().count(),
            });
        }
        s.chars().nth(idx as usize).ok_or(RuntimeError::StringIndexOutOfRange {
            index: idx,
            length: s.chars().count(),
        })
    }

    /// Shared ordering rule for LT/GT: same kind required, NIL is never orderable.
    fn order_values(opcode: &'static str, a: &Value, b: &Value) -> Result<std::cmp::Ordering, RuntimeError> {
        match (a, b) {
            (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
            (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
            (Value::Bool(x), Value::Bool(y)) => Ok(x.cmp(y)),
            _ => Err(RuntimeError::type_mismatch(
                opcode,
                format!("cannot order {} and {}", a.type_name(), b.type_name()),
            )),
        }
    }

    /// Shared equality rule for EQ/JUMPIFEQ/JUMPIFNEQ: NIL equals only NIL; same-kind
    /// non-NIL operands compare by value; mixed non-NIL kinds are a type error.
    fn values_equal(opcode: &'static str, a: &Value, b: &Value) -> Result<bool, RuntimeError> {
        match (a, b) {
            (Value::Nil, Value::Nil) => Ok(true),
            (Value::Nil, _) | (_, Value::Nil) => Ok(false),
            (Value::Int(x), Value::Int(y)) => Ok(x == y),
            (Value::Str(x), Value::Str(y)) => Ok(x == y),
            (Value::Bool(x), Value::Bool(y)) => Ok(x == y),
            _ => Err(RuntimeError::type_mismatch(
                opcode,
                format!("cannot compare {} and {}", a.type_name(), b.type_name()),
            )),
        }
    }

    fn dump_state(&mut self) {
        let _ = writeln!(self.stderr, "-- BREAK --");
        let _ = writeln!(self.stderr, "position: {}", self.pc);
        let _ = writeln!(self.stderr, "instructions processed: {}", self.instructions_processed);
        let _ = writeln!(self.stderr, "global frame:");
        for (name, value) in self.frames.global().entries() {
            let _ = writeln!(self.stderr, "  {} = {}", name, value.render());
        }
        for (depth, frame) in self.frames.locals().iter().enumerate() {
            let _ = writeln!(self.stderr, "local frame {}:", depth + 1);
            for (name, value) in frame.entries() {
                let _ = writeln!(self.stderr, "  {} = {}", name, value.render());
            }
        }
        match self.frames.temp() {
            Some(frame) => {
                let _ = writeln!(self.stderr, "temporary frame:");
                for (name, value) in frame.entries() {
                    let _ = writeln!(self.stderr, "  {} = {}", name, value.render());
                }
            }
            None => {
                let _ = writeln!(self.stderr, "temporary frame: not defined");
            }
        }
        let _ = writeln!(self.stderr, "call stack: {:?}", self.call_stack);
        let _ = writeln!(
            self.stderr,
            "data stack: {:?}",
            self.data_stack.iter().map(Value::render).collect::<Vec<_>>()
        );
    }
}
