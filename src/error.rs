use thiserror::Error;

use crate::value::ValueKind;

/// Every fatal condition the engine can raise once a program is running.
///
/// There is no recovery: whichever handler first detects one of these returns it
/// straight out of [`crate::engine::Engine::run`]; the opcode dispatch loop never
/// continues past it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("undefined label \"{0}\"")]
    UndefinedLabel(String),

    #[error("redefinition of variable \"{0}\"")]
    VariableRedefined(String),

    #[error("operand type mismatch in {opcode}: {detail}")]
    TypeMismatch { opcode: &'static str, detail: String },

    #[error("access to undefined variable \"{0}\"")]
    UndefinedVariable(String),

    #[error("missing frame: {0}")]
    MissingFrame(&'static str),

    #[error("missing value: {0}")]
    MissingValue(&'static str),

    #[error("division by zero")]
    DivisionByZero,

    #[error("exit code {0} out of range [0, 49]")]
    ExitCodeOutOfRange(i64),

    #[error("bad string index {index} into a string of length {length}")]
    StringIndexOutOfRange { index: i64, length: usize },

    #[error("value {0} is not a valid Unicode codepoint")]
    InvalidCodepoint(i64),
}

impl RuntimeError {
    pub fn type_mismatch(opcode: &'static str, detail: impl Into<String>) -> RuntimeError {
        RuntimeError::TypeMismatch {
            opcode,
            detail: detail.into(),
        }
    }

    pub fn expected_kind(opcode: &'static str, expected: ValueKind, got: &str) -> RuntimeError {
        RuntimeError::type_mismatch(opcode, format!("expected {}, got {}", expected, got))
    }

    /// The process exit code this error maps to, per the interpreter's exit-code table.
    pub fn exit_code(&self) -> i32 {
        match self {
            RuntimeError::UndefinedLabel(_) | RuntimeError::VariableRedefined(_) => 52,
            RuntimeError::TypeMismatch { .. } => 53,
            RuntimeError::UndefinedVariable(_) => 54,
            RuntimeError::MissingFrame(_) => 55,
            RuntimeError::MissingValue(_) => 56,
            RuntimeError::DivisionByZero | RuntimeError::ExitCodeOutOfRange(_) => 57,
            RuntimeError::StringIndexOutOfRange { .. } | RuntimeError::InvalidCodepoint(_) => 58,
        }
    }
}

/// The outcome of running a whole program: either it ran to completion (carrying the
/// `EXIT` code or 0 for falling off the end of the instruction stream), or it was
/// stopped by a [`RuntimeError`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExitOutcome {
    Code(i32),
    Error(RuntimeError),
}

impl ExitOutcome {
    pub fn code(&self) -> i32 {
        match self {
            ExitOutcome::Code(c) => *c,
            ExitOutcome::Error(e) => e.exit_code(),
        }
    }
}

impl From<RuntimeError> for ExitOutcome {
    fn from(err: RuntimeError) -> Self {
        ExitOutcome::Error(err)
    }
}
