pub mod engine;
pub mod error;
pub mod frame;
pub mod program;
pub mod value;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests;

pub use engine::Engine;
pub use error::{ExitOutcome, RuntimeError};
pub use frame::{Frame, Frames};
pub use program::{Arg, ArgType, Instruction, Opcode, Program};
pub use value::{Value, ValueKind};
