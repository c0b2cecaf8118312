use std::collections::HashMap;

use crate::error::RuntimeError;
use crate::value::{Value, ValueKind};

/// A single named scope holding variables. Declaring a name sets it to `Value::Uninit`;
/// `assign` overwrites an already-declared name in place.
#[derive(Default, Debug)]
pub struct Frame {
    vars: HashMap<String, Value>,
}

impl Frame {
    pub fn new() -> Frame {
        Frame {
            vars: HashMap::new(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn declare(&mut self, name: &str) {
        self.vars.insert(name.to_string(), Value::Uninit);
    }

    pub fn assign(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    pub fn value_of(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn type_of(&self, name: &str) -> Option<ValueKind> {
        self.vars.get(name).and_then(Value::kind)
    }

    /// Entries in insertion-nondeterministic (`HashMap`) order, used only by `BREAK`'s
    /// diagnostic dump where ordering is not load-bearing.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// The qualified frame prefix of a variable name, e.g. `GF`/`LF`/`TF` in `GF@x`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramePrefix {
    Global,
    Local,
    Temporary,
}

/// Splits a qualified variable name like `GF@counter` into its frame prefix and local
/// name. Malformed names (missing `@`, unknown prefix) are a loader-time concern — by
/// the time the engine sees a `var` argument it has already been validated, so this
/// panics rather than returning a `Result`, matching the crate's invariant that only
/// validated `Instruction`s reach the engine.
pub fn split_qualified_name(name: &str) -> (FramePrefix, &str) {
    let prefix = match &name[0..2] {
        "GF" => FramePrefix::Global,
        "LF" => FramePrefix::Local,
        "TF" => FramePrefix::Temporary,
        other => panic!("unrecognized frame prefix \"{}\" in \"{}\"", other, name),
    };
    (prefix, &name[3..])
}

/// Owns the three-frame model: the single global frame, the local-frame stack, and the
/// optional temporary frame. This is the "frame resolver" from the spec: given a
/// qualified name it picks the frame the name's prefix designates.
#[derive(Default)]
pub struct Frames {
    global: Frame,
    locals: Vec<Frame>,
    temp: Option<Frame>,
}

impl Frames {
    pub fn new() -> Frames {
        Frames {
            global: Frame::new(),
            locals: Vec::new(),
            temp: None,
        }
    }

    fn resolve(&self, name: &str) -> Result<(&Frame, &str), RuntimeError> {
        let (prefix, local) = split_qualified_name(name);
        let frame = match prefix {
            FramePrefix::Global => &self.global,
            FramePrefix::Local => self
                .locals
                .last()
                .ok_or(RuntimeError::MissingFrame("local frame stack is empty"))?,
            FramePrefix::Temporary => self
                .temp
                .as_ref()
                .ok_or(RuntimeError::MissingFrame("temporary frame is not defined"))?,
        };
        Ok((frame, local))
    }

    fn resolve_mut(&mut self, name: &str) -> Result<(&mut Frame, &str), RuntimeError> {
        let (prefix, local) = split_qualified_name(name);
        let frame = match prefix {
            FramePrefix::Global => &mut self.global,
            FramePrefix::Local => self
                .locals
                .last_mut()
                .ok_or(RuntimeError::MissingFrame("local frame stack is empty"))?,
            FramePrefix::Temporary => self
                .temp
                .as_mut()
                .ok_or(RuntimeError::MissingFrame("temporary frame is not defined"))?,
        };
        Ok((frame, local))
    }

    pub fn contains(&self, name: &str) -> Result<bool, RuntimeError> {
        let (frame, local) = self.resolve(name)?;
        Ok(frame.contains(local))
    }

    pub fn declare(&mut self, name: &str) -> Result<(), RuntimeError> {
        let (frame, local) = self.resolve_mut(name)?;
        frame.declare(local);
        Ok(())
    }

    pub fn assign(&mut self, name: &str, value: Value) -> Result<(), RuntimeError> {
        let (frame, local) = self.resolve_mut(name)?;
        frame.assign(local, value);
        Ok(())
    }

    /// Resolves a `var` argument to its current value, checking that it is both
    /// declared (54) and initialized (56).
    pub fn value_of(&self, name: &str) -> Result<&Value, RuntimeError> {
        let (frame, local) = self.resolve(name)?;
        let value = frame
            .value_of(local)
            .ok_or_else(|| RuntimeError::UndefinedVariable(name.to_string()))?;
        if value.is_uninit() {
            return Err(RuntimeError::MissingValue("variable has not been assigned a value"));
        }
        Ok(value)
    }

    /// Like [`Frames::value_of`] but does not reject `Uninit` — used by `TYPE`, which
    /// must distinguish "undeclared" (54) from "declared but uninitialized" (empty
    /// string) rather than treating both the same way.
    pub fn value_of_allow_uninit(&self, name: &str) -> Result<&Value, RuntimeError> {
        let (frame, local) = self.resolve(name)?;
        frame
            .value_of(local)
            .ok_or_else(|| RuntimeError::UndefinedVariable(name.to_string()))
    }

    pub fn create_frame(&mut self) {
        self.temp = Some(Frame::new());
    }

    pub fn push_frame(&mut self) -> Result<(), RuntimeError> {
        let frame = self
            .temp
            .take()
            .ok_or(RuntimeError::MissingFrame("temporary frame is not defined"))?;
        self.locals.push(frame);
        Ok(())
    }

    pub fn pop_frame(&mut self) -> Result<(), RuntimeError> {
        let frame = self
            .locals
            .pop()
            .ok_or(RuntimeError::MissingFrame("local frame stack is empty"))?;
        self.temp = Some(frame);
        Ok(())
    }

    pub fn global(&self) -> &Frame {
        &self.global
    }

    pub fn locals(&self) -> &[Frame] {
        &self.locals
    }

    pub fn temp(&self) -> Option<&Frame> {
        self.temp.as_ref()
    }
}
