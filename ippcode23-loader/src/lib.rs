//! Parses an IPPcode23 XML source document into an [`ippcode23::Program`].
//!
//! The engine crate never imports an XML library; this crate owns every XML-specific
//! concern (schema validation, attribute decoding, label-table construction) and hands
//! the engine only the already-validated [`ippcode23::Program`] shape.

use std::collections::{HashMap, HashSet};
use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use ippcode23::{Arg, ArgType, Instruction, Opcode, Program};
use util::EnumFromStr;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("malformed xml: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("xml does not conform to the IPPcode23 program structure: {0}")]
    Malformed(String),

    #[error("label \"{0}\" is defined more than once")]
    DuplicateLabel(String),
}

impl LoadError {
    /// The process exit code this error maps to: 31 for XML that doesn't even parse,
    /// 32 for XML that parses but violates the IPPcode23 schema, 52 for a duplicate
    /// label (a semantic error caught at load time rather than at CALL/JUMP time).
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::Xml(_) => 31,
            LoadError::Malformed(_) => 32,
            LoadError::DuplicateLabel(_) => 52,
        }
    }
}

fn malformed(msg: impl Into<String>) -> LoadError {
    LoadError::Malformed(msg.into())
}

struct RawArg {
    slot: usize,
    arg_type: ArgType,
    text: String,
}

struct RawInstruction {
    order: i64,
    opcode: Opcode,
    args: Vec<RawArg>,
}

/// Reads and validates an IPPcode23 XML program from `input`, returning the ready-to-run
/// [`Program`] or the [`LoadError`] describing the first violation found.
pub fn load_program<R: BufRead>(input: R) -> Result<Program, LoadError> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut raw_instructions: Vec<RawInstruction> = Vec::new();
    let mut seen_orders: HashSet<i64> = HashSet::new();
    let mut current_instruction: Option<RawInstruction> = None;
    let mut current_arg: Option<(usize, ArgType, String)> = None;
    let mut saw_root = false;
    let mut root_closed = false;

    loop {
        match reader.read_event(&mut buf)? {
            Event::Start(ref e) => match e.name() {
                b"program" => {
                    if saw_root {
                        return Err(malformed("more than one root element"));
                    }
                    saw_root = true;
                    validate_program_attrs(e, &reader)?;
                }
                b"instruction" => {
                    if current_instruction.is_some() {
                        return Err(malformed("nested instruction element"));
                    }
                    if !saw_root {
                        return Err(malformed("instruction element outside program root"));
                    }
                    let (order, opcode) = parse_instruction_attrs(e, &reader)?;
                    if !seen_orders.insert(order) {
                        return Err(malformed(format!("duplicate order {}", order)));
                    }
                    current_instruction = Some(RawInstruction {
                        order,
                        opcode,
                        args: Vec::new(),
                    });
                }
                b"arg1" | b"arg2" | b"arg3" => {
                    if current_arg.is_some() {
                        return Err(malformed("nested argument element"));
                    }
                    let slot = arg_slot(e.name())?;
                    let arg_type = parse_arg_type(e, &reader)?;
                    current_arg = Some((slot, arg_type, String::new()));
                }
                _ => return Err(malformed(format!("unexpected element <{}>", tag_name(e.name())))),
            },
            Event::Empty(ref e) => match e.name() {
                b"program" => {
                    if saw_root {
                        return Err(malformed("more than one root element"));
                    }
                    saw_root = true;
                    root_closed = true;
                    validate_program_attrs(e, &reader)?;
                }
                b"instruction" => {
                    if !saw_root {
                        return Err(malformed("instruction element outside program root"));
                    }
                    let (order, opcode) = parse_instruction_attrs(e, &reader)?;
                    if !seen_orders.insert(order) {
                        return Err(malformed(format!("duplicate order {}", order)));
                    }
                    raw_instructions.push(RawInstruction {
                        order,
                        opcode,
                        args: Vec::new(),
                    });
                }
                b"arg1" | b"arg2" | b"arg3" => {
                    let slot = arg_slot(e.name())?;
                    let arg_type = parse_arg_type(e, &reader)?;
                    let instruction = current_instruction
                        .as_mut()
                        .ok_or_else(|| malformed("argument element outside instruction"))?;
                    instruction.args.push(RawArg {
                        slot,
                        arg_type,
                        text: String::new(),
                    });
                }
                _ => return Err(malformed(format!("unexpected element <{}>", tag_name(e.name())))),
            },
            Event::Text(e) => {
                if let Some((_, _, text)) = current_arg.as_mut() {
                    text.push_str(&e.unescape_and_decode(&reader)?);
                }
            }
            Event::End(ref e) => match e.name() {
                b"program" => {
                    root_closed = true;
                    break;
                }
                b"instruction" => {
                    let instruction = current_instruction
                        .take()
                        .ok_or_else(|| malformed("unmatched closing instruction element"))?;
                    raw_instructions.push(instruction);
                }
                b"arg1" | b"arg2" | b"arg3" => {
                    let (slot, arg_type, text) = current_arg
                        .take()
                        .ok_or_else(|| malformed("unmatched closing argument element"))?;
                    let instruction = current_instruction
                        .as_mut()
                        .ok_or_else(|| malformed("argument element outside instruction"))?;
                    instruction.args.push(RawArg { slot, arg_type, text });
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(malformed("missing program root element"));
    }
    if !root_closed {
        return Err(malformed("unexpected end of document: <program> was never closed"));
    }
    if current_instruction.is_some() {
        return Err(malformed("unexpected end of document inside <instruction>"));
    }

    build_program(raw_instructions)
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn arg_slot(name: &[u8]) -> Result<usize, LoadError> {
    match name {
        b"arg1" => Ok(0),
        b"arg2" => Ok(1),
        b"arg3" => Ok(2),
        _ => Err(malformed(format!("unexpected argument element <{}>", tag_name(name)))),
    }
}

fn attr_value<R: BufRead>(
    e: &BytesStart,
    reader: &Reader<R>,
    name: &str,
) -> Result<Option<String>, LoadError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key == name.as_bytes() {
            return Ok(Some(attr.unescape_and_decode_value(reader)?));
        }
    }
    Ok(None)
}

fn attr_names(e: &BytesStart) -> Result<HashSet<String>, LoadError> {
    let mut names = HashSet::new();
    for attr in e.attributes() {
        let attr = attr?;
        names.insert(String::from_utf8_lossy(attr.key).into_owned());
    }
    Ok(names)
}

fn validate_program_attrs<R: BufRead>(e: &BytesStart, reader: &Reader<R>) -> Result<(), LoadError> {
    let allowed: HashSet<&str> = ["language", "name", "description"].iter().copied().collect();
    for name in attr_names(e)? {
        if !allowed.contains(name.as_str()) {
            return Err(malformed(format!("unexpected attribute \"{}\" on <program>", name)));
        }
    }
    match attr_value(e, reader, "language")? {
        Some(ref lang) if lang == "IPPcode23" => Ok(()),
        Some(other) => Err(malformed(format!("unsupported language \"{}\"", other))),
        None => Err(malformed("missing required \"language\" attribute on <program>")),
    }
}

fn parse_instruction_attrs<R: BufRead>(
    e: &BytesStart,
    reader: &Reader<R>,
) -> Result<(i64, Opcode), LoadError> {
    let allowed: HashSet<&str> = ["order", "opcode"].iter().copied().collect();
    for name in attr_names(e)? {
        if !allowed.contains(name.as_str()) {
            return Err(malformed(format!("unexpected attribute \"{}\" on <instruction>", name)));
        }
    }
    let order = attr_value(e, reader, "order")?
        .ok_or_else(|| malformed("missing required \"order\" attribute on <instruction>"))?;
    let order: i64 = order
        .parse()
        .map_err(|_| malformed(format!("\"{}\" is not a valid order", order)))?;
    if order < 1 {
        return Err(malformed(format!("order {} is not a positive integer", order)));
    }
    let opcode = attr_value(e, reader, "opcode")?
        .ok_or_else(|| malformed("missing required \"opcode\" attribute on <instruction>"))?;
    let opcode = Opcode::from_str(&opcode.to_ascii_uppercase())
        .map_err(|err| malformed(err.to_string()))?;
    Ok((order, opcode))
}

fn parse_arg_type<R: BufRead>(e: &BytesStart, reader: &Reader<R>) -> Result<ArgType, LoadError> {
    let allowed: HashSet<&str> = ["type"].iter().copied().collect();
    for name in attr_names(e)? {
        if !allowed.contains(name.as_str()) {
            return Err(malformed(format!(
                "unexpected attribute \"{}\" on <{}>",
                name,
                tag_name(e.name())
            )));
        }
    }
    let type_name = attr_value(e, reader, "type")?
        .ok_or_else(|| malformed("missing required \"type\" attribute on argument element"))?;
    ArgType::from_str(&type_name).map_err(|err| malformed(err.to_string()))
}

fn build_program(mut raw_instructions: Vec<RawInstruction>) -> Result<Program, LoadError> {
    raw_instructions.sort_by_key(|instr| instr.order);

    let mut instructions = Vec::with_capacity(raw_instructions.len());
    let mut labels: HashMap<String, usize> = HashMap::new();

    for (index, mut raw) in raw_instructions.into_iter().enumerate() {
        raw.args.sort_by_key(|arg| arg.slot);
        let expected_arity = raw.opcode.arity();
        if raw.args.len() != expected_arity {
            return Err(malformed(format!(
                "{} expects {} argument(s), found {}",
                raw.opcode.name(),
                expected_arity,
                raw.args.len()
            )));
        }
        for (expected_slot, arg) in raw.args.iter().enumerate() {
            if arg.slot != expected_slot {
                return Err(malformed(format!(
                    "{} arguments are not densely numbered starting at arg1",
                    raw.opcode.name()
                )));
            }
        }

        let args: Vec<Arg> = raw
            .args
            .into_iter()
            .map(|a| Arg {
                arg_type: a.arg_type,
                text: a.text,
            })
            .collect();

        if raw.opcode == Opcode::Label {
            let label_name = args[0].text.clone();
            if labels.insert(label_name.clone(), index).is_some() {
                return Err(LoadError::DuplicateLabel(label_name));
            }
        }

        instructions.push(Instruction {
            opcode: raw.opcode,
            args,
        });
    }

    Ok(Program::new(instructions, labels))
}
