//! End-to-end tests that parse a small XML program through `ippcode23-loader` and run it
//! through `ippcode23::Engine`, asserting on the observable stdout and exit code — the
//! CLI binary itself is a thin wrapper over exactly this pipeline (see `src/main.rs`),
//! so these tests exercise it without spawning a subprocess.

use std::io::Cursor;

use ippcode23::Engine;

fn run_xml(xml: &str, input: &str) -> (String, i32) {
    let program = ippcode23_loader::load_program(Cursor::new(xml.as_bytes())).unwrap();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut engine = Engine::new(program, Cursor::new(input.as_bytes()), &mut stdout, &mut stderr);
    let code = match engine.run() {
        Ok(code) => code,
        Err(err) => err.exit_code(),
    };
    (String::from_utf8(stdout).unwrap(), code)
}

#[test]
fn hello_world() {
    let xml = r#"<program language="IPPcode23">
        <instruction order="1" opcode="DEFVAR"><arg1 type="var">GF@s</arg1></instruction>
        <instruction order="2" opcode="MOVE">
            <arg1 type="var">GF@s</arg1>
            <arg2 type="string">Hello\032World</arg2>
        </instruction>
        <instruction order="3" opcode="WRITE"><arg1 type="var">GF@s</arg1></instruction>
    </program>"#;
    let (stdout, code) = run_xml(xml, "");
    assert_eq!(stdout, "Hello World");
    assert_eq!(code, 0);
}

#[test]
fn sum_one_to_five_via_loop() {
    let xml = r#"<program language="IPPcode23">
        <instruction order="1" opcode="DEFVAR"><arg1 type="var">GF@sum</arg1></instruction>
        <instruction order="2" opcode="DEFVAR"><arg1 type="var">GF@i</arg1></instruction>
        <instruction order="3" opcode="MOVE"><arg1 type="var">GF@sum</arg1><arg2 type="int">0</arg2></instruction>
        <instruction order="4" opcode="MOVE"><arg1 type="var">GF@i</arg1><arg2 type="int">1</arg2></instruction>
        <instruction order="5" opcode="LABEL"><arg1 type="label">loop</arg1></instruction>
        <instruction order="6" opcode="JUMPIFEQ">
            <arg1 type="label">done</arg1>
            <arg2 type="var">GF@i</arg2>
            <arg3 type="int">6</arg3>
        </instruction>
        <instruction order="7" opcode="ADD">
            <arg1 type="var">GF@sum</arg1>
            <arg2 type="var">GF@sum</arg2>
            <arg3 type="var">GF@i</arg3>
        </instruction>
        <instruction order="8" opcode="ADD">
            <arg1 type="var">GF@i</arg1>
            <arg2 type="var">GF@i</arg2>
            <arg3 type="int">1</arg3>
        </instruction>
        <instruction order="9" opcode="JUMP"><arg1 type="label">loop</arg1></instruction>
        <instruction order="10" opcode="LABEL"><arg1 type="label">done</arg1></instruction>
        <instruction order="11" opcode="WRITE"><arg1 type="var">GF@sum</arg1></instruction>
    </program>"#;
    let (stdout, code) = run_xml(xml, "");
    assert_eq!(stdout, "15");
    assert_eq!(code, 0);
}

#[test]
fn division_by_zero_exits_57() {
    let xml = r#"<program language="IPPcode23">
        <instruction order="1" opcode="DEFVAR"><arg1 type="var">GF@r</arg1></instruction>
        <instruction order="2" opcode="IDIV">
            <arg1 type="var">GF@r</arg1>
            <arg2 type="int">1</arg2>
            <arg3 type="int">0</arg3>
        </instruction>
    </program>"#;
    let (_, code) = run_xml(xml, "");
    assert_eq!(code, 57);
}

#[test]
fn write_to_undefined_variable_exits_54() {
    let xml = r#"<program language="IPPcode23">
        <instruction order="1" opcode="WRITE"><arg1 type="var">GF@none</arg1></instruction>
    </program>"#;
    let (_, code) = run_xml(xml, "");
    assert_eq!(code, 54);
}

#[test]
fn malformed_xml_exits_31() {
    let program = ippcode23_loader::load_program(Cursor::new(b"<program language=\"IPPcode23\"><instr" as &[u8]));
    let err = program.unwrap_err();
    assert_eq!(err.exit_code(), 31);
}

#[test]
fn invalid_schema_exits_32() {
    let program = ippcode23_loader::load_program(Cursor::new(
        br#"<program language="IPPcode23"><instruction order="1" opcode="BOGUS"></instruction></program>"#
            as &[u8],
    ));
    let err = program.unwrap_err();
    assert_eq!(err.exit_code(), 32);
}
