//! JSON and JSON Lines output formatters

use serde::Serialize;

use super::{instr_address, instr_bytes, render_instr, render_operands, DisassemblyFormatter};
use crate::air::{AirInstr, AirKind, Operand};
use crate::arch::NameTables;
use crate::{Address, DecodeExit, Disassembly, DisassemblyError};

/// Serializable instruction for JSON output
#[derive(Serialize)]
struct InstructionJson<'a> {
    /// Address of the instruction
    address: String,
    /// Offset of the first byte in the decoded input
    offset: usize,
    /// Size of the instruction in bytes
    length: usize,
    /// Bytes of the instruction as hex string
    bytes: String,
    mnemonic: AirKind,
    operands: Vec<&'a Operand>,
    /// Intel-syntax rendering
    text: String,
}

/// Serializable disassembly result for JSON output
#[derive(Serialize)]
struct DisassemblyJson<'a> {
    base_address: String,
    exit: &'a DecodeExit,
    discarded: usize,
    instructions: Vec<InstructionJson<'a>>,
}

fn instruction_to_json<'a>(
    instr: &'a AirInstr,
    image: &[u8],
    base_addr: Address,
    names: &NameTables,
) -> InstructionJson<'a> {
    InstructionJson {
        address: format!("0x{:x}", instr_address(instr, base_addr)),
        offset: instr.offset,
        length: instr.length,
        bytes: instr_bytes(instr, image),
        mnemonic: instr.kind,
        operands: instr.operands.iter().filter(|op| !op.is_none()).collect(),
        text: render_instr(instr, names),
    }
}

fn json_error(e: serde_json::Error) -> DisassemblyError {
    DisassemblyError::FormatError(format!("JSON serialization error: {}", e))
}

/// Format disassembly as one pretty-printed JSON document
pub struct JsonFormatter {
    names: &'static NameTables,
}

impl JsonFormatter {
    pub fn new(names: &'static NameTables) -> Self {
        Self { names }
    }
}

impl DisassemblyFormatter for JsonFormatter {
    fn format(
        &self,
        disassembly: &Disassembly,
        image: &[u8],
        base_addr: Address,
    ) -> Result<String, DisassemblyError> {
        let result = DisassemblyJson {
            base_address: format!("0x{:x}", base_addr),
            exit: &disassembly.exit,
            discarded: disassembly.discarded,
            instructions: disassembly
                .instructions
                .iter()
                .map(|instr| instruction_to_json(instr, image, base_addr, self.names))
                .collect(),
        };

        serde_json::to_string_pretty(&result).map_err(json_error)
    }
}

/// Format disassembly as JSON Lines, one compact object per instruction
pub struct JsonLinesFormatter {
    names: &'static NameTables,
}

impl JsonLinesFormatter {
    pub fn new(names: &'static NameTables) -> Self {
        Self { names }
    }
}

impl DisassemblyFormatter for JsonLinesFormatter {
    fn format(
        &self,
        disassembly: &Disassembly,
        image: &[u8],
        base_addr: Address,
    ) -> Result<String, DisassemblyError> {
        let mut output = String::new();

        for instr in &disassembly.instructions {
            let line = serde_json::json!({
                "address": format!("0x{:x}", instr_address(instr, base_addr)),
                "length": instr.length,
                "bytes": instr_bytes(instr, image),
                "mnemonic": instr.kind.mnemonic(),
                "operands": render_operands(instr, self.names),
            });
            output.push_str(&serde_json::to_string(&line).map_err(json_error)?);
            output.push('\n');
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::x86_64::names::X86_64_NAMES;
    use crate::{disasm_with, Architecture, DecodeOptions};
    use serde_json::Value;

    fn decode(code: &[u8]) -> Disassembly {
        disasm_with(code, Architecture::X86_64, &DecodeOptions::default()).unwrap()
    }

    #[test]
    fn test_json_document() {
        let code = [0x41, 0x50, 0x89, 0xC1];
        let output = JsonFormatter::new(&X86_64_NAMES)
            .format(&decode(&code), &code, 0x400000)
            .unwrap();
        let doc: Value = serde_json::from_str(&output).unwrap();

        assert_eq!(doc["base_address"], "0x400000");
        assert_eq!(doc["exit"]["state"], "done");
        assert_eq!(doc["discarded"], 0);

        let instructions = doc["instructions"].as_array().unwrap();
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[0]["address"], "0x400000");
        assert_eq!(instructions[0]["mnemonic"], "push");
        assert_eq!(instructions[0]["text"], "push r8");
        assert_eq!(instructions[0]["operands"][0]["type"], "register");
        assert_eq!(instructions[0]["operands"][0]["id"], 8);
        assert_eq!(instructions[1]["address"], "0x400002");
        assert_eq!(instructions[1]["bytes"], "89 c1");
        assert_eq!(instructions[1]["operands"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_json_reports_truncation() {
        let code = [0x50, 0x8F];
        let output = JsonFormatter::new(&X86_64_NAMES)
            .format(&decode(&code), &code, 0)
            .unwrap();
        let doc: Value = serde_json::from_str(&output).unwrap();

        assert_eq!(doc["exit"]["state"], "truncated");
        assert_eq!(doc["exit"]["offset"], 1);
        assert_eq!(doc["exit"]["error"]["kind"], "truncated");
    }

    #[test]
    fn test_json_lines() {
        let code = [0x55, 0x48, 0x89, 0xE5, 0x5D];
        let output = JsonLinesFormatter::new(&X86_64_NAMES)
            .format(&decode(&code), &code, 0x1000)
            .unwrap();

        let lines: Vec<Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1]["address"], "0x1001");
        assert_eq!(lines[1]["mnemonic"], "mov");
        assert_eq!(lines[1]["operands"], "rbp, rsp");
        assert_eq!(lines[2]["length"], 1);
    }
}
