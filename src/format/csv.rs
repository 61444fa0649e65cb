//! CSV output formatter

use super::{instr_address, instr_bytes, render_operands, DisassemblyFormatter};
use crate::arch::NameTables;
use crate::{Address, Disassembly, DisassemblyError};

/// Format disassembly as CSV, one row per instruction
pub struct CsvFormatter {
    names: &'static NameTables,
}

impl CsvFormatter {
    pub fn new(names: &'static NameTables) -> Self {
        Self { names }
    }
}

fn csv_error(e: impl std::fmt::Display) -> DisassemblyError {
    DisassemblyError::FormatError(format!("CSV error: {}", e))
}

impl DisassemblyFormatter for CsvFormatter {
    fn format(
        &self,
        disassembly: &Disassembly,
        image: &[u8],
        base_addr: Address,
    ) -> Result<String, DisassemblyError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(["address", "length", "bytes", "mnemonic", "operands"])
            .map_err(csv_error)?;

        for instr in &disassembly.instructions {
            writer
                .write_record([
                    format!("0x{:x}", instr_address(instr, base_addr)),
                    instr.length.to_string(),
                    instr_bytes(instr, image),
                    instr.kind.mnemonic().to_string(),
                    render_operands(instr, self.names),
                ])
                .map_err(csv_error)?;
        }

        let data = writer.into_inner().map_err(csv_error)?;
        String::from_utf8(data).map_err(csv_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::x86_64::names::X86_64_NAMES;
    use crate::{disasm_with, Architecture, DecodeOptions};

    #[test]
    fn test_csv_output() {
        let code = [0x89, 0x44, 0x8B, 0xF8, 0x58];
        let result = disasm_with(&code, Architecture::X86_64, &DecodeOptions::default()).unwrap();
        let output = CsvFormatter::new(&X86_64_NAMES)
            .format(&result, &code, 0x2000)
            .unwrap();

        let mut reader = csv::Reader::from_reader(output.as_bytes());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            ["address", "length", "bytes", "mnemonic", "operands"]
        );

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "0x2000");
        assert_eq!(&rows[0][1], "4");
        assert_eq!(&rows[0][2], "89 44 8b f8");
        // Operand lists contain commas and must come back intact.
        assert_eq!(&rows[0][4], "dword ptr [rbx+rcx*4-0x8], eax");
        assert_eq!(&rows[1][3], "pop");
        assert_eq!(&rows[1][4], "rax");
    }

    #[test]
    fn test_csv_empty_input_has_header_only() {
        let result = disasm_with(&[], Architecture::X86_64, &DecodeOptions::default()).unwrap();
        let output = CsvFormatter::new(&X86_64_NAMES).format(&result, &[], 0).unwrap();
        assert_eq!(output, "address,length,bytes,mnemonic,operands\n");
    }
}
