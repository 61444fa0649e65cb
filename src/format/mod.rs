//! Intel-syntax rendering and output formats

mod csv;
mod json;

pub use self::csv::*;
pub use self::json::*;

use crate::air::{AirInstr, MemoryOperand, Operand};
use crate::arch::NameTables;
use crate::{Address, Disassembly, DisassemblyError};
use clap::ValueEnum;
use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

/// Supported output formats for disassembly results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output (default)
    #[default]
    Text,
    /// JSON format (single document)
    Json,
    /// JSON Lines format (one JSON object per line)
    #[value(name = "jsonl")]
    JsonLines,
    /// CSV format (comma-separated values)
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::JsonLines => write!(f, "jsonl"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "jsonl" | "jsonlines" => Ok(OutputFormat::JsonLines),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl OutputFormat {
    /// Get all available output formats
    pub fn available_formats() -> &'static [Self] {
        &[
            OutputFormat::Text,
            OutputFormat::Json,
            OutputFormat::JsonLines,
            OutputFormat::Csv,
        ]
    }

    /// Get a formatter for this output format, naming registers from `names`.
    pub fn get_formatter(&self, names: &'static NameTables) -> Box<dyn DisassemblyFormatter> {
        match self {
            OutputFormat::Text => Box::new(TextFormatter::new(names)),
            OutputFormat::Json => Box::new(JsonFormatter::new(names)),
            OutputFormat::JsonLines => Box::new(JsonLinesFormatter::new(names)),
            OutputFormat::Csv => Box::new(CsvFormatter::new(names)),
        }
    }
}

/// Formatter trait for disassembly output
pub trait DisassemblyFormatter {
    /// Format a disassembly result. `image` is the decoded input, used to
    /// print instruction bytes; `base_addr` is the address of its first byte.
    fn format(
        &self,
        disassembly: &Disassembly,
        image: &[u8],
        base_addr: Address,
    ) -> Result<String, DisassemblyError>;
}

/// Render one instruction as Intel-syntax assembly.
pub fn render_instr(instr: &AirInstr, names: &NameTables) -> String {
    let mut out = String::from(instr.kind.mnemonic());
    let operands = render_operands(instr, names);
    if !operands.is_empty() {
        out.push(' ');
        out.push_str(&operands);
    }
    out
}

/// Comma-separated operand list of `instr`.
pub fn render_operands(instr: &AirInstr, names: &NameTables) -> String {
    instr
        .operands
        .iter()
        .filter(|op| !op.is_none())
        .map(|op| render_operand(op, names))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn render_operand(op: &Operand, names: &NameTables) -> String {
    match op {
        Operand::Register { id, size } => names.register(*id, *size).to_string(),
        Operand::Memory(mem) => render_memory(mem, names),
        Operand::Immediate { value, .. } => signed_hex(*value),
        Operand::None => String::new(),
    }
}

fn render_memory(mem: &MemoryOperand, names: &NameTables) -> String {
    if let (true, Some(segment)) = (mem.is_segment_register(), mem.segment) {
        return names.segment(segment).to_string();
    }

    let reg_size = mem.address_size.register_size();
    let mut out = format!("{} ptr [", names.size_suffix(mem.data_size.index()));

    if let Some(base) = mem.base {
        out.push_str(names.register(base, reg_size));
    }
    if let Some(index) = mem.index {
        if mem.base.is_some() {
            out.push('+');
        }
        out.push_str(&format!("{}*{}", names.register(index, reg_size), mem.factor));
    }

    let bare = mem.base.is_none() && mem.index.is_none();
    let disp = mem.displacement;
    if disp < 0 {
        out.push_str(&format!("-{:#x}", disp.unsigned_abs()));
    } else if disp > 0 || bare {
        if !bare {
            out.push('+');
        }
        out.push_str(&format!("{:#x}", disp));
    }

    out.push(']');
    out
}

fn signed_hex(value: i64) -> String {
    if value < 0 {
        format!("-{:#x}", value.unsigned_abs())
    } else {
        format!("{:#x}", value)
    }
}

/// Space-separated hex of the instruction's bytes in `image`.
pub(crate) fn instr_bytes(instr: &AirInstr, image: &[u8]) -> String {
    image
        .get(instr.span())
        .unwrap_or_default()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn instr_address(instr: &AirInstr, base_addr: Address) -> Address {
    base_addr.wrapping_add(instr.offset as Address)
}

/// Format disassembly in plain text
pub struct TextFormatter {
    names: &'static NameTables,
}

impl TextFormatter {
    pub fn new(names: &'static NameTables) -> Self {
        Self { names }
    }
}

impl DisassemblyFormatter for TextFormatter {
    fn format(
        &self,
        disassembly: &Disassembly,
        image: &[u8],
        base_addr: Address,
    ) -> Result<String, DisassemblyError> {
        let mut output = format!(
            "Disassembly at 0x{:x} ({} instructions, {}):\n\n",
            base_addr,
            disassembly.instruction_count(),
            disassembly.exit
        );

        for instr in &disassembly.instructions {
            writeln!(
                output,
                "0x{:08x}: {:<24} {}",
                instr_address(instr, base_addr),
                instr_bytes(instr, image),
                render_instr(instr, self.names)
            )
            .map_err(|e| DisassemblyError::FormatError(e.to_string()))?;
        }

        Ok(output)
    }
}
