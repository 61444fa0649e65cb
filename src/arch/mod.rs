//! Architecture registry.
//!
//! The decode driver only talks to an [`ArchFrontend`]: one hook that
//! prepares the context for the next instruction (prefix scanning) and one
//! that decodes an instruction from its opcode. Adding a target means adding
//! a front end and a [`Frontend`] variant; the driver stays as it is.

use std::fmt;

use crate::air::{AirInstr, OperandSize, RegisterId, SegmentId};
use crate::context::DecodeContext;
use crate::decoder::DecodeError;
use crate::Architecture;

pub mod x86_64;

/// Placeholder for register and segment ids outside the tables.
pub const UNKNOWN_NAME: &str = "unk";
/// Placeholder for size suffix indices outside the table.
pub const UNKNOWN_SIZE: &str = "unk_size";

/// Capability pair implemented by each architecture, plus the name tables
/// renderers need.
pub trait ArchFrontend: Send + Sync {
    fn architecture(&self) -> Architecture;

    /// Consume whatever precedes the opcode and record it in `ctx`.
    fn init_instr(&self, ctx: &mut DecodeContext<'_>);

    /// Decode the rest of the instruction whose opcode byte has just been
    /// consumed, filling `out`.
    fn handle_instr(
        &self,
        ctx: &mut DecodeContext<'_>,
        opcode: u8,
        out: &mut AirInstr,
    ) -> Result<(), DecodeError>;

    fn names(&self) -> &'static NameTables;
}

/// Read-only name tables for rendering.
#[derive(Debug)]
pub struct NameTables {
    /// One row per register id: 16, 32 and 64-bit names.
    pub registers: &'static [[&'static str; 3]],
    pub segments: &'static [&'static str],
    /// Indexed 0..=2 for 16/32/64-bit data.
    pub size_suffixes: &'static [&'static str],
}

impl NameTables {
    pub fn register(&self, id: RegisterId, size: OperandSize) -> &'static str {
        self.registers
            .get(id.index())
            .map_or(UNKNOWN_NAME, |row| row[size.index()])
    }

    pub fn segment(&self, id: SegmentId) -> &'static str {
        self.segments.get(id.index()).copied().unwrap_or(UNKNOWN_NAME)
    }

    pub fn size_suffix(&self, index: usize) -> &'static str {
        self.size_suffixes.get(index).copied().unwrap_or(UNKNOWN_SIZE)
    }
}

/// Closed set of available front ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frontend {
    X86_64(x86_64::X86_64),
}

impl Frontend {
    /// Look up the front end registered for `arch`.
    pub fn for_architecture(arch: Architecture) -> Option<Self> {
        match arch {
            Architecture::X86_64 => Some(Frontend::X86_64(x86_64::X86_64)),
            _ => None,
        }
    }

    /// Architectures with a registered front end.
    pub fn supported() -> &'static [Architecture] {
        &[Architecture::X86_64]
    }
}

impl fmt::Display for Frontend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frontend::{}", self.architecture())
    }
}

impl ArchFrontend for Frontend {
    fn architecture(&self) -> Architecture {
        match self {
            Frontend::X86_64(inner) => inner.architecture(),
        }
    }

    fn init_instr(&self, ctx: &mut DecodeContext<'_>) {
        match self {
            Frontend::X86_64(inner) => inner.init_instr(ctx),
        }
    }

    fn handle_instr(
        &self,
        ctx: &mut DecodeContext<'_>,
        opcode: u8,
        out: &mut AirInstr,
    ) -> Result<(), DecodeError> {
        match self {
            Frontend::X86_64(inner) => inner.handle_instr(ctx, opcode, out),
        }
    }

    fn names(&self) -> &'static NameTables {
        match self {
            Frontend::X86_64(inner) => inner.names(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let frontend = Frontend::for_architecture(Architecture::X86_64).unwrap();
        assert_eq!(frontend.architecture(), Architecture::X86_64);
        assert_eq!(frontend.to_string(), "Frontend::x86-64");
    }

    #[test]
    fn test_unregistered_architectures() {
        assert!(Frontend::for_architecture(Architecture::AArch64).is_none());
        assert!(Frontend::for_architecture(Architecture::Unknown).is_none());
        assert_eq!(Frontend::supported(), &[Architecture::X86_64]);
    }

    #[test]
    fn test_name_table_placeholders() {
        let names = Frontend::X86_64(x86_64::X86_64).names();
        assert_eq!(names.register(RegisterId(200), OperandSize::Bits32), UNKNOWN_NAME);
        assert_eq!(names.size_suffix(usize::MAX), UNKNOWN_SIZE);
    }
}
