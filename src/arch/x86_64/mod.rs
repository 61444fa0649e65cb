//! x86-64 front end: prefix/REX scanning and one-byte opcode dispatch.

pub mod handlers;
pub mod modrm;
pub mod names;
pub mod operand;
pub mod optable;
pub mod prefix;

pub use self::modrm::{ModRM, Sib};
pub use self::optable::InstrClass;
pub use self::prefix::Rex;

use crate::air::AirInstr;
use crate::arch::{ArchFrontend, NameTables};
use crate::context::DecodeContext;
use crate::decoder::DecodeError;
use crate::Architecture;

/// 64-bit mode x86 decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct X86_64;

impl ArchFrontend for X86_64 {
    fn architecture(&self) -> Architecture {
        Architecture::X86_64
    }

    fn init_instr(&self, ctx: &mut DecodeContext<'_>) {
        prefix::scan_prefixes(ctx);
    }

    fn handle_instr(
        &self,
        ctx: &mut DecodeContext<'_>,
        opcode: u8,
        out: &mut AirInstr,
    ) -> Result<(), DecodeError> {
        handlers::dispatch(ctx, opcode, out)
    }

    fn names(&self) -> &'static NameTables {
        &names::X86_64_NAMES
    }
}
