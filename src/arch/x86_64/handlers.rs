//! Per-class instruction handlers.
//!
//! A handler is entered with the cursor just past the opcode byte. It reads
//! whatever else the encoding needs and fills `out`; the driver takes care
//! of the length and of committing or discarding the slot.

use crate::air::{AirInstr, AirKind, MemoryOperand, Operand, OperandSize, RegisterId, SegmentId};
use crate::context::DecodeContext;
use crate::decoder::DecodeError;

use super::modrm::ModRM;
use super::operand::{
    reg_operand, resolve_memory, resolve_operand_size, rm_register_operand,
};
use super::optable::{classify, InstrClass};

/// Second bytes of the two-byte pop-segment forms.
const POP_FS: u8 = 0xA1;
const POP_GS: u8 = 0xA9;

/// Route `opcode` to the handler of its class.
pub fn dispatch(
    ctx: &mut DecodeContext<'_>,
    opcode: u8,
    out: &mut AirInstr,
) -> Result<(), DecodeError> {
    match classify(opcode) {
        InstrClass::PushReg => push_reg(ctx, opcode, out),
        InstrClass::PopReg => pop_reg(ctx, opcode, out),
        InstrClass::PopSegReg => pop_seg_reg(ctx, opcode, out),
        InstrClass::PopRegMem => pop_reg_mem(ctx, out),
        InstrClass::MovRegMemReg => mov_reg_mem_reg(ctx, out),
        InstrClass::Unclassified => Err(DecodeError::unclassified(opcode_offset(ctx), opcode)),
    }
}

/// Offset of the opcode byte. Only valid before anything past it is read.
fn opcode_offset(ctx: &DecodeContext<'_>) -> usize {
    ctx.position().saturating_sub(1)
}

/// Register encoded in the low three opcode bits, REX.B applied.
fn opcode_register(ctx: &DecodeContext<'_>, opcode: u8) -> Operand {
    let id = ctx.extend_with_rex_b(opcode & 0x7);
    Operand::register(RegisterId(id), resolve_operand_size(ctx, OperandSize::Bits64))
}

fn push_reg(ctx: &mut DecodeContext<'_>, opcode: u8, out: &mut AirInstr) -> Result<(), DecodeError> {
    out.unary(AirKind::Push, opcode_register(ctx, opcode));
    Ok(())
}

fn pop_reg(ctx: &mut DecodeContext<'_>, opcode: u8, out: &mut AirInstr) -> Result<(), DecodeError> {
    out.unary(AirKind::Pop, opcode_register(ctx, opcode));
    Ok(())
}

/// `pop es/ss/ds`, plus `0F A1` (fs) and `0F A9` (gs). This is the only
/// two-byte opcode the table knows about.
fn pop_seg_reg(ctx: &mut DecodeContext<'_>, opcode: u8, out: &mut AirInstr) -> Result<(), DecodeError> {
    let offset = opcode_offset(ctx);
    let segment = match opcode {
        0x07 => SegmentId::Es,
        0x17 => SegmentId::Ss,
        0x1F => SegmentId::Ds,
        0x0F => match ctx.read_u8()? {
            POP_FS => SegmentId::Fs,
            POP_GS => SegmentId::Gs,
            other => {
                return Err(DecodeError::invalid_encoding(
                    offset,
                    format!("0f {other:02x} is not a segment pop"),
                ))
            }
        },
        _ => return Err(DecodeError::unclassified(offset, opcode)),
    };

    let size = resolve_operand_size(ctx, OperandSize::Bits64);
    out.unary(AirKind::Pop, Operand::Memory(MemoryOperand::segment_register(segment, size)));
    Ok(())
}

/// `8F /0`: pop into memory. There is no register-direct form.
fn pop_reg_mem(ctx: &mut DecodeContext<'_>, out: &mut AirInstr) -> Result<(), DecodeError> {
    let offset = opcode_offset(ctx);
    let modrm = ModRM::extract(ctx.read_u8()?);
    if modrm.is_register() {
        return Err(DecodeError::invalid_encoding(
            offset,
            "8f with mod=11 has no register form",
        ));
    }

    let size = resolve_operand_size(ctx, OperandSize::Bits64);
    let memory = resolve_memory(ctx, modrm, size)?;
    out.unary(AirKind::Pop, Operand::Memory(memory));
    Ok(())
}

/// `89 /r`: mov r/m, reg.
fn mov_reg_mem_reg(ctx: &mut DecodeContext<'_>, out: &mut AirInstr) -> Result<(), DecodeError> {
    let modrm = ModRM::extract(ctx.read_u8()?);
    let size = resolve_operand_size(ctx, OperandSize::Bits32);
    let src = reg_operand(ctx, modrm, size);

    let dst = if modrm.is_register() {
        rm_register_operand(ctx, modrm, size)
    } else {
        Operand::Memory(resolve_memory(ctx, modrm, size)?)
    };

    out.binary(AirKind::Mov, dst, src);
    Ok(())
}
