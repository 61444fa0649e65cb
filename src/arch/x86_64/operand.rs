//! Operand size, address size and ModRM/SIB memory operand resolution.

use crate::air::{AddressSize, MemoryOperand, Operand, OperandSize, RegisterId};
use crate::context::{DecodeContext, PrefixSet};
use crate::decoder::DecodeError;

use super::modrm::{ModRM, Sib};

/// REX.W selects 64 bits, otherwise 0x66 selects 16 bits, otherwise `default`.
pub fn resolve_operand_size(ctx: &DecodeContext<'_>, default: OperandSize) -> OperandSize {
    if ctx.rex_w() {
        OperandSize::Bits64
    } else if ctx.has_prefix(PrefixSet::OPERAND_SIZE) {
        OperandSize::Bits16
    } else {
        default
    }
}

/// 0x67 selects 32-bit addressing, otherwise 64-bit.
pub fn resolve_address_size(ctx: &DecodeContext<'_>) -> AddressSize {
    if ctx.has_prefix(PrefixSet::ADDRESS_SIZE) {
        AddressSize::Bits32
    } else {
        AddressSize::Bits64
    }
}

/// Register named by ModRM.reg, REX.R applied.
pub fn reg_operand(ctx: &DecodeContext<'_>, modrm: ModRM, size: OperandSize) -> Operand {
    Operand::register(RegisterId(ctx.extend_with_rex_r(modrm.reg)), size)
}

/// Register named by ModRM.rm in the register-direct form, REX.B applied.
pub fn rm_register_operand(ctx: &DecodeContext<'_>, modrm: ModRM, size: OperandSize) -> Operand {
    Operand::register(RegisterId(ctx.extend_with_rex_b(modrm.rm)), size)
}

/// Resolve the memory form of a ModRM byte (mod != 11), consuming any SIB
/// and displacement bytes that follow it.
pub fn resolve_memory(
    ctx: &mut DecodeContext<'_>,
    modrm: ModRM,
    data_size: OperandSize,
) -> Result<MemoryOperand, DecodeError> {
    if modrm.is_register() {
        return Err(DecodeError::invalid_encoding(
            ctx.position(),
            "register-direct ModRM where a memory operand is required",
        ));
    }

    let address_size = resolve_address_size(ctx);
    let mut operand = MemoryOperand {
        base: None,
        index: None,
        factor: 1,
        displacement: 0,
        address_size,
        data_size,
        segment: None,
    };

    if modrm.needs_sib() {
        resolve_sib(ctx, modrm, &mut operand)?;
    } else if modrm.is_rip_relative() {
        operand.base = Some(RegisterId::IP);
        operand.displacement = ctx.read_disp32()?;
        return Ok(operand);
    } else {
        operand.base = Some(RegisterId(ctx.extend_with_rex_b(modrm.rm)));
    }

    match modrm.mod_ {
        0b01 => operand.displacement = ctx.read_disp8()?,
        0b10 => operand.displacement = ctx.read_disp32()?,
        _ => {}
    }

    Ok(operand)
}

/// Decode the SIB byte into `operand`. The raw fields are tested for the
/// no-index and no-base patterns before REX extension.
fn resolve_sib(
    ctx: &mut DecodeContext<'_>,
    modrm: ModRM,
    operand: &mut MemoryOperand,
) -> Result<(), DecodeError> {
    let sib = Sib::extract(ctx.read_u8()?);

    if sib.has_index() {
        operand.index = Some(RegisterId(ctx.extend_with_rex_x(sib.index)));
        operand.factor = sib.factor;
    }

    if modrm.mod_ == 0b00 && sib.base == Sib::NO_BASE {
        operand.displacement = ctx.read_disp32()?;
    } else {
        operand.base = Some(RegisterId(ctx.extend_with_rex_b(sib.base)));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::x86_64::prefix::scan_prefixes;
    use rstest::rstest;

    /// Resolve the ModRM at the start of `encoding` as a memory operand, with
    /// the prefix state produced by scanning `prefixes`.
    fn resolve_with(prefixes: &[u8], encoding: &[u8]) -> (Result<MemoryOperand, DecodeError>, usize) {
        let mut prefix_ctx = DecodeContext::new(prefixes);
        scan_prefixes(&mut prefix_ctx);

        let mut ctx = DecodeContext::new(encoding);
        ctx.prefixes = prefix_ctx.prefixes;
        ctx.rex = prefix_ctx.rex;
        let modrm = ModRM::extract(ctx.read_u8().unwrap());
        let result = resolve_memory(&mut ctx, modrm, OperandSize::Bits64);
        (result, ctx.position())
    }

    fn resolve(encoding: &[u8]) -> (Result<MemoryOperand, DecodeError>, usize) {
        resolve_with(&[], encoding)
    }

    fn mem(base: Option<u8>, index: Option<u8>, factor: u8, displacement: i32) -> MemoryOperand {
        MemoryOperand {
            base: base.map(RegisterId),
            index: index.map(RegisterId),
            factor,
            displacement,
            address_size: AddressSize::Bits64,
            data_size: OperandSize::Bits64,
            segment: None,
        }
    }

    #[rstest]
    // mod=00 direct
    #[case(&[0x00], mem(Some(0), None, 1, 0), 1)]
    #[case(&[0x07], mem(Some(7), None, 1, 0), 1)]
    // mod=00 rm=101: RIP-relative
    #[case(&[0x05, 0x10, 0x00, 0x00, 0x00], mem(Some(16), None, 1, 0x10), 5)]
    // mod=01 sign-extended disp8
    #[case(&[0x45, 0xF8], mem(Some(5), None, 1, -8), 2)]
    // mod=10 disp32
    #[case(&[0x83, 0x00, 0x01, 0x00, 0x00], mem(Some(3), None, 1, 0x100), 5)]
    // SIB, no index, no base, disp32
    #[case(&[0x04, 0x25, 0x10, 0x00, 0x00, 0x00], mem(None, None, 1, 0x10), 6)]
    // SIB [rbx+rcx*4]
    #[case(&[0x04, 0x8B], mem(Some(3), Some(1), 4, 0), 2)]
    // SIB [rsp+8]
    #[case(&[0x44, 0x24, 0x08], mem(Some(4), None, 1, 8), 3)]
    // SIB no base with index, [rax*8+0x20]
    #[case(&[0x04, 0xC5, 0x20, 0x00, 0x00, 0x00], mem(None, Some(0), 8, 0x20), 6)]
    // SIB base=101 with mod=01 is rbp
    #[case(&[0x44, 0x25, 0x00], mem(Some(5), None, 1, 0), 3)]
    fn test_memory_forms(#[case] bytes: &[u8], #[case] expected: MemoryOperand, #[case] consumed: usize) {
        let (result, position) = resolve(bytes);
        assert_eq!(result.unwrap(), expected);
        assert_eq!(position, consumed);
    }

    #[test]
    fn test_rex_b_extends_base() {
        // REX.B, mod=00 rm=000 -> [r8]
        let (result, _) = resolve_with(&[0x41], &[0x00]);
        assert_eq!(result.unwrap().base, Some(RegisterId::R8));
    }

    #[test]
    fn test_rex_b_rm_101_is_still_rip_relative() {
        let (result, position) = resolve_with(&[0x41], &[0x05, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(result.unwrap().base, Some(RegisterId::IP));
        assert_eq!(position, 5);
    }

    #[test]
    fn test_rex_b_sib_base_101_at_mod_00_has_no_base() {
        // r13 as SIB base with mod=00 still means disp32, no base
        let (result, position) = resolve_with(&[0x41], &[0x04, 0x25, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(result.unwrap().base, None);
        assert_eq!(position, 6);
    }

    #[test]
    fn test_rex_x_does_not_apply_to_no_index() {
        let (result, _) = resolve_with(&[0x42], &[0x04, 0x24]);
        let operand = result.unwrap();
        assert_eq!(operand.index, None);
        assert_eq!(operand.base, Some(RegisterId::SP));
    }

    #[test]
    fn test_rex_x_extends_index() {
        // REX.X, [rax+r9*2]
        let (result, _) = resolve_with(&[0x42], &[0x04, 0x48]);
        let operand = result.unwrap();
        assert_eq!(operand.index, Some(RegisterId(9)));
        assert_eq!(operand.factor, 2);
    }

    #[test]
    fn test_address_size_override() {
        let (result, _) = resolve_with(&[0x67], &[0x00]);
        assert_eq!(result.unwrap().address_size, AddressSize::Bits32);
    }

    #[rstest]
    #[case(&[0x04])]
    #[case(&[0x05, 0x10, 0x00, 0x00])]
    #[case(&[0x45])]
    #[case(&[0x83, 0x00, 0x01])]
    #[case(&[0x04, 0x25, 0x10, 0x00, 0x00])]
    #[case(&[0x44, 0x24])]
    fn test_truncated_forms(#[case] bytes: &[u8]) {
        let (result, _) = resolve(bytes);
        assert!(result.unwrap_err().is_truncation());
    }

    #[test]
    fn test_register_direct_is_rejected() {
        let (result, _) = resolve(&[0xC0]);
        assert!(!result.unwrap_err().is_truncation());
    }

    #[rstest]
    #[case(&[], OperandSize::Bits32, OperandSize::Bits32)]
    #[case(&[0x66], OperandSize::Bits32, OperandSize::Bits16)]
    #[case(&[0x48], OperandSize::Bits32, OperandSize::Bits64)]
    #[case(&[0x66, 0x48], OperandSize::Bits32, OperandSize::Bits64)]
    #[case(&[], OperandSize::Bits64, OperandSize::Bits64)]
    #[case(&[0x66], OperandSize::Bits64, OperandSize::Bits16)]
    fn test_operand_size(#[case] prefixes: &[u8], #[case] default: OperandSize, #[case] expected: OperandSize) {
        let mut ctx = DecodeContext::new(prefixes);
        scan_prefixes(&mut ctx);
        assert_eq!(resolve_operand_size(&ctx, default), expected);
    }
}
