//! AIR: the architecture-independent instruction record produced by decoding.
//!
//! Every type in here is `Copy` so instructions can live in fixed slots of the
//! [`InstructionStore`] and be overwritten in place.

use std::fmt;

use serde::Serialize;

pub mod store;

pub use self::store::{InstructionStore, CHUNK_CAPACITY};

/// A general purpose register id.
///
/// Ids 0..=15 follow the hardware encoding (`ax`, `cx`, ... `r15`); id 16 is
/// the instruction pointer, which has no hardware encoding of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RegisterId(pub u8);

impl RegisterId {
    pub const AX: RegisterId = RegisterId(0);
    pub const CX: RegisterId = RegisterId(1);
    pub const DX: RegisterId = RegisterId(2);
    pub const BX: RegisterId = RegisterId(3);
    pub const SP: RegisterId = RegisterId(4);
    pub const BP: RegisterId = RegisterId(5);
    pub const SI: RegisterId = RegisterId(6);
    pub const DI: RegisterId = RegisterId(7);
    pub const R8: RegisterId = RegisterId(8);
    pub const IP: RegisterId = RegisterId(16);

    /// Raw id, usable as an index into a register name table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Segment register ids, in hardware encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentId {
    Es = 0,
    Cs = 1,
    Ss = 2,
    Ds = 3,
    Fs = 4,
    Gs = 5,
}

impl SegmentId {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Width of a register or of the data a memory operand refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OperandSize {
    #[serde(rename = "16")]
    Bits16,
    #[serde(rename = "32")]
    Bits32,
    #[serde(rename = "64")]
    Bits64,
}

impl OperandSize {
    /// Position in the 16/32/64 name and suffix tables.
    pub fn index(self) -> usize {
        match self {
            OperandSize::Bits16 => 0,
            OperandSize::Bits32 => 1,
            OperandSize::Bits64 => 2,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            OperandSize::Bits16 => 16,
            OperandSize::Bits32 => 32,
            OperandSize::Bits64 => 64,
        }
    }
}

impl fmt::Display for OperandSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

/// Width of the effective address computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AddressSize {
    #[serde(rename = "32")]
    Bits32,
    #[serde(rename = "64")]
    Bits64,
}

impl AddressSize {
    /// Register size used to name base and index registers.
    pub fn register_size(self) -> OperandSize {
        match self {
            AddressSize::Bits32 => OperandSize::Bits32,
            AddressSize::Bits64 => OperandSize::Bits64,
        }
    }
}

/// `[base + index * factor + displacement]`, optionally tagged with a segment.
///
/// An operand with a segment, no base, no index and no displacement names the
/// segment register itself (the pop-segment form).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryOperand {
    pub base: Option<RegisterId>,
    pub index: Option<RegisterId>,
    pub factor: u8,
    pub displacement: i32,
    pub address_size: AddressSize,
    pub data_size: OperandSize,
    pub segment: Option<SegmentId>,
}

impl MemoryOperand {
    /// The segment-register operand used by the pop-segment forms.
    pub fn segment_register(segment: SegmentId, data_size: OperandSize) -> Self {
        Self {
            base: None,
            index: None,
            factor: 1,
            displacement: 0,
            address_size: AddressSize::Bits64,
            data_size,
            segment: Some(segment),
        }
    }

    pub fn is_segment_register(&self) -> bool {
        self.segment.is_some()
            && self.base.is_none()
            && self.index.is_none()
            && self.displacement == 0
    }
}

/// One operand slot of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operand {
    Register { id: RegisterId, size: OperandSize },
    Memory(MemoryOperand),
    Immediate { value: i64, size: OperandSize },
    /// Unused slot.
    #[default]
    None,
}

impl Operand {
    pub fn register(id: RegisterId, size: OperandSize) -> Self {
        Operand::Register { id, size }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Operand::None)
    }

    /// Data width carried by the operand, if it has one.
    pub fn size(&self) -> Option<OperandSize> {
        match self {
            Operand::Register { size, .. } | Operand::Immediate { size, .. } => Some(*size),
            Operand::Memory(mem) => Some(mem.data_size),
            Operand::None => None,
        }
    }
}

/// Instruction kinds the decoder can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AirKind {
    Push,
    Pop,
    Mov,
    #[default]
    Unknown,
}

impl AirKind {
    pub fn mnemonic(self) -> &'static str {
        match self {
            AirKind::Push => "push",
            AirKind::Pop => "pop",
            AirKind::Mov => "mov",
            AirKind::Unknown => "(bad)",
        }
    }
}

impl fmt::Display for AirKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// One decoded instruction.
///
/// Binary instructions use `operands[0]` as destination and `operands[1]` as
/// source; unary instructions use `operands[0]` and leave the second slot
/// [`Operand::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AirInstr {
    pub kind: AirKind,
    pub operands: [Operand; 2],
    /// Input offset of the first byte, prefixes included.
    pub offset: usize,
    /// Number of bytes consumed.
    pub length: usize,
}

impl AirInstr {
    pub fn unary(&mut self, kind: AirKind, operand: Operand) {
        self.kind = kind;
        self.operands = [operand, Operand::None];
    }

    pub fn binary(&mut self, kind: AirKind, dst: Operand, src: Operand) {
        self.kind = kind;
        self.operands = [dst, src];
    }

    pub fn dst(&self) -> &Operand {
        &self.operands[0]
    }

    pub fn src(&self) -> &Operand {
        &self.operands[1]
    }

    pub fn operand_count(&self) -> usize {
        self.operands.iter().filter(|op| !op.is_none()).count()
    }

    /// Byte range of this instruction within the decoded input.
    pub fn span(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_instr_is_unknown_and_empty() {
        let instr = AirInstr::default();
        assert_eq!(instr.kind, AirKind::Unknown);
        assert_eq!(instr.operand_count(), 0);
        assert_eq!(instr.length, 0);
    }

    #[test]
    fn test_unary_clears_second_slot() {
        let mut instr = AirInstr::default();
        instr.binary(
            AirKind::Mov,
            Operand::register(RegisterId::CX, OperandSize::Bits32),
            Operand::register(RegisterId::AX, OperandSize::Bits32),
        );
        instr.unary(AirKind::Push, Operand::register(RegisterId::AX, OperandSize::Bits64));

        assert_eq!(instr.kind, AirKind::Push);
        assert_eq!(instr.operand_count(), 1);
        assert!(instr.src().is_none());
    }

    #[test]
    fn test_segment_register_operand() {
        let op = MemoryOperand::segment_register(SegmentId::Fs, OperandSize::Bits64);
        assert!(op.is_segment_register());

        let plain = MemoryOperand { segment: None, ..op };
        assert!(!plain.is_segment_register());
    }

    #[test]
    fn test_operand_serializes_with_tag() {
        let op = Operand::register(RegisterId::R8, OperandSize::Bits64);
        let json = serde_json::to_value(op).unwrap();
        assert_eq!(json["type"], "register");
        assert_eq!(json["id"], 8);
        assert_eq!(json["size"], "64");
    }
}
