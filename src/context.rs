//! Per-decode cursor and the prefix state of the instruction being decoded.

use bitflags::bitflags;

use crate::air::SegmentId;
use crate::arch::x86_64::Rex;
use crate::decoder::DecodeError;

bitflags! {
    /// Legacy prefixes seen before the current opcode.
    ///
    /// 0x2E and 0x3E double as branch hints; they are recorded as the CS and
    /// DS overrides.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PrefixSet: u16 {
        // group 1
        const LOCK = 1 << 0;
        const REPNE = 1 << 1;
        const REP = 1 << 2;
        // group 2
        const CS = 1 << 3;
        const SS = 1 << 4;
        const DS = 1 << 5;
        const ES = 1 << 6;
        const FS = 1 << 7;
        const GS = 1 << 8;
        // group 3
        const OPERAND_SIZE = 1 << 9;
        // group 4
        const ADDRESS_SIZE = 1 << 10;

        const SEGMENTS = Self::CS.bits()
            | Self::SS.bits()
            | Self::DS.bits()
            | Self::ES.bits()
            | Self::FS.bits()
            | Self::GS.bits();
    }
}

impl PrefixSet {
    /// Record a segment override, replacing any earlier one.
    pub fn set_segment(&mut self, segment: SegmentId) {
        self.remove(PrefixSet::SEGMENTS);
        self.insert(match segment {
            SegmentId::Es => PrefixSet::ES,
            SegmentId::Cs => PrefixSet::CS,
            SegmentId::Ss => PrefixSet::SS,
            SegmentId::Ds => PrefixSet::DS,
            SegmentId::Fs => PrefixSet::FS,
            SegmentId::Gs => PrefixSet::GS,
        });
    }

    pub fn segment(&self) -> Option<SegmentId> {
        [
            (PrefixSet::ES, SegmentId::Es),
            (PrefixSet::CS, SegmentId::Cs),
            (PrefixSet::SS, SegmentId::Ss),
            (PrefixSet::DS, SegmentId::Ds),
            (PrefixSet::FS, SegmentId::Fs),
            (PrefixSet::GS, SegmentId::Gs),
        ]
        .into_iter()
        .find(|(flag, _)| self.contains(*flag))
        .map(|(_, segment)| segment)
    }
}

/// Cursor over the input plus the prefix/REX state of one instruction.
///
/// `start <= position <= end` holds at all times and no read happens at or
/// past `end`. The context is cheap to clone so a handler can work on a fork
/// that is only adopted when decoding succeeds.
#[derive(Debug, Clone)]
pub struct DecodeContext<'a> {
    bytes: &'a [u8],
    current: usize,
    pub prefixes: PrefixSet,
    pub rex: Option<Rex>,
}

impl<'a> DecodeContext<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            current: 0,
            prefixes: PrefixSet::empty(),
            rex: None,
        }
    }

    /// Clear the per-instruction prefix and REX state. The cursor is untouched.
    pub fn reset_instr(&mut self) {
        self.prefixes = PrefixSet::empty();
        self.rex = None;
    }

    pub fn position(&self) -> usize {
        self.current
    }

    pub fn end(&self) -> usize {
        self.bytes.len()
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.current
    }

    pub fn is_at_end(&self) -> bool {
        self.current >= self.bytes.len()
    }

    pub fn peek(&self) -> Option<u8> {
        self.bytes.get(self.current).copied()
    }

    /// Move the cursor forward to `position`. Never moves it backwards and
    /// never past the end.
    pub fn skip_to(&mut self, position: usize) {
        self.current = position.clamp(self.current, self.bytes.len());
    }

    /// Fail with a truncation error unless `needed` more bytes are available.
    pub fn ensure(&self, needed: usize) -> Result<(), DecodeError> {
        if self.remaining() < needed {
            return Err(DecodeError::truncated(self.current, needed, self.remaining()));
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.ensure(1)?;
        let byte = self.bytes[self.current];
        self.current += 1;
        Ok(byte)
    }

    /// Read a one-byte displacement, sign-extended to 32 bits.
    pub fn read_disp8(&mut self) -> Result<i32, DecodeError> {
        Ok(self.read_u8()? as i8 as i32)
    }

    /// Read a little-endian four-byte displacement.
    pub fn read_disp32(&mut self) -> Result<i32, DecodeError> {
        self.ensure(4)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.bytes[self.current..self.current + 4]);
        self.current += 4;
        Ok(i32::from_le_bytes(raw))
    }

    pub fn has_prefix(&self, prefix: PrefixSet) -> bool {
        self.prefixes.contains(prefix)
    }

    pub fn rex_w(&self) -> bool {
        self.rex.is_some_and(|rex| rex.w)
    }

    /// Extend a ModRM.reg field with REX.R.
    pub fn extend_with_rex_r(&self, reg: u8) -> u8 {
        reg | (self.rex.is_some_and(|rex| rex.r) as u8) << 3
    }

    /// Extend a ModRM.rm, SIB.base or opcode register field with REX.B.
    pub fn extend_with_rex_b(&self, reg: u8) -> u8 {
        reg | (self.rex.is_some_and(|rex| rex.b) as u8) << 3
    }

    /// Extend a SIB.index field with REX.X.
    pub fn extend_with_rex_x(&self, reg: u8) -> u8 {
        reg | (self.rex.is_some_and(|rex| rex.x) as u8) << 3
    }
}
