//! Legacy prefix and REX scanning.

use crate::air::SegmentId;
use crate::context::{DecodeContext, PrefixSet};

pub const PREFIX_LOCK: u8 = 0xF0;
pub const PREFIX_REPNE: u8 = 0xF2;
pub const PREFIX_REP: u8 = 0xF3;
pub const PREFIX_SEG_ES: u8 = 0x26;
pub const PREFIX_SEG_CS: u8 = 0x2E;
pub const PREFIX_SEG_SS: u8 = 0x36;
pub const PREFIX_SEG_DS: u8 = 0x3E;
pub const PREFIX_SEG_FS: u8 = 0x64;
pub const PREFIX_SEG_GS: u8 = 0x65;
pub const PREFIX_OPERAND_SIZE: u8 = 0x66;
pub const PREFIX_ADDRESS_SIZE: u8 = 0x67;

/// REX prefix fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rex {
    /// REX.W - 64-bit operand size
    pub w: bool,
    /// REX.R - extends ModRM.reg
    pub r: bool,
    /// REX.X - extends SIB.index
    pub x: bool,
    /// REX.B - extends ModRM.rm, SIB.base or the opcode register
    pub b: bool,
}

impl Rex {
    /// Decode a REX byte, or `None` if the high nibble is not `0100`.
    pub fn extract(byte: u8) -> Option<Self> {
        if byte >> 4 != 0b0100 {
            return None;
        }
        Some(Self {
            w: byte & 0x08 != 0,
            r: byte & 0x04 != 0,
            x: byte & 0x02 != 0,
            b: byte & 0x01 != 0,
        })
    }
}

/// Action of one legacy prefix byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Legacy {
    Flag(PrefixSet),
    Segment(SegmentId),
}

fn classify_legacy(byte: u8) -> Option<Legacy> {
    let legacy = match byte {
        PREFIX_LOCK => Legacy::Flag(PrefixSet::LOCK),
        PREFIX_REPNE => Legacy::Flag(PrefixSet::REPNE),
        PREFIX_REP => Legacy::Flag(PrefixSet::REP),
        PREFIX_SEG_ES => Legacy::Segment(SegmentId::Es),
        PREFIX_SEG_CS => Legacy::Segment(SegmentId::Cs),
        PREFIX_SEG_SS => Legacy::Segment(SegmentId::Ss),
        PREFIX_SEG_DS => Legacy::Segment(SegmentId::Ds),
        PREFIX_SEG_FS => Legacy::Segment(SegmentId::Fs),
        PREFIX_SEG_GS => Legacy::Segment(SegmentId::Gs),
        PREFIX_OPERAND_SIZE => Legacy::Flag(PrefixSet::OPERAND_SIZE),
        PREFIX_ADDRESS_SIZE => Legacy::Flag(PrefixSet::ADDRESS_SIZE),
        _ => return None,
    };
    Some(legacy)
}

/// Consume legacy prefixes and REX bytes, leaving the cursor on the opcode.
///
/// Only a REX byte directly in front of the opcode takes effect: a legacy
/// prefix after a REX byte clears it, and a later REX byte replaces it. Every
/// scanned byte stays consumed either way.
pub fn scan_prefixes(ctx: &mut DecodeContext<'_>) {
    while let Some(byte) = ctx.peek() {
        if let Some(rex) = Rex::extract(byte) {
            ctx.rex = Some(rex);
        } else if let Some(legacy) = classify_legacy(byte) {
            if ctx.rex.take().is_some() {
                log::trace!(
                    "REX dropped by prefix {:#04x} at offset {}",
                    byte,
                    ctx.position()
                );
            }
            match legacy {
                Legacy::Flag(flag) => ctx.prefixes.insert(flag),
                Legacy::Segment(segment) => ctx.prefixes.set_segment(segment),
            }
        } else {
            break;
        }
        ctx.skip_to(ctx.position() + 1);
    }
}
