//! ModRM and SIB byte extraction.
//!
//! Both extractors return the raw 3-bit fields; REX extension is applied by
//! the operand resolvers, exactly once per field.

/// Decoded ModRM byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModRM {
    /// Mod field (2 bits)
    pub mod_: u8,
    /// Reg field (3 bits)
    pub reg: u8,
    /// R/M field (3 bits)
    pub rm: u8,
}

impl ModRM {
    pub fn extract(byte: u8) -> Self {
        Self {
            mod_: byte >> 6,
            reg: (byte >> 3) & 0x7,
            rm: byte & 0x7,
        }
    }

    /// mod=11 selects a register operand.
    pub fn is_register(&self) -> bool {
        self.mod_ == 0b11
    }

    /// A SIB byte follows for rm=100 in any memory form.
    pub fn needs_sib(&self) -> bool {
        !self.is_register() && self.rm == 0b100
    }

    /// mod=00, rm=101: RIP-relative disp32.
    pub fn is_rip_relative(&self) -> bool {
        self.mod_ == 0b00 && self.rm == 0b101
    }
}

/// Decoded SIB byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sib {
    pub scale: u8,
    pub index: u8,
    pub base: u8,
    /// `1 << scale`
    pub factor: u8,
}

impl Sib {
    /// Index field value meaning "no index register".
    pub const NO_INDEX: u8 = 0b100;
    /// Base field value meaning "disp32, no base" when mod=00.
    pub const NO_BASE: u8 = 0b101;

    pub fn extract(byte: u8) -> Self {
        let scale = byte >> 6;
        Self {
            scale,
            index: (byte >> 3) & 0x7,
            base: byte & 0x7,
            factor: 1 << scale,
        }
    }

    pub fn has_index(&self) -> bool {
        self.index != Self::NO_INDEX
    }
}
