//! One-byte opcode classification table.

/// Instruction class selected by the first opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrClass {
    /// 50+r
    PushReg,
    /// 58+r
    PopReg,
    /// 07, 17, 1F, and the 0F A1 / 0F A9 pair
    PopSegReg,
    /// 8F /0
    PopRegMem,
    /// 89 /r
    MovRegMemReg,
    Unclassified,
}

/// Build-time opcode map. Read-only; there is no way to modify it at runtime.
pub static OPCODE_TABLE: [InstrClass; 256] = build_table();

const fn build_table() -> [InstrClass; 256] {
    let mut table = [InstrClass::Unclassified; 256];

    table[0x07] = InstrClass::PopSegReg;
    // two-byte form, second byte checked by the handler
    table[0x0F] = InstrClass::PopSegReg;
    table[0x17] = InstrClass::PopSegReg;
    table[0x1F] = InstrClass::PopSegReg;

    let mut op = 0x50;
    while op <= 0x57 {
        table[op] = InstrClass::PushReg;
        table[op + 8] = InstrClass::PopReg;
        op += 1;
    }

    table[0x89] = InstrClass::MovRegMemReg;
    table[0x8F] = InstrClass::PopRegMem;

    table
}

/// Class of `opcode`.
pub fn classify(opcode: u8) -> InstrClass {
    OPCODE_TABLE[opcode as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_ranges() {
        for op in 0x50..=0x57u8 {
            assert_eq!(classify(op), InstrClass::PushReg, "opcode {op:#04x}");
        }
        for op in 0x58..=0x5Fu8 {
            assert_eq!(classify(op), InstrClass::PopReg, "opcode {op:#04x}");
        }
    }

    #[test]
    fn test_single_entries() {
        assert_eq!(classify(0x07), InstrClass::PopSegReg);
        assert_eq!(classify(0x0F), InstrClass::PopSegReg);
        assert_eq!(classify(0x17), InstrClass::PopSegReg);
        assert_eq!(classify(0x1F), InstrClass::PopSegReg);
        assert_eq!(classify(0x89), InstrClass::MovRegMemReg);
        assert_eq!(classify(0x8F), InstrClass::PopRegMem);
    }

    #[test]
    fn test_everything_else_is_unclassified() {
        let classified = OPCODE_TABLE
            .iter()
            .filter(|class| **class != InstrClass::Unclassified)
            .count();
        assert_eq!(classified, 4 + 8 + 8 + 2);
        assert_eq!(classify(0x90), InstrClass::Unclassified);
        assert_eq!(classify(0x8B), InstrClass::Unclassified);
    }
}
