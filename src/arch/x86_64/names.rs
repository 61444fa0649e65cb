//! Register, segment and size-suffix name tables.

use crate::arch::NameTables;

/// 16/32/64-bit names per register id. The last row is the instruction pointer.
static REGISTERS: [[&str; 3]; 17] = [
    ["ax", "eax", "rax"],
    ["cx", "ecx", "rcx"],
    ["dx", "edx", "rdx"],
    ["bx", "ebx", "rbx"],
    ["sp", "esp", "rsp"],
    ["bp", "ebp", "rbp"],
    ["si", "esi", "rsi"],
    ["di", "edi", "rdi"],
    ["r8w", "r8d", "r8"],
    ["r9w", "r9d", "r9"],
    ["r10w", "r10d", "r10"],
    ["r11w", "r11d", "r11"],
    ["r12w", "r12d", "r12"],
    ["r13w", "r13d", "r13"],
    ["r14w", "r14d", "r14"],
    ["r15w", "r15d", "r15"],
    ["ip", "eip", "rip"],
];

static SEGMENTS: [&str; 6] = ["es", "cs", "ss", "ds", "fs", "gs"];

static SIZE_SUFFIXES: [&str; 3] = ["word", "dword", "qword"];

pub static X86_64_NAMES: NameTables = NameTables {
    registers: &REGISTERS,
    segments: &SEGMENTS,
    size_suffixes: &SIZE_SUFFIXES,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::air::{OperandSize, RegisterId, SegmentId};

    #[test]
    fn test_register_names() {
        assert_eq!(X86_64_NAMES.register(RegisterId::AX, OperandSize::Bits64), "rax");
        assert_eq!(X86_64_NAMES.register(RegisterId::R8, OperandSize::Bits16), "r8w");
        assert_eq!(X86_64_NAMES.register(RegisterId::IP, OperandSize::Bits32), "eip");
        assert_eq!(X86_64_NAMES.register(RegisterId(17), OperandSize::Bits64), "unk");
    }

    #[test]
    fn test_segment_and_suffix_names() {
        assert_eq!(X86_64_NAMES.segment(SegmentId::Fs), "fs");
        assert_eq!(X86_64_NAMES.size_suffix(2), "qword");
        assert_eq!(X86_64_NAMES.size_suffix(3), "unk_size");
    }
}
