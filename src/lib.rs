//! Core IR, registry, and entry points for the AIR x86-64 decoder.
//!
//! This library decodes x86-64 machine code into AIR, a typed instruction
//! form, and renders it back to Intel-style assembly text. Decoding is a
//! single forward pass: prefixes and REX are scanned, the opcode selects a
//! handler from a static table, and the handler fills a slot in an
//! append-only [`InstructionStore`].
//!
//! # Basic Usage
//!
//! ```rust
//! use air_disasm::{disasm, format::render_instr, Architecture, AirKind};
//! use air_disasm::arch::{ArchFrontend, Frontend};
//!
//! // push rbp; mov rbp, rsp
//! let code = [0x55, 0x48, 0x89, 0xe5];
//! let store = disasm(&code, Architecture::X86_64).unwrap();
//! assert_eq!(store.len(), 2);
//!
//! let names = Frontend::for_architecture(Architecture::X86_64).unwrap().names();
//! let first = store.get(0).unwrap();
//! assert_eq!(first.kind, AirKind::Push);
//! assert_eq!(render_instr(first, names), "push rbp");
//! ```

pub mod air;
pub mod arch;
pub mod context;
pub mod decoder;
pub mod format;
pub mod parser;
#[cfg(feature = "python")]
pub mod python;

pub use air::{
    AddressSize, AirInstr, AirKind, InstructionStore, MemoryOperand, Operand, OperandSize,
    RegisterId, SegmentId,
};
pub use decoder::{DecodeError, DecodeExit, DecodeOptions, Decoder, Disassembly, RecoveryPolicy};

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use rayon::prelude::*;

use crate::arch::Frontend;

/// Represents an address in memory
pub type Address = u64;

/// Architecture tags known to the loader. Only those listed by
/// [`Frontend::supported`] can be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
#[non_exhaustive]
pub enum Architecture {
    /// 32-bit x86
    #[value(name = "x86-32")]
    X86_32,
    /// 64-bit x86
    #[value(name = "x86-64")]
    X86_64,
    /// ARM (32-bit)
    Arm,
    /// AArch64 (ARM 64-bit)
    #[value(name = "aarch64")]
    AArch64,
    /// Unknown architecture
    #[value(skip)]
    Unknown,
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::X86_32 => write!(f, "x86-32"),
            Architecture::X86_64 => write!(f, "x86-64"),
            Architecture::Arm => write!(f, "ARM"),
            Architecture::AArch64 => write!(f, "AArch64"),
            Architecture::Unknown => write!(f, "Unknown"),
        }
    }
}

impl FromStr for Architecture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "x86-32" | "x86_32" | "i386" => Ok(Architecture::X86_32),
            "x86-64" | "x86_64" | "amd64" => Ok(Architecture::X86_64),
            "arm" => Ok(Architecture::Arm),
            "aarch64" | "arm64" => Ok(Architecture::AArch64),
            _ => Err(format!("Unknown architecture: {}", s)),
        }
    }
}

/// A section in the binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Section name
    pub name: String,
    /// Virtual address of the section
    pub address: Address,
    /// Offset of the section's bytes in the file
    pub file_offset: usize,
    /// Size of the section's bytes in the file
    pub size: usize,
    /// Whether this section contains executable code
    pub executable: bool,
}

impl Section {
    pub fn new(name: String, address: Address, file_offset: usize, size: usize, executable: bool) -> Self {
        Self {
            name,
            address,
            file_offset,
            size,
            executable,
        }
    }

    /// The section's bytes, clamped to the image.
    pub fn data<'a>(&self, image: &'a [u8]) -> Option<&'a [u8]> {
        if self.file_offset >= image.len() {
            return None;
        }
        let end = self.file_offset.saturating_add(self.size).min(image.len());
        Some(&image[self.file_offset..end])
    }
}

/// Metadata describing a parsed binary.
#[derive(Debug, Clone)]
pub struct BinaryMetadata {
    /// Detected architecture
    pub architecture: Architecture,
    /// Entry point address, if available
    pub entry_point: Option<Address>,
    /// List of sections found in the binary
    pub sections: Vec<Section>,
}

impl BinaryMetadata {
    /// Metadata for a flat code blob of a known architecture.
    pub fn raw(architecture: Architecture) -> Self {
        Self {
            architecture,
            entry_point: None,
            sections: Vec::new(),
        }
    }

    /// Executable section bytes paired with their virtual address, in file
    /// order. Falls back to the whole image at address 0.
    pub fn executable_regions<'a>(&self, image: &'a [u8]) -> Vec<(&'a [u8], Address)> {
        let regions: Vec<_> = self
            .sections
            .iter()
            .filter(|s| s.executable)
            .filter_map(|s| s.data(image).map(|data| (data, s.address)))
            .filter(|(data, _)| !data.is_empty())
            .collect();

        if regions.is_empty() {
            log::info!("No executable sections found, using whole image");
            return vec![(image, 0)];
        }
        regions
    }

    /// Find a section by name
    pub fn find_section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }
}

/// Parser trait: turn raw bytes into `BinaryMetadata`.
pub trait BinaryParser: Send + Sync {
    fn parse(&self, data: &[u8]) -> Result<BinaryMetadata, DisassemblyError>;
}

/// Error type for disassembly operations
#[derive(Debug, thiserror::Error)]
pub enum DisassemblyError {
    /// Failed to parse binary format
    #[error("Failed to parse binary format: {0}")]
    ParsingError(String),

    /// No front end is registered for the architecture
    #[error("Unsupported architecture: {0}")]
    UnsupportedArchitecture(Architecture),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Output formatting failed
    #[error("Format error: {0}")]
    FormatError(String),

    /// Generic error
    #[error("{0}")]
    Generic(String),
}

fn decoder_for(arch: Architecture, options: &DecodeOptions) -> Result<Decoder<Frontend>, DisassemblyError> {
    let frontend =
        Frontend::for_architecture(arch).ok_or(DisassemblyError::UnsupportedArchitecture(arch))?;
    Ok(Decoder::new(frontend, options.clone()))
}

/// Decode `bytes` with default options.
///
/// Only an unsupported architecture is an error; malformed input just yields
/// fewer instructions.
pub fn disasm(bytes: &[u8], arch: Architecture) -> Result<InstructionStore, DisassemblyError> {
    Ok(disasm_with(bytes, arch, &DecodeOptions::default())?.instructions)
}

/// Decode `bytes`, reporting how decoding ended.
pub fn disasm_with(
    bytes: &[u8],
    arch: Architecture,
    options: &DecodeOptions,
) -> Result<Disassembly, DisassemblyError> {
    Ok(decoder_for(arch, options)?.decode(bytes))
}

/// Decode independent regions in parallel, keeping their order.
pub fn disasm_regions(
    regions: &[(&[u8], Address)],
    arch: Architecture,
    options: &DecodeOptions,
) -> Result<Vec<(Address, Disassembly)>, DisassemblyError> {
    let decoder = decoder_for(arch, options)?;
    log::debug!("Decoding {} regions in parallel", regions.len());

    Ok(regions
        .par_iter()
        .map(|(bytes, base)| (*base, decoder.decode(bytes)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_architecture_round_trip_names() {
        assert_eq!("x86-64".parse::<Architecture>(), Ok(Architecture::X86_64));
        assert_eq!("AMD64".parse::<Architecture>(), Ok(Architecture::X86_64));
        assert_eq!(Architecture::X86_64.to_string(), "x86-64");
        assert!("mips".parse::<Architecture>().is_err());
    }

    #[test]
    fn test_disasm_rejects_unsupported_architecture() {
        let err = disasm(&[0x50], Architecture::AArch64).unwrap_err();
        assert!(matches!(err, DisassemblyError::UnsupportedArchitecture(Architecture::AArch64)));
    }

    #[test]
    fn test_section_data_is_clamped() {
        let image = [0u8; 16];
        let section = Section::new(".text".into(), 0x1000, 8, 100, true);
        assert_eq!(section.data(&image).map(|d| d.len()), Some(8));

        let outside = Section::new(".bss".into(), 0x2000, 32, 4, false);
        assert!(outside.data(&image).is_none());
    }

    #[test]
    fn test_executable_regions() {
        let image: Vec<u8> = (0..32).collect();
        let mut meta = BinaryMetadata::raw(Architecture::X86_64);
        meta.sections.push(Section::new(".data".into(), 0x3000, 0, 8, false));
        meta.sections.push(Section::new(".text".into(), 0x1000, 8, 4, true));

        let regions = meta.executable_regions(&image);
        assert_eq!(regions, vec![(&image[8..12], 0x1000)]);
        assert!(meta.find_section(".data").is_some());
    }

    #[test]
    fn test_executable_regions_fallback() {
        let image = [0x50u8, 0x58];
        let meta = BinaryMetadata::raw(Architecture::X86_64);
        assert_eq!(meta.executable_regions(&image), vec![(&image[..], 0)]);
    }
}
