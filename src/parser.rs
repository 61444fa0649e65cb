//! Goblin-based multi-format binary parser.

use std::fmt;
use std::path::Path;

use goblin::mach::{constants::cputype, Mach, MachO};
use goblin::{elf, pe, Object};

use crate::{Address, Architecture, BinaryMetadata, BinaryParser, DisassemblyError, Section};

/// Mach-O section attributes marking machine code.
const S_ATTR_PURE_INSTRUCTIONS: u32 = 0x8000_0000;
const S_ATTR_SOME_INSTRUCTIONS: u32 = 0x0000_0400;

/// A parser that handles ELF, PE, and Mach-O via Goblin.
#[derive(Debug, Default)]
pub struct GoblinParser;

impl GoblinParser {
    /// Construct a new GoblinParser.
    pub fn new() -> Self {
        GoblinParser
    }

    /// Read `path` and parse it. Returns the image alongside its metadata,
    /// since section data is borrowed from it.
    pub fn parse_file(&self, path: &Path) -> Result<(Vec<u8>, BinaryMetadata), DisassemblyError> {
        let image = std::fs::read(path)?;
        let metadata = self.parse(&image)?;
        Ok((image, metadata))
    }

    /// Parse an ELF image.
    fn parse_elf(&self, elf: elf::Elf) -> Result<BinaryMetadata, DisassemblyError> {
        let arch = match elf.header.e_machine {
            elf::header::EM_386 => Architecture::X86_32,
            elf::header::EM_X86_64 => Architecture::X86_64,
            elf::header::EM_ARM => Architecture::Arm,
            elf::header::EM_AARCH64 => Architecture::AArch64,
            _ => Architecture::Unknown,
        };

        let mut sections = Vec::new();
        for sh in &elf.section_headers {
            let Some(name) = elf.shdr_strtab.get_at(sh.sh_name) else {
                continue;
            };
            // NOBITS sections occupy no file bytes.
            let size = if sh.sh_type == elf::section_header::SHT_NOBITS {
                0
            } else {
                sh.sh_size as usize
            };
            sections.push(Section::new(
                name.to_string(),
                sh.sh_addr,
                sh.sh_offset as usize,
                size,
                sh.is_executable(),
            ));
        }

        Ok(BinaryMetadata {
            architecture: arch,
            entry_point: Some(elf.entry),
            sections,
        })
    }

    /// Parse a PE image.
    fn parse_pe(&self, pe: pe::PE<'_>) -> Result<BinaryMetadata, DisassemblyError> {
        let arch = match pe.header.coff_header.machine {
            pe::header::COFF_MACHINE_X86 => Architecture::X86_32,
            pe::header::COFF_MACHINE_X86_64 => Architecture::X86_64,
            pe::header::COFF_MACHINE_ARM => Architecture::Arm,
            pe::header::COFF_MACHINE_ARM64 => Architecture::AArch64,
            _ => Architecture::Unknown,
        };
        let image_base = pe.image_base as Address;

        let mut sections = Vec::new();
        for sect in &pe.sections {
            let name = sect.name().unwrap_or("").to_string();
            let executable = (sect.characteristics & pe::section_table::IMAGE_SCN_MEM_EXECUTE) != 0;
            sections.push(Section::new(
                name,
                image_base + sect.virtual_address as Address,
                sect.pointer_to_raw_data as usize,
                sect.size_of_raw_data as usize,
                executable,
            ));
        }

        Ok(BinaryMetadata {
            architecture: arch,
            entry_point: Some(image_base + pe.entry as Address),
            sections,
        })
    }

    /// Parse a single-architecture Mach-O binary
    fn parse_macho(&self, macho: &MachO) -> Result<BinaryMetadata, DisassemblyError> {
        let arch = match macho.header.cputype {
            cputype::CPU_TYPE_I386 => Architecture::X86_32,
            cputype::CPU_TYPE_X86_64 => Architecture::X86_64,
            cputype::CPU_TYPE_ARM => Architecture::Arm,
            cputype::CPU_TYPE_ARM64 => Architecture::AArch64,
            _ => Architecture::Unknown,
        };

        let mut sections = Vec::new();
        for segment in &macho.segments {
            let segment_sections = segment
                .sections()
                .map_err(|e| DisassemblyError::ParsingError(e.to_string()))?;

            for (section, _) in segment_sections {
                let name = format!(
                    "{},{}",
                    section.segname().unwrap_or(""),
                    section.name().unwrap_or("")
                );
                let executable = section.flags
                    & (S_ATTR_PURE_INSTRUCTIONS | S_ATTR_SOME_INSTRUCTIONS)
                    != 0;
                sections.push(Section::new(
                    name,
                    section.addr,
                    section.offset as usize,
                    section.size as usize,
                    executable,
                ));
            }
        }

        Ok(BinaryMetadata {
            architecture: arch,
            entry_point: Some(macho.entry),
            sections,
        })
    }

    /// Parse a Mach-O image.
    fn parse_mach(&self, m: Mach<'_>) -> Result<BinaryMetadata, DisassemblyError> {
        match m {
            Mach::Binary(binary) => self.parse_macho(&binary),
            Mach::Fat(_) => Err(DisassemblyError::ParsingError(
                "Fat Mach-O images are not supported, extract a single slice first".into(),
            )),
        }
    }
}

impl fmt::Display for GoblinParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GoblinParser")
    }
}

impl BinaryParser for GoblinParser {
    fn parse(&self, data: &[u8]) -> Result<BinaryMetadata, DisassemblyError> {
        let metadata = match Object::parse(data) {
            Ok(Object::Elf(elf)) => self.parse_elf(elf),
            Ok(Object::PE(pe)) => self.parse_pe(pe),
            Ok(Object::Mach(m)) => self.parse_mach(m),
            Ok(_) => Err(DisassemblyError::ParsingError("Unsupported file format".into())),
            Err(e) => Err(DisassemblyError::ParsingError(e.to_string())),
        }?;

        log::debug!(
            "Parsed {} image with {} sections",
            metadata.architecture,
            metadata.sections.len()
        );
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TEXT: [u8; 5] = [0x55, 0x48, 0x89, 0xE5, 0x5D];
    const SHSTRTAB: &[u8] = b"\0.text\0.shstrtab\0";

    fn section_header(
        name: u32,
        sh_type: u32,
        flags: u64,
        addr: u64,
        offset: u64,
        size: u64,
    ) -> Vec<u8> {
        let mut sh = Vec::with_capacity(64);
        sh.extend_from_slice(&name.to_le_bytes());
        sh.extend_from_slice(&sh_type.to_le_bytes());
        sh.extend_from_slice(&flags.to_le_bytes());
        sh.extend_from_slice(&addr.to_le_bytes());
        sh.extend_from_slice(&offset.to_le_bytes());
        sh.extend_from_slice(&size.to_le_bytes());
        sh.extend_from_slice(&0u32.to_le_bytes()); // link
        sh.extend_from_slice(&0u32.to_le_bytes()); // info
        sh.extend_from_slice(&1u64.to_le_bytes()); // addralign
        sh.extend_from_slice(&0u64.to_le_bytes()); // entsize
        sh
    }

    /// Minimal x86-64 ELF executable: `.text` at file offset 0x40, mapped at
    /// 0x401000, and a section name table.
    fn tiny_elf() -> Vec<u8> {
        let mut image = Vec::new();
        image.extend_from_slice(&[0x7F, b'E', b'L', b'F', 2, 1, 1, 0]);
        image.extend_from_slice(&[0; 8]);
        image.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        image.extend_from_slice(&62u16.to_le_bytes()); // EM_X86_64
        image.extend_from_slice(&1u32.to_le_bytes());
        image.extend_from_slice(&0x401000u64.to_le_bytes()); // entry
        image.extend_from_slice(&0u64.to_le_bytes()); // phoff
        image.extend_from_slice(&0x60u64.to_le_bytes()); // shoff
        image.extend_from_slice(&0u32.to_le_bytes());
        image.extend_from_slice(&64u16.to_le_bytes());
        image.extend_from_slice(&56u16.to_le_bytes());
        image.extend_from_slice(&0u16.to_le_bytes());
        image.extend_from_slice(&64u16.to_le_bytes());
        image.extend_from_slice(&3u16.to_le_bytes()); // shnum
        image.extend_from_slice(&2u16.to_le_bytes()); // shstrndx
        assert_eq!(image.len(), 0x40);

        image.extend_from_slice(&TEXT);
        image.resize(0x48, 0);
        image.extend_from_slice(SHSTRTAB);
        image.resize(0x60, 0);

        image.extend_from_slice(&[0; 64]);
        image.extend_from_slice(&section_header(1, 1, 0x6, 0x401000, 0x40, TEXT.len() as u64));
        image.extend_from_slice(&section_header(7, 3, 0, 0, 0x48, SHSTRTAB.len() as u64));
        image
    }

    #[test]
    fn test_parse_elf_sections() {
        let image = tiny_elf();
        let meta = GoblinParser::new().parse(&image).unwrap();

        assert_eq!(meta.architecture, Architecture::X86_64);
        assert_eq!(meta.entry_point, Some(0x401000));

        let text = meta.find_section(".text").unwrap();
        assert_eq!(text.address, 0x401000);
        assert_eq!(text.file_offset, 0x40);
        assert!(text.executable);
        assert!(!meta.find_section(".shstrtab").unwrap().executable);

        let regions = meta.executable_regions(&image);
        assert_eq!(regions, vec![(&TEXT[..], 0x401000)]);
    }

    #[test]
    fn test_parse_file_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&tiny_elf()).unwrap();

        let (image, meta) = GoblinParser::new().parse_file(file.path()).unwrap();
        assert_eq!(image.len(), tiny_elf().len());
        assert_eq!(meta.executable_regions(&image).len(), 1);
    }

    #[test]
    fn test_parse_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = GoblinParser::new()
            .parse_file(&dir.path().join("missing.bin"))
            .unwrap_err();
        assert!(matches!(err, DisassemblyError::IoError(_)));
    }

    #[test]
    fn test_parse_rejects_raw_code() {
        let err = GoblinParser::new().parse(&TEXT).unwrap_err();
        assert!(matches!(err, DisassemblyError::ParsingError(_)));
    }
}
