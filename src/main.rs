//! air-disasm - decode x86-64 code into AIR and print it
//!
//! Usage:
//!   air-disasm <binary>                 Disassemble executable sections
//!   air-disasm --raw <file>             Treat the file as flat code
//!   air-disasm --hex "55 48 89 e5"      Disassemble a hex string

use std::path::PathBuf;

use air_disasm::arch::{ArchFrontend, Frontend};
use air_disasm::format::OutputFormat;
use air_disasm::parser::GoblinParser;
use air_disasm::{
    disasm_regions, Address, Architecture, BinaryMetadata, BinaryParser, DecodeOptions,
    RecoveryPolicy,
};
use anyhow::{bail, Context, Result};
use clap::Parser;

#[derive(Parser)]
#[command(name = "air-disasm")]
#[command(about = "Decode x86-64 machine code into AIR instructions", long_about = None)]
struct Cli {
    /// Path to the input file, or a hex string with --hex
    input: String,

    /// Interpret INPUT as hex-encoded bytes
    #[arg(long, conflicts_with = "raw")]
    hex: bool,

    /// Treat the file as flat code instead of an object file
    #[arg(long)]
    raw: bool,

    /// Architecture of raw or hex input
    #[arg(long, value_enum, default_value_t = Architecture::X86_64)]
    arch: Architecture,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Address of the first byte of raw or hex input
    #[arg(long, value_parser = parse_address, default_value = "0")]
    base: Address,

    /// What to do after an undecodable instruction
    #[arg(long, value_enum, default_value_t = RecoveryPolicy::Resync)]
    recovery: RecoveryPolicy,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_address(s: &str) -> Result<Address, String> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => Address::from_str_radix(hex, 16).map_err(|e| e.to_string()),
        None => s.parse::<Address>().map_err(|e| e.to_string()),
    }
}

/// Parse hex bytes separated by any mix of whitespace and commas. Each token
/// may carry its own `0x` prefix and must have an even number of digits.
fn parse_hex_bytes(s: &str) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();

    for token in s.split(|c: char| c.is_whitespace() || c == ',').filter(|t| !t.is_empty()) {
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
            bail!("invalid hex digit {:?} in {:?}", bad, token);
        }
        if digits.is_empty() || digits.len() % 2 != 0 {
            bail!("hex token {:?} needs a non-zero, even number of digits", token);
        }

        for pair in digits.as_bytes().chunks(2) {
            let pair = std::str::from_utf8(pair)?;
            bytes.push(u8::from_str_radix(pair, 16)?);
        }
    }

    Ok(bytes)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .init();
}

/// Load the input and describe where the code lives in it.
fn load(cli: &Cli) -> Result<(Vec<u8>, BinaryMetadata)> {
    if cli.hex {
        return Ok((parse_hex_bytes(&cli.input)?, BinaryMetadata::raw(cli.arch)));
    }

    let path = PathBuf::from(&cli.input);
    if cli.raw {
        let image =
            std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        return Ok((image, BinaryMetadata::raw(cli.arch)));
    }

    GoblinParser::new()
        .parse_file(&path)
        .with_context(|| format!("failed to load {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let (image, metadata) = load(&cli)?;
    let Some(frontend) = Frontend::for_architecture(metadata.architecture) else {
        bail!(
            "unsupported architecture {} (supported: {:?})",
            metadata.architecture,
            Frontend::supported()
        );
    };

    let regions: Vec<(&[u8], Address)> = if metadata.sections.is_empty() {
        vec![(image.as_slice(), cli.base)]
    } else {
        metadata.executable_regions(&image)
    };

    let options = DecodeOptions {
        recovery: cli.recovery,
        ..DecodeOptions::default()
    };
    let results = disasm_regions(&regions, metadata.architecture, &options)?;
    let formatter = cli.format.get_formatter(frontend.names());

    for ((bytes, _), (base, disassembly)) in regions.iter().zip(&results) {
        if !disassembly.is_complete() {
            log::warn!("region at 0x{:x}: {}", base, disassembly.exit);
        }
        print!("{}", formatter.format(disassembly, bytes, *base)?);
    }

    Ok(())
}
