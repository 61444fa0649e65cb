//! Decode driver: one instruction per iteration over a fixed input buffer.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::Serialize;

use crate::air::{InstructionStore, CHUNK_CAPACITY};
use crate::arch::ArchFrontend;
use crate::context::DecodeContext;

/// Why a single instruction could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodeError {
    /// Not enough input left for a required field.
    #[error("truncated instruction at offset {offset}: need {needed} bytes, have {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// The opcode byte has no instruction class.
    #[error("unclassified opcode {opcode:#04x} at offset {offset}")]
    UnclassifiedOpcode { offset: usize, opcode: u8 },

    /// A sub-encoding the instruction class does not define.
    #[error("invalid encoding at offset {offset}: {reason}")]
    InvalidEncoding { offset: usize, reason: String },
}

impl DecodeError {
    pub fn truncated(offset: usize, needed: usize, available: usize) -> Self {
        Self::Truncated {
            offset,
            needed,
            available,
        }
    }

    pub fn unclassified(offset: usize, opcode: u8) -> Self {
        Self::UnclassifiedOpcode { offset, opcode }
    }

    pub fn invalid_encoding(offset: usize, reason: impl Into<String>) -> Self {
        Self::InvalidEncoding {
            offset,
            reason: reason.into(),
        }
    }

    pub fn is_truncation(&self) -> bool {
        matches!(self, DecodeError::Truncated { .. })
    }

    pub fn offset(&self) -> usize {
        match self {
            DecodeError::Truncated { offset, .. }
            | DecodeError::UnclassifiedOpcode { offset, .. }
            | DecodeError::InvalidEncoding { offset, .. } => *offset,
        }
    }
}

/// What to do after an unclassified opcode or invalid sub-encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryPolicy {
    /// Drop the instruction and continue at the byte after its opcode.
    #[default]
    Resync,
    /// Stop decoding at the first failure.
    Abort,
}

impl fmt::Display for RecoveryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryPolicy::Resync => write!(f, "resync"),
            RecoveryPolicy::Abort => write!(f, "abort"),
        }
    }
}

impl FromStr for RecoveryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "resync" => Ok(RecoveryPolicy::Resync),
            "abort" => Ok(RecoveryPolicy::Abort),
            _ => Err(format!("Unknown recovery policy: {}", s)),
        }
    }
}

/// Driver configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOptions {
    pub recovery: RecoveryPolicy,
    /// Instructions per store chunk.
    pub chunk_capacity: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            recovery: RecoveryPolicy::Resync,
            chunk_capacity: CHUNK_CAPACITY,
        }
    }
}

/// How a decode run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DecodeExit {
    /// The cursor reached the end of the input.
    Done,
    /// The input ended with prefix bytes and no opcode.
    TrailingPrefixes { offset: usize },
    /// The instruction starting at `offset` ran past the end of the input.
    Truncated { offset: usize, error: DecodeError },
    /// Stopped by [`RecoveryPolicy::Abort`].
    Aborted { offset: usize, error: DecodeError },
}

impl DecodeExit {
    pub fn is_done(&self) -> bool {
        matches!(self, DecodeExit::Done)
    }
}

impl fmt::Display for DecodeExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeExit::Done => write!(f, "done"),
            DecodeExit::TrailingPrefixes { offset } => {
                write!(f, "trailing prefix bytes at offset {}", offset)
            }
            DecodeExit::Truncated { error, .. } => write!(f, "{}", error),
            DecodeExit::Aborted { error, .. } => write!(f, "aborted: {}", error),
        }
    }
}

/// Result of one decode run.
#[derive(Debug, Clone)]
pub struct Disassembly {
    pub instructions: InstructionStore,
    pub exit: DecodeExit,
    /// Instructions whose slot was rolled back.
    pub discarded: usize,
}

impl Disassembly {
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_complete(&self) -> bool {
        self.exit.is_done()
    }
}

/// Decode driver bound to one front end.
///
/// The driver holds no per-run state, so one instance can decode any number
/// of buffers, including from several threads at once.
#[derive(Debug, Clone)]
pub struct Decoder<F> {
    frontend: F,
    options: DecodeOptions,
}

impl<F: ArchFrontend> Decoder<F> {
    pub fn new(frontend: F, options: DecodeOptions) -> Self {
        Self { frontend, options }
    }

    pub fn frontend(&self) -> &F {
        &self.frontend
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Decode `bytes` front to back.
    ///
    /// A slot is reserved before every handler call and rolled back if the
    /// handler fails. The handler works on a fork of the context, so a failed
    /// attempt never moves the driver's cursor past the opcode byte.
    pub fn decode(&self, bytes: &[u8]) -> Disassembly {
        log::debug!(
            "Decoding {} bytes for {}",
            bytes.len(),
            self.frontend.architecture()
        );

        let mut store = InstructionStore::with_chunk_capacity(self.options.chunk_capacity);
        let mut ctx = DecodeContext::new(bytes);
        let mut discarded = 0;

        let exit = loop {
            if ctx.is_at_end() {
                break DecodeExit::Done;
            }

            let instr_start = ctx.position();
            ctx.reset_instr();
            self.frontend.init_instr(&mut ctx);
            if ctx.is_at_end() {
                break DecodeExit::TrailingPrefixes {
                    offset: instr_start,
                };
            }

            let opcode = match ctx.read_u8() {
                Ok(opcode) => opcode,
                Err(error) => {
                    break DecodeExit::Truncated {
                        offset: instr_start,
                        error,
                    }
                }
            };

            let slot = store.reserve();
            let mut attempt = ctx.clone();
            match self.frontend.handle_instr(&mut attempt, opcode, slot) {
                Ok(()) => {
                    slot.offset = instr_start;
                    slot.length = attempt.position() - instr_start;
                    log::trace!(
                        "Committed {} at offset {} ({} bytes)",
                        slot.kind,
                        slot.offset,
                        slot.length
                    );
                    store.commit();
                    ctx = attempt;
                }
                Err(error) => {
                    store.rollback_last();
                    discarded += 1;
                    log::trace!("Discarded instruction at offset {}: {}", instr_start, error);

                    if error.is_truncation() {
                        break DecodeExit::Truncated {
                            offset: instr_start,
                            error,
                        };
                    }
                    if self.options.recovery == RecoveryPolicy::Abort {
                        break DecodeExit::Aborted {
                            offset: instr_start,
                            error,
                        };
                    }
                    // `ctx` still sits one byte past the opcode.
                }
            }
        };

        match &exit {
            DecodeExit::Done => {}
            DecodeExit::TrailingPrefixes { offset } => {
                log::debug!("Input ends with prefix bytes at offset {}", offset)
            }
            DecodeExit::Truncated { .. } | DecodeExit::Aborted { .. } => {
                log::warn!("Decoding stopped early: {}", exit)
            }
        }
        log::debug!(
            "Decoded {} instructions, discarded {}",
            store.len(),
            discarded
        );

        Disassembly {
            instructions: store,
            exit,
            discarded,
        }
    }
}
