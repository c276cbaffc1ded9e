//! Assembler and disassembler for warrior programs.
//!
//! This module provides:
//! - A simple two-pass assembler (text → program bytes)
//! - A disassembler (program bytes → readable text)
//! - [`encode`], the low-level instruction builder both are built on

pub mod assembler;
pub mod disasm;

pub use crate::cpu::decode::encode;
pub use assembler::{assemble, AssemblerError};
pub use disasm::{disassemble, disassemble_instruction};
