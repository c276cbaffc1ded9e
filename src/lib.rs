//! # corevm
//!
//! A 16-bit Core War arena.
//!
//! Warriors are small machine-code programs dropped at random offsets into
//! one shared 64KB memory. Each player owns a queue of virtual threads that
//! take turns executing instructions; a thread dies when it faults, and the
//! player whose code it died on gets the credit. The last player standing,
//! or the best scorer when the cycle budget runs out, wins.

pub mod cpu;
pub mod asm;
pub mod game;

// Re-export commonly used types
pub use cpu::{Cpu, Fault, Instruction, Memory, Opcode, Thread};
pub use asm::{assemble, disassemble, AssemblerError};
pub use game::{
    ConfigError, Event, EventSink, Game, GameConfig, GameError, JsonLines, MatchReport,
};
