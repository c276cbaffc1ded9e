//! CPU emulation for the arena.
//!
//! This module implements the virtual machine every warrior runs on:
//! - a 65,536 byte shared arena with a per-cell ownership map
//! - threads with three 16-bit registers (AX, BX, CX, each split into 8-bit
//!   halves), an instruction pointer and O/S/Z/C flags
//! - a 32-opcode instruction set with variable-length (2, 4 or 6 byte)
//!   instructions and register, memory and immediate operands

pub mod opcode;
pub mod location;
pub mod memory;
pub mod thread;
pub mod decode;
pub mod argument;
pub mod operator;
pub mod execute;

pub use opcode::Opcode;
pub use location::{AccessMode, Location, Position};
pub use memory::{Memory, MemoryError, MEMORY_SIZE};
pub use thread::{Flags, Register, Thread};
pub use decode::{Instruction, EncodeError};
pub use argument::{Argument, Cpu, Width};
pub use execute::Fault;
