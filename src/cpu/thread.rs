//! Virtual threads.
//!
//! A thread is one execution context inside the arena:
//! - AX, BX, CX: 16-bit general registers, each also addressable as 8-bit halves
//! - IP: 16-bit instruction pointer
//! - O, S, Z, C: overflow, sign, zero and carry flags
//! - a cycle debt carried over when an instruction costs more than a turn allows

use serde::{Deserialize, Serialize};

/// A 16-bit register of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Register {
    Ax,
    Bx,
    Cx,
    Ip,
}

/// The four condition flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Flags {
    /// Overflow (signed result did not fit).
    pub o: bool,
    /// Sign (top bit of the result).
    pub s: bool,
    /// Zero.
    pub z: bool,
    /// Carry (unsigned result did not fit).
    pub c: bool,
}

/// One virtual thread.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Thread {
    pub ax: u16,
    pub bx: u16,
    pub cx: u16,
    pub ip: u16,
    pub flags: Flags,
    /// Cycles still owed on the instruction at `ip`.
    pub debt: u32,
}

impl Thread {
    /// Create a thread with zeroed registers starting at `ip`.
    pub fn new(ip: u16) -> Self {
        Self {
            ip,
            ..Self::default()
        }
    }

    /// Read a full register.
    #[inline]
    pub fn reg(&self, reg: Register) -> u16 {
        match reg {
            Register::Ax => self.ax,
            Register::Bx => self.bx,
            Register::Cx => self.cx,
            Register::Ip => self.ip,
        }
    }

    /// Mutable access to a full register.
    #[inline]
    pub fn reg_mut(&mut self, reg: Register) -> &mut u16 {
        match reg {
            Register::Ax => &mut self.ax,
            Register::Bx => &mut self.bx,
            Register::Cx => &mut self.cx,
            Register::Ip => &mut self.ip,
        }
    }

    /// Lower 8 bits of a register value, e.g. AL from AX.
    #[inline]
    pub fn low(value: u16) -> u8 {
        value as u8
    }

    /// Upper 8 bits of a register value, e.g. AH from AX.
    #[inline]
    pub fn high(value: u16) -> u8 {
        (value >> 8) as u8
    }

    /// Move the instruction pointer forward, wrapping at the arena end.
    pub fn advance(&mut self, bytes: u16) {
        self.ip = self.ip.wrapping_add(bytes);
    }
}
