//! Argument resolution.
//!
//! An [`Argument`] is a resolved operand: it records *where* the value lives
//! (a register slot or a memory cell) and how wide it naturally is, without
//! copying the value. All reads and writes go through a [`Cpu`], the view of
//! one thread and the arena that exists only for a single instruction step,
//! so no argument can observe state from another step.

use crate::cpu::decode::{self, Instruction};
use crate::cpu::execute::Fault;
use crate::cpu::location::{AccessMode, Location, Position};
use crate::cpu::memory::Memory;
use crate::cpu::thread::{Register, Thread};

/// Operand width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    Byte,
    Word,
}

impl Width {
    /// All-ones mask for the width.
    #[inline]
    pub fn mask(self) -> u16 {
        match self {
            Width::Byte => 0x00FF,
            Width::Word => 0xFFFF,
        }
    }

    /// The sign (top) bit for the width.
    #[inline]
    pub fn sign_bit(self) -> u16 {
        match self {
            Width::Byte => 0x0080,
            Width::Word => 0x8000,
        }
    }

    /// Number of bits.
    #[inline]
    pub fn bits(self) -> u32 {
        match self {
            Width::Byte => 8,
            Width::Word => 16,
        }
    }

    /// Whether `value` is negative at this width.
    #[inline]
    pub fn is_negative(self, value: u16) -> bool {
        value & self.sign_bit() != 0
    }
}

/// Which part of a 16-bit register an argument names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Part {
    Low,
    High,
    Full,
}

/// The storage an argument refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Storage {
    /// A register slot of the executing thread.
    Register { reg: Register, part: Part },
    /// A fixed 16-bit immediate inside the instruction.
    Immediate(u16),
    /// A memory cell, one or two bytes wide depending on the operation.
    Memory(u16),
}

/// A resolved instruction argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Argument {
    pub storage: Storage,
    /// Set only for the instruction pointer.
    pub read_only: bool,
}

impl Argument {
    fn register(reg: Register, part: Part) -> Self {
        Self {
            storage: Storage::Register { reg, part },
            read_only: reg == Register::Ip,
        }
    }

    fn memory(addr: u16) -> Self {
        Self { storage: Storage::Memory(addr), read_only: false }
    }

    /// Resolve argument `argn` (1 or 2) of the instruction at the thread's IP.
    pub fn resolve(thread: &Thread, mem: &Memory, argn: u8) -> Result<Self, Fault> {
        let position = Position::from_argn(argn).ok_or(Fault::InvalidArgument(argn))?;
        let instr = decode::decode(mem, thread.ip);
        Self::resolve_decoded(&instr, thread, mem, position)
    }

    /// Resolve one argument of an already decoded instruction located at the
    /// thread's IP.
    pub fn resolve_decoded(
        instr: &Instruction,
        thread: &Thread,
        mem: &Memory,
        position: Position,
    ) -> Result<Self, Fault> {
        let mode = instr.mode(position);
        let ip = thread.ip;

        // Register value used as an address, optionally relative to IP.
        let pointer = |reg: Register| {
            let base = thread.reg(reg);
            match mode {
                AccessMode::Relative => ip.wrapping_add(base),
                AccessMode::Direct => base,
            }
        };

        let arg = match instr.location(position) {
            Location::Al => Self::register(Register::Ax, Part::Low),
            Location::Ah => Self::register(Register::Ax, Part::High),
            Location::Bl => Self::register(Register::Bx, Part::Low),
            Location::Bh => Self::register(Register::Bx, Part::High),
            Location::Cl => Self::register(Register::Cx, Part::Low),
            Location::Ch => Self::register(Register::Cx, Part::High),
            Location::Ax => Self::register(Register::Ax, Part::Full),
            Location::Bx => Self::register(Register::Bx, Part::Full),
            Location::Cx => Self::register(Register::Cx, Part::Full),
            Location::Ip => Self::register(Register::Ip, Part::Full),

            Location::Pax => Self::memory(pointer(Register::Ax)),
            Location::Pbx => Self::memory(pointer(Register::Bx)),
            Location::Pcx => Self::memory(pointer(Register::Cx)),

            Location::Imd => Self {
                storage: Storage::Immediate(decode::immediate_address(instr, ip, position)),
                read_only: false,
            },
            Location::Pimd => {
                let target = mem.read_word(decode::immediate_address(instr, ip, position));
                match mode {
                    AccessMode::Relative => Self::memory(ip.wrapping_add(target)),
                    AccessMode::Direct => Self::memory(target),
                }
            }

            Location::None => return Err(Fault::InvalidLocation),
        };
        Ok(arg)
    }

    /// The width the storage naturally has.
    ///
    /// Scalable memory counts as a byte; it only becomes a word when an
    /// operation asks for one.
    pub fn width(&self) -> Width {
        match self.storage {
            Storage::Register { part: Part::Full, .. } => Width::Word,
            Storage::Register { .. } => Width::Byte,
            Storage::Immediate(_) => Width::Word,
            Storage::Memory(_) => Width::Byte,
        }
    }

    pub fn is_8bit(&self) -> bool {
        self.width() == Width::Byte
    }

    /// True for immediates and memory cells.
    pub fn is_mem(&self) -> bool {
        matches!(self.storage, Storage::Immediate(_) | Storage::Memory(_))
    }

    /// Width of a two-operand operation.
    ///
    /// The destination decides, except that a scalable memory destination
    /// takes a 16-bit source's width.
    pub fn op_width(arg1: &Argument, arg2: &Argument) -> Width {
        if Self::is_8bit_op(arg1, arg2) {
            Width::Byte
        } else {
            Width::Word
        }
    }

    /// Whether a two-operand operation is 8-bit.
    pub fn is_8bit_op(arg1: &Argument, arg2: &Argument) -> bool {
        // Immediates are never 8-bit, so only memory destinations defer here.
        arg1.is_8bit() && !(arg1.is_mem() && !arg2.is_8bit())
    }
}

/// A thread's view of the arena for one instruction step.
///
/// Holds the exclusive borrows every argument access needs, plus the id of
/// the player the thread belongs to, which is stamped on every memory write.
pub struct Cpu<'a> {
    pub thread: &'a mut Thread,
    pub mem: &'a mut Memory,
    pub pid: u8,
}

impl<'a> Cpu<'a> {
    pub fn new(thread: &'a mut Thread, mem: &'a mut Memory, pid: u8) -> Self {
        Self { thread, mem, pid }
    }

    /// Resolve argument `argn` of the instruction at IP.
    pub fn resolve(&self, argn: u8) -> Result<Argument, Fault> {
        Argument::resolve(self.thread, self.mem, argn)
    }

    /// Read an argument at the given width. 8-bit values are zero-padded and
    /// multi-byte memory is big-endian.
    pub fn read(&self, arg: &Argument, width: Width) -> u16 {
        match arg.storage {
            Storage::Register { reg, part } => {
                let value = self.thread.reg(reg);
                match part {
                    Part::Low => Thread::low(value) as u16,
                    Part::High => Thread::high(value) as u16,
                    Part::Full => value & width.mask(),
                }
            }
            Storage::Immediate(addr) => self.mem.read_word(addr) & width.mask(),
            Storage::Memory(addr) => match width {
                Width::Byte => self.mem.read_byte(addr) as u16,
                Width::Word => self.mem.read_word(addr),
            },
        }
    }

    /// Read an argument at its natural width.
    pub fn read_natural(&self, arg: &Argument) -> u16 {
        self.read(arg, arg.width())
    }

    /// Write `value` truncated to `width`. Register halves only change their
    /// own byte and immediates are always rewritten in full.
    ///
    /// Returns the value as stored.
    pub fn write(&mut self, arg: &Argument, value: u16, width: Width) -> Result<u16, Fault> {
        if arg.read_only {
            return Err(Fault::ReadOnly);
        }
        let value = value & width.mask();

        let stored = match arg.storage {
            Storage::Register { reg, part } => {
                let slot = self.thread.reg_mut(reg);
                match part {
                    Part::Low => {
                        *slot = (*slot & 0xFF00) | (value & 0x00FF);
                        value & 0x00FF
                    }
                    Part::High => {
                        *slot = (*slot & 0x00FF) | ((value & 0x00FF) << 8);
                        value & 0x00FF
                    }
                    Part::Full => {
                        *slot = value;
                        value
                    }
                }
            }
            Storage::Immediate(addr) => {
                self.mem.write_word(addr, value, self.pid);
                value
            }
            Storage::Memory(addr) => {
                match width {
                    Width::Byte => self.mem.write_byte(addr, value as u8, self.pid),
                    Width::Word => self.mem.write_word(addr, value, self.pid),
                }
                value
            }
        };
        Ok(stored)
    }

    /// Copy `src` into `dst` using the source's width.
    pub fn write_from(&mut self, dst: &Argument, src: &Argument) -> Result<u16, Fault> {
        let width = src.width();
        let value = self.read(src, width);
        self.write(dst, value, width)
    }

    /// Exchange two arguments' values at their natural widths.
    ///
    /// Both sides are read before either is written, so overlapping storage
    /// (e.g. AL and AX) is handled consistently.
    pub fn swap(&mut self, a: &Argument, b: &Argument) -> Result<(), Fault> {
        if a.read_only || b.read_only {
            return Err(Fault::ReadOnly);
        }
        let (wa, wb) = (a.width(), b.width());
        let va = self.read(a, wa);
        let vb = self.read(b, wb);
        self.write(a, vb, wb)?;
        self.write(b, va, wa)?;
        Ok(())
    }
}
