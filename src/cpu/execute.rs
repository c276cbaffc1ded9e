//! Instruction execution.
//!
//! One step decodes the instruction at IP, resolves as many arguments as
//! the opcode uses, applies the operation and then moves IP past the
//! instruction unless a jump already moved it. The instruction size is
//! taken before executing, so code that rewrites its own header still
//! advances by the size it had when it started.

use crate::cpu::argument::{Argument, Cpu};
use crate::cpu::decode::{self, Instruction};
use crate::cpu::location::{AccessMode, Position};
use crate::cpu::opcode::Opcode;
use crate::cpu::operator;
use crate::cpu::thread::Flags;
use thiserror::Error;

/// Errors that end the executing thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("invalid location")]
    InvalidLocation,

    #[error("invalid argument number {0}")]
    InvalidArgument(u8),

    #[error("write to read-only location")]
    ReadOnly,

    #[error("division by zero")]
    DivideByZero,

    #[error("executed data")]
    DataExecuted,
}

type Unary = fn(&mut Cpu<'_>, &Argument) -> Result<(), Fault>;
type Binary = fn(&mut Cpu<'_>, &Argument, &Argument) -> Result<(), Fault>;

impl Cpu<'_> {
    /// Execute the instruction at IP.
    ///
    /// Returns the instruction that was executed. On error the thread is
    /// left as the failing operation left it and IP is not advanced.
    pub fn step(&mut self) -> Result<Instruction, Fault> {
        let instr = decode::decode(self.mem, self.thread.ip);
        let size = instr.size();

        if !self.execute(&instr)? {
            self.thread.advance(size);
        }
        Ok(instr)
    }

    /// Execute a decoded instruction. Returns whether a jump was taken.
    fn execute(&mut self, instr: &Instruction) -> Result<bool, Fault> {
        let binary: Binary = match instr.opcode {
            Opcode::Dat => return Err(Fault::DataExecuted),
            op if op.is_jump() => return self.jump(instr),

            Opcode::Mul => return self.unary(instr, operator::mul),
            Opcode::Imul => return self.unary(instr, operator::imul),
            Opcode::Div => return self.unary(instr, operator::div),
            Opcode::Idiv => return self.unary(instr, operator::idiv),
            Opcode::Neg => return self.unary(instr, operator::neg),
            Opcode::Not => return self.unary(instr, operator::not),
            Opcode::Inc => return self.unary(instr, operator::inc),
            Opcode::Dec => return self.unary(instr, operator::dec),

            Opcode::Int => operator::int,
            Opcode::Mov => operator::mov,
            Opcode::Swp => operator::swp,
            Opcode::Add => operator::add,
            Opcode::Sub => operator::sub,
            Opcode::Cmp => operator::cmp,
            Opcode::Shl => operator::shl,
            Opcode::Shr => operator::shr,
            Opcode::And => operator::and,
            Opcode::Or => operator::or,
            Opcode::Xor => operator::xor,
            // NOP. Jumps never get here.
            _ => return Ok(false),
        };

        let a = self.argument(instr, Position::Destination)?;
        let b = self.argument(instr, Position::Source)?;
        binary(self, &a, &b)?;
        Ok(false)
    }

    fn argument(&self, instr: &Instruction, position: Position) -> Result<Argument, Fault> {
        Argument::resolve_decoded(instr, self.thread, self.mem, position)
    }

    fn unary(&mut self, instr: &Instruction, op: Unary) -> Result<bool, Fault> {
        let a = self.argument(instr, Position::Destination)?;
        op(self, &a)?;
        Ok(false)
    }

    fn jump(&mut self, instr: &Instruction) -> Result<bool, Fault> {
        let a = self.argument(instr, Position::Destination)?;
        let value = self.read_natural(&a);
        if !condition(instr.opcode, &self.thread.flags) {
            return Ok(false);
        }

        self.thread.ip = match instr.mode1 {
            AccessMode::Relative => self.thread.ip.wrapping_add(value),
            AccessMode::Direct => value,
        };
        Ok(true)
    }
}

/// Whether a jump opcode is taken for the given flags. Non-jumps never are.
pub fn condition(op: Opcode, flags: &Flags) -> bool {
    match op {
        Opcode::Jmp => true,
        Opcode::Jg => !flags.z && flags.s == flags.o,
        Opcode::Jge => flags.s == flags.o,
        Opcode::Je => flags.z,
        Opcode::Jne => !flags.z,
        Opcode::Jl => flags.s != flags.o,
        Opcode::Jle => flags.z || flags.s != flags.o,
        Opcode::Jc => flags.c,
        Opcode::Jnc => !flags.c,
        Opcode::Jo => flags.o,
        Opcode::Jno => !flags.o,
        _ => false,
    }
}
