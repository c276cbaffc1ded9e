//! Operation codes.
//!
//! An opcode occupies the top six bits of an instruction's first byte. Only
//! the first 32 values are assigned; everything above decodes as `NOP`, so
//! random bytes in the arena are always executable.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

/// The operation an instruction performs.
///
/// The discriminants are the encoded values, so the declaration order is
/// significant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
    Display, EnumString, IntoStaticStr, EnumIter, EnumCount,
    TryFromPrimitive, IntoPrimitive, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Opcode {
    Nop,
    /// Interrupt. Reserved, currently does nothing.
    Int,
    Mov,
    Swp,
    Add,
    Sub,
    /// Unsigned multiply of AL/AX by the operand.
    Mul,
    /// Signed multiply of AL/AX by the operand.
    Imul,
    /// Unsigned divide of AX or BX:AX by the operand.
    Div,
    /// Signed divide of AX or BX:AX by the operand.
    Idiv,
    Shl,
    Shr,
    Neg,
    Not,
    And,
    Or,
    Xor,
    Inc,
    Dec,
    Cmp,
    Jmp,
    Jg,
    Jge,
    Je,
    Jne,
    Jl,
    Jle,
    Jc,
    Jnc,
    Jo,
    Jno,
    /// Data. Executing it kills the thread.
    Dat,
}

impl Opcode {
    /// Mask for the opcode field once shifted down.
    pub const MASK: u8 = 0x3F;

    /// Decode a six-bit opcode value. Unassigned values become `NOP`.
    pub fn from_bits(value: u8) -> Self {
        Opcode::try_from(value & Self::MASK).unwrap_or(Opcode::Nop)
    }

    /// The encoded six-bit value.
    pub fn bits(self) -> u8 {
        self.into()
    }

    /// Number of arguments the operation resolves when it executes.
    pub fn arity(self) -> u8 {
        match self {
            Opcode::Nop | Opcode::Dat => 0,
            Opcode::Mul
            | Opcode::Imul
            | Opcode::Div
            | Opcode::Idiv
            | Opcode::Neg
            | Opcode::Not
            | Opcode::Inc
            | Opcode::Dec => 1,
            op if op.is_jump() => 1,
            _ => 2,
        }
    }

    /// Whether this is one of the (conditional or unconditional) jumps.
    pub fn is_jump(self) -> bool {
        matches!(
            self,
            Opcode::Jmp
                | Opcode::Jg
                | Opcode::Jge
                | Opcode::Je
                | Opcode::Jne
                | Opcode::Jl
                | Opcode::Jle
                | Opcode::Jc
                | Opcode::Jnc
                | Opcode::Jo
                | Opcode::Jno
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_out_of_range_is_nop() {
        assert_eq!(Opcode::from_bits(31), Opcode::Dat);
        for v in 32..64 {
            assert_eq!(Opcode::from_bits(v), Opcode::Nop);
        }
    }

    #[test]
    fn test_bits_roundtrip() {
        for op in Opcode::iter() {
            assert_eq!(Opcode::from_bits(op.bits()), op);
        }
        assert_eq!(Opcode::COUNT, 32);
    }

    #[test]
    fn test_names() {
        assert_eq!(Opcode::Imul.to_string(), "IMUL");
        assert_eq!(Opcode::from_str("IDIV").unwrap(), Opcode::Idiv);
        assert!(Opcode::from_str("HCF").is_err());
    }

    #[test]
    fn test_arity() {
        assert_eq!(Opcode::Nop.arity(), 0);
        assert_eq!(Opcode::Div.arity(), 1);
        assert_eq!(Opcode::Jle.arity(), 1);
        assert_eq!(Opcode::Swp.arity(), 2);
    }
}
