//! Instruction decoder.
//!
//! Every instruction starts with a two-byte header:
//!
//! ```text
//! byte 0: [opcode:6][arg1 mode:1][arg2 mode:1]
//! byte 1: [arg2 location:4][arg1 location:4]
//! ```
//!
//! followed by one big-endian 16-bit immediate for each argument whose
//! location is `IMD` or `PIMD`, in argument order. Instructions are
//! therefore 2, 4 or 6 bytes long.

use crate::cpu::location::{AccessMode, Location, Position};
use crate::cpu::memory::Memory;
use crate::cpu::opcode::Opcode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size of the fixed header in bytes.
pub const HEADER_SIZE: u16 = 2;

/// Size of one immediate in bytes.
pub const IMMEDIATE_SIZE: u16 = 2;

/// A decoded instruction header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub mode1: AccessMode,
    pub mode2: AccessMode,
    pub loc1: Location,
    pub loc2: Location,
}

impl Instruction {
    /// An instruction with both arguments in direct mode.
    pub fn new(opcode: Opcode, loc1: Location, loc2: Location) -> Self {
        Self {
            opcode,
            mode1: AccessMode::Direct,
            mode2: AccessMode::Direct,
            loc1,
            loc2,
        }
    }

    /// Replace both access modes.
    pub fn with_modes(mut self, mode1: AccessMode, mode2: AccessMode) -> Self {
        self.mode1 = mode1;
        self.mode2 = mode2;
        self
    }

    /// Decode a header from its two bytes.
    pub fn from_header(b0: u8, b1: u8) -> Self {
        Self {
            opcode: Opcode::from_bits(b0 >> 2),
            mode1: AccessMode::from_bit(b0 & 0x02 != 0),
            mode2: AccessMode::from_bit(b0 & 0x01 != 0),
            loc1: Location::from_nibble(b1 & 0x0F, Position::Destination),
            loc2: Location::from_nibble(b1 >> 4, Position::Source),
        }
    }

    /// Encode the header bytes.
    ///
    /// Fails when a location cannot be expressed in its position.
    pub fn header(&self) -> Result<[u8; 2], EncodeError> {
        let nibble = |loc: Location, position| {
            loc.nibble(position)
                .ok_or(EncodeError::IllegalLocation { location: loc, position })
        };
        let n1 = nibble(self.loc1, Position::Destination)?;
        let n2 = nibble(self.loc2, Position::Source)?;

        let b0 = (self.opcode.bits() << 2) | (self.mode1.bit() << 1) | self.mode2.bit();
        let b1 = (n2 << 4) | n1;
        Ok([b0, b1])
    }

    /// Location of argument 1 or 2.
    pub fn location(&self, position: Position) -> Location {
        match position {
            Position::Destination => self.loc1,
            Position::Source => self.loc2,
        }
    }

    /// Access mode of argument 1 or 2.
    pub fn mode(&self, position: Position) -> AccessMode {
        match position {
            Position::Destination => self.mode1,
            Position::Source => self.mode2,
        }
    }

    /// Number of immediates following the header (0, 1 or 2).
    pub fn immediates(&self) -> u8 {
        self.loc1.has_immediate() as u8 + self.loc2.has_immediate() as u8
    }

    /// Total encoded size in bytes.
    pub fn size(&self) -> u16 {
        HEADER_SIZE + IMMEDIATE_SIZE * self.immediates() as u16
    }

    /// Offset from the start of the instruction to an argument's immediate.
    ///
    /// Immediates are laid out in argument order, so argument 2's slot moves
    /// back when argument 1 has none.
    pub fn immediate_offset(&self, position: Position) -> u16 {
        match position {
            Position::Destination => HEADER_SIZE,
            Position::Source if self.loc1.has_immediate() => HEADER_SIZE + IMMEDIATE_SIZE,
            Position::Source => HEADER_SIZE,
        }
    }
}

/// Decode the instruction at `addr`. Never fails: unknown opcodes become
/// `NOP` and unknown locations become [`Location::None`].
pub fn decode(mem: &Memory, addr: u16) -> Instruction {
    Instruction::from_header(mem.read_byte(addr), mem.read_byte(addr.wrapping_add(1)))
}

/// Just the opcode of the instruction at `addr`.
pub fn opcode_at(mem: &Memory, addr: u16) -> Opcode {
    Opcode::from_bits(mem.read_byte(addr) >> 2)
}

/// Address of an argument's immediate for the instruction at `addr`.
pub fn immediate_address(instr: &Instruction, addr: u16, position: Position) -> u16 {
    addr.wrapping_add(instr.immediate_offset(position))
}

/// Encode an instruction followed by its immediates, in argument order.
pub fn encode(instr: Instruction, immediates: &[u16]) -> Result<Vec<u8>, EncodeError> {
    let expected = instr.immediates() as usize;
    if immediates.len() != expected {
        return Err(EncodeError::ImmediateCount { expected, found: immediates.len() });
    }

    let mut bytes = Vec::with_capacity(instr.size() as usize);
    bytes.extend_from_slice(&instr.header()?);
    for imd in immediates {
        bytes.extend_from_slice(&imd.to_be_bytes());
    }
    Ok(bytes)
}

/// Errors that can occur while encoding an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("location {location} cannot be used as {position:?}")]
    IllegalLocation { location: Location, position: Position },

    #[error("expected {expected} immediates, found {found}")]
    ImmediateCount { expected: usize, found: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_fields() {
        // ADD (4) << 2 | relative arg1
        let instr = Instruction::from_header(0x12, 0xC6);
        assert_eq!(instr.opcode, Opcode::Add);
        assert_eq!(instr.mode1, AccessMode::Relative);
        assert_eq!(instr.mode2, AccessMode::Direct);
        assert_eq!(instr.loc1, Location::Ax);
        assert_eq!(instr.loc2, Location::Imd);
    }

    #[test]
    fn test_sizes() {
        assert_eq!(Instruction::new(Opcode::Mov, Location::Ax, Location::Bx).size(), 2);
        assert_eq!(Instruction::new(Opcode::Mov, Location::Ax, Location::Imd).size(), 4);
        assert_eq!(Instruction::new(Opcode::Mov, Location::Pimd, Location::Imd).size(), 6);
    }

    #[test]
    fn test_immediate_offsets() {
        let both = Instruction::new(Opcode::Cmp, Location::Imd, Location::Imd);
        assert_eq!(both.immediate_offset(Position::Destination), 2);
        assert_eq!(both.immediate_offset(Position::Source), 4);

        let second_only = Instruction::new(Opcode::Add, Location::Pax, Location::Pimd);
        assert_eq!(second_only.immediate_offset(Position::Source), 2);
    }

    #[test]
    fn test_decode_wraps() {
        let mut mem = Memory::new();
        let header = Instruction::new(Opcode::Sub, Location::Cl, Location::Ch).header().unwrap();
        mem.write_byte(0xFFFF, header[0], 1);
        mem.write_byte(0, header[1], 1);
        let instr = decode(&mem, 0xFFFF);
        assert_eq!(instr.opcode, Opcode::Sub);
        assert_eq!(instr.loc2, Location::Ch);
        assert_eq!(immediate_address(&instr, 0xFFFF, Position::Destination), 1);
    }

    #[test]
    fn test_unknown_opcode_is_nop() {
        let mut mem = Memory::new();
        mem.write_byte(0, 0xFC, 1);
        assert_eq!(opcode_at(&mem, 0), Opcode::Nop);
    }

    #[test]
    fn test_illegal_location() {
        let err = Instruction::new(Opcode::Mov, Location::Ip, Location::Ax).header().unwrap_err();
        assert_eq!(
            err,
            EncodeError::IllegalLocation { location: Location::Ip, position: Position::Destination }
        );
    }

    #[test]
    fn test_encode_layout() {
        let instr = Instruction::new(Opcode::Mov, Location::Pimd, Location::Imd);
        let bytes = encode(instr, &[0x1234, 0xABCD]).unwrap();
        assert_eq!(bytes.len(), instr.size() as usize);
        assert_eq!(&bytes[2..], &[0x12, 0x34, 0xAB, 0xCD]);
        assert_eq!(Instruction::from_header(bytes[0], bytes[1]), instr);

        let err = encode(instr, &[1]).unwrap_err();
        assert_eq!(err, EncodeError::ImmediateCount { expected: 2, found: 1 });
    }

    proptest! {
        #[test]
        fn prop_header_roundtrip(op in 0u8..32, m1: bool, m2: bool, n1 in 0u8..14, n2 in 0u8..15) {
            let instr = Instruction {
                opcode: Opcode::from_bits(op),
                mode1: AccessMode::from_bit(m1),
                mode2: AccessMode::from_bit(m2),
                loc1: Location::from_nibble(n1, Position::Destination),
                loc2: Location::from_nibble(n2, Position::Source),
            };
            let [b0, b1] = instr.header().unwrap();
            prop_assert_eq!(Instruction::from_header(b0, b1), instr);
        }
    }
}
