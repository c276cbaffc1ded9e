//! Argument locations and access modes.
//!
//! Each argument of an instruction is described by a four-bit location
//! nibble. Argument 1 is always the destination and argument 2 the source,
//! so the two positions use separate tables: `IP` can only be named as a
//! source.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// How an argument's value is interpreted as an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AccessMode {
    /// Use the value as-is.
    #[default]
    Direct,
    /// Treat the value as an offset from the instruction pointer.
    Relative,
}

impl AccessMode {
    /// Create from a mode bit.
    pub fn from_bit(bit: bool) -> Self {
        if bit {
            AccessMode::Relative
        } else {
            AccessMode::Direct
        }
    }

    /// Convert to a mode bit.
    pub fn bit(self) -> u8 {
        match self {
            AccessMode::Direct => 0,
            AccessMode::Relative => 1,
        }
    }
}

/// Where an argument lives.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Location {
    Al,
    Ah,
    Bl,
    Bh,
    Cl,
    Ch,
    Ax,
    Bx,
    Cx,
    /// Instruction pointer, read-only.
    Ip,
    /// Memory addressed by AX.
    Pax,
    /// Memory addressed by BX.
    Pbx,
    /// Memory addressed by CX.
    Pcx,
    /// 16-bit immediate following the instruction.
    Imd,
    /// Memory addressed by the immediate.
    Pimd,
    /// Unrecognized nibble. Using it is an error.
    None,
}

/// Which position an argument occupies in the instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    /// Argument 1, the destination.
    Destination,
    /// Argument 2, the source.
    Source,
}

impl Position {
    /// Map an argument number (1 or 2) to a position.
    pub fn from_argn(argn: u8) -> Option<Self> {
        match argn {
            1 => Some(Position::Destination),
            2 => Some(Position::Source),
            _ => None,
        }
    }
}

const DESTINATION_TABLE: [Location; 16] = [
    Location::Al,
    Location::Ah,
    Location::Bl,
    Location::Bh,
    Location::Cl,
    Location::Ch,
    Location::Ax,
    Location::Bx,
    Location::Cx,
    Location::Pax,
    Location::Pbx,
    Location::Pcx,
    Location::Imd,
    Location::Pimd,
    Location::None,
    Location::None,
];

const SOURCE_TABLE: [Location; 16] = [
    Location::Al,
    Location::Ah,
    Location::Bl,
    Location::Bh,
    Location::Cl,
    Location::Ch,
    Location::Ax,
    Location::Bx,
    Location::Cx,
    Location::Pax,
    Location::Pbx,
    Location::Pcx,
    Location::Imd,
    Location::Pimd,
    Location::Ip,
    Location::None,
];

impl Location {
    fn table(position: Position) -> &'static [Location; 16] {
        match position {
            Position::Destination => &DESTINATION_TABLE,
            Position::Source => &SOURCE_TABLE,
        }
    }

    /// Look up a location nibble. Only the low four bits are used.
    pub fn from_nibble(nibble: u8, position: Position) -> Self {
        Self::table(position)[(nibble & 0x0F) as usize]
    }

    /// The nibble encoding this location in the given position, if it is
    /// legal there.
    pub fn nibble(self, position: Position) -> Option<u8> {
        if self == Location::None {
            return None;
        }
        Self::table(position)
            .iter()
            .position(|&l| l == self)
            .map(|i| i as u8)
    }

    /// Whether the location consumes a 16-bit immediate after the header.
    pub fn has_immediate(self) -> bool {
        matches!(self, Location::Imd | Location::Pimd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_differ_on_ip() {
        assert_eq!(Location::from_nibble(14, Position::Source), Location::Ip);
        assert_eq!(Location::from_nibble(14, Position::Destination), Location::None);
        assert_eq!(Location::Ip.nibble(Position::Destination), None);
        assert_eq!(Location::Ip.nibble(Position::Source), Some(14));
    }

    #[test]
    fn test_unknown_nibble_is_none() {
        assert_eq!(Location::from_nibble(15, Position::Source), Location::None);
        assert_eq!(Location::from_nibble(15, Position::Destination), Location::None);
        assert_eq!(Location::None.nibble(Position::Source), None);
    }

    #[test]
    fn test_nibble_roundtrip() {
        for position in [Position::Destination, Position::Source] {
            for nibble in 0..16u8 {
                let loc = Location::from_nibble(nibble, position);
                if loc != Location::None {
                    assert_eq!(loc.nibble(position), Some(nibble));
                }
            }
        }
    }

    #[test]
    fn test_access_mode_bit() {
        assert_eq!(AccessMode::from_bit(true), AccessMode::Relative);
        assert_eq!(AccessMode::from_bit(AccessMode::Direct.bit() != 0), AccessMode::Direct);
    }
}
