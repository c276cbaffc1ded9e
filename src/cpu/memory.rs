//! The shared arena.
//!
//! 65,536 byte cells shared by every warrior, plus a parallel ownership map
//! recording which player last wrote each cell. All addresses are `u16`, so
//! every access wraps around the end of the arena.

use std::fmt;

/// The number of cells in the arena.
pub const MEMORY_SIZE: usize = 0x10000;

/// Player id stored in the ownership map for cells nobody has written.
pub const UNOWNED: u8 = 0;

/// Arena memory and its ownership map.
#[derive(Clone)]
pub struct Memory {
    cells: Box<[u8]>,
    owners: Box<[u8]>,
}

impl Memory {
    /// Create a zeroed, unowned arena.
    pub fn new() -> Self {
        Self {
            cells: vec![0; MEMORY_SIZE].into_boxed_slice(),
            owners: vec![UNOWNED; MEMORY_SIZE].into_boxed_slice(),
        }
    }

    /// Read one byte.
    #[inline]
    pub fn read_byte(&self, addr: u16) -> u8 {
        self.cells[addr as usize]
    }

    /// Read a big-endian word. The second byte wraps to address 0.
    #[inline]
    pub fn read_word(&self, addr: u16) -> u16 {
        let hi = self.read_byte(addr) as u16;
        let lo = self.read_byte(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    /// Write one byte on behalf of player `pid`.
    #[inline]
    pub fn write_byte(&mut self, addr: u16, value: u8, pid: u8) {
        self.cells[addr as usize] = value;
        self.owners[addr as usize] = pid;
    }

    /// Write a big-endian word on behalf of player `pid`.
    #[inline]
    pub fn write_word(&mut self, addr: u16, value: u16, pid: u8) {
        self.write_byte(addr, (value >> 8) as u8, pid);
        self.write_byte(addr.wrapping_add(1), value as u8, pid);
    }

    /// The player that last wrote `addr`, or [`UNOWNED`].
    #[inline]
    pub fn owner(&self, addr: u16) -> u8 {
        self.owners[addr as usize]
    }

    /// Copy a program into the arena at `offset`, owned by `pid`.
    pub fn load(&mut self, offset: u16, program: &[u8], pid: u8) -> Result<(), MemoryError> {
        let end = offset as usize + program.len();
        if end > MEMORY_SIZE {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available: MEMORY_SIZE - offset as usize,
            });
        }

        self.cells[offset as usize..end].copy_from_slice(program);
        self.owners[offset as usize..end].fill(pid);
        Ok(())
    }

    /// Number of cells currently owned by `pid`.
    pub fn owned_by(&self, pid: u8) -> usize {
        self.owners.iter().filter(|&&owner| owner == pid).count()
    }

    /// The raw cells.
    pub fn as_bytes(&self) -> &[u8] {
        &self.cells
    }

    /// A printable hex view of the whole arena.
    pub fn hex_dump(&self) -> HexDump<'_> {
        HexDump { cells: &self.cells }
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let owned = self.owners.iter().filter(|&&owner| owner != UNOWNED).count();
        f.debug_struct("Memory")
            .field("owned_cells", &owned)
            .field("total_cells", &MEMORY_SIZE)
            .finish()
    }
}

/// Bytes printed per line of a [`HexDump`].
pub const DUMP_LINE_WIDTH: usize = 64;

/// Read-only hex view of the arena: uppercase two-digit bytes separated by
/// spaces, 64 to a line.
pub struct HexDump<'a> {
    cells: &'a [u8],
}

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.cells.chunks(DUMP_LINE_WIDTH) {
            for (i, byte) in line.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{:02X}", byte)?;
            }
            f.write_str("\n")?;
        }
        Ok(())
    }
}

/// Errors from bulk memory operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_is_big_endian() {
        let mut mem = Memory::new();
        mem.write_word(10, 0x1234, 1);
        assert_eq!(mem.read_byte(10), 0x12);
        assert_eq!(mem.read_byte(11), 0x34);
        assert_eq!(mem.read_word(10), 0x1234);
    }

    #[test]
    fn test_word_wraps() {
        let mut mem = Memory::new();
        mem.write_word(0xFFFF, 0xABCD, 2);
        assert_eq!(mem.read_byte(0xFFFF), 0xAB);
        assert_eq!(mem.read_byte(0), 0xCD);
        assert_eq!(mem.owner(0), 2);
        assert_eq!(mem.read_word(0xFFFF), 0xABCD);
    }

    #[test]
    fn test_write_stamps_owner() {
        let mut mem = Memory::new();
        assert_eq!(mem.owner(5), UNOWNED);
        mem.write_byte(5, 0xFF, 3);
        assert_eq!(mem.owner(5), 3);
        assert_eq!(mem.owned_by(3), 1);
    }

    #[test]
    fn test_load_program() {
        let mut mem = Memory::new();
        mem.load(100, &[1, 2, 3], 4).unwrap();
        assert_eq!(mem.read_byte(100), 1);
        assert_eq!(mem.read_byte(102), 3);
        assert_eq!(mem.owned_by(4), 3);

        let err = mem.load(0xFFFF, &[1, 2], 4).unwrap_err();
        assert_eq!(err, MemoryError::ProgramTooLarge { size: 2, available: 1 });
    }

    #[test]
    fn test_hex_dump_format() {
        let mut mem = Memory::new();
        mem.write_byte(0, 0xAB, 1);
        mem.write_byte(64, 0x0F, 1);
        let dump = mem.hex_dump().to_string();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), MEMORY_SIZE / DUMP_LINE_WIDTH);
        assert!(lines[0].starts_with("AB 00 00"));
        assert!(lines[1].starts_with("0F 00"));
        assert_eq!(lines[0].split(' ').count(), DUMP_LINE_WIDTH);
    }
}
