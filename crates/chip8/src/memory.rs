use std::ops::{Index, IndexMut};

use crate::error::Chip8Error;

/// Total size of the Chip8 memory.
pub const MEMORY_SIZE: usize = 4096;

/// Where programs are loaded, everything below belongs to the interpreter.
pub const PROGRAM_START: usize = 0x200;

/// Largest program that fits between `PROGRAM_START` and the end of memory.
pub const MAX_PROGRAM_SIZE: usize = MEMORY_SIZE - PROGRAM_START;

/// Highest address an instruction can be fetched from (the fetch reads two bytes).
pub const LAST_FETCH_ADDR: usize = MEMORY_SIZE - 2;

/// Framing byte that marks a memory dump.
pub const DEBUG_FRAME_MARKER: u8 = 0xFF;

/// Length of a debug frame, including the framing byte.
pub const DEBUG_FRAME_LEN: usize = 1 + MEMORY_SIZE;

/// Addresses are 12 bits wide.
const ADDRESS_MASK: usize = MEMORY_SIZE - 1;

/// Number of bytes making up a single font glyph.
pub const FONT_GLYPH_SIZE: usize = 5;

/// Built in Chip8 font data, stored at the very start of memory.
const FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// The 4K memory of the `Chip8`, with the font preloaded.
#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone)]
pub struct Memory {
    #[cfg_attr(feature = "persistence", serde(with = "serde_big_array::BigArray"))]
    memory: [u8; MEMORY_SIZE],
}

impl Default for Memory {
    fn default() -> Self {
        let mut memory = [0; MEMORY_SIZE];
        memory[..FONT.len()].copy_from_slice(&FONT);
        Self { memory }
    }
}

impl Memory {
    /// Create a new `Memory` holding only the font.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `data` into program memory starting at `PROGRAM_START`.
    ///
    /// Whatever is left of program memory after `data` is zeroed. Programs
    /// larger than `MAX_PROGRAM_SIZE` are rejected and memory is left untouched.
    pub fn load_rom(&mut self, data: &[u8]) -> Result<(), Chip8Error> {
        if data.len() > MAX_PROGRAM_SIZE {
            return Err(Chip8Error::RomTooLarge {
                size: data.len(),
                max: MAX_PROGRAM_SIZE,
            });
        }
        let program = &mut self.memory[PROGRAM_START..];
        program[..data.len()].copy_from_slice(data);
        program[data.len()..].fill(0);
        Ok(())
    }

    /// Fetch the big-endian instruction word at `addr`.
    pub fn read_opcode(&self, addr: usize) -> u16 {
        u16::from_be_bytes([self[addr], self[addr + 1]])
    }

    /// Raw view over the whole address space.
    pub fn as_slice(&self) -> &[u8] {
        &self.memory
    }

    /// Produce a debug frame: the framing byte followed by all of memory.
    pub fn debug_frame(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(DEBUG_FRAME_LEN);
        frame.push(DEBUG_FRAME_MARKER);
        frame.extend_from_slice(&self.memory);
        frame
    }
}

impl Index<usize> for Memory {
    type Output = u8;

    fn index(&self, index: usize) -> &Self::Output {
        &self.memory[index & ADDRESS_MASK]
    }
}

impl IndexMut<usize> for Memory {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.memory[index & ADDRESS_MASK]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_loaded_at_start() {
        let memory = Memory::new();
        assert_eq!(&memory.as_slice()[..FONT.len()], &FONT);
        assert!(memory.as_slice()[FONT.len()..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_load_rom() {
        let mut memory = Memory::new();
        memory.load_rom(&[0x12, 0x34, 0x56]).unwrap();
        assert_eq!(memory[PROGRAM_START], 0x12);
        assert_eq!(memory.read_opcode(PROGRAM_START), 0x1234);
        assert_eq!(memory[PROGRAM_START + 3], 0);
    }

    #[test]
    fn test_load_rom_clears_previous_program() {
        let mut memory = Memory::new();
        memory.load_rom(&[0xAA; 16]).unwrap();
        memory.load_rom(&[0x01]).unwrap();
        assert_eq!(memory[PROGRAM_START], 0x01);
        assert_eq!(memory[PROGRAM_START + 1], 0);
        assert_eq!(memory[PROGRAM_START + 15], 0);
    }

    #[test]
    fn test_load_rom_max_size() {
        let mut memory = Memory::new();
        memory.load_rom(&[0xEE; MAX_PROGRAM_SIZE]).unwrap();
        assert_eq!(memory[LAST_FETCH_ADDR + 1], 0xEE);
        // font untouched
        assert_eq!(memory[0], 0xF0);
    }

    #[test]
    fn test_load_rom_too_large() {
        let mut memory = Memory::new();
        memory.load_rom(&[0x11, 0x22]).unwrap();
        let err = memory.load_rom(&[0xEE; MAX_PROGRAM_SIZE + 1]).unwrap_err();
        assert!(matches!(
            err,
            Chip8Error::RomTooLarge {
                size,
                max: MAX_PROGRAM_SIZE
            } if size == MAX_PROGRAM_SIZE + 1
        ));
        // the previous program is still there
        assert_eq!(memory.read_opcode(PROGRAM_START), 0x1122);
        assert_eq!(memory[0], 0xF0);
    }

    #[test]
    fn test_addresses_wrap() {
        let mut memory = Memory::new();
        memory[MEMORY_SIZE + 0x300] = 7;
        assert_eq!(memory[0x300], 7);
    }

    #[test]
    fn test_debug_frame() {
        let mut memory = Memory::new();
        memory[0xFFF] = 0x42;
        let frame = memory.debug_frame();
        assert_eq!(frame.len(), DEBUG_FRAME_LEN);
        assert_eq!(frame[0], DEBUG_FRAME_MARKER);
        assert_eq!(frame[1], 0xF0);
        assert_eq!(frame[DEBUG_FRAME_LEN - 1], 0x42);
    }
}
