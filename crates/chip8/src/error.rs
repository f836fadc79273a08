use thiserror::Error;

/// Errors surfaced by the `Chip8` to its host.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Chip8Error {
    /// The program counter left the fetchable program area. The machine
    /// can't continue from here, the host is expected to stop.
    #[error("program counter out of bounds: {pc:#06X}")]
    ProgramCounterOutOfBounds { pc: usize },

    /// A ROM was too large to fit in program memory.
    #[error("ROM is {size} bytes, but at most {max} bytes fit in memory")]
    RomTooLarge { size: usize, max: usize },
}

impl Chip8Error {
    /// Returns whether this error means the machine has halted for good.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ProgramCounterOutOfBounds { .. })
    }
}
