use crate::processor::Processor;

pub mod clock;
mod config;
mod error;
pub mod graphics;
pub mod input;
pub mod memory;
pub mod processor;

pub use clock::{ManualTime, MonotonicTime, TimeSource};
pub use config::Config;
pub use error::Chip8Error;
pub use input::KeypadHandle;
pub use processor::{ExecState, Quirks};

/// Contains all the different components of the `Chip8` system, excluding the `Processor`.
#[derive(Default)]
#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
pub struct Bus {
    pub clock: clock::Clock,
    pub graphics: graphics::FrameBuffer,
    #[cfg_attr(feature = "persistence", serde(skip))]
    pub input: input::Input,
    pub memory: memory::Memory,
}

/// Read-only access to what a `Chip8` shows the outside world.
pub trait Observer {
    /// The packed display frame, rebuilt only if the screen changed since
    /// the last call.
    fn display_frame(&mut self) -> &[u8];

    /// A fresh copy of all of memory behind the debug framing byte.
    fn debug_frame(&self) -> Vec<u8>;
}

/// Operations a host uses to drive a `Chip8`.
pub trait Controller {
    /// Load a program at `0x200` and reset the machine to run it.
    fn load(&mut self, rom: &[u8]) -> Result<(), Chip8Error>;

    /// Put the machine back into its power-on state, with the last loaded
    /// program in memory.
    fn reset(&mut self);

    fn press_key(&mut self, key_code: u8);

    fn unpress_key(&mut self, key_code: u8);

    /// Run every instruction that is due since the last call, returning how
    /// many ran.
    fn update(&mut self) -> Result<usize, Chip8Error>;
}

/// The main CHIP-8 interpreter state, contains all the components of the
/// CHIP-8 and procedures to interact with them at a high level.
#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
pub struct Chip8 {
    pub processor: Processor,
    pub bus: Bus,
    program: Vec<u8>,
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::with_config(Config::default())
    }
}

impl Chip8 {
    /// Create a new Chip8 instance executing `steps_per_second` instructions
    /// per second.
    pub fn new(steps_per_second: u32) -> Self {
        Self::with_config(Config {
            steps_per_second,
            ..Default::default()
        })
    }

    /// Create a new Chip8 instance running on wall-clock time.
    pub fn with_config(config: Config) -> Self {
        Self {
            processor: Processor::new(config.quirks),
            bus: Bus {
                clock: clock::Clock::new(config.steps_per_second),
                ..Default::default()
            },
            program: Vec::new(),
        }
    }

    /// Create a new Chip8 instance whose clock follows `source`.
    pub fn with_time_source(config: Config, source: Box<dyn TimeSource>) -> Self {
        let mut chip8 = Self::with_config(config);
        chip8.set_time_source(source);
        chip8
    }

    /// Drive the clock from `source` from now on.
    pub fn set_time_source(&mut self, source: Box<dyn TimeSource>) {
        self.bus.clock.set_time_source(source);
    }

    /// Execute one instruction right away, regardless of the clock.
    pub fn step(&mut self) -> Result<(), Chip8Error> {
        self.processor.cycle(&mut self.bus)
    }

    /// A handle for pressing keys from another thread.
    pub fn keypad_handle(&self) -> KeypadHandle {
        self.bus.input.handle()
    }
}

impl Observer for Chip8 {
    fn display_frame(&mut self) -> &[u8] {
        self.bus.graphics.display_frame()
    }

    fn debug_frame(&self) -> Vec<u8> {
        self.bus.memory.debug_frame()
    }
}

impl Controller for Chip8 {
    fn load(&mut self, rom: &[u8]) -> Result<(), Chip8Error> {
        self.bus.memory.load_rom(rom)?;
        self.program = rom.to_vec();
        self.reset();
        log::debug!("Loaded {} byte program", rom.len());
        Ok(())
    }

    fn reset(&mut self) {
        self.processor = Processor::new(self.processor.quirks);
        self.bus.clock.reset();
        self.bus.graphics.clear();
        self.bus.input.release_all();
        self.bus.memory = memory::Memory::new();
        if let Err(e) = self.bus.memory.load_rom(&self.program) {
            log::error!("Failed to reinstall program: {e}");
        }
        log::debug!("Reset");
    }

    fn press_key(&mut self, key_code: u8) {
        self.bus.input.update(key_code, true);
    }

    fn unpress_key(&mut self, key_code: u8) {
        self.bus.input.update(key_code, false);
    }

    fn update(&mut self) -> Result<usize, Chip8Error> {
        let steps = self.bus.clock.advance();
        for _ in 0..steps {
            self.processor.cycle(&mut self.bus)?;
        }
        Ok(steps)
    }
}
