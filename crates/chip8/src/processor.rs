use crate::{
    error::Chip8Error,
    graphics::{HEIGHT, WIDTH},
    memory::{FONT_GLYPH_SIZE, LAST_FETCH_ADDR, PROGRAM_START},
    Bus,
};

/// default starting point for most Chip8 programs
const STARTING_PC: usize = PROGRAM_START;

/// Maximum depth of nested subroutine calls.
pub const STACK_SIZE: usize = 16;

/// Describes how the program counter should be updated after
/// executing an instruction.
enum PCUpdate {
    /// Go directly to the next instruction (pc + 2)
    Next,

    /// Skip the next instruction (pc + 4).
    SkipNext,

    /// Jump to the given address.
    Jump(usize),

    /// Stay on the current instruction, it runs again next cycle.
    Hold,
}

/// Whether the processor is executing instructions or parked on `Fx0A`.
#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecState {
    #[default]
    Running,
    WaitingForKeypress,
}

/// Switches for instructions that Chip8 interpreters disagree on.
#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Quirks {
    /// `8xy6` and `8xyE` shift Vy into Vx, instead of shifting Vx in place.
    pub shift_uses_vy: bool,

    /// `Fx55` and `Fx65` leave I pointing just past the last register
    /// transferred, instead of leaving it unchanged.
    pub load_store_increments_index: bool,
}

#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default)]
pub struct Processor {
    /// Vx registers
    pub v: [u8; 16],

    /// Index register
    pub i: u16,

    /// Program counter
    pub pc: usize,

    /// Stack pointer
    pub sp: usize,

    /// Stack memory, holding the addresses of the calls that haven't returned
    pub stack: [usize; STACK_SIZE],

    /// Running, or waiting on a key press
    pub state: ExecState,

    pub quirks: Quirks,

    /// The last opcode that has been processed
    pub last_opcode: u16,

    /// The address of the last opcode that has been processed
    pub last_opcode_addr: usize,
}

impl Processor {
    pub fn new(quirks: Quirks) -> Self {
        Self {
            pc: STARTING_PC,
            quirks,
            ..Default::default()
        }
    }

    /// Fetch, decode and execute the instruction at the program counter.
    ///
    /// Fails only when the program counter is outside of program memory,
    /// after which the processor can't make progress anymore.
    pub fn cycle(&mut self, bus: &mut Bus) -> Result<(), Chip8Error> {
        if !(STARTING_PC..=LAST_FETCH_ADDR).contains(&self.pc) {
            log::error!("Program counter out of bounds: {:#06X}", self.pc);
            return Err(Chip8Error::ProgramCounterOutOfBounds { pc: self.pc });
        }

        let opcode = bus.memory.read_opcode(self.pc);
        self.last_opcode = opcode;
        self.last_opcode_addr = self.pc;
        log::trace!("{:#06X}: {opcode:04X}", self.pc);

        // Fx0A is the only instruction that spans several cycles
        let update = if opcode & 0xF0FF == 0xF00A {
            self.wait_for_key(usize::from((opcode & 0x0F00) >> 8), bus)
        } else {
            self.process_opcode(opcode, bus)
        };

        match update {
            PCUpdate::Next => self.pc += 2,
            PCUpdate::SkipNext => self.pc += 4,
            PCUpdate::Jump(addr) => self.pc = addr,
            PCUpdate::Hold => {}
        }
        Ok(())
    }

    /// Fx0A: park until a key is pressed, then store it in Vx.
    fn wait_for_key(&mut self, x: usize, bus: &mut Bus) -> PCUpdate {
        match self.state {
            ExecState::Running => {
                log::debug!("Waiting for key press into V{x:X}");
                bus.input.begin_wait();
                self.state = ExecState::WaitingForKeypress;
                PCUpdate::Hold
            }
            ExecState::WaitingForKeypress => match bus.input.take_press() {
                Some(key_code) => {
                    log::debug!("Key {key_code:#X} pressed, stored in V{x:X}");
                    self.v[x] = key_code;
                    self.state = ExecState::Running;
                    PCUpdate::Next
                }
                None => PCUpdate::Hold,
            },
        }
    }

    fn process_opcode(&mut self, opcode: u16, bus: &mut Bus) -> PCUpdate {
        // define some commonly used variables
        let x = usize::from((opcode & 0x0F00) >> 8);
        let y = usize::from((opcode & 0x00F0) >> 4);
        let n = opcode & 0x000F;
        let nn = (opcode & 0x00FF) as u8;
        let nnn = usize::from(opcode & 0x0FFF);

        match (opcode & 0xF000) >> 12 {
            // 0___
            0x0 => match opcode {
                // 00E0
                0x00E0 => {
                    bus.graphics.clear();
                    PCUpdate::Next
                }

                // 00EE
                0x00EE => {
                    if self.sp == 0 {
                        log::error!(
                            "Stack underflow: return with empty stack at {:#06X}",
                            self.pc
                        );
                        return PCUpdate::Next;
                    }
                    self.sp -= 1;
                    // back on the call, then past it
                    self.pc = self.stack[self.sp];
                    PCUpdate::Next
                }

                // invalid
                _ => {
                    log::error!("Invalid 0x0___ instruction: {opcode:04X}");
                    PCUpdate::Next
                }
            },

            // 1nnn
            0x1 => PCUpdate::Jump(nnn),

            // 2nnn
            0x2 => {
                if self.sp == STACK_SIZE {
                    log::error!(
                        "Stack overflow: call to {nnn:#06X} at {:#06X} exceeds {STACK_SIZE} levels",
                        self.pc
                    );
                    return PCUpdate::Next;
                }
                self.stack[self.sp] = self.pc;
                self.sp += 1;
                PCUpdate::Jump(nnn)
            }

            // 3xnn
            0x3 => skip_if(self.v[x] == nn),

            // 4xnn
            0x4 => skip_if(self.v[x] != nn),

            // 5xy0
            0x5 if n == 0 => skip_if(self.v[x] == self.v[y]),

            // 6xnn
            0x6 => {
                self.v[x] = nn;
                PCUpdate::Next
            }

            // 7xnn
            0x7 => {
                self.v[x] = self.v[x].wrapping_add(nn);
                PCUpdate::Next
            }

            // 8___
            0x8 => match n {
                // 8xy0
                0x0 => {
                    self.v[x] = self.v[y];
                    PCUpdate::Next
                }

                // 8xy1
                0x1 => {
                    self.v[x] |= self.v[y];
                    self.v[0xF] = 0;
                    PCUpdate::Next
                }

                // 8xy2
                0x2 => {
                    self.v[x] &= self.v[y];
                    self.v[0xF] = 0;
                    PCUpdate::Next
                }

                // 8xy3
                0x3 => {
                    self.v[x] ^= self.v[y];
                    self.v[0xF] = 0;
                    PCUpdate::Next
                }

                // 8xy4
                0x4 => {
                    let (result, overflow) = self.v[x].overflowing_add(self.v[y]);
                    self.v[x] = result;
                    self.v[0xF] = u8::from(overflow);
                    PCUpdate::Next
                }

                // 8xy5
                0x5 => {
                    let (result, overflow) = self.v[x].overflowing_sub(self.v[y]);
                    self.v[x] = result;
                    self.v[0xF] = u8::from(!overflow);
                    PCUpdate::Next
                }

                // 8xy6
                0x6 => {
                    let source = self.shift_source(x, y);
                    self.v[x] = source >> 1;
                    self.v[0xF] = source & 1;
                    PCUpdate::Next
                }

                // 8xy7
                0x7 => {
                    let (result, overflow) = self.v[y].overflowing_sub(self.v[x]);
                    self.v[x] = result;
                    self.v[0xF] = u8::from(!overflow);
                    PCUpdate::Next
                }

                // 8xyE
                0xE => {
                    let source = self.shift_source(x, y);
                    self.v[x] = source << 1;
                    self.v[0xF] = (source & 0x80) >> 7;
                    PCUpdate::Next
                }

                // invalid
                _ => {
                    log::error!("Invalid 8XY_ instruction: {opcode:04X}");
                    PCUpdate::Next
                }
            },

            // 9xy0
            0x9 if n == 0 => skip_if(self.v[x] != self.v[y]),

            // Annn
            0xA => {
                self.i = opcode & 0x0FFF;
                PCUpdate::Next
            }

            // Bnnn
            0xB => PCUpdate::Jump(nnn + usize::from(self.v[0])),

            // Cxnn
            0xC => {
                self.v[x] = random_byte() & nn;
                PCUpdate::Next
            }

            // Dxyn
            0xD => {
                let origin_x = usize::from(self.v[x]) % WIDTH;
                let origin_y = usize::from(self.v[y]) % HEIGHT;
                let index = usize::from(self.i);
                let memory = &bus.memory;
                let collision = bus.graphics.draw_sprite(
                    origin_x,
                    origin_y,
                    (0..usize::from(n)).map(|row| memory[index + row]),
                );
                self.v[0xF] = collision.into();
                PCUpdate::Next
            }

            // E___
            0xE => match nn {
                // Ex9E
                0x9E => skip_if(bus.input.is_key_pressed(self.v[x])),

                // ExA1
                0xA1 => skip_if(!bus.input.is_key_pressed(self.v[x])),

                // invalid
                _ => {
                    log::error!("Invalid EX__ instruction: {opcode:04X}");
                    PCUpdate::Next
                }
            },

            // F___
            0xF => match nn {
                // Fx07
                0x07 => {
                    self.v[x] = bus.clock.delay_timer;
                    PCUpdate::Next
                }

                // Fx15
                0x15 => {
                    bus.clock.delay_timer = self.v[x];
                    PCUpdate::Next
                }

                // Fx18
                0x18 => {
                    bus.clock.sound_timer = self.v[x];
                    PCUpdate::Next
                }

                // Fx1E
                0x1E => {
                    self.i = self.i.wrapping_add(u16::from(self.v[x]));
                    PCUpdate::Next
                }

                // Fx29
                0x29 => {
                    // font data starts at address 0
                    self.i = u16::from(self.v[x] & 0xF) * FONT_GLYPH_SIZE as u16;
                    PCUpdate::Next
                }

                // Fx33
                0x33 => {
                    let index = usize::from(self.i);
                    bus.memory[index] = self.v[x] / 100;
                    bus.memory[index + 1] = (self.v[x] / 10) % 10;
                    bus.memory[index + 2] = self.v[x] % 10;
                    PCUpdate::Next
                }

                // Fx55
                0x55 => {
                    let index = usize::from(self.i);
                    for r in 0..=x {
                        bus.memory[index + r] = self.v[r];
                    }
                    self.advance_index_after_transfer(x);
                    PCUpdate::Next
                }

                // Fx65
                0x65 => {
                    let index = usize::from(self.i);
                    for r in 0..=x {
                        self.v[r] = bus.memory[index + r];
                    }
                    self.advance_index_after_transfer(x);
                    PCUpdate::Next
                }

                // invalid
                _ => {
                    log::error!("Invalid FX__ instruction: {opcode:04X}");
                    PCUpdate::Next
                }
            },

            // invalid
            _ => {
                log::error!("Unknown opcode: {opcode:04X}");
                PCUpdate::Next
            }
        }
    }

    /// The register a shift instruction reads from.
    fn shift_source(&self, x: usize, y: usize) -> u8 {
        if self.quirks.shift_uses_vy {
            self.v[y]
        } else {
            self.v[x]
        }
    }

    fn advance_index_after_transfer(&mut self, x: usize) {
        if self.quirks.load_store_increments_index {
            self.i = self.i.wrapping_add(x as u16 + 1);
        }
    }
}

fn skip_if(condition: bool) -> PCUpdate {
    if condition {
        PCUpdate::SkipNext
    } else {
        PCUpdate::Next
    }
}

/// A random byte from the OS. Falls back to `0` if no entropy is available.
fn random_byte() -> u8 {
    let mut buf = [0u8; 1];
    if let Err(e) = getrandom::getrandom(&mut buf) {
        log::warn!("Failed to get a random byte: {e}");
    }
    buf[0]
}
