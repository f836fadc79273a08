use std::{path::Path, time::Duration};

use anyhow::Context;
use chip8::{Chip8, Controller, Observer};

use crate::sink::FrameSink;

/// How long to back off when no instruction was due yet.
const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// The main application state.
///
/// Drives the [`Chip8`] and publishes its frames to a [`FrameSink`] every
/// time instructions were executed.
pub struct App {
    pub chip8: Chip8,
    sink: Box<dyn FrameSink>,
    /// Stop once this many instructions ran, `0` runs forever.
    max_steps: u64,
    executed: u64,
}

impl App {
    /// Create a new `App` instance.
    pub fn new(chip8: Chip8, sink: Box<dyn FrameSink>, max_steps: u64) -> Self {
        Self {
            chip8,
            sink,
            max_steps,
            executed: 0,
        }
    }

    /// Read ROM data from the given `path`.
    pub fn read_rom(path: impl AsRef<Path>) -> anyhow::Result<Vec<u8>> {
        let path = path.as_ref();
        std::fs::read(path).with_context(|| format!("Failed to read ROM from {}", path.display()))
    }

    /// Save `Chip8` state to a file specified by `path`.
    pub fn save_chip8(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let bytes = bincode::serialize(&self.chip8)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Load `Chip8` state from the given `path`.
    pub fn load_chip8(path: impl AsRef<Path>) -> anyhow::Result<Chip8> {
        let bytes = std::fs::read(path)?;
        let chip8 = bincode::deserialize(&bytes)
            .context("Failed to deserialize Chip8 instance from file.")?;
        Ok(chip8)
    }

    /// Number of instructions executed so far.
    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// Run until the step limit is reached, or the `Chip8` halts.
    pub fn run(&mut self) -> anyhow::Result<()> {
        log::info!(
            "Running at {} steps per second",
            self.chip8.bus.clock.steps_per_second()
        );
        while !self.done() {
            if self.update()? == 0 {
                std::thread::sleep(IDLE_SLEEP);
            }
        }
        log::info!("Stopped after {} steps", self.executed);
        Ok(())
    }

    /// Advance the `Chip8` and publish its frames if anything ran.
    fn update(&mut self) -> anyhow::Result<usize> {
        let steps = self.chip8.update()?;
        if steps > 0 {
            self.executed += steps as u64;
            self.sink.publish(self.chip8.display_frame())?;
            let debug = self.chip8.debug_frame();
            self.sink.publish(&debug)?;
        }
        Ok(steps)
    }

    fn done(&self) -> bool {
        self.max_steps != 0 && self.executed >= self.max_steps
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc, time::Duration};

    use chip8::{
        graphics::DISPLAY_FRAME_MARKER, memory::DEBUG_FRAME_MARKER, Chip8Error, Config,
        ManualTime,
    };

    use super::*;

    /// Records the framing byte of every published frame.
    struct RecordingSink(Rc<RefCell<Vec<u8>>>);

    impl FrameSink for RecordingSink {
        fn publish(&mut self, frame: &[u8]) -> anyhow::Result<()> {
            self.0.borrow_mut().push(frame[0]);
            Ok(())
        }
    }

    fn app(rom: &[u8], max_steps: u64) -> (App, ManualTime, Rc<RefCell<Vec<u8>>>) {
        let time = ManualTime::new();
        let mut chip8 = Chip8::with_time_source(
            Config {
                steps_per_second: 100,
                ..Default::default()
            },
            Box::new(time.clone()),
        );
        chip8.load(rom).unwrap();
        let markers = Rc::new(RefCell::new(Vec::new()));
        let sink = RecordingSink(markers.clone());
        (App::new(chip8, Box::new(sink), max_steps), time, markers)
    }

    #[test]
    fn test_run_publishes_both_frames() {
        let (mut app, time, markers) = app(&[0x12, 0x00], 10);
        time.advance(Duration::from_secs(1));
        app.run().unwrap();
        assert_eq!(app.executed(), 100);
        assert_eq!(
            *markers.borrow(),
            vec![DISPLAY_FRAME_MARKER, DEBUG_FRAME_MARKER]
        );
    }

    #[test]
    fn test_run_stops_on_fatal_error() {
        let (mut app, time, markers) = app(&[0x11, 0x00], 0);
        time.advance(Duration::from_secs(1));
        let err = app.run().unwrap_err();
        let chip8_err = err.downcast_ref::<Chip8Error>().unwrap();
        assert!(chip8_err.is_fatal());
        assert!(markers.borrow().is_empty());
    }

    #[test]
    fn test_state_save_and_load() {
        let (mut app, time, _) = app(&[0x6A, 0x2A, 0x12, 0x02], 1);
        time.advance(Duration::from_millis(10));
        app.run().unwrap();

        let path = std::env::temp_dir().join(format!("chip8-state-{}.bin", std::process::id()));
        app.save_chip8(&path).unwrap();
        let restored = App::load_chip8(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(restored.processor.v[0xA], 0x2A);
        assert_eq!(restored.processor.pc, 0x202);
        assert_eq!(restored.bus.memory.read_opcode(0x200), 0x6A2A);
    }
}
