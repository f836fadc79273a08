use std::path::PathBuf;

use anyhow::bail;
use chip8::{clock::DEFAULT_STEPS_PER_SECOND, Chip8, Chip8Error, Config, Controller, Quirks};
use clap::Parser;

use crate::{
    app::App,
    sink::{FrameSink, NullSink, WriterSink},
};

mod app;
mod sink;

/// Exit code used when the machine itself halted.
const EXIT_HALTED: i32 = 2;

#[derive(Parser)]
#[command(name = "chip8-run")]
#[command(about = "Run a CHIP-8 program and publish its frames", long_about = None)]
struct Cli {
    /// ROM to run. Not needed with --load-state.
    rom: Option<PathBuf>,

    /// Instructions executed per second, at most 1000.
    #[arg(long, default_value_t = DEFAULT_STEPS_PER_SECOND)]
    rate: u32,

    /// Shift Vy into Vx in 8xy6/8xyE.
    #[arg(long)]
    shift_vy: bool,

    /// Advance I past the registers transferred by Fx55/Fx65.
    #[arg(long)]
    increment_index: bool,

    /// Stop after this many instructions, 0 runs until the machine halts.
    #[arg(long, default_value_t = 0)]
    max_steps: u64,

    /// Resume from a state saved with --save-state instead of loading a ROM.
    #[arg(long)]
    load_state: Option<PathBuf>,

    /// Save the machine state here when the run ends.
    #[arg(long)]
    save_state: Option<PathBuf>,

    /// Write frames to this file, or to stdout for "-". Frames are dropped
    /// when not given.
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    log_level: log::LevelFilter,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = setup_logger(cli.log_level) {
        eprintln!("Failed to set up logging: {e}");
    }

    if let Err(e) = run(cli) {
        log::error!("{e:#}");
        let halted = e
            .downcast_ref::<Chip8Error>()
            .map_or(false, Chip8Error::is_fatal);
        std::process::exit(if halted { EXIT_HALTED } else { 1 });
    }
}

fn setup_logger(level: log::LevelFilter) -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let chip8 = match (&cli.load_state, &cli.rom) {
        (Some(path), _) => {
            log::info!("Restoring state from {}", path.display());
            App::load_chip8(path)?
        }
        (None, Some(rom)) => {
            let mut chip8 = Chip8::with_config(Config {
                steps_per_second: cli.rate,
                quirks: Quirks {
                    shift_uses_vy: cli.shift_vy,
                    load_store_increments_index: cli.increment_index,
                },
            });
            chip8.load(&App::read_rom(rom)?)?;
            log::info!("Loaded {}", rom.display());
            chip8
        }
        (None, None) => bail!("either a ROM or --load-state is required"),
    };

    let sink: Box<dyn FrameSink> = match &cli.output {
        Some(path) if path.as_os_str() == "-" => Box::new(WriterSink::new(std::io::stdout())),
        Some(path) => Box::new(WriterSink::new(std::fs::File::create(path)?)),
        None => Box::new(NullSink::default()),
    };

    let mut app = App::new(chip8, sink, cli.max_steps);
    let result = app.run();

    if let Some(path) = &cli.save_state {
        match app.save_chip8(path) {
            Ok(()) => log::info!("Saved state to {}", path.display()),
            Err(e) => log::error!("Failed to save Chip8 state to {}: {e}.", path.display()),
        }
    }
    result
}
