use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use mu8::config::Config;
use mu8::coordinator::Coordinator;
use mu8::display::{TermSurface, SCREEN_HEIGHT, SCREEN_WIDTH};
use mu8::driver::Driver;
use mu8::input::{CrosstermEvents, Keymap};
use mu8::interpreter::Interpreter;
use mu8::logging;
use mu8::memory::MemoryImage;

fn main() -> Result<()> {
    let config = Config::parse();
    logging::init(&config.log_file, config.log_level())
        .with_context(|| format!("opening log file {}", config.log_file.display()))?;

    // everything that can fail at startup happens before the terminal is taken
    let mut memory = MemoryImage::new();
    memory
        .load_rom_file(&config.rom)
        .with_context(|| format!("loading ROM {}", config.rom.display()))?;

    let surface = TermSurface::new(SCREEN_WIDTH as u16, SCREEN_HEIGHT as u16)
        .context("setting up the terminal")?;
    let (coordinator, mut link) =
        Coordinator::spawn(surface, CrosstermEvents, Keymap::new(config.keymap))
            .context("starting render/input threads")?;
    info!("mu8! go!");

    let mut driver = Driver::new(config.tick(), coordinator.cancel_token())
        .cycle_limit(config.max_cycles)
        .profile(config.profile);
    let result = {
        let mut interpreter = Interpreter::new(memory, &mut link);
        driver.run(&mut interpreter)
    };

    // terminal is restored once this returns, so errors below are readable
    let shutdown = coordinator.shutdown();
    driver.stop_profiling();

    let exit = result.context("emulation stopped")?;
    shutdown.context("shutting down the terminal")?;
    info!("finished: {:?}", exit);
    Ok(())
}
