use crate::input::KeymapKind;
use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "mu8", about = "Run a CHIP-8 ROM in the terminal.")]
pub struct Config {
    /// ROM image to run
    #[arg(value_name = "ROM")]
    pub rom: PathBuf,

    /// log cycle counts and effective speed when the run ends
    #[arg(long)]
    pub profile: bool,

    /// target time between cycles, in microseconds
    #[arg(long, value_name = "MICROS", default_value_t = 1428)]
    pub tick_us: u64,

    /// stop after this many cycles
    #[arg(long, value_name = "N")]
    pub max_cycles: Option<u64>,

    /// how keyboard keys map onto the hex keypad
    #[arg(long, value_enum, default_value_t = KeymapKind::Conventional)]
    pub keymap: KeymapKind,

    /// where log output goes; the terminal itself is busy showing the screen
    #[arg(long, value_name = "PATH", default_value = "mu8.log")]
    pub log_file: PathBuf,

    /// log every instruction executed
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    pub fn tick(&self) -> Duration {
        Duration::from_micros(self.tick_us)
    }

    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Trace
        } else {
            LevelFilter::Info
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DEFAULT_TICK;

    #[test]
    fn test_defaults() {
        let c = Config::try_parse_from(["mu8", "roms/pong.ch8"]).unwrap();
        assert_eq!(c.rom, PathBuf::from("roms/pong.ch8"));
        assert!(!c.profile);
        assert_eq!(c.tick(), DEFAULT_TICK);
        assert_eq!(c.max_cycles, None);
        assert_eq!(c.keymap, KeymapKind::Conventional);
        assert_eq!(c.log_file, PathBuf::from("mu8.log"));
        assert_eq!(c.log_level(), LevelFilter::Info);
    }

    #[test]
    fn test_flags() {
        let c = Config::try_parse_from([
            "mu8",
            "--profile",
            "--tick-us",
            "44",
            "--keymap",
            "literal",
            "--max-cycles",
            "18000",
            "-v",
            "hi_lo.ch8",
        ])
        .unwrap();
        assert!(c.profile);
        assert_eq!(c.tick(), Duration::from_micros(44));
        assert_eq!(c.keymap, KeymapKind::Literal);
        assert_eq!(c.max_cycles, Some(18_000));
        assert_eq!(c.log_level(), LevelFilter::Trace);
    }

    #[test]
    fn test_rom_is_required() {
        let err = Config::try_parse_from(["mu8"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
