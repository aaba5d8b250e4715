use std::io;
use thiserror::Error;

/// Fatal conditions. Anything surfacing as a `Fault` stops the run.
#[derive(Debug, Error)]
pub enum Fault {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("ROM is {len} bytes but only {capacity} fit above 0x200")]
    RomTooLarge { len: usize, capacity: usize },
    #[error("call stack overflow at 0x{pc:04x} (depth {depth})")]
    StackOverflow { pc: u16, depth: usize },
    #[error("return with empty call stack at 0x{pc:04x}")]
    StackUnderflow { pc: u16 },
    #[error("access of {len} byte(s) at 0x{addr:04x} runs past the end of memory")]
    AddressOutOfBounds { addr: u16, len: usize },
    #[error("terminal is {width}x{height}, need at least {need_width}x{need_height}")]
    SurfaceTooSmall {
        width: u16,
        height: u16,
        need_width: u16,
        need_height: u16,
    },
    #[error("coordination layer has shut down")]
    Disconnected,
    #[error("logger already set: {0}")]
    Logger(#[from] log::SetLoggerError),
}

/// An opcode the interpreter does not understand. Recoverable: the run
/// carries on with the next cycle.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("unknown opcode 0x{opcode:04x} at 0x{pc:04x}")]
pub struct DecodeError {
    pub opcode: u16,
    pub pc: u16,
}
