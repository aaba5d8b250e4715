//!
//! ## Design
//!
//! * CHIP-8 interpreter that runs in a terminal
//! * one fetch/decode/execute cycle per tick; timing is a target, not
//!   cycle-accurate
//! * abstract display so can plug alternatives; the real one is TUI in-console
//! * the interpreter never owns the screen or the keyboard
//! * no audio; the sound timer counts down and nothing listens
//!
//! Model
//!
//! main
//!  |-- config (clap), logging (to a file)
//!  |-- memory image, ROM loaded at 0x200
//!  |-- surface (terminal, restored on drop)
//!  |-- coordinator
//!  |    |-- render thread: framebuffer + surface, drains events
//!  |    `-- input thread: polls the terminal, forwards keys / resize / quit
//!  |-- interpreter(memory, link)
//!  `-- driver loop
//!       |-- if cancelled or pc is off the end of memory: stop
//!       |-- interpreter.cycle()
//!       |     |-- take at most one key from the link
//!       |     |-- fetch, decode, execute
//!       |     |     `-- maybe one of: clear / sprite + wait for collision / quit
//!       |     `-- delay and sound timers -1
//!       `-- sleep(tick)
//!
//! Shutdown: cancel the token, send quit, join both threads (the render thread
//! drops the surface, putting the terminal back), log the profile.
pub mod config;
pub mod coordinator;
pub mod display;
pub mod driver;
pub mod error;
pub mod input;
pub mod interpreter;
pub mod logging;
pub mod memory;

pub use error::{DecodeError, Fault};
