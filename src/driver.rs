use crate::coordinator::CancelToken;
use crate::error::Fault;
use crate::interpreter::{Interpreter, Outcome};
use log::{error, info};
use std::time::{Duration, Instant};

/// ~700 cycles a second, which most ROMs expect
pub const DEFAULT_TICK: Duration = Duration::from_micros(1428);

/// why the run ended without a fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// program counter walked off the end of memory
    Halted,
    /// the program, the keyboard or the coordination layer asked to stop
    Quit,
    /// hit the configured cycle limit
    CycleLimit,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub cycles: u64,
    pub decode_errors: u64,
    pub key_waits: u64,
}

/// runs the interpreter one cycle per tick until something stops it
pub struct Driver {
    tick: Duration,
    cancel: CancelToken,
    cycle_limit: Option<u64>,
    profile: bool,
    stats: RunStats,
    started: Option<Instant>,
}

impl Driver {
    pub fn new(tick: Duration, cancel: CancelToken) -> Self {
        Driver {
            tick,
            cancel,
            cycle_limit: None,
            profile: false,
            stats: RunStats::default(),
            started: None,
        }
    }

    pub fn cycle_limit(mut self, limit: Option<u64>) -> Self {
        self.cycle_limit = limit;
        self
    }

    pub fn profile(mut self, on: bool) -> Self {
        self.profile = on;
        self
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn run(&mut self, interpreter: &mut Interpreter) -> Result<Exit, Fault> {
        if self.profile {
            info!("======== started profiling ========");
        }
        self.started = Some(Instant::now());
        loop {
            if self.cancel.is_cancelled() {
                info!("quit observed after {} cycles", self.stats.cycles);
                return Ok(Exit::Quit);
            }
            if interpreter.is_halted() {
                info!(
                    "program counter left memory at 0x{:04x}",
                    interpreter.program_counter()
                );
                return Ok(Exit::Halted);
            }
            if self.cycle_limit.map_or(false, |n| self.stats.cycles >= n) {
                info!("cycle limit reached");
                return Ok(Exit::CycleLimit);
            }

            let outcome = match interpreter.cycle() {
                Ok(outcome) => outcome,
                // the coordination layer went away because we're quitting
                Err(Fault::Disconnected) if self.cancel.is_cancelled() => return Ok(Exit::Quit),
                Err(e) => {
                    error!("{}", e);
                    return Err(e);
                }
            };
            self.stats.cycles += 1;
            match outcome {
                Outcome::Executed => (),
                Outcome::AwaitingKey => self.stats.key_waits += 1,
                Outcome::Illegal(_) => self.stats.decode_errors += 1,
                Outcome::Halted => return Ok(Exit::Halted),
                Outcome::Quit => {
                    info!("program stopped itself");
                    return Ok(Exit::Quit);
                }
            }

            if !self.tick.is_zero() {
                spin_sleep::sleep(self.tick);
            }
        }
    }

    /// log what the run amounted to, if profiling was asked for
    pub fn stop_profiling(&self) {
        if !self.profile {
            return;
        }
        let elapsed = self.started.map(|t| t.elapsed()).unwrap_or_default();
        let hz = match elapsed.as_secs_f64() {
            secs if secs > 0.0 => self.stats.cycles as f64 / secs,
            _ => 0.0,
        };
        info!(
            "{} cycles in {:.3}s ({:.0} Hz), {} decode errors, {} cycles waiting on a key",
            self.stats.cycles,
            elapsed.as_secs_f64(),
            hz,
            self.stats.decode_errors,
            self.stats.key_waits
        );
        info!("========= stopped profiling =========");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::DummyPort;
    use crate::memory::MemoryImage;

    fn rom(prog: &[u8]) -> MemoryImage {
        let mut m = MemoryImage::new();
        let mut p = prog;
        m.load_program(&mut p).unwrap();
        m
    }

    #[test]
    fn test_spin_forever_until_limit() {
        let mut port = DummyPort::new();
        let mut i = Interpreter::new(
            rom(&[0x60, 0x05, 0x61, 0x03, 0x80, 0x14, 0x12, 0x06]),
            &mut port,
        );
        let mut d = Driver::new(Duration::ZERO, CancelToken::new()).cycle_limit(Some(100));
        assert_eq!(d.run(&mut i).unwrap(), Exit::CycleLimit);
        assert_eq!(d.stats().cycles, 100);
        assert_eq!(i.register(0), 8);
        assert_eq!(i.program_counter(), 0x206);
    }

    #[test]
    fn test_halts_when_pc_leaves_memory() {
        let mut port = DummyPort::new();
        let mut i = Interpreter::new(rom(&[0x1f, 0xfe]), &mut port);
        let mut d = Driver::new(Duration::ZERO, CancelToken::new());
        assert_eq!(d.run(&mut i).unwrap(), Exit::Halted);
        assert_eq!(d.stats().cycles, 2);
    }

    #[test]
    fn test_cancel_stops_before_next_cycle() {
        let mut port = DummyPort::new();
        let mut i = Interpreter::new(rom(&[0x12, 0x00]), &mut port);
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut d = Driver::new(Duration::ZERO, cancel);
        assert_eq!(d.run(&mut i).unwrap(), Exit::Quit);
        assert_eq!(d.stats().cycles, 0);
    }

    #[test]
    fn test_stop_opcode_quits() {
        let mut port = DummyPort::new();
        {
            let mut i = Interpreter::new(rom(&[0x60, 0x01, 0xf0, 0x00, 0x00, 0xe0]), &mut port);
            let mut d = Driver::new(Duration::ZERO, CancelToken::new());
            assert_eq!(d.run(&mut i).unwrap(), Exit::Quit);
            assert_eq!(d.stats().cycles, 2);
        }
        assert!(port.quit);
        assert_eq!(port.clears, 0);
    }

    #[test]
    fn test_decode_errors_are_counted_not_fatal() {
        let mut port = DummyPort::new();
        let mut i = Interpreter::new(
            rom(&[0x80, 0x0f, 0xe0, 0x00, 0x60, 0x01, 0x12, 0x06]),
            &mut port,
        );
        let mut d = Driver::new(Duration::ZERO, CancelToken::new()).cycle_limit(Some(10));
        assert_eq!(d.run(&mut i).unwrap(), Exit::CycleLimit);
        assert_eq!(d.stats().decode_errors, 2);
        assert_eq!(i.register(0), 1);
    }

    #[test]
    fn test_faults_propagate() {
        let mut port = DummyPort::new();
        let mut i = Interpreter::new(rom(&[0x00, 0xee]), &mut port);
        let mut d = Driver::new(Duration::ZERO, CancelToken::new());
        assert!(matches!(d.run(&mut i), Err(Fault::StackUnderflow { .. })));
    }

    #[test]
    fn test_key_waits_counted() {
        let mut port = DummyPort::new();
        let mut i = Interpreter::new(rom(&[0xf0, 0x0a]), &mut port);
        let mut d = Driver::new(Duration::ZERO, CancelToken::new())
            .cycle_limit(Some(5))
            .profile(true);
        assert_eq!(d.run(&mut i).unwrap(), Exit::CycleLimit);
        assert_eq!(d.stats().key_waits, 5);
        d.stop_profiling();
    }
}
