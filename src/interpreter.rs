//! # interpreter
//!
//! Fetch/decode/execute over a 4K memory image, sixteen 8-bit registers
//! (VF doubles as the carry/borrow/collision flag), a 16-bit I pointer and a
//! bounded call stack.
//!
//! The interpreter never touches the screen or the keyboard itself. Each
//! cycle it takes at most one key from its `Port`, and may hand the port
//! one of: a clear, a sprite (then waits for the collision bit), or a quit.
//!
//! Fixed contracts where historical interpreters disagree:
//!  * 8xy5 / 8xy7 set VF to 1 when no borrow happens, i.e. NOT borrow
//!  * 8xy6 / 8xyE shift Vx in place, VF gets the bit shifted out
//!  * Fx55 / Fx65 leave I pointing just past the last register copied
use crate::error::{DecodeError, Fault};
use crate::memory::{MemoryImage, MemoryMap, FONT_ADDR, GLYPH_BYTES, PROGRAM_ADDR, RAM_SIZE_BYTES};
use log::{trace, warn};
use std::collections::VecDeque;
use std::fmt;

use crate::display::Framebuffer;

/// how many nested calls we allow
pub const STACK_DEPTH: usize = 16;

/// the flag register
const VF: usize = 0xf;

/// a sprite the interpreter wants drawn; row bytes are already copied out of
/// memory so the port never sees interpreter state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sprite {
    pub x: u8,
    pub y: u8,
    pub rows: Vec<u8>,
}

/// Port is how the interpreter reaches the outside world. It should abstract
/// the implementation details so the interpreter doesn't need to know how the
/// display or keyboard work.
pub trait Port {
    /// the key captured for this cycle, if any
    fn poll_key(&mut self) -> Option<u8>;

    /// ask for the screen to be cleared
    fn clear(&mut self) -> Result<(), Fault>;

    /// ask for a sprite to be drawn and wait to hear whether it collided
    fn draw_sprite(&mut self, sprite: Sprite) -> Result<bool, Fault>;

    /// the program asked to stop
    fn quit(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    /// Fx0A with no key yet; the register is where the key will go
    AwaitingKey(u8),
}

/// what happened during one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Executed,
    AwaitingKey,
    Halted,
    Quit,
    Illegal(DecodeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Cls,
    Ret,
    Sys(u16),
    Jump(u16),
    Call(u16),
    SkipEqByte(u8, u8),
    SkipNeByte(u8, u8),
    SkipEqReg(u8, u8),
    SkipNeReg(u8, u8),
    LoadByte(u8, u8),
    AddByte(u8, u8),
    LoadReg(u8, u8),
    Or(u8, u8),
    And(u8, u8),
    Xor(u8, u8),
    AddReg(u8, u8),
    SubReg(u8, u8),
    ShiftRight(u8),
    SubNeg(u8, u8),
    ShiftLeft(u8),
    LoadI(u16),
    JumpV0(u16),
    Rand(u8, u8),
    Draw(u8, u8, u8),
    SkipKey(u8),
    SkipNotKey(u8),
    Stop,
    LoadDelay(u8),
    WaitKey(u8),
    SetDelay(u8),
    SetSound(u8),
    AddI(u8),
    LoadFont(u8),
    Bcd(u8),
    StoreRegs(u8),
    LoadRegs(u8),
}

impl Instruction {
    /// pure decode; Err is the opcode we didn't recognise
    pub fn decode(opcode: u16) -> Result<Instruction, u16> {
        let x = ((opcode >> 8) & 0xf) as u8;
        let y = ((opcode >> 4) & 0xf) as u8;
        let n = (opcode & 0xf) as u8;
        let kk = (opcode & 0xff) as u8;
        let nnn = opcode & 0x0fff;

        use Instruction::*;
        let ins = match opcode >> 12 {
            0x0 => match nnn {
                0x0e0 => Cls,
                0x0ee => Ret,
                _ => Sys(nnn),
            },
            0x1 => Jump(nnn),
            0x2 => Call(nnn),
            0x3 => SkipEqByte(x, kk),
            0x4 => SkipNeByte(x, kk),
            0x5 if n == 0 => SkipEqReg(x, y),
            0x6 => LoadByte(x, kk),
            0x7 => AddByte(x, kk),
            0x8 => match n {
                0x0 => LoadReg(x, y),
                0x1 => Or(x, y),
                0x2 => And(x, y),
                0x3 => Xor(x, y),
                0x4 => AddReg(x, y),
                0x5 => SubReg(x, y),
                0x6 => ShiftRight(x),
                0x7 => SubNeg(x, y),
                0xe => ShiftLeft(x),
                _ => return Err(opcode),
            },
            0x9 if n == 0 => SkipNeReg(x, y),
            0xa => LoadI(nnn),
            0xb => JumpV0(nnn),
            0xc => Rand(x, kk),
            0xd => Draw(x, y, n),
            0xe => match kk {
                0x9e => SkipKey(x),
                0xa1 => SkipNotKey(x),
                _ => return Err(opcode),
            },
            0xf => match kk {
                0x00 => Stop,
                0x07 => LoadDelay(x),
                0x0a => WaitKey(x),
                0x15 => SetDelay(x),
                0x18 => SetSound(x),
                0x1e => AddI(x),
                0x29 => LoadFont(x),
                0x33 => Bcd(x),
                0x55 => StoreRegs(x),
                0x65 => LoadRegs(x),
                _ => return Err(opcode),
            },
            _ => return Err(opcode),
        };
        Ok(ins)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        match *self {
            Cls => write!(f, "CLS"),
            Ret => write!(f, "RET"),
            Sys(a) => write!(f, "SYS 0x{:03x}", a),
            Jump(a) => write!(f, "JP 0x{:03x}", a),
            Call(a) => write!(f, "CALL 0x{:03x}", a),
            SkipEqByte(x, kk) => write!(f, "SE V{:X}, 0x{:02x}", x, kk),
            SkipNeByte(x, kk) => write!(f, "SNE V{:X}, 0x{:02x}", x, kk),
            SkipEqReg(x, y) => write!(f, "SE V{:X}, V{:X}", x, y),
            SkipNeReg(x, y) => write!(f, "SNE V{:X}, V{:X}", x, y),
            LoadByte(x, kk) => write!(f, "LD V{:X}, 0x{:02x}", x, kk),
            AddByte(x, kk) => write!(f, "ADD V{:X}, 0x{:02x}", x, kk),
            LoadReg(x, y) => write!(f, "LD V{:X}, V{:X}", x, y),
            Or(x, y) => write!(f, "OR V{:X}, V{:X}", x, y),
            And(x, y) => write!(f, "AND V{:X}, V{:X}", x, y),
            Xor(x, y) => write!(f, "XOR V{:X}, V{:X}", x, y),
            AddReg(x, y) => write!(f, "ADD V{:X}, V{:X}", x, y),
            SubReg(x, y) => write!(f, "SUB V{:X}, V{:X}", x, y),
            ShiftRight(x) => write!(f, "SHR V{:X}", x),
            SubNeg(x, y) => write!(f, "SUBN V{:X}, V{:X}", x, y),
            ShiftLeft(x) => write!(f, "SHL V{:X}", x),
            LoadI(a) => write!(f, "LD I, 0x{:03x}", a),
            JumpV0(a) => write!(f, "JP V0, 0x{:03x}", a),
            Rand(x, kk) => write!(f, "RND V{:X}, 0x{:02x}", x, kk),
            Draw(x, y, n) => write!(f, "DRW V{:X}, V{:X}, {}", x, y, n),
            SkipKey(x) => write!(f, "SKP V{:X}", x),
            SkipNotKey(x) => write!(f, "SKNP V{:X}", x),
            Stop => write!(f, "STOP"),
            LoadDelay(x) => write!(f, "LD V{:X}, DT", x),
            WaitKey(x) => write!(f, "LD V{:X}, K", x),
            SetDelay(x) => write!(f, "LD DT, V{:X}", x),
            SetSound(x) => write!(f, "LD ST, V{:X}", x),
            AddI(x) => write!(f, "ADD I, V{:X}", x),
            LoadFont(x) => write!(f, "LD F, V{:X}", x),
            Bcd(x) => write!(f, "LD B, V{:X}", x),
            StoreRegs(x) => write!(f, "LD [I], V{:X}", x),
            LoadRegs(x) => write!(f, "LD V{:X}, [I]", x),
        }
    }
}

pub struct Interpreter<'a> {
    memory: MemoryImage,
    port: &'a mut dyn Port,
    v: [u8; 16],
    program_counter: u16,
    i: u16,
    stack: Vec<u16>,
    delay_timer: u8,
    sound_timer: u8,
    state: RunState,
    pending_key: Option<u8>,
}

impl<'a> Interpreter<'a> {
    pub fn new(memory: MemoryImage, port: &'a mut dyn Port) -> Interpreter<'a> {
        Interpreter {
            memory,
            port,
            v: [0; 16],
            program_counter: PROGRAM_ADDR,
            i: 0,
            stack: Vec::with_capacity(STACK_DEPTH),
            delay_timer: 0,
            sound_timer: 0,
            state: RunState::Running,
            pending_key: None,
        }
    }

    pub fn program_counter(&self) -> u16 {
        self.program_counter
    }

    pub fn register(&self, x: u8) -> u8 {
        self.v[(x & 0xf) as usize]
    }

    pub fn registers(&self) -> &[u8; 16] {
        &self.v
    }

    pub fn address_register(&self) -> u16 {
        self.i
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn memory(&self) -> &MemoryImage {
        &self.memory
    }

    /// true once the program counter can't fetch a whole instruction
    pub fn is_halted(&self) -> bool {
        self.program_counter as usize + 2 > RAM_SIZE_BYTES
    }

    /// one fetch/decode/execute step plus timer decay
    pub fn cycle(&mut self) -> Result<Outcome, Fault> {
        self.pending_key = self.port.poll_key();
        let outcome = match self.state {
            RunState::AwaitingKey(x) => match self.pending_key {
                Some(key) => {
                    self.v[x as usize] = key;
                    self.state = RunState::Running;
                    Outcome::Executed
                }
                None => Outcome::AwaitingKey,
            },
            RunState::Running => self.step()?,
        };
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
        Ok(outcome)
    }

    fn step(&mut self) -> Result<Outcome, Fault> {
        if self.is_halted() {
            return Ok(Outcome::Halted);
        }
        let pc = self.program_counter;
        let opcode = self.memory.get_word(pc)?;
        self.program_counter += 2;
        match Instruction::decode(opcode) {
            Ok(ins) => {
                trace!("0x{:04x}  {:04x}  {}", pc, opcode, ins);
                self.execute(ins)
            }
            Err(opcode) => {
                let err = DecodeError { opcode, pc };
                warn!("{}", err);
                Ok(Outcome::Illegal(err))
            }
        }
    }

    fn skip_if(&mut self, cond: bool) {
        if cond {
            self.program_counter += 2;
        }
    }

    fn execute(&mut self, ins: Instruction) -> Result<Outcome, Fault> {
        use Instruction::*;
        match ins {
            Cls => self.port.clear()?,
            Ret => match self.stack.pop() {
                Some(addr) => self.program_counter = addr,
                None => {
                    return Err(Fault::StackUnderflow {
                        pc: self.program_counter - 2,
                    })
                }
            },
            Sys(_) => (),
            Jump(addr) => self.program_counter = addr,
            Call(addr) => {
                if self.stack.len() >= STACK_DEPTH {
                    return Err(Fault::StackOverflow {
                        pc: self.program_counter - 2,
                        depth: self.stack.len(),
                    });
                }
                self.stack.push(self.program_counter);
                self.program_counter = addr;
            }
            SkipEqByte(x, kk) => self.skip_if(self.v[x as usize] == kk),
            SkipNeByte(x, kk) => self.skip_if(self.v[x as usize] != kk),
            SkipEqReg(x, y) => self.skip_if(self.v[x as usize] == self.v[y as usize]),
            SkipNeReg(x, y) => self.skip_if(self.v[x as usize] != self.v[y as usize]),
            LoadByte(x, kk) => self.v[x as usize] = kk,
            AddByte(x, kk) => self.v[x as usize] = self.v[x as usize].wrapping_add(kk),
            LoadReg(x, y) => self.v[x as usize] = self.v[y as usize],
            Or(x, y) => self.v[x as usize] |= self.v[y as usize],
            And(x, y) => self.v[x as usize] &= self.v[y as usize],
            Xor(x, y) => self.v[x as usize] ^= self.v[y as usize],
            AddReg(x, y) => {
                let sum = self.v[x as usize] as u16 + self.v[y as usize] as u16;
                self.v[x as usize] = (sum & 0xff) as u8;
                self.v[VF] = (sum > 0xff) as u8;
            }
            SubReg(x, y) => {
                let (vx, vy) = (self.v[x as usize], self.v[y as usize]);
                self.v[x as usize] = vx.wrapping_sub(vy);
                self.v[VF] = (vx >= vy) as u8;
            }
            ShiftRight(x) => {
                let vx = self.v[x as usize];
                self.v[x as usize] = vx >> 1;
                self.v[VF] = vx & 1;
            }
            SubNeg(x, y) => {
                let (vx, vy) = (self.v[x as usize], self.v[y as usize]);
                self.v[x as usize] = vy.wrapping_sub(vx);
                self.v[VF] = (vy >= vx) as u8;
            }
            ShiftLeft(x) => {
                let vx = self.v[x as usize];
                self.v[x as usize] = vx << 1;
                self.v[VF] = vx >> 7;
            }
            LoadI(addr) => self.i = addr,
            JumpV0(addr) => self.program_counter = addr + self.v[0] as u16,
            Rand(x, kk) => self.v[x as usize] = rand::random::<u8>() & kk,
            Draw(x, y, n) => {
                let rows = self.memory.get_ro_slice(self.i, n as usize)?.to_vec();
                let sprite = Sprite {
                    x: self.v[x as usize],
                    y: self.v[y as usize],
                    rows,
                };
                let collision = self.port.draw_sprite(sprite)?;
                self.v[VF] = collision as u8;
            }
            SkipKey(x) => self.skip_if(self.pending_key == Some(self.v[x as usize])),
            SkipNotKey(x) => self.skip_if(self.pending_key != Some(self.v[x as usize])),
            Stop => {
                self.port.quit();
                return Ok(Outcome::Quit);
            }
            LoadDelay(x) => self.v[x as usize] = self.delay_timer,
            WaitKey(x) => match self.pending_key {
                Some(key) => self.v[x as usize] = key,
                None => {
                    self.state = RunState::AwaitingKey(x);
                    return Ok(Outcome::AwaitingKey);
                }
            },
            SetDelay(x) => self.delay_timer = self.v[x as usize],
            SetSound(x) => self.sound_timer = self.v[x as usize],
            AddI(x) => self.i = self.i.wrapping_add(self.v[x as usize] as u16),
            LoadFont(x) => self.i = FONT_ADDR + (self.v[x as usize] & 0xf) as u16 * GLYPH_BYTES,
            Bcd(x) => {
                let vx = self.v[x as usize];
                self.memory
                    .write(&[vx / 100, (vx / 10) % 10, vx % 10], self.i)?;
            }
            StoreRegs(x) => {
                let count = x as usize + 1;
                self.memory.write(&self.v[..count], self.i)?;
                self.i += count as u16;
            }
            LoadRegs(x) => {
                let count = x as usize + 1;
                let src = self.memory.get_ro_slice(self.i, count)?;
                self.v[..count].copy_from_slice(src);
                self.i += count as u16;
            }
        }
        Ok(Outcome::Executed)
    }
}

/// useful for testing the interpreter without a coordination layer; draws
/// straight onto its own framebuffer and hands out one scripted key per cycle
#[derive(Default)]
pub struct DummyPort {
    pub framebuffer: Framebuffer,
    pub keys: VecDeque<Option<u8>>,
    pub sprites: Vec<Sprite>,
    pub clears: usize,
    pub quit: bool,
}

impl DummyPort {
    pub fn new() -> Self {
        DummyPort::default()
    }
}

impl Port for DummyPort {
    fn poll_key(&mut self) -> Option<u8> {
        self.keys.pop_front().flatten()
    }

    fn clear(&mut self) -> Result<(), Fault> {
        self.clears += 1;
        self.framebuffer.clear();
        Ok(())
    }

    fn draw_sprite(&mut self, sprite: Sprite) -> Result<bool, Fault> {
        let collision =
            self.framebuffer
                .draw_sprite_at(&sprite.rows, sprite.x as usize, sprite.y as usize);
        self.sprites.push(sprite);
        Ok(collision)
    }

    fn quit(&mut self) {
        self.quit = true;
    }
}
