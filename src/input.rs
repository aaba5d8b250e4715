use crossterm::event::{poll, read, Event, KeyCode, KeyEvent, KeyModifiers};
use log::debug;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::time::Duration;

/// map of characters read from the keyboard to what the chip8 might expect
/// where '1' => 0x01 and 'a' => 0x0a
const LITERAL_KEYMAP: [(char, u8); 16] = [
    ('0', 0x00),
    ('1', 0x01),
    ('2', 0x02),
    ('3', 0x03),
    ('4', 0x04),
    ('5', 0x05),
    ('6', 0x06),
    ('7', 0x07),
    ('8', 0x08),
    ('9', 0x09),
    ('a', 0x0a),
    ('b', 0x0b),
    ('c', 0x0c),
    ('d', 0x0d),
    ('e', 0x0e),
    ('f', 0x0f),
];

/// ditto using left-hand side of qwerty keyboard
const CONVENTIONAL_KEYMAP: [(char, u8); 16] = [
    ('x', 0x00),
    ('1', 0x01),
    ('2', 0x02),
    ('3', 0x03),
    ('q', 0x04),
    ('w', 0x05),
    ('e', 0x06),
    ('a', 0x07),
    ('s', 0x08),
    ('d', 0x09),
    ('z', 0x0a),
    ('c', 0x0b),
    ('4', 0x0c),
    ('r', 0x0d),
    ('f', 0x0e),
    ('v', 0x0f),
];

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeymapKind {
    /// 1234 / qwer / asdf / zxcv
    #[default]
    Conventional,
    /// 0-9 and a-f as typed
    Literal,
}

/// what the input thread hands on after translating a terminal event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Key(u8),
    Resize,
    Redraw,
    Quit,
}

/// translates terminal key presses into hex keypad values
#[derive(Debug, Clone)]
pub struct Keymap {
    keys: HashMap<char, u8>,
}

impl Keymap {
    pub fn new(kind: KeymapKind) -> Self {
        let keys = match kind {
            KeymapKind::Conventional => HashMap::from(CONVENTIONAL_KEYMAP),
            KeymapKind::Literal => HashMap::from(LITERAL_KEYMAP),
        };
        Keymap { keys }
    }

    pub fn key(&self, c: char) -> Option<u8> {
        self.keys.get(&c.to_ascii_lowercase()).copied()
    }

    /// None for anything the emulator doesn't care about
    pub fn translate(&self, event: &Event) -> Option<InputEvent> {
        match event {
            Event::Key(KeyEvent { code, modifiers, .. }) => {
                let ctrl = modifiers.contains(KeyModifiers::CONTROL);
                match code {
                    KeyCode::Esc => Some(InputEvent::Quit),
                    KeyCode::Char('c') if ctrl => Some(InputEvent::Quit),
                    KeyCode::Char('l') if ctrl => Some(InputEvent::Redraw),
                    // other chords are not keypad presses
                    KeyCode::Char(_) if ctrl => None,
                    KeyCode::Char(c) => match self.key(*c) {
                        Some(k) => Some(InputEvent::Key(k)),
                        None => {
                            debug!("can't map {:?} to a keypad key", c);
                            None
                        }
                    },
                    _ => None,
                }
            }
            Event::Resize(..) => Some(InputEvent::Resize),
            _ => None,
        }
    }
}

impl Default for Keymap {
    fn default() -> Self {
        Keymap::new(KeymapKind::default())
    }
}

/// somewhere terminal events come from
pub trait EventSource {
    /// wait up to `timeout` for the next event
    fn poll_event(&mut self, timeout: Duration) -> io::Result<Option<Event>>;
}

/// reads events from the real terminal via crossterm
#[derive(Debug, Default)]
pub struct CrosstermEvents;

impl EventSource for CrosstermEvents {
    fn poll_event(&mut self, timeout: Duration) -> io::Result<Option<Event>> {
        if poll(timeout)? {
            Ok(Some(read()?))
        } else {
            Ok(None)
        }
    }
}

/// plays back a fixed list of events, then reports nothing forever
pub struct ScriptedEvents {
    events: VecDeque<Event>,
}

impl ScriptedEvents {
    pub fn new(events: impl IntoIterator<Item = Event>) -> Self {
        ScriptedEvents {
            events: events.into_iter().collect(),
        }
    }

    /// never produces anything
    pub fn idle() -> Self {
        ScriptedEvents {
            events: VecDeque::new(),
        }
    }

    pub fn keys(chars: &str) -> Self {
        ScriptedEvents::new(
            chars
                .chars()
                .map(|c| Event::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))),
        )
    }
}

impl EventSource for ScriptedEvents {
    fn poll_event(&mut self, timeout: Duration) -> io::Result<Option<Event>> {
        match self.events.pop_front() {
            Some(ev) => Ok(Some(ev)),
            None => {
                std::thread::sleep(timeout);
                Ok(None)
            }
        }
    }
}
