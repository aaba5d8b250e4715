use crate::error::Fault;
use log::{info, warn};
use std::fs::File;
use std::io;
use std::path::Path;

// NB. addresses are u16 as per the chip-8; lengths are usize to stop endless casting

/// Represents the addressable memory of the machine. All accesses are
/// bounds-checked; nothing wraps around the end of memory.
pub trait MemoryMap {
    /// write a chunk of bytes into "RAM"
    fn write(&mut self, data: &[u8], addr: u16) -> Result<(), Fault> {
        self.get_rw_slice(addr, data.len())?.copy_from_slice(data);
        Ok(())
    }

    /// get a big-endian two-byte word
    fn get_word(&self, addr: u16) -> Result<u16, Fault> {
        let word = self.get_ro_slice(addr, 2)?;
        Ok(u16::from_be_bytes([word[0], word[1]]))
    }

    /// get a r/w slice of the underlying memory
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> Result<&mut [u8], Fault>;

    /// get a r/o slice of the underlying memory
    fn get_ro_slice(&self, addr: u16, len: usize) -> Result<&[u8], Fault>;
}

/// how much RAM we have
pub const RAM_SIZE_BYTES: usize = 4096;

/// where the program is loaded
pub const PROGRAM_ADDR: u16 = 0x0200;

/// where the hex digit glyphs live
pub const FONT_ADDR: u16 = 0x0050;

/// bytes per hex digit glyph
pub const GLYPH_BYTES: u16 = 5;

/// Memory layout:
///   0x0000-0x004f  unused
///   0x0050-0x009f  hex digit glyphs
///   0x00a0-0x01ff  unused
///   0x0200-0x0fff  program
///
/// the call stack and display are kept outside of addressable memory
pub struct MemoryImage {
    bytes: Box<[u8]>,
}

impl MemoryMap for MemoryImage {
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> Result<&mut [u8], Fault> {
        let range = Self::range(addr, len)?;
        Ok(&mut self.bytes[range])
    }

    fn get_ro_slice(&self, addr: u16, len: usize) -> Result<&[u8], Fault> {
        let range = Self::range(addr, len)?;
        Ok(&self.bytes[range])
    }
}

impl MemoryImage {
    /// zeroed memory with the glyph table baked in
    pub fn new() -> Self {
        let mut bytes = vec![0u8; RAM_SIZE_BYTES].into_boxed_slice();
        let font = FONT_ADDR as usize;
        bytes[font..font + HEX_FONT.len()].copy_from_slice(&HEX_FONT);
        MemoryImage { bytes }
    }

    fn range(addr: u16, len: usize) -> Result<std::ops::Range<usize>, Fault> {
        let start = addr as usize;
        match start.checked_add(len) {
            Some(end) if end <= RAM_SIZE_BYTES => Ok(start..end),
            _ => Err(Fault::AddressOutOfBounds { addr, len }),
        }
    }

    /// load a program at 0x200; returns its length
    pub fn load_program(&mut self, reader: &mut impl io::Read) -> Result<usize, Fault> {
        let mut rom = Vec::new();
        reader.read_to_end(&mut rom)?;
        let capacity = RAM_SIZE_BYTES - PROGRAM_ADDR as usize;
        if rom.len() > capacity {
            return Err(Fault::RomTooLarge {
                len: rom.len(),
                capacity,
            });
        }
        if rom.len() % 2 != 0 {
            warn!("ROM has odd length {}; last byte is not a whole instruction", rom.len());
        }
        self.write(&rom, PROGRAM_ADDR)?;
        info!("loaded ROM, size=0x{:04x}", rom.len());
        Ok(rom.len())
    }

    /// open a file and load it as the program
    pub fn load_rom_file(&mut self, path: &Path) -> Result<usize, Fault> {
        let mut f = File::open(path)?;
        self.load_program(&mut f)
    }
}

impl Default for MemoryImage {
    fn default() -> Self {
        Self::new()
    }
}

const HEX_FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_zeroed() {
        let m = MemoryImage::new();
        // NB. memory is zeroed from 0x200 because before that we bake in the font
        assert_eq!(m.bytes[0x200..], [0; 0xe00]);
    }

    #[test]
    fn test_font_baked_in() -> Result<(), Fault> {
        let m = MemoryImage::new();
        // glyph for "0" then "1"
        assert_eq!(m.get_ro_slice(FONT_ADDR, 6)?, &[0xF0, 0x90, 0x90, 0x90, 0xF0, 0x20]);
        assert_eq!(m.get_ro_slice(FONT_ADDR + 15 * GLYPH_BYTES, 5)?, &[0xF0, 0x80, 0xF0, 0x80, 0x80]);
        Ok(())
    }

    #[test]
    fn test_write_slice_ok() -> Result<(), Fault> {
        let mut dst = MemoryImage::new();
        dst.write(&[0, 1, 2, 3, 4, 5, 6, 7], 8)?;
        assert_eq!(
            dst.bytes[..16],
            [0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7]
        );
        Ok(())
    }

    #[test]
    fn test_read_word() -> Result<(), Fault> {
        let mut m = MemoryImage::new();
        m.write(&[0, 1, 2, 3, 4, 5, 6, 7], 0)?;
        assert_eq!(m.get_word(0x4)?, 0x0405);
        Ok(())
    }

    #[test]
    fn test_read_word_past_end_is_fault() {
        let m = MemoryImage::new();
        assert!(matches!(
            m.get_word(0x0fff),
            Err(Fault::AddressOutOfBounds { addr: 0x0fff, len: 2 })
        ));
    }

    #[test]
    fn test_write_too_much_is_fault() {
        let mut dst = MemoryImage::new();
        assert!(matches!(
            dst.write(&[0; 8], 4089),
            Err(Fault::AddressOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_program_load_ok() -> Result<(), Fault> {
        let mut dst = MemoryImage::new();
        let mut prog: &[u8] = &[0x00, 0xe0]; // clear screen
        assert_eq!(dst.load_program(&mut prog)?, 2);
        assert_eq!(dst.get_ro_slice(0x200, 2)?, &[0x00, 0xe0]);
        Ok(())
    }

    #[test]
    fn test_odd_program_is_only_a_warning() -> Result<(), Fault> {
        let mut dst = MemoryImage::new();
        let mut prog: &[u8] = &[0x60, 0x05, 0x12];
        assert_eq!(dst.load_program(&mut prog)?, 3);
        assert_eq!(dst.get_ro_slice(0x200, 3)?, &[0x60, 0x05, 0x12]);
        Ok(())
    }

    #[test]
    fn test_oversized_program_rejected() {
        let mut dst = MemoryImage::new();
        let rom = vec![0u8; 0xe01];
        let mut prog: &[u8] = &rom;
        assert!(matches!(
            dst.load_program(&mut prog),
            Err(Fault::RomTooLarge { len: 0xe01, capacity: 0xe00 })
        ));
    }
}
