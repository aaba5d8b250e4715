use crate::error::Fault;
use crossterm::cursor::Show;
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use tui::backend::CrosstermBackend;
use tui::buffer::Buffer;
use tui::layout::Rect;
use tui::style::{Color, Style};
use tui::widgets::{Block, Borders, Widget};
use tui::Terminal;

pub const SCREEN_WIDTH: usize = 64;
pub const SCREEN_HEIGHT: usize = 32;

/// tallest sprite a draw instruction can ask for
pub const MAX_SPRITE_ROWS: usize = 15;

pub const CELL_FILLED: &str = "█";
pub const CELL_EMPTY: &str = " ";

/// Surface is what the coordination layer renders onto. It should abstract
/// the implementation details, so a variety of kinds of screen would work.
pub trait Surface {
    /// stage a cell at framebuffer coordinates; nothing shows until present()
    fn set_cell(&mut self, x: u16, y: u16, glyph: &'static str, style: Style);

    /// push staged cells out to the screen
    fn present(&mut self) -> io::Result<()>;

    /// size of the underlying screen, in cells
    fn size(&self) -> io::Result<(u16, u16)>;
}

/// 1-bit pixel grid. Only sprite compositing and clear mutate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framebuffer {
    width: usize,
    height: usize,
    pixels: Vec<bool>,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Framebuffer {
            width,
            height,
            pixels: vec![false; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_set(&self, x: usize, y: usize) -> bool {
        self.pixels[(y % self.height) * self.width + (x % self.width)]
    }

    pub fn clear(&mut self) {
        self.pixels.iter_mut().for_each(|px| *px = false);
    }

    /// XOR a sprite onto the grid, wrapping at the edges. Returns true if any
    /// set bit of the sprite landed on a pixel that was already lit.
    pub fn draw_sprite_at(&mut self, rows: &[u8], x: usize, y: usize) -> bool {
        let mut collision = false;
        for (dy, row) in rows.iter().take(MAX_SPRITE_ROWS).enumerate() {
            let py = (y + dy) % self.height;
            for dx in 0..8 {
                if row & (0x80 >> dx) == 0 {
                    continue;
                }
                let px = (x + dx) % self.width;
                let pixel = &mut self.pixels[py * self.width + px];
                collision |= *pixel;
                *pixel = !*pixel;
            }
        }
        collision
    }

    /// coordinates of every lit pixel, row by row
    pub fn lit_pixels(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let w = self.width;
        self.pixels
            .iter()
            .enumerate()
            .filter(|(_, lit)| **lit)
            .map(move |(i, _)| (i % w, i / w))
    }

    /// project the grid onto a surface and present it
    pub fn render_to(&self, surface: &mut dyn Surface) -> io::Result<()> {
        let lit = Style::default().fg(Color::White).bg(Color::Black);
        let dark = Style::default().bg(Color::Black);
        for y in 0..self.height {
            for x in 0..self.width {
                let (glyph, style) = if self.pixels[y * self.width + x] {
                    (CELL_FILLED, lit)
                } else {
                    (CELL_EMPTY, dark)
                };
                surface.set_cell(x as u16, y as u16, glyph, style);
            }
        }
        surface.present()
    }
}

impl Default for Framebuffer {
    fn default() -> Self {
        Framebuffer::new(SCREEN_WIDTH, SCREEN_HEIGHT)
    }
}

/// puts the terminal back however we leave, including unwinding
struct TermGuard;

impl Drop for TermGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, Show);
    }
}

/// staged cells as a tui widget
struct Cells<'a> {
    cells: &'a [(&'static str, Style)],
    width: u16,
}

impl Widget for Cells<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for (i, (glyph, style)) in self.cells.iter().enumerate() {
            let x = i as u16 % self.width;
            let y = i as u16 / self.width;
            if x >= area.width || y >= area.height {
                continue;
            }
            buf.get_mut(area.x + x, area.y + y)
                .set_symbol(glyph)
                .set_style(*style);
        }
    }
}

/// monochrome surface in a terminal, rendered using TUI and crossterm
pub struct TermSurface {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    cells: Vec<(&'static str, Style)>,
    width: u16,
    height: u16,
    // dropped last so the terminal is restored after tui lets go of it
    _guard: TermGuard,
}

impl TermSurface {
    /// take over the terminal; fails if it can't fit width x height plus a border
    pub fn new(width: u16, height: u16) -> Result<TermSurface, Fault> {
        let (cols, rows) = terminal::size()?;
        if cols < width + 2 || rows < height + 2 {
            return Err(Fault::SurfaceTooSmall {
                width: cols,
                height: rows,
                need_width: width + 2,
                need_height: height + 2,
            });
        }

        terminal::enable_raw_mode()?;
        let guard = TermGuard;
        execute!(io::stdout(), EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = Terminal::new(backend)?;
        terminal.hide_cursor()?;
        terminal.clear()?;
        Ok(TermSurface {
            terminal,
            cells: vec![(CELL_EMPTY, Style::default()); width as usize * height as usize],
            width,
            height,
            _guard: guard,
        })
    }
}

impl Surface for TermSurface {
    fn set_cell(&mut self, x: u16, y: u16, glyph: &'static str, style: Style) {
        if x < self.width && y < self.height {
            self.cells[y as usize * self.width as usize + x as usize] = (glyph, style);
        }
    }

    fn present(&mut self) -> io::Result<()> {
        let cells = &self.cells;
        let (width, height) = (self.width, self.height);
        self.terminal.draw(|f| {
            let size = f.size();
            let area = Rect::new(0, 0, (width + 2).min(size.width), (height + 2).min(size.height));
            let block = Block::default()
                .title("mu8")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Cyan).bg(Color::Black));
            let inner = block.inner(area);
            f.render_widget(block, area);
            f.render_widget(Cells { cells, width }, inner);
        })?;
        Ok(())
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        let r = self.terminal.size()?;
        Ok((r.width, r.height))
    }
}

/// what a DummySurface has been asked to show
#[derive(Debug, Default)]
pub struct DummyScreen {
    pub cells: HashMap<(u16, u16), &'static str>,
    pub presents: usize,
}

impl DummyScreen {
    pub fn is_lit(&self, x: u16, y: u16) -> bool {
        self.cells.get(&(x, y)) == Some(&CELL_FILLED)
    }
}

/// useful for testing the coordination layer without a terminal; clones
/// share one screen so a test can look at what the render thread drew
#[derive(Clone, Default)]
pub struct DummySurface {
    screen: Arc<Mutex<DummyScreen>>,
}

impl DummySurface {
    pub fn new() -> Self {
        DummySurface::default()
    }

    pub fn with_screen<T>(&self, f: impl FnOnce(&DummyScreen) -> T) -> T {
        let screen = self.screen.lock().unwrap_or_else(|e| e.into_inner());
        f(&screen)
    }
}

impl Surface for DummySurface {
    fn set_cell(&mut self, x: u16, y: u16, glyph: &'static str, _style: Style) {
        let mut screen = self.screen.lock().unwrap_or_else(|e| e.into_inner());
        screen.cells.insert((x, y), glyph);
    }

    fn present(&mut self) -> io::Result<()> {
        let mut screen = self.screen.lock().unwrap_or_else(|e| e.into_inner());
        screen.presents += 1;
        Ok(())
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        Ok((SCREEN_WIDTH as u16 + 2, SCREEN_HEIGHT as u16 + 2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_blank() {
        let fb = Framebuffer::default();
        assert_eq!(fb.width(), 64);
        assert_eq!(fb.height(), 32);
        assert_eq!(fb.lit_pixels().count(), 0);
    }

    #[test]
    fn test_full_byte_on_clear_row_no_collision() {
        let mut fb = Framebuffer::default();
        assert!(!fb.draw_sprite_at(&[0xff], 0, 0));
        assert_eq!(fb.lit_pixels().count(), 8);
    }

    #[test]
    fn test_full_byte_on_full_row_collides() {
        let mut fb = Framebuffer::default();
        fb.draw_sprite_at(&[0xff], 8, 4);
        assert!(fb.draw_sprite_at(&[0xff], 8, 4));
        assert_eq!(fb.lit_pixels().count(), 0);
    }

    #[test]
    fn test_xor_is_its_own_inverse() {
        let mut fb = Framebuffer::default();
        fb.draw_sprite_at(&[0x0f], 20, 10);
        let before = fb.clone();
        let sprite = [0xF0, 0x90, 0x90, 0x90, 0xF0];
        assert!(!fb.draw_sprite_at(&sprite, 18, 9));
        assert_ne!(fb, before);
        // the second draw hits every bit the first one set
        assert!(fb.draw_sprite_at(&sprite, 18, 9));
        assert_eq!(fb, before);
    }

    #[test]
    fn test_collision_from_any_bit_not_just_last() {
        let mut fb = Framebuffer::default();
        fb.draw_sprite_at(&[0x80], 0, 0);
        // first bit of the first row collides, everything after is clear
        assert!(fb.draw_sprite_at(&[0x81, 0x01], 0, 0));
        assert!(!fb.is_set(0, 0));
        assert!(fb.is_set(7, 0));
        assert!(fb.is_set(7, 1));
    }

    #[test]
    fn test_wraps_horizontally() {
        let mut fb = Framebuffer::default();
        fb.draw_sprite_at(&[0xc0], SCREEN_WIDTH - 1, 0);
        assert!(fb.is_set(SCREEN_WIDTH - 1, 0));
        assert!(fb.is_set(0, 0));
        assert_eq!(fb.lit_pixels().count(), 2);
    }

    #[test]
    fn test_wraps_vertically() {
        let mut fb = Framebuffer::default();
        fb.draw_sprite_at(&[0x80, 0x80, 0x80], 3, SCREEN_HEIGHT - 1);
        let lit: Vec<_> = fb.lit_pixels().collect();
        assert_eq!(lit, vec![(3, 0), (3, 1), (3, SCREEN_HEIGHT - 1)]);
    }

    #[test]
    fn test_origin_outside_grid_wraps() {
        let mut fb = Framebuffer::default();
        fb.draw_sprite_at(&[0x80], 64 + 5, 32 + 2);
        assert!(fb.is_set(5, 2));
    }

    #[test]
    fn test_clear() {
        let mut fb = Framebuffer::default();
        fb.draw_sprite_at(&[0xff; 15], 10, 10);
        assert_eq!(fb.lit_pixels().count(), 120);
        fb.clear();
        assert_eq!(fb.lit_pixels().count(), 0);
    }

    #[test]
    fn test_render_to_dummy() -> io::Result<()> {
        let mut fb = Framebuffer::default();
        fb.draw_sprite_at(&[0xa0], 0, 1);
        let mut surface = DummySurface::new();
        fb.render_to(&mut surface)?;
        surface.with_screen(|s| {
            assert_eq!(s.presents, 1);
            assert_eq!(s.cells.len(), SCREEN_WIDTH * SCREEN_HEIGHT);
            assert!(s.is_lit(0, 1));
            assert!(!s.is_lit(1, 1));
            assert!(s.is_lit(2, 1));
        });
        Ok(())
    }
}
