use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::{cursor, execute, queue, style, terminal};
use std::io::{self, Stdout, Write};
use std::time::Duration;

use super::Renderer;

/// Eighth-block glyphs, empty to full.
const BLOCKS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Vertical bars in the terminal's alternate screen.
pub struct TerminalRenderer {
    out: Stdout,
}

impl TerminalRenderer {
    pub fn new() -> Result<Self> {
        terminal::enable_raw_mode().context("Failed to enable raw terminal mode")?;
        let mut out = io::stdout();
        execute!(out, terminal::EnterAlternateScreen, cursor::Hide)
            .context("Failed to enter alternate screen")?;
        Ok(Self { out })
    }

    fn quit_requested(&self) -> Result<bool> {
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if is_quit_key(&key) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

impl Renderer for TerminalRenderer {
    fn render(&mut self, bands: &[f32]) -> Result<bool> {
        if self.quit_requested()? {
            return Ok(false);
        }

        let (width, height) = terminal::size().context("Failed to query terminal size")?;
        let rows = bar_rows(bands, width as usize, height.saturating_sub(1) as usize);

        for (y, line) in rows.iter().enumerate() {
            queue!(self.out, cursor::MoveTo(0, y as u16), style::Print(line))?;
        }
        queue!(
            self.out,
            cursor::MoveTo(0, height.saturating_sub(1)),
            terminal::Clear(terminal::ClearType::CurrentLine),
            style::Print(format!("{} bands  [q] quit", bands.len()))
        )?;
        self.out.flush()?;

        Ok(true)
    }
}

impl Drop for TerminalRenderer {
    fn drop(&mut self) {
        let _ = execute!(self.out, cursor::Show, terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

fn is_quit_key(key: &KeyEvent) -> bool {
    if key.kind == KeyEventKind::Release {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Lay the bands out across `width` columns and `height` rows, top row
/// first. Levels are clamped to `[0, 1]`.
fn bar_rows(bands: &[f32], width: usize, height: usize) -> Vec<String> {
    if bands.is_empty() || width == 0 || height == 0 {
        return vec![" ".repeat(width); height];
    }

    let eighths: Vec<usize> = (0..width)
        .map(|col| {
            let level = bands[col * bands.len() / width];
            let level = if level.is_nan() { 0.0 } else { level.clamp(0.0, 1.0) };
            (level * (height * 8) as f32).round() as usize
        })
        .collect();

    (0..height)
        .map(|y| {
            let floor = (height - 1 - y) * 8;
            eighths
                .iter()
                .map(|&e| BLOCKS[e.saturating_sub(floor).min(8)])
                .collect()
        })
        .collect()
}
