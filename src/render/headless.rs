use anyhow::Result;

use super::Renderer;

/// Renderer for running without a terminal: logs the loudest band
/// every `log_every` frames.
pub struct HeadlessRenderer {
    frames: u64,
    log_every: u64,
}

impl HeadlessRenderer {
    pub fn new(log_every: u64) -> Self {
        Self {
            frames: 0,
            log_every: log_every.max(1),
        }
    }

    #[cfg(test)]
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Renderer for HeadlessRenderer {
    fn render(&mut self, bands: &[f32]) -> Result<bool> {
        self.frames += 1;
        if self.frames % self.log_every == 0 {
            if let Some((band, level)) = loudest(bands) {
                log::info!(
                    "frame {}: loudest band {}/{} at {:.3}",
                    self.frames,
                    band,
                    bands.len(),
                    level
                );
            }
        }
        Ok(true)
    }
}

fn loudest(bands: &[f32]) -> Option<(usize, f32)> {
    bands
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_requests_shutdown() {
        let mut renderer = HeadlessRenderer::new(2);
        for _ in 0..5 {
            assert!(renderer.render(&[0.1, 0.9, 0.3]).unwrap());
        }
        assert_eq!(renderer.frames(), 5);
    }

    #[test]
    fn finds_loudest_band() {
        assert_eq!(loudest(&[0.1, 0.9, 0.3]), Some((1, 0.9)));
        assert_eq!(loudest(&[]), None);
    }
}
