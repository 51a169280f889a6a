pub mod headless;
pub mod terminal;

use anyhow::Result;

/// Display side of the render loop.
///
/// Receives the smoothed band vector once per frame. Returning `Ok(false)`
/// requests shutdown.
pub trait Renderer {
    fn render(&mut self, bands: &[f32]) -> Result<bool>;
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&mut self, bands: &[f32]) -> Result<bool> {
        (**self).render(bands)
    }
}
