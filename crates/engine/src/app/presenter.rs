use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use crate::vector::Vec2;

/// Fixed-size frame buffer scaled onto the window surface.
pub(crate) struct Presenter {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    frame_width: u32,
    frame_height: u32,
}

impl Presenter {
    pub(crate) fn new(window: Arc<Window>, frame_width: u32, frame_height: u32) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(
            Arc::clone(&window),
            (size.width, size.height),
            (frame_width, frame_height),
        )?;
        Ok(Self {
            window,
            pixels,
            frame_width,
            frame_height,
        })
    }

    /// Rebuilds the surface for a new window size. Zero sizes are ignored.
    pub(crate) fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(
            Arc::clone(&self.window),
            (width, height),
            (self.frame_width, self.frame_height),
        )?;
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        surface_size: (u32, u32),
        frame_size: (u32, u32),
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(surface_size.0, surface_size.1, window);
        Pixels::new(frame_size.0, frame_size.1, surface)
    }

    pub(crate) fn frame_mut(&mut self) -> &mut [u8] {
        self.pixels.frame_mut()
    }

    pub(crate) fn present(&self) -> Result<(), Error> {
        self.pixels.render()
    }

    /// Maps a window-space cursor to frame pixels, clamped to the frame.
    pub(crate) fn window_to_frame(&self, x: f32, y: f32) -> Vec2 {
        let (px, py) = self
            .pixels
            .window_pos_to_pixel((x, y))
            .unwrap_or_else(|outside| self.pixels.clamp_pixel_pos(outside));
        Vec2::new(px as f32, py as f32)
    }
}
