use crate::assets::Sprite;

use super::font;

pub(crate) fn write_pixel(pixels: &mut [u8], width: usize, x: usize, y: usize, color: [u8; 4]) {
    let Some(pixel_offset) = y.checked_mul(width).and_then(|row| row.checked_add(x)) else {
        return;
    };
    let Some(byte_offset) = pixel_offset.checked_mul(4) else {
        return;
    };
    let Some(end) = byte_offset.checked_add(4) else {
        return;
    };
    if end > pixels.len() {
        return;
    }
    pixels[byte_offset..end].copy_from_slice(&color);
}

/// Source-over blend of `src`, with its alpha scaled by `opacity`.
fn blend_over(dst: &mut [u8], src: &[u8], opacity: f32) {
    let alpha = (src[3] as f32 / 255.0) * opacity.clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }
    if alpha >= 1.0 {
        dst[..4].copy_from_slice(&src[..4]);
        return;
    }
    let inv = 1.0 - alpha;
    for channel in 0..3 {
        let blended = src[channel] as f32 * alpha + dst[channel] as f32 * inv;
        dst[channel] = blended.round() as u8;
    }
    let dst_alpha = dst[3] as f32 / 255.0;
    dst[3] = ((alpha + dst_alpha * inv) * 255.0).round() as u8;
}

/// Offscreen RGBA8 buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let mut color = [0; 4];
        color.copy_from_slice(&self.pixels[offset..offset + 4]);
        Some(color)
    }

    /// Resets every pixel to transparent.
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    pub fn fill(&mut self, color: [u8; 4]) {
        for pixel in self.pixels.chunks_exact_mut(4) {
            pixel.copy_from_slice(&color);
        }
    }

    /// Overwrites a clipped rectangle.
    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: [u8; 4]) {
        let start_x = x.max(0);
        let start_y = y.max(0);
        let end_x = x.saturating_add(w).min(self.width as i32);
        let end_y = y.saturating_add(h).min(self.height as i32);
        if end_x <= start_x || end_y <= start_y {
            return;
        }
        let width = self.width as usize;
        for py in start_y..end_y {
            for px in start_x..end_x {
                write_pixel(&mut self.pixels, width, px as usize, py as usize, color);
            }
        }
    }

    pub fn draw_rect_outline(&mut self, x: i32, y: i32, w: i32, h: i32, color: [u8; 4]) {
        if w <= 1 || h <= 1 {
            return;
        }
        self.fill_rect(x, y, w, 1, color);
        self.fill_rect(x, y + h - 1, w, 1, color);
        self.fill_rect(x, y, 1, h, color);
        self.fill_rect(x + w - 1, y, 1, h, color);
    }

    /// Blends `sprite` with its top-left corner at `(x, y)`.
    pub fn draw_sprite(&mut self, sprite: &Sprite, x: i32, y: i32, opacity: f32) {
        if opacity <= 0.0 {
            return;
        }
        let src_width = sprite.width() as i32;
        let src_height = sprite.height() as i32;
        let dst_width = self.width as i32;
        let dst_height = self.height as i32;
        let src = sprite.pixels();

        for sy in 0..src_height {
            let dy = y + sy;
            if dy < 0 || dy >= dst_height {
                continue;
            }
            for sx in 0..src_width {
                let dx = x + sx;
                if dx < 0 || dx >= dst_width {
                    continue;
                }
                let src_offset = ((sy * src_width + sx) * 4) as usize;
                let dst_offset = ((dy * dst_width + dx) * 4) as usize;
                blend_over(
                    &mut self.pixels[dst_offset..dst_offset + 4],
                    &src[src_offset..src_offset + 4],
                    opacity,
                );
            }
        }
    }

    pub fn draw_text(&mut self, x: i32, y: i32, text: &str, color: [u8; 4]) {
        font::draw_text(&mut self.pixels, self.width, self.height, (x, y), text, color);
    }

    /// Blends this surface onto an equally sized RGBA8 frame.
    pub fn composite_onto(&self, frame: &mut [u8]) {
        for (dst, src) in frame
            .chunks_exact_mut(4)
            .zip(self.pixels.chunks_exact(4))
        {
            blend_over(dst, src, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_rect_clips_to_bounds() {
        let mut surface = Surface::new(4, 4);
        surface.fill_rect(-2, -2, 4, 4, [9, 9, 9, 255]);
        assert_eq!(surface.pixel(0, 0), Some([9, 9, 9, 255]));
        assert_eq!(surface.pixel(1, 1), Some([9, 9, 9, 255]));
        assert_eq!(surface.pixel(2, 2), Some([0, 0, 0, 0]));
        assert_eq!(surface.pixel(4, 0), None);
    }

    #[test]
    fn sprite_blends_with_opacity() {
        let mut surface = Surface::new(2, 1);
        surface.fill([0, 0, 0, 255]);
        let sprite = Sprite::solid(1, 1, [200, 100, 50, 255]);

        surface.draw_sprite(&sprite, 0, 0, 1.0);
        surface.draw_sprite(&sprite, 1, 0, 0.5);

        assert_eq!(surface.pixel(0, 0), Some([200, 100, 50, 255]));
        assert_eq!(surface.pixel(1, 0), Some([100, 50, 25, 255]));
    }

    #[test]
    fn transparent_sprite_pixels_leave_destination() {
        let mut surface = Surface::new(1, 1);
        surface.fill([1, 2, 3, 255]);
        surface.draw_sprite(&Sprite::solid(1, 1, [255, 255, 255, 0]), 0, 0, 1.0);
        assert_eq!(surface.pixel(0, 0), Some([1, 2, 3, 255]));
    }

    #[test]
    fn sprite_partially_offscreen_is_clipped() {
        let mut surface = Surface::new(2, 2);
        surface.draw_sprite(&Sprite::solid(3, 3, [5, 5, 5, 255]), -2, 1, 1.0);
        assert_eq!(surface.pixel(0, 1), Some([5, 5, 5, 255]));
        assert_eq!(surface.pixel(1, 1), Some([0, 0, 0, 0]));
        assert_eq!(surface.pixel(0, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn composite_skips_transparent_pixels() {
        let mut layer = Surface::new(2, 1);
        layer.fill_rect(1, 0, 1, 1, [50, 60, 70, 255]);
        let mut frame = vec![10u8, 10, 10, 255, 10, 10, 10, 255];

        layer.composite_onto(&mut frame);

        assert_eq!(&frame[..4], &[10, 10, 10, 255]);
        assert_eq!(&frame[4..], &[50, 60, 70, 255]);
    }
}
