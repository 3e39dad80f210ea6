//! The mutable output surface written by paint engines.
//!
//! One `Surface` instance is shared across all captures of a batch: paint
//! k+1 overwrites paint k's pixels in place. This aliasing is deliberate
//! (throughput over safety); `copy_output_per_result` is the sanctioned way
//! to obtain an independently owned buffer per result. Identity of the
//! shared buffer is observable through [`SurfaceRef`] pointer equality.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sha2::{Digest, Sha256};

/// An RGBA8 color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 255 };
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
    pub const TRANSPARENT: Color = Color { r: 0, g: 0, b: 0, a: 0 };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b, a: 255 }
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`
    pub fn parse(s: &str) -> Option<Color> {
        let hex = s.strip_prefix('#')?;
        let expand = |h: u8| h << 4 | h;
        match hex.len() {
            3 => {
                let v = u16::from_str_radix(hex, 16).ok()?;
                Some(Color {
                    r: expand(((v >> 8) & 0xf) as u8),
                    g: expand(((v >> 4) & 0xf) as u8),
                    b: expand((v & 0xf) as u8),
                    a: 255,
                })
            }
            6 => {
                let v = u32::from_str_radix(hex, 16).ok()?;
                Some(Color {
                    r: (v >> 16) as u8,
                    g: (v >> 8) as u8,
                    b: v as u8,
                    a: 255,
                })
            }
            8 => {
                let v = u32::from_str_radix(hex, 16).ok()?;
                Some(Color {
                    r: (v >> 24) as u8,
                    g: (v >> 16) as u8,
                    b: (v >> 8) as u8,
                    a: v as u8,
                })
            }
            _ => None,
        }
    }
}

/// A raster pixel buffer (RGBA8, row-major) plus the scale it was painted at
#[derive(Debug, Clone)]
pub struct Surface {
    width: u32,
    height: u32,
    scale: f32,
    pixels: Vec<u8>,
}

impl Surface {
    /// An unpainted zero-sized surface
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            scale: 1.0,
            pixels: Vec::new(),
        }
    }

    /// Reallocate to the given dimensions and clear to `background`.
    /// Dimensions are clamped to at least 1x1.
    pub fn reset(&mut self, width: u32, height: u32, scale: f32, background: Color) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.scale = scale;
        let len = (self.width as usize) * (self.height as usize) * 4;
        self.pixels.clear();
        self.pixels.reserve(len);
        for _ in 0..(self.width as usize) * (self.height as usize) {
            self.pixels.extend_from_slice(&[background.r, background.g, background.b, background.a]);
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Raw RGBA8 bytes, row-major
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Read one pixel; `None` outside the surface
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + x as usize) * 4;
        Some(Color {
            r: self.pixels[i],
            g: self.pixels[i + 1],
            b: self.pixels[i + 2],
            a: self.pixels[i + 3],
        })
    }

    /// Fill an axis-aligned rectangle, clipped to the surface
    pub fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: Color) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let x0 = x.max(0) as u32;
        let y0 = y.max(0) as u32;
        let x1 = (x.saturating_add(w as i32)).clamp(0, self.width as i32) as u32;
        let y1 = (y.saturating_add(h as i32)).clamp(0, self.height as i32) as u32;
        for row in y0..y1 {
            for col in x0..x1 {
                let i = ((row as usize) * (self.width as usize) + col as usize) * 4;
                self.pixels[i] = color.r;
                self.pixels[i + 1] = color.g;
                self.pixels[i + 2] = color.b;
                self.pixels[i + 3] = color.a;
            }
        }
    }

    /// Hex-encoded SHA-256 of the pixel buffer, for deterministic comparisons
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.pixels);
        hex::encode(hasher.finalize())
    }
}

/// Shared handle to the batch output surface
pub type SurfaceRef = Arc<Mutex<Surface>>;

/// Wrap a surface in a shared handle
pub fn shared(surface: Surface) -> SurfaceRef {
    Arc::new(Mutex::new(surface))
}

/// Lock a shared surface, recovering from a poisoned lock.
/// The buffer is plain bytes and stays structurally valid after a panic.
pub fn lock_surface(surface: &SurfaceRef) -> MutexGuard<'_, Surface> {
    surface.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_colors() {
        assert_eq!(Color::parse("#fff"), Some(Color::WHITE));
        assert_eq!(Color::parse("#ffffff"), Some(Color::WHITE));
        assert_eq!(Color::parse("#000000ff"), Some(Color::BLACK));
        assert_eq!(Color::parse("#ff0000"), Some(Color::rgb(255, 0, 0)));
        assert_eq!(Color::parse("red"), None);
        assert_eq!(Color::parse("#12345"), None);
    }

    #[test]
    fn reset_clears_to_background() {
        let mut s = Surface::empty();
        s.reset(4, 2, 2.0, Color::rgb(1, 2, 3));
        assert_eq!(s.width(), 4);
        assert_eq!(s.height(), 2);
        assert_eq!(s.scale(), 2.0);
        assert_eq!(s.pixels().len(), 4 * 2 * 4);
        assert_eq!(s.pixel(3, 1), Some(Color::rgb(1, 2, 3)));
        assert_eq!(s.pixel(4, 0), None);
    }

    #[test]
    fn zero_dimensions_clamp_to_one() {
        let mut s = Surface::empty();
        s.reset(0, 0, 1.0, Color::WHITE);
        assert_eq!(s.width(), 1);
        assert_eq!(s.height(), 1);
    }

    #[test]
    fn fill_rect_clips() {
        let mut s = Surface::empty();
        s.reset(4, 4, 1.0, Color::WHITE);
        s.fill_rect(-2, -2, 4, 4, Color::BLACK);
        assert_eq!(s.pixel(0, 0), Some(Color::BLACK));
        assert_eq!(s.pixel(1, 1), Some(Color::BLACK));
        assert_eq!(s.pixel(2, 2), Some(Color::WHITE));
    }

    #[test]
    fn digest_tracks_content() {
        let mut a = Surface::empty();
        a.reset(2, 2, 1.0, Color::WHITE);
        let before = a.digest();
        a.fill_rect(0, 0, 1, 1, Color::BLACK);
        assert_ne!(before, a.digest());

        let mut b = Surface::empty();
        b.reset(2, 2, 1.0, Color::WHITE);
        b.fill_rect(0, 0, 1, 1, Color::BLACK);
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn clone_is_a_deep_copy() {
        let original = shared(Surface::empty());
        lock_surface(&original).reset(2, 2, 1.0, Color::WHITE);
        let copy = shared(lock_surface(&original).clone());
        lock_surface(&original).fill_rect(0, 0, 2, 2, Color::BLACK);
        assert_eq!(lock_surface(&copy).pixel(0, 0), Some(Color::WHITE));
        assert!(!Arc::ptr_eq(&original, &copy));
    }
}
