use ratatui::buffer::Buffer;
use ratatui::layout::{Position, Rect};
use ratatui::style::Color;

use crate::domain::globe::View;
use crate::domain::grid::Rgba;

/// RGBA pixel raster sized to the view. One terminal cell carries two
/// vertically stacked pixels, drawn with the `▀` half block.
#[derive(Debug, Clone)]
pub struct PixelSurface {
    view: View,
    pixels: Vec<Rgba>,
}

impl PixelSurface {
    #[must_use]
    pub fn new(view: View) -> Self {
        Self {
            view,
            pixels: vec![Rgba::CLEAR; view.width * view.height],
        }
    }

    /// Wraps an already-painted pixel buffer of matching size.
    #[must_use]
    pub fn from_pixels(view: View, pixels: Vec<Rgba>) -> Self {
        debug_assert_eq!(pixels.len(), view.width * view.height);
        Self { view, pixels }
    }

    #[must_use]
    pub fn view(&self) -> View {
        self.view
    }

    pub fn clear(&mut self) {
        self.pixels.fill(Rgba::CLEAR);
    }

    pub fn resize(&mut self, view: View) {
        if view != self.view {
            self.view = view;
            self.pixels = vec![Rgba::CLEAR; view.width * view.height];
        } else {
            self.clear();
        }
    }

    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Rgba {
        if x >= self.view.width || y >= self.view.height {
            return Rgba::CLEAR;
        }
        self.pixels[y * self.view.width + x]
    }

    /// Stores a pixel verbatim, ignoring writes outside the raster.
    pub fn set(&mut self, x: usize, y: usize, color: Rgba) {
        if x < self.view.width && y < self.view.height {
            self.pixels[y * self.view.width + x] = color;
        }
    }

    /// Source-over blend of `color` onto the existing pixel.
    pub fn blend(&mut self, x: usize, y: usize, color: Rgba) {
        if x >= self.view.width || y >= self.view.height {
            return;
        }
        let idx = y * self.view.width + x;
        self.pixels[idx] = blend_over(self.pixels[idx], color);
    }

    /// Draws a line segment with Bresenham stepping, blending each pixel.
    pub fn stroke_line(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, color: Rgba) {
        let (mut x, mut y) = (x0.round() as i64, y0.round() as i64);
        let (xe, ye) = (x1.round() as i64, y1.round() as i64);
        let dx = (xe - x).abs();
        let dy = -(ye - y).abs();
        let sx = if x < xe { 1 } else { -1 };
        let sy = if y < ye { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            if x >= 0 && y >= 0 {
                self.blend(x as usize, y as usize, color);
            }
            if x == xe && y == ye {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }
}

fn blend_over(dst: Rgba, src: Rgba) -> Rgba {
    if src.3 == 0 {
        return dst;
    }
    if src.3 == 255 || dst.3 == 0 {
        return src;
    }
    let sa = u32::from(src.3);
    let da = u32::from(dst.3);
    let out_a = sa + da * (255 - sa) / 255;
    let ch = |s: u8, d: u8| {
        let s = u32::from(s) * sa;
        let d = u32::from(d) * da * (255 - sa) / 255;
        ((s + d) / out_a.max(1)) as u8
    };
    Rgba(
        ch(src.0, dst.0),
        ch(src.1, dst.1),
        ch(src.2, dst.2),
        out_a.min(255) as u8,
    )
}

/// Composites `layers` in order over a black base and writes half-block
/// cells into `buf` for the given screen area.
pub fn blit_layers(layers: &[&PixelSurface], area: Rect, buf: &mut Buffer) {
    let resolve = |x: usize, y: usize| -> Color {
        let mut acc = Rgba(0, 0, 0, 255);
        for layer in layers {
            acc = blend_over(acc, layer.get(x, y));
        }
        Color::Rgb(acc.0, acc.1, acc.2)
    };

    for row in 0..area.height {
        for col in 0..area.width {
            let px = col as usize;
            let top = resolve(px, usize::from(row) * 2);
            let bottom = resolve(px, usize::from(row) * 2 + 1);
            if let Some(cell) =
                buf.cell_mut(Position::new(area.x + col, area.y + row))
            {
                cell.set_symbol("▀").set_fg(top).set_bg(bottom);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_round_trip() {
        let mut s = PixelSurface::new(View::new(8, 8));
        s.set(3, 4, Rgba(10, 20, 30, 255));
        assert_eq!(s.get(3, 4), Rgba(10, 20, 30, 255));
        assert_eq!(s.get(0, 0), Rgba::CLEAR);
    }

    #[test]
    fn test_out_of_range_writes_ignored() {
        let mut s = PixelSurface::new(View::new(4, 4));
        s.set(10, 10, Rgba(255, 0, 0, 255));
        s.blend(10, 10, Rgba(255, 0, 0, 255));
        assert!(s.get(10, 10) == Rgba::CLEAR);
    }

    #[test]
    fn test_opaque_blend_replaces() {
        let mut s = PixelSurface::new(View::new(4, 4));
        s.set(1, 1, Rgba(0, 0, 255, 255));
        s.blend(1, 1, Rgba(255, 0, 0, 255));
        assert_eq!(s.get(1, 1), Rgba(255, 0, 0, 255));
    }

    #[test]
    fn test_translucent_blend_darkens() {
        let mut s = PixelSurface::new(View::new(4, 4));
        s.set(1, 1, Rgba(200, 200, 200, 255));
        s.blend(1, 1, Rgba(0, 0, 0, 128));
        let out = s.get(1, 1);
        assert!(out.0 < 200 && out.0 > 50);
    }

    #[test]
    fn test_stroke_line_touches_endpoints() {
        let mut s = PixelSurface::new(View::new(16, 16));
        s.stroke_line(1.0, 1.0, 10.0, 7.0, Rgba(255, 255, 255, 255));
        assert_ne!(s.get(1, 1), Rgba::CLEAR);
        assert_ne!(s.get(10, 7), Rgba::CLEAR);
    }
}
