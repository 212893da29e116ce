use crate::domain::globe::{Globe, View};
use crate::domain::grid::Rgba;

/// Per-viewport visibility test plus a paintable RGBA buffer, tied to one
/// globe's projection state. Must be rebuilt whenever that state changes.
#[derive(Debug, Clone)]
pub struct Mask {
    view: View,
    generation: u64,
    visible: Vec<bool>,
    buffer: Vec<Rgba>,
}

impl Mask {
    #[must_use]
    pub fn build(globe: &Globe) -> Self {
        let view = globe.view();
        let mut visible = vec![false; view.width * view.height];
        for y in 0..view.height {
            for x in 0..view.width {
                visible[y * view.width + x] = globe.visible(x as f64, y as f64);
            }
        }
        Self {
            view,
            generation: globe.generation(),
            visible,
            buffer: vec![Rgba::CLEAR; view.width * view.height],
        }
    }

    #[must_use]
    pub fn view(&self) -> View {
        self.view
    }

    /// Generation of the globe this mask was built against.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn is_visible(&self, x: usize, y: usize) -> bool {
        if x >= self.view.width || y >= self.view.height {
            return false;
        }
        self.visible[y * self.view.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, color: Rgba) {
        if x < self.view.width && y < self.view.height {
            self.buffer[y * self.view.width + x] = color;
        }
    }

    #[must_use]
    pub fn color(&self, x: usize, y: usize) -> Rgba {
        if x >= self.view.width || y >= self.view.height {
            return Rgba::CLEAR;
        }
        self.buffer[y * self.view.width + x]
    }

    pub fn clear_buffer(&mut self) {
        self.buffer.fill(Rgba::CLEAR);
    }

    /// Consumes the mask, returning its visibility bitmap and painted buffer.
    #[must_use]
    pub fn into_parts(self) -> (Vec<bool>, Vec<Rgba>) {
        (self.visible, self.buffer)
    }
}

/// Caches one mask per globe generation. Any rotation, zoom, or projection
/// swap produces a new generation and therefore a rebuilt mask.
#[derive(Debug, Default)]
pub struct MaskCache {
    cached: Option<Mask>,
}

impl MaskCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, globe: &Globe) -> &mut Mask {
        let stale = self
            .cached
            .as_ref()
            .is_none_or(|m| m.generation() != globe.generation() || m.view() != globe.view());
        if stale {
            self.cached = Some(Mask::build(globe));
        }
        self.cached.as_mut().expect("mask just built")
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}
