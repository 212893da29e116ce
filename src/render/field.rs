use std::time::{Duration, Instant};

use rand::Rng;

use crate::app::agent::{BuildError, CancelToken};
use crate::domain::globe::{Globe, Pixels, View};
use crate::domain::grid::{GridBundle, Rgba, Sample};
use crate::render::mask::Mask;
use crate::render::surface::PixelSurface;

/// Wall-clock budget for one uninterrupted interpolation batch.
const BATCH_BUDGET: Duration = Duration::from_millis(100);
/// Pause between batches, giving the event loop room to breathe and the
/// cancellation token a chance to be observed.
const BATCH_YIELD: Duration = Duration::from_millis(25);
/// Alpha applied to every overlay color.
const OVERLAY_ALPHA: u8 = 160;
/// Normalizes the per-product velocity tunable against viewport height so
/// field vectors stay proportioned across terminal sizes.
const SPEED_NORM: f64 = 0.04;
/// Random picks attempted by `randomize` before falling back to the center.
const RANDOMIZE_TRIES: usize = 30;

/// One field cell at a sampled pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldCell {
    /// Screen-space displacement (pixels/frame) plus the sampled magnitude.
    Vector { dx: f32, dy: f32, magnitude: f32 },
    /// Projection is defined here but the grid has no data.
    Hole,
    /// Outside the projection boundary (or never sampled).
    Outside,
}

/// Derived screen-space raster for one (Globe, Grid) pairing: a vector-or-
/// hole cell per pixel plus the painted overlay bitmap. Cell buffers are
/// owned by the field and dropped on `release`.
#[derive(Debug)]
pub struct Field {
    view: View,
    bounds: Pixels,
    globe: Globe,
    cells: Vec<FieldCell>,
    visible: Vec<bool>,
    overlay: PixelSurface,
    released: bool,
}

impl Field {
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> FieldCell {
        if self.released || x >= self.view.width || y >= self.view.height {
            return FieldCell::Outside;
        }
        self.cells[y * self.view.width + x]
    }

    #[must_use]
    pub fn is_defined(&self, x: usize, y: usize) -> bool {
        matches!(self.get(x, y), FieldCell::Vector { .. })
    }

    /// True where the projection itself is defined, regardless of data.
    #[must_use]
    pub fn is_inside_boundary(&self, x: usize, y: usize) -> bool {
        if self.released || x >= self.view.width || y >= self.view.height {
            return false;
        }
        self.visible[y * self.view.width + x]
    }

    #[must_use]
    pub fn bounds(&self) -> Pixels {
        self.bounds
    }

    #[must_use]
    pub fn overlay(&self) -> &PixelSurface {
        &self.overlay
    }

    /// Generation of the globe this field was interpolated against.
    #[must_use]
    pub fn globe_generation(&self) -> u64 {
        self.globe.generation()
    }

    /// Picks a random geographic point whose projected, masked pixel is
    /// visible. Used to seed lookups, not particle motion.
    #[must_use]
    pub fn randomize<R: Rng>(&self, rng: &mut R) -> (f64, f64) {
        if !self.released {
            for _ in 0..RANDOMIZE_TRIES {
                let lon = rng.random_range(-180.0..180.0);
                let lat = rng.random_range(-85.0..85.0);
                if let Some((x, y)) = self.globe.project(lon, lat) {
                    if x >= 0.0 && y >= 0.0 && self.is_inside_boundary(x as usize, y as usize) {
                        return (lon, lat);
                    }
                }
            }
        }
        self.globe.center()
    }

    /// Drops the cell buffers. The field still answers queries, but as if
    /// everything were outside the boundary.
    pub fn release(&mut self) {
        self.cells = Vec::new();
        self.visible = Vec::new();
        self.released = true;
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released
    }
}

/// Interpolates the (primary, overlay) grids through `globe` into a field,
/// yielding cooperatively and reporting fractional progress along the way.
pub async fn build(
    globe: Globe,
    grids: GridBundle,
    overlay_enabled: bool,
    token: CancelToken,
    progress: impl Fn(f32) + Send,
) -> Result<Field, BuildError> {
    let view = globe.view();
    let bounds = globe.bounds();
    let mut mask = Mask::build(&globe);
    let mut cells = vec![FieldCell::Outside; view.width * view.height];

    let tuning = grids.primary.particles();
    let velocity_scale = tuning.velocity_scale * view.height as f64 * SPEED_NORM;
    let overlay_grid = grids.overlay_grid().clone();
    let resample_overlay = grids.overlay_is_distinct();

    let span = (bounds.x_max - bounds.x_min).max(1) as f32;
    let mut batch_start = Instant::now();
    let mut x = bounds.x_min & !1;

    while x <= bounds.x_max {
        for y in (bounds.y_min..=bounds.y_max).step_by(2) {
            if !mask.is_visible(x, y) {
                continue;
            }

            let mut cell = FieldCell::Hole;
            let mut color = Rgba::CLEAR;

            if let Some((lon, lat)) = globe.invert(x as f64, y as f64) {
                if lon.is_finite() {
                    let sample = grids.primary.interpolate(lon, lat);
                    if let Some(Sample::Vector { u, v, magnitude }) = sample {
                        if let Some(d) = globe.distortion(lon, lat) {
                            cell = FieldCell::Vector {
                                dx: ((u * d[0] + v * d[2]) * velocity_scale) as f32,
                                dy: ((u * d[1] + v * d[3]) * velocity_scale) as f32,
                                magnitude: magnitude as f32,
                            };
                        }
                    }
                    if overlay_enabled {
                        // A distinct overlay product drives the color; only
                        // when overlay == primary does magnitude stand in.
                        let scalar = if resample_overlay {
                            overlay_grid.interpolate(lon, lat).map(|s| s.scalar())
                        } else {
                            sample.map(|s| s.scalar())
                        };
                        if let Some(value) = scalar {
                            color = overlay_grid.gradient(value, OVERLAY_ALPHA);
                        }
                    }
                }
            }

            // 2x2 block per sample.
            for (px, py) in [(x, y), (x + 1, y), (x, y + 1), (x + 1, y + 1)] {
                mask.set(px, py, color);
                if px < view.width && py < view.height && mask.is_visible(px, py) {
                    cells[py * view.width + px] = cell;
                }
            }
        }

        x += 2;

        if batch_start.elapsed() > BATCH_BUDGET && x <= bounds.x_max {
            progress((x - bounds.x_min) as f32 / span);
            tokio::time::sleep(BATCH_YIELD).await;
            if token.requested() {
                return Err(BuildError::Cancelled);
            }
            batch_start = Instant::now();
        }
    }

    progress(1.0);
    let (visible, pixels) = mask.into_parts();
    Ok(Field {
        view,
        bounds,
        globe,
        cells,
        visible,
        overlay: PixelSurface::from_pixels(view, pixels),
        released: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::globe::{Orientation, ProjectionKind};
    use crate::domain::grid::{Grid, GridGeometry, ParticleTuning, ProductGrid};
    use chrono::Utc;
    use std::sync::Arc;

    fn globe() -> Globe {
        Globe::new(
            ProjectionKind::Orthographic,
            View::new(60, 60),
            Orientation::default(),
        )
    }

    fn patch_grid() -> Arc<dyn Grid> {
        // Bounded patch around the origin; everything else is out of domain.
        let geometry = GridGeometry {
            lon0: -10.0,
            lat0: -10.0,
            dlon: 1.0,
            dlat: 1.0,
            nx: 21,
            ny: 21,
            wrap_lon: false,
        };
        Arc::new(ProductGrid::from_vectors(
            "patch",
            geometry,
            Utc::now(),
            ParticleTuning {
                velocity_scale: 0.1,
                max_intensity: 10.0,
            },
            vec![Some([5.0, 0.0]); 21 * 21],
        ))
    }

    fn bundle(primary: Arc<dyn Grid>) -> GridBundle {
        GridBundle {
            primary,
            overlay: None,
        }
    }

    #[tokio::test]
    async fn test_center_is_defined_and_colored() {
        let field = build(globe(), bundle(patch_grid()), true, CancelToken::new(), |_| {})
            .await
            .unwrap();
        assert!(field.is_defined(30, 30));
        assert!(field.is_inside_boundary(30, 30));
        assert_ne!(field.overlay().get(30, 30), Rgba::CLEAR);
    }

    #[tokio::test]
    async fn test_hole_outside_grid_domain_inside_projection() {
        let field = build(globe(), bundle(patch_grid()), true, CancelToken::new(), |_| {})
            .await
            .unwrap();
        // Far from the data patch but still on the globe disc.
        let (x, y) = {
            let g = globe();
            let (x, y) = g.project(60.0, 30.0).unwrap();
            (x as usize, y as usize)
        };
        assert!(!field.is_defined(x, y));
        assert!(field.is_inside_boundary(x, y));
        assert_eq!(field.get(x, y), FieldCell::Hole);
    }

    #[tokio::test]
    async fn test_outside_projection_boundary() {
        let field = build(globe(), bundle(patch_grid()), true, CancelToken::new(), |_| {})
            .await
            .unwrap();
        assert!(!field.is_defined(0, 0));
        assert!(!field.is_inside_boundary(0, 0));
        assert_eq!(field.get(0, 0), FieldCell::Outside);
    }

    #[tokio::test]
    async fn test_cancelled_token_checked_on_resume() {
        let token = CancelToken::new();
        token.cancel();
        // A tiny build finishes inside one batch; cancellation is only
        // observed at batch boundaries, so completion is acceptable. Force
        // many batches with a big view to make the check bite.
        let big = Globe::new(
            ProjectionKind::Equirectangular,
            View::new(600, 600),
            Orientation::default(),
        );
        let result = build(big, bundle(patch_grid()), true, token, |_| {}).await;
        if let Err(err) = result {
            assert_eq!(err, BuildError::Cancelled);
        }
    }

    #[tokio::test]
    async fn test_release_drops_cells() {
        let mut field = build(globe(), bundle(patch_grid()), true, CancelToken::new(), |_| {})
            .await
            .unwrap();
        assert!(field.is_defined(30, 30));
        field.release();
        assert!(field.is_released());
        assert!(!field.is_defined(30, 30));
        assert!(!field.is_inside_boundary(30, 30));
    }

    #[tokio::test]
    async fn test_randomize_lands_on_visible_pixel() {
        let field = build(globe(), bundle(patch_grid()), true, CancelToken::new(), |_| {})
            .await
            .unwrap();
        let mut rng = rand::rng();
        for _ in 0..10 {
            let (lon, lat) = field.randomize(&mut rng);
            let g = globe();
            let (x, y) = g.project(lon, lat).expect("randomize returned far side");
            assert!(field.is_inside_boundary(x as usize, y as usize));
        }
    }

    #[tokio::test]
    async fn test_overlay_disabled_leaves_bitmap_clear() {
        let field = build(globe(), bundle(patch_grid()), false, CancelToken::new(), |_| {})
            .await
            .unwrap();
        assert_eq!(field.overlay().get(30, 30), Rgba::CLEAR);
        assert!(field.is_defined(30, 30));
    }
}
