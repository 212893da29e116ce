use chrono::{DateTime, Utc};

use crate::domain::globe::Globe;
use crate::domain::grid::Rgba;
use crate::domain::solar;
use crate::render::mask::Mask;
use crate::render::surface::PixelSurface;

/// Translucent shade painted over pixels where the sun is below the horizon.
pub const NIGHT_SHADE: Rgba = Rgba(0, 0, 10, 140);

/// Paints the day/night terminator for `instant` into `surface`.
///
/// Samples at a 2-pixel stride, writing 2x2 blocks, and only where the mask
/// marks the projection visible. The instant must be the real wall-clock
/// time; the overlay is always live, never tied to the displayed data's
/// validity time.
pub fn paint(globe: &Globe, mask: &Mask, instant: DateTime<Utc>, surface: &mut PixelSurface) {
    surface.clear();
    let view = mask.view();
    for y in (0..view.height).step_by(2) {
        for x in (0..view.width).step_by(2) {
            if !mask.is_visible(x, y) {
                continue;
            }
            let Some((lon, lat)) = globe.invert(x as f64, y as f64) else {
                continue;
            };
            if solar::elevation_deg(instant, lon, lat) <= 0.0 {
                surface.set(x, y, NIGHT_SHADE);
                surface.set(x + 1, y, NIGHT_SHADE);
                surface.set(x, y + 1, NIGHT_SHADE);
                surface.set(x + 1, y + 1, NIGHT_SHADE);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::globe::{Orientation, ProjectionKind, View};
    use chrono::TimeZone;

    #[test]
    fn test_terminator_splits_equirectangular_world() {
        // Equinox noon: day around lon 0, night around the antimeridian.
        let globe = Globe::new(
            ProjectionKind::Equirectangular,
            View::new(120, 60),
            Orientation::default(),
        );
        let mask = Mask::build(&globe);
        let mut surface = PixelSurface::new(globe.view());
        let noon = Utc.with_ymd_and_hms(2026, 3, 20, 12, 0, 0).unwrap();
        paint(&globe, &mask, noon, &mut surface);

        let (cx, cy) = (60, 30);
        assert_eq!(surface.get(cx, cy), Rgba::CLEAR);
        // Near the left edge (lon ~ -180) it is midnight.
        assert_eq!(surface.get(2, cy), NIGHT_SHADE);
    }

    #[test]
    fn test_shade_respects_mask() {
        let globe = Globe::new(
            ProjectionKind::Orthographic,
            View::new(60, 60),
            Orientation::default(),
        );
        let mask = Mask::build(&globe);
        let mut surface = PixelSurface::new(globe.view());
        let midnight = Utc.with_ymd_and_hms(2026, 3, 20, 0, 0, 0).unwrap();
        paint(&globe, &mask, midnight, &mut surface);
        // Off the disc nothing is painted, even though it is night there.
        assert_eq!(surface.get(0, 0), Rgba::CLEAR);
        // Center of the disc faces lon 0 at midnight: shaded.
        assert_eq!(surface.get(30, 30), NIGHT_SHADE);
    }
}
