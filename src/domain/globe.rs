use std::f64::consts::PI;

/// Pixel dimensions of the render raster (terminal cells doubled vertically).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct View {
    pub width: usize,
    pub height: usize,
}

impl View {
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }
}

/// Inclusive pixel rectangle the projection can touch, clipped to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pixels {
    pub x_min: usize,
    pub y_min: usize,
    pub x_max: usize,
    pub y_max: usize,
}

impl Pixels {
    #[must_use]
    pub fn width(&self) -> usize {
        self.x_max.saturating_sub(self.x_min) + 1
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.y_max.saturating_sub(self.y_min) + 1
    }
}

/// View orientation: geographic center plus zoom multiplier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    pub lon: f64,
    pub lat: f64,
    pub zoom: f64,
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            lon: 0.0,
            lat: 0.0,
            zoom: 1.0,
        }
    }
}

pub const MIN_ZOOM: f64 = 0.4;
pub const MAX_ZOOM: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionKind {
    Orthographic,
    Equirectangular,
}

pub const PROJECTION_NAMES: &[&str] = &["orthographic", "equirectangular"];

impl ProjectionKind {
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "orthographic" => Some(Self::Orthographic),
            "equirectangular" => Some(Self::Equirectangular),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Orthographic => "orthographic",
            Self::Equirectangular => "equirectangular",
        }
    }

    #[must_use]
    pub fn cycle(self) -> Self {
        match self {
            Self::Orthographic => Self::Equirectangular,
            Self::Equirectangular => Self::Orthographic,
        }
    }
}

/// Geographic↔screen mapping for one projection over one view.
///
/// The orientation is the only externally mutable state; every mutation bumps
/// `generation` so cached per-projection artifacts (visibility masks) know to
/// rebuild.
#[derive(Debug, Clone)]
pub struct Globe {
    kind: ProjectionKind,
    view: View,
    orientation: Orientation,
    generation: u64,
}

impl Globe {
    #[must_use]
    pub fn new(kind: ProjectionKind, view: View, orientation: Orientation) -> Self {
        let mut globe = Self {
            kind,
            view,
            orientation: Orientation {
                zoom: orientation.zoom.clamp(MIN_ZOOM, MAX_ZOOM),
                ..orientation
            },
            generation: 0,
        };
        globe.orientation.lon = normalize_lon(globe.orientation.lon);
        globe.orientation.lat = globe.orientation.lat.clamp(-90.0, 90.0);
        globe
    }

    #[must_use]
    pub fn kind(&self) -> ProjectionKind {
        self.kind
    }

    #[must_use]
    pub fn view(&self) -> View {
        self.view
    }

    #[must_use]
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Geographic center the projection is currently aimed at.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (self.orientation.lon, self.orientation.lat)
    }

    /// Angular radius of the visible cap, if the projection clips one.
    #[must_use]
    pub fn clip_angle(&self) -> Option<f64> {
        match self.kind {
            ProjectionKind::Orthographic => Some(90.0),
            ProjectionKind::Equirectangular => None,
        }
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = Orientation {
            lon: normalize_lon(orientation.lon),
            lat: orientation.lat.clamp(-90.0, 90.0),
            zoom: orientation.zoom.clamp(MIN_ZOOM, MAX_ZOOM),
        };
        self.generation += 1;
    }

    pub fn rotate_by(&mut self, dlon: f64, dlat: f64) {
        let mut next = self.orientation;
        next.lon += dlon;
        next.lat += dlat;
        self.set_orientation(next);
    }

    pub fn zoom_by(&mut self, factor: f64) {
        let mut next = self.orientation;
        next.zoom *= factor;
        self.set_orientation(next);
    }

    /// Degrees of rotation produced by a one-pixel drag at the current zoom.
    #[must_use]
    pub fn degrees_per_pixel(&self) -> f64 {
        match self.kind {
            ProjectionKind::Orthographic => 90.0 / self.radius_px(),
            ProjectionKind::Equirectangular => (1.0 / self.scale_px()).to_degrees(),
        }
    }

    fn radius_px(&self) -> f64 {
        0.4 * self.view.width.min(self.view.height) as f64 * self.orientation.zoom
    }

    fn scale_px(&self) -> f64 {
        // Pixels per radian; a zoom of 1 fits one full world width.
        self.orientation.zoom * self.view.width as f64 / (2.0 * PI)
    }

    fn center_px(&self) -> (f64, f64) {
        (
            self.view.width as f64 / 2.0,
            self.view.height as f64 / 2.0,
        )
    }

    /// Forward projection. `None` when the point is on the far hemisphere or
    /// outside the single world copy.
    #[must_use]
    pub fn project(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        let (cx, cy) = self.center_px();
        match self.kind {
            ProjectionKind::Orthographic => {
                let lam = normalize_lon(lon - self.orientation.lon).to_radians();
                let phi = lat.to_radians();
                let phi0 = self.orientation.lat.to_radians();
                let cos_c = phi0.sin() * phi.sin() + phi0.cos() * phi.cos() * lam.cos();
                if cos_c < 0.0 {
                    return None;
                }
                let r = self.radius_px();
                let x = cx + r * phi.cos() * lam.sin();
                let y = cy - r * (phi0.cos() * phi.sin() - phi0.sin() * phi.cos() * lam.cos());
                Some((x, y))
            }
            ProjectionKind::Equirectangular => {
                if !(-90.0..=90.0).contains(&lat) {
                    return None;
                }
                let s = self.scale_px();
                let lam = normalize_lon(lon - self.orientation.lon).to_radians();
                let x = cx + lam * s;
                let y = cy - (lat - self.orientation.lat).to_radians() * s;
                Some((x, y))
            }
        }
    }

    /// Inverse projection. `None` off the globe disc / outside the map band.
    #[must_use]
    pub fn invert(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let (cx, cy) = self.center_px();
        match self.kind {
            ProjectionKind::Orthographic => {
                let r = self.radius_px();
                let dx = (x - cx) / r;
                let dy = (cy - y) / r;
                let rho = dx.hypot(dy);
                if rho > 1.0 {
                    return None;
                }
                let phi0 = self.orientation.lat.to_radians();
                if rho < 1e-12 {
                    return Some((self.orientation.lon, self.orientation.lat));
                }
                let c = rho.asin();
                let (sin_c, cos_c) = c.sin_cos();
                let phi = (cos_c * phi0.sin() + dy * sin_c * phi0.cos() / rho).asin();
                let lam = (dx * sin_c).atan2(rho * cos_c * phi0.cos() - dy * sin_c * phi0.sin());
                Some((
                    normalize_lon(self.orientation.lon + lam.to_degrees()),
                    phi.to_degrees(),
                ))
            }
            ProjectionKind::Equirectangular => {
                let s = self.scale_px();
                let lam = (x - cx) / s;
                if lam.abs() > PI {
                    return None;
                }
                let lat = self.orientation.lat + ((cy - y) / s).to_degrees();
                if !(-90.0..=90.0).contains(&lat) {
                    return None;
                }
                Some((normalize_lon(self.orientation.lon + lam.to_degrees()), lat))
            }
        }
    }

    /// Fast per-pixel visibility predicate used to build masks.
    #[must_use]
    pub fn visible(&self, x: f64, y: f64) -> bool {
        let (cx, cy) = self.center_px();
        match self.kind {
            ProjectionKind::Orthographic => {
                let r = self.radius_px();
                let dx = (x - cx) / r;
                let dy = (y - cy) / r;
                dx * dx + dy * dy <= 1.0
            }
            ProjectionKind::Equirectangular => {
                let s = self.scale_px();
                if ((x - cx) / s).abs() > PI {
                    return false;
                }
                let lat = self.orientation.lat + ((cy - y) / s).to_degrees();
                (-90.0..=90.0).contains(&lat)
            }
        }
    }

    /// Bounding pixel rectangle of the visible area, clipped to the view.
    #[must_use]
    pub fn bounds(&self) -> Pixels {
        let (cx, cy) = self.center_px();
        let (x0, y0, x1, y1) = match self.kind {
            ProjectionKind::Orthographic => {
                let r = self.radius_px();
                (cx - r, cy - r, cx + r, cy + r)
            }
            ProjectionKind::Equirectangular => {
                let s = self.scale_px();
                let half_w = PI * s;
                let top = cy - (90.0 - self.orientation.lat).to_radians() * s;
                let bottom = cy + (90.0 + self.orientation.lat).to_radians() * s;
                (cx - half_w, top, cx + half_w, bottom)
            }
        };
        let clamp_x = |v: f64| (v.max(0.0) as usize).min(self.view.width.saturating_sub(1));
        let clamp_y = |v: f64| (v.max(0.0) as usize).min(self.view.height.saturating_sub(1));
        Pixels {
            x_min: clamp_x(x0.floor()),
            y_min: clamp_y(y0.floor()),
            x_max: clamp_x(x1.ceil()),
            y_max: clamp_y(y1.ceil()),
        }
    }

    /// Local Jacobian of the projection at (lon, lat), by finite differences:
    /// `[dx/dlon, dy/dlon, dx/dlat, dy/dlat]` in pixels per degree. Converts
    /// geographic wind components into a screen-space displacement direction.
    #[must_use]
    pub fn distortion(&self, lon: f64, lat: f64) -> Option<[f64; 4]> {
        const H: f64 = 5e-2;
        let (x, y) = self.project(lon, lat)?;
        let (xl, yl) = self.project(lon + H, lat)?;
        let (xp, yp) = self.project(lon, lat + H)?;
        Some([(xl - x) / H, (yl - y) / H, (xp - x) / H, (yp - y) / H])
    }
}

/// Wraps a longitude into [-180, 180).
#[must_use]
pub fn normalize_lon(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Great-circle distance between two points, in degrees of arc.
#[must_use]
pub fn great_circle_deg(lon_a: f64, lat_a: f64, lon_b: f64, lat_b: f64) -> f64 {
    let (la, fa) = (lon_a.to_radians(), lat_a.to_radians());
    let (lb, fb) = (lon_b.to_radians(), lat_b.to_radians());
    let cos_d = fa.sin() * fb.sin() + fa.cos() * fb.cos() * (la - lb).cos();
    cos_d.clamp(-1.0, 1.0).acos().to_degrees()
}
