use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};

/// 8-bit RGBA color. Alpha 0 is fully transparent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgba(pub u8, pub u8, pub u8, pub u8);

impl Rgba {
    pub const CLEAR: Rgba = Rgba(0, 0, 0, 0);
}

/// One interpolated value from a grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Vector { u: f64, v: f64, magnitude: f64 },
    Scalar(f64),
}

impl Sample {
    /// The scalar that drives a color overlay for this sample.
    #[must_use]
    pub fn scalar(&self) -> f64 {
        match *self {
            Sample::Vector { magnitude, .. } => magnitude,
            Sample::Scalar(v) => v,
        }
    }
}

/// Per-product tunables consumed by the particle animator and field builder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleTuning {
    /// Degrees of motion per frame per unit of wind.
    pub velocity_scale: f64,
    /// Upper bound used to bucket particles by intensity for coloring.
    pub max_intensity: f64,
}

/// Display unit with a linear conversion from the grid's native unit.
#[derive(Debug, Clone, Copy)]
pub struct Unit {
    pub label: &'static str,
    pub scale: f64,
    pub offset: f64,
    pub precision: usize,
}

impl Unit {
    #[must_use]
    pub fn format(&self, value: f64) -> String {
        format!(
            "{:.*} {}",
            self.precision,
            value * self.scale + self.offset,
            self.label
        )
    }
}

/// Piecewise-linear color gradient over a closed value range.
#[derive(Debug, Clone, Copy)]
pub struct ColorScale {
    pub bounds: (f64, f64),
    stops: &'static [(f64, (u8, u8, u8))],
}

impl ColorScale {
    #[must_use]
    pub const fn new(bounds: (f64, f64), stops: &'static [(f64, (u8, u8, u8))]) -> Self {
        Self { bounds, stops }
    }

    /// Color for `value`, clamped into the scale's bounds.
    #[must_use]
    pub fn gradient(&self, value: f64, alpha: u8) -> Rgba {
        let (lo, hi) = self.bounds;
        let t = ((value - lo) / (hi - lo)).clamp(0.0, 1.0);
        let mut prev = self.stops[0];
        for &stop in &self.stops[1..] {
            if t <= stop.0 {
                let span = (stop.0 - prev.0).max(1e-9);
                let f = (t - prev.0) / span;
                let lerp = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * f) as u8;
                return Rgba(
                    lerp(prev.1.0, stop.1.0),
                    lerp(prev.1.1, stop.1.1),
                    lerp(prev.1.2, stop.1.2),
                    alpha,
                );
            }
            prev = stop;
        }
        let (r, g, b) = prev.1;
        Rgba(r, g, b, alpha)
    }
}

/// One validity-time snapshot of an atmospheric field.
///
/// Implementations are immutable; time navigation returns the date of a
/// neighboring snapshot for the caller to load, never mutates in place.
pub trait Grid: fmt::Debug + Send + Sync {
    fn interpolate(&self, lon: f64, lat: f64) -> Option<Sample>;
    fn date(&self) -> DateTime<Utc>;
    fn particles(&self) -> ParticleTuning;
    fn gradient(&self, value: f64, alpha: u8) -> Rgba;
    fn units(&self) -> &[Unit];
    fn navigate(&self, step: i32) -> Option<DateTime<Utc>>;
    fn description(&self) -> String;
    fn source(&self) -> &'static str;
}

/// The (primary, overlay) pair driving one rendered frame. `overlay == None`
/// means the overlay reuses the primary grid's magnitude.
#[derive(Debug, Clone)]
pub struct GridBundle {
    pub primary: Arc<dyn Grid>,
    pub overlay: Option<Arc<dyn Grid>>,
}

impl GridBundle {
    #[must_use]
    pub fn overlay_grid(&self) -> &Arc<dyn Grid> {
        self.overlay.as_ref().unwrap_or(&self.primary)
    }

    /// True when the overlay is a distinct product that must be re-sampled.
    #[must_use]
    pub fn overlay_is_distinct(&self) -> bool {
        match &self.overlay {
            Some(overlay) => !Arc::ptr_eq(overlay, &self.primary),
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
enum GridValues {
    Vector(Vec<Option<[f32; 2]>>),
    Scalar(Vec<Option<f32>>),
}

/// Regular lon/lat grid with bilinear interpolation, optionally wrapping in
/// longitude. Cells with any missing corner interpolate to `None`.
#[derive(Debug, Clone)]
pub struct ProductGrid {
    description: String,
    source: &'static str,
    units: &'static [Unit],
    scale: ColorScale,
    tuning: ParticleTuning,
    date: DateTime<Utc>,
    step_hours: i64,
    lon0: f64,
    lat0: f64,
    dlon: f64,
    dlat: f64,
    nx: usize,
    ny: usize,
    wrap_lon: bool,
    values: GridValues,
}

impl ProductGrid {
    #[allow(clippy::too_many_arguments)]
    fn new(
        description: String,
        source: &'static str,
        units: &'static [Unit],
        scale: ColorScale,
        tuning: ParticleTuning,
        date: DateTime<Utc>,
        geometry: GridGeometry,
        values: GridValues,
    ) -> Self {
        Self {
            description,
            source,
            units,
            scale,
            tuning,
            date,
            step_hours: 3,
            lon0: geometry.lon0,
            lat0: geometry.lat0,
            dlon: geometry.dlon,
            dlat: geometry.dlat,
            nx: geometry.nx,
            ny: geometry.ny,
            wrap_lon: geometry.wrap_lon,
            values,
        }
    }

    /// Builds a vector grid from row-major `(u, v)` cells, south row first.
    #[must_use]
    pub fn from_vectors(
        description: impl Into<String>,
        geometry: GridGeometry,
        date: DateTime<Utc>,
        tuning: ParticleTuning,
        data: Vec<Option<[f32; 2]>>,
    ) -> Self {
        debug_assert_eq!(data.len(), geometry.nx * geometry.ny);
        Self::new(
            description.into(),
            "demo",
            WIND_UNITS,
            WIND_SCALE,
            tuning,
            date,
            geometry,
            GridValues::Vector(data),
        )
    }

    /// Builds a scalar grid from row-major cells, south row first.
    #[must_use]
    pub fn from_scalars(
        description: impl Into<String>,
        geometry: GridGeometry,
        date: DateTime<Utc>,
        scale: ColorScale,
        units: &'static [Unit],
        data: Vec<Option<f32>>,
    ) -> Self {
        debug_assert_eq!(data.len(), geometry.nx * geometry.ny);
        Self::new(
            description.into(),
            "demo",
            units,
            scale,
            ParticleTuning {
                velocity_scale: 0.0,
                max_intensity: scale.bounds.1,
            },
            date,
            geometry,
            GridValues::Scalar(data),
        )
    }

    fn cell(&self, ix: usize, iy: usize) -> Option<Sample> {
        let idx = iy * self.nx + ix;
        match &self.values {
            GridValues::Vector(cells) => cells.get(idx).copied().flatten().map(|[u, v]| {
                let (u, v) = (f64::from(u), f64::from(v));
                Sample::Vector {
                    u,
                    v,
                    magnitude: u.hypot(v),
                }
            }),
            GridValues::Scalar(cells) => cells
                .get(idx)
                .copied()
                .flatten()
                .map(|v| Sample::Scalar(f64::from(v))),
        }
    }

    fn raw(&self, ix: usize, iy: usize) -> Option<[f64; 2]> {
        let idx = iy * self.nx + ix;
        match &self.values {
            GridValues::Vector(cells) => cells
                .get(idx)
                .copied()
                .flatten()
                .map(|[u, v]| [f64::from(u), f64::from(v)]),
            GridValues::Scalar(cells) => {
                cells.get(idx).copied().flatten().map(|v| [f64::from(v), 0.0])
            }
        }
    }
}

/// Geometry of a regular lon/lat grid; `lat0` is the southernmost row.
#[derive(Debug, Clone, Copy)]
pub struct GridGeometry {
    pub lon0: f64,
    pub lat0: f64,
    pub dlon: f64,
    pub dlat: f64,
    pub nx: usize,
    pub ny: usize,
    pub wrap_lon: bool,
}

impl Grid for ProductGrid {
    fn interpolate(&self, lon: f64, lat: f64) -> Option<Sample> {
        let fy = (lat - self.lat0) / self.dlat;
        if fy < 0.0 || fy > (self.ny - 1) as f64 {
            return None;
        }
        let mut fx = (lon - self.lon0) / self.dlon;
        if self.wrap_lon {
            fx = fx.rem_euclid(self.nx as f64);
        } else if fx < 0.0 || fx > (self.nx - 1) as f64 {
            return None;
        }

        let ix0 = fx.floor() as usize % self.nx;
        let ix1 = if self.wrap_lon {
            (ix0 + 1) % self.nx
        } else {
            (ix0 + 1).min(self.nx - 1)
        };
        let iy0 = (fy.floor() as usize).min(self.ny - 1);
        let iy1 = (iy0 + 1).min(self.ny - 1);
        let tx = fx - fx.floor();
        let ty = fy - fy.floor();

        let g00 = self.raw(ix0, iy0)?;
        let g10 = self.raw(ix1, iy0)?;
        let g01 = self.raw(ix0, iy1)?;
        let g11 = self.raw(ix1, iy1)?;

        let lerp2 = |k: usize| {
            let a = g00[k] * (1.0 - tx) + g10[k] * tx;
            let b = g01[k] * (1.0 - tx) + g11[k] * tx;
            a * (1.0 - ty) + b * ty
        };

        match self.values {
            GridValues::Vector(_) => {
                let (u, v) = (lerp2(0), lerp2(1));
                Some(Sample::Vector {
                    u,
                    v,
                    magnitude: u.hypot(v),
                })
            }
            GridValues::Scalar(_) => Some(Sample::Scalar(lerp2(0))),
        }
    }

    fn date(&self) -> DateTime<Utc> {
        self.date
    }

    fn particles(&self) -> ParticleTuning {
        self.tuning
    }

    fn gradient(&self, value: f64, alpha: u8) -> Rgba {
        self.scale.gradient(value, alpha)
    }

    fn units(&self) -> &[Unit] {
        self.units
    }

    fn navigate(&self, step: i32) -> Option<DateTime<Utc>> {
        if step == 0 {
            return None;
        }
        Some(self.date + Duration::hours(self.step_hours * i64::from(step)))
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn source(&self) -> &'static str {
        self.source
    }
}

pub const WIND_UNITS: &[Unit] = &[
    Unit {
        label: "m/s",
        scale: 1.0,
        offset: 0.0,
        precision: 1,
    },
    Unit {
        label: "km/h",
        scale: 3.6,
        offset: 0.0,
        precision: 0,
    },
    Unit {
        label: "kn",
        scale: 1.943_844,
        offset: 0.0,
        precision: 0,
    },
];

pub const TEMP_UNITS: &[Unit] = &[
    Unit {
        label: "°C",
        scale: 1.0,
        offset: 0.0,
        precision: 1,
    },
    Unit {
        label: "°F",
        scale: 1.8,
        offset: 32.0,
        precision: 1,
    },
    Unit {
        label: "K",
        scale: 1.0,
        offset: 273.15,
        precision: 1,
    },
];

const WIND_STOPS: &[(f64, (u8, u8, u8))] = &[
    (0.0, (98, 113, 183)),
    (0.15, (57, 97, 159)),
    (0.3, (74, 148, 169)),
    (0.45, (77, 141, 123)),
    (0.6, (83, 165, 83)),
    (0.7, (153, 157, 70)),
    (0.8, (183, 116, 68)),
    (0.9, (173, 74, 74)),
    (1.0, (241, 254, 255)),
];

const TEMP_STOPS: &[(f64, (u8, u8, u8))] = &[
    (0.0, (37, 4, 42)),
    (0.2, (41, 10, 130)),
    (0.35, (81, 40, 40)),
    (0.5, (192, 37, 149)),
    (0.65, (70, 215, 215)),
    (0.8, (21, 84, 187)),
    (0.9, (24, 132, 14)),
    (1.0, (247, 251, 59)),
];

pub const WIND_SCALE: ColorScale = ColorScale::new((0.0, 40.0), WIND_STOPS);
pub const TEMP_SCALE: ColorScale = ColorScale::new((-40.0, 45.0), TEMP_STOPS);

const DEMO_NX: usize = 144;
const DEMO_NY: usize = 73;

const DEMO_GEOMETRY: GridGeometry = GridGeometry {
    lon0: -180.0,
    lat0: -90.0,
    dlon: 2.5,
    dlat: 2.5,
    nx: DEMO_NX,
    ny: DEMO_NY,
    wrap_lon: true,
};

/// Synthetic global wind product: zonal jets plus traveling vortices, phased
/// by the validity hour so time navigation visibly changes the flow.
#[must_use]
pub fn demo_wind(date: DateTime<Utc>) -> Arc<dyn Grid> {
    let phase = f64::from(date.hour()) * 15.0;
    let mut data = Vec::with_capacity(DEMO_NX * DEMO_NY);
    for iy in 0..DEMO_NY {
        let lat = DEMO_GEOMETRY.lat0 + DEMO_GEOMETRY.dlat * iy as f64;
        for ix in 0..DEMO_NX {
            let lon = DEMO_GEOMETRY.lon0 + DEMO_GEOMETRY.dlon * ix as f64;
            let jets = 14.0 * (3.0 * lat.to_radians()).cos();
            let wave = (2.0 * (lon + phase).to_radians()).sin();
            let u = jets + 6.0 * wave * lat.to_radians().cos();
            let v = 7.0 * (3.0 * (lon + phase).to_radians()).cos() * (2.0 * lat.to_radians()).sin();
            data.push(Some([u as f32, v as f32]));
        }
    }
    Arc::new(ProductGrid::from_vectors(
        "Wind @ surface (demo)",
        DEMO_GEOMETRY,
        date,
        ParticleTuning {
            velocity_scale: 1.0 / 80.0,
            max_intensity: 25.0,
        },
        data,
    ))
}

/// Synthetic global temperature product with a latitudinal gradient and a
/// diurnal bulge following the subsolar longitude.
#[must_use]
pub fn demo_temp(date: DateTime<Utc>) -> Arc<dyn Grid> {
    let subsolar_lon = (12.0 - f64::from(date.hour())) * 15.0;
    let mut data = Vec::with_capacity(DEMO_NX * DEMO_NY);
    for iy in 0..DEMO_NY {
        let lat = DEMO_GEOMETRY.lat0 + DEMO_GEOMETRY.dlat * iy as f64;
        for ix in 0..DEMO_NX {
            let lon = DEMO_GEOMETRY.lon0 + DEMO_GEOMETRY.dlon * ix as f64;
            let base = 30.0 * lat.to_radians().cos() - 12.0;
            let diurnal = 8.0 * (lon - subsolar_lon).to_radians().cos() * lat.to_radians().cos();
            data.push(Some((base + diurnal) as f32));
        }
    }
    Arc::new(ProductGrid::from_scalars(
        "Temp @ surface (demo)",
        DEMO_GEOMETRY,
        date,
        TEMP_SCALE,
        TEMP_UNITS,
        data,
    ))
}
