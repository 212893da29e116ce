use rand::Rng;

use crate::domain::globe::{Globe, View, great_circle_deg};
use crate::domain::grid::{Grid, Rgba, Sample};
use crate::render::surface::PixelSurface;

/// Samples kept per particle trail.
pub const TRAIL_LENGTH: usize = 12;
/// Hard per-frame clamps on geographic motion. They stop meridian
/// convergence from exploding longitude steps near the poles and keep a bad
/// sample from painting a streak across the map.
pub const MAX_STEP_LON_DEG: f64 = 2.0;
pub const MAX_STEP_LAT_DEG: f64 = 1.0;
/// Particles never leave this latitude band.
pub const MAX_LAT_DEG: f64 = 85.0;

/// Transient misses tolerated before a particle is respawned.
const MISS_TOLERANCE: u8 = 3;
/// Random picks attempted when looking for a defined respawn location.
const RESPAWN_TRIES: usize = 30;
/// Nominal particle lifetime in frames; each particle gets a jittered
/// maximum up to 2.5x this so respawns stay staggered.
const NOMINAL_LIFETIME: u16 = 100;
const INTENSITY_BUCKETS: usize = 10;
/// A projected jump longer than this fraction of the larger viewport
/// dimension breaks the drawn path (seams, dateline, face boundaries).
const MAX_JUMP_FRAC: f64 = 0.25;
/// Margin inside the clip angle when suppressing far-hemisphere points.
const FAR_SIDE_EPS_DEG: f64 = 0.25;
const PARTICLE_ALPHA: u8 = 230;

/// One clamped advection step from wind components at `lat`, in degrees.
/// Longitude is corrected for meridian convergence.
#[must_use]
pub fn step_deltas(u: f64, v: f64, lat: f64, velocity_scale: f64) -> (f64, f64) {
    let coslat = lat
        .clamp(-MAX_LAT_DEG, MAX_LAT_DEG)
        .to_radians()
        .cos()
        .abs()
        .max(0.01);
    let dlon = (u * velocity_scale / coslat).clamp(-MAX_STEP_LON_DEG, MAX_STEP_LON_DEG);
    let dlat = (v * velocity_scale).clamp(-MAX_STEP_LAT_DEG, MAX_STEP_LAT_DEG);
    (dlon, dlat)
}

fn bucket_for(magnitude: f64, max_intensity: f64) -> u8 {
    let t = (magnitude / max_intensity.max(1e-9)).clamp(0.0, 1.0);
    ((t * (INTENSITY_BUCKETS - 1) as f64).round() as usize).min(INTENSITY_BUCKETS - 1) as u8
}

/// Fixed-size particle population advected through geographic space.
///
/// Struct-of-arrays layout: positions, ages, miss counters and ring-buffer
/// trails live in flat typed arrays owned exclusively by the animator's
/// frame loop. Particles are never created or destroyed after startup; a
/// "respawn" overwrites the slot in place.
#[derive(Debug)]
pub struct ParticleAnimator {
    count: usize,
    lon: Vec<f32>,
    lat: Vec<f32>,
    age: Vec<u16>,
    max_age: Vec<u16>,
    misses: Vec<u8>,
    bucket: Vec<u8>,
    trail_lon: Vec<f32>,
    trail_lat: Vec<f32>,
    trail_head: Vec<u8>,
    trail_size: Vec<u8>,
}

impl ParticleAnimator {
    #[must_use]
    pub fn new(view: View) -> Self {
        let count = (view.width * view.height / 300).clamp(64, 4000);
        Self {
            count,
            lon: vec![0.0; count],
            lat: vec![0.0; count],
            // Born overripe so the first evolve scatters everyone.
            age: vec![u16::MAX; count],
            max_age: vec![0; count],
            misses: vec![0; count],
            bucket: vec![0; count],
            trail_lon: vec![0.0; count * TRAIL_LENGTH],
            trail_lat: vec![0.0; count * TRAIL_LENGTH],
            trail_head: vec![0; count],
            trail_size: vec![0; count],
        }
    }

    #[must_use]
    pub fn population(&self) -> usize {
        self.count
    }

    pub fn resize(&mut self, view: View) {
        *self = Self::new(view);
    }

    #[must_use]
    pub fn position(&self, i: usize) -> (f64, f64) {
        (f64::from(self.lon[i]), f64::from(self.lat[i]))
    }

    #[must_use]
    pub fn age_of(&self, i: usize) -> u16 {
        self.age[i]
    }

    #[must_use]
    pub fn trail_len(&self, i: usize) -> usize {
        usize::from(self.trail_size[i])
    }

    /// Trail samples oldest→newest.
    #[must_use]
    pub fn trail(&self, i: usize) -> Vec<(f32, f32)> {
        let size = usize::from(self.trail_size[i]);
        let head = usize::from(self.trail_head[i]);
        let start = (head + TRAIL_LENGTH - size) % TRAIL_LENGTH;
        (0..size)
            .map(|k| {
                let idx = i * TRAIL_LENGTH + (start + k) % TRAIL_LENGTH;
                (self.trail_lon[idx], self.trail_lat[idx])
            })
            .collect()
    }

    /// Places particle `i` at (lon, lat) with a fresh age, miss count and a
    /// one-sample trail.
    pub fn seed(&mut self, i: usize, lon: f64, lat: f64) {
        self.lon[i] = lon as f32;
        self.lat[i] = lat.clamp(-MAX_LAT_DEG, MAX_LAT_DEG) as f32;
        self.age[i] = 0;
        self.max_age[i] = NOMINAL_LIFETIME;
        self.misses[i] = 0;
        self.trail_head[i] = 0;
        self.trail_size[i] = 0;
        self.push_trail(i, f64::from(self.lon[i]), f64::from(self.lat[i]));
    }

    fn push_trail(&mut self, i: usize, lon: f64, lat: f64) {
        let head = usize::from(self.trail_head[i]);
        let idx = i * TRAIL_LENGTH + head;
        self.trail_lon[idx] = lon as f32;
        self.trail_lat[idx] = lat as f32;
        self.trail_head[i] = ((head + 1) % TRAIL_LENGTH) as u8;
        self.trail_size[i] = (usize::from(self.trail_size[i]) + 1).min(TRAIL_LENGTH) as u8;
    }

    fn respawn<R: Rng + ?Sized>(&mut self, i: usize, grid: &dyn Grid, rng: &mut R) {
        for _ in 0..RESPAWN_TRIES {
            let lon = rng.random_range(-180.0..180.0);
            let lat = rng.random_range(-MAX_LAT_DEG..MAX_LAT_DEG);
            if matches!(grid.interpolate(lon, lat), Some(Sample::Vector { .. })) {
                self.seed(i, lon, lat);
                self.max_age[i] =
                    NOMINAL_LIFETIME + rng.random_range(0..=NOMINAL_LIFETIME * 3 / 2);
                return;
            }
        }
        self.seed(i, 0.0, 0.0);
    }

    /// Advances every particle by one frame: respawn the overripe, advect
    /// the rest with a midpoint (RK2) step, record trails and intensity
    /// buckets.
    pub fn evolve<R: Rng + ?Sized>(&mut self, grid: &dyn Grid, rng: &mut R) {
        let tuning = grid.particles();
        let vs = tuning.velocity_scale;

        for i in 0..self.count {
            if self.age[i] >= self.max_age[i] {
                self.respawn(i, grid, rng);
            }

            let (lon, lat) = self.position(i);
            let w1 = match grid.interpolate(lon, lat) {
                Some(Sample::Vector { u, v, .. }) => Some((u, v)),
                _ => None,
            };

            let Some((u1, v1)) = w1 else {
                self.note_miss(i, grid, rng);
                self.age[i] = self.age[i].saturating_add(1);
                continue;
            };

            let (step_lon, step_lat) = step_deltas(u1, v1, lat, vs);
            let mid_lon = lon + step_lon * 0.5;
            let mid_lat = (lat + step_lat * 0.5).clamp(-MAX_LAT_DEG, MAX_LAT_DEG);

            let w2 = match grid.interpolate(mid_lon, mid_lat) {
                Some(Sample::Vector { u, v, .. }) => Some((u, v)),
                _ => None,
            };

            let Some((u2, v2)) = w2 else {
                self.note_miss(i, grid, rng);
                self.age[i] = self.age[i].saturating_add(1);
                continue;
            };

            let (dlon, dlat) = step_deltas(u2, v2, mid_lat, vs);
            // Longitude stays continuous and unbounded; wrapping would tear
            // trails at the dateline.
            let new_lon = lon + dlon;
            let new_lat = (lat + dlat).clamp(-MAX_LAT_DEG, MAX_LAT_DEG);
            self.lon[i] = new_lon as f32;
            self.lat[i] = new_lat as f32;
            self.misses[i] = 0;
            self.push_trail(i, new_lon, new_lat);
            self.bucket[i] = bucket_for(u2.hypot(v2), tuning.max_intensity);
            self.age[i] = self.age[i].saturating_add(1);
        }
    }

    fn note_miss<R: Rng + ?Sized>(&mut self, i: usize, grid: &dyn Grid, rng: &mut R) {
        self.misses[i] = self.misses[i].saturating_add(1);
        if self.misses[i] > MISS_TOLERANCE {
            self.respawn(i, grid, rng);
        }
    }

    /// Draws every trail through `globe` onto `surface`, grouped by
    /// intensity bucket. The caller passes a projection snapshot taken at
    /// the start of the tick so evolve and draw agree even while rotation
    /// is advancing.
    pub fn draw(&self, globe: &Globe, grid: &dyn Grid, surface: &mut PixelSurface) {
        // Trails are anchored in geography, not on screen; stale pixels
        // must not survive a projection change.
        surface.clear();
        let view = surface.view();
        let max_jump = MAX_JUMP_FRAC * view.width.max(view.height) as f64;
        let tuning = grid.particles();
        let clip = globe.clip_angle();
        let (center_lon, center_lat) = globe.center();

        let colors: Vec<Rgba> = (0..INTENSITY_BUCKETS)
            .map(|b| {
                let value =
                    (b as f64 + 0.5) / INTENSITY_BUCKETS as f64 * tuning.max_intensity;
                grid.gradient(value, PARTICLE_ALPHA)
            })
            .collect();

        for bucket in 0..INTENSITY_BUCKETS as u8 {
            let color = colors[usize::from(bucket)];
            for i in (0..self.count).filter(|&i| self.bucket[i] == bucket) {
                let mut prev: Option<(f64, f64)> = None;
                for (lon, lat) in self.trail(i) {
                    let (lon, lat) = (f64::from(lon), f64::from(lat));
                    if let Some(clip_deg) = clip {
                        let dist = great_circle_deg(lon, lat, center_lon, center_lat);
                        if dist > clip_deg - FAR_SIDE_EPS_DEG {
                            prev = None;
                            continue;
                        }
                    }
                    match globe.project(lon, lat) {
                        Some((x, y))
                            if x.is_finite()
                                && y.is_finite()
                                && x >= 0.0
                                && y >= 0.0
                                && x < view.width as f64
                                && y < view.height as f64 =>
                        {
                            if let Some((px, py)) = prev {
                                if (x - px).hypot(y - py) <= max_jump {
                                    surface.stroke_line(px, py, x, y, color);
                                }
                            }
                            prev = Some((x, y));
                        }
                        _ => prev = None,
                    }
                }
            }
        }
    }
}
