//! Coastline and lake geometry from the embedded world outline resource.
//!
//! The rings are deliberately low-resolution; they only give the globe a
//! recognizable silhouette behind the field overlay. High detail densifies
//! each segment so projected arcs stay smooth when zoomed in.

use anyhow::{Context, Result};
use serde::Deserialize;

static WORLD_OUTLINE: &str = include_str!("../../assets/world-outline.json");

/// Level of detail, selected by terminal size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detail {
    Low,
    High,
}

#[derive(Debug, Deserialize)]
struct MapResource {
    coastlines: Vec<Vec<(f64, f64)>>,
    lakes: Vec<Vec<(f64, f64)>>,
}

/// Static map geometry, loaded once per topology resource.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub coastlines: Vec<Vec<(f64, f64)>>,
    pub lakes: Vec<Vec<(f64, f64)>>,
}

impl Mesh {
    pub fn load(detail: Detail) -> Result<Self> {
        let resource: MapResource =
            serde_json::from_str(WORLD_OUTLINE).context("malformed world outline resource")?;
        let subdivisions = match detail {
            Detail::Low => 1,
            Detail::High => 4,
        };
        Ok(Self {
            coastlines: resource
                .coastlines
                .iter()
                .map(|ring| densify(ring, subdivisions))
                .collect(),
            lakes: resource
                .lakes
                .iter()
                .map(|ring| densify(ring, subdivisions))
                .collect(),
        })
    }
}

fn densify(ring: &[(f64, f64)], subdivisions: usize) -> Vec<(f64, f64)> {
    if subdivisions <= 1 || ring.len() < 2 {
        return ring.to_vec();
    }
    let mut out = Vec::with_capacity(ring.len() * subdivisions);
    for pair in ring.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        for step in 0..subdivisions {
            let t = step as f64 / subdivisions as f64;
            out.push((a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t));
        }
    }
    out.push(*ring.last().unwrap_or(&ring[0]));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_has_all_rings() {
        let mesh = Mesh::load(Detail::Low).unwrap();
        assert_eq!(mesh.coastlines.len(), 7);
        assert_eq!(mesh.lakes.len(), 3);
    }

    #[test]
    fn test_high_detail_densifies() {
        let low = Mesh::load(Detail::Low).unwrap();
        let high = Mesh::load(Detail::High).unwrap();
        for (a, b) in low.coastlines.iter().zip(&high.coastlines) {
            assert!(b.len() > a.len());
        }
    }

    #[test]
    fn test_coordinates_in_range() {
        let mesh = Mesh::load(Detail::High).unwrap();
        for ring in mesh.coastlines.iter().chain(&mesh.lakes) {
            for &(lon, lat) in ring {
                assert!((-180.0..=180.0).contains(&lon));
                assert!((-90.0..=90.0).contains(&lat));
            }
        }
    }
}
