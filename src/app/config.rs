use std::collections::HashSet;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::globe::{Orientation, ProjectionKind};

/// Which validity time the displayed grid should come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSelection {
    /// Most recent available snapshot.
    Current,
    Archived(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    Wind,
}

impl Parameter {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Wind => "wind",
        }
    }
}

/// Surface class plus level, expressed the way the token spells them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Surface,
    Isobaric1000,
    Isobaric850,
    Isobaric500,
    Isobaric250,
}

impl Level {
    #[must_use]
    pub fn surface_name(self) -> &'static str {
        match self {
            Self::Surface => "surface",
            _ => "isobaric",
        }
    }

    #[must_use]
    pub fn level_name(self) -> &'static str {
        match self {
            Self::Surface => "level",
            Self::Isobaric1000 => "1000hPa",
            Self::Isobaric850 => "850hPa",
            Self::Isobaric500 => "500hPa",
            Self::Isobaric250 => "250hPa",
        }
    }

    fn parse(surface: &str, level: &str) -> Option<Self> {
        match (surface, level) {
            ("surface", "level") => Some(Self::Surface),
            ("isobaric", "1000hPa") => Some(Self::Isobaric1000),
            ("isobaric", "850hPa") => Some(Self::Isobaric850),
            ("isobaric", "500hPa") => Some(Self::Isobaric500),
            ("isobaric", "250hPa") => Some(Self::Isobaric250),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayType {
    /// Color by the primary parameter's own magnitude.
    #[default]
    Default,
    Off,
    Wind,
    Temp,
}

impl OverlayType {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Off => "off",
            Self::Wind => "wind",
            Self::Temp => "temp",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "default" => Some(Self::Default),
            "off" => Some(Self::Off),
            "wind" => Some(Self::Wind),
            "temp" => Some(Self::Temp),
            _ => None,
        }
    }

    #[must_use]
    pub fn cycle(self) -> Self {
        match self {
            Self::Default => Self::Temp,
            Self::Temp => Self::Off,
            Self::Off => Self::Default,
            Self::Wind => Self::Default,
        }
    }
}

/// Named attributes whose changes downstream agents key off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attr {
    Date,
    Param,
    Level,
    Overlay,
    Projection,
    Orientation,
    ShowAnimation,
    ShowGridPoints,
    AutoRotate,
    ShowClock,
    ShowNight,
}

pub type ChangedSet = HashSet<Attr>;

/// The current named view attributes. Exactly one instance is live at a
/// time, owned by the store; mutations go through explicit saves that diff
/// by attribute name.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub date: DateSelection,
    pub param: Parameter,
    pub level: Level,
    pub overlay: OverlayType,
    pub projection: ProjectionKind,
    pub orientation: Orientation,
    pub show_animation: bool,
    pub show_grid_points: bool,
    pub auto_rotate_dpm: f64,
    pub show_clock: bool,
    pub show_night: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            date: DateSelection::Current,
            param: Parameter::Wind,
            level: Level::Surface,
            overlay: OverlayType::Default,
            projection: ProjectionKind::Orthographic,
            orientation: Orientation::default(),
            show_animation: true,
            show_grid_points: false,
            auto_rotate_dpm: 0.0,
            show_clock: false,
            show_night: false,
        }
    }
}

impl Configuration {
    /// Serializes the shareable view state to a compact path-like token,
    /// e.g. `current/wind/surface/level/orthographic=0.00,0.00,1.000`.
    #[must_use]
    pub fn to_token(&self) -> String {
        let date = match self.date {
            DateSelection::Current => "current".to_string(),
            DateSelection::Archived(dt) => dt.format("%Y-%m-%d-%HZ").to_string(),
        };
        let mut token = format!(
            "{date}/{}/{}/{}",
            self.param.name(),
            self.level.surface_name(),
            self.level.level_name(),
        );
        if self.overlay != OverlayType::Default {
            token.push_str("/overlay-");
            token.push_str(self.overlay.name());
        }
        token.push('/');
        token.push_str(self.projection.name());
        token.push_str(&format!(
            "={:.2},{:.2},{:.3}",
            self.orientation.lon, self.orientation.lat, self.orientation.zoom
        ));
        token
    }

    /// Parses a token back into a configuration; session-only flags keep
    /// their defaults.
    pub fn from_token(token: &str) -> Result<Self> {
        let (path, orientation) = match token.split_once('=') {
            Some((path, rest)) => (path, Some(rest)),
            None => (token, None),
        };
        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() < 5 {
            bail!("token has {} segments, expected at least 5", segments.len());
        }

        let date = if segments[0] == "current" {
            DateSelection::Current
        } else {
            DateSelection::Archived(parse_archive_date(segments[0])?)
        };
        let param = match segments[1] {
            "wind" => Parameter::Wind,
            other => bail!("unknown parameter '{other}'"),
        };
        let level = Level::parse(segments[2], segments[3])
            .ok_or_else(|| anyhow!("unknown surface/level '{}/{}'", segments[2], segments[3]))?;

        let mut overlay = OverlayType::Default;
        let mut idx = 4;
        if let Some(name) = segments[idx].strip_prefix("overlay-") {
            overlay =
                OverlayType::parse(name).ok_or_else(|| anyhow!("unknown overlay '{name}'"))?;
            idx += 1;
        }
        let projection_name = *segments
            .get(idx)
            .ok_or_else(|| anyhow!("token missing projection segment"))?;
        let projection = ProjectionKind::parse(projection_name)
            .ok_or_else(|| anyhow!("unknown projection '{projection_name}'"))?;

        let orientation = match orientation {
            Some(text) => parse_orientation(text)?,
            None => Orientation::default(),
        };

        Ok(Self {
            date,
            param,
            level,
            overlay,
            projection,
            orientation,
            ..Self::default()
        })
    }
}

fn parse_archive_date(text: &str) -> Result<DateTime<Utc>> {
    let trimmed = text
        .strip_suffix('Z')
        .ok_or_else(|| anyhow!("date '{text}' missing Z suffix"))?;
    let (date_part, hour_part) = trimmed
        .rsplit_once('-')
        .ok_or_else(|| anyhow!("date '{text}' missing hour"))?;
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .with_context(|| format!("bad date in '{text}'"))?;
    let hour: u32 = hour_part
        .parse()
        .with_context(|| format!("bad hour in '{text}'"))?;
    date.and_hms_opt(hour, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| anyhow!("hour {hour} out of range in '{text}'"))
}

fn parse_orientation(text: &str) -> Result<Orientation> {
    let parts: Vec<&str> = text.split(',').collect();
    if parts.len() != 3 {
        bail!("orientation '{text}' needs lon,lat,zoom");
    }
    let parse = |s: &str| -> Result<f64> {
        s.trim()
            .parse::<f64>()
            .with_context(|| format!("bad number '{s}' in orientation"))
    };
    Ok(Orientation {
        lon: parse(parts[0])?,
        lat: parse(parts[1])?,
        zoom: parse(parts[2])?,
    })
}

/// Single-writer store for the live configuration. All mutations are
/// explicit saves from the event loop; readers observe changes through the
/// emitted attribute-name sets.
#[derive(Debug, Default)]
pub struct ConfigStore {
    current: Configuration,
}

impl ConfigStore {
    #[must_use]
    pub fn new(initial: Configuration) -> Self {
        Self { current: initial }
    }

    #[must_use]
    pub fn get(&self) -> &Configuration {
        &self.current
    }

    /// Replaces the configuration and returns the names of every attribute
    /// that actually changed. An empty set means the save was a no-op.
    pub fn save(&mut self, next: Configuration) -> ChangedSet {
        let mut changed = ChangedSet::new();
        let old = &self.current;
        if old.date != next.date {
            changed.insert(Attr::Date);
        }
        if old.param != next.param {
            changed.insert(Attr::Param);
        }
        if old.level != next.level {
            changed.insert(Attr::Level);
        }
        if old.overlay != next.overlay {
            changed.insert(Attr::Overlay);
        }
        if old.projection != next.projection {
            changed.insert(Attr::Projection);
        }
        if old.orientation != next.orientation {
            changed.insert(Attr::Orientation);
        }
        if old.show_animation != next.show_animation {
            changed.insert(Attr::ShowAnimation);
        }
        if old.show_grid_points != next.show_grid_points {
            changed.insert(Attr::ShowGridPoints);
        }
        if (old.auto_rotate_dpm - next.auto_rotate_dpm).abs() > f64::EPSILON {
            changed.insert(Attr::AutoRotate);
        }
        if old.show_clock != next.show_clock {
            changed.insert(Attr::ShowClock);
        }
        if old.show_night != next.show_night {
            changed.insert(Attr::ShowNight);
        }
        self.current = next;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_token_round_trip() {
        let config = Configuration::default();
        let token = config.to_token();
        assert_eq!(token, "current/wind/surface/level/orthographic=0.00,0.00,1.000");
        let parsed = Configuration::from_token(&token).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_archived_date_with_overlay_round_trip() {
        let config = Configuration {
            date: DateSelection::Archived(
                NaiveDate::from_ymd_opt(2026, 8, 27)
                    .unwrap()
                    .and_hms_opt(12, 0, 0)
                    .unwrap()
                    .and_utc(),
            ),
            level: Level::Isobaric500,
            overlay: OverlayType::Temp,
            projection: ProjectionKind::Equirectangular,
            orientation: Orientation {
                lon: -74.25,
                lat: 40.5,
                zoom: 2.0,
            },
            ..Configuration::default()
        };
        let token = config.to_token();
        assert_eq!(
            token,
            "2026-08-27-12Z/wind/isobaric/500hPa/overlay-temp/equirectangular=-74.25,40.50,2.000"
        );
        let parsed = Configuration::from_token(&token).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_token_without_orientation_uses_default() {
        let parsed = Configuration::from_token("current/wind/surface/level/orthographic").unwrap();
        assert_eq!(parsed.orientation, Orientation::default());
    }

    #[test]
    fn test_bad_tokens_rejected() {
        for token in [
            "",
            "current/wind/surface",
            "current/plasma/surface/level/orthographic",
            "current/wind/surface/level/globular",
            "current/wind/isobaric/level/orthographic",
            "current/wind/surface/level/orthographic=1,2",
        ] {
            assert!(Configuration::from_token(token).is_err(), "accepted {token:?}");
        }
    }

    #[test]
    fn test_save_diffs_by_attribute_name() {
        let mut store = ConfigStore::new(Configuration::default());
        let mut next = store.get().clone();
        next.overlay = OverlayType::Temp;
        next.orientation.lon = 30.0;
        let changed = store.save(next);
        assert_eq!(
            changed,
            ChangedSet::from([Attr::Overlay, Attr::Orientation])
        );
    }

    #[test]
    fn test_noop_save_changes_nothing() {
        let mut store = ConfigStore::new(Configuration::default());
        let changed = store.save(Configuration::default());
        assert!(changed.is_empty());
    }
}
