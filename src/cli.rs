#![allow(clippy::missing_errors_doc)]

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};

use crate::app::config::{Configuration, Level, OverlayType};
use crate::domain::globe::ProjectionKind;
use crate::domain::mesh::Detail;

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ProjectionArg {
    Orthographic,
    Equirectangular,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum OverlayArg {
    #[default]
    Default,
    Off,
    Wind,
    Temp,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum LevelArg {
    #[default]
    Surface,
    #[value(name = "1000hpa")]
    Hpa1000,
    #[value(name = "850hpa")]
    Hpa850,
    #[value(name = "500hpa")]
    Hpa500,
    #[value(name = "250hpa")]
    Hpa250,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum DetailArg {
    /// Pick by terminal size.
    #[default]
    Auto,
    Low,
    High,
}

#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Parser, Clone)]
#[command(
    name = "atmos-globe",
    version,
    about = "Animated terminal globe for atmospheric wind and scalar fields"
)]
pub struct Cli {
    /// Restore a previously shared configuration token
    /// (e.g. "current/wind/surface/level/orthographic").
    #[arg(long)]
    pub state: Option<String>,

    /// Initial projection
    #[arg(long, value_enum, default_value_t = ProjectionArg::Orthographic)]
    pub projection: ProjectionArg,

    /// Color overlay layer
    #[arg(long, value_enum, default_value_t)]
    pub overlay: OverlayArg,

    /// Atmospheric level of the wind layer
    #[arg(long, value_enum, default_value_t)]
    pub level: LevelArg,

    /// Animation frames per second (5-60)
    #[arg(long, default_value_t = 30)]
    pub fps: u8,

    /// Autorotation speed in degrees per minute (0 = off)
    #[arg(long, default_value_t = 0.0)]
    pub auto_rotate: f64,

    /// Disable the particle animation
    #[arg(long)]
    pub no_animation: bool,

    /// Start with the day/night overlay enabled
    #[arg(long)]
    pub night: bool,

    /// Start with the live UTC clock readout open
    #[arg(long)]
    pub clock: bool,

    /// Draw the graticule (debug aid)
    #[arg(long)]
    pub grid_points: bool,

    /// Coastline level of detail
    #[arg(long, value_enum, default_value_t)]
    pub detail: DetailArg,
}

impl Cli {
    pub fn validate(&self) -> Result<()> {
        if !(5..=60).contains(&self.fps) {
            bail!("--fps must be between 5 and 60, got {}", self.fps);
        }
        if !self.auto_rotate.is_finite() || self.auto_rotate.abs() > 3600.0 {
            bail!("--auto-rotate must be a sane speed in degrees per minute");
        }
        if let Some(token) = &self.state {
            Configuration::from_token(token)?;
        }
        Ok(())
    }

    /// Initial configuration: a `--state` token wins, otherwise the
    /// individual flags are mapped in.
    pub fn initial_configuration(&self) -> Result<Configuration> {
        let mut config = match &self.state {
            Some(token) => Configuration::from_token(token)?,
            None => Configuration {
                projection: match self.projection {
                    ProjectionArg::Orthographic => ProjectionKind::Orthographic,
                    ProjectionArg::Equirectangular => ProjectionKind::Equirectangular,
                },
                overlay: match self.overlay {
                    OverlayArg::Default => OverlayType::Default,
                    OverlayArg::Off => OverlayType::Off,
                    OverlayArg::Wind => OverlayType::Wind,
                    OverlayArg::Temp => OverlayType::Temp,
                },
                level: match self.level {
                    LevelArg::Surface => Level::Surface,
                    LevelArg::Hpa1000 => Level::Isobaric1000,
                    LevelArg::Hpa850 => Level::Isobaric850,
                    LevelArg::Hpa500 => Level::Isobaric500,
                    LevelArg::Hpa250 => Level::Isobaric250,
                },
                ..Configuration::default()
            },
        };
        config.show_animation = !self.no_animation;
        config.show_night = self.night;
        config.show_clock = self.clock;
        config.show_grid_points = self.grid_points;
        config.auto_rotate_dpm = self.auto_rotate;
        Ok(config)
    }

    #[must_use]
    pub fn mesh_detail(&self, cells: usize) -> Detail {
        match self.detail {
            DetailArg::Low => Detail::Low,
            DetailArg::High => Detail::High,
            DetailArg::Auto => {
                if cells >= 80 * 24 {
                    Detail::High
                } else {
                    Detail::Low
                }
            }
        }
    }
}
