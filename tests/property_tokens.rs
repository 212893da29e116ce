use atmos_globe::app::config::{Configuration, DateSelection, Level, OverlayType};
use atmos_globe::domain::globe::{Orientation, ProjectionKind, great_circle_deg, normalize_lon};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;

fn level_strategy() -> impl Strategy<Value = Level> {
    prop_oneof![
        Just(Level::Surface),
        Just(Level::Isobaric1000),
        Just(Level::Isobaric850),
        Just(Level::Isobaric500),
        Just(Level::Isobaric250),
    ]
}

fn overlay_strategy() -> impl Strategy<Value = OverlayType> {
    prop_oneof![
        Just(OverlayType::Default),
        Just(OverlayType::Off),
        Just(OverlayType::Wind),
        Just(OverlayType::Temp),
    ]
}

fn date_strategy() -> impl Strategy<Value = DateSelection> {
    prop_oneof![
        Just(DateSelection::Current),
        (2000i32..2100, 1u32..=12, 1u32..=28, 0u32..24).prop_map(|(y, m, d, h)| {
            DateSelection::Archived(Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap())
        }),
    ]
}

fn projection_strategy() -> impl Strategy<Value = ProjectionKind> {
    prop_oneof![
        Just(ProjectionKind::Orthographic),
        Just(ProjectionKind::Equirectangular),
    ]
}

proptest! {
    /// Serializing, parsing and serializing again must be a fixed point;
    /// the token's decimal precision makes one quantization step legal.
    #[test]
    fn config_tokens_are_stable(
        date in date_strategy(),
        level in level_strategy(),
        overlay in overlay_strategy(),
        projection in projection_strategy(),
        lon in -179.99f64..180.0,
        lat in -90.0f64..90.0,
        zoom in 0.5f64..6.0,
    ) {
        let config = Configuration {
            date,
            level,
            overlay,
            projection,
            orientation: Orientation { lon, lat, zoom },
            ..Configuration::default()
        };
        let token = config.to_token();
        let parsed = Configuration::from_token(&token).unwrap();
        prop_assert_eq!(parsed.to_token(), token);
        prop_assert_eq!(parsed.date, config.date);
        prop_assert_eq!(parsed.level, config.level);
        prop_assert_eq!(parsed.overlay, config.overlay);
        prop_assert_eq!(parsed.projection, config.projection);
    }

    #[test]
    fn normalize_lon_lands_in_half_open_range(lon in -1.0e6f64..1.0e6) {
        let n = normalize_lon(lon);
        prop_assert!((-180.0..180.0).contains(&n));
        // Normalization only ever shifts by whole turns.
        let turns = (lon - n) / 360.0;
        prop_assert!((turns - turns.round()).abs() < 1.0e-6);
    }

    #[test]
    fn great_circle_is_symmetric_and_bounded(
        lon_a in -180.0f64..180.0,
        lat_a in -90.0f64..90.0,
        lon_b in -180.0f64..180.0,
        lat_b in -90.0f64..90.0,
    ) {
        let ab = great_circle_deg(lon_a, lat_a, lon_b, lat_b);
        let ba = great_circle_deg(lon_b, lat_b, lon_a, lat_a);
        prop_assert!((0.0..=180.0 + 1.0e-9).contains(&ab));
        prop_assert!((ab - ba).abs() < 1.0e-9);
    }

    #[test]
    fn great_circle_to_self_is_zero(
        lon in -180.0f64..180.0,
        lat in -89.0f64..89.0,
    ) {
        prop_assert!(great_circle_deg(lon, lat, lon, lat) < 1.0e-9);
    }
}
