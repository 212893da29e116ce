use chrono::{DateTime, Datelike, Timelike, Utc};

/// Solar declination in degrees for a given day of the year, using the
/// empirical sinusoid with its 284-day phase offset. Good to ~1° which is
/// plenty for painting a terminator.
#[must_use]
pub fn declination_deg(day_of_year: u32) -> f64 {
    23.45 * (360.0 * (284.0 + f64::from(day_of_year)) / 365.0).to_radians().sin()
}

/// Solar elevation angle in degrees at (lon, lat) for the given UTC instant.
///
/// Positive means the sun is above the horizon. Always evaluated at the real
/// wall-clock instant, never at a forecast validity time.
#[must_use]
pub fn elevation_deg(instant: DateTime<Utc>, lon: f64, lat: f64) -> f64 {
    let decl = declination_deg(instant.ordinal()).to_radians();
    let utc_hours = f64::from(instant.hour())
        + f64::from(instant.minute()) / 60.0
        + f64::from(instant.second()) / 3600.0;
    let hour_angle = ((utc_hours - 12.0) * 15.0 + lon).to_radians();
    let lat_r = lat.to_radians();
    let sin_elev = lat_r.sin() * decl.sin() + lat_r.cos() * decl.cos() * hour_angle.cos();
    sin_elev.clamp(-1.0, 1.0).asin().to_degrees()
}
