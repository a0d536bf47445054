//! Astronomical day length.
//!
//! CBM model (Forsythe et al., 1995) with the sunrise/sunset convention of the
//! sun's upper limb touching a refracted horizon (0.8333°).

use std::f64::consts::PI;

/// Sun elevation at sunrise/sunset, degrees below the horizon.
const HORIZON_DEG: f64 = 0.8333;

/// Hours of daylight at `latitude` (degrees, north positive) on day-of-year `doy`.
///
/// Polar day and night saturate at 24 and 0 hours.
pub fn day_length_hours(latitude: f64, doy: u32) -> f64 {
    let doy = f64::from(doy);
    let theta = 0.2163108 + 2.0 * (0.9671396 * (0.00860 * (doy - 186.0)).tan()).atan();
    let phi = (0.39795 * theta.cos()).asin();
    let lat = latitude.to_radians();

    let a = ((HORIZON_DEG * PI / 180.0).sin() + lat.sin() * phi.sin()) / (lat.cos() * phi.cos());
    24.0 - (24.0 / PI) * a.clamp(-1.0, 1.0).acos()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equator_is_about_twelve_hours() {
        for doy in [1, 80, 172, 355] {
            let h = day_length_hours(0.0, doy);
            assert!((h - 12.1).abs() < 0.1, "doy {doy}: {h}");
        }
    }

    #[test]
    fn high_latitude_seasons() {
        assert!(day_length_hours(60.0, 172) > 18.0);
        assert!(day_length_hours(60.0, 355) < 7.0);
        assert!((day_length_hours(80.0, 172) - 24.0).abs() < 1e-9);
        assert!(day_length_hours(80.0, 355).abs() < 1e-9);
    }

    #[test]
    fn hemispheres_mirror() {
        let north = day_length_hours(45.0, 172);
        let south = day_length_hours(-45.0, 172);
        assert!(north > 15.0 && south < 9.5);
    }
}
