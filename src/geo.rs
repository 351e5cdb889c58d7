//! Great-circle helpers on raw coordinates, in degrees.
//!
//! A spherical earth of mean radius [`EARTH_RADIUS_M`] is assumed; results are
//! within about 0.5% of ellipsoidal distances.

use libm::{atan2, cos, sin, sqrt};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

const CARDINALS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// Distance in meters between two points.
pub fn distance_between(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    // Vincenty's formula for the sphere: atan2 keeps it well conditioned for
    // both tiny and antipodal separations.
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta = (lon2 - lon1).to_radians();

    let a = cos(phi2) * sin(delta);
    let b = cos(phi1) * sin(phi2) - sin(phi1) * cos(phi2) * cos(delta);
    let y = sqrt(a * a + b * b);
    let x = sin(phi1) * sin(phi2) + cos(phi1) * cos(phi2) * cos(delta);
    atan2(y, x) * EARTH_RADIUS_M
}

/// Initial bearing from the first point to the second, degrees in `[0, 360)`.
pub fn course_to(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta = (lon2 - lon1).to_radians();

    let y = sin(delta) * cos(phi2);
    let x = cos(phi1) * sin(phi2) - sin(phi1) * cos(phi2) * cos(delta);
    normalize_degrees(atan2(y, x).to_degrees())
}

/// 16-point compass label for a bearing in degrees.
pub fn cardinal(course: f64) -> &'static str {
    let sector = (normalize_degrees(course) + 11.25) / 22.5;
    CARDINALS[sector as usize % CARDINALS.len()]
}

fn normalize_degrees(deg: f64) -> f64 {
    let d = libm::fmod(deg, 360.0);
    if d < 0.0 {
        d + 360.0
    } else {
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn within(actual: f64, expected: f64, fraction: f64) -> bool {
        (actual - expected).abs() <= expected * fraction
    }

    #[test]
    fn london_to_paris() {
        // Published great-circle distance: 343.5 km
        let d = distance_between(51.5074, -0.1278, 48.8566, 2.3522);
        assert!(within(d, 343_500.0, 0.005), "{d}");
        let c = course_to(51.5074, -0.1278, 48.8566, 2.3522);
        assert!((c - 148.1).abs() < 0.1, "{c}");
        assert_eq!(cardinal(c), "SSE");
    }

    #[test]
    fn new_york_to_london() {
        // JFK to LHR: 5,540 km
        let d = distance_between(40.6413, -73.7781, 51.4700, -0.4543);
        assert!(within(d, 5_540_000.0, 0.005), "{d}");
        let c = course_to(40.6413, -73.7781, 51.4700, -0.4543);
        assert!((c - 51.35).abs() < 0.1, "{c}");
        assert_eq!(cardinal(c), "NE");
    }

    #[test]
    fn same_point_is_zero() {
        assert_eq!(distance_between(48.1173, 11.5167, 48.1173, 11.5167), 0.0);
    }

    #[test]
    fn bearings_to_cardinal_points() {
        assert!((course_to(0.0, 0.0, 1.0, 0.0) - 0.0).abs() < 1e-9);
        assert!((course_to(0.0, 0.0, 0.0, 1.0) - 90.0).abs() < 1e-9);
        assert!((course_to(0.0, 0.0, -1.0, 0.0) - 180.0).abs() < 1e-9);
        assert!((course_to(0.0, 0.0, 0.0, -1.0) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn cardinal_sectors() {
        assert_eq!(cardinal(0.0), "N");
        assert_eq!(cardinal(11.0), "N");
        assert_eq!(cardinal(11.25), "NNE");
        assert_eq!(cardinal(90.0), "E");
        assert_eq!(cardinal(200.0), "SSW");
        assert_eq!(cardinal(350.0), "N");
        assert_eq!(cardinal(-90.0), "W");
        assert_eq!(cardinal(720.0), "N");
    }
}
