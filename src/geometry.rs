//! Distance, bearing and position-integration primitives.
//!
//! Two families of formulas are kept distinct, unlike a blended
//! isometric-latitude approximation: orthodromic (great-circle, haversine)
//! functions for the shortest path between two points, and loxodromic
//! (rhumb-line) functions for a path of constant heading. The isochrone
//! engine uses ortho distances for pruning/goal tests and loxo headings for
//! a boat holding one course between two grib time steps.

use std::f64::consts::FRAC_PI_4;

/// Mean earth radius in nautical miles.
pub const EARTH_RADIUS_NM: f64 = 3440.065;

fn wrap360(deg: f64) -> f64 {
    let mut d = deg % 360.0;
    if d < 0.0 {
        d += 360.0;
    }
    d
}

/// Normalizes a longitude difference into `(-180, 180]`.
pub fn delta_lon(from_lon: f64, to_lon: f64) -> f64 {
    let mut dl = to_lon - from_lon;
    if dl.abs() > 180.0 {
        if dl > 0.0 {
            dl -= 360.0;
        } else {
            dl += 360.0;
        }
    }
    dl
}

/// Wraps a longitude into `[-180, 180]`.
pub fn lon_normalize(lon: f64) -> f64 {
    let mut l = lon;
    while l > 180.0 {
        l -= 360.0;
    }
    while l < -180.0 {
        l += 360.0;
    }
    l
}

/// Great-circle distance between two points, in nautical miles.
pub fn ortho_dist(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = delta_lon(lon1, lon2).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_NM * c
}

/// Initial great-circle bearing from `(lat1, lon1)` to `(lat2, lon2)`, in
/// degrees, `0..360`.
pub fn ortho_cap(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dlambda = delta_lon(lon1, lon2).to_radians();

    let y = dlambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlambda.cos();
    wrap360(y.atan2(x).to_degrees())
}

/// Rhumb-line distance between two points, in nautical miles.
pub fn loxo_dist(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = phi2 - phi1;
    let dlambda = delta_lon(lon1, lon2).to_radians();

    let dpsi = ((phi2 / 2.0 + FRAC_PI_4).tan() / (phi1 / 2.0 + FRAC_PI_4).tan()).ln();
    let q = if dpsi.abs() > 1e-12 { dphi / dpsi } else { phi1.cos() };

    let delta = (dphi * dphi + q * q * dlambda * dlambda).sqrt();
    EARTH_RADIUS_NM * delta
}

/// Rhumb-line (constant-heading) bearing from `(lat1, lon1)` to
/// `(lat2, lon2)`, in degrees, `0..360`.
pub fn direct_cap(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dlambda = delta_lon(lon1, lon2).to_radians();

    let dpsi = ((phi2 / 2.0 + FRAC_PI_4).tan() / (phi1 / 2.0 + FRAC_PI_4).tan()).ln();
    let theta = dlambda.atan2(dpsi);
    wrap360(theta.to_degrees())
}

/// Moves `distance` nautical miles from `(lat, lon)` along the great-circle
/// `heading` degrees (the forward/direct geodesic formula), returning the
/// destination `(lat, lon)`. Isochrone expansion holds a constant true
/// heading for one step, so this must match `ortho_dist`/`ortho_cap`'s
/// great-circle model exactly for the goal test's distance math to close.
pub fn move_position(lat: f64, lon: f64, heading: f64, distance: f64) -> (f64, f64) {
    let phi1 = lat.to_radians();
    let lambda1 = lon.to_radians();
    let theta = heading.to_radians();
    let delta = distance / EARTH_RADIUS_NM;

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1 + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    (phi2.to_degrees(), lon_normalize(lambda2.to_degrees()))
}

/// Cross-track distance in nautical miles from `p` to the great-circle
/// segment `a`-`b`. Used to test whether a candidate point lies close
/// enough to the rhumb line it departed from for replication purposes.
pub fn dist_segment(lat: f64, lon: f64, lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> f64 {
    let d13 = ortho_dist(lat_a, lon_a, lat, lon) / EARTH_RADIUS_NM;
    let theta13 = ortho_cap(lat_a, lon_a, lat, lon).to_radians();
    let theta12 = ortho_cap(lat_a, lon_a, lat_b, lon_b).to_radians();

    let dxt = (d13.sin() * (theta13 - theta12).sin()).asin();
    (dxt * EARTH_RADIUS_NM).abs()
}

/// True wind angle: signed angle between `heading` and the wind's `twd`
/// (true wind direction, the direction the wind blows *from*), in
/// `(-180, 180]`. Negative is port tack, positive starboard.
pub fn f_twa(heading: f64, twd: f64) -> f64 {
    let mut twa = wrap360(twd - heading + 180.0) - 180.0;
    if twa <= -180.0 {
        twa += 360.0;
    }
    twa
}

/// Wraps any angle into `[0, 360)`.
pub fn heading_normalize(heading: f64) -> f64 {
    wrap360(heading)
}

/// Signed shortest angular difference `b - a` in degrees, in `(-180, 180]`.
pub fn angle_diff(a: f64, b: f64) -> f64 {
    let mut d = (b - a) % 360.0;
    if d > 180.0 {
        d -= 360.0;
    } else if d <= -180.0 {
        d += 360.0;
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ortho_dist_is_symmetric() {
        let d1 = ortho_dist(48.0, -4.0, 40.0, -60.0);
        let d2 = ortho_dist(40.0, -60.0, 48.0, -4.0);
        assert!((d1 - d2).abs() < 1e-9);
    }

    #[test]
    fn ortho_dist_zero_for_same_point() {
        assert!(ortho_dist(10.0, 10.0, 10.0, 10.0) < 1e-9);
    }

    #[test]
    fn move_position_round_trips_heading() {
        let (lat2, lon2) = move_position(48.0, -4.0, 90.0, 60.0);
        let cap = ortho_cap(48.0, -4.0, lat2, lon2);
        assert!((cap - 90.0).abs() < 0.01);
        let dist = ortho_dist(48.0, -4.0, lat2, lon2);
        assert!((dist - 60.0).abs() < 0.01);
    }

    #[test]
    fn f_twa_dead_downwind_is_180() {
        // Wind blowing from the north (twd=0), boat heading due south (180):
        // wind is directly behind, TWA should be 180.
        let twa = f_twa(180.0, 0.0);
        assert!((twa.abs() - 180.0).abs() < 1e-9);
    }

    #[test]
    fn f_twa_close_hauled_port() {
        let twa = f_twa(0.0, 315.0);
        assert!((twa - (-45.0)).abs() < 1e-9);
    }

    #[test]
    fn angle_diff_wraps_correctly() {
        assert!((angle_diff(350.0, 10.0) - 20.0).abs() < 1e-9);
        assert!((angle_diff(10.0, 350.0) - (-20.0)).abs() < 1e-9);
    }
}
