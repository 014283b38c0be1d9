//! Great-circle helpers for drawing alert direction lines.

/// Mean Earth radius used by the projector.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Destination point reached from `(lat, lon)` travelling `distance_km`
/// along the initial `bearing_deg` on a spherical Earth.
///
/// Returns `(lat2, lon2)` in degrees, longitude normalized into (-180, 180].
/// NaN inputs propagate; callers validate coordinates.
pub fn destination(lat: f64, lon: f64, bearing_deg: f64, distance_km: f64) -> (f64, f64) {
    let delta = distance_km / EARTH_RADIUS_KM;
    let theta = bearing_deg.to_radians();
    let phi1 = lat.to_radians();
    let lambda1 = lon.to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    (phi2.to_degrees(), normalize_lon(lambda2.to_degrees()))
}

/// Wrap a longitude into (-180, 180].
pub fn normalize_lon(lon: f64) -> f64 {
    let wrapped = (lon + 540.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}
