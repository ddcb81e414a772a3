//! Great-circle distance between geographic points
//!
//! Pure functions only. Non-finite inputs propagate as NaN rather than
//! panicking so callers can discard the reading.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both coordinates are finite numbers
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Finite and within the WGS84 coordinate ranges
    pub fn is_valid(&self) -> bool {
        self.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A distance in kilometers
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Kilometers(pub f64);

impl Kilometers {
    pub fn meters(self) -> f64 {
        self.0 * 1000.0
    }

    pub fn is_nan(self) -> bool {
        self.0.is_nan()
    }
}

/// Haversine distance between two points
///
/// Symmetric, and zero when `a == b`.
pub fn distance(a: &GeoPoint, b: &GeoPoint) -> Kilometers {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1.0 for antipodal points
    let c = 2.0 * h.sqrt().min(1.0).asin();

    Kilometers(EARTH_RADIUS_KM * c)
}
