//! Ward geometry
//!
//! Complaint locations are mapped to wards by polygon containment and
//! compared with each other by great-circle distance.

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in metres between two WGS84 points.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Whether a coordinate pair is a valid latitude/longitude.
pub fn is_valid_coordinate(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

/// A closed ring of `[lng, lat]` vertices (GeoJSON order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon(pub Vec<[f64; 2]>);

impl Polygon {
    /// Point-in-polygon where points on an edge or vertex count as inside.
    pub fn covers(&self, latitude: f64, longitude: f64) -> bool {
        let ring = &self.0;
        if ring.len() < 3 {
            return false;
        }
        let (x, y) = (longitude, latitude);

        let mut inside = false;
        let mut j = ring.len() - 1;
        for i in 0..ring.len() {
            let [xi, yi] = ring[i];
            let [xj, yj] = ring[j];

            if on_segment(x, y, xi, yi, xj, yj) {
                return true;
            }
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

fn on_segment(x: f64, y: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> bool {
    const EPS: f64 = 1e-12;
    let cross = (x - x1) * (y2 - y1) - (y - y1) * (x2 - x1);
    if cross.abs() > EPS {
        return false;
    }
    x >= x1.min(x2) - EPS && x <= x1.max(x2) + EPS && y >= y1.min(y2) - EPS && y <= y1.max(y2) + EPS
}

/// Administrative ward with its boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ward {
    pub ward_id: i64,
    pub name: String,
    pub polygon: Polygon,
}

/// First ward whose boundary covers the point.
pub fn locate_ward(wards: &[Ward], latitude: f64, longitude: f64) -> Option<&Ward> {
    wards.iter().find(|w| w.polygon.covers(latitude, longitude))
}
