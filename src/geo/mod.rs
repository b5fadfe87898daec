//! Geographic ranking of datacenters.
//!
//! Pure functions: great-circle distance via the haversine formula and a
//! stable distance-ascending sort. Used to build deterministic,
//! latency-aware fallback chains for multi-region services.

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Earth radius in meters used by the haversine formula
pub const EARTH_RADIUS_METERS: f64 = 6_378_100.0;

/// Geocoordinate in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Build a coordinate from exactly two decimal strings. Malformed
    /// input is rejected before any conversion happens.
    pub fn parse(latitude: &str, longitude: &str) -> Result<Self> {
        let latitude = latitude
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::GeoParse { axis: "latitude", value: latitude.to_string() })?;
        let longitude = longitude
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::GeoParse { axis: "longitude", value: longitude.to_string() })?;
        Ok(Self { latitude, longitude })
    }
}

/// A datacenter from the external catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datacenter {
    pub id: String,
    pub coordinate: Coordinate,
}

/// A geo-distributed service: where it is deployed and how it is reached.
/// Consumed only by global-load-balancer generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoService {
    pub id: String,
    pub datacenter_ids: Vec<String>,
    pub port: u32,
    #[serde(default)]
    pub routable_paths: Vec<String>,
}

fn haversine(theta: f64) -> f64 {
    (theta / 2.0).sin().powi(2)
}

/// Great-circle distance between two coordinates, in meters
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let long1 = a.longitude.to_radians();
    let long2 = b.longitude.to_radians();

    let h = haversine(lat2 - lat1) + lat1.cos() * lat2.cos() * haversine(long2 - long1);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

/// Order datacenters by ascending distance to the reference point. The
/// sort is stable: equal distances preserve catalog order.
pub fn rank(reference: Coordinate, datacenters: &[Datacenter]) -> Vec<Datacenter> {
    let mut ranked: Vec<Datacenter> = datacenters.to_vec();
    ranked.sort_by(|a, b| {
        let da = distance_meters(reference, a.coordinate);
        let db = distance_meters(reference, b.coordinate);
        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}
