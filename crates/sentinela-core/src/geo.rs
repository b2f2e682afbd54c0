//! Coordinates, the service-area rectangle, and the distance approximations
//! used by the dedup guard.

use serde::{Deserialize, Serialize};

/// Metres per degree of arc on the flat-earth approximation.
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// Mean earth radius used by the haversine model.
const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A WGS84 point in floating-point degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
  pub lat: f64,
  pub lng: f64,
}

impl GeoPoint {
  pub const fn new(lat: f64, lng: f64) -> Self { Self { lat, lng } }

  /// Both coordinates are finite and within the valid degree ranges.
  pub fn is_valid(&self) -> bool {
    self.lat.is_finite()
      && self.lng.is_finite()
      && (-90.0..=90.0).contains(&self.lat)
      && (-180.0..=180.0).contains(&self.lng)
  }
}

/// An axis-aligned service-area rectangle. Edges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
  pub north: f64,
  pub south: f64,
  pub east:  f64,
  pub west:  f64,
}

impl Bounds {
  /// Rio Branco, AC (approximate).
  pub const RIO_BRANCO: Self = Self {
    north: -9.85,
    south: -10.15,
    east:  -67.65,
    west:  -67.95,
  };

  pub fn contains(&self, point: GeoPoint) -> bool {
    point.lat >= self.south
      && point.lat <= self.north
      && point.lng >= self.west
      && point.lng <= self.east
  }

  pub fn center(&self) -> GeoPoint {
    GeoPoint::new(
      (self.north + self.south) / 2.0,
      (self.east + self.west) / 2.0,
    )
  }
}

impl Default for Bounds {
  fn default() -> Self { Self::RIO_BRANCO }
}

/// How the dedup guard measures the distance between two reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceModel {
  /// `sqrt(Δlat² + Δlng²) × 111 000`. Ignores longitude compression; close
  /// enough near the equator, where the service area sits.
  #[default]
  Planar,
  /// Great-circle distance on a spherical earth.
  Haversine,
}

impl DistanceModel {
  pub fn meters(self, a: GeoPoint, b: GeoPoint) -> f64 {
    match self {
      Self::Planar => planar_meters(a, b),
      Self::Haversine => haversine_meters(a, b),
    }
  }
}

pub fn planar_meters(a: GeoPoint, b: GeoPoint) -> f64 {
  let d_lat = (a.lat - b.lat).abs();
  let d_lng = (a.lng - b.lng).abs();
  (d_lat * d_lat + d_lng * d_lng).sqrt() * METERS_PER_DEGREE
}

pub fn haversine_meters(a: GeoPoint, b: GeoPoint) -> f64 {
  let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
  let d_lat = (b.lat - a.lat).to_radians();
  let d_lng = (b.lng - a.lng).to_radians();

  let h = (d_lat / 2.0).sin().powi(2)
    + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
  2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rectangle_accepts_city_and_rejects_north() {
    let b = Bounds::RIO_BRANCO;
    assert!(b.contains(GeoPoint::new(-9.90, -67.80)));
    assert!(!b.contains(GeoPoint::new(-9.80, -67.80)));
    assert!(!b.contains(GeoPoint::new(-10.20, -67.80)));
    assert!(!b.contains(GeoPoint::new(-9.90, -67.60)));
    assert!(!b.contains(GeoPoint::new(-9.90, -68.00)));
  }

  #[test]
  fn rectangle_edges_are_inclusive() {
    let b = Bounds::RIO_BRANCO;
    assert!(b.contains(GeoPoint::new(b.north, b.west)));
    assert!(b.contains(GeoPoint::new(b.south, b.east)));
    assert!(b.contains(b.center()));
  }

  #[test]
  fn planar_distance_of_neighbouring_points() {
    let a = GeoPoint::new(-9.9747, -67.8107);
    let b = GeoPoint::new(-9.9748, -67.8108);
    let d = planar_meters(a, b);
    assert!((d - 15.7).abs() < 0.1, "got {d}");
  }

  #[test]
  fn models_agree_roughly_near_the_equator() {
    let a = GeoPoint::new(-9.9747, -67.8107);
    let b = GeoPoint::new(-9.9747, -67.7650);
    let planar = DistanceModel::Planar.meters(a, b);
    let haversine = DistanceModel::Haversine.meters(a, b);
    // Longitude compression at ~10°S is about 1.5 %.
    assert!(planar > haversine);
    assert!((planar - haversine) / planar < 0.03);
  }

  #[test]
  fn invalid_points() {
    assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    assert!(!GeoPoint::new(91.0, 0.0).is_valid());
    assert!(GeoPoint::new(-9.9, -67.8).is_valid());
  }
}
