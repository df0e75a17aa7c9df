//! Great-circle distance and nearby-point deduplication.

use lastmile_protocol::{RoutePoint, StopCandidate};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Minimum spacing between rendered stop markers.
pub const MIN_STOP_MARKER_DISTANCE_M: f64 = 120.0;

/// Anything with a WGS84 position.
pub trait Located {
	fn lat_lng(&self) -> (f64, f64);
}

impl Located for StopCandidate {
	fn lat_lng(&self) -> (f64, f64) {
		(self.lat, self.lng)
	}
}

impl Located for RoutePoint {
	fn lat_lng(&self) -> (f64, f64) {
		(self.lat, self.lng)
	}
}

/// Haversine distance in meters.
pub fn distance_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
	let d_lat = (lat2 - lat1).to_radians();
	let d_lng = (lng2 - lng1).to_radians();
	let a = (d_lat / 2.0).sin().powi(2) + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
	2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

pub fn distance_between(a: &impl Located, b: &impl Located) -> f64 {
	let (lat1, lng1) = a.lat_lng();
	let (lat2, lng2) = b.lat_lng();
	distance_meters(lat1, lng1, lat2, lng2)
}

/// Greedy single pass in input order: keep a candidate when it is at least
/// `min_separation_m` from every candidate kept so far.
///
/// The result preserves input order and is a fixed point of `reduce`.
pub fn reduce<T: Located + Clone>(candidates: &[T], min_separation_m: f64) -> Vec<T> {
	let mut kept: Vec<T> = Vec::with_capacity(candidates.len());
	for candidate in candidates {
		if kept.iter().all(|k| distance_between(k, candidate) >= min_separation_m) {
			kept.push(candidate.clone());
		}
	}
	kept
}
