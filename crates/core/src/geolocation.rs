//! Device position sources.

use std::path::PathBuf;

use async_trait::async_trait;
use lastmile_protocol::{LocationFix, RoutePoint};

use crate::{Error, Result};

/// Produces the device's current position on demand.
///
/// Failures are expected (no fix yet, permission denied); callers skip the
/// sample and try again on the next tick.
#[async_trait]
pub trait Geolocator: Send + Sync {
	async fn current_position(&self) -> Result<LocationFix>;
}

/// Always reports the same position.
#[derive(Debug, Clone, Copy)]
pub struct FixedGeolocator(pub LocationFix);

impl From<RoutePoint> for FixedGeolocator {
	fn from(point: RoutePoint) -> Self {
		Self(LocationFix {
			lat: point.lat,
			lng: point.lng,
		})
	}
}

#[async_trait]
impl Geolocator for FixedGeolocator {
	async fn current_position(&self) -> Result<LocationFix> {
		Ok(self.0)
	}
}

/// Reads a JSON `{lat, lng}` file on every sample so another process can move the device.
#[derive(Debug, Clone)]
pub struct FileGeolocator {
	path: PathBuf,
}

impl FileGeolocator {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

#[async_trait]
impl Geolocator for FileGeolocator {
	async fn current_position(&self) -> Result<LocationFix> {
		let content = tokio::fs::read_to_string(&self.path)
			.await
			.map_err(|err| Error::Geolocation(format!("{}: {err}", self.path.display())))?;
		serde_json::from_str(&content).map_err(|err| Error::Geolocation(format!("{}: {err}", self.path.display())))
	}
}

/// No position source configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeolocator;

#[async_trait]
impl Geolocator for NoGeolocator {
	async fn current_position(&self) -> Result<LocationFix> {
		Err(Error::Geolocation("no position source configured".into()))
	}
}
