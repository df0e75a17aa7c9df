//! Client core for Last Mile Connect.
//!
//! Two people who declared compatible trips are paired into a *session* and
//! share live locations while it is active. This crate holds everything below
//! the presentation layer:
//!
//! - [`geo`]: haversine distance and nearby-stop deduplication
//! - [`SessionCoordinator`]: cached sessions, lifecycle actions, tracker ownership
//! - [`LocationTracker`]: the live-location pipeline for one active session
//! - [`IntentMatchConsole`]: trip intents, companion matches, and stops
//! - [`ClientContext`]: wires the above to the process-wide notification channel
//!
//! Rendering is delegated to a [`ViewSink`] supplied by the embedding program.

pub mod api;
pub mod config;
mod console;
mod context;
mod credentials;
mod error;
pub mod geo;
pub mod geolocation;
pub mod session;
mod tracker;
pub mod view;

#[cfg(test)]
mod testing;

pub use api::{HttpClient, IntentService, SessionService};
pub use config::ClientConfig;
pub use console::IntentMatchConsole;
pub use context::{ClientContext, ContextParts};
pub use credentials::Credentials;
pub use error::{Error, Result};
pub use geolocation::{FileGeolocator, FixedGeolocator, Geolocator, NoGeolocator};
pub use lastmile_protocol as protocol;
pub use session::{SessionAction, SessionCommand, SessionCoordinator, TransitionError};
pub use tracker::{LocationTracker, TrackerSettings};
pub use view::{LiveLocation, LivePair, LocationSource, NullSink, SessionBoard, SessionEntry, SharedRoutes, ViewSink};
