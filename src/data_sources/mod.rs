//! Upstream disaster feeds.
//!
//! Each module wraps one public feed and adapts its native format into
//! [`DisasterEvent`](crate::model::DisasterEvent) records.
//!
//! # Data Sources
//!
//! - [`usgs`]: USGS significant earthquakes (GeoJSON)
//! - [`nws`]: National Weather Service active alerts (GeoJSON)
//! - [`firms`]: NASA FIRMS active fire detections (CSV)

use std::time::Duration;

pub mod firms;
pub mod nws;
pub mod usgs;

pub use firms::FirmsClient;
pub use nws::NwsClient;
pub use usgs::UsgsClient;

/// Per-request timeout applied by every client unless overridden.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
