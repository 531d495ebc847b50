//! Location reference for the proximity feed.
//!
//! A [`LocationProvider`] answers a single "current position" request. The
//! [`LocationTracker`] wraps a provider with a timeout, remembers the
//! latest fix, and keeps location failures separate from feed failures.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::model::Coordinates;

/// How long a position request may take before it fails with [`LocationError::Timeout`].
pub const DEFAULT_POSITION_TIMEOUT: Duration = Duration::from_secs(10);

/// Reasons a position could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("timed out waiting for a location fix")]
    Timeout,

    #[error("location unavailable: {0}")]
    PositionUnavailable(String),

    #[error("geolocation is not supported")]
    Unsupported,
}

/// A position reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LocationFix {
    pub coordinates: Coordinates,

    /// Accuracy radius in meters, when the provider reports one.
    pub accuracy_m: Option<f64>,

    pub acquired_at: DateTime<Utc>,
}

impl LocationFix {
    pub fn new(coordinates: Coordinates, accuracy_m: Option<f64>) -> Self {
        Self {
            coordinates,
            accuracy_m,
            acquired_at: Utc::now(),
        }
    }

    /// Fallback address: the coordinates to six decimals.
    pub fn address(&self) -> String {
        format!(
            "{:.6}, {:.6}",
            self.coordinates.lat(),
            self.coordinates.lng()
        )
    }
}

/// Qualitative accuracy of a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccuracyStatus {
    /// Within 10 m.
    Excellent,
    /// Within 50 m.
    Good,
    /// Within 100 m.
    Fair,
    Poor,
    Unknown,
}

impl AccuracyStatus {
    pub fn from_accuracy(accuracy_m: Option<f64>) -> Self {
        match accuracy_m {
            None => AccuracyStatus::Unknown,
            Some(a) if !a.is_finite() || a <= 0.0 => AccuracyStatus::Unknown,
            Some(a) if a <= 10.0 => AccuracyStatus::Excellent,
            Some(a) if a <= 50.0 => AccuracyStatus::Good,
            Some(a) if a <= 100.0 => AccuracyStatus::Fair,
            Some(_) => AccuracyStatus::Poor,
        }
    }
}

/// Options applied to each position request.
#[derive(Debug, Clone, Copy)]
pub struct PositionOptions {
    pub timeout: Duration,
    /// Oldest cached position a provider may return. Zero forces a fresh fix.
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_POSITION_TIMEOUT,
            maximum_age: Duration::ZERO,
        }
    }
}

/// Something that can report the current position.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Request the current position.
    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<LocationFix, LocationError>;

    /// Whether asking this provider can ever succeed. Periodic refreshes
    /// are skipped for providers that can't.
    fn is_available(&self) -> bool {
        true
    }
}

/// Always reports the same configured coordinate.
#[derive(Debug, Clone)]
pub struct FixedLocationProvider {
    coordinates: Coordinates,
    accuracy_m: Option<f64>,
}

impl FixedLocationProvider {
    pub fn new(coordinates: Coordinates, accuracy_m: Option<f64>) -> Self {
        Self {
            coordinates,
            accuracy_m,
        }
    }
}

#[async_trait]
impl LocationProvider for FixedLocationProvider {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<LocationFix, LocationError> {
        Ok(LocationFix::new(self.coordinates, self.accuracy_m))
    }
}

/// Used when no positioning capability is configured.
#[derive(Debug, Clone, Default)]
pub struct UnsupportedLocationProvider;

#[async_trait]
impl LocationProvider for UnsupportedLocationProvider {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<LocationFix, LocationError> {
        Err(LocationError::Unsupported)
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Latest known location state.
#[derive(Debug, Clone, Default)]
pub struct LocationState {
    pub fix: Option<LocationFix>,
    pub error: Option<LocationError>,
    pub loading: bool,
}

/// Tracks the most recent location fix.
///
/// A failed refresh records the error and keeps the previous fix; it is
/// never retried automatically.
#[derive(Clone)]
pub struct LocationTracker {
    provider: Arc<dyn LocationProvider>,
    options: PositionOptions,
    state: Arc<RwLock<LocationState>>,
}

impl LocationTracker {
    pub fn new(provider: Arc<dyn LocationProvider>) -> Self {
        Self::with_options(provider, PositionOptions::default())
    }

    pub fn with_options(provider: Arc<dyn LocationProvider>, options: PositionOptions) -> Self {
        Self {
            provider,
            options,
            state: Arc::new(RwLock::new(LocationState::default())),
        }
    }

    /// Current location state.
    pub async fn state(&self) -> LocationState {
        self.state.read().await.clone()
    }

    /// Whether the provider can be refreshed at all.
    pub fn can_refresh(&self) -> bool {
        self.provider.is_available()
    }

    /// Latest fix, if any.
    pub async fn latest_fix(&self) -> Option<LocationFix> {
        self.state.read().await.fix
    }

    /// Ask the provider for a fresh position, bounded by the configured timeout.
    pub async fn refresh(&self) -> Result<LocationFix, LocationError> {
        {
            let mut state = self.state.write().await;
            state.loading = true;
            state.error = None;
        }

        let result = match tokio::time::timeout(
            self.options.timeout,
            self.provider.current_position(&self.options),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LocationError::Timeout),
        };

        let mut state = self.state.write().await;
        state.loading = false;
        match &result {
            Ok(fix) => {
                info!(
                    lat = fix.coordinates.lat(),
                    lng = fix.coordinates.lng(),
                    accuracy_m = ?fix.accuracy_m,
                    "Location updated"
                );
                state.fix = Some(*fix);
                state.error = None;
            }
            Err(e) => {
                warn!(error = %e, "Location refresh failed");
                state.error = Some(e.clone());
            }
        }

        result
    }

    /// Record a position reported by the client.
    ///
    /// The reported fix is the reference until the next successful provider
    /// refresh replaces it. With no available provider it is kept until the
    /// client reports again.
    pub async fn report(&self, fix: LocationFix) {
        let mut state = self.state.write().await;
        state.fix = Some(fix);
        state.error = None;
        info!(
            lat = fix.coordinates.lat(),
            lng = fix.coordinates.lng(),
            "Location reported"
        );
    }
}
