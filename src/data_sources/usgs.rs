//! USGS earthquake feed client.
//!
//! The USGS Earthquake Hazards Program publishes GeoJSON summary feeds that
//! are regenerated every minute. We poll the "significant earthquakes, past
//! day" feed.
//!
//! # API Reference
//!
//! See: <https://earthquake.usgs.gov/earthquakes/feed/v1.0/geojson.php>

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DEFAULT_REQUEST_TIMEOUT;
use crate::model::{Coordinates, DisasterEvent, DisasterType, FeedSource, Severity};

/// Base URL for the USGS GeoJSON summary feeds.
const USGS_FEED_BASE: &str = "https://earthquake.usgs.gov/earthquakes/feed/v1.0";

const EARTHQUAKE_GUIDANCE: [&str; 4] = [
    "Drop, Cover, and Hold On",
    "Stay away from windows and heavy objects",
    "If outdoors, move away from buildings",
    "Check for injuries and hazards",
];

/// Client for the USGS significant-earthquake feed.
#[derive(Clone)]
pub struct UsgsClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl Default for UsgsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl UsgsClient {
    /// Create a new USGS client with default settings.
    pub fn new() -> Self {
        Self::with_base_url(USGS_FEED_BASE)
    }

    /// Create a new USGS client with a custom base URL (for testing).
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch the raw feature collection for significant earthquakes in the past day.
    pub async fn get_significant_day(&self) -> anyhow::Result<UsgsFeatureCollection> {
        let url = format!("{}/summary/significant_day.geojson", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        let data = response.json::<UsgsFeatureCollection>().await?;
        Ok(data)
    }

    /// Fetch and normalize significant earthquakes into disaster events.
    pub async fn fetch_events(&self) -> anyhow::Result<Vec<DisasterEvent>> {
        let collection = self.get_significant_day().await?;
        Ok(collection.into_events())
    }
}

/// Map an earthquake magnitude onto the shared severity scale.
///
/// - `>= 7.0`: extreme
/// - `>= 6.0`: high
/// - `>= 4.0`: moderate
/// - otherwise: low
pub fn magnitude_severity(magnitude: f64) -> Severity {
    if magnitude >= 7.0 {
        Severity::Extreme
    } else if magnitude >= 6.0 {
        Severity::High
    } else if magnitude >= 4.0 {
        Severity::Moderate
    } else {
        Severity::Low
    }
}

// ============================================================================
// Response types
// ============================================================================

/// GeoJSON feature collection returned by the summary feeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsgsFeatureCollection {
    #[serde(default)]
    pub features: Vec<UsgsFeature>,
}

impl UsgsFeatureCollection {
    /// Normalize every usable feature. Features without an event time are skipped.
    pub fn into_events(self) -> Vec<DisasterEvent> {
        self.features
            .into_iter()
            .filter_map(|feature| {
                let event = feature.to_event();
                if event.is_none() {
                    tracing::debug!(id = %feature.id, "Skipping earthquake without valid time");
                }
                event
            })
            .collect()
    }
}

/// A single earthquake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsgsFeature {
    /// USGS event id (e.g. "us7000abcd").
    pub id: String,

    pub properties: UsgsProperties,

    #[serde(default)]
    pub geometry: Option<UsgsGeometry>,
}

/// Properties of an earthquake feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsgsProperties {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub place: Option<String>,

    /// Magnitude; occasionally null for freshly reviewed events.
    #[serde(default)]
    pub mag: Option<f64>,

    /// Origin time in milliseconds since the Unix epoch.
    #[serde(default)]
    pub time: Option<i64>,
}

/// Point geometry: `[longitude, latitude, depth]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsgsGeometry {
    #[serde(default)]
    pub coordinates: Vec<f64>,
}

impl UsgsGeometry {
    /// Coordinates in {lat, lng} order. GeoJSON stores longitude first.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match self.coordinates.as_slice() {
            [lng, lat, ..] => Coordinates::new(*lat, *lng),
            _ => None,
        }
    }
}

impl UsgsFeature {
    /// Get the origin time as a DateTime.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.properties.time.and_then(DateTime::from_timestamp_millis)
    }

    /// Normalize into a [`DisasterEvent`]. Returns `None` when the event time is missing.
    pub fn to_event(&self) -> Option<DisasterEvent> {
        let timestamp = self.timestamp()?;
        let magnitude = self.properties.mag;
        let mag_text = magnitude.map_or_else(|| "unknown".to_string(), |m| m.to_string());
        let location = self.properties.place.clone().unwrap_or_default();

        Some(DisasterEvent {
            id: format!("{}:{}", FeedSource::Usgs.id_prefix(), self.id),
            source: FeedSource::Usgs,
            disaster_type: DisasterType::Earthquake,
            title: self
                .properties
                .title
                .clone()
                .unwrap_or_else(|| format!("M {} - {}", mag_text, location)),
            location,
            severity: magnitude_severity(magnitude.unwrap_or(0.0)),
            timestamp,
            coordinates: self.geometry.as_ref().and_then(UsgsGeometry::coordinates),
            magnitude,
            description: format!("Magnitude {} earthquake", mag_text),
            instructions: EARTHQUAKE_GUIDANCE.iter().map(|s| s.to_string()).collect(),
        })
    }
}
