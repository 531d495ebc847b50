//! National Weather Service (NOAA) alerts client.
//!
//! api.weather.gov serves active watches, warnings and advisories as a
//! GeoJSON feature collection. Alerts carry their own severity vocabulary
//! (Extreme / Severe / Moderate / Minor / Unknown) and free-text event
//! names such as "Tornado Warning" or "Flash Flood Watch".
//!
//! # API Reference
//!
//! See: <https://www.weather.gov/documentation/services-web-api>

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DEFAULT_REQUEST_TIMEOUT;
use crate::model::{Coordinates, DisasterEvent, DisasterType, FeedSource, Severity};

/// Base URL for the NWS API.
const NWS_API_BASE: &str = "https://api.weather.gov";

/// api.weather.gov rejects requests without an identifying User-Agent.
const USER_AGENT: &str = "disaster-feed/0.1 (emergency coordination dashboard)";

/// Only the first alerts of the collection are kept.
pub const MAX_ALERTS: usize = 5;

/// Alert descriptions are cut to this many characters.
pub const MAX_DESCRIPTION_CHARS: usize = 200;

const GENERIC_GUIDANCE: [&str; 3] = [
    "Follow local emergency guidance",
    "Stay informed through official channels",
    "Prepare emergency supplies",
];

/// Client for the NWS active-alerts endpoint.
#[derive(Clone)]
pub struct NwsClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl Default for NwsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl NwsClient {
    /// Create a new NWS client with default settings.
    pub fn new() -> Self {
        Self::with_base_url(NWS_API_BASE)
    }

    /// Create a new NWS client with a custom base URL (for testing).
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

    /// Fetch all active, actual alerts (no tests, no updates or cancellations).
    pub async fn get_active_alerts(&self) -> anyhow::Result<NwsAlertCollection> {
        let url = format!(
            "{}/alerts/active?status=actual&message_type=alert",
            self.base_url
        );

        let response = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/geo+json")
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        let data = response.json::<NwsAlertCollection>().await?;
        Ok(data)
    }

    /// Fetch and normalize the first [`MAX_ALERTS`] active alerts.
    pub async fn fetch_events(&self) -> anyhow::Result<Vec<DisasterEvent>> {
        let collection = self.get_active_alerts().await?;
        Ok(collection.into_events())
    }
}

/// Infer the disaster type from an alert's event name.
pub fn weather_type(event: &str) -> DisasterType {
    let event = event.to_lowercase();
    if event.contains("tornado") {
        DisasterType::Tornado
    } else if event.contains("hurricane") || event.contains("tropical") {
        DisasterType::Hurricane
    } else if event.contains("flood") {
        DisasterType::Flood
    } else if event.contains("fire") {
        DisasterType::Wildfire
    } else if event.contains("heat") {
        DisasterType::Heatwave
    } else {
        DisasterType::Weather
    }
}

/// Map the NWS severity keyword onto the shared scale.
///
/// An absent or blank severity is treated as moderate; an unrecognized one
/// as low.
pub fn weather_severity(severity: Option<&str>) -> Severity {
    let Some(severity) = severity.filter(|s| !s.trim().is_empty()) else {
        return Severity::Moderate;
    };

    let severity = severity.to_lowercase();
    if severity.contains("extreme") {
        Severity::Extreme
    } else if severity.contains("severe") {
        Severity::High
    } else if severity.contains("moderate") {
        Severity::Moderate
    } else {
        Severity::Low
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut with "...".
pub fn truncate_description(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

// ============================================================================
// Response types
// ============================================================================

/// Feature collection returned by `/alerts/active`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NwsAlertCollection {
    #[serde(default)]
    pub features: Vec<NwsAlertFeature>,
}

impl NwsAlertCollection {
    /// Normalize the first [`MAX_ALERTS`] features.
    ///
    /// Alerts whose `sent` time isn't RFC 3339 are dropped.
    pub fn into_events(self) -> Vec<DisasterEvent> {
        self.features
            .into_iter()
            .take(MAX_ALERTS)
            .filter_map(|feature| {
                let event = feature.to_event();
                if event.is_none() {
                    tracing::debug!(
                        id = %feature.properties.id,
                        "Skipping alert without valid sent time"
                    );
                }
                event
            })
            .collect()
    }
}

/// A single alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NwsAlertFeature {
    pub properties: NwsAlertProperties,

    /// Polygon covering the alerted area; null for zone-based alerts.
    #[serde(default)]
    pub geometry: Option<NwsGeometry>,
}

/// Properties of an alert feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NwsAlertProperties {
    /// Alert identifier (a URN).
    pub id: String,

    #[serde(default)]
    pub headline: Option<String>,

    /// Affected areas, e.g. "Hennepin, MN; Ramsey, MN".
    #[serde(default, rename = "areaDesc")]
    pub area_desc: Option<String>,

    /// "Extreme", "Severe", "Moderate", "Minor" or "Unknown".
    #[serde(default)]
    pub severity: Option<String>,

    /// When the alert was issued (RFC 3339).
    #[serde(default)]
    pub sent: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub instruction: Option<String>,

    /// Event name, e.g. "Tornado Warning".
    #[serde(default)]
    pub event: Option<String>,
}

/// GeoJSON geometry attached to an alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NwsGeometry {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub coordinates: serde_json::Value,
}

impl NwsGeometry {
    /// Approximate center of the alerted area.
    ///
    /// Averages the vertices of the outer ring (of the first polygon for a
    /// MultiPolygon), ignoring the closing vertex.
    pub fn centroid(&self) -> Option<Coordinates> {
        let ring = match self.kind.as_str() {
            "Point" => return point(&self.coordinates),
            "Polygon" => self.coordinates.get(0)?,
            "MultiPolygon" => self.coordinates.get(0)?.get(0)?,
            _ => return None,
        };

        let mut vertices: Vec<Coordinates> =
            ring.as_array()?.iter().filter_map(point).collect();
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        if vertices.is_empty() {
            return None;
        }

        let n = vertices.len() as f64;
        let lat = vertices.iter().map(Coordinates::lat).sum::<f64>() / n;

        // Longitudes are unwrapped around the first vertex so rings that
        // cross the antimeridian don't average out to the prime meridian.
        let reference = vertices[0].lng();
        let lng = vertices
            .iter()
            .map(|v| reference + wrap_longitude(v.lng() - reference))
            .sum::<f64>()
            / n;
        Coordinates::new(lat, wrap_longitude(lng))
    }
}

/// Normalize a longitude into [-180, 180].
fn wrap_longitude(lng: f64) -> f64 {
    let wrapped = (lng + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && lng > 0.0 { 180.0 } else { wrapped }
}

/// Parse a GeoJSON `[lng, lat]` position.
fn point(value: &serde_json::Value) -> Option<Coordinates> {
    let lng = value.get(0)?.as_f64()?;
    let lat = value.get(1)?.as_f64()?;
    Coordinates::new(lat, lng)
}

impl NwsAlertFeature {
    /// Get the sent time as a DateTime.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.properties
            .sent
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Normalize into a [`DisasterEvent`]. Returns `None` when `sent` is unusable.
    pub fn to_event(&self) -> Option<DisasterEvent> {
        let props = &self.properties;
        let timestamp = self.timestamp()?;
        let event_name = props.event.as_deref().unwrap_or_default();

        let instructions = match props.instruction.as_deref().map(str::trim) {
            Some(instruction) if !instruction.is_empty() => vec![instruction.to_string()],
            _ => GENERIC_GUIDANCE.iter().map(|s| s.to_string()).collect(),
        };

        Some(DisasterEvent {
            id: format!("{}:{}", FeedSource::Nws.id_prefix(), props.id),
            source: FeedSource::Nws,
            disaster_type: weather_type(event_name),
            title: props
                .headline
                .clone()
                .unwrap_or_else(|| event_name.to_string()),
            location: props.area_desc.clone().unwrap_or_default(),
            severity: weather_severity(props.severity.as_deref()),
            timestamp,
            coordinates: self.geometry.as_ref().and_then(NwsGeometry::centroid),
            magnitude: None,
            description: props
                .description
                .as_deref()
                .map(|d| truncate_description(d, MAX_DESCRIPTION_CHARS))
                .unwrap_or_default(),
            instructions,
        })
    }
}
