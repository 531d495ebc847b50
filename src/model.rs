//! Data models for the disaster feed.
//!
//! Every upstream feed is normalized into a single [`DisasterEvent`] shape.
//! Events are ephemeral: they are re-derived on every fetch cycle and carry
//! no identity beyond their adapter-namespaced `id`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Four-level severity scale shared by all feeds.
///
/// Variants are declared in ascending order so the derived `Ord` matches
/// [`Severity::rank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Moderate,
    High,
    Extreme,
}

impl Severity {
    /// Numeric rank used for ordering (extreme = 4 ... low = 1).
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Low => 1,
            Severity::Moderate => 2,
            Severity::High => 3,
            Severity::Extreme => 4,
        }
    }

    /// Get a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Moderate => "Moderate",
            Severity::High => "High",
            Severity::Extreme => "Extreme",
        }
    }
}

/// Kind of disaster, normalized from each feed's own vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisasterType {
    Earthquake,
    Flood,
    Wildfire,
    Hurricane,
    Tornado,
    Heatwave,
    /// Any weather alert that doesn't match a more specific type.
    Weather,
}

impl DisasterType {
    /// Get a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            DisasterType::Earthquake => "Earthquake",
            DisasterType::Flood => "Flood",
            DisasterType::Wildfire => "Wildfire",
            DisasterType::Hurricane => "Hurricane",
            DisasterType::Tornado => "Tornado",
            DisasterType::Heatwave => "Heatwave",
            DisasterType::Weather => "Weather",
        }
    }
}

/// The upstream feed an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    /// USGS significant-earthquake GeoJSON feed.
    Usgs,
    /// NOAA / National Weather Service active alerts.
    Nws,
    /// NASA FIRMS active fire detections.
    Firms,
}

impl FeedSource {
    /// Get a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            FeedSource::Usgs => "USGS",
            FeedSource::Nws => "NWS",
            FeedSource::Firms => "NASA FIRMS",
        }
    }

    /// Prefix used to namespace event ids.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            FeedSource::Usgs => "usgs",
            FeedSource::Nws => "nws",
            FeedSource::Firms => "firms",
        }
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A point on the Earth's surface in decimal degrees.
///
/// Values can only be built through [`Coordinates::new`], which rejects
/// anything outside lat ∈ [-90, 90], lng ∈ [-180, 180].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    lat: f64,
    lng: f64,
}

impl Coordinates {
    /// Build a coordinate pair, returning `None` if either value is
    /// non-finite or out of range.
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        if !lat.is_finite() || !lng.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return None;
        }
        Some(Self { lat, lng })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }
}

impl<'de> Deserialize<'de> for Coordinates {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            lat: f64,
            lng: f64,
        }

        let raw = Raw::deserialize(deserializer)?;
        Coordinates::new(raw.lat, raw.lng).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "coordinates out of range: ({}, {})",
                raw.lat, raw.lng
            ))
        })
    }
}

/// A single disaster event, normalized from any feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisasterEvent {
    /// Unique within a fetch cycle, prefixed with the source feed
    /// (e.g. `usgs:us7000abcd`).
    pub id: String,

    /// Feed that produced this event.
    pub source: FeedSource,

    #[serde(rename = "type")]
    pub disaster_type: DisasterType,

    /// Human-readable headline.
    pub title: String,

    /// Free-text place description.
    pub location: String,

    pub severity: Severity,

    /// When the event happened (not when it was fetched).
    pub timestamp: DateTime<Utc>,

    /// Absent for alerts without usable geometry.
    pub coordinates: Option<Coordinates>,

    /// Earthquake magnitude, when the feed reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<f64>,

    pub description: String,

    /// Safety guidance, in display order.
    pub instructions: Vec<String>,
}

impl DisasterEvent {
    /// Relative age of the event, in whole hours.
    pub fn age_label(&self, now: DateTime<Utc>) -> String {
        let hours = (now - self.timestamp).num_hours();
        match hours {
            h if h < 1 => "Less than 1 hour ago".to_string(),
            1 => "1 hour ago".to_string(),
            h => format!("{} hours ago", h),
        }
    }
}

/// A disaster annotated with its distance from a reference point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyDisaster {
    #[serde(flatten)]
    pub event: DisasterEvent,

    /// Great-circle distance from the reference point.
    pub distance_km: f64,

    /// Display form of `distance_km`, e.g. "850m away" or "12km away".
    pub distance_label: String,
}

/// Counts of the current event list, by type and by severity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSummary {
    pub total: usize,
    pub earthquakes: usize,
    pub floods: usize,
    pub wildfires: usize,
    /// Hurricanes and tornadoes.
    pub storms: usize,
    /// Heatwaves and general weather alerts.
    pub other: usize,
    pub extreme_count: usize,
    pub high_count: usize,
    pub moderate_count: usize,
    pub low_count: usize,
}

impl FeedSummary {
    /// Compute summary from a list of events.
    pub fn from_events(events: &[DisasterEvent]) -> Self {
        let mut summary = Self {
            total: events.len(),
            ..Self::default()
        };

        for event in events {
            match event.disaster_type {
                DisasterType::Earthquake => summary.earthquakes += 1,
                DisasterType::Flood => summary.floods += 1,
                DisasterType::Wildfire => summary.wildfires += 1,
                DisasterType::Hurricane | DisasterType::Tornado => summary.storms += 1,
                DisasterType::Heatwave | DisasterType::Weather => summary.other += 1,
            }

            match event.severity {
                Severity::Extreme => summary.extreme_count += 1,
                Severity::High => summary.high_count += 1,
                Severity::Moderate => summary.moderate_count += 1,
                Severity::Low => summary.low_count += 1,
            }
        }

        summary
    }
}

/// Response for GET /disasters and POST /disasters/refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedResponse {
    /// Merged event list, ranked by severity then recency.
    pub disasters: Vec<DisasterEvent>,

    /// Whether a refresh is currently in flight.
    pub loading: bool,

    /// Set when the last refresh could not reach any source.
    pub error: Option<String>,

    /// When the event list was last replaced.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Query parameters for GET /disasters/nearby.
#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    /// Reference latitude. Falls back to the tracked location when omitted.
    pub lat: Option<f64>,

    /// Reference longitude. Falls back to the tracked location when omitted.
    pub lng: Option<f64>,

    /// Search radius in kilometers (default: 500).
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,
}

fn default_radius_km() -> f64 {
    crate::proximity::DEFAULT_RADIUS_KM
}

/// Response for GET /disasters/nearby.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyResponse {
    /// The reference point used for the distance computation.
    pub origin: Coordinates,

    pub radius_km: f64,

    /// Events within the radius, nearest first.
    pub disasters: Vec<NearbyDisaster>,
}

/// Request body for POST /location.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationReport {
    pub lat: f64,
    pub lng: f64,

    /// Reported accuracy radius in meters.
    #[serde(default)]
    pub accuracy: Option<f64>,
}

/// Response for GET /location.
#[derive(Debug, Clone, Serialize)]
pub struct LocationResponse {
    pub location: Option<Coordinates>,
    pub accuracy_m: Option<f64>,
    pub accuracy_status: crate::geolocation::AccuracyStatus,
    /// "lat, lng" rendered to six decimals.
    pub address: Option<String>,
    pub acquired_at: Option<DateTime<Utc>>,
    pub loading: bool,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event(disaster_type: DisasterType, severity: Severity) -> DisasterEvent {
        DisasterEvent {
            id: "test:1".to_string(),
            source: FeedSource::Nws,
            disaster_type,
            title: "Test".to_string(),
            location: "Somewhere".to_string(),
            severity,
            timestamp: Utc::now(),
            coordinates: None,
            magnitude: None,
            description: String::new(),
            instructions: vec![],
        }
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Extreme > Severity::High);
        assert!(Severity::High > Severity::Moderate);
        assert!(Severity::Moderate > Severity::Low);
        assert_eq!(Severity::Extreme.rank(), 4);
        assert_eq!(Severity::Low.rank(), 1);
    }

    #[test]
    fn test_coordinates_validation() {
        assert!(Coordinates::new(0.0, 0.0).is_some());
        assert!(Coordinates::new(90.0, 180.0).is_some());
        assert!(Coordinates::new(-90.0, -180.0).is_some());
        assert!(Coordinates::new(90.1, 0.0).is_none());
        assert!(Coordinates::new(0.0, -180.5).is_none());
        assert!(Coordinates::new(f64::NAN, 0.0).is_none());
    }

    #[test]
    fn test_coordinates_deserialize_rejects_out_of_range() {
        let ok: Coordinates = serde_json::from_str(r#"{"lat": 44.9, "lng": -93.2}"#).unwrap();
        assert_eq!(ok.lat(), 44.9);

        let bad = serde_json::from_str::<Coordinates>(r#"{"lat": 120.0, "lng": 0.0}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_event_serializes_type_field() {
        let json = serde_json::to_value(event(DisasterType::Flood, Severity::High)).unwrap();
        assert_eq!(json["type"], "flood");
        assert_eq!(json["severity"], "high");
        assert_eq!(json["source"], "nws");
        assert!(json.get("magnitude").is_none());
    }

    #[test]
    fn test_age_label() {
        let now = Utc::now();
        let mut e = event(DisasterType::Weather, Severity::Low);

        e.timestamp = now - Duration::minutes(30);
        assert_eq!(e.age_label(now), "Less than 1 hour ago");

        e.timestamp = now - Duration::minutes(90);
        assert_eq!(e.age_label(now), "1 hour ago");

        e.timestamp = now - Duration::hours(5);
        assert_eq!(e.age_label(now), "5 hours ago");
    }

    #[test]
    fn test_summary_from_events() {
        let events = vec![
            event(DisasterType::Earthquake, Severity::Extreme),
            event(DisasterType::Hurricane, Severity::High),
            event(DisasterType::Tornado, Severity::High),
            event(DisasterType::Wildfire, Severity::Moderate),
            event(DisasterType::Heatwave, Severity::Low),
        ];

        let summary = FeedSummary::from_events(&events);

        assert_eq!(summary.total, 5);
        assert_eq!(summary.earthquakes, 1);
        assert_eq!(summary.storms, 2);
        assert_eq!(summary.wildfires, 1);
        assert_eq!(summary.floods, 0);
        assert_eq!(summary.other, 1);
        assert_eq!(summary.extreme_count, 1);
        assert_eq!(summary.high_count, 2);
        assert_eq!(summary.low_count, 1);
    }
}
