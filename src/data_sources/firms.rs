//! NASA FIRMS (Fire Information for Resource Management System) client.
//!
//! FIRMS distributes near real-time active fire detections from the MODIS
//! and VIIRS instruments. The country endpoint returns comma-delimited text
//! with one detection per line after a header row.
//!
//! # API Reference
//!
//! See: <https://firms.modaps.eosdis.nasa.gov/api/country/>
//!
//! A free MAP_KEY is required.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};

use super::DEFAULT_REQUEST_TIMEOUT;
use crate::model::{Coordinates, DisasterEvent, DisasterType, FeedSource, Severity};

/// Base URL for the FIRMS API.
const FIRMS_API_BASE: &str = "https://firms.modaps.eosdis.nasa.gov";

/// Country queried when none is configured (ISO 3166-1 alpha-3).
pub const DEFAULT_COUNTRY: &str = "USA";

/// Number of raw lines kept after the header.
pub const MAX_DETECTIONS: usize = 5;

const FIRE_GUIDANCE: [&str; 4] = [
    "Evacuate if in immediate danger",
    "Follow evacuation routes",
    "Monitor air quality",
    "Stay informed through emergency broadcasts",
];

/// Client for FIRMS active fire detections.
#[derive(Clone)]
pub struct FirmsClient {
    client: reqwest::Client,
    base_url: String,
    map_key: String,
    country: String,
    days: u8,
    timeout: Duration,
}

impl FirmsClient {
    /// Create a new FIRMS client.
    ///
    /// # Arguments
    ///
    /// * `map_key` - FIRMS MAP_KEY obtained from registration.
    pub fn new(map_key: &str) -> Self {
        Self::with_base_url(FIRMS_API_BASE, map_key)
    }

    /// Create a client with a custom base URL (for testing).
    pub fn with_base_url(base_url: &str, map_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            map_key: map_key.to_string(),
            country: DEFAULT_COUNTRY.to_string(),
            days: 1,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Query a different country (ISO 3166-1 alpha-3).
    pub fn with_country(mut self, country: &str) -> Self {
        self.country = country.to_uppercase();
        self
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch the raw CSV body of recent detections.
    pub async fn get_country_csv(&self) -> anyhow::Result<String> {
        let url = format!(
            "{}/api/country/csv/{}/{}/{}",
            self.base_url,
            urlencoding::encode(&self.map_key),
            urlencoding::encode(&self.country),
            self.days
        );

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        let text = response.text().await?;
        Ok(text)
    }

    /// Fetch and normalize the first [`MAX_DETECTIONS`] detections.
    pub async fn fetch_events(&self) -> anyhow::Result<Vec<DisasterEvent>> {
        let text = self.get_country_csv().await?;
        Ok(parse_detections(&text))
    }
}

/// Map a detection confidence percentage onto the shared scale.
///
/// - `> 80`: high
/// - `> 50`: moderate
/// - otherwise: low
pub fn confidence_severity(confidence: f64) -> Severity {
    if confidence > 80.0 {
        Severity::High
    } else if confidence > 50.0 {
        Severity::Moderate
    } else {
        Severity::Low
    }
}

/// Parse a confidence column. VIIRS reports l/n/h instead of a percentage.
fn parse_confidence(raw: &str) -> f64 {
    match raw.trim().to_ascii_lowercase().as_str() {
        "l" | "low" => 0.0,
        "n" | "nominal" => 50.0,
        "h" | "high" => 100.0,
        other => other.parse().unwrap_or(0.0),
    }
}

/// Combine `acq_date` (YYYY-MM-DD) and `acq_time` (HHMM, possibly unpadded) as UTC.
fn parse_acquisition_time(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let time = format!("{:0>4}", time.trim());
    NaiveDateTime::parse_from_str(&format!("{} {}", date.trim(), time), "%Y-%m-%d %H%M")
        .ok()
        .map(|dt| dt.and_utc())
}

/// Parse a FIRMS CSV body: drop the header, keep the first
/// [`MAX_DETECTIONS`] raw lines, skip blanks and unparseable rows.
pub fn parse_detections(text: &str) -> Vec<DisasterEvent> {
    text.lines()
        .skip(1)
        .take(MAX_DETECTIONS)
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(index, line)| {
            let event = parse_detection(index, line);
            if event.is_none() {
                tracing::debug!(line = %line, "Skipping malformed fire detection");
            }
            event
        })
        .collect()
}

/// Parse a single detection row.
///
/// Columns: lat, lng, brightness, scan, track, acq_date, acq_time,
/// satellite, confidence, version, bright_t31, frp, daynight.
pub fn parse_detection(index: usize, line: &str) -> Option<DisasterEvent> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < 9 {
        return None;
    }

    let lat: f64 = fields[0].parse().ok()?;
    let lng: f64 = fields[1].parse().ok()?;
    let coordinates = Coordinates::new(lat, lng)?;
    let timestamp = parse_acquisition_time(fields[5], fields[6])?;
    let confidence = fields[8];

    Some(DisasterEvent {
        id: format!("{}:{}", FeedSource::Firms.id_prefix(), index),
        source: FeedSource::Firms,
        disaster_type: DisasterType::Wildfire,
        title: "Active Fire Detection".to_string(),
        location: format!("{:.2}, {:.2}", lat, lng),
        severity: confidence_severity(parse_confidence(confidence)),
        timestamp,
        coordinates: Some(coordinates),
        magnitude: None,
        description: format!("Fire detected with {}% confidence", confidence),
        instructions: FIRE_GUIDANCE.iter().map(|s| s.to_string()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "latitude,longitude,brightness,scan,track,acq_date,acq_time,satellite,confidence,version,bright_t31,frp,daynight";

    #[test]
    fn test_confidence_bands() {
        assert_eq!(confidence_severity(81.0), Severity::High);
        assert_eq!(confidence_severity(80.0), Severity::Moderate);
        assert_eq!(confidence_severity(79.9), Severity::Moderate);
        assert_eq!(confidence_severity(51.0), Severity::Moderate);
        assert_eq!(confidence_severity(50.0), Severity::Low);
        assert_eq!(confidence_severity(49.9), Severity::Low);
        assert_eq!(confidence_severity(0.0), Severity::Low);
    }

    #[test]
    fn test_viirs_letter_confidence() {
        assert_eq!(parse_confidence("h"), 100.0);
        assert_eq!(parse_confidence("n"), 50.0);
        assert_eq!(parse_confidence("l"), 0.0);
        assert_eq!(parse_confidence("87"), 87.0);
        assert_eq!(parse_confidence("garbage"), 0.0);
    }

    #[test]
    fn test_acquisition_time_padding() {
        let ts = parse_acquisition_time("2024-08-10", "130").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-08-10T01:30:00+00:00");

        let ts = parse_acquisition_time("2024-08-10", "2359").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-08-10T23:59:00+00:00");

        assert!(parse_acquisition_time("10/08/2024", "0130").is_none());
    }

    #[test]
    fn test_parse_detection() {
        let line = "34.12345,-118.54321,330.5,0.4,0.4,2024-08-10,0945,N,92,2.0NRT,290.1,12.3,D";

        let event = parse_detection(0, line).unwrap();

        assert_eq!(event.id, "firms:0");
        assert_eq!(event.disaster_type, DisasterType::Wildfire);
        assert_eq!(event.severity, Severity::High);
        assert_eq!(event.location, "34.12, -118.54");
        assert_eq!(event.description, "Fire detected with 92% confidence");
        let coords = event.coordinates.unwrap();
        assert_eq!(coords.lat(), 34.12345);
        assert_eq!(coords.lng(), -118.54321);
    }

    #[test]
    fn test_parse_detections_takes_first_five_after_header() {
        let rows: Vec<String> = (0..8)
            .map(|i| {
                format!(
                    "{}.0,-120.0,300,0.4,0.4,2024-08-10,1200,N,60,2.0NRT,290,10,D",
                    30 + i
                )
            })
            .collect();
        let text = format!("{}\n{}\n", HEADER, rows.join("\n"));

        let events = parse_detections(&text);

        assert_eq!(events.len(), MAX_DETECTIONS);
        assert_eq!(events[0].coordinates.unwrap().lat(), 30.0);
        assert_eq!(events[4].id, "firms:4");
    }

    #[test]
    fn test_parse_detections_skips_blank_and_malformed_rows() {
        let text = format!(
            "{}\n\n91.0,0.0,300,0.4,0.4,2024-08-10,1200,N,60,2.0NRT,290,10,D\n40.0,-100.0,300,0.4,0.4,2024-08-10,1200,N,40,2.0NRT,290,10,D\n",
            HEADER
        );

        let events = parse_detections(&text);

        // Blank line and out-of-range latitude are dropped; ids keep their raw position.
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "firms:2");
        assert_eq!(events[0].severity, Severity::Low);
    }

    #[test]
    fn test_header_only_yields_nothing() {
        assert!(parse_detections(HEADER).is_empty());
        assert!(parse_detections("").is_empty());
    }
}
