//! Great-circle distance and the proximity feed.
//!
//! The proximity feed is a derived view of the merged event list: only
//! events with coordinates inside the search radius, nearest first.

use crate::model::{Coordinates, DisasterEvent, NearbyDisaster};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Default search radius for the proximity feed.
pub const DEFAULT_RADIUS_KM: f64 = 500.0;

/// Calculate the great-circle distance between two points in kilometers.
///
/// Uses the haversine formula:
///
/// ```text
/// a = sin²(Δlat/2) + cos(lat1)·cos(lat2)·sin²(Δlng/2)
/// d = 2 · R · atan2(√a, √(1−a))
/// ```
pub fn distance_km(from: Coordinates, to: Coordinates) -> f64 {
    let dlat = (to.lat() - from.lat()).to_radians();
    let dlng = (to.lng() - from.lng()).to_radians();

    // Rounding can push `a` just past 1 for near-antipodal points.
    let a = ((dlat / 2.0).sin().powi(2)
        + from.lat().to_radians().cos() * to.lat().to_radians().cos() * (dlng / 2.0).sin().powi(2))
    .clamp(0.0, 1.0);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Filter events to those within `radius_km` of `origin`, nearest first.
///
/// Events without coordinates are dropped. The sort is stable, so events
/// at equal distance keep their incoming (severity, recency) order.
pub fn proximity_filter(
    events: &[DisasterEvent],
    origin: Coordinates,
    radius_km: f64,
) -> Vec<NearbyDisaster> {
    let mut nearby: Vec<NearbyDisaster> = events
        .iter()
        .filter_map(|event| {
            let coordinates = event.coordinates?;
            let distance = distance_km(origin, coordinates);
            (distance <= radius_km).then(|| NearbyDisaster {
                event: event.clone(),
                distance_km: distance,
                distance_label: format_distance(distance),
            })
        })
        .collect();

    nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    nearby
}

/// Render a distance for display: meters below 1 km, whole kilometers above.
pub fn format_distance(distance_km: f64) -> String {
    if distance_km < 1.0 {
        format!("{}m away", (distance_km * 1000.0).round() as i64)
    } else {
        format!("{}km away", distance_km.round() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DisasterType, FeedSource, Severity};
    use chrono::Utc;

    fn point(lat: f64, lng: f64) -> Coordinates {
        Coordinates::new(lat, lng).unwrap()
    }

    fn event_at(id: &str, coordinates: Option<Coordinates>) -> DisasterEvent {
        DisasterEvent {
            id: id.to_string(),
            source: FeedSource::Usgs,
            disaster_type: DisasterType::Earthquake,
            title: id.to_string(),
            location: "Test".to_string(),
            severity: Severity::Moderate,
            timestamp: Utc::now(),
            coordinates,
            magnitude: Some(4.5),
            description: String::new(),
            instructions: vec![],
        }
    }

    #[test]
    fn test_distance_is_symmetric() {
        let minneapolis = point(44.9778, -93.2650);
        let chicago = point(41.8781, -87.6298);

        let there = distance_km(minneapolis, chicago);
        let back = distance_km(chicago, minneapolis);

        assert!((there - back).abs() < 1e-9);
        // ~570 km
        assert!(there > 550.0 && there < 590.0);
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let p = point(35.6762, 139.6503);
        assert_eq!(distance_km(p, p), 0.0);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let d = distance_km(point(0.0, 0.0), point(1.0, 0.0));
        assert!((d - 111.19).abs() < 111.19 * 0.01, "got {}", d);
    }

    #[test]
    fn test_antipodal_distance_is_half_circumference() {
        let half = std::f64::consts::PI * EARTH_RADIUS_KM;

        for lat in (-90..=90).step_by(3) {
            for lng in (-180..=180).step_by(5) {
                let from = point(lat as f64, lng as f64);
                let to = point(-lat as f64, (lng as f64 + 180.0).rem_euclid(360.0) - 180.0);
                let d = distance_km(from, to);
                assert!((d - half).abs() < 0.01, "({}, {}) -> {}", lat, lng, d);
            }
        }

        let events = vec![event_at("antipode", Some(point(-10.0, -170.0)))];
        let nearby = proximity_filter(&events, point(10.0, 10.0), 25_000.0);
        assert_eq!(nearby.len(), 1);
    }

    #[test]
    fn test_filter_radius_boundary() {
        let events = vec![
            event_at("far", Some(point(5.0, 0.0))),
            event_at("near", Some(point(4.0, 0.0))),
        ];

        let nearby = proximity_filter(&events, point(0.0, 0.0), DEFAULT_RADIUS_KM);

        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].event.id, "near");
        assert!((nearby[0].distance_km - 444.8).abs() < 1.0);
    }

    #[test]
    fn test_filter_excludes_missing_coordinates() {
        let events = vec![
            event_at("nowhere", None),
            event_at("here", Some(point(0.0, 0.1))),
        ];

        let nearby = proximity_filter(&events, point(0.0, 0.0), DEFAULT_RADIUS_KM);

        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].event.id, "here");
    }

    #[test]
    fn test_filter_sorts_by_distance_and_is_stable() {
        let events = vec![
            event_at("b", Some(point(2.0, 0.0))),
            event_at("a1", Some(point(1.0, 0.0))),
            event_at("c", Some(point(3.0, 0.0))),
            event_at("a2", Some(point(1.0, 0.0))),
        ];

        let nearby = proximity_filter(&events, point(0.0, 0.0), DEFAULT_RADIUS_KM);
        let ids: Vec<&str> = nearby.iter().map(|n| n.event.id.as_str()).collect();

        assert_eq!(ids, vec!["a1", "a2", "b", "c"]);
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(0.4567), "457m away");
        assert_eq!(format_distance(1.0), "1km away");
        assert_eq!(format_distance(12.6), "13km away");
    }
}
