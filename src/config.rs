//! Runtime configuration from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `DISASTER_FEED_PORT` | 3000 |
//! | `DISASTER_FEED_USGS_URL` | USGS summary feed base |
//! | `DISASTER_FEED_NWS_URL` | `https://api.weather.gov` |
//! | `DISASTER_FEED_FIRMS_URL` | FIRMS API base |
//! | `DISASTER_FEED_FIRMS_MAP_KEY` | unset (fire feed disabled) |
//! | `DISASTER_FEED_FIRMS_COUNTRY` | `USA` |
//! | `DISASTER_FEED_REFRESH_SECS` | 300 |
//! | `DISASTER_FEED_LOCATION_REFRESH_SECS` | 30 |
//! | `DISASTER_FEED_REQUEST_TIMEOUT_SECS` | 15 |
//! | `DISASTER_FEED_ORIGIN_LAT` / `DISASTER_FEED_ORIGIN_LNG` | unset |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::aggregation::FeedAggregator;
use crate::data_sources::{FirmsClient, NwsClient, UsgsClient, firms};
use crate::model::Coordinates;

/// Default port if not specified via environment variable.
pub const DEFAULT_PORT: u16 = 3000;

/// Disaster feeds are re-fetched every five minutes.
pub const DEFAULT_REFRESH: Duration = Duration::from_secs(5 * 60);

/// The location reference is refreshed every thirty seconds.
pub const DEFAULT_LOCATION_REFRESH: Duration = Duration::from_secs(30);

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("DISASTER_FEED_ORIGIN_LAT and DISASTER_FEED_ORIGIN_LNG must be set together")]
    PartialOrigin,

    #[error("origin ({lat}, {lng}) is not a valid coordinate")]
    InvalidOrigin { lat: f64, lng: f64 },
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub usgs_url: Option<String>,
    pub nws_url: Option<String>,
    pub firms_url: Option<String>,
    /// Fire detections are only fetched when a MAP_KEY is configured.
    pub firms_map_key: Option<String>,
    pub firms_country: String,
    pub refresh_interval: Duration,
    pub location_refresh_interval: Duration,
    pub request_timeout: Duration,
    /// Fixed reference point for the proximity feed.
    pub origin: Option<Coordinates>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            usgs_url: None,
            nws_url: None,
            firms_url: None,
            firms_map_key: None,
            firms_country: firms::DEFAULT_COUNTRY.to_string(),
            refresh_interval: DEFAULT_REFRESH,
            location_refresh_interval: DEFAULT_LOCATION_REFRESH,
            request_timeout: crate::data_sources::DEFAULT_REQUEST_TIMEOUT,
            origin: None,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = parse_or(&get, "DISASTER_FEED_PORT", defaults.port)?;
        let refresh_interval = seconds_or(
            &get,
            "DISASTER_FEED_REFRESH_SECS",
            defaults.refresh_interval,
        )?;
        let location_refresh_interval = seconds_or(
            &get,
            "DISASTER_FEED_LOCATION_REFRESH_SECS",
            defaults.location_refresh_interval,
        )?;
        let request_timeout = seconds_or(
            &get,
            "DISASTER_FEED_REQUEST_TIMEOUT_SECS",
            defaults.request_timeout,
        )?;

        let lat: Option<f64> = parse_opt(&get, "DISASTER_FEED_ORIGIN_LAT")?;
        let lng: Option<f64> = parse_opt(&get, "DISASTER_FEED_ORIGIN_LNG")?;
        let origin = match (lat, lng) {
            (Some(lat), Some(lng)) => {
                Some(Coordinates::new(lat, lng).ok_or(ConfigError::InvalidOrigin { lat, lng })?)
            }
            (None, None) => None,
            _ => return Err(ConfigError::PartialOrigin),
        };

        Ok(Self {
            port,
            usgs_url: get("DISASTER_FEED_USGS_URL"),
            nws_url: get("DISASTER_FEED_NWS_URL"),
            firms_url: get("DISASTER_FEED_FIRMS_URL"),
            firms_map_key: get("DISASTER_FEED_FIRMS_MAP_KEY"),
            firms_country: get("DISASTER_FEED_FIRMS_COUNTRY").unwrap_or(defaults.firms_country),
            refresh_interval,
            location_refresh_interval,
            request_timeout,
            origin,
        })
    }

    /// Build the feed aggregator described by this configuration.
    pub fn aggregator(&self) -> FeedAggregator {
        let usgs = match &self.usgs_url {
            Some(url) => UsgsClient::with_base_url(url),
            None => UsgsClient::new(),
        }
        .with_timeout(self.request_timeout);

        let nws = match &self.nws_url {
            Some(url) => NwsClient::with_base_url(url),
            None => NwsClient::new(),
        }
        .with_timeout(self.request_timeout);

        let firms = self.firms_map_key.as_deref().map(|key| {
            match &self.firms_url {
                Some(url) => FirmsClient::with_base_url(url, key),
                None => FirmsClient::new(key),
            }
            .with_country(&self.firms_country)
            .with_timeout(self.request_timeout)
        });

        FeedAggregator::new(usgs, nws, firms)
    }
}

fn parse_opt<T, G>(get: &G, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(None),
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(get, var)?.unwrap_or(default))
}

fn seconds_or<G>(get: &G, var: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match parse_opt::<u64, _>(get, var)? {
        Some(0) => Err(ConfigError::Zero(var)),
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Ok(default),
    }
}
