//! Disaster Feed - aggregates public disaster feeds for emergency coordination.
//!
//! # Overview
//!
//! Three public feeds are polled concurrently and normalized into one
//! [`model::DisasterEvent`] shape:
//!
//! - USGS significant earthquakes
//! - National Weather Service active alerts
//! - NASA FIRMS active fire detections
//!
//! The merged list is ranked by severity and recency and capped at ten
//! events. A proximity view filters it to a radius around a reference
//! location and sorts it nearest first.
//!
//! A failing feed never takes the others down: it simply contributes no
//! events. Only when every feed fails is an error reported, and the
//! previous list is kept.
//!
//! # Modules
//!
//! - [`model`]: Event types and API payloads
//! - [`data_sources`]: Upstream clients and their adapters
//! - [`aggregation`]: Concurrent fan-out, merge, rank and truncate
//! - [`proximity`]: Haversine distance and the proximity feed
//! - [`geolocation`]: Location providers and the location tracker
//! - [`feed`]: Published feed state
//! - [`scheduler`]: Cancellable periodic tasks
//! - [`monitor`]: Root scope owning the refresh loops
//! - [`config`]: Environment configuration
//! - [`api`]: HTTP API handlers

pub mod aggregation;
pub mod api;
pub mod config;
pub mod data_sources;
pub mod feed;
pub mod geolocation;
pub mod model;
pub mod monitor;
pub mod proximity;
pub mod scheduler;
