//! # Telemetry Module
//!
//! Decoding, buffering and scaling of the payload's sensor channels.
//!
//! This module handles:
//! - Frame decoding (three comma-separated fields, per-field validation)
//! - Fixed-capacity append-only sample series
//! - Display-unit state machines and the conversion table
//! - Running statistics and the interquartile mean estimator
//! - Altitude derivation via the hypsometric formula

pub mod derived;
pub mod frame;
pub mod series;
pub mod stats;
pub mod units;
