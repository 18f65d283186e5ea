//! # CanSat Station Library
//!
//! Ground-station acquisition core for a CanSat sensor payload.
//!
//! This library turns raw serial lines from the payload (temperature,
//! pressure, particulate count) into a validated, buffered, unit-convertible
//! time series with periodic persistence to an embedded sqlite store.

pub mod config;
pub mod error;
pub mod link;
pub mod notice;
pub mod pipeline;
pub mod store;
pub mod telemetry;
