//! # Derived Metrics
//!
//! Quantities computed on demand from canonical-unit readings; nothing here
//! is buffered.

/// Standard sea-level reference pressure in pascal
pub const SEA_LEVEL_PRESSURE_PA: f64 = 101_325.0;

/// Altitude above the reference level via the hypsometric formula.
///
/// `reference_pa` is the sea-level reference pressure, `pressure_pa` the
/// current canonical pressure and `temperature_k` the current canonical
/// temperature in Kelvin.
pub fn hypsometric_altitude(reference_pa: f64, pressure_pa: f64, temperature_k: f64) -> f64 {
    ((reference_pa / pressure_pa).powf(1.0 / 5.257) - 1.0) * temperature_k / 0.0065
}
