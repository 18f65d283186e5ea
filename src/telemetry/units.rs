//! # Unit Conversion Engine
//!
//! Per-channel display-scale state machines and the temperature conversion
//! table.
//!
//! Every channel tracks a canonical value (Kelvin, pascal, pcs/L) recomputed
//! from the raw sensor field on each sample; the display unit governs only
//! how buffered history is rendered. Changing the display unit rewrites the
//! already-stored history in place through one of the statically-typed
//! conversion functions below.

use std::fmt;

use crate::error::{Result, StationError};
use crate::telemetry::frame::ChannelId;

/// A history-rewrite conversion between two display units
pub type Convert = fn(f64) -> f64;

/// Temperature display units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempUnit {
    Kelvin,
    Celsius,
    Fahrenheit,
}

impl TempUnit {
    pub const ALL: [TempUnit; 3] = [TempUnit::Kelvin, TempUnit::Celsius, TempUnit::Fahrenheit];

    pub fn label(self) -> &'static str {
        match self {
            TempUnit::Kelvin => "K",
            TempUnit::Celsius => "C",
            TempUnit::Fahrenheit => "F",
        }
    }

    /// Preset display range (min, max) for this unit
    pub fn display_range(self) -> (f64, f64) {
        match self {
            TempUnit::Kelvin => (290.0, 310.0),
            TempUnit::Celsius => (17.0, 37.0),
            TempUnit::Fahrenheit => (62.0, 98.0),
        }
    }

    /// Scale a raw sensor field (degrees Celsius) to this display unit
    pub fn display_from_raw(self, raw: f64) -> f64 {
        match self {
            TempUnit::Kelvin => raw + 273.15,
            TempUnit::Celsius => raw,
            TempUnit::Fahrenheit => raw * 1.8 + 32.0,
        }
    }
}

impl fmt::Display for TempUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Pressure display units (single entry; the payload reports hectopascal,
/// rendered in pascal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressureUnit {
    Pascal,
}

impl PressureUnit {
    pub fn label(self) -> &'static str {
        "Pa"
    }

    pub fn display_range(self) -> (f64, f64) {
        (80_000.0, 130_000.0)
    }

    pub fn display_from_raw(self, raw: f64) -> f64 {
        raw * 100.0
    }
}

/// Particulate-count display units (single entry)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticulateUnit {
    PcsPerLiter,
}

impl ParticulateUnit {
    pub fn label(self) -> &'static str {
        "pcs/L"
    }

    pub fn display_range(self) -> (f64, f64) {
        (0.0, 40_000.0)
    }

    pub fn display_from_raw(self, raw: f64) -> f64 {
        raw
    }
}

fn celsius_to_kelvin(v: f64) -> f64 {
    v + 273.15
}

fn kelvin_to_celsius(v: f64) -> f64 {
    v - 273.15
}

fn celsius_to_fahrenheit(v: f64) -> f64 {
    v * 1.8 + 32.0
}

fn fahrenheit_to_celsius(v: f64) -> f64 {
    (v - 32.0) / 1.8
}

fn kelvin_to_fahrenheit(v: f64) -> f64 {
    (v - 273.15) * 1.8 + 32.0
}

fn fahrenheit_to_kelvin(v: f64) -> f64 {
    (v - 32.0) / 1.8 + 273.15
}

/// Conversion table keyed by the ordered pair (from, to).
///
/// Must stay complete for all ordered pairs among [`TempUnit::ALL`]; a
/// missing pair is a configuration error caught at startup.
const TEMP_CONVERSIONS: [(TempUnit, TempUnit, Convert); 6] = [
    (TempUnit::Celsius, TempUnit::Kelvin, celsius_to_kelvin),
    (TempUnit::Kelvin, TempUnit::Celsius, kelvin_to_celsius),
    (TempUnit::Celsius, TempUnit::Fahrenheit, celsius_to_fahrenheit),
    (TempUnit::Fahrenheit, TempUnit::Celsius, fahrenheit_to_celsius),
    (TempUnit::Kelvin, TempUnit::Fahrenheit, kelvin_to_fahrenheit),
    (TempUnit::Fahrenheit, TempUnit::Kelvin, fahrenheit_to_kelvin),
];

/// Look up the conversion for an ordered unit pair
///
/// # Errors
///
/// Returns [`StationError::MissingConversion`] when the table has no entry
/// for the pair.
pub fn conversion(from: TempUnit, to: TempUnit) -> Result<Convert> {
    TEMP_CONVERSIONS
        .iter()
        .find(|(f, t, _)| *f == from && *t == to)
        .map(|(_, _, convert)| *convert)
        .ok_or(StationError::MissingConversion {
            from: from.label(),
            to: to.label(),
        })
}

/// Verify the conversion table covers every ordered pair of distinct units.
///
/// Called once at pipeline construction; an incomplete table aborts startup.
pub fn validate_conversion_table() -> Result<()> {
    for from in TempUnit::ALL {
        for to in TempUnit::ALL {
            if from != to {
                conversion(from, to)?;
            }
        }
    }
    Ok(())
}

/// Display-unit state machine for the temperature channel.
///
/// `adjusted` is cleared while a history-rewrite pass is pending so a stray
/// re-entrant call cannot double-apply the conversion delta.
#[derive(Debug)]
pub struct TempUnitState {
    current: TempUnit,
    adjusted: bool,
}

impl TempUnitState {
    pub fn new(initial: TempUnit) -> Self {
        Self {
            current: initial,
            adjusted: true,
        }
    }

    pub fn current(&self) -> TempUnit {
        self.current
    }

    /// Start a unit change, returning the history-rewrite conversion.
    ///
    /// Returns `Ok(None)` when `target` equals the current unit (exact enum
    /// equality) or when a rewrite pass is already pending.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::MissingConversion`] for a pair absent from
    /// the table.
    pub fn begin(&mut self, target: TempUnit) -> Result<Option<Convert>> {
        if target == self.current {
            return Ok(None);
        }
        if !self.adjusted {
            return Ok(None);
        }
        let convert = conversion(self.current, target)?;
        self.adjusted = false;
        Ok(Some(convert))
    }

    /// Complete a unit change after the full history rewrite
    pub fn commit(&mut self, target: TempUnit) {
        self.current = target;
        self.adjusted = true;
    }
}

/// Display scale of one channel
#[derive(Debug)]
pub enum ChannelScale {
    Temperature(TempUnitState),
    Pressure(PressureUnit),
    Particulates(ParticulateUnit),
}

impl ChannelScale {
    /// Default scale for a channel (temperature starts in Kelvin)
    pub fn for_channel(id: ChannelId) -> Self {
        match id {
            ChannelId::Temperature => ChannelScale::Temperature(TempUnitState::new(TempUnit::Kelvin)),
            ChannelId::Pressure => ChannelScale::Pressure(PressureUnit::Pascal),
            ChannelId::Particulates => ChannelScale::Particulates(ParticulateUnit::PcsPerLiter),
        }
    }

    /// Label of the active display unit
    pub fn label(&self) -> &'static str {
        match self {
            ChannelScale::Temperature(state) => state.current().label(),
            ChannelScale::Pressure(unit) => unit.label(),
            ChannelScale::Particulates(unit) => unit.label(),
        }
    }

    /// Preset display range of the active display unit
    pub fn display_range(&self) -> (f64, f64) {
        match self {
            ChannelScale::Temperature(state) => state.current().display_range(),
            ChannelScale::Pressure(unit) => unit.display_range(),
            ChannelScale::Particulates(unit) => unit.display_range(),
        }
    }

    /// Scale a raw sensor field to the active display unit
    pub fn display_from_raw(&self, raw: f64) -> f64 {
        match self {
            ChannelScale::Temperature(state) => state.current().display_from_raw(raw),
            ChannelScale::Pressure(unit) => unit.display_from_raw(raw),
            ChannelScale::Particulates(unit) => unit.display_from_raw(raw),
        }
    }

    /// The temperature state machine, for channels that have one
    pub fn temperature_mut(&mut self) -> Option<&mut TempUnitState> {
        match self {
            ChannelScale::Temperature(state) => Some(state),
            _ => None,
        }
    }
}
