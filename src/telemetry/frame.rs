//! # Frame Parser
//!
//! Decodes one raw serial line into three independently-validated channel
//! readings.
//!
//! Each field is parsed on its own: a corrupted field degrades one signal to
//! a fallback value with its validity flag cleared, never the whole frame.

use std::fmt;
use std::time::Instant;

use tracing::debug;

use crate::error::{Result, StationError};

/// Number of sensor channels in a frame
pub const CHANNEL_COUNT: usize = 3;

/// Value substituted for a field that failed to parse
pub const FIELD_FALLBACK: f64 = 0.1;

/// A line is only processed if its trimmed length exceeds this many bytes
/// (guards against empty and partial reads)
pub const MIN_LINE_LEN: usize = 2;

/// One of the three measured quantities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    /// BMP180 temperature, raw field in degrees Celsius
    Temperature,
    /// BMP180 pressure, raw field in hectopascal
    Pressure,
    /// PPD42NS dust concentration, raw field in pcs/L
    Particulates,
}

impl ChannelId {
    /// All channels in frame field order
    pub const ALL: [ChannelId; CHANNEL_COUNT] = [
        ChannelId::Temperature,
        ChannelId::Pressure,
        ChannelId::Particulates,
    ];

    /// Position of this channel's field in a frame
    pub fn index(self) -> usize {
        match self {
            ChannelId::Temperature => 0,
            ChannelId::Pressure => 1,
            ChannelId::Particulates => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ChannelId::Temperature => "temperature",
            ChannelId::Pressure => "pressure",
            ChannelId::Particulates => "particulates",
        }
    }

    /// Record store table name for this channel
    pub fn table(self) -> &'static str {
        match self {
            ChannelId::Temperature => "temp",
            ChannelId::Pressure => "press",
            ChannelId::Particulates => "poll",
        }
    }

    /// Label of the fixed internal unit used for cross-channel computation
    pub fn canonical_label(self) -> &'static str {
        match self {
            ChannelId::Temperature => "K",
            ChannelId::Pressure => "Pa",
            ChannelId::Particulates => "pcs/L",
        }
    }

    /// Convert a raw sensor field to the channel's canonical unit.
    ///
    /// Temperature arrives in degrees Celsius and is tracked in Kelvin;
    /// pressure arrives in hectopascal and is tracked in pascal. This is
    /// independent of the user-selected display unit.
    pub fn canonical_from_raw(self, raw: f64) -> f64 {
        match self {
            ChannelId::Temperature => raw + 273.15,
            ChannelId::Pressure => raw * 100.0,
            ChannelId::Particulates => raw,
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single validated channel value
#[derive(Debug, Clone, Copy)]
pub struct Reading {
    pub channel: ChannelId,

    /// Parsed field value, or [`FIELD_FALLBACK`] when `valid` is false
    pub value: f64,

    /// False when the field failed to parse or the link is down
    pub valid: bool,

    /// Monotonic instant the frame was decoded
    pub timestamp: Instant,
}

impl Reading {
    /// A stale placeholder reading, used before any frame has arrived
    pub fn placeholder(channel: ChannelId) -> Self {
        Self {
            channel,
            value: FIELD_FALLBACK,
            valid: false,
            timestamp: Instant::now(),
        }
    }
}

/// Parse one raw line into three channel readings.
///
/// Returns `None` when the trimmed line is too short to be a frame; the
/// caller keeps its previously cached readings (last-known-value semantics).
/// Fields are parsed independently: a malformed field yields
/// [`FIELD_FALLBACK`] with `valid = false` without blocking the others, and
/// a frame with fewer than three fields marks the missing ones invalid.
pub fn parse_line(line: &str) -> Option<[Reading; CHANNEL_COUNT]> {
    let trimmed = line.trim();
    if trimmed.len() <= MIN_LINE_LEN {
        return None;
    }

    let mut fields = trimmed.split(',');
    let now = Instant::now();

    Some(ChannelId::ALL.map(|channel| match parse_field(fields.next()) {
        Ok(value) => Reading {
            channel,
            value,
            valid: true,
            timestamp: now,
        },
        Err(err) => {
            debug!(%channel, %err, "field parse failed");
            Reading {
                channel,
                value: FIELD_FALLBACK,
                valid: false,
                timestamp: now,
            }
        }
    }))
}

/// Whether every reading in a frame parsed cleanly
pub fn all_valid(readings: &[Reading; CHANNEL_COUNT]) -> bool {
    readings.iter().all(|r| r.valid)
}

fn parse_field(token: Option<&str>) -> Result<f64> {
    let token = token.ok_or_else(|| StationError::Frame("missing field".to_string()))?;
    token
        .trim()
        .parse::<f64>()
        .map_err(|err| StationError::Frame(format!("{:?}: {}", token, err)))
}
