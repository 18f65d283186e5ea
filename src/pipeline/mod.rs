//! # Acquisition Pipeline
//!
//! Owns the link manager, the three channel states and the record store,
//! and drives them from the periodic tick callbacks.
//!
//! This module handles:
//! - The fast tick: frame polling, parsing, buffering
//! - The mean tick: temperature running statistics
//! - The slow tick: health reporting and record persistence
//! - The passive tick: notice-window reset
//! - The read-only consumer contract and the unit-change command
//!
//! All mutation happens inside tick callbacks or command calls that run to
//! completion before the next tick fires, so there is a single writer per
//! field and no locking.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::link::{LinkManager, LinkStatus};
use crate::notice::NoticeBoard;
use crate::store::RecordStore;
use crate::telemetry::derived::{hypsometric_altitude, SEA_LEVEL_PRESSURE_PA};
use crate::telemetry::frame::{parse_line, ChannelId, Reading, FIELD_FALLBACK};
use crate::telemetry::series::{Sample, Series};
use crate::telemetry::stats::{interquartile_mean, RunningMean};
use crate::telemetry::units::{validate_conversion_table, ChannelScale, TempUnit};

/// Notice for a failed serial read; repeated losses coalesce per window
pub const NOTICE_LOST_SIGNAL: &str = "00A-Lost signal";

/// Log line for a successful reconnect
pub const NOTICE_SIGNAL_FOUND: &str = "00B-Signal found";

/// Notice for a failed record write
pub const NOTICE_RECORD_FAILED: &str = "00C-Record write failed";

/// Mean series and running statistics for channels that maintain them
#[derive(Debug)]
struct MeanTrack {
    series: Series,
    stats: RunningMean,
}

/// One channel's stage of the pipeline: cached raw value, current display
/// reading, canonical value and buffered history
#[derive(Debug)]
struct ChannelState {
    id: ChannelId,
    reading: Reading,
    canonical: f64,
    last_raw: f64,
    scale: ChannelScale,
    display_range: (f64, f64),
    series: Series,
    mean: Option<MeanTrack>,
}

impl ChannelState {
    fn new(id: ChannelId, capacity: usize) -> Self {
        let scale = ChannelScale::for_channel(id);
        let display_range = scale.display_range();
        let mean = match id {
            ChannelId::Temperature => Some(MeanTrack {
                series: Series::new("temperature mean", capacity),
                stats: RunningMean::new(),
            }),
            _ => None,
        };
        Self {
            id,
            reading: Reading::placeholder(id),
            canonical: id.canonical_from_raw(FIELD_FALLBACK),
            last_raw: FIELD_FALLBACK,
            display_range,
            scale,
            series: Series::new(id.name(), capacity),
            mean,
        }
    }
}

/// Acquisition context shared between the pipeline stages.
///
/// The excluded presentation layer holds this by reference: reads through
/// the accessor methods, writes only through [`Self::set_temperature_unit`]
/// and [`Self::reset_view`].
#[derive(Debug)]
pub struct Acquisition {
    link: LinkManager,
    channels: [ChannelState; 3],
    notices: NoticeBoard,
    store: Option<RecordStore>,
    started: Instant,
    was_healthy: bool,
}

impl Acquisition {
    /// Build the pipeline around an already-constructed link manager.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::StationError::MissingConversion`] when the
    /// unit table is incomplete: a structural defect that must abort
    /// startup rather than corrupt history later.
    pub fn new(config: &Config, link: LinkManager, store: Option<RecordStore>) -> Result<Self> {
        validate_conversion_table()?;

        let capacity = config.acquisition.chunk_size;
        Ok(Self {
            link,
            channels: ChannelId::ALL.map(|id| ChannelState::new(id, capacity)),
            notices: NoticeBoard::new(),
            store,
            started: Instant::now(),
            was_healthy: false,
        })
    }

    /// Fast tick: poll the link, parse, refresh readings, append history.
    ///
    /// While the link is down the previously cached raw values keep being
    /// appended (last-known-value semantics), flagged invalid.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::StationError::Capacity`] when a series is
    /// full; acquisition must halt rather than silently drop samples.
    pub fn fast_tick(&mut self) -> Result<()> {
        self.acquire();

        let elapsed = self.started.elapsed().as_secs_f64();
        for channel in &mut self.channels {
            let display = channel.scale.display_from_raw(channel.last_raw);
            channel.canonical = channel.id.canonical_from_raw(channel.last_raw);
            channel.reading.value = display;
            channel.series.append(elapsed, display)?;
        }
        Ok(())
    }

    /// Poll one line and fold it into the cached readings; on read failure
    /// run the loss path (notice, clear validity, one bounded retry)
    fn acquire(&mut self) {
        match self.link.poll_line() {
            Ok(Some(line)) => {
                if let Some(parsed) = parse_line(&line) {
                    for (channel, reading) in self.channels.iter_mut().zip(parsed) {
                        channel.last_raw = reading.value;
                        channel.reading.valid = reading.valid;
                        channel.reading.timestamp = reading.timestamp;
                    }
                }
            }
            Ok(None) => {}
            Err(err) => {
                debug!(%err, "serial read failed");
                self.notices.notice(NOTICE_LOST_SIGNAL);
                for channel in &mut self.channels {
                    channel.reading.valid = false;
                }
                self.link.report_lost();
                if self.link.retry() {
                    info!(
                        port = self.link.port_name().unwrap_or("?"),
                        "{}", NOTICE_SIGNAL_FOUND
                    );
                }
            }
        }
    }

    /// Mean tick: fold the current display readings into the running
    /// statistics and their mean series
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::StationError::Capacity`] when a mean series
    /// is full.
    pub fn mean_tick(&mut self) -> Result<()> {
        let elapsed = self.started.elapsed().as_secs_f64();
        for channel in &mut self.channels {
            if let Some(track) = channel.mean.as_mut() {
                track.stats.push(channel.reading.value);
                track.series.append(elapsed, track.stats.mean())?;
            }
        }
        Ok(())
    }

    /// Slow tick: report health transitions and persist canonical readings
    pub fn slow_tick(&mut self) {
        self.log_health();
        self.persist();
    }

    /// Passive tick: open a new notice suppression window
    pub fn passive_tick(&mut self) {
        self.notices.reset();
    }

    fn log_health(&mut self) {
        let healthy = self.healthy();
        if healthy != self.was_healthy {
            if healthy {
                info!(port = self.link.port_name().unwrap_or("?"), "all channels healthy");
            } else {
                warn!(status = %self.link.status(), "acquisition degraded");
            }
            self.was_healthy = healthy;
        }
    }

    /// Append one canonical row per channel; failures are noticed, never
    /// propagated
    fn persist(&mut self) {
        let mut failed = false;
        if let Some(store) = &self.store {
            for channel in &self.channels {
                if let Err(err) =
                    store.append(channel.id, channel.canonical, channel.id.canonical_label())
                {
                    debug!(channel = %channel.id, %err, "record insert failed");
                    failed = true;
                }
            }
        }
        if failed {
            self.notices.notice(NOTICE_RECORD_FAILED);
        }
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Switch the temperature display unit, rewriting buffered history.
    ///
    /// Applies the table conversion for `(current, target)` in place to the
    /// raw series, the mean series, the running statistics and the current
    /// reading, then loads the new unit's preset display range. Selecting
    /// the unit already active is an exact no-op, which also makes a
    /// re-entrant second call harmless. Canonical values are untouched:
    /// they are recomputed from the raw field on every sample.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::StationError::MissingConversion`] when the
    /// pair is absent from the table.
    pub fn set_temperature_unit(&mut self, target: TempUnit) -> Result<()> {
        let channel = &mut self.channels[ChannelId::Temperature.index()];

        let convert = match channel.scale.temperature_mut() {
            Some(state) => match state.begin(target)? {
                Some(convert) => convert,
                None => return Ok(()),
            },
            None => return Ok(()),
        };

        channel.series.apply(convert);
        if let Some(track) = channel.mean.as_mut() {
            track.series.apply(convert);
            track.stats.apply(convert);
        }
        channel.reading.value = convert(channel.reading.value);

        if let Some(state) = channel.scale.temperature_mut() {
            state.commit(target);
        }
        channel.display_range = target.display_range();

        info!(unit = target.label(), "temperature display unit changed");
        Ok(())
    }

    /// Restore a channel's preset display range; no data mutation
    pub fn reset_view(&mut self, id: ChannelId) {
        let channel = &mut self.channels[id.index()];
        channel.display_range = channel.scale.display_range();
    }

    // ------------------------------------------------------------------
    // Consumer contract (read-only)
    // ------------------------------------------------------------------

    /// Current display-scale reading for a channel
    pub fn reading(&self, id: ChannelId) -> &Reading {
        &self.channels[id.index()].reading
    }

    pub fn link_status(&self) -> LinkStatus {
        self.link.status()
    }

    /// Link up and every channel parsing cleanly (the status-LED contract)
    pub fn healthy(&self) -> bool {
        self.link.status() == LinkStatus::Connected
            && self.channels.iter().all(|channel| channel.reading.valid)
    }

    /// Buffered history snapshot for plotting
    pub fn series(&self, id: ChannelId) -> &[Sample] {
        self.channels[id.index()].series.as_slice()
    }

    /// Mean-series snapshot, for channels that maintain one
    pub fn mean_series(&self, id: ChannelId) -> Option<&[Sample]> {
        self.channels[id.index()]
            .mean
            .as_ref()
            .map(|track| track.series.as_slice())
    }

    /// Running mean over the channel's statistics samples
    pub fn running_mean(&self, id: ChannelId) -> Option<f64> {
        self.channels[id.index()]
            .mean
            .as_ref()
            .filter(|track| !track.stats.is_empty())
            .map(|track| track.stats.mean())
    }

    /// Interquartile mean over the channel's statistics samples.
    ///
    /// Available estimator; nothing in the core consumes it.
    pub fn interquartile_mean(&self, id: ChannelId) -> Option<f64> {
        self.channels[id.index()]
            .mean
            .as_ref()
            .and_then(|track| interquartile_mean(track.stats.samples()))
    }

    /// Altitude above sea level from the canonical pressure and temperature
    pub fn altitude(&self) -> f64 {
        hypsometric_altitude(
            SEA_LEVEL_PRESSURE_PA,
            self.channels[ChannelId::Pressure.index()].canonical,
            self.channels[ChannelId::Temperature.index()].canonical,
        )
    }

    /// Active display range (min, max) for a channel
    pub fn display_range(&self, id: ChannelId) -> (f64, f64) {
        self.channels[id.index()].display_range
    }

    /// Active display-unit label for a channel
    pub fn unit_label(&self, id: ChannelId) -> &'static str {
        self.channels[id.index()].scale.label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SerialConfig;
    use crate::link::port::mocks::{MockPort, ScriptedRead};

    fn test_config(chunk_size: usize) -> Config {
        let mut config = Config::default();
        config.acquisition.chunk_size = chunk_size;
        config
    }

    fn with_port(port: MockPort, chunk_size: usize) -> Acquisition {
        let link = LinkManager::with_port_for_tests(Box::new(port));
        Acquisition::new(&test_config(chunk_size), link, None).unwrap()
    }

    #[test]
    fn test_frame_flows_into_readings_and_series() {
        let mut acq = with_port(MockPort::with_line("300.0,1013.25,120"), 64);
        acq.fast_tick().unwrap();

        // Raw temperature is Celsius; the default display unit is Kelvin
        let temp = acq.reading(ChannelId::Temperature);
        assert!(temp.valid);
        assert!((temp.value - 573.15).abs() < 1e-9);

        let press = acq.reading(ChannelId::Pressure);
        assert!(press.valid);
        assert_eq!(press.value, 101325.0);

        let poll = acq.reading(ChannelId::Particulates);
        assert!(poll.valid);
        assert_eq!(poll.value, 120.0);

        for id in ChannelId::ALL {
            assert_eq!(acq.series(id).len(), 1);
        }

        // Canonical pressure equals the sea-level reference: altitude ~ 0
        assert!(acq.altitude().abs() < 1e-9);
    }

    #[test]
    fn test_cached_values_keep_appending_without_data() {
        let mut acq = with_port(MockPort::with_line("25.0,1000.0,50"), 64);
        acq.fast_tick().unwrap();
        acq.fast_tick().unwrap();
        acq.fast_tick().unwrap();

        let samples = acq.series(ChannelId::Pressure);
        assert_eq!(samples.len(), 3);
        assert!(samples.iter().all(|s| s.v == 100_000.0));
    }

    #[test]
    fn test_debug_fallback_serves_stale_placeholders() {
        let link = LinkManager::connect(&SerialConfig {
            device_hint: "no-such-device-9f2d41".to_string(),
            baud_rate: 9600,
        });
        let mut acq = Acquisition::new(&test_config(64), link, None).unwrap();
        assert_eq!(acq.link_status(), LinkStatus::DebugFallback);

        acq.fast_tick().unwrap();
        acq.fast_tick().unwrap();

        let temp = acq.reading(ChannelId::Temperature);
        assert!(!temp.valid);
        assert!((temp.value - (FIELD_FALLBACK + 273.15)).abs() < 1e-9);
        assert_eq!(acq.series(ChannelId::Temperature).len(), 2);
        assert!(!acq.healthy());
    }

    #[test]
    fn test_link_loss_clears_validity_and_keeps_cache() {
        let port = MockPort::new(vec![
            ScriptedRead::Data(b"25.0,1000.0,50\n".to_vec()),
            ScriptedRead::Error(std::io::ErrorKind::Other),
        ]);
        let mut acq = with_port(port, 64);

        acq.fast_tick().unwrap();
        assert!(acq.healthy());

        // Second tick hits the scripted read error: validity drops, the
        // bounded retry finds no device, cached values keep flowing.
        acq.fast_tick().unwrap();
        assert_eq!(acq.link_status(), LinkStatus::Disconnected);
        assert!(!acq.reading(ChannelId::Temperature).valid);
        assert!(!acq.healthy());

        let samples = acq.series(ChannelId::Temperature);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].v, samples[1].v, "stale value appended unchanged");
    }

    #[test]
    fn test_unit_round_trip_restores_history() {
        let mut acq = with_port(MockPort::with_line("25.0,1000.0,50"), 64);
        acq.fast_tick().unwrap();
        acq.fast_tick().unwrap();
        acq.mean_tick().unwrap();

        let before: Vec<f64> = acq.series(ChannelId::Temperature).iter().map(|s| s.v).collect();
        let mean_before = acq.running_mean(ChannelId::Temperature).unwrap();

        acq.set_temperature_unit(TempUnit::Fahrenheit).unwrap();
        acq.set_temperature_unit(TempUnit::Kelvin).unwrap();

        let after: Vec<f64> = acq.series(ChannelId::Temperature).iter().map(|s| s.v).collect();
        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).abs() < 1e-9, "round trip drifted: {} vs {}", a, b);
        }
        let mean_after = acq.running_mean(ChannelId::Temperature).unwrap();
        assert!((mean_before - mean_after).abs() < 1e-9);
    }

    #[test]
    fn test_unit_change_converts_display_not_canonical() {
        let mut acq = with_port(MockPort::with_line("25.0,1000.0,50"), 64);
        acq.fast_tick().unwrap();

        acq.set_temperature_unit(TempUnit::Celsius).unwrap();

        let temp = acq.reading(ChannelId::Temperature);
        assert!((temp.value - 25.0).abs() < 1e-9);
        assert_eq!(acq.unit_label(ChannelId::Temperature), "C");
        assert_eq!(acq.display_range(ChannelId::Temperature), (17.0, 37.0));

        let samples = acq.series(ChannelId::Temperature);
        assert!((samples[0].v - 25.0).abs() < 1e-9);

        // Altitude still computes from canonical Kelvin
        assert!((acq.altitude()
            - hypsometric_altitude(SEA_LEVEL_PRESSURE_PA, 100_000.0, 298.15))
        .abs()
            < 1e-9);
    }

    #[test]
    fn test_repeated_unit_selection_does_not_double_apply() {
        let mut acq = with_port(MockPort::with_line("25.0,1000.0,50"), 64);
        acq.fast_tick().unwrap();

        acq.set_temperature_unit(TempUnit::Celsius).unwrap();
        let once: Vec<f64> = acq.series(ChannelId::Temperature).iter().map(|s| s.v).collect();

        acq.set_temperature_unit(TempUnit::Celsius).unwrap();
        let twice: Vec<f64> = acq.series(ChannelId::Temperature).iter().map(|s| s.v).collect();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_series_capacity_halts_acquisition() {
        let mut acq = with_port(MockPort::with_line("25.0,1000.0,50"), 2);
        acq.fast_tick().unwrap();
        acq.fast_tick().unwrap();

        let err = acq.fast_tick().unwrap_err();
        match err {
            crate::error::StationError::Capacity { capacity, .. } => assert_eq!(capacity, 2),
            other => panic!("expected Capacity error, got: {:?}", other),
        }
    }

    #[test]
    fn test_statistics_follow_mean_ticks() {
        let mut acq = with_port(MockPort::with_line("25.0,1000.0,50"), 64);
        acq.fast_tick().unwrap();

        assert!(acq.running_mean(ChannelId::Temperature).is_none());
        acq.mean_tick().unwrap();
        acq.mean_tick().unwrap();

        let mean = acq.running_mean(ChannelId::Temperature).unwrap();
        assert!((mean - 298.15).abs() < 1e-9);
        assert_eq!(acq.mean_series(ChannelId::Temperature).unwrap().len(), 2);
        assert!(acq.interquartile_mean(ChannelId::Temperature).is_some());

        // Only temperature maintains statistics
        assert!(acq.running_mean(ChannelId::Pressure).is_none());
        assert!(acq.mean_series(ChannelId::Particulates).is_none());
    }

    #[test]
    fn test_slow_tick_persists_canonical_rows() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("records-test.db");
        let store = RecordStore::open(&db_path).unwrap();

        let mut acq = Acquisition::new(
            &test_config(64),
            LinkManager::with_port_for_tests(Box::new(MockPort::with_line("25.0,1000.0,50"))),
            Some(store),
        )
        .unwrap();

        acq.fast_tick().unwrap();
        acq.slow_tick();
        acq.slow_tick();

        let conn = rusqlite::Connection::open(&db_path).unwrap();
        let temp_rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM temp", [], |row| row.get(0))
            .unwrap();
        assert_eq!(temp_rows, 2);

        let value: f64 = conn
            .query_row("SELECT value FROM temp LIMIT 1", [], |row| row.get(0))
            .unwrap();
        assert!((value - 298.15).abs() < 1e-9, "canonical Kelvin persisted");

        let um: String = conn
            .query_row("SELECT um FROM press LIMIT 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(um, "Pa");
    }

    #[test]
    fn test_slow_tick_without_store_is_noop() {
        let mut acq = with_port(MockPort::with_line("25.0,1000.0,50"), 64);
        acq.fast_tick().unwrap();
        acq.slow_tick();
        acq.passive_tick();
    }

    #[test]
    fn test_reset_view_restores_unit_preset() {
        let mut acq = with_port(MockPort::with_line("25.0,1000.0,50"), 64);
        acq.set_temperature_unit(TempUnit::Fahrenheit).unwrap();
        assert_eq!(acq.display_range(ChannelId::Temperature), (62.0, 98.0));

        acq.reset_view(ChannelId::Temperature);
        assert_eq!(acq.display_range(ChannelId::Temperature), (62.0, 98.0));

        acq.reset_view(ChannelId::Pressure);
        assert_eq!(acq.display_range(ChannelId::Pressure), (80_000.0, 130_000.0));
    }
}
