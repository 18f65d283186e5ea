//! # Link Manager
//!
//! Owns the serial connection to the payload.
//!
//! This module handles:
//! - Port discovery by device-name substring match
//! - Opening the port at the configured baud rate with zero-timeout reads
//! - Line reassembly from partial non-blocking reads
//! - Loss detection and a single bounded reconnect attempt
//!
//! When no matching port can be opened at construction the manager enters
//! debug fallback: no further connection attempts are made and consumers
//! keep rendering stale placeholder data.

pub mod port;

use std::io::ErrorKind;
use std::time::Duration;

use bytes::BytesMut;
use tokio_serial::{SerialPortInfo, SerialPortType};
use tracing::{debug, info, warn};

use crate::config::SerialConfig;
use crate::error::{Result, StationError};
use self::port::{PollRead, SerialPortLink};

/// Bytes read per poll
const READ_CHUNK: usize = 256;

/// A pending buffer growing past this without a newline is garbage and
/// gets discarded
const MAX_PENDING_BYTES: usize = 4096;

/// Reconnect attempts per lost-link event
const RETRY_ATTEMPTS: usize = 1;

/// Connection state, owned exclusively by the link manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// The link was up and has been lost
    Disconnected,
    /// No device was found at startup; acquisition renders stale placeholders
    DebugFallback,
    Connected,
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            LinkStatus::Disconnected => "disconnected",
            LinkStatus::DebugFallback => "debug-fallback",
            LinkStatus::Connected => "connected",
        };
        f.write_str(text)
    }
}

/// Serial link owner: discovery, polled reads, loss handling
pub struct LinkManager {
    port: Option<Box<dyn PollRead>>,
    port_name: Option<String>,
    status: LinkStatus,
    device_hint: String,
    baud_rate: u32,
    rx: BytesMut,
}

impl std::fmt::Debug for LinkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkManager")
            .field("port_name", &self.port_name)
            .field("status", &self.status)
            .field("device_hint", &self.device_hint)
            .field("baud_rate", &self.baud_rate)
            .finish_non_exhaustive()
    }
}

impl LinkManager {
    /// Discover and open the payload link.
    ///
    /// On failure the manager comes up in [`LinkStatus::DebugFallback`] and
    /// makes no further automatic connection attempts.
    pub fn connect(config: &SerialConfig) -> Self {
        let mut manager = Self {
            port: None,
            port_name: None,
            status: LinkStatus::Disconnected,
            device_hint: config.device_hint.clone(),
            baud_rate: config.baud_rate,
            rx: BytesMut::with_capacity(READ_CHUNK),
        };

        match manager.try_connect() {
            Ok(()) => info!(
                port = manager.port_name.as_deref().unwrap_or("?"),
                baud = manager.baud_rate,
                "serial link established"
            ),
            Err(err) => {
                warn!(%err, "no payload link, entering debug fallback");
                manager.status = LinkStatus::DebugFallback;
            }
        }

        manager
    }

    /// Find the first enumerated port matching the device hint.
    ///
    /// The hint is substring-matched against the USB product string and the
    /// port name; the match's device path is returned.
    pub fn discover_port(device_hint: &str) -> Option<String> {
        let ports = match tokio_serial::available_ports() {
            Ok(ports) => ports,
            Err(err) => {
                debug!(%err, "port enumeration failed");
                return None;
            }
        };

        ports
            .into_iter()
            .find(|info| Self::port_matches(info, device_hint))
            .map(|info| info.port_name)
    }

    fn port_matches(info: &SerialPortInfo, device_hint: &str) -> bool {
        if info.port_name.contains(device_hint) {
            return true;
        }
        match &info.port_type {
            SerialPortType::UsbPort(usb) => usb
                .product
                .as_deref()
                .map_or(false, |product| product.contains(device_hint)),
            _ => false,
        }
    }

    fn try_connect(&mut self) -> Result<()> {
        let name = Self::discover_port(&self.device_hint)
            .ok_or_else(|| StationError::PortNotFound(self.device_hint.clone()))?;

        let port = tokio_serial::new(&name, self.baud_rate)
            .timeout(Duration::ZERO)
            .open()
            .map_err(|err| StationError::Link(format!("failed to open {}: {}", name, err)))?;

        self.port = Some(Box::new(SerialPortLink::new(port)));
        self.port_name = Some(name);
        self.status = LinkStatus::Connected;
        self.rx.clear();
        Ok(())
    }

    /// Poll the link for one complete frame line without blocking.
    ///
    /// Drains whatever bytes are available into the receive buffer and pops
    /// at most one newline-terminated line per call. `Ok(None)` means no
    /// complete line is pending; in debug fallback every poll yields that.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::Link`] on a read failure or device
    /// end-of-stream, and again on every poll while the link stays lost;
    /// the caller runs the loss path ([`Self::report_lost`] then one
    /// [`Self::retry`]) per read cycle.
    pub fn poll_line(&mut self) -> Result<Option<String>> {
        let port = match self.port.as_mut() {
            Some(port) => port,
            // A lost link errors on every cycle so the caller keeps
            // retrying; fallback mode never reconnects.
            None => match self.status {
                LinkStatus::Disconnected => {
                    return Err(StationError::Link("link down".to_string()))
                }
                _ => return Ok(None),
            },
        };

        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match port.poll_read(&mut chunk) {
                Ok(0) => return Err(StationError::Link("serial device closed".to_string())),
                Ok(n) => {
                    self.rx.extend_from_slice(&chunk[..n]);
                    if chunk[..n].contains(&b'\n') {
                        break;
                    }
                }
                Err(err)
                    if err.kind() == ErrorKind::TimedOut
                        || err.kind() == ErrorKind::WouldBlock =>
                {
                    break;
                }
                Err(err) => {
                    return Err(StationError::Link(format!("serial read failed: {}", err)))
                }
            }
        }

        if self.rx.len() > MAX_PENDING_BYTES && !self.rx.contains(&b'\n') {
            debug!(pending = self.rx.len(), "discarding garbled unterminated input");
            self.rx.clear();
        }

        Ok(self.take_line())
    }

    fn take_line(&mut self) -> Option<String> {
        let end = self.rx.iter().position(|&b| b == b'\n')?;
        let line = self.rx.split_to(end + 1);
        Some(String::from_utf8_lossy(&line).trim_end().to_string())
    }

    /// Drop the handle after a failed read and mark the link lost.
    ///
    /// The pipeline owns the channel validity flags and clears them
    /// alongside this call.
    pub fn report_lost(&mut self) {
        self.port = None;
        self.status = LinkStatus::Disconnected;
        self.rx.clear();
    }

    /// One bounded reconnect attempt (discovery + open).
    ///
    /// Returns whether the link came back. On failure the manager stays
    /// [`LinkStatus::Disconnected`] and the next failed read cycle triggers
    /// another single attempt; never a busy loop.
    pub fn retry(&mut self) -> bool {
        for _ in 0..RETRY_ATTEMPTS {
            match self.try_connect() {
                Ok(()) => return true,
                Err(err) => debug!(%err, "reconnect attempt failed"),
            }
        }
        self.status = LinkStatus::Disconnected;
        false
    }

    pub fn status(&self) -> LinkStatus {
        self.status
    }

    /// Device path of the opened port, if any
    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn with_port_for_tests(port: Box<dyn PollRead>) -> Self {
        Self {
            port: Some(port),
            port_name: Some("/dev/ttyTEST0".to_string()),
            status: LinkStatus::Connected,
            device_hint: "no-such-device-under-test".to_string(),
            baud_rate: 9600,
            rx: BytesMut::with_capacity(READ_CHUNK),
        }
    }
}
