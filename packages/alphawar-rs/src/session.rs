// Acquisition session lifecycle
//
// `SessionFactory` turns a `DeviceDescriptor` into an open `SessionManager`:
// it resolves the board layout, discovers a serial port when none was given,
// hands out instance ids, and opens the driver. Ports of opened physical
// boards stay claimed until `release_port`, so discovery never hands the
// same dongle out twice. `SessionManager` then owns the
// driver for its whole life:
//
//   Uninitialized -> Preparing -> Streaming -> Stopped
//                         \-> Failed
//
// Driver errors are translated into `AlphaWarError` here and never escape raw.

use crate::driver::{
    AcquisitionLibrary, BoardDriver, DeviceInfo, DriverError, OpenParams, UsbId,
    OPENBCI_ALLOWLIST,
};
use crate::error::{AlphaWarError, Result};
use crate::types::{BoardLayout, DeviceDescriptor, SampleWindow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Ring buffer size requested from the driver when streaming starts
pub const DEFAULT_STREAM_BUFFER: usize = 450_000;

/// Connection state of one acquisition session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionState {
    Uninitialized,
    Preparing,
    Streaming { started_at: f64 },
    Stopped,
    Failed { message: String },
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Uninitialized
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("uninitialized"),
            Self::Preparing => f.write_str("preparing"),
            Self::Streaming { .. } => f.write_str("streaming"),
            Self::Stopped => f.write_str("stopped"),
            Self::Failed { .. } => f.write_str("failed"),
        }
    }
}

/// Builds session managers and owns the instance counter used to tell
/// virtual boards of the same kind apart
pub struct SessionFactory {
    library: Arc<dyn AcquisitionLibrary>,
    allowlist: Vec<UsbId>,
    buffer_capacity: usize,
    next_instance_id: u32,
    claimed_ports: Vec<String>,
}

impl SessionFactory {
    pub fn new(library: Arc<dyn AcquisitionLibrary>) -> Self {
        Self {
            library,
            allowlist: OPENBCI_ALLOWLIST.to_vec(),
            buffer_capacity: DEFAULT_STREAM_BUFFER,
            next_instance_id: 0,
            claimed_ports: Vec::new(),
        }
    }

    pub fn with_allowlist(mut self, allowlist: Vec<UsbId>) -> Self {
        self.allowlist = allowlist;
        self
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_first_instance_id(mut self, id: u32) -> Self {
        self.next_instance_id = id;
        self
    }

    pub fn next_instance_id(&self) -> u32 {
        self.next_instance_id
    }

    /// Serial ports held by sessions this factory opened
    pub fn claimed_ports(&self) -> &[String] {
        &self.claimed_ports
    }

    /// Make `port` available to discovery again
    pub fn release_port(&mut self, port: &str) {
        if let Some(pos) = self.claimed_ports.iter().position(|p| p == port) {
            self.claimed_ports.remove(pos);
            log::debug!("Released claim on {}", port);
        }
    }

    /// Allow-listed devices currently attached, in enumeration order
    pub fn discover(&self) -> Result<Vec<DeviceInfo>> {
        self.library
            .discover(&self.allowlist)
            .map_err(|e| AlphaWarError::DiscoveryFailure(e.to_string()))
    }

    /// Open a session for `descriptor`. The board is not prepared yet.
    pub fn connect(&mut self, descriptor: &DeviceDescriptor) -> Result<SessionManager> {
        let layout = descriptor.effective_layout()?;

        let instance_id = self.next_instance_id;
        self.next_instance_id += 1;

        let label = descriptor
            .label
            .clone()
            .unwrap_or_else(|| format!("Board {}", instance_id + 1));

        let mut resolved = descriptor.clone();
        let physical = descriptor.board.requires_physical_link();
        match resolved.serial_port.as_deref() {
            Some(port) if physical && self.claimed_ports.iter().any(|p| p == port) => {
                return Err(AlphaWarError::Configuration(format!(
                    "[{}] {} is already in use by another board",
                    label, port
                )));
            }
            Some(_) => {}
            None if physical => {
                let device = self
                    .discover()?
                    .into_iter()
                    .find(|d| !self.claimed_ports.contains(&d.port))
                    .ok_or(AlphaWarError::NoCompatibleDeviceFound)?;
                log::info!("[{}] Auto-detected {} on {}", label, descriptor.board.name(), device.port);
                resolved.serial_port = Some(device.port);
            }
            None => {}
        }

        let params = OpenParams {
            board: descriptor.board,
            layout,
            serial_port: resolved.serial_port.clone(),
            playback_file: resolved.playback_file.clone(),
            other_info: descriptor
                .board
                .accepts_master()
                .then(|| format!("instance_id_{}", instance_id)),
            instance_id,
        };

        let driver = self
            .library
            .open(&params)
            .map_err(|e| AlphaWarError::HandshakeFailure {
                label: label.clone(),
                reason: e.to_string(),
            })?;

        let sampling_rate = driver.sampling_rate();
        if !(sampling_rate.is_finite() && sampling_rate > 0.0) {
            return Err(AlphaWarError::HandshakeFailure {
                label,
                reason: format!("driver reported sampling rate {}", sampling_rate),
            });
        }

        if physical {
            if let Some(port) = &resolved.serial_port {
                self.claimed_ports.push(port.clone());
            }
        }

        log::info!(
            "[{}, {}] Opened {} ({} EEG channels @ {} Hz)",
            label,
            resolved.serial_port.as_deref().unwrap_or("virtual"),
            descriptor.board.name(),
            layout.eeg_channels,
            sampling_rate
        );

        Ok(SessionManager {
            session_id: Uuid::new_v4(),
            instance_id,
            label,
            descriptor: resolved,
            layout: BoardLayout {
                sampling_rate,
                ..layout
            },
            buffer_capacity: self.buffer_capacity,
            driver,
            state: SessionState::Uninitialized,
            prepared: false,
            streaming: false,
        })
    }
}

/// Owns one board session and exposes a uniform polling interface
pub struct SessionManager {
    session_id: Uuid,
    instance_id: u32,
    label: String,
    descriptor: DeviceDescriptor,
    layout: BoardLayout,
    buffer_capacity: usize,
    driver: Box<dyn BoardDriver>,
    state: SessionState,
    prepared: bool,
    streaming: bool,
}

impl SessionManager {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn instance_id(&self) -> u32 {
        self.instance_id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Descriptor with the serial port filled in when it was discovered
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.state, SessionState::Streaming { .. })
    }

    pub fn sampling_rate(&self) -> f64 {
        self.layout.sampling_rate
    }

    pub fn channel_count(&self) -> usize {
        self.layout.eeg_channels
    }

    pub fn layout(&self) -> &BoardLayout {
        &self.layout
    }

    /// Raw driver handle for capabilities outside the session contract
    pub fn driver(&self) -> &dyn BoardDriver {
        self.driver.as_ref()
    }

    pub fn driver_mut(&mut self) -> &mut dyn BoardDriver {
        self.driver.as_mut()
    }

    /// Prepare the board and start buffering. Blocks for the whole handshake.
    pub fn start_streaming(&mut self) -> Result<()> {
        match &self.state {
            SessionState::Uninitialized => {}
            SessionState::Streaming { .. } => {
                return Err(AlphaWarError::AlreadyStreaming(self.label.clone()));
            }
            other => {
                return Err(AlphaWarError::InvalidState {
                    label: self.label.clone(),
                    state: other.to_string(),
                });
            }
        }

        self.state = SessionState::Preparing;
        log::info!("[{}] Preparing session", self.label);

        if let Err(e) = self.driver.prepare() {
            return Err(self.fail(e));
        }
        self.prepared = true;

        if let Err(e) = self.driver.start_stream(self.buffer_capacity) {
            let err = self.fail(e);
            if let Err(release) = self.driver.release() {
                log::debug!("[{}] Release after failed start: {}", self.label, release);
            }
            self.prepared = false;
            return Err(err);
        }
        self.streaming = true;

        self.state = SessionState::Streaming {
            started_at: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
        };
        log::info!(
            "[{}, {}] Board setup and streaming started",
            self.label,
            self.descriptor.serial_port.as_deref().unwrap_or("virtual")
        );
        Ok(())
    }

    fn fail(&mut self, error: DriverError) -> AlphaWarError {
        let reason = error.to_string();
        log::error!("[{}] Error setting up board: {}", self.label, reason);
        self.state = SessionState::Failed {
            message: reason.clone(),
        };
        AlphaWarError::HandshakeFailure {
            label: self.label.clone(),
            reason,
        }
    }

    /// Peek at the latest `n` samples.
    ///
    /// `Ok(None)` while the session is not streaming or fewer than `n`
    /// samples are buffered. A driver read error becomes
    /// `TransientReadFailure`.
    pub fn try_pull_latest(&self, n: usize) -> Result<Option<SampleWindow>> {
        if n == 0 || !self.is_streaming() {
            return Ok(None);
        }

        let rows = self
            .driver
            .current_data(n)
            .map_err(|e| AlphaWarError::TransientReadFailure {
                label: self.label.clone(),
                reason: e.to_string(),
            })?;

        let window = SampleWindow::from_board_rows(&rows, &self.layout);
        if window.num_channels() < self.layout.eeg_channels || window.num_samples() < n {
            log::debug!(
                "[{}] Window not ready: {}/{} samples",
                self.label,
                window.num_samples(),
                n
            );
            return Ok(None);
        }
        Ok(Some(window))
    }

    /// Like [`try_pull_latest`](Self::try_pull_latest), but read failures are
    /// logged and reported as "no data"
    pub fn pull_latest(&self, n: usize) -> Option<SampleWindow> {
        match self.try_pull_latest(n) {
            Ok(window) => window,
            Err(e) => {
                log::warn!("{}", e);
                None
            }
        }
    }

    /// Forward a marker into the data stream
    pub fn insert_marker(&mut self, value: f64) -> Result<()> {
        if !self.is_streaming() {
            return Err(AlphaWarError::InvalidState {
                label: self.label.clone(),
                state: self.state.to_string(),
            });
        }
        self.driver
            .insert_marker(value)
            .map_err(|e| AlphaWarError::TransientReadFailure {
                label: self.label.clone(),
                reason: e.to_string(),
            })?;
        log::debug!("[{}] Marker {} inserted", self.label, value);
        Ok(())
    }

    /// Stop streaming and release the board. Safe to call at any time and
    /// any number of times; failures are reported but never fatal.
    pub fn stop(&mut self) -> Result<()> {
        let mut failures = Vec::new();

        if self.streaming {
            self.streaming = false;
            match self.driver.stop_stream() {
                Ok(()) => log::info!("[{}] Streaming stopped", self.label),
                Err(e) if e.is_already_released() => {
                    log::debug!("[{}] Stream already stopped: {}", self.label, e)
                }
                Err(e) => failures.push(e.to_string()),
            }
        }

        if self.prepared {
            self.prepared = false;
            match self.driver.release() {
                Ok(()) => log::info!("[{}] Session released", self.label),
                Err(e) if e.is_already_released() => {
                    log::debug!("[{}] Session already released: {}", self.label, e)
                }
                Err(e) => failures.push(e.to_string()),
            }
        }

        if !matches!(self.state, SessionState::Failed { .. }) {
            self.state = SessionState::Stopped;
        }

        if failures.is_empty() {
            Ok(())
        } else {
            let err = AlphaWarError::ReleaseFailure {
                label: self.label.clone(),
                reason: failures.join("; "),
            };
            log::error!("{}", err);
            Err(err)
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        // stop() already logged any failure
        let _ = self.stop();
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("session_id", &self.session_id)
            .field("label", &self.label)
            .field("board", &self.descriptor.board)
            .field("serial_port", &self.descriptor.serial_port)
            .field("state", &self.state)
            .finish()
    }
}
