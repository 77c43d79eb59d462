// Acquisition library contract
//
// The engine never talks to hardware directly. Everything it needs from an
// acquisition backend goes through two traits:
// - `AcquisitionLibrary`: device discovery and opening a board session
// - `BoardDriver`: the per-board session (prepare, stream, peek, stop, release)
//
// Built-in implementations:
// - Synthetic: seeded alpha/beta sinusoids with drifting amplitudes
// - PlaybackFile: replays a recorded text file at the nominal rate
// Physical boards are discovered through serial-port enumeration but need an
// external driver to be opened.

mod discovery;
mod playback;
mod streaming;
mod synthetic;

use crate::types::{BoardKind, BoardLayout};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::path::PathBuf;
use thiserror::Error;

pub use discovery::{filter_compatible, scan_serial_ports, PortCandidate};
pub use playback::{read_sample_file, PlaybackSource};
pub use streaming::{SampleSource, StreamingBoard};
pub use synthetic::SyntheticSource;

pub type SyntheticBoard = StreamingBoard<SyntheticSource>;
pub type PlaybackBoard = StreamingBoard<PlaybackSource>;

/// Errors reported by an acquisition backend.
///
/// These never leave the session layer: `SessionManager` translates them into
/// [`crate::AlphaWarError`].
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("BOARD_NOT_CREATED_ERROR: {0}")]
    BoardNotCreated(String),

    #[error("BOARD_NOT_READY_ERROR: {0}")]
    NotReady(String),

    #[error("STREAM_ALREADY_RUN_ERROR")]
    StreamAlreadyRunning,

    #[error("STREAM_THREAD_IS_NOT_RUNNING")]
    StreamNotRunning,

    #[error("UNSUPPORTED_BOARD_ERROR: {0}")]
    Unsupported(String),

    #[error("Port enumeration failed: {0}")]
    Enumeration(String),

    #[error("Invalid sample data: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    /// The "nothing to release" condition reported when a session is torn
    /// down twice. Harmless during shutdown.
    pub fn is_already_released(&self) -> bool {
        matches!(self, Self::BoardNotCreated(_) | Self::StreamNotRunning)
    }
}

/// USB vendor/product pair used to recognise acquisition dongles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbId {
    pub vid: u16,
    pub pid: u16,
}

impl UsbId {
    pub const fn new(vid: u16, pid: u16) -> Self {
        Self { vid, pid }
    }
}

/// Known OpenBCI dongles: Cyton FTDI chip and Ganglion
pub const OPENBCI_ALLOWLIST: [UsbId; 2] = [UsbId::new(0x0403, 0x6015), UsbId::new(0x04D8, 0xF372)];

/// Metadata of a discovered device. Discovery never opens the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub port: String,
    pub usb_id: UsbId,
    pub serial_number: Option<String>,
    pub description: Option<String>,
}

/// Everything a backend needs to open one board session
#[derive(Debug, Clone)]
pub struct OpenParams {
    pub board: BoardKind,
    pub layout: BoardLayout,
    pub serial_port: Option<String>,
    pub playback_file: Option<PathBuf>,
    /// Disambiguates several virtual boards sharing one identity
    pub other_info: Option<String>,
    pub instance_id: u32,
}

/// One open board session of an acquisition backend
pub trait BoardDriver: Send {
    /// Handshake with the board. May block for seconds on real hardware.
    fn prepare(&mut self) -> Result<(), DriverError>;

    fn is_prepared(&self) -> bool;

    /// Start background acquisition into a ring buffer of `buffer_capacity` samples
    fn start_stream(&mut self, buffer_capacity: usize) -> Result<(), DriverError>;

    fn stop_stream(&mut self) -> Result<(), DriverError>;

    fn release(&mut self) -> Result<(), DriverError>;

    /// Up to `num_samples` most recent samples, rows x samples, without
    /// removing them from the ring buffer
    fn current_data(&self, num_samples: usize) -> Result<Vec<Vec<f64>>, DriverError>;

    fn sampling_rate(&self) -> f64;

    fn insert_marker(&mut self, value: f64) -> Result<(), DriverError>;

    /// Downcast hook for driver-specific capabilities
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// An acquisition backend: discovery plus a board factory
pub trait AcquisitionLibrary: Send + Sync {
    fn discover(&self, allowlist: &[UsbId]) -> Result<Vec<DeviceInfo>, DriverError>;

    fn open(&self, params: &OpenParams) -> Result<Box<dyn BoardDriver>, DriverError>;
}

/// Backend shipped with the engine: serial discovery, synthetic and playback boards
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinLibrary;

impl AcquisitionLibrary for BuiltinLibrary {
    fn discover(&self, allowlist: &[UsbId]) -> Result<Vec<DeviceInfo>, DriverError> {
        scan_serial_ports(allowlist)
    }

    fn open(&self, params: &OpenParams) -> Result<Box<dyn BoardDriver>, DriverError> {
        match params.board {
            BoardKind::Synthetic => {
                let source = SyntheticSource::new(params.layout.eeg_channels, params.instance_id);
                Ok(Box::new(StreamingBoard::new(
                    params.board,
                    params.layout,
                    source,
                )))
            }
            BoardKind::PlaybackFile => {
                let path = params.playback_file.clone().ok_or_else(|| {
                    DriverError::BoardNotCreated("playback board opened without a file".to_string())
                })?;
                let source = PlaybackSource::new(path, params.layout.eeg_channels);
                Ok(Box::new(StreamingBoard::new(
                    params.board,
                    params.layout,
                    source,
                )))
            }
            BoardKind::Cyton | BoardKind::CytonDaisy | BoardKind::Ganglion => {
                Err(DriverError::Unsupported(format!(
                    "no acquisition driver linked for {} on {}",
                    params.board.name(),
                    params.serial_port.as_deref().unwrap_or("<no port>")
                )))
            }
        }
    }
}
