use crate::error::{AlphaWarError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Acquisition board families understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardKind {
    Synthetic,
    PlaybackFile,
    Cyton,
    CytonDaisy,
    Ganglion,
}

impl BoardKind {
    pub const ALL: [BoardKind; 5] = [
        BoardKind::Synthetic,
        BoardKind::PlaybackFile,
        BoardKind::Cyton,
        BoardKind::CytonDaisy,
        BoardKind::Ganglion,
    ];

    /// Numeric board id as used by the acquisition library
    pub fn board_id(&self) -> i32 {
        match self {
            Self::PlaybackFile => -3,
            Self::Synthetic => -1,
            Self::Cyton => 0,
            Self::Ganglion => 1,
            Self::CytonDaisy => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Synthetic => "Synthetic Board",
            Self::PlaybackFile => "Playback File",
            Self::Cyton => "OpenBCI Cyton",
            Self::CytonDaisy => "OpenBCI Cyton+Daisy",
            Self::Ganglion => "OpenBCI Ganglion",
        }
    }

    /// Boards that talk over a serial dongle and therefore need a port
    pub fn requires_physical_link(&self) -> bool {
        matches!(self, Self::Cyton | Self::CytonDaisy | Self::Ganglion)
    }

    /// Only virtual boards may borrow the layout of a master board
    pub fn accepts_master(&self) -> bool {
        matches!(self, Self::Synthetic | Self::PlaybackFile)
    }

    /// Row layout of the board. Playback files have none of their own.
    pub fn layout(&self) -> Option<BoardLayout> {
        let (eeg_channels, sampling_rate) = match self {
            Self::PlaybackFile => return None,
            Self::Synthetic => (8, 250.0),
            Self::Cyton => (8, 250.0),
            Self::CytonDaisy => (16, 125.0),
            Self::Ganglion => (4, 200.0),
        };
        Some(BoardLayout::new(eeg_channels, sampling_rate))
    }
}

impl fmt::Display for BoardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Synthetic => "synthetic",
            Self::PlaybackFile => "playback_file",
            Self::Cyton => "cyton",
            Self::CytonDaisy => "cyton_daisy",
            Self::Ganglion => "ganglion",
        };
        f.write_str(s)
    }
}

impl FromStr for BoardKind {
    type Err = AlphaWarError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "synthetic" => Ok(Self::Synthetic),
            "playback" | "playback_file" => Ok(Self::PlaybackFile),
            "cyton" => Ok(Self::Cyton),
            "cyton_daisy" | "daisy" => Ok(Self::CytonDaisy),
            "ganglion" => Ok(Self::Ganglion),
            other => Err(AlphaWarError::Configuration(format!(
                "unknown board kind '{}', expected one of: synthetic, playback_file, cyton, cyton_daisy, ganglion",
                other
            ))),
        }
    }
}

/// Row layout of the sample matrix produced by a board.
///
/// Row 0 is the package counter, EEG rows start at [`BoardLayout::CHANNEL_OFFSET`],
/// and the last two rows hold the timestamp and the marker channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoardLayout {
    pub eeg_channels: usize,
    pub sampling_rate: f64,
}

impl BoardLayout {
    pub const CHANNEL_OFFSET: usize = 1;

    pub fn new(eeg_channels: usize, sampling_rate: f64) -> Self {
        Self {
            eeg_channels,
            sampling_rate,
        }
    }

    pub fn num_rows(&self) -> usize {
        Self::CHANNEL_OFFSET + self.eeg_channels + 2
    }

    pub fn package_row(&self) -> usize {
        0
    }

    pub fn eeg_rows(&self) -> std::ops::Range<usize> {
        Self::CHANNEL_OFFSET..Self::CHANNEL_OFFSET + self.eeg_channels
    }

    pub fn timestamp_row(&self) -> usize {
        Self::CHANNEL_OFFSET + self.eeg_channels
    }

    pub fn marker_row(&self) -> usize {
        self.timestamp_row() + 1
    }
}

/// What to connect to for one competitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub board: BoardKind,
    #[serde(default)]
    pub serial_port: Option<String>,
    #[serde(default)]
    pub master_board: Option<BoardKind>,
    #[serde(default)]
    pub playback_file: Option<PathBuf>,
    #[serde(default)]
    pub label: Option<String>,
}

impl DeviceDescriptor {
    pub fn new(board: BoardKind) -> Self {
        Self {
            board,
            serial_port: None,
            master_board: None,
            playback_file: None,
            label: None,
        }
    }

    pub fn with_serial_port(mut self, port: impl Into<String>) -> Self {
        self.serial_port = Some(port.into());
        self
    }

    pub fn with_master_board(mut self, master: BoardKind) -> Self {
        self.master_board = Some(master);
        self
    }

    pub fn with_playback_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.playback_file = Some(path.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Resolve the row layout, honouring the master board.
    ///
    /// A master board on a physical board kind is a configuration error, as is
    /// a playback source without a file.
    pub fn effective_layout(&self) -> Result<BoardLayout> {
        if let Some(master) = self.master_board {
            if !self.board.accepts_master() {
                return Err(AlphaWarError::Configuration(format!(
                    "master board is only used for playback_file and synthetic boards, but {} was provided",
                    self.board
                )));
            }
            if master == BoardKind::PlaybackFile {
                return Err(AlphaWarError::Configuration(
                    "a playback board cannot act as master board".to_string(),
                ));
            }
        }
        if self.board == BoardKind::PlaybackFile && self.playback_file.is_none() {
            return Err(AlphaWarError::Configuration(
                "playback_file board requires a playback file".to_string(),
            ));
        }

        let source = self.master_board.unwrap_or(match self.board {
            BoardKind::PlaybackFile => BoardKind::Cyton,
            other => other,
        });
        source.layout().ok_or_else(|| {
            AlphaWarError::Configuration(format!("board {} has no row layout", source))
        })
    }
}

/// The most recent samples of one session, EEG rows only.
///
/// `samples[channel][sample]`, oldest sample first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleWindow {
    pub samples: Vec<Vec<f64>>,
    pub sampling_rate: f64,
}

impl SampleWindow {
    pub fn new(samples: Vec<Vec<f64>>, sampling_rate: f64) -> Self {
        Self {
            samples,
            sampling_rate,
        }
    }

    /// Cut the EEG rows out of a full board matrix
    pub fn from_board_rows(rows: &[Vec<f64>], layout: &BoardLayout) -> Self {
        let samples = rows
            .iter()
            .skip(BoardLayout::CHANNEL_OFFSET)
            .take(layout.eeg_channels)
            .cloned()
            .collect();
        Self::new(samples, layout.sampling_rate)
    }

    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }

    pub fn num_samples(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sampling_rate <= 0.0 {
            return 0.0;
        }
        self.num_samples() as f64 / self.sampling_rate
    }
}
