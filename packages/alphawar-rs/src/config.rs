use crate::error::{AlphaWarError, Result};
use crate::session::DEFAULT_STREAM_BUFFER;
use crate::spectral::FeatureMode;
use crate::types::{BoardKind, DeviceDescriptor};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One competitor's board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    pub name: String,
    pub board: BoardKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_board: Option<BoardKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playback_file: Option<PathBuf>,
}

impl PlayerConfig {
    pub fn synthetic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            board: BoardKind::Synthetic,
            serial_port: None,
            master_board: None,
            playback_file: None,
        }
    }

    pub fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor {
            board: self.board,
            serial_port: self.serial_port.clone(),
            master_board: self.master_board,
            playback_file: self.playback_file.clone(),
            label: Some(self.name.clone()),
        }
    }
}

fn default_players() -> [PlayerConfig; 2] {
    [
        PlayerConfig::synthetic("Player 1"),
        PlayerConfig::synthetic("Player 2"),
    ]
}

fn default_epoch_seconds() -> f64 {
    2.0
}

fn default_history_capacity() -> usize {
    100
}

fn default_step() -> f64 {
    30.0
}

fn default_bound() -> f64 {
    600.0
}

fn default_stream_buffer_capacity() -> usize {
    DEFAULT_STREAM_BUFFER
}

fn default_frame_rate_hz() -> f64 {
    30.0
}

fn default_min_tick() -> f64 {
    1.0
}

/// Game settings, usually read from `config.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default = "default_players")]
    pub players: [PlayerConfig; 2],
    #[serde(default = "default_epoch_seconds")]
    pub epoch_seconds: f64,
    #[serde(default)]
    pub feature_mode: FeatureMode,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default = "default_step")]
    pub step: f64,
    #[serde(default = "default_bound")]
    pub bound: f64,
    #[serde(default = "default_stream_buffer_capacity")]
    pub stream_buffer_capacity: usize,
    #[serde(default = "default_frame_rate_hz")]
    pub frame_rate_hz: f64,
    #[serde(default = "default_min_tick")]
    pub min_tick: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            players: default_players(),
            epoch_seconds: default_epoch_seconds(),
            feature_mode: FeatureMode::default(),
            history_capacity: default_history_capacity(),
            step: default_step(),
            bound: default_bound(),
            stream_buffer_capacity: default_stream_buffer_capacity(),
            frame_rate_hz: default_frame_rate_hz(),
            min_tick: default_min_tick(),
        }
    }
}

impl GameConfig {
    /// `<config dir>/alphawar/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("alphawar").join("config.json"))
    }

    /// Read and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AlphaWarError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            AlphaWarError::Configuration(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load the file at [`default_path`](Self::default_path) if there is one
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, value: f64) -> Result<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(AlphaWarError::Configuration(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )))
            }
        }

        positive("epoch_seconds", self.epoch_seconds)?;
        positive("step", self.step)?;
        positive("bound", self.bound)?;
        positive("frame_rate_hz", self.frame_rate_hz)?;
        positive("min_tick", self.min_tick)?;

        if self.history_capacity == 0 {
            return Err(AlphaWarError::Configuration(
                "history_capacity must be at least 1".to_string(),
            ));
        }
        if self.stream_buffer_capacity == 0 {
            return Err(AlphaWarError::Configuration(
                "stream_buffer_capacity must be at least 1".to_string(),
            ));
        }

        for player in &self.players {
            player.descriptor().effective_layout().map_err(|e| match e {
                AlphaWarError::Configuration(msg) => {
                    AlphaWarError::Configuration(format!("{}: {}", player.name, msg))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    pub fn descriptors(&self) -> [DeviceDescriptor; 2] {
        [self.players[0].descriptor(), self.players[1].descriptor()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = GameConfig::default();
        assert_eq!(config.epoch_seconds, 2.0);
        assert_eq!(config.feature_mode, FeatureMode::BetaAlpha);
        assert_eq!(config.history_capacity, 100);
        assert_eq!(config.step, 30.0);
        assert_eq!(config.bound, 600.0);
        assert_eq!(config.stream_buffer_capacity, 450_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "players": [
                    {{"name": "Ada", "board": "cyton", "serial_port": "/dev/ttyUSB0"}},
                    {{"name": "Bob", "board": "synthetic", "master_board": "ganglion"}}
                ],
                "feature_mode": "max",
                "step": 10
            }}"#
        )
        .unwrap();

        let config = GameConfig::load(file.path()).unwrap();
        assert_eq!(config.feature_mode, FeatureMode::Max);
        assert_eq!(config.step, 10.0);
        assert_eq!(config.bound, 600.0);

        let [a, b] = config.descriptors();
        assert_eq!(a.serial_port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(a.label.as_deref(), Some("Ada"));
        assert_eq!(b.effective_layout().unwrap().eeg_channels, 4);
    }

    #[test]
    fn test_unknown_mode_rejected_at_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"feature_mode": "theta"}}"#).unwrap();
        assert!(matches!(
            GameConfig::load(file.path()),
            Err(AlphaWarError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = GameConfig {
            epoch_seconds: 0.0,
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());

        let config = GameConfig {
            bound: f64::NAN,
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.players[1].master_board = Some(BoardKind::Synthetic);
        config.players[1].board = BoardKind::Ganglion;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Player 2"));
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = GameConfig::load(Path::new("/nonexistent/alphawar.json")).unwrap_err();
        assert!(matches!(err, AlphaWarError::Configuration(_)));
    }
}
