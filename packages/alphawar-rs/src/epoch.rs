// Epoch scheduling
//
// One tick pulls the latest epoch-sized window from both sessions and turns
// it into a paired feature update. If either side is not ready the whole
// epoch is skipped; a partial update would let one competitor move the rope
// alone.

use crate::error::{AlphaWarError, Result};
use crate::session::SessionManager;
use crate::spectral::{window_feature, FeatureMode};
use serde::{Deserialize, Serialize};

/// Paired features for one epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochUpdate {
    pub epoch_index: u64,
    pub features: [f64; 2],
    /// Unix time in seconds when the epoch was measured
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochCounters {
    pub emitted: u64,
    pub skipped: u64,
}

#[derive(Debug, Clone)]
pub struct EpochScheduler {
    epoch_seconds: f64,
    mode: FeatureMode,
    next_index: u64,
    counters: EpochCounters,
}

impl EpochScheduler {
    /// `epoch_seconds` must be finite and positive
    pub fn new(epoch_seconds: f64, mode: FeatureMode) -> Result<Self> {
        if !(epoch_seconds.is_finite() && epoch_seconds > 0.0) {
            return Err(AlphaWarError::Configuration(format!(
                "epoch length must be a positive number of seconds, got {}",
                epoch_seconds
            )));
        }
        Ok(Self {
            epoch_seconds,
            mode,
            next_index: 0,
            counters: EpochCounters::default(),
        })
    }

    pub fn epoch_seconds(&self) -> f64 {
        self.epoch_seconds
    }

    pub fn mode(&self) -> FeatureMode {
        self.mode
    }

    pub fn counters(&self) -> EpochCounters {
        self.counters
    }

    /// Window size for a session sampling at `sampling_rate`
    pub fn samples_per_epoch(&self, sampling_rate: f64) -> usize {
        let n = (self.epoch_seconds * sampling_rate).floor();
        if n.is_finite() && n > 0.0 {
            n as usize
        } else {
            0
        }
    }

    /// Measure one epoch. `None` when either session has no full window.
    pub fn tick(&mut self, sessions: [&SessionManager; 2]) -> Option<EpochUpdate> {
        let n1 = self.samples_per_epoch(sessions[0].sampling_rate());
        let n2 = self.samples_per_epoch(sessions[1].sampling_rate());

        let first = sessions[0].pull_latest(n1);
        let second = sessions[1].pull_latest(n2);

        let (w1, w2) = match (first, second) {
            (Some(w1), Some(w2)) => (w1, w2),
            (first, second) => {
                self.counters.skipped += 1;
                log::debug!(
                    "Skipping epoch: {} ready={}, {} ready={}",
                    sessions[0].label(),
                    first.is_some(),
                    sessions[1].label(),
                    second.is_some()
                );
                return None;
            }
        };

        let mode = self.mode;
        let (f1, f2) = rayon::join(
            || window_feature(&w1, mode),
            || window_feature(&w2, mode),
        );

        let update = EpochUpdate {
            epoch_index: self.next_index,
            features: [f1, f2],
            timestamp: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
        };
        self.next_index += 1;
        self.counters.emitted += 1;

        log::debug!(
            "Epoch {}: {}={:.4} {}={:.4} ({})",
            update.epoch_index,
            sessions[0].label(),
            f1,
            sessions[1].label(),
            f2,
            mode
        );
        Some(update)
    }
}
