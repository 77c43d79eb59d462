// Tug-of-war state machine
//
// The marker starts centred at 0. Every epoch moves it one step toward the
// competitor with the larger feature; crossing the bound on either side ends
// the round. Negative positions favour player 1.

use crate::epoch::EpochUpdate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Competitor {
    Player1,
    Player2,
}

impl Competitor {
    pub fn index(&self) -> usize {
        match self {
            Self::Player1 => 0,
            Self::Player2 => 1,
        }
    }
}

impl fmt::Display for Competitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player1 => f.write_str("player 1"),
            Self::Player2 => f.write_str("player 2"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "winner")]
pub enum RoundStatus {
    Active,
    Won(Competitor),
}

impl RoundStatus {
    pub fn winner(&self) -> Option<Competitor> {
        match self {
            Self::Active => None,
            Self::Won(c) => Some(*c),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningStats {
    pub sum: f64,
    pub count: u64,
}

impl RunningStats {
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct Competition {
    step: f64,
    bound: f64,
    position: f64,
    stats: [RunningStats; 2],
    status: RoundStatus,
    round: u32,
}

impl Competition {
    pub fn new(step: f64, bound: f64) -> Self {
        Self {
            step,
            bound,
            position: 0.0,
            stats: [RunningStats::default(); 2],
            status: RoundStatus::Active,
            round: 1,
        }
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn bound(&self) -> f64 {
        self.bound
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn status(&self) -> RoundStatus {
        self.status
    }

    /// 1-based round number
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn stats(&self) -> &[RunningStats; 2] {
        &self.stats
    }

    pub fn averages(&self) -> [f64; 2] {
        [self.stats[0].average(), self.stats[1].average()]
    }

    /// -1 toward player 1, +1 toward player 2
    pub fn direction(features: [f64; 2]) -> f64 {
        const TOWARD_PLAYER_1: f64 = -1.0;
        const TOWARD_PLAYER_2: f64 = 1.0;
        // tie goes to player 1
        const TIE: f64 = TOWARD_PLAYER_1;

        if features[1] > features[0] {
            TOWARD_PLAYER_2
        } else if features[1] == features[0] {
            TIE
        } else {
            TOWARD_PLAYER_1
        }
    }

    /// Apply one epoch. Ignored once the round is won.
    pub fn apply(&mut self, update: &EpochUpdate) -> RoundStatus {
        if let RoundStatus::Won(_) = self.status {
            return self.status;
        }

        self.stats[0].add(update.features[0]);
        self.stats[1].add(update.features[1]);

        self.position += Self::direction(update.features) * self.step;

        if self.position < -self.bound {
            self.status = RoundStatus::Won(Competitor::Player1);
        } else if self.position > self.bound {
            self.status = RoundStatus::Won(Competitor::Player2);
        }

        if let RoundStatus::Won(winner) = self.status {
            log::info!(
                "Round {} won by {} at position {} after {} epochs",
                self.round,
                winner,
                self.position,
                self.stats[0].count
            );
        }
        self.status
    }

    /// Centre the marker, forget the statistics and start the next round
    pub fn reset(&mut self) {
        self.position = 0.0;
        self.stats = [RunningStats::default(); 2];
        self.status = RoundStatus::Active;
        self.round += 1;
        log::info!("Round {} started", self.round);
    }
}
