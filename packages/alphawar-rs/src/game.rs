// Game loop
//
// A single task owns all mutable game state. It multiplexes four event
// sources with a biased `tokio::select!`:
//
//   1. cancellation (Ctrl-C, window close)
//   2. operator intents
//   3. epoch ticks, only while a round is being played
//   4. frame ticks
//
// Board drivers buffer on their own threads, so the loop only ever peeks at
// their ring buffers. Presenters receive read-only `Frame` snapshots.

use crate::competition::{Competition, RoundStatus};
use crate::config::GameConfig;
use crate::driver::{AcquisitionLibrary, DeviceInfo};
use crate::epoch::{EpochCounters, EpochScheduler, EpochUpdate};
use crate::error::Result;
use crate::history::{AxisScale, HistoryBuffer};
use crate::session::{SessionFactory, SessionManager};
use crate::types::{BoardKind, DeviceDescriptor};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for boards; ports may be scanned
    Setup,
    Playing,
    RoundOver,
    Shutdown,
}

/// Operator requests accepted by the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    ScanForDevices,
    StartRound,
    ResetRound,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerFrame {
    pub label: String,
    pub board: BoardKind,
    pub port: Option<String>,
    pub latest: Option<f64>,
    pub average: f64,
    pub history: Vec<f64>,
}

/// Everything a presenter may show for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub phase: Phase,
    pub status: RoundStatus,
    pub round: u32,
    pub position: f64,
    pub bound: f64,
    pub players: [PlayerFrame; 2],
    pub axis: Option<AxisScale>,
    pub message: Option<String>,
    pub epochs: EpochCounters,
}

pub trait Presenter {
    fn present(&mut self, frame: &Frame);

    /// Called once per measured epoch with the frame it produced
    fn epoch(&mut self, _update: &EpochUpdate, _frame: &Frame) {}
}

/// Port assignment after a scan.
///
/// A slot in `wanted` keeps its current port if that port is still available;
/// the remaining wanted slots take the free ports in discovery order. Slots not
/// in `wanted` are returned unchanged.
pub fn assign_ports(
    current: &[Option<String>; 2],
    wanted: [bool; 2],
    available: &[String],
) -> [Option<String>; 2] {
    let mut assigned: [Option<String>; 2] = [None, None];
    let mut used: Vec<&str> = Vec::new();

    for i in 0..2 {
        if !wanted[i] {
            assigned[i] = current[i].clone();
            continue;
        }
        if let Some(port) = current[i].as_deref() {
            if available.iter().any(|p| p == port) && !used.contains(&port) {
                assigned[i] = Some(port.to_string());
                used.push(port);
            }
        }
    }

    for i in 0..2 {
        if !wanted[i] || assigned[i].is_some() {
            continue;
        }
        if let Some(port) = available.iter().find(|p| !used.contains(&p.as_str())) {
            assigned[i] = Some(port.clone());
            used.push(port.as_str());
        }
    }

    assigned
}

pub struct Game {
    config: GameConfig,
    factory: SessionFactory,
    descriptors: [DeviceDescriptor; 2],
    sessions: Option<[SessionManager; 2]>,
    scheduler: EpochScheduler,
    competition: Competition,
    histories: [HistoryBuffer; 2],
    latest: [Option<f64>; 2],
    phase: Phase,
    message: Option<String>,
    scanned: bool,
}

impl Game {
    pub fn new(config: GameConfig, library: Arc<dyn AcquisitionLibrary>) -> Result<Self> {
        config.validate()?;
        let factory = SessionFactory::new(library).with_buffer_capacity(config.stream_buffer_capacity);
        Ok(Self {
            descriptors: config.descriptors(),
            factory,
            sessions: None,
            scheduler: EpochScheduler::new(config.epoch_seconds, config.feature_mode)?,
            competition: Competition::new(config.step, config.bound),
            histories: [
                HistoryBuffer::new(config.history_capacity),
                HistoryBuffer::new(config.history_capacity),
            ],
            latest: [None, None],
            phase: Phase::Setup,
            message: None,
            scanned: false,
            config,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn competition(&self) -> &Competition {
        &self.competition
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn sessions(&self) -> Option<&[SessionManager; 2]> {
        self.sessions.as_ref()
    }

    pub fn ports(&self) -> [Option<String>; 2] {
        [
            self.descriptors[0].serial_port.clone(),
            self.descriptors[1].serial_port.clone(),
        ]
    }

    pub fn frame(&self) -> Frame {
        let averages = self.competition.averages();
        let players = [0, 1].map(|i| PlayerFrame {
            label: self.config.players[i].name.clone(),
            board: self.descriptors[i].board,
            port: self.descriptors[i].serial_port.clone(),
            latest: self.latest[i],
            average: averages[i],
            history: self.histories[i].snapshot(),
        });
        let axis = AxisScale::fit(
            &[&players[0].history, &players[1].history],
            self.config.min_tick,
        );
        Frame {
            phase: self.phase,
            status: self.competition.status(),
            round: self.competition.round(),
            position: self.competition.position(),
            bound: self.competition.bound(),
            players,
            axis,
            message: self.message.clone(),
            epochs: self.scheduler.counters(),
        }
    }

    /// Apply one intent. Returns `false` once the game has shut down.
    pub fn handle_intent(&mut self, intent: Intent) -> bool {
        log::debug!("Intent {:?} in phase {:?}", intent, self.phase);
        match (intent, self.phase) {
            (_, Phase::Shutdown) => {}
            (Intent::Quit, _) => self.shutdown(),
            (Intent::ScanForDevices, Phase::Setup) => self.scan(),
            (Intent::StartRound, Phase::Setup) => self.connect(),
            (Intent::StartRound, Phase::RoundOver)
            | (Intent::ResetRound, Phase::Playing)
            | (Intent::ResetRound, Phase::RoundOver) => {
                self.competition.reset();
                self.phase = Phase::Playing;
            }
            (intent, phase) => {
                log::debug!("Ignoring {:?} in phase {:?}", intent, phase);
            }
        }
        self.phase != Phase::Shutdown
    }

    /// Names of physical players that still have no port
    fn unassigned_players(&self) -> Vec<&str> {
        (0..2)
            .filter(|&i| {
                self.descriptors[i].board.requires_physical_link()
                    && self.descriptors[i].serial_port.is_none()
            })
            .map(|i| self.config.players[i].name.as_str())
            .collect()
    }

    fn no_device_message(missing: &[&str]) -> String {
        format!(
            "No compatible device found for {}. Connect the dongle and scan again.",
            missing.join(" and ")
        )
    }

    fn scan(&mut self) {
        let wanted = [0, 1].map(|i| {
            self.descriptors[i].board.requires_physical_link()
        });
        if !wanted.iter().any(|w| *w) {
            self.message = None;
            return;
        }
        self.scanned = true;

        let devices: Vec<DeviceInfo> = match self.factory.discover() {
            Ok(devices) => devices,
            Err(e) => {
                log::warn!("{}", e);
                self.message = Some(e.to_string());
                return;
            }
        };
        let available: Vec<String> = devices.into_iter().map(|d| d.port).collect();

        let assigned = assign_ports(&self.ports(), wanted, &available);
        for (descriptor, port) in self.descriptors.iter_mut().zip(assigned) {
            descriptor.serial_port = port;
        }

        let missing = self.unassigned_players();
        if missing.is_empty() {
            log::info!("Ports assigned: {:?}", self.ports());
            self.message = None;
        } else {
            let message = Self::no_device_message(&missing);
            self.message = Some(message);
        }
    }

    fn connect(&mut self) {
        // a scan that left a player without a port wins over auto-detection
        if self.scanned {
            let missing = self.unassigned_players();
            if !missing.is_empty() {
                let message = Self::no_device_message(&missing);
                log::warn!("Not starting: {}", message);
                if self.message.is_none() {
                    self.message = Some(message);
                }
                return;
            }
        }

        match self.start_sessions() {
            Ok(sessions) => {
                for (descriptor, session) in self.descriptors.iter_mut().zip(&sessions) {
                    descriptor.serial_port = session.descriptor().serial_port.clone();
                }
                self.sessions = Some(sessions);
                self.message = None;
                self.phase = Phase::Playing;
                log::info!("Both boards streaming, round {} begins", self.competition.round());
            }
            Err(e) => {
                log::error!("{}", e);
                self.message = Some(e.to_string());
            }
        }
    }

    /// Both sessions or neither. A session that started is stopped again when
    /// its partner fails.
    fn start_sessions(&mut self) -> Result<[SessionManager; 2]> {
        let mut first = self.factory.connect(&self.descriptors[0])?;
        if let Err(e) = first.start_streaming() {
            self.release(&mut first);
            return Err(e);
        }

        let mut second = match self.factory.connect(&self.descriptors[1]) {
            Ok(session) => session,
            Err(e) => {
                self.release(&mut first);
                return Err(e);
            }
        };
        if let Err(e) = second.start_streaming() {
            self.release(&mut first);
            self.release(&mut second);
            return Err(e);
        }
        Ok([first, second])
    }

    /// Stop a session and hand its port back to discovery
    fn release(&mut self, session: &mut SessionManager) {
        // failures are logged by stop()
        let _ = session.stop();
        if let Some(port) = session.descriptor().serial_port.as_deref() {
            self.factory.release_port(port);
        }
    }

    fn shutdown(&mut self) {
        if let Some(mut sessions) = self.sessions.take() {
            for session in sessions.iter_mut() {
                self.release(session);
            }
        }
        self.phase = Phase::Shutdown;
        log::info!("Game shut down");
    }

    /// Measure one epoch and advance the competition
    pub fn epoch_tick(&mut self) -> Option<(EpochUpdate, RoundStatus)> {
        if self.phase != Phase::Playing {
            return None;
        }
        let sessions = self.sessions.as_ref()?;
        let update = self.scheduler.tick([&sessions[0], &sessions[1]])?;

        for i in 0..2 {
            self.histories[i].push(update.features[i]);
            self.latest[i] = Some(update.features[i]);
        }
        let status = self.competition.apply(&update);
        if let RoundStatus::Won(_) = status {
            self.phase = Phase::RoundOver;
        }
        Some((update, status))
    }

    /// Drive the game until `Quit` or cancellation. Both sessions are
    /// released before this returns.
    pub async fn run<P: Presenter>(
        &mut self,
        mut intents: mpsc::UnboundedReceiver<Intent>,
        presenter: &mut P,
        cancel: CancellationToken,
    ) -> Result<()> {
        let mut epoch_timer = interval(Duration::from_secs_f64(self.config.epoch_seconds));
        epoch_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut frame_timer = interval(Duration::from_secs_f64(1.0 / self.config.frame_rate_hz));
        frame_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut intents_open = true;
        let mut was_playing = false;

        while self.phase != Phase::Shutdown {
            let playing = self.phase == Phase::Playing;
            if playing && !was_playing {
                // first epoch one full period after play resumes
                epoch_timer.reset();
            }
            was_playing = playing;

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    log::info!("Game loop cancelled");
                    self.shutdown();
                }

                intent = intents.recv(), if intents_open => {
                    match intent {
                        Some(intent) => {
                            self.handle_intent(intent);
                        }
                        None => {
                            log::debug!("Intent channel closed");
                            intents_open = false;
                        }
                    }
                }

                _ = epoch_timer.tick(), if playing => {
                    if let Some((update, _)) = self.epoch_tick() {
                        presenter.epoch(&update, &self.frame());
                    }
                }

                _ = frame_timer.tick() => {
                    presenter.present(&self.frame());
                }
            }
        }

        presenter.present(&self.frame());
        Ok(())
    }
}

impl Drop for Game {
    fn drop(&mut self) {
        if self.sessions.is_some() {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlayerConfig;
    use crate::driver::BuiltinLibrary;

    fn ports(a: &str, b: &str) -> Vec<String> {
        vec![a.to_string(), b.to_string()]
    }

    #[test]
    fn test_assign_ports_in_discovery_order() {
        let assigned = assign_ports(&[None, None], [true, true], &ports("COM3", "COM4"));
        assert_eq!(assigned, [Some("COM3".to_string()), Some("COM4".to_string())]);
    }

    #[test]
    fn test_assign_ports_keeps_present_assignment() {
        let current = [None, Some("COM4".to_string())];
        let assigned = assign_ports(&current, [true, true], &ports("COM4", "COM5"));
        assert_eq!(assigned, [Some("COM5".to_string()), Some("COM4".to_string())]);
    }

    #[test]
    fn test_assign_ports_replaces_vanished_port() {
        let current = [Some("COM9".to_string()), None];
        let assigned = assign_ports(&current, [true, true], &["COM3".to_string()]);
        assert_eq!(assigned, [Some("COM3".to_string()), None]);
    }

    #[test]
    fn test_assign_ports_skips_unwanted_slots() {
        let assigned = assign_ports(&[None, None], [false, true], &ports("COM3", "COM4"));
        assert_eq!(assigned, [None, Some("COM3".to_string())]);
    }

    #[test]
    fn test_new_game_starts_in_setup() {
        let game = Game::new(GameConfig::default(), Arc::new(BuiltinLibrary)).unwrap();
        assert_eq!(game.phase(), Phase::Setup);
        let frame = game.frame();
        assert_eq!(frame.round, 1);
        assert_eq!(frame.position, 0.0);
        assert!(frame.axis.is_none());
        assert_eq!(frame.players[0].label, "Player 1");
    }

    #[test]
    fn test_failed_start_keeps_setup_and_sets_message() {
        let mut config = GameConfig::default();
        config.players[1] = PlayerConfig {
            name: "Bob".to_string(),
            board: BoardKind::PlaybackFile,
            serial_port: None,
            master_board: None,
            playback_file: Some("/nonexistent/recording.txt".into()),
        };
        let mut game = Game::new(config, Arc::new(BuiltinLibrary)).unwrap();

        assert!(game.handle_intent(Intent::StartRound));
        assert_eq!(game.phase(), Phase::Setup);
        assert!(game.sessions().is_none());
        assert!(game.message().unwrap_or_default().contains("[Bob]"));
    }

    #[test]
    fn test_intents_outside_their_phase_are_ignored() {
        let mut game = Game::new(GameConfig::default(), Arc::new(BuiltinLibrary)).unwrap();
        assert!(game.handle_intent(Intent::ResetRound));
        assert_eq!(game.phase(), Phase::Setup);
        assert_eq!(game.competition().round(), 1);
        assert!(game.epoch_tick().is_none());
    }

    #[test]
    fn test_scan_without_physical_boards_is_noop() {
        let mut game = Game::new(GameConfig::default(), Arc::new(BuiltinLibrary)).unwrap();
        game.handle_intent(Intent::ScanForDevices);
        assert!(game.message().is_none());
        assert_eq!(game.ports(), [None, None]);
    }

    #[test]
    fn test_quit_from_setup() {
        let mut game = Game::new(GameConfig::default(), Arc::new(BuiltinLibrary)).unwrap();
        assert!(!game.handle_intent(Intent::Quit));
        assert_eq!(game.phase(), Phase::Shutdown);
        assert!(!game.handle_intent(Intent::StartRound));
    }
}
