use crate::cli::PlayArgs;
use crate::commands::config;
use crate::exit_codes;
use crate::output;
use alphawar_rs::{
    AlphaWarError, BoardKind, BuiltinLibrary, EpochUpdate, Frame, Game, GameConfig, Intent, Phase,
    Presenter, RoundStatus,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Prints one line per epoch and auto-starts rounds until enough are played
struct TerminalPresenter {
    intents: mpsc::UnboundedSender<Intent>,
    rounds: u32,
    wins: [u32; 2],
    json: bool,
    last_message: Option<String>,
}

#[derive(Serialize)]
struct EpochLine<'a> {
    round: u32,
    epoch: u64,
    features: [f64; 2],
    position: f64,
    status: RoundStatus,
    labels: [&'a str; 2],
}

impl TerminalPresenter {
    fn rounds_played(&self) -> u32 {
        self.wins[0] + self.wins[1]
    }
}

impl Presenter for TerminalPresenter {
    fn present(&mut self, frame: &Frame) {
        if frame.message != self.last_message {
            if let Some(message) = &frame.message {
                eprintln!("{}", message);
            }
            self.last_message = frame.message.clone();
        }
    }

    fn epoch(&mut self, update: &EpochUpdate, frame: &Frame) {
        let labels = [
            frame.players[0].label.as_str(),
            frame.players[1].label.as_str(),
        ];

        if self.json {
            let line = EpochLine {
                round: frame.round,
                epoch: update.epoch_index,
                features: update.features,
                position: frame.position,
                status: frame.status,
                labels,
            };
            if let Ok(json) = output::to_json(&line, true) {
                println!("{}", json);
            }
        } else {
            println!(
                "round {} epoch {:>4}  {} {:>10.4}  {} {:>10.4}  position {:>6} / {}",
                frame.round,
                update.epoch_index,
                labels[0],
                update.features[0],
                labels[1],
                update.features[1],
                output::signed(frame.position),
                frame.bound
            );
        }

        if let RoundStatus::Won(winner) = frame.status {
            self.wins[winner.index()] += 1;
            if !self.json {
                println!(
                    "Round {} won by {} (averages {:.4} / {:.4})",
                    frame.round,
                    labels[winner.index()],
                    frame.players[0].average,
                    frame.players[1].average
                );
            }
            let next = if self.rounds_played() < self.rounds {
                Intent::StartRound
            } else {
                Intent::Quit
            };
            // the receiver lives as long as the game loop
            let _ = self.intents.send(next);
        }
    }
}

fn parse_board(value: &Option<String>) -> Result<Option<BoardKind>, AlphaWarError> {
    value.as_deref().map(str::parse::<BoardKind>).transpose()
}

fn build_config(args: &PlayArgs) -> Result<GameConfig, AlphaWarError> {
    let mut config = config::load(args.config.as_deref())?;

    let boards = [parse_board(&args.board1)?, parse_board(&args.board2)?];
    let ports = [&args.port1, &args.port2];
    let files = [&args.file1, &args.file2];
    for (i, player) in config.players.iter_mut().enumerate() {
        if let Some(board) = boards[i] {
            player.board = board;
        }
        if let Some(port) = ports[i] {
            player.serial_port = Some(port.clone());
        }
        if let Some(file) = files[i] {
            if boards[i].is_none() {
                player.board = BoardKind::PlaybackFile;
            }
            player.playback_file = Some(file.into());
        }
    }

    if let Some(epoch) = args.epoch {
        config.epoch_seconds = epoch;
    }
    if let Some(mode) = &args.mode {
        config.feature_mode = mode.parse()?;
    }
    if let Some(step) = args.step {
        config.step = step;
    }
    if let Some(bound) = args.bound {
        config.bound = bound;
    }
    config.validate()?;
    Ok(config)
}

pub async fn execute(args: PlayArgs) -> i32 {
    if args.rounds == 0 {
        eprintln!("Error: --rounds must be at least 1");
        return exit_codes::INPUT_ERROR;
    }

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::for_error(&e);
        }
    };

    let needs_scan = config
        .players
        .iter()
        .any(|p| p.board.requires_physical_link() && p.serial_port.is_none());

    let mut game = match Game::new(config, Arc::new(BuiltinLibrary)) {
        Ok(game) => game,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::for_error(&e);
        }
    };

    // Startup runs before the loop so a failed handshake ends the command
    if needs_scan {
        game.handle_intent(Intent::ScanForDevices);
    }
    game.handle_intent(Intent::StartRound);
    if game.phase() != Phase::Playing {
        eprintln!(
            "Error: {}",
            game.message().unwrap_or("boards could not be started")
        );
        return exit_codes::DEVICE_ERROR;
    }

    let frame = game.frame();
    if !args.json {
        println!(
            "{} vs {}: {} round(s), first to pass +/-{} wins. Ctrl-C to quit.",
            frame.players[0].label, frame.players[1].label, args.rounds, frame.bound
        );
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Ctrl-C received, shutting down");
            ctrl_c.cancel();
        }
    });

    let (tx, rx) = mpsc::unbounded_channel();
    let mut presenter = TerminalPresenter {
        intents: tx,
        rounds: args.rounds,
        wins: [0, 0],
        json: args.json,
        last_message: None,
    };

    if let Err(e) = game.run(rx, &mut presenter, cancel).await {
        eprintln!("Error: {}", e);
        return exit_codes::for_error(&e);
    }

    if !args.json {
        let frame = game.frame();
        println!(
            "Final score: {} {} - {} {}",
            frame.players[0].label, presenter.wins[0], presenter.wins[1], frame.players[1].label
        );
    }
    exit_codes::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn play_args(extra: &[&str]) -> PlayArgs {
        let mut argv = vec!["alphawar", "play"];
        argv.extend_from_slice(extra);
        match crate::cli::Cli::parse_from(argv).command {
            crate::cli::Command::Play(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = play_args(&["--config", "/nonexistent.json"]);
        assert!(build_config(&args).is_err());

        let args = play_args(&[
            "--board1", "ganglion", "--port1", "COM7", "--mode", "max", "--step", "5",
        ]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.players[0].board, BoardKind::Ganglion);
        assert_eq!(config.players[0].serial_port.as_deref(), Some("COM7"));
        assert_eq!(config.step, 5.0);
        assert_eq!(config.feature_mode, alphawar_rs::FeatureMode::Max);
    }

    #[test]
    fn test_file_implies_playback_board() {
        let args = play_args(&["--file2", "session.txt"]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.players[1].board, BoardKind::PlaybackFile);
    }

    #[test]
    fn test_bad_mode_is_configuration_error() {
        let args = play_args(&["--mode", "theta"]);
        assert!(matches!(
            build_config(&args),
            Err(AlphaWarError::Configuration(_))
        ));
    }
}
