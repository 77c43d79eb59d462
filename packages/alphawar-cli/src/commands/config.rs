use crate::cli::ConfigArgs;
use crate::exit_codes;
use crate::output;
use alphawar_rs::{GameConfig, Result};
use std::path::Path;

/// Explicit file, else the default location if it exists, else built-in defaults
pub fn load(path: Option<&str>) -> Result<GameConfig> {
    match path {
        Some(path) => GameConfig::load(Path::new(path)),
        None => GameConfig::load_or_default(),
    }
}

pub fn execute(args: ConfigArgs) -> i32 {
    let config = match load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::for_error(&e);
        }
    };

    if args.json {
        return output::print_json(&config, false);
    }

    let source = match (&args.config, GameConfig::default_path()) {
        (Some(path), _) => path.clone(),
        (None, Some(path)) if path.exists() => path.display().to_string(),
        _ => "built-in defaults".to_string(),
    };
    println!("Configuration ({})", source);
    println!();
    for (i, player) in config.players.iter().enumerate() {
        let mut line = format!("  Player {}: {} on {}", i + 1, player.name, player.board);
        if let Some(port) = &player.serial_port {
            line.push_str(&format!(" at {}", port));
        }
        if let Some(master) = player.master_board {
            line.push_str(&format!(" (master: {})", master));
        }
        if let Some(file) = &player.playback_file {
            line.push_str(&format!(" from {}", file.display()));
        }
        println!("{}", line);
    }
    println!("  Epoch:          {} s", config.epoch_seconds);
    println!("  Feature mode:   {}", config.feature_mode);
    println!("  Step / bound:   {} / {}", config.step, config.bound);
    println!("  History:        {} epochs", config.history_capacity);
    println!("  Stream buffer:  {} samples", config.stream_buffer_capacity);
    println!("  Frame rate:     {} Hz", config.frame_rate_hz);

    exit_codes::SUCCESS
}
