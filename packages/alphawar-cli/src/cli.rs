use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "alphawar",
    version,
    about = "Two-player EEG tug-of-war",
    long_about = "Two players compete by modulating their brain rhythms. Every epoch the \n\
                  player with the larger spectral feature pulls the rope one step.\n\
                  Works with OpenBCI dongles, synthetic boards and recorded sessions."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// List compatible acquisition dongles and the port each player would get
    Scan(ScanArgs),
    /// Play rounds headless and print the score to the terminal
    Play(PlayArgs),
    /// Compute per-epoch features of a recorded session file
    Analyze(AnalyzeArgs),
    /// Print the effective configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct ScanArgs {
    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct PlayArgs {
    /// Config file (default: <config dir>/alphawar/config.json if present)
    #[arg(long, env = "ALPHAWAR_CONFIG")]
    pub config: Option<String>,

    /// Board of player 1 (synthetic, playback_file, cyton, cyton_daisy, ganglion)
    #[arg(long)]
    pub board1: Option<String>,

    /// Board of player 2
    #[arg(long)]
    pub board2: Option<String>,

    /// Serial port of player 1
    #[arg(long)]
    pub port1: Option<String>,

    /// Serial port of player 2
    #[arg(long)]
    pub port2: Option<String>,

    /// Recorded session for player 1 (implies --board1 playback_file)
    #[arg(long)]
    pub file1: Option<String>,

    /// Recorded session for player 2 (implies --board2 playback_file)
    #[arg(long)]
    pub file2: Option<String>,

    /// Epoch length in seconds
    #[arg(long)]
    pub epoch: Option<f64>,

    /// Feature mode (max, norm, betaAlpha)
    #[arg(long)]
    pub mode: Option<String>,

    /// Number of rounds to play before quitting
    #[arg(long, default_value_t = 1)]
    pub rounds: u32,

    /// Rope movement per epoch
    #[arg(long)]
    pub step: Option<f64>,

    /// Distance from the centre that wins the round
    #[arg(long)]
    pub bound: Option<f64>,

    /// Emit one JSON object per epoch instead of text
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Recorded sample file (one sample per line, board row order)
    #[arg(long)]
    pub file: String,

    /// Sampling rate in Hz
    #[arg(long)]
    pub rate: f64,

    /// Epoch length in seconds
    #[arg(long, default_value_t = 2.0)]
    pub epoch: f64,

    /// Feature mode (max, norm, betaAlpha)
    #[arg(long, default_value = "betaAlpha")]
    pub mode: String,

    /// Column of the first EEG channel
    #[arg(long, default_value_t = 1)]
    pub offset: usize,

    /// Number of EEG channels
    #[arg(long, default_value_t = 8)]
    pub channels: usize,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Config file to load instead of the default location
    #[arg(long, env = "ALPHAWAR_CONFIG")]
    pub config: Option<String>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
