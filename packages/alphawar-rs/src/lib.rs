pub mod competition;
pub mod config;
pub mod driver;
pub mod epoch;
pub mod error;
pub mod game;
pub mod history;
pub mod session;
pub mod spectral;
pub mod types;

pub use competition::{Competition, Competitor, RoundStatus, RunningStats};
pub use config::{GameConfig, PlayerConfig};
pub use driver::{AcquisitionLibrary, BoardDriver, BuiltinLibrary, DeviceInfo, DriverError, UsbId};
pub use epoch::{EpochCounters, EpochScheduler, EpochUpdate};
pub use error::{AlphaWarError, Result};
pub use game::{assign_ports, Frame, Game, Intent, Phase, PlayerFrame, Presenter};
pub use history::{AxisScale, HistoryBuffer};
pub use session::{SessionFactory, SessionManager, SessionState};
pub use spectral::{band_powers, extract_feature, ChannelBandPower, FeatureMode};
pub use types::*;
