pub mod analyze;
pub mod config;
pub mod play;
pub mod scan;
