use alphawar_rs::AlphaWarError;

pub const SUCCESS: i32 = 0;
pub const EXECUTION_ERROR: i32 = 1;
pub const INPUT_ERROR: i32 = 2;
pub const DEVICE_ERROR: i32 = 3;

pub fn for_error(error: &AlphaWarError) -> i32 {
    match error {
        AlphaWarError::Configuration(_) => INPUT_ERROR,
        AlphaWarError::DiscoveryFailure(_)
        | AlphaWarError::NoCompatibleDeviceFound
        | AlphaWarError::HandshakeFailure { .. } => DEVICE_ERROR,
        _ => EXECUTION_ERROR,
    }
}
