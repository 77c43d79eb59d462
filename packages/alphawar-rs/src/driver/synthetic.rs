// Synthetic EEG generator
//
// Each channel is an alpha (10 Hz) and a beta (21 Hz) sinusoid plus white
// noise. Band amplitudes follow a slow bounded random walk so that two
// synthetic players drift apart and the rope actually moves.

use super::SampleSource;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

const ALPHA_HZ: f64 = 10.0;
const BETA_HZ: f64 = 21.0;
const AMPLITUDE_RANGE: (f64, f64) = (0.2, 2.0);
const DRIFT_PER_SAMPLE: f64 = 0.003;

struct ChannelOscillator {
    alpha_amplitude: f64,
    beta_amplitude: f64,
    alpha_phase: f64,
    beta_phase: f64,
}

pub struct SyntheticSource {
    channels: Vec<ChannelOscillator>,
    noise: f64,
    rng: StdRng,
}

impl SyntheticSource {
    pub fn new(eeg_channels: usize, instance_id: u32) -> Self {
        Self::with_seed(eeg_channels, 0xA1FA_0000 ^ u64::from(instance_id))
    }

    pub fn with_seed(eeg_channels: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let channels = (0..eeg_channels)
            .map(|_| ChannelOscillator {
                alpha_amplitude: rng.random_range(AMPLITUDE_RANGE.0..AMPLITUDE_RANGE.1),
                beta_amplitude: rng.random_range(AMPLITUDE_RANGE.0..AMPLITUDE_RANGE.1),
                alpha_phase: rng.random_range(0.0..2.0 * PI),
                beta_phase: rng.random_range(0.0..2.0 * PI),
            })
            .collect();
        Self {
            channels,
            noise: 0.1,
            rng,
        }
    }

    fn drift(&mut self, amplitude: f64) -> f64 {
        let step = self.rng.random_range(-DRIFT_PER_SAMPLE..DRIFT_PER_SAMPLE);
        (amplitude + step).clamp(AMPLITUDE_RANGE.0, AMPLITUDE_RANGE.1)
    }
}

impl SampleSource for SyntheticSource {
    fn fill(&mut self, _index: u64, t: f64, eeg: &mut [f64]) {
        for ch in 0..eeg.len().min(self.channels.len()) {
            let alpha = self.drift(self.channels[ch].alpha_amplitude);
            let beta = self.drift(self.channels[ch].beta_amplitude);
            let noise = self.rng.random_range(-self.noise..self.noise);

            let osc = &mut self.channels[ch];
            osc.alpha_amplitude = alpha;
            osc.beta_amplitude = beta;
            eeg[ch] = alpha * (2.0 * PI * ALPHA_HZ * t + osc.alpha_phase).sin()
                + beta * (2.0 * PI * BETA_HZ * t + osc.beta_phase).sin()
                + noise;
        }
    }
}
