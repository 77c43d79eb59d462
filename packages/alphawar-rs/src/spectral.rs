// Epoch spectral features
//
// Turns one channels x samples window into a single competitive scalar. The
// power spectrum is the squared magnitude of the full-length DFT of each
// channel (no taper, no padding). Bin k of an n-point transform sits at
// k*fs/n for k <= (n-1)/2 and at (k-n)*fs/n above that, so negative
// frequencies never land in a band.

use crate::error::{AlphaWarError, Result};
use crate::types::SampleWindow;
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::str::FromStr;

thread_local! {
    static FFT_PLANNER: RefCell<FftPlanner<f64>> = RefCell::new(FftPlanner::new());
}

/// Alpha band, both edges inclusive (Hz)
pub const ALPHA_BAND: (f64, f64) = (8.0, 12.0);
/// Beta band, lower edge exclusive (Hz)
pub const BETA_BAND: (f64, f64) = (12.0, 30.0);

/// How a window is reduced to one feature value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum FeatureMode {
    /// Per-channel alpha power over that channel's peak power, summed
    Max,
    /// Per-channel alpha power over the Euclidean norm of its spectrum, summed
    Norm,
    /// Total beta power over total alpha power
    #[default]
    #[serde(alias = "betaalpha", alias = "beta_alpha")]
    BetaAlpha,
}

impl FeatureMode {
    pub const ALL: [FeatureMode; 3] = [FeatureMode::Max, FeatureMode::Norm, FeatureMode::BetaAlpha];

    pub fn description(&self) -> &'static str {
        match self {
            Self::Max => "sum of per-channel alpha power normalized by the channel's peak FFT power",
            Self::Norm => "sum of per-channel alpha power normalized by the norm of the channel's power spectrum",
            Self::BetaAlpha => "ratio of total beta power (12-30 Hz) to total alpha power (8-12 Hz)",
        }
    }

    /// Reduce per-channel band powers to the feature value
    pub fn reduce(&self, bands: &[ChannelBandPower]) -> f64 {
        match self {
            Self::Max => bands
                .iter()
                .map(|b| normalized_or_zero(b.alpha, b.peak))
                .sum(),
            Self::Norm => bands
                .iter()
                .map(|b| normalized_or_zero(b.alpha, b.norm))
                .sum(),
            Self::BetaAlpha => {
                let total_alpha: f64 = bands.iter().map(|b| b.alpha).sum();
                let total_beta: f64 = bands.iter().map(|b| b.beta).sum();
                beta_alpha_ratio(total_beta, total_alpha)
            }
        }
    }
}

impl fmt::Display for FeatureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Max => "max",
            Self::Norm => "norm",
            Self::BetaAlpha => "betaAlpha",
        })
    }
}

impl FromStr for FeatureMode {
    type Err = AlphaWarError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "max" => Ok(Self::Max),
            "norm" => Ok(Self::Norm),
            "betaalpha" | "beta_alpha" | "beta-alpha" => Ok(Self::BetaAlpha),
            _ => Err(AlphaWarError::Configuration(format!(
                "feature mode must be 'max', 'norm', or 'betaAlpha', got '{}'",
                s
            ))),
        }
    }
}

/// Band powers of one channel
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelBandPower {
    pub alpha: f64,
    pub beta: f64,
    /// Largest bin of the full power spectrum
    pub peak: f64,
    /// Euclidean norm of the full power spectrum
    pub norm: f64,
}

/// `total_beta / total_alpha`, or exactly 0 when there is no alpha power
pub fn beta_alpha_ratio(total_beta: f64, total_alpha: f64) -> f64 {
    if total_alpha == 0.0 {
        return 0.0;
    }
    total_beta / total_alpha
}

fn normalized_or_zero(value: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    value / denominator
}

/// Frequency of each DFT bin for `n` samples at `sampling_rate`
pub fn bin_frequencies(n: usize, sampling_rate: f64) -> Vec<f64> {
    let positive = (n.saturating_sub(1)) / 2;
    (0..n)
        .map(|k| {
            let signed = if k <= positive {
                k as f64
            } else {
                k as f64 - n as f64
            };
            signed * sampling_rate / n as f64
        })
        .collect()
}

/// Squared magnitude of the full-length DFT
pub fn power_spectrum(signal: &[f64]) -> Vec<f64> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }

    let mut buffer: Vec<Complex<f64>> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
    FFT_PLANNER.with(|planner| {
        let fft = planner.borrow_mut().plan_fft_forward(n);
        fft.process(&mut buffer);
    });

    buffer.iter().map(|c| c.norm_sqr()).collect()
}

/// Alpha/beta/peak/norm for each channel of `samples`
pub fn band_powers(samples: &[Vec<f64>], sampling_rate: f64) -> Vec<ChannelBandPower> {
    samples
        .iter()
        .map(|channel| {
            let spectrum = power_spectrum(channel);
            let freqs = bin_frequencies(channel.len(), sampling_rate);

            let mut bands = ChannelBandPower::default();
            let mut sum_sq = 0.0;
            for (&f, &p) in freqs.iter().zip(&spectrum) {
                if f >= ALPHA_BAND.0 && f <= ALPHA_BAND.1 {
                    bands.alpha += p;
                }
                if f > BETA_BAND.0 && f <= BETA_BAND.1 {
                    bands.beta += p;
                }
                bands.peak = bands.peak.max(p);
                sum_sq += p * p;
            }
            bands.norm = sum_sq.sqrt();
            bands
        })
        .collect()
}

/// Feature value of a channels x samples window
pub fn extract_feature(samples: &[Vec<f64>], sampling_rate: f64, mode: FeatureMode) -> f64 {
    mode.reduce(&band_powers(samples, sampling_rate))
}

/// Feature value of a [`SampleWindow`]
pub fn window_feature(window: &SampleWindow, mode: FeatureMode) -> f64 {
    extract_feature(&window.samples, window.sampling_rate, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq: f64, amplitude: f64, rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 / rate).sin())
            .collect()
    }

    fn mix(a: &[f64], b: &[f64]) -> Vec<f64> {
        a.iter().zip(b).map(|(x, y)| x + y).collect()
    }

    #[test]
    fn test_bin_frequencies_match_fftfreq_layout() {
        assert_eq!(
            bin_frequencies(8, 8.0),
            vec![0.0, 1.0, 2.0, 3.0, -4.0, -3.0, -2.0, -1.0]
        );
        assert_eq!(
            bin_frequencies(5, 5.0),
            vec![0.0, 1.0, 2.0, -2.0, -1.0]
        );
        assert!(bin_frequencies(0, 250.0).is_empty());
    }

    #[test]
    fn test_power_spectrum_of_impulse_is_flat() {
        let spectrum = power_spectrum(&[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(spectrum.len(), 4);
        for p in spectrum {
            assert!((p - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_ten_hz_sine_lands_in_alpha() {
        let bands = band_powers(&[sine(10.0, 1.0, 250.0, 500)], 250.0);
        assert!(bands[0].alpha > 0.0);
        assert!(bands[0].beta < bands[0].alpha * 1e-6);
        // a pure tone puts all positive-side power into one bin
        assert!((bands[0].alpha - bands[0].peak).abs() / bands[0].peak < 1e-9);
    }

    #[test]
    fn test_beta_alpha_tracks_dominant_band() {
        let n = 500;
        let alpha_heavy = mix(&sine(10.0, 2.0, 250.0, n), &sine(20.0, 1.0, 250.0, n));
        let beta_heavy = mix(&sine(10.0, 1.0, 250.0, n), &sine(20.0, 2.0, 250.0, n));

        let low = extract_feature(&[alpha_heavy], 250.0, FeatureMode::BetaAlpha);
        let high = extract_feature(&[beta_heavy], 250.0, FeatureMode::BetaAlpha);
        assert!((low - 0.25).abs() < 1e-9, "got {}", low);
        assert!((high - 4.0).abs() < 1e-9, "got {}", high);
    }

    #[test]
    fn test_zero_alpha_gives_exactly_zero() {
        let silent = vec![vec![0.0; 500]; 8];
        for mode in FeatureMode::ALL {
            assert_eq!(extract_feature(&silent, 250.0, mode), 0.0);
        }

        // pure beta, no alpha at all
        let beta_only = vec![sine(20.0, 1.0, 250.0, 500)];
        let bands = band_powers(&beta_only, 250.0);
        assert!(bands[0].alpha < 1e-18);
        assert_eq!(beta_alpha_ratio(5.0, 0.0), 0.0);
    }

    #[test]
    fn test_reduce_beta_alpha_scenario() {
        let bands = [
            ChannelBandPower {
                alpha: 4.0,
                beta: 2.0,
                ..Default::default()
            },
            ChannelBandPower {
                alpha: 0.0,
                beta: 1.0,
                ..Default::default()
            },
        ];
        assert_eq!(FeatureMode::BetaAlpha.reduce(&bands), 0.75);
    }

    #[test]
    fn test_reduce_max_and_norm_skip_zero_denominators() {
        let bands = [
            ChannelBandPower {
                alpha: 2.0,
                beta: 0.0,
                peak: 4.0,
                norm: 8.0,
            },
            ChannelBandPower::default(),
        ];
        assert_eq!(FeatureMode::Max.reduce(&bands), 0.5);
        assert_eq!(FeatureMode::Norm.reduce(&bands), 0.25);
    }

    #[test]
    fn test_features_are_non_negative_and_finite() {
        let window = vec![
            mix(&sine(9.0, 1.5, 250.0, 500), &sine(25.0, 0.7, 250.0, 500)),
            sine(11.0, 0.3, 250.0, 500),
        ];
        for mode in FeatureMode::ALL {
            let value = extract_feature(&window, 250.0, mode);
            assert!(value.is_finite() && value >= 0.0, "{}: {}", mode, value);
        }
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let window = vec![
            mix(&sine(10.0, 1.0, 250.0, 500), &sine(17.0, 0.4, 250.0, 500)),
            sine(12.0, 0.9, 250.0, 500),
        ];
        for mode in FeatureMode::ALL {
            let a = extract_feature(&window, 250.0, mode);
            let b = extract_feature(&window, 250.0, mode);
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("max".parse::<FeatureMode>().unwrap(), FeatureMode::Max);
        assert_eq!("NORM".parse::<FeatureMode>().unwrap(), FeatureMode::Norm);
        assert_eq!(
            "betaAlpha".parse::<FeatureMode>().unwrap(),
            FeatureMode::BetaAlpha
        );
        assert_eq!(
            "beta_alpha".parse::<FeatureMode>().unwrap(),
            FeatureMode::BetaAlpha
        );
        assert!(matches!(
            "theta".parse::<FeatureMode>(),
            Err(AlphaWarError::Configuration(_))
        ));
        for mode in FeatureMode::ALL {
            assert_eq!(mode.to_string().parse::<FeatureMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_mode_serde() {
        assert_eq!(
            serde_json::to_string(&FeatureMode::BetaAlpha).unwrap(),
            "\"betaAlpha\""
        );
        let parsed: FeatureMode = serde_json::from_str("\"betaalpha\"").unwrap();
        assert_eq!(parsed, FeatureMode::BetaAlpha);
        assert!(serde_json::from_str::<FeatureMode>("\"theta\"").is_err());
        assert_eq!(FeatureMode::default(), FeatureMode::BetaAlpha);
    }
}
