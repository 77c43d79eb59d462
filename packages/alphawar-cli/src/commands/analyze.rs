use crate::cli::AnalyzeArgs;
use crate::exit_codes;
use crate::output;
use alphawar_rs::driver::read_sample_file;
use alphawar_rs::spectral::{band_powers, FeatureMode};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct EpochRow {
    index: usize,
    start_sec: f64,
    feature: f64,
    alpha: f64,
    beta: f64,
}

#[derive(Serialize)]
struct AnalyzeOutput {
    file: String,
    sampling_rate: f64,
    mode: FeatureMode,
    channels: usize,
    samples: usize,
    samples_per_epoch: usize,
    epochs: Vec<EpochRow>,
    mean_feature: f64,
}

fn input_error(message: String) -> i32 {
    eprintln!("Error: {}", message);
    exit_codes::INPUT_ERROR
}

pub fn execute(args: AnalyzeArgs) -> i32 {
    let mode: FeatureMode = match args.mode.parse() {
        Ok(mode) => mode,
        Err(e) => return input_error(e.to_string()),
    };
    if !(args.rate.is_finite() && args.rate > 0.0) {
        return input_error(format!("--rate must be positive, got {}", args.rate));
    }
    if !(args.epoch.is_finite() && args.epoch > 0.0) {
        return input_error(format!("--epoch must be positive, got {}", args.epoch));
    }
    if args.channels == 0 {
        return input_error("--channels must be at least 1".to_string());
    }

    let lines = match read_sample_file(Path::new(&args.file)) {
        Ok(lines) => lines,
        Err(e) => return input_error(format!("{}: {}", args.file, e)),
    };

    let end = args.offset + args.channels;
    let mut channels = vec![Vec::with_capacity(lines.len()); args.channels];
    for (i, line) in lines.iter().enumerate() {
        if line.len() < end {
            return input_error(format!(
                "sample {} has {} columns, expected at least {}",
                i + 1,
                line.len(),
                end
            ));
        }
        for (channel, value) in channels.iter_mut().zip(&line[args.offset..end]) {
            channel.push(*value);
        }
    }

    let samples_per_epoch = (args.epoch * args.rate).floor() as usize;
    if samples_per_epoch == 0 || lines.len() < samples_per_epoch {
        return input_error(format!(
            "{} holds {} samples, fewer than one epoch of {}",
            args.file,
            lines.len(),
            samples_per_epoch
        ));
    }

    let epochs: Vec<EpochRow> = (0..lines.len() / samples_per_epoch)
        .map(|index| {
            let start = index * samples_per_epoch;
            let window: Vec<Vec<f64>> = channels
                .iter()
                .map(|ch| ch[start..start + samples_per_epoch].to_vec())
                .collect();
            let bands = band_powers(&window, args.rate);
            EpochRow {
                index,
                start_sec: start as f64 / args.rate,
                feature: mode.reduce(&bands),
                alpha: bands.iter().map(|b| b.alpha).sum(),
                beta: bands.iter().map(|b| b.beta).sum(),
            }
        })
        .collect();
    log::info!(
        "Analyzed {} epochs of {} samples from {}",
        epochs.len(),
        samples_per_epoch,
        args.file
    );

    let mean_feature = epochs.iter().map(|e| e.feature).sum::<f64>() / epochs.len() as f64;
    let result = AnalyzeOutput {
        file: args.file.clone(),
        sampling_rate: args.rate,
        mode,
        channels: args.channels,
        samples: lines.len(),
        samples_per_epoch,
        epochs,
        mean_feature,
    };

    if args.json {
        return output::print_json(&result, false);
    }

    println!(
        "{} ({} samples @ {} Hz, {} channels, mode {})",
        result.file, result.samples, result.sampling_rate, result.channels, result.mode
    );
    println!();
    println!(
        "{:>5}  {:>9}  {:>12}  {:>14}  {:>14}",
        "EPOCH", "START (s)", "FEATURE", "ALPHA", "BETA"
    );
    for row in &result.epochs {
        println!(
            "{:>5}  {:>9.2}  {:>12.6}  {:>14.4e}  {:>14.4e}",
            row.index, row.start_sec, row.feature, row.alpha, row.beta
        );
    }
    println!();
    println!("Mean feature: {:.6}", result.mean_feature);

    exit_codes::SUCCESS
}
