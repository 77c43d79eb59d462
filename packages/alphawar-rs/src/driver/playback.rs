// Playback of recorded sessions
//
// File format: one sample per line, values separated by tabs, commas or
// spaces, laid out in board row order (package counter first, then the EEG
// channels). Lines starting with '#' and blank lines are skipped. The file is
// replayed at the board's nominal rate and looped at EOF.

use super::{DriverError, SampleSource};
use crate::types::BoardLayout;
use std::path::{Path, PathBuf};

/// Read a sample file into `samples[line][column]`
pub fn read_sample_file(path: &Path) -> Result<Vec<Vec<f64>>, DriverError> {
    let text = std::fs::read_to_string(path)?;
    let mut samples = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let values = trimmed
            .split(|c: char| c == ',' || c == '\t' || c == ' ')
            .filter(|field| !field.is_empty())
            .map(|field| {
                field.parse::<f64>().map_err(|e| {
                    DriverError::Parse(format!(
                        "{}:{}: '{}' is not a number ({})",
                        path.display(),
                        line_no + 1,
                        field,
                        e
                    ))
                })
            })
            .collect::<Result<Vec<f64>, DriverError>>()?;
        samples.push(values);
    }

    Ok(samples)
}

pub struct PlaybackSource {
    path: PathBuf,
    eeg_channels: usize,
    frames: Vec<Vec<f64>>,
}

impl PlaybackSource {
    pub fn new(path: PathBuf, eeg_channels: usize) -> Self {
        Self {
            path,
            eeg_channels,
            frames: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl SampleSource for PlaybackSource {
    fn prepare(&mut self) -> Result<(), DriverError> {
        let lines = read_sample_file(&self.path)?;
        if lines.is_empty() {
            return Err(DriverError::Parse(format!(
                "{} contains no samples",
                self.path.display()
            )));
        }

        let needed = BoardLayout::CHANNEL_OFFSET + self.eeg_channels;
        let mut frames = Vec::with_capacity(lines.len());
        for (i, line) in lines.into_iter().enumerate() {
            if line.len() < needed {
                return Err(DriverError::Parse(format!(
                    "{}: sample {} has {} columns, expected at least {}",
                    self.path.display(),
                    i + 1,
                    line.len(),
                    needed
                )));
            }
            frames.push(line[BoardLayout::CHANNEL_OFFSET..needed].to_vec());
        }

        log::info!(
            "Loaded {} samples for playback from {}",
            frames.len(),
            self.path.display()
        );
        self.frames = frames;
        Ok(())
    }

    fn fill(&mut self, index: u64, _t: f64, eeg: &mut [f64]) {
        if self.frames.is_empty() {
            eeg.fill(0.0);
            return;
        }
        let frame = &self.frames[(index % self.frames.len() as u64) as usize];
        for (dst, src) in eeg.iter_mut().zip(frame) {
            *dst = *src;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_read_mixed_separators() {
        let file = write_file("# header\n0\t1.5\t2.5\n\n1,3.0,4.0\n2 5 6\n");
        let samples = read_sample_file(file.path()).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[1], vec![1.0, 3.0, 4.0]);
    }

    #[test]
    fn test_read_reports_bad_value() {
        let file = write_file("0\t1.0\n1\tabc\n");
        let err = read_sample_file(file.path()).unwrap_err();
        assert!(err.to_string().contains(":2:"));
    }

    #[test]
    fn test_playback_loops_over_eeg_columns() {
        let file = write_file("0\t1\t10\t99\n1\t2\t20\t99\n");
        let mut source = PlaybackSource::new(file.path().to_path_buf(), 2);
        source.prepare().unwrap();
        assert_eq!(source.len(), 2);

        let mut eeg = [0.0; 2];
        source.fill(0, 0.0, &mut eeg);
        assert_eq!(eeg, [1.0, 10.0]);
        source.fill(3, 0.0, &mut eeg);
        assert_eq!(eeg, [2.0, 20.0]);
    }

    #[test]
    fn test_playback_rejects_short_rows() {
        let file = write_file("0\t1\n");
        let mut source = PlaybackSource::new(file.path().to_path_buf(), 4);
        assert!(matches!(source.prepare(), Err(DriverError::Parse(_))));
    }
}
