// Buffered board session shared by the built-in virtual boards
//
// A background thread produces sample columns at the board's nominal rate and
// appends them to a bounded ring. Reads peek at the tail of the ring, so a
// caller can fetch the same latest window twice without consuming anything.

use super::{BoardDriver, DriverError};
use crate::types::{BoardKind, BoardLayout};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Producer of EEG values for a [`StreamingBoard`]
pub trait SampleSource: Send + 'static {
    /// Load resources. Called once from `prepare`.
    fn prepare(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    /// Write the EEG values of sample `index` at time `t` seconds into `eeg`
    fn fill(&mut self, index: u64, t: f64, eeg: &mut [f64]);
}

/// Fixed-capacity ring of sample columns, oldest first
struct SampleRing {
    columns: VecDeque<Vec<f64>>,
    capacity: usize,
}

impl SampleRing {
    fn new(capacity: usize) -> Self {
        Self {
            columns: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    fn push(&mut self, column: Vec<f64>) {
        if self.columns.len() == self.capacity {
            self.columns.pop_front();
        }
        self.columns.push_back(column);
    }

    /// Last `n` columns transposed to rows x samples
    fn latest(&self, n: usize, num_rows: usize) -> Vec<Vec<f64>> {
        let take = n.min(self.columns.len());
        let start = self.columns.len() - take;
        let mut rows = vec![Vec::with_capacity(take); num_rows];
        for column in self.columns.range(start..) {
            for (row, value) in rows.iter_mut().zip(column.iter()) {
                row.push(*value);
            }
        }
        rows
    }
}

pub struct StreamingBoard<S: SampleSource> {
    board: BoardKind,
    layout: BoardLayout,
    source: Arc<Mutex<S>>,
    ring: Arc<Mutex<SampleRing>>,
    pending_marker: Arc<Mutex<Option<f64>>>,
    samples_produced: Arc<AtomicU64>,
    stop_signal: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    prepared: bool,
}

impl<S: SampleSource> StreamingBoard<S> {
    pub fn new(board: BoardKind, layout: BoardLayout, source: S) -> Self {
        Self {
            board,
            layout,
            source: Arc::new(Mutex::new(source)),
            ring: Arc::new(Mutex::new(SampleRing::new(1))),
            pending_marker: Arc::new(Mutex::new(None)),
            samples_produced: Arc::new(AtomicU64::new(0)),
            stop_signal: Arc::new(AtomicBool::new(false)),
            worker: None,
            prepared: false,
        }
    }

    pub fn board(&self) -> BoardKind {
        self.board
    }

    pub fn is_streaming(&self) -> bool {
        self.worker.is_some()
    }

    /// Total samples produced since the stream was first started
    pub fn samples_produced(&self) -> u64 {
        self.samples_produced.load(Ordering::Relaxed)
    }

    /// Samples currently held in the ring
    pub fn buffered(&self) -> usize {
        self.ring.lock().columns.len()
    }

    fn halt_worker(&mut self) {
        self.stop_signal.store(true, Ordering::Relaxed);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("{} acquisition thread panicked", self.board.name());
            }
        }
    }
}

impl<S: SampleSource> BoardDriver for StreamingBoard<S> {
    fn prepare(&mut self) -> Result<(), DriverError> {
        if self.prepared {
            return Ok(());
        }
        self.source.lock().prepare()?;
        self.prepared = true;
        Ok(())
    }

    fn is_prepared(&self) -> bool {
        self.prepared
    }

    fn start_stream(&mut self, buffer_capacity: usize) -> Result<(), DriverError> {
        if !self.prepared {
            return Err(DriverError::BoardNotCreated(
                "prepare the session before streaming".to_string(),
            ));
        }
        if self.worker.is_some() {
            return Err(DriverError::StreamAlreadyRunning);
        }
        if buffer_capacity == 0 {
            return Err(DriverError::NotReady(
                "buffer capacity must be positive".to_string(),
            ));
        }

        *self.ring.lock() = SampleRing::new(buffer_capacity);
        self.stop_signal.store(false, Ordering::Relaxed);

        let layout = self.layout;
        let source = Arc::clone(&self.source);
        let ring = Arc::clone(&self.ring);
        let marker = Arc::clone(&self.pending_marker);
        let produced = Arc::clone(&self.samples_produced);
        let stop = Arc::clone(&self.stop_signal);
        let rate = layout.sampling_rate;

        let handle = std::thread::Builder::new()
            .name(format!("alphawar-{}", self.board))
            .spawn(move || {
                let started = Instant::now();
                let base = produced.load(Ordering::Relaxed);
                let mut emitted: u64 = 0;
                let mut eeg = vec![0.0; layout.eeg_channels];

                while !stop.load(Ordering::Relaxed) {
                    let due = (started.elapsed().as_secs_f64() * rate) as u64;
                    if due > emitted {
                        let mut source = source.lock();
                        let mut ring = ring.lock();
                        while emitted < due {
                            let index = base + emitted;
                            let t = index as f64 / rate;
                            source.fill(index, t, &mut eeg);

                            let mut column = vec![0.0; layout.num_rows()];
                            column[layout.package_row()] = (index % 256) as f64;
                            column[layout.eeg_rows()].copy_from_slice(&eeg);
                            column[layout.timestamp_row()] = chrono::Utc::now().timestamp_micros() as f64 / 1e6;
                            column[layout.marker_row()] = marker.lock().take().unwrap_or(0.0);

                            ring.push(column);
                            emitted += 1;
                        }
                        produced.store(base + emitted, Ordering::Relaxed);
                    }
                    std::thread::sleep(Duration::from_millis(4));
                }
            })?;

        self.worker = Some(handle);
        log::debug!("{} streaming into ring of {} samples", self.board.name(), buffer_capacity);
        Ok(())
    }

    fn stop_stream(&mut self) -> Result<(), DriverError> {
        if self.worker.is_none() {
            return Err(DriverError::StreamNotRunning);
        }
        self.halt_worker();
        Ok(())
    }

    fn release(&mut self) -> Result<(), DriverError> {
        if !self.prepared {
            return Err(DriverError::BoardNotCreated(
                "session already released".to_string(),
            ));
        }
        self.halt_worker();
        *self.ring.lock() = SampleRing::new(1);
        self.prepared = false;
        Ok(())
    }

    fn current_data(&self, num_samples: usize) -> Result<Vec<Vec<f64>>, DriverError> {
        if !self.prepared {
            return Err(DriverError::BoardNotCreated(
                "session is not prepared".to_string(),
            ));
        }
        Ok(self.ring.lock().latest(num_samples, self.layout.num_rows()))
    }

    fn sampling_rate(&self) -> f64 {
        self.layout.sampling_rate
    }

    fn insert_marker(&mut self, value: f64) -> Result<(), DriverError> {
        if self.worker.is_none() {
            return Err(DriverError::StreamNotRunning);
        }
        *self.pending_marker.lock() = Some(value);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<S: SampleSource> Drop for StreamingBoard<S> {
    fn drop(&mut self) {
        self.halt_worker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ramp;

    impl SampleSource for Ramp {
        fn fill(&mut self, index: u64, _t: f64, eeg: &mut [f64]) {
            for (ch, value) in eeg.iter_mut().enumerate() {
                *value = index as f64 + ch as f64 * 1000.0;
            }
        }
    }

    fn board() -> StreamingBoard<Ramp> {
        StreamingBoard::new(BoardKind::Synthetic, BoardLayout::new(2, 1000.0), Ramp)
    }

    #[test]
    fn test_ring_evicts_oldest() {
        let mut ring = SampleRing::new(3);
        for i in 0..5 {
            ring.push(vec![i as f64]);
        }
        assert_eq!(ring.latest(10, 1), vec![vec![2.0, 3.0, 4.0]]);
        assert_eq!(ring.latest(2, 1), vec![vec![3.0, 4.0]]);
    }

    #[test]
    fn test_lifecycle_errors() {
        let mut board = board();
        assert!(matches!(
            board.start_stream(100),
            Err(DriverError::BoardNotCreated(_))
        ));
        assert!(matches!(board.release(), Err(DriverError::BoardNotCreated(_))));
        assert!(board.current_data(10).is_err());

        board.prepare().unwrap();
        board.start_stream(100).unwrap();
        assert!(matches!(
            board.start_stream(100),
            Err(DriverError::StreamAlreadyRunning)
        ));
        board.stop_stream().unwrap();
        assert!(matches!(board.stop_stream(), Err(DriverError::StreamNotRunning)));
        board.release().unwrap();
        assert!(!board.is_prepared());
    }

    #[test]
    fn test_streams_and_peeks_without_consuming() {
        let mut board = board();
        board.prepare().unwrap();
        board.start_stream(10_000).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while board.buffered() < 50 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        board.stop_stream().unwrap();

        let first = board.current_data(20).unwrap();
        let second = board.current_data(20).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
        assert_eq!(first[1].len(), 20);

        // consecutive samples, channel offset respected
        assert_eq!(first[1][1] - first[1][0], 1.0);
        assert_eq!(first[2][0] - first[1][0], 1000.0);
    }
}
