use crate::api::GazeTracker;
use crate::tracker::Tracker;
use crate::types::{Sample, UnitType};
use crate::{Result, TobiiError};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const CHANNEL_CAPACITY: usize = 1024;

/// Samples produced by a [`Tracker`] running on its own polling thread.
///
/// The polling thread owns the tracker, so `Update` is always called from
/// one thread. Stopping or dropping the stream joins that thread, which in
/// turn stops the tracker.
pub struct SampleStream {
    receiver: Receiver<Sample>,
    stop_flag: Arc<AtomicBool>,
    /// Dropped on shutdown to wake the polling thread out of its wait.
    stop_signal: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl SampleStream {
    pub(crate) fn start<T>(tracker: Tracker<T>, unit: UnitType, interval: Duration) -> Result<SampleStream>
    where
        T: GazeTracker + Send + 'static,
    {
        let (sender, receiver) = crossbeam_channel::bounded(CHANNEL_CAPACITY);
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_clone = stop_flag.clone();
        let (stop_signal, stop_rx) = crossbeam_channel::bounded(0);

        let thread = std::thread::Builder::new()
            .name("tobii-poll".into())
            .spawn(move || {
                poll_loop(tracker, unit, interval, sender, stop_clone, stop_rx);
            })
            .map_err(TobiiError::Spawn)?;

        Ok(SampleStream {
            receiver,
            stop_flag,
            stop_signal: Some(stop_signal),
            thread: Some(thread),
        })
    }

    /// Receive the next sample (blocks until available).
    pub fn recv(&self) -> Result<Sample> {
        self.receiver.recv().map_err(|_| TobiiError::StreamStopped)
    }

    /// Try to receive a sample without blocking.
    pub fn try_recv(&self) -> Option<Sample> {
        self.receiver.try_recv().ok()
    }

    /// Receive the next sample, waiting at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Sample> {
        self.receiver.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => TobiiError::Timeout,
            RecvTimeoutError::Disconnected => TobiiError::StreamStopped,
        })
    }

    /// Whether the polling thread is still running.
    pub fn is_active(&self) -> bool {
        !self.stop_flag.load(Ordering::Relaxed)
            && self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop polling and wait for the tracker to shut down.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        self.stop_signal.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SampleStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn poll_loop<T: GazeTracker>(
    mut tracker: Tracker<T>,
    unit: UnitType,
    interval: Duration,
    sender: Sender<Sample>,
    stop_flag: Arc<AtomicBool>,
    stop_rx: Receiver<()>,
) {
    log::info!("Poll thread started ({:?}, every {:?})", unit, interval);

    'poll: while !stop_flag.load(Ordering::Relaxed) {
        let frame = match tracker.poll(unit) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Poll failed, stopping: {}", e);
                break;
            }
        };

        let samples = frame
            .gaze
            .into_iter()
            .map(Sample::Gaze)
            .chain(frame.head.into_iter().map(Sample::Head));
        for sample in samples {
            match sender.try_send(sample) {
                Ok(()) => {}
                Err(crossbeam_channel::TrySendError::Full(_)) => {
                    log::trace!("Sample channel full, dropping sample");
                }
                Err(crossbeam_channel::TrySendError::Disconnected(_)) => {
                    log::info!("Sample channel disconnected, stopping poll thread");
                    break 'poll;
                }
            }
        }

        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            _ => break,
        }
    }

    stop_flag.store(true, Ordering::Relaxed);
    if let Err(e) = tracker.stop() {
        log::warn!("Tracker stop failed: {}", e);
    }
}
