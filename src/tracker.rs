use crate::api::{GazeTracker, TobiiApi};
use crate::stream::SampleStream;
use crate::types::{
    GazePoint, HeadPose, ScreenSize, Subscription, UnitType, UserPresence, WindowHandle,
};
use crate::{Result, TobiiError};
use std::time::Duration;

/// Who drives `Update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadMode {
    /// The library runs its own tracking thread.
    Internal,
    /// The caller pumps [`Tracker::poll`] from its own loop.
    Custom,
}

/// Samples collected by one [`Tracker::poll`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    /// `Update` reported new data.
    pub updated: bool,
    pub gaze: Vec<GazePoint>,
    pub head: Vec<HeadPose>,
}

impl Frame {
    pub fn is_empty(&self) -> bool {
        self.gaze.is_empty() && self.head.is_empty()
    }
}

/// Snapshot of every status query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerStatus {
    pub initialised: bool,
    pub ready: bool,
    pub connected: bool,
    /// `WasUpdated`: the library received data since the previous `Update`.
    pub was_updated: bool,
    pub presence: UserPresence,
    pub screen_size: ScreenSize,
    pub since_last_gaze: f32,
    pub since_last_head: f32,
}

/// A started tracking session.
///
/// Dropping the session unsubscribes its streams and stops the tracker.
pub struct Tracker<T: GazeTracker = TobiiApi> {
    api: T,
    mode: ThreadMode,
    subscriptions: Subscription,
    running: bool,
}

impl<T: GazeTracker> Tracker<T> {
    /// Start tracking on `api`.
    pub fn start(api: T, mode: ThreadMode) -> Result<Tracker<T>> {
        if !api.start(mode == ThreadMode::Custom)? {
            return Err(TobiiError::StartFailed);
        }
        log::info!("Tracker started ({:?} thread)", mode);

        Ok(Tracker {
            api,
            mode,
            subscriptions: Subscription::empty(),
            running: true,
        })
    }

    pub fn api(&self) -> &T {
        &self.api
    }

    pub fn mode(&self) -> ThreadMode {
        self.mode
    }

    /// Streams currently subscribed through this session.
    pub fn subscriptions(&self) -> Subscription {
        self.subscriptions
    }

    /// Bind the tracker to a native window so gaze maps onto its client area.
    pub fn set_window(&mut self, window: WindowHandle) -> Result<()> {
        self.api.set_window(window)
    }

    pub fn subscribe(&mut self, streams: Subscription) -> Result<()> {
        let added = streams.difference(self.subscriptions);
        if added.is_empty() {
            return Ok(());
        }
        self.api.subscribe(added)?;
        self.subscriptions |= added;
        log::debug!("Subscribed {:?}, active {:?}", added, self.subscriptions);
        Ok(())
    }

    pub fn unsubscribe(&mut self, streams: Subscription) -> Result<()> {
        let removed = streams.intersection(self.subscriptions);
        if removed.is_empty() {
            return Ok(());
        }
        self.api.unsubscribe(removed)?;
        self.subscriptions.remove(removed);
        log::debug!("Unsubscribed {:?}, active {:?}", removed, self.subscriptions);
        Ok(())
    }

    /// Pump the library and drain whatever the active subscriptions produced.
    ///
    /// Gaze points are read in `unit`. Streams that are not subscribed are not drained.
    pub fn poll(&mut self, unit: UnitType) -> Result<Frame> {
        let mut frame = Frame {
            updated: self.api.update()?,
            ..Frame::default()
        };
        if self.subscriptions.intersects(Subscription::GAZE) {
            self.api.new_gaze_points(unit, &mut frame.gaze)?;
        }
        if self.subscriptions.contains(Subscription::HEAD_TRACKING) {
            self.api.new_head_poses(&mut frame.head)?;
        }
        Ok(frame)
    }

    pub fn status(&self) -> Result<TrackerStatus> {
        Ok(TrackerStatus {
            initialised: self.api.is_initialised()?,
            ready: self.api.is_ready()?,
            connected: self.api.is_connected()?,
            was_updated: self.api.was_updated()?,
            presence: self.api.user_presence()?,
            screen_size: self.api.screen_size_mm()?,
            since_last_gaze: self.api.time_since_last_gaze_packet()?,
            since_last_head: self.api.time_since_last_head_packet()?,
        })
    }

    /// Stop tracking now instead of on drop.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if !self.running {
            return Ok(());
        }
        self.running = false;

        if !self.subscriptions.is_empty() {
            let active = std::mem::replace(&mut self.subscriptions, Subscription::empty());
            if let Err(e) = self.api.unsubscribe(active) {
                log::warn!("Failed to unsubscribe {:?}: {}", active, e);
            }
        }
        self.api.stop()?;
        log::info!("Tracker stopped");
        Ok(())
    }
}

impl<T: GazeTracker + Send + 'static> Tracker<T> {
    /// Move the session onto a dedicated polling thread.
    ///
    /// The thread calls [`poll`](Self::poll) every `interval` and forwards each
    /// sample. Dropping the returned stream stops the thread and the tracker.
    pub fn into_stream(self, unit: UnitType, interval: Duration) -> Result<SampleStream> {
        SampleStream::start(self, unit, interval)
    }
}

impl<T: GazeTracker> Drop for Tracker<T> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("Tracker shutdown failed: {}", e);
        }
    }
}
