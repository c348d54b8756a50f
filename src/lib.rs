//! # tobii-gi - Runtime bindings for the Tobii Game Integration library
//!
//! Loads `Tobii.GameIntegration` from the directory of the module this crate
//! is linked into and exposes its exports. Provides:
//! - A flat, C-compatible capability table ([`ApiTable`]) filled by [`initialize`]
//! - A safe [`GazeTracker`] trait over the loaded library ([`TobiiApi`])
//! - Tracking sessions with optional background polling ([`Tracker`], [`SampleStream`])
//! - Packed gaze point / head pose records matching the library's ABI
//! - C FFI for hosts that want the raw table
//!
//! A missing library is not fatal: hosts are expected to carry on without
//! eye tracking.
//!
//! ## Quick Start
//! ```no_run
//! use tobii_gi::{Subscription, ThreadMode, TobiiApi, Tracker, UnitType};
//!
//! let api = match TobiiApi::load() {
//!     Ok(api) => api,
//!     Err(e) => {
//!         eprintln!("eye tracking unavailable: {e}");
//!         return;
//!     }
//! };
//! let mut tracker = Tracker::start(api, ThreadMode::Custom).unwrap();
//! tracker.subscribe(Subscription::STANDARD_GAZE).unwrap();
//! loop {
//!     let frame = tracker.poll(UnitType::Normalized).unwrap();
//!     for point in &frame.gaze {
//!         let (x, y) = (point.x, point.y);
//!         println!("gaze: ({x:.3}, {y:.3})");
//!     }
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod ffi;
pub mod library;
pub mod module_path;
pub mod stream;
pub mod tracker;
pub mod types;

pub use api::{initialize, initialize_with, load_table, ApiTable, GazeTracker, TobiiApi};
pub use config::LoaderConfig;
pub use error::TobiiError;
pub use library::{library_file_name, DynamicLibrary, NativeLibrary};
pub use module_path::{locate_library, LibraryLocation, PathOrigin};
pub use stream::SampleStream;
pub use tracker::{Frame, ThreadMode, Tracker, TrackerStatus};
pub use types::*;

/// Result type alias for tobii-gi operations.
pub type Result<T> = std::result::Result<T, TobiiError>;
