//! The capability table: typed entry points resolved from the Game Integration library.
//!
//! [`ApiTable`] is the flat, C-compatible table. Every slot is either a valid
//! entry point or `None`; it never holds garbage. [`TobiiApi`] owns a table
//! together with its library and implements [`GazeTracker`], where calling a
//! capability the library did not export returns an error instead of jumping
//! through a null pointer.

use crate::config::LoaderConfig;
use crate::library::{DynamicLibrary, NativeLibrary};
use crate::module_path::{locate_library, LibraryLocation, PathOrigin};
use crate::types::{
    GazePoint, HeadPose, ScreenSize, Subscription, UnitType, UserPresence, WindowHandle,
};
use crate::{Result, TobiiError};
use std::ffi::{c_int, c_void, CStr};
use std::path::Path;
use std::ptr::NonNull;

pub type StartFn = Option<unsafe extern "C" fn(custom_thread: bool) -> bool>;
pub type SetWindowFn = Option<unsafe extern "C" fn(window: *mut c_void)>;
pub type StopFn = Option<unsafe extern "C" fn()>;
pub type SubscribeToStreamFn = Option<unsafe extern "C" fn(stream: c_int)>;
pub type UnsubscribeFromStreamFn = Option<unsafe extern "C" fn(stream: c_int)>;
pub type UpdateFn = Option<unsafe extern "C" fn() -> bool>;
pub type GetNewGazePointsFn =
    Option<unsafe extern "C" fn(points: *mut *mut GazePoint, count: *mut c_int, unit: c_int)>;
pub type GetNewHeadPosesFn =
    Option<unsafe extern "C" fn(poses: *mut *mut HeadPose, count: *mut c_int)>;
pub type IsInitialisedFn = Option<unsafe extern "C" fn() -> bool>;
pub type IsReadyFn = Option<unsafe extern "C" fn() -> bool>;
pub type IsConnectedFn = Option<unsafe extern "C" fn() -> bool>;
pub type GetUserPresenceFn = Option<unsafe extern "C" fn() -> c_int>;
pub type WasUpdatedFn = Option<unsafe extern "C" fn() -> bool>;
pub type TimeSinceLastGazePacketFn = Option<unsafe extern "C" fn() -> f32>;
pub type TimeSinceLastHeadPacketFn = Option<unsafe extern "C" fn() -> f32>;
pub type GetScreenSizeMmFn = Option<unsafe extern "C" fn(width: *mut c_int, height: *mut c_int)>;

/// Export names, in table order.
pub const SYMBOLS: [&CStr; 16] = [
    c"Start",
    c"SetWindow",
    c"Stop",
    c"SubscribeToStream",
    c"UnsubscribeFromStream",
    c"Update",
    c"GetNewGazePoints",
    c"GetNewHeadPoses",
    c"IsInitialised",
    c"IsReady",
    c"IsConnected",
    c"GetUserPresence",
    c"WasUpdated",
    c"TimeSinceLastGazePacket",
    c"TimeSinceLastHeadPacket",
    c"GetScreenSizeMm",
];

/// Flat table of entry points, laid out for C consumers.
///
/// Each `*Fn` alias is a nullable function pointer. `Default` is the empty
/// table: every slot `None` (NULL in C).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiTable {
    pub start: StartFn,
    pub set_window: SetWindowFn,
    pub stop: StopFn,
    pub subscribe_to_stream: SubscribeToStreamFn,
    pub unsubscribe_from_stream: UnsubscribeFromStreamFn,
    pub update: UpdateFn,
    pub get_new_gaze_points: GetNewGazePointsFn,
    pub get_new_head_poses: GetNewHeadPosesFn,
    pub is_initialised: IsInitialisedFn,
    pub is_ready: IsReadyFn,
    pub is_connected: IsConnectedFn,
    pub get_user_presence: GetUserPresenceFn,
    pub was_updated: WasUpdatedFn,
    pub time_since_last_gaze_packet: TimeSinceLastGazePacketFn,
    pub time_since_last_head_packet: TimeSinceLastHeadPacketFn,
    pub get_screen_size_mm: GetScreenSizeMmFn,
}

/// Reinterpret a symbol address as the function pointer type `F`.
///
/// # Safety
/// `F` must be a function pointer type matching the export's real signature.
unsafe fn cast_symbol<F: Copy>(addr: NonNull<c_void>) -> F {
    debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<*mut c_void>());
    std::mem::transmute_copy(&addr.as_ptr())
}

fn resolve_slot<F: Copy>(library: &dyn NativeLibrary, name: &CStr) -> Option<F> {
    match library.symbol_address(name) {
        Some(addr) => {
            log::debug!("Resolved {}", name.to_string_lossy());
            // Safety: every call site pairs the export name with its declared signature.
            Some(unsafe { cast_symbol(addr) })
        }
        None => {
            log::warn!(
                "{} does not export {}",
                library.path().display(),
                name.to_string_lossy()
            );
            None
        }
    }
}

impl ApiTable {
    /// Resolve every entry point from `library`. Missing exports leave only
    /// their own slot empty.
    pub fn resolve(library: &dyn NativeLibrary) -> ApiTable {
        let [
            start,
            set_window,
            stop,
            subscribe,
            unsubscribe,
            update,
            gaze,
            head,
            initialised,
            ready,
            connected,
            presence,
            was_updated,
            since_gaze,
            since_head,
            screen,
        ] = SYMBOLS;

        ApiTable {
            start: resolve_slot(library, start),
            set_window: resolve_slot(library, set_window),
            stop: resolve_slot(library, stop),
            subscribe_to_stream: resolve_slot(library, subscribe),
            unsubscribe_from_stream: resolve_slot(library, unsubscribe),
            update: resolve_slot(library, update),
            get_new_gaze_points: resolve_slot(library, gaze),
            get_new_head_poses: resolve_slot(library, head),
            is_initialised: resolve_slot(library, initialised),
            is_ready: resolve_slot(library, ready),
            is_connected: resolve_slot(library, connected),
            get_user_presence: resolve_slot(library, presence),
            was_updated: resolve_slot(library, was_updated),
            time_since_last_gaze_packet: resolve_slot(library, since_gaze),
            time_since_last_head_packet: resolve_slot(library, since_head),
            get_screen_size_mm: resolve_slot(library, screen),
        }
    }

    /// Whether each slot is populated, in [`SYMBOLS`] order.
    pub fn validity(&self) -> [bool; 16] {
        [
            self.start.is_some(),
            self.set_window.is_some(),
            self.stop.is_some(),
            self.subscribe_to_stream.is_some(),
            self.unsubscribe_from_stream.is_some(),
            self.update.is_some(),
            self.get_new_gaze_points.is_some(),
            self.get_new_head_poses.is_some(),
            self.is_initialised.is_some(),
            self.is_ready.is_some(),
            self.is_connected.is_some(),
            self.get_user_presence.is_some(),
            self.was_updated.is_some(),
            self.time_since_last_gaze_packet.is_some(),
            self.time_since_last_head_packet.is_some(),
            self.get_screen_size_mm.is_some(),
        ]
    }

    /// `(export name, populated)` pairs in table order.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, bool)> {
        SYMBOLS
            .into_iter()
            .zip(self.validity())
            .map(|(name, valid)| (name.to_str().unwrap_or_default(), valid))
    }

    /// Export names that did not resolve.
    pub fn missing(&self) -> Vec<&'static str> {
        self.entries()
            .filter(|(_, valid)| !valid)
            .map(|(name, _)| name)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.validity().iter().all(|v| *v)
    }

    pub fn is_empty(&self) -> bool {
        self.validity().iter().all(|v| !v)
    }
}

/// Locate and load the library, resolve its entry points and keep it loaded
/// for the rest of the process.
pub fn load_table(config: &LoaderConfig) -> Result<ApiTable> {
    let location = locate_library(config)?;
    let library = open_located(&location)?.leak();
    let table = ApiTable::resolve(library);
    log_resolution(library.path(), &table);
    Ok(table)
}

/// Fill `table` from the library next to the host module, configured from
/// the environment.
///
/// Returns `false` and leaves every slot empty when the library cannot be
/// found or loaded. Returns `true` once the library is loaded, even if some
/// exports are missing; check [`ApiTable::is_complete`] or individual slots
/// before calling through them.
pub fn initialize(table: &mut ApiTable) -> bool {
    initialize_with(table, &LoaderConfig::from_env())
}

/// [`initialize`] with an explicit configuration.
pub fn initialize_with(table: &mut ApiTable, config: &LoaderConfig) -> bool {
    *table = ApiTable::default();
    match load_table(config) {
        Ok(loaded) => {
            *table = loaded;
            true
        }
        Err(e) => {
            log::warn!("Eye tracking unavailable: {}", e);
            false
        }
    }
}

fn open_located(location: &LibraryLocation) -> Result<DynamicLibrary> {
    DynamicLibrary::open(&location.path).map_err(|e| {
        if location.origin == PathOrigin::WorkingDirectory {
            log::warn!(
                "{} was searched in the working directory because the host module directory was unknown",
                location.path.display()
            );
        }
        e
    })
}

fn log_resolution(path: &Path, table: &ApiTable) {
    let missing = table.missing();
    log::info!(
        "Loaded {} ({}/{} entry points)",
        path.display(),
        SYMBOLS.len() - missing.len(),
        SYMBOLS.len()
    );
    if !missing.is_empty() {
        log::warn!("Missing entry points: {}", missing.join(", "));
    }
}

/// One method per library capability.
///
/// Methods are thin pass-throughs. They return
/// [`TobiiError::SymbolUnavailable`] when the backing export is absent.
pub trait GazeTracker {
    /// Start tracking. With `custom_thread` the caller pumps [`update`](Self::update)
    /// itself; otherwise the library runs its own thread.
    fn start(&self, custom_thread: bool) -> Result<bool>;
    fn set_window(&self, window: WindowHandle) -> Result<()>;
    fn stop(&self) -> Result<()>;
    /// Subscribe to each stream in `streams`.
    fn subscribe(&self, streams: Subscription) -> Result<()>;
    fn unsubscribe(&self, streams: Subscription) -> Result<()>;
    /// Pump newly arrived samples. Call once per frame from one thread.
    fn update(&self) -> Result<bool>;
    /// Append gaze points received since the last drain; returns how many were appended.
    fn new_gaze_points(&self, unit: UnitType, out: &mut Vec<GazePoint>) -> Result<usize>;
    /// Append head poses received since the last drain; returns how many were appended.
    fn new_head_poses(&self, out: &mut Vec<HeadPose>) -> Result<usize>;
    fn is_initialised(&self) -> Result<bool>;
    fn is_ready(&self) -> Result<bool>;
    fn is_connected(&self) -> Result<bool>;
    fn user_presence(&self) -> Result<UserPresence>;
    fn was_updated(&self) -> Result<bool>;
    fn time_since_last_gaze_packet(&self) -> Result<f32>;
    fn time_since_last_head_packet(&self) -> Result<f32>;
    fn screen_size_mm(&self) -> Result<ScreenSize>;
}

/// Library-owned sample buffer handed out by the drain calls.
///
/// # Safety
/// `ptr` must be null or point to `count` initialized elements.
unsafe fn copy_samples<T: Copy>(ptr: *const T, count: c_int, out: &mut Vec<T>) -> usize {
    if ptr.is_null() || count <= 0 {
        return 0;
    }
    let samples = std::slice::from_raw_parts(ptr, count as usize);
    out.extend_from_slice(samples);
    samples.len()
}

/// Owns a capability table and the library it was resolved from.
pub struct TobiiApi {
    table: ApiTable,
    library: Box<dyn NativeLibrary>,
}

impl TobiiApi {
    /// Load the library using configuration from the environment.
    pub fn load() -> Result<TobiiApi> {
        Self::load_with(&LoaderConfig::from_env())
    }

    pub fn load_with(config: &LoaderConfig) -> Result<TobiiApi> {
        let location = locate_library(config)?;
        let library = open_located(&location)?;
        Ok(Self::from_library(Box::new(library)))
    }

    /// Resolve entry points from an already loaded library.
    pub fn from_library(library: Box<dyn NativeLibrary>) -> TobiiApi {
        let table = ApiTable::resolve(library.as_ref());
        log_resolution(library.path(), &table);
        TobiiApi { table, library }
    }

    /// Fail unless every entry point resolved.
    pub fn require_complete(self) -> Result<TobiiApi> {
        let missing = self.table.missing();
        if missing.is_empty() {
            Ok(self)
        } else {
            Err(TobiiError::SymbolsMissing(missing))
        }
    }

    pub fn table(&self) -> &ApiTable {
        &self.table
    }

    pub fn library_path(&self) -> &Path {
        self.library.path()
    }
}

impl std::fmt::Debug for TobiiApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TobiiApi")
            .field("library", &self.library.path())
            .field("missing", &self.table.missing())
            .finish()
    }
}

fn entry<F>(slot: Option<F>, name: &'static str) -> Result<F> {
    slot.ok_or(TobiiError::SymbolUnavailable(name))
}

// Safety for every call below: the slot was resolved from the export of the
// same name and cast to that export's declared signature.
impl GazeTracker for TobiiApi {
    fn start(&self, custom_thread: bool) -> Result<bool> {
        let f = entry(self.table.start, "Start")?;
        Ok(unsafe { f(custom_thread) })
    }

    fn set_window(&self, window: WindowHandle) -> Result<()> {
        let f = entry(self.table.set_window, "SetWindow")?;
        unsafe { f(window.as_raw()) };
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let f = entry(self.table.stop, "Stop")?;
        unsafe { f() };
        Ok(())
    }

    fn subscribe(&self, streams: Subscription) -> Result<()> {
        let f = entry(self.table.subscribe_to_stream, "SubscribeToStream")?;
        for stream in streams.iter() {
            unsafe { f(stream.bits() as c_int) };
        }
        Ok(())
    }

    fn unsubscribe(&self, streams: Subscription) -> Result<()> {
        let f = entry(self.table.unsubscribe_from_stream, "UnsubscribeFromStream")?;
        for stream in streams.iter() {
            unsafe { f(stream.bits() as c_int) };
        }
        Ok(())
    }

    fn update(&self) -> Result<bool> {
        let f = entry(self.table.update, "Update")?;
        Ok(unsafe { f() })
    }

    fn new_gaze_points(&self, unit: UnitType, out: &mut Vec<GazePoint>) -> Result<usize> {
        let f = entry(self.table.get_new_gaze_points, "GetNewGazePoints")?;
        let mut points: *mut GazePoint = std::ptr::null_mut();
        let mut count: c_int = 0;
        unsafe {
            f(&mut points, &mut count, unit.as_raw());
            Ok(copy_samples(points, count, out))
        }
    }

    fn new_head_poses(&self, out: &mut Vec<HeadPose>) -> Result<usize> {
        let f = entry(self.table.get_new_head_poses, "GetNewHeadPoses")?;
        let mut poses: *mut HeadPose = std::ptr::null_mut();
        let mut count: c_int = 0;
        unsafe {
            f(&mut poses, &mut count);
            Ok(copy_samples(poses, count, out))
        }
    }

    fn is_initialised(&self) -> Result<bool> {
        let f = entry(self.table.is_initialised, "IsInitialised")?;
        Ok(unsafe { f() })
    }

    fn is_ready(&self) -> Result<bool> {
        let f = entry(self.table.is_ready, "IsReady")?;
        Ok(unsafe { f() })
    }

    fn is_connected(&self) -> Result<bool> {
        let f = entry(self.table.is_connected, "IsConnected")?;
        Ok(unsafe { f() })
    }

    fn user_presence(&self) -> Result<UserPresence> {
        let f = entry(self.table.get_user_presence, "GetUserPresence")?;
        Ok(UserPresence::from_raw(unsafe { f() }))
    }

    fn was_updated(&self) -> Result<bool> {
        let f = entry(self.table.was_updated, "WasUpdated")?;
        Ok(unsafe { f() })
    }

    fn time_since_last_gaze_packet(&self) -> Result<f32> {
        let f = entry(self.table.time_since_last_gaze_packet, "TimeSinceLastGazePacket")?;
        Ok(unsafe { f() })
    }

    fn time_since_last_head_packet(&self) -> Result<f32> {
        let f = entry(self.table.time_since_last_head_packet, "TimeSinceLastHeadPacket")?;
        Ok(unsafe { f() })
    }

    fn screen_size_mm(&self) -> Result<ScreenSize> {
        let f = entry(self.table.get_screen_size_mm, "GetScreenSizeMm")?;
        let mut width: c_int = 0;
        let mut height: c_int = 0;
        unsafe { f(&mut width, &mut height) };
        Ok(ScreenSize {
            width_mm: width,
            height_mm: height,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-process stand-in for the vendor library, backed by `extern "C"` functions.

    use super::*;
    use crate::types::{HeadPosition, HeadRotation};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::{Mutex, MutexGuard};

    /// Calls observed by the fake exports, newest last.
    static CALLS: Mutex<Vec<String>> = Mutex::new(Vec::new());

    fn record(call: String) {
        if let Ok(mut calls) = CALLS.lock() {
            calls.push(call);
        }
    }

    pub fn take_calls() -> Vec<String> {
        CALLS
            .lock()
            .map(|mut calls| std::mem::take(&mut *calls))
            .unwrap_or_default()
    }

    /// Serializes tests that inspect the shared call log and clears it.
    pub fn call_log() -> MutexGuard<'static, ()> {
        static LOCK: Mutex<()> = Mutex::new(());
        let guard = LOCK.lock().unwrap_or_else(|e| e.into_inner());
        take_calls();
        guard
    }

    static mut GAZE: [GazePoint; 2] = [
        GazePoint { timestamp_us: 100, x: 0.5, y: -0.5 },
        GazePoint { timestamp_us: 116, x: 0.25, y: 0.75 },
    ];

    static mut HEAD: [HeadPose; 1] = [HeadPose {
        timestamp_us: 200,
        rotation: HeadRotation { yaw: 1.0, pitch: 2.0, roll: 3.0 },
        position: HeadPosition { x: 4.0, y: 5.0, z: 600.0 },
    }];

    extern "C" fn fake_start(custom_thread: bool) -> bool {
        record(format!("Start({custom_thread})"));
        true
    }
    extern "C" fn fake_set_window(window: *mut c_void) {
        record(format!("SetWindow({:#x})", window as usize));
    }
    extern "C" fn fake_stop() {
        record("Stop".into());
    }
    extern "C" fn fake_subscribe(stream: c_int) {
        record(format!("Subscribe({stream})"));
    }
    extern "C" fn fake_unsubscribe(stream: c_int) {
        record(format!("Unsubscribe({stream})"));
    }
    extern "C" fn fake_update() -> bool {
        true
    }
    extern "C" fn fake_gaze(points: *mut *mut GazePoint, count: *mut c_int, unit: c_int) {
        record(format!("GetNewGazePoints({unit})"));
        unsafe {
            *points = std::ptr::addr_of_mut!(GAZE) as *mut GazePoint;
            *count = 2;
        }
    }
    extern "C" fn fake_head(poses: *mut *mut HeadPose, count: *mut c_int) {
        unsafe {
            *poses = std::ptr::addr_of_mut!(HEAD) as *mut HeadPose;
            *count = 1;
        }
    }
    extern "C" fn fake_true() -> bool {
        true
    }
    extern "C" fn fake_presence() -> c_int {
        2
    }
    extern "C" fn fake_since() -> f32 {
        0.016
    }
    extern "C" fn fake_screen(width: *mut c_int, height: *mut c_int) {
        unsafe {
            *width = 527;
            *height = 296;
        }
    }

    fn export<F: Copy>(slot: F) -> *mut c_void {
        // Safety: every `F` here is an `Option` of a function pointer, which is pointer sized.
        unsafe { std::mem::transmute_copy(&slot) }
    }

    /// Fake library exporting the full set, minus anything named in `without`.
    pub struct FakeLibrary {
        exports: HashMap<&'static CStr, *mut c_void>,
        path: PathBuf,
    }

    // Only holds addresses of `extern "C"` functions.
    unsafe impl Send for FakeLibrary {}
    unsafe impl Sync for FakeLibrary {}

    impl FakeLibrary {
        pub fn without(missing: &[&CStr]) -> FakeLibrary {
            let all: [(&'static CStr, *mut c_void); 16] = [
                (c"Start", export::<StartFn>(Some(fake_start))),
                (c"SetWindow", export::<SetWindowFn>(Some(fake_set_window))),
                (c"Stop", export::<StopFn>(Some(fake_stop))),
                (c"SubscribeToStream", export::<SubscribeToStreamFn>(Some(fake_subscribe))),
                (
                    c"UnsubscribeFromStream",
                    export::<UnsubscribeFromStreamFn>(Some(fake_unsubscribe)),
                ),
                (c"Update", export::<UpdateFn>(Some(fake_update))),
                (c"GetNewGazePoints", export::<GetNewGazePointsFn>(Some(fake_gaze))),
                (c"GetNewHeadPoses", export::<GetNewHeadPosesFn>(Some(fake_head))),
                (c"IsInitialised", export::<IsInitialisedFn>(Some(fake_true))),
                (c"IsReady", export::<IsReadyFn>(Some(fake_true))),
                (c"IsConnected", export::<IsConnectedFn>(Some(fake_true))),
                (c"GetUserPresence", export::<GetUserPresenceFn>(Some(fake_presence))),
                (c"WasUpdated", export::<WasUpdatedFn>(Some(fake_true))),
                (
                    c"TimeSinceLastGazePacket",
                    export::<TimeSinceLastGazePacketFn>(Some(fake_since)),
                ),
                (
                    c"TimeSinceLastHeadPacket",
                    export::<TimeSinceLastHeadPacketFn>(Some(fake_since)),
                ),
                (c"GetScreenSizeMm", export::<GetScreenSizeMmFn>(Some(fake_screen))),
            ];
            FakeLibrary {
                exports: all
                    .into_iter()
                    .filter(|(name, _)| !missing.contains(name))
                    .collect(),
                path: PathBuf::from("fake/Tobii.GameIntegration.dll"),
            }
        }

        pub fn complete() -> FakeLibrary {
            Self::without(&[])
        }
    }

    impl NativeLibrary for FakeLibrary {
        fn path(&self) -> &Path {
            &self.path
        }

        fn symbol_address(&self, name: &CStr) -> Option<NonNull<c_void>> {
            self.exports.get(name).copied().and_then(NonNull::new)
        }
    }
}
