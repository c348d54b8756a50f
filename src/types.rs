use std::ffi::{c_int, c_void};

/// Timestamped gaze estimate. Layout matches the library's `#pragma pack(1)` struct.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GazePoint {
    /// Library clock timestamp in microseconds.
    pub timestamp_us: i64,
    pub x: f32,
    pub y: f32,
}

/// Head orientation in degrees as reported by the tracker.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeadRotation {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

/// Head position relative to the tracker, in millimeters.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeadPosition {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Timestamped head rotation and position.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeadPose {
    /// Library clock timestamp in microseconds.
    pub timestamp_us: i64,
    pub rotation: HeadRotation,
    pub position: HeadPosition,
}

const _: () = {
    use std::mem::{offset_of, size_of};
    assert!(size_of::<GazePoint>() == 16);
    assert!(offset_of!(GazePoint, x) == 8);
    assert!(offset_of!(GazePoint, y) == 12);
    assert!(size_of::<HeadRotation>() == 12);
    assert!(size_of::<HeadPosition>() == 12);
    assert!(size_of::<HeadPose>() == 32);
    assert!(offset_of!(HeadPose, rotation) == 8);
    assert!(offset_of!(HeadPose, position) == 20);
};

fn read_f32(buf: &[u8], at: usize) -> f32 {
    f32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn read_i64(buf: &[u8], at: usize) -> i64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[at..at + 8]);
    i64::from_le_bytes(raw)
}

impl GazePoint {
    pub const SIZE: usize = 16;

    pub fn new(timestamp_us: i64, x: f32, y: f32) -> Self {
        Self { timestamp_us, x, y }
    }

    /// Encode using the library's wire layout (little-endian, packed).
    pub fn to_le_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..8].copy_from_slice(&{ self.timestamp_us }.to_le_bytes());
        buf[8..12].copy_from_slice(&{ self.x }.to_le_bytes());
        buf[12..16].copy_from_slice(&{ self.y }.to_le_bytes());
        buf
    }

    pub fn from_le_bytes(buf: &[u8; Self::SIZE]) -> Self {
        Self {
            timestamp_us: read_i64(buf, 0),
            x: read_f32(buf, 8),
            y: read_f32(buf, 12),
        }
    }

    /// Re-express this point, given in `from` units, in `to` units.
    ///
    /// All four unit systems share a bottom-left origin on the client window.
    /// Signed-normalized spans [-1, 1], normalized spans [0, 1], millimeters
    /// and pixels span the window's physical and pixel extents.
    ///
    /// Returns `None` when the conversion needs a viewport dimension that is
    /// not strictly positive.
    pub fn convert(&self, from: UnitType, to: UnitType, viewport: &Viewport) -> Option<GazePoint> {
        let (nx, ny) = viewport.normalize(from, self.x, self.y)?;
        let (x, y) = viewport.denormalize(to, nx, ny)?;
        Some(GazePoint {
            timestamp_us: self.timestamp_us,
            x,
            y,
        })
    }
}

impl HeadPose {
    pub const SIZE: usize = 32;

    /// Encode using the library's wire layout (little-endian, packed).
    pub fn to_le_bytes(&self) -> [u8; Self::SIZE] {
        let rotation = self.rotation;
        let position = self.position;
        let fields = [
            { rotation.yaw },
            { rotation.pitch },
            { rotation.roll },
            { position.x },
            { position.y },
            { position.z },
        ];

        let mut buf = [0u8; Self::SIZE];
        buf[0..8].copy_from_slice(&{ self.timestamp_us }.to_le_bytes());
        for (i, value) in fields.iter().enumerate() {
            let at = 8 + i * 4;
            buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
        }
        buf
    }

    pub fn from_le_bytes(buf: &[u8; Self::SIZE]) -> Self {
        Self {
            timestamp_us: read_i64(buf, 0),
            rotation: HeadRotation {
                yaw: read_f32(buf, 8),
                pitch: read_f32(buf, 12),
                roll: read_f32(buf, 16),
            },
            position: HeadPosition {
                x: read_f32(buf, 20),
                y: read_f32(buf, 24),
                z: read_f32(buf, 28),
            },
        }
    }
}

bitflags::bitflags! {
    /// Data streams that can be subscribed to. Flags combine freely.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[repr(C)]
    pub struct Subscription: u32 {
        const USER_PRESENCE = 1 << 1;
        const STANDARD_GAZE = 1 << 2;
        const FOVEATED_GAZE = 1 << 3;
        const HEAD_TRACKING = 1 << 4;
        const WEARABLE_DATA = 1 << 5;
    }
}

impl Subscription {
    /// Streams that produce gaze points.
    pub const GAZE: Subscription = Subscription::STANDARD_GAZE.union(Subscription::FOVEATED_GAZE);
}

/// Coordinate system requested when draining gaze points.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitType {
    /// Client window bottom-left = (-1, -1), top-right = (1, 1).
    SignedNormalized = 0,
    /// Client window bottom-left = (0, 0), top-right = (1, 1).
    Normalized = 1,
    /// Client window bottom-left = (0, 0), top-right = window size in mm.
    Mm = 2,
    /// Client window bottom-left = (0, 0), top-right = window size in pixels.
    Pixels = 3,
}

impl UnitType {
    pub const ALL: [UnitType; 4] = [
        UnitType::SignedNormalized,
        UnitType::Normalized,
        UnitType::Mm,
        UnitType::Pixels,
    ];

    pub fn as_raw(self) -> c_int {
        self as c_int
    }
}

/// Whether a user is currently detected in front of the tracker.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UserPresence {
    #[default]
    Unknown = 0,
    Away = 1,
    Present = 2,
}

impl UserPresence {
    /// Map the library's raw enum value. Anything unexpected reads as `Unknown`.
    pub fn from_raw(raw: c_int) -> Self {
        match raw {
            1 => UserPresence::Away,
            2 => UserPresence::Present,
            _ => UserPresence::Unknown,
        }
    }
}

/// Physical screen size reported by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenSize {
    pub width_mm: i32,
    pub height_mm: i32,
}

/// Client window extents used to convert between gaze unit systems.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub width_px: f32,
    pub height_px: f32,
    pub width_mm: f32,
    pub height_mm: f32,
}

impl Viewport {
    fn extent(&self, unit: UnitType) -> Option<(f32, f32)> {
        let (w, h) = match unit {
            UnitType::SignedNormalized | UnitType::Normalized => return Some((1.0, 1.0)),
            UnitType::Mm => (self.width_mm, self.height_mm),
            UnitType::Pixels => (self.width_px, self.height_px),
        };
        (w > 0.0 && h > 0.0).then_some((w, h))
    }

    fn normalize(&self, unit: UnitType, x: f32, y: f32) -> Option<(f32, f32)> {
        if unit == UnitType::SignedNormalized {
            return Some(((x + 1.0) * 0.5, (y + 1.0) * 0.5));
        }
        let (w, h) = self.extent(unit)?;
        Some((x / w, y / h))
    }

    fn denormalize(&self, unit: UnitType, x: f32, y: f32) -> Option<(f32, f32)> {
        if unit == UnitType::SignedNormalized {
            return Some((x * 2.0 - 1.0, y * 2.0 - 1.0));
        }
        let (w, h) = self.extent(unit)?;
        Some((x * w, y * h))
    }
}

/// Native window handle passed to `SetWindow` (an `HWND` on Windows).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHandle(*mut c_void);

impl WindowHandle {
    pub fn from_raw(raw: *mut c_void) -> Self {
        Self(raw)
    }

    pub fn null() -> Self {
        Self(std::ptr::null_mut())
    }

    pub fn as_raw(self) -> *mut c_void {
        self.0
    }
}

/// A single sample drained from the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Gaze(GazePoint),
    Head(HeadPose),
}

impl Sample {
    pub fn timestamp_us(&self) -> i64 {
        match self {
            Sample::Gaze(p) => p.timestamp_us,
            Sample::Head(p) => p.timestamp_us,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        Viewport {
            width_px: 1920.0,
            height_px: 1080.0,
            width_mm: 520.0,
            height_mm: 290.0,
        }
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_gaze_point_layout_matches_memory() {
        let point = GazePoint::new(1_596_313_963, 0.25, -0.75);
        let bytes = point.to_le_bytes();
        assert_eq!(bytes.len(), std::mem::size_of::<GazePoint>());

        let read = unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const GazePoint) };
        if cfg!(target_endian = "little") {
            assert_eq!(read, point);
        }
        let decoded = GazePoint::from_le_bytes(&bytes);
        assert_eq!({ decoded.timestamp_us }, 1_596_313_963);
        assert_eq!({ decoded.x }, 0.25);
        assert_eq!({ decoded.y }, -0.75);
    }

    #[test]
    fn test_head_pose_layout_matches_memory() {
        let pose = HeadPose {
            timestamp_us: 42,
            rotation: HeadRotation {
                yaw: 10.0,
                pitch: -5.5,
                roll: 1.25,
            },
            position: HeadPosition {
                x: 12.0,
                y: -30.0,
                z: 600.0,
            },
        };
        let bytes = pose.to_le_bytes();
        assert_eq!(bytes.len(), std::mem::size_of::<HeadPose>());
        // Position starts right after the three rotation floats.
        assert_eq!(&bytes[20..24], &12.0f32.to_le_bytes());

        let read = unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const HeadPose) };
        if cfg!(target_endian = "little") {
            assert_eq!(read, pose);
        }
        assert_eq!(HeadPose::from_le_bytes(&bytes), pose);
    }

    #[test]
    fn test_subscription_values() {
        assert_eq!(Subscription::USER_PRESENCE.bits(), 2);
        assert_eq!(Subscription::STANDARD_GAZE.bits(), 4);
        assert_eq!(Subscription::FOVEATED_GAZE.bits(), 8);
        assert_eq!(Subscription::HEAD_TRACKING.bits(), 16);
        assert_eq!(Subscription::WEARABLE_DATA.bits(), 32);
        assert_eq!(Subscription::GAZE.iter().count(), 2);
    }

    #[test]
    fn test_user_presence_from_raw() {
        assert_eq!(UserPresence::from_raw(0), UserPresence::Unknown);
        assert_eq!(UserPresence::from_raw(1), UserPresence::Away);
        assert_eq!(UserPresence::from_raw(2), UserPresence::Present);
        assert_eq!(UserPresence::from_raw(77), UserPresence::Unknown);
    }

    #[test]
    fn test_convert_center_in_every_unit() {
        let vp = viewport();
        let center = GazePoint::new(7, 0.0, 0.0);
        let expected = [(0.0, 0.0), (0.5, 0.5), (260.0, 145.0), (960.0, 540.0)];

        for (unit, (x, y)) in UnitType::ALL.iter().zip(expected) {
            let out = center
                .convert(UnitType::SignedNormalized, *unit, &vp)
                .unwrap();
            assert!(close(out.x, x), "{unit:?} x={}", { out.x });
            assert!(close(out.y, y), "{unit:?} y={}", { out.y });
            assert_eq!({ out.timestamp_us }, 7);
        }
    }

    #[test]
    fn test_convert_is_pure() {
        let vp = viewport();
        let raw = GazePoint::new(1, 480.0, 270.0);

        for unit in UnitType::ALL {
            let first = raw.convert(UnitType::Pixels, unit, &vp);
            // Interleave an unrelated conversion; results must not drift.
            let _ = raw.convert(UnitType::Pixels, UnitType::Mm, &vp);
            let second = raw.convert(UnitType::Pixels, unit, &vp);
            assert_eq!(first, second);
        }

        let back = raw
            .convert(UnitType::Pixels, UnitType::Mm, &vp)
            .and_then(|mm| mm.convert(UnitType::Mm, UnitType::Pixels, &vp))
            .unwrap();
        assert!(close(back.x, 480.0));
        assert!(close(back.y, 270.0));
    }

    #[test]
    fn test_convert_requires_dimensions() {
        let empty = Viewport::default();
        let p = GazePoint::new(0, 0.5, 0.5);
        assert!(p.convert(UnitType::Normalized, UnitType::Pixels, &empty).is_none());
        assert!(p.convert(UnitType::Mm, UnitType::Normalized, &empty).is_none());
        assert!(p
            .convert(UnitType::Normalized, UnitType::SignedNormalized, &empty)
            .is_some());
    }
}
