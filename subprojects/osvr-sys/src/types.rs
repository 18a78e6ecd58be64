//! Value and report types shared with the native runtime.
//!
//! Instances of the report types are never parsed: the native runtime hands
//! out pointers to its own structs, so every type here must match the C layout
//! field for field, including padding.
//!
//! No unit or handedness conversion happens at this level. OSVR reports use a
//! right-handed coordinate system with X to the right, Y up and Z near.

use static_assertions::const_assert_eq;

/// Sensor index within an interface (the `int32_t sensor` field of every
/// report struct).
pub type SensorIndex = i32;

/// Button state (`OSVR_ButtonState`).
pub type ButtonState = u8;

/// Analog state (`OSVR_AnalogState`).
pub type AnalogState = f64;

/// `OSVR_BUTTON_PRESSED`
pub const BUTTON_PRESSED: ButtonState = 1;

/// `OSVR_BUTTON_NOT_PRESSED`
pub const BUTTON_NOT_PRESSED: ButtonState = 0;

/// Timestamp attached to every report (`OSVR_TimeValue`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeValue {
    pub seconds: i64,
    pub microseconds: i32,
}

impl TimeValue {
    /// Returns the timestamp as fractional seconds.
    #[inline]
    pub fn as_secs_f64(&self) -> f64 {
        self.seconds as f64 + f64::from(self.microseconds) / 1_000_000.0
    }
}

/// Three component vector (`OSVR_Vec3`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Unit quaternion (`OSVR_Quaternion`).
///
/// The native struct is `double data[4]` in `w, x, y, z` order.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    /// The identity rotation.
    pub const IDENTITY: Self = Self {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Rigid transform (`OSVR_Pose3`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pose3 {
    pub translation: Vec3,
    pub rotation: Quaternion,
}

/// `OSVR_PositionReport`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionReport {
    pub sensor: SensorIndex,
    pub xyz: Vec3,
}

/// `OSVR_OrientationReport`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrientationReport {
    pub sensor: SensorIndex,
    pub rotation: Quaternion,
}

/// `OSVR_PoseReport`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoseReport {
    pub sensor: SensorIndex,
    pub pose: Pose3,
}

/// `OSVR_ButtonReport`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonReport {
    pub sensor: SensorIndex,
    pub state: ButtonState,
}

impl ButtonReport {
    /// Returns `true` if the state is [`BUTTON_PRESSED`].
    #[inline]
    pub fn is_pressed(&self) -> bool {
        self.state == BUTTON_PRESSED
    }
}

/// `OSVR_AnalogReport`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnalogReport {
    pub sensor: SensorIndex,
    pub state: AnalogState,
}

// Layouts of the native structs on 64-bit targets
#[cfg(target_pointer_width = "64")]
mod layout {
    use super::*;

    const_assert_eq!(size_of::<SensorIndex>(), 4);
    const_assert_eq!(size_of::<TimeValue>(), 16);
    const_assert_eq!(size_of::<Vec3>(), 24);
    const_assert_eq!(size_of::<Quaternion>(), 32);
    const_assert_eq!(size_of::<Pose3>(), 56);
    const_assert_eq!(size_of::<PositionReport>(), 32);
    const_assert_eq!(size_of::<OrientationReport>(), 40);
    const_assert_eq!(size_of::<PoseReport>(), 64);
    const_assert_eq!(size_of::<ButtonReport>(), 8);
    const_assert_eq!(size_of::<AnalogReport>(), 16);

    const_assert_eq!(align_of::<PoseReport>(), 8);
    const_assert_eq!(align_of::<ButtonReport>(), 4);
}
