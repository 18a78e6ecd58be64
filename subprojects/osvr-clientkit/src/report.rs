//! Report kinds and their native subscription functions.

use core::{ffi::c_void, fmt};

use osvr_sys::{
    AnalogReport, ButtonReport, ClientKitApi, OrientationReport, PoseReport, PositionReport,
    RawClientInterface, ReportCallback, ReturnCode,
};

/// The report kinds a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Position,
    Orientation,
    Pose,
    Button,
    Analog,
}

impl ReportKind {
    /// Number of report kinds.
    pub(crate) const COUNT: usize = 5;

    #[inline]
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportKind::Position => "position",
            ReportKind::Orientation => "orientation",
            ReportKind::Pose => "pose",
            ReportKind::Button => "button",
            ReportKind::Analog => "analog",
        };
        f.write_str(name)
    }
}

/// A native report type that listeners can receive.
///
/// Implemented for the five ClientKit report structs only.
pub trait Report: sealed::Sealed + Copy + fmt::Debug + 'static {
    /// Kind tag of this report type.
    const KIND: ReportKind;
}

pub(crate) mod sealed {
    use super::*;

    pub trait Sealed: Sized {
        /// Issues the native `osvrRegister*Callback` call for this report type.
        ///
        /// # Safety
        ///
        /// `iface` must be a live interface handle of `api`, and `userdata`
        /// must stay valid for as long as the runtime may invoke `cb`.
        unsafe fn subscribe(
            api: &dyn ClientKitApi,
            iface: RawClientInterface,
            cb: ReportCallback<Self>,
            userdata: *mut c_void,
        ) -> ReturnCode;
    }
}

macro_rules! impl_report {
    ($report:ty, $kind:ident, $register:ident) => {
        impl Report for $report {
            const KIND: ReportKind = ReportKind::$kind;
        }

        impl sealed::Sealed for $report {
            #[inline]
            unsafe fn subscribe(
                api: &dyn ClientKitApi,
                iface: RawClientInterface,
                cb: ReportCallback<Self>,
                userdata: *mut c_void,
            ) -> ReturnCode {
                // SAFETY: Upheld by the caller.
                unsafe { api.$register(iface, cb, userdata) }
            }
        }
    };
}

impl_report!(PositionReport, Position, register_position_callback);
impl_report!(OrientationReport, Orientation, register_orientation_callback);
impl_report!(PoseReport, Pose, register_pose_callback);
impl_report!(ButtonReport, Button, register_button_callback);
impl_report!(AnalogReport, Analog, register_analog_callback);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_kinds_have_distinct_slot_indices() {
        let kinds = [
            PositionReport::KIND,
            OrientationReport::KIND,
            PoseReport::KIND,
            ButtonReport::KIND,
            AnalogReport::KIND,
        ];

        let mut indices: Vec<usize> = kinds.iter().map(|k| k.index()).collect();
        indices.sort_unstable();
        indices.dedup();

        assert_eq!(indices, (0..ReportKind::COUNT).collect::<Vec<_>>());
    }

    #[test]
    fn report_kind_display_names() {
        assert_eq!(ReportKind::Pose.to_string(), "pose");
        assert_eq!(ReportKind::Button.to_string(), "button");
    }
}
