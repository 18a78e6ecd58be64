//! Native handle types, return codes and the ClientKit function table.

use core::{
    ffi::{c_char, c_void},
    marker::{PhantomData, PhantomPinned},
};

use crate::types::{
    AnalogReport, ButtonReport, OrientationReport, PoseReport, PositionReport, TimeValue,
};

/// `OSVR_ReturnCode`
///
/// The native runtime signals only success or failure, without any detail.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReturnCode(pub u8);

impl ReturnCode {
    /// `OSVR_RETURN_SUCCESS`
    pub const SUCCESS: Self = Self(0);

    /// `OSVR_RETURN_FAILURE`
    pub const FAILURE: Self = Self(1);

    /// Returns `true` for [`ReturnCode::SUCCESS`].
    #[inline]
    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }
}

impl From<bool> for ReturnCode {
    #[inline]
    fn from(success: bool) -> Self {
        if success { Self::SUCCESS } else { Self::FAILURE }
    }
}

/// Opaque native client context (`struct OSVR_ClientContextObject`).
#[repr(C)]
pub struct ClientContextObject {
    _data: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}

/// Opaque native client interface (`struct OSVR_ClientInterfaceObject`).
#[repr(C)]
pub struct ClientInterfaceObject {
    _data: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}

/// `OSVR_ClientContext`
pub type RawClientContext = *mut ClientContextObject;

/// `OSVR_ClientInterface`
pub type RawClientInterface = *mut ClientInterfaceObject;

/// Report callback signature shared by every report kind.
///
/// The runtime passes back the `userdata` pointer given at registration time.
/// `timestamp` and `report` point to memory owned by the runtime and are only
/// valid for the duration of the call.
pub type ReportCallback<R> =
    unsafe extern "C" fn(userdata: *mut c_void, timestamp: *const TimeValue, report: *const R);

/// `OSVR_PositionCallback`
pub type PositionCallback = ReportCallback<PositionReport>;

/// `OSVR_OrientationCallback`
pub type OrientationCallback = ReportCallback<OrientationReport>;

/// `OSVR_PoseCallback`
pub type PoseCallback = ReportCallback<PoseReport>;

/// `OSVR_ButtonCallback`
pub type ButtonCallback = ReportCallback<ButtonReport>;

/// `OSVR_AnalogCallback`
pub type AnalogCallback = ReportCallback<AnalogReport>;

/// The ClientKit C ABI as a function table.
///
/// Each method forwards to the native function of the same name. Implementors
/// must behave like the native library: callbacks are only invoked from within
/// [`client_update`](ClientKitApi::client_update), on the calling thread.
///
/// # Safety
///
/// All methods take raw pointers straight from the C signatures; callers must
/// uphold the native contracts (NUL-terminated strings, live handles, valid
/// output pointers).
pub trait ClientKitApi {
    /// `osvrClientInit`. Returns null on failure.
    unsafe fn client_init(
        &self,
        application_identifier: *const c_char,
        flags: u32,
    ) -> RawClientContext;

    /// `osvrClientUpdate`
    unsafe fn client_update(&self, ctx: RawClientContext) -> ReturnCode;

    /// `osvrClientShutdown`
    unsafe fn client_shutdown(&self, ctx: RawClientContext) -> ReturnCode;

    /// `osvrClientGetInterface`
    unsafe fn client_get_interface(
        &self,
        ctx: RawClientContext,
        path: *const c_char,
        iface: *mut RawClientInterface,
    ) -> ReturnCode;

    /// `osvrClientFreeInterface`
    unsafe fn client_free_interface(&self, iface: RawClientInterface) -> ReturnCode;

    /// `osvrRegisterPositionCallback`
    unsafe fn register_position_callback(
        &self,
        iface: RawClientInterface,
        cb: PositionCallback,
        userdata: *mut c_void,
    ) -> ReturnCode;

    /// `osvrRegisterOrientationCallback`
    unsafe fn register_orientation_callback(
        &self,
        iface: RawClientInterface,
        cb: OrientationCallback,
        userdata: *mut c_void,
    ) -> ReturnCode;

    /// `osvrRegisterPoseCallback`
    unsafe fn register_pose_callback(
        &self,
        iface: RawClientInterface,
        cb: PoseCallback,
        userdata: *mut c_void,
    ) -> ReturnCode;

    /// `osvrRegisterButtonCallback`
    unsafe fn register_button_callback(
        &self,
        iface: RawClientInterface,
        cb: ButtonCallback,
        userdata: *mut c_void,
    ) -> ReturnCode;

    /// `osvrRegisterAnalogCallback`
    unsafe fn register_analog_callback(
        &self,
        iface: RawClientInterface,
        cb: AnalogCallback,
        userdata: *mut c_void,
    ) -> ReturnCode;

    /// `osvrClientGetStringParameterLength`
    ///
    /// The reported length includes the NUL terminator. Zero means the
    /// parameter is absent or not a string.
    unsafe fn client_get_string_parameter_length(
        &self,
        ctx: RawClientContext,
        path: *const c_char,
        len: *mut usize,
    ) -> ReturnCode;

    /// `osvrClientGetStringParameter`
    ///
    /// `buf` must hold exactly the length reported by
    /// [`client_get_string_parameter_length`](ClientKitApi::client_get_string_parameter_length).
    unsafe fn client_get_string_parameter(
        &self,
        ctx: RawClientContext,
        path: *const c_char,
        buf: *mut c_char,
        len: usize,
    ) -> ReturnCode;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_code_values_match_native_constants() {
        assert_eq!(ReturnCode::SUCCESS.0, 0);
        assert_eq!(ReturnCode::FAILURE.0, 1);
        assert!(ReturnCode::SUCCESS.is_success());
        assert!(!ReturnCode::FAILURE.is_success());
        assert!(!ReturnCode(0xFF).is_success());
    }

    #[test]
    fn return_code_from_bool() {
        assert_eq!(ReturnCode::from(true), ReturnCode::SUCCESS);
        assert_eq!(ReturnCode::from(false), ReturnCode::FAILURE);
    }
}
