//! Exported symbol names of the ClientKit shared library.

use core::ffi::CStr;

/// Context creation.
pub const CLIENT_INIT: &CStr = c"osvrClientInit";

/// Per-frame update pump.
pub const CLIENT_UPDATE: &CStr = c"osvrClientUpdate";

/// Context destruction.
pub const CLIENT_SHUTDOWN: &CStr = c"osvrClientShutdown";

/// Interface lookup by path.
pub const CLIENT_GET_INTERFACE: &CStr = c"osvrClientGetInterface";

/// Interface release.
pub const CLIENT_FREE_INTERFACE: &CStr = c"osvrClientFreeInterface";

pub const REGISTER_POSITION_CALLBACK: &CStr = c"osvrRegisterPositionCallback";
pub const REGISTER_ORIENTATION_CALLBACK: &CStr = c"osvrRegisterOrientationCallback";
pub const REGISTER_POSE_CALLBACK: &CStr = c"osvrRegisterPoseCallback";
pub const REGISTER_BUTTON_CALLBACK: &CStr = c"osvrRegisterButtonCallback";
pub const REGISTER_ANALOG_CALLBACK: &CStr = c"osvrRegisterAnalogCallback";

/// String parameter length query (first step).
pub const CLIENT_GET_STRING_PARAMETER_LENGTH: &CStr = c"osvrClientGetStringParameterLength";

/// String parameter copy (second step).
pub const CLIENT_GET_STRING_PARAMETER: &CStr = c"osvrClientGetStringParameter";
