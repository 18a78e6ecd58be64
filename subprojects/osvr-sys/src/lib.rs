//! Raw bindings for the OSVR ClientKit C ABI.
//!
//! This crate mirrors the native ClientKit headers without adding any policy:
//! - [`types`]: `#[repr(C)]` value and report types, laid out exactly like the
//!   native structs
//! - [`ClientKitApi`]: the function table of the native library, as a trait so
//!   that callers can be driven by the real library or by an in-process
//!   implementation
//! - [`DynamicClientKit`]: loads the native library at runtime (feature
//!   `dynamic`)
//!
//! All functions of the ABI return an [`ReturnCode`] which carries no detail
//! beyond success or failure. Translating those into meaningful errors is the
//! job of the safe wrapper crate.
//!
//! # References
//!
//! - OSVR-Core `osvr/ClientKit/ContextC.h`, `InterfaceC.h`,
//!   `InterfaceCallbackC.h`, `ParametersC.h`
//! - OSVR-Core `osvr/Util/ClientReportTypesC.h`, `Pose3C.h`, `TimeValueC.h`

mod api;
#[cfg(feature = "dynamic")]
mod loader;
pub mod proto;
pub mod types;

#[cfg(feature = "dynamic")]
pub use self::loader::{DEFAULT_LIBRARY_NAME, DynamicClientKit, LIBRARY_ENV_VAR, LoadError, LoaderConfig};
pub use self::{
    api::{
        AnalogCallback, ButtonCallback, ClientContextObject, ClientInterfaceObject, ClientKitApi,
        OrientationCallback, PoseCallback, PositionCallback, RawClientContext, RawClientInterface,
        ReportCallback, ReturnCode,
    },
    types::{
        AnalogReport, AnalogState, BUTTON_NOT_PRESSED, BUTTON_PRESSED, ButtonReport, ButtonState,
        OrientationReport, Pose3, PoseReport, PositionReport, Quaternion, SensorIndex, TimeValue,
        Vec3,
    },
};
