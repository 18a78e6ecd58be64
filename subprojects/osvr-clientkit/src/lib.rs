//! Safe OSVR ClientKit bindings.
//!
//! A [`ClientContext`] owns the connection to the native runtime. Interfaces
//! are acquired from it by resource path, listeners are registered per report
//! kind on an [`Interface`], and [`ClientContext::update`] pumps the runtime,
//! delivering reports to the listeners synchronously.
//!
//! ```ignore
//! let context = ClientContext::new("org.example.tracker", ClientFlags::empty())?;
//! let left_hand = context.get_interface("/me/hands/left")?;
//! left_hand.on_pose(|_ts, report| println!("{:?}", report.pose))?;
//! loop {
//!     context.update()?;
//! }
//! ```
//!
//! ## Threading
//!
//! The native runtime is single-threaded: it must be pumped from one thread and
//! invokes callbacks on that thread. [`ClientContext`] and [`Interface`] are
//! neither `Send` nor `Sync`, so this holds by construction.
//!
//! ## Lifecycle
//!
//! Disposing the context (explicitly with [`ClientContext::dispose`], or by
//! dropping it) shuts the native context down and invalidates every interface
//! obtained from it. Operations on an invalidated handle fail with a
//! use-after-free error rather than reaching the native runtime.

mod context;
mod error;
mod flags;
mod interface;
mod registry;
mod report;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use osvr_sys::{
    AnalogReport, BUTTON_NOT_PRESSED, BUTTON_PRESSED, ButtonReport, ClientKitApi,
    OrientationReport, Pose3, PoseReport, PositionReport, Quaternion, TimeValue, Vec3,
};
#[cfg(feature = "dynamic")]
pub use osvr_sys::{LoadError, LoaderConfig};

pub use self::{
    context::{ClientContext, GetInterfaceError, GetStringParameterError, InitError, UpdateError},
    error::ErrorKind,
    flags::ClientFlags,
    interface::{FreeInterfaceError, Interface, RegisterCallbackError},
    report::{Report, ReportKind},
};
