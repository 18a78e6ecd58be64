//! Game engine integration for OSVR ClientKit.
//!
//! - [`ClientKitSession`]: owns the client context of a running game and maps
//!   engine lifecycle hooks onto start, update and shutdown
//! - [`convert`]: right-handed OSVR values to the engine's left-handed space
//! - [`InterfaceCallbacks`]: callbacks receiving the source path and the
//!   converted value
//! - [`TrackedValue`]: the latest converted sample, for per-frame polling
//!
//! The session is handed to consumers explicitly (usually as an
//! `Rc<ClientKitSession>`); there is no global instance.

mod callbacks;
pub mod convert;
mod session;
mod tracked;

pub use self::{
    callbacks::{CallbackError, InterfaceCallbacks},
    convert::Pose,
    session::{ClientKitSession, DUMMY_APPLICATION_ID, SessionConfig, SessionError},
    tracked::TrackedValue,
};
