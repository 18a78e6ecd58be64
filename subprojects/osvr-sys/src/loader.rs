//! Runtime loading of the ClientKit shared library.

use core::ffi::{CStr, c_char, c_void};
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use libloading::Library;

use crate::{
    api::{
        AnalogCallback, ButtonCallback, ClientKitApi, OrientationCallback, PoseCallback,
        PositionCallback, RawClientContext, RawClientInterface, ReturnCode,
    },
    proto,
};

/// Base name of the ClientKit shared library, without platform prefix or
/// extension.
pub const DEFAULT_LIBRARY_NAME: &str = "osvrClientKit";

/// Environment variable overriding the library location.
pub const LIBRARY_ENV_VAR: &str = "OSVR_CLIENTKIT_LIBRARY";

/// Where to find the ClientKit shared library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Explicit library path. `None` resolves [`DEFAULT_LIBRARY_NAME`] through
    /// the platform's library search path.
    pub library_path: Option<PathBuf>,
}

impl LoaderConfig {
    /// Configuration taken from the [`LIBRARY_ENV_VAR`] environment variable.
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var_os(LIBRARY_ENV_VAR))
    }

    fn from_env_value(value: Option<OsString>) -> Self {
        Self {
            library_path: value.filter(|v| !v.is_empty()).map(PathBuf::from),
        }
    }

    /// Configuration loading the library from `path`.
    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    /// Returns the path or file name handed to the dynamic loader.
    pub fn resolve(&self) -> PathBuf {
        match &self.library_path {
            Some(path) => path.clone(),
            None => PathBuf::from(libloading::library_filename(DEFAULT_LIBRARY_NAME)),
        }
    }
}

/// ClientKit function table backed by the native shared library.
///
/// The library stays loaded for as long as this value lives.
pub struct DynamicClientKit {
    client_init: unsafe extern "C" fn(*const c_char, u32) -> RawClientContext,
    client_update: unsafe extern "C" fn(RawClientContext) -> ReturnCode,
    client_shutdown: unsafe extern "C" fn(RawClientContext) -> ReturnCode,
    client_get_interface: unsafe extern "C" fn(
        RawClientContext,
        *const c_char,
        *mut RawClientInterface,
    ) -> ReturnCode,
    client_free_interface: unsafe extern "C" fn(RawClientInterface) -> ReturnCode,
    register_position_callback:
        unsafe extern "C" fn(RawClientInterface, PositionCallback, *mut c_void) -> ReturnCode,
    register_orientation_callback:
        unsafe extern "C" fn(RawClientInterface, OrientationCallback, *mut c_void) -> ReturnCode,
    register_pose_callback:
        unsafe extern "C" fn(RawClientInterface, PoseCallback, *mut c_void) -> ReturnCode,
    register_button_callback:
        unsafe extern "C" fn(RawClientInterface, ButtonCallback, *mut c_void) -> ReturnCode,
    register_analog_callback:
        unsafe extern "C" fn(RawClientInterface, AnalogCallback, *mut c_void) -> ReturnCode,
    client_get_string_parameter_length:
        unsafe extern "C" fn(RawClientContext, *const c_char, *mut usize) -> ReturnCode,
    client_get_string_parameter:
        unsafe extern "C" fn(RawClientContext, *const c_char, *mut c_char, usize) -> ReturnCode,
    _library: Library,
}

impl DynamicClientKit {
    /// Loads the library described by `config` and resolves every ClientKit
    /// symbol up front.
    pub fn load(config: &LoaderConfig) -> Result<Self, LoadError> {
        let path = config.resolve();
        log::debug!("loading ClientKit from {}", path.display());

        // SAFETY: Loading runs the library's initialisers; ClientKit has no
        // initialisation side effects beyond its own static state.
        let library = unsafe { Library::new(&path) }.map_err(|source| LoadError::Open {
            path: path.clone(),
            source,
        })?;

        // SAFETY: Each symbol is resolved with the signature declared in the
        // native headers.
        unsafe {
            Ok(Self {
                client_init: symbol(&library, proto::CLIENT_INIT)?,
                client_update: symbol(&library, proto::CLIENT_UPDATE)?,
                client_shutdown: symbol(&library, proto::CLIENT_SHUTDOWN)?,
                client_get_interface: symbol(&library, proto::CLIENT_GET_INTERFACE)?,
                client_free_interface: symbol(&library, proto::CLIENT_FREE_INTERFACE)?,
                register_position_callback: symbol(&library, proto::REGISTER_POSITION_CALLBACK)?,
                register_orientation_callback: symbol(
                    &library,
                    proto::REGISTER_ORIENTATION_CALLBACK,
                )?,
                register_pose_callback: symbol(&library, proto::REGISTER_POSE_CALLBACK)?,
                register_button_callback: symbol(&library, proto::REGISTER_BUTTON_CALLBACK)?,
                register_analog_callback: symbol(&library, proto::REGISTER_ANALOG_CALLBACK)?,
                client_get_string_parameter_length: symbol(
                    &library,
                    proto::CLIENT_GET_STRING_PARAMETER_LENGTH,
                )?,
                client_get_string_parameter: symbol(
                    &library,
                    proto::CLIENT_GET_STRING_PARAMETER,
                )?,
                _library: library,
            })
        }
    }

    /// Loads the library using [`LoaderConfig::from_env`].
    pub fn load_default() -> Result<Self, LoadError> {
        Self::load(&LoaderConfig::from_env())
    }
}

/// Resolves `name` and copies out the function pointer.
///
/// # Safety
///
/// `T` must be the exact function pointer type of the exported symbol, and
/// the returned pointer must not outlive `library`.
unsafe fn symbol<T: Copy>(library: &Library, name: &'static CStr) -> Result<T, LoadError> {
    // SAFETY: Upheld by the caller.
    let sym = unsafe { library.get::<T>(name.to_bytes_with_nul()) }.map_err(|source| {
        LoadError::Symbol {
            name: name.to_str().unwrap_or("<non-utf8>"),
            source,
        }
    })?;
    Ok(*sym)
}

impl ClientKitApi for DynamicClientKit {
    unsafe fn client_init(
        &self,
        application_identifier: *const c_char,
        flags: u32,
    ) -> RawClientContext {
        unsafe { (self.client_init)(application_identifier, flags) }
    }

    unsafe fn client_update(&self, ctx: RawClientContext) -> ReturnCode {
        unsafe { (self.client_update)(ctx) }
    }

    unsafe fn client_shutdown(&self, ctx: RawClientContext) -> ReturnCode {
        unsafe { (self.client_shutdown)(ctx) }
    }

    unsafe fn client_get_interface(
        &self,
        ctx: RawClientContext,
        path: *const c_char,
        iface: *mut RawClientInterface,
    ) -> ReturnCode {
        unsafe { (self.client_get_interface)(ctx, path, iface) }
    }

    unsafe fn client_free_interface(&self, iface: RawClientInterface) -> ReturnCode {
        unsafe { (self.client_free_interface)(iface) }
    }

    unsafe fn register_position_callback(
        &self,
        iface: RawClientInterface,
        cb: PositionCallback,
        userdata: *mut c_void,
    ) -> ReturnCode {
        unsafe { (self.register_position_callback)(iface, cb, userdata) }
    }

    unsafe fn register_orientation_callback(
        &self,
        iface: RawClientInterface,
        cb: OrientationCallback,
        userdata: *mut c_void,
    ) -> ReturnCode {
        unsafe { (self.register_orientation_callback)(iface, cb, userdata) }
    }

    unsafe fn register_pose_callback(
        &self,
        iface: RawClientInterface,
        cb: PoseCallback,
        userdata: *mut c_void,
    ) -> ReturnCode {
        unsafe { (self.register_pose_callback)(iface, cb, userdata) }
    }

    unsafe fn register_button_callback(
        &self,
        iface: RawClientInterface,
        cb: ButtonCallback,
        userdata: *mut c_void,
    ) -> ReturnCode {
        unsafe { (self.register_button_callback)(iface, cb, userdata) }
    }

    unsafe fn register_analog_callback(
        &self,
        iface: RawClientInterface,
        cb: AnalogCallback,
        userdata: *mut c_void,
    ) -> ReturnCode {
        unsafe { (self.register_analog_callback)(iface, cb, userdata) }
    }

    unsafe fn client_get_string_parameter_length(
        &self,
        ctx: RawClientContext,
        path: *const c_char,
        len: *mut usize,
    ) -> ReturnCode {
        unsafe { (self.client_get_string_parameter_length)(ctx, path, len) }
    }

    unsafe fn client_get_string_parameter(
        &self,
        ctx: RawClientContext,
        path: *const c_char,
        buf: *mut c_char,
        len: usize,
    ) -> ReturnCode {
        unsafe { (self.client_get_string_parameter)(ctx, path, buf, len) }
    }
}

/// Error returned by [`DynamicClientKit::load`].
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The shared library could not be opened.
    #[error("failed to open ClientKit library {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    /// The library does not export a required symbol.
    #[error("missing ClientKit symbol {name}")]
    Symbol {
        name: &'static str,
        #[source]
        source: libloading::Error,
    },
}

impl LoadError {
    /// Path of the library that failed to open, if that was the failure.
    pub fn library_path(&self) -> Option<&Path> {
        match self {
            LoadError::Open { path, .. } => Some(path),
            LoadError::Symbol { .. } => None,
        }
    }
}
