//! Client context lifecycle and the update pump.

use core::{
    any::Any,
    cell::{Cell, RefCell},
    ffi::c_char,
    fmt, ptr,
};
use std::{
    ffi::CString,
    panic,
    rc::{Rc, Weak},
    string::FromUtf8Error,
};

use osvr_sys::{ClientKitApi, RawClientContext, RawClientInterface};

use crate::{
    error::ErrorKind,
    flags::ClientFlags,
    interface::{Interface, InterfaceInner},
    registry::CallbackRegistry,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ready,
    /// Inside the native update call, delivering reports.
    Updating,
    Disposed,
}

/// A native interface release postponed until the current update returns.
///
/// The listener lists stay alive with it: the runtime may still deliver
/// reports to them until the release happens.
struct DeferredFree {
    path: Rc<str>,
    handle: RawClientInterface,
    _registry: CallbackRegistry,
}

pub(crate) struct ContextInner {
    api: Rc<dyn ClientKitApi>,
    application_id: String,
    handle: Cell<RawClientContext>,
    state: Cell<State>,
    dispose_requested: Cell<bool>,
    interfaces: RefCell<Vec<Weak<InterfaceInner>>>,
    deferred_frees: RefCell<Vec<DeferredFree>>,
    pending_panic: RefCell<Option<Box<dyn Any + Send>>>,
}

impl ContextInner {
    pub(crate) fn api(&self) -> &dyn ClientKitApi {
        &*self.api
    }

    /// Whether the native context accepts new work.
    pub(crate) fn is_live(&self) -> bool {
        self.state.get() != State::Disposed && !self.dispose_requested.get()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.state.get() == State::Disposed
    }

    /// Whether reports are being delivered right now.
    pub(crate) fn is_dispatching(&self) -> bool {
        self.state.get() == State::Updating
    }

    /// Keeps the first listener panic of the current update.
    pub(crate) fn stash_panic(&self, payload: Box<dyn Any + Send>) {
        let mut slot = self.pending_panic.borrow_mut();
        if slot.is_none() {
            *slot = Some(payload);
        }
    }

    /// Queues a native interface release for the end of the current update.
    pub(crate) fn defer_free(
        &self,
        path: Rc<str>,
        handle: RawClientInterface,
        registry: CallbackRegistry,
    ) {
        log::debug!("deferring release of interface {path} until the update returns");
        self.deferred_frees.borrow_mut().push(DeferredFree {
            path,
            handle,
            _registry: registry,
        });
    }

    fn track(&self, iface: &Rc<InterfaceInner>) {
        let mut interfaces = self.interfaces.borrow_mut();
        interfaces.retain(|weak| weak.strong_count() > 0);
        interfaces.push(Rc::downgrade(iface));
    }

    fn release_deferred(&self) {
        let deferred = self.deferred_frees.take();
        for entry in deferred {
            // SAFETY: The handle was live when deferred and the context has
            // not been shut down since.
            let rc = unsafe { self.api.client_free_interface(entry.handle) };
            if !rc.is_success() {
                log::warn!("native release of interface {} failed", entry.path);
            }
        }
    }

    /// Shuts the native context down and invalidates every interface.
    fn shutdown(&self) {
        if self.state.get() == State::Disposed {
            return;
        }

        let handle = self.handle.replace(ptr::null_mut());
        self.state.set(State::Disposed);
        self.dispose_requested.set(false);

        // SAFETY: The handle came from client_init and is shut down once.
        let rc = unsafe { self.api.client_shutdown(handle) };
        if !rc.is_success() {
            log::warn!("native shutdown of context {} failed", self.application_id);
        }

        // The runtime released the interfaces with the context. All handles
        // must be forgotten before any listener drops: a listener may own
        // another interface.
        let interfaces: Vec<_> = self
            .interfaces
            .take()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for iface in &interfaces {
            iface.forget_handle();
        }
        for iface in &interfaces {
            iface.clear_listeners();
        }
        self.deferred_frees.take();

        log::debug!("client context {} shut down", self.application_id);
    }
}

/// A connection to the OSVR runtime.
///
/// Created with [`ClientContext::new`] (or [`ClientContext::with_api`] for a
/// caller-supplied function table), pumped with [`ClientContext::update`], and
/// released with [`ClientContext::dispose`] or on drop.
pub struct ClientContext {
    inner: Rc<ContextInner>,
}

impl ClientContext {
    /// Loads the ClientKit library from its default location and initialises
    /// a context.
    ///
    /// The library location can be overridden with the
    /// `OSVR_CLIENTKIT_LIBRARY` environment variable.
    #[cfg(feature = "dynamic")]
    pub fn new(application_id: &str, flags: ClientFlags) -> Result<Self, InitError> {
        Self::with_loader(&osvr_sys::LoaderConfig::from_env(), application_id, flags)
    }

    /// Loads the ClientKit library described by `config` and initialises a
    /// context.
    #[cfg(feature = "dynamic")]
    pub fn with_loader(
        config: &osvr_sys::LoaderConfig,
        application_id: &str,
        flags: ClientFlags,
    ) -> Result<Self, InitError> {
        let api = osvr_sys::DynamicClientKit::load(config)?;
        Self::with_api(Rc::new(api), application_id, flags)
    }

    /// Initialises a context on an already loaded ClientKit function table.
    ///
    /// `application_id` should be a reverse-DNS identifier such as
    /// `com.example.viewer`.
    pub fn with_api(
        api: Rc<dyn ClientKitApi>,
        application_id: &str,
        flags: ClientFlags,
    ) -> Result<Self, InitError> {
        let c_application_id =
            CString::new(application_id).map_err(|_| InitError::InvalidApplicationId {
                application_id: application_id.to_owned(),
            })?;

        // SAFETY: The identifier is NUL-terminated and outlives the call.
        let handle = unsafe { api.client_init(c_application_id.as_ptr(), flags.bits()) };
        if handle.is_null() {
            return Err(InitError::RuntimeUnavailable {
                application_id: application_id.to_owned(),
            });
        }

        log::debug!("client context {application_id} initialised");

        Ok(Self {
            inner: Rc::new(ContextInner {
                api,
                application_id: application_id.to_owned(),
                handle: Cell::new(handle),
                state: Cell::new(State::Ready),
                dispose_requested: Cell::new(false),
                interfaces: RefCell::new(Vec::new()),
                deferred_frees: RefCell::new(Vec::new()),
                pending_panic: RefCell::new(None),
            }),
        })
    }

    /// The application identifier the context was created with.
    pub fn application_id(&self) -> &str {
        &self.inner.application_id
    }

    /// Whether the context was disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Pumps the runtime once, delivering pending reports to listeners on the
    /// calling thread before returning.
    ///
    /// Interfaces freed and a context disposed by a listener are released
    /// natively once the runtime returns. If a listener panicked, the panic is
    /// resumed here after that cleanup.
    pub fn update(&self) -> Result<(), UpdateError> {
        let inner = &*self.inner;
        match inner.state.get() {
            State::Disposed => return Err(UpdateError::UseAfterFree),
            State::Updating => return Err(UpdateError::Reentrant),
            State::Ready => {}
        }

        inner.state.set(State::Updating);
        // SAFETY: The handle is live until the context is disposed.
        let rc = unsafe { inner.api.client_update(inner.handle.get()) };
        inner.state.set(State::Ready);

        inner.release_deferred();
        if inner.dispose_requested.get() {
            inner.shutdown();
        }
        if let Some(payload) = inner.pending_panic.take() {
            panic::resume_unwind(payload);
        }

        if rc.is_success() {
            Ok(())
        } else {
            Err(UpdateError::Failed)
        }
    }

    /// Acquires the interface at `path`, e.g. `/me/head`.
    pub fn get_interface(&self, path: &str) -> Result<Interface, GetInterfaceError> {
        let inner = &self.inner;
        if !inner.is_live() {
            return Err(GetInterfaceError::UseAfterFree);
        }
        if inner.is_dispatching() {
            return Err(GetInterfaceError::Reentrant);
        }

        let invalid_path = || GetInterfaceError::InvalidPath {
            path: path.to_owned(),
        };
        let c_path = CString::new(path).map_err(|_| invalid_path())?;

        let mut handle: RawClientInterface = ptr::null_mut();
        // SAFETY: The context handle is live, the path is NUL-terminated and
        // `handle` is a valid out slot.
        let rc = unsafe {
            inner
                .api
                .client_get_interface(inner.handle.get(), c_path.as_ptr(), &mut handle)
        };
        if !rc.is_success() || handle.is_null() {
            return Err(invalid_path());
        }

        let iface = Rc::new(InterfaceInner::new(
            Rc::from(path),
            handle,
            Rc::downgrade(inner),
        ));
        inner.track(&iface);

        log::debug!("acquired interface {path}");
        Ok(Interface::from_inner(iface))
    }

    /// Reads the string parameter at `path`, e.g. `/display`.
    ///
    /// A parameter with no value yields an empty string without a second
    /// native call.
    pub fn get_string_parameter(&self, path: &str) -> Result<String, GetStringParameterError> {
        let inner = &*self.inner;
        if !inner.is_live() {
            return Err(GetStringParameterError::UseAfterFree);
        }
        if inner.is_dispatching() {
            return Err(GetStringParameterError::Reentrant);
        }

        let c_path = CString::new(path).map_err(|_| GetStringParameterError::InvalidPath {
            path: path.to_owned(),
        })?;
        let handle = inner.handle.get();

        let mut len = 0usize;
        // SAFETY: The context handle is live, the path is NUL-terminated and
        // `len` is a valid out slot.
        let rc = unsafe {
            inner
                .api
                .client_get_string_parameter_length(handle, c_path.as_ptr(), &mut len)
        };
        if !rc.is_success() {
            return Err(GetStringParameterError::InvalidPath {
                path: path.to_owned(),
            });
        }
        if len == 0 {
            return Ok(String::new());
        }

        // The reported length counts the terminating NUL
        let mut buf = vec![0u8; len];
        // SAFETY: `buf` holds exactly `len` writable bytes.
        let rc = unsafe {
            inner.api.client_get_string_parameter(
                handle,
                c_path.as_ptr(),
                buf.as_mut_ptr().cast::<c_char>(),
                len,
            )
        };
        if !rc.is_success() {
            return Err(GetStringParameterError::Buffer {
                path: path.to_owned(),
                len,
            });
        }

        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        buf.truncate(end);
        String::from_utf8(buf).map_err(|source| GetStringParameterError::InvalidUtf8 {
            path: path.to_owned(),
            source,
        })
    }

    /// Shuts the native context down.
    ///
    /// Idempotent. Called from a listener, the shutdown happens once the
    /// current update returns.
    pub fn dispose(&self) {
        let inner = &*self.inner;
        match inner.state.get() {
            State::Disposed => {}
            State::Updating => {
                log::debug!(
                    "deferring shutdown of context {} until the update returns",
                    inner.application_id
                );
                inner.dispose_requested.set(true);
            }
            State::Ready => inner.shutdown(),
        }
    }
}

impl fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientContext")
            .field("application_id", &self.inner.application_id)
            .field("state", &self.inner.state.get())
            .finish()
    }
}

impl Drop for ClientContext {
    fn drop(&mut self) {
        if self.inner.state.get() != State::Disposed {
            log::warn!(
                "client context {} dropped without dispose, shutting down",
                self.inner.application_id
            );
            self.inner.shutdown();
        }
    }
}

/// Error returned by [`ClientContext::new`] and [`ClientContext::with_api`].
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    /// The application identifier contains an interior NUL byte.
    #[error("application identifier {application_id:?} contains a NUL byte")]
    InvalidApplicationId { application_id: String },

    /// The native runtime returned no context.
    ///
    /// The identifier was rejected, or the runtime could not be reached.
    #[error("the OSVR runtime failed to create a context for {application_id}")]
    RuntimeUnavailable { application_id: String },

    /// The ClientKit library could not be loaded.
    #[cfg(feature = "dynamic")]
    #[error("failed to load the ClientKit library")]
    Load(#[from] osvr_sys::LoadError),
}

impl InitError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Initialization
    }
}

/// Error returned by [`ClientContext::update`].
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// The context was disposed.
    #[error("update called on a disposed context")]
    UseAfterFree,

    /// A listener called `update` on the context that is delivering to it.
    #[error("update called while the context is already updating")]
    Reentrant,

    /// The native update call reported failure.
    #[error("the OSVR runtime failed to update the context")]
    Failed,
}

impl UpdateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UpdateError::UseAfterFree => ErrorKind::UseAfterFree,
            UpdateError::Reentrant => ErrorKind::Reentrant,
            UpdateError::Failed => ErrorKind::Update,
        }
    }
}

/// Error returned by [`ClientContext::get_interface`].
#[derive(Debug, thiserror::Error)]
pub enum GetInterfaceError {
    /// The context was disposed.
    #[error("interface requested from a disposed context")]
    UseAfterFree,

    /// Interfaces cannot be acquired while reports are being delivered.
    #[error("interface requested while the context is updating")]
    Reentrant,

    /// The path does not resolve to an interface.
    #[error("no interface at path {path:?}")]
    InvalidPath { path: String },
}

impl GetInterfaceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GetInterfaceError::UseAfterFree => ErrorKind::UseAfterFree,
            GetInterfaceError::Reentrant => ErrorKind::Reentrant,
            GetInterfaceError::InvalidPath { .. } => ErrorKind::InvalidPath,
        }
    }
}

/// Error returned by [`ClientContext::get_string_parameter`].
#[derive(Debug, thiserror::Error)]
pub enum GetStringParameterError {
    /// The context was disposed.
    #[error("string parameter requested from a disposed context")]
    UseAfterFree,

    /// Parameters cannot be read while reports are being delivered.
    #[error("string parameter requested while the context is updating")]
    Reentrant,

    /// The runtime could not report the parameter's length.
    #[error("no string parameter at path {path:?}")]
    InvalidPath { path: String },

    /// The runtime failed to copy the value into a buffer of the length it
    /// reported.
    #[error("failed to read string parameter {path:?} into a {len} byte buffer")]
    Buffer { path: String, len: usize },

    /// The value is not valid UTF-8.
    #[error("string parameter {path:?} is not valid UTF-8")]
    InvalidUtf8 {
        path: String,
        #[source]
        source: FromUtf8Error,
    },
}

impl GetStringParameterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GetStringParameterError::UseAfterFree => ErrorKind::UseAfterFree,
            GetStringParameterError::Reentrant => ErrorKind::Reentrant,
            GetStringParameterError::InvalidPath { .. } => ErrorKind::InvalidPath,
            GetStringParameterError::Buffer { .. } | GetStringParameterError::InvalidUtf8 { .. } => {
                ErrorKind::Buffer
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use osvr_sys::{ButtonReport, PoseReport};

    use super::*;
    use crate::{report::ReportKind, testing::FakeClientKit};

    fn context(fake: &Rc<FakeClientKit>) -> ClientContext {
        ClientContext::with_api(fake.clone(), "org.example.test", ClientFlags::empty())
            .expect("context should initialise")
    }

    #[test]
    fn init_failure_is_an_initialization_error() {
        let fake = Rc::new(FakeClientKit::new());
        fake.fail_init(true);

        let result = ClientContext::with_api(fake.clone(), "org.example.test", ClientFlags::empty());

        let err = result.expect_err("init should fail");
        assert!(matches!(err, InitError::RuntimeUnavailable { .. }));
        assert_eq!(err.kind(), ErrorKind::Initialization);
        assert_eq!(fake.live_contexts(), 0);
    }

    #[test]
    fn application_id_with_nul_never_reaches_the_runtime() {
        let fake = Rc::new(FakeClientKit::new());

        let result = ClientContext::with_api(fake.clone(), "org.example\0test", ClientFlags::empty());

        assert!(matches!(result, Err(InitError::InvalidApplicationId { .. })));
        assert_eq!(fake.init_calls(), 0);
    }

    #[test]
    fn empty_application_id_is_rejected_by_the_runtime() {
        let fake = Rc::new(FakeClientKit::new());

        let result = ClientContext::with_api(fake.clone(), "", ClientFlags::empty());

        assert!(matches!(result, Err(InitError::RuntimeUnavailable { .. })));
    }

    #[test]
    fn update_without_interfaces_succeeds() {
        let fake = Rc::new(FakeClientKit::new());
        let ctx = context(&fake);

        ctx.update().expect("update should succeed");
        ctx.update().expect("update should succeed");

        assert_eq!(fake.update_calls(), 2);
    }

    #[test]
    fn native_update_failure_is_an_update_error() {
        let fake = Rc::new(FakeClientKit::new());
        let ctx = context(&fake);
        fake.fail_update(true);

        let err = ctx.update().expect_err("update should fail");

        assert!(matches!(err, UpdateError::Failed));
        assert_eq!(err.kind(), ErrorKind::Update);
    }

    #[test]
    fn dispose_is_idempotent_and_shuts_down_once() {
        let fake = Rc::new(FakeClientKit::new());
        let ctx = context(&fake);

        ctx.dispose();
        ctx.dispose();
        drop(ctx);

        assert_eq!(fake.shutdown_calls(), 1);
        assert_eq!(fake.live_contexts(), 0);
    }

    #[test]
    fn drop_without_dispose_shuts_down() {
        let fake = Rc::new(FakeClientKit::new());
        let ctx = context(&fake);

        drop(ctx);

        assert_eq!(fake.shutdown_calls(), 1);
        assert_eq!(fake.live_contexts(), 0);
    }

    #[test]
    fn operations_after_dispose_fail_without_native_calls() {
        let fake = Rc::new(FakeClientKit::new());
        let ctx = context(&fake);
        ctx.dispose();

        let update = ctx.update();
        let iface = ctx.get_interface("/me/head");
        let param = ctx.get_string_parameter("/display");

        assert!(ctx.is_disposed());
        assert_eq!(update.map_err(|e| e.kind()), Err(ErrorKind::UseAfterFree));
        assert_eq!(iface.map_err(|e| e.kind()).err(), Some(ErrorKind::UseAfterFree));
        assert_eq!(param.map_err(|e| e.kind()), Err(ErrorKind::UseAfterFree));
        assert_eq!(fake.update_calls(), 0);
        assert_eq!(fake.get_interface_calls(), 0);
        assert_eq!(fake.string_length_calls(), 0);
    }

    #[test]
    fn unknown_path_is_an_invalid_path_error() {
        let fake = Rc::new(FakeClientKit::with_device_tree(["/me/head"]));
        let ctx = context(&fake);

        let err = ctx
            .get_interface("/me/tail")
            .expect_err("lookup should fail");

        assert!(matches!(&err, GetInterfaceError::InvalidPath { path } if path == "/me/tail"));
        assert_eq!(err.kind(), ErrorKind::InvalidPath);
    }

    #[test]
    fn get_interface_returns_a_valid_interface() {
        let fake = Rc::new(FakeClientKit::with_device_tree(["/me/head"]));
        let ctx = context(&fake);

        let iface = ctx.get_interface("/me/head").expect("lookup should succeed");

        assert!(iface.is_valid());
        assert_eq!(iface.path(), "/me/head");
        assert_eq!(fake.live_interfaces(), 1);
    }

    #[test]
    fn string_parameter_is_read_in_two_steps() {
        let fake = Rc::new(FakeClientKit::new());
        fake.set_string_parameter("/display", r#"{"hmd": {}}"#);
        let ctx = context(&fake);

        let value = ctx
            .get_string_parameter("/display")
            .expect("parameter should be readable");

        assert_eq!(value, r#"{"hmd": {}}"#);
        assert_eq!(fake.string_length_calls(), 1);
        assert_eq!(fake.string_fetch_calls(), 1);
    }

    #[test]
    fn empty_string_parameter_skips_the_fetch() {
        let fake = Rc::new(FakeClientKit::new());
        let ctx = context(&fake);

        let value = ctx
            .get_string_parameter("/display")
            .expect("parameter should be readable");

        assert_eq!(value, "");
        assert_eq!(fake.string_fetch_calls(), 0);
    }

    #[test]
    fn string_fetch_failure_is_a_buffer_error() {
        let fake = Rc::new(FakeClientKit::new());
        fake.set_string_parameter("/display", "{}");
        fake.fail_string_fetch(true);
        let ctx = context(&fake);

        let err = ctx
            .get_string_parameter("/display")
            .expect_err("fetch should fail");

        assert!(matches!(err, GetStringParameterError::Buffer { len: 3, .. }));
        assert_eq!(err.kind(), ErrorKind::Buffer);
    }

    #[test]
    fn dispose_invalidates_interfaces() {
        let fake = Rc::new(FakeClientKit::new());
        let ctx = context(&fake);
        let iface = ctx.get_interface("/me/head").expect("lookup should succeed");

        ctx.dispose();

        assert!(!iface.is_valid());
        let err = iface
            .on_pose(|_, _| {})
            .expect_err("registration should fail");
        assert_eq!(err.kind(), ErrorKind::UseAfterFree);
        iface.free().expect("free after dispose is a no-op");
        assert_eq!(fake.free_interface_calls(), 0);
    }

    #[test]
    fn dispose_does_not_free_interfaces_owned_by_listeners() {
        let fake = Rc::new(FakeClientKit::new());
        let ctx = context(&fake);
        let head = ctx.get_interface("/me/head").expect("lookup should succeed");
        let hand = ctx.get_interface("/me/hands/left").expect("lookup should succeed");
        head.on_pose(move |_, _| {
            let _ = &hand;
        })
        .expect("registration should succeed");

        ctx.dispose();

        assert!(!head.is_valid());
        assert_eq!(fake.free_interface_calls(), 0);
        assert_eq!(fake.shutdown_calls(), 1);
    }

    #[test]
    fn interface_dropped_after_dispose_is_not_freed() {
        let fake = Rc::new(FakeClientKit::new());
        let ctx = context(&fake);
        let iface = ctx.get_interface("/me/head").expect("lookup should succeed");

        ctx.dispose();
        drop(iface);

        assert_eq!(fake.free_interface_calls(), 0);
    }

    #[test]
    fn update_from_a_listener_is_reentrant() {
        let fake = Rc::new(FakeClientKit::new());
        let ctx = Rc::new(context(&fake));
        let iface = ctx.get_interface("/controller/left/1").expect("lookup should succeed");
        let observed = Rc::new(RefCell::new(None));
        {
            let ctx = Rc::downgrade(&ctx);
            let observed = observed.clone();
            iface
                .on_button(move |_, _| {
                    if let Some(ctx) = ctx.upgrade() {
                        *observed.borrow_mut() = Some(ctx.update().map_err(|e| e.kind()));
                    }
                })
                .expect("registration should succeed");
        }
        fake.queue("/controller/left/1", ButtonReport::default());

        ctx.update().expect("outer update should succeed");

        assert_eq!(*observed.borrow(), Some(Err(ErrorKind::Reentrant)));
        assert_eq!(fake.update_calls(), 1);
    }

    #[test]
    fn dispose_from_a_listener_is_deferred_until_update_returns() {
        let fake = Rc::new(FakeClientKit::new());
        let ctx = Rc::new(context(&fake));
        let iface = ctx.get_interface("/me/head").expect("lookup should succeed");
        let disposed_during_dispatch = Rc::new(Cell::new(true));
        {
            let ctx = Rc::downgrade(&ctx);
            let flag = disposed_during_dispatch.clone();
            iface
                .on_pose(move |_, _| {
                    if let Some(ctx) = ctx.upgrade() {
                        ctx.dispose();
                        flag.set(ctx.is_disposed());
                    }
                })
                .expect("registration should succeed");
        }
        fake.queue("/me/head", PoseReport::default());

        ctx.update().expect("update should succeed");

        assert!(!disposed_during_dispatch.get());
        assert!(ctx.is_disposed());
        assert!(!iface.is_valid());
        assert_eq!(fake.shutdown_calls(), 1);
    }

    #[test]
    fn listener_panic_is_resumed_after_update() {
        let fake = Rc::new(FakeClientKit::new());
        let ctx = context(&fake);
        let iface = ctx.get_interface("/me/head").expect("lookup should succeed");
        iface
            .on_pose(|_, report| assert!(report.sensor < 0, "listener failure"))
            .expect("registration should succeed");
        fake.queue("/me/head", PoseReport::default());

        let result = panic::catch_unwind(panic::AssertUnwindSafe(|| ctx.update()));

        assert!(result.is_err());
        ctx.update().expect("context stays usable after the panic");
        assert_eq!(fake.subscribe_calls(ReportKind::Pose), 1);
    }
}
