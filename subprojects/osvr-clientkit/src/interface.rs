//! Interfaces and listener registration.

use core::{
    cell::{Cell, RefCell},
    ffi::c_void,
    fmt, ptr,
};
use std::rc::{Rc, Weak};

use osvr_sys::{
    AnalogReport, ButtonReport, OrientationReport, PoseReport, PositionReport, RawClientInterface,
    TimeValue,
};

use crate::{
    context::ContextInner,
    error::ErrorKind,
    registry::{CallbackRegistry, Listener, ListenerList, trampoline},
    report::{Report, ReportKind, sealed::Sealed},
};

pub(crate) struct InterfaceInner {
    path: Rc<str>,
    /// Null once freed or invalidated by the context shutdown.
    handle: Cell<RawClientInterface>,
    context: Weak<ContextInner>,
    registry: CallbackRegistry,
}

impl InterfaceInner {
    pub(crate) fn new(path: Rc<str>, handle: RawClientInterface, context: Weak<ContextInner>) -> Self {
        Self {
            path,
            handle: Cell::new(handle),
            context,
            registry: CallbackRegistry::default(),
        }
    }

    /// Forgets the handle after the runtime released it with its context.
    pub(crate) fn forget_handle(&self) {
        self.handle.set(ptr::null_mut());
    }

    pub(crate) fn clear_listeners(&self) {
        self.registry.clear();
    }

    fn live(&self) -> Option<(Rc<ContextInner>, RawClientInterface)> {
        let handle = self.handle.get();
        if handle.is_null() {
            return None;
        }
        let context = self.context.upgrade()?;
        context.is_live().then_some((context, handle))
    }

    fn release(&self) -> Result<(), FreeInterfaceError> {
        let handle = self.handle.replace(ptr::null_mut());
        if handle.is_null() {
            return Ok(());
        }

        let Some(context) = self.context.upgrade() else {
            self.registry.clear();
            return Ok(());
        };

        // Released by the runtime with the context
        if context.is_disposed() {
            self.registry.clear();
            return Ok(());
        }

        // The runtime may still deliver to these lists until update returns
        if context.is_dispatching() {
            context.defer_free(self.path.clone(), handle, self.registry.take());
            return Ok(());
        }

        // SAFETY: The handle is live: the context has not been shut down, or
        // it would have been invalidated.
        let rc = unsafe { context.api().client_free_interface(handle) };
        self.registry.clear();

        if !rc.is_success() {
            return Err(FreeInterfaceError::Failed {
                path: self.path.to_string(),
            });
        }

        log::debug!("released interface {}", self.path);
        Ok(())
    }
}

/// A device or resource in the path tree, such as `/me/head`.
///
/// Obtained from [`ClientContext::get_interface`](crate::ClientContext::get_interface).
/// Listeners registered on it are called from
/// [`ClientContext::update`](crate::ClientContext::update) for every matching
/// report, in registration order. Dropping the interface frees it.
pub struct Interface {
    inner: Rc<InterfaceInner>,
}

impl Interface {
    pub(crate) fn from_inner(inner: Rc<InterfaceInner>) -> Self {
        Self { inner }
    }

    /// The path this interface was acquired for.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Whether the interface can still register listeners.
    ///
    /// False after [`free`](Self::free) or once the owning context was
    /// disposed.
    pub fn is_valid(&self) -> bool {
        self.inner.live().is_some()
    }

    /// Number of listeners registered for report type `R`.
    pub fn listener_count<R: Report>(&self) -> usize {
        self.inner.registry.len::<R>()
    }

    /// Adds a listener for reports of type `R`.
    ///
    /// The first listener of a kind subscribes natively; later ones are
    /// appended and run after it. Listeners stay registered until the
    /// interface is freed.
    pub fn register_callback<R, F>(&self, listener: F) -> Result<(), RegisterCallbackError>
    where
        R: Report,
        F: FnMut(&TimeValue, &R) + 'static,
    {
        let inner = &*self.inner;
        let Some((context, handle)) = inner.live() else {
            return Err(RegisterCallbackError::UseAfterFree {
                path: inner.path.to_string(),
            });
        };

        let listener: Listener<R> = Rc::new(RefCell::new(listener));

        if let Some(list) = inner.registry.listeners::<R>() {
            list.push(listener);
            return Ok(());
        }

        if context.is_dispatching() {
            return Err(RegisterCallbackError::Dispatching {
                path: inner.path.to_string(),
                kind: R::KIND,
            });
        }

        let list = Rc::new(ListenerList::<R>::new(inner.path.clone(), inner.context.clone()));
        list.push(listener);

        let userdata = Rc::as_ptr(&list).cast_mut().cast::<c_void>();
        // SAFETY: The handle is live and the registry keeps the list alive
        // until the native subscription is gone.
        let rc = unsafe { <R as Sealed>::subscribe(context.api(), handle, trampoline::<R>, userdata) };
        if !rc.is_success() {
            return Err(RegisterCallbackError::Subscribe {
                path: inner.path.to_string(),
                kind: R::KIND,
            });
        }

        inner.registry.install(list);
        log::debug!("subscribed to {} reports on {}", R::KIND, inner.path);
        Ok(())
    }

    pub fn on_position(
        &self,
        listener: impl FnMut(&TimeValue, &PositionReport) + 'static,
    ) -> Result<(), RegisterCallbackError> {
        self.register_callback(listener)
    }

    pub fn on_orientation(
        &self,
        listener: impl FnMut(&TimeValue, &OrientationReport) + 'static,
    ) -> Result<(), RegisterCallbackError> {
        self.register_callback(listener)
    }

    pub fn on_pose(
        &self,
        listener: impl FnMut(&TimeValue, &PoseReport) + 'static,
    ) -> Result<(), RegisterCallbackError> {
        self.register_callback(listener)
    }

    pub fn on_button(
        &self,
        listener: impl FnMut(&TimeValue, &ButtonReport) + 'static,
    ) -> Result<(), RegisterCallbackError> {
        self.register_callback(listener)
    }

    pub fn on_analog(
        &self,
        listener: impl FnMut(&TimeValue, &AnalogReport) + 'static,
    ) -> Result<(), RegisterCallbackError> {
        self.register_callback(listener)
    }

    /// Releases the native interface and drops its listeners.
    ///
    /// Idempotent, and a no-op once the owning context was disposed. Called
    /// from a listener, the native release happens once the current update
    /// returns.
    pub fn free(&self) -> Result<(), FreeInterfaceError> {
        self.inner.release()
    }
}

impl fmt::Debug for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interface")
            .field("path", &self.inner.path)
            .field("valid", &self.is_valid())
            .finish()
    }
}

impl Drop for Interface {
    fn drop(&mut self) {
        if let Err(err) = self.inner.release() {
            log::warn!("{err}");
        }
    }
}

/// Error returned by [`Interface::register_callback`].
#[derive(Debug, thiserror::Error)]
pub enum RegisterCallbackError {
    /// The interface was freed or its context disposed.
    #[error("listener registered on freed interface {path:?}")]
    UseAfterFree { path: String },

    /// A new report kind cannot be subscribed while reports are being
    /// delivered.
    #[error("cannot subscribe to {kind} reports on {path:?} while the context is updating")]
    Dispatching { path: String, kind: ReportKind },

    /// The runtime rejected the subscription.
    #[error("the OSVR runtime rejected the {kind} subscription on {path:?}")]
    Subscribe { path: String, kind: ReportKind },
}

impl RegisterCallbackError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegisterCallbackError::UseAfterFree { .. } => ErrorKind::UseAfterFree,
            RegisterCallbackError::Dispatching { .. } => ErrorKind::Reentrant,
            RegisterCallbackError::Subscribe { .. } => ErrorKind::InvalidPath,
        }
    }
}

/// Error returned by [`Interface::free`].
#[derive(Debug, thiserror::Error)]
pub enum FreeInterfaceError {
    /// The runtime did not recognise the handle.
    #[error("the OSVR runtime failed to release interface {path:?}")]
    Failed { path: String },
}

impl FreeInterfaceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FreeInterfaceError::Failed { .. } => ErrorKind::UseAfterFree,
        }
    }
}
