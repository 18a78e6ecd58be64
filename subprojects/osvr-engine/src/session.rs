//! Client context ownership driven by engine lifecycle hooks.

use core::{cell::RefCell, fmt};
use std::rc::Rc;

use osvr_clientkit::{ClientContext, ClientFlags, ClientKitApi, ErrorKind, InitError, UpdateError};

/// Application identifier used when none was configured.
pub const DUMMY_APPLICATION_ID: &str = "org.opengoggles.osvr-unity.dummy";

/// How a [`ClientKitSession`] creates its context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Reverse-DNS application identifier. Empty falls back to
    /// [`DUMMY_APPLICATION_ID`].
    pub application_id: String,
    pub flags: ClientFlags,
}

impl SessionConfig {
    pub fn new(application_id: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            flags: ClientFlags::empty(),
        }
    }

    /// The identifier the context is created with.
    pub fn effective_application_id(&self) -> &str {
        if self.application_id.is_empty() {
            DUMMY_APPLICATION_ID
        } else {
            &self.application_id
        }
    }
}

enum Backend {
    #[cfg(feature = "dynamic")]
    Library(osvr_clientkit::LoaderConfig),
    Api(Rc<dyn ClientKitApi>),
}

/// The client context of a running game.
///
/// The context is created lazily by the first lifecycle hook, pumped by the
/// per-frame hooks, and shut down by [`destroy`](Self::destroy) and
/// [`application_quit`](Self::application_quit). Disabling keeps the context
/// running. A hook called after teardown starts a fresh context.
pub struct ClientKitSession {
    config: SessionConfig,
    backend: Backend,
    context: RefCell<Option<Rc<ClientContext>>>,
}

impl ClientKitSession {
    /// A session on the native ClientKit library, located through
    /// `OSVR_CLIENTKIT_LIBRARY` or the platform search path.
    #[cfg(feature = "dynamic")]
    pub fn new(config: SessionConfig) -> Self {
        Self::with_loader(config, osvr_clientkit::LoaderConfig::from_env())
    }

    /// A session on the ClientKit library described by `loader`.
    #[cfg(feature = "dynamic")]
    pub fn with_loader(config: SessionConfig, loader: osvr_clientkit::LoaderConfig) -> Self {
        Self {
            config,
            backend: Backend::Library(loader),
            context: RefCell::new(None),
        }
    }

    /// A session on an already loaded ClientKit function table.
    pub fn with_api(config: SessionConfig, api: Rc<dyn ClientKitApi>) -> Self {
        Self {
            config,
            backend: Backend::Api(api),
            context: RefCell::new(None),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether a context is currently running.
    pub fn is_started(&self) -> bool {
        self.context.borrow().is_some()
    }

    /// Returns the running context, starting it if needed.
    pub fn context(&self) -> Result<Rc<ClientContext>, SessionError> {
        if let Some(context) = self.context.borrow().as_ref() {
            return Ok(context.clone());
        }

        if self.config.application_id.is_empty() {
            log::error!(
                "no application identifier configured, it should be a reverse-order DNS name; using {DUMMY_APPLICATION_ID}"
            );
        }
        let application_id = self.config.effective_application_id();
        log::info!("starting OSVR client context {application_id}");

        let context = match &self.backend {
            #[cfg(feature = "dynamic")]
            Backend::Library(loader) => {
                ClientContext::with_loader(loader, application_id, self.config.flags)?
            }
            Backend::Api(api) => ClientContext::with_api(api.clone(), application_id, self.config.flags)?,
        };

        let context = Rc::new(context);
        *self.context.borrow_mut() = Some(context.clone());
        Ok(context)
    }

    pub fn start(&self) -> Result<(), SessionError> {
        self.context().map(drop)
    }

    pub fn enable(&self) -> Result<(), SessionError> {
        self.context().map(drop)
    }

    pub fn fixed_update(&self) -> Result<(), SessionError> {
        self.pump()
    }

    pub fn update(&self) -> Result<(), SessionError> {
        self.pump()
    }

    pub fn late_update(&self) -> Result<(), SessionError> {
        self.pump()
    }

    /// Keeps the context running so that enabling again resumes it.
    pub fn disable(&self) {
        log::debug!("client kit disabled, context kept running");
    }

    pub fn destroy(&self) {
        self.stop();
    }

    pub fn application_quit(&self) {
        self.stop();
    }

    fn pump(&self) -> Result<(), SessionError> {
        // The clone keeps the context alive if a listener stops the session
        let context = self.context()?;
        context.update()?;
        Ok(())
    }

    /// Shuts the running context down, if any.
    pub fn stop(&self) {
        let Some(context) = self.context.borrow_mut().take() else {
            return;
        };
        log::info!("shutting down OSVR client context {}", context.application_id());
        context.dispose();
    }
}

impl fmt::Debug for ClientKitSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientKitSession")
            .field("config", &self.config)
            .field("started", &self.is_started())
            .finish()
    }
}

/// Error returned by the [`ClientKitSession`] hooks.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The context could not be started.
    #[error("failed to start the OSVR client context")]
    Init(#[from] InitError),

    /// Pumping the running context failed.
    #[error("failed to update the OSVR client context")]
    Update(#[from] UpdateError),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Init(err) => err.kind(),
            SessionError::Update(err) => err.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use osvr_clientkit::testing::FakeClientKit;

    use super::*;

    fn session(fake: &Rc<FakeClientKit>, application_id: &str) -> ClientKitSession {
        ClientKitSession::with_api(SessionConfig::new(application_id), fake.clone())
    }

    #[test]
    fn first_hook_starts_the_context_once() {
        let fake = Rc::new(FakeClientKit::new());
        let session = session(&fake, "org.example.game");

        session.start().expect("start should succeed");
        session.enable().expect("enable should succeed");
        session.fixed_update().expect("fixed update should succeed");

        assert!(session.is_started());
        assert_eq!(fake.init_calls(), 1);
        assert_eq!(fake.update_calls(), 1);
    }

    #[test]
    fn per_frame_hooks_start_lazily_and_pump() {
        let fake = Rc::new(FakeClientKit::new());
        let session = session(&fake, "org.example.game");

        session.update().expect("update should succeed");
        session.late_update().expect("late update should succeed");

        assert_eq!(fake.init_calls(), 1);
        assert_eq!(fake.update_calls(), 2);
    }

    #[test]
    fn empty_application_id_falls_back_to_the_dummy() {
        let fake = Rc::new(FakeClientKit::new());
        let session = session(&fake, "");

        let context = session.context().expect("context should start");

        assert_eq!(context.application_id(), DUMMY_APPLICATION_ID);
    }

    #[test]
    fn disable_keeps_the_context_running() {
        let fake = Rc::new(FakeClientKit::new());
        let session = session(&fake, "org.example.game");
        let first = session.context().expect("context should start");

        session.disable();
        session.enable().expect("enable should succeed");

        assert!(!first.is_disposed());
        assert!(session.is_started());
        assert_eq!(fake.init_calls(), 1);
        assert_eq!(fake.shutdown_calls(), 0);
    }

    #[test]
    fn teardown_hooks_dispose_and_a_later_hook_restarts() {
        let fake = Rc::new(FakeClientKit::new());
        let session = session(&fake, "org.example.game");
        let first = session.context().expect("context should start");

        session.destroy();
        session.application_quit();

        assert!(first.is_disposed());
        assert!(!session.is_started());
        assert_eq!(fake.shutdown_calls(), 1);

        session.fixed_update().expect("restart should succeed");
        assert_eq!(fake.init_calls(), 2);
        assert_eq!(fake.live_contexts(), 1);
    }

    #[test]
    fn init_failure_is_reported_by_the_hook() {
        let fake = Rc::new(FakeClientKit::new());
        fake.fail_init(true);
        let session = session(&fake, "org.example.game");

        let err = session.start().expect_err("start should fail");

        assert!(matches!(err, SessionError::Init(_)));
        assert_eq!(err.kind(), ErrorKind::Initialization);
        assert!(!session.is_started());
    }

    #[test]
    fn update_failure_is_reported_by_the_hook() {
        let fake = Rc::new(FakeClientKit::new());
        let session = session(&fake, "org.example.game");
        fake.fail_update(true);

        let err = session.fixed_update().expect_err("update should fail");

        assert_eq!(err.kind(), ErrorKind::Update);
    }
}
