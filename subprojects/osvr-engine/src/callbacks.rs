//! Path-tagged callbacks delivering engine-space values.

use core::{cell::RefCell, fmt};
use std::rc::Rc;

use glam::{Mat4, Quat, Vec3};
use osvr_clientkit::{
    AnalogReport, ButtonReport, ErrorKind, GetInterfaceError, Interface, OrientationReport,
    PoseReport, PositionReport, RegisterCallbackError, TimeValue,
};

use crate::{
    convert::{self, Pose},
    session::{ClientKitSession, SessionError},
    tracked::TrackedValue,
};

/// Callbacks on one interface path, receiving the path and the converted
/// value.
///
/// The interface is acquired from the session on the first registration, and
/// acquired again after the session restarted its context.
pub struct InterfaceCallbacks {
    path: Rc<str>,
    session: Rc<ClientKitSession>,
    iface: RefCell<Option<Interface>>,
}

impl InterfaceCallbacks {
    pub fn new(session: Rc<ClientKitSession>, path: &str) -> Self {
        Self {
            path: Rc::from(path),
            session,
            iface: RefCell::new(None),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The acquired interface, if a callback was registered.
    pub fn is_connected(&self) -> bool {
        self.iface.borrow().as_ref().is_some_and(Interface::is_valid)
    }

    fn register<R, F>(&self, listener: F) -> Result<(), CallbackError>
    where
        R: osvr_clientkit::Report,
        F: FnMut(&TimeValue, &R) + 'static,
    {
        let mut slot = self.iface.borrow_mut();
        let iface = match slot.take() {
            Some(iface) if iface.is_valid() => iface,
            stale => {
                // Dropping a stale interface frees nothing natively
                drop(stale);
                let context = self.session.context()?;
                context.get_interface(&self.path)?
            }
        };
        let iface = slot.insert(iface);
        iface.register_callback(listener)?;
        Ok(())
    }

    pub fn on_pose(
        &self,
        mut callback: impl FnMut(&str, Vec3, Quat) + 'static,
    ) -> Result<(), CallbackError> {
        let path = self.path.clone();
        self.register(move |_, report: &PoseReport| {
            let pose = convert::pose(&report.pose);
            callback(&path, pose.position, pose.rotation)
        })
    }

    pub fn on_pose_matrix(
        &self,
        mut callback: impl FnMut(&str, Mat4) + 'static,
    ) -> Result<(), CallbackError> {
        let path = self.path.clone();
        self.register(move |_, report: &PoseReport| {
            callback(&path, convert::pose_matrix(&report.pose))
        })
    }

    pub fn on_position(
        &self,
        mut callback: impl FnMut(&str, Vec3) + 'static,
    ) -> Result<(), CallbackError> {
        let path = self.path.clone();
        self.register(move |_, report: &PositionReport| {
            callback(&path, convert::position(&report.xyz))
        })
    }

    pub fn on_orientation(
        &self,
        mut callback: impl FnMut(&str, Quat) + 'static,
    ) -> Result<(), CallbackError> {
        let path = self.path.clone();
        self.register(move |_, report: &OrientationReport| {
            callback(&path, convert::orientation(&report.rotation))
        })
    }

    pub fn on_button(
        &self,
        mut callback: impl FnMut(&str, bool) + 'static,
    ) -> Result<(), CallbackError> {
        let path = self.path.clone();
        self.register(move |_, report: &ButtonReport| {
            callback(&path, convert::button_pressed(report))
        })
    }

    pub fn on_analog(
        &self,
        mut callback: impl FnMut(&str, f32) + 'static,
    ) -> Result<(), CallbackError> {
        let path = self.path.clone();
        self.register(move |_, report: &AnalogReport| {
            callback(&path, convert::analog_value(report))
        })
    }

    /// Tracks the latest converted pose.
    pub fn track_pose(&self) -> Result<TrackedValue<Pose>, CallbackError> {
        let tracked = TrackedValue::new();
        let sink = tracked.clone();
        self.on_pose(move |_, position, rotation| sink.set(Pose { position, rotation }))?;
        Ok(tracked)
    }

    /// Tracks the latest converted position.
    pub fn track_position(&self) -> Result<TrackedValue<Vec3>, CallbackError> {
        let tracked = TrackedValue::new();
        let sink = tracked.clone();
        self.on_position(move |_, position| sink.set(position))?;
        Ok(tracked)
    }

    /// Tracks the latest converted orientation.
    pub fn track_orientation(&self) -> Result<TrackedValue<Quat>, CallbackError> {
        let tracked = TrackedValue::new();
        let sink = tracked.clone();
        self.on_orientation(move |_, rotation| sink.set(rotation))?;
        Ok(tracked)
    }

    /// Tracks whether the button is held.
    pub fn track_button(&self) -> Result<TrackedValue<bool>, CallbackError> {
        let tracked = TrackedValue::new();
        let sink = tracked.clone();
        self.on_button(move |_, pressed| sink.set(pressed))?;
        Ok(tracked)
    }

    /// Tracks the latest analog value.
    pub fn track_analog(&self) -> Result<TrackedValue<f32>, CallbackError> {
        let tracked = TrackedValue::new();
        let sink = tracked.clone();
        self.on_analog(move |_, value| sink.set(value))?;
        Ok(tracked)
    }
}

impl fmt::Debug for InterfaceCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceCallbacks")
            .field("path", &self.path)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Error returned when registering an [`InterfaceCallbacks`] callback.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    /// The session could not provide a context.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The interface could not be acquired.
    #[error(transparent)]
    Interface(#[from] GetInterfaceError),

    /// The listener could not be registered.
    #[error(transparent)]
    Register(#[from] RegisterCallbackError),
}

impl CallbackError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CallbackError::Session(err) => err.kind(),
            CallbackError::Interface(err) => err.kind(),
            CallbackError::Register(err) => err.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use osvr_clientkit::{
        BUTTON_PRESSED, Pose3, Quaternion, ReportKind, testing::FakeClientKit,
    };

    use super::*;
    use crate::session::SessionConfig;

    fn setup() -> (Rc<FakeClientKit>, Rc<ClientKitSession>) {
        let fake = Rc::new(FakeClientKit::with_device_tree([
            "/me/head",
            "/me/hands/left",
            "/controller/left/1",
            "/controller/left/trigger",
        ]));
        let session = Rc::new(ClientKitSession::with_api(
            SessionConfig::new("org.example.game"),
            fake.clone(),
        ));
        (fake, session)
    }

    #[test]
    fn interface_is_acquired_on_first_registration() {
        let (fake, session) = setup();
        let head = InterfaceCallbacks::new(session.clone(), "/me/head");
        assert!(!head.is_connected());

        head.on_pose(|_, _, _| {}).expect("registration should succeed");
        head.on_pose_matrix(|_, _| {}).expect("registration should succeed");

        assert!(head.is_connected());
        assert_eq!(fake.get_interface_calls(), 1);
        assert_eq!(fake.subscribe_calls(ReportKind::Pose), 1);
    }

    #[test]
    fn pose_callbacks_receive_path_and_converted_values() {
        let (fake, session) = setup();
        let head = InterfaceCallbacks::new(session.clone(), "/me/head");
        let received = Rc::new(RefCell::new(Vec::new()));
        {
            let received = received.clone();
            head.on_pose(move |source, position, rotation| {
                received
                    .borrow_mut()
                    .push((source.to_owned(), position, rotation))
            })
            .expect("registration should succeed");
        }
        let report = PoseReport {
            sensor: 0,
            pose: Pose3 {
                translation: osvr_clientkit::Vec3 {
                    x: 1.0,
                    y: 1.5,
                    z: -0.5,
                },
                rotation: Quaternion::IDENTITY,
            },
        };
        fake.queue("/me/head", report);

        session.fixed_update().expect("update should succeed");

        assert_eq!(
            *received.borrow(),
            vec![("/me/head".to_owned(), Vec3::new(1.0, 1.5, 0.5), Quat::IDENTITY)]
        );
    }

    #[test]
    fn button_and_analog_callbacks_convert_values() {
        let (fake, session) = setup();
        let button = InterfaceCallbacks::new(session.clone(), "/controller/left/1");
        let trigger = InterfaceCallbacks::new(session.clone(), "/controller/left/trigger");
        let pressed = button.track_button().expect("registration should succeed");
        let value = trigger.track_analog().expect("registration should succeed");
        fake.queue(
            "/controller/left/1",
            ButtonReport {
                sensor: 1,
                state: BUTTON_PRESSED,
            },
        );
        fake.queue(
            "/controller/left/trigger",
            AnalogReport {
                sensor: 0,
                state: 0.5,
            },
        );

        session.update().expect("update should succeed");

        assert_eq!(pressed.get(), Some(true));
        assert_eq!(value.get(), Some(0.5));
    }

    #[test]
    fn unknown_path_is_reported_on_registration() {
        let (_fake, session) = setup();
        let missing = InterfaceCallbacks::new(session, "/me/tail");

        let err = missing
            .on_position(|_, _| {})
            .expect_err("registration should fail");

        assert!(matches!(err, CallbackError::Interface(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidPath);
        assert!(!missing.is_connected());
    }

    #[test]
    fn registration_survives_disable_and_enable() {
        let (fake, session) = setup();
        let head = InterfaceCallbacks::new(session.clone(), "/me/head");
        head.on_pose(|_, _, _| {}).expect("registration should succeed");

        session.disable();
        session.enable().expect("enable should succeed");
        head.on_pose(|_, _, _| {}).expect("registration should succeed");

        assert!(head.is_connected());
        assert_eq!(fake.get_interface_calls(), 1);
    }

    #[test]
    fn registration_after_restart_reacquires_the_interface() {
        let (fake, session) = setup();
        let hand = InterfaceCallbacks::new(session.clone(), "/me/hands/left");
        hand.on_orientation(|_, _| {}).expect("registration should succeed");

        session.stop();
        assert!(!hand.is_connected());
        session.fixed_update().expect("restart should succeed");
        let rotation = hand.track_orientation().expect("registration should succeed");
        fake.queue(
            "/me/hands/left",
            OrientationReport {
                sensor: 0,
                rotation: Quaternion::IDENTITY,
            },
        );
        session.update().expect("update should succeed");

        assert!(hand.is_connected());
        assert_eq!(rotation.get(), Some(Quat::IDENTITY));
        assert_eq!(fake.get_interface_calls(), 2);
        assert_eq!(fake.free_interface_calls(), 0);
    }
}
