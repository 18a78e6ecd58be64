//! In-process stand-in for the native ClientKit runtime.
//!
//! [`FakeClientKit`] implements [`ClientKitApi`] the way the native library
//! behaves: handles are opaque pointers, callbacks are plain `extern "C"`
//! function pointers invoked with their `userdata` from within
//! `client_update`, and every call only reports success or failure. Reports
//! are queued with [`FakeClientKit::queue`] and delivered on the next update.
//!
//! Every native call is counted so tests can assert on exactly what reached
//! the runtime.

use core::{
    cell::RefCell,
    ffi::{CStr, c_char, c_void},
    ptr,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use osvr_sys::{
    AnalogCallback, AnalogReport, ButtonCallback, ButtonReport, ClientKitApi, OrientationCallback,
    OrientationReport, PoseCallback, PoseReport, PositionCallback, PositionReport,
    RawClientContext, RawClientInterface, ReturnCode, TimeValue,
};

use crate::report::ReportKind;

/// A report waiting to be delivered by the next `client_update`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueuedReport {
    Position(PositionReport),
    Orientation(OrientationReport),
    Pose(PoseReport),
    Button(ButtonReport),
    Analog(AnalogReport),
}

impl QueuedReport {
    fn kind(&self) -> ReportKind {
        match self {
            QueuedReport::Position(_) => ReportKind::Position,
            QueuedReport::Orientation(_) => ReportKind::Orientation,
            QueuedReport::Pose(_) => ReportKind::Pose,
            QueuedReport::Button(_) => ReportKind::Button,
            QueuedReport::Analog(_) => ReportKind::Analog,
        }
    }
}

macro_rules! queued_from {
    ($report:ty, $variant:ident) => {
        impl From<$report> for QueuedReport {
            fn from(report: $report) -> Self {
                QueuedReport::$variant(report)
            }
        }
    };
}

queued_from!(PositionReport, Position);
queued_from!(OrientationReport, Orientation);
queued_from!(PoseReport, Pose);
queued_from!(ButtonReport, Button);
queued_from!(AnalogReport, Analog);

#[derive(Clone, Copy)]
enum NativeCallback {
    Position(PositionCallback),
    Orientation(OrientationCallback),
    Pose(PoseCallback),
    Button(ButtonCallback),
    Analog(AnalogCallback),
}

impl NativeCallback {
    fn kind(&self) -> ReportKind {
        match self {
            NativeCallback::Position(_) => ReportKind::Position,
            NativeCallback::Orientation(_) => ReportKind::Orientation,
            NativeCallback::Pose(_) => ReportKind::Pose,
            NativeCallback::Button(_) => ReportKind::Button,
            NativeCallback::Analog(_) => ReportKind::Analog,
        }
    }

    /// # Safety
    ///
    /// `userdata` must be the pointer registered with this callback.
    unsafe fn invoke(&self, userdata: *mut c_void, timestamp: &TimeValue, report: &QueuedReport) {
        // SAFETY: Both references outlive the call; userdata is upheld by the
        // caller.
        unsafe {
            match (*self, report) {
                (NativeCallback::Position(cb), QueuedReport::Position(r)) => cb(userdata, timestamp, r),
                (NativeCallback::Orientation(cb), QueuedReport::Orientation(r)) => {
                    cb(userdata, timestamp, r)
                }
                (NativeCallback::Pose(cb), QueuedReport::Pose(r)) => cb(userdata, timestamp, r),
                (NativeCallback::Button(cb), QueuedReport::Button(r)) => cb(userdata, timestamp, r),
                (NativeCallback::Analog(cb), QueuedReport::Analog(r)) => cb(userdata, timestamp, r),
                _ => {}
            }
        }
    }
}

struct Subscription {
    iface: usize,
    callback: NativeCallback,
    userdata: *mut c_void,
}

struct FakeInterface {
    context: usize,
    path: String,
}

#[derive(Default)]
struct FakeState {
    next_id: usize,
    clock: TimeValue,
    contexts: BTreeMap<usize, String>,
    interfaces: BTreeMap<usize, FakeInterface>,
    subscriptions: Vec<Subscription>,
    queue: VecDeque<(String, QueuedReport)>,
    device_tree: Option<BTreeSet<String>>,
    string_parameters: HashMap<String, String>,

    fail_init: bool,
    fail_update: bool,
    fail_subscribe: bool,
    fail_string_fetch: bool,

    init_calls: usize,
    update_calls: usize,
    shutdown_calls: usize,
    get_interface_calls: usize,
    free_interface_calls: usize,
    subscribe_calls: HashMap<ReportKind, usize>,
    string_length_calls: usize,
    string_fetch_calls: usize,
}

impl FakeState {
    fn allocate_id(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }

    fn resolves(&self, path: &str) -> bool {
        match &self.device_tree {
            Some(tree) => tree.contains(path),
            None => path.starts_with('/') && path.len() > 1,
        }
    }

    fn tick(&mut self) -> TimeValue {
        self.clock.microseconds += 1_000;
        if self.clock.microseconds >= 1_000_000 {
            self.clock.seconds += 1;
            self.clock.microseconds -= 1_000_000;
        }
        self.clock
    }
}

/// Fake ClientKit runtime. See the [module documentation](self).
#[derive(Default)]
pub struct FakeClientKit {
    state: RefCell<FakeState>,
}

impl FakeClientKit {
    /// A runtime where every absolute path resolves.
    pub fn new() -> Self {
        Self::default()
    }

    /// A runtime whose device tree contains exactly `paths`.
    pub fn with_device_tree<'a>(paths: impl IntoIterator<Item = &'a str>) -> Self {
        let fake = Self::default();
        fake.state.borrow_mut().device_tree = Some(paths.into_iter().map(str::to_owned).collect());
        fake
    }

    /// Sets the value reported for a string parameter.
    pub fn set_string_parameter(&self, path: &str, value: &str) {
        self.state
            .borrow_mut()
            .string_parameters
            .insert(path.to_owned(), value.to_owned());
    }

    /// Queues a report for delivery on every interface bound to `path`.
    pub fn queue(&self, path: &str, report: impl Into<QueuedReport>) {
        self.state
            .borrow_mut()
            .queue
            .push_back((path.to_owned(), report.into()));
    }

    /// Makes `client_init` return null.
    pub fn fail_init(&self, fail: bool) {
        self.state.borrow_mut().fail_init = fail;
    }

    /// Makes `client_update` report failure.
    pub fn fail_update(&self, fail: bool) {
        self.state.borrow_mut().fail_update = fail;
    }

    /// Makes every `register_*_callback` report failure.
    pub fn fail_subscribe(&self, fail: bool) {
        self.state.borrow_mut().fail_subscribe = fail;
    }

    /// Makes the second step of the string parameter protocol fail.
    pub fn fail_string_fetch(&self, fail: bool) {
        self.state.borrow_mut().fail_string_fetch = fail;
    }

    pub fn init_calls(&self) -> usize {
        self.state.borrow().init_calls
    }

    pub fn update_calls(&self) -> usize {
        self.state.borrow().update_calls
    }

    pub fn shutdown_calls(&self) -> usize {
        self.state.borrow().shutdown_calls
    }

    pub fn get_interface_calls(&self) -> usize {
        self.state.borrow().get_interface_calls
    }

    pub fn free_interface_calls(&self) -> usize {
        self.state.borrow().free_interface_calls
    }

    /// Number of native subscriptions issued for `kind`.
    pub fn subscribe_calls(&self, kind: ReportKind) -> usize {
        self.state
            .borrow()
            .subscribe_calls
            .get(&kind)
            .copied()
            .unwrap_or(0)
    }

    pub fn string_length_calls(&self) -> usize {
        self.state.borrow().string_length_calls
    }

    pub fn string_fetch_calls(&self) -> usize {
        self.state.borrow().string_fetch_calls
    }

    /// Contexts initialised and not yet shut down.
    pub fn live_contexts(&self) -> usize {
        self.state.borrow().contexts.len()
    }

    /// Interfaces acquired and not yet released.
    pub fn live_interfaces(&self) -> usize {
        self.state.borrow().interfaces.len()
    }

    /// Reports still waiting for an update.
    pub fn queued_reports(&self) -> usize {
        self.state.borrow().queue.len()
    }

    fn subscribe(&self, iface: RawClientInterface, callback: NativeCallback, userdata: *mut c_void) -> ReturnCode {
        let mut state = self.state.borrow_mut();
        *state.subscribe_calls.entry(callback.kind()).or_default() += 1;

        if state.fail_subscribe || !state.interfaces.contains_key(&iface.addr()) {
            return ReturnCode::FAILURE;
        }

        state.subscriptions.push(Subscription {
            iface: iface.addr(),
            callback,
            userdata,
        });
        ReturnCode::SUCCESS
    }
}

/// Reads a NUL-terminated path argument.
///
/// # Safety
///
/// `path` must be null or point to a NUL-terminated string.
unsafe fn read_path(path: *const c_char) -> Option<String> {
    if path.is_null() {
        return None;
    }
    // SAFETY: Upheld by the caller.
    let path = unsafe { CStr::from_ptr(path) };
    path.to_str().ok().map(str::to_owned)
}

impl ClientKitApi for FakeClientKit {
    unsafe fn client_init(
        &self,
        application_identifier: *const c_char,
        _flags: u32,
    ) -> RawClientContext {
        let mut state = self.state.borrow_mut();
        state.init_calls += 1;

        // SAFETY: The caller passes a NUL-terminated identifier.
        let Some(app_id) = (unsafe { read_path(application_identifier) }) else {
            return ptr::null_mut();
        };
        if state.fail_init || app_id.is_empty() {
            return ptr::null_mut();
        }

        let id = state.allocate_id();
        state.contexts.insert(id, app_id);
        ptr::without_provenance_mut(id)
    }

    unsafe fn client_update(&self, ctx: RawClientContext) -> ReturnCode {
        let deliveries = {
            let mut state = self.state.borrow_mut();
            state.update_calls += 1;

            if state.fail_update || !state.contexts.contains_key(&ctx.addr()) {
                return ReturnCode::FAILURE;
            }

            let queue: Vec<_> = state.queue.drain(..).collect();
            let mut deliveries = Vec::new();
            for (path, report) in queue {
                let timestamp = state.tick();
                for sub in &state.subscriptions {
                    let Some(iface) = state.interfaces.get(&sub.iface) else {
                        continue;
                    };
                    if iface.context == ctx.addr()
                        && iface.path == path
                        && sub.callback.kind() == report.kind()
                    {
                        deliveries.push((sub.callback, sub.userdata, timestamp, report));
                    }
                }
            }
            deliveries
        };

        // The state is not borrowed while callbacks run: listeners may call
        // back into the runtime.
        for (callback, userdata, timestamp, report) in deliveries {
            // SAFETY: userdata was registered together with this callback.
            unsafe { callback.invoke(userdata, &timestamp, &report) };
        }

        ReturnCode::SUCCESS
    }

    unsafe fn client_shutdown(&self, ctx: RawClientContext) -> ReturnCode {
        let mut state = self.state.borrow_mut();
        state.shutdown_calls += 1;

        if state.contexts.remove(&ctx.addr()).is_none() {
            return ReturnCode::FAILURE;
        }

        // The runtime releases every interface of the context with it
        let freed: Vec<usize> = state
            .interfaces
            .iter()
            .filter(|(_, iface)| iface.context == ctx.addr())
            .map(|(id, _)| *id)
            .collect();
        for id in &freed {
            state.interfaces.remove(id);
        }
        state.subscriptions.retain(|sub| !freed.contains(&sub.iface));

        ReturnCode::SUCCESS
    }

    unsafe fn client_get_interface(
        &self,
        ctx: RawClientContext,
        path: *const c_char,
        iface: *mut RawClientInterface,
    ) -> ReturnCode {
        let mut state = self.state.borrow_mut();
        state.get_interface_calls += 1;

        // SAFETY: The caller passes a NUL-terminated path.
        let Some(path) = (unsafe { read_path(path) }) else {
            return ReturnCode::FAILURE;
        };
        if iface.is_null() || !state.contexts.contains_key(&ctx.addr()) || !state.resolves(&path) {
            return ReturnCode::FAILURE;
        }

        let id = state.allocate_id();
        state.interfaces.insert(
            id,
            FakeInterface {
                context: ctx.addr(),
                path,
            },
        );

        // SAFETY: Checked non-null above; the caller provides the out slot.
        unsafe { *iface = ptr::without_provenance_mut(id) };
        ReturnCode::SUCCESS
    }

    unsafe fn client_free_interface(&self, iface: RawClientInterface) -> ReturnCode {
        let mut state = self.state.borrow_mut();
        state.free_interface_calls += 1;

        if state.interfaces.remove(&iface.addr()).is_none() {
            return ReturnCode::FAILURE;
        }
        state.subscriptions.retain(|sub| sub.iface != iface.addr());
        ReturnCode::SUCCESS
    }

    unsafe fn register_position_callback(
        &self,
        iface: RawClientInterface,
        cb: PositionCallback,
        userdata: *mut c_void,
    ) -> ReturnCode {
        self.subscribe(iface, NativeCallback::Position(cb), userdata)
    }

    unsafe fn register_orientation_callback(
        &self,
        iface: RawClientInterface,
        cb: OrientationCallback,
        userdata: *mut c_void,
    ) -> ReturnCode {
        self.subscribe(iface, NativeCallback::Orientation(cb), userdata)
    }

    unsafe fn register_pose_callback(
        &self,
        iface: RawClientInterface,
        cb: PoseCallback,
        userdata: *mut c_void,
    ) -> ReturnCode {
        self.subscribe(iface, NativeCallback::Pose(cb), userdata)
    }

    unsafe fn register_button_callback(
        &self,
        iface: RawClientInterface,
        cb: ButtonCallback,
        userdata: *mut c_void,
    ) -> ReturnCode {
        self.subscribe(iface, NativeCallback::Button(cb), userdata)
    }

    unsafe fn register_analog_callback(
        &self,
        iface: RawClientInterface,
        cb: AnalogCallback,
        userdata: *mut c_void,
    ) -> ReturnCode {
        self.subscribe(iface, NativeCallback::Analog(cb), userdata)
    }

    unsafe fn client_get_string_parameter_length(
        &self,
        ctx: RawClientContext,
        path: *const c_char,
        len: *mut usize,
    ) -> ReturnCode {
        let mut state = self.state.borrow_mut();
        state.string_length_calls += 1;

        // SAFETY: The caller passes a NUL-terminated path.
        let Some(path) = (unsafe { read_path(path) }) else {
            return ReturnCode::FAILURE;
        };
        if len.is_null() || !state.contexts.contains_key(&ctx.addr()) {
            return ReturnCode::FAILURE;
        }

        let value_len = match state.string_parameters.get(&path) {
            Some(value) if !value.is_empty() => value.len() + 1,
            _ => 0,
        };

        // SAFETY: Checked non-null above.
        unsafe { *len = value_len };
        ReturnCode::SUCCESS
    }

    unsafe fn client_get_string_parameter(
        &self,
        ctx: RawClientContext,
        path: *const c_char,
        buf: *mut c_char,
        len: usize,
    ) -> ReturnCode {
        let mut state = self.state.borrow_mut();
        state.string_fetch_calls += 1;

        // SAFETY: The caller passes a NUL-terminated path.
        let Some(path) = (unsafe { read_path(path) }) else {
            return ReturnCode::FAILURE;
        };
        if state.fail_string_fetch || buf.is_null() || !state.contexts.contains_key(&ctx.addr()) {
            return ReturnCode::FAILURE;
        }

        let value = state.string_parameters.get(&path).cloned().unwrap_or_default();
        if len < value.len() + 1 {
            return ReturnCode::FAILURE;
        }

        // SAFETY: buf holds at least value.len() + 1 bytes, checked above.
        unsafe {
            ptr::copy_nonoverlapping(value.as_ptr(), buf.cast::<u8>(), value.len());
            *buf.add(value.len()) = 0;
        }
        ReturnCode::SUCCESS
    }
}
