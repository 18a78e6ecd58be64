//! Per-interface listener lists and the native callback trampoline.
//!
//! Each `(interface, report kind)` pair owns at most one [`ListenerList`].
//! Its address is the `userdata` pointer handed to the native runtime, so the
//! list is reference counted and must outlive the native subscription: it is
//! only dropped after the interface was released natively or the context was
//! shut down.

use core::{any::Any, cell::RefCell, ffi::c_void};
use std::{
    panic::{self, AssertUnwindSafe},
    rc::{Rc, Weak},
};

use osvr_sys::TimeValue;

use crate::{
    context::ContextInner,
    report::{Report, ReportKind},
};

/// A registered listener.
pub(crate) type Listener<R> = Rc<RefCell<dyn FnMut(&TimeValue, &R)>>;

/// Ordered listeners of one report kind on one interface.
pub(crate) struct ListenerList<R> {
    path: Rc<str>,
    context: Weak<ContextInner>,
    listeners: RefCell<Vec<Listener<R>>>,
}

impl<R: Report> ListenerList<R> {
    pub(crate) fn new(path: Rc<str>, context: Weak<ContextInner>) -> Self {
        Self {
            path,
            context,
            listeners: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn push(&self, listener: Listener<R>) {
        self.listeners.borrow_mut().push(listener);
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Invokes every listener in registration order.
    ///
    /// Listeners added while dispatching only see the next report. A panic in
    /// one listener does not prevent the others from running; it is handed to
    /// the context and resumed once the native update call has returned.
    fn dispatch(&self, timestamp: &TimeValue, report: &R) {
        let snapshot: Vec<Listener<R>> = self.listeners.borrow().clone();

        for listener in snapshot {
            let Ok(mut listener) = listener.try_borrow_mut() else {
                log::warn!(
                    "skipping {} listener on {} invoked recursively",
                    R::KIND,
                    self.path
                );
                continue;
            };

            let result =
                panic::catch_unwind(AssertUnwindSafe(|| (&mut *listener)(timestamp, report)));

            if let Err(payload) = result {
                log::error!("{} listener on {} panicked", R::KIND, self.path);
                match self.context.upgrade() {
                    Some(context) => context.stash_panic(payload),
                    None => drop(payload),
                }
            }
        }
    }
}

/// Native callback shared by every listener list of report type `R`.
///
/// # Safety
///
/// `userdata` must be the address of a live `ListenerList<R>` obtained from
/// `Rc::as_ptr`. `timestamp` and `report` must point to valid values for the
/// duration of the call.
pub(crate) unsafe extern "C" fn trampoline<R: Report>(
    userdata: *mut c_void,
    timestamp: *const TimeValue,
    report: *const R,
) {
    if userdata.is_null() || timestamp.is_null() || report.is_null() {
        return;
    }

    let list = userdata.cast_const().cast::<ListenerList<R>>();

    // SAFETY: The registry keeps one strong reference alive while the native
    // subscription exists. Taking another one keeps the list alive even if a
    // listener frees its own interface.
    let list = unsafe {
        Rc::increment_strong_count(list);
        Rc::from_raw(list)
    };

    // SAFETY: The runtime guarantees both pointers for the duration of the
    // call. The values are copied so listeners never alias runtime memory.
    let (timestamp, report) = unsafe { (*timestamp, *report) };

    list.dispatch(&timestamp, &report);
}

/// Listener lists of one interface, one slot per report kind.
#[derive(Default)]
pub(crate) struct CallbackRegistry {
    slots: [RefCell<Option<Rc<dyn Any>>>; ReportKind::COUNT],
}

impl CallbackRegistry {
    /// Returns the listener list for `R`, if the kind was subscribed.
    pub(crate) fn listeners<R: Report>(&self) -> Option<Rc<ListenerList<R>>> {
        let slot = self.slots[R::KIND.index()].borrow();
        slot.clone().and_then(|list| list.downcast::<ListenerList<R>>().ok())
    }

    /// Stores the list of a freshly subscribed kind.
    pub(crate) fn install<R: Report>(&self, list: Rc<ListenerList<R>>) {
        *self.slots[R::KIND.index()].borrow_mut() = Some(list);
    }

    /// Number of listeners registered for `R`.
    pub(crate) fn len<R: Report>(&self) -> usize {
        self.listeners::<R>().map_or(0, |list| list.len())
    }

    /// Moves every list out, leaving the registry empty.
    pub(crate) fn take(&self) -> CallbackRegistry {
        let taken = CallbackRegistry::default();
        for (from, to) in self.slots.iter().zip(taken.slots.iter()) {
            *to.borrow_mut() = from.borrow_mut().take();
        }
        taken
    }

    /// Drops every list.
    pub(crate) fn clear(&self) {
        for slot in &self.slots {
            slot.borrow_mut().take();
        }
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use osvr_sys::{AnalogReport, ButtonReport, PoseReport};

    use super::*;

    fn list<R: Report>() -> Rc<ListenerList<R>> {
        Rc::new(ListenerList::new(Rc::from("/test"), Weak::new()))
    }

    fn invoke<R: Report>(list: &Rc<ListenerList<R>>, report: R) {
        let ts = TimeValue::default();
        let userdata = Rc::as_ptr(list).cast_mut().cast::<c_void>();
        // SAFETY: userdata is a live list; pointers are to locals.
        unsafe { trampoline::<R>(userdata, &ts, &report) };
    }

    #[test]
    fn trampoline_dispatches_in_registration_order() {
        let list = list::<ButtonReport>();
        let order = Rc::new(RefCell::new(Vec::new()));
        for id in 0..3 {
            let order = order.clone();
            list.push(Rc::new(RefCell::new(move |_: &TimeValue, _: &ButtonReport| {
                order.borrow_mut().push(id)
            })));
        }

        invoke(&list, ButtonReport::default());

        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn trampoline_ignores_null_pointers() {
        let list = list::<AnalogReport>();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        list.push(Rc::new(RefCell::new(move |_: &TimeValue, _: &AnalogReport| {
            counter.set(counter.get() + 1)
        })));
        let userdata = Rc::as_ptr(&list).cast_mut().cast::<c_void>();

        // SAFETY: Null arguments are rejected before any dereference.
        let ts = TimeValue::default();
        let report = AnalogReport::default();
        unsafe {
            trampoline::<AnalogReport>(core::ptr::null_mut(), &ts, &report);
            trampoline::<AnalogReport>(userdata, core::ptr::null(), &report);
            trampoline::<AnalogReport>(userdata, &ts, core::ptr::null());
        }

        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn trampoline_leaves_reference_count_balanced() {
        let list = list::<PoseReport>();

        invoke(&list, PoseReport::default());
        invoke(&list, PoseReport::default());

        assert_eq!(Rc::strong_count(&list), 1);
    }

    #[test]
    fn panicking_listener_does_not_stop_later_listeners() {
        let list = list::<ButtonReport>();
        let reached = Rc::new(Cell::new(false));
        let flag = reached.clone();
        list.push(Rc::new(RefCell::new(|_: &TimeValue, report: &ButtonReport| {
            assert!(report.sensor < 0, "listener failure");
        })));
        list.push(Rc::new(RefCell::new(move |_: &TimeValue, _: &ButtonReport| {
            flag.set(true)
        })));

        invoke(&list, ButtonReport::default());

        assert!(reached.get());
    }

    #[test]
    fn registry_downcasts_by_kind_and_takes_lists() {
        let registry = CallbackRegistry::default();
        let pose = list::<PoseReport>();
        pose.push(Rc::new(RefCell::new(|_: &TimeValue, _: &PoseReport| {})));
        registry.install(pose);

        let taken = registry.take();

        assert_eq!(registry.len::<PoseReport>(), 0);
        assert_eq!(taken.len::<PoseReport>(), 1);
        assert_eq!(taken.len::<ButtonReport>(), 0);
        assert!(taken.listeners::<ButtonReport>().is_none());
    }
}
