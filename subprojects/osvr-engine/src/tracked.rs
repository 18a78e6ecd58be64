use core::{cell::Cell, fmt};
use std::rc::Rc;

/// The latest value delivered to a callback, for scene objects that poll
/// once per frame instead of reacting to every report.
///
/// Clones share the same slot.
pub struct TrackedValue<T> {
    latest: Rc<Cell<Option<T>>>,
    samples: Rc<Cell<u64>>,
}

impl<T> Clone for TrackedValue<T> {
    fn clone(&self) -> Self {
        Self {
            latest: self.latest.clone(),
            samples: self.samples.clone(),
        }
    }
}

impl<T: Copy + fmt::Debug> fmt::Debug for TrackedValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedValue")
            .field("latest", &self.latest.get())
            .field("samples", &self.samples.get())
            .finish()
    }
}

impl<T: Copy> Default for TrackedValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> TrackedValue<T> {
    pub fn new() -> Self {
        Self {
            latest: Rc::new(Cell::new(None)),
            samples: Rc::new(Cell::new(0)),
        }
    }

    /// The most recent sample, `None` until the first report.
    pub fn get(&self) -> Option<T> {
        self.latest.get()
    }

    /// The most recent sample or `fallback`.
    pub fn get_or(&self, fallback: T) -> T {
        self.get().unwrap_or(fallback)
    }

    /// Number of samples received so far.
    pub fn samples(&self) -> u64 {
        self.samples.get()
    }

    pub(crate) fn set(&self, value: T) {
        self.latest.set(Some(value));
        self.samples.set(self.samples.get() + 1);
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    #[test]
    fn keeps_only_the_latest_sample() {
        let tracked = TrackedValue::<Vec3>::new();
        let sink = tracked.clone();

        sink.set(Vec3::X);
        sink.set(Vec3::Y);

        assert_eq!(tracked.get(), Some(Vec3::Y));
        assert_eq!(tracked.samples(), 2);
    }

    #[test]
    fn falls_back_before_the_first_sample() {
        let tracked = TrackedValue::<f32>::new();

        assert_eq!(tracked.get(), None);
        assert_eq!(tracked.get_or(1.0), 1.0);
        assert_eq!(tracked.samples(), 0);
    }
}
