use bitflags::bitflags;

bitflags! {
    /// Context initialization options.
    ///
    /// Reserved by the native runtime: no flag is defined yet and callers
    /// should pass [`ClientFlags::empty`]. Unknown bits are forwarded as-is.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[repr(transparent)]
    pub struct ClientFlags: u32 {
        const _ = !0;
    }
}
