/// Coarse classification of every error returned by this crate.
///
/// The native runtime only reports success or failure, so each operation has
/// its own error type; `ErrorKind` groups them by what went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The context could not be created. Usually fatal to the whole session.
    Initialization,
    /// A path did not resolve to a known interface or parameter.
    InvalidPath,
    /// The native update call failed.
    Update,
    /// The context was disposed or the interface was freed.
    UseAfterFree,
    /// A string parameter could not be copied out of the runtime.
    Buffer,
    /// The operation is not allowed while reports are being dispatched.
    Reentrant,
}
