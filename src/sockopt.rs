//! Portable socket-option vocabulary (spec.md §4.B "Option
//! special-cases"). Translating these to/from OS-level option pairs is
//! the out-of-scope boundary layer (spec.md §1); this module only
//! carries the portable identifiers and the handful of options whose
//! *engine* behavior — not just their OS representation — changes.

/// Portable option identifiers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SockOpt {
    /// Byte-count query (how many bytes are available to read without
    /// blocking).
    Available,
    /// Composite linger struct.
    Linger,
    /// Shuts down one or both directions and silences the matching
    /// `AsyncOp`.
    Shutdown(ShutdownDirection),
    /// Accepted and ignored: every transport here is already
    /// non-blocking end to end.
    NonBlocking,
    /// `SO_ACCEPTCONN`-equivalent query; not supported.
    AcceptConn,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShutdownDirection {
    Read,
    Write,
    Both,
}

/// `l_onoff = (value != 0)`, `l_linger = value` (spec.md §4.B).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LingerOption {
    pub on: bool,
    pub seconds: u16,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SockOptValue {
    Available(usize),
    Linger(LingerOption),
    Unit,
}
