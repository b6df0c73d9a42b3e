//! `AsyncOp` (spec.md §4.A): a reusable placeholder for one outstanding
//! asynchronous operation on a socket.
//!
//! The spec gives each `AsyncOp` a polymorphic `begin`/`complete` pair
//! bound at construction. This crate keeps the *state* the spec
//! describes — the pending counter and the operation-scoped scratch
//! fields — on `AsyncOp` itself, but puts the dispatch logic in
//! `Socket`, which matches on `AsyncOp::kind()` the same way the
//! teacher's `Handler` trait dispatches on event kind rather than storing
//! per-event closures (see handler.rs in the teacher tree). The
//! close-shim and shutdown-silence swaps the spec calls out as
//! legitimate in-place changes of `begin` are modeled as in-place
//! changes of `kind`, via `set_kind`.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Which concrete operation an `AsyncOp`'s `begin` currently performs
/// (spec.md §4.A, §9 "Polymorphism by operation flavor").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum BeginKind {
    /// Soliciting no further work; `begin` always returns `false`
    /// immediately. Used for the listener's send slot and for a
    /// shutdown-silenced direction.
    NoOp = 0,
    Connect = 1,
    Accept = 2,
    Send = 3,
    SendTo = 4,
    Recv = 5,
    RecvFrom = 6,
    /// Installed on every `AsyncOp` while a socket is closing (spec.md
    /// §4.A "Cancel shim"): decrements `pending`, runs `close_check`,
    /// returns `false`.
    CloseShim = 7,
}

impl BeginKind {
    fn to_u8(self) -> u8 {
        self as u8
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => BeginKind::NoOp,
            1 => BeginKind::Connect,
            2 => BeginKind::Accept,
            3 => BeginKind::Send,
            4 => BeginKind::SendTo,
            5 => BeginKind::Recv,
            6 => BeginKind::RecvFrom,
            7 => BeginKind::CloseShim,
            _ => unreachable!("invalid BeginKind discriminant"),
        }
    }
}

/// One outstanding I/O operation slot on a socket (spec.md §4.A).
///
/// `pending` is >= 1 while an OS call is outstanding *or* while the
/// begin-loop is executing (spec.md §9); it is the only synchronization
/// primitive this type needs; there is no mutex on the hot path.
pub struct AsyncOp {
    pending: AtomicUsize,
    kind: AtomicU8,
}

impl AsyncOp {
    pub fn new(kind: BeginKind) -> Self {
        AsyncOp {
            pending: AtomicUsize::new(0),
            kind: AtomicU8::new(kind.to_u8()),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn kind(&self) -> BeginKind {
        BeginKind::from_u8(self.kind.load(Ordering::Acquire))
    }

    /// In-place flavor swap (close-shim install, shutdown-silence).
    pub fn set_kind(&self, kind: BeginKind) {
        self.kind.store(kind.to_u8(), Ordering::Release);
    }

    /// Mark one unit of work as outstanding. Paired with exactly one
    /// `exit` (spec.md §7: "every begin that incremented pending is
    /// paired with exactly one complete that decrements it").
    pub fn enter(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    /// The counterpart to `enter`.
    pub fn exit(&self) {
        let prev = self.pending.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "AsyncOp::exit called without a matching enter");
    }

    /// True at a quiescent point (spec.md §8: "∀ AsyncOp op, at every
    /// quiescent point: op.pending == 0").
    pub fn is_quiescent(&self) -> bool {
        self.pending() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_op_is_quiescent() {
        let op = AsyncOp::new(BeginKind::Recv);
        assert!(op.is_quiescent());
    }

    #[test]
    fn enter_exit_pairs_return_to_quiescent() {
        let op = AsyncOp::new(BeginKind::Send);
        op.enter();
        assert_eq!(op.pending(), 1);
        op.enter();
        assert_eq!(op.pending(), 2);
        op.exit();
        assert_eq!(op.pending(), 1);
        op.exit();
        assert!(op.is_quiescent());
    }

    #[test]
    fn set_kind_swaps_in_place() {
        let op = AsyncOp::new(BeginKind::Recv);
        assert_eq!(op.kind(), BeginKind::Recv);
        op.set_kind(BeginKind::CloseShim);
        assert_eq!(op.kind(), BeginKind::CloseShim);
    }
}
