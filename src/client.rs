//! The upward `ClientInterface` callback surface (spec.md §3, §6).
//!
//! The spec describes this as a single `cb(ctx, event, ...)` dispatch
//! function multiplexed over eight event kinds. Mirroring a single giant
//! multiplexed callback is not how this teacher crate expresses a
//! callback surface (see `handler.rs`'s `Handler` trait: one method per
//! event, default no-ops) — so `ClientInterface` here is a trait with one
//! method per event, each carrying only the fields that event actually
//! uses. The multiplexing the spec describes is exactly what a trait's
//! vtable already gives us.

use bytes::{Bytes, BytesMut};
use std::net::SocketAddr;

use crate::error::EngineResult;
use crate::properties::SocketProperties;

/// Opaque handle to a socket inside the owning [`crate::engine::Engine`].
///
/// Stands in for the spec's "single-pointer payload" handed from
/// `end_accept` to the caller (spec.md §4.A "accept" complete semantics).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SocketHandle(pub(crate) usize);

bitflags::bitflags! {
    /// Portable receive flags, translated from OS receive flags by the
    /// `recv`/`recvfrom` flavor's `complete` (spec.md §4.A).
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct RecvFlags: u32 {
        /// The datagram was larger than the supplied buffer and was
        /// truncated. Detected on UDP sockets by comparing a pre-read
        /// `FIONREAD` byte count against the buffer's capacity.
        const TRUNCATED = 0b0000_0001;
        /// Out-of-band data was received. Detected on TCP streams via
        /// `SIOCATMARK`; never set on Windows builds, which don't expose
        /// that ioctl through `windows-sys`.
        const OUT_OF_BAND = 0b0000_0010;
    }
}

/// Caller-supplied correlation token, round-tripped from `begin_*` to the
/// matching `end_*` unchanged (spec.md §6: "hand back the op-context
/// originally supplied at `begin_*`").
pub type OpCtx = Option<u64>;

/// What a `begin_send`/`begin_sendto` call hands back to the engine.
pub struct SendRequest {
    pub buffer: Bytes,
    pub addr: Option<SocketAddr>,
    pub op_ctx: OpCtx,
}

/// What a `begin_recv`/`begin_recvfrom` call hands back to the engine: an
/// empty, writable buffer for the engine to fill.
pub struct RecvRequest {
    pub buffer: BytesMut,
    pub op_ctx: OpCtx,
}

/// What a `begin_accept` call hands back to the engine: a freshly minted
/// `ClientInterface` for the socket that will exist once `accept`
/// succeeds (the OS-level analogue of the AcceptEx pre-allocated-socket
/// requirement — here the allocation is just "construct a callback
/// object", not a real descriptor, spec.md §4.A "accept" complete
/// semantics).
pub struct AcceptRequest {
    pub client: Box<dyn ClientInterface>,
    pub op_ctx: OpCtx,
}

/// The result of a completed receive, consumed by `end_recv`.
pub struct RecvOutcome {
    pub buffer: Bytes,
    pub addr: Option<SocketAddr>,
    pub flags: RecvFlags,
}

/// The upward callback surface the core calls to solicit buffers and
/// deliver results (spec.md §3, §6). All methods default to the
/// "no more work"/no-op behavior so an implementer only overrides the
/// events it cares about, the same shape as the teacher's `Handler`
/// trait.
pub trait ClientInterface: Send {
    /// Exactly one `opened` event fires per `open` call (spec.md §4.C).
    fn opened(&mut self, _status: EngineResult<()>) {}

    /// Exactly one `closed` event fires per `close` call (spec.md §4.B
    /// `close_check`).
    fn closed(&mut self) {}

    /// Begin-event for the listener flavor: return `Some(request)` to
    /// keep accepting, `None` to stop soliciting further accepts
    /// (spec.md §4.A step 2, "If `buffer` is null ... return `false`").
    fn begin_accept(&mut self) -> Option<AcceptRequest> {
        None
    }

    /// End-event for the listener flavor. `result` carries the accepted
    /// socket handle, whose properties have already been updated and
    /// whose local/peer addresses have already been cached (spec.md
    /// §4.A "accept" complete semantics).
    fn end_accept(&mut self, _op_ctx: OpCtx, _result: EngineResult<SocketHandle>) {}

    /// Begin-event for the send-like flavor (`send`/`sendto`).
    fn begin_send(&mut self) -> Option<SendRequest> {
        None
    }

    /// End-event for the send-like flavor.
    fn end_send(&mut self, _op_ctx: OpCtx, _result: EngineResult<usize>) {}

    /// Begin-event for the recv-like flavor (`recv`/`recvfrom`).
    fn begin_recv(&mut self) -> Option<RecvRequest> {
        None
    }

    /// End-event for the recv-like flavor.
    fn end_recv(&mut self, _op_ctx: OpCtx, _result: EngineResult<RecvOutcome>) {}

    /// Properties this client was (or should be) constructed with. Used
    /// by the accept path to update a freshly accepted socket's
    /// properties (spec.md §4.A: "update its ClientInterface
    /// properties").
    fn properties(&self) -> &SocketProperties;

    /// Allows the accept path to swap in the accepted socket's
    /// properties (family is only known once the peer address is read).
    fn set_properties(&mut self, _properties: SocketProperties) {}
}
