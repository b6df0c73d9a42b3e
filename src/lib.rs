//! Per-socket asynchronous I/O engine for an IoT edge proxy.
//!
//! This crate is the core of a gateway process: it exposes each TCP or
//! UDP socket as a logical object whose operations (connect, accept,
//! send, recv) are asynchronous and event-driven, plus a tri-state
//! buffer queue the upper message layer uses to serialize requests and
//! responses between arrival and dispatch.
//!
//! The upper message layer — the cloud relay transport, credential and
//! token stores, service-discovery browsers, the wire protocol — is
//! not part of this crate; it is the caller built against
//! [`engine::Engine`] and [`client::ClientInterface`].
//!
//! Four components, leaf-first:
//!
//! - [`io_queue`] — the tri-state buffer queue.
//! - [`async_op`] — one outstanding operation slot on a socket.
//! - [`socket`] — socket lifecycle, built on `async_op`.
//! - [`cascade`] — the connect/bind resolver loop, built on `socket`.
//!
//! [`engine::Engine`] ties them together with a real `mio::Poll` as the
//! completion-notification subsystem.

pub mod address;
pub mod async_op;
pub mod buffer_factory;
mod cascade;
pub mod client;
pub mod engine;
pub mod error;
pub mod io_queue;
pub mod properties;
pub mod resolver;
pub mod socket;
pub mod sockopt;

pub use address::AddressSpec;
pub use client::{ClientInterface, OpCtx, RecvFlags, RecvOutcome, RecvRequest, SendRequest, SocketHandle};
pub use engine::{Engine, EngineConfig};
pub use error::{EngineError, EngineResult};
pub use properties::{Family, OperationFlavor, ProtocolType, SocketFlags, SocketProperties, SocketType};
pub use socket::Socket;
