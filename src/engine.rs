//! The reactor: owns the `mio::Poll` instance, the socket arena, and
//! translates readiness events into the `AsyncOp` drive calls the rest
//! of the crate describes in completion-port terms (spec.md §2 "OS
//! completion-notification subsystem").
//!
//! Generalized from the teacher's own `EventLoop` (`event_loop.rs`):
//! a `Poll`/`Events` pair driven by a `turn` method, sockets kept in a
//! `slab::Slab` keyed by the same index used as the `mio::Token`
//! (mirroring the teacher's own token-indexed handler table).

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, trace};
use mio::{Events, Interest, Poll, Token};
use slab::Slab;

use crate::buffer_factory::{BufferFactory, PooledBufferFactory};
use crate::client::{ClientInterface, OpCtx, SocketHandle};
use crate::error::{EngineError, EngineResult};
use crate::properties::SocketProperties;
use crate::resolver::{AddressResolver, StdResolver};
use crate::sockopt::{SockOpt, SockOptValue};
use crate::socket::{Socket, Transport};

/// Tunables that have no portable-ID counterpart in `spec.md` but that
/// any real reactor needs (spec.md is silent on them; SPEC_FULL.md §7).
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Capacity of the `mio::Events` buffer per `turn`.
    pub events_capacity: usize,
    /// Starting capacity of the default pooled buffer factory.
    pub buffer_pool_capacity: usize,
    /// Backlog hint passed to listener sockets. `mio`'s safe binding
    /// does not expose a way to apply this past the OS default (see
    /// DESIGN.md); kept so the engine's public surface still carries
    /// the spec's "maximum backlog" concept end to end.
    pub listen_backlog: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            events_capacity: 1024,
            buffer_pool_capacity: 256,
            listen_backlog: 1024,
        }
    }
}

/// Shared engine state reachable from a `Socket` via a `Weak` handle
/// (spec.md §9 "cyclic structures": an arena of handles in place of a
/// raw Socket-back-pointer from AsyncOp).
pub(crate) struct EngineCore {
    pub(crate) registry: mio::Registry,
    sockets: Mutex<Slab<Arc<Mutex<Socket>>>>,
    resolver: Box<dyn AddressResolver>,
    pub(crate) factory: Arc<dyn BufferFactory>,
    config: EngineConfig,
}

impl EngineCore {
    /// Finishes registering a socket accepted on a listener (spec.md
    /// §4.A "accept" complete semantics: "cache [the addresses] into
    /// the newly accepted Socket, update its ClientInterface
    /// properties"). Lives on `EngineCore` rather than `Socket` because
    /// it needs the arena to allocate the new socket's slot.
    pub(crate) fn adopt_accepted(
        self: &Arc<Self>,
        stream: mio::net::TcpStream,
        peer: SocketAddr,
        local: Option<SocketAddr>,
        properties: SocketProperties,
        client: Box<dyn ClientInterface>,
    ) -> EngineResult<SocketHandle> {
        let mut sockets = self.sockets.lock().unwrap();
        let entry = sockets.vacant_entry();
        let key = entry.key();
        let handle = SocketHandle(key);
        let mut socket = Socket::new(
            handle,
            Arc::downgrade(self),
            properties,
            client,
            self.config.listen_backlog,
        );
        socket.transport = Transport::TcpStream(stream);
        socket.set_peer(Some(peer));
        socket.set_local(local);
        socket
            .register_transport(Interest::READABLE | Interest::WRITABLE)
            .map_err(EngineError::Net)?;
        entry.insert(Arc::new(Mutex::new(socket)));
        Ok(handle)
    }

    fn get(&self, handle: SocketHandle) -> EngineResult<Arc<Mutex<Socket>>> {
        self.sockets
            .lock()
            .unwrap()
            .get(handle.0)
            .cloned()
            .ok_or(EngineError::Fault)
    }
}

/// The reactor (spec.md's "external caller" drives this; not itself
/// named in `spec.md`, which treats the dispatch loop as ambient).
pub struct Engine {
    core: Arc<EngineCore>,
    poll: Mutex<Poll>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> std::io::Result<Self> {
        Self::with_resolver(config, Box::new(StdResolver))
    }

    pub fn with_resolver(
        config: EngineConfig,
        resolver: Box<dyn AddressResolver>,
    ) -> std::io::Result<Self> {
        let poll = Poll::new()?;
        let registry = poll.registry().try_clone()?;
        let factory: Arc<dyn BufferFactory> =
            Arc::new(PooledBufferFactory::new(config.buffer_pool_capacity));
        let core = Arc::new(EngineCore {
            registry,
            sockets: Mutex::new(Slab::new()),
            resolver,
            factory,
            config,
        });
        Ok(Engine {
            core,
            poll: Mutex::new(poll),
        })
    }

    pub fn buffer_factory(&self) -> Arc<dyn BufferFactory> {
        self.core.factory.clone()
    }

    /// spec.md §4.B `create(itf)`: the flavor each `AsyncOp` binds to is
    /// read straight from `itf.properties()`.
    pub fn create(&self, client: Box<dyn ClientInterface>) -> SocketHandle {
        let properties = client.properties().clone();
        let mut sockets = self.core.sockets.lock().unwrap();
        let entry = sockets.vacant_entry();
        let key = entry.key();
        let handle = SocketHandle(key);
        let socket = Socket::new(
            handle,
            Arc::downgrade(&self.core),
            properties,
            client,
            self.core.config.listen_backlog,
        );
        entry.insert(Arc::new(Mutex::new(socket)));
        debug!("created {:?}", handle);
        handle
    }

    /// spec.md §4.B `open(ctx)`.
    pub fn open(&self, handle: SocketHandle, op_ctx: OpCtx) -> EngineResult<()> {
        let socket = self.core.get(handle)?;
        let mut socket = socket.lock().unwrap();
        socket.open_cascade(self.core.resolver.as_ref(), op_ctx);
        Ok(())
    }

    pub fn can_send(&self, handle: SocketHandle, ready: bool) -> EngineResult<()> {
        self.core.get(handle)?.lock().unwrap().can_send(ready)
    }

    pub fn can_recv(&self, handle: SocketHandle, ready: bool) -> EngineResult<()> {
        self.core.get(handle)?.lock().unwrap().can_recv(ready)
    }

    /// spec.md §4.B `close(ctx)`.
    pub fn close(&self, handle: SocketHandle, op_ctx: OpCtx) -> EngineResult<()> {
        self.core.get(handle)?.lock().unwrap().close(op_ctx);
        Ok(())
    }

    pub fn get_sockopt(&self, handle: SocketHandle, opt: SockOpt) -> EngineResult<SockOptValue> {
        self.core.get(handle)?.lock().unwrap().get_sockopt(opt)
    }

    pub fn set_sockopt(
        &self,
        handle: SocketHandle,
        opt: SockOpt,
        value: SockOptValue,
    ) -> EngineResult<()> {
        self.core
            .get(handle)?
            .lock()
            .unwrap()
            .set_sockopt(opt, value)
    }

    pub fn get_local(&self, handle: SocketHandle) -> EngineResult<Option<SocketAddr>> {
        Ok(self.core.get(handle)?.lock().unwrap().get_local())
    }

    pub fn get_peer(&self, handle: SocketHandle) -> EngineResult<Option<SocketAddr>> {
        Ok(self.core.get(handle)?.lock().unwrap().get_peer())
    }

    pub fn get_properties(&self, handle: SocketHandle) -> EngineResult<SocketProperties> {
        Ok(self.core.get(handle)?.lock().unwrap().get_properties().clone())
    }

    pub fn join_multicast_group(
        &self,
        handle: SocketHandle,
        group: SocketAddr,
        iface: Option<SocketAddr>,
    ) -> EngineResult<()> {
        self.core
            .get(handle)?
            .lock()
            .unwrap()
            .join_multicast_group(group, iface)
    }

    pub fn leave_multicast_group(
        &self,
        handle: SocketHandle,
        group: SocketAddr,
        iface: Option<SocketAddr>,
    ) -> EngineResult<()> {
        self.core
            .get(handle)?
            .lock()
            .unwrap()
            .leave_multicast_group(group, iface)
    }

    /// Drives the reactor for one poll cycle, dispatching readiness
    /// events to the matching socket's drive/cascade logic. Stands in
    /// for the OS completion-notification subsystem's callback
    /// (spec.md §2).
    pub fn turn(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        let mut poll = self.poll.lock().unwrap();
        let mut events = Events::with_capacity(self.core.config.events_capacity);
        poll.poll(&mut events, timeout)?;
        for event in events.iter() {
            let Token(key) = event.token();
            let socket = {
                let sockets = self.core.sockets.lock().unwrap();
                sockets.get(key).cloned()
            };
            let Some(socket) = socket else { continue };
            let mut socket = socket.lock().unwrap();
            if event.is_writable() {
                trace!("writable on token {key}");
                socket.on_writable();
            }
            if event.is_readable() {
                trace!("readable on token {key}");
                socket.on_readable();
            }
        }
        Ok(())
    }

    /// Supplemented operation (SPEC_FULL.md §9): closes every live
    /// socket and drives `turn` until each one's `close_check` has
    /// fired, or `max_turns` is exhausted.
    pub fn shutdown(&self, max_turns: usize) -> std::io::Result<()> {
        let handles: Vec<SocketHandle> = self
            .core
            .sockets
            .lock()
            .unwrap()
            .iter()
            .map(|(k, _)| SocketHandle(k))
            .collect();
        for handle in &handles {
            let _ = self.close(*handle, None);
        }
        for _ in 0..max_turns {
            if self.core.sockets.lock().unwrap().is_empty() {
                break;
            }
            self.turn(Some(Duration::from_millis(10)))?;
            self.reap_closed();
        }
        Ok(())
    }

    fn reap_closed(&self) {
        let mut sockets = self.core.sockets.lock().unwrap();
        let closed: Vec<usize> = sockets
            .iter()
            .filter(|(_, s)| s.lock().unwrap().is_fully_closed())
            .map(|(k, _)| k)
            .collect();
        for key in closed {
            sockets.remove(key);
        }
    }
}
