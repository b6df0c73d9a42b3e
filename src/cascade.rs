//! ConnectCascade (spec.md §4.C): resolve → iterate addresses → bind or
//! connect, retrying past failures until one address opens.
//!
//! Expressed as an `impl Socket` block rather than a standalone struct:
//! the cascade only ever mutates one socket's state (`cascade`,
//! `transport`, `local`/`peer`, `open_op`) and has no state of its own
//! beyond what [`CascadeState`](crate::socket::CascadeState) already
//! carries, so a free-standing type would just be a zero-sized wrapper
//! around `&mut Socket`.

use log::{debug, trace, warn};
use mio::net::{TcpListener, TcpStream, UdpSocket};
use mio::Interest;
use std::io;
use std::net::SocketAddr;

use crate::client::OpCtx;
use crate::error::{EngineError, EngineResult};
use crate::properties::Family;
use crate::resolver::AddressResolver;
use crate::socket::{CascadeState, Socket, Transport};

enum CascadeStep {
    /// An asynchronous connect is in flight; resumed by writable
    /// readiness (spec.md §4.C `connect_begin` step 3).
    Waiting,
    /// Bind (and maybe listen) succeeded synchronously.
    Opened,
    /// This candidate address failed; advance the cursor and retry.
    Failed,
}

impl Socket {
    /// Entry point (spec.md §4.C): `open(socket, ctx)`.
    pub(crate) fn open_cascade(&mut self, resolver: &dyn AddressResolver, op_ctx: OpCtx) {
        let address = self.properties.address.clone();
        if let Some(addr) = address.socket_addr() {
            // Case 2: already concrete.
            self.start_cascade(vec![addr], op_ctx);
            return;
        }

        // Case 1: proxy-by-name.
        let (host, port) = match &address {
            crate::address::AddressSpec::ProxyByName { host, port } => (host.clone(), *port),
            _ => unreachable!("AddressSpec without a socket_addr must be ProxyByName"),
        };
        let family = Some(self.properties.family);
        match resolver.resolve(&host, port, family, self.properties.is_passive()) {
            Ok(addrs) if addrs.is_empty() => {
                self.open_op.enter();
                self.complete_open(Err(EngineError::Connecting));
            }
            Ok(addrs) => self.start_cascade(addrs, op_ctx),
            Err(e) => {
                self.open_op.enter();
                self.complete_open(Err(e));
            }
        }
    }

    fn start_cascade(&mut self, addresses: Vec<SocketAddr>, op_ctx: OpCtx) {
        self.open_op.enter();
        self.cascade = Some(CascadeState {
            addresses,
            cursor: 0,
            op_ctx,
        });
        self.advance_cascade();
    }

    fn advance_cursor(&mut self) {
        if let Some(cascade) = &mut self.cascade {
            cascade.cursor += 1;
        }
    }

    /// Drives the cascade loop as far as it can go synchronously,
    /// stopping the instant an attempt needs to wait on readiness.
    pub(crate) fn advance_cascade(&mut self) {
        loop {
            let addr = {
                let Some(cascade) = &self.cascade else { return };
                if cascade.cursor >= cascade.addresses.len() {
                    self.complete_open(Err(EngineError::Connecting));
                    return;
                }
                cascade.addresses[cascade.cursor]
            };

            self.properties.address = addr.into();
            self.properties.family = if addr.is_ipv4() { Family::Inet4 } else { Family::Inet6 };

            let step = if self.properties.socket_type.is_stream_like() && !self.properties.is_passive() {
                self.connect_begin(addr)
            } else {
                self.bind_and_maybe_listen(addr)
            };

            match step {
                CascadeStep::Waiting => return,
                CascadeStep::Opened => {
                    self.complete_open(Ok(()));
                    return;
                }
                CascadeStep::Failed => {
                    self.advance_cursor();
                    continue;
                }
            }
        }
    }

    /// spec.md §4.C `connect_begin`. `mio::net::TcpStream::connect`
    /// folds "create descriptor" and "issue the overlapped connect"
    /// into one call — there is no bare-socket-creation step in a safe
    /// `mio` binding distinct from connect/bind, so this crate's
    /// cascade collapses the spec's steps 3 ("create descriptor + bind
    /// to completion notification subsystem") into this step, noted in
    /// DESIGN.md.
    fn connect_begin(&mut self, addr: SocketAddr) -> CascadeStep {
        match TcpStream::connect(addr) {
            Ok(stream) => {
                self.transport = Transport::TcpStream(stream);
                if let Err(e) = self.register_transport(Interest::READABLE | Interest::WRITABLE) {
                    warn!("cascade: register failed for {addr}: {e}");
                    self.transport = Transport::Empty;
                    return CascadeStep::Failed;
                }
                trace!("cascade: connect issued to {addr}, awaiting writable");
                CascadeStep::Waiting
            }
            Err(e) => {
                warn!("cascade: connect failed synchronously for {addr}: {e}");
                CascadeStep::Failed
            }
        }
    }

    /// Resumed from `on_writable` while a connect attempt is in flight
    /// (spec.md §4.C `connect_complete`).
    pub(crate) fn advance_connect(&mut self) {
        let result = self.check_connect_error();
        match result {
            Ok(()) => {
                let peer = match &self.transport {
                    Transport::TcpStream(s) => s.peer_addr().ok(),
                    _ => None,
                };
                let local = self.transport.local_addr().ok();
                self.local = local;
                self.peer = peer;
                self.complete_open(Ok(()));
            }
            Err(e) => {
                warn!("cascade: connect_complete failed: {e}");
                self.deregister_transport();
                self.transport = Transport::Empty;
                self.advance_cursor();
                self.advance_cascade();
            }
        }
    }

    fn check_connect_error(&self) -> io::Result<()> {
        match &self.transport {
            Transport::TcpStream(s) => match s.take_error()? {
                Some(e) => Err(e),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    /// spec.md §4.C "bind-and-maybe-listen" path.
    fn bind_and_maybe_listen(&mut self, addr: SocketAddr) -> CascadeStep {
        if self.properties.socket_type.is_stream_like() {
            trace!("cascade: binding listener on {addr} (backlog {})", self.backlog());
            match TcpListener::bind(addr) {
                Ok(listener) => {
                    self.transport = Transport::TcpListener(listener);
                    if let Err(e) = self.register_transport(Interest::READABLE) {
                        warn!("cascade: register failed for listener {addr}: {e}");
                        self.transport = Transport::Empty;
                        return CascadeStep::Failed;
                    }
                    CascadeStep::Opened
                }
                Err(e) => {
                    warn!("cascade: bind failed for {addr}: {e}");
                    CascadeStep::Failed
                }
            }
        } else {
            match UdpSocket::bind(addr) {
                Ok(sock) => {
                    self.transport = Transport::Udp(sock);
                    if let Err(e) = self.register_transport(Interest::READABLE | Interest::WRITABLE) {
                        warn!("cascade: register failed for datagram socket {addr}: {e}");
                        self.transport = Transport::Empty;
                        return CascadeStep::Failed;
                    }
                    CascadeStep::Opened
                }
                Err(e) => {
                    warn!("cascade: bind failed for {addr}: {e}");
                    CascadeStep::Failed
                }
            }
        }
    }

    /// spec.md §4.C "Open completion": dispatch exactly one `opened`
    /// event and free the resolved address list.
    fn complete_open(&mut self, result: EngineResult<()>) {
        self.cascade = None;
        self.open_op.exit();
        if result.is_ok() && self.local.is_none() {
            self.local = self.transport.local_addr().ok();
        }
        debug!("opened {:?}: ok={}", self.handle, result.is_ok());
        self.client.opened(result);
        self.close_check();
    }
}
