//! `Socket` (spec.md §4.B): owns three `AsyncOp`s, a transport, cached
//! addresses, and orchestrates open/close lifecycle.
//!
//! `begin`/`complete` in the spec are a polymorphic closure pair bound
//! once at construction (spec.md §9: "the flavor is set at socket
//! construction and never changes"). This crate expresses that as a
//! match over [`BeginKind`] rather than storing trait objects per op —
//! the flavor table (spec.md §4.B) only has three shapes per slot, a
//! natural fit for a tagged match instead of a vtable.
//!
//! `AsyncOp` points back to its owning `Socket` only conceptually; the
//! actual back-reference needed for the accept path (to register a
//! freshly accepted stream with the engine) is a `Weak<EngineCore>`
//! handle into the engine's socket arena — the arena-of-handles
//! substitution spec.md §9 sanctions in place of a raw back-pointer.

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::Weak;

use bytes::{Bytes, BytesMut};
use log::{debug, trace, warn};
use mio::net::{TcpListener, TcpStream, UdpSocket};
use mio::{Interest, Registry, Token};

#[cfg(unix)]
use std::os::unix::io::AsRawFd;
#[cfg(windows)]
use std::os::windows::io::AsRawSocket;

use crate::async_op::{AsyncOp, BeginKind};
use crate::client::{ClientInterface, OpCtx, RecvOutcome, SocketHandle};
use crate::error::{EngineError, EngineResult};
use crate::properties::{Family, OperationFlavor, ProtocolType, SocketProperties, SocketType};
use crate::sockopt::{LingerOption, ShutdownDirection, SockOpt, SockOptValue};
use crate::engine::EngineCore;

/// State the connect cascade owns while it walks a resolved address
/// list (spec.md §3: "a resolved address list, owned only during the
/// connect cascade").
pub(crate) struct CascadeState {
    pub(crate) addresses: Vec<SocketAddr>,
    pub(crate) cursor: usize,
    pub(crate) op_ctx: OpCtx,
}

/// Backing OS object. `Empty` models "descriptor invalid" (spec.md §3).
pub(crate) enum Transport {
    Empty,
    TcpListener(TcpListener),
    TcpStream(TcpStream),
    Udp(UdpSocket),
}

impl Transport {
    pub(crate) fn register(&mut self, registry: &Registry, token: Token, interests: Interest) -> io::Result<()> {
        match self {
            Transport::Empty => Ok(()),
            Transport::TcpListener(l) => registry.register(l, token, interests),
            Transport::TcpStream(s) => registry.register(s, token, interests),
            Transport::Udp(u) => registry.register(u, token, interests),
        }
    }

    pub(crate) fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        match self {
            Transport::Empty => Ok(()),
            Transport::TcpListener(l) => registry.deregister(l),
            Transport::TcpStream(s) => registry.deregister(s),
            Transport::Udp(u) => registry.deregister(u),
        }
    }

    pub(crate) fn local_addr(&self) -> io::Result<SocketAddr> {
        match self {
            Transport::Empty => Err(io::Error::new(io::ErrorKind::NotConnected, "no descriptor")),
            Transport::TcpListener(l) => l.local_addr(),
            Transport::TcpStream(s) => s.local_addr(),
            Transport::Udp(u) => u.local_addr(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        matches!(self, Transport::Empty)
    }
}

/// Sets `SO_LINGER` on a `mio::net::TcpStream` via a borrowed
/// `socket2::Socket` over the same descriptor. `ManuallyDrop` keeps the
/// descriptor owned by `stream`; this handle is never closed.
#[cfg(unix)]
fn set_linger_on_fd(stream: &TcpStream, duration: Option<std::time::Duration>) -> io::Result<()> {
    use std::mem::ManuallyDrop;
    use std::os::unix::io::FromRawFd;
    let borrowed = ManuallyDrop::new(unsafe { socket2::Socket::from_raw_fd(stream.as_raw_fd()) });
    borrowed.set_linger(duration)
}

#[cfg(windows)]
fn set_linger_on_fd(stream: &TcpStream, duration: Option<std::time::Duration>) -> io::Result<()> {
    use std::mem::ManuallyDrop;
    use std::os::windows::io::FromRawSocket;
    let borrowed =
        ManuallyDrop::new(unsafe { socket2::Socket::from_raw_socket(stream.as_raw_socket()) });
    borrowed.set_linger(duration)
}

/// `FIONREAD`: the number of bytes currently queued to read without
/// blocking (spec.md §4.B `available` sockopt: "byte-count query").
/// Takes the raw descriptor directly rather than going through
/// `socket2` — `ioctl`/`ioctlsocket` don't take ownership of anything,
/// so there's no handle to guard the way `set_linger_on_fd` guards its
/// borrowed `socket2::Socket`.
#[cfg(unix)]
fn bytes_available(fd: std::os::unix::io::RawFd) -> io::Result<usize> {
    let mut n: libc::c_int = 0;
    if unsafe { libc::ioctl(fd, libc::FIONREAD, &mut n) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(n.max(0) as usize)
}

#[cfg(windows)]
fn bytes_available(sock: std::os::windows::io::RawSocket) -> io::Result<usize> {
    use windows_sys::Win32::Networking::WinSock::{ioctlsocket, FIONREAD, SOCKET};
    let mut n: u32 = 0;
    if unsafe { ioctlsocket(sock as SOCKET, FIONREAD as i32, &mut n) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(n as usize)
}

/// `SIOCATMARK`: true once the stream's read position has reached the
/// TCP urgent-data mark, i.e. the byte just consumed was the last one
/// before out-of-band data (spec.md §4.A recv "translate OS receive
/// flags to portable flags"). Unix only: `windows-sys` doesn't surface
/// this ioctl, so `RecvFlags::OUT_OF_BAND` is never set on Windows
/// builds (see DESIGN.md).
#[cfg(unix)]
fn at_oob_mark(fd: std::os::unix::io::RawFd) -> io::Result<bool> {
    let mut atmark: libc::c_int = 0;
    if unsafe { libc::ioctl(fd, libc::SIOCATMARK, &mut atmark) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(atmark != 0)
}

/// Bytes available to read, for whichever transport kind is backing
/// this socket (spec.md §4.B `available` sockopt).
#[cfg(unix)]
fn transport_available(transport: &Transport) -> io::Result<usize> {
    match transport {
        Transport::Empty => Err(io::Error::new(io::ErrorKind::NotConnected, "no descriptor")),
        Transport::TcpListener(l) => bytes_available(l.as_raw_fd()),
        Transport::TcpStream(s) => bytes_available(s.as_raw_fd()),
        Transport::Udp(u) => bytes_available(u.as_raw_fd()),
    }
}

#[cfg(windows)]
fn transport_available(transport: &Transport) -> io::Result<usize> {
    match transport {
        Transport::Empty => Err(io::Error::new(io::ErrorKind::NotConnected, "no descriptor")),
        Transport::TcpListener(l) => bytes_available(l.as_raw_socket()),
        Transport::TcpStream(s) => bytes_available(s.as_raw_socket()),
        Transport::Udp(u) => bytes_available(u.as_raw_socket()),
    }
}

/// A socket's lifecycle (spec.md §4.B).
pub struct Socket {
    pub(crate) handle: SocketHandle,
    pub(crate) engine: Weak<EngineCore>,
    pub(crate) properties: SocketProperties,
    pub(crate) transport: Transport,
    pub(crate) local: Option<SocketAddr>,
    pub(crate) peer: Option<SocketAddr>,
    pub(crate) client: Box<dyn ClientInterface>,
    pub(crate) open_op: AsyncOp,
    pub(crate) send_op: AsyncOp,
    pub(crate) recv_op: AsyncOp,
    pending_send: Option<(OpCtx, Bytes, usize, Option<SocketAddr>)>,
    pending_recv: Option<(OpCtx, BytesMut)>,
    pending_accept: Option<(OpCtx, Box<dyn ClientInterface>)>,
    pub(crate) cascade: Option<CascadeState>,
    closing: bool,
    backlog: u32,
}

impl Socket {
    pub(crate) fn new(
        handle: SocketHandle,
        engine: Weak<EngineCore>,
        properties: SocketProperties,
        client: Box<dyn ClientInterface>,
        backlog: u32,
    ) -> Self {
        let (send_kind, recv_kind) = match properties.flavor() {
            OperationFlavor::Datagram => (BeginKind::SendTo, BeginKind::RecvFrom),
            OperationFlavor::Listener => (BeginKind::NoOp, BeginKind::Accept),
            OperationFlavor::StreamActive => (BeginKind::Send, BeginKind::Recv),
        };
        Socket {
            handle,
            engine,
            properties,
            transport: Transport::Empty,
            local: None,
            peer: None,
            client,
            open_op: AsyncOp::new(BeginKind::Connect),
            send_op: AsyncOp::new(send_kind),
            recv_op: AsyncOp::new(recv_kind),
            pending_send: None,
            pending_recv: None,
            pending_accept: None,
            cascade: None,
            closing: false,
            backlog,
        }
    }

    pub fn handle(&self) -> SocketHandle {
        self.handle
    }

    pub fn get_properties(&self) -> &SocketProperties {
        &self.properties
    }

    pub fn get_local(&self) -> Option<SocketAddr> {
        self.local
    }

    pub fn get_peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub(crate) fn set_local(&mut self, local: Option<SocketAddr>) {
        self.local = local;
    }

    pub(crate) fn set_peer(&mut self, peer: Option<SocketAddr>) {
        self.peer = peer;
    }

    /// True once the socket has settled into a fully torn down,
    /// never-or-no-longer-open quiescent state (used by
    /// [`crate::engine::Engine::shutdown`] to reap sockets from the
    /// arena).
    pub(crate) fn is_fully_closed(&self) -> bool {
        self.transport.is_empty()
            && !self.closing
            && self.open_op.is_quiescent()
            && self.send_op.is_quiescent()
            && self.recv_op.is_quiescent()
    }

    pub(crate) fn token(&self) -> Token {
        Token(self.handle.0)
    }

    /// spec.md §4.B `can_send`/`can_recv`: invoked by the reactor when
    /// readiness for this socket's token changes.
    pub(crate) fn on_writable(&mut self) {
        if self.cascade_writable_step() {
            return;
        }
        if let Some((ctx, buf, offset, addr)) = self.pending_send.take() {
            self.try_send_now(ctx, buf, offset, addr);
        } else {
            self.drive_send();
        }
    }

    pub(crate) fn on_readable(&mut self) {
        if let Some((ctx, buf)) = self.pending_recv.take() {
            self.try_recv_now(ctx, buf);
        } else if let Some((ctx, client)) = self.pending_accept.take() {
            self.try_accept_now(ctx, client);
        } else {
            self.drive_recv();
        }
    }

    pub fn can_send(&mut self, ready: bool) -> EngineResult<()> {
        if self.closing || self.transport.is_empty() {
            return Err(EngineError::Closed);
        }
        if ready {
            self.drive_send();
        }
        Ok(())
    }

    pub fn can_recv(&mut self, ready: bool) -> EngineResult<()> {
        if self.closing || self.transport.is_empty() {
            return Err(EngineError::Closed);
        }
        if ready {
            self.drive_recv();
        }
        Ok(())
    }

    fn drive_send(&mut self) {
        while self.send_op.is_quiescent() {
            if !self.begin_send_once() {
                break;
            }
        }
    }

    fn drive_recv(&mut self) {
        while self.recv_op.is_quiescent() {
            if !self.begin_recv_once() {
                break;
            }
        }
    }

    fn begin_send_once(&mut self) -> bool {
        match self.send_op.kind() {
            BeginKind::NoOp | BeginKind::CloseShim => false,
            BeginKind::Send => self.begin_stream_send(),
            BeginKind::SendTo => self.begin_datagram_send(),
            other => unreachable!("send_op bound to unexpected flavor {other:?}"),
        }
    }

    fn begin_stream_send(&mut self) -> bool {
        let Some(req) = self.client.begin_send() else {
            return false;
        };
        self.send_op.enter();
        self.try_send_now(req.op_ctx, req.buffer, 0, None)
    }

    fn begin_datagram_send(&mut self) -> bool {
        let Some(req) = self.client.begin_send() else {
            return false;
        };
        self.send_op.enter();
        let Some(addr) = req.addr else {
            self.send_op.exit();
            self.client.end_send(req.op_ctx, Err(EngineError::Fault));
            self.close_check();
            return false;
        };
        self.try_send_now(req.op_ctx, req.buffer, 0, Some(addr))
    }

    fn raw_send(&mut self, data: &[u8], addr: Option<SocketAddr>) -> io::Result<usize> {
        match (&mut self.transport, addr) {
            (Transport::TcpStream(s), None) => s.write(data),
            (Transport::Udp(u), Some(a)) => u.send_to(data, a),
            _ => Err(io::Error::new(io::ErrorKind::InvalidInput, "send flavor mismatch")),
        }
    }

    /// Attempts one send. Datagram sends are atomic (one `send_to` call
    /// either transfers the whole payload or fails); stream sends loop
    /// over partial writes. There is no distinct "completion callback"
    /// step here the way the spec's IOCP model has one — on a readiness
    /// reactor the retried attempt on writable-readiness *is* the
    /// completion path, so `complete` is invoked inline the moment the
    /// write actually finishes (see DESIGN.md, "synchronous completion").
    fn try_send_now(
        &mut self,
        op_ctx: OpCtx,
        payload: Bytes,
        mut offset: usize,
        addr: Option<SocketAddr>,
    ) -> bool {
        loop {
            match self.raw_send(&payload[offset..], addr) {
                Ok(n) if addr.is_some() || offset + n >= payload.len() => {
                    self.send_op.exit();
                    trace!("send complete on {:?}: {} bytes", self.handle, payload.len());
                    self.client.end_send(op_ctx, Ok(payload.len()));
                    self.close_check();
                    return true;
                }
                Ok(n) => {
                    offset += n;
                    continue;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.pending_send = Some((op_ctx, payload, offset, addr));
                    return false;
                }
                Err(e) => {
                    self.send_op.exit();
                    warn!("send failed on {:?}: {e}", self.handle);
                    self.client.end_send(op_ctx, Err(e.into()));
                    self.close_check();
                    return false;
                }
            }
        }
    }

    fn begin_recv_once(&mut self) -> bool {
        match self.recv_op.kind() {
            BeginKind::NoOp | BeginKind::CloseShim => false,
            BeginKind::Recv | BeginKind::RecvFrom => self.begin_stream_or_datagram_recv(),
            BeginKind::Accept => self.begin_accept_once(),
            other => unreachable!("recv_op bound to unexpected flavor {other:?}"),
        }
    }

    fn begin_stream_or_datagram_recv(&mut self) -> bool {
        let Some(req) = self.client.begin_recv() else {
            return false;
        };
        self.recv_op.enter();
        self.try_recv_now(req.op_ctx, req.buffer)
    }

    fn raw_recv(
        &mut self,
        buf: &mut [u8],
    ) -> io::Result<(usize, Option<SocketAddr>, crate::client::RecvFlags)> {
        use crate::client::RecvFlags;
        match &mut self.transport {
            Transport::TcpStream(s) => {
                #[cfg(unix)]
                let oob = at_oob_mark(s.as_raw_fd()).unwrap_or(false);
                #[cfg(windows)]
                let oob = false;
                let n = s.read(buf)?;
                let mut flags = RecvFlags::empty();
                if oob {
                    flags |= RecvFlags::OUT_OF_BAND;
                }
                Ok((n, None, flags))
            }
            Transport::Udp(u) => {
                // `FIONREAD` on a UDP socket reports the size of the next
                // queued datagram, which can exceed `buf`'s capacity —
                // that's the portable signal for truncation, queried
                // before the read consumes the datagram.
                #[cfg(unix)]
                let pending = bytes_available(u.as_raw_fd()).ok();
                #[cfg(windows)]
                let pending = bytes_available(u.as_raw_socket()).ok();
                let (n, addr) = u.recv_from(buf)?;
                let mut flags = RecvFlags::empty();
                if pending.is_some_and(|p| p > buf.len()) {
                    flags |= RecvFlags::TRUNCATED;
                }
                Ok((n, Some(addr), flags))
            }
            _ => Err(io::Error::new(io::ErrorKind::InvalidInput, "recv flavor mismatch")),
        }
    }

    fn try_recv_now(&mut self, op_ctx: OpCtx, mut buffer: BytesMut) -> bool {
        match self.raw_recv(&mut buffer) {
            Ok((n, addr, flags)) => {
                buffer.truncate(n);
                self.recv_op.exit();
                trace!("recv complete on {:?}: {} bytes", self.handle, n);
                self.client.end_recv(
                    op_ctx,
                    Ok(RecvOutcome {
                        buffer: buffer.freeze(),
                        addr,
                        flags,
                    }),
                );
                self.close_check();
                true
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                self.pending_recv = Some((op_ctx, buffer));
                false
            }
            Err(e) => {
                self.recv_op.exit();
                warn!("recv failed on {:?}: {e}", self.handle);
                self.client.end_recv(op_ctx, Err(e.into()));
                self.close_check();
                false
            }
        }
    }

    fn begin_accept_once(&mut self) -> bool {
        let Some(req) = self.client.begin_accept() else {
            return false;
        };
        self.recv_op.enter();
        self.try_accept_now(req.op_ctx, req.client)
    }

    fn try_accept_now(&mut self, op_ctx: OpCtx, client: Box<dyn ClientInterface>) -> bool {
        let result = match &self.transport {
            Transport::TcpListener(l) => l.accept(),
            _ => Err(io::Error::new(io::ErrorKind::InvalidInput, "accept on non-listener")),
        };
        match result {
            Ok((stream, peer)) => {
                let local = stream.local_addr().ok();
                let accepted = self.finish_accept(stream, peer, local, client);
                self.recv_op.exit();
                match accepted {
                    Ok(handle) => {
                        debug!("accepted {:?} on listener {:?}", handle, self.handle);
                        self.client.end_accept(op_ctx, Ok(handle));
                    }
                    Err(e) => self.client.end_accept(op_ctx, Err(e)),
                }
                self.close_check();
                true
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                self.pending_accept = Some((op_ctx, client));
                false
            }
            Err(e) => {
                self.recv_op.exit();
                warn!("accept failed on {:?}: {e}", self.handle);
                self.client.end_accept(op_ctx, Err(e.into()));
                self.close_check();
                false
            }
        }
    }

    fn finish_accept(
        &mut self,
        stream: TcpStream,
        peer: SocketAddr,
        local: Option<SocketAddr>,
        mut client: Box<dyn ClientInterface>,
    ) -> EngineResult<SocketHandle> {
        let Some(engine) = self.engine.upgrade() else {
            return Err(EngineError::Fatal);
        };
        let properties = SocketProperties {
            family: if peer.is_ipv4() { Family::Inet4 } else { Family::Inet6 },
            socket_type: SocketType::Stream,
            protocol_type: ProtocolType::Tcp,
            address: peer.into(),
            flags: crate::properties::SocketFlags::empty(),
        };
        client.set_properties(properties.clone());
        engine.adopt_accepted(stream, peer, local, properties, client)
    }

    /// spec.md §4.B `close(ctx)`. `ctx` is accepted for symmetry with
    /// `open(ctx)` but is not echoed anywhere: the `closed` event carries
    /// no op-context in this design (see DESIGN.md open question).
    pub fn close(&mut self, _ctx: OpCtx) {
        if self.closing {
            return;
        }
        debug!("closing {:?}", self.handle);
        self.closing = true;
        self.open_op.set_kind(BeginKind::CloseShim);
        self.send_op.set_kind(BeginKind::CloseShim);
        self.recv_op.set_kind(BeginKind::CloseShim);
        self.cancel_outstanding();
        self.close_check();
    }

    /// There is no real OS cancellation primitive to invoke in a
    /// readiness reactor (there is no outstanding kernel-side operation
    /// to cancel — only a buffer we are holding onto waiting for
    /// readiness). Cancellation is therefore synthesized locally: any
    /// buffer parked waiting on readiness is handed back immediately
    /// with `Aborted`, exactly mirroring what a real cancel's eventual
    /// completion would deliver (spec.md §4.A "Cancel shim").
    fn cancel_outstanding(&mut self) {
        if let Some((ctx, _, _, _)) = self.pending_send.take() {
            self.client.end_send(ctx, Err(EngineError::Aborted));
            self.send_op.exit();
        }
        if let Some((ctx, _)) = self.pending_recv.take() {
            self.client.end_recv(ctx, Err(EngineError::Aborted));
            self.recv_op.exit();
        }
        if let Some((ctx, _)) = self.pending_accept.take() {
            self.client.end_accept(ctx, Err(EngineError::Aborted));
            self.recv_op.exit();
        }
        if let Some(cascade) = self.cascade.take() {
            drop(cascade);
            self.client.opened(Err(EngineError::Aborted));
            self.open_op.exit();
        }
    }

    /// spec.md §4.B `close_check` protocol.
    pub(crate) fn close_check(&mut self) {
        if self.closing
            && self.open_op.is_quiescent()
            && self.send_op.is_quiescent()
            && self.recv_op.is_quiescent()
        {
            if let Some(engine) = self.engine.upgrade() {
                let _ = self.transport.deregister(&engine.registry);
            }
            self.transport = Transport::Empty;
            self.closing = false;
            debug!("{:?} closed", self.handle);
            self.client.closed();
        }
    }

    pub(crate) fn register_transport(&mut self, interests: Interest) -> io::Result<()> {
        let Some(engine) = self.engine.upgrade() else {
            return Err(io::Error::new(io::ErrorKind::Other, "engine gone"));
        };
        self.transport.register(&engine.registry, self.token(), interests)
    }

    pub(crate) fn deregister_transport(&mut self) {
        if let Some(engine) = self.engine.upgrade() {
            let _ = self.transport.deregister(&engine.registry);
        }
    }

    pub(crate) fn backlog(&self) -> u32 {
        self.backlog
    }

    fn require_open(&self) -> EngineResult<()> {
        if self.transport.is_empty() {
            Err(EngineError::Closed)
        } else {
            Ok(())
        }
    }

    /// spec.md §4.B `get_sockopt`/`set_sockopt`.
    pub fn set_sockopt(&mut self, opt: SockOpt, value: SockOptValue) -> EngineResult<()> {
        match (opt, value) {
            (SockOpt::Shutdown(direction), _) => self.shutdown(direction),
            (SockOpt::Linger, SockOptValue::Linger(LingerOption { on, seconds })) => {
                self.require_open()?;
                self.apply_linger(on, seconds)
            }
            (SockOpt::NonBlocking, _) => {
                // Every transport in this engine is already non-blocking
                // end to end; the option is accepted and ignored.
                Ok(())
            }
            (SockOpt::AcceptConn, _) => Err(EngineError::NotSupported),
            (SockOpt::Available, _) => Err(EngineError::Fault),
            _ => Err(EngineError::Fault),
        }
    }

    pub fn get_sockopt(&self, opt: SockOpt) -> EngineResult<SockOptValue> {
        match opt {
            SockOpt::AcceptConn => Err(EngineError::NotSupported),
            SockOpt::Available => {
                self.require_open()?;
                let n = transport_available(&self.transport).map_err(EngineError::Net)?;
                Ok(SockOptValue::Available(n))
            }
            _ => Err(EngineError::NotSupported),
        }
    }

    fn shutdown(&mut self, direction: ShutdownDirection) -> EngineResult<()> {
        self.require_open()?;
        let std_direction = match direction {
            ShutdownDirection::Read => std::net::Shutdown::Read,
            ShutdownDirection::Write => std::net::Shutdown::Write,
            ShutdownDirection::Both => std::net::Shutdown::Both,
        };
        if let Transport::TcpStream(s) = &self.transport {
            s.shutdown(std_direction).map_err(EngineError::Net)?;
        }
        // "shutdown(read) silences the receive side by swapping
        // recv_op.begin to no-op" (spec.md §4.B) — and symmetrically for
        // write/send_op.
        match direction {
            ShutdownDirection::Read => self.recv_op.set_kind(BeginKind::NoOp),
            ShutdownDirection::Write => self.send_op.set_kind(BeginKind::NoOp),
            ShutdownDirection::Both => {
                self.recv_op.set_kind(BeginKind::NoOp);
                self.send_op.set_kind(BeginKind::NoOp);
            }
        }
        Ok(())
    }

    fn apply_linger(&mut self, on: bool, seconds: u16) -> EngineResult<()> {
        if let Transport::TcpStream(s) = &self.transport {
            // `l_onoff = (value != 0)`, `l_linger = value` (spec.md
            // §4.B). `mio::net::TcpStream` doesn't expose this option
            // directly (it only wraps nodelay/ttl) — `socket2::Socket`
            // borrowed from the same descriptor does, the same pairing
            // the pack's own `mio`-based servers use for options outside
            // `mio`'s own surface.
            let duration = on.then(|| std::time::Duration::from_secs(seconds as u64));
            set_linger_on_fd(s, duration).map_err(EngineError::Net)?;
        }
        Ok(())
    }

    pub fn join_multicast_group(&mut self, group: SocketAddr, iface: Option<SocketAddr>) -> EngineResult<()> {
        let Transport::Udp(u) = &self.transport else {
            return Err(EngineError::Fault);
        };
        match (group, iface) {
            (SocketAddr::V4(g), Some(SocketAddr::V4(i))) => {
                u.join_multicast_v4(g.ip(), i.ip()).map_err(EngineError::Net)
            }
            (SocketAddr::V4(g), _) => {
                u.join_multicast_v4(g.ip(), &std::net::Ipv4Addr::UNSPECIFIED).map_err(EngineError::Net)
            }
            (SocketAddr::V6(g), _) => u.join_multicast_v6(g.ip(), 0).map_err(EngineError::Net),
        }
    }

    pub fn leave_multicast_group(&mut self, group: SocketAddr, iface: Option<SocketAddr>) -> EngineResult<()> {
        let Transport::Udp(u) = &self.transport else {
            return Err(EngineError::Fault);
        };
        match (group, iface) {
            (SocketAddr::V4(g), Some(SocketAddr::V4(i))) => {
                u.leave_multicast_v4(g.ip(), i.ip()).map_err(EngineError::Net)
            }
            (SocketAddr::V4(g), _) => {
                u.leave_multicast_v4(g.ip(), &std::net::Ipv4Addr::UNSPECIFIED).map_err(EngineError::Net)
            }
            (SocketAddr::V6(g), _) => u.leave_multicast_v6(g.ip(), 0).map_err(EngineError::Net),
        }
    }

    /// Resumed on a writable event while a connect is in flight
    /// (spec.md §4.C `connect_complete`). Returns `true` if this event
    /// belonged to an in-progress cascade (whether or not it advanced),
    /// so `on_writable` knows not to also treat it as a send-readiness
    /// event.
    fn cascade_writable_step(&mut self) -> bool {
        if self.cascade.is_none() || !matches!(self.transport, Transport::TcpStream(_)) {
            return false;
        }
        self.advance_connect();
        true
    }
}
