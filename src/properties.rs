//! `SocketProperties` (spec.md §3) — the construction-time description of
//! a socket that determines its operation flavor (spec.md §4.B table).

use crate::address::AddressSpec;

/// Address family. Mirrors `std::net`'s split but is kept as its own
/// portable enum so `SocketProperties` doesn't have to carry a resolved
/// address just to know the family.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Family {
    Inet4,
    Inet6,
}

/// `socket_type` from spec.md §3's `SocketProperties`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SocketType {
    Stream,
    Dgram,
    Raw,
    SeqPacket,
    Rdm,
}

impl SocketType {
    /// Stream-like sockets run the `send`/`recv`/`connect`/`accept`
    /// flavor; everything else runs `sendto`/`recvfrom` (spec.md §4.B).
    pub fn is_stream_like(self) -> bool {
        matches!(self, SocketType::Stream | SocketType::SeqPacket)
    }
}

/// `protocol_type` from spec.md §3. Left coarse since protocol-number
/// translation is an out-of-scope OS boundary concern.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProtocolType {
    Tcp,
    Udp,
    Raw(i32),
}

bitflags::bitflags! {
    /// Socket-construction flags (spec.md §3: "notable flag: `passive`").
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct SocketFlags: u32 {
        /// Socket should bind/listen rather than connect outward.
        const PASSIVE = 0b0000_0001;
        /// Allow address reuse before bind (upper-layer convenience, not
        /// named in spec.md but harmless ambient behavior for listeners).
        const REUSE_ADDR = 0b0000_0010;
    }
}

/// Construction-time description of a socket (spec.md §3).
#[derive(Clone, Debug)]
pub struct SocketProperties {
    pub family: Family,
    pub socket_type: SocketType,
    pub protocol_type: ProtocolType,
    pub address: AddressSpec,
    pub flags: SocketFlags,
}

impl SocketProperties {
    pub fn is_passive(&self) -> bool {
        self.flags.contains(SocketFlags::PASSIVE)
    }

    /// The operation flavor table from spec.md §4.B.
    pub fn flavor(&self) -> OperationFlavor {
        if self.socket_type.is_stream_like() {
            if self.is_passive() {
                OperationFlavor::Listener
            } else {
                OperationFlavor::StreamActive
            }
        } else {
            OperationFlavor::Datagram
        }
    }
}

/// Which begin/complete pair an `AsyncOp` runs, fixed at construction and
/// never changed afterwards (spec.md §9 design note), except for the
/// close-shim and shutdown-silence in-place swaps.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperationFlavor {
    Datagram,
    Listener,
    StreamActive,
}
