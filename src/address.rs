//! `AddressSpec` (spec.md §3) and translation helpers.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Tagged variant over the three ways an endpoint can be named.
///
/// The `ProxyByName` variant carries a host string and a port, resolved by
/// a [`crate::resolver::AddressResolver`] (spec.md §3, §4.C case 1).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddressSpec {
    Inet4(SocketAddr),
    Inet6(SocketAddr),
    ProxyByName { host: String, port: u16 },
}

impl AddressSpec {
    pub fn inet4(addr: Ipv4Addr, port: u16) -> Self {
        AddressSpec::Inet4(SocketAddr::new(IpAddr::V4(addr), port))
    }

    pub fn inet6(addr: Ipv6Addr, port: u16) -> Self {
        AddressSpec::Inet6(SocketAddr::new(IpAddr::V6(addr), port))
    }

    pub fn by_name(host: impl Into<String>, port: u16) -> Self {
        AddressSpec::ProxyByName {
            host: host.into(),
            port,
        }
    }

    /// True for the two concrete variants (spec.md §4.C "Case 2").
    pub fn is_concrete(&self) -> bool {
        !matches!(self, AddressSpec::ProxyByName { .. })
    }

    /// The concrete socket address, if this is not a by-name spec.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            AddressSpec::Inet4(a) | AddressSpec::Inet6(a) => Some(*a),
            AddressSpec::ProxyByName { .. } => None,
        }
    }
}

impl fmt::Display for AddressSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressSpec::Inet4(a) | AddressSpec::Inet6(a) => write!(f, "{a}"),
            AddressSpec::ProxyByName { host, port } => write!(f, "{host}:{port}"),
        }
    }
}

impl From<SocketAddr> for AddressSpec {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(_) => AddressSpec::Inet4(addr),
            SocketAddr::V6(_) => AddressSpec::Inet6(addr),
        }
    }
}
