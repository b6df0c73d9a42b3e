//! Address resolution (spec.md §4.C case 1, §6 "Address resolver").
//!
//! The spec treats `resolve(host, port, family, flags) -> list` as an
//! external collaborator reached only through its contract. This crate
//! supplies one concrete implementation over `std::net::ToSocketAddrs`
//! and keeps the connect cascade generic over this trait (via
//! [`crate::engine::Engine::with_resolver`]) so the upper message layer
//! can substitute its own (DNS caching and mDNS-style discovery are both
//! out of scope here).

use std::net::{SocketAddr, ToSocketAddrs};

use crate::error::{EngineError, EngineResult};
use crate::properties::Family;

/// External collaborator resolving a host/port pair to a list of
/// candidate addresses (spec.md §6).
pub trait AddressResolver: Send + Sync {
    /// Resolve `host:port`. `passive` is forwarded from the socket's
    /// `passive` flag (spec.md §4.C: "passive flag forwarded if the
    /// socket is passive") so a resolver may prefer wildcard or
    /// any-interface results for a listener.
    fn resolve(
        &self,
        host: &str,
        port: u16,
        family: Option<Family>,
        passive: bool,
    ) -> EngineResult<Vec<SocketAddr>>;
}

/// Default resolver: synchronous, blocking, built on the standard
/// library's own resolution machinery. No caching (spec.md §1 Non-goals
/// exclude DNS caching).
#[derive(Default, Debug, Clone, Copy)]
pub struct StdResolver;

impl AddressResolver for StdResolver {
    fn resolve(
        &self,
        host: &str,
        port: u16,
        family: Option<Family>,
        _passive: bool,
    ) -> EngineResult<Vec<SocketAddr>> {
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(EngineError::Net)?
            .filter(|addr| match family {
                None => true,
                Some(Family::Inet4) => addr.is_ipv4(),
                Some(Family::Inet6) => addr.is_ipv6(),
            })
            .collect::<Vec<_>>();
        Ok(addrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_loopback_by_literal_ip() {
        let resolver = StdResolver;
        let addrs = resolver.resolve("127.0.0.1", 9, None, false).unwrap();
        assert!(addrs.iter().all(|a| a.is_ipv4()));
        assert!(!addrs.is_empty());
    }

    #[test]
    fn family_filter_excludes_the_other_family() {
        let resolver = StdResolver;
        let addrs = resolver
            .resolve("127.0.0.1", 9, Some(Family::Inet6), false)
            .unwrap();
        assert!(addrs.is_empty());
    }
}
