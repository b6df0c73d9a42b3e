mod support;

use std::net::Ipv4Addr;
use std::time::Duration;

use edge_socket_engine::properties::{Family, ProtocolType, SocketFlags, SocketProperties, SocketType};
use edge_socket_engine::sockopt::{SockOpt, SockOptValue};
use edge_socket_engine::{AddressSpec, Engine, EngineConfig};
use support::{init, pump_until, ScriptedClient};

fn listener_properties() -> SocketProperties {
    SocketProperties {
        family: Family::Inet4,
        socket_type: SocketType::Stream,
        protocol_type: ProtocolType::Tcp,
        address: AddressSpec::inet4(Ipv4Addr::UNSPECIFIED, 0),
        flags: SocketFlags::PASSIVE,
    }
}

fn active_properties(addr: std::net::SocketAddr) -> SocketProperties {
    SocketProperties {
        family: Family::Inet4,
        socket_type: SocketType::Stream,
        protocol_type: ProtocolType::Tcp,
        address: addr.into(),
        flags: SocketFlags::empty(),
    }
}

/// spec.md §4.B's `available` sockopt must report the real pending byte
/// count. A client sends a payload and the accepted peer never issues a
/// `recv` (its `ScriptedClient` has no recv budget), so the bytes stay
/// queued in the kernel's receive buffer where `available` can see them.
#[test]
fn available_reports_pending_bytes_without_reading_them() {
    init();
    let engine = Engine::new(EngineConfig::default()).expect("engine");

    let (listener_client, listener_record) = ScriptedClient::new(listener_properties());
    let listener_client = listener_client.with_accept_budget(1);
    let listener = engine.create(Box::new(listener_client));
    engine.open(listener, None).expect("open listener");
    assert!(pump_until(
        &engine,
        || listener_record.lock().unwrap().opened.is_some(),
        Duration::from_secs(2)
    ));
    engine.can_recv(listener, true).expect("can_recv");
    let listen_addr = engine.get_local(listener).unwrap().expect("bound address");

    let payload = b"hello from the other side";
    let (client_client, client_record) = ScriptedClient::new(active_properties(listen_addr));
    let client_client = client_client.with_send(payload);
    let client = engine.create(Box::new(client_client));
    engine.open(client, None).expect("open client");
    assert!(pump_until(
        &engine,
        || client_record.lock().unwrap().opened.is_some(),
        Duration::from_secs(2)
    ));
    engine.can_send(client, true).expect("can_send");

    assert!(pump_until(
        &engine,
        || !listener_record.lock().unwrap().accepted.is_empty(),
        Duration::from_secs(2)
    ));
    let accepted = listener_record.lock().unwrap().accepted.remove(0).expect("accept ok");

    assert!(pump_until(
        &engine,
        || !client_record.lock().unwrap().sent.is_empty(),
        Duration::from_secs(2)
    ));

    // Give the bytes a moment to land in the accepted socket's kernel
    // buffer; nothing in this process ever calls `can_recv`/`recv` on it.
    assert!(pump_until(
        &engine,
        || matches!(
            engine.get_sockopt(accepted, SockOpt::Available),
            Ok(SockOptValue::Available(n)) if n >= payload.len()
        ),
        Duration::from_secs(2)
    ));

    let available = engine.get_sockopt(accepted, SockOpt::Available).expect("available");
    assert_eq!(available, SockOptValue::Available(payload.len()));
}
