mod support;

use std::net::Ipv4Addr;
use std::time::Duration;

use edge_socket_engine::properties::{Family, ProtocolType, SocketFlags, SocketProperties, SocketType};
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

/// spec.md §8 scenario 1 ("listener accept flow") composed with
/// scenario 2 ("stream connect success, direct address"): a listener
/// binds synchronously, a client connects to it, and the accept
/// completes with the new socket's addresses populated.
#[test]
fn listener_accepts_an_incoming_connection() {
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
    assert!(listener_record.lock().unwrap().opened.as_ref().unwrap().is_ok());

    engine.can_recv(listener, true).expect("can_recv");

    let listen_addr = engine.get_local(listener).unwrap().expect("bound address");

    let (client_client, client_record) = ScriptedClient::new(active_properties(listen_addr));
    let client = engine.create(Box::new(client_client));
    engine.open(client, None).expect("open client");

    assert!(pump_until(
        &engine,
        || client_record.lock().unwrap().opened.is_some(),
        Duration::from_secs(2)
    ));
    assert!(client_record.lock().unwrap().opened.as_ref().unwrap().is_ok());
    assert!(engine.get_peer(client).unwrap().is_some());

    assert!(pump_until(
        &engine,
        || !listener_record.lock().unwrap().accepted.is_empty(),
        Duration::from_secs(2)
    ));
    let accepted = listener_record.lock().unwrap().accepted.remove(0);
    assert!(accepted.is_ok(), "accept should have succeeded: {accepted:?}");
}

/// spec.md §8 scenario 3: every candidate address refuses the connect,
/// and the cascade reports `connecting` after trying each exactly once.
#[test]
fn cascade_exhausts_refused_addresses() {
    init();
    let engine = Engine::new(EngineConfig::default()).expect("engine");

    // Nothing is listening on these loopback ports; each connect should
    // fail (refused or time out quickly enough for the test).
    let candidate = std::net::SocketAddr::from((Ipv4Addr::LOCALHOST, 1));
    let (client, record) = ScriptedClient::new(active_properties(candidate));
    let handle = engine.create(Box::new(client));
    engine.open(handle, None).expect("open");

    let settled = pump_until(
        &engine,
        || record.lock().unwrap().opened.is_some(),
        Duration::from_secs(5),
    );
    assert!(settled, "open should settle even though every address fails");
    let opened_ok = matches!(record.lock().unwrap().opened, Some(Ok(())));
    assert!(!opened_ok, "expected the cascade to exhaust every candidate");
}
