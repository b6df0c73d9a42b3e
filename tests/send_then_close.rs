mod support;

use std::net::Ipv4Addr;
use std::time::Duration;

use edge_socket_engine::properties::{Family, ProtocolType, SocketFlags, SocketProperties, SocketType};
use edge_socket_engine::{Engine, EngineConfig};
use support::{init, pump_until, ScriptedClient};

fn listener_properties() -> SocketProperties {
    SocketProperties {
        family: Family::Inet4,
        socket_type: SocketType::Stream,
        protocol_type: ProtocolType::Tcp,
        address: edge_socket_engine::AddressSpec::inet4(Ipv4Addr::UNSPECIFIED, 0),
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

/// spec.md §8 scenario 4 ("send-then-close race"): a send is posted,
/// then the socket is closed before the caller knows whether it
/// landed. `end_send` must still fire (ok or aborted), and `closed`
/// must fire strictly after it.
#[test]
fn close_after_send_still_settles_in_order() {
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
    let listen_addr = engine.get_local(listener).unwrap().unwrap();

    let (client_client, client_record) = ScriptedClient::new(active_properties(listen_addr));
    let client_client = client_client.with_send(&[7u8; 100]);
    let client = engine.create(Box::new(client_client));
    engine.open(client, None).expect("open client");
    assert!(pump_until(
        &engine,
        || client_record.lock().unwrap().opened.is_some(),
        Duration::from_secs(2)
    ));

    engine.can_send(client, true).expect("can_send");
    // Race the close against the in-flight send exactly as spec.md §8
    // scenario 4 describes.
    engine.close(client, None).expect("close");

    assert!(pump_until(
        &engine,
        || client_record.lock().unwrap().closed,
        Duration::from_secs(2)
    ));

    let record = client_record.lock().unwrap();
    assert_eq!(record.sent.len(), 1, "end_send must fire exactly once");
    assert!(record.closed, "closed must fire after end_send");
}
