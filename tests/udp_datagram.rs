mod support;

use std::net::Ipv4Addr;
use std::time::Duration;

use edge_socket_engine::properties::{Family, ProtocolType, SocketFlags, SocketProperties, SocketType};
use edge_socket_engine::{Engine, EngineConfig};
use support::{init, pump_until, ScriptedClient};

fn dgram_properties() -> SocketProperties {
    SocketProperties {
        family: Family::Inet4,
        socket_type: SocketType::Dgram,
        protocol_type: ProtocolType::Udp,
        address: edge_socket_engine::AddressSpec::inet4(Ipv4Addr::LOCALHOST, 0),
        flags: SocketFlags::empty(),
    }
}

/// Two datagram sockets exchange one packet: this exercises the
/// `sendto`/`recvfrom` flavor row of spec.md §4.B's table end to end.
#[test]
fn datagram_round_trip() {
    init();
    let engine = Engine::new(EngineConfig::default()).expect("engine");

    let (server_client, server_record) = ScriptedClient::new(dgram_properties());
    let server_client = server_client.with_recv_budget(1);
    let server = engine.create(Box::new(server_client));
    engine.open(server, None).expect("open server");
    assert!(pump_until(
        &engine,
        || server_record.lock().unwrap().opened.is_some(),
        Duration::from_secs(2)
    ));
    let server_addr = engine.get_local(server).unwrap().expect("server bound");
    engine.can_recv(server, true).expect("can_recv");

    let (mut client_client, client_record) = ScriptedClient::new(dgram_properties());
    client_client.outgoing_addr = Some(server_addr);
    let client_client = client_client.with_send(b"ping");
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
        || !server_record.lock().unwrap().received.is_empty(),
        Duration::from_secs(2)
    ));
    let received = server_record.lock().unwrap().received.remove(0);
    let (payload, from) = received.expect("recvfrom should succeed");
    assert_eq!(payload, b"ping");
    assert!(from.is_some());

    assert!(pump_until(
        &engine,
        || !client_record.lock().unwrap().sent.is_empty(),
        Duration::from_secs(2)
    ));
    assert_eq!(client_record.lock().unwrap().sent[0].as_ref().unwrap(), &4usize);
}
