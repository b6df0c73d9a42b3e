// Not all functions are used by every test binary.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};

use edge_socket_engine::client::{
    AcceptRequest, ClientInterface, OpCtx, RecvOutcome, RecvRequest, SendRequest, SocketHandle,
};
use edge_socket_engine::error::EngineResult;
use edge_socket_engine::properties::SocketProperties;
use edge_socket_engine::Engine;

pub fn init() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Spins the reactor until `done` returns true or the deadline passes.
/// Returns whether `done` became true.
pub fn pump_until(engine: &Engine, mut done: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if done() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        let _ = engine.turn(Some(Duration::from_millis(20)));
    }
}

#[derive(Default)]
pub struct Record {
    pub opened: Option<EngineResult<()>>,
    pub closed: bool,
    pub accepted: Vec<EngineResult<SocketHandle>>,
    pub sent: Vec<EngineResult<usize>>,
    pub received: Vec<EngineResult<(Vec<u8>, Option<std::net::SocketAddr>)>>,
}

/// A `ClientInterface` whose begin/end events are recorded and whose
/// outgoing buffers are supplied from small queues the test fills in
/// up front. Good enough for the scripted scenarios in spec.md §8;
/// real clients would stream buffers from an upper-layer queue
/// instead.
pub struct ScriptedClient {
    pub properties: SocketProperties,
    pub record: Arc<Mutex<Record>>,
    pub outgoing: Vec<Bytes>,
    pub outgoing_addr: Option<std::net::SocketAddr>,
    pub recv_len: usize,
    pub recv_budget: usize,
    pub accept_budget: usize,
}

impl ScriptedClient {
    pub fn new(properties: SocketProperties) -> (Self, Arc<Mutex<Record>>) {
        let record = Arc::new(Mutex::new(Record::default()));
        (
            ScriptedClient {
                properties,
                record: record.clone(),
                outgoing: Vec::new(),
                outgoing_addr: None,
                recv_len: 4096,
                recv_budget: 0,
                accept_budget: 0,
            },
            record,
        )
    }

    pub fn with_send(mut self, data: &[u8]) -> Self {
        self.outgoing.push(Bytes::copy_from_slice(data));
        self
    }

    pub fn with_recv_budget(mut self, n: usize) -> Self {
        self.recv_budget = n;
        self
    }

    pub fn with_accept_budget(mut self, n: usize) -> Self {
        self.accept_budget = n;
        self
    }
}

impl ClientInterface for ScriptedClient {
    fn opened(&mut self, status: EngineResult<()>) {
        self.record.lock().unwrap().opened = Some(status);
    }

    fn closed(&mut self) {
        self.record.lock().unwrap().closed = true;
    }

    fn begin_accept(&mut self) -> Option<AcceptRequest> {
        if self.accept_budget == 0 {
            return None;
        }
        self.accept_budget -= 1;
        let (client, record) = ScriptedClient::new(self.properties.clone());
        drop(record); // the test only reads the listener's own record
        Some(AcceptRequest {
            client: Box::new(client),
            op_ctx: None,
        })
    }

    fn end_accept(&mut self, _op_ctx: OpCtx, result: EngineResult<SocketHandle>) {
        self.record.lock().unwrap().accepted.push(result);
    }

    fn begin_send(&mut self) -> Option<SendRequest> {
        let buffer = self.outgoing.pop()?;
        Some(SendRequest {
            buffer,
            addr: self.outgoing_addr,
            op_ctx: None,
        })
    }

    fn end_send(&mut self, _op_ctx: OpCtx, result: EngineResult<usize>) {
        self.record.lock().unwrap().sent.push(result);
    }

    fn begin_recv(&mut self) -> Option<RecvRequest> {
        if self.recv_budget == 0 {
            return None;
        }
        self.recv_budget -= 1;
        Some(RecvRequest {
            buffer: BytesMut::zeroed(self.recv_len),
            op_ctx: None,
        })
    }

    fn end_recv(&mut self, _op_ctx: OpCtx, result: EngineResult<RecvOutcome>) {
        let mapped = result.map(|outcome| (outcome.buffer.to_vec(), outcome.addr));
        self.record.lock().unwrap().received.push(mapped);
    }

    fn properties(&self) -> &SocketProperties {
        &self.properties
    }

    fn set_properties(&mut self, properties: SocketProperties) {
        self.properties = properties;
    }
}
