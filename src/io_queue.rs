//! The tri-state I/O buffer queue (spec.md §4.D): `ready` → `in-progress`
//! → `done`, plus rollback and abort.
//!
//! The spec models each list as an intrusive doubly-linked list of
//! `IoBuffer` nodes so a buffer can be spliced out from wherever it sits.
//! Rust's ownership rules make an intrusive pointer list the wrong tool
//! here (DESIGN.md records this as a deliberate Open Question
//! resolution): instead, each list is a `VecDeque<IoBuffer>` holding
//! buffers by value, and "remove from current list, insert at tail of
//! target" is expressed as *the caller already has it detached* (from
//! `create_buffer` or a `pop_*` call) and moves it by calling the
//! corresponding `set_*`. This preserves every invariant and every
//! round-trip law in spec.md §8 without unsafe pointer-chasing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::BytesMut;

use crate::buffer_factory::BufferFactory;
use crate::error::EngineError;

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Callback invoked once, by `abort` or by `release` on a still-attached
/// buffer, with the reason the operation is being severed. Nulled out
/// (taken) after it fires so it is one-shot even if both `abort` and
/// `release` are called on it (spec.md §9 "Abort vs release").
pub type AbortCallback = Box<dyn FnOnce(EngineError) + Send>;

/// A single payload-carrying node of an `IoQueue` (spec.md §3, §4.D).
pub struct IoBuffer {
    id: u64,
    payload: BytesMut,
    read_offset: usize,
    write_offset: usize,
    /// Outcome of whatever operation produced or is consuming this
    /// buffer; `None` until set by the caller.
    pub result: Option<Result<usize, EngineError>>,
    abort_callback: Option<AbortCallback>,
}

impl IoBuffer {
    fn from_payload(payload: BytesMut) -> Self {
        IoBuffer {
            id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            payload,
            read_offset: 0,
            write_offset: 0,
            result: None,
            abort_callback: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The fixed capacity of the payload region (spec.md's `length`).
    pub fn length(&self) -> usize {
        self.payload.len()
    }

    pub fn read_offset(&self) -> usize {
        self.read_offset
    }

    pub fn write_offset(&self) -> usize {
        self.write_offset
    }

    /// The unread tail of the payload, `[read_offset, write_offset)`.
    pub fn unread(&self) -> &[u8] {
        &self.payload[self.read_offset..self.write_offset]
    }

    /// Attach a one-shot callback to run if this buffer is aborted, or
    /// released while still carrying one.
    pub fn set_abort_callback(&mut self, cb: AbortCallback) {
        self.abort_callback = Some(cb);
    }

    /// Append `data` starting at `write_offset`, clamped to `length`.
    /// Returns the number of bytes actually written. Never errors — a
    /// short write is the spec's documented boundary behavior (spec.md
    /// §8: "write past capacity copies only what fits").
    pub fn write(&mut self, data: &[u8]) -> usize {
        let capacity = self.payload.len();
        let available = capacity.saturating_sub(self.write_offset);
        let n = data.len().min(available);
        self.payload[self.write_offset..self.write_offset + n].copy_from_slice(&data[..n]);
        self.write_offset += n;
        n
    }

    /// Copy up to `out.len()` unread bytes into `out`, advancing
    /// `read_offset`. Returns the number of bytes actually copied.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let available = self.write_offset.saturating_sub(self.read_offset);
        let n = out.len().min(available);
        out[..n].copy_from_slice(&self.payload[self.read_offset..self.read_offset + n]);
        self.read_offset += n;
        n
    }

    fn fire_abort(&mut self, reason: EngineError) {
        if let Some(cb) = self.abort_callback.take() {
            cb(reason);
        }
    }
}

#[derive(Default)]
struct Lists {
    ready: VecDeque<IoBuffer>,
    in_progress: VecDeque<IoBuffer>,
    done: VecDeque<IoBuffer>,
}

/// Thread-safe tri-state buffer queue (spec.md §4.D).
///
/// Every list transition happens under a single lock (spec.md §5); there
/// is no reentrant acquisition anywhere in this module.
pub struct IoQueue {
    lists: Mutex<Lists>,
    factory: Arc<dyn BufferFactory>,
}

impl IoQueue {
    pub fn new(factory: Arc<dyn BufferFactory>) -> Self {
        IoQueue {
            lists: Mutex::new(Lists::default()),
            factory,
        }
    }

    /// Allocate a new, detached buffer of `len` bytes and write the
    /// optional initial payload into it (spec.md §4.D "Create buffer").
    pub fn create_buffer(&self, payload: Option<&[u8]>, len: usize) -> IoBuffer {
        let acquired = self.factory.acquire(len);
        let mut buf = IoBuffer::from_payload(acquired);
        if let Some(data) = payload {
            buf.write(data);
        }
        buf
    }

    pub fn set_ready(&self, buffer: IoBuffer) {
        self.lists.lock().unwrap().ready.push_back(buffer);
    }

    pub fn set_inprogress(&self, buffer: IoBuffer) {
        self.lists.lock().unwrap().in_progress.push_back(buffer);
    }

    pub fn set_done(&self, buffer: IoBuffer) {
        self.lists.lock().unwrap().done.push_back(buffer);
    }

    pub fn pop_ready(&self) -> Option<IoBuffer> {
        self.lists.lock().unwrap().ready.pop_front()
    }

    pub fn pop_inprogress(&self) -> Option<IoBuffer> {
        self.lists.lock().unwrap().in_progress.pop_front()
    }

    pub fn pop_done(&self) -> Option<IoBuffer> {
        self.lists.lock().unwrap().done.pop_front()
    }

    pub fn peek_ready(&self) -> bool {
        !self.lists.lock().unwrap().ready.is_empty()
    }

    pub fn peek_inprogress(&self) -> bool {
        !self.lists.lock().unwrap().in_progress.is_empty()
    }

    pub fn peek_done(&self) -> bool {
        !self.lists.lock().unwrap().done.is_empty()
    }

    pub fn len_ready(&self) -> usize {
        self.lists.lock().unwrap().ready.len()
    }

    pub fn len_inprogress(&self) -> usize {
        self.lists.lock().unwrap().in_progress.len()
    }

    pub fn len_done(&self) -> usize {
        self.lists.lock().unwrap().done.len()
    }

    /// Detach a buffer (from the caller's hand, already popped), run its
    /// abort callback if still attached, and return its payload memory to
    /// the factory. Atomic with respect to the queue lock only in the
    /// sense that the factory return happens outside it — the buffer is
    /// already detached by the time `release` is called, so there is
    /// nothing left for the lock to protect (spec.md §4.D "Release
    /// buffer").
    pub fn release(&self, mut buffer: IoBuffer) {
        buffer.fire_abort(EngineError::Aborted);
        self.factory.release(buffer.payload);
    }

    /// Drain and release every buffer in all three lists. Used when the
    /// owning socket is torn down (spec.md §4.D lifecycle: "destroyed by
    /// `release` ... or by `release_all`").
    pub fn release_all(&self) {
        let mut lists = self.lists.lock().unwrap();
        for mut buf in lists
            .ready
            .drain(..)
            .chain(lists.in_progress.drain(..))
            .chain(lists.done.drain(..))
            .collect::<Vec<_>>()
        {
            buf.fire_abort(EngineError::Aborted);
            self.factory.release(buf.payload);
        }
    }

    /// Move every node from `in_progress` to the *head* of `ready`,
    /// preserving relative order, leaving `in_progress` empty (spec.md
    /// §4.D "Rollback"). Used when a batch of operations sent to an
    /// external worker needs to be retried as a unit.
    pub fn rollback(&self) {
        let mut lists = self.lists.lock().unwrap();
        if lists.in_progress.is_empty() {
            return;
        }
        let mut merged: VecDeque<IoBuffer> = std::mem::take(&mut lists.in_progress);
        merged.append(&mut lists.ready);
        lists.ready = merged;
    }

    /// Visit every node in all three lists in place and invoke its
    /// attached abort callback (if any) with `Aborted`. Nodes remain in
    /// their lists — this only severs the callback, it does not free
    /// memory (spec.md §4.D "Abort").
    pub fn abort(&self) {
        let mut lists = self.lists.lock().unwrap();
        for buf in lists
            .ready
            .iter_mut()
            .chain(lists.in_progress.iter_mut())
            .chain(lists.done.iter_mut())
        {
            buf.fire_abort(EngineError::Aborted);
        }
    }
}
