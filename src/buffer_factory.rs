//! Pooled buffer allocator (spec.md §3 "buffer factory", explicitly an
//! out-of-scope collaborator whose *contract* — acquire/release pooled
//! fixed-size allocations — this crate still needs a default for).
//!
//! Generalized from the teacher's own `sys::windows::buffer_pool::BufferPool`:
//! a free list of reusable buffers, guarded by a mutex, with `get`/`put`
//! renamed to the spec's `acquire`/`release` vocabulary.

use bytes::BytesMut;
use std::sync::Mutex;

/// Pooled allocator contract assumed by `IoQueue` (spec.md §3).
///
/// Implementations must be internally thread-safe (spec.md §5: "The
/// buffer factory is assumed internally thread-safe").
pub trait BufferFactory: Send + Sync {
    /// Returns a zeroed buffer of exactly `len` bytes.
    fn acquire(&self, len: usize) -> BytesMut;

    /// Returns a buffer to the pool for reuse.
    fn release(&self, buf: BytesMut);
}

/// Default pooled factory: a capacity-bounded free list, reused verbatim
/// from the teacher's `BufferPool::get`/`put` logic.
pub struct PooledBufferFactory {
    pool: Mutex<Vec<BytesMut>>,
    capacity: usize,
}

impl PooledBufferFactory {
    pub fn new(capacity: usize) -> Self {
        PooledBufferFactory {
            pool: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }
}

impl Default for PooledBufferFactory {
    fn default() -> Self {
        Self::new(256)
    }
}

impl BufferFactory for PooledBufferFactory {
    fn acquire(&self, len: usize) -> BytesMut {
        let mut pool = self.pool.lock().unwrap();
        let mut buf = match pool.pop() {
            Some(buf) => buf,
            None => BytesMut::with_capacity(len),
        };
        buf.clear();
        buf.resize(len, 0);
        buf
    }

    fn release(&self, mut buf: BytesMut) {
        let mut pool = self.pool.lock().unwrap();
        if pool.len() < self.capacity {
            buf.clear();
            pool.push(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquired_buffer_is_zeroed_and_exact_length() {
        let factory = PooledBufferFactory::new(4);
        let buf = factory.acquire(16);
        assert_eq!(buf.len(), 16);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn released_buffer_is_reused() {
        let factory = PooledBufferFactory::new(4);
        let buf = factory.acquire(8);
        let ptr = buf.as_ptr();
        factory.release(buf);
        let buf2 = factory.acquire(8);
        // Not a guaranteed property of every allocator, but true of this
        // one: the freed allocation comes back out of the pool.
        assert_eq!(buf2.as_ptr(), ptr);
    }

    #[test]
    fn pool_does_not_grow_past_capacity() {
        let factory = PooledBufferFactory::new(1);
        factory.release(BytesMut::with_capacity(8));
        factory.release(BytesMut::with_capacity(8));
        assert_eq!(factory.pool.lock().unwrap().len(), 1);
    }
}
