//! Segment hand-off between the producer and consumer threads.
//!
//! The [`CommandQueue`] is the single synchronization point in the stream:
//! filled [`RingBuffer`]s move producer → consumer through the ready list,
//! and reset buffers move back through the free list. The mutex acquire and
//! release around each transfer is the memory-visibility boundary the
//! protocol relies on: after a buffer is submitted, the producer no longer
//! holds it and cannot touch its bytes until the consumer recycles it.
//!
//! The number of submitted-but-not-yet-recycled segments is bounded by
//! `max_in_flight`; a producer that outruns the consumer blocks in
//! [`acquire`](CommandQueue::acquire) until a segment retires. The same
//! pending count drives teardown: shared state stays alive (via `Arc`) and
//! [`wait_idle`](CommandQueue::wait_idle) blocks until every handed-off
//! segment has finished executing.

use std::{collections::VecDeque, sync::Arc};

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::ring_buffer::RingBuffer;

struct QueueState {
    ready: VecDeque<RingBuffer>,
    free: Vec<RingBuffer>,
    /// Segments submitted and not yet recycled.
    pending: usize,
    exit_requested: bool,
}

/// Thread-safe exchange of command buffers between exactly one producer and
/// exactly one consumer.
pub struct CommandQueue {
    state: Mutex<QueueState>,
    /// Signaled when a segment lands on the ready list or exit is requested.
    segment_ready: Condvar,
    /// Signaled when a buffer is recycled (space for the producer, idleness
    /// for teardown).
    buffer_released: Condvar,
    max_in_flight: usize,
}

impl CommandQueue {
    /// Creates a queue allowing at most `max_in_flight` handed-off segments
    /// at a time.
    ///
    /// # Panics
    ///
    /// Panics if `max_in_flight` is zero; the producer could never hand
    /// anything off.
    pub fn new(max_in_flight: usize) -> Arc<Self> {
        assert!(max_in_flight > 0, "max_in_flight must be at least 1");
        Arc::new(Self {
            state: Mutex::new(QueueState {
                ready: VecDeque::new(),
                free: Vec::new(),
                pending: 0,
                exit_requested: false,
            }),
            segment_ready: Condvar::new(),
            buffer_released: Condvar::new(),
            max_in_flight,
        })
    }

    /// Hands a filled segment to the consumer.
    pub(crate) fn submit(&self, buffer: RingBuffer) {
        let mut state = self.state.lock();
        debug_assert!(state.pending < self.max_in_flight);
        trace!(bytes = buffer.used(), "segment submitted");
        state.ready.push_back(buffer);
        state.pending += 1;
        drop(state);
        self.segment_ready.notify_one();
    }

    /// Returns a recycled buffer for the producer to record into, or `None`
    /// if none is free but the in-flight bound still allows creating a fresh
    /// one. Blocks while the bound is saturated (back-pressure).
    pub(crate) fn acquire(&self) -> Option<RingBuffer> {
        let mut state = self.state.lock();
        loop {
            if let Some(buffer) = state.free.pop() {
                return Some(buffer);
            }
            if state.pending < self.max_in_flight {
                return None;
            }
            self.buffer_released.wait(&mut state);
        }
    }

    /// Blocks the consumer until a segment is ready. Returns `None` once exit
    /// has been requested and the ready list is drained.
    pub(crate) fn wait_for_segment(&self) -> Option<RingBuffer> {
        let mut state = self.state.lock();
        loop {
            if let Some(buffer) = state.ready.pop_front() {
                return Some(buffer);
            }
            if state.exit_requested {
                return None;
            }
            self.segment_ready.wait(&mut state);
        }
    }

    /// Returns an executed segment's buffer to the free list, reset and safe
    /// to reuse.
    pub(crate) fn recycle(&self, mut buffer: RingBuffer) {
        buffer.reset();
        let mut state = self.state.lock();
        state.pending -= 1;
        state.free.push(buffer);
        drop(state);
        self.buffer_released.notify_all();
    }

    /// Asks the consumer loop to exit after draining the ready list. Already
    /// handed-off segments still run to completion; there is no mid-segment
    /// cancellation.
    pub(crate) fn request_exit(&self) {
        let mut state = self.state.lock();
        state.exit_requested = true;
        drop(state);
        self.segment_ready.notify_all();
    }

    /// Blocks until every handed-off segment has been executed and recycled.
    pub(crate) fn wait_idle(&self) {
        let mut state = self.state.lock();
        while state.pending > 0 {
            self.buffer_released.wait(&mut state);
        }
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.state.lock().pending
    }
}
