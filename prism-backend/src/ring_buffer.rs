//! Growable byte arena that command records are serialized into.
//!
//! A [`RingBuffer`] is the backing storage for one segment of the command
//! stream at a time: the producer serializes records into it, hands the whole
//! buffer to the consumer, and receives a recycled buffer back once the
//! segment has been replayed and [`reset`](RingBuffer::reset). All record
//! positions are byte offsets relative to the segment start, never
//! addresses, so growth may relocate the backing store without invalidating
//! offsets that were issued before the reallocation.
//!
//! The buffer also carries the deferred-action table for the segment's custom
//! commands, so a hand-off moves everything a segment needs across the thread
//! boundary in one value.

use bytemuck::Pod;

/// Every record starts on this boundary; allocation sizes are rounded up to
/// it so the cursor stays aligned.
pub(crate) const RECORD_ALIGN: usize = 8;

/// A zero-argument unit of work captured by a custom command.
pub type DeferredAction = Box<dyn FnOnce() + Send>;

pub(crate) fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Contiguous byte arena with a write cursor, amortized doubling growth, and
/// an optional hard capacity cap.
pub struct RingBuffer {
    storage: Box<[u8]>,
    head: usize,
    hard_cap: Option<usize>,
    actions: Vec<Option<DeferredAction>>,
}

impl RingBuffer {
    /// Creates a buffer with `initial` bytes of capacity (rounded up to the
    /// record alignment) and an optional hard cap on growth.
    ///
    /// # Panics
    ///
    /// Panics if `hard_cap` is smaller than the initial capacity; that is a
    /// configuration error, not something to limp along with.
    pub fn with_capacity(initial: usize, hard_cap: Option<usize>) -> Self {
        let capacity = align_up(initial.max(RECORD_ALIGN), RECORD_ALIGN);
        if let Some(cap) = hard_cap
            && cap < capacity
        {
            panic!("command arena hard cap ({cap} bytes) is below the initial capacity ({capacity} bytes)");
        }
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            hard_cap,
            actions: Vec::new(),
        }
    }

    /// Byte length of the open segment (the end offset the executor walks to).
    pub fn used(&self) -> usize {
        self.head
    }

    /// Current capacity of the backing region.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Rewinds the write cursor to the segment start and drops any deferred
    /// actions that were never taken.
    ///
    /// The caller must guarantee no executor is mid-traversal; in practice the
    /// consumer resets a buffer it holds by value, so the type system enforces
    /// this.
    pub fn reset(&mut self) {
        self.head = 0;
        self.actions.clear();
    }

    /// Reserves `size` bytes at the cursor and returns the segment-relative
    /// offset of the reserved slot. `size` must already be a multiple of
    /// [`RECORD_ALIGN`] so the cursor stays record-aligned.
    ///
    /// # Panics
    ///
    /// Panics if growth past the configured hard cap would be required.
    pub(crate) fn allocate(&mut self, size: usize) -> usize {
        debug_assert_eq!(size % RECORD_ALIGN, 0, "allocation size must be record-aligned");
        let offset = self.head;
        let end = offset + size;
        if end > self.storage.len() {
            self.grow(end);
        }
        self.head = end;
        offset
    }

    /// Copies `bytes` into the arena at `offset`. The range must have been
    /// reserved by a prior [`allocate`](Self::allocate).
    pub(crate) fn write(&mut self, offset: usize, bytes: &[u8]) {
        debug_assert!(offset + bytes.len() <= self.head);
        self.storage[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Reads a [`Pod`] value back out of the arena at `offset`.
    pub(crate) fn read_pod<T: Pod>(&self, offset: usize) -> T {
        bytemuck::pod_read_unaligned(&self.storage[offset..offset + size_of::<T>()])
    }

    /// Borrows `len` raw bytes at `offset` (inline record payloads).
    pub(crate) fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.storage[offset..offset + len]
    }

    /// Stores a deferred action and returns its slot index for the record
    /// that will take it at execution time.
    pub(crate) fn push_action(&mut self, action: DeferredAction) -> u32 {
        self.actions.push(Some(action));
        (self.actions.len() - 1) as u32
    }

    /// Takes the action out of `slot`, leaving the slot empty so a double
    /// execution shows up as a hard error at the call site.
    pub(crate) fn take_action(&mut self, slot: u32) -> Option<DeferredAction> {
        self.actions.get_mut(slot as usize).and_then(Option::take)
    }

    fn grow(&mut self, required: usize) {
        let current = self.storage.len();
        let mut target = current * 2;
        while target < required {
            target *= 2;
        }
        if let Some(cap) = self.hard_cap {
            if required > cap {
                panic!(
                    "command arena exceeded its hard cap: {required} bytes required, cap is {cap} bytes (current capacity {current})"
                );
            }
            target = target.min(cap);
        }
        let mut next = vec![0u8; target].into_boxed_slice();
        next[..self.head].copy_from_slice(&self.storage[..self.head]);
        self.storage = next;
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("used", &self.head)
            .field("capacity", &self.storage.len())
            .field("actions", &self.actions.len())
            .finish()
    }
}
