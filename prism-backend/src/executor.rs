//! The consumer loop that replays handed-off segments against a driver.
//!
//! A [`StreamExecutor`] runs on exactly one consumer thread per stream. It
//! waits for filled segments, walks each one record by record in strict
//! enqueue order, and recycles the buffer once the segment has run to
//! completion. This layer is a transport: a record whose driver call fails
//! propagates however the driver decides; nothing here intercepts, retries,
//! or skips.
//!
//! Re-entrant injection is disallowed by construction: the driver is handed
//! to the executor by value or unique borrow and has no path back to the
//! producer façade.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::{command::execute_record, driver::Driver, queue::CommandQueue, ring_buffer::RingBuffer};

/// Replays command segments pulled from a [`CommandQueue`].
pub struct StreamExecutor {
    queue: Arc<CommandQueue>,
}

impl StreamExecutor {
    /// Creates an executor draining `queue`. Exactly one executor may drain a
    /// given queue.
    pub fn new(queue: Arc<CommandQueue>) -> Self {
        Self { queue }
    }

    /// Replays one filled segment from its start to its used length.
    ///
    /// Records execute exactly once, in enqueue order; each record reports
    /// the offset of its successor and the walk ends when that offset
    /// reaches the segment end. An empty segment is a no-op.
    pub fn execute<D: Driver>(driver: &mut D, buffer: &mut RingBuffer) {
        let end = buffer.used();
        let mut offset = 0;
        let mut records = 0usize;
        while offset < end {
            offset = execute_record(driver, buffer, offset);
            records += 1;
        }
        trace!(records, bytes = end, "segment executed");
    }

    /// Runs the consumer loop until the queue reports exit-and-drained.
    ///
    /// Every segment received is executed to completion and its buffer
    /// recycled back to the producer side.
    pub fn run<D: Driver>(&self, driver: &mut D) {
        debug!("command stream executor running");
        while let Some(mut segment) = self.queue.wait_for_segment() {
            Self::execute(driver, &mut segment);
            self.queue.recycle(segment);
        }
        debug!("command stream executor exiting");
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc, Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        thread,
    };

    use super::*;
    use crate::{
        driver::{BufferHandle, BufferUsage, TextureFormat, TextureHandle},
        stream::{CommandStream, StreamConfig},
    };

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        CreateBuffer(u32, u32, BufferUsage),
        UpdateBuffer(u32, u32, Vec<u8>),
        DestroyBuffer(u32),
        BindBuffer(u32),
        Draw(u32, u32, u32),
        BeginFrame(u64),
        EndFrame(u64),
    }

    #[derive(Clone, Default)]
    struct RecordingDriver {
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl RecordingDriver {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Driver for RecordingDriver {
        fn begin_frame(&mut self, frame_id: u64) {
            self.calls.lock().unwrap().push(Call::BeginFrame(frame_id));
        }
        fn end_frame(&mut self, frame_id: u64) {
            self.calls.lock().unwrap().push(Call::EndFrame(frame_id));
        }
        fn create_buffer(&mut self, buffer: BufferHandle, size_bytes: u32, usage: BufferUsage) {
            self.calls
                .lock()
                .unwrap()
                .push(Call::CreateBuffer(buffer.0, size_bytes, usage));
        }
        fn update_buffer(&mut self, buffer: BufferHandle, offset: u32, data: &[u8]) {
            self.calls
                .lock()
                .unwrap()
                .push(Call::UpdateBuffer(buffer.0, offset, data.to_vec()));
        }
        fn destroy_buffer(&mut self, buffer: BufferHandle) {
            self.calls.lock().unwrap().push(Call::DestroyBuffer(buffer.0));
        }
        fn create_texture(&mut self, _: TextureHandle, _: u32, _: u32, _: TextureFormat) {}
        fn destroy_texture(&mut self, _: TextureHandle) {}
        fn bind_buffer(&mut self, buffer: BufferHandle) {
            self.calls.lock().unwrap().push(Call::BindBuffer(buffer.0));
        }
        fn bind_texture(&mut self, _: u32, _: TextureHandle) {}
        fn set_viewport(&mut self, _: i32, _: i32, _: u32, _: u32) {}
        fn set_scissor(&mut self, _: i32, _: i32, _: u32, _: u32) {}
        fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32) {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Draw(vertex_count, instance_count, first_vertex));
        }
    }

    /// Single-threaded pump: flush the stream's open segment and replay it
    /// immediately.
    fn pump(stream: &mut CommandStream, driver: &mut RecordingDriver) {
        stream.flush();
        while stream.queue().pending() > 0 {
            let mut segment = stream.queue().wait_for_segment().unwrap();
            StreamExecutor::execute(driver, &mut segment);
            stream.queue().recycle(segment);
        }
    }

    fn stream() -> CommandStream {
        CommandStream::with_config(
            CommandQueue::new(2),
            StreamConfig {
                initial_capacity: 256,
                ..StreamConfig::default()
            },
        )
    }

    #[test]
    fn create_bind_destroy_replay_in_exact_order() {
        let mut stream = stream();
        let mut driver = RecordingDriver::default();

        stream.create_buffer(BufferHandle(1), 256, BufferUsage::Vertex);
        stream.bind_buffer(BufferHandle(1));
        stream.destroy_buffer(BufferHandle(1));
        pump(&mut stream, &mut driver);

        assert_eq!(
            driver.calls(),
            vec![
                Call::CreateBuffer(1, 256, BufferUsage::Vertex),
                Call::BindBuffer(1),
                Call::DestroyBuffer(1),
            ]
        );
    }

    #[test]
    fn deferred_actions_replay_in_enqueue_order() {
        let mut stream = stream();
        let mut driver = RecordingDriver::default();
        let log = Arc::new(Mutex::new(Vec::new()));

        for index in 0..32usize {
            let log = log.clone();
            stream.defer(move || log.lock().unwrap().push(index));
        }
        pump(&mut stream, &mut driver);

        assert_eq!(*log.lock().unwrap(), (0..32).collect::<Vec<_>>());
    }

    #[test]
    fn deferred_action_runs_once_and_is_released() {
        struct Guard {
            drops: Arc<AtomicUsize>,
        }
        impl Drop for Guard {
            fn drop(&mut self) {
                self.drops.fetch_add(1, Ordering::SeqCst);
            }
        }

        let counter = Arc::new(AtomicUsize::new(0));
        let drops = Arc::new(AtomicUsize::new(0));
        let mut stream = stream();
        let mut driver = RecordingDriver::default();

        let guard = Guard { drops: drops.clone() };
        let captured = counter.clone();
        stream.defer(move || {
            let _guard = &guard;
            captured.fetch_add(1, Ordering::SeqCst);
        });
        pump(&mut stream, &mut driver);

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_segment_is_a_no_op() {
        let mut driver = RecordingDriver::default();
        let mut buffer = RingBuffer::with_capacity(64, None);
        StreamExecutor::execute(&mut driver, &mut buffer);
        assert!(driver.calls().is_empty());
    }

    #[test]
    fn flush_with_nothing_recorded_hands_nothing_off() {
        let mut stream = stream();
        stream.flush();
        assert_eq!(stream.queue().pending(), 0);
    }

    #[test]
    fn growth_mid_segment_preserves_earlier_records() {
        let queue = CommandQueue::new(2);
        let mut stream = CommandStream::with_config(
            queue,
            StreamConfig {
                initial_capacity: 64,
                ..StreamConfig::default()
            },
        );
        let mut driver = RecordingDriver::default();

        // Far more than 64 bytes of records in one open segment.
        for index in 0..64u32 {
            stream.update_buffer(BufferHandle(index), 0, &index.to_le_bytes());
        }
        pump(&mut stream, &mut driver);

        let calls = driver.calls();
        assert_eq!(calls.len(), 64);
        for (index, call) in calls.iter().enumerate() {
            let index = index as u32;
            assert_eq!(
                *call,
                Call::UpdateBuffer(index, 0, index.to_le_bytes().to_vec())
            );
        }
    }

    #[test]
    fn buffers_are_reusable_across_many_frames() {
        let mut stream = stream();
        let mut driver = RecordingDriver::default();

        for frame in 0..1000u64 {
            stream.begin_frame(frame);
            stream.draw(3, 1, 0);
            stream.end_frame(frame);
            pump(&mut stream, &mut driver);
        }

        let calls = driver.calls();
        assert_eq!(calls.len(), 3000);
        for frame in 0..1000u64 {
            let base = frame as usize * 3;
            assert_eq!(calls[base], Call::BeginFrame(frame));
            assert_eq!(calls[base + 1], Call::Draw(3, 1, 0));
            assert_eq!(calls[base + 2], Call::EndFrame(frame));
        }
    }

    #[test]
    fn producer_and_consumer_threads_replay_in_order() {
        let queue = CommandQueue::new(2);
        let mut driver = RecordingDriver::default();
        let observed = driver.clone();

        let consumer = {
            let queue = queue.clone();
            thread::Builder::new()
                .name("prism-driver".into())
                .spawn(move || StreamExecutor::new(queue).run(&mut driver))
                .unwrap()
        };

        let producer = {
            let queue = queue.clone();
            thread::spawn(move || {
                // The stream must be constructed on its producer thread.
                let mut stream = CommandStream::with_config(
                    queue,
                    StreamConfig {
                        initial_capacity: 128,
                        ..StreamConfig::default()
                    },
                );
                for frame in 0..50u64 {
                    stream.begin_frame(frame);
                    stream.create_buffer(BufferHandle(frame as u32), 16, BufferUsage::Index);
                    stream.destroy_buffer(BufferHandle(frame as u32));
                    stream.end_frame(frame);
                    stream.flush();
                }
                stream.finish();
            })
        };

        producer.join().unwrap();
        consumer.join().unwrap();

        let calls = observed.calls();
        assert_eq!(calls.len(), 200);
        for frame in 0..50u64 {
            let base = frame as usize * 4;
            assert_eq!(calls[base], Call::BeginFrame(frame));
            assert_eq!(calls[base + 1], Call::CreateBuffer(frame as u32, 16, BufferUsage::Index));
            assert_eq!(calls[base + 2], Call::DestroyBuffer(frame as u32));
            assert_eq!(calls[base + 3], Call::EndFrame(frame));
        }
    }
}
