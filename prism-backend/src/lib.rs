//! prism-backend is the asynchronous command stream of the prism renderer.
//!
//! It decouples the application thread that *records* rendering work from the
//! dedicated thread that *drives* the actual graphics device. The producer
//! side serializes each call into a compact command record inside a growable
//! byte arena; the consumer side replays filled arena segments against a
//! [`Driver`] implementation, strictly in enqueue order.
//!
//! # Architecture
//!
//! - **[`ring_buffer`]**: the contiguous byte arena records are serialized
//!   into, with amortized growth and per-segment reset.
//! - **[`command`]**: the self-describing record format: opcode, captured
//!   arguments, and the offset of the next record.
//! - **[`stream`]**: the producer façade; one recording method per driver
//!   operation plus [`CommandStream::defer`] for injecting arbitrary
//!   deferred actions.
//! - **[`queue`]**: the hand-off point moving filled buffers to the consumer
//!   and recycled buffers back.
//! - **[`executor`]**: the consumer loop replaying segments against the
//!   driver.
//! - **[`driver`]**: the backend interface commands ultimately invoke.
//!
//! # Usage
//!
//! ```
//! use std::thread;
//!
//! use prism_backend::{
//!     BufferHandle, BufferUsage, CommandQueue, CommandStream, Driver, StreamExecutor,
//!     TextureFormat, TextureHandle,
//! };
//!
//! struct NullDriver;
//!
//! impl Driver for NullDriver {
//!     fn create_buffer(&mut self, _: BufferHandle, _: u32, _: BufferUsage) {}
//!     fn update_buffer(&mut self, _: BufferHandle, _: u32, _: &[u8]) {}
//!     fn destroy_buffer(&mut self, _: BufferHandle) {}
//!     fn create_texture(&mut self, _: TextureHandle, _: u32, _: u32, _: TextureFormat) {}
//!     fn destroy_texture(&mut self, _: TextureHandle) {}
//!     fn bind_buffer(&mut self, _: BufferHandle) {}
//!     fn bind_texture(&mut self, _: u32, _: TextureHandle) {}
//!     fn set_viewport(&mut self, _: i32, _: i32, _: u32, _: u32) {}
//!     fn set_scissor(&mut self, _: i32, _: i32, _: u32, _: u32) {}
//!     fn draw(&mut self, _: u32, _: u32, _: u32) {}
//! }
//!
//! let queue = CommandQueue::new(3);
//!
//! // Consumer: one dedicated driver thread.
//! let executor = StreamExecutor::new(queue.clone());
//! let consumer = thread::spawn(move || executor.run(&mut NullDriver));
//!
//! // Producer: record a frame and hand it off.
//! let mut stream = CommandStream::new(queue);
//! stream.begin_frame(0);
//! stream.create_buffer(BufferHandle(1), 256, BufferUsage::Vertex);
//! stream.bind_buffer(BufferHandle(1));
//! stream.draw(3, 1, 0);
//! stream.defer(|| println!("frame 0 reached the driver thread"));
//! stream.end_frame(0);
//! stream.flush();
//!
//! stream.finish();
//! consumer.join().unwrap();
//! ```
//!
//! # Ordering and threading
//!
//! Exactly one producer thread records into a stream and exactly one consumer
//! thread executes it. Records are never reordered, skipped, or run twice;
//! dependent sequences like create-before-bind hold by construction. The
//! queue's lock is the single memory-visibility boundary between the two
//! threads, and a handed-off segment is owned by the consumer until it is
//! recycled.
//!
//! # Failure policy
//!
//! Capacity exhaustion past a configured hard cap, recording from the wrong
//! thread (debug builds), and corrupted record bytes are fatal: they panic
//! with the operation and offset rather than risk executing garbage against
//! a live device. Failures inside driver methods are the driver's own to
//! propagate; this layer is a transport, not a policy layer.

/// Serialized command records and their dispatch.
pub mod command;
/// The driver interface replayed commands execute against.
pub mod driver;
/// The consumer loop replaying segments.
pub mod executor;
/// Producer/consumer buffer hand-off.
pub mod queue;
/// The growable byte arena backing each segment.
pub mod ring_buffer;
/// The producer façade.
pub mod stream;

pub use driver::{BufferHandle, BufferUsage, Driver, TextureFormat, TextureHandle};
pub use executor::StreamExecutor;
pub use queue::CommandQueue;
pub use ring_buffer::{DeferredAction, RingBuffer};
pub use stream::{CommandStream, StreamConfig};
