//! The producer façade that application code records commands into.
//!
//! A [`CommandStream`] serializes one command record per call into its open
//! [`RingBuffer`] segment and returns immediately; it never touches the
//! driver. [`flush`](CommandStream::flush) hands the filled segment to the
//! consumer through the shared [`CommandQueue`] and swaps in a recycled
//! buffer; [`finish`](CommandStream::finish) flushes the tail and waits for
//! every handed-off segment to retire.
//!
//! # Thread affinity
//!
//! A stream serializes writes from exactly one producer thread. The thread
//! identity is captured at construction and, in debug builds, every recording
//! call asserts against it. Recording from another thread is a programming
//! error: release builds do not check, and the resulting interleaving is
//! undefined.
//!
//! # Custom actions
//!
//! [`defer`](CommandStream::defer) injects an arbitrary zero-argument action
//! into the stream at the current position. This is the sole generic
//! extension point for ad hoc consumer-side work (typically cross-thread
//! notification such as "this frame's uploads are complete"); the action runs
//! exactly once, in order, on the consumer thread.

use std::sync::Arc;

use tracing::trace;

use crate::{
    command::{
        BindTextureArgs, BufferArgs, CreateBufferArgs, CreateTextureArgs, CustomArgs, DrawArgs,
        FrameArgs, OpCode, RectArgs, TextureArgs, UpdateBufferArgs, push_record,
    },
    driver::{BufferHandle, BufferUsage, TextureFormat, TextureHandle},
    queue::CommandQueue,
    ring_buffer::RingBuffer,
};

/// Tuning knobs for a [`CommandStream`].
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Capacity of each command buffer before growth, in bytes.
    pub initial_capacity: usize,
    /// Hard cap on a buffer's growth; exceeding it aborts. `None` means
    /// growth is unbounded.
    pub hard_cap: Option<usize>,
    /// Maximum number of handed-off segments in flight before
    /// [`CommandStream::flush`] applies back-pressure.
    pub max_in_flight: usize,
    /// When set, every recording call emits one `trace!` line naming the
    /// operation, the record size, and the captured arguments. Tracing never
    /// alters record layout or ordering.
    pub verbose: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 256 * 1024,
            hard_cap: None,
            max_in_flight: 3,
            verbose: false,
        }
    }
}

/// Records driver operations as serialized command records for later replay.
pub struct CommandStream {
    buffer: RingBuffer,
    queue: Arc<CommandQueue>,
    config: StreamConfig,
    #[cfg(debug_assertions)]
    producer_thread: std::thread::ThreadId,
}

impl CommandStream {
    /// Creates a stream with the default configuration, producing into
    /// `queue`. The calling thread becomes the stream's producer thread.
    pub fn new(queue: Arc<CommandQueue>) -> Self {
        Self::with_config(queue, StreamConfig::default())
    }

    /// Creates a stream with an explicit configuration.
    pub fn with_config(queue: Arc<CommandQueue>, config: StreamConfig) -> Self {
        Self {
            buffer: RingBuffer::with_capacity(config.initial_capacity, config.hard_cap),
            queue,
            config,
            #[cfg(debug_assertions)]
            producer_thread: std::thread::current().id(),
        }
    }

    fn check_thread(&self, _op: &str) {
        #[cfg(debug_assertions)]
        if std::thread::current().id() != self.producer_thread {
            panic!("{_op} recorded from a thread other than the stream's producer thread");
        }
    }

    pub fn begin_frame(&mut self, frame_id: u64) {
        self.check_thread("BeginFrame");
        let size = push_record(&mut self.buffer, OpCode::BeginFrame, &FrameArgs { frame_id }, &[]);
        if self.config.verbose {
            trace!("BeginFrame : size={size}\t{frame_id}");
        }
    }

    pub fn end_frame(&mut self, frame_id: u64) {
        self.check_thread("EndFrame");
        let size = push_record(&mut self.buffer, OpCode::EndFrame, &FrameArgs { frame_id }, &[]);
        if self.config.verbose {
            trace!("EndFrame : size={size}\t{frame_id}");
        }
    }

    pub fn create_buffer(&mut self, buffer: BufferHandle, size_bytes: u32, usage: BufferUsage) {
        self.check_thread("CreateBuffer");
        let args = CreateBufferArgs {
            buffer: buffer.0,
            size_bytes,
            usage: usage as u32,
        };
        let size = push_record(&mut self.buffer, OpCode::CreateBuffer, &args, &[]);
        if self.config.verbose {
            trace!("CreateBuffer : size={size}\t{}, {size_bytes}, {usage:?}", buffer.0);
        }
    }

    /// Records a buffer upload. `data` is copied into the command arena by
    /// value; the caller keeps ownership of its slice and no reference to it
    /// survives this call.
    pub fn update_buffer(&mut self, buffer: BufferHandle, offset: u32, data: &[u8]) {
        self.check_thread("UpdateBuffer");
        let args = UpdateBufferArgs {
            buffer: buffer.0,
            offset,
            len: data.len() as u32,
        };
        let size = push_record(&mut self.buffer, OpCode::UpdateBuffer, &args, data);
        if self.config.verbose {
            trace!(
                "UpdateBuffer : size={size}\t{}, {offset}, [{} bytes]",
                buffer.0,
                data.len()
            );
        }
    }

    pub fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.check_thread("DestroyBuffer");
        let args = BufferArgs { buffer: buffer.0 };
        let size = push_record(&mut self.buffer, OpCode::DestroyBuffer, &args, &[]);
        if self.config.verbose {
            trace!("DestroyBuffer : size={size}\t{}", buffer.0);
        }
    }

    pub fn create_texture(
        &mut self,
        texture: TextureHandle,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) {
        self.check_thread("CreateTexture");
        let args = CreateTextureArgs {
            texture: texture.0,
            width,
            height,
            format: format as u32,
        };
        let size = push_record(&mut self.buffer, OpCode::CreateTexture, &args, &[]);
        if self.config.verbose {
            trace!(
                "CreateTexture : size={size}\t{}, {width}, {height}, {format:?}",
                texture.0
            );
        }
    }

    pub fn destroy_texture(&mut self, texture: TextureHandle) {
        self.check_thread("DestroyTexture");
        let args = TextureArgs { texture: texture.0 };
        let size = push_record(&mut self.buffer, OpCode::DestroyTexture, &args, &[]);
        if self.config.verbose {
            trace!("DestroyTexture : size={size}\t{}", texture.0);
        }
    }

    pub fn bind_buffer(&mut self, buffer: BufferHandle) {
        self.check_thread("BindBuffer");
        let args = BufferArgs { buffer: buffer.0 };
        let size = push_record(&mut self.buffer, OpCode::BindBuffer, &args, &[]);
        if self.config.verbose {
            trace!("BindBuffer : size={size}\t{}", buffer.0);
        }
    }

    pub fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        self.check_thread("BindTexture");
        let args = BindTextureArgs { unit, texture: texture.0 };
        let size = push_record(&mut self.buffer, OpCode::BindTexture, &args, &[]);
        if self.config.verbose {
            trace!("BindTexture : size={size}\t{unit}, {}", texture.0);
        }
    }

    pub fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.check_thread("SetViewport");
        let args = RectArgs { x, y, width, height };
        let size = push_record(&mut self.buffer, OpCode::SetViewport, &args, &[]);
        if self.config.verbose {
            trace!("SetViewport : size={size}\t{x}, {y}, {width}, {height}");
        }
    }

    pub fn set_scissor(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.check_thread("SetScissor");
        let args = RectArgs { x, y, width, height };
        let size = push_record(&mut self.buffer, OpCode::SetScissor, &args, &[]);
        if self.config.verbose {
            trace!("SetScissor : size={size}\t{x}, {y}, {width}, {height}");
        }
    }

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32) {
        self.check_thread("Draw");
        let args = DrawArgs { vertex_count, instance_count, first_vertex };
        let size = push_record(&mut self.buffer, OpCode::Draw, &args, &[]);
        if self.config.verbose {
            trace!("Draw : size={size}\t{vertex_count}, {instance_count}, {first_vertex}");
        }
    }

    /// Injects a deferred action at the current position in the stream.
    ///
    /// The action executes exactly once on the consumer thread, ordered
    /// relative to every other record in the stream, and releases everything
    /// it captured as soon as it returns.
    pub fn defer(&mut self, action: impl FnOnce() + Send + 'static) {
        self.check_thread("Custom");
        let slot = self.buffer.push_action(Box::new(action));
        let size = push_record(&mut self.buffer, OpCode::Custom, &CustomArgs { slot }, &[]);
        if self.config.verbose {
            trace!("Custom : size={size}\t{slot}");
        }
    }

    /// Hands the open segment to the consumer and swaps in a recycled (or
    /// fresh) buffer. A segment with nothing recorded is kept open instead.
    ///
    /// Blocks only when `max_in_flight` segments are already outstanding.
    pub fn flush(&mut self) {
        self.check_thread("Flush");
        if self.buffer.used() == 0 {
            return;
        }
        // Acquire before submit so the in-flight bound holds while we still
        // own the filled buffer.
        let next = self.queue.acquire().unwrap_or_else(|| {
            RingBuffer::with_capacity(self.config.initial_capacity, self.config.hard_cap)
        });
        let filled = std::mem::replace(&mut self.buffer, next);
        self.queue.submit(filled);
    }

    /// Flushes the tail segment, asks the consumer loop to exit once drained,
    /// and blocks until every handed-off segment has finished executing.
    pub fn finish(mut self) {
        self.flush();
        self.queue.request_exit();
        self.queue.wait_idle();
    }

    #[cfg(test)]
    pub(crate) fn queue(&self) -> &Arc<CommandQueue> {
        &self.queue
    }

    #[cfg(test)]
    pub(crate) fn buffer(&self) -> &RingBuffer {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{BufferHandle, BufferUsage, TextureHandle};

    fn record_sequence(stream: &mut CommandStream) {
        stream.create_buffer(BufferHandle(1), 256, BufferUsage::Vertex);
        stream.bind_texture(2, TextureHandle(9));
        stream.set_viewport(0, 0, 1920, 1080);
        stream.draw(3, 1, 0);
    }

    #[test]
    fn recording_never_touches_the_driver() {
        let mut stream = CommandStream::new(CommandQueue::new(1));
        record_sequence(&mut stream);
        // Nothing handed off, nothing executed; the records only exist as
        // bytes in the open segment.
        assert!(stream.buffer().used() > 0);
        assert_eq!(stream.queue().pending(), 0);
    }

    #[test]
    fn verbose_mode_does_not_change_record_layout() {
        let quiet = {
            let mut stream = CommandStream::with_config(
                CommandQueue::new(1),
                StreamConfig { verbose: false, ..StreamConfig::default() },
            );
            record_sequence(&mut stream);
            stream.buffer().used()
        };
        let verbose = {
            let mut stream = CommandStream::with_config(
                CommandQueue::new(1),
                StreamConfig { verbose: true, ..StreamConfig::default() },
            );
            record_sequence(&mut stream);
            stream.buffer().used()
        };
        assert_eq!(quiet, verbose);
    }

    #[test]
    #[cfg(debug_assertions)]
    fn recording_from_another_thread_panics() {
        let stream = CommandStream::new(CommandQueue::new(1));
        let result = std::thread::spawn(move || {
            let mut stream = stream;
            stream.draw(3, 1, 0);
        })
        .join();
        assert!(result.is_err());
    }

    #[test]
    fn finish_without_records_returns_immediately() {
        let stream = CommandStream::new(CommandQueue::new(1));
        stream.finish();
    }
}
