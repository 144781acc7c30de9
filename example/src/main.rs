//! End-to-end demo of the prism command stream.
//!
//! Spawns a consumer thread running a [`StreamExecutor`] over a driver that
//! logs every operation, then records a few frames from the main thread and
//! shuts down cleanly. Run with `RUST_LOG=trace` to also see the per-call
//! recording trace from the producer side.

use std::{sync::mpsc, thread};

use tracing::info;
use tracing_subscriber::EnvFilter;

use prism_backend::{
    BufferHandle, BufferUsage, CommandQueue, CommandStream, Driver, StreamConfig, StreamExecutor,
    TextureFormat, TextureHandle,
};

/// Driver that logs each operation instead of talking to a device.
struct LoggingDriver;

impl Driver for LoggingDriver {
    fn begin_frame(&mut self, frame_id: u64) {
        info!("begin_frame {frame_id}");
    }
    fn end_frame(&mut self, frame_id: u64) {
        info!("end_frame {frame_id}");
    }
    fn create_buffer(&mut self, buffer: BufferHandle, size_bytes: u32, usage: BufferUsage) {
        info!("create_buffer {buffer:?} {size_bytes} bytes {usage:?}");
    }
    fn update_buffer(&mut self, buffer: BufferHandle, offset: u32, data: &[u8]) {
        info!("update_buffer {buffer:?} at {offset}, {} bytes", data.len());
    }
    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        info!("destroy_buffer {buffer:?}");
    }
    fn create_texture(&mut self, texture: TextureHandle, width: u32, height: u32, format: TextureFormat) {
        info!("create_texture {texture:?} {width}x{height} {format:?}");
    }
    fn destroy_texture(&mut self, texture: TextureHandle) {
        info!("destroy_texture {texture:?}");
    }
    fn bind_buffer(&mut self, buffer: BufferHandle) {
        info!("bind_buffer {buffer:?}");
    }
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        info!("bind_texture unit {unit} {texture:?}");
    }
    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        info!("set_viewport {x},{y} {width}x{height}");
    }
    fn set_scissor(&mut self, x: i32, y: i32, width: u32, height: u32) {
        info!("set_scissor {x},{y} {width}x{height}");
    }
    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32) {
        info!("draw {vertex_count} vertices x{instance_count} from {first_vertex}");
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let queue = CommandQueue::new(3);

    let executor = StreamExecutor::new(queue.clone());
    let consumer = thread::Builder::new()
        .name("prism-driver".into())
        .spawn(move || executor.run(&mut LoggingDriver))
        .expect("failed to spawn driver thread");

    let mut stream = CommandStream::with_config(
        queue,
        StreamConfig {
            verbose: true,
            ..StreamConfig::default()
        },
    );

    let vertices = [0u8; 96];
    let (retired_tx, retired_rx) = mpsc::channel();

    for frame in 0..3u64 {
        stream.begin_frame(frame);
        let vbo = BufferHandle(frame as u32 + 1);
        stream.create_buffer(vbo, vertices.len() as u32, BufferUsage::Vertex);
        stream.update_buffer(vbo, 0, &vertices);
        stream.bind_buffer(vbo);
        stream.create_texture(TextureHandle(1), 64, 64, TextureFormat::Rgba8);
        stream.bind_texture(0, TextureHandle(1));
        stream.set_viewport(0, 0, 1280, 720);
        stream.draw(vertices.len() as u32 / 12, 1, 0);
        stream.destroy_texture(TextureHandle(1));
        stream.destroy_buffer(vbo);

        // Cross-thread notification once this frame has been replayed.
        let retired = retired_tx.clone();
        stream.defer(move || {
            let _ = retired.send(frame);
        });

        stream.end_frame(frame);
        stream.flush();
    }

    stream.finish();
    consumer.join().expect("driver thread panicked");

    drop(retired_tx);
    let retired: Vec<u64> = retired_rx.iter().collect();
    info!("frames retired in order: {retired:?}");
}
