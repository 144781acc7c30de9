//! The driver interface that replayed commands are executed against.
//!
//! A [`Driver`] is the concrete graphics device abstraction (GL, Vulkan,
//! Metal, or a mock in tests). The command stream never calls it directly on
//! the recording thread; every method here has a matching recording method on
//! [`CommandStream`](crate::CommandStream), and the
//! [`StreamExecutor`](crate::StreamExecutor) invokes the driver on the
//! consumer thread only, strictly in enqueue order.
//!
//! Resource handles are opaque at this layer. The stream treats them as plain
//! values to capture and forward; allocation and lifetime of the underlying
//! GPU objects are the driver's business.

/// Opaque handle to a driver-side buffer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// Opaque handle to a driver-side texture object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Intended usage of a buffer, forwarded to the driver at creation.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    Vertex = 0,
    Index = 1,
    Uniform = 2,
}

impl BufferUsage {
    pub(crate) fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Vertex),
            1 => Some(Self::Index),
            2 => Some(Self::Uniform),
            _ => None,
        }
    }
}

/// Pixel format of a texture, forwarded to the driver at creation.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    Rgba8 = 0,
    Bgra8 = 1,
    Depth32Float = 2,
}

impl TextureFormat {
    pub(crate) fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Rgba8),
            1 => Some(Self::Bgra8),
            2 => Some(Self::Depth32Float),
            _ => None,
        }
    }
}

/// One method per operation the command stream can record.
///
/// Implementations run on the consumer thread only. This layer is a pure
/// transport: it never inspects results, retries, or masks driver failures.
/// If an operation can fail, the driver owns the propagation policy (log,
/// panic, poison the device, ...).
#[allow(unused_variables)]
pub trait Driver {
    /// Marks the start of a frame's worth of commands.
    fn begin_frame(&mut self, frame_id: u64) {}

    /// Marks the end of a frame's worth of commands.
    fn end_frame(&mut self, frame_id: u64) {}

    /// Creates a buffer object of `size_bytes` bytes under `buffer`.
    fn create_buffer(&mut self, buffer: BufferHandle, size_bytes: u32, usage: BufferUsage);

    /// Uploads `data` into `buffer` starting at `offset`.
    ///
    /// The data was copied into the command arena at record time, so the
    /// slice is valid exactly for the duration of this call.
    fn update_buffer(&mut self, buffer: BufferHandle, offset: u32, data: &[u8]);

    /// Destroys the buffer object under `buffer`.
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Creates a 2D texture object under `texture`.
    fn create_texture(
        &mut self,
        texture: TextureHandle,
        width: u32,
        height: u32,
        format: TextureFormat,
    );

    /// Destroys the texture object under `texture`.
    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Binds `buffer` for subsequent draws.
    fn bind_buffer(&mut self, buffer: BufferHandle);

    /// Binds `texture` to sampler unit `unit`.
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle);

    /// Sets the viewport rectangle.
    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32);

    /// Sets the scissor rectangle.
    fn set_scissor(&mut self, x: i32, y: i32, width: u32, height: u32);

    /// Submits a non-indexed draw.
    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_raw_round_trip() {
        for usage in [BufferUsage::Vertex, BufferUsage::Index, BufferUsage::Uniform] {
            assert_eq!(BufferUsage::from_raw(usage as u32), Some(usage));
        }
        for format in [
            TextureFormat::Rgba8,
            TextureFormat::Bgra8,
            TextureFormat::Depth32Float,
        ] {
            assert_eq!(TextureFormat::from_raw(format as u32), Some(format));
        }
        assert_eq!(BufferUsage::from_raw(3), None);
        assert_eq!(TextureFormat::from_raw(u32::MAX), None);
    }
}
