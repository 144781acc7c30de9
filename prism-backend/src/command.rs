//! Serialized command records and their dispatch against a driver.
//!
//! Each record in the arena is a [`RecordHeader`] followed by a fixed,
//! per-operation argument struct (and, for buffer uploads, the payload bytes
//! inline). The header stores the opcode and the segment-relative offset of
//! the next record, so the executor can walk a segment with nothing but the
//! bytes in front of it. Alignment padding between records is folded into
//! that next offset, so every offset the executor visits is a valid record
//! start.
//!
//! Dispatch is a closed enumeration: one [`OpCode`] per driver operation,
//! decoded with a single `match`. A tag the match does not know is a
//! corrupted stream, and a corrupted stream dies loudly before any of it is
//! executed against a live device.

use bytemuck::{Pod, Zeroable};

use crate::{
    driver::{BufferHandle, BufferUsage, Driver, TextureFormat, TextureHandle},
    ring_buffer::{RECORD_ALIGN, RingBuffer, align_up},
};

/// Operation discriminator stored in every record header.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpCode {
    BeginFrame = 0,
    EndFrame = 1,
    CreateBuffer = 2,
    UpdateBuffer = 3,
    DestroyBuffer = 4,
    CreateTexture = 5,
    DestroyTexture = 6,
    BindBuffer = 7,
    BindTexture = 8,
    SetViewport = 9,
    SetScissor = 10,
    Draw = 11,
    Custom = 12,
}

impl OpCode {
    fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::BeginFrame,
            1 => Self::EndFrame,
            2 => Self::CreateBuffer,
            3 => Self::UpdateBuffer,
            4 => Self::DestroyBuffer,
            5 => Self::CreateTexture,
            6 => Self::DestroyTexture,
            7 => Self::BindBuffer,
            8 => Self::BindTexture,
            9 => Self::SetViewport,
            10 => Self::SetScissor,
            11 => Self::Draw,
            12 => Self::Custom,
            _ => return None,
        })
    }
}

/// Fixed-layout header at the start of every record.
///
/// `next` is the segment-relative byte offset of the following record,
/// already rounded up to the record alignment.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct RecordHeader {
    pub op: u32,
    pub next: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct FrameArgs {
    pub frame_id: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct CreateBufferArgs {
    pub buffer: u32,
    pub size_bytes: u32,
    pub usage: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct UpdateBufferArgs {
    pub buffer: u32,
    pub offset: u32,
    pub len: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct BufferArgs {
    pub buffer: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct CreateTextureArgs {
    pub texture: u32,
    pub width: u32,
    pub height: u32,
    pub format: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct TextureArgs {
    pub texture: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct BindTextureArgs {
    pub unit: u32,
    pub texture: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct RectArgs {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct DrawArgs {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct CustomArgs {
    pub slot: u32,
}

/// Serializes one record (header, args, optional inline payload) into the
/// arena and returns its total size in bytes, padding included.
pub(crate) fn push_record<A: Pod>(
    buffer: &mut RingBuffer,
    op: OpCode,
    args: &A,
    payload: &[u8],
) -> usize {
    let args_at = size_of::<RecordHeader>();
    let payload_at = args_at + size_of::<A>();
    let size = align_up(payload_at + payload.len(), RECORD_ALIGN);
    let offset = buffer.allocate(size);
    debug_assert!(offset + size <= u32::MAX as usize);
    let header = RecordHeader {
        op: op as u32,
        next: (offset + size) as u32,
    };
    buffer.write(offset, bytemuck::bytes_of(&header));
    buffer.write(offset + args_at, bytemuck::bytes_of(args));
    if !payload.is_empty() {
        buffer.write(offset + payload_at, payload);
    }
    size
}

/// Decodes and executes the record at `offset`, returning the offset of the
/// record that follows it.
///
/// # Panics
///
/// Panics on an unknown opcode, an invalid enum discriminant, or an already
/// taken deferred-action slot. All three mean the stream bytes do not match
/// what the producer wrote, and executing past that point would feed garbage
/// to the driver.
pub(crate) fn execute_record<D: Driver>(
    driver: &mut D,
    buffer: &mut RingBuffer,
    offset: usize,
) -> usize {
    let header: RecordHeader = buffer.read_pod(offset);
    let args_at = offset + size_of::<RecordHeader>();
    let Some(op) = OpCode::from_raw(header.op) else {
        panic!("corrupted command stream: unknown opcode {} at offset {offset}", header.op);
    };
    match op {
        OpCode::BeginFrame => {
            let args: FrameArgs = buffer.read_pod(args_at);
            driver.begin_frame(args.frame_id);
        }
        OpCode::EndFrame => {
            let args: FrameArgs = buffer.read_pod(args_at);
            driver.end_frame(args.frame_id);
        }
        OpCode::CreateBuffer => {
            let args: CreateBufferArgs = buffer.read_pod(args_at);
            let usage = BufferUsage::from_raw(args.usage).unwrap_or_else(|| {
                panic!(
                    "corrupted command stream: invalid buffer usage {} at offset {offset}",
                    args.usage
                )
            });
            driver.create_buffer(BufferHandle(args.buffer), args.size_bytes, usage);
        }
        OpCode::UpdateBuffer => {
            let args: UpdateBufferArgs = buffer.read_pod(args_at);
            let payload_at = args_at + size_of::<UpdateBufferArgs>();
            let data = buffer.bytes(payload_at, args.len as usize);
            driver.update_buffer(BufferHandle(args.buffer), args.offset, data);
        }
        OpCode::DestroyBuffer => {
            let args: BufferArgs = buffer.read_pod(args_at);
            driver.destroy_buffer(BufferHandle(args.buffer));
        }
        OpCode::CreateTexture => {
            let args: CreateTextureArgs = buffer.read_pod(args_at);
            let format = TextureFormat::from_raw(args.format).unwrap_or_else(|| {
                panic!(
                    "corrupted command stream: invalid texture format {} at offset {offset}",
                    args.format
                )
            });
            driver.create_texture(TextureHandle(args.texture), args.width, args.height, format);
        }
        OpCode::DestroyTexture => {
            let args: TextureArgs = buffer.read_pod(args_at);
            driver.destroy_texture(TextureHandle(args.texture));
        }
        OpCode::BindBuffer => {
            let args: BufferArgs = buffer.read_pod(args_at);
            driver.bind_buffer(BufferHandle(args.buffer));
        }
        OpCode::BindTexture => {
            let args: BindTextureArgs = buffer.read_pod(args_at);
            driver.bind_texture(args.unit, TextureHandle(args.texture));
        }
        OpCode::SetViewport => {
            let args: RectArgs = buffer.read_pod(args_at);
            driver.set_viewport(args.x, args.y, args.width, args.height);
        }
        OpCode::SetScissor => {
            let args: RectArgs = buffer.read_pod(args_at);
            driver.set_scissor(args.x, args.y, args.width, args.height);
        }
        OpCode::Draw => {
            let args: DrawArgs = buffer.read_pod(args_at);
            driver.draw(args.vertex_count, args.instance_count, args.first_vertex);
        }
        OpCode::Custom => {
            let args: CustomArgs = buffer.read_pod(args_at);
            let action = buffer.take_action(args.slot).unwrap_or_else(|| {
                panic!(
                    "corrupted command stream: deferred action slot {} at offset {offset} already taken",
                    args.slot
                )
            });
            // Invoked exactly once; the action and everything it captured are
            // dropped as soon as it returns.
            action();
        }
    }
    header.next as usize
}
