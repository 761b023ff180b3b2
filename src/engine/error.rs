//! ### English
//! Error types for the transfer queue, the shared surface and the GPU backends.
//!
//! None of these are fatal: every failure path ends in "reschedule the affected content".
//!
//! ### 中文
//! 传输队列、共享表面与 GPU 后端的错误类型。
//!
//! 这些错误均非致命：所有失败路径最终都归结为“重新调度受影响的内容”。

use super::gpu::{FramebufferId, TextureId};

/// ### English
/// Queue-level errors.
///
/// ### 中文
/// 队列层面的错误。
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("pixel buffer holds {actual} bytes, {width}x{height} RGBA8 needs {expected}")]
    PixelLength {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("a consumer is already attached to this transfer queue")]
    ConsumerAlreadyAttached,

    #[error("shared surface: {0}")]
    Surface(#[from] SurfaceError),

    #[error("GPU backend: {0}")]
    Gpu(#[from] GpuError),
}

/// ### English
/// Failures of the buffer-queued shared surface (host window side and consumer side).
///
/// ### 中文
/// 缓冲队列共享表面（宿主窗口侧与消费者侧）的失败。
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    #[error("the shared surface has been abandoned")]
    Abandoned,

    #[error("no free buffer available to dequeue")]
    NoFreeBuffer,

    #[error("no queued buffer available to latch")]
    NoQueuedBuffer,

    #[error("buffer geometry has not been configured")]
    GeometryNotSet,

    #[error("surface usage does not allow CPU writes")]
    WriteNotPermitted,

    #[error("image {image_width}x{image_height} does not fit a {buffer_width}x{buffer_height} buffer")]
    ImageTooLarge {
        image_width: u32,
        image_height: u32,
        buffer_width: u32,
        buffer_height: u32,
    },

    #[error("buffer count {requested} is below the minimum of {minimum}")]
    InvalidBufferCount { requested: u32, minimum: u32 },

    #[error("buffer geometry must be non-zero")]
    ZeroGeometry,
}

/// ### English
/// GPU backend failures (GL errors, unknown objects, incomplete framebuffers).
///
/// ### 中文
/// GPU 后端失败（GL 错误、未知对象、framebuffer 不完整）。
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GpuError {
    #[error("unknown texture {0}")]
    UnknownTexture(TextureId),

    #[error("texture {0} has no storage allocated")]
    UnallocatedTexture(TextureId),

    #[error("unknown framebuffer {0}")]
    UnknownFramebuffer(FramebufferId),

    #[error("framebuffer incomplete (status {0:#06x})")]
    FramebufferIncomplete(u32),

    #[error("GL error {code:#06x} after {label}")]
    Gl { code: u32, label: &'static str },

    #[error("direct upload slot carries no payload")]
    MissingPayload,

    #[error("shared surface has no latched image")]
    NoLatchedImage,
}
