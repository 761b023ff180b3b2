/// ### English
/// `tile_transfer_queue` crate root.
///
/// A bounded queue moving rendered tile pixels from worker threads into GPU textures owned by
/// a single compositor thread. Producers share a [`TransferQueue`]; the compositor attaches a
/// [`TextureUploader`] and calls [`TextureUploader::drain_once`] every frame.
///
/// ### 中文
/// `tile_transfer_queue` 的 crate 根。
///
/// 有界队列：把工作线程渲染好的 tile 像素搬运到单个合成线程持有的 GPU 纹理中。
/// 生产者共享一个 [`TransferQueue`]；合成线程挂接 [`TextureUploader`]，
/// 并在每帧调用 [`TextureUploader::drain_once`]。
mod engine;

pub use engine::config::{
    EFFICIENT_QUEUE_CAPACITY, MINIMAL_QUEUE_CAPACITY, MemoryMode,
    TRANSFER_QUEUE_FLAG_MINIMAL_MEMORY, TRANSFER_QUEUE_FLAG_SHARED_SURFACE_UPLOAD,
    TRANSFER_QUEUE_FLAGS_ALL, TransferQueueConfig,
};
pub use engine::destination::{Destination, TextureKey, TextureRef};
pub use engine::error::{GpuError, SurfaceError, TransferError};
pub use engine::geometry::{BYTES_PER_PIXEL, Color, DirtyRect, Image};
pub use engine::gpu::{
    BackendStats, FramebufferId, GlBackend, GpuBackend, GpuTexture, SavedGlState,
    SoftwareBackend, TextureCopy, TextureId,
};
pub use engine::queue::{
    DrainReport, SlotSnapshot, SlotStatus, TextureUploader, TileUpdate, TransferQueue,
    UploadKind,
};
pub use engine::surface::{
    PixelFormat, SurfaceConsumer, SurfaceUsage, SurfaceWindow, shared_surface,
};
pub use engine::tile::{Tile, TileTexture};
