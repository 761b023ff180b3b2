//! ### English
//! Destination contract: the object (usually a tile) that owns the texture a transfer targets.
//!
//! The queue only keeps `Weak` references to destinations and compares texture identity by
//! [`TextureKey`], so a destination may be dropped on any thread while work is in flight.
//!
//! ### 中文
//! 目标对象契约：拥有传输目标纹理的对象（通常是 tile）。
//!
//! 队列只持有目标对象的 `Weak` 引用，并通过 [`TextureKey`] 比较纹理身份，
//! 因此目标对象可以在任意线程、在传输进行中被销毁。

use std::sync::atomic::{AtomicU64, Ordering};

use dpi::PhysicalSize;

use super::geometry::Color;
use super::gpu::{GpuBackend, GpuTexture};

static NEXT_TEXTURE_KEY: AtomicU64 = AtomicU64::new(1);

/// ### English
/// Identity of one texture version: `id` names the texture object, `generation` is bumped
/// every time the object is recycled for different content.
///
/// ### 中文
/// 某个纹理版本的身份：`id` 标识纹理对象，`generation` 在对象被复用于不同内容时递增。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureKey {
    pub id: u64,
    pub generation: u64,
}

impl TextureKey {
    /// ### English
    /// Allocates a process-unique key (generation 0).
    ///
    /// ### 中文
    /// 分配一个进程内唯一的 key（generation 为 0）。
    pub fn allocate() -> Self {
        Self {
            id: NEXT_TEXTURE_KEY.fetch_add(1, Ordering::Relaxed),
            generation: 0,
        }
    }

    /// ### English
    /// Same texture object, next content generation.
    ///
    /// ### 中文
    /// 同一纹理对象的下一代内容。
    pub fn next_generation(self) -> Self {
        Self {
            id: self.id,
            generation: self.generation.wrapping_add(1),
        }
    }
}

/// ### English
/// The texture a destination currently expects content for.
///
/// ### 中文
/// 目标对象当前等待内容的纹理。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureRef {
    pub key: TextureKey,
    pub size: PhysicalSize<u32>,
}

/// ### English
/// Operations the transfer queue needs from a destination.
///
/// Calls arrive from producer threads (`current_texture`, `mark_transfer_failed`) and from the
/// consumer thread while it holds the queue lock. Implementations must not call back into the
/// queue.
///
/// ### 中文
/// 传输队列需要目标对象提供的操作。
///
/// 调用来自生产者线程（`current_texture`、`mark_transfer_failed`）以及持有队列锁的消费者线程。
/// 实现不得回调队列。
pub trait Destination: Send + Sync {
    /// ### English
    /// Texture currently waiting for content (the back texture), if any.
    ///
    /// ### 中文
    /// 当前等待内容的纹理（back 纹理），若有。
    fn current_texture(&self) -> Option<TextureRef>;

    /// ### English
    /// Previously completed texture (the front texture) if it has GPU storage.
    ///
    /// ### 中文
    /// 之前已完成的纹理（front 纹理），若已有 GPU 存储。
    fn previous_texture(&self) -> Option<GpuTexture>;

    /// ### English
    /// Ensures the current texture has GPU storage and returns it.
    ///
    /// ### 中文
    /// 确保当前纹理具有 GPU 存储并返回。
    fn materialize_writable_texture(&self, gpu: &mut dyn GpuBackend) -> Option<GpuTexture>;

    /// ### English
    /// Records that the current texture is a single solid `color`.
    ///
    /// ### 中文
    /// 记录当前纹理为单一纯色 `color`。
    fn set_uniform_color(&self, color: Color);

    fn mark_uniform(&self, uniform: bool);

    fn mark_transfer_complete(&self);

    /// ### English
    /// The content could not be queued or uploaded; the destination must be rescheduled.
    ///
    /// ### 中文
    /// 内容未能入队或上传；目标对象必须被重新调度。
    fn mark_transfer_failed(&self);

    /// ### English
    /// Drops the current texture so it is regenerated and rescheduled upstream.
    ///
    /// ### 中文
    /// 丢弃当前纹理，使其在上游被重新生成并重新调度。
    fn discard_texture(&self);
}
