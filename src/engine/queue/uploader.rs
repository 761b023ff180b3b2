//! ### English
//! Consumer half of the transfer queue: owns the GPU backend and every GPU-side resource.
//!
//! ### 中文
//! 传输队列的消费者侧：持有 GPU 后端以及全部 GPU 侧资源。

use std::sync::Arc;
use std::sync::atomic::Ordering;

use dpi::PhysicalSize;

use crate::engine::error::TransferError;
use crate::engine::gpu::{FramebufferId, GpuBackend, TextureId};
use crate::engine::surface::{PixelFormat, SurfaceConsumer, SurfaceUsage, shared_surface};

use super::{QueueState, TransferQueue};

/// ### English
/// What one drain cycle did.
///
/// ### 中文
/// 一次 drain 周期完成的工作。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub discards_resolved: usize,
    pub uniform_updates: usize,
    pub direct_uploads: usize,
    pub surface_blits: usize,
    /// ### English
    /// Entries (ring or side queue) dropped because their destination moved on.
    ///
    /// ### 中文
    /// 因目标对象已变化而被丢弃的条目（环形缓冲或旁路队列）。
    pub stale_dropped: usize,
    pub failed: usize,
}

impl DrainReport {
    /// ### English
    /// Pixel writes into destination textures (uniform updates excluded).
    ///
    /// ### 中文
    /// 写入目标纹理的像素操作次数（不含纯色更新）。
    pub fn gpu_writes(&self) -> usize {
        self.direct_uploads + self.surface_blits
    }
}

/// ### English
/// Consumer attached to a [`TransferQueue`]. Lives on the thread owning the GPU context.
///
/// GPU resources are created by `init_gpu_resources` and released by `release_gpu_resources`,
/// `clear_all` or drop, whichever comes first.
///
/// ### 中文
/// 挂接在 [`TransferQueue`] 上的消费者。运行于持有 GPU 上下文的线程。
///
/// GPU 资源由 `init_gpu_resources` 创建，由 `release_gpu_resources`、`clear_all`
/// 或 drop 中最先发生者释放。
pub struct TextureUploader<G: GpuBackend> {
    pub(super) queue: Arc<TransferQueue>,
    pub(super) gpu: G,
    pub(super) surface_consumer: Option<SurfaceConsumer>,
    /// ### English
    /// Texture receiving the latched shared-surface image (the blit source).
    ///
    /// ### 中文
    /// 接收共享表面锁定图像的纹理（blit 源）。
    pub(super) surface_texture: Option<TextureId>,
    pub(super) framebuffer: Option<FramebufferId>,
}

impl<G: GpuBackend> TextureUploader<G> {
    /// ### English
    /// Attaches a consumer to `queue`. A queue accepts a single consumer at a time.
    ///
    /// ### 中文
    /// 为 `queue` 挂接消费者。一个队列同一时间只接受一个消费者。
    pub fn attach(queue: Arc<TransferQueue>, gpu: G) -> Result<Self, TransferError> {
        if queue.consumer_attached.swap(true, Ordering::AcqRel) {
            return Err(TransferError::ConsumerAlreadyAttached);
        }
        Ok(Self {
            queue,
            gpu,
            surface_consumer: None,
            surface_texture: None,
            framebuffer: None,
        })
    }

    pub fn queue(&self) -> &Arc<TransferQueue> {
        &self.queue
    }

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    pub fn gpu_mut(&mut self) -> &mut G {
        &mut self.gpu
    }

    pub fn surface_texture(&self) -> Option<TextureId> {
        self.surface_texture
    }

    pub fn framebuffer(&self) -> Option<FramebufferId> {
        self.framebuffer
    }

    pub fn surface_consumer(&self) -> Option<&SurfaceConsumer> {
        self.surface_consumer.as_ref()
    }

    pub fn has_gpu_resources(&self) -> bool {
        self.surface_texture.is_some() || self.framebuffer.is_some()
    }

    /// ### English
    /// Creates the shared surface, its texture and the blit framebuffer (idempotent).
    ///
    /// The surface gets `capacity + min_undequeued_buffers` buffers of `size`, RGBA8888, with
    /// CPU read and write usage. Release first to change `size`.
    ///
    /// ### 中文
    /// 创建共享表面、其纹理以及 blit 用 framebuffer（幂等）。
    ///
    /// 表面分配 `capacity + min_undequeued_buffers` 个 `size` 尺寸的 RGBA8888 缓冲，
    /// 用途为 CPU 读写。若要修改 `size`，需先释放。
    pub fn init_gpu_resources(&mut self, size: PhysicalSize<u32>) -> Result<(), TransferError> {
        let queue = Arc::clone(&self.queue);
        let mut state = queue.lock();

        if self.surface_texture.is_none() {
            let texture = self.gpu.create_texture();
            let (mut window, mut consumer) = shared_surface(queue.min_undequeued_buffers);
            let configured = consumer
                .set_buffer_count(queue.capacity as u32 + window.min_undequeued_buffers())
                .and_then(|()| window.set_buffers_geometry(size, PixelFormat::Rgba8888))
                .and_then(|()| {
                    window.set_usage(SurfaceUsage::SW_READ_OFTEN | SurfaceUsage::SW_WRITE_OFTEN)
                });
            if let Err(err) = configured {
                consumer.abandon();
                self.gpu.delete_texture(texture);
                return Err(err.into());
            }

            log::debug!(
                "shared surface created: {}x{}, {} buffers",
                size.width,
                size.height,
                consumer.buffer_count()
            );
            state.surface_window = Some(window);
            self.surface_consumer = Some(consumer);
            self.surface_texture = Some(texture);
        }

        if self.framebuffer.is_none() {
            self.framebuffer = Some(self.gpu.create_framebuffer());
        }
        Ok(())
    }

    /// ### English
    /// Destroys the shared surface, its texture and the framebuffer. Safe to call repeatedly.
    ///
    /// Pending shared-surface uploads become discards: their buffers go away with the surface.
    ///
    /// ### 中文
    /// 销毁共享表面、其纹理以及 framebuffer。可重复调用。
    ///
    /// 待上传的共享表面条目转为待丢弃：其缓冲随表面一同销毁。
    pub fn release_gpu_resources(&mut self) {
        let queue = Arc::clone(&self.queue);
        let mut state = queue.lock();
        self.release_locked(&mut state);
    }

    fn release_locked(&mut self, state: &mut QueueState) {
        if state.surface_window.is_some() || self.surface_consumer.is_some() {
            state.retire_surface();
        }
        if let Some(mut consumer) = self.surface_consumer.take() {
            consumer.abandon();
        }
        if let Some(framebuffer) = self.framebuffer.take() {
            self.gpu.delete_framebuffer(framebuffer);
        }
        if let Some(texture) = self.surface_texture.take() {
            self.gpu.delete_texture(texture);
            log::debug!("shared surface released");
        }
    }

    /// ### English
    /// Empties the queue: every in-flight entry is discarded (its destination asked to
    /// regenerate), then GPU resources are released. Runs under one lock acquisition.
    ///
    /// ### 中文
    /// 清空队列：所有在途条目被丢弃（请求其目标对象重新生成），随后释放 GPU 资源。
    /// 全程只获取一次锁。
    pub fn clear_all(&mut self) {
        let queue = Arc::clone(&self.queue);
        let mut state = queue.lock();
        if state.mark_pending_discard() {
            queue.slot_available.notify_all();
        }
        let resolved = state.resolve_pending_discards(self.surface_consumer.as_mut());
        if resolved > 0 {
            log::debug!("clear_all discarded {resolved} transfers");
        }
        state.empty_slots = state.capacity();
        self.release_locked(&mut state);
    }
}

impl<G: GpuBackend> Drop for TextureUploader<G> {
    fn drop(&mut self) {
        self.release_gpu_resources();
        self.queue.consumer_attached.store(false, Ordering::Release);
    }
}
