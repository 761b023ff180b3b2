//! ### English
//! Producer half of the shared surface (the host-window handle producers write through).
//!
//! ### 中文
//! 共享表面的生产者侧（生产者用于写入的宿主窗口句柄）。

use std::sync::Arc;

use dpi::PhysicalSize;

use crate::engine::error::SurfaceError;
use crate::engine::geometry::Image;

use super::{BufferQueueCore, PixelFormat, SurfaceUsage};

/// ### English
/// Producer handle: configures buffer geometry/usage and writes whole images.
///
/// ### 中文
/// 生产者句柄：配置缓冲几何/用途并整块写入图像。
pub struct SurfaceWindow {
    core: Arc<BufferQueueCore>,
    geometry: Option<(PhysicalSize<u32>, PixelFormat)>,
    usage: SurfaceUsage,
}

impl SurfaceWindow {
    pub(super) fn new(core: Arc<BufferQueueCore>) -> Self {
        Self {
            core,
            geometry: None,
            usage: SurfaceUsage::NONE,
        }
    }

    fn ensure_alive(&self) -> Result<(), SurfaceError> {
        if self.core.is_abandoned() {
            return Err(SurfaceError::Abandoned);
        }
        Ok(())
    }

    /// ### English
    /// Platform query: buffers the consumer may keep beyond those the producer queued.
    ///
    /// ### 中文
    /// 平台查询：消费者在生产者已入队缓冲之外可额外持有的缓冲数。
    pub fn min_undequeued_buffers(&self) -> u32 {
        self.core.min_undequeued_buffers
    }

    /// ### English
    /// Sets the size and format of buffers handed out from now on.
    ///
    /// ### 中文
    /// 设置此后分发缓冲的尺寸与格式。
    pub fn set_buffers_geometry(
        &mut self,
        size: PhysicalSize<u32>,
        format: PixelFormat,
    ) -> Result<(), SurfaceError> {
        self.ensure_alive()?;
        if size.width == 0 || size.height == 0 {
            return Err(SurfaceError::ZeroGeometry);
        }
        self.geometry = Some((size, format));
        Ok(())
    }

    pub fn set_usage(&mut self, usage: SurfaceUsage) -> Result<(), SurfaceError> {
        self.ensure_alive()?;
        self.usage = usage;
        Ok(())
    }

    pub fn geometry(&self) -> Option<(PhysicalSize<u32>, PixelFormat)> {
        self.geometry
    }

    pub fn usage(&self) -> SurfaceUsage {
        self.usage
    }

    /// ### English
    /// Dequeues a free buffer, writes `image` into its top-left corner and queues it for the
    /// consumer. Never blocks: with no free buffer the write fails with `NoFreeBuffer`.
    ///
    /// ### 中文
    /// dequeue 一个空闲缓冲，将 `image` 写入其左上角，并入队交给消费者。
    /// 从不阻塞：没有空闲缓冲时返回 `NoFreeBuffer`。
    pub fn write_image(&mut self, image: &Image) -> Result<(), SurfaceError> {
        self.ensure_alive()?;
        let Some((buffer_size, _format)) = self.geometry else {
            return Err(SurfaceError::GeometryNotSet);
        };
        if !self.usage.contains(SurfaceUsage::SW_WRITE_OFTEN) {
            return Err(SurfaceError::WriteNotPermitted);
        }
        if image.width() > buffer_size.width || image.height() > buffer_size.height {
            return Err(SurfaceError::ImageTooLarge {
                image_width: image.width(),
                image_height: image.height(),
                buffer_width: buffer_size.width,
                buffer_height: buffer_size.height,
            });
        }

        let mut buffer = self
            .core
            .free_rx
            .try_recv()
            .map_err(|_| SurfaceError::NoFreeBuffer)?;

        // Lock: (re)allocate storage lazily when the geometry changed since last use.
        if buffer.image.size() != buffer_size {
            buffer.image = Image::zeroed(buffer_size);
        }
        buffer
            .image
            .blit_from(image, 0, 0, 0, 0, image.width(), image.height());

        log::trace!("shared surface buffer {} queued", buffer.index);
        self.core.queue(buffer);
        Ok(())
    }
}
