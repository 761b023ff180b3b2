//! ### English
//! Consumer half of the shared surface. Owned by the compositor-side uploader.
//!
//! ### 中文
//! 共享表面的消费者侧，由合成线程侧的 uploader 持有。

use std::sync::Arc;
use std::sync::atomic::Ordering;

use dpi::PhysicalSize;

use crate::engine::error::SurfaceError;
use crate::engine::geometry::Image;

use super::{BufferQueueCore, SurfaceBuffer};

/// ### English
/// Consumer handle: owns the buffer set and the currently latched buffer.
///
/// ### 中文
/// 消费者句柄：持有缓冲集合以及当前锁定的缓冲。
pub struct SurfaceConsumer {
    core: Arc<BufferQueueCore>,
    current: Option<SurfaceBuffer>,
    buffer_count: u32,
}

impl SurfaceConsumer {
    pub(super) fn new(core: Arc<BufferQueueCore>) -> Self {
        Self {
            core,
            current: None,
            buffer_count: 0,
        }
    }

    /// ### English
    /// Replaces the buffer set with `count` fresh buffers (storage is allocated on first write).
    ///
    /// `count` must leave at least one buffer for the producer after the consumer's share.
    ///
    /// ### 中文
    /// 用 `count` 个新缓冲替换缓冲集合（存储在首次写入时分配）。
    ///
    /// `count` 在扣除消费者份额后必须至少给生产者留一个缓冲。
    pub fn set_buffer_count(&mut self, count: u32) -> Result<(), SurfaceError> {
        if self.core.is_abandoned() {
            return Err(SurfaceError::Abandoned);
        }
        let minimum = self.core.min_undequeued_buffers + 1;
        if count < minimum {
            return Err(SurfaceError::InvalidBufferCount {
                requested: count,
                minimum,
            });
        }

        self.core.discard_all();
        self.current = None;
        for index in 0..count as usize {
            self.core.release_to_free(SurfaceBuffer {
                index,
                image: Image::zeroed(PhysicalSize::new(0, 0)),
            });
        }
        self.buffer_count = count;
        Ok(())
    }

    pub fn buffer_count(&self) -> u32 {
        self.buffer_count
    }

    /// ### English
    /// Advances the read pointer: latches the oldest queued buffer and releases the previously
    /// latched one back to the producer.
    ///
    /// ### 中文
    /// 推进读指针：锁定最早入队的缓冲，并把之前锁定的缓冲释放回生产者。
    pub fn update_tex_image(&mut self) -> Result<(), SurfaceError> {
        if self.core.is_abandoned() {
            return Err(SurfaceError::Abandoned);
        }

        let next = self
            .core
            .queued_rx
            .try_recv()
            .map_err(|_| SurfaceError::NoQueuedBuffer)?;
        log::trace!("shared surface buffer {} latched", next.index);
        if let Some(previous) = self.current.replace(next) {
            self.core.release_to_free(previous);
        }
        Ok(())
    }

    /// ### English
    /// Image of the currently latched buffer.
    ///
    /// ### 中文
    /// 当前锁定缓冲的图像。
    pub fn current_image(&self) -> Option<&Image> {
        self.current.as_ref().map(|buffer| &buffer.image)
    }

    /// ### English
    /// Number of buffers written by the producer and not yet latched.
    ///
    /// ### 中文
    /// 生产者已写入、尚未被锁定的缓冲数量。
    pub fn queued_buffers(&self) -> usize {
        self.core.queued_rx.len()
    }

    /// ### English
    /// Abandons the surface: every later producer or consumer call fails. Idempotent.
    ///
    /// ### 中文
    /// 放弃该表面：此后生产者与消费者的调用均失败。幂等。
    pub fn abandon(&mut self) {
        if self.core.abandoned.swap(true, Ordering::AcqRel) {
            return;
        }
        self.current = None;
        self.core.discard_all();
    }

    pub fn is_abandoned(&self) -> bool {
        self.core.is_abandoned()
    }
}

impl Drop for SurfaceConsumer {
    fn drop(&mut self) {
        self.abandon();
    }
}
