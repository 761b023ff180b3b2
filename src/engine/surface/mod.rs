//! ### English
//! Buffer-queued shared surface: the producer side writes whole buffers (dequeue → write →
//! enqueue), the consumer side latches them one at a time (`update_tex_image`).
//!
//! Buffers circulate between two channels: `free` (ready to be dequeued by the producer) and
//! `queued` (written, waiting for the consumer). The buffer latched by the consumer lives in
//! neither channel until the next latch releases it back to `free`.
//!
//! ### 中文
//! 缓冲队列式共享表面：生产者侧整块写入缓冲（dequeue → 写入 → enqueue），
//! 消费者侧逐个锁定（`update_tex_image`）。
//!
//! 缓冲在两个 channel 间流转：`free`（可被生产者 dequeue）与 `queued`（已写入、等待消费者）。
//! 消费者当前锁定的缓冲不在任何 channel 中，直到下一次锁定时才被释放回 `free`。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel as channel;

use super::geometry::Image;

mod consumer;
mod window;

pub use consumer::SurfaceConsumer;
pub use window::SurfaceWindow;

/// ### English
/// Pixel layout of surface buffers.
///
/// ### 中文
/// 表面缓冲的像素格式。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PixelFormat {
    #[default]
    Rgba8888,
}

/// ### English
/// Usage bits declared by the producer (mirrors gralloc software usage flags).
///
/// ### 中文
/// 生产者声明的用途位（对应 gralloc 的软件访问标志）。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfaceUsage(u32);

impl SurfaceUsage {
    pub const NONE: SurfaceUsage = SurfaceUsage(0);
    pub const SW_READ_OFTEN: SurfaceUsage = SurfaceUsage(1 << 0);
    pub const SW_WRITE_OFTEN: SurfaceUsage = SurfaceUsage(1 << 1);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: SurfaceUsage) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for SurfaceUsage {
    type Output = SurfaceUsage;

    fn bitor(self, rhs: SurfaceUsage) -> SurfaceUsage {
        SurfaceUsage(self.0 | rhs.0)
    }
}

/// ### English
/// One circulating buffer.
///
/// ### 中文
/// 一个流转中的缓冲。
#[derive(Debug)]
pub(crate) struct SurfaceBuffer {
    pub(crate) index: usize,
    pub(crate) image: Image,
}

/// ### English
/// State shared by both halves of a surface.
///
/// ### 中文
/// 表面两侧共享的状态。
pub(crate) struct BufferQueueCore {
    free_tx: channel::Sender<SurfaceBuffer>,
    free_rx: channel::Receiver<SurfaceBuffer>,
    queued_tx: channel::Sender<SurfaceBuffer>,
    queued_rx: channel::Receiver<SurfaceBuffer>,
    /// ### English
    /// Set once the consumer abandons the surface; both halves fail afterwards.
    ///
    /// ### 中文
    /// 消费者放弃表面后置位；此后两侧操作均失败。
    abandoned: AtomicBool,
    /// ### English
    /// Platform "min undequeued buffers" value reported to the producer.
    ///
    /// ### 中文
    /// 向生产者报告的平台 “min undequeued buffers” 值。
    min_undequeued_buffers: u32,
}

impl BufferQueueCore {
    fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::Acquire)
    }

    fn release_to_free(&self, buffer: SurfaceBuffer) {
        // Both ends of every channel live in the core, so sends only fail after teardown.
        if self.free_tx.send(buffer).is_err() {
            log::error!("shared surface free list is disconnected");
        }
    }

    fn queue(&self, buffer: SurfaceBuffer) {
        if self.queued_tx.send(buffer).is_err() {
            log::error!("shared surface queue is disconnected");
        }
    }

    fn discard_all(&self) {
        while self.free_rx.try_recv().is_ok() {}
        while self.queued_rx.try_recv().is_ok() {}
    }
}

/// ### English
/// Creates a connected producer/consumer pair with no buffers yet.
///
/// The consumer must call `set_buffer_count` and the producer `set_buffers_geometry` before
/// the first write.
///
/// #### Parameters
/// - `min_undequeued_buffers`: Extra buffers the consumer may hold (platform query result).
///
/// ### 中文
/// 创建一对已连接、尚无缓冲的生产者/消费者。
///
/// 首次写入前，消费者必须调用 `set_buffer_count`，生产者必须调用 `set_buffers_geometry`。
///
/// #### 参数
/// - `min_undequeued_buffers`：消费者可额外持有的缓冲数（平台查询结果）。
pub fn shared_surface(min_undequeued_buffers: u32) -> (SurfaceWindow, SurfaceConsumer) {
    let (free_tx, free_rx) = channel::unbounded();
    let (queued_tx, queued_rx) = channel::unbounded();
    let core = Arc::new(BufferQueueCore {
        free_tx,
        free_rx,
        queued_tx,
        queued_rx,
        abandoned: AtomicBool::new(false),
        min_undequeued_buffers,
    });
    (
        SurfaceWindow::new(Arc::clone(&core)),
        SurfaceConsumer::new(core),
    )
}

#[cfg(test)]
mod tests {
    use dpi::PhysicalSize;

    use super::*;
    use crate::engine::error::SurfaceError;
    use crate::engine::geometry::Color;

    fn configured(count: u32, size: PhysicalSize<u32>) -> (SurfaceWindow, SurfaceConsumer) {
        let (mut window, mut consumer) = shared_surface(1);
        consumer.set_buffer_count(count).unwrap();
        window
            .set_buffers_geometry(size, PixelFormat::Rgba8888)
            .unwrap();
        window
            .set_usage(SurfaceUsage::SW_READ_OFTEN | SurfaceUsage::SW_WRITE_OFTEN)
            .unwrap();
        (window, consumer)
    }

    #[test]
    fn buffers_circulate_in_order() {
        let size = PhysicalSize::new(4, 4);
        let (mut window, mut consumer) = configured(3, size);
        let red = Color::rgba(255, 0, 0, 255);
        let blue = Color::rgba(0, 0, 255, 255);

        window.write_image(&Image::filled(size, red)).unwrap();
        window.write_image(&Image::filled(size, blue)).unwrap();

        consumer.update_tex_image().unwrap();
        assert_eq!(consumer.current_image().unwrap().pixel(0, 0), Some(red));
        consumer.update_tex_image().unwrap();
        assert_eq!(consumer.current_image().unwrap().pixel(0, 0), Some(blue));
        assert_eq!(
            consumer.update_tex_image(),
            Err(SurfaceError::NoQueuedBuffer)
        );
    }

    #[test]
    fn producer_runs_out_without_consumer_advance() {
        let size = PhysicalSize::new(2, 2);
        let (mut window, mut consumer) = configured(2, size);
        let image = Image::zeroed(size);

        window.write_image(&image).unwrap();
        window.write_image(&image).unwrap();
        assert_eq!(window.write_image(&image), Err(SurfaceError::NoFreeBuffer));

        // Latching the first buffer does not free anything yet; latching the second
        // releases the first.
        consumer.update_tex_image().unwrap();
        assert_eq!(window.write_image(&image), Err(SurfaceError::NoFreeBuffer));
        consumer.update_tex_image().unwrap();
        window.write_image(&image).unwrap();
    }

    #[test]
    fn smaller_image_lands_top_left() {
        let size = PhysicalSize::new(4, 4);
        let (mut window, mut consumer) = configured(2, size);
        let patch = Image::filled(PhysicalSize::new(2, 2), Color::WHITE);

        window.write_image(&patch).unwrap();
        consumer.update_tex_image().unwrap();

        let latched = consumer.current_image().unwrap();
        assert_eq!(latched.size(), size);
        assert_eq!(latched.pixel(1, 1), Some(Color::WHITE));
        assert_eq!(latched.pixel(2, 2), Some(Color::TRANSPARENT));
    }

    #[test]
    fn oversized_image_is_rejected() {
        let (mut window, _consumer) = configured(2, PhysicalSize::new(2, 2));
        let err = window
            .write_image(&Image::zeroed(PhysicalSize::new(3, 2)))
            .unwrap_err();
        assert!(matches!(err, SurfaceError::ImageTooLarge { .. }));
    }

    #[test]
    fn write_requires_geometry_and_usage() {
        let (mut window, mut consumer) = shared_surface(1);
        consumer.set_buffer_count(2).unwrap();
        let image = Image::zeroed(PhysicalSize::new(1, 1));
        assert_eq!(window.write_image(&image), Err(SurfaceError::GeometryNotSet));

        window
            .set_buffers_geometry(PhysicalSize::new(1, 1), PixelFormat::Rgba8888)
            .unwrap();
        assert_eq!(
            window.write_image(&image),
            Err(SurfaceError::WriteNotPermitted)
        );
    }

    #[test]
    fn abandon_fails_both_halves() {
        let size = PhysicalSize::new(2, 2);
        let (mut window, mut consumer) = configured(2, size);
        window.write_image(&Image::zeroed(size)).unwrap();

        consumer.abandon();

        assert_eq!(
            window.write_image(&Image::zeroed(size)),
            Err(SurfaceError::Abandoned)
        );
        assert_eq!(consumer.update_tex_image(), Err(SurfaceError::Abandoned));
        assert!(consumer.current_image().is_none());
    }

    #[test]
    fn buffer_count_respects_minimum() {
        let (window, mut consumer) = shared_surface(2);
        assert_eq!(window.min_undequeued_buffers(), 2);
        assert_eq!(
            consumer.set_buffer_count(2),
            Err(SurfaceError::InvalidBufferCount {
                requested: 2,
                minimum: 3
            })
        );
        consumer.set_buffer_count(3).unwrap();
        assert_eq!(consumer.buffer_count(), 3);
    }
}
