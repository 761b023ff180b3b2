//! ### English
//! Producer-side enqueue paths: the ring (`try_update_with_pixels`) and the uniform-color side
//! queue (`enqueue_uniform`).
//!
//! ### 中文
//! 生产者侧入队路径：环形缓冲（`try_update_with_pixels`）与纯色旁路队列（`enqueue_uniform`）。

use std::sync::Arc;

use crate::engine::geometry::{Color, Image};

use super::slot::{SlotCapture, SlotStatus, UniformEntry, UploadKind};
use super::{QueueState, TileUpdate, TransferQueue};

/// ### English
/// Captures a weak destination, its current texture key and the dirty region clamped to that
/// texture.
///
/// ### 中文
/// 捕获目标对象的弱引用、其当前纹理 key，以及按该纹理裁剪后的脏区域。
fn capture_request(update: &TileUpdate) -> SlotCapture {
    let current = update.destination.current_texture();
    let dirty = match (update.dirty, current) {
        (Some(rect), Some(texture)) => Some(rect.clamp_to(texture.size)),
        (dirty, _) => dirty,
    };
    SlotCapture {
        destination: Arc::downgrade(&update.destination),
        expected_texture: current.map(|texture| texture.key),
        dirty,
    }
}

impl QueueState {
    /// ### English
    /// Writes `update` into the next ring slot. The caller has passed the admission gate.
    ///
    /// ### 中文
    /// 将 `update` 写入下一个环形槽位。调用方已通过准入门。
    fn add_item(&mut self, update: &TileUpdate, kind: UploadKind, image: &Image) {
        self.write_index = (self.write_index + 1) % self.capacity();
        let index = self.write_index;
        let generation = self.surface_generation;
        let slot = &mut self.slots[index];

        let was_empty = slot.status == SlotStatus::Empty;
        if !was_empty {
            log::error!(
                "transfer slot {index} reused while {:?}; previous entry overwritten",
                slot.status
            );
        }

        slot.status = SlotStatus::PendingUpload;
        slot.upload_kind = kind;
        slot.capture = Some(capture_request(update));
        slot.surface_generation =
            (kind == UploadKind::SharedSurface).then_some(generation);
        if kind == UploadKind::Direct {
            slot.payload
                .get_or_insert_with(|| Image::zeroed(image.size()))
                .copy_from(image);
        }

        if was_empty {
            self.empty_slots = self.empty_slots.saturating_sub(1);
        }
    }
}

impl TransferQueue {
    /// ### English
    /// Reserves a slot, writes `image` into the shared surface when the current strategy needs
    /// it, and enqueues `update`, all under one lock acquisition.
    ///
    /// May block while the ring is full. Returns `false` without enqueueing when admission was
    /// denied (interrupted or context lost) or the surface write failed; the caller then has to
    /// reschedule the destination.
    ///
    /// #### Parameters
    /// - `update`: Destination and optional dirty rectangle.
    /// - `image`: RGBA8 content. For partial updates the dirty content sits at the image's
    ///   top-left corner.
    ///
    /// ### 中文
    /// 预留槽位；若当前策略需要则把 `image` 写入共享表面；然后把 `update` 入队。
    /// 整个过程只获取一次锁。
    ///
    /// 环形缓冲已满时可能阻塞。准入被拒（中断或上下文丢失）或表面写入失败时返回 `false`
    /// 且不入队；调用方需要重新调度目标对象。
    ///
    /// #### 参数
    /// - `update`：目标对象与可选的脏矩形。
    /// - `image`：RGBA8 内容。局部更新时，脏区内容位于图像左上角。
    pub fn try_update_with_pixels(&self, update: &TileUpdate, image: &Image) -> bool {
        let (mut state, ready) = self.ready_for_update(self.lock());
        if !ready {
            log::debug!("transfer queue not ready, update refused");
            return false;
        }

        let kind = state.upload_strategy;
        if kind == UploadKind::SharedSurface {
            let Some(window) = state.surface_window.as_mut() else {
                log::error!("shared surface upload requested before GPU resources exist");
                return false;
            };
            if let Err(err) = window.write_image(image) {
                log::error!("shared surface write failed: {err}");
                return false;
            }
        }

        state.add_item(update, kind, image);
        true
    }

    /// ### English
    /// Like [`try_update_with_pixels`](Self::try_update_with_pixels), but on failure tells the
    /// destination its transfer failed so it gets repainted.
    ///
    /// ### 中文
    /// 与 [`try_update_with_pixels`](Self::try_update_with_pixels) 相同，但失败时通知目标对象
    /// 传输失败，使其被重新绘制。
    pub fn update_with_pixels(&self, update: &TileUpdate, image: &Image) {
        if !self.try_update_with_pixels(update, image) {
            update.destination.mark_transfer_failed();
        }
    }

    /// ### English
    /// Queues a uniform-color update. Never blocks and never touches the ring.
    ///
    /// ### 中文
    /// 将纯色更新入队。从不阻塞，也不占用环形缓冲。
    pub fn enqueue_uniform(&self, update: &TileUpdate, color: Color) {
        let mut state = self.lock();
        state.side_queue.push(UniformEntry {
            status: SlotStatus::PendingUpload,
            capture: capture_request(update),
            color,
        });
    }
}
