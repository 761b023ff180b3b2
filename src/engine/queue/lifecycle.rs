//! ### English
//! Discard, shutdown and context-liveness control.
//!
//! Teardown of many destinations must start with `request_shutdown_or_switch`: it releases
//! producers blocked in the admission gate before anyone waits on their slots.
//!
//! ### 中文
//! discard、关闭与上下文存活控制。
//!
//! 批量销毁目标对象之前必须先调用 `request_shutdown_or_switch`：它会在任何人等待槽位之前
//! 释放阻塞在准入门中的生产者。

use crate::engine::surface::SurfaceConsumer;

use super::slot::{SlotStatus, UploadKind};
use super::{QueueState, TransferQueue};

impl QueueState {
    /// ### English
    /// Flips every pending upload to a pending discard, drops the side queue and marks the
    /// context not live.
    ///
    /// #### Returns
    /// `true` when the context was live before, i.e. blocked producers need one wakeup.
    ///
    /// ### 中文
    /// 将所有待上传条目改为待丢弃，清空旁路队列，并标记上下文不可用。
    ///
    /// #### 返回值
    /// 若此前上下文存活（阻塞的生产者需要被唤醒一次）则返回 `true`。
    pub(crate) fn mark_pending_discard(&mut self) -> bool {
        let mut flipped = 0usize;
        for slot in self.slots.iter_mut() {
            if slot.status == SlotStatus::PendingUpload {
                slot.status = SlotStatus::PendingDiscard;
                flipped += 1;
            }
        }
        self.side_queue.clear();
        if flipped > 0 {
            log::debug!("{flipped} pending transfers marked for discard");
        }

        let was_live = self.has_gpu_context;
        self.has_gpu_context = false;
        was_live
    }

    /// ### English
    /// Resolves every pending discard, oldest first. Entries holding a buffer in the current
    /// surface still advance the consumer read pointer so buffer accounting stays in step with
    /// the producer side.
    ///
    /// #### Returns
    /// Number of resolved entries.
    ///
    /// ### 中文
    /// 从最旧条目开始处理所有待丢弃条目。在当前表面中持有缓冲的条目仍会推进消费者读指针，
    /// 使缓冲计数与生产者侧保持一致。
    ///
    /// #### 返回值
    /// 处理的条目数量。
    pub(crate) fn resolve_pending_discards(
        &mut self,
        mut consumer: Option<&mut SurfaceConsumer>,
    ) -> usize {
        let capacity = self.capacity();
        let generation = self.surface_generation;
        let mut index = self.oldest_index();
        let mut resolved = 0usize;
        for _ in 0..capacity {
            let slot = &mut self.slots[index];
            if slot.status == SlotStatus::PendingDiscard {
                if slot.owns_surface_buffer(generation) {
                    advance_surface(consumer.as_deref_mut());
                }
                if let Some(destination) = slot.take().and_then(|capture| capture.resolve()) {
                    destination.discard_texture();
                }
                resolved += 1;
            }
            index = (index + 1) % capacity;
        }
        resolved
    }

    /// ### English
    /// Retires the current shared surface. Pending shared-surface uploads lose their buffers
    /// with it, so they become discards tied to the retired generation.
    ///
    /// #### Returns
    /// Number of uploads turned into discards.
    ///
    /// ### 中文
    /// 退役当前共享表面。待上传的共享表面条目随之失去缓冲，因此转为绑定在已退役代数上的
    /// 待丢弃条目。
    ///
    /// #### 返回值
    /// 转为 discard 的上传条目数量。
    pub(crate) fn retire_surface(&mut self) -> usize {
        let mut orphaned = 0usize;
        for slot in self.slots.iter_mut() {
            if slot.status == SlotStatus::PendingUpload
                && slot.upload_kind == UploadKind::SharedSurface
            {
                slot.status = SlotStatus::PendingDiscard;
                orphaned += 1;
            }
        }
        self.surface_window = None;
        self.surface_generation += 1;
        if orphaned > 0 {
            log::debug!("{orphaned} shared surface transfers orphaned by surface release");
        }
        orphaned
    }
}

/// ### English
/// Advances the shared surface by one buffer. Failures are logged; the caller decides what
/// they mean for the entry.
///
/// ### 中文
/// 将共享表面推进一个缓冲。失败只记录日志，由调用方决定其对条目的影响。
pub(crate) fn advance_surface(consumer: Option<&mut SurfaceConsumer>) -> bool {
    let Some(consumer) = consumer else {
        log::error!("shared surface entry drained without a surface consumer");
        return false;
    };
    match consumer.update_tex_image() {
        Ok(()) => true,
        Err(err) => {
            log::error!("shared surface update_tex_image failed: {err}");
            false
        }
    }
}

impl TransferQueue {
    /// ### English
    /// Converts all in-flight work into discards and unblocks waiting producers (once, on the
    /// live-to-lost edge). Producers are refused until the next drain.
    ///
    /// ### 中文
    /// 将所有在途工作转为 discard，并唤醒等待中的生产者（仅在“存活到丢失”的边沿唤醒一次）。
    /// 在下一次 drain 之前，生产者会被拒绝。
    pub fn request_shutdown_or_switch(&self) {
        let mut state = self.lock();
        if state.mark_pending_discard() {
            self.slot_available.notify_all();
        }
    }

    /// ### English
    /// The consumer lost its GPU context.
    ///
    /// ### 中文
    /// 消费者丢失了 GPU 上下文。
    pub fn notify_context_lost(&self) {
        log::debug!("GPU context lost, discarding in-flight transfers");
        self.request_shutdown_or_switch();
    }

    /// ### English
    /// Marks the context live again without waiting for the next drain.
    ///
    /// ### 中文
    /// 立即将上下文标记为存活，而不必等到下一次 drain。
    pub fn notify_context_regained(&self) {
        self.lock().has_gpu_context = true;
    }

    /// ### English
    /// Latches (or clears) the interruption flag. Setting it wakes every blocked producer once;
    /// setting it again while latched does nothing.
    ///
    /// ### 中文
    /// 锁存（或清除）中断标记。置位时唤醒所有阻塞的生产者一次；已锁存时再次置位不做任何事。
    pub fn interrupt(&self, interrupted: bool) {
        let mut state = self.lock();
        let was_interrupted = std::mem::replace(&mut state.interrupted, interrupted);
        if interrupted && !was_interrupted {
            self.slot_available.notify_all();
        }
    }

    /// ### English
    /// Switches the strategy used by later enqueues. Entries queued under the old strategy are
    /// discarded first; nothing happens when `kind` is already current.
    ///
    /// ### 中文
    /// 切换此后入队所用的策略。旧策略下已入队的条目会先被丢弃；`kind` 未变化时不做任何事。
    pub fn set_upload_strategy(&self, kind: UploadKind) {
        let mut state = self.lock();
        if state.upload_strategy == kind {
            return;
        }

        if state.mark_pending_discard() {
            self.slot_available.notify_all();
        }
        state.upload_strategy = kind;
        log::info!("transfer queue upload strategy set to {kind:?}");
    }
}
