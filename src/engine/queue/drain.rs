//! ### English
//! Drain engine: one full pass over the side queue and the ring per compositor cycle.
//!
//! ### 中文
//! drain 引擎：每个合成周期完整处理一遍旁路队列与环形缓冲。

use std::sync::Arc;

use crate::engine::gpu::GpuBackend;
use crate::engine::surface::SurfaceConsumer;

use super::lifecycle::advance_surface;
use super::slot::{SlotStatus, UploadKind};
use super::strategy::{Commit, SurfaceSource};
use super::uploader::{DrainReport, TextureUploader};
use super::QueueState;

impl QueueState {
    /// ### English
    /// Applies and clears the uniform-color side queue.
    ///
    /// #### Returns
    /// `(applied, stale)` entry counts.
    ///
    /// ### 中文
    /// 应用并清空纯色旁路队列。
    ///
    /// #### 返回值
    /// `(已应用, 已过期)` 的条目数量。
    fn drain_side_queue(&mut self) -> (usize, usize) {
        let mut applied = 0usize;
        let mut stale = 0usize;
        for entry in self.side_queue.drain(..) {
            if entry.status != SlotStatus::PendingUpload {
                log::warn!("uniform entry in unexpected state {:?}", entry.status);
                continue;
            }
            match entry.capture.resolve() {
                Some(destination) => {
                    destination.set_uniform_color(entry.color);
                    destination.mark_transfer_complete();
                    applied += 1;
                }
                None => {
                    log::debug!("stale uniform entry dropped");
                    stale += 1;
                }
            }
        }
        (applied, stale)
    }
}

impl<G: GpuBackend> TextureUploader<G> {
    /// ### English
    /// Runs one drain cycle. Call once per frame on the GPU thread with the context current.
    ///
    /// Order: pending discards, then uniform entries, then the ring from its oldest entry for
    /// exactly `capacity` positions. GL state is saved before the first blit and restored after
    /// the last. Every slot ends up empty and blocked producers are woken.
    ///
    /// ### 中文
    /// 执行一次 drain 周期。每帧在 GPU 线程、上下文为当前时调用一次。
    ///
    /// 顺序：待丢弃条目，然后纯色条目，最后从最旧条目开始遍历环形缓冲恰好 `capacity` 个位置。
    /// 首次 blit 前保存 GL 状态，最后一次之后恢复。所有槽位最终为空，并唤醒阻塞的生产者。
    pub fn drain_once(&mut self) -> DrainReport {
        let queue = Arc::clone(&self.queue);
        let mut guard = queue.lock();
        let state = &mut *guard;
        let mut report = DrainReport {
            discards_resolved: state.resolve_pending_discards(self.surface_consumer.as_mut()),
            ..DrainReport::default()
        };

        if !state.has_gpu_context {
            log::debug!("GPU context marked live by drain");
            state.has_gpu_context = true;
        }

        let (applied, stale) = state.drain_side_queue();
        report.uniform_updates = applied;
        report.stale_dropped = stale;

        let capacity = state.capacity();
        let generation = state.surface_generation;
        let mut index = state.oldest_index();
        let mut saved_state = None;
        for _ in 0..capacity {
            let current = index;
            index = (index + 1) % capacity;

            let slot = &mut state.slots[current];
            if slot.status != SlotStatus::PendingUpload {
                continue;
            }
            let kind = slot.upload_kind;
            let owns_buffer = slot.owns_surface_buffer(generation);
            let Some(capture) = slot.take() else {
                log::error!("transfer slot {current} pending without a capture");
                continue;
            };

            let advanced = match kind {
                UploadKind::Direct => true,
                UploadKind::SharedSurface if owns_buffer => {
                    advance_surface(self.surface_consumer.as_mut())
                }
                UploadKind::SharedSurface => {
                    log::error!("transfer slot {current} refers to a released shared surface");
                    false
                }
            };

            let Some(destination) = capture.resolve() else {
                log::debug!("stale transfer in slot {current} dropped");
                report.stale_dropped += 1;
                continue;
            };
            if !advanced {
                destination.mark_transfer_failed();
                report.failed += 1;
                continue;
            }

            let Some(target) = destination.materialize_writable_texture(&mut self.gpu) else {
                log::error!("transfer slot {current}: destination has no writable texture");
                destination.mark_transfer_failed();
                report.failed += 1;
                continue;
            };

            if kind == UploadKind::SharedSurface && saved_state.is_none() {
                saved_state = Some(self.gpu.save_state());
            }

            let commit = Commit {
                target,
                previous: destination.previous_texture(),
                dirty: capture.dirty,
                payload: slot.payload.as_ref(),
            };
            let surface = SurfaceSource {
                framebuffer: self.framebuffer,
                texture: self.surface_texture,
                latched: self
                    .surface_consumer
                    .as_ref()
                    .and_then(SurfaceConsumer::current_image),
            };
            match kind.commit(&mut self.gpu, &commit, &surface) {
                Ok(()) => {
                    destination.mark_uniform(false);
                    destination.mark_transfer_complete();
                    match kind {
                        UploadKind::Direct => report.direct_uploads += 1,
                        UploadKind::SharedSurface => report.surface_blits += 1,
                    }
                }
                Err(err) => {
                    log::error!("transfer slot {current}: {kind:?} upload failed: {err}");
                    destination.mark_transfer_failed();
                    report.failed += 1;
                }
            }
        }

        if let Some(saved) = saved_state {
            self.gpu.bind_default_framebuffer();
            self.gpu.restore_state(&saved);
            if let Err(err) = self.gpu.check_error("drain_once") {
                log::error!("GL error after shared surface blits: {err}");
            }
        }

        state.empty_slots = capacity;
        queue.slot_available.notify_all();
        log::trace!("drain finished: {report:?}");
        report
    }
}
