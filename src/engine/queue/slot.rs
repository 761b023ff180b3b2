//! ### English
//! Transfer slot storage: one ring entry per in-flight transfer, plus the lightweight entries
//! of the uniform-color side queue.
//!
//! ### 中文
//! 传输槽位存储：每个在途传输占用一个环形条目；另有纯色旁路队列的轻量条目。

use std::sync::{Arc, Weak};

use crate::engine::destination::{Destination, TextureKey};
use crate::engine::geometry::{Color, DirtyRect, Image};

/// ### English
/// Slot lifecycle: `Empty → PendingUpload → (Empty | PendingDiscard → Empty)`.
///
/// ### 中文
/// 槽位生命周期：`Empty → PendingUpload → (Empty | PendingDiscard → Empty)`。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlotStatus {
    #[default]
    Empty,
    PendingUpload,
    PendingDiscard,
}

/// ### English
/// How a slot's content reaches the destination texture.
///
/// ### 中文
/// 槽位内容到达目标纹理的方式。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UploadKind {
    /// ### English
    /// Pixels are kept in the slot and uploaded straight into the texture.
    ///
    /// ### 中文
    /// 像素保存在槽位中，直接上传到纹理。
    Direct,
    /// ### English
    /// Pixels were written into the shared surface and are blitted from it.
    ///
    /// ### 中文
    /// 像素已写入共享表面，之后从表面 blit。
    #[default]
    SharedSurface,
}

/// ### English
/// What enqueue captured from a request: the weak destination, the texture version expected at
/// drain time and the clamped dirty region (`None` for a full update).
///
/// ### 中文
/// 入队时从请求中捕获的内容：目标对象的弱引用、drain 时预期的纹理版本以及裁剪后的脏区域
/// （整块更新为 `None`）。
pub(crate) struct SlotCapture {
    pub(crate) destination: Weak<dyn Destination>,
    pub(crate) expected_texture: Option<TextureKey>,
    pub(crate) dirty: Option<DirtyRect>,
}

impl SlotCapture {
    /// ### English
    /// Upgrades the destination if it still expects the captured texture version.
    ///
    /// Returns `None` when the transfer is stale: the destination is gone, has no current
    /// texture, or its current texture differs from the expected one.
    ///
    /// ### 中文
    /// 若目标对象仍在等待被捕获的纹理版本，则升级为强引用返回。
    ///
    /// 传输已过期时返回 `None`：目标对象已销毁、没有当前纹理，或当前纹理与预期不符。
    pub(crate) fn resolve(&self) -> Option<Arc<dyn Destination>> {
        let destination = self.destination.upgrade()?;
        let current = destination.current_texture()?;
        if Some(current.key) != self.expected_texture {
            return None;
        }
        Some(destination)
    }
}

/// ### English
/// One ring position.
///
/// ### 中文
/// 环形缓冲中的一个位置。
pub(crate) struct TransferSlot {
    pub(crate) status: SlotStatus,
    pub(crate) upload_kind: UploadKind,
    pub(crate) capture: Option<SlotCapture>,
    /// ### English
    /// Persistent pixel buffer for direct uploads, allocated on first use and reused.
    ///
    /// ### 中文
    /// 直接上传使用的持久像素缓冲：首次使用时分配，之后复用。
    pub(crate) payload: Option<Image>,
    /// ### English
    /// Surface generation the entry's buffer was queued into (shared-surface entries only).
    ///
    /// ### 中文
    /// 条目缓冲所入队的表面代数（仅共享表面条目）。
    pub(crate) surface_generation: Option<u64>,
}

impl TransferSlot {
    pub(crate) fn new() -> Self {
        Self {
            status: SlotStatus::Empty,
            upload_kind: UploadKind::default(),
            capture: None,
            payload: None,
            surface_generation: None,
        }
    }

    /// ### English
    /// Whether this entry holds a queued buffer in the surface of `generation`.
    ///
    /// ### 中文
    /// 该条目是否在第 `generation` 代表面中持有已入队的缓冲。
    pub(crate) fn owns_surface_buffer(&self, generation: u64) -> bool {
        self.upload_kind == UploadKind::SharedSurface && self.surface_generation == Some(generation)
    }

    /// ### English
    /// Returns the slot to `Empty` and hands back the captured references. The payload buffer
    /// stays allocated for reuse.
    ///
    /// ### 中文
    /// 将槽位恢复为 `Empty` 并交出捕获的引用。payload 缓冲保留以便复用。
    pub(crate) fn take(&mut self) -> Option<SlotCapture> {
        self.status = SlotStatus::Empty;
        self.capture.take()
    }

    pub(crate) fn snapshot(&self) -> SlotSnapshot {
        SlotSnapshot {
            status: self.status,
            upload_kind: self.upload_kind,
            expected_texture: self
                .capture
                .as_ref()
                .and_then(|capture| capture.expected_texture),
            destination_alive: self
                .capture
                .as_ref()
                .is_some_and(|capture| capture.destination.strong_count() > 0),
        }
    }
}

/// ### English
/// Side-queue entry for the uniform-color fast path (no pixels).
///
/// ### 中文
/// 纯色快路径的旁路队列条目（不含像素）。
pub(crate) struct UniformEntry {
    pub(crate) status: SlotStatus,
    pub(crate) capture: SlotCapture,
    pub(crate) color: Color,
}

/// ### English
/// Read-only view of one ring slot.
///
/// ### 中文
/// 单个环形槽位的只读视图。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotSnapshot {
    pub status: SlotStatus,
    pub upload_kind: UploadKind,
    pub expected_texture: Option<TextureKey>,
    pub destination_alive: bool,
}
