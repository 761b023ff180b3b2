//! ### English
//! Construction-time configuration for `TransferQueue`.
//!
//! Embedders that cross an ABI boundary can pass the same options as a `u32` bitmask.
//!
//! ### 中文
//! `TransferQueue` 的构造期配置。
//!
//! 需要跨 ABI 边界的宿主可以用 `u32` 位掩码传入同样的选项。

use super::queue::UploadKind;

/// ### English
/// Ring capacity used when memory is constrained (single in-flight transfer).
///
/// ### 中文
/// 内存受限时使用的环形容量（同时仅一个在途传输）。
pub const MINIMAL_QUEUE_CAPACITY: usize = 1;

/// ### English
/// Ring capacity used by default.
///
/// ### 中文
/// 默认使用的环形容量。
pub const EFFICIENT_QUEUE_CAPACITY: usize = 6;

/// ### English
/// Use the minimal ring capacity (`MINIMAL_QUEUE_CAPACITY`).
///
/// ### 中文
/// 使用最小环形容量（`MINIMAL_QUEUE_CAPACITY`）。
pub const TRANSFER_QUEUE_FLAG_MINIMAL_MEMORY: u32 = 1 << 0;

/// ### English
/// Start with the shared-surface (blit) upload strategy instead of direct upload.
///
/// ### 中文
/// 初始上传策略使用共享表面（blit），而不是直接上传。
pub const TRANSFER_QUEUE_FLAG_SHARED_SURFACE_UPLOAD: u32 = 1 << 1;

/// ### English
/// Mask of all known flags.
///
/// ### 中文
/// 所有已知标志的掩码。
pub const TRANSFER_QUEUE_FLAGS_ALL: u32 =
    TRANSFER_QUEUE_FLAG_MINIMAL_MEMORY | TRANSFER_QUEUE_FLAG_SHARED_SURFACE_UPLOAD;

/// ### English
/// Memory profile selecting the ring capacity.
///
/// ### 中文
/// 决定环形容量的内存档位。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MemoryMode {
    Minimal,
    #[default]
    Efficient,
}

impl MemoryMode {
    pub const fn capacity(self) -> usize {
        match self {
            MemoryMode::Minimal => MINIMAL_QUEUE_CAPACITY,
            MemoryMode::Efficient => EFFICIENT_QUEUE_CAPACITY,
        }
    }
}

/// ### English
/// Transfer queue configuration.
///
/// ### 中文
/// 传输队列配置。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferQueueConfig {
    /// ### English
    /// Selects the ring capacity.
    ///
    /// ### 中文
    /// 决定环形容量。
    pub memory_mode: MemoryMode,
    /// ### English
    /// Upload strategy used for new entries until `set_upload_strategy` changes it.
    ///
    /// ### 中文
    /// 新条目使用的上传策略，直到 `set_upload_strategy` 修改为止。
    pub upload_strategy: UploadKind,
    /// ### English
    /// Buffers the shared surface's consumer may keep latched beyond the ring capacity
    /// (platform "min undequeued buffers" query result).
    ///
    /// ### 中文
    /// 共享表面消费者在环形容量之外可以额外持有的缓冲数
    /// （平台 “min undequeued buffers” 查询结果）。
    pub min_undequeued_buffers: u32,
}

impl Default for TransferQueueConfig {
    fn default() -> Self {
        Self {
            memory_mode: MemoryMode::default(),
            upload_strategy: UploadKind::default(),
            min_undequeued_buffers: 1,
        }
    }
}

impl TransferQueueConfig {
    /// ### English
    /// Builds a config from `TRANSFER_QUEUE_FLAG_*` bits. Unknown bits are ignored (and logged).
    ///
    /// ### 中文
    /// 根据 `TRANSFER_QUEUE_FLAG_*` 位构造配置。未知位会被忽略（并记录日志）。
    pub fn from_flags(flags: u32) -> Self {
        let unknown = flags & !TRANSFER_QUEUE_FLAGS_ALL;
        if unknown != 0 {
            log::warn!("ignoring unknown transfer queue flags {unknown:#x}");
        }

        let memory_mode = if flags & TRANSFER_QUEUE_FLAG_MINIMAL_MEMORY != 0 {
            MemoryMode::Minimal
        } else {
            MemoryMode::Efficient
        };
        let upload_strategy = if flags & TRANSFER_QUEUE_FLAG_SHARED_SURFACE_UPLOAD != 0 {
            UploadKind::SharedSurface
        } else {
            UploadKind::Direct
        };

        Self {
            memory_mode,
            upload_strategy,
            ..Self::default()
        }
    }

    pub fn capacity(&self) -> usize {
        self.memory_mode.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_efficient_shared_surface() {
        let config = TransferQueueConfig::default();
        assert_eq!(config.capacity(), EFFICIENT_QUEUE_CAPACITY);
        assert_eq!(config.upload_strategy, UploadKind::SharedSurface);
    }

    #[test]
    fn flags_select_minimal_direct() {
        let config = TransferQueueConfig::from_flags(TRANSFER_QUEUE_FLAG_MINIMAL_MEMORY);
        assert_eq!(config.capacity(), MINIMAL_QUEUE_CAPACITY);
        assert_eq!(config.upload_strategy, UploadKind::Direct);
    }

    #[test]
    fn unknown_flags_are_ignored() {
        let config =
            TransferQueueConfig::from_flags(TRANSFER_QUEUE_FLAG_SHARED_SURFACE_UPLOAD | 1 << 7);
        assert_eq!(config.memory_mode, MemoryMode::Efficient);
        assert_eq!(config.upload_strategy, UploadKind::SharedSurface);
    }
}
