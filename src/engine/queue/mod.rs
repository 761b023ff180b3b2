//! ### English
//! Bounded transfer queue moving rendered tile content from producer threads to GPU textures
//! owned by a single compositor thread.
//!
//! All queue state sits behind one mutex with one condition variable. Producers block in the
//! admission gate when every slot is in flight; the consumer (`TextureUploader`) never blocks
//! and drains the whole ring once per cycle.
//!
//! ### 中文
//! 有界传输队列：把生产者线程渲染好的 tile 内容搬运到单个合成线程持有的 GPU 纹理中。
//!
//! 全部队列状态由一把互斥锁和一个条件变量保护。所有槽位都在途时，生产者会在准入门处阻塞；
//! 消费者（`TextureUploader`）从不阻塞，每个周期完整 drain 一遍环形缓冲。

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use super::config::TransferQueueConfig;
use super::destination::Destination;
use super::geometry::DirtyRect;
use super::surface::SurfaceWindow;

mod admission;
mod drain;
mod enqueue;
mod lifecycle;
mod slot;
mod strategy;
mod uploader;

pub use slot::{SlotSnapshot, SlotStatus, UploadKind};
pub use uploader::{DrainReport, TextureUploader};

use slot::{TransferSlot, UniformEntry};

/// ### English
/// One content update request from a producer.
///
/// ### 中文
/// 生产者发出的一次内容更新请求。
#[derive(Clone)]
pub struct TileUpdate {
    /// ### English
    /// Destination whose current texture receives the content.
    ///
    /// ### 中文
    /// 其当前纹理将接收内容的目标对象。
    pub destination: Arc<dyn Destination>,
    /// ### English
    /// Changed sub-rectangle; `None` means the whole texture.
    ///
    /// ### 中文
    /// 发生变化的子矩形；`None` 表示整张纹理。
    pub dirty: Option<DirtyRect>,
}

impl TileUpdate {
    pub fn full(destination: Arc<dyn Destination>) -> Self {
        Self {
            destination,
            dirty: None,
        }
    }

    pub fn partial(destination: Arc<dyn Destination>, dirty: DirtyRect) -> Self {
        Self {
            destination,
            dirty: Some(dirty),
        }
    }
}

/// ### English
/// Everything guarded by the queue lock.
///
/// ### 中文
/// 由队列锁保护的全部状态。
pub(crate) struct QueueState {
    slots: Box<[TransferSlot]>,
    /// ### English
    /// Index of the most recently written slot; the oldest entry is at `write_index + 1`.
    ///
    /// ### 中文
    /// 最近一次写入的槽位索引；最旧的条目位于 `write_index + 1`。
    write_index: usize,
    empty_slots: usize,
    side_queue: Vec<UniformEntry>,
    /// ### English
    /// Latched GPU-context liveness. Cleared by discard requests, set again by the next drain.
    ///
    /// ### 中文
    /// 锁存的 GPU 上下文存活标记。discard 请求会清除，下一次 drain 重新置位。
    has_gpu_context: bool,
    /// ### English
    /// Latched interruption flag (queue teardown in progress).
    ///
    /// ### 中文
    /// 锁存的中断标记（队列正在拆除）。
    interrupted: bool,
    upload_strategy: UploadKind,
    /// ### English
    /// Producer half of the shared surface; present between `init_gpu_resources` and
    /// `release_gpu_resources`.
    ///
    /// ### 中文
    /// 共享表面的生产者侧；在 `init_gpu_resources` 与 `release_gpu_resources` 之间存在。
    surface_window: Option<SurfaceWindow>,
    /// ### English
    /// Identifies the current shared surface. Bumped on release so entries whose buffers died
    /// with an older surface never advance the new one.
    ///
    /// ### 中文
    /// 标识当前共享表面。释放时递增，使缓冲随旧表面一同销毁的条目不会推进新表面。
    surface_generation: u64,
}

impl QueueState {
    fn new(capacity: usize, upload_strategy: UploadKind) -> Self {
        Self {
            slots: (0..capacity).map(|_| TransferSlot::new()).collect(),
            write_index: 0,
            empty_slots: capacity,
            side_queue: Vec::new(),
            has_gpu_context: true,
            interrupted: false,
            upload_strategy,
            surface_window: None,
            surface_generation: 0,
        }
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// ### English
    /// Index of the oldest slot (next to be overwritten by enqueue, first to be drained).
    ///
    /// ### 中文
    /// 最旧槽位的索引（下一次入队将覆盖、drain 时首先处理）。
    #[inline]
    fn oldest_index(&self) -> usize {
        (self.write_index + 1) % self.capacity()
    }
}

/// ### English
/// Shared, thread-safe transfer queue. Producers hold it through an `Arc`; the consumer
/// attaches a [`TextureUploader`].
///
/// ### 中文
/// 线程安全的共享传输队列。生产者通过 `Arc` 持有；消费者挂接一个 [`TextureUploader`]。
pub struct TransferQueue {
    state: Mutex<QueueState>,
    /// ### English
    /// Signalled when slots free up, on interruption and on context loss.
    ///
    /// ### 中文
    /// 槽位释放、中断以及上下文丢失时发出信号。
    slot_available: Condvar,
    capacity: usize,
    min_undequeued_buffers: u32,
    /// ### English
    /// Guards the single-consumer rule.
    ///
    /// ### 中文
    /// 保证“单消费者”规则。
    consumer_attached: AtomicBool,
}

impl TransferQueue {
    /// ### English
    /// Creates a queue with the ring capacity and default strategy from `config`.
    ///
    /// ### 中文
    /// 按 `config` 中的环形容量与默认策略创建队列。
    pub fn new(config: TransferQueueConfig) -> Arc<Self> {
        let capacity = config.capacity().max(1);
        Arc::new(Self {
            state: Mutex::new(QueueState::new(capacity, config.upload_strategy)),
            slot_available: Condvar::new(),
            capacity,
            min_undequeued_buffers: config.min_undequeued_buffers,
            consumer_attached: AtomicBool::new(false),
        })
    }

    /// ### English
    /// Acquires the queue lock. Poisoning is ignored: every state transition is completed
    /// before any call that could panic.
    ///
    /// ### 中文
    /// 获取队列锁。忽略锁中毒：每次状态转换都在可能 panic 的调用之前完成。
    pub(crate) fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn empty_slot_count(&self) -> usize {
        self.lock().empty_slots
    }

    pub fn upload_strategy(&self) -> UploadKind {
        self.lock().upload_strategy
    }

    pub fn has_gpu_context(&self) -> bool {
        self.lock().has_gpu_context
    }

    pub fn is_interrupted(&self) -> bool {
        self.lock().interrupted
    }

    /// ### English
    /// Number of pending uniform-color entries.
    ///
    /// ### 中文
    /// 待处理的纯色条目数量。
    pub fn side_queue_len(&self) -> usize {
        self.lock().side_queue.len()
    }

    /// ### English
    /// Snapshot of every ring slot, in ring order (index 0 first).
    ///
    /// ### 中文
    /// 所有环形槽位的快照，按环形索引顺序（从 0 开始）。
    pub fn slot_snapshot(&self) -> Vec<SlotSnapshot> {
        self.lock().slots.iter().map(TransferSlot::snapshot).collect()
    }

    /// ### English
    /// Whether the shared surface's producer half is currently available.
    ///
    /// ### 中文
    /// 共享表面的生产者侧当前是否可用。
    pub fn has_surface(&self) -> bool {
        self.lock().surface_window.is_some()
    }
}
