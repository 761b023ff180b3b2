//! ### English
//! Admission gate: producers reserve ring capacity here before enqueueing.
//!
//! ### 中文
//! 准入门：生产者入队前在此预留环形容量。

use std::sync::{MutexGuard, PoisonError};

use super::{QueueState, TransferQueue};

impl TransferQueue {
    /// ### English
    /// Waits until a slot is free and the GPU context is live.
    ///
    /// Must be called with the queue lock held; the lock is only released while waiting on
    /// `slot_available`. Interruption and context loss are checked before and after every wait,
    /// so a producer woken by either returns immediately.
    ///
    /// #### Returns
    /// The reacquired guard and whether the caller may enqueue. On `false` the caller must not
    /// touch the queue.
    ///
    /// ### 中文
    /// 等待直到有空闲槽位且 GPU 上下文存活。
    ///
    /// 调用时必须持有队列锁；仅在等待 `slot_available` 期间释放锁。每次等待前后都会检查
    /// 中断与上下文丢失，因此被二者唤醒的生产者会立即返回。
    ///
    /// #### 返回值
    /// 重新获取的锁守卫，以及调用方是否可以入队。返回 `false` 时调用方不得写入队列。
    pub(crate) fn ready_for_update<'a>(
        &'a self,
        mut state: MutexGuard<'a, QueueState>,
    ) -> (MutexGuard<'a, QueueState>, bool) {
        loop {
            if state.interrupted || !state.has_gpu_context {
                return (state, false);
            }
            if state.empty_slots > 0 {
                return (state, true);
            }

            log::trace!("transfer queue full, producer waiting");
            state = self
                .slot_available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}
