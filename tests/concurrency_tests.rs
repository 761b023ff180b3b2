//! Cross-thread behaviour: admission backpressure, shutdown and interruption wakeups, and many
//! producers feeding one consumer.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use common::*;
use tile_transfer_queue::{MemoryMode, SlotStatus, Tile, TransferQueue, UploadKind};

const STILL_BLOCKED: Duration = Duration::from_millis(150);
const WAKEUP_DEADLINE: Duration = Duration::from_secs(5);

/// Spawns a producer that tries one full update and reports the result. The thread hands its
/// tile back on join so the consumer can still drain it.
fn spawn_producer(
    queue: &Arc<TransferQueue>,
    x: i32,
) -> (mpsc::Receiver<bool>, thread::JoinHandle<Arc<Tile>>) {
    let queue = Arc::clone(queue);
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        let tile = painted_tile(x, 0);
        let accepted = queue.try_update_with_pixels(&full_update(&tile), &solid(RED));
        let _ = tx.send(accepted);
        tile
    });
    (rx, handle)
}

#[test]
fn capacity_one_blocks_second_producer_until_drain() {
    for strategy in [UploadKind::Direct, UploadKind::SharedSurface] {
        let (queue, mut uploader) = setup(config(MemoryMode::Minimal, strategy));
        let first = painted_tile(0, 0);
        assert!(queue.try_update_with_pixels(&full_update(&first), &solid(RED)));
        assert_eq!(queue.empty_slot_count(), 0);

        let (rx, handle) = spawn_producer(&queue, 1);
        assert_eq!(rx.recv_timeout(STILL_BLOCKED), Err(RecvTimeoutError::Timeout));

        let report = uploader.drain_once();
        assert_eq!(report.gpu_writes(), 1);
        assert_eq!(rx.recv_timeout(WAKEUP_DEADLINE), Ok(true));
        assert_eq!(first.completed_transfers(), 1);

        let second = handle.join().expect("producer thread");
        assert_eq!(uploader.drain_once().gpu_writes(), 1);
        assert_eq!(second.completed_transfers(), 1);
        assert_slot_accounting(&queue);
    }
}

#[test]
fn shutdown_unblocks_waiting_producer_with_refusal() {
    let (queue, mut uploader) = setup(config(MemoryMode::Minimal, UploadKind::SharedSurface));
    let first = painted_tile(0, 0);
    assert!(queue.try_update_with_pixels(&full_update(&first), &solid(RED)));

    let (rx, handle) = spawn_producer(&queue, 1);
    assert_eq!(rx.recv_timeout(STILL_BLOCKED), Err(RecvTimeoutError::Timeout));

    queue.request_shutdown_or_switch();
    assert_eq!(rx.recv_timeout(WAKEUP_DEADLINE), Ok(false));
    handle.join().expect("producer thread");

    assert_eq!(count_status(&queue, SlotStatus::PendingDiscard), 1);
    let report = uploader.drain_once();
    assert_eq!(report.discards_resolved, 1);
    assert_eq!(first.discard_count(), 1);
}

#[test]
fn interrupt_wakes_every_blocked_producer() {
    let (queue, mut uploader) = setup(config(MemoryMode::Minimal, UploadKind::Direct));
    let first = painted_tile(0, 0);
    assert!(queue.try_update_with_pixels(&full_update(&first), &solid(RED)));

    let producers: Vec<_> = (1..=3).map(|x| spawn_producer(&queue, x)).collect();
    thread::sleep(STILL_BLOCKED);

    queue.interrupt(true);
    assert!(queue.is_interrupted());
    for (rx, handle) in producers {
        assert_eq!(rx.recv_timeout(WAKEUP_DEADLINE), Ok(false));
        handle.join().expect("producer thread");
    }

    // Interruption is latched: a drain frees the ring but producers stay refused.
    uploader.drain_once();
    let late = painted_tile(9, 0);
    assert!(!queue.try_update_with_pixels(&full_update(&late), &solid(RED)));

    queue.interrupt(false);
    assert!(queue.try_update_with_pixels(&full_update(&late), &solid(RED)));
    assert_eq!(uploader.drain_once().direct_uploads, 1);
    assert_eq!(late.completed_transfers(), 1);
}

#[test]
fn many_producers_each_transfer_lands_once() {
    for strategy in [UploadKind::Direct, UploadKind::SharedSurface] {
        run_many_producers(strategy);
    }
}

fn run_many_producers(strategy: UploadKind) {
    const PRODUCERS: usize = 4;
    const TILES_PER_PRODUCER: usize = 25;

    let (queue, mut uploader) = setup(config(MemoryMode::Efficient, strategy));
    let finished = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(PRODUCERS));

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let queue = Arc::clone(&queue);
            let finished = Arc::clone(&finished);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                let tiles: Vec<_> = (0..TILES_PER_PRODUCER)
                    .map(|i| painted_tile(i as i32, producer as i32))
                    .collect();
                for tile in &tiles {
                    queue.update_with_pixels(&full_update(tile), &solid(BLUE));
                }
                finished.fetch_add(1, Ordering::AcqRel);
                tiles
            })
        })
        .collect();

    let mut uploaded = 0usize;
    while finished.load(Ordering::Acquire) < PRODUCERS {
        let report = uploader.drain_once();
        assert_eq!(report.failed, 0, "{strategy:?}");
        uploaded += report.gpu_writes();
        assert!(queue.empty_slot_count() <= queue.capacity());
        thread::yield_now();
    }
    let tiles: Vec<_> = handles
        .into_iter()
        .flat_map(|handle| handle.join().expect("producer thread"))
        .collect();
    uploaded += uploader.drain_once().gpu_writes();

    assert_eq!(uploaded, PRODUCERS * TILES_PER_PRODUCER, "{strategy:?}");
    for tile in &tiles {
        assert_eq!(tile.completed_transfers(), 1);
        assert_eq!(tile.failure_count(), 0);
    }
    if let Some(consumer) = uploader.surface_consumer() {
        assert_eq!(consumer.queued_buffers(), 0);
    }
    assert_slot_accounting(&queue);
}
