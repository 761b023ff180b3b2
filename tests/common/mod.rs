//! Shared fixtures for the transfer queue integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use dpi::PhysicalSize;
use tile_transfer_queue::{
    Color, DirtyRect, Image, MemoryMode, SlotStatus, SoftwareBackend, TextureUploader, Tile,
    TileUpdate, TransferQueue, TransferQueueConfig, UploadKind,
};

pub const TILE_SIZE: PhysicalSize<u32> = PhysicalSize::new(16, 16);

pub const RED: Color = Color::rgba(255, 0, 0, 255);
pub const BLUE: Color = Color::rgba(0, 0, 255, 255);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn config(memory_mode: MemoryMode, upload_strategy: UploadKind) -> TransferQueueConfig {
    TransferQueueConfig {
        memory_mode,
        upload_strategy,
        ..TransferQueueConfig::default()
    }
}

/// Queue plus an attached software uploader with GPU resources initialised.
pub fn setup(
    config: TransferQueueConfig,
) -> (Arc<TransferQueue>, TextureUploader<SoftwareBackend>) {
    init_logging();
    let queue = TransferQueue::new(config);
    let mut uploader = TextureUploader::attach(Arc::clone(&queue), SoftwareBackend::new())
        .expect("first consumer attaches");
    uploader
        .init_gpu_resources(TILE_SIZE)
        .expect("shared surface initialises");
    (queue, uploader)
}

/// Tile with a fresh back texture waiting for content.
pub fn painted_tile(x: i32, y: i32) -> Arc<Tile> {
    let tile = Tile::new(x, y);
    tile.attach_back_texture(TILE_SIZE);
    tile
}

pub fn full_update(tile: &Arc<Tile>) -> TileUpdate {
    TileUpdate::full(tile.clone())
}

pub fn partial_update(tile: &Arc<Tile>, dirty: DirtyRect) -> TileUpdate {
    TileUpdate::partial(tile.clone(), dirty)
}

pub fn solid(color: Color) -> Image {
    Image::filled(TILE_SIZE, color)
}

/// Asserts the ring bookkeeping: every slot is in exactly one state and the free counter
/// matches the empty slots.
pub fn assert_slot_accounting(queue: &TransferQueue) {
    let snapshot = queue.slot_snapshot();
    assert_eq!(snapshot.len(), queue.capacity());

    let empty = snapshot
        .iter()
        .filter(|slot| slot.status == SlotStatus::Empty)
        .count();
    let in_flight = snapshot
        .iter()
        .filter(|slot| {
            matches!(
                slot.status,
                SlotStatus::PendingUpload | SlotStatus::PendingDiscard
            )
        })
        .count();
    assert_eq!(empty + in_flight, queue.capacity());
    assert_eq!(queue.empty_slot_count(), empty);
}

pub fn count_status(queue: &TransferQueue, status: SlotStatus) -> usize {
    queue
        .slot_snapshot()
        .iter()
        .filter(|slot| slot.status == status)
        .count()
}
