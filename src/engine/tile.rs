//! ### English
//! Reference [`Destination`]: a double-buffered tile with a front (displayed) texture and a
//! back (being filled) texture.
//!
//! ### 中文
//! 参考用的 [`Destination`] 实现：双缓冲 tile，包含 front（显示中）纹理与 back（填充中）纹理。

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dpi::PhysicalSize;

use super::destination::{Destination, TextureKey, TextureRef};
use super::geometry::Color;
use super::gpu::{GpuBackend, GpuTexture, TextureId};

/// ### English
/// Snapshot of one tile texture.
///
/// ### 中文
/// 单个 tile 纹理的快照。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileTexture {
    pub key: TextureKey,
    pub size: PhysicalSize<u32>,
    /// ### English
    /// GPU storage, created lazily by `materialize_writable_texture`.
    ///
    /// ### 中文
    /// GPU 存储，由 `materialize_writable_texture` 懒创建。
    pub gpu: Option<TextureId>,
    pub uniform: bool,
    pub uniform_color: Option<Color>,
    /// ### English
    /// Set once a transfer into this texture completed.
    ///
    /// ### 中文
    /// 向该纹理的传输完成后置位。
    pub ready: bool,
}

impl TileTexture {
    fn new(size: PhysicalSize<u32>) -> Self {
        Self {
            key: TextureKey::allocate(),
            size,
            gpu: None,
            uniform: false,
            uniform_color: None,
            ready: false,
        }
    }

    fn recycle(&mut self) {
        self.key = self.key.next_generation();
        self.uniform = false;
        self.uniform_color = None;
        self.ready = false;
    }
}

struct TileState {
    front: Option<TileTexture>,
    back: Option<TileTexture>,
    dirty: bool,
    /// ### English
    /// GPU textures dropped off-thread, deleted on the next `release_textures`.
    ///
    /// ### 中文
    /// 在非 GL 线程丢弃的 GPU 纹理，会在下次 `release_textures` 时删除。
    orphaned: Vec<TextureId>,
}

/// ### English
/// Double-buffered tile.
///
/// ### 中文
/// 双缓冲 tile。
pub struct Tile {
    x: i32,
    y: i32,
    state: Mutex<TileState>,
    discards: AtomicU32,
    failures: AtomicU32,
    completed: AtomicU32,
}

impl Tile {
    pub fn new(x: i32, y: i32) -> Arc<Self> {
        Arc::new(Self {
            x,
            y,
            state: Mutex::new(TileState {
                front: None,
                back: None,
                dirty: true,
                orphaned: Vec::new(),
            }),
            discards: AtomicU32::new(0),
            failures: AtomicU32::new(0),
            completed: AtomicU32::new(0),
        })
    }

    fn lock(&self) -> MutexGuard<'_, TileState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// ### English
    /// Gives the tile a back texture of `size` to paint into and returns its key.
    ///
    /// An existing back texture of the same size is recycled (new generation, same storage);
    /// otherwise a new texture replaces it.
    ///
    /// ### 中文
    /// 为 tile 分配一个 `size` 尺寸的 back 纹理用于绘制，并返回其 key。
    ///
    /// 若已有同尺寸 back 纹理则复用（新 generation，存储不变）；否则替换为新纹理。
    pub fn attach_back_texture(&self, size: PhysicalSize<u32>) -> TextureKey {
        let mut state = self.lock();
        state.dirty = true;
        if let Some(back) = state.back.as_mut().filter(|back| back.size == size) {
            back.recycle();
            return back.key;
        }

        if let Some(gpu) = state.back.take().and_then(|old| old.gpu) {
            state.orphaned.push(gpu);
        }
        let back = TileTexture::new(size);
        let key = back.key;
        state.back = Some(back);
        key
    }

    /// ### English
    /// Promotes a completed back texture to front. The old front becomes the next back
    /// texture (recycled). Returns `false` when the back texture is not ready.
    ///
    /// ### 中文
    /// 将已完成的 back 纹理提升为 front。旧 front 复用为下一个 back 纹理。
    /// 若 back 纹理尚未就绪则返回 `false`。
    pub fn swap_textures(&self) -> bool {
        let mut state = self.lock();
        if !state.back.as_ref().is_some_and(|back| back.ready) {
            return false;
        }

        let new_front = state.back.take();
        let mut new_back = std::mem::replace(&mut state.front, new_front);
        if let Some(back) = new_back.as_mut() {
            back.recycle();
        }
        state.back = new_back;
        true
    }

    pub fn front_texture(&self) -> Option<TileTexture> {
        self.lock().front.clone()
    }

    pub fn back_texture(&self) -> Option<TileTexture> {
        self.lock().back.clone()
    }

    /// ### English
    /// Whether the tile needs to be (re)painted.
    ///
    /// ### 中文
    /// tile 是否需要（重新）绘制。
    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    pub fn discard_count(&self) -> u32 {
        self.discards.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u32 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn completed_transfers(&self) -> u32 {
        self.completed.load(Ordering::Relaxed)
    }

    /// ### English
    /// Deletes every GPU texture owned by this tile. Must run on the GL thread.
    ///
    /// ### 中文
    /// 删除该 tile 持有的所有 GPU 纹理。必须在 GL 线程执行。
    pub fn release_textures(&self, gpu: &mut dyn GpuBackend) {
        let mut guard = self.lock();
        let state = &mut *guard;
        let mut doomed = std::mem::take(&mut state.orphaned);
        for texture in [state.front.as_mut(), state.back.as_mut()]
            .into_iter()
            .flatten()
        {
            if let Some(id) = texture.gpu.take() {
                doomed.push(id);
            }
            texture.ready = false;
        }
        for id in doomed {
            gpu.delete_texture(id);
        }
    }

    fn drop_back_texture(&self) {
        let mut state = self.lock();
        if let Some(gpu) = state.back.take().and_then(|back| back.gpu) {
            state.orphaned.push(gpu);
        }
        state.dirty = true;
    }
}

impl Destination for Tile {
    fn current_texture(&self) -> Option<TextureRef> {
        self.lock().back.as_ref().map(|back| TextureRef {
            key: back.key,
            size: back.size,
        })
    }

    fn previous_texture(&self) -> Option<GpuTexture> {
        let state = self.lock();
        let front = state.front.as_ref()?;
        front.gpu.map(|id| GpuTexture {
            id,
            size: front.size,
        })
    }

    fn materialize_writable_texture(&self, gpu: &mut dyn GpuBackend) -> Option<GpuTexture> {
        let mut state = self.lock();
        let back = state.back.as_mut()?;
        if let Some(id) = back.gpu {
            return Some(GpuTexture {
                id,
                size: back.size,
            });
        }

        let id = gpu.create_texture();
        if let Err(err) = gpu.allocate_texture(id, back.size) {
            log::error!("tile ({}, {}): texture allocation failed: {err}", self.x, self.y);
            gpu.delete_texture(id);
            return None;
        }
        back.gpu = Some(id);
        Some(GpuTexture {
            id,
            size: back.size,
        })
    }

    fn set_uniform_color(&self, color: Color) {
        if let Some(back) = self.lock().back.as_mut() {
            back.uniform = true;
            back.uniform_color = Some(color);
        }
    }

    fn mark_uniform(&self, uniform: bool) {
        if let Some(back) = self.lock().back.as_mut() {
            back.uniform = uniform;
            if !uniform {
                back.uniform_color = None;
            }
        }
    }

    fn mark_transfer_complete(&self) {
        let mut guard = self.lock();
        let state = &mut *guard;
        if let Some(back) = state.back.as_mut() {
            back.ready = true;
            state.dirty = false;
            self.completed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn mark_transfer_failed(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.drop_back_texture();
    }

    fn discard_texture(&self) {
        self.discards.fetch_add(1, Ordering::Relaxed);
        self.drop_back_texture();
    }
}
