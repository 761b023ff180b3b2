//! ### English
//! In-memory GPU backend. Textures are plain RGBA8 images; copies follow GL clipping rules.
//!
//! ### 中文
//! 内存 GPU 后端。纹理就是普通 RGBA8 图像；复制遵循 GL 的裁剪规则。

use std::collections::{BTreeSet, HashMap};

use dpi::PhysicalSize;

use crate::engine::error::GpuError;
use crate::engine::geometry::{DirtyRect, Image};

use super::{FramebufferId, GpuBackend, GpuTexture, SavedGlState, TextureCopy, TextureId};

/// ### English
/// Per-operation counters, handy for asserting how much GPU work a drain performed.
///
/// ### 中文
/// 按操作统计的计数器，便于断言一次 drain 做了多少 GPU 工作。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BackendStats {
    pub uploads: u64,
    pub latches: u64,
    pub copies: u64,
    pub state_saves: u64,
    pub state_restores: u64,
    pub default_framebuffer_binds: u64,
}

/// ### English
/// Software implementation of [`GpuBackend`].
///
/// ### 中文
/// [`GpuBackend`] 的软件实现。
#[derive(Debug)]
pub struct SoftwareBackend {
    next_id: u32,
    /// ### English
    /// Texture storage; `None` until allocated or uploaded.
    ///
    /// ### 中文
    /// 纹理存储；分配或上传前为 `None`。
    textures: HashMap<TextureId, Option<Image>>,
    framebuffers: BTreeSet<FramebufferId>,
    bound_framebuffer: FramebufferId,
    state: SavedGlState,
    stats: BackendStats,
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            textures: HashMap::new(),
            framebuffers: BTreeSet::new(),
            bound_framebuffer: 0,
            state: SavedGlState {
                viewport: [0, 0, 0, 0],
                scissor_test: false,
                depth_test: false,
            },
            stats: BackendStats::default(),
        }
    }

    fn next_object_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn stats(&self) -> BackendStats {
        self.stats
    }

    /// ### English
    /// Returns the current content of `texture`, if it has storage.
    ///
    /// ### 中文
    /// 若 `texture` 已有存储则返回其当前内容。
    pub fn texture_image(&self, texture: TextureId) -> Option<&Image> {
        self.textures.get(&texture).and_then(Option::as_ref)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn bound_framebuffer(&self) -> FramebufferId {
        self.bound_framebuffer
    }

    /// ### English
    /// Current fixed-function state (what `save_state` would capture).
    ///
    /// ### 中文
    /// 当前的固定功能状态（即 `save_state` 会捕获的内容）。
    pub fn current_state(&self) -> SavedGlState {
        self.state
    }

    pub fn set_state(&mut self, state: SavedGlState) {
        self.state = state;
    }

    fn storage_mut(&mut self, texture: TextureId) -> Result<&mut Option<Image>, GpuError> {
        self.textures
            .get_mut(&texture)
            .ok_or(GpuError::UnknownTexture(texture))
    }
}

impl GpuBackend for SoftwareBackend {
    fn create_texture(&mut self) -> TextureId {
        let id = self.next_object_id();
        self.textures.insert(id, None);
        id
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
    }

    fn allocate_texture(
        &mut self,
        texture: TextureId,
        size: PhysicalSize<u32>,
    ) -> Result<(), GpuError> {
        *self.storage_mut(texture)? = Some(Image::zeroed(size));
        Ok(())
    }

    fn create_framebuffer(&mut self) -> FramebufferId {
        let id = self.next_object_id();
        self.framebuffers.insert(id);
        id
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.framebuffers.remove(&framebuffer);
        if self.bound_framebuffer == framebuffer {
            self.bound_framebuffer = 0;
        }
    }

    fn upload_image(
        &mut self,
        texture: GpuTexture,
        image: &Image,
        region: DirtyRect,
    ) -> Result<(), GpuError> {
        let storage = self.storage_mut(texture.id)?;
        if region.is_empty() {
            *storage = Some(image.clone());
        } else {
            let target = storage
                .as_mut()
                .ok_or(GpuError::UnallocatedTexture(texture.id))?;
            let region = region.clamp_to(target.size());
            target.blit_from(
                image,
                0,
                0,
                region.x as u32,
                region.y as u32,
                region.width,
                region.height,
            );
        }
        self.stats.uploads += 1;
        Ok(())
    }

    fn latch_image(&mut self, texture: TextureId, image: &Image) -> Result<(), GpuError> {
        *self.storage_mut(texture)? = Some(image.clone());
        self.stats.latches += 1;
        Ok(())
    }

    fn copy_texture(
        &mut self,
        framebuffer: FramebufferId,
        source: TextureId,
        destination: TextureId,
        copy: TextureCopy,
    ) -> Result<(), GpuError> {
        if !self.framebuffers.contains(&framebuffer) {
            return Err(GpuError::UnknownFramebuffer(framebuffer));
        }
        self.bound_framebuffer = framebuffer;

        let source_image = self
            .textures
            .get(&source)
            .ok_or(GpuError::UnknownTexture(source))?
            .clone()
            .ok_or(GpuError::UnallocatedTexture(source))?;
        let target = self
            .storage_mut(destination)?
            .as_mut()
            .ok_or(GpuError::UnallocatedTexture(destination))?;

        // Negative origins are clipped the same way GL clips the read rectangle.
        let shift_x = (-copy.src_x.min(copy.dst_x)).max(0);
        let shift_y = (-copy.src_y.min(copy.dst_y)).max(0);
        target.blit_from(
            &source_image,
            (copy.src_x + shift_x) as u32,
            (copy.src_y + shift_y) as u32,
            (copy.dst_x + shift_x) as u32,
            (copy.dst_y + shift_y) as u32,
            copy.width.saturating_sub(shift_x as u32),
            copy.height.saturating_sub(shift_y as u32),
        );
        self.stats.copies += 1;
        Ok(())
    }

    fn save_state(&mut self) -> SavedGlState {
        self.stats.state_saves += 1;
        self.state
    }

    fn restore_state(&mut self, state: &SavedGlState) {
        self.stats.state_restores += 1;
        self.state = *state;
    }

    fn bind_default_framebuffer(&mut self) {
        self.stats.default_framebuffer_binds += 1;
        self.bound_framebuffer = 0;
    }

    fn check_error(&mut self, _label: &'static str) -> Result<(), GpuError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::geometry::Color;

    #[test]
    fn partial_upload_writes_only_region() {
        let mut gpu = SoftwareBackend::new();
        let id = gpu.create_texture();
        let size = PhysicalSize::new(8, 8);
        gpu.allocate_texture(id, size).unwrap();

        let white = Image::filled(PhysicalSize::new(2, 2), Color::WHITE);
        gpu.upload_image(GpuTexture { id, size }, &white, DirtyRect::new(6, 6, 4, 4))
            .unwrap();

        let image = gpu.texture_image(id).unwrap();
        assert_eq!(image.pixel(6, 6), Some(Color::WHITE));
        assert_eq!(image.pixel(7, 7), Some(Color::WHITE));
        assert_eq!(image.pixel(5, 5), Some(Color::TRANSPARENT));
    }

    #[test]
    fn partial_upload_requires_storage() {
        let mut gpu = SoftwareBackend::new();
        let id = gpu.create_texture();
        let size = PhysicalSize::new(4, 4);
        let image = Image::zeroed(size);
        assert_eq!(
            gpu.upload_image(GpuTexture { id, size }, &image, DirtyRect::new(0, 0, 1, 1)),
            Err(GpuError::UnallocatedTexture(id))
        );
    }

    #[test]
    fn copy_needs_a_framebuffer() {
        let mut gpu = SoftwareBackend::new();
        let a = gpu.create_texture();
        let b = gpu.create_texture();
        let size = PhysicalSize::new(4, 4);
        gpu.allocate_texture(a, size).unwrap();
        gpu.allocate_texture(b, size).unwrap();

        assert_eq!(
            gpu.copy_texture(99, a, b, TextureCopy::full(size)),
            Err(GpuError::UnknownFramebuffer(99))
        );

        let fbo = gpu.create_framebuffer();
        gpu.copy_texture(fbo, a, b, TextureCopy::full(size)).unwrap();
        assert_eq!(gpu.bound_framebuffer(), fbo);
        gpu.bind_default_framebuffer();
        assert_eq!(gpu.bound_framebuffer(), 0);
    }

    #[test]
    fn copy_into_region_reads_source_origin() {
        let mut gpu = SoftwareBackend::new();
        let fbo = gpu.create_framebuffer();
        let src = gpu.create_texture();
        let dst = gpu.create_texture();
        let red = Color::rgba(255, 0, 0, 255);
        gpu.latch_image(src, &Image::filled(PhysicalSize::new(4, 4), red))
            .unwrap();
        gpu.allocate_texture(dst, PhysicalSize::new(8, 8)).unwrap();

        gpu.copy_texture(fbo, src, dst, TextureCopy::into_region(DirtyRect::new(4, 0, 2, 2)))
            .unwrap();

        let image = gpu.texture_image(dst).unwrap();
        assert_eq!(image.pixel(4, 0), Some(red));
        assert_eq!(image.pixel(5, 1), Some(red));
        assert_eq!(image.pixel(6, 0), Some(Color::TRANSPARENT));
        assert_eq!(image.pixel(3, 0), Some(Color::TRANSPARENT));
    }
}
