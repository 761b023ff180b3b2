//! ### English
//! Per-strategy GPU writes. Staleness and slot lifecycle stay in the drain loop; this file only
//! knows how to move already-validated content into a destination texture.
//!
//! ### 中文
//! 按策略执行的 GPU 写入。过期检查与槽位生命周期由 drain 循环负责；
//! 本文件只负责把已校验的内容写入目标纹理。

use crate::engine::error::GpuError;
use crate::engine::geometry::{DirtyRect, Image};
use crate::engine::gpu::{FramebufferId, GpuBackend, GpuTexture, TextureCopy, TextureId};

use super::slot::UploadKind;

/// ### English
/// Consumer-side shared-surface resources needed for a blit.
///
/// ### 中文
/// blit 所需的消费者侧共享表面资源。
pub(crate) struct SurfaceSource<'a> {
    pub(crate) framebuffer: Option<FramebufferId>,
    pub(crate) texture: Option<TextureId>,
    /// ### English
    /// Image latched by the last `update_tex_image`.
    ///
    /// ### 中文
    /// 最近一次 `update_tex_image` 锁定的图像。
    pub(crate) latched: Option<&'a Image>,
}

/// ### English
/// One validated transfer ready to be written.
///
/// ### 中文
/// 一个已校验、待写入的传输。
pub(crate) struct Commit<'a> {
    pub(crate) target: GpuTexture,
    /// ### English
    /// Previously completed texture, used to fill pixels a partial update does not cover.
    ///
    /// ### 中文
    /// 之前已完成的纹理，用于填充局部更新未覆盖的像素。
    pub(crate) previous: Option<GpuTexture>,
    pub(crate) dirty: Option<DirtyRect>,
    pub(crate) payload: Option<&'a Image>,
}

impl UploadKind {
    /// ### English
    /// Writes `commit` into its target texture using this strategy.
    ///
    /// ### 中文
    /// 按本策略把 `commit` 写入目标纹理。
    pub(crate) fn commit(
        self,
        gpu: &mut dyn GpuBackend,
        commit: &Commit<'_>,
        surface: &SurfaceSource<'_>,
    ) -> Result<(), GpuError> {
        match self {
            UploadKind::Direct => upload_payload(gpu, commit),
            UploadKind::SharedSurface => blit_from_surface(gpu, commit, surface),
        }
    }
}

fn upload_payload(gpu: &mut dyn GpuBackend, commit: &Commit<'_>) -> Result<(), GpuError> {
    let payload = commit.payload.ok_or(GpuError::MissingPayload)?;
    match commit.dirty {
        None => gpu.upload_image(commit.target, payload, DirtyRect::EMPTY),
        Some(region) if region.is_empty() => Ok(()),
        Some(region) => gpu.upload_image(commit.target, payload, region),
    }
}

fn blit_from_surface(
    gpu: &mut dyn GpuBackend,
    commit: &Commit<'_>,
    surface: &SurfaceSource<'_>,
) -> Result<(), GpuError> {
    let framebuffer = surface.framebuffer.ok_or(GpuError::UnknownFramebuffer(0))?;
    let source = surface.texture.ok_or(GpuError::UnknownTexture(0))?;
    let latched = surface.latched.ok_or(GpuError::NoLatchedImage)?;
    gpu.latch_image(source, latched)?;

    let target = commit.target;
    match commit.dirty {
        None => gpu.copy_texture(framebuffer, source, target.id, TextureCopy::full(target.size)),
        Some(region) if region.is_empty() => Ok(()),
        Some(region) => {
            if let Some(previous) = commit.previous.filter(|previous| previous.id != target.id) {
                gpu.copy_texture(
                    framebuffer,
                    previous.id,
                    target.id,
                    TextureCopy::full(target.size),
                )?;
            }
            gpu.copy_texture(
                framebuffer,
                source,
                target.id,
                TextureCopy::into_region(region),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use dpi::PhysicalSize;

    use super::*;
    use crate::engine::geometry::Color;
    use crate::engine::gpu::SoftwareBackend;

    const SIZE: PhysicalSize<u32> = PhysicalSize::new(8, 8);

    fn allocated(gpu: &mut SoftwareBackend, color: Option<Color>) -> GpuTexture {
        let id = gpu.create_texture();
        match color {
            Some(color) => gpu.latch_image(id, &Image::filled(SIZE, color)).unwrap(),
            None => gpu.allocate_texture(id, SIZE).unwrap(),
        }
        GpuTexture { id, size: SIZE }
    }

    #[test]
    fn partial_blit_keeps_previous_pixels() {
        let mut gpu = SoftwareBackend::new();
        let framebuffer = gpu.create_framebuffer();
        let surface_texture = gpu.create_texture();
        let blue = Color::rgba(0, 0, 255, 255);
        let previous = allocated(&mut gpu, Some(blue));
        let target = allocated(&mut gpu, None);
        let patch = Image::filled(SIZE, Color::WHITE);

        let commit = Commit {
            target,
            previous: Some(previous),
            dirty: Some(DirtyRect::new(2, 2, 2, 2)),
            payload: None,
        };
        let surface = SurfaceSource {
            framebuffer: Some(framebuffer),
            texture: Some(surface_texture),
            latched: Some(&patch),
        };
        UploadKind::SharedSurface
            .commit(&mut gpu, &commit, &surface)
            .unwrap();

        let image = gpu.texture_image(target.id).unwrap();
        assert_eq!(image.pixel(0, 0), Some(blue));
        assert_eq!(image.pixel(2, 2), Some(Color::WHITE));
        assert_eq!(image.pixel(3, 3), Some(Color::WHITE));
        assert_eq!(image.pixel(4, 4), Some(blue));
    }

    #[test]
    fn blit_without_latched_image_fails() {
        let mut gpu = SoftwareBackend::new();
        let target = allocated(&mut gpu, None);
        let commit = Commit {
            target,
            previous: None,
            dirty: None,
            payload: None,
        };
        let surface = SurfaceSource {
            framebuffer: Some(gpu.create_framebuffer()),
            texture: Some(gpu.create_texture()),
            latched: None,
        };
        assert_eq!(
            UploadKind::SharedSurface.commit(&mut gpu, &commit, &surface),
            Err(GpuError::NoLatchedImage)
        );
    }

    #[test]
    fn direct_upload_needs_payload() {
        let mut gpu = SoftwareBackend::new();
        let target = allocated(&mut gpu, None);
        let mut commit = Commit {
            target,
            previous: None,
            dirty: None,
            payload: None,
        };
        let surface = SurfaceSource {
            framebuffer: None,
            texture: None,
            latched: None,
        };
        assert_eq!(
            UploadKind::Direct.commit(&mut gpu, &commit, &surface),
            Err(GpuError::MissingPayload)
        );

        let red = Image::filled(SIZE, Color::rgba(255, 0, 0, 255));
        commit.payload = Some(&red);
        UploadKind::Direct.commit(&mut gpu, &commit, &surface).unwrap();
        assert_eq!(gpu.stats().uploads, 1);
        assert_eq!(gpu.texture_image(target.id), Some(&red));
    }
}
