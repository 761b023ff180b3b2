//! ### English
//! Consumer-thread GPU abstraction used by the drain engine and by destinations that need to
//! materialize textures.
//!
//! Two backends are provided: `GlBackend` (OpenGL via gleam + glow) and `SoftwareBackend`
//! (in-memory textures for headless runs and tests).
//!
//! ### 中文
//! 消费者线程使用的 GPU 抽象：供 drain 引擎以及需要实体化纹理的目标对象使用。
//!
//! 提供两个后端：`GlBackend`（通过 gleam + glow 的 OpenGL）与 `SoftwareBackend`
//! （内存纹理，用于无头运行与测试）。

use dpi::PhysicalSize;

use super::error::GpuError;
use super::geometry::{DirtyRect, Image};

mod gl;
mod software;

pub use gl::GlBackend;
pub use software::{BackendStats, SoftwareBackend};

/// ### English
/// Opaque GPU texture handle (`GLuint` for the GL backend). `0` is never a valid texture.
///
/// ### 中文
/// 不透明的 GPU 纹理句柄（GL 后端为 `GLuint`）。`0` 永远不是有效纹理。
pub type TextureId = u32;

/// ### English
/// Opaque framebuffer object handle. `0` is the default framebuffer.
///
/// ### 中文
/// 不透明的 framebuffer 对象句柄。`0` 表示默认 framebuffer。
pub type FramebufferId = u32;

/// ### English
/// A writable GPU texture together with its allocated size.
///
/// ### 中文
/// 可写 GPU 纹理及其分配尺寸。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GpuTexture {
    pub id: TextureId,
    pub size: PhysicalSize<u32>,
}

/// ### English
/// One framebuffer-mediated copy, shaped like `glCopyTexSubImage2D`:
/// read `width x height` at `(src_x, src_y)` from the attached source, write it at
/// `(dst_x, dst_y)` in the bound destination.
///
/// ### 中文
/// 一次经由 framebuffer 的复制，形状与 `glCopyTexSubImage2D` 一致：
/// 从已附加的源纹理 `(src_x, src_y)` 读取 `width x height`，写入目标纹理的 `(dst_x, dst_y)`。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureCopy {
    pub dst_x: i32,
    pub dst_y: i32,
    pub src_x: i32,
    pub src_y: i32,
    pub width: u32,
    pub height: u32,
}

impl TextureCopy {
    /// ### English
    /// Whole-texture copy from origin to origin.
    ///
    /// ### 中文
    /// 从原点到原点的整纹理复制。
    pub const fn full(size: PhysicalSize<u32>) -> Self {
        Self {
            dst_x: 0,
            dst_y: 0,
            src_x: 0,
            src_y: 0,
            width: size.width,
            height: size.height,
        }
    }

    /// ### English
    /// Copies the source's top-left block into `region` of the destination.
    ///
    /// ### 中文
    /// 将源纹理左上角的块复制到目标纹理的 `region` 区域。
    pub const fn into_region(region: DirtyRect) -> Self {
        Self {
            dst_x: region.x,
            dst_y: region.y,
            src_x: 0,
            src_y: 0,
            width: region.width,
            height: region.height,
        }
    }
}

/// ### English
/// GL state snapshot taken before the first blit of a drain cycle and restored after the last.
///
/// ### 中文
/// drain 周期内首次 blit 前保存、最后一次 blit 后恢复的 GL 状态快照。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SavedGlState {
    pub viewport: [i32; 4],
    pub scissor_test: bool,
    pub depth_test: bool,
}

/// ### English
/// GPU operations needed by the transfer queue. Implementations are used from the consumer
/// thread only and need not be `Send`.
///
/// ### 中文
/// 传输队列所需的 GPU 操作。实现仅在消费者线程使用，无需实现 `Send`。
pub trait GpuBackend {
    /// ### English
    /// Creates a texture object without storage.
    ///
    /// ### 中文
    /// 创建一个未分配存储的纹理对象。
    fn create_texture(&mut self) -> TextureId;

    fn delete_texture(&mut self, texture: TextureId);

    /// ### English
    /// Allocates (or reallocates) RGBA8 storage of `size` for `texture`.
    ///
    /// ### 中文
    /// 为 `texture` 分配（或重新分配）`size` 尺寸的 RGBA8 存储。
    fn allocate_texture(
        &mut self,
        texture: TextureId,
        size: PhysicalSize<u32>,
    ) -> Result<(), GpuError>;

    fn create_framebuffer(&mut self) -> FramebufferId;

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);

    /// ### English
    /// Uploads `image` into `texture`.
    ///
    /// An empty `region` replaces the whole texture with `image`. Otherwise the top-left
    /// `region.width x region.height` block of `image` is written at `(region.x, region.y)`.
    ///
    /// ### 中文
    /// 将 `image` 上传到 `texture`。
    ///
    /// 空 `region` 表示用 `image` 替换整张纹理；否则把 `image` 左上角
    /// `region.width x region.height` 的块写入 `(region.x, region.y)`。
    fn upload_image(
        &mut self,
        texture: GpuTexture,
        image: &Image,
        region: DirtyRect,
    ) -> Result<(), GpuError>;

    /// ### English
    /// Makes `image` (the shared surface's latched buffer) the content of `texture`.
    ///
    /// ### 中文
    /// 将 `image`（共享表面当前锁定的缓冲）设为 `texture` 的内容。
    fn latch_image(&mut self, texture: TextureId, image: &Image) -> Result<(), GpuError>;

    /// ### English
    /// Attaches `source` to `framebuffer` and copies from it into `destination`.
    ///
    /// ### 中文
    /// 将 `source` 附加到 `framebuffer`，再从中复制到 `destination`。
    fn copy_texture(
        &mut self,
        framebuffer: FramebufferId,
        source: TextureId,
        destination: TextureId,
        copy: TextureCopy,
    ) -> Result<(), GpuError>;

    fn save_state(&mut self) -> SavedGlState;

    fn restore_state(&mut self, state: &SavedGlState);

    /// ### English
    /// Rebinds the default render target (framebuffer 0).
    ///
    /// ### 中文
    /// 重新绑定默认渲染目标（framebuffer 0）。
    fn bind_default_framebuffer(&mut self);

    /// ### English
    /// Reports any pending backend error raised since the last check.
    ///
    /// ### 中文
    /// 报告自上次检查以来产生的后端错误。
    fn check_error(&mut self, label: &'static str) -> Result<(), GpuError>;
}
