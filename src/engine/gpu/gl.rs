//! ### English
//! OpenGL backend. Object and copy calls go through gleam; state queries go through glow.
//!
//! Must be created and used on the thread that owns the current GL context (the compositor).
//!
//! ### 中文
//! OpenGL 后端。对象与复制调用走 gleam；状态查询走 glow。
//!
//! 必须在持有当前 GL 上下文的线程（合成线程）创建与使用。

use std::ffi::c_void;
use std::rc::Rc;
use std::sync::Arc;

use dpi::PhysicalSize;
use gleam::gl::{self, Gl};
use glow::HasContext as _;

use crate::engine::error::GpuError;
use crate::engine::geometry::{DirtyRect, Image};

use super::{FramebufferId, GpuBackend, GpuTexture, SavedGlState, TextureCopy, TextureId};

const MAX_DRAINED_GL_ERRORS: usize = 16;

fn parse_gl_version(version: &str) -> (u32, u32) {
    // Expected forms: "4.6.0 ..." or "OpenGL ES 3.2 ...".
    let mut major = 0u32;
    let mut minor = 0u32;
    let number_token = version.split_whitespace().find(|t| {
        t.chars()
            .next()
            .map(|c| c.is_ascii_digit())
            .unwrap_or(false)
    });
    if let Some(token) = number_token {
        let mut parts = token.split('.');
        if let Some(m) = parts.next().and_then(|s| s.parse::<u32>().ok()) {
            major = m;
        }
        if let Some(n) = parts.next().and_then(|s| s.parse::<u32>().ok()) {
            minor = n;
        }
    }
    (major, minor)
}

/// ### English
/// GL implementation of [`GpuBackend`].
///
/// ### 中文
/// [`GpuBackend`] 的 GL 实现。
pub struct GlBackend {
    /// ### English
    /// gleam GL API wrapper used for texture/framebuffer calls.
    ///
    /// ### 中文
    /// 用于纹理/framebuffer 调用的 gleam GL API 封装。
    gl: Rc<dyn Gl>,
    /// ### English
    /// glow GL API used for state and error queries.
    ///
    /// ### 中文
    /// 用于状态与错误查询的 glow GL API。
    glow: Arc<glow::Context>,
    is_gles: bool,
    version: (u32, u32),
}

impl GlBackend {
    /// ### English
    /// Loads both GL wrappers through `loader` (e.g. `eglGetProcAddress`).
    ///
    /// # Safety
    /// A GL context must be current on the calling thread and `loader` must return valid
    /// function pointers for that context.
    ///
    /// ### 中文
    /// 通过 `loader`（例如 `eglGetProcAddress`）加载两个 GL 封装。
    ///
    /// # 安全性
    /// 调用线程上必须有当前 GL 上下文，且 `loader` 必须返回该上下文的有效函数指针。
    pub unsafe fn load_with(mut loader: impl FnMut(&str) -> *const c_void) -> Self {
        let glow = unsafe { glow::Context::from_loader_function(|name| loader(name)) };
        let gl_version = unsafe { glow.get_parameter_string(glow::VERSION) };
        let is_gles = gl_version.starts_with("OpenGL ES");
        let version = parse_gl_version(&gl_version);

        let gl: Rc<dyn Gl> = unsafe {
            if is_gles {
                gl::GlesFns::load_with(|name| loader(name))
            } else {
                gl::GlFns::load_with(|name| loader(name))
            }
        };

        log::debug!("GL upload backend on {gl_version} (gles: {is_gles})");
        Self::from_parts(gl, Arc::new(glow), is_gles, version)
    }

    /// ### English
    /// Builds a backend from wrappers the embedder already loaded.
    ///
    /// ### 中文
    /// 使用宿主已加载好的封装构造后端。
    pub fn from_parts(
        gl: Rc<dyn Gl>,
        glow: Arc<glow::Context>,
        is_gles: bool,
        version: (u32, u32),
    ) -> Self {
        Self {
            gl,
            glow,
            is_gles,
            version,
        }
    }

    pub fn is_gles(&self) -> bool {
        self.is_gles
    }

    pub fn version(&self) -> (u32, u32) {
        self.version
    }

    fn tex_image(&self, size: PhysicalSize<u32>, data: Option<&[u8]>) {
        self.gl.tex_image_2d(
            gl::TEXTURE_2D,
            0,
            gl::RGBA as gl::GLint,
            size.width as gl::GLsizei,
            size.height as gl::GLsizei,
            0,
            gl::RGBA,
            gl::UNSIGNED_BYTE,
            data,
        );
    }
}

impl GpuBackend for GlBackend {
    fn create_texture(&mut self) -> TextureId {
        let texture_ids = self.gl.gen_textures(1);
        self.gl.bind_texture(gl::TEXTURE_2D, texture_ids[0]);
        self.gl.tex_parameter_i(
            gl::TEXTURE_2D,
            gl::TEXTURE_MAG_FILTER,
            gl::LINEAR as gl::GLint,
        );
        self.gl.tex_parameter_i(
            gl::TEXTURE_2D,
            gl::TEXTURE_MIN_FILTER,
            gl::LINEAR as gl::GLint,
        );
        self.gl.tex_parameter_i(
            gl::TEXTURE_2D,
            gl::TEXTURE_WRAP_S,
            gl::CLAMP_TO_EDGE as gl::GLint,
        );
        self.gl.tex_parameter_i(
            gl::TEXTURE_2D,
            gl::TEXTURE_WRAP_T,
            gl::CLAMP_TO_EDGE as gl::GLint,
        );
        self.gl.bind_texture(gl::TEXTURE_2D, 0);
        texture_ids[0]
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.gl.delete_textures(&[texture]);
    }

    fn allocate_texture(
        &mut self,
        texture: TextureId,
        size: PhysicalSize<u32>,
    ) -> Result<(), GpuError> {
        self.gl.bind_texture(gl::TEXTURE_2D, texture);
        self.tex_image(size, None);
        self.gl.bind_texture(gl::TEXTURE_2D, 0);
        self.check_error("allocate_texture")
    }

    fn create_framebuffer(&mut self) -> FramebufferId {
        self.gl.gen_framebuffers(1)[0]
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.gl.delete_framebuffers(&[framebuffer]);
    }

    fn upload_image(
        &mut self,
        texture: GpuTexture,
        image: &Image,
        region: DirtyRect,
    ) -> Result<(), GpuError> {
        self.gl.bind_texture(gl::TEXTURE_2D, texture.id);
        self.gl.pixel_store_i(gl::UNPACK_ALIGNMENT, 4);
        if region.is_empty() {
            self.tex_image(image.size(), Some(image.pixels()));
        } else {
            let region = region.clamp_to(texture.size);
            let width = region.width.min(image.width());
            let height = region.height.min(image.height());
            if width != 0 && height != 0 {
                let block = image.top_left_block(width, height);
                self.gl.tex_sub_image_2d(
                    gl::TEXTURE_2D,
                    0,
                    region.x,
                    region.y,
                    width as gl::GLsizei,
                    height as gl::GLsizei,
                    gl::RGBA,
                    gl::UNSIGNED_BYTE,
                    &block,
                );
            }
        }
        self.gl.bind_texture(gl::TEXTURE_2D, 0);
        self.check_error("upload_image")
    }

    fn latch_image(&mut self, texture: TextureId, image: &Image) -> Result<(), GpuError> {
        self.gl.bind_texture(gl::TEXTURE_2D, texture);
        self.tex_image(image.size(), Some(image.pixels()));
        self.gl.bind_texture(gl::TEXTURE_2D, 0);
        self.check_error("latch_image")
    }

    fn copy_texture(
        &mut self,
        framebuffer: FramebufferId,
        source: TextureId,
        destination: TextureId,
        copy: TextureCopy,
    ) -> Result<(), GpuError> {
        self.gl.bind_framebuffer(gl::FRAMEBUFFER, framebuffer);
        self.gl.framebuffer_texture_2d(
            gl::FRAMEBUFFER,
            gl::COLOR_ATTACHMENT0,
            gl::TEXTURE_2D,
            source,
            0,
        );
        let status = self.gl.check_frame_buffer_status(gl::FRAMEBUFFER);
        if status != gl::FRAMEBUFFER_COMPLETE {
            return Err(GpuError::FramebufferIncomplete(status));
        }

        self.gl.bind_texture(gl::TEXTURE_2D, destination);
        self.gl.copy_tex_sub_image_2d(
            gl::TEXTURE_2D,
            0,
            copy.dst_x,
            copy.dst_y,
            copy.src_x,
            copy.src_y,
            copy.width as gl::GLsizei,
            copy.height as gl::GLsizei,
        );
        self.gl.bind_texture(gl::TEXTURE_2D, 0);
        self.check_error("copy_texture")
    }

    fn save_state(&mut self) -> SavedGlState {
        let mut viewport = [0i32; 4];
        unsafe {
            self.glow
                .get_parameter_i32_slice(glow::VIEWPORT, &mut viewport);
            SavedGlState {
                viewport,
                scissor_test: self.glow.is_enabled(glow::SCISSOR_TEST),
                depth_test: self.glow.is_enabled(glow::DEPTH_TEST),
            }
        }
    }

    fn restore_state(&mut self, state: &SavedGlState) {
        let [x, y, width, height] = state.viewport;
        self.gl.viewport(x, y, width, height);
        for (cap, enabled) in [
            (gl::SCISSOR_TEST, state.scissor_test),
            (gl::DEPTH_TEST, state.depth_test),
        ] {
            if enabled {
                self.gl.enable(cap);
            } else {
                self.gl.disable(cap);
            }
        }
    }

    fn bind_default_framebuffer(&mut self) {
        self.gl.bind_framebuffer(gl::FRAMEBUFFER, 0);
    }

    fn check_error(&mut self, label: &'static str) -> Result<(), GpuError> {
        let code = unsafe { self.glow.get_error() };
        if code == glow::NO_ERROR {
            return Ok(());
        }

        // Drain queued errors so the next check starts clean. A lost context may report
        // errors forever, hence the bound.
        for _ in 0..MAX_DRAINED_GL_ERRORS {
            if unsafe { self.glow.get_error() } == glow::NO_ERROR {
                break;
            }
        }
        Err(GpuError::Gl { code, label })
    }
}

#[cfg(test)]
mod tests {
    use super::parse_gl_version;

    #[test]
    fn parses_desktop_and_es_versions() {
        assert_eq!(parse_gl_version("4.6.0 NVIDIA 535.0"), (4, 6));
        assert_eq!(parse_gl_version("OpenGL ES 3.2 Mesa"), (3, 2));
        assert_eq!(parse_gl_version("garbage"), (0, 0));
    }
}
