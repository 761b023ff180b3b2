//! ### English
//! Pixel geometry shared by producers and the upload path: dirty rectangles, solid colors and
//! tightly packed RGBA8 images.
//!
//! ### 中文
//! 生产者与上传路径共用的像素几何类型：脏矩形、纯色以及紧密排列的 RGBA8 图像。

use dpi::PhysicalSize;

use super::error::TransferError;

/// ### English
/// Bytes per pixel for every image handled by the queue (RGBA8).
///
/// ### 中文
/// 队列处理的所有图像的每像素字节数（RGBA8）。
pub const BYTES_PER_PIXEL: usize = 4;

/// ### English
/// Sub-rectangle of a destination texture that changed.
///
/// An empty rectangle (zero width or height) means "full update".
///
/// ### 中文
/// 目标纹理中发生变化的子矩形。
///
/// 空矩形（宽或高为 0）表示“整块更新”。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DirtyRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl DirtyRect {
    pub const EMPTY: DirtyRect = DirtyRect {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// ### English
    /// Rectangle covering a whole surface of `size`.
    ///
    /// ### 中文
    /// 覆盖整个 `size` 表面的矩形。
    pub const fn covering(size: PhysicalSize<u32>) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// ### English
    /// Exclusive right/bottom edges, computed in `i64` so huge rectangles cannot overflow.
    ///
    /// ### 中文
    /// 以 `i64` 计算的右/下边界（不含），避免超大矩形溢出。
    #[inline]
    fn edges(&self) -> (i64, i64, i64, i64) {
        let left = self.x as i64;
        let top = self.y as i64;
        (left, top, left + self.width as i64, top + self.height as i64)
    }

    /// ### English
    /// Intersects this rectangle with `(0, 0, bounds)`.
    ///
    /// Returns [`DirtyRect::EMPTY`] when nothing is left.
    ///
    /// ### 中文
    /// 将该矩形与 `(0, 0, bounds)` 求交。
    ///
    /// 若交集为空则返回 [`DirtyRect::EMPTY`]。
    pub fn clamp_to(&self, bounds: PhysicalSize<u32>) -> Self {
        let (left, top, right, bottom) = self.edges();
        let left = left.max(0);
        let top = top.max(0);
        let right = right.min(bounds.width as i64);
        let bottom = bottom.min(bounds.height as i64);
        if right <= left || bottom <= top {
            return Self::EMPTY;
        }

        Self::new(
            left as i32,
            top as i32,
            (right - left) as u32,
            (bottom - top) as u32,
        )
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        let (left, top, right, bottom) = self.edges();
        let (x, y) = (x as i64, y as i64);
        x >= left && x < right && y >= top && y < bottom
    }
}

/// ### English
/// Straight-alpha RGBA8 color used by the uniform-color fast path.
///
/// ### 中文
/// 纯色快路径使用的 RGBA8 颜色（非预乘 alpha）。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// ### English
/// Owned RGBA8 image: tightly packed rows, top row first.
///
/// ### 中文
/// 拥有所有权的 RGBA8 图像：行紧密排列，首行在上。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    size: PhysicalSize<u32>,
    pixels: Vec<u8>,
}

impl Image {
    /// ### English
    /// Wraps `pixels` as an image of `size`, checking the byte length.
    ///
    /// ### 中文
    /// 将 `pixels` 包装为 `size` 尺寸的图像，并校验字节长度。
    pub fn from_pixels(size: PhysicalSize<u32>, pixels: Vec<u8>) -> Result<Self, TransferError> {
        let expected = Self::byte_len(size);
        if pixels.len() != expected {
            return Err(TransferError::PixelLength {
                width: size.width,
                height: size.height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self { size, pixels })
    }

    /// ### English
    /// Creates an image where every pixel is `color`.
    ///
    /// ### 中文
    /// 创建所有像素均为 `color` 的图像。
    pub fn filled(size: PhysicalSize<u32>, color: Color) -> Self {
        let pixels = color.to_array().repeat(Self::pixel_count(size));
        Self { size, pixels }
    }

    /// ### English
    /// Creates a zero-initialized (transparent black) image.
    ///
    /// ### 中文
    /// 创建全 0（透明黑）图像。
    pub fn zeroed(size: PhysicalSize<u32>) -> Self {
        Self {
            size,
            pixels: vec![0; Self::byte_len(size)],
        }
    }

    #[inline]
    fn pixel_count(size: PhysicalSize<u32>) -> usize {
        size.width as usize * size.height as usize
    }

    #[inline]
    fn byte_len(size: PhysicalSize<u32>) -> usize {
        Self::pixel_count(size) * BYTES_PER_PIXEL
    }

    #[inline]
    fn stride(&self) -> usize {
        self.size.width as usize * BYTES_PER_PIXEL
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        let at = y as usize * self.stride() + x as usize * BYTES_PER_PIXEL;
        let p = &self.pixels[at..at + BYTES_PER_PIXEL];
        Some(Color::rgba(p[0], p[1], p[2], p[3]))
    }

    /// ### English
    /// Overwrites this image with `source`, reusing the existing allocation when possible.
    ///
    /// ### 中文
    /// 用 `source` 覆盖本图像，尽量复用已有的内存分配。
    pub fn copy_from(&mut self, source: &Image) {
        self.size = source.size;
        self.pixels.clear();
        self.pixels.extend_from_slice(&source.pixels);
    }

    /// ### English
    /// Copies a `width x height` block from `source` at `(src_x, src_y)` into this image at
    /// `(dst_x, dst_y)`. The block is clamped to both images; returns the copied size.
    ///
    /// #### Parameters
    /// - `source`: Image to read from.
    /// - `src_x`/`src_y`: Top-left corner in `source`.
    /// - `dst_x`/`dst_y`: Top-left corner in `self`.
    /// - `width`/`height`: Requested block size.
    ///
    /// ### 中文
    /// 从 `source` 的 `(src_x, src_y)` 处复制 `width x height` 的块到本图像的 `(dst_x, dst_y)`。
    /// 复制区域会按两张图像的边界裁剪；返回实际复制的尺寸。
    ///
    /// #### 参数
    /// - `source`：读取源图像。
    /// - `src_x`/`src_y`：`source` 中的左上角。
    /// - `dst_x`/`dst_y`：`self` 中的左上角。
    /// - `width`/`height`：请求的块尺寸。
    #[allow(clippy::too_many_arguments)]
    pub fn blit_from(
        &mut self,
        source: &Image,
        src_x: u32,
        src_y: u32,
        dst_x: u32,
        dst_y: u32,
        width: u32,
        height: u32,
    ) -> PhysicalSize<u32> {
        let width = width
            .min(source.size.width.saturating_sub(src_x))
            .min(self.size.width.saturating_sub(dst_x));
        let height = height
            .min(source.size.height.saturating_sub(src_y))
            .min(self.size.height.saturating_sub(dst_y));
        if width == 0 || height == 0 {
            return PhysicalSize::new(0, 0);
        }

        let row_bytes = width as usize * BYTES_PER_PIXEL;
        let src_stride = source.stride();
        let dst_stride = self.stride();
        for row in 0..height as usize {
            let src_at = (src_y as usize + row) * src_stride + src_x as usize * BYTES_PER_PIXEL;
            let dst_at = (dst_y as usize + row) * dst_stride + dst_x as usize * BYTES_PER_PIXEL;
            self.pixels[dst_at..dst_at + row_bytes]
                .copy_from_slice(&source.pixels[src_at..src_at + row_bytes]);
        }
        PhysicalSize::new(width, height)
    }

    /// ### English
    /// Returns the top-left `width x height` block as tightly packed bytes.
    ///
    /// Used for sub-image uploads where the GL unpack row length cannot be relied upon.
    ///
    /// ### 中文
    /// 以紧密排列字节返回左上角 `width x height` 的块。
    ///
    /// 用于子图上传（不依赖 GL 的 unpack row length）。
    pub fn top_left_block(&self, width: u32, height: u32) -> Vec<u8> {
        let width = width.min(self.size.width) as usize;
        let height = height.min(self.size.height) as usize;
        let row_bytes = width * BYTES_PER_PIXEL;
        let mut out = Vec::with_capacity(row_bytes * height);
        for row in 0..height {
            let at = row * self.stride();
            out.extend_from_slice(&self.pixels[at..at + row_bytes]);
        }
        out
    }

    /// ### English
    /// FNV-1a checksum over every pixel whose position satisfies `include`.
    ///
    /// ### 中文
    /// 对满足 `include` 条件的像素计算 FNV-1a 校验和。
    pub fn checksum_where(&self, include: impl Fn(u32, u32) -> bool) -> u64 {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0000_0100_0000_01b3;

        let mut hash = OFFSET;
        for y in 0..self.size.height {
            for x in 0..self.size.width {
                if !include(x, y) {
                    continue;
                }
                let at = y as usize * self.stride() + x as usize * BYTES_PER_PIXEL;
                for byte in &self.pixels[at..at + BYTES_PER_PIXEL] {
                    hash ^= *byte as u64;
                    hash = hash.wrapping_mul(PRIME);
                }
            }
        }
        hash
    }

    /// ### English
    /// Checksum of every pixel outside `region`.
    ///
    /// ### 中文
    /// `region` 之外所有像素的校验和。
    pub fn checksum_outside(&self, region: DirtyRect) -> u64 {
        self.checksum_where(|x, y| !region.contains(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_keeps_inner_rect() {
        let rect = DirtyRect::new(2, 3, 4, 5);
        assert_eq!(rect.clamp_to(PhysicalSize::new(16, 16)), rect);
    }

    #[test]
    fn clamp_trims_negative_origin_and_overhang() {
        let rect = DirtyRect::new(-4, 10, 8, 10);
        assert_eq!(
            rect.clamp_to(PhysicalSize::new(16, 16)),
            DirtyRect::new(0, 10, 4, 6)
        );
    }

    #[test]
    fn clamp_outside_bounds_is_empty() {
        let rect = DirtyRect::new(40, 40, 8, 8);
        assert!(rect.clamp_to(PhysicalSize::new(16, 16)).is_empty());
    }

    #[test]
    fn from_pixels_rejects_wrong_length() {
        let err = Image::from_pixels(PhysicalSize::new(2, 2), vec![0; 15]).unwrap_err();
        assert!(matches!(
            err,
            TransferError::PixelLength {
                expected: 16,
                actual: 15,
                ..
            }
        ));
    }

    #[test]
    fn blit_clamps_to_destination() {
        let red = Color::rgba(255, 0, 0, 255);
        let source = Image::filled(PhysicalSize::new(4, 4), red);
        let mut target = Image::zeroed(PhysicalSize::new(6, 6));

        let copied = target.blit_from(&source, 0, 0, 4, 4, 4, 4);

        assert_eq!(copied, PhysicalSize::new(2, 2));
        assert_eq!(target.pixel(5, 5), Some(red));
        assert_eq!(target.pixel(3, 3), Some(Color::TRANSPARENT));
    }

    #[test]
    fn checksum_outside_ignores_region() {
        let mut a = Image::zeroed(PhysicalSize::new(8, 8));
        let b = a.clone();
        let patch = Image::filled(PhysicalSize::new(2, 2), Color::WHITE);
        a.blit_from(&patch, 0, 0, 3, 3, 2, 2);

        let region = DirtyRect::new(3, 3, 2, 2);
        assert_eq!(a.checksum_outside(region), b.checksum_outside(region));
        assert_ne!(a.checksum_where(|_, _| true), b.checksum_where(|_, _| true));
    }
}
