/// ### English
/// Engine internal modules (transfer queue, shared surface, GPU backends and the reference tile
/// destination).
///
/// ### 中文
/// 引擎内部模块（传输队列、共享表面、GPU 后端以及参考 tile 目标对象）。
pub mod config;
pub mod destination;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod queue;
pub mod surface;
pub mod tile;
