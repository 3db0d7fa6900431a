//! wgpu implementation of [`ember_gpu::GraphicsDevice`].
//!
//! Draws recorded between `begin_frame` and `end_frame` are replayed into one
//! render pass. Adapters without indirect first-instance support get direct
//! draws decoded from a CPU copy of each indirect buffer.

mod device;
mod layout;
mod shaders;
mod uniforms;

pub use device::WgpuDevice;
pub use shaders::{PHONG_SHADER, UNLIT_SHADER, register_builtin_shaders};
pub use uniforms::{MAX_UNIFORM_ARRAY_LEN, pack_uniform_block};
