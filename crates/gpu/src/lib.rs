//! Graphics device seam for the ember renderer.
//!
//! The renderer talks to the graphics API exclusively through the
//! [`GraphicsDevice`] trait. Buffers, vertex arrays and shaders are referred
//! to by opaque handles; the device owns the actual storage.
//!
//! # Invariants
//! - A [`GpuBuffer`] is the exclusive owner of its device buffer. Moving the
//!   value transfers ownership; there is no cloning.
//! - Destruction always unbinds before freeing.
//! - Mapped reads and writes are only valid between `map_memory` and the
//!   matching `unmap_memory`; anything else is logged and skipped.
//!
//! [`HeadlessDevice`] keeps all buffer contents on the CPU and records every
//! state change and draw, which makes it the test double for everything above
//! this crate.

mod buffer;
mod device;
mod error;
mod headless;
mod indirect;
mod layout;
mod shader;
mod uniform;

pub use buffer::GpuBuffer;
pub use device::{
    BufferHandle, BufferTarget, GraphicsDevice, MapAccess, ShaderHandle, ShaderSource,
    ShaderStage, VertexArrayHandle,
};
pub use error::GpuError;
pub use headless::{DeviceCommand, HeadlessBuffer, HeadlessDevice, HeadlessShader, HeadlessVertexArray};
pub use indirect::{DrawArraysIndirectCommand, DrawElementsIndirectCommand, IndirectCommand};
pub use layout::{ScalarType, VertexAttribute, VertexLayout};
pub use shader::ShaderLibrary;
pub use uniform::UniformValue;
