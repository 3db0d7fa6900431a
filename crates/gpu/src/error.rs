use crate::device::{BufferHandle, ShaderStage};

/// Errors reported by a graphics device or by the buffer/shader helpers.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("out of device memory: requested {requested} bytes, {available} available")]
    OutOfMemory { requested: usize, available: usize },
    #[error("unknown buffer {0:?}")]
    UnknownBuffer(BufferHandle),
    #[error("buffer {0:?} is already mapped")]
    AlreadyMapped(BufferHandle),
    #[error("write of {len} bytes at offset {offset} exceeds buffer size {size}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },
    #[error("shader '{shader}' has no {stage:?} stage")]
    MissingShaderStage { shader: String, stage: ShaderStage },
    #[error("shader '{shader}' failed to compile: {message}")]
    ShaderCompile { shader: String, message: String },
    #[error("unsupported vertex attribute at location {location}: {reason}")]
    UnsupportedAttribute { location: u32, reason: String },
    #[error("graphics backend error: {0}")]
    Backend(String),
    #[error("operation not supported by this device: {0}")]
    Unsupported(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
