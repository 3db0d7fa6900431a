use ember_gpu::{GpuError, ScalarType, VertexAttribute, VertexLayout};

/// A vertex buffer description in wgpu terms, owned so it can outlive the
/// [`VertexLayout`] it came from.
#[derive(Debug, Clone)]
pub(crate) struct BufferLayout {
    pub stride: u64,
    pub step_mode: wgpu::VertexStepMode,
    pub attributes: Vec<wgpu::VertexAttribute>,
}

impl BufferLayout {
    pub fn as_wgpu(&self) -> wgpu::VertexBufferLayout<'_> {
        wgpu::VertexBufferLayout {
            array_stride: self.stride,
            step_mode: self.step_mode,
            attributes: &self.attributes,
        }
    }
}

pub(crate) fn convert_layout(layout: &VertexLayout) -> Result<BufferLayout, GpuError> {
    let step_mode = if layout.is_instanced() {
        wgpu::VertexStepMode::Instance
    } else {
        wgpu::VertexStepMode::Vertex
    };
    let attributes = layout
        .attributes()
        .iter()
        .map(|attr| {
            let expected = u32::from(layout.is_instanced());
            if attr.divisor != expected {
                return Err(GpuError::UnsupportedAttribute {
                    location: attr.location,
                    reason: format!(
                        "divisor {} in a buffer stepping with divisor {expected}",
                        attr.divisor
                    ),
                });
            }
            Ok(wgpu::VertexAttribute {
                format: vertex_format(attr)?,
                offset: u64::from(attr.offset),
                shader_location: attr.location,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(BufferLayout {
        stride: u64::from(layout.stride()),
        step_mode,
        attributes,
    })
}

fn vertex_format(attr: &VertexAttribute) -> Result<wgpu::VertexFormat, GpuError> {
    use wgpu::VertexFormat as F;
    let format = match (attr.scalar, attr.count, attr.normalized) {
        (ScalarType::F32, 1, _) => F::Float32,
        (ScalarType::F32, 2, _) => F::Float32x2,
        (ScalarType::F32, 3, _) => F::Float32x3,
        (ScalarType::F32, 4, _) => F::Float32x4,
        (ScalarType::I32, 1, false) => F::Sint32,
        (ScalarType::I32, 2, false) => F::Sint32x2,
        (ScalarType::I32, 3, false) => F::Sint32x3,
        (ScalarType::I32, 4, false) => F::Sint32x4,
        (ScalarType::U32, 1, false) => F::Uint32,
        (ScalarType::U32, 2, false) => F::Uint32x2,
        (ScalarType::U32, 3, false) => F::Uint32x3,
        (ScalarType::U32, 4, false) => F::Uint32x4,
        (ScalarType::U8, 2, false) => F::Uint8x2,
        (ScalarType::U8, 4, false) => F::Uint8x4,
        (ScalarType::U8, 2, true) => F::Unorm8x2,
        (ScalarType::U8, 4, true) => F::Unorm8x4,
        (scalar, count, normalized) => {
            return Err(GpuError::UnsupportedAttribute {
                location: attr.location,
                reason: format!("{count} x {scalar:?} (normalized: {normalized})"),
            });
        }
    };
    Ok(format)
}
