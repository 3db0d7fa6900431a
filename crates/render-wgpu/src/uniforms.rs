use ember_gpu::UniformValue;

/// Slots reserved for every array uniform in a packed block.
pub const MAX_UNIFORM_ARRAY_LEN: usize = 64;

/// Dynamic uniform offsets must be multiples of this.
pub(crate) const UNIFORM_OFFSET_ALIGNMENT: usize = 256;

/// Pack named values into one uniform block, in order.
///
/// Scalars and vectors take 16 bytes, matrices 64. Arrays are padded (or
/// truncated, with a warning) to [`MAX_UNIFORM_ARRAY_LEN`] elements.
pub fn pack_uniform_block(values: &[(String, UniformValue)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, value) in values {
        let mut bytes = value.std140_bytes();
        if let Some(element_size) = array_element_size(value) {
            let reserved = MAX_UNIFORM_ARRAY_LEN * element_size;
            if bytes.len() > reserved {
                tracing::warn!(
                    uniform = %name,
                    len = value.len(),
                    max = MAX_UNIFORM_ARRAY_LEN,
                    "uniform array truncated"
                );
            }
            bytes.resize(reserved, 0);
        }
        out.extend_from_slice(&bytes);
    }
    out
}

fn array_element_size(value: &UniformValue) -> Option<usize> {
    match value {
        UniformValue::IntArray(_)
        | UniformValue::FloatArray(_)
        | UniformValue::Vec3Array(_)
        | UniformValue::Vec4Array(_) => Some(16),
        UniformValue::Mat4Array(_) => Some(64),
        _ => None,
    }
}

pub(crate) fn align_up(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3, Vec4};

    fn named(values: Vec<(&str, UniformValue)>) -> Vec<(String, UniformValue)> {
        values.into_iter().map(|(n, v)| (n.to_string(), v)).collect()
    }

    #[test]
    fn phong_block_matches_wgsl_struct_size() {
        let block = pack_uniform_block(&named(vec![
            ("u_ViewProjection", UniformValue::Mat4(Mat4::IDENTITY)),
            ("u_Diffuse", UniformValue::Vec3Array(vec![Vec3::ONE; 2])),
            ("u_Specular", UniformValue::Vec3Array(vec![Vec3::ONE; 2])),
            ("u_Shininess", UniformValue::FloatArray(vec![32.0; 2])),
            ("u_AlbedoTexture", UniformValue::IntArray(vec![-1; 2])),
            ("u_MaterialIndex", UniformValue::Int(1)),
        ]));
        assert_eq!(block.len(), 64 + 4 * 64 * 16 + 16);
    }

    #[test]
    fn unlit_block_layout() {
        let color = Vec4::new(1.0, 0.5, 0.25, 1.0);
        let block = pack_uniform_block(&named(vec![
            ("u_ViewProjection", UniformValue::Mat4(Mat4::IDENTITY)),
            ("u_Color", UniformValue::Vec4Array(vec![color])),
            ("u_AlbedoTexture", UniformValue::IntArray(vec![-1])),
            ("u_MaterialIndex", UniformValue::Int(0)),
        ]));
        assert_eq!(block.len(), 64 + 2 * 64 * 16 + 16);
        let first_color: [f32; 4] = bytemuck::pod_read_unaligned(&block[64..80]);
        assert_eq!(first_color, color.to_array());
    }

    #[test]
    fn oversized_arrays_are_truncated() {
        let block = pack_uniform_block(&named(vec![(
            "u_Shininess",
            UniformValue::FloatArray(vec![1.0; MAX_UNIFORM_ARRAY_LEN + 10]),
        )]));
        assert_eq!(block.len(), MAX_UNIFORM_ARRAY_LEN * 16);
    }

    #[test]
    fn alignment_rounds_up() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(4176, 256), 4352);
    }
}
