use glam::{Mat4, Vec2, Vec3, Vec4};

/// A value uploaded to a named shader uniform.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
    IntArray(Vec<i32>),
    FloatArray(Vec<f32>),
    Vec3Array(Vec<Vec3>),
    Vec4Array(Vec<Vec4>),
    Mat4Array(Vec<Mat4>),
}

impl UniformValue {
    /// Number of elements for array values, 1 otherwise.
    pub fn len(&self) -> usize {
        match self {
            Self::IntArray(v) => v.len(),
            Self::FloatArray(v) => v.len(),
            Self::Vec3Array(v) => v.len(),
            Self::Vec4Array(v) => v.len(),
            Self::Mat4Array(v) => v.len(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes in std140 layout. Every value starts on a 16-byte boundary and
    /// every array element is padded to 16 bytes.
    pub fn std140_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Self::Int(v) => push_padded(&mut out, bytemuck::bytes_of(v)),
            Self::Float(v) => push_padded(&mut out, bytemuck::bytes_of(v)),
            Self::Vec2(v) => push_padded(&mut out, bytemuck::bytes_of(v)),
            Self::Vec3(v) => push_padded(&mut out, bytemuck::bytes_of(v)),
            Self::Vec4(v) => push_padded(&mut out, bytemuck::bytes_of(v)),
            Self::Mat4(m) => out.extend_from_slice(bytemuck::bytes_of(m)),
            Self::IntArray(values) => {
                for v in values {
                    push_padded(&mut out, bytemuck::bytes_of(v));
                }
            }
            Self::FloatArray(values) => {
                for v in values {
                    push_padded(&mut out, bytemuck::bytes_of(v));
                }
            }
            Self::Vec3Array(values) => {
                for v in values {
                    push_padded(&mut out, bytemuck::bytes_of(v));
                }
            }
            Self::Vec4Array(values) => out.extend_from_slice(bytemuck::cast_slice(values)),
            Self::Mat4Array(values) => out.extend_from_slice(bytemuck::cast_slice(values)),
        }
        out
    }
}

fn push_padded(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(bytes);
    let rem = out.len() % 16;
    if rem != 0 {
        out.resize(out.len() + 16 - rem, 0);
    }
}
