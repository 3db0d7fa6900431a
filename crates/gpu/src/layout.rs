/// Scalar component type of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    F32,
    I32,
    U32,
    U8,
}

impl ScalarType {
    /// Size of one component in bytes.
    pub fn size(self) -> u32 {
        match self {
            Self::F32 | Self::I32 | Self::U32 => 4,
            Self::U8 => 1,
        }
    }
}

/// One attribute of a vertex layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub scalar: ScalarType,
    pub count: u32,
    /// Size of one component in bytes.
    pub size: u32,
    pub normalized: bool,
    /// 0 advances per vertex, N advances once every N instances.
    pub divisor: u32,
    /// Byte offset inside one element, derived from the attributes added before.
    pub offset: u32,
}

impl VertexAttribute {
    pub fn byte_size(&self) -> u32 {
        self.count * self.size
    }
}

/// Ordered attribute description of one buffer bound to a vertex array.
///
/// Attributes must be added in the order the consuming shader expects; the
/// layout is never reordered or checked against the shader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
    stride: u32,
}

impl VertexLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        location: u32,
        scalar: ScalarType,
        count: u32,
        normalized: bool,
        divisor: u32,
    ) -> &mut Self {
        let attribute = VertexAttribute {
            location,
            scalar,
            count,
            size: scalar.size(),
            normalized,
            divisor,
            offset: self.stride,
        };
        self.stride += attribute.byte_size();
        self.attributes.push(attribute);
        self
    }

    /// Sum of `count * size` over all attributes added so far.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// True when the layout advances per instance rather than per vertex.
    pub fn is_instanced(&self) -> bool {
        self.attributes.iter().any(|a| a.divisor > 0)
    }

    /// Per-vertex position / normal / texture coordinates at locations 0..=2.
    pub fn mesh_vertex() -> Self {
        let mut layout = Self::new();
        layout
            .add(0, ScalarType::F32, 3, false, 0)
            .add(1, ScalarType::F32, 3, false, 0)
            .add(2, ScalarType::F32, 2, false, 0);
        layout
    }

    /// A 4x4 model matrix as four vec4 rows, one per instance.
    pub fn instance_transform(first_location: u32) -> Self {
        let mut layout = Self::new();
        for row in 0..4 {
            layout.add(first_location + row, ScalarType::F32, 4, false, 1);
        }
        layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_common::Vertex;

    #[test]
    fn stride_is_sum_of_attributes() {
        let mut layout = VertexLayout::new();
        layout
            .add(0, ScalarType::F32, 3, false, 0)
            .add(1, ScalarType::U8, 4, true, 0);
        assert_eq!(layout.stride(), 12 + 4);
        assert_eq!(layout.attributes()[1].offset, 12);
    }

    #[test]
    fn mesh_vertex_layout_matches_vertex_struct() {
        let layout = VertexLayout::mesh_vertex();
        assert_eq!(layout.stride() as usize, std::mem::size_of::<Vertex>());
        assert!(!layout.is_instanced());
        let locations: Vec<u32> = layout.attributes().iter().map(|a| a.location).collect();
        assert_eq!(locations, vec![0, 1, 2]);
    }

    #[test]
    fn instance_transform_is_a_mat4_per_instance() {
        let layout = VertexLayout::instance_transform(3);
        assert_eq!(layout.stride(), 64);
        assert!(layout.is_instanced());
        assert!(layout.attributes().iter().all(|a| a.divisor == 1 && a.count == 4));
        assert_eq!(layout.attributes()[3].location, 6);
        assert_eq!(layout.attributes()[3].offset, 48);
    }
}
