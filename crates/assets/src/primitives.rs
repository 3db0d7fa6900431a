//! Procedurally generated meshes.

use ember_common::Vertex;

use crate::mesh::Mesh;

/// Unit cube centred on the origin, four vertices per face so each face
/// keeps its own normal.
pub fn cube() -> Mesh {
    let p = 0.5_f32;
    #[rustfmt::skip]
    let vertices = vec![
        // +Z face
        Vertex::new([-p, -p,  p], [0.0, 0.0, 1.0], [0.0, 0.0]),
        Vertex::new([ p, -p,  p], [0.0, 0.0, 1.0], [1.0, 0.0]),
        Vertex::new([ p,  p,  p], [0.0, 0.0, 1.0], [1.0, 1.0]),
        Vertex::new([-p,  p,  p], [0.0, 0.0, 1.0], [0.0, 1.0]),
        // -Z face
        Vertex::new([ p, -p, -p], [0.0, 0.0, -1.0], [0.0, 0.0]),
        Vertex::new([-p, -p, -p], [0.0, 0.0, -1.0], [1.0, 0.0]),
        Vertex::new([-p,  p, -p], [0.0, 0.0, -1.0], [1.0, 1.0]),
        Vertex::new([ p,  p, -p], [0.0, 0.0, -1.0], [0.0, 1.0]),
        // +X face
        Vertex::new([ p, -p,  p], [1.0, 0.0, 0.0], [0.0, 0.0]),
        Vertex::new([ p, -p, -p], [1.0, 0.0, 0.0], [1.0, 0.0]),
        Vertex::new([ p,  p, -p], [1.0, 0.0, 0.0], [1.0, 1.0]),
        Vertex::new([ p,  p,  p], [1.0, 0.0, 0.0], [0.0, 1.0]),
        // -X face
        Vertex::new([-p, -p, -p], [-1.0, 0.0, 0.0], [0.0, 0.0]),
        Vertex::new([-p, -p,  p], [-1.0, 0.0, 0.0], [1.0, 0.0]),
        Vertex::new([-p,  p,  p], [-1.0, 0.0, 0.0], [1.0, 1.0]),
        Vertex::new([-p,  p, -p], [-1.0, 0.0, 0.0], [0.0, 1.0]),
        // +Y face
        Vertex::new([-p,  p,  p], [0.0, 1.0, 0.0], [0.0, 0.0]),
        Vertex::new([ p,  p,  p], [0.0, 1.0, 0.0], [1.0, 0.0]),
        Vertex::new([ p,  p, -p], [0.0, 1.0, 0.0], [1.0, 1.0]),
        Vertex::new([-p,  p, -p], [0.0, 1.0, 0.0], [0.0, 1.0]),
        // -Y face
        Vertex::new([-p, -p, -p], [0.0, -1.0, 0.0], [0.0, 0.0]),
        Vertex::new([ p, -p, -p], [0.0, -1.0, 0.0], [1.0, 0.0]),
        Vertex::new([ p, -p,  p], [0.0, -1.0, 0.0], [1.0, 1.0]),
        Vertex::new([-p, -p,  p], [0.0, -1.0, 0.0], [0.0, 1.0]),
    ];
    #[rustfmt::skip]
    let indices: Vec<u32> = vec![
        0,1,2, 2,3,0,       // +Z
        4,5,6, 6,7,4,       // -Z
        8,9,10, 10,11,8,    // +X
        12,13,14, 14,15,12, // -X
        16,17,18, 18,19,16, // +Y
        20,21,22, 22,23,20, // -Y
    ];
    Mesh::with_geometry("cube", vertices, indices)
}

/// Unit quad in the XY plane facing +Z.
pub fn quad() -> Mesh {
    let p = 0.5_f32;
    let normal = [0.0, 0.0, 1.0];
    let vertices = vec![
        Vertex::new([-p, -p, 0.0], normal, [0.0, 0.0]),
        Vertex::new([p, -p, 0.0], normal, [1.0, 0.0]),
        Vertex::new([p, p, 0.0], normal, [1.0, 1.0]),
        Vertex::new([-p, p, 0.0], normal, [0.0, 1.0]),
    ];
    Mesh::with_geometry("quad", vertices, vec![0, 1, 2, 2, 3, 0])
}

/// Single triangle without an index buffer.
pub fn triangle() -> Mesh {
    let normal = [0.0, 0.0, 1.0];
    let vertices = vec![
        Vertex::new([-0.5, -0.5, 0.0], normal, [0.0, 0.0]),
        Vertex::new([0.5, -0.5, 0.0], normal, [1.0, 0.0]),
        Vertex::new([0.0, 0.5, 0.0], normal, [0.5, 1.0]),
    ];
    Mesh::with_geometry("triangle", vertices, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_sizes() {
        let cube = cube();
        assert_eq!((cube.vertex_count(), cube.index_count()), (24, 36));
        let quad = quad();
        assert_eq!((quad.vertex_count(), quad.index_count()), (4, 6));
        let tri = triangle();
        assert_eq!((tri.vertex_count(), tri.index_count()), (3, 0));
        assert!(!tri.is_indexed());
    }

    #[test]
    fn cube_indices_in_range() {
        let cube = cube();
        assert!(cube.indices().iter().all(|i| (*i as usize) < cube.vertex_count()));
    }

    #[test]
    fn cube_normals_are_unit_axes() {
        for v in cube().vertices() {
            let n = glam::Vec3::from(v.normal);
            assert!((n.length() - 1.0).abs() < 1e-6);
        }
    }
}
