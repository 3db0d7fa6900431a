//! Text mesh loader for the OBJ face/vertex/texcoord/normal format.
//!
//! Supported statements: `v`, `vt`, `vn` and `f` with `v`, `v/t`, `v//n` or
//! `v/t/n` corners. Indices are 1-based; negative indices count back from the
//! most recent element. Polygons are fan-triangulated. Grouping, smoothing and
//! material statements are ignored. Malformed lines are logged and skipped.

use std::collections::HashMap;
use std::path::Path;

use ember_common::Vertex;

use crate::AssetError;
use crate::mesh::Mesh;

const DEFAULT_NORMAL: [f32; 3] = [0.0, 1.0, 0.0];

/// Position, texcoord and normal indices of one face corner, all 0-based.
type Corner = (usize, Option<usize>, Option<usize>);

/// Read and parse an OBJ file. The mesh is named after the file name.
pub fn load_obj(path: impl AsRef<Path>) -> Result<Mesh, AssetError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(AssetError::NotFound(path.to_path_buf()));
    }
    let source = std::fs::read_to_string(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mesh".to_string());
    Ok(parse_obj(&name, &source))
}

/// Parse OBJ text into an indexed mesh.
///
/// Each distinct corner triple becomes one vertex; repeated corners share it.
pub fn parse_obj(name: &str, source: &str) -> Mesh {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut tex_coords: Vec<[f32; 2]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();

    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    let mut unique: HashMap<Corner, u32> = HashMap::new();

    for (number, line) in source.lines().enumerate() {
        let line_no = number + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };
        let args: Vec<&str> = parts.collect();

        match keyword {
            "v" => match parse_floats::<3>(&args) {
                Some(p) => positions.push(p),
                None => tracing::warn!(mesh = name, line = line_no, "malformed vertex position"),
            },
            "vt" => match parse_floats::<2>(&args) {
                Some(t) => tex_coords.push(t),
                None => tracing::warn!(mesh = name, line = line_no, "malformed texture coordinate"),
            },
            "vn" => match parse_floats::<3>(&args) {
                Some(n) => normals.push(n),
                None => tracing::warn!(mesh = name, line = line_no, "malformed vertex normal"),
            },
            "f" => {
                let corners: Option<Vec<Corner>> = args
                    .iter()
                    .map(|c| parse_corner(c, positions.len(), tex_coords.len(), normals.len()))
                    .collect();
                let corners = match corners {
                    Some(c) if c.len() >= 3 => c,
                    _ => {
                        tracing::warn!(mesh = name, line = line_no, "malformed face");
                        continue;
                    }
                };

                let mut face = Vec::with_capacity(corners.len());
                for corner in corners {
                    let index = *unique.entry(corner).or_insert_with(|| {
                        let (p, t, n) = corner;
                        vertices.push(Vertex::new(
                            positions[p],
                            n.map_or(DEFAULT_NORMAL, |n| normals[n]),
                            t.map_or([0.0, 0.0], |t| tex_coords[t]),
                        ));
                        (vertices.len() - 1) as u32
                    });
                    face.push(index);
                }
                for i in 1..face.len() - 1 {
                    indices.extend_from_slice(&[face[0], face[i], face[i + 1]]);
                }
            }
            "o" | "g" | "s" | "usemtl" | "mtllib" => {}
            other => {
                tracing::debug!(mesh = name, line = line_no, keyword = other, "ignored statement");
            }
        }
    }

    Mesh::with_geometry(name, vertices, indices)
}

fn parse_floats<const N: usize>(args: &[&str]) -> Option<[f32; N]> {
    if args.len() < N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = arg.parse().ok()?;
    }
    Some(out)
}

/// Resolve a 1-based or negative OBJ index against `len` elements.
fn resolve_index(raw: &str, len: usize) -> Option<usize> {
    let value: i64 = raw.parse().ok()?;
    let resolved = match value {
        0 => return None,
        v if v > 0 => v - 1,
        v => len as i64 + v,
    };
    (resolved >= 0 && (resolved as usize) < len).then_some(resolved as usize)
}

fn parse_corner(corner: &str, positions: usize, tex_coords: usize, normals: usize) -> Option<Corner> {
    let mut fields = corner.split('/');
    let position = resolve_index(fields.next()?, positions)?;
    let tex = match fields.next() {
        None | Some("") => None,
        Some(raw) => Some(resolve_index(raw, tex_coords)?),
    };
    let normal = match fields.next() {
        None | Some("") => None,
        Some(raw) => Some(resolve_index(raw, normals)?),
    };
    Some((position, tex, normal))
}
