//! WGSL programs for the built-in material kinds.
//!
//! Uniform blocks are packed in the order the renderer first sets each
//! uniform: view-projection, the material arrays, then the material index.
//! Arrays always occupy [`MAX_UNIFORM_ARRAY_LEN`](crate::MAX_UNIFORM_ARRAY_LEN)
//! slots of 16 bytes each.

use ember_gpu::ShaderLibrary;

/// Lit material: diffuse and specular colours with a shininess exponent.
pub const PHONG_SHADER: &str = r#"
struct PhongUniforms {
    view_proj: mat4x4<f32>,
    diffuse: array<vec4<f32>, 64>,
    specular: array<vec4<f32>, 64>,
    shininess: array<vec4<f32>, 64>,
    albedo_texture: array<vec4<i32>, 64>,
    material_index: i32,
};

@group(0) @binding(0)
var<uniform> u: PhongUniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) tex_coords: vec2<f32>,
};

struct InstanceInput {
    @location(3) model_0: vec4<f32>,
    @location(4) model_1: vec4<f32>,
    @location(5) model_2: vec4<f32>,
    @location(6) model_3: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_normal: vec3<f32>,
    @location(1) tex_coords: vec2<f32>,
};

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    let model = mat4x4<f32>(
        instance.model_0,
        instance.model_1,
        instance.model_2,
        instance.model_3,
    );
    let world_pos = model * vec4<f32>(vertex.position, 1.0);

    var out: VertexOutput;
    out.clip_position = u.view_proj * world_pos;
    out.world_normal = normalize((model * vec4<f32>(vertex.normal, 0.0)).xyz);
    out.tex_coords = vertex.tex_coords;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let i = u.material_index;
    let light_dir = normalize(vec3<f32>(0.3, 1.0, 0.5));
    let view_dir = vec3<f32>(0.0, 0.0, 1.0);
    let half_dir = normalize(light_dir + view_dir);

    let ambient = 0.2;
    let diffuse = max(dot(in.world_normal, light_dir), 0.0);
    let specular = pow(max(dot(in.world_normal, half_dir), 0.0), max(u.shininess[i].x, 1.0));

    let color = u.diffuse[i].xyz * (ambient + diffuse) + u.specular[i].xyz * specular;
    return vec4<f32>(color, 1.0);
}
"#;

/// Flat colour, no lighting.
pub const UNLIT_SHADER: &str = r#"
struct UnlitUniforms {
    view_proj: mat4x4<f32>,
    color: array<vec4<f32>, 64>,
    albedo_texture: array<vec4<i32>, 64>,
    material_index: i32,
};

@group(0) @binding(0)
var<uniform> u: UnlitUniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) tex_coords: vec2<f32>,
};

struct InstanceInput {
    @location(3) model_0: vec4<f32>,
    @location(4) model_1: vec4<f32>,
    @location(5) model_2: vec4<f32>,
    @location(6) model_3: vec4<f32>,
};

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> @builtin(position) vec4<f32> {
    let model = mat4x4<f32>(
        instance.model_0,
        instance.model_1,
        instance.model_2,
        instance.model_3,
    );
    return u.view_proj * model * vec4<f32>(vertex.position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return u.color[u.material_index];
}
"#;

/// Register the built-in programs under their material kinds' shader names.
pub fn register_builtin_shaders(library: &mut ShaderLibrary) {
    library.register_combined("phong", PHONG_SHADER);
    library.register_combined("unlit", UNLIT_SHADER);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_gpu::HeadlessDevice;

    #[test]
    fn builtin_shaders_have_both_entry_points() {
        for source in [PHONG_SHADER, UNLIT_SHADER] {
            assert!(source.contains("fn vs_main"));
            assert!(source.contains("fn fs_main"));
            assert!(source.contains("material_index: i32"));
        }
    }

    #[test]
    fn builtin_shaders_load_by_kind_name() {
        let mut library = ShaderLibrary::in_memory();
        register_builtin_shaders(&mut library);
        let mut device = HeadlessDevice::new();
        assert!(library.load(&mut device, "phong").is_ok());
        assert!(library.load(&mut device, "unlit").is_ok());
    }
}
