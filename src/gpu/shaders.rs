//! WGSL sources for the wgpu backend.

/// Draws buffer objects into the HDR target.
///
/// Points are instanced camera-facing quads (`vs_point` / `fs_point`, six
/// vertices per instance). Line strips use one vertex per point
/// (`vs_line` / `fs_line`). Both read `position` at location 0 and `color`
/// at location 1.
pub const OBJECT_SHADER: &str = r#"
struct Camera {
    view_proj: mat4x4<f32>,
    right: vec4<f32>,
    up: vec4<f32>,
};

// color: rgb tint + opacity
// params: point size, vertex colors flag
struct Material {
    color: vec4<f32>,
    params: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> camera: Camera;
@group(1) @binding(0)
var<uniform> material: Material;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) uv: vec2<f32>,
};

fn tint(color: vec3<f32>) -> vec4<f32> {
    let rgb = select(material.color.rgb, color * material.color.rgb, material.params.y > 0.5);
    return vec4<f32>(rgb, material.color.a);
}

@vertex
fn vs_point(
    @builtin(vertex_index) vertex_index: u32,
    @location(0) position: vec3<f32>,
    @location(1) color: vec3<f32>,
) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, 1.0),
    );
    let corner = corners[vertex_index];
    let half_size = material.params.x * 0.5;
    let world = position + (camera.right.xyz * corner.x + camera.up.xyz * corner.y) * half_size;

    var out: VertexOutput;
    out.clip_position = camera.view_proj * vec4<f32>(world, 1.0);
    out.color = tint(color);
    out.uv = corner;
    return out;
}

@fragment
fn fs_point(in: VertexOutput) -> @location(0) vec4<f32> {
    let d = length(in.uv);
    if d > 1.0 {
        discard;
    }
    let alpha = in.color.a * (1.0 - smoothstep(0.6, 1.0, d));
    return vec4<f32>(in.color.rgb, alpha);
}

@vertex
fn vs_line(
    @location(0) position: vec3<f32>,
    @location(1) color: vec3<f32>,
) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = camera.view_proj * vec4<f32>(position, 1.0);
    out.color = tint(color);
    out.uv = vec2<f32>(0.0, 0.0);
    return out;
}

@fragment
fn fs_line(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

/// Fullscreen composite: lensing, depth of field, bloom, tone map and
/// colour grade in a single pass over the HDR target.
pub const COMPOSITE_SHADER: &str = r#"
struct Post {
    // strength, radius, threshold
    bloom: vec4<f32>,
    // enabled, focus, aperture, max blur
    dof: vec4<f32>,
    // brightness, contrast, saturation
    grade: vec4<f32>,
    // center, radius, strength
    lensing: vec4<f32>,
    // lensing enabled, near, far
    misc: vec4<f32>,
    // 1 / width, 1 / height
    texel: vec4<f32>,
};

@group(0) @binding(0)
var hdr: texture_2d<f32>;
@group(0) @binding(1)
var hdr_sampler: sampler;
@group(0) @binding(2)
var depth: texture_depth_2d;
@group(0) @binding(3)
var<uniform> fx: Post;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(3.0, -1.0),
        vec2<f32>(-1.0, 3.0),
    );
    var uvs = array<vec2<f32>, 3>(
        vec2<f32>(0.0, 1.0),
        vec2<f32>(2.0, 1.0),
        vec2<f32>(0.0, -1.0),
    );

    var out: VertexOutput;
    out.clip_position = vec4<f32>(positions[vertex_index], 0.0, 1.0);
    out.uv = uvs[vertex_index];
    return out;
}

fn linear_depth(uv: vec2<f32>) -> f32 {
    let size = vec2<f32>(textureDimensions(depth));
    let coords = vec2<i32>(clamp(uv, vec2<f32>(0.0), vec2<f32>(1.0)) * (size - vec2<f32>(1.0)));
    let z = textureLoad(depth, coords, 0);
    let near = fx.misc.y;
    let far = fx.misc.z;
    return near * far / (far - z * (far - near));
}

fn blur(uv: vec2<f32>, radius: f32) -> vec3<f32> {
    var sum = vec3<f32>(0.0);
    for (var x = -2; x <= 2; x++) {
        for (var y = -2; y <= 2; y++) {
            let offset = vec2<f32>(f32(x), f32(y)) * fx.texel.xy * radius;
            sum += textureSampleLevel(hdr, hdr_sampler, uv + offset, 0.0).rgb;
        }
    }
    return sum / 25.0;
}

fn bloom(uv: vec2<f32>) -> vec3<f32> {
    let radius = 1.0 + fx.bloom.y * 8.0;
    var sum = vec3<f32>(0.0);
    for (var x = -2; x <= 2; x++) {
        for (var y = -2; y <= 2; y++) {
            let offset = vec2<f32>(f32(x), f32(y)) * fx.texel.xy * radius;
            let c = textureSampleLevel(hdr, hdr_sampler, uv + offset, 0.0).rgb;
            sum += max(c - vec3<f32>(fx.bloom.z), vec3<f32>(0.0));
        }
    }
    return sum / 25.0;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var uv = in.uv;

    if fx.misc.x > 0.5 {
        let d = uv - fx.lensing.xy;
        let r = length(d);
        let radius = fx.lensing.z;
        if r < radius && r > 0.0001 {
            uv -= normalize(d) * fx.lensing.w * (1.0 - r / radius) * radius;
        }
    }

    var color = textureSampleLevel(hdr, hdr_sampler, uv, 0.0).rgb;

    if fx.dof.x > 0.5 {
        let max_blur = max(fx.dof.w, 0.0001);
        let amount = clamp(abs(linear_depth(uv) - fx.dof.y) * fx.dof.z, 0.0, max_blur);
        let blurred = blur(uv, 1.0 + amount * 400.0);
        color = mix(color, blurred, amount / max_blur);
    }

    color += bloom(uv) * fx.bloom.x;

    // Reinhard, then grade in display range
    color = color / (vec3<f32>(1.0) + color);
    color += vec3<f32>(fx.grade.x * 0.1);
    color = (color - vec3<f32>(0.5)) * fx.grade.y + vec3<f32>(0.5);
    let luma = dot(color, vec3<f32>(0.2126, 0.7152, 0.0722));
    color = mix(vec3<f32>(luma), color, fx.grade.z);

    return vec4<f32>(clamp(color, vec3<f32>(0.0), vec3<f32>(1.0)), 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates WGSL code using naga.
    fn validate_wgsl(code: &str) -> Result<naga::Module, String> {
        let module = naga::front::wgsl::parse_str(code)
            .map_err(|e| format!("WGSL parse error: {:?}", e))?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        validator
            .validate(&module)
            .map_err(|e| format!("WGSL validation error: {:?}", e))?;

        Ok(module)
    }

    fn entry_points(module: &naga::Module) -> Vec<&str> {
        module.entry_points.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_object_shader_validates() {
        let module = validate_wgsl(OBJECT_SHADER).unwrap();
        let entries = entry_points(&module);
        for name in ["vs_point", "fs_point", "vs_line", "fs_line"] {
            assert!(entries.contains(&name), "missing entry point {}", name);
        }
    }

    #[test]
    fn test_composite_shader_validates() {
        let module = validate_wgsl(COMPOSITE_SHADER).unwrap();
        let entries = entry_points(&module);
        assert!(entries.contains(&"vs_main"));
        assert!(entries.contains(&"fs_main"));
    }
}
