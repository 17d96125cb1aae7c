//! GPU post-processing surface.
//!
//! Each frame is two passes:
//!
//! 1. Scene pass: every visible object attached to the root is drawn into an
//!    HDR offscreen texture with depth.
//! 2. Composite pass: a fullscreen triangle samples the HDR and depth
//!    textures and applies lensing, depth of field, bloom, tone mapping and
//!    the colour grade on its way to the window surface.

use std::cell::RefCell;
use std::rc::Rc;

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use wgpu::util::DeviceExt;

use super::shaders::{COMPOSITE_SHADER, OBJECT_SHADER};
use super::{create_depth_texture, create_hdr_texture, GpuShared, DEPTH_FORMAT, HDR_FORMAT};
use crate::camera::Camera;
use crate::error::RenderError;
use crate::params::ParamSet;
use crate::post_process::{
    PostProcessConfig, PostProcessSettings, PostProcessingControlSurface, LENSING,
};
use crate::render::PrimitiveKind;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct CameraUniforms {
    view_proj: [[f32; 4]; 4],
    right: [f32; 4],
    up: [f32; 4],
}

impl CameraUniforms {
    fn new(camera: &Camera) -> Self {
        let view = camera.view_matrix();
        Self {
            view_proj: camera.view_projection().to_cols_array_2d(),
            right: view.row(0).truncate().extend(0.0).to_array(),
            up: view.row(1).truncate().extend(0.0).to_array(),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct PostUniforms {
    bloom: [f32; 4],
    dof: [f32; 4],
    grade: [f32; 4],
    lensing: [f32; 4],
    misc: [f32; 4],
    texel: [f32; 4],
}

impl PostUniforms {
    fn new(settings: &PostProcessSettings, camera: &Camera) -> Self {
        let bloom = settings.bloom;
        let dof = settings.depth_of_field;
        let grade = settings.color_grade;
        let lensing = settings.custom_pass(LENSING);
        let lensing_enabled = lensing.is_some_and(|pass| pass.enabled);
        let lensing = lensing
            .map(|pass| lensing_block(&pass.params))
            .unwrap_or_default();

        Self {
            bloom: [bloom.strength, bloom.radius, bloom.threshold, 0.0],
            dof: [flag(dof.enabled), dof.focus, dof.aperture, dof.max_blur],
            grade: [grade.brightness, grade.contrast, grade.saturation, 0.0],
            lensing,
            misc: [flag(lensing_enabled), camera.near, camera.far, 0.0],
            texel: [
                1.0 / settings.width as f32,
                1.0 / settings.height as f32,
                0.0,
                0.0,
            ],
        }
    }
}

fn flag(on: bool) -> f32 {
    if on {
        1.0
    } else {
        0.0
    }
}

/// `center.xy, radius, strength`; missing params fall back to a centered,
/// inert lens.
fn lensing_block(params: &ParamSet) -> [f32; 4] {
    let center = params.get_vec2("center").unwrap_or(Vec2::splat(0.5));
    [
        center.x,
        center.y,
        params.get_f32("radius").unwrap_or(0.0),
        params.get_f32("strength").unwrap_or(0.0),
    ]
}

struct ObjectPipelines {
    points_alpha: wgpu::RenderPipeline,
    points_additive: wgpu::RenderPipeline,
    lines_alpha: wgpu::RenderPipeline,
    lines_additive: wgpu::RenderPipeline,
}

impl ObjectPipelines {
    fn select(&self, kind: PrimitiveKind, additive: bool) -> &wgpu::RenderPipeline {
        match (kind, additive) {
            (PrimitiveKind::Points, false) => &self.points_alpha,
            (PrimitiveKind::Points, true) => &self.points_additive,
            (PrimitiveKind::LineStrip, false) => &self.lines_alpha,
            (PrimitiveKind::LineStrip, true) => &self.lines_additive,
        }
    }
}

const ADDITIVE_BLENDING: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

const POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
const COLOR_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x3];

fn create_object_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    kind: PrimitiveKind,
    additive: bool,
) -> wgpu::RenderPipeline {
    let (vs, fs, step_mode, topology) = match kind {
        PrimitiveKind::Points => (
            "vs_point",
            "fs_point",
            wgpu::VertexStepMode::Instance,
            wgpu::PrimitiveTopology::TriangleList,
        ),
        PrimitiveKind::LineStrip => (
            "vs_line",
            "fs_line",
            wgpu::VertexStepMode::Vertex,
            wgpu::PrimitiveTopology::LineStrip,
        ),
    };
    let buffers = [
        wgpu::VertexBufferLayout {
            array_stride: 12,
            step_mode,
            attributes: &POSITION_ATTRIBUTES,
        },
        wgpu::VertexBufferLayout {
            array_stride: 12,
            step_mode,
            attributes: &COLOR_ATTRIBUTES,
        },
    ];

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Object Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(vs),
            buffers: &buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fs),
            targets: &[Some(wgpu::ColorTargetState {
                format: HDR_FORMAT,
                blend: Some(if additive {
                    ADDITIVE_BLENDING
                } else {
                    wgpu::BlendState::ALPHA_BLENDING
                }),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: !additive,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// [`PostProcessingControlSurface`] that renders through wgpu.
pub struct GpuPostProcess {
    settings: PostProcessSettings,
    shared: Rc<RefCell<GpuShared>>,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    pipelines: ObjectPipelines,
    composite_pipeline: wgpu::RenderPipeline,
    composite_layout: wgpu::BindGroupLayout,
    composite_bind_group: wgpu::BindGroup,
    post_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    hdr_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
}

impl GpuPostProcess {
    pub(crate) fn new(shared: Rc<RefCell<GpuShared>>, config: &PostProcessConfig) -> Self {
        let mut settings = PostProcessSettings::new(config);
        let (pipelines, composite_pipeline, composite_layout, camera_buffer, camera_bind_group) = {
            let guard = shared.borrow();
            let device = &guard.ctx.device;
            let surface_format = guard.ctx.config.format;

            let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Camera Buffer"),
                contents: bytemuck::bytes_of(&CameraUniforms::new(&Camera::default())),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
            let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Camera Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });
            let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Camera Bind Group"),
                layout: &camera_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                }],
            });

            let object_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Object Shader"),
                source: wgpu::ShaderSource::Wgsl(OBJECT_SHADER.into()),
            });
            let object_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Object Pipeline Layout"),
                bind_group_layouts: &[&camera_layout, &guard.material_layout],
                push_constant_ranges: &[],
            });
            let pipelines = ObjectPipelines {
                points_alpha: create_object_pipeline(
                    device,
                    &object_layout,
                    &object_shader,
                    PrimitiveKind::Points,
                    false,
                ),
                points_additive: create_object_pipeline(
                    device,
                    &object_layout,
                    &object_shader,
                    PrimitiveKind::Points,
                    true,
                ),
                lines_alpha: create_object_pipeline(
                    device,
                    &object_layout,
                    &object_shader,
                    PrimitiveKind::LineStrip,
                    false,
                ),
                lines_additive: create_object_pipeline(
                    device,
                    &object_layout,
                    &object_shader,
                    PrimitiveKind::LineStrip,
                    true,
                ),
            };

            let composite_layout = create_composite_layout(device);
            let composite_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Composite Shader"),
                source: wgpu::ShaderSource::Wgsl(COMPOSITE_SHADER.into()),
            });
            let composite_pipeline_layout =
                device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("Composite Pipeline Layout"),
                    bind_group_layouts: &[&composite_layout],
                    push_constant_ranges: &[],
                });
            let composite_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Composite Pipeline"),
                layout: Some(&composite_pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &composite_shader,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &composite_shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: surface_format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

            (
                pipelines,
                composite_pipeline,
                composite_layout,
                camera_buffer,
                camera_bind_group,
            )
        };

        let guard = shared.borrow();
        let device = &guard.ctx.device;
        let (width, height) = (guard.ctx.config.width, guard.ctx.config.height);
        settings.resize(width, height);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("HDR Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let post_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Post Uniform Buffer"),
            contents: bytemuck::bytes_of(&PostUniforms::new(&settings, &Camera::default())),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let hdr_view = create_hdr_texture(device, width, height);
        let depth_view = create_depth_texture(device, width, height);
        let composite_bind_group = create_composite_bind_group(
            device,
            &composite_layout,
            &hdr_view,
            &sampler,
            &depth_view,
            &post_buffer,
        );
        drop(guard);

        Self {
            settings,
            shared,
            camera_buffer,
            camera_bind_group,
            pipelines,
            composite_pipeline,
            composite_layout,
            composite_bind_group,
            post_buffer,
            sampler,
            hdr_view,
            depth_view,
        }
    }
}

fn create_composite_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Composite Bind Group Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Depth,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    })
}

fn create_composite_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    hdr_view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
    depth_view: &wgpu::TextureView,
    post_buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Composite Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(hdr_view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(depth_view),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: post_buffer.as_entire_binding(),
            },
        ],
    })
}

impl PostProcessingControlSurface for GpuPostProcess {
    fn set_bloom_strength(&mut self, strength: f32) {
        self.settings.set_bloom_strength(strength);
    }

    fn enable_depth_of_field(&mut self, enabled: bool) {
        self.settings.enable_depth_of_field(enabled);
    }

    fn set_depth_of_field_params(&mut self, focus: f32, aperture: f32, max_blur: f32) {
        self.settings.set_depth_of_field_params(focus, aperture, max_blur);
    }

    fn enable_custom_pass(&mut self, name: &str, enabled: bool) {
        if name != LENSING {
            log::debug!("custom pass '{}' has no GPU implementation", name);
        }
        self.settings.enable_custom_pass(name, enabled);
    }

    fn set_custom_pass_params(&mut self, name: &str, params: &ParamSet) {
        self.settings.set_custom_pass_params(name, params);
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.settings.resize(width, height);

        let mut shared = self.shared.borrow_mut();
        shared.ctx.resize(width, height);
        let device = &shared.ctx.device;
        self.hdr_view = create_hdr_texture(device, width, height);
        self.depth_view = create_depth_texture(device, width, height);
        self.composite_bind_group = create_composite_bind_group(
            device,
            &self.composite_layout,
            &self.hdr_view,
            &self.sampler,
            &self.depth_view,
            &self.post_buffer,
        );
    }

    fn render(&mut self, camera: &Camera) -> Result<(), RenderError> {
        let shared = self.shared.borrow();
        let ctx = &shared.ctx;

        let output = match ctx.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("surface lost, reconfiguring");
                ctx.reconfigure();
                return Ok(());
            }
            Err(err) => return Err(RenderError::Backend(err.to_string())),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        ctx.queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::bytes_of(&CameraUniforms::new(camera)),
        );
        ctx.queue.write_buffer(
            &self.post_buffer,
            0,
            bytemuck::bytes_of(&PostUniforms::new(&self.settings, camera)),
        );

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        // Scene pass
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.hdr_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
            for handle in &shared.root {
                let Some(object) = shared.objects.get(handle) else {
                    continue;
                };
                let count = object.drawn();
                if !object.visible || count == 0 {
                    continue;
                }
                render_pass.set_pipeline(
                    self.pipelines
                        .select(object.kind, object.material.additive),
                );
                render_pass.set_bind_group(1, &object.material_bind_group, &[]);
                render_pass.set_vertex_buffer(0, object.positions.slice(..));
                render_pass.set_vertex_buffer(1, object.colors.slice(..));
                match object.kind {
                    PrimitiveKind::Points => render_pass.draw(0..6, 0..count),
                    PrimitiveKind::LineStrip => render_pass.draw(0..count, 0..1),
                }
            }
        }

        // Composite pass
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Composite Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(&self.composite_pipeline);
            render_pass.set_bind_group(0, &self.composite_bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }

        ctx.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        drop(shared);

        self.settings.frames_rendered += 1;
        Ok(())
    }

    fn settings(&self) -> &PostProcessSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sizes() {
        assert_eq!(std::mem::size_of::<CameraUniforms>(), 96);
        assert_eq!(std::mem::size_of::<PostUniforms>(), 96);
    }

    #[test]
    fn test_post_uniforms_follow_settings() {
        let mut settings = PostProcessSettings::default();
        settings.resize(200, 100);
        settings.enable_custom_pass(LENSING, true);
        settings.set_custom_pass_params(LENSING, &ParamSet::new().with("strength", 0.3));
        settings.enable_depth_of_field(true);

        let camera = Camera::default();
        let uniforms = PostUniforms::new(&settings, &camera);
        assert_eq!(uniforms.bloom[0], 1.5);
        assert_eq!(uniforms.dof[0], 1.0);
        assert_eq!(uniforms.lensing, [0.5, 0.5, 0.15, 0.3]);
        assert_eq!(uniforms.misc[0], 1.0);
        assert_eq!(uniforms.misc[2], camera.far);
        assert_eq!(uniforms.texel[0], 1.0 / 200.0);
    }

    #[test]
    fn test_lensing_block_defaults() {
        assert_eq!(lensing_block(&ParamSet::new()), [0.5, 0.5, 0.0, 0.0]);
    }
}
