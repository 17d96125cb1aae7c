use std::cell::RefCell;
use std::rc::Rc;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::GpuShared;
use crate::error::RenderError;
use crate::render::{
    AttributeSpec, Material, PrimitiveKind, RenderResource, ResourceHandle, COLOR, POSITION,
};

/// Bytes per `vec3<f32>` vertex.
const VEC3_STRIDE: u64 = 12;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub(crate) struct MaterialUniforms {
    /// rgb tint, opacity
    color: [f32; 4],
    /// point size, vertex colors flag, line width, unused
    params: [f32; 4],
}

impl From<&Material> for MaterialUniforms {
    fn from(material: &Material) -> Self {
        Self {
            color: material.color.extend(material.opacity).to_array(),
            params: [
                material.point_size,
                if material.vertex_colors { 1.0 } else { 0.0 },
                material.line_width,
                0.0,
            ],
        }
    }
}

/// A buffer object living on the device.
///
/// Every object has a position and a color buffer. Objects created without
/// a `color` attribute get a zeroed one so both pipelines can bind the same
/// two vertex slots; it is not exposed through `update_attribute`.
pub(crate) struct GpuObject {
    pub kind: PrimitiveKind,
    specs: Vec<AttributeSpec>,
    pub positions: wgpu::Buffer,
    pub colors: wgpu::Buffer,
    vertex_count: u32,
    draw_range: Option<u32>,
    pub material: Material,
    material_buffer: wgpu::Buffer,
    pub material_bind_group: wgpu::BindGroup,
    pub visible: bool,
}

impl GpuObject {
    /// Vertices to draw this frame.
    pub fn drawn(&self) -> u32 {
        self.draw_range
            .map_or(self.vertex_count, |n| n.min(self.vertex_count))
    }

    fn buffer(&self, name: &str) -> Option<&wgpu::Buffer> {
        match name {
            POSITION => Some(&self.positions),
            COLOR => Some(&self.colors),
            _ => None,
        }
    }

    fn release(self) {
        self.positions.destroy();
        self.colors.destroy();
        self.material_buffer.destroy();
    }
}

/// [`RenderResource`] backed by wgpu vertex buffers.
pub struct GpuRenderer {
    shared: Rc<RefCell<GpuShared>>,
}

impl GpuRenderer {
    pub(crate) fn new(shared: Rc<RefCell<GpuShared>>) -> Self {
        Self { shared }
    }

    /// Number of live buffer objects.
    pub fn object_count(&self) -> usize {
        self.shared.borrow().objects.len()
    }
}

fn check_live(shared: &GpuShared, handle: ResourceHandle) -> Result<(), RenderError> {
    handle_status(shared.objects.contains_key(&handle), shared.next_handle, handle)
}

/// Handles are allocated from 1 upwards, so an issued handle that is no
/// longer in the object table has been released.
fn handle_status(live: bool, next_handle: u32, handle: ResourceHandle) -> Result<(), RenderError> {
    if live {
        Ok(())
    } else if (1..=next_handle).contains(&handle.raw()) {
        Err(RenderError::Released(handle))
    } else {
        Err(RenderError::UnknownHandle(handle))
    }
}

fn live_mut(
    shared: &mut GpuShared,
    handle: ResourceHandle,
) -> Result<&mut GpuObject, RenderError> {
    check_live(shared, handle)?;
    shared
        .objects
        .get_mut(&handle)
        .ok_or(RenderError::UnknownHandle(handle))
}

fn vertex_buffer(device: &wgpu::Device, label: &str, count: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: VEC3_STRIDE * count.max(1) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl RenderResource for GpuRenderer {
    fn create_buffer_object(
        &mut self,
        kind: PrimitiveKind,
        attributes: &[AttributeSpec],
    ) -> Result<ResourceHandle, RenderError> {
        let position = attributes
            .iter()
            .find(|spec| spec.name == POSITION)
            .ok_or_else(|| RenderError::Backend("buffer objects need a position attribute".into()))?;
        if let Some(spec) = attributes
            .iter()
            .find(|spec| spec.components != 3 || (spec.name != POSITION && spec.name != COLOR))
        {
            return Err(RenderError::Backend(format!(
                "unsupported attribute '{}' with {} components",
                spec.name, spec.components
            )));
        }
        let count = position.count;
        let vertex_count = u32::try_from(count)
            .map_err(|_| RenderError::Backend(format!("{count} vertices exceed the draw limit")))?;

        let mut guard = self.shared.borrow_mut();
        let shared = &mut *guard;
        let device = &shared.ctx.device;

        let positions = vertex_buffer(device, "Position Buffer", count);
        let color_count = attributes
            .iter()
            .find(|spec| spec.name == COLOR)
            .map_or(count, |spec| spec.count);
        let colors = vertex_buffer(device, "Color Buffer", color_count.max(count));

        let material = Material::default();
        let material_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Material Buffer"),
            contents: bytemuck::bytes_of(&MaterialUniforms::from(&material)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let material_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Material Bind Group"),
            layout: &shared.material_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: material_buffer.as_entire_binding(),
            }],
        });

        shared.next_handle += 1;
        let handle = ResourceHandle::from_raw(shared.next_handle);
        shared.objects.insert(
            handle,
            GpuObject {
                kind,
                specs: attributes.to_vec(),
                positions,
                colors,
                vertex_count,
                draw_range: None,
                material,
                material_buffer,
                material_bind_group,
                visible: true,
            },
        );
        log::debug!("created {:?} object {} ({} vertices)", kind, handle, count);
        Ok(handle)
    }

    fn update_attribute(
        &mut self,
        handle: ResourceHandle,
        name: &str,
        data: &[f32],
    ) -> Result<(), RenderError> {
        let shared = self.shared.borrow();
        check_live(&shared, handle)?;
        let object = shared
            .objects
            .get(&handle)
            .ok_or(RenderError::UnknownHandle(handle))?;
        let spec = object
            .specs
            .iter()
            .find(|spec| spec.name == name)
            .ok_or_else(|| RenderError::UnknownAttribute {
                handle,
                name: name.to_string(),
            })?;
        if data.len() != spec.len() {
            return Err(RenderError::AttributeSize {
                name: name.to_string(),
                expected: spec.len(),
                actual: data.len(),
            });
        }
        if data.is_empty() {
            return Ok(());
        }
        let buffer = object.buffer(name).ok_or_else(|| RenderError::UnknownAttribute {
            handle,
            name: name.to_string(),
        })?;
        shared
            .ctx
            .queue
            .write_buffer(buffer, 0, bytemuck::cast_slice(data));
        Ok(())
    }

    fn set_material(
        &mut self,
        handle: ResourceHandle,
        material: &Material,
    ) -> Result<(), RenderError> {
        let mut guard = self.shared.borrow_mut();
        let shared = &mut *guard;
        check_live(shared, handle)?;
        let object = shared
            .objects
            .get_mut(&handle)
            .ok_or(RenderError::UnknownHandle(handle))?;
        object.material = *material;
        shared.ctx.queue.write_buffer(
            &object.material_buffer,
            0,
            bytemuck::bytes_of(&MaterialUniforms::from(material)),
        );
        Ok(())
    }

    fn set_visible(&mut self, handle: ResourceHandle, visible: bool) -> Result<(), RenderError> {
        live_mut(&mut self.shared.borrow_mut(), handle)?.visible = visible;
        Ok(())
    }

    fn set_draw_range(&mut self, handle: ResourceHandle, count: usize) -> Result<(), RenderError> {
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        live_mut(&mut self.shared.borrow_mut(), handle)?.draw_range = Some(count);
        Ok(())
    }

    fn dispose(&mut self, handle: ResourceHandle) -> Result<(), RenderError> {
        let mut shared = self.shared.borrow_mut();
        check_live(&shared, handle)?;
        if let Some(object) = shared.objects.remove(&handle) {
            object.release();
        }
        shared.root.retain(|h| *h != handle);
        Ok(())
    }

    fn attach_to_root(&mut self, handle: ResourceHandle) -> Result<(), RenderError> {
        let mut shared = self.shared.borrow_mut();
        check_live(&shared, handle)?;
        if !shared.root.contains(&handle) {
            shared.root.push(handle);
        }
        Ok(())
    }

    fn detach_from_root(&mut self, handle: ResourceHandle) {
        self.shared.borrow_mut().root.retain(|h| *h != handle);
    }

    fn clear_root(&mut self) {
        self.shared.borrow_mut().root.clear();
    }

    fn root_children(&self) -> Vec<ResourceHandle> {
        self.shared.borrow().root.clone()
    }
}
