//! The render resource seam.
//!
//! Everything the core knows about drawing goes through [`RenderResource`]:
//! emitters and trails ask it for buffer objects, push their mirror buffers
//! into named attributes, and attach themselves to the shared render root.
//!
//! Two backends implement it:
//!
//! - [`HeadlessRenderer`] keeps everything in memory and records what
//!   happened. Tests and `stardrift --headless` use it.
//! - [`GpuRenderer`](crate::gpu::GpuRenderer) uploads to wgpu vertex buffers.
//!
//! Handles are plain ids. Releasing one is the owner's job, exactly once.

use crate::error::RenderError;
use glam::Vec3;
use std::collections::BTreeMap;
use std::fmt;

/// Attribute name for per-vertex positions.
pub const POSITION: &str = "position";
/// Attribute name for per-vertex colors.
pub const COLOR: &str = "color";

/// Opaque id of a buffer object owned by a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle(u32);

impl ResourceHandle {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a buffer object's vertices are assembled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveKind {
    /// One camera-facing sprite per vertex.
    Points,
    /// Consecutive vertices joined into a polyline.
    LineStrip,
}

/// Shape of one named vertex attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: &'static str,
    /// Floats per vertex.
    pub components: usize,
    /// Number of vertices.
    pub count: usize,
}

impl AttributeSpec {
    pub fn vec3(name: &'static str, count: usize) -> Self {
        Self {
            name,
            components: 3,
            count,
        }
    }

    /// Total number of floats the attribute holds.
    pub fn len(&self) -> usize {
        self.components * self.count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Material parameters for a buffer object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    /// Sprite size for [`PrimitiveKind::Points`].
    pub point_size: f32,
    /// Line width for [`PrimitiveKind::LineStrip`]. Backends may clamp to 1.
    pub line_width: f32,
    pub opacity: f32,
    /// Additive blending instead of alpha blending.
    pub additive: bool,
    /// Use the `color` attribute. Otherwise `color` below tints every vertex.
    pub vertex_colors: bool,
    pub color: Vec3,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            point_size: 0.1,
            line_width: 1.0,
            opacity: 1.0,
            additive: false,
            vertex_colors: true,
            color: Vec3::ONE,
        }
    }
}

/// Buffer management and scene-graph root of a rendering backend.
pub trait RenderResource {
    /// Allocate a buffer object with the given attributes, zero-filled.
    fn create_buffer_object(
        &mut self,
        kind: PrimitiveKind,
        attributes: &[AttributeSpec],
    ) -> Result<ResourceHandle, RenderError>;

    /// Replace the contents of a named attribute. `data` must match the
    /// attribute's [`AttributeSpec::len`].
    fn update_attribute(
        &mut self,
        handle: ResourceHandle,
        name: &str,
        data: &[f32],
    ) -> Result<(), RenderError>;

    fn set_material(
        &mut self,
        handle: ResourceHandle,
        material: &Material,
    ) -> Result<(), RenderError>;

    fn set_visible(&mut self, handle: ResourceHandle, visible: bool) -> Result<(), RenderError>;

    /// Limit drawing to the first `count` vertices. Backends that always draw
    /// the whole buffer can ignore this.
    fn set_draw_range(&mut self, handle: ResourceHandle, count: usize) -> Result<(), RenderError> {
        let _ = (handle, count);
        Ok(())
    }

    /// Release the object. It is detached from the root first if needed.
    fn dispose(&mut self, handle: ResourceHandle) -> Result<(), RenderError>;

    fn attach_to_root(&mut self, handle: ResourceHandle) -> Result<(), RenderError>;

    /// Detach if attached. Unknown or unattached handles are ignored.
    fn detach_from_root(&mut self, handle: ResourceHandle);

    /// Detach every child of the root.
    fn clear_root(&mut self);

    /// Current children of the root, in attach order.
    fn root_children(&self) -> Vec<ResourceHandle>;
}

/// Counters kept by [`HeadlessRenderer`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub created: usize,
    pub disposed: usize,
    pub uploads: usize,
    pub floats_uploaded: usize,
}

/// One buffer object stored by [`HeadlessRenderer`].
#[derive(Clone, Debug)]
pub struct HeadlessObject {
    pub kind: PrimitiveKind,
    pub material: Material,
    pub visible: bool,
    pub draw_range: Option<usize>,
    /// Number of successful releases. Anything above 1 is a bug.
    pub release_count: u32,
    attributes: Vec<(AttributeSpec, Vec<f32>)>,
}

impl HeadlessObject {
    pub fn is_released(&self) -> bool {
        self.release_count > 0
    }

    pub fn attribute(&self, name: &str) -> Option<&[f32]> {
        self.attributes
            .iter()
            .find(|(spec, _)| spec.name == name)
            .map(|(_, data)| data.as_slice())
    }
}

/// In-memory [`RenderResource`].
///
/// Released objects stay in the table so tests can check they were released
/// exactly once.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    objects: BTreeMap<ResourceHandle, HeadlessObject>,
    root: Vec<ResourceHandle>,
    next_handle: u32,
    fail_next_create: bool,
    stats: RenderStats,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next [`create_buffer_object`](RenderResource::create_buffer_object)
    /// call fail with [`RenderError::Backend`].
    pub fn fail_next_create(&mut self) {
        self.fail_next_create = true;
    }

    pub fn object(&self, handle: ResourceHandle) -> Option<&HeadlessObject> {
        self.objects.get(&handle)
    }

    pub fn attribute(&self, handle: ResourceHandle, name: &str) -> Option<&[f32]> {
        self.objects.get(&handle).and_then(|o| o.attribute(name))
    }

    pub fn is_attached(&self, handle: ResourceHandle) -> bool {
        self.root.contains(&handle)
    }

    /// Handles that have not been released yet.
    pub fn live_handles(&self) -> Vec<ResourceHandle> {
        self.objects
            .iter()
            .filter(|(_, o)| !o.is_released())
            .map(|(h, _)| *h)
            .collect()
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    fn live_mut(&mut self, handle: ResourceHandle) -> Result<&mut HeadlessObject, RenderError> {
        match self.objects.get_mut(&handle) {
            None => Err(RenderError::UnknownHandle(handle)),
            Some(o) if o.is_released() => Err(RenderError::Released(handle)),
            Some(o) => Ok(o),
        }
    }
}

impl RenderResource for HeadlessRenderer {
    fn create_buffer_object(
        &mut self,
        kind: PrimitiveKind,
        attributes: &[AttributeSpec],
    ) -> Result<ResourceHandle, RenderError> {
        if std::mem::take(&mut self.fail_next_create) {
            return Err(RenderError::Backend("buffer allocation refused".into()));
        }

        self.next_handle += 1;
        let handle = ResourceHandle(self.next_handle);
        let attributes = attributes
            .iter()
            .map(|spec| (spec.clone(), vec![0.0; spec.len()]))
            .collect();
        self.objects.insert(
            handle,
            HeadlessObject {
                kind,
                material: Material::default(),
                visible: true,
                draw_range: None,
                release_count: 0,
                attributes,
            },
        );
        self.stats.created += 1;
        Ok(handle)
    }

    fn update_attribute(
        &mut self,
        handle: ResourceHandle,
        name: &str,
        data: &[f32],
    ) -> Result<(), RenderError> {
        let object = self.live_mut(handle)?;
        let (spec, stored) = object
            .attributes
            .iter_mut()
            .find(|(spec, _)| spec.name == name)
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
        stored.copy_from_slice(data);
        self.stats.uploads += 1;
        self.stats.floats_uploaded += data.len();
        Ok(())
    }

    fn set_material(
        &mut self,
        handle: ResourceHandle,
        material: &Material,
    ) -> Result<(), RenderError> {
        self.live_mut(handle)?.material = *material;
        Ok(())
    }

    fn set_visible(&mut self, handle: ResourceHandle, visible: bool) -> Result<(), RenderError> {
        self.live_mut(handle)?.visible = visible;
        Ok(())
    }

    fn set_draw_range(&mut self, handle: ResourceHandle, count: usize) -> Result<(), RenderError> {
        self.live_mut(handle)?.draw_range = Some(count);
        Ok(())
    }

    fn dispose(&mut self, handle: ResourceHandle) -> Result<(), RenderError> {
        self.live_mut(handle)?.release_count += 1;
        self.root.retain(|h| *h != handle);
        self.stats.disposed += 1;
        Ok(())
    }

    fn attach_to_root(&mut self, handle: ResourceHandle) -> Result<(), RenderError> {
        self.live_mut(handle)?;
        if !self.root.contains(&handle) {
            self.root.push(handle);
        }
        Ok(())
    }

    fn detach_from_root(&mut self, handle: ResourceHandle) {
        self.root.retain(|h| *h != handle);
    }

    fn clear_root(&mut self) {
        self.root.clear();
    }

    fn root_children(&self) -> Vec<ResourceHandle> {
        self.root.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(renderer: &mut HeadlessRenderer, count: usize) -> ResourceHandle {
        renderer
            .create_buffer_object(
                PrimitiveKind::Points,
                &[AttributeSpec::vec3(POSITION, count), AttributeSpec::vec3(COLOR, count)],
            )
            .unwrap()
    }

    #[test]
    fn test_create_zero_fills_attributes() {
        let mut r = HeadlessRenderer::new();
        let h = points(&mut r, 4);
        assert_eq!(r.attribute(h, POSITION).unwrap(), &[0.0; 12][..]);
        assert_eq!(r.stats().created, 1);
    }

    #[test]
    fn test_update_attribute_checks_size() {
        let mut r = HeadlessRenderer::new();
        let h = points(&mut r, 2);
        let err = r.update_attribute(h, POSITION, &[1.0; 5]).unwrap_err();
        assert!(matches!(
            err,
            RenderError::AttributeSize { expected: 6, actual: 5, .. }
        ));
        r.update_attribute(h, POSITION, &[1.0; 6]).unwrap();
        assert_eq!(r.attribute(h, POSITION).unwrap(), &[1.0; 6][..]);
        assert!(matches!(
            r.update_attribute(h, "normal", &[0.0; 6]),
            Err(RenderError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn test_root_membership() {
        let mut r = HeadlessRenderer::new();
        let a = points(&mut r, 1);
        let b = points(&mut r, 1);
        r.attach_to_root(a).unwrap();
        r.attach_to_root(b).unwrap();
        r.attach_to_root(a).unwrap();
        assert_eq!(r.root_children(), vec![a, b]);

        r.detach_from_root(a);
        assert_eq!(r.root_children(), vec![b]);
        r.detach_from_root(a);

        r.clear_root();
        assert!(r.root_children().is_empty());
    }

    #[test]
    fn test_dispose_detaches_and_rejects_second_release() {
        let mut r = HeadlessRenderer::new();
        let h = points(&mut r, 1);
        r.attach_to_root(h).unwrap();
        r.dispose(h).unwrap();
        assert!(!r.is_attached(h));
        assert!(matches!(r.dispose(h), Err(RenderError::Released(_))));
        assert_eq!(r.object(h).unwrap().release_count, 1);
        assert!(r.live_handles().is_empty());
    }

    #[test]
    fn test_unknown_handle() {
        let mut r = HeadlessRenderer::new();
        let h = ResourceHandle::from_raw(42);
        assert!(matches!(
            r.attach_to_root(h),
            Err(RenderError::UnknownHandle(_))
        ));
        assert_eq!(h.to_string(), "#42");
    }

    #[test]
    fn test_fail_next_create_is_one_shot() {
        let mut r = HeadlessRenderer::new();
        r.fail_next_create();
        assert!(r
            .create_buffer_object(PrimitiveKind::LineStrip, &[AttributeSpec::vec3(POSITION, 2)])
            .is_err());
        assert!(r
            .create_buffer_object(PrimitiveKind::LineStrip, &[AttributeSpec::vec3(POSITION, 2)])
            .is_ok());
    }
}
