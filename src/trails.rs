//! Bounded-history motion trails.
//!
//! A [`TrailBuffer`] remembers the last `max_points` positions of something,
//! newest first, and renders them as a line strip whose color fades with age.
//! [`TrailManager`] keeps trails under caller-chosen keys and guarantees at
//! most one live render resource per key.
//!
//! # Fade weighting
//!
//! With `fade_out` set, the point at index `i` of a trail currently holding
//! `len` points is drawn with `color * (1 - i / len)`, so the newest point is
//! full brightness and the oldest approaches black. Without it every point
//! uses the base color.

use crate::error::{Error, RenderError, Result};
use crate::render::{AttributeSpec, Material, PrimitiveKind, RenderResource, ResourceHandle, COLOR, POSITION};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Construction options for a [`TrailBuffer`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailOptions {
    /// History capacity. Fixed for the trail's lifetime.
    pub max_points: usize,
    pub width: f32,
    pub color: Vec3,
    pub opacity: f32,
    pub fade_out: bool,
}

impl Default for TrailOptions {
    fn default() -> Self {
        Self {
            max_points: 50,
            width: 2.0,
            color: Vec3::ONE,
            opacity: 0.8,
            fade_out: true,
        }
    }
}

impl TrailOptions {
    pub fn with_max_points(mut self, max_points: usize) -> Self {
        self.max_points = max_points;
        self
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_width(mut self, width: f32) -> Self {
        self.width = width;
        self
    }

    pub fn with_fade_out(mut self, fade_out: bool) -> Self {
        self.fade_out = fade_out;
        self
    }
}

/// Newest-first history of points with a line-strip render mirror.
#[derive(Debug)]
pub struct TrailBuffer {
    points: VecDeque<Vec3>,
    positions: Vec<f32>,
    colors: Vec<f32>,
    options: TrailOptions,
    handle: Option<ResourceHandle>,
    dirty: bool,
    material_dirty: bool,
}

impl TrailBuffer {
    /// Create the line object and attach it to the render root.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCapacity`] when `max_points` is zero, or the backend's
    /// error if the line object cannot be created.
    pub fn new(options: TrailOptions, render: &mut dyn RenderResource) -> Result<Self> {
        let capacity = options.max_points;
        if capacity == 0 {
            return Err(Error::InvalidCapacity { capacity });
        }

        let handle = render.create_buffer_object(
            PrimitiveKind::LineStrip,
            &[
                AttributeSpec::vec3(POSITION, capacity),
                AttributeSpec::vec3(COLOR, capacity),
            ],
        )?;

        let mut trail = Self {
            points: VecDeque::with_capacity(capacity + 1),
            positions: vec![0.0; capacity * 3],
            colors: vec![0.0; capacity * 3],
            options,
            handle: Some(handle),
            dirty: true,
            material_dirty: true,
        };

        let attached = render
            .attach_to_root(handle)
            .and_then(|()| trail.flush(render));
        if let Err(err) = attached {
            trail.dispose(render);
            return Err(err.into());
        }
        Ok(trail)
    }

    /// Push `point` as the newest entry, evicting the oldest once full.
    pub fn add_point(&mut self, point: Vec3) {
        if self.handle.is_none() {
            return;
        }
        self.points.push_front(point);
        if self.points.len() > self.options.max_points {
            self.points.pop_back();
        }
        self.rebuild();
    }

    /// Replace the whole history, newest first. Points beyond `max_points`
    /// are dropped.
    pub fn set_points<I>(&mut self, points: I)
    where
        I: IntoIterator<Item = Vec3>,
    {
        if self.handle.is_none() {
            return;
        }
        self.points.clear();
        self.points
            .extend(points.into_iter().take(self.options.max_points));
        self.rebuild();
    }

    /// Forget all history. The render object stays allocated.
    pub fn clear(&mut self) {
        self.points.clear();
        self.rebuild();
    }

    pub fn set_color(&mut self, color: Vec3) {
        self.options.color = color;
        self.rebuild();
        self.material_dirty = true;
    }

    pub fn set_width(&mut self, width: f32) {
        self.options.width = width;
        self.material_dirty = true;
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.options.opacity = opacity;
        self.material_dirty = true;
    }

    pub fn set_visible(&mut self, render: &mut dyn RenderResource, visible: bool) -> Result<(), RenderError> {
        match self.handle {
            Some(handle) => render.set_visible(handle, visible),
            None => Ok(()),
        }
    }

    /// Brightness multiplier for the entry at `index`.
    pub fn weight(&self, index: usize) -> f32 {
        let len = self.points.len();
        if index >= len {
            0.0
        } else if self.options.fade_out {
            1.0 - index as f32 / len as f32
        } else {
            1.0
        }
    }

    fn rebuild(&mut self) {
        let color = self.options.color;
        for i in 0..self.options.max_points {
            let (position, tint) = match self.points.get(i) {
                Some(point) => (*point, color * self.weight(i)),
                None => (Vec3::ZERO, Vec3::ZERO),
            };
            self.positions[i * 3..i * 3 + 3].copy_from_slice(&position.to_array());
            self.colors[i * 3..i * 3 + 3].copy_from_slice(&tint.to_array());
        }
        self.dirty = true;
    }

    /// Push dirty mirrors and material to the backend.
    pub fn flush(&mut self, render: &mut dyn RenderResource) -> Result<(), RenderError> {
        let Some(handle) = self.handle else {
            return Ok(());
        };
        if self.material_dirty {
            let material = Material {
                line_width: self.options.width,
                opacity: self.options.opacity,
                color: self.options.color,
                additive: true,
                vertex_colors: true,
                ..Material::default()
            };
            render.set_material(handle, &material)?;
            self.material_dirty = false;
        }
        if self.dirty {
            render.update_attribute(handle, POSITION, &self.positions)?;
            render.update_attribute(handle, COLOR, &self.colors)?;
            render.set_draw_range(handle, self.points.len())?;
            self.dirty = false;
        }
        Ok(())
    }

    /// Detach and release the line object. Safe to call repeatedly.
    pub fn dispose(&mut self, render: &mut dyn RenderResource) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        render.detach_from_root(handle);
        if let Err(err) = render.dispose(handle) {
            log::warn!("trail {} release failed: {}", handle, err);
        }
        self.points.clear();
        self.dirty = false;
    }

    pub fn is_disposed(&self) -> bool {
        self.handle.is_none()
    }

    pub fn handle(&self) -> Option<ResourceHandle> {
        self.handle
    }

    /// History, newest first.
    pub fn points(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.points.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn max_points(&self) -> usize {
        self.options.max_points
    }

    pub fn options(&self) -> &TrailOptions {
        &self.options
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn colors(&self) -> &[f32] {
        &self.colors
    }
}

/// Trails keyed by name, iterated in key order.
#[derive(Debug, Default)]
pub struct TrailManager {
    trails: BTreeMap<String, TrailBuffer>,
}

impl TrailManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a trail under `key`, disposing whatever was there before.
    pub fn create_trail(
        &mut self,
        key: impl Into<String>,
        options: TrailOptions,
        render: &mut dyn RenderResource,
    ) -> Result<&mut TrailBuffer> {
        let key = key.into();
        if let Some(mut previous) = self.trails.remove(&key) {
            log::debug!("trail '{}' replaced", key);
            previous.dispose(render);
        }
        let trail = TrailBuffer::new(options, render)?;
        Ok(self.trails.entry(key).or_insert(trail))
    }

    pub fn get_trail(&self, key: &str) -> Option<&TrailBuffer> {
        self.trails.get(key)
    }

    pub fn get_trail_mut(&mut self, key: &str) -> Option<&mut TrailBuffer> {
        self.trails.get_mut(key)
    }

    /// Append a point to the trail under `key`. Unknown keys are ignored.
    pub fn update_trail(&mut self, key: &str, point: Vec3) {
        if let Some(trail) = self.trails.get_mut(key) {
            trail.add_point(point);
        }
    }

    /// Dispose and forget the trail under `key`. Returns whether it existed.
    pub fn remove_trail(&mut self, key: &str, render: &mut dyn RenderResource) -> bool {
        match self.trails.remove(key) {
            Some(mut trail) => {
                trail.dispose(render);
                true
            }
            None => false,
        }
    }

    /// Dispose and forget every trail.
    pub fn clear(&mut self, render: &mut dyn RenderResource) {
        for mut trail in std::mem::take(&mut self.trails).into_values() {
            trail.dispose(render);
        }
    }

    pub fn flush(&mut self, render: &mut dyn RenderResource) -> Result<(), RenderError> {
        self.trails.values_mut().try_for_each(|trail| trail.flush(render))
    }

    pub fn handles(&self) -> impl Iterator<Item = ResourceHandle> + '_ {
        self.trails.values().filter_map(TrailBuffer::handle)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.trails.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.trails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trails.is_empty()
    }
}
