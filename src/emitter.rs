//! Fixed-capacity particle pools.
//!
//! A [`ParticleEmitter`] owns exactly `capacity` particles for its whole life,
//! plus two flat mirrors (`positions` and `colors`, `3 * capacity` floats
//! each) that the render backend consumes. The mirrors are resynchronized by
//! every call that changes particle state, so nothing stale is ever uploaded.
//!
//! Behavior is injected as an update rule, a closure run once per live
//! particle per frame:
//!
//! ```ignore
//! let mut emitter = ParticleEmitter::new(10_000, render)?;
//! emitter.set_update_rule(|p, dt| {
//!     p.velocity.y -= 9.8 * dt;
//!     p.update(dt);
//! });
//!
//! // every frame
//! emitter.update(dt);
//! emitter.flush(render)?;
//! ```
//!
//! # Properties
//!
//! | Property | Default | Used for |
//! |----------|---------|----------|
//! | `size` | 0.1 – 0.1 | Initial sizes; `size.max` is the material point size |
//! | `color` | white | Initial and respawn color |
//! | `speed` | 1 – 1 | Respawn speed |
//! | `lifetime` | 1 – 1 | Respawn lifespan |
//! | `origin` | zero | Respawn position |
//! | `recycle` | `false` | Respawn dead particles in place |
//! | `additive` | `true` | Additive blending |

use crate::error::{Error, RenderError, Result};
use crate::particle::Particle;
use crate::render::{AttributeSpec, Material, PrimitiveKind, RenderResource, ResourceHandle, COLOR, POSITION};
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Side length of the cube initial positions are scattered in.
const SPAWN_EXTENT: f32 = 100.0;

/// Per-particle behavior, called as `rule(particle, dt)`.
pub type UpdateRule = Box<dyn FnMut(&mut Particle, f32)>;

/// A `min..max` range sampled uniformly.
///
/// Inverted ranges are accepted as given and simply sample between the two
/// values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f32,
    pub max: f32,
}

impl ValueRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub const fn constant(value: f32) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        self.min + rng.gen::<f32>() * (self.max - self.min)
    }
}

/// Emitter-wide defaults for new and respawned particles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterProperties {
    pub size: ValueRange,
    pub color: Vec3,
    pub speed: ValueRange,
    pub lifetime: ValueRange,
    pub origin: Vec3,
    pub recycle: bool,
    pub additive: bool,
}

impl Default for EmitterProperties {
    fn default() -> Self {
        Self {
            size: ValueRange::constant(0.1),
            color: Vec3::ONE,
            speed: ValueRange::constant(1.0),
            lifetime: ValueRange::constant(1.0),
            origin: Vec3::ZERO,
            recycle: false,
            additive: true,
        }
    }
}

/// A partial [`EmitterProperties`]; `None` fields keep their current value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterPropertiesPatch {
    pub size: Option<ValueRange>,
    pub color: Option<Vec3>,
    pub speed: Option<ValueRange>,
    pub lifetime: Option<ValueRange>,
    pub origin: Option<Vec3>,
    pub recycle: Option<bool>,
    pub additive: Option<bool>,
}

impl EmitterProperties {
    /// Merge `patch` into `self`. Returns `true` if a material-visible field
    /// changed.
    fn merge(&mut self, patch: EmitterPropertiesPatch) -> bool {
        let before = (self.size, self.additive);
        if let Some(size) = patch.size {
            self.size = size;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(speed) = patch.speed {
            self.speed = speed;
        }
        if let Some(lifetime) = patch.lifetime {
            self.lifetime = lifetime;
        }
        if let Some(origin) = patch.origin {
            self.origin = origin;
        }
        if let Some(recycle) = patch.recycle {
            self.recycle = recycle;
        }
        if let Some(additive) = patch.additive {
            self.additive = additive;
        }
        before != (self.size, self.additive)
    }

    fn material(&self) -> Material {
        Material {
            point_size: self.size.max,
            additive: self.additive,
            vertex_colors: true,
            ..Material::default()
        }
    }
}

/// A fixed-capacity particle pool with render-visible mirror buffers.
pub struct ParticleEmitter {
    capacity: usize,
    particles: Vec<Particle>,
    positions: Vec<f32>,
    colors: Vec<f32>,
    properties: EmitterProperties,
    rule: Option<UpdateRule>,
    rng: StdRng,
    handle: Option<ResourceHandle>,
    dirty: bool,
    material_dirty: bool,
}

impl ParticleEmitter {
    /// Allocate `capacity` particles, create their points object, and attach
    /// it to the render root.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCapacity`] for a zero capacity, or the backend's error
    /// if the buffer object cannot be created. Nothing stays allocated on
    /// failure.
    pub fn new(capacity: usize, render: &mut dyn RenderResource) -> Result<Self> {
        Self::build(capacity, StdRng::from_entropy(), render)
    }

    /// Like [`new`](Self::new) with deterministic initial particles.
    pub fn with_seed(capacity: usize, seed: u64, render: &mut dyn RenderResource) -> Result<Self> {
        Self::build(capacity, StdRng::seed_from_u64(seed), render)
    }

    fn build(capacity: usize, mut rng: StdRng, render: &mut dyn RenderResource) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity { capacity });
        }

        let properties = EmitterProperties::default();
        let particles = (0..capacity)
            .map(|_| materialize(&properties, &mut rng))
            .collect();

        let handle = render.create_buffer_object(
            PrimitiveKind::Points,
            &[
                AttributeSpec::vec3(POSITION, capacity),
                AttributeSpec::vec3(COLOR, capacity),
            ],
        )?;

        let mut emitter = Self {
            capacity,
            particles,
            positions: vec![0.0; capacity * 3],
            colors: vec![0.0; capacity * 3],
            properties,
            rule: None,
            rng,
            handle: Some(handle),
            dirty: false,
            material_dirty: true,
        };
        emitter.sync();

        if let Err(err) = emitter.attach_and_upload(render) {
            emitter.dispose(render);
            return Err(err.into());
        }
        log::debug!("emitter {} allocated {} particles", handle, capacity);
        Ok(emitter)
    }

    fn attach_and_upload(&mut self, render: &mut dyn RenderResource) -> Result<(), RenderError> {
        if let Some(handle) = self.handle {
            render.attach_to_root(handle)?;
        }
        self.flush(render)
    }

    /// Merge new properties. Existing particles keep their state; the
    /// properties apply to respawns and to the material.
    pub fn set_properties(&mut self, patch: EmitterPropertiesPatch) {
        if self.properties.merge(patch) {
            self.material_dirty = true;
        }
    }

    pub fn properties(&self) -> &EmitterProperties {
        &self.properties
    }

    /// Install the per-particle rule. Takes effect on the next [`update`](Self::update).
    pub fn set_update_rule<F>(&mut self, rule: F)
    where
        F: FnMut(&mut Particle, f32) + 'static,
    {
        self.rule = Some(Box::new(rule));
    }

    pub fn clear_update_rule(&mut self) {
        self.rule = None;
    }

    pub fn has_update_rule(&self) -> bool {
        self.rule.is_some()
    }

    /// Run the update rule over every live particle, then resynchronize the
    /// mirrors.
    ///
    /// Dead particles are skipped, or respawned first when `recycle` is set.
    /// Without a rule, or after [`dispose`](Self::dispose), this does nothing.
    pub fn update(&mut self, dt: f32) {
        if self.handle.is_none() {
            return;
        }
        let Some(rule) = self.rule.as_mut() else {
            return;
        };

        let recycle = self.properties.recycle;
        for particle in &mut self.particles {
            if particle.is_dead() {
                if !recycle {
                    continue;
                }
                respawn(particle, &self.properties, &mut self.rng);
            }
            rule(particle, dt);
        }

        self.sync();
    }

    /// Copy every particle's position and color into the mirrors.
    pub fn sync(&mut self) {
        let mirrors = self
            .positions
            .chunks_exact_mut(3)
            .zip(self.colors.chunks_exact_mut(3));
        for (particle, (position, color)) in self.particles.iter().zip(mirrors) {
            position.copy_from_slice(&particle.position.to_array());
            color.copy_from_slice(&particle.color.to_array());
        }
        self.dirty = true;
    }

    /// Edit particles directly, then resynchronize.
    pub fn for_each_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(usize, &mut Particle),
    {
        for (i, particle) in self.particles.iter_mut().enumerate() {
            f(i, particle);
        }
        self.sync();
    }

    /// Push dirty mirrors and material to the backend.
    pub fn flush(&mut self, render: &mut dyn RenderResource) -> Result<(), RenderError> {
        let Some(handle) = self.handle else {
            return Ok(());
        };
        if self.material_dirty {
            render.set_material(handle, &self.properties.material())?;
            self.material_dirty = false;
        }
        if self.dirty {
            render.update_attribute(handle, POSITION, &self.positions)?;
            render.update_attribute(handle, COLOR, &self.colors)?;
            self.dirty = false;
        }
        Ok(())
    }

    pub fn set_visible(&mut self, render: &mut dyn RenderResource, visible: bool) -> Result<(), RenderError> {
        match self.handle {
            Some(handle) => render.set_visible(handle, visible),
            None => Ok(()),
        }
    }

    /// Detach the points object from the render root without releasing it.
    pub fn detach(&self, render: &mut dyn RenderResource) {
        if let Some(handle) = self.handle {
            render.detach_from_root(handle);
        }
    }

    /// Detach and release the render resource and drop all particles.
    ///
    /// Safe to call any number of times.
    pub fn dispose(&mut self, render: &mut dyn RenderResource) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        render.detach_from_root(handle);
        if let Err(err) = render.dispose(handle) {
            log::warn!("emitter {} release failed: {}", handle, err);
        }
        self.particles.clear();
        self.positions.fill(0.0);
        self.colors.fill(0.0);
        self.rule = None;
        self.dirty = false;
        log::debug!("emitter {} disposed", handle);
    }

    pub fn is_disposed(&self) -> bool {
        self.handle.is_none()
    }

    pub fn handle(&self) -> Option<ResourceHandle> {
        self.handle
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Mutable access to the pool. Call [`sync`](Self::sync) afterwards.
    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn live_count(&self) -> usize {
        self.particles.iter().filter(|p| !p.is_dead()).count()
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn colors(&self) -> &[f32] {
        &self.colors
    }
}

fn materialize(properties: &EmitterProperties, rng: &mut StdRng) -> Particle {
    let mut jitter = || Vec3::new(rng.gen::<f32>() - 0.5, rng.gen::<f32>() - 0.5, rng.gen::<f32>() - 0.5);
    let position = jitter() * SPAWN_EXTENT;
    let velocity = jitter();
    Particle {
        color: properties.color,
        size: properties.size.sample(rng),
        ..Particle::new(position, velocity)
    }
}

fn respawn(particle: &mut Particle, properties: &EmitterProperties, rng: &mut StdRng) {
    let z: f32 = rng.gen_range(-1.0..=1.0);
    let theta = rng.gen::<f32>() * std::f32::consts::TAU;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let direction = Vec3::new(r * theta.cos(), r * theta.sin(), z);

    particle.max_life = properties.lifetime.sample(rng);
    particle.size = properties.size.sample(rng);
    particle.color = properties.color;
    particle.reset(properties.origin, direction * properties.speed.sample(rng));
}
