//! Scenes and their lifecycle.
//!
//! A scene is anything implementing [`Scene`]. It owns its particle
//! emitters, trails, extra render objects and timed tasks through a
//! [`SceneCore`], and it borrows the shared collaborators (render root,
//! post-processing surface, camera) through a [`SceneContext`] handed in by
//! the controller on every lifecycle call. Scenes never keep references to
//! shared state between calls.
//!
//! # States
//!
//! ```text
//!                activate              deactivate
//! Uninitialized ─────────▶ Active ◀══════════════▶ Inactive
//!       │                    │        activate        │
//!       └────────────────────┴──── dispose ───────────┴──▶ Disposed
//! ```
//!
//! - `activate` resets the post-processing surface to its baseline, then runs
//!   [`Scene::init`]. Every activation rebuilds the scene from scratch.
//! - `update` is a no-op unless the scene is active.
//! - `deactivate` releases everything the scene owns: emitters and trails
//!   are disposed, raw objects released, and pending tasks cancelled.
//! - `dispose` does the same and makes the scene terminal.
//!
//! Calling `update` or `activate` on a disposed scene returns
//! [`Error::SceneDisposed`] carrying the scene's registry id. Calling
//! `deactivate`, `dispose` or `resize` on
//! one does nothing.

use crate::camera::Camera;
use crate::controls::{ControlError, ControlPanel, ControlValue};
use crate::emitter::ParticleEmitter;
use crate::error::{Error, RenderError, Result};
use crate::post_process::PostProcessingControlSurface;
use crate::render::{AttributeSpec, PrimitiveKind, RenderResource, ResourceHandle};
use crate::tasks::TaskScheduler;
use crate::trails::TrailManager;
use std::any::Any;

/// Shared collaborators lent to a scene for the duration of one call.
pub struct SceneContext<'a> {
    pub render: &'a mut dyn RenderResource,
    pub post: &'a mut dyn PostProcessingControlSurface,
    pub camera: &'a mut Camera,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SceneState {
    #[default]
    Uninitialized,
    Active,
    Inactive,
    Disposed,
}

/// Resources and bookkeeping shared by every scene implementation.
#[derive(Default)]
pub struct SceneCore {
    id: Option<String>,
    state: SceneState,
    emitters: Vec<ParticleEmitter>,
    trails: TrailManager,
    objects: Vec<ResourceHandle>,
    tasks: TaskScheduler,
    elapsed: f32,
}

impl SceneCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SceneState {
        self.state
    }

    /// Registry id, once a controller has registered the scene.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub(crate) fn set_id(&mut self, id: &str) {
        self.id = Some(id.to_string());
    }

    pub fn is_active(&self) -> bool {
        self.state == SceneState::Active
    }

    /// Seconds the scene has been active since its last activation.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Create an emitter and take ownership of it. Emitters are updated in
    /// the order they were added.
    pub fn spawn_emitter(
        &mut self,
        capacity: usize,
        render: &mut dyn RenderResource,
    ) -> Result<&mut ParticleEmitter> {
        let emitter = ParticleEmitter::new(capacity, render)?;
        Ok(self.add_emitter(emitter))
    }

    pub fn add_emitter(&mut self, emitter: ParticleEmitter) -> &mut ParticleEmitter {
        let index = self.emitters.len();
        self.emitters.push(emitter);
        &mut self.emitters[index]
    }

    pub fn emitters(&self) -> &[ParticleEmitter] {
        &self.emitters
    }

    pub fn emitter_mut(&mut self, index: usize) -> Option<&mut ParticleEmitter> {
        self.emitters.get_mut(index)
    }

    pub fn trails(&self) -> &TrailManager {
        &self.trails
    }

    pub fn trails_mut(&mut self) -> &mut TrailManager {
        &mut self.trails
    }

    pub fn tasks(&self) -> &TaskScheduler {
        &self.tasks
    }

    pub fn tasks_mut(&mut self) -> &mut TaskScheduler {
        &mut self.tasks
    }

    /// Create a raw buffer object owned by the scene and attach it to the
    /// root. Used for static geometry that is neither an emitter nor a trail.
    pub fn create_object(
        &mut self,
        kind: PrimitiveKind,
        attributes: &[AttributeSpec],
        render: &mut dyn RenderResource,
    ) -> Result<ResourceHandle, RenderError> {
        let handle = render.create_buffer_object(kind, attributes)?;
        if let Err(err) = render.attach_to_root(handle) {
            if let Err(release) = render.dispose(handle) {
                log::warn!("object {} release failed: {}", handle, release);
            }
            return Err(err);
        }
        self.objects.push(handle);
        Ok(handle)
    }

    pub fn objects(&self) -> &[ResourceHandle] {
        &self.objects
    }

    /// Every live render handle the scene owns.
    pub fn owned_handles(&self) -> Vec<ResourceHandle> {
        self.emitters
            .iter()
            .filter_map(ParticleEmitter::handle)
            .chain(self.trails.handles())
            .chain(self.objects.iter().copied())
            .collect()
    }

    /// Advance every emitter, then push emitters and trails to the backend.
    pub fn advance(&mut self, dt: f32, render: &mut dyn RenderResource) -> Result<(), RenderError> {
        self.elapsed += dt;
        for emitter in &mut self.emitters {
            emitter.update(dt);
        }
        for emitter in &mut self.emitters {
            emitter.flush(render)?;
        }
        self.trails.flush(render)
    }

    /// Cancel tasks and release every owned resource.
    pub fn teardown(&mut self, render: &mut dyn RenderResource) {
        self.tasks.cancel_all();
        for mut emitter in self.emitters.drain(..) {
            emitter.dispose(render);
        }
        self.trails.clear(render);
        for handle in self.objects.drain(..) {
            render.detach_from_root(handle);
            if let Err(err) = render.dispose(handle) {
                log::warn!("object {} release failed: {}", handle, err);
            }
        }
        self.elapsed = 0.0;
    }

    pub(crate) fn set_state(&mut self, state: SceneState) {
        self.state = state;
    }
}

/// A self-contained simulation that can be swapped onto the shared renderer.
///
/// Implementors provide [`init`](Scene::init) and usually
/// [`on_update`](Scene::on_update); the provided lifecycle methods handle
/// state transitions and resource release.
pub trait Scene {
    /// Human-readable name, used in logs.
    fn name(&self) -> &str;

    fn core(&self) -> &SceneCore;

    fn core_mut(&mut self) -> &mut SceneCore;

    /// Build emitters, trails, objects and post-processing settings.
    ///
    /// Runs on every activation, starting from an empty [`SceneCore`] and a
    /// baseline post-processing surface.
    fn init(&mut self, ctx: &mut SceneContext<'_>) -> Result<()>;

    /// Scene-specific per-frame work, run before emitters advance.
    fn on_update(&mut self, dt: f32, ctx: &mut SceneContext<'_>) -> Result<()> {
        let _ = (dt, ctx);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Registry id, or the name for a scene that was never registered.
    fn id(&self) -> &str {
        self.core().id().unwrap_or_else(|| self.name())
    }

    fn state(&self) -> SceneState {
        self.core().state()
    }

    fn is_active(&self) -> bool {
        self.core().is_active()
    }

    fn activate(&mut self, ctx: &mut SceneContext<'_>) -> Result<()> {
        match self.state() {
            SceneState::Disposed => return Err(Error::SceneDisposed(self.id().to_string())),
            SceneState::Active => return Ok(()),
            SceneState::Uninitialized | SceneState::Inactive => {}
        }

        ctx.post.reset_to_baseline();
        if let Err(err) = self.init(ctx) {
            self.core_mut().teardown(ctx.render);
            return Err(err);
        }
        self.core_mut().set_state(SceneState::Active);
        log::info!(
            "scene '{}' activated ({} objects)",
            self.name(),
            self.owned_handles().len()
        );
        Ok(())
    }

    fn update(&mut self, dt: f32, ctx: &mut SceneContext<'_>) -> Result<()> {
        match self.state() {
            SceneState::Disposed => Err(Error::SceneDisposed(self.id().to_string())),
            SceneState::Active => {
                self.on_update(dt, ctx)?;
                self.core_mut().advance(dt, ctx.render)?;
                Ok(())
            }
            SceneState::Uninitialized | SceneState::Inactive => Ok(()),
        }
    }

    fn deactivate(&mut self, ctx: &mut SceneContext<'_>) {
        match self.state() {
            SceneState::Disposed => {}
            SceneState::Active => {
                self.core_mut().teardown(ctx.render);
                self.core_mut().set_state(SceneState::Inactive);
                log::info!("scene '{}' deactivated", self.name());
            }
            SceneState::Uninitialized | SceneState::Inactive => {
                self.core_mut().teardown(ctx.render);
            }
        }
    }

    fn dispose(&mut self, ctx: &mut SceneContext<'_>) {
        if self.state() == SceneState::Disposed {
            return;
        }
        self.core_mut().teardown(ctx.render);
        self.core_mut().set_state(SceneState::Disposed);
        log::debug!("scene '{}' disposed", self.name());
    }

    fn resize(&mut self, width: u32, height: u32, ctx: &mut SceneContext<'_>) {
        let _ = (width, height, ctx);
    }

    fn controls(&self) -> Option<ControlPanel> {
        None
    }

    fn set_control(&mut self, name: &str, value: ControlValue) -> Result<(), ControlError> {
        let _ = value;
        Err(ControlError::Unknown(name.to_string()))
    }

    /// Fire a one-shot action such as a button press. Returns `false` for
    /// unknown actions.
    fn trigger(&mut self, action: &str) -> bool {
        let _ = action;
        false
    }

    fn owned_handles(&self) -> Vec<ResourceHandle> {
        self.core().owned_handles()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post_process::PostProcessSettings;
    use crate::render::HeadlessRenderer;
    use crate::tasks::Easing;
    use crate::trails::TrailOptions;

    #[derive(Default)]
    struct Probe {
        core: SceneCore,
        inits: u32,
        frames: u32,
        fail_init: bool,
        energy: f32,
    }

    impl Scene for Probe {
        fn name(&self) -> &str {
            "probe"
        }

        fn core(&self) -> &SceneCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut SceneCore {
            &mut self.core
        }

        fn init(&mut self, ctx: &mut SceneContext<'_>) -> Result<()> {
            self.inits += 1;
            ctx.post.set_bloom_strength(2.5);
            let emitter = self.core.spawn_emitter(16, ctx.render)?;
            emitter.set_update_rule(|p, dt| p.update(dt));
            self.core
                .trails_mut()
                .create_trail("tail", TrailOptions::default(), ctx.render)?;
            if self.fail_init {
                self.core.spawn_emitter(0, ctx.render)?;
            }
            Ok(())
        }

        fn on_update(&mut self, dt: f32, _ctx: &mut SceneContext<'_>) -> Result<()> {
            self.frames += 1;
            let energy = &mut self.energy;
            self.core.tasks_mut().advance(dt, |_, v| *energy = v);
            self.core.trails_mut().update_trail("tail", glam::Vec3::ONE);
            Ok(())
        }

        fn trigger(&mut self, action: &str) -> bool {
            if action == "charge" {
                self.core.tasks_mut().schedule("energy", 0.0, 1.0, 1.0, Easing::Linear);
                return true;
            }
            false
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct Harness {
        render: HeadlessRenderer,
        post: PostProcessSettings,
        camera: Camera,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                render: HeadlessRenderer::new(),
                post: PostProcessSettings::default(),
                camera: Camera::default(),
            }
        }

        fn ctx(&mut self) -> SceneContext<'_> {
            SceneContext {
                render: &mut self.render,
                post: &mut self.post,
                camera: &mut self.camera,
            }
        }
    }

    #[test]
    fn test_activate_resets_post_then_inits() {
        let mut h = Harness::new();
        h.post.enable_depth_of_field(true);
        let mut scene = Probe::default();
        scene.activate(&mut h.ctx()).unwrap();
        assert_eq!(scene.state(), SceneState::Active);
        assert!(!h.post.depth_of_field.enabled);
        assert_eq!(h.post.bloom.strength, 2.5);
        assert_eq!(scene.owned_handles().len(), 2);

        scene.activate(&mut h.ctx()).unwrap();
        assert_eq!(scene.inits, 1);
    }

    #[test]
    fn test_update_only_when_active() {
        let mut h = Harness::new();
        let mut scene = Probe::default();
        scene.update(0.1, &mut h.ctx()).unwrap();
        assert_eq!(scene.frames, 0);

        scene.activate(&mut h.ctx()).unwrap();
        scene.update(0.1, &mut h.ctx()).unwrap();
        assert_eq!(scene.frames, 1);
        assert_eq!(scene.core().trails().get_trail("tail").unwrap().len(), 1);

        scene.deactivate(&mut h.ctx());
        scene.update(0.1, &mut h.ctx()).unwrap();
        assert_eq!(scene.frames, 1);
    }

    #[test]
    fn test_deactivate_releases_everything() {
        let mut h = Harness::new();
        let mut scene = Probe::default();
        scene.activate(&mut h.ctx()).unwrap();
        let handles = scene.owned_handles();
        scene.deactivate(&mut h.ctx());

        assert_eq!(scene.state(), SceneState::Inactive);
        assert!(scene.owned_handles().is_empty());
        assert!(h.render.root_children().is_empty());
        for handle in handles {
            assert_eq!(h.render.object(handle).unwrap().release_count, 1);
        }
    }

    #[test]
    fn test_reactivation_rebuilds() {
        let mut h = Harness::new();
        let mut scene = Probe::default();
        scene.activate(&mut h.ctx()).unwrap();
        scene.deactivate(&mut h.ctx());
        scene.activate(&mut h.ctx()).unwrap();
        assert_eq!(scene.inits, 2);
        assert_eq!(h.render.live_handles().len(), 2);
    }

    #[test]
    fn test_deactivate_cancels_tasks() {
        let mut h = Harness::new();
        let mut scene = Probe::default();
        scene.activate(&mut h.ctx()).unwrap();
        assert!(scene.trigger("charge"));
        assert!(!scene.trigger("discharge"));
        scene.update(0.5, &mut h.ctx()).unwrap();
        assert_eq!(scene.energy, 0.5);

        scene.deactivate(&mut h.ctx());
        assert!(scene.core().tasks().is_empty());
    }

    #[test]
    fn test_disposed_scene_rejects_update_and_activate() {
        let mut h = Harness::new();
        let mut scene = Probe::default();
        scene.activate(&mut h.ctx()).unwrap();
        scene.dispose(&mut h.ctx());
        scene.dispose(&mut h.ctx());
        assert_eq!(scene.state(), SceneState::Disposed);
        assert_eq!(h.render.stats().disposed, 2);

        assert!(matches!(
            scene.update(0.1, &mut h.ctx()),
            Err(Error::SceneDisposed(_))
        ));
        assert!(matches!(
            scene.activate(&mut h.ctx()),
            Err(Error::SceneDisposed(_))
        ));
        scene.deactivate(&mut h.ctx());
        assert_eq!(scene.state(), SceneState::Disposed);
    }

    #[test]
    fn test_disposed_error_carries_registry_id() {
        let mut h = Harness::new();
        let mut scene = Probe::default();
        assert_eq!(scene.id(), "probe");

        scene.core_mut().set_id("probe-2");
        scene.dispose(&mut h.ctx());
        let err = scene.update(0.1, &mut h.ctx()).unwrap_err();
        assert!(matches!(err, Error::SceneDisposed(id) if id == "probe-2"));
        let err = scene.activate(&mut h.ctx()).unwrap_err();
        assert!(matches!(err, Error::SceneDisposed(id) if id == "probe-2"));
    }

    #[test]
    fn test_failed_init_leaves_nothing_behind() {
        let mut h = Harness::new();
        let mut scene = Probe {
            fail_init: true,
            ..Probe::default()
        };
        let err = scene.activate(&mut h.ctx()).unwrap_err();
        assert!(matches!(err, Error::InvalidCapacity { .. }));
        assert_eq!(scene.state(), SceneState::Uninitialized);
        assert!(h.render.live_handles().is_empty());
        assert!(h.render.root_children().is_empty());
    }

    #[test]
    fn test_default_controls() {
        let mut scene = Probe::default();
        assert!(scene.controls().is_none());
        assert_eq!(
            scene.set_control("speed", ControlValue::Number(1.0)),
            Err(ControlError::Unknown("speed".into()))
        );
    }
}
