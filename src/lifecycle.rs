//! The scene lifecycle controller.
//!
//! [`SceneLifecycleController`] owns the registry of scenes, the shared
//! render backend, the shared post-processing surface and the camera. It is
//! the only thing that decides which scene is current, and it sequences every
//! handoff so the render root never holds objects from two scenes at once:
//!
//! 1. reset the post-processing surface to its baseline
//! 2. deactivate the current scene and clear the render root
//! 3. reset the camera and activate the target (which runs its `init`)
//! 4. record the target as current
//!
//! If step 3 fails, the half-built target is torn down, the root is cleared
//! again and the previous scene is brought back, so the caller gets the error
//! and the screen keeps showing something coherent.
//!
//! ```ignore
//! let mut controller = SceneLifecycleController::new(renderer, post);
//! scenes::register_defaults(&mut controller)?;
//! controller.set_active_scene("galaxy")?;
//!
//! // every frame
//! controller.update(dt)?;
//! ```

use crate::camera::Camera;
use crate::controls::{ControlError, ControlPanel, ControlValue};
use crate::error::{Error, Result};
use crate::post_process::PostProcessingControlSurface;
use crate::render::RenderResource;
use crate::scene::{Scene, SceneContext, SceneState};
use std::collections::HashMap;

struct Shared<R, P> {
    render: R,
    post: P,
    camera: Camera,
}

impl<R: RenderResource, P: PostProcessingControlSurface> Shared<R, P> {
    fn context(&mut self) -> SceneContext<'_> {
        SceneContext {
            render: &mut self.render,
            post: &mut self.post,
            camera: &mut self.camera,
        }
    }
}

/// Registry of scenes with exactly one current scene at a time.
pub struct SceneLifecycleController<R: RenderResource, P: PostProcessingControlSurface> {
    shared: Shared<R, P>,
    scenes: HashMap<String, Box<dyn Scene>>,
    order: Vec<String>,
    current: Option<String>,
}

impl<R: RenderResource, P: PostProcessingControlSurface> SceneLifecycleController<R, P> {
    pub fn new(render: R, post: P) -> Self {
        Self {
            shared: Shared {
                render,
                post,
                camera: Camera::default(),
            },
            scenes: HashMap::new(),
            order: Vec::new(),
            current: None,
        }
    }

    /// Use `camera` for projection settings. Its pose is reset on every
    /// activation.
    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.shared.camera = camera;
        self
    }

    /// Add a scene under `id`.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateSceneId`] if `id` is taken.
    pub fn register(&mut self, id: impl Into<String>, mut scene: Box<dyn Scene>) -> Result<()> {
        let id = id.into();
        if self.scenes.contains_key(&id) {
            return Err(Error::DuplicateSceneId(id));
        }
        scene.core_mut().set_id(&id);
        log::info!("registered scene '{}' ({})", id, scene.name());
        self.order.push(id.clone());
        self.scenes.insert(id, scene);
        Ok(())
    }

    /// Dispose and remove a scene. If it is current, nothing is current
    /// afterwards.
    pub fn unregister(&mut self, id: &str) -> Result<()> {
        let Some(mut scene) = self.scenes.remove(id) else {
            return Err(Error::UnknownSceneId(id.to_string()));
        };
        self.order.retain(|s| s != id);
        if self.current.as_deref() == Some(id) {
            scene.deactivate(&mut self.shared.context());
            self.shared.render.clear_root();
            self.current = None;
        }
        scene.dispose(&mut self.shared.context());
        Ok(())
    }

    /// Make `id` the current scene.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownSceneId`] if `id` was never registered
    /// - [`Error::SceneDisposed`] if the scene was disposed
    /// - whatever the target's activation failed with; the previous scene
    ///   is restored in that case
    pub fn set_active_scene(&mut self, id: &str) -> Result<()> {
        match self.scenes.get(id).map(|s| s.state()) {
            None => return Err(Error::UnknownSceneId(id.to_string())),
            Some(SceneState::Disposed) => return Err(Error::SceneDisposed(id.to_string())),
            Some(_) => {}
        }

        self.shared.post.reset_to_baseline();

        let previous = self.current.take();
        if let Some(prev) = &previous {
            if let Some(scene) = self.scenes.get_mut(prev) {
                scene.deactivate(&mut self.shared.context());
            }
            self.shared.render.clear_root();
        }

        match self.activate(id) {
            Ok(()) => {
                self.current = Some(id.to_string());
                Ok(())
            }
            Err(err) => {
                log::error!("activating scene '{}' failed: {}", id, err);
                self.shared.render.clear_root();
                self.shared.post.reset_to_baseline();
                if let Some(prev) = previous {
                    self.restore(prev);
                }
                Err(err)
            }
        }
    }

    fn activate(&mut self, id: &str) -> Result<()> {
        let scene = self
            .scenes
            .get_mut(id)
            .ok_or_else(|| Error::UnknownSceneId(id.to_string()))?;
        self.shared.camera.reset();
        let mut ctx = self.shared.context();
        let result = scene.activate(&mut ctx);
        if result.is_err() {
            scene.deactivate(&mut ctx);
        }
        result
    }

    fn restore(&mut self, id: String) {
        match self.activate(&id) {
            Ok(()) => {
                log::info!("restored scene '{}'", id);
                self.current = Some(id);
            }
            Err(err) => {
                log::error!("restoring scene '{}' failed: {}", id, err);
                self.shared.render.clear_root();
                self.shared.post.reset_to_baseline();
            }
        }
    }

    /// Activate the scene at `index` in registration order.
    pub fn set_active_index(&mut self, index: usize) -> Result<()> {
        let id = self
            .order
            .get(index)
            .cloned()
            .ok_or_else(|| Error::UnknownSceneId(format!("#{}", index + 1)))?;
        self.set_active_scene(&id)
    }

    /// Activate the scene registered after the current one, wrapping around.
    pub fn next_scene(&mut self) -> Result<()> {
        self.step_scene(1)
    }

    /// Activate the scene registered before the current one, wrapping around.
    pub fn previous_scene(&mut self) -> Result<()> {
        self.step_scene(-1)
    }

    fn step_scene(&mut self, step: isize) -> Result<()> {
        if self.order.is_empty() {
            return Ok(());
        }
        let len = self.order.len() as isize;
        let index = match self.current_index() {
            Some(i) => (i as isize + step).rem_euclid(len),
            None => 0,
        };
        self.set_active_index(index as usize)
    }

    fn current_index(&self) -> Option<usize> {
        let current = self.current.as_deref()?;
        self.order.iter().position(|id| id == current)
    }

    /// Tick the current scene, then render the pipeline. Does nothing when
    /// no scene is current.
    pub fn update(&mut self, dt: f32) -> Result<()> {
        let Some(id) = self.current.as_deref() else {
            return Ok(());
        };
        let Some(scene) = self.scenes.get_mut(id) else {
            return Ok(());
        };
        scene.update(dt, &mut self.shared.context())?;
        self.shared.post.render(&self.shared.camera)?;
        Ok(())
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.shared.camera.set_aspect(width, height);
        if let Some(id) = self.current.as_deref() {
            if let Some(scene) = self.scenes.get_mut(id) {
                scene.resize(width, height, &mut self.shared.context());
            }
        }
        self.shared.post.resize(width, height);
    }

    /// Controls of the current scene.
    pub fn controls(&self) -> Option<ControlPanel> {
        self.current_scene().and_then(|s| s.controls())
    }

    /// Set a control on the current scene.
    pub fn set_control(&mut self, name: &str, value: ControlValue) -> Result<(), ControlError> {
        match self.current_scene_mut() {
            Some(scene) => scene.set_control(name, value),
            None => Err(ControlError::Unknown(name.to_string())),
        }
    }

    /// Fire an action on the current scene.
    pub fn trigger(&mut self, action: &str) -> bool {
        match self.current_scene_mut() {
            Some(scene) => scene.trigger(action),
            None => false,
        }
    }

    /// Deactivate the current scene and dispose every registered scene.
    pub fn shutdown(&mut self) {
        if let Some(id) = self.current.take() {
            if let Some(scene) = self.scenes.get_mut(&id) {
                scene.deactivate(&mut self.shared.context());
            }
            self.shared.render.clear_root();
        }
        for id in &self.order {
            if let Some(scene) = self.scenes.get_mut(id) {
                scene.dispose(&mut self.shared.context());
            }
        }
    }

    pub fn current_scene_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current_scene(&self) -> Option<&dyn Scene> {
        self.scene(self.current.as_deref()?)
    }

    pub fn current_scene_mut(&mut self) -> Option<&mut (dyn Scene + 'static)> {
        let id = self.current.as_deref()?;
        self.scenes.get_mut(id).map(Box::as_mut)
    }

    pub fn scene(&self, id: &str) -> Option<&dyn Scene> {
        self.scenes.get(id).map(|s| s.as_ref() as &dyn Scene)
    }

    pub fn scene_mut(&mut self, id: &str) -> Option<&mut (dyn Scene + 'static)> {
        self.scenes.get_mut(id).map(Box::as_mut)
    }

    /// Typed access to a registered scene, e.g. for scene-specific setters.
    pub fn scene_as_mut<T: Scene + 'static>(&mut self, id: &str) -> Option<&mut T> {
        self.scene_mut(id)?.as_any_mut().downcast_mut::<T>()
    }

    /// Registered ids in registration order.
    pub fn scene_ids(&self) -> &[String] {
        &self.order
    }

    pub fn render(&self) -> &R {
        &self.shared.render
    }

    pub fn render_mut(&mut self) -> &mut R {
        &mut self.shared.render
    }

    pub fn post(&self) -> &P {
        &self.shared.post
    }

    pub fn post_mut(&mut self) -> &mut P {
        &mut self.shared.post
    }

    pub fn camera(&self) -> &Camera {
        &self.shared.camera
    }
}

impl<R: RenderResource, P: PostProcessingControlSurface> Drop for SceneLifecycleController<R, P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post_process::PostProcessSettings;
    use crate::render::HeadlessRenderer;
    use crate::scene::SceneCore;
    use std::any::Any;

    struct Dots {
        core: SceneCore,
        bloom: f32,
        count: usize,
        fail: bool,
    }

    impl Dots {
        fn boxed(bloom: f32) -> Box<dyn Scene> {
            Box::new(Self {
                core: SceneCore::new(),
                bloom,
                count: 8,
                fail: false,
            })
        }
    }

    impl Scene for Dots {
        fn name(&self) -> &str {
            "dots"
        }
        fn core(&self) -> &SceneCore {
            &self.core
        }
        fn core_mut(&mut self) -> &mut SceneCore {
            &mut self.core
        }
        fn init(&mut self, ctx: &mut SceneContext<'_>) -> Result<()> {
            ctx.post.set_bloom_strength(self.bloom);
            ctx.camera.orbit(0.5, 80.0, 10.0);
            self.core.spawn_emitter(self.count, ctx.render)?;
            if self.fail {
                ctx.render.attach_to_root(crate::render::ResourceHandle::from_raw(9999))?;
            }
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    type Controller = SceneLifecycleController<HeadlessRenderer, PostProcessSettings>;

    fn controller() -> Controller {
        let mut c = SceneLifecycleController::new(HeadlessRenderer::new(), PostProcessSettings::default());
        c.register("a", Dots::boxed(2.0)).unwrap();
        c.register("b", Dots::boxed(0.7)).unwrap();
        c
    }

    fn root_matches_current(c: &Controller) -> bool {
        let mut root = c.render().root_children();
        let mut owned = c.current_scene().map(|s| s.owned_handles()).unwrap_or_default();
        root.sort();
        owned.sort();
        root == owned
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut c = controller();
        let err = c.register("a", Dots::boxed(1.0)).unwrap_err();
        assert!(matches!(err, Error::DuplicateSceneId(id) if id == "a"));
        assert_eq!(c.scene_ids(), ["a", "b"]);
    }

    #[test]
    fn test_unknown_scene() {
        let mut c = controller();
        assert!(matches!(
            c.set_active_scene("nebula"),
            Err(Error::UnknownSceneId(_))
        ));
        assert!(c.current_scene_id().is_none());
    }

    #[test]
    fn test_update_without_current_scene_is_noop() {
        let mut c = controller();
        c.update(0.016).unwrap();
        assert_eq!(c.post().frames_rendered, 0);
    }

    #[test]
    fn test_single_active_scene() {
        let mut c = controller();
        for id in ["a", "b", "b", "a", "b"] {
            c.set_active_scene(id).unwrap();
            c.update(0.016).unwrap();
            let active: Vec<_> = c
                .scene_ids()
                .iter()
                .filter(|id| c.scene(id).unwrap().is_active())
                .collect();
            assert_eq!(active, [id]);
            assert!(root_matches_current(&c));
        }
    }

    #[test]
    fn test_handoff_resets_post_and_camera() {
        let mut c = controller();
        c.set_active_scene("a").unwrap();
        c.post_mut().enable_depth_of_field(true);
        c.set_active_scene("b").unwrap();
        assert_eq!(c.post().bloom.strength, 0.7);
        assert!(!c.post().depth_of_field.enabled);
        // "b" moved the camera during init, after the reset
        assert!((c.camera().distance() - 80.6226).abs() < 1e-3);
    }

    #[test]
    fn test_update_renders_once_per_tick() {
        let mut c = controller();
        c.set_active_scene("a").unwrap();
        c.update(0.016).unwrap();
        c.update(0.016).unwrap();
        assert_eq!(c.post().frames_rendered, 2);
    }

    #[test]
    fn test_failed_activation_restores_previous() {
        let mut c = controller();
        c.register(
            "broken",
            Box::new(Dots {
                core: SceneCore::new(),
                bloom: 1.0,
                count: 4,
                fail: true,
            }),
        )
        .unwrap();
        c.set_active_scene("a").unwrap();

        let err = c.set_active_scene("broken").unwrap_err();
        assert!(matches!(err, Error::Render(_)));
        assert_eq!(c.current_scene_id(), Some("a"));
        assert!(c.scene("a").unwrap().is_active());
        assert!(!c.scene("broken").unwrap().is_active());
        assert!(root_matches_current(&c));
        assert_eq!(c.post().bloom.strength, 2.0);
    }

    #[test]
    fn test_failed_first_activation_leaves_nothing_current() {
        let mut c = controller();
        c.render_mut().fail_next_create();
        assert!(c.set_active_scene("a").is_err());
        assert!(c.current_scene_id().is_none());
        assert!(c.render().root_children().is_empty());
        // "a" raised bloom before its emitter failed
        assert!(c.post().is_baseline());
        c.set_active_scene("a").unwrap();
    }

    #[test]
    fn test_cycle_scenes() {
        let mut c = controller();
        c.next_scene().unwrap();
        assert_eq!(c.current_scene_id(), Some("a"));
        c.next_scene().unwrap();
        assert_eq!(c.current_scene_id(), Some("b"));
        c.next_scene().unwrap();
        assert_eq!(c.current_scene_id(), Some("a"));
        c.previous_scene().unwrap();
        assert_eq!(c.current_scene_id(), Some("b"));
        assert!(c.set_active_index(5).is_err());
    }

    #[test]
    fn test_unregister_current() {
        let mut c = controller();
        c.set_active_scene("a").unwrap();
        c.unregister("a").unwrap();
        assert!(c.current_scene_id().is_none());
        assert!(c.render().root_children().is_empty());
        assert!(c.render().live_handles().is_empty());
        assert!(matches!(c.unregister("a"), Err(Error::UnknownSceneId(_))));
    }

    #[test]
    fn test_shutdown_releases_all() {
        let mut c = controller();
        c.set_active_scene("a").unwrap();
        c.shutdown();
        assert!(c.render().live_handles().is_empty());
        assert_eq!(c.scene("b").unwrap().state(), SceneState::Disposed);
        assert!(matches!(
            c.set_active_scene("b"),
            Err(Error::SceneDisposed(_))
        ));
    }

    #[test]
    fn test_registered_scenes_report_their_id() {
        let mut c = controller();
        assert_eq!(c.scene("b").unwrap().id(), "b");
        assert_eq!(c.scene("b").unwrap().name(), "dots");

        c.shutdown();
        let mut render = HeadlessRenderer::new();
        let mut post = PostProcessSettings::default();
        let mut camera = Camera::default();
        let mut ctx = SceneContext {
            render: &mut render,
            post: &mut post,
            camera: &mut camera,
        };
        let err = c.scene_mut("b").unwrap().update(0.1, &mut ctx).unwrap_err();
        assert!(matches!(err, Error::SceneDisposed(id) if id == "b"));
    }

    #[test]
    fn test_typed_scene_access() {
        let mut c = controller();
        c.scene_as_mut::<Dots>("a").unwrap().count = 3;
        c.set_active_scene("a").unwrap();
        let scene = c.scene("a").unwrap().as_any().downcast_ref::<Dots>().unwrap();
        assert_eq!(scene.core.emitters()[0].capacity(), 3);
    }

    #[test]
    fn test_resize_reaches_camera_and_post() {
        let mut c = controller();
        c.set_active_scene("a").unwrap();
        c.resize(1000, 500);
        assert_eq!(c.camera().aspect, 2.0);
        assert_eq!((c.post().width, c.post().height), (1000, 500));
    }
}
