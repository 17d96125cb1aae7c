//! A rotating spiral galaxy.

use crate::color::{hex, hsl};
use crate::controls::{ControlError, ControlPanel, ControlValue, Controls};
use crate::emitter::{EmitterPropertiesPatch, ValueRange};
use crate::error::Result;
use crate::scene::{Scene, SceneContext, SceneCore};
use glam::Vec3;
use rand::Rng;
use std::any::Any;
use std::cell::Cell;
use std::f32::consts::{PI, TAU};
use std::rc::Rc;

const DEFAULT_PARTICLES: usize = 100_000;
const DISC_RADIUS: f32 = 100.0;
const CAMERA_RADIUS: f32 = 150.0;
const CAMERA_HEIGHT: f32 = 50.0;

#[derive(Clone, Copy, Debug, PartialEq, stardrift_derive::Controls)]
#[controls(title = "Galaxy")]
pub struct GalaxyParams {
    /// Multiplier on the Keplerian angular speed.
    #[control(label = "Rotation Speed", min = 0.0, max = 4.0, step = 0.05)]
    pub rotation_speed: f32,
    /// Number of spiral arms. Applied on the next activation.
    #[control(label = "Spiral Arms", min = 1.0, max = 8.0, step = 1.0)]
    pub arm_count: f32,
    #[control(label = "Orbit Camera")]
    pub orbit_camera: bool,
}

impl Default for GalaxyParams {
    fn default() -> Self {
        Self {
            rotation_speed: 1.0,
            arm_count: 2.0,
            orbit_camera: true,
        }
    }
}

/// Angular speed of a particle at distance `r` from the core.
pub fn orbital_speed(r: f32) -> f32 {
    0.5 / r.max(0.1).sqrt()
}

pub struct GalaxyScene {
    core: SceneCore,
    params: Rc<Cell<GalaxyParams>>,
    particle_count: usize,
    time: f32,
}

impl GalaxyScene {
    pub fn new() -> Self {
        Self::with_particle_count(DEFAULT_PARTICLES)
    }

    pub fn with_particle_count(particle_count: usize) -> Self {
        Self {
            core: SceneCore::new(),
            params: Rc::new(Cell::new(GalaxyParams::default())),
            particle_count,
            time: 0.0,
        }
    }

    pub fn params(&self) -> GalaxyParams {
        self.params.get()
    }

    pub fn set_rotation_speed(&mut self, speed: f32) {
        let mut params = self.params.get();
        params.rotation_speed = speed;
        self.params.set(params);
    }
}

impl Default for GalaxyScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for GalaxyScene {
    fn name(&self) -> &str {
        "Galaxy"
    }

    fn core(&self) -> &SceneCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SceneCore {
        &mut self.core
    }

    fn init(&mut self, ctx: &mut SceneContext<'_>) -> Result<()> {
        self.time = 0.0;
        let arms = self.params.get().arm_count.round().max(1.0);

        let emitter = self.core.spawn_emitter(self.particle_count, ctx.render)?;
        emitter.set_properties(EmitterPropertiesPatch {
            size: Some(ValueRange::new(0.02, 0.1)),
            color: Some(hex(0xff375f)),
            ..Default::default()
        });

        let mut rng = rand::thread_rng();
        emitter.for_each_mut(|_, p| {
            let angle = rng.gen::<f32>() * TAU;
            let distance = rng.gen::<f32>().sqrt() * DISC_RADIUS;
            let arm_offset = angle / TAU * PI * arms;

            p.position = Vec3::new(
                (angle + arm_offset).cos() * distance,
                (rng.gen::<f32>() - 0.5) * distance * 0.1,
                (angle + arm_offset).sin() * distance,
            );
            let speed = (1.0 / distance.max(0.1)).sqrt();
            p.velocity = Vec3::new(-angle.sin() * speed, 0.0, angle.cos() * speed);
            p.color = hsl(0.7 - (distance / DISC_RADIUS).min(1.0) * 0.5, 0.8, 0.6);
        });

        let params = Rc::clone(&self.params);
        emitter.set_update_rule(move |p, dt| {
            let r = p.position.length();
            let (sin, cos) = (orbital_speed(r) * params.get().rotation_speed * dt).sin_cos();
            let (x, z) = (p.position.x, p.position.z);
            p.position.x = x * cos - z * sin;
            p.position.z = x * sin + z * cos;
            p.color = hsl(0.7 - (r / DISC_RADIUS).min(1.0) * 0.5, 0.8, 0.6);
        });

        ctx.camera.position = Vec3::new(0.0, CAMERA_HEIGHT, CAMERA_RADIUS);
        ctx.camera.look_at(Vec3::ZERO);
        Ok(())
    }

    fn on_update(&mut self, dt: f32, ctx: &mut SceneContext<'_>) -> Result<()> {
        self.time += dt;
        if self.params.get().orbit_camera {
            ctx.camera.orbit(self.time * 0.05, CAMERA_RADIUS, CAMERA_HEIGHT);
        }
        Ok(())
    }

    fn controls(&self) -> Option<ControlPanel> {
        Some(self.params.get().control_panel())
    }

    fn set_control(&mut self, name: &str, value: ControlValue) -> Result<(), ControlError> {
        let mut params = self.params.get();
        params.set_control(name, value)?;
        self.params.set(params);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::post_process::PostProcessSettings;
    use crate::render::HeadlessRenderer;

    #[test]
    fn test_orbital_speed_falls_off() {
        assert!(orbital_speed(1.0) > orbital_speed(50.0));
        assert_eq!(orbital_speed(0.0), orbital_speed(0.1));
    }

    #[test]
    fn test_rotation_preserves_radius() {
        let mut render = HeadlessRenderer::new();
        let mut post = PostProcessSettings::default();
        let mut camera = Camera::default();
        let mut ctx = SceneContext {
            render: &mut render,
            post: &mut post,
            camera: &mut camera,
        };

        let mut scene = GalaxyScene::with_particle_count(64);
        scene.activate(&mut ctx).unwrap();
        let before: Vec<f32> = scene.core().emitters()[0]
            .particles()
            .iter()
            .map(|p| p.position.length())
            .collect();
        scene.update(0.5, &mut ctx).unwrap();
        let emitter = &scene.core().emitters()[0];
        for (p, r) in emitter.particles().iter().zip(before) {
            assert!((p.position.length() - r).abs() < 1e-3);
        }
        assert_eq!(emitter.positions().len(), 64 * 3);
        assert!((camera.distance() - 158.1139).abs() < 1e-2);
    }

    #[test]
    fn test_disc_is_permanent() {
        let mut render = HeadlessRenderer::new();
        let mut post = PostProcessSettings::default();
        let mut camera = Camera::default();
        let mut ctx = SceneContext {
            render: &mut render,
            post: &mut post,
            camera: &mut camera,
        };

        let mut scene = GalaxyScene::with_particle_count(32);
        scene.activate(&mut ctx).unwrap();
        for _ in 0..240 {
            scene.update(1.0 / 60.0, &mut ctx).unwrap();
        }
        let emitter = &scene.core().emitters()[0];
        assert_eq!(emitter.live_count(), 32);
        assert!(!emitter.properties().recycle);
        assert_eq!(emitter.properties().lifetime, ValueRange::constant(1.0));
        assert_eq!(emitter.properties().speed, ValueRange::constant(1.0));
    }

    #[test]
    fn test_controls_write_through() {
        let mut scene = GalaxyScene::with_particle_count(8);
        scene
            .set_control("rotation_speed", ControlValue::Number(9.0))
            .unwrap();
        assert_eq!(scene.params().rotation_speed, 4.0);
        assert!(matches!(
            scene.set_control("orbit_camera", ControlValue::Number(1.0)),
            Err(ControlError::TypeMismatch { .. })
        ));
        let panel = scene.controls().unwrap();
        assert_eq!(panel.title, "Galaxy");
        assert_eq!(panel.controls.len(), 3);
    }
}
