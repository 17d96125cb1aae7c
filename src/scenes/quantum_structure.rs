//! Orbiting quantum nodes over a breathing probability cloud.
//!
//! Three nodes oscillate around a ring and leave fading trails. The cloud
//! underneath is modulated by a wave function whose amplitude and energy can
//! be driven through the `collapse`, `excite` and `relax` actions. Each
//! action is a one-second eased transition run on the scene's task
//! scheduler, so it stops when the scene is switched away.

use crate::color::hsl;
use crate::controls::{ControlError, ControlPanel, ControlValue, Controls};
use crate::emitter::{EmitterPropertiesPatch, ValueRange};
use crate::error::Result;
use crate::render::{AttributeSpec, Material, PrimitiveKind, POSITION};
use crate::scene::{Scene, SceneContext, SceneCore};
use crate::tasks::Easing;
use crate::trails::TrailOptions;
use glam::Vec3;
use rand::Rng;
use std::any::Any;
use std::cell::Cell;
use std::f32::consts::TAU;
use std::rc::Rc;

const NODE_COUNT: usize = 3;
const NODE_RING_RADIUS: f32 = 5.0;
const ORBITAL_PATHS: usize = 5;
const ORBITAL_SEGMENTS: usize = 64;
const CLOUD_PARTICLES: usize = 1000;
const CLOUD_RADIUS: f32 = 15.0;

const AMPLITUDE: &str = "amplitude";
const ENERGY: &str = "energy";
const COLLAPSED_AMPLITUDE: f32 = 0.2;
const TRANSITION_SECONDS: f32 = 1.0;

pub const COLLAPSE: &str = "collapse";
pub const EXCITE: &str = "excite";
pub const RELAX: &str = "relax";

#[derive(Clone, Copy, Debug, PartialEq, stardrift_derive::Controls)]
#[controls(title = "Quantum Structure")]
pub struct QuantumParams {
    #[control(label = "Time Scale", min = 0.0, max = 3.0, step = 0.1)]
    pub time_scale: f32,
}

impl Default for QuantumParams {
    fn default() -> Self {
        Self { time_scale: 1.0 }
    }
}

/// Wave function state read by the cloud's update rule.
#[derive(Clone, Copy, Debug, PartialEq)]
struct WaveState {
    phase: f32,
    amplitude: f32,
    energy: f32,
}

impl Default for WaveState {
    fn default() -> Self {
        Self {
            phase: 0.0,
            amplitude: 1.0,
            energy: 1.0,
        }
    }
}

#[derive(Debug)]
struct QuantumNode {
    trail_key: String,
    base: Vec3,
    position: Vec3,
    phase: f32,
    frequency: f32,
}

pub struct QuantumStructureScene {
    core: SceneCore,
    params: QuantumParams,
    wave: Rc<Cell<WaveState>>,
    amplitude: f32,
    energy: f32,
    nodes: Vec<QuantumNode>,
}

impl QuantumStructureScene {
    pub fn new() -> Self {
        Self {
            core: SceneCore::new(),
            params: QuantumParams::default(),
            wave: Rc::new(Cell::new(WaveState::default())),
            amplitude: 1.0,
            energy: 1.0,
            nodes: Vec::new(),
        }
    }

    /// Width of the probability cloud, `0.2` once collapsed.
    pub fn probability_amplitude(&self) -> f32 {
        self.amplitude
    }

    pub fn state_energy(&self) -> f32 {
        self.energy
    }

    /// Ease the amplitude down to its collapsed value and the energy towards
    /// `target` over one second.
    pub fn collapse_wave_function(&mut self, target: f32) {
        let tasks = self.core.tasks_mut();
        tasks.schedule(
            AMPLITUDE,
            self.amplitude,
            COLLAPSED_AMPLITUDE,
            TRANSITION_SECONDS,
            Easing::CubicOut,
        );
        tasks.schedule(ENERGY, self.energy, target, TRANSITION_SECONDS, Easing::CubicOut);
    }

    pub fn excite_state(&mut self) {
        self.collapse_wave_function((self.energy + 1.0).min(3.0));
    }

    pub fn relax_state(&mut self) {
        self.collapse_wave_function((self.energy - 1.0).max(1.0));
    }

    fn create_orbital_paths(&mut self, ctx: &mut SceneContext<'_>) -> Result<()> {
        let vertices = ORBITAL_SEGMENTS + 1;
        let mut positions = Vec::with_capacity(vertices * 3);
        for i in 0..ORBITAL_PATHS {
            let radius = 8.0 * (1.0 + i as f32 * 0.3);
            positions.clear();
            for j in 0..vertices {
                let angle = j as f32 / ORBITAL_SEGMENTS as f32 * TAU;
                positions.extend_from_slice(&[
                    angle.cos() * radius,
                    (angle * 2.0).sin() * 0.5,
                    angle.sin() * radius,
                ]);
            }

            let handle = self.core.create_object(
                PrimitiveKind::LineStrip,
                &[AttributeSpec::vec3(POSITION, vertices)],
                ctx.render,
            )?;
            ctx.render.update_attribute(handle, POSITION, &positions)?;
            ctx.render.set_material(
                handle,
                &Material {
                    opacity: 0.3,
                    additive: true,
                    vertex_colors: false,
                    color: hsl(i as f32 / ORBITAL_PATHS as f32, 0.8, 0.5),
                    ..Material::default()
                },
            )?;
        }
        Ok(())
    }
}

impl Default for QuantumStructureScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for QuantumStructureScene {
    fn name(&self) -> &str {
        "Quantum Structure"
    }

    fn core(&self) -> &SceneCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SceneCore {
        &mut self.core
    }

    fn init(&mut self, ctx: &mut SceneContext<'_>) -> Result<()> {
        self.amplitude = 1.0;
        self.energy = 1.0;
        self.wave.set(WaveState::default());

        ctx.post.set_bloom_strength(1.5);
        ctx.post.enable_depth_of_field(true);
        ctx.post.set_depth_of_field_params(30.0, 0.015, 0.015);

        let mut rng = rand::thread_rng();
        self.nodes.clear();
        for i in 0..NODE_COUNT {
            let hue = i as f32 / NODE_COUNT as f32;
            let angle = hue * TAU;
            let base = Vec3::new(angle.cos(), 0.0, angle.sin()) * NODE_RING_RADIUS;
            let trail_key = format!("quantum_{i}");
            self.core.trails_mut().create_trail(
                &trail_key,
                TrailOptions::default()
                    .with_max_points(100)
                    .with_color(hsl(hue, 0.8, 0.5))
                    .with_width(2.0)
                    .with_opacity(0.6)
                    .with_fade_out(true),
                ctx.render,
            )?;
            self.nodes.push(QuantumNode {
                trail_key,
                base,
                position: base,
                phase: rng.gen::<f32>() * TAU,
                frequency: 1.0 + i as f32 * 0.5,
            });
        }

        let nodes = self.core.spawn_emitter(NODE_COUNT, ctx.render)?;
        nodes.set_properties(EmitterPropertiesPatch {
            size: Some(ValueRange::constant(1.0)),
            additive: Some(false),
            ..Default::default()
        });

        self.create_orbital_paths(ctx)?;

        let cloud = self.core.spawn_emitter(CLOUD_PARTICLES, ctx.render)?;
        cloud.set_properties(EmitterPropertiesPatch {
            size: Some(ValueRange::constant(0.2)),
            ..Default::default()
        });
        cloud.for_each_mut(|_, p| {
            let radius = CLOUD_RADIUS * rng.gen::<f32>();
            let theta = rng.gen::<f32>() * TAU;
            let phi = (rng.gen::<f32>() * 2.0 - 1.0).acos();
            p.position = Vec3::new(
                radius * phi.sin() * theta.cos(),
                radius * phi.sin() * theta.sin(),
                radius * phi.cos(),
            );
            p.velocity = Vec3::ZERO;
            p.color = hsl(rng.gen(), 0.8, 0.5 + rng.gen::<f32>() * 0.2);
        });

        let wave = Rc::clone(&self.wave);
        cloud.set_update_rule(move |p, dt| {
            let WaveState {
                phase,
                amplitude,
                energy,
            } = wave.get();
            let r = p.position.length();
            let density = (-r / (10.0 * amplitude.max(0.05))).exp();
            let angle = p.position.z.atan2(p.position.x) + phase;
            p.position *= 1.0 + density * angle.sin() * 0.2 * dt;
            p.position = p.position.clamp_length_max(CLOUD_RADIUS * 1.5);
            p.color = hsl(density + energy * 0.2, 0.8, 0.5);
        });

        ctx.camera.position = Vec3::new(30.0, 20.0, 30.0);
        ctx.camera.look_at(Vec3::ZERO);
        Ok(())
    }

    fn on_update(&mut self, dt: f32, _ctx: &mut SceneContext<'_>) -> Result<()> {
        let amplitude = &mut self.amplitude;
        let energy = &mut self.energy;
        self.core.tasks_mut().advance(dt, |key, value| match key {
            AMPLITUDE => *amplitude = value,
            ENERGY => *energy = value,
            _ => {}
        });

        let step = dt * self.params.time_scale;
        let mut wave = self.wave.get();
        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.phase += step * node.frequency;
            let offset = wave.phase + i as f32;
            node.position = node.base
                + Vec3::new(
                    offset.sin() * self.amplitude,
                    node.phase.sin() * 2.0 * self.amplitude,
                    offset.cos() * self.amplitude,
                );
            self.core.trails_mut().update_trail(&node.trail_key, node.position);
        }

        let nodes = &self.nodes;
        let node_energy = self.energy;
        if let Some(emitter) = self.core.emitter_mut(0) {
            emitter.for_each_mut(|i, p| {
                if let Some(node) = nodes.get(i) {
                    p.position = node.position;
                    p.color = hsl(i as f32 / NODE_COUNT as f32 + node_energy * 0.2, 0.8, 0.5);
                }
            });
        }

        wave.phase += step;
        wave.amplitude = self.amplitude;
        wave.energy = self.energy;
        self.wave.set(wave);
        Ok(())
    }

    fn controls(&self) -> Option<ControlPanel> {
        Some(
            self.params
                .control_panel()
                .with_button(COLLAPSE, "Collapse Wave Function")
                .with_button(EXCITE, "Excite State")
                .with_button(RELAX, "Relax State"),
        )
    }

    fn set_control(&mut self, name: &str, value: ControlValue) -> Result<(), ControlError> {
        self.params.set_control(name, value)
    }

    fn trigger(&mut self, action: &str) -> bool {
        if !self.is_active() {
            return false;
        }
        match action {
            COLLAPSE => self.collapse_wave_function(self.energy.round()),
            EXCITE => self.excite_state(),
            RELAX => self.relax_state(),
            _ => return false,
        }
        true
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
    use crate::render::{HeadlessRenderer, RenderResource};

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
    fn test_init_builds_nodes_paths_and_cloud() {
        let mut h = Harness::new();
        let mut scene = QuantumStructureScene::new();
        scene.activate(&mut h.ctx()).unwrap();

        assert_eq!(scene.core().trails().len(), NODE_COUNT);
        assert_eq!(scene.core().objects().len(), ORBITAL_PATHS);
        assert_eq!(scene.core().emitters().len(), 2);
        assert_eq!(scene.owned_handles().len(), NODE_COUNT + ORBITAL_PATHS + 2);
        assert_eq!(h.render.root_children().len(), NODE_COUNT + ORBITAL_PATHS + 2);

        let trail = scene.core().trails().get_trail("quantum_0").unwrap();
        assert_eq!(trail.max_points(), 100);
        assert_eq!(trail.options().opacity, 0.6);
        assert!(h.post.depth_of_field.enabled);
        assert_eq!(h.post.depth_of_field.focus, 30.0);
    }

    #[test]
    fn test_trails_follow_nodes() {
        let mut h = Harness::new();
        let mut scene = QuantumStructureScene::new();
        scene.activate(&mut h.ctx()).unwrap();
        for _ in 0..150 {
            scene.update(1.0 / 60.0, &mut h.ctx()).unwrap();
        }
        let trail = scene.core().trails().get_trail("quantum_2").unwrap();
        assert_eq!(trail.len(), 100);
        assert_eq!(trail.points().next(), Some(scene.nodes[2].position));
    }

    #[test]
    fn test_excite_eases_to_next_level() {
        let mut h = Harness::new();
        let mut scene = QuantumStructureScene::new();
        scene.activate(&mut h.ctx()).unwrap();
        assert!(scene.trigger(EXCITE));

        scene.update(0.5, &mut h.ctx()).unwrap();
        assert!(scene.state_energy() > 1.5 && scene.state_energy() < 2.0);
        scene.update(0.5, &mut h.ctx()).unwrap();
        assert_eq!(scene.state_energy(), 2.0);
        assert!((scene.probability_amplitude() - COLLAPSED_AMPLITUDE).abs() < 1e-6);
        assert!(scene.core().tasks().is_empty());

        scene.trigger(EXCITE);
        scene.update(1.0, &mut h.ctx()).unwrap();
        scene.trigger(EXCITE);
        scene.update(1.0, &mut h.ctx()).unwrap();
        assert_eq!(scene.state_energy(), 3.0);

        scene.trigger(RELAX);
        scene.update(1.0, &mut h.ctx()).unwrap();
        assert_eq!(scene.state_energy(), 2.0);
    }

    #[test]
    fn test_switching_away_cancels_collapse() {
        let mut h = Harness::new();
        let mut scene = QuantumStructureScene::new();
        scene.activate(&mut h.ctx()).unwrap();
        scene.trigger(COLLAPSE);
        scene.update(0.25, &mut h.ctx()).unwrap();
        scene.deactivate(&mut h.ctx());

        assert!(scene.core().tasks().is_empty());
        assert!(!scene.trigger(EXCITE));
        assert!(h.render.live_handles().is_empty());
    }

    #[test]
    fn test_panel_lists_actions() {
        let scene = QuantumStructureScene::new();
        let panel = scene.controls().unwrap();
        assert_eq!(
            panel.actions().collect::<Vec<_>>(),
            [COLLAPSE, EXCITE, RELAX]
        );
    }
}
