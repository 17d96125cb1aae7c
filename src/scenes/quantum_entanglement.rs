//! Entangled particle pairs joined by energy streams.
//!
//! Pairs sit on opposite sides of a ring and orbit in opposite directions,
//! each joined by a wavy connection drawn with a trail buffer. A shell of
//! particles stands in for the surrounding energy field. The lensing pass is
//! switched on and follows the entanglement strength.

use crate::color::{hex, hsl};
use crate::controls::{ControlError, ControlPanel, ControlValue, Controls};
use crate::emitter::{EmitterPropertiesPatch, ValueRange};
use crate::error::Result;
use crate::params::ParamSet;
use crate::post_process::LENSING;
use crate::scene::{Scene, SceneContext, SceneCore};
use crate::trails::TrailOptions;
use glam::{Vec2, Vec3};
use rand::Rng;
use std::any::Any;
use std::cell::Cell;
use std::f32::consts::{PI, TAU};
use std::rc::Rc;

const PAIR_COUNT: usize = 8;
const PAIR_RADIUS: f32 = 15.0;
const ORBIT_RADIUS: f32 = 2.0;
const CONNECTION_POINTS: usize = 50;
const FIELD_PARTICLES: usize = 2000;
const FIELD_RADIUS: f32 = 40.0;
const CAMERA_RADIUS: f32 = 60.0;

const PAIR_COLOR: u32 = 0x00ff88;
const STREAM_COLOR: Vec3 = Vec3::new(0.0, 1.0, 0.5);
const MEASURED_STREAM_COLOR: Vec3 = Vec3::splat(0.5);
const MEASURED_STREAM_OPACITY: f32 = 0.1;

pub const MEASURE: &str = "measure";
pub const ENTANGLE: &str = "entangle";

#[derive(Clone, Copy, Debug, PartialEq, stardrift_derive::Controls)]
#[controls(title = "Quantum Entanglement")]
pub struct EntanglementParams {
    #[control(label = "Entanglement Strength", min = 0.0, max = 1.0, step = 0.05)]
    pub entanglement_strength: f32,
    #[control(label = "Coherence", min = 0.0, max = 1.0, step = 0.05)]
    pub coherence: f32,
    #[control(label = "Time Scale", min = 0.0, max = 3.0, step = 0.1)]
    pub time_scale: f32,
}

impl Default for EntanglementParams {
    fn default() -> Self {
        Self {
            entanglement_strength: 0.5,
            coherence: 1.0,
            time_scale: 1.0,
        }
    }
}

fn lensing_params(strength: f32) -> ParamSet {
    ParamSet::new()
        .with("center", Vec2::new(0.5, 0.5))
        .with("radius", 0.2)
        .with("strength", 0.05 + strength * 0.1)
}

#[derive(Debug)]
struct ParticlePair {
    key: String,
    base: [Vec3; 2],
    positions: [Vec3; 2],
    /// Spin, `1.0` or `-1.0`.
    state: f32,
}

impl ParticlePair {
    fn position_at(&self, index: usize, time: f32) -> Vec3 {
        let direction = if index == 0 { 1.0 } else { -1.0 };
        let speed = self.state * direction;
        self.base[index]
            + Vec3::new(
                (time * 2.0 * speed).cos() * ORBIT_RADIUS,
                (time * 3.0).sin() * ORBIT_RADIUS * 0.5,
                (time * 2.0 * speed).sin() * ORBIT_RADIUS,
            )
    }
}

fn random_spin<R: Rng>(rng: &mut R) -> f32 {
    if rng.gen_bool(0.5) {
        1.0
    } else {
        -1.0
    }
}

pub struct QuantumEntanglementScene {
    core: SceneCore,
    params: Rc<Cell<EntanglementParams>>,
    applied: Option<EntanglementParams>,
    pairs: Vec<ParticlePair>,
    measured: bool,
    time: f32,
}

impl QuantumEntanglementScene {
    pub fn new() -> Self {
        Self {
            core: SceneCore::new(),
            params: Rc::new(Cell::new(EntanglementParams::default())),
            applied: None,
            pairs: Vec::new(),
            measured: false,
            time: 0.0,
        }
    }

    pub fn params(&self) -> EntanglementParams {
        self.params.get()
    }

    pub fn set_entanglement_strength(&mut self, strength: f32) {
        let mut params = self.params.get();
        params.entanglement_strength = strength;
        self.params.set(params);
    }

    pub fn set_coherence(&mut self, coherence: f32) {
        let mut params = self.params.get();
        params.coherence = coherence;
        self.params.set(params);
    }

    pub fn is_measured(&self) -> bool {
        self.measured
    }

    /// Spins of every pair, in creation order.
    pub fn spins(&self) -> impl Iterator<Item = f32> + '_ {
        self.pairs.iter().map(|p| p.state)
    }

    /// Collapse every pair to a random spin and grey out the connections.
    pub fn measure_state(&mut self) {
        self.measured = true;
        let mut rng = rand::thread_rng();
        for pair in &mut self.pairs {
            pair.state = random_spin(&mut rng);
        }
        self.style_streams();
    }

    /// Re-entangle: fresh spins and live connections.
    pub fn entangle_particles(&mut self) {
        self.measured = false;
        let mut rng = rand::thread_rng();
        for pair in &mut self.pairs {
            pair.state = random_spin(&mut rng);
        }
        self.style_streams();
    }

    fn style_streams(&mut self) {
        let (color, opacity) = if self.measured {
            (MEASURED_STREAM_COLOR, MEASURED_STREAM_OPACITY)
        } else {
            (STREAM_COLOR, self.params.get().entanglement_strength)
        };
        for pair in &self.pairs {
            if let Some(trail) = self.core.trails_mut().get_trail_mut(&pair.key) {
                trail.set_color(color);
                trail.set_opacity(opacity);
            }
        }
    }

    fn create_pairs(&mut self, ctx: &mut SceneContext<'_>) -> Result<()> {
        let mut rng = rand::thread_rng();
        let opacity = self.params.get().entanglement_strength;
        self.pairs.clear();
        for i in 0..PAIR_COUNT {
            let angle = i as f32 / PAIR_COUNT as f32 * TAU;
            let height = (rng.gen::<f32>() - 0.5) * 20.0;
            let (sin, cos) = angle.sin_cos();
            let base = [
                Vec3::new(cos * PAIR_RADIUS, height, sin * PAIR_RADIUS),
                Vec3::new(-cos * PAIR_RADIUS, height, -sin * PAIR_RADIUS),
            ];
            let key = format!("connection_{i}");
            self.core.trails_mut().create_trail(
                &key,
                TrailOptions::default()
                    .with_max_points(CONNECTION_POINTS)
                    .with_color(STREAM_COLOR)
                    .with_width(1.0)
                    .with_opacity(opacity)
                    .with_fade_out(false),
                ctx.render,
            )?;
            self.pairs.push(ParticlePair {
                key,
                base,
                positions: base,
                state: random_spin(&mut rng),
            });
        }
        Ok(())
    }

    fn apply_params(&mut self, ctx: &mut SceneContext<'_>) {
        let params = self.params.get();
        if self.applied == Some(params) {
            return;
        }
        ctx.post
            .set_custom_pass_params(LENSING, &lensing_params(params.entanglement_strength));
        self.style_streams();
        self.applied = Some(params);
    }
}

impl Default for QuantumEntanglementScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for QuantumEntanglementScene {
    fn name(&self) -> &str {
        "Quantum Entanglement"
    }

    fn core(&self) -> &SceneCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SceneCore {
        &mut self.core
    }

    fn init(&mut self, ctx: &mut SceneContext<'_>) -> Result<()> {
        self.time = 0.0;
        self.measured = false;
        self.applied = None;

        ctx.post.set_bloom_strength(2.0);
        ctx.post.enable_depth_of_field(true);
        ctx.post.set_depth_of_field_params(15.0, 0.02, 0.02);
        ctx.post.enable_custom_pass(LENSING, true);

        let field = self.core.spawn_emitter(FIELD_PARTICLES, ctx.render)?;
        field.set_properties(EmitterPropertiesPatch {
            size: Some(ValueRange::constant(0.3)),
            additive: Some(true),
            ..Default::default()
        });
        let mut rng = rand::thread_rng();
        field.for_each_mut(|_, p| {
            let theta = rng.gen::<f32>() * TAU;
            let phi = (2.0 * rng.gen::<f32>() - 1.0).acos();
            p.position = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin())
                * FIELD_RADIUS;
            p.velocity = Vec3::ZERO;
        });
        let params = Rc::clone(&self.params);
        field.set_update_rule(move |p, dt| {
            let EntanglementParams {
                entanglement_strength,
                time_scale,
                ..
            } = params.get();
            let (sin, cos) = (0.1 * dt * time_scale).sin_cos();
            let (x, z) = (p.position.x, p.position.z);
            p.position.x = x * cos - z * sin;
            p.position.z = x * sin + z * cos;
            p.color = Vec3::new(0.0, 0.5, 1.0) * (0.1 + entanglement_strength * 0.2);
        });

        let pairs = self.core.spawn_emitter(PAIR_COUNT * 2, ctx.render)?;
        pairs.set_properties(EmitterPropertiesPatch {
            size: Some(ValueRange::constant(1.0)),
            additive: Some(true),
            ..Default::default()
        });

        self.create_pairs(ctx)?;
        self.apply_params(ctx);

        ctx.camera.position = Vec3::new(0.0, 40.0, CAMERA_RADIUS);
        ctx.camera.look_at(Vec3::ZERO);
        Ok(())
    }

    fn on_update(&mut self, dt: f32, ctx: &mut SceneContext<'_>) -> Result<()> {
        self.apply_params(ctx);
        let params = self.params.get();
        self.time += dt * params.time_scale;
        let time = self.time;

        for pair in &mut self.pairs {
            pair.positions = [pair.position_at(0, time), pair.position_at(1, time)];
            let Some(stream) = self.core.trails_mut().get_trail_mut(&pair.key) else {
                continue;
            };
            let [a, b] = pair.positions;
            // index 0 sits on the first particle
            stream.set_points(
                (0..CONNECTION_POINTS).map(|j| connection_point(a, b, j, time)),
            );
        }

        let pairs = &self.pairs;
        let measured = self.measured;
        let fluctuation = if measured {
            1.0
        } else {
            (time * 5.0).sin() * 0.5 + 0.5
        };
        let live = hex(PAIR_COLOR) * (0.5 + params.coherence * 0.5) * (0.8 + fluctuation * 0.2);
        if let Some(emitter) = self.core.emitter_mut(1) {
            emitter.for_each_mut(|i, p| {
                let Some(pair) = pairs.get(i / 2) else {
                    return;
                };
                p.position = pair.positions[i % 2];
                p.color = if measured {
                    hsl(if pair.state > 0.0 { 0.3 } else { 0.0 }, 0.8, 0.5)
                } else {
                    live
                };
            });
        }

        let height = 40.0 + (time * 0.5).sin() * 10.0;
        ctx.camera.orbit(time * 0.1, CAMERA_RADIUS, height);
        Ok(())
    }

    fn controls(&self) -> Option<ControlPanel> {
        Some(
            self.params
                .get()
                .control_panel()
                .with_button(MEASURE, "Measure State")
                .with_button(ENTANGLE, "Entangle Particles"),
        )
    }

    fn set_control(&mut self, name: &str, value: ControlValue) -> Result<(), ControlError> {
        let mut params = self.params.get();
        params.set_control(name, value)?;
        self.params.set(params);
        Ok(())
    }

    fn trigger(&mut self, action: &str) -> bool {
        match action {
            MEASURE => self.measure_state(),
            ENTANGLE => self.entangle_particles(),
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

/// Point `j` of the wavy link running from `a` to `b`.
fn connection_point(a: Vec3, b: Vec3, j: usize, time: f32) -> Vec3 {
    let t = j as f32 / (CONNECTION_POINTS - 1) as f32;
    let mut point = a.lerp(b, t);
    let wave = (t * PI + time * 5.0).sin() * 2.0;
    point.y += wave * (1.0 - (t - 0.5).abs() * 2.0);
    point
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::post_process::{PostProcessSettings, PostProcessingControlSurface};
    use crate::render::HeadlessRenderer;

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

    fn lensing_strength(post: &PostProcessSettings) -> f32 {
        post.custom_pass(LENSING)
            .and_then(|pass| pass.params.get_f32("strength"))
            .unwrap()
    }

    #[test]
    fn test_init_enables_lensing() {
        let mut h = Harness::new();
        let mut scene = QuantumEntanglementScene::new();
        scene.activate(&mut h.ctx()).unwrap();

        assert!(h.post.is_pass_enabled(LENSING));
        assert_eq!(h.post.settings().bloom.strength, 2.0);
        assert_eq!(h.post.depth_of_field.focus, 15.0);
        assert!((lensing_strength(&h.post) - 0.1).abs() < 1e-6);
        assert_eq!(scene.core().trails().len(), PAIR_COUNT);
        assert_eq!(scene.core().emitters()[1].capacity(), PAIR_COUNT * 2);
    }

    #[test]
    fn test_connections_span_each_pair() {
        let mut h = Harness::new();
        let mut scene = QuantumEntanglementScene::new();
        scene.activate(&mut h.ctx()).unwrap();
        scene.update(0.1, &mut h.ctx()).unwrap();

        let pair = &scene.pairs[3];
        let stream = scene.core().trails().get_trail(&pair.key).unwrap();
        assert_eq!(stream.len(), CONNECTION_POINTS);
        let first = stream.points().next().unwrap();
        let last = stream.points().last().unwrap();
        assert!(first.distance(pair.positions[0]) < 1e-4);
        assert!(last.distance(pair.positions[1]) < 1e-4);

        let particles = scene.core().emitters()[1].particles();
        assert_eq!(particles[7].position, pair.positions[1]);
    }

    #[test]
    fn test_connections_are_rebuilt_every_frame() {
        let mut h = Harness::new();
        let mut scene = QuantumEntanglementScene::new();
        scene.activate(&mut h.ctx()).unwrap();
        for _ in 0..3 {
            scene.update(0.05, &mut h.ctx()).unwrap();
        }

        let pair = &scene.pairs[0];
        let [a, b] = pair.positions;
        let expected: Vec<Vec3> = (0..CONNECTION_POINTS)
            .map(|j| connection_point(a, b, j, scene.time))
            .collect();
        let stream = scene.core().trails().get_trail(&pair.key).unwrap();
        assert_eq!(stream.points().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_strength_reaches_streams_and_lensing() {
        let mut h = Harness::new();
        let mut scene = QuantumEntanglementScene::new();
        scene.activate(&mut h.ctx()).unwrap();
        scene.set_entanglement_strength(1.0);
        scene.update(0.016, &mut h.ctx()).unwrap();

        assert!((lensing_strength(&h.post) - 0.15).abs() < 1e-6);
        let stream = scene.core().trails().get_trail("connection_0").unwrap();
        assert_eq!(stream.options().opacity, 1.0);
    }

    #[test]
    fn test_measure_greys_out_streams() {
        let mut h = Harness::new();
        let mut scene = QuantumEntanglementScene::new();
        scene.activate(&mut h.ctx()).unwrap();
        assert!(scene.trigger(MEASURE));
        assert!(scene.is_measured());
        assert!(scene.spins().all(|s| s == 1.0 || s == -1.0));
        let stream = scene.core().trails().get_trail("connection_5").unwrap();
        assert_eq!(stream.options().color, MEASURED_STREAM_COLOR);
        assert_eq!(stream.options().opacity, MEASURED_STREAM_OPACITY);

        assert!(scene.trigger(ENTANGLE));
        assert!(!scene.is_measured());
        let stream = scene.core().trails().get_trail("connection_5").unwrap();
        assert_eq!(stream.options().color, STREAM_COLOR);
    }

    #[test]
    fn test_reactivation_turns_lensing_back_on() {
        let mut h = Harness::new();
        let mut scene = QuantumEntanglementScene::new();
        scene.activate(&mut h.ctx()).unwrap();
        scene.deactivate(&mut h.ctx());
        h.post.reset_to_baseline();
        assert!(!h.post.is_pass_enabled(LENSING));

        scene.activate(&mut h.ctx()).unwrap();
        assert!(h.post.is_pass_enabled(LENSING));
        assert_eq!(h.render.live_handles().len(), PAIR_COUNT + 2);
    }
}
