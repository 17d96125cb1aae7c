//! Dark matter drifting through a noise flow field.

use crate::controls::{ControlError, ControlPanel, ControlValue, Controls};
use crate::emitter::{EmitterPropertiesPatch, ValueRange};
use crate::error::Result;
use crate::noise::{NoiseField, ValueNoise};
use crate::scene::{Scene, SceneContext, SceneCore};
use glam::Vec3;
use rand::Rng;
use std::any::Any;
use std::cell::Cell;
use std::f32::consts::TAU;
use std::rc::Rc;

const DEFAULT_PARTICLES: usize = 100_000;
const BOUND_RADIUS: f32 = 50.0;
const DAMPING: f32 = 0.99;
const FIELD_SCALE: f32 = 0.05;
/// Velocities are tuned per frame at this rate.
const REFERENCE_FPS: f32 = 60.0;

#[derive(Clone, Copy, Debug, PartialEq, stardrift_derive::Controls)]
#[controls(title = "Dark Matter Flow")]
pub struct FlowParams {
    #[control(label = "Flow Intensity", min = 0.0, max = 3.0, step = 0.1)]
    pub flow_intensity: f32,
    #[control(label = "Time Scale", min = 0.0, max = 3.0, step = 0.1)]
    pub time_scale: f32,
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            flow_intensity: 1.0,
            time_scale: 1.0,
        }
    }
}

/// Push `p` back inside the bounding sphere.
fn confine(p: Vec3) -> Vec3 {
    let r = p.length();
    if r > BOUND_RADIUS {
        p * ((BOUND_RADIUS - 1.0) / r)
    } else {
        p
    }
}

pub struct DarkMatterFlowScene {
    core: SceneCore,
    params: Rc<Cell<FlowParams>>,
    time: Rc<Cell<f32>>,
    noise: Rc<ValueNoise>,
    particle_count: usize,
}

impl DarkMatterFlowScene {
    pub fn new() -> Self {
        Self::with_particle_count(DEFAULT_PARTICLES)
    }

    pub fn with_particle_count(particle_count: usize) -> Self {
        Self {
            core: SceneCore::new(),
            params: Rc::new(Cell::new(FlowParams::default())),
            time: Rc::new(Cell::new(0.0)),
            noise: Rc::new(ValueNoise::new(rand::random())),
            particle_count,
        }
    }

    pub fn set_flow_intensity(&mut self, intensity: f32) {
        let mut params = self.params.get();
        params.flow_intensity = intensity;
        self.params.set(params);
    }

    pub fn flow_intensity(&self) -> f32 {
        self.params.get().flow_intensity
    }
}

impl Default for DarkMatterFlowScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for DarkMatterFlowScene {
    fn name(&self) -> &str {
        "Dark Matter Flow"
    }

    fn core(&self) -> &SceneCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SceneCore {
        &mut self.core
    }

    fn init(&mut self, ctx: &mut SceneContext<'_>) -> Result<()> {
        self.time.set(0.0);

        let emitter = self.core.spawn_emitter(self.particle_count, ctx.render)?;
        emitter.set_properties(EmitterPropertiesPatch {
            size: Some(ValueRange::constant(0.15)),
            additive: Some(true),
            ..Default::default()
        });

        let mut rng = rand::thread_rng();
        emitter.for_each_mut(|_, p| {
            let theta = rng.gen::<f32>() * TAU;
            let phi = (2.0 * rng.gen::<f32>() - 1.0).acos();
            let r = rng.gen::<f32>().powf(0.3) * BOUND_RADIUS;
            p.position = Vec3::new(
                r * phi.sin() * theta.cos(),
                r * phi.sin() * theta.sin(),
                r * phi.cos(),
            );
            p.velocity = Vec3::new(
                rng.gen::<f32>() - 0.5,
                rng.gen::<f32>() - 0.5,
                rng.gen::<f32>() - 0.5,
            ) * 0.1;
            let t = rng.gen::<f32>();
            p.color = Vec3::new(0.2 + 0.1 * t, 0.1 + 0.2 * t, 0.4 + 0.3 * t);
        });

        let params = Rc::clone(&self.params);
        let time = Rc::clone(&self.time);
        let noise = Rc::clone(&self.noise);
        emitter.set_update_rule(move |p, dt| {
            let FlowParams {
                flow_intensity,
                time_scale,
            } = params.get();
            let t = time.get() * 0.2;
            let s = p.position * FIELD_SCALE;
            let flow = Vec3::new(
                noise.sample(s.x, s.y, 0.0, t),
                noise.sample(s.y, s.z, 0.0, t),
                noise.sample(s.z, s.x, 0.0, t),
            ) * flow_intensity;

            p.velocity = (p.velocity + flow * 0.01) * DAMPING;
            p.position = confine(p.position + p.velocity * time_scale * dt * REFERENCE_FPS);
        });

        ctx.post.set_bloom_strength(1.8);
        ctx.post.enable_depth_of_field(true);
        ctx.post.set_depth_of_field_params(20.0, 0.01, 0.01);
        Ok(())
    }

    fn on_update(&mut self, dt: f32, _ctx: &mut SceneContext<'_>) -> Result<()> {
        self.time.set(self.time.get() + dt);
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
