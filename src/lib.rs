//! # stardrift
//!
//! Particle buffers and scene lifecycle for real-time visualizations.
//!
//! A fixed set of scenes share one renderer, one post-processing pipeline
//! and one camera. Exactly one scene is live at a time; switching scenes
//! tears the old one down completely before the new one builds itself, so
//! nothing leaks across a handoff.
//!
//! ## Quick Start
//!
//! ```ignore
//! use stardrift::prelude::*;
//!
//! let mut controller = SceneLifecycleController::new(
//!     HeadlessRenderer::new(),
//!     PostProcessSettings::default(),
//! );
//! stardrift::scenes::register_defaults(&mut controller)?;
//! controller.set_active_scene("galaxy")?;
//!
//! loop {
//!     controller.update(1.0 / 60.0)?;
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Emitters
//!
//! A [`ParticleEmitter`](emitter::ParticleEmitter) is a fixed-capacity pool
//! of [`Particle`](particle::Particle)s mirrored into one render buffer
//! object. `update` runs the rules on the CPU and marks the buffers dirty;
//! `flush` uploads them. Emitters are disposed exactly once.
//!
//! ### Trails
//!
//! A [`TrailManager`](trails::TrailManager) keeps named ring buffers of
//! recent points drawn as line strips, optionally fading toward the tail.
//!
//! ### Scenes
//!
//! A [`Scene`](scene::Scene) builds its emitters, trails and objects in
//! `init`, animates them in `on_update`, and owns everything through its
//! [`SceneCore`](scene::SceneCore). The
//! [`SceneLifecycleController`](lifecycle::SceneLifecycleController) drives
//! the state machine:
//!
//! ```text
//! Uninitialized --activate--> Active --deactivate--> Inactive --activate--> Active
//!       |                                               |
//!       `------------------- dispose -------------------+--> Disposed
//! ```
//!
//! ### Backends
//!
//! The core only talks to [`RenderResource`](render::RenderResource) and
//! [`PostProcessingControlSurface`](post_process::PostProcessingControlSurface).
//! [`HeadlessRenderer`](render::HeadlessRenderer) keeps everything in memory
//! for tests and `--headless` runs; the [`gpu`] module draws with wgpu.

extern crate self as stardrift;

pub mod camera;
pub mod color;
pub mod config;
pub mod controls;
pub mod emitter;
pub mod error;
pub mod gpu;
pub mod lifecycle;
pub mod noise;
pub mod params;
pub mod particle;
pub mod post_process;
pub mod render;
pub mod scene;
pub mod scenes;
pub mod tasks;
pub mod time;
pub mod trails;
pub mod window;

pub use bytemuck;
pub use controls::Controls;
pub use error::{Error, Result};
pub use glam::{Vec2, Vec3, Vec4};
pub use stardrift_derive::Controls;

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use stardrift::prelude::*;
/// ```
pub mod prelude {
    pub use crate::camera::Camera;
    pub use crate::color::{hex, hsl};
    pub use crate::controls::{ControlPanel, ControlValue, Controls};
    pub use crate::emitter::{EmitterProperties, ParticleEmitter, ValueRange};
    pub use crate::error::{Error, RenderError, Result};
    pub use crate::lifecycle::SceneLifecycleController;
    pub use crate::noise::{NoiseField, ValueNoise};
    pub use crate::params::ParamSet;
    pub use crate::particle::Particle;
    pub use crate::post_process::{PostProcessSettings, PostProcessingControlSurface, LENSING};
    pub use crate::render::{HeadlessRenderer, Material, PrimitiveKind, RenderResource};
    pub use crate::scene::{Scene, SceneContext, SceneCore, SceneState};
    pub use crate::tasks::{Easing, TaskScheduler};
    pub use crate::trails::{TrailManager, TrailOptions};
    pub use crate::{Vec2, Vec3, Vec4};
    pub use stardrift_derive::Controls;
}
