//! The shared post-processing control surface.
//!
//! Scenes tune the pipeline (bloom, depth of field, named custom passes such
//! as gravitational lensing) but never own it. The controller owns one
//! [`PostProcessingControlSurface`] and lends it to the current scene; before
//! every activation it is put back to the baseline with
//! [`reset_to_baseline`](PostProcessingControlSurface::reset_to_baseline).
//!
//! | Baseline | Value |
//! |----------|-------|
//! | Bloom strength | `1.5` (configurable) |
//! | Depth of field | disabled |
//! | Custom passes | all disabled |
//!
//! [`PostProcessSettings`] is the plain-data state behind every
//! implementation. On its own it is the headless surface; the GPU backend
//! wraps one and turns it into uniforms.

use crate::camera::Camera;
use crate::error::RenderError;
use crate::params::ParamSet;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the built-in gravitational lensing pass.
pub const LENSING: &str = "lensing";

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomSettings {
    pub strength: f32,
    pub radius: f32,
    pub threshold: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            strength: 1.5,
            radius: 0.4,
            threshold: 0.85,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthOfField {
    pub enabled: bool,
    pub focus: f32,
    pub aperture: f32,
    pub max_blur: f32,
}

impl Default for DepthOfField {
    fn default() -> Self {
        Self {
            enabled: false,
            focus: 1000.0,
            aperture: 0.025,
            max_blur: 0.01,
        }
    }
}

/// Final color adjustment, always applied.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorGrade {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
}

impl Default for ColorGrade {
    fn default() -> Self {
        Self {
            brightness: 0.3,
            contrast: 1.2,
            saturation: 1.3,
        }
    }
}

/// Pipeline settings that come from [`AppConfig`](crate::config::AppConfig).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostProcessConfig {
    /// Bloom used as the baseline. Its `strength` is what scenes start from.
    pub bloom: BloomSettings,
    pub color_grade: ColorGrade,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CustomPass {
    pub enabled: bool,
    pub params: ParamSet,
}

/// Control surface of a shared post-processing pipeline.
pub trait PostProcessingControlSurface {
    fn set_bloom_strength(&mut self, strength: f32);

    fn enable_depth_of_field(&mut self, enabled: bool);

    fn set_depth_of_field_params(&mut self, focus: f32, aperture: f32, max_blur: f32);

    /// Toggle a named pass. Unknown names register a new, parameterless pass.
    fn enable_custom_pass(&mut self, name: &str, enabled: bool);

    /// Merge `params` into a named pass, registering it if needed.
    fn set_custom_pass_params(&mut self, name: &str, params: &ParamSet);

    fn resize(&mut self, width: u32, height: u32);

    /// Draw the current frame through the pipeline.
    fn render(&mut self, camera: &Camera) -> Result<(), RenderError>;

    /// Current state of every tunable.
    fn settings(&self) -> &PostProcessSettings;

    /// Put the pipeline back to scene-neutral defaults.
    fn reset_to_baseline(&mut self) {
        let strength = self.settings().baseline_bloom;
        let passes: Vec<String> = self.settings().custom_passes.keys().cloned().collect();
        self.set_bloom_strength(strength);
        self.enable_depth_of_field(false);
        for name in &passes {
            self.enable_custom_pass(name, false);
        }
    }
}

/// Plain-data post-processing state.
#[derive(Clone, Debug, PartialEq)]
pub struct PostProcessSettings {
    pub bloom: BloomSettings,
    pub depth_of_field: DepthOfField,
    pub color_grade: ColorGrade,
    pub custom_passes: BTreeMap<String, CustomPass>,
    /// Bloom strength restored by the baseline reset.
    pub baseline_bloom: f32,
    pub width: u32,
    pub height: u32,
    pub frames_rendered: u64,
}

impl PostProcessSettings {
    pub fn new(config: &PostProcessConfig) -> Self {
        let mut custom_passes = BTreeMap::new();
        custom_passes.insert(
            LENSING.to_string(),
            CustomPass {
                enabled: false,
                params: lensing_defaults(),
            },
        );
        Self {
            bloom: config.bloom,
            depth_of_field: DepthOfField::default(),
            color_grade: config.color_grade,
            custom_passes,
            baseline_bloom: config.bloom.strength,
            width: 1,
            height: 1,
            frames_rendered: 0,
        }
    }

    pub fn custom_pass(&self, name: &str) -> Option<&CustomPass> {
        self.custom_passes.get(name)
    }

    pub fn is_pass_enabled(&self, name: &str) -> bool {
        self.custom_passes.get(name).is_some_and(|p| p.enabled)
    }

    /// Names of enabled custom passes.
    pub fn enabled_passes(&self) -> impl Iterator<Item = &str> {
        self.custom_passes
            .iter()
            .filter(|(_, pass)| pass.enabled)
            .map(|(name, _)| name.as_str())
    }

    /// `true` if the pipeline is in its baseline state.
    pub fn is_baseline(&self) -> bool {
        self.bloom.strength == self.baseline_bloom
            && !self.depth_of_field.enabled
            && self.enabled_passes().next().is_none()
    }
}

impl Default for PostProcessSettings {
    fn default() -> Self {
        Self::new(&PostProcessConfig::default())
    }
}

impl PostProcessingControlSurface for PostProcessSettings {
    fn set_bloom_strength(&mut self, strength: f32) {
        self.bloom.strength = strength;
    }

    fn enable_depth_of_field(&mut self, enabled: bool) {
        self.depth_of_field.enabled = enabled;
    }

    fn set_depth_of_field_params(&mut self, focus: f32, aperture: f32, max_blur: f32) {
        self.depth_of_field.focus = focus;
        self.depth_of_field.aperture = aperture;
        self.depth_of_field.max_blur = max_blur;
    }

    fn enable_custom_pass(&mut self, name: &str, enabled: bool) {
        self.custom_passes.entry(name.to_string()).or_default().enabled = enabled;
    }

    fn set_custom_pass_params(&mut self, name: &str, params: &ParamSet) {
        self.custom_passes
            .entry(name.to_string())
            .or_default()
            .params
            .merge(params);
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }

    fn render(&mut self, _camera: &Camera) -> Result<(), RenderError> {
        self.frames_rendered += 1;
        log::trace!(
            "frame {} (bloom {:.2}, dof {}, passes {:?})",
            self.frames_rendered,
            self.bloom.strength,
            self.depth_of_field.enabled,
            self.enabled_passes().collect::<Vec<_>>()
        );
        Ok(())
    }

    fn settings(&self) -> &PostProcessSettings {
        self
    }
}

fn lensing_defaults() -> ParamSet {
    ParamSet::new()
        .with("center", Vec2::new(0.5, 0.5))
        .with("radius", 0.15)
        .with("strength", 0.1)
}
