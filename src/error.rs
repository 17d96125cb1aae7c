//! Error types for stardrift.
//!
//! Configuration mistakes (bad capacities, duplicate or unknown scene ids)
//! fail fast with [`Error`]. Render backend failures surface as
//! [`RenderError`] and travel up to the
//! [`SceneLifecycleController`](crate::lifecycle::SceneLifecycleController),
//! which logs them and rolls back the handoff.
//!
//! Operations that are routinely called "once too often" during teardown
//! (updating a disposed emitter, updating an unknown trail, ticking with no
//! active scene) are not errors at all and never show up here.

use crate::render::ResourceHandle;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// A particle pool was requested with no room for particles.
    #[error("invalid emitter capacity {capacity}: capacity must be at least 1")]
    InvalidCapacity { capacity: usize },

    /// A scene id was registered twice.
    #[error("scene '{0}' is already registered")]
    DuplicateSceneId(String),

    /// A scene id was looked up but never registered.
    #[error("no scene registered under '{0}'")]
    UnknownSceneId(String),

    /// `update` or `activate` reached a scene after it was disposed.
    #[error("scene '{0}' has been disposed")]
    SceneDisposed(String),

    /// The render backend rejected a request.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Loading or saving configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors reported by a [`RenderResource`](crate::render::RenderResource).
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unknown render handle {0}")]
    UnknownHandle(ResourceHandle),

    #[error("render handle {0} was already released")]
    Released(ResourceHandle),

    #[error("render handle {handle} has no attribute '{name}'")]
    UnknownAttribute { handle: ResourceHandle, name: String },

    #[error("attribute '{name}' expects {expected} floats, got {actual}")]
    AttributeSize {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Backend-specific failure, e.g. an allocation the device refused.
    #[error("render backend error: {0}")]
    Backend(String),
}

/// Errors from reading or writing [`AppConfig`](crate::config::AppConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors that can occur during GPU initialization.
#[derive(Debug, Error)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    #[error("failed to create GPU surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),

    /// No compatible GPU adapter found.
    #[error("no compatible GPU adapter found; a GPU with WebGPU/Vulkan/Metal/DX12 support is required")]
    NoAdapter,

    /// The surface reported no texture formats for the chosen adapter.
    #[error("surface supports no texture formats on this adapter")]
    NoSurfaceFormat,

    /// Failed to create GPU device.
    #[error("failed to create GPU device: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),
}
