//! The bundled demo scenes.
//!
//! | Id | Scene | Highlights |
//! |----|-------|------------|
//! | `galaxy` | [`GalaxyScene`] | 100k-particle spiral disc, Keplerian rotation |
//! | `darkmatterflow` | [`DarkMatterFlowScene`] | noise-driven flow with damping |
//! | `quantumstructure` | [`QuantumStructureScene`] | trails, probability cloud, eased collapse |
//! | `quantumentanglement` | [`QuantumEntanglementScene`] | linked pairs, lensing pass |
//!
//! Each scene only uses the public engine API: emitters, trails, the task
//! scheduler and the post-processing surface handed in through
//! [`SceneContext`](crate::scene::SceneContext).

mod dark_matter_flow;
mod galaxy;
mod quantum_entanglement;
mod quantum_structure;

pub use dark_matter_flow::{DarkMatterFlowScene, FlowParams};
pub use galaxy::{GalaxyParams, GalaxyScene};
pub use quantum_entanglement::{EntanglementParams, QuantumEntanglementScene};
pub use quantum_structure::{QuantumParams, QuantumStructureScene};

use crate::error::Result;
use crate::lifecycle::SceneLifecycleController;
use crate::post_process::PostProcessingControlSurface;
use crate::render::RenderResource;

pub const GALAXY: &str = "galaxy";
pub const DARK_MATTER_FLOW: &str = "darkmatterflow";
pub const QUANTUM_STRUCTURE: &str = "quantumstructure";
pub const QUANTUM_ENTANGLEMENT: &str = "quantumentanglement";

/// Register every bundled scene at full size, in menu order.
pub fn register_defaults<R, P>(controller: &mut SceneLifecycleController<R, P>) -> Result<()>
where
    R: RenderResource,
    P: PostProcessingControlSurface,
{
    controller.register(GALAXY, Box::new(GalaxyScene::new()))?;
    controller.register(DARK_MATTER_FLOW, Box::new(DarkMatterFlowScene::new()))?;
    controller.register(QUANTUM_STRUCTURE, Box::new(QuantumStructureScene::new()))?;
    controller.register(QUANTUM_ENTANGLEMENT, Box::new(QuantumEntanglementScene::new()))?;
    Ok(())
}
