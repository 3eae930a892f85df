//! Volumetric AO render passes: VAO, SVAO and the coarse prepass over shared
//! state, the stochastic depth generators they consume, the depth, normal and
//! blur passes around them, and a frame graph wiring them together.
#![forbid(unsafe_code)]

pub mod bilateral_blur;
mod common;
mod error;
pub mod graph;
pub mod lifecycle;
pub mod linearize_depth;
pub mod normals_to_view;
mod pipeline;
pub mod prepass;
pub mod rt_stochastic_depth;
pub mod stochastic_depth;
pub mod svao;
pub mod vao;

pub use bilateral_blur::{BilateralBlur, BilateralBlurConfig};
pub use common::{AoSettings, MIN_ADAPTIVE_SAMPLES, SampleCount, SharedResources, VaoData, dither_pattern, keys};
pub use error::PassError;
pub use graph::{AoGraph, GraphDesc, GraphPass, Source};
pub use lifecycle::{Lifecycle, LifecycleTracker, RecompileReason};
pub use linearize_depth::LinearizeDepth;
pub use normals_to_view::NormalsToViewSpace;
pub use pipeline::{AoPass, AoVariant, ExecuteOutcome};
pub use prepass::PrepassConfig;
pub use rt_stochastic_depth::{RtStochasticDepth, RtStochasticDepthConfig, STOCHASTIC_LAYERS};
pub use stochastic_depth::{StochasticDepthConfig, StochasticDepthStratified};
pub use svao::SvaoConfig;
pub use vao::{PrepassSamplingMode, VaoConfig};

#[cfg(test)]
mod tests;
