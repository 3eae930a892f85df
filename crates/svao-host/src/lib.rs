//! Host render-framework seam: device/context traits, pass reflection,
//! properties and a headless recording backend.
#![forbid(unsafe_code)]

mod error;
mod frame;
pub mod headless;
pub mod program;
pub mod properties;
pub mod reflection;
pub mod resource;
pub mod scene;

pub use error::HostError;
pub use frame::FrameResources;
pub use program::{DefineList, ProgramDesc, ProgramKind, ShaderValue, ShaderVars};
pub use properties::{Properties, PropertyValue};
pub use reflection::{Field, FieldKind, FieldSize, RenderPassReflection};
pub use resource::{
    AddressMode, BindFlags, BufferId, ClearValue, Filter, ProgramId, ResourceFormat, SamplerDesc,
    SamplerId, TextureDesc, TextureId,
};
pub use scene::{Camera, Scene, UpdateFlags};

use svao_geom::Resolution;

/// Data handed to `compile` by the host graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompileData {
    pub default_tex_dims: Resolution,
}

impl CompileData {
    pub fn new(default_tex_dims: Resolution) -> Self {
        Self { default_tex_dims }
    }
}

/// Resource creation.
pub trait Device {
    fn create_texture_2d(
        &mut self,
        desc: &TextureDesc,
        data: Option<&[u8]>,
    ) -> Result<TextureId, HostError>;
    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerId, HostError>;
    /// Read-only structured buffer of 32-bit elements.
    fn create_structured_buffer(&mut self, label: &str, data: &[u32]) -> Result<BufferId, HostError>;
    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, HostError>;
    fn texture_desc(&self, id: TextureId) -> Option<TextureDesc>;
}

/// Command submission. Every call binds a full `ShaderVars` set.
pub trait RenderContext: Device {
    fn clear_texture(&mut self, texture: TextureId, value: ClearValue) -> Result<(), HostError>;
    fn dispatch(
        &mut self,
        program: ProgramId,
        vars: &ShaderVars,
        threads: Resolution,
    ) -> Result<(), HostError>;
    /// Full-screen raster into `target`.
    fn rasterize(
        &mut self,
        program: ProgramId,
        vars: &ShaderVars,
        target: TextureId,
    ) -> Result<(), HostError>;
    fn raytrace(
        &mut self,
        program: ProgramId,
        vars: &ShaderVars,
        launch: Resolution,
    ) -> Result<(), HostError>;
}

/// Per-frame, name-keyed view of the graph's resources.
pub trait RenderData {
    fn texture(&self, name: &str) -> Option<TextureId>;
    fn default_texture_dims(&self) -> Resolution;
}
