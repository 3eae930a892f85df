//! Secondary refinement pass: re-tests the directions the primary pass marked
//! as unresolved against the ray-traced stochastic depth map, updating AO in
//! place.

use svao_geom::Resolution;
use svao_host::{
    BindFlags, BufferId, DefineList, Device, ProgramDesc, ProgramId, RenderContext, RenderData,
    RenderPassReflection, ShaderValue, ShaderVars, TextureId,
};
use svao_sdmath::dispatch_extent;

use crate::PassError;
use crate::common::{AoCommonState, GUARD_BAND};
use crate::rt_stochastic_depth::STOCHASTIC_LAYERS;

pub const SHADER: &str = "RenderPasses/SVAO/SVAO/SVAORaster2.ps.slang";

pub const LINEAR_DEPTH_IN: &str = "linearDepthIn";
pub const STOCH_DEPTH_IN: &str = "stochDepthIn";
pub const NORMAL_VIEW_IN: &str = "normalViewIn";
pub const AO_MASK_IN: &str = "aoMaskIn";
pub const AO_IN_OUT: &str = "aoInOut";

const G_LINEAR_DEPTH_IN: &str = "gLinearDepthIn";
const G_LINEAR_SD_IN: &str = "gLinearSDIn";
const G_NORMAL_IN: &str = "gNormalIn";
const G_AO_MASK_IN: &str = "gAOMaskIn";
const G_AO_IN_OUT: &str = "gAOInOut";
const G_STRATIFIED_INDICES: &str = "gStratifiedIndices";
const G_STRATIFIED_LOOKUP: &str = "gStratifiedLookUp";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SvaoConfig {
    tables: Option<(BufferId, BufferId)>,
}

pub(crate) struct SvaoFrame {
    linear_depth: TextureId,
    stoch_depth: TextureId,
    normals: TextureId,
    mask_in: TextureId,
    ao: TextureId,
}

impl SvaoConfig {
    pub(crate) fn reflect(&self) -> RenderPassReflection {
        let mut r = RenderPassReflection::new();
        r.add_input(LINEAR_DEPTH_IN, "Linear Depth");
        r.add_input(STOCH_DEPTH_IN, "Stochastic Normalized Depth");
        r.add_input(NORMAL_VIEW_IN, "Normal texture in view space (Uncompressed)");
        r.add_input(AO_MASK_IN, "AOMask from first VAO pass");
        r.add_input_output(AO_IN_OUT, "Ambient occlusion UAV")
            .bind_flags(BindFlags::ALL_COLOR_VIEWS);
        r
    }

    pub(crate) fn program(&self, mut defines: DefineList) -> ProgramDesc {
        defines
            .add("SECONDARY_DEPTH_MODE", 1)
            .add("STOCHASTIC_DEPTH_SAMPLES", STOCHASTIC_LAYERS);
        ProgramDesc::compute(SHADER, defines)
    }

    /// Uploads the layer-compaction tables when the layer count changes.
    pub(crate) fn prepare<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        common: &mut AoCommonState,
    ) -> Result<(), PassError> {
        let (table, rebuilt) = common.tables.ensure(STOCHASTIC_LAYERS)?;
        if rebuilt || self.tables.is_none() {
            let indices = device.create_structured_buffer(G_STRATIFIED_INDICES, table.indices())?;
            let lookup = device.create_structured_buffer(G_STRATIFIED_LOOKUP, table.lookup())?;
            self.tables = Some((indices, lookup));
        }
        Ok(())
    }

    pub(crate) fn resolve(&self, data: &dyn RenderData) -> Result<SvaoFrame, &'static str> {
        let get = |name: &'static str| data.texture(name).ok_or(name);
        Ok(SvaoFrame {
            linear_depth: get(LINEAR_DEPTH_IN)?,
            stoch_depth: get(STOCH_DEPTH_IN)?,
            normals: get(NORMAL_VIEW_IN)?,
            mask_in: get(AO_MASK_IN)?,
            ao: get(AO_IN_OUT)?,
        })
    }

    pub(crate) fn record<C: RenderContext + ?Sized>(
        &self,
        ctx: &mut C,
        common: &AoCommonState,
        program: ProgramId,
        frame: &SvaoFrame,
        mut vars: ShaderVars,
        dims: Resolution,
    ) -> Result<Resolution, PassError> {
        vars.set(G_LINEAR_DEPTH_IN, ShaderValue::Texture(frame.linear_depth))
            .set(G_LINEAR_SD_IN, ShaderValue::Texture(frame.stoch_depth))
            .set(G_NORMAL_IN, ShaderValue::Texture(frame.normals))
            .set(G_AO_MASK_IN, ShaderValue::Texture(frame.mask_in))
            .set(G_AO_IN_OUT, ShaderValue::Texture(frame.ao))
            .set(GUARD_BAND, ShaderValue::Int(common.extra_guard_band as i32));
        if let Some((indices, lookup)) = self.tables {
            vars.set(G_STRATIFIED_INDICES, ShaderValue::Buffer(indices))
                .set(G_STRATIFIED_LOOKUP, ShaderValue::Buffer(lookup));
        }
        let threads = dispatch_extent(dims)?;
        ctx.dispatch(program, &vars, threads)?;
        Ok(threads)
    }
}
