//! Coarse 1/8-resolution AO estimate used by VAO to skip unoccluded pixels.

use svao_geom::Resolution;
use svao_host::{
    BindFlags, ClearValue, DefineList, ProgramDesc, ProgramId, Properties, RenderContext,
    RenderData, RenderPassReflection, ResourceFormat, ShaderValue, ShaderVars, TextureId,
};
use svao_sdmath::{compute_stochastic_map_size, dispatch_extent};

use crate::PassError;
use crate::common::{AoCommonState, GUARD_BAND, keys};

pub const SHADER: &str = "RenderPasses/SVAO/VAOPrepass/VAOPrepass.ps.slang";

/// The prepass always runs at 1/8 of the target resolution.
pub const PREPASS_DIVISOR: u32 = 8;
pub const PREPASS_DIRECTIONS: u32 = 8;

pub const LINEAR_DEPTH_IN: &str = "linearDepthIn";
pub const NORMAL_VIEW_IN: &str = "normalViewIn";
pub const AO_MASK_OUT: &str = "aoMaskOut";

const G_LINEAR_DEPTH_IN: &str = "gLinearDepthIn";
const G_NORMAL_IN: &str = "gNormalIn";
const G_AO_MASK_OUT: &str = "gAOMaskOut";
const G_AO_THRESHOLD: &str = "StaticCB.gAOThreshold";

#[derive(Clone, Debug, PartialEq)]
pub struct PrepassConfig {
    pub ao_threshold: f32,
}

impl Default for PrepassConfig {
    fn default() -> Self {
        Self { ao_threshold: 0.1 }
    }
}

pub(crate) struct PrepassFrame {
    linear_depth: TextureId,
    normals: TextureId,
    mask_out: TextureId,
}

/// Size of the coarse mask for a full-resolution target.
pub fn mask_size(dims: Resolution) -> Result<Resolution, PassError> {
    Ok(compute_stochastic_map_size(dims, false, PREPASS_DIVISOR, 0)?)
}

impl PrepassConfig {
    pub(crate) const KEYS: &'static [&'static str] = &[keys::AO_THRESHOLD];

    pub(crate) fn apply(&mut self, props: &Properties) -> Result<(), PassError> {
        if let Some(t) = props.get_f32(keys::AO_THRESHOLD)? {
            if !(0.0..=1.0).contains(&t) {
                return Err(PassError::invalid(keys::AO_THRESHOLD, t, "expected 0..=1"));
            }
            self.ao_threshold = t;
        }
        Ok(())
    }

    pub(crate) fn write_properties(&self, props: &mut Properties) {
        props.set(keys::AO_THRESHOLD, self.ao_threshold);
    }

    /// Overrides the full-resolution constants with the coarse mask extent.
    pub(crate) fn update_derived(&self, common: &mut AoCommonState, dims: Resolution) -> Result<(), PassError> {
        let ao_res = mask_size(dims)?.as_float2();
        common.data.ao_resolution = ao_res;
        common.data.ao_inv_resolution = ao_res.recip();
        common.data.sd_guard = 0.0;
        common.data.low_resolution = svao_geom::Float2::ZERO;
        common.data.noise_scale = ao_res / 4.0;
        Ok(())
    }

    pub(crate) fn reflect(&self, dims: Resolution) -> Result<RenderPassReflection, PassError> {
        let mut r = RenderPassReflection::new();
        r.add_input(LINEAR_DEPTH_IN, "Linear Depth");
        r.add_input(NORMAL_VIEW_IN, "Normal texture in view space (Uncompressed)");
        r.add_output(AO_MASK_OUT, "AOMask")
            .bind_flags(BindFlags::ALL_COLOR_VIEWS)
            .texture_2d(mask_size(dims)?)
            .format(ResourceFormat::R8Unorm);
        Ok(r)
    }

    pub(crate) fn program(&self, mut defines: DefineList) -> ProgramDesc {
        defines
            .add("SECONDARY_DEPTH_MODE", 0)
            .add("USE_RAY_INTERVAL", 0)
            .add("ADAPTIVE_SAMPLING", 0)
            .add("NUM_DIRECTIONS", PREPASS_DIRECTIONS);
        defines.remove("ADAPTIVE_BAND_COUNT");
        defines.remove("ADAPTIVE_SAMPLE_COUNTS");
        ProgramDesc::compute(SHADER, defines)
    }

    pub(crate) fn resolve(&self, data: &dyn RenderData) -> Result<PrepassFrame, &'static str> {
        let get = |name: &'static str| data.texture(name).ok_or(name);
        Ok(PrepassFrame {
            linear_depth: get(LINEAR_DEPTH_IN)?,
            normals: get(NORMAL_VIEW_IN)?,
            mask_out: get(AO_MASK_OUT)?,
        })
    }

    pub(crate) fn record<C: RenderContext + ?Sized>(
        &self,
        ctx: &mut C,
        program: ProgramId,
        frame: &PrepassFrame,
        mut vars: ShaderVars,
        dims: Resolution,
    ) -> Result<Resolution, PassError> {
        ctx.clear_texture(frame.mask_out, ClearValue::splat_f32(1.0))?;
        vars.set(GUARD_BAND, ShaderValue::Int(0))
            .set(G_AO_THRESHOLD, ShaderValue::Float(self.ao_threshold))
            .set(G_LINEAR_DEPTH_IN, ShaderValue::Texture(frame.linear_depth))
            .set(G_NORMAL_IN, ShaderValue::Texture(frame.normals))
            .set(G_AO_MASK_OUT, ShaderValue::Texture(frame.mask_out));
        let threads = dispatch_extent(mask_size(dims)?)?;
        ctx.dispatch(program, &vars, threads)?;
        Ok(threads)
    }
}
