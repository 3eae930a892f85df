//! Primary full-resolution VAO pass.
//!
//! Optionally reads the coarse prepass mask to skip unoccluded pixels, writes
//! the per-pixel direction mask consumed by SVAO, and records per-texel ray
//! intervals for the ray-traced stochastic depth pass.

use svao_geom::Resolution;
use svao_host::{
    BindFlags, ClearValue, DefineList, ProgramDesc, ProgramId, Properties, RenderContext,
    RenderData, RenderPassReflection, ResourceFormat, ShaderValue, ShaderVars, TextureId,
};
use svao_sdmath::{compute_stochastic_map_size, dispatch_extent};

use crate::PassError;
use crate::common::{AoCommonState, GUARD_BAND, keys};
use crate::prepass::PREPASS_DIVISOR;

pub const SHADER: &str = "RenderPasses/SVAO/SVAORaster.ps.slang";

pub const LINEAR_DEPTH_IN: &str = "linearDepthIn";
pub const NORMAL_VIEW_IN: &str = "normalViewIn";
pub const AO_PREPASS_IN: &str = "aoPrepassIn";
pub const AO_OUT: &str = "aoOut";
pub const AO_MASK_OUT: &str = "aoMaskOut";
pub const RAY_MIN_OUT: &str = "rayMinOut";
pub const RAY_MAX_OUT: &str = "rayMaxOut";

const G_LINEAR_DEPTH_IN: &str = "gLinearDepthIn";
const G_NORMAL_IN: &str = "gNormalIn";
const G_AO_PREPASS_IN: &str = "gAOPrepassIn";
const G_AO_OUT: &str = "gAOOut";
const G_AO_MASK_OUT: &str = "gAOMaskOut";
const G_RAY_MIN_OUT: &str = "gRayMinOut";
const G_RAY_MAX_OUT: &str = "gRayMaxOut";

/// Initial ray-interval bounds: `rayMin` starts at +inf (as raw bits so an
/// atomic integer min works on positive floats), `rayMax` at zero.
pub const RAY_MIN_CLEAR: i32 = f32::INFINITY.to_bits() as i32;
pub const RAY_MAX_CLEAR: i32 = 0;

/// How the prepass mask is sampled when deciding to skip a pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PrepassSamplingMode {
    /// Nearest coarse texel only.
    Griddy,
    /// Filtered lookup across neighbouring coarse texels.
    #[default]
    Careful,
}

impl PrepassSamplingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PrepassSamplingMode::Griddy => "Griddy",
            PrepassSamplingMode::Careful => "Careful",
        }
    }

    fn define_value(self) -> u32 {
        match self {
            PrepassSamplingMode::Griddy => 0,
            PrepassSamplingMode::Careful => 1,
        }
    }
}

impl std::str::FromStr for PrepassSamplingMode {
    type Err = PassError;

    fn from_str(s: &str) -> Result<Self, PassError> {
        match s {
            "Griddy" => Ok(PrepassSamplingMode::Griddy),
            "Careful" => Ok(PrepassSamplingMode::Careful),
            other => Err(PassError::invalid(
                keys::PREPASS_SAMPLING_MODE,
                other,
                "expected Griddy or Careful",
            )),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VaoConfig {
    pub svao_input_mode: bool,
    pub use_ray_interval: bool,
    pub use_prepass: bool,
    pub prepass_sampling: PrepassSamplingMode,
}

pub(crate) struct VaoFrame {
    linear_depth: TextureId,
    normals: TextureId,
    prepass: Option<TextureId>,
    ao_out: TextureId,
    mask_out: Option<TextureId>,
    ray_bounds: Option<(TextureId, TextureId)>,
}

impl VaoConfig {
    pub(crate) const KEYS: &'static [&'static str] = &[
        keys::SVAO_INPUT_MODE,
        keys::USE_RAY_INTERVAL,
        keys::USE_PREPASS,
        keys::PREPASS_SAMPLING_MODE,
    ];

    pub(crate) fn apply(&mut self, props: &Properties) -> Result<Vec<&'static str>, PassError> {
        let mut next = self.clone();
        if let Some(v) = props.get_bool(keys::SVAO_INPUT_MODE)? {
            next.svao_input_mode = v;
        }
        if let Some(v) = props.get_bool(keys::USE_RAY_INTERVAL)? {
            next.use_ray_interval = v;
        }
        if let Some(v) = props.get_bool(keys::USE_PREPASS)? {
            next.use_prepass = v;
        }
        if let Some(s) = props.get_str(keys::PREPASS_SAMPLING_MODE)? {
            next.prepass_sampling = s.parse()?;
        }
        let mut changed = Vec::new();
        if next.svao_input_mode != self.svao_input_mode {
            changed.push(keys::SVAO_INPUT_MODE);
        }
        if next.use_ray_interval != self.use_ray_interval {
            changed.push(keys::USE_RAY_INTERVAL);
        }
        if next.use_prepass != self.use_prepass {
            changed.push(keys::USE_PREPASS);
        }
        if next.prepass_sampling != self.prepass_sampling {
            changed.push(keys::PREPASS_SAMPLING_MODE);
        }
        *self = next;
        Ok(changed)
    }

    pub(crate) fn write_properties(&self, props: &mut Properties) {
        props
            .set(keys::SVAO_INPUT_MODE, self.svao_input_mode)
            .set(keys::USE_RAY_INTERVAL, self.use_ray_interval)
            .set(keys::USE_PREPASS, self.use_prepass)
            .set(keys::PREPASS_SAMPLING_MODE, self.prepass_sampling.as_str());
    }

    pub(crate) fn reflect(
        &self,
        common: &AoCommonState,
        dims: Resolution,
    ) -> Result<RenderPassReflection, PassError> {
        let mut r = RenderPassReflection::new();
        r.add_input(LINEAR_DEPTH_IN, "Linear Depth");
        r.add_input(NORMAL_VIEW_IN, "Normal texture in view space (Uncompressed)");
        if self.use_prepass {
            let coarse = compute_stochastic_map_size(dims, false, PREPASS_DIVISOR, 0)?;
            r.add_input(AO_PREPASS_IN, "Coarse AO mask from the prepass")
                .format(ResourceFormat::R8Unorm)
                .texture_2d(coarse);
        }
        r.add_output(AO_OUT, "Result AO")
            .format(ResourceFormat::R8Unorm)
            .bind_flags(BindFlags::ALL_COLOR_VIEWS);
        if self.svao_input_mode {
            r.add_output(AO_MASK_OUT, "Per-direction occlusion mask for SVAO")
                .format(ResourceFormat::R32Uint)
                .bind_flags(BindFlags::ALL_COLOR_VIEWS);
        }
        if self.use_ray_interval {
            let map = common.settings.guard_band_spec()?.map_size(dims, common.settings.guard_band)?;
            r.add_output(RAY_MIN_OUT, "Ray interval start per stochastic-map texel")
                .format(ResourceFormat::R32Int)
                .bind_flags(BindFlags::ALL_COLOR_VIEWS)
                .texture_2d(map);
            r.add_output(RAY_MAX_OUT, "Ray interval end per stochastic-map texel")
                .format(ResourceFormat::R32Int)
                .bind_flags(BindFlags::ALL_COLOR_VIEWS)
                .texture_2d(map);
        }
        Ok(r)
    }

    pub(crate) fn program(&self, mut defines: DefineList) -> ProgramDesc {
        defines
            .add("SECONDARY_DEPTH_MODE", 0)
            .add("SVAO_INPUT_MODE", u32::from(self.svao_input_mode))
            .add("USE_RAY_INTERVAL", u32::from(self.use_ray_interval))
            .add("USE_PREPASS", u32::from(self.use_prepass))
            .add("PREPASS_SAMPLING_MODE", self.prepass_sampling.define_value());
        ProgramDesc::compute(SHADER, defines)
    }

    pub(crate) fn resolve(&self, data: &dyn RenderData) -> Result<VaoFrame, &'static str> {
        let get = |name: &'static str| data.texture(name).ok_or(name);
        Ok(VaoFrame {
            linear_depth: get(LINEAR_DEPTH_IN)?,
            normals: get(NORMAL_VIEW_IN)?,
            prepass: if self.use_prepass {
                Some(get(AO_PREPASS_IN)?)
            } else {
                None
            },
            ao_out: get(AO_OUT)?,
            mask_out: if self.svao_input_mode {
                Some(get(AO_MASK_OUT)?)
            } else {
                None
            },
            ray_bounds: if self.use_ray_interval {
                Some((get(RAY_MIN_OUT)?, get(RAY_MAX_OUT)?))
            } else {
                None
            },
        })
    }

    pub(crate) fn record<C: RenderContext + ?Sized>(
        &self,
        ctx: &mut C,
        common: &AoCommonState,
        program: ProgramId,
        frame: &VaoFrame,
        mut vars: ShaderVars,
        dims: Resolution,
    ) -> Result<Resolution, PassError> {
        ctx.clear_texture(frame.ao_out, ClearValue::splat_f32(1.0))?;
        if let Some((min, max)) = frame.ray_bounds {
            ctx.clear_texture(min, ClearValue::Int([RAY_MIN_CLEAR; 4]))?;
            ctx.clear_texture(max, ClearValue::Int([RAY_MAX_CLEAR; 4]))?;
            vars.set(G_RAY_MIN_OUT, ShaderValue::Texture(min))
                .set(G_RAY_MAX_OUT, ShaderValue::Texture(max));
        }
        vars.set(G_LINEAR_DEPTH_IN, ShaderValue::Texture(frame.linear_depth))
            .set(G_NORMAL_IN, ShaderValue::Texture(frame.normals))
            .set(G_AO_OUT, ShaderValue::Texture(frame.ao_out))
            .set(GUARD_BAND, ShaderValue::Int(common.extra_guard_band as i32));
        if let Some(mask) = frame.mask_out {
            vars.set(G_AO_MASK_OUT, ShaderValue::Texture(mask));
        }
        if let Some(coarse) = frame.prepass {
            vars.set(G_AO_PREPASS_IN, ShaderValue::Texture(coarse));
        }
        let threads = dispatch_extent(dims)?;
        ctx.dispatch(program, &vars, threads)?;
        Ok(threads)
    }
}
