//! State and resources shared by every AO variant.

use std::rc::Rc;

use svao_geom::{Float2, Resolution};
use svao_host::{
    CompileData, DefineList, Device, Properties, ResourceFormat, SamplerDesc, SamplerId, Scene,
    ShaderValue, ShaderVars, TextureDesc, TextureId,
};
use svao_sdmath::{DEFAULT_GUARD_BAND_BUDGET, GuardBandSpec, StratifiedTableCache};

use crate::PassError;
use crate::lifecycle::LifecycleTracker;

/// Property keys understood by the AO passes.
pub mod keys {
    pub const RADIUS: &str = "kVaoRadius";
    pub const EXPONENT: &str = "kVaoExponent";
    pub const SAMPLE_COUNT: &str = "kSampleCount";
    pub const RESOLUTION_DIVISOR: &str = "resolutionDivisor";
    pub const ENABLE_GUARD_BAND: &str = "enableGuardBand";
    pub const ENABLE_ADAPTIVE_SAMPLING: &str = "enableAdaptiveSampling";
    pub const ADAPTIVE_SAMPLING_DISTANCES: &str = "adaptiveSamplingDistances";
    pub const ADAPTIVE_SAMPLING_COUNTS: &str = "adaptiveSamplingCounts";
    pub const USE_DITHER_TEXTURE: &str = "useDitherTexture";
    pub const SVAO_INPUT_MODE: &str = "SVAOInputMode";
    pub const USE_RAY_INTERVAL: &str = "useRayInterval";
    pub const USE_PREPASS: &str = "usePrepass";
    pub const PREPASS_SAMPLING_MODE: &str = "prePassSamplingMode";
    pub const AO_THRESHOLD: &str = "aoThreshold";
    pub const ALPHA: &str = "alpha";
    pub const NUM_SAMPLES: &str = "numSamples";

    pub(crate) const COMMON: &[&str] = &[
        RADIUS,
        EXPONENT,
        SAMPLE_COUNT,
        RESOLUTION_DIVISOR,
        ENABLE_GUARD_BAND,
        ENABLE_ADAPTIVE_SAMPLING,
        ADAPTIVE_SAMPLING_DISTANCES,
        ADAPTIVE_SAMPLING_COUNTS,
        USE_DITHER_TEXTURE,
    ];
}

const STATIC_CB: &str = "StaticCB";
const NOISE_SAMPLER: &str = "gNoiseSampler";
const TEXTURE_SAMPLER: &str = "gTextureSampler";
const NOISE_TEX: &str = "gNoiseTex";
pub(crate) const CAMERA: &str = "PerFrameCB.gCamera";
pub(crate) const INV_VIEW: &str = "PerFrameCB.invViewMat";
pub(crate) const FRAME_INDEX: &str = "PerFrameCB.frameIndex";
pub(crate) const GUARD_BAND: &str = "PerFrameCB.guardBand";

/// Adaptive sampling never drops a band below this many directions.
pub const MIN_ADAPTIVE_SAMPLES: u32 = 4;

const MAX_RESOLUTION_DIVISOR: u32 = 4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SampleCount {
    #[default]
    Eight,
    Sixteen,
    ThirtyTwo,
}

impl SampleCount {
    #[inline]
    pub fn get(self) -> u32 {
        match self {
            SampleCount::Eight => 8,
            SampleCount::Sixteen => 16,
            SampleCount::ThirtyTwo => 32,
        }
    }
}

impl TryFrom<u32> for SampleCount {
    type Error = PassError;

    fn try_from(v: u32) -> Result<Self, PassError> {
        match v {
            8 => Ok(SampleCount::Eight),
            16 => Ok(SampleCount::Sixteen),
            32 => Ok(SampleCount::ThirtyTwo),
            _ => Err(PassError::invalid(keys::SAMPLE_COUNT, v, "expected 8, 16 or 32")),
        }
    }
}

/// Parameters common to VAO, SVAO and the prepass.
#[derive(Clone, Debug, PartialEq)]
pub struct AoSettings {
    pub radius: f32,
    pub exponent: f32,
    pub sample_count: SampleCount,
    pub resolution_divisor: u32,
    pub guard_band: bool,
    pub adaptive_sampling: bool,
    /// Ascending view-space distances splitting the adaptive bands.
    pub adaptive_distances: Vec<f32>,
    /// Explicit directions per band, one more entry than `adaptive_distances`.
    /// Empty means counts are derived by halving.
    pub adaptive_counts: Vec<u32>,
    pub use_dither: bool,
}

impl Default for AoSettings {
    fn default() -> Self {
        Self {
            radius: 0.5,
            exponent: 2.0,
            sample_count: SampleCount::Eight,
            resolution_divisor: 4,
            guard_band: true,
            adaptive_sampling: false,
            adaptive_distances: Vec::new(),
            adaptive_counts: Vec::new(),
            use_dither: true,
        }
    }
}

impl AoSettings {
    /// Applies recognised keys. Nothing is committed if any value is invalid.
    /// Returns the keys whose change affects program defines.
    pub fn apply(&mut self, props: &Properties) -> Result<Vec<&'static str>, PassError> {
        let mut next = self.clone();
        if let Some(r) = props.get_f32(keys::RADIUS)? {
            if !r.is_finite() || r < 0.0 {
                return Err(PassError::invalid(keys::RADIUS, r, "must be finite and >= 0"));
            }
            next.radius = r;
        }
        if let Some(e) = props.get_f32(keys::EXPONENT)? {
            if !e.is_finite() || e < 1.0 {
                return Err(PassError::invalid(keys::EXPONENT, e, "must be finite and >= 1"));
            }
            next.exponent = e;
        }
        if let Some(n) = props.get_u32(keys::SAMPLE_COUNT)? {
            next.sample_count = SampleCount::try_from(n)?;
        }
        if let Some(d) = props.get_u32(keys::RESOLUTION_DIVISOR)? {
            next.resolution_divisor = validate_divisor(d)?;
        }
        if let Some(g) = props.get_bool(keys::ENABLE_GUARD_BAND)? {
            next.guard_band = g;
        }
        if let Some(a) = props.get_bool(keys::ENABLE_ADAPTIVE_SAMPLING)? {
            next.adaptive_sampling = a;
        }
        if let Some(d) = props.get_f32_array(keys::ADAPTIVE_SAMPLING_DISTANCES)? {
            validate_distances(&d)?;
            next.adaptive_distances = d;
        }
        if let Some(c) = props.get_u32_array(keys::ADAPTIVE_SAMPLING_COUNTS)? {
            next.adaptive_counts = c;
        }
        if let Some(u) = props.get_bool(keys::USE_DITHER_TEXTURE)? {
            next.use_dither = u;
        }
        validate_counts(&next.adaptive_counts, &next.adaptive_distances)?;

        let mut changed = Vec::new();
        if next.sample_count != self.sample_count {
            changed.push(keys::SAMPLE_COUNT);
        }
        if next.resolution_divisor != self.resolution_divisor {
            changed.push(keys::RESOLUTION_DIVISOR);
        }
        if next.guard_band != self.guard_band {
            changed.push(keys::ENABLE_GUARD_BAND);
        }
        if next.adaptive_sampling != self.adaptive_sampling {
            changed.push(keys::ENABLE_ADAPTIVE_SAMPLING);
        }
        if next.adaptive_distances != self.adaptive_distances {
            changed.push(keys::ADAPTIVE_SAMPLING_DISTANCES);
        }
        if next.adaptive_counts != self.adaptive_counts {
            changed.push(keys::ADAPTIVE_SAMPLING_COUNTS);
        }
        if next.use_dither != self.use_dither {
            changed.push(keys::USE_DITHER_TEXTURE);
        }
        *self = next;
        Ok(changed)
    }

    pub fn write_properties(&self, props: &mut Properties) {
        props
            .set(keys::RADIUS, self.radius)
            .set(keys::EXPONENT, self.exponent)
            .set(keys::SAMPLE_COUNT, self.sample_count.get())
            .set(keys::RESOLUTION_DIVISOR, self.resolution_divisor)
            .set(keys::ENABLE_GUARD_BAND, self.guard_band)
            .set(keys::ENABLE_ADAPTIVE_SAMPLING, self.adaptive_sampling)
            .set(keys::ADAPTIVE_SAMPLING_DISTANCES, self.adaptive_distances.clone())
            .set(keys::ADAPTIVE_SAMPLING_COUNTS, self.adaptive_counts.clone())
            .set(keys::USE_DITHER_TEXTURE, self.use_dither);
    }

    pub fn guard_band_spec(&self) -> Result<GuardBandSpec, PassError> {
        Ok(GuardBandSpec::new(self.resolution_divisor, DEFAULT_GUARD_BAND_BUDGET)?)
    }

    /// Directions per adaptive band, nearest first. Explicit counts win;
    /// otherwise halves per band, never below `MIN_ADAPTIVE_SAMPLES`.
    pub fn adaptive_band_samples(&self) -> Vec<u32> {
        if !self.adaptive_counts.is_empty() {
            return self.adaptive_counts.clone();
        }
        let bands = self.adaptive_distances.len() + 1;
        let mut n = self.sample_count.get();
        let mut out = Vec::with_capacity(bands);
        for _ in 0..bands {
            out.push(n);
            n = (n / 2).max(MIN_ADAPTIVE_SAMPLES);
        }
        out
    }
}

pub(crate) fn validate_divisor(d: u32) -> Result<u32, PassError> {
    if (1..=MAX_RESOLUTION_DIVISOR).contains(&d) {
        Ok(d)
    } else {
        Err(PassError::invalid(keys::RESOLUTION_DIVISOR, d, "expected 1..=4"))
    }
}

fn validate_distances(d: &[f32]) -> Result<(), PassError> {
    let positive = d.iter().all(|v| v.is_finite() && *v > 0.0);
    let ascending = d.windows(2).all(|w| w[0] < w[1]);
    if positive && ascending {
        Ok(())
    } else {
        Err(PassError::invalid(
            keys::ADAPTIVE_SAMPLING_DISTANCES,
            format!("{d:?}"),
            "expected strictly ascending positive distances",
        ))
    }
}

fn validate_counts(counts: &[u32], distances: &[f32]) -> Result<(), PassError> {
    if counts.is_empty() {
        return Ok(());
    }
    if counts.len() != distances.len() + 1 {
        return Err(PassError::invalid(
            keys::ADAPTIVE_SAMPLING_COUNTS,
            format!("{counts:?}"),
            "expected one count per band (distances + 1)",
        ));
    }
    if counts.contains(&0) {
        return Err(PassError::invalid(
            keys::ADAPTIVE_SAMPLING_COUNTS,
            format!("{counts:?}"),
            "every band needs at least one direction",
        ));
    }
    Ok(())
}

/// CPU mirror of the `StaticCB` constant block.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VaoData {
    pub resolution: Float2,
    pub inv_resolution: Float2,
    pub noise_scale: Float2,
    pub radius: f32,
    pub exponent: f32,
    pub sd_guard: f32,
    pub low_resolution: Float2,
    pub ao_resolution: Float2,
    pub ao_inv_resolution: Float2,
}

impl VaoData {
    pub fn bind(&self, vars: &mut ShaderVars) {
        let f2 = |name: &str| format!("{STATIC_CB}.{name}");
        vars.set(f2("resolution"), ShaderValue::Float2(self.resolution))
            .set(f2("invResolution"), ShaderValue::Float2(self.inv_resolution))
            .set(f2("noiseScale"), ShaderValue::Float2(self.noise_scale))
            .set(f2("radius"), ShaderValue::Float(self.radius))
            .set(f2("exponent"), ShaderValue::Float(self.exponent))
            .set(f2("sdGuard"), ShaderValue::Float(self.sd_guard))
            .set(f2("lowResolution"), ShaderValue::Float2(self.low_resolution))
            .set(f2("aoResolution"), ShaderValue::Float2(self.ao_resolution))
            .set(f2("aoInvResolution"), ShaderValue::Float2(self.ao_inv_resolution));
    }
}

/// 4x4 ordered-dither matrix scaled to bytes.
pub fn dither_pattern() -> [u8; 16] {
    const BAYER: [f32; 16] = [
        0.0, 8.0, 2.0, 10.0, //
        12.0, 4.0, 14.0, 6.0, //
        3.0, 11.0, 1.0, 9.0, //
        15.0, 7.0, 13.0, 5.0,
    ];
    BAYER.map(|v| (v / 16.0 * 255.0) as u8)
}

/// Samplers and noise texture, created once per pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SharedResources {
    pub point_sampler: SamplerId,
    pub linear_sampler: SamplerId,
    pub dither: TextureId,
}

impl SharedResources {
    pub fn create<D: Device + ?Sized>(device: &mut D) -> Result<Self, PassError> {
        let point_sampler = device.create_sampler(&SamplerDesc::POINT_WRAP)?;
        let linear_sampler = device.create_sampler(&SamplerDesc::LINEAR_CLAMP)?;
        let desc = TextureDesc::new_2d(Resolution::new(4, 4), ResourceFormat::R8Unorm);
        let dither = device.create_texture_2d(&desc, Some(&dither_pattern()))?;
        Ok(Self {
            point_sampler,
            linear_sampler,
            dither,
        })
    }
}

/// Everything VAO, SVAO and the prepass have in common.
pub struct AoCommonState {
    pub(crate) settings: AoSettings,
    pub(crate) data: VaoData,
    pub(crate) lifecycle: LifecycleTracker,
    pub(crate) scene: Option<Rc<dyn Scene>>,
    pub(crate) frame_index: u32,
    pub(crate) compile_data: Option<CompileData>,
    pub(crate) shared: SharedResources,
    pub(crate) tables: StratifiedTableCache,
    pub(crate) stoch_map_size: Resolution,
    pub(crate) extra_guard_band: u32,
}

impl AoCommonState {
    pub(crate) fn new(
        pass: &'static str,
        settings: AoSettings,
        shared: SharedResources,
    ) -> Self {
        Self {
            settings,
            data: VaoData::default(),
            lifecycle: LifecycleTracker::new(pass),
            scene: None,
            frame_index: 0,
            compile_data: None,
            shared,
            tables: StratifiedTableCache::new(),
            stoch_map_size: Resolution::default(),
            extra_guard_band: 0,
        }
    }

    /// Recomputes the `StaticCB` mirror and the guard-banded map size.
    pub(crate) fn update_derived(&mut self, dims: Resolution) -> Result<(), PassError> {
        let spec = self.settings.guard_band_spec()?;
        self.stoch_map_size = spec.map_size(dims, self.settings.guard_band)?;
        self.extra_guard_band = if self.settings.guard_band {
            spec.extra_guard_band()
        } else {
            0
        };
        let res = dims.as_float2();
        self.data.resolution = res;
        self.data.inv_resolution = res.recip();
        self.data.noise_scale = res / 4.0;
        self.data.radius = self.settings.radius;
        self.data.exponent = self.settings.exponent;
        self.data.sd_guard = self.extra_guard_band as f32;
        self.data.low_resolution = spec.map_size(dims, false)?.as_float2();
        self.data.ao_resolution = res;
        self.data.ao_inv_resolution = res.recip();
        Ok(())
    }

    /// Scene defines plus the ray-cone, direction and sampling switches.
    pub(crate) fn common_defines(&self, scene: &dyn Scene, dims: Resolution) -> DefineList {
        let mut defines = scene.scene_defines();
        let spread = scene.camera().pixel_spread_angle(dims.height);
        defines
            .add("RAY_CONE_SPREAD", spread)
            .add("NUM_DIRECTIONS", self.settings.sample_count.get())
            .add("USE_DITHER_TEXTURE", u32::from(self.settings.use_dither));
        if self.settings.adaptive_sampling {
            let bands = self.settings.adaptive_band_samples();
            let counts: Vec<String> = bands.iter().map(u32::to_string).collect();
            defines
                .add("ADAPTIVE_SAMPLING", 1)
                .add("ADAPTIVE_BAND_COUNT", bands.len())
                .add("ADAPTIVE_SAMPLE_COUNTS", counts.join(","));
        } else {
            defines.add("ADAPTIVE_SAMPLING", 0);
        }
        defines
    }

    pub(crate) fn bind_common_vars(&self, vars: &mut ShaderVars, scene: &dyn Scene, frame_index: u32) {
        self.data.bind(vars);
        vars.set(NOISE_SAMPLER, ShaderValue::Sampler(self.shared.point_sampler))
            .set(TEXTURE_SAMPLER, ShaderValue::Sampler(self.shared.linear_sampler))
            .set(NOISE_TEX, ShaderValue::Texture(self.shared.dither));
        let camera = scene.camera();
        camera.bind(vars, CAMERA);
        vars.set(INV_VIEW, ShaderValue::Mat4(camera.inverse_view()))
            .set(FRAME_INDEX, ShaderValue::Uint(frame_index));
        if self.settings.adaptive_sampling {
            vars.set(
                format!("{STATIC_CB}.adaptiveDistances"),
                ShaderValue::FloatArray(self.settings.adaptive_distances.clone()),
            );
        }
    }
}
