//! Rasterized stratified stochastic depth: `numSamples` depth layers per
//! texel, with the coverage mask compacted through the stratified tables.

use std::rc::Rc;

use svao_host::{
    BindFlags, BufferId, ClearValue, CompileData, Device, ProgramDesc,
    ProgramId, Properties, RenderContext, RenderData, RenderPassReflection, ResourceFormat,
    SamplerDesc, SamplerId, Scene, ShaderValue, ShaderVars, UpdateFlags,
};
use svao_sdmath::{DEFAULT_GUARD_BAND_BUDGET, GuardBandSpec, MAX_TABLE_SAMPLE_COUNT, StratifiedTableCache};

use crate::PassError;
use crate::common::{keys, validate_divisor};
use crate::lifecycle::{Lifecycle, LifecycleTracker, RecompileReason};
use crate::pipeline::{ExecuteOutcome, skip_frame, warn_unknown_keys};

pub const SHADER: &str =
    "RenderPasses/StochasticDepthStratfield/StochasticDepthStratfieldPass.3d.slang";

pub const DEPTH_IN: &str = "depthTexture";
pub const STOCHASTIC_DEPTH_OUT: &str = "stochasticDepth";

const MIN_SAMPLES: u32 = 4;
/// Each layer count needs a `2^n` lookup table, so the property stops at the
/// largest table the indexer builds.
const MAX_SAMPLES: u32 = MAX_TABLE_SAMPLE_COUNT;

const KEYS: &[&str] = &[
    keys::ALPHA,
    keys::NUM_SAMPLES,
    keys::RESOLUTION_DIVISOR,
    keys::ENABLE_GUARD_BAND,
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StochasticDepthConfig {
    /// Per-layer transmittance used for the stochastic coverage test.
    pub alpha: f32,
    pub num_samples: u32,
    pub resolution_divisor: u32,
    pub guard_band: bool,
}

impl Default for StochasticDepthConfig {
    fn default() -> Self {
        Self {
            alpha: 0.2,
            num_samples: 8,
            resolution_divisor: 4,
            guard_band: false,
        }
    }
}

impl StochasticDepthConfig {
    fn apply(&mut self, props: &Properties) -> Result<Vec<&'static str>, PassError> {
        let mut next = *self;
        if let Some(a) = props.get_f32(keys::ALPHA)? {
            if !(0.1..=1.0).contains(&a) {
                return Err(PassError::invalid(keys::ALPHA, a, "expected 0.1..=1.0"));
            }
            next.alpha = a;
        }
        if let Some(n) = props.get_u32(keys::NUM_SAMPLES)? {
            if !(MIN_SAMPLES..=MAX_SAMPLES).contains(&n) {
                return Err(PassError::invalid(keys::NUM_SAMPLES, n, "expected 4..=20"));
            }
            next.num_samples = n;
        }
        if let Some(d) = props.get_u32(keys::RESOLUTION_DIVISOR)? {
            next.resolution_divisor = validate_divisor(d)?;
        }
        if let Some(g) = props.get_bool(keys::ENABLE_GUARD_BAND)? {
            next.guard_band = g;
        }
        let mut changed = Vec::new();
        if next.alpha != self.alpha {
            changed.push(keys::ALPHA);
        }
        if next.num_samples != self.num_samples {
            changed.push(keys::NUM_SAMPLES);
        }
        if next.resolution_divisor != self.resolution_divisor {
            changed.push(keys::RESOLUTION_DIVISOR);
        }
        if next.guard_band != self.guard_band {
            changed.push(keys::ENABLE_GUARD_BAND);
        }
        *self = next;
        Ok(changed)
    }
}

pub struct StochasticDepthStratified {
    config: StochasticDepthConfig,
    lifecycle: LifecycleTracker,
    scene: Option<Rc<dyn Scene>>,
    program: Option<ProgramId>,
    compile_data: Option<CompileData>,
    sampler: SamplerId,
    tables: StratifiedTableCache,
    buffers: Option<(BufferId, BufferId)>,
    frame_index: u32,
}

impl StochasticDepthStratified {
    pub const NAME: &'static str = "StochasticDepthStratified";

    pub fn new<D: Device + ?Sized>(device: &mut D, props: &Properties) -> Result<Self, PassError> {
        let sampler = device.create_sampler(&SamplerDesc::POINT_CLAMP)?;
        let mut pass = Self {
            config: StochasticDepthConfig::default(),
            lifecycle: LifecycleTracker::new(Self::NAME),
            scene: None,
            program: None,
            compile_data: None,
            sampler,
            tables: StratifiedTableCache::new(),
            buffers: None,
            frame_index: 0,
        };
        pass.apply_properties(props)?;
        Ok(pass)
    }

    pub fn config(&self) -> StochasticDepthConfig {
        self.config
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.state()
    }

    pub fn compile_count(&self) -> u64 {
        self.lifecycle.compiles()
    }

    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    /// Lookup tables built so far.
    pub fn table_builds(&self) -> u64 {
        self.tables.builds()
    }

    pub fn apply_properties(&mut self, props: &Properties) -> Result<(), PassError> {
        warn_unknown_keys(Self::NAME, props, &[KEYS]);
        for key in self.config.apply(props)? {
            self.lifecycle.invalidate(RecompileReason::ParameterChanged(key));
        }
        Ok(())
    }

    pub fn properties(&self) -> Properties {
        Properties::new()
            .with(keys::ALPHA, self.config.alpha)
            .with(keys::NUM_SAMPLES, self.config.num_samples)
            .with(keys::RESOLUTION_DIVISOR, self.config.resolution_divisor)
            .with(keys::ENABLE_GUARD_BAND, self.config.guard_band)
    }

    pub fn set_scene(&mut self, scene: Option<Rc<dyn Scene>>) {
        self.program = None;
        self.scene = scene;
        if self.scene.is_some() {
            self.lifecycle.attach_scene();
        } else {
            self.lifecycle.detach_scene();
        }
    }

    pub fn reflect(&self, compile_data: &CompileData) -> Result<RenderPassReflection, PassError> {
        let spec = GuardBandSpec::new(self.config.resolution_divisor, DEFAULT_GUARD_BAND_BUDGET)?;
        let size = spec.map_size(compile_data.default_tex_dims, self.config.guard_band)?;
        let mut r = RenderPassReflection::new();
        r.add_input(DEPTH_IN, "Depth Texture");
        r.add_output(STOCHASTIC_DEPTH_OUT, "Stochastic Depth")
            .format(ResourceFormat::D32Float)
            .bind_flags(BindFlags::ALL_DEPTH_VIEWS)
            .texture_2d(size)
            .array_size(self.config.num_samples);
        Ok(r)
    }

    pub fn compile<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        compile_data: &CompileData,
    ) -> Result<(), PassError> {
        if let Some(prev) = self.compile_data {
            if prev != *compile_data {
                self.lifecycle.invalidate(RecompileReason::ResolutionChanged {
                    from: prev.default_tex_dims,
                    to: compile_data.default_tex_dims,
                });
            }
        }
        self.compile_data = Some(*compile_data);

        let (table, rebuilt) = self.tables.ensure(self.config.num_samples)?;
        if rebuilt || self.buffers.is_none() {
            let indices = device.create_structured_buffer("gStratifiedIndices", table.indices())?;
            let lookup = device.create_structured_buffer("gStratifiedLookUp", table.lookup())?;
            self.buffers = Some((indices, lookup));
        }

        let Some(scene) = self.scene.clone() else {
            return Ok(());
        };
        if !self.lifecycle.needs_compile() {
            return Ok(());
        }
        let mut defines = scene.scene_defines();
        defines
            .add("ALPHA", self.config.alpha)
            .add("NUM_SAMPLES", self.config.num_samples);
        let desc = ProgramDesc::raster(SHADER, defines);
        self.program = Some(device.create_program(&desc)?);
        self.lifecycle.mark_compiled();
        log::debug!(target: "passes", "{}: compiled with {} samples", Self::NAME, self.config.num_samples);
        Ok(())
    }

    pub fn execute<C: RenderContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        data: &dyn RenderData,
    ) -> Result<ExecuteOutcome, PassError> {
        if self
            .scene
            .as_ref()
            .is_some_and(|s| s.updates().contains(UpdateFlags::RECOMPILE_NEEDED))
        {
            self.lifecycle.invalidate(RecompileReason::SceneRequested);
        }
        let Some(depth) = data.texture(DEPTH_IN) else {
            return Ok(skip_frame(Self::NAME, DEPTH_IN));
        };
        let Some(out) = data.texture(STOCHASTIC_DEPTH_OUT) else {
            return Ok(skip_frame(Self::NAME, STOCHASTIC_DEPTH_OUT));
        };
        ctx.clear_texture(out, ClearValue::splat_f32(1.0))?;
        let Some(scene) = self.scene.clone() else {
            return Ok(ExecuteOutcome::Detached);
        };
        let dims = data.default_texture_dims();
        self.compile(ctx, &CompileData::new(dims))?;
        let (Some(program), Some((indices, lookup))) = (self.program, self.buffers) else {
            return Ok(ExecuteOutcome::Detached);
        };

        let depth_size = ctx
            .texture_desc(depth)
            .map(|d| d.size)
            .unwrap_or(dims);
        let camera = scene.camera();
        let frame_index = self.frame_index.wrapping_add(1);
        let mut vars = ShaderVars::new();
        vars.set("gDepthTexture", ShaderValue::Texture(depth))
            .set("gSampler", ShaderValue::Sampler(self.sampler))
            .set("gInvResolution", ShaderValue::Float2(depth_size.as_float2().recip()))
            .set("gNear", ShaderValue::Float(camera.near))
            .set("gFar", ShaderValue::Float(camera.far))
            .set("gStratifiedIndices", ShaderValue::Buffer(indices))
            .set("gStratifiedLookUp", ShaderValue::Buffer(lookup));
        ctx.rasterize(program, &vars, out)?;
        self.frame_index = frame_index;
        self.lifecycle.mark_executed();
        let target = ctx.texture_desc(out).map(|d| d.size).unwrap_or(dims);
        Ok(ExecuteOutcome::Dispatched {
            frame_index,
            threads: target,
        })
    }
}
