//! Ray-traced stochastic depth: four depth layers per texel packed into
//! RGBA32Float, optionally limited to the ray intervals recorded by VAO.

use std::rc::Rc;

use svao_geom::Resolution;
use svao_host::{
    BindFlags, CompileData, DefineList, Device, ProgramDesc, ProgramId, Properties, RenderContext,
    RenderData, RenderPassReflection, ResourceFormat, Scene, ShaderValue, ShaderVars,
    UpdateFlags,
};
use svao_sdmath::{DEFAULT_GUARD_BAND_BUDGET, GuardBandSpec};

use crate::PassError;
use crate::common::{FRAME_INDEX, GUARD_BAND, keys, validate_divisor};
use crate::lifecycle::{Lifecycle, LifecycleTracker, RecompileReason};
use crate::pipeline::{ExecuteOutcome, skip_frame, warn_unknown_keys};

pub const SHADER: &str = "RenderPasses/RTStochasticDepth/StochasticDepthMapRT.rt.slang";

/// Layers packed into one RGBA32Float texel.
pub const STOCHASTIC_LAYERS: u32 = 4;

pub const LINEAR_DEPTH_IN: &str = "linearDepthIn";
pub const RAY_MIN_IN: &str = "rayMinIn";
pub const RAY_MAX_IN: &str = "rayMaxIn";
pub const STOCHASTIC_DEPTH_OUT: &str = "stochasticDepth";

const KEYS: &[&str] = &[
    keys::RESOLUTION_DIVISOR,
    keys::ENABLE_GUARD_BAND,
    keys::USE_RAY_INTERVAL,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RtStochasticDepthConfig {
    pub resolution_divisor: u32,
    pub guard_band: bool,
    pub use_ray_interval: bool,
}

impl Default for RtStochasticDepthConfig {
    fn default() -> Self {
        Self {
            resolution_divisor: 1,
            guard_band: true,
            use_ray_interval: false,
        }
    }
}

pub struct RtStochasticDepth {
    config: RtStochasticDepthConfig,
    lifecycle: LifecycleTracker,
    scene: Option<Rc<dyn Scene>>,
    program: Option<ProgramId>,
    compile_data: Option<CompileData>,
    frame_index: u32,
}

impl RtStochasticDepth {
    pub const NAME: &'static str = "RTStochasticDepth";

    pub fn new(props: &Properties) -> Result<Self, PassError> {
        let mut pass = Self {
            config: RtStochasticDepthConfig::default(),
            lifecycle: LifecycleTracker::new(Self::NAME),
            scene: None,
            program: None,
            compile_data: None,
            frame_index: 0,
        };
        pass.apply_properties(props)?;
        Ok(pass)
    }

    pub fn config(&self) -> RtStochasticDepthConfig {
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

    pub fn apply_properties(&mut self, props: &Properties) -> Result<(), PassError> {
        warn_unknown_keys(Self::NAME, props, &[KEYS]);
        let mut next = self.config;
        if let Some(d) = props.get_u32(keys::RESOLUTION_DIVISOR)? {
            next.resolution_divisor = validate_divisor(d)?;
        }
        if let Some(g) = props.get_bool(keys::ENABLE_GUARD_BAND)? {
            next.guard_band = g;
        }
        if let Some(r) = props.get_bool(keys::USE_RAY_INTERVAL)? {
            next.use_ray_interval = r;
        }
        let prev = std::mem::replace(&mut self.config, next);
        if prev.resolution_divisor != next.resolution_divisor {
            self.lifecycle
                .invalidate(RecompileReason::ParameterChanged(keys::RESOLUTION_DIVISOR));
        }
        if prev.guard_band != next.guard_band {
            self.lifecycle
                .invalidate(RecompileReason::ParameterChanged(keys::ENABLE_GUARD_BAND));
        }
        if prev.use_ray_interval != next.use_ray_interval {
            self.lifecycle
                .invalidate(RecompileReason::ParameterChanged(keys::USE_RAY_INTERVAL));
        }
        Ok(())
    }

    pub fn properties(&self) -> Properties {
        Properties::new()
            .with(keys::RESOLUTION_DIVISOR, self.config.resolution_divisor)
            .with(keys::ENABLE_GUARD_BAND, self.config.guard_band)
            .with(keys::USE_RAY_INTERVAL, self.config.use_ray_interval)
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

    fn guard_spec(&self) -> Result<GuardBandSpec, PassError> {
        Ok(GuardBandSpec::new(
            self.config.resolution_divisor,
            DEFAULT_GUARD_BAND_BUDGET,
        )?)
    }

    /// Output extent for a full-resolution target.
    pub fn map_size(&self, dims: Resolution) -> Result<Resolution, PassError> {
        self.guard_spec()?.map_size(dims, self.config.guard_band)
            .map_err(PassError::from)
    }

    pub fn reflect(&self, compile_data: &CompileData) -> Result<RenderPassReflection, PassError> {
        let map = self.map_size(compile_data.default_tex_dims)?;
        let mut r = RenderPassReflection::new();
        r.add_input(LINEAR_DEPTH_IN, "linear depth (linear z values)");
        if self.config.use_ray_interval {
            r.add_input(RAY_MIN_IN, "Ray interval start")
                .format(ResourceFormat::R32Int)
                .texture_2d(map);
            r.add_input(RAY_MAX_IN, "Ray interval end")
                .format(ResourceFormat::R32Int)
                .texture_2d(map);
        }
        r.add_output(STOCHASTIC_DEPTH_OUT, "Stochastic depth (packed into 4 color channels)")
            .bind_flags(BindFlags::ALL_COLOR_VIEWS)
            .format(ResourceFormat::Rgba32Float)
            .texture_2d(map);
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
        let Some(scene) = self.scene.clone() else {
            return Ok(());
        };
        if !self.lifecycle.needs_compile() {
            return Ok(());
        }
        let dims = compile_data.default_tex_dims;
        let mut defines: DefineList = scene.scene_defines();
        defines
            .add("RAY_CONE_SPREAD", scene.camera().pixel_spread_angle(dims.height))
            .add("STOCHASTIC_DEPTH_SAMPLES", STOCHASTIC_LAYERS)
            .add("USE_RAY_INTERVAL", u32::from(self.config.use_ray_interval))
            .add("RESOLUTION_DIVISOR", self.config.resolution_divisor);
        self.program = Some(device.create_program(&ProgramDesc::ray_tracing(SHADER, defines))?);
        self.lifecycle.mark_compiled();
        Ok(())
    }

    pub fn execute<C: RenderContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        data: &dyn RenderData,
    ) -> Result<ExecuteOutcome, PassError> {
        let Some(scene) = self.scene.clone() else {
            return Ok(ExecuteOutcome::Detached);
        };
        if scene.updates().contains(UpdateFlags::RECOMPILE_NEEDED) {
            self.lifecycle.invalidate(RecompileReason::SceneRequested);
        }
        let get = |name: &'static str| data.texture(name).ok_or(name);
        let resolved = (|| {
            let depth = get(LINEAR_DEPTH_IN)?;
            let out = get(STOCHASTIC_DEPTH_OUT)?;
            let bounds = if self.config.use_ray_interval {
                Some((get(RAY_MIN_IN)?, get(RAY_MAX_IN)?))
            } else {
                None
            };
            Ok::<_, &'static str>((depth, out, bounds))
        })();
        let (depth, out, bounds) = match resolved {
            Ok(r) => r,
            Err(missing) => return Ok(skip_frame(Self::NAME, missing)),
        };

        let dims = data.default_texture_dims();
        self.compile(ctx, &CompileData::new(dims))?;
        let Some(program) = self.program else {
            return Ok(ExecuteOutcome::Detached);
        };

        let spec = self.guard_spec()?;
        let guard = if self.config.guard_band {
            spec.extra_guard_band()
        } else {
            0
        };
        let launch = spec.map_size(dims, self.config.guard_band)?;
        let frame_index = self.frame_index.wrapping_add(1);
        let mut vars = ShaderVars::new();
        scene.camera().bind(&mut vars, crate::common::CAMERA);
        vars.set("gLinearDepthIn", ShaderValue::Texture(depth))
            .set("gStochasticDepthOut", ShaderValue::Texture(out))
            .set(GUARD_BAND, ShaderValue::Int(guard as i32))
            .set(FRAME_INDEX, ShaderValue::Uint(frame_index));
        if let Some((min, max)) = bounds {
            vars.set("gRayMinIn", ShaderValue::Texture(min))
                .set("gRayMaxIn", ShaderValue::Texture(max));
        }
        ctx.raytrace(program, &vars, launch)?;
        self.frame_index = frame_index;
        self.lifecycle.mark_executed();
        Ok(ExecuteOutcome::Dispatched {
            frame_index,
            threads: launch,
        })
    }
}
