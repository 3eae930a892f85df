//! Converts hardware depth to linear view-space depth using the camera's
//! near and far planes.

use std::rc::Rc;

use svao_host::{
    CompileData, Device, ProgramDesc, ProgramId, Properties, RenderContext, RenderData,
    RenderPassReflection, ResourceFormat, SamplerDesc, SamplerId, Scene, ShaderValue, ShaderVars,
    UpdateFlags,
};

use crate::PassError;
use crate::lifecycle::{Lifecycle, LifecycleTracker, RecompileReason};
use crate::pipeline::{ExecuteOutcome, skip_frame, warn_unknown_keys};

pub const SHADER: &str = "RenderPasses/LinearizeDepth/LinearizeDepth.slang";

pub const DEPTH_IN: &str = "depthIn";
pub const LINEAR_DEPTH_OUT: &str = "linearDepthOut";

pub struct LinearizeDepth {
    lifecycle: LifecycleTracker,
    scene: Option<Rc<dyn Scene>>,
    program: Option<ProgramId>,
    sampler: SamplerId,
    frame_index: u32,
}

impl LinearizeDepth {
    pub const NAME: &'static str = "LinearizeDepth";

    pub fn new<D: Device + ?Sized>(device: &mut D, props: &Properties) -> Result<Self, PassError> {
        warn_unknown_keys(Self::NAME, props, &[]);
        Ok(Self {
            lifecycle: LifecycleTracker::new(Self::NAME),
            scene: None,
            program: None,
            sampler: device.create_sampler(&SamplerDesc::POINT_CLAMP)?,
            frame_index: 0,
        })
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

    /// The pass has no properties; every key is reported as unknown.
    pub fn apply_properties(&mut self, props: &Properties) -> Result<(), PassError> {
        warn_unknown_keys(Self::NAME, props, &[]);
        Ok(())
    }

    pub fn properties(&self) -> Properties {
        Properties::new()
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

    pub fn reflect(&self, _compile_data: &CompileData) -> Result<RenderPassReflection, PassError> {
        let mut r = RenderPassReflection::new();
        r.add_input(DEPTH_IN, "Hardware depth");
        r.add_output(LINEAR_DEPTH_OUT, "Linear view-space depth")
            .format(ResourceFormat::R32Float);
        Ok(r)
    }

    pub fn compile<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        _compile_data: &CompileData,
    ) -> Result<(), PassError> {
        let Some(scene) = self.scene.clone() else {
            return Ok(());
        };
        if !self.lifecycle.needs_compile() {
            return Ok(());
        }
        let desc = ProgramDesc::raster(SHADER, scene.scene_defines());
        self.program = Some(device.create_program(&desc)?);
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
        let (depth, out) = match get(DEPTH_IN).and_then(|d| Ok((d, get(LINEAR_DEPTH_OUT)?))) {
            Ok(r) => r,
            Err(missing) => return Ok(skip_frame(Self::NAME, missing)),
        };

        let dims = data.default_texture_dims();
        self.compile(ctx, &CompileData::new(dims))?;
        let Some(program) = self.program else {
            return Ok(ExecuteOutcome::Detached);
        };
        let camera = scene.camera();
        let frame_index = self.frame_index.wrapping_add(1);
        let mut vars = ShaderVars::new();
        vars.set("gNearPlane", ShaderValue::Float(camera.near))
            .set("gFarPlane", ShaderValue::Float(camera.far))
            .set("gInDepthTex", ShaderValue::Texture(depth))
            .set("gFullscreenSampler", ShaderValue::Sampler(self.sampler));
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
