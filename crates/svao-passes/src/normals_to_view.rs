//! Rotates world-space G-buffer normals into the camera's view space.

use std::rc::Rc;

use svao_host::{
    CompileData, Device, ProgramDesc, ProgramId, Properties, RenderContext, RenderData,
    RenderPassReflection, ResourceFormat, Scene, ShaderValue, ShaderVars, UpdateFlags,
};

use crate::PassError;
use crate::lifecycle::{Lifecycle, LifecycleTracker, RecompileReason};
use crate::pipeline::{ExecuteOutcome, skip_frame, warn_unknown_keys};

pub const SHADER: &str = "RenderPasses/NormalsToViewSpace/NormalsToViewSpace.slang";

pub const NORMALS_WORLD_IN: &str = "normalsWorldIn";
pub const NORMALS_VIEW_OUT: &str = "normalsViewOut";

pub struct NormalsToViewSpace {
    lifecycle: LifecycleTracker,
    scene: Option<Rc<dyn Scene>>,
    program: Option<ProgramId>,
    frame_index: u32,
}

impl NormalsToViewSpace {
    pub const NAME: &'static str = "NormalsToViewSpace";

    pub fn new(props: &Properties) -> Self {
        warn_unknown_keys(Self::NAME, props, &[]);
        Self {
            lifecycle: LifecycleTracker::new(Self::NAME),
            scene: None,
            program: None,
            frame_index: 0,
        }
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
        warn_unknown_keys(Self::NAME, props, &[]);
        Ok(())
    }

    pub fn properties(&self) -> Properties {
        Properties::new()
    }

    /// A new scene always rebuilds the program.
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
        r.add_input(NORMALS_WORLD_IN, "Normals in world space");
        r.add_output(NORMALS_VIEW_OUT, "Normals in view space")
            .format(ResourceFormat::Rgba32Float);
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
        let (normals, out) = match get(NORMALS_WORLD_IN).and_then(|n| Ok((n, get(NORMALS_VIEW_OUT)?))) {
            Ok(r) => r,
            Err(missing) => return Ok(skip_frame(Self::NAME, missing)),
        };

        let dims = data.default_texture_dims();
        self.compile(ctx, &CompileData::new(dims))?;
        let Some(program) = self.program else {
            return Ok(ExecuteOutcome::Detached);
        };
        let frame_index = self.frame_index.wrapping_add(1);
        let mut vars = ShaderVars::new();
        vars.set("gNormalsWorldIn", ShaderValue::Texture(normals))
            .set("PerFrameCB.gViewMat", ShaderValue::Mat4(scene.camera().view));
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
