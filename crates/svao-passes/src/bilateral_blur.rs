//! Separable depth-aware blur over the AO result.
//!
//! Each iteration runs a horizontal pass into the internal scratch texture
//! and a vertical pass back into `colorOut`. Later iterations read the
//! previous `colorOut`, so the blur widens with the iteration count. The
//! pass needs no scene.

use std::rc::Rc;

use svao_geom::Resolution;
use svao_host::{
    BindFlags, CompileData, DefineList, Device, ProgramDesc, ProgramId, Properties, RenderContext,
    RenderData, RenderPassReflection, ResourceFormat, SamplerDesc, SamplerId, Scene, ShaderValue,
    ShaderVars,
};

use crate::PassError;
use crate::pipeline::{ExecuteOutcome, skip_frame, warn_unknown_keys};

pub const SHADER: &str = "RenderPasses/BilateralBlur/BilateralBlur.slang";

pub const COLOR_IN: &str = "colorIn";
pub const LINEAR_DEPTH_IN: &str = "linearDepthIn";
pub const TEMP_INTERNAL: &str = "tempInternal";
pub const COLOR_OUT: &str = "colorOut";

pub const NUM_ITERATIONS: &str = "numIterations";
pub const KERNEL_SIZE: &str = "kernelSize";
pub const BETTER_SLOPE: &str = "betterSlope";

const KEYS: &[&str] = &[NUM_ITERATIONS, KERNEL_SIZE, BETTER_SLOPE];

const MAX_ITERATIONS: u32 = 20;
const MAX_KERNEL_RADIUS: u32 = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BilateralBlurConfig {
    pub iterations: u32,
    /// Kernel radius in texels.
    pub kernel_size: u32,
    /// Fits the depth slope across the kernel instead of a flat plane.
    pub better_slope: bool,
}

impl Default for BilateralBlurConfig {
    fn default() -> Self {
        Self {
            iterations: 1,
            kernel_size: 2,
            better_slope: true,
        }
    }
}

impl BilateralBlurConfig {
    fn apply(&mut self, props: &Properties) -> Result<bool, PassError> {
        let mut next = *self;
        if let Some(n) = props.get_u32(NUM_ITERATIONS)? {
            if !(1..=MAX_ITERATIONS).contains(&n) {
                return Err(PassError::invalid(NUM_ITERATIONS, n, "expected 1..=20"));
            }
            next.iterations = n;
        }
        if let Some(k) = props.get_u32(KERNEL_SIZE)? {
            if k > MAX_KERNEL_RADIUS {
                return Err(PassError::invalid(KERNEL_SIZE, k, "expected 0..=20"));
            }
            next.kernel_size = k;
        }
        if let Some(b) = props.get_bool(BETTER_SLOPE)? {
            next.better_slope = b;
        }
        let defines_changed =
            next.kernel_size != self.kernel_size || next.better_slope != self.better_slope;
        *self = next;
        Ok(defines_changed)
    }
}

#[derive(Clone, Copy, Debug)]
struct BlurPrograms {
    horizontal: ProgramId,
    vertical: ProgramId,
}

pub struct BilateralBlur {
    config: BilateralBlurConfig,
    sampler: SamplerId,
    programs: Option<BlurPrograms>,
    compiled_for: Option<Resolution>,
    compiles: u64,
    frame_index: u32,
}

impl BilateralBlur {
    pub const NAME: &'static str = "BilateralBlur";

    pub fn new<D: Device + ?Sized>(device: &mut D, props: &Properties) -> Result<Self, PassError> {
        let mut pass = Self {
            config: BilateralBlurConfig::default(),
            sampler: device.create_sampler(&SamplerDesc::POINT_CLAMP)?,
            programs: None,
            compiled_for: None,
            compiles: 0,
            frame_index: 0,
        };
        pass.apply_properties(props)?;
        Ok(pass)
    }

    pub fn config(&self) -> BilateralBlurConfig {
        self.config
    }

    /// Program pairs built so far.
    pub fn compile_count(&self) -> u64 {
        self.compiles
    }

    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    pub fn apply_properties(&mut self, props: &Properties) -> Result<(), PassError> {
        warn_unknown_keys(Self::NAME, props, &[KEYS]);
        if self.config.apply(props)? {
            self.programs = None;
        }
        Ok(())
    }

    pub fn properties(&self) -> Properties {
        Properties::new()
            .with(NUM_ITERATIONS, self.config.iterations)
            .with(KERNEL_SIZE, self.config.kernel_size)
            .with(BETTER_SLOPE, self.config.better_slope)
    }

    /// Accepted for graph uniformity; the blur reads no scene state.
    pub fn set_scene(&mut self, _scene: Option<Rc<dyn Scene>>) {}

    pub fn reflect(&self, _compile_data: &CompileData) -> Result<RenderPassReflection, PassError> {
        let mut r = RenderPassReflection::new();
        r.add_input(COLOR_IN, "Input texture");
        r.add_input(LINEAR_DEPTH_IN, "Linear depth");
        r.add_internal(TEMP_INTERNAL, "Horizontal pass result")
            .format(ResourceFormat::R8Unorm)
            .bind_flags(BindFlags::ALL_COLOR_VIEWS);
        r.add_output(COLOR_OUT, "Output texture")
            .format(ResourceFormat::R8Unorm)
            .bind_flags(BindFlags::ALL_COLOR_VIEWS);
        Ok(r)
    }

    fn defines(&self, dims: Resolution) -> DefineList {
        let inv = dims.as_float2().recip();
        let mut defines = DefineList::new();
        defines
            .add("KERNEL_RADIUS", self.config.kernel_size)
            .add("INV_RESOLUTION", format!("float2({},{})", inv.x, inv.y))
            .add("BETTER_SLOPE", u32::from(self.config.better_slope));
        defines
    }

    /// Builds both directional programs; `INV_RESOLUTION` is baked in, so a
    /// new target size rebuilds them.
    pub fn compile<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        compile_data: &CompileData,
    ) -> Result<(), PassError> {
        let dims = compile_data.default_tex_dims;
        if self.compiled_for != Some(dims) {
            self.programs = None;
        }
        if self.programs.is_some() {
            return Ok(());
        }
        let mut defines = self.defines(dims);
        defines.add("DIRECTION", "float2(1.f, 0.f)");
        let horizontal = device.create_program(&ProgramDesc::raster(SHADER, defines.clone()))?;
        defines.add("DIRECTION", "float2(0.f, 1.f)");
        let vertical = device.create_program(&ProgramDesc::raster(SHADER, defines))?;
        self.programs = Some(BlurPrograms {
            horizontal,
            vertical,
        });
        self.compiled_for = Some(dims);
        self.compiles += 1;
        log::debug!(
            target: "passes",
            "{}: compiled for {} (radius {})",
            Self::NAME,
            dims,
            self.config.kernel_size
        );
        Ok(())
    }

    pub fn execute<C: RenderContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        data: &dyn RenderData,
    ) -> Result<ExecuteOutcome, PassError> {
        let get = |name: &'static str| data.texture(name).ok_or(name);
        let resolved = (|| {
            Ok::<_, &'static str>((
                get(COLOR_IN)?,
                get(LINEAR_DEPTH_IN)?,
                get(TEMP_INTERNAL)?,
                get(COLOR_OUT)?,
            ))
        })();
        let (color, depth, temp, out) = match resolved {
            Ok(r) => r,
            Err(missing) => return Ok(skip_frame(Self::NAME, missing)),
        };

        let dims = data.default_texture_dims();
        self.compile(ctx, &CompileData::new(dims))?;
        let Some(programs) = self.programs else {
            return Ok(ExecuteOutcome::Detached);
        };

        let mut vars = ShaderVars::new();
        vars.set("gLinearDepthIn", ShaderValue::Texture(depth))
            .set("gSampler", ShaderValue::Sampler(self.sampler));
        for i in 0..self.config.iterations {
            let src = if i == 0 { color } else { out };
            vars.set("gColorIn", ShaderValue::Texture(src));
            ctx.rasterize(programs.horizontal, &vars, temp)?;
            vars.set("gColorIn", ShaderValue::Texture(temp));
            ctx.rasterize(programs.vertical, &vars, out)?;
        }
        let frame_index = self.frame_index.wrapping_add(1);
        self.frame_index = frame_index;
        let target = ctx.texture_desc(out).map(|d| d.size).unwrap_or(dims);
        Ok(ExecuteOutcome::Dispatched {
            frame_index,
            threads: target,
        })
    }
}
