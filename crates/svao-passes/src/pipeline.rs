//! The AO pass family behind one type.
//!
//! `AoPass` owns the shared state and dispatches to the variant for
//! reflection, defines and per-frame bindings. Programs are rebuilt lazily:
//! every change that alters defines only moves the lifecycle back to
//! `Configured`, and the next `compile` or `execute` builds the program once.

use std::rc::Rc;

use svao_geom::Resolution;
use svao_host::{
    CompileData, Device, ProgramId, Properties, RenderContext, RenderData, RenderPassReflection,
    Scene, ShaderVars, UpdateFlags,
};

use crate::PassError;
use crate::common::{AoCommonState, AoSettings, SampleCount, SharedResources, keys};
use crate::lifecycle::{Lifecycle, RecompileReason};
use crate::prepass::PrepassConfig;
use crate::svao::SvaoConfig;
use crate::vao::VaoConfig;

#[derive(Clone, Debug, PartialEq)]
pub enum AoVariant {
    Primary(VaoConfig),
    Secondary(SvaoConfig),
    Prepass(PrepassConfig),
}

impl AoVariant {
    pub fn name(&self) -> &'static str {
        match self {
            AoVariant::Primary(_) => "VAO",
            AoVariant::Secondary(_) => "SVAO",
            AoVariant::Prepass(_) => "VAOPrepass",
        }
    }

    fn keys(&self) -> &'static [&'static str] {
        match self {
            AoVariant::Primary(_) => VaoConfig::KEYS,
            AoVariant::Secondary(_) => &[],
            AoVariant::Prepass(_) => PrepassConfig::KEYS,
        }
    }
}

/// Result of one `execute` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecuteOutcome {
    Dispatched {
        frame_index: u32,
        threads: Resolution,
    },
    /// No scene bound; nothing recorded.
    Detached,
    /// A required texture was absent; frame skipped.
    MissingResource(&'static str),
}

impl ExecuteOutcome {
    #[inline]
    pub fn dispatched(&self) -> bool {
        matches!(self, ExecuteOutcome::Dispatched { .. })
    }
}

pub(crate) fn warn_unknown_keys(pass: &str, props: &Properties, known: &[&[&str]]) {
    for key in props.keys() {
        if !known.iter().any(|set| set.contains(&key)) {
            log::warn!(target: "passes", "{pass}: ignoring unknown property `{key}`");
        }
    }
}

/// Logs the skipped frame and reports the first absent texture.
pub(crate) fn skip_frame(pass: &str, missing: &'static str) -> ExecuteOutcome {
    log::warn!(target: "passes", "{pass}: missing required texture `{missing}`, frame skipped");
    ExecuteOutcome::MissingResource(missing)
}

pub struct AoPass {
    pub(crate) common: AoCommonState,
    variant: AoVariant,
    program: Option<ProgramId>,
}

impl AoPass {
    pub fn vao<D: Device + ?Sized>(device: &mut D, props: &Properties) -> Result<Self, PassError> {
        Self::create(device, AoVariant::Primary(VaoConfig::default()), props)
    }

    pub fn svao<D: Device + ?Sized>(device: &mut D, props: &Properties) -> Result<Self, PassError> {
        Self::create(device, AoVariant::Secondary(SvaoConfig::default()), props)
    }

    pub fn prepass<D: Device + ?Sized>(device: &mut D, props: &Properties) -> Result<Self, PassError> {
        Self::create(device, AoVariant::Prepass(PrepassConfig::default()), props)
    }

    fn create<D: Device + ?Sized>(
        device: &mut D,
        variant: AoVariant,
        props: &Properties,
    ) -> Result<Self, PassError> {
        let shared = SharedResources::create(device)?;
        let mut pass = Self {
            common: AoCommonState::new(variant.name(), AoSettings::default(), shared),
            variant,
            program: None,
        };
        pass.apply_properties(props)?;
        Ok(pass)
    }

    pub fn name(&self) -> &'static str {
        self.variant.name()
    }

    pub fn variant(&self) -> &AoVariant {
        &self.variant
    }

    pub fn settings(&self) -> &AoSettings {
        &self.common.settings
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.common.lifecycle.state()
    }

    pub fn last_recompile_reason(&self) -> Option<&RecompileReason> {
        self.common.lifecycle.last_reason()
    }

    /// Programs built over the pass's lifetime.
    pub fn compile_count(&self) -> u64 {
        self.common.lifecycle.compiles()
    }

    pub fn frame_index(&self) -> u32 {
        self.common.frame_index
    }

    /// Guard-banded stochastic map extent from the last compile.
    pub fn stochastic_map_size(&self) -> Resolution {
        self.common.stoch_map_size
    }

    pub fn extra_guard_band(&self) -> u32 {
        self.common.extra_guard_band
    }

    pub fn has_scene(&self) -> bool {
        self.common.scene.is_some()
    }

    pub fn set_scene(&mut self, scene: Option<Rc<dyn Scene>>) {
        self.program = None;
        match scene {
            Some(s) => {
                self.common.scene = Some(s);
                self.common.lifecycle.attach_scene();
            }
            None => {
                self.common.scene = None;
                self.common.lifecycle.detach_scene();
            }
        }
    }

    /// Applies properties; any define-affecting change invalidates the program.
    pub fn apply_properties(&mut self, props: &Properties) -> Result<(), PassError> {
        warn_unknown_keys(self.name(), props, &[keys::COMMON, self.variant.keys()]);
        let mut settings = self.common.settings.clone();
        let mut variant = self.variant.clone();
        let mut changed = settings.apply(props)?;
        match &mut variant {
            AoVariant::Primary(v) => changed.extend(v.apply(props)?),
            AoVariant::Secondary(_) => {}
            AoVariant::Prepass(p) => p.apply(props)?,
        }
        self.common.settings = settings;
        self.variant = variant;
        for key in changed {
            self.common.lifecycle.invalidate(RecompileReason::ParameterChanged(key));
        }
        Ok(())
    }

    pub fn properties(&self) -> Properties {
        let mut props = Properties::new();
        self.common.settings.write_properties(&mut props);
        match &self.variant {
            AoVariant::Primary(v) => v.write_properties(&mut props),
            AoVariant::Secondary(_) => {}
            AoVariant::Prepass(p) => p.write_properties(&mut props),
        }
        props
    }

    pub fn set_radius(&mut self, radius: f32) -> Result<(), PassError> {
        self.apply_properties(&Properties::new().with(keys::RADIUS, radius))
    }

    pub fn set_sample_count(&mut self, count: SampleCount) {
        if self.common.settings.sample_count != count {
            self.common.settings.sample_count = count;
            self.common
                .lifecycle
                .invalidate(RecompileReason::ParameterChanged(keys::SAMPLE_COUNT));
        }
    }

    pub fn set_guard_band(&mut self, enabled: bool) {
        if self.common.settings.guard_band != enabled {
            self.common.settings.guard_band = enabled;
            self.common
                .lifecycle
                .invalidate(RecompileReason::ParameterChanged(keys::ENABLE_GUARD_BAND));
        }
    }

    pub fn reflect(&self, compile_data: &CompileData) -> Result<RenderPassReflection, PassError> {
        let dims = compile_data.default_tex_dims;
        match &self.variant {
            AoVariant::Primary(v) => v.reflect(&self.common, dims),
            AoVariant::Secondary(s) => Ok(s.reflect()),
            AoVariant::Prepass(p) => p.reflect(dims),
        }
    }

    /// Records the target resolution and builds the program if stale.
    pub fn compile<C: RenderContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        compile_data: &CompileData,
    ) -> Result<(), PassError> {
        let dims = compile_data.default_tex_dims;
        if let Some(prev) = self.common.compile_data {
            if prev.default_tex_dims != dims {
                self.common.lifecycle.invalidate(RecompileReason::ResolutionChanged {
                    from: prev.default_tex_dims,
                    to: dims,
                });
            }
        }
        self.common.compile_data = Some(*compile_data);
        self.rebuild_if_needed(ctx, dims)
    }

    fn rebuild_if_needed<C: RenderContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        dims: Resolution,
    ) -> Result<(), PassError> {
        self.common.update_derived(dims)?;
        if let AoVariant::Prepass(p) = &self.variant {
            p.update_derived(&mut self.common, dims)?;
        }
        let Some(scene) = self.common.scene.clone() else {
            return Ok(());
        };
        if !self.common.lifecycle.needs_compile() {
            return Ok(());
        }
        let defines = self.common.common_defines(scene.as_ref(), dims);
        let desc = match &mut self.variant {
            AoVariant::Primary(v) => v.program(defines),
            AoVariant::Secondary(s) => {
                s.prepare(ctx, &mut self.common)?;
                s.program(defines)
            }
            AoVariant::Prepass(p) => p.program(defines),
        };
        self.program = Some(ctx.create_program(&desc)?);
        self.common.lifecycle.mark_compiled();
        log::debug!(
            target: "passes",
            "{}: compiled for {} (stochastic map {}, guard {})",
            self.name(),
            dims,
            self.common.stoch_map_size,
            self.common.extra_guard_band
        );
        Ok(())
    }

    fn skip(&self, missing: &'static str) -> ExecuteOutcome {
        skip_frame(self.name(), missing)
    }

    /// Runs one frame. Missing inputs skip the frame without touching the
    /// frame index or the cached program; a recompile raised by the scene is
    /// still recorded and honoured on the next frame that runs.
    pub fn execute<C: RenderContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        data: &dyn RenderData,
    ) -> Result<ExecuteOutcome, PassError> {
        let Some(scene) = self.common.scene.clone() else {
            return Ok(ExecuteOutcome::Detached);
        };
        // Recorded before the resource check so a skipped frame keeps the request.
        if scene.updates().contains(UpdateFlags::RECOMPILE_NEEDED) {
            self.common.lifecycle.invalidate(RecompileReason::SceneRequested);
        }

        let missing = match &self.variant {
            AoVariant::Primary(v) => v.resolve(data).err(),
            AoVariant::Secondary(s) => s.resolve(data).err(),
            AoVariant::Prepass(p) => p.resolve(data).err(),
        };
        if let Some(name) = missing {
            return Ok(self.skip(name));
        }

        let dims = data.default_texture_dims();
        let compile_data = CompileData::new(dims);
        if self.common.compile_data != Some(compile_data) {
            self.compile(ctx, &compile_data)?;
        } else {
            self.rebuild_if_needed(ctx, dims)?;
        }
        let Some(program) = self.program else {
            return Ok(ExecuteOutcome::Detached);
        };

        let frame_index = self.common.frame_index.wrapping_add(1);
        let mut vars = ShaderVars::new();
        self.common.bind_common_vars(&mut vars, scene.as_ref(), frame_index);
        let threads = match &self.variant {
            AoVariant::Primary(v) => match v.resolve(data) {
                Ok(f) => v.record(ctx, &self.common, program, &f, vars, dims)?,
                Err(name) => return Ok(self.skip(name)),
            },
            AoVariant::Secondary(s) => match s.resolve(data) {
                Ok(f) => s.record(ctx, &self.common, program, &f, vars, dims)?,
                Err(name) => return Ok(self.skip(name)),
            },
            AoVariant::Prepass(p) => match p.resolve(data) {
                Ok(f) => p.record(ctx, program, &f, vars, dims)?,
                Err(name) => return Ok(self.skip(name)),
            },
        };
        self.common.frame_index = frame_index;
        self.common.lifecycle.mark_executed();
        Ok(ExecuteOutcome::Dispatched {
            frame_index,
            threads,
        })
    }
}
