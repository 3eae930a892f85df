//! Explicit compile lifecycle shared by every pass.

use std::fmt;

use svao_geom::Resolution;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// No scene bound.
    Uninitialized,
    /// Scene bound, program stale or missing.
    Configured,
    Compiled,
    Executing,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecompileReason {
    SceneAttached,
    ResolutionChanged { from: Resolution, to: Resolution },
    ParameterChanged(&'static str),
    /// Scene raised `RECOMPILE_NEEDED`.
    SceneRequested,
}

impl fmt::Display for RecompileReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecompileReason::SceneAttached => f.write_str("scene attached"),
            RecompileReason::ResolutionChanged { from, to } => {
                write!(f, "resolution {from} -> {to}")
            }
            RecompileReason::ParameterChanged(key) => write!(f, "`{key}` changed"),
            RecompileReason::SceneRequested => f.write_str("scene requested recompile"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LifecycleTracker {
    pass: &'static str,
    state: Lifecycle,
    last_reason: Option<RecompileReason>,
    compiles: u64,
}

impl LifecycleTracker {
    pub fn new(pass: &'static str) -> Self {
        Self {
            pass,
            state: Lifecycle::Uninitialized,
            last_reason: None,
            compiles: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn last_reason(&self) -> Option<&RecompileReason> {
        self.last_reason.as_ref()
    }

    /// Program builds so far.
    #[inline]
    pub fn compiles(&self) -> u64 {
        self.compiles
    }

    #[inline]
    pub fn needs_compile(&self) -> bool {
        self.state == Lifecycle::Configured
    }

    pub fn attach_scene(&mut self) {
        self.state = Lifecycle::Configured;
        self.note(RecompileReason::SceneAttached);
    }

    pub fn detach_scene(&mut self) {
        self.state = Lifecycle::Uninitialized;
        log::debug!(target: "passes", "{}: scene detached", self.pass);
    }

    /// Sends a compiled pass back to `Configured`. Without a scene the pass
    /// stays `Uninitialized`; the reason is still recorded.
    pub fn invalidate(&mut self, reason: RecompileReason) {
        if self.state != Lifecycle::Uninitialized {
            self.state = Lifecycle::Configured;
        }
        self.note(reason);
    }

    pub fn mark_compiled(&mut self) {
        self.state = Lifecycle::Compiled;
        self.compiles += 1;
    }

    pub fn mark_executed(&mut self) {
        self.state = Lifecycle::Executing;
    }

    fn note(&mut self, reason: RecompileReason) {
        log::debug!(target: "passes", "{}: {:?} ({})", self.pass, self.state, reason);
        self.last_reason = Some(reason);
    }
}
