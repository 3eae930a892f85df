//! Frame graph for the AO pipeline.
//!
//! Nodes are added in declaration order and wired by `connect`; `compile`
//! allocates every output from the pass reflections, aliases input/output
//! fields to their producers, and `execute` runs the passes in topological
//! order. Inputs with no producer are fed from graph-owned source textures.
//! Reflections are cached per node; a property change that alters one
//! reallocates the graph before the next compile or frame.

use std::collections::VecDeque;
use std::rc::Rc;

use hashbrown::HashMap;
use svao_geom::Resolution;
use svao_host::{
    CompileData, FieldKind, FieldSize, FrameResources, Properties, RenderContext, RenderData,
    RenderPassReflection, ResourceFormat, Scene, TextureDesc, TextureId,
};

use crate::PassError;
use crate::bilateral_blur::{self as blur, BilateralBlur};
use crate::linearize_depth::{self as linearize, LinearizeDepth};
use crate::normals_to_view::{self as normals, NormalsToViewSpace};
use crate::pipeline::{AoPass, AoVariant, ExecuteOutcome};
use crate::rt_stochastic_depth::{self as rt, RtStochasticDepth};
use crate::stochastic_depth::StochasticDepthStratified;
use crate::{prepass, svao, vao};

/// Textures the graph owns and the host fills each frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Source {
    LinearDepth,
    NormalView,
    Depth,
    NormalWorld,
}

impl Source {
    pub const ALL: [Source; 4] = [
        Source::LinearDepth,
        Source::NormalView,
        Source::Depth,
        Source::NormalWorld,
    ];

    fn for_field(name: &str) -> Option<Source> {
        match name {
            "linearDepthIn" => Some(Source::LinearDepth),
            "normalViewIn" => Some(Source::NormalView),
            "depthTexture" | "depthIn" => Some(Source::Depth),
            "normalsWorldIn" => Some(Source::NormalWorld),
            _ => None,
        }
    }

    fn format(self) -> ResourceFormat {
        match self {
            Source::LinearDepth => ResourceFormat::R32Float,
            Source::NormalView | Source::NormalWorld => ResourceFormat::Rgba32Float,
            Source::Depth => ResourceFormat::D32Float,
        }
    }
}

pub enum GraphPass {
    Ao(AoPass),
    RtDepth(RtStochasticDepth),
    StochasticDepth(StochasticDepthStratified),
    LinearizeDepth(LinearizeDepth),
    NormalsToView(NormalsToViewSpace),
    Blur(BilateralBlur),
}

impl GraphPass {
    fn reflect(&self, compile_data: &CompileData) -> Result<RenderPassReflection, PassError> {
        match self {
            GraphPass::Ao(p) => p.reflect(compile_data),
            GraphPass::RtDepth(p) => p.reflect(compile_data),
            GraphPass::StochasticDepth(p) => p.reflect(compile_data),
            GraphPass::LinearizeDepth(p) => p.reflect(compile_data),
            GraphPass::NormalsToView(p) => p.reflect(compile_data),
            GraphPass::Blur(p) => p.reflect(compile_data),
        }
    }

    /// Applies properties to the wrapped pass. Resources follow on the next
    /// graph compile or frame.
    pub fn apply_properties(&mut self, props: &Properties) -> Result<(), PassError> {
        match self {
            GraphPass::Ao(p) => p.apply_properties(props),
            GraphPass::RtDepth(p) => p.apply_properties(props),
            GraphPass::StochasticDepth(p) => p.apply_properties(props),
            GraphPass::LinearizeDepth(p) => p.apply_properties(props),
            GraphPass::NormalsToView(p) => p.apply_properties(props),
            GraphPass::Blur(p) => p.apply_properties(props),
        }
    }

    fn compile<C: RenderContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        compile_data: &CompileData,
    ) -> Result<(), PassError> {
        match self {
            GraphPass::Ao(p) => p.compile(ctx, compile_data),
            GraphPass::RtDepth(p) => p.compile(ctx, compile_data),
            GraphPass::StochasticDepth(p) => p.compile(ctx, compile_data),
            GraphPass::LinearizeDepth(p) => p.compile(ctx, compile_data),
            GraphPass::NormalsToView(p) => p.compile(ctx, compile_data),
            GraphPass::Blur(p) => p.compile(ctx, compile_data),
        }
    }

    fn execute<C: RenderContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        data: &dyn RenderData,
    ) -> Result<ExecuteOutcome, PassError> {
        match self {
            GraphPass::Ao(p) => p.execute(ctx, data),
            GraphPass::RtDepth(p) => p.execute(ctx, data),
            GraphPass::StochasticDepth(p) => p.execute(ctx, data),
            GraphPass::LinearizeDepth(p) => p.execute(ctx, data),
            GraphPass::NormalsToView(p) => p.execute(ctx, data),
            GraphPass::Blur(p) => p.execute(ctx, data),
        }
    }

    fn set_scene(&mut self, scene: Option<Rc<dyn Scene>>) {
        match self {
            GraphPass::Ao(p) => p.set_scene(scene),
            GraphPass::RtDepth(p) => p.set_scene(scene),
            GraphPass::StochasticDepth(p) => p.set_scene(scene),
            GraphPass::LinearizeDepth(p) => p.set_scene(scene),
            GraphPass::NormalsToView(p) => p.set_scene(scene),
            GraphPass::Blur(p) => p.set_scene(scene),
        }
    }

    pub fn frame_index(&self) -> u32 {
        match self {
            GraphPass::Ao(p) => p.frame_index(),
            GraphPass::RtDepth(p) => p.frame_index(),
            GraphPass::StochasticDepth(p) => p.frame_index(),
            GraphPass::LinearizeDepth(p) => p.frame_index(),
            GraphPass::NormalsToView(p) => p.frame_index(),
            GraphPass::Blur(p) => p.frame_index(),
        }
    }

    pub fn properties(&self) -> Properties {
        match self {
            GraphPass::Ao(p) => p.properties(),
            GraphPass::RtDepth(p) => p.properties(),
            GraphPass::StochasticDepth(p) => p.properties(),
            GraphPass::LinearizeDepth(p) => p.properties(),
            GraphPass::NormalsToView(p) => p.properties(),
            GraphPass::Blur(p) => p.properties(),
        }
    }
}

struct Node {
    name: &'static str,
    pass: GraphPass,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Edge {
    from: (usize, &'static str),
    to: (usize, &'static str),
}

/// Per-pass property tables; a `None` leaves the pass out of the graph.
#[derive(Clone, Debug, Default)]
pub struct GraphDesc {
    pub linearize_depth: Option<Properties>,
    pub normals_to_view: Option<Properties>,
    pub prepass: Option<Properties>,
    pub vao: Option<Properties>,
    pub rt_stochastic_depth: Option<Properties>,
    pub svao: Option<Properties>,
    pub stochastic_depth: Option<Properties>,
    pub bilateral_blur: Option<Properties>,
}

#[derive(Default)]
pub struct AoGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    order: Vec<usize>,
    sources: HashMap<Source, TextureId>,
    resources: Vec<FrameResources>,
    /// Per-node reflections the current resources were allocated from.
    reflections: Vec<RenderPassReflection>,
    compiled_for: Option<Resolution>,
}

impl AoGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the standard topology: optional depth and normal conversion,
    /// prepass, VAO, ray-traced stochastic depth, SVAO and the blur, plus the
    /// independent rasterized stochastic depth pass.
    pub fn build<C: RenderContext + ?Sized>(ctx: &mut C, desc: &GraphDesc) -> Result<Self, PassError> {
        let mut graph = Self::new();

        let linear_depth = match &desc.linearize_depth {
            Some(props) => Some(graph.add_pass(
                LinearizeDepth::NAME,
                GraphPass::LinearizeDepth(LinearizeDepth::new(ctx, props)?),
            )),
            None => None,
        };
        let view_normals = desc.normals_to_view.as_ref().map(|props| {
            graph.add_pass(
                NormalsToViewSpace::NAME,
                GraphPass::NormalsToView(NormalsToViewSpace::new(props)),
            )
        });
        let prepass = match &desc.prepass {
            Some(props) => Some(graph.add_pass("VAOPrepass", GraphPass::Ao(AoPass::prepass(ctx, props)?))),
            None => None,
        };
        let vao = match &desc.vao {
            Some(props) => Some(graph.add_pass("VAO", GraphPass::Ao(AoPass::vao(ctx, props)?))),
            None => None,
        };
        let rt = match &desc.rt_stochastic_depth {
            Some(props) => Some(graph.add_pass(RtStochasticDepth::NAME, GraphPass::RtDepth(RtStochasticDepth::new(props)?))),
            None => None,
        };
        let svao = match &desc.svao {
            Some(props) => Some(graph.add_pass("SVAO", GraphPass::Ao(AoPass::svao(ctx, props)?))),
            None => None,
        };
        if let Some(props) = &desc.stochastic_depth {
            let pass = StochasticDepthStratified::new(ctx, props)?;
            graph.add_pass("StochasticDepth", GraphPass::StochasticDepth(pass));
        }
        let blurred = match &desc.bilateral_blur {
            Some(props) => Some(graph.add_pass(
                BilateralBlur::NAME,
                GraphPass::Blur(BilateralBlur::new(ctx, props)?),
            )),
            None => None,
        };

        let vao_config = vao.and_then(|i| match &graph.nodes[i].pass {
            GraphPass::Ao(p) => match p.variant() {
                AoVariant::Primary(cfg) => Some(cfg.clone()),
                _ => None,
            },
            _ => None,
        });

        match (vao, &vao_config, prepass) {
            (Some(v), Some(cfg), Some(p)) if cfg.use_prepass => {
                graph.connect(p, prepass::AO_MASK_OUT, v, vao::AO_PREPASS_IN)?;
            }
            (Some(_), Some(cfg), None) if cfg.use_prepass => {
                return Err(PassError::Graph("VAO.usePrepass is set but no prepass is configured".into()));
            }
            (_, _, Some(_)) => {
                log::warn!(target: "passes", "graph: prepass output is not consumed by VAO");
            }
            _ => {}
        }

        if let Some(r) = rt {
            let uses_interval = match &graph.nodes[r].pass {
                GraphPass::RtDepth(p) => p.config().use_ray_interval,
                _ => false,
            };
            if uses_interval {
                match (vao, &vao_config) {
                    (Some(v), Some(cfg)) if cfg.use_ray_interval => {
                        graph.connect(v, vao::RAY_MIN_OUT, r, rt::RAY_MIN_IN)?;
                        graph.connect(v, vao::RAY_MAX_OUT, r, rt::RAY_MAX_IN)?;
                    }
                    _ => {
                        return Err(PassError::Graph(
                            "RTStochasticDepth.useRayInterval needs VAO with useRayInterval".into(),
                        ));
                    }
                }
            }
        }

        if let Some(s) = svao {
            let Some(v) = vao else {
                return Err(PassError::Graph("SVAO needs a VAO pass".into()));
            };
            if !vao_config.as_ref().is_some_and(|c| c.svao_input_mode) {
                return Err(PassError::Graph("SVAO needs VAO with SVAOInputMode".into()));
            }
            let Some(r) = rt else {
                return Err(PassError::Graph("SVAO needs RTStochasticDepth".into()));
            };
            graph.connect(v, vao::AO_OUT, s, svao::AO_IN_OUT)?;
            graph.connect(v, vao::AO_MASK_OUT, s, svao::AO_MASK_IN)?;
            graph.connect(r, rt::STOCHASTIC_DEPTH_OUT, s, svao::STOCH_DEPTH_IN)?;
        }

        if let Some(b) = blurred {
            match (svao, vao) {
                (Some(s), _) => graph.connect(s, svao::AO_IN_OUT, b, blur::COLOR_IN)?,
                (None, Some(v)) => graph.connect(v, vao::AO_OUT, b, blur::COLOR_IN)?,
                (None, None) => {
                    return Err(PassError::Graph("BilateralBlur needs VAO or SVAO".into()));
                }
            }
        }

        if let Some(l) = linear_depth {
            for consumer in [prepass, vao, rt, svao, blurred].into_iter().flatten() {
                graph.connect(l, linearize::LINEAR_DEPTH_OUT, consumer, vao::LINEAR_DEPTH_IN)?;
            }
        }
        if let Some(n) = view_normals {
            for consumer in [prepass, vao, svao].into_iter().flatten() {
                graph.connect(n, normals::NORMALS_VIEW_OUT, consumer, vao::NORMAL_VIEW_IN)?;
            }
        }

        Ok(graph)
    }

    pub fn add_pass(&mut self, name: &'static str, pass: GraphPass) -> usize {
        self.nodes.push(Node { name, pass });
        self.compiled_for = None;
        self.nodes.len() - 1
    }

    pub fn connect(
        &mut self,
        from: usize,
        output: &'static str,
        to: usize,
        input: &'static str,
    ) -> Result<(), PassError> {
        if from >= self.nodes.len() || to >= self.nodes.len() || from == to {
            return Err(PassError::Graph(format!("invalid edge {from} -> {to}")));
        }
        if self.edges.iter().any(|e| e.to == (to, input)) {
            return Err(PassError::Graph(format!(
                "{}.{} already has a producer",
                self.nodes[to].name, input
            )));
        }
        self.edges.push(Edge {
            from: (from, output),
            to: (to, input),
        });
        self.compiled_for = None;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn pass(&self, name: &str) -> Option<&GraphPass> {
        self.nodes.iter().find(|n| n.name == name).map(|n| &n.pass)
    }

    pub fn pass_mut(&mut self, name: &str) -> Option<&mut GraphPass> {
        self.nodes.iter_mut().find(|n| n.name == name).map(|n| &mut n.pass)
    }

    /// Pass names in execution order; empty until compiled.
    pub fn execution_order(&self) -> Vec<&'static str> {
        self.order.iter().map(|&i| self.nodes[i].name).collect()
    }

    pub fn source(&self, source: Source) -> Option<TextureId> {
        self.sources.get(&source).copied()
    }

    /// Texture bound to `pass.field` after compile.
    pub fn texture(&self, pass: &str, field: &str) -> Option<TextureId> {
        let i = self.nodes.iter().position(|n| n.name == pass)?;
        self.resources.get(i)?.texture(field)
    }

    /// The AO result: the blurred target if a blur runs, else SVAO's
    /// in-place target, else VAO's output.
    pub fn output(&self) -> Option<TextureId> {
        self.texture(BilateralBlur::NAME, blur::COLOR_OUT)
            .or_else(|| self.texture("SVAO", svao::AO_IN_OUT))
            .or_else(|| self.texture("VAO", vao::AO_OUT))
    }

    pub fn set_scene(&mut self, scene: Option<Rc<dyn Scene>>) {
        for node in &mut self.nodes {
            node.pass.set_scene(scene.clone());
        }
    }

    fn topological_order(&self) -> Result<Vec<usize>, PassError> {
        let n = self.nodes.len();
        let mut indegree = vec![0usize; n];
        for e in &self.edges {
            indegree[e.to.0] += 1;
        }
        let mut ready: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = ready.pop_front() {
            order.push(i);
            for e in self.edges.iter().filter(|e| e.from.0 == i) {
                indegree[e.to.0] -= 1;
                if indegree[e.to.0] == 0 {
                    ready.push_back(e.to.0);
                }
            }
        }
        if order.len() != n {
            return Err(PassError::Graph("cycle between passes".into()));
        }
        Ok(order)
    }

    /// Allocates resources for `dims` and compiles every pass. Resources are
    /// kept while the resolution and every pass reflection are unchanged.
    pub fn compile<C: RenderContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        dims: Resolution,
    ) -> Result<(), PassError> {
        self.refresh(ctx, dims)?;
        let compile_data = CompileData::new(dims);
        for &i in &self.order {
            self.nodes[i].pass.compile(ctx, &compile_data)?;
        }
        Ok(())
    }

    /// Reallocates when `dims` or any pass reflection differs from the last
    /// allocation. A failed allocation leaves the graph uncompiled.
    fn refresh<C: RenderContext + ?Sized>(&mut self, ctx: &mut C, dims: Resolution) -> Result<(), PassError> {
        let compile_data = CompileData::new(dims);
        let reflections = self
            .nodes
            .iter()
            .map(|n| n.pass.reflect(&compile_data))
            .collect::<Result<Vec<_>, _>>()?;
        if self.compiled_for == Some(dims) && reflections == self.reflections {
            return Ok(());
        }
        if self.compiled_for == Some(dims) {
            log::debug!(target: "passes", "graph: pass reflections changed, reallocating");
        }
        self.compiled_for = None;
        self.allocate(ctx, dims, &reflections)?;
        self.reflections = reflections;
        self.compiled_for = Some(dims);
        Ok(())
    }

    fn allocate<C: RenderContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        dims: Resolution,
        reflections: &[RenderPassReflection],
    ) -> Result<(), PassError> {
        self.order = self.topological_order()?;

        self.sources.clear();
        for source in Source::ALL {
            let desc = TextureDesc::new_2d(dims, source.format());
            self.sources.insert(source, ctx.create_texture_2d(&desc, None)?);
        }

        let mut resources: Vec<FrameResources> =
            (0..self.nodes.len()).map(|_| FrameResources::new(dims)).collect();
        for &i in &self.order {
            for field in reflections[i].fields() {
                let producer = self
                    .edges
                    .iter()
                    .find(|e| e.to == (i, field.name))
                    .map(|e| e.from);
                let texture = match (field.kind, producer) {
                    (FieldKind::Internal, Some((p, out))) => {
                        return Err(PassError::Graph(format!(
                            "{}.{} is internal but wired to {}.{}",
                            self.nodes[i].name, field.name, self.nodes[p].name, out
                        )));
                    }
                    (kind, Some((p, out))) if kind.reads() => {
                        let Some(t) = resources[p].texture(out) else {
                            return Err(PassError::Graph(format!(
                                "{}.{} is not an output",
                                self.nodes[p].name, out
                            )));
                        };
                        if let FieldSize::Fixed(want) = field.size {
                            let have = ctx.texture_desc(t).map(|d| d.size);
                            if have != Some(want) {
                                return Err(PassError::Graph(format!(
                                    "{}.{} expects {} but {}.{} is {:?}",
                                    self.nodes[i].name, field.name, want, self.nodes[p].name, out, have
                                )));
                            }
                        }
                        t
                    }
                    (kind, _) if kind.allocates() => {
                        let desc = TextureDesc::new_2d(
                            field.resolve_size(dims),
                            field.format.unwrap_or(ResourceFormat::Rgba32Float),
                        )
                        .with_array_size(field.array_size)
                        .with_bind_flags(field.bind_flags);
                        ctx.create_texture_2d(&desc, None)?
                    }
                    // Unfed input.
                    (_, _) => match Source::for_field(field.name).and_then(|s| self.sources.get(&s)) {
                        Some(&t) => t,
                        None => {
                            return Err(PassError::Graph(format!(
                                "{}.{} has no producer",
                                self.nodes[i].name, field.name
                            )));
                        }
                    },
                };
                resources[i].insert(field.name, texture);
            }
        }
        self.resources = resources;
        log::debug!(
            target: "passes",
            "graph: allocated {} for [{}]",
            dims,
            self.execution_order().join(" -> ")
        );
        Ok(())
    }

    /// Runs every pass once in execution order, first reallocating if a
    /// property change since the last compile altered a reflection.
    pub fn execute<C: RenderContext + ?Sized>(
        &mut self,
        ctx: &mut C,
    ) -> Result<Vec<(&'static str, ExecuteOutcome)>, PassError> {
        let Some(dims) = self.compiled_for else {
            return Err(PassError::Graph("execute before compile".into()));
        };
        self.refresh(ctx, dims)?;
        let mut outcomes = Vec::with_capacity(self.order.len());
        for &i in &self.order {
            let node = &mut self.nodes[i];
            let outcome = node.pass.execute(ctx, &self.resources[i])?;
            outcomes.push((node.name, outcome));
        }
        Ok(outcomes)
    }
}
