use std::rc::Rc;

use svao_geom::Resolution;
use svao_host::headless::{Command, HeadlessGpu, HeadlessScene};
use svao_host::{
    ClearValue, CompileData, Device, FrameResources, ProgramId, Properties, RenderPassReflection, ResourceFormat,
    Scene, ShaderValue, ShaderVars, TextureDesc, UpdateFlags,
};
use svao_passes::{
    AoPass, BilateralBlur, ExecuteOutcome, Lifecycle, LinearizeDepth, NormalsToViewSpace, PassError,
    RecompileReason, RtStochasticDepth, SampleCount, StochasticDepthStratified, bilateral_blur, keys,
    linearize_depth, normals_to_view, prepass, rt_stochastic_depth, stochastic_depth, svao, vao,
};

const HD: Resolution = Resolution::new(1920, 1080);

fn scene() -> Rc<HeadlessScene> {
    Rc::new(HeadlessScene::with_default_camera(16.0 / 9.0))
}

fn frame_for(gpu: &mut HeadlessGpu, r: &RenderPassReflection, dims: Resolution) -> FrameResources {
    let mut frame = FrameResources::new(dims);
    for f in r.fields() {
        let desc = TextureDesc::new_2d(
            f.resolve_size(dims),
            f.format.unwrap_or(ResourceFormat::Rgba32Float),
        )
        .with_array_size(f.array_size);
        frame.insert(f.name, gpu.create_texture_2d(&desc, None).unwrap());
    }
    frame
}

fn vao_frame(gpu: &mut HeadlessGpu, pass: &AoPass, dims: Resolution) -> FrameResources {
    let r = pass.reflect(&CompileData::new(dims)).unwrap();
    frame_for(gpu, &r, dims)
}

fn dispatches(gpu: &HeadlessGpu) -> Vec<(&ShaderVars, Resolution)> {
    gpu.commands()
        .iter()
        .filter_map(|c| match c {
            Command::Dispatch { vars, threads, .. } => Some((vars, *threads)),
            _ => None,
        })
        .collect()
}

#[test]
fn execute_without_scene_is_a_no_op() {
    let mut gpu = HeadlessGpu::new();
    let mut pass = AoPass::vao(&mut gpu, &Properties::new()).unwrap();
    let frame = vao_frame(&mut gpu, &pass, HD);
    assert_eq!(pass.execute(&mut gpu, &frame), Ok(ExecuteOutcome::Detached));
    assert_eq!(pass.frame_index(), 0);
    assert_eq!(pass.lifecycle(), Lifecycle::Uninitialized);
    assert!(gpu.commands().is_empty());
}

#[test]
fn frame_index_advances_once_per_frame() {
    let mut gpu = HeadlessGpu::new();
    let mut pass = AoPass::vao(&mut gpu, &Properties::new()).unwrap();
    pass.set_scene(Some(scene()));
    let frame = vao_frame(&mut gpu, &pass, HD);
    for n in 1..=5u32 {
        let out = pass.execute(&mut gpu, &frame).unwrap();
        assert_eq!(
            out,
            ExecuteOutcome::Dispatched {
                frame_index: n,
                threads: Resolution::new(1920, 1088)
            }
        );
    }
    assert_eq!(pass.frame_index(), 5);
    assert_eq!(pass.compile_count(), 1);
    assert_eq!(pass.lifecycle(), Lifecycle::Executing);
    let last = dispatches(&gpu).pop().unwrap().0;
    assert_eq!(last.uint("PerFrameCB.frameIndex"), Some(5));
}

#[test]
fn missing_input_skips_the_frame() {
    let mut gpu = HeadlessGpu::new();
    let mut pass = AoPass::vao(&mut gpu, &Properties::new()).unwrap();
    pass.set_scene(Some(scene()));
    let mut frame = vao_frame(&mut gpu, &pass, HD);
    pass.execute(&mut gpu, &frame).unwrap();
    let recorded = gpu.commands().len();

    frame.remove(vao::NORMAL_VIEW_IN);
    assert_eq!(
        pass.execute(&mut gpu, &frame),
        Ok(ExecuteOutcome::MissingResource(vao::NORMAL_VIEW_IN))
    );
    assert_eq!(pass.frame_index(), 1);
    assert_eq!(pass.compile_count(), 1);
    assert_eq!(gpu.commands().len(), recorded);
}

#[test]
fn missing_input_before_first_compile_builds_nothing() {
    let mut gpu = HeadlessGpu::new();
    let mut pass = AoPass::svao(&mut gpu, &Properties::new()).unwrap();
    pass.set_scene(Some(scene()));
    let mut frame = vao_frame(&mut gpu, &pass, HD);
    frame.remove(svao::STOCH_DEPTH_IN);
    assert_eq!(
        pass.execute(&mut gpu, &frame),
        Ok(ExecuteOutcome::MissingResource(svao::STOCH_DEPTH_IN))
    );
    assert_eq!(gpu.program_count(), 0);
    assert_eq!(pass.lifecycle(), Lifecycle::Configured);
}

#[test]
fn parameter_change_rebuilds_lazily() {
    let mut gpu = HeadlessGpu::new();
    let mut pass = AoPass::vao(&mut gpu, &Properties::new()).unwrap();
    pass.set_scene(Some(scene()));
    let frame = vao_frame(&mut gpu, &pass, HD);
    pass.execute(&mut gpu, &frame).unwrap();

    pass.set_radius(0.75).unwrap();
    assert_eq!(pass.lifecycle(), Lifecycle::Executing);

    pass.set_sample_count(SampleCount::ThirtyTwo);
    pass.set_sample_count(SampleCount::ThirtyTwo);
    assert_eq!(pass.lifecycle(), Lifecycle::Configured);
    assert_eq!(
        pass.last_recompile_reason(),
        Some(&RecompileReason::ParameterChanged(keys::SAMPLE_COUNT))
    );
    assert_eq!(pass.compile_count(), 1);

    pass.execute(&mut gpu, &frame).unwrap();
    assert_eq!(pass.compile_count(), 2);
    let desc = gpu.program(ProgramId(1)).unwrap();
    assert_eq!(desc.defines.get("NUM_DIRECTIONS"), Some("32"));
    let vars = dispatches(&gpu).pop().unwrap().0;
    assert_eq!(vars.float("StaticCB.radius"), Some(0.75));
}

#[test]
fn resolution_change_recompiles() {
    let mut gpu = HeadlessGpu::new();
    let mut pass = AoPass::vao(&mut gpu, &Properties::new()).unwrap();
    pass.set_scene(Some(scene()));
    let frame = vao_frame(&mut gpu, &pass, HD);
    pass.execute(&mut gpu, &frame).unwrap();

    let small = Resolution::new(1280, 720);
    let frame = vao_frame(&mut gpu, &pass, small);
    let out = pass.execute(&mut gpu, &frame).unwrap();
    assert_eq!(
        out,
        ExecuteOutcome::Dispatched {
            frame_index: 2,
            threads: Resolution::new(1280, 736)
        }
    );
    assert_eq!(pass.compile_count(), 2);
    assert_eq!(
        pass.last_recompile_reason(),
        Some(&RecompileReason::ResolutionChanged { from: HD, to: small })
    );
    assert_eq!(pass.stochastic_map_size(), Resolution::new(576, 436));
}

#[test]
fn scene_recompile_flag_is_honoured_until_cleared() {
    let mut gpu = HeadlessGpu::new();
    let mut pass = AoPass::vao(&mut gpu, &Properties::new()).unwrap();
    let s = scene();
    pass.set_scene(Some(s.clone()));
    let frame = vao_frame(&mut gpu, &pass, HD);
    pass.execute(&mut gpu, &frame).unwrap();

    s.raise(UpdateFlags::RECOMPILE_NEEDED);
    pass.execute(&mut gpu, &frame).unwrap();
    assert_eq!(pass.compile_count(), 2);
    assert_eq!(pass.last_recompile_reason(), Some(&RecompileReason::SceneRequested));

    s.end_frame();
    pass.execute(&mut gpu, &frame).unwrap();
    assert_eq!(pass.compile_count(), 2);
    assert_eq!(pass.frame_index(), 3);
}

#[test]
fn recompile_request_survives_a_skipped_frame() {
    let mut gpu = HeadlessGpu::new();
    let s = scene();
    let mut pass = AoPass::vao(&mut gpu, &Properties::new()).unwrap();
    pass.set_scene(Some(s.clone()));
    let mut frame = vao_frame(&mut gpu, &pass, HD);
    pass.execute(&mut gpu, &frame).unwrap();

    let normals = frame.remove(vao::NORMAL_VIEW_IN).unwrap();
    s.raise(UpdateFlags::RECOMPILE_NEEDED);
    assert_eq!(
        pass.execute(&mut gpu, &frame),
        Ok(ExecuteOutcome::MissingResource(vao::NORMAL_VIEW_IN))
    );
    s.end_frame();

    frame.insert(vao::NORMAL_VIEW_IN, normals);
    assert!(pass.execute(&mut gpu, &frame).unwrap().dispatched());
    assert_eq!(pass.compile_count(), 2);
    assert_eq!(pass.last_recompile_reason(), Some(&RecompileReason::SceneRequested));
}

#[test]
fn rt_recompile_request_survives_a_skipped_frame() {
    let mut gpu = HeadlessGpu::new();
    let s = scene();
    let mut pass = RtStochasticDepth::new(&Properties::new()).unwrap();
    pass.set_scene(Some(s.clone()));
    let r = pass.reflect(&CompileData::new(HD)).unwrap();
    let mut frame = frame_for(&mut gpu, &r, HD);
    pass.execute(&mut gpu, &frame).unwrap();

    let depth = frame.remove(rt_stochastic_depth::LINEAR_DEPTH_IN).unwrap();
    s.raise(UpdateFlags::RECOMPILE_NEEDED);
    assert!(!pass.execute(&mut gpu, &frame).unwrap().dispatched());
    s.end_frame();

    frame.insert(rt_stochastic_depth::LINEAR_DEPTH_IN, depth);
    assert!(pass.execute(&mut gpu, &frame).unwrap().dispatched());
    assert_eq!(pass.compile_count(), 2);
}

#[test]
fn stratified_recompile_request_survives_a_skipped_frame() {
    let mut gpu = HeadlessGpu::new();
    let s = scene();
    let mut pass = StochasticDepthStratified::new(&mut gpu, &Properties::new()).unwrap();
    pass.set_scene(Some(s.clone()));
    let r = pass.reflect(&CompileData::new(HD)).unwrap();
    let mut frame = frame_for(&mut gpu, &r, HD);
    pass.execute(&mut gpu, &frame).unwrap();

    let depth = frame.remove(stochastic_depth::DEPTH_IN).unwrap();
    s.raise(UpdateFlags::RECOMPILE_NEEDED);
    assert!(!pass.execute(&mut gpu, &frame).unwrap().dispatched());
    s.end_frame();

    frame.insert(stochastic_depth::DEPTH_IN, depth);
    assert!(pass.execute(&mut gpu, &frame).unwrap().dispatched());
    assert_eq!(pass.compile_count(), 2);
}

#[test]
fn detaching_the_scene_stops_dispatch() {
    let mut gpu = HeadlessGpu::new();
    let mut pass = AoPass::vao(&mut gpu, &Properties::new()).unwrap();
    pass.set_scene(Some(scene()));
    let frame = vao_frame(&mut gpu, &pass, HD);
    pass.execute(&mut gpu, &frame).unwrap();
    pass.set_scene(None);
    assert_eq!(pass.execute(&mut gpu, &frame), Ok(ExecuteOutcome::Detached));
    assert_eq!(pass.frame_index(), 1);
    assert!(!pass.has_scene());
}

#[test]
fn vao_clears_outputs_and_ray_bounds() {
    let mut gpu = HeadlessGpu::new();
    let props = Properties::new()
        .with(keys::SVAO_INPUT_MODE, true)
        .with(keys::USE_RAY_INTERVAL, true);
    let mut pass = AoPass::vao(&mut gpu, &props).unwrap();
    pass.set_scene(Some(scene()));
    let frame = vao_frame(&mut gpu, &pass, HD);
    pass.execute(&mut gpu, &frame).unwrap();

    let cmds = gpu.commands();
    assert_eq!(cmds.len(), 4);
    assert_eq!(
        cmds[0],
        Command::Clear {
            texture: svao_host::RenderData::texture(&frame, vao::AO_OUT).unwrap(),
            value: ClearValue::Float([1.0; 4]),
        }
    );
    assert!(matches!(cmds[1], Command::Clear { value: ClearValue::Int([0x7f80_0000, ..]), .. }));
    assert!(matches!(cmds[2], Command::Clear { value: ClearValue::Int([0, 0, 0, 0]), .. }));
    let vars = cmds[3].vars().unwrap();
    assert!(vars.texture("gAOMaskOut").is_some());
    assert!(vars.texture("gRayMinOut").is_some());
    assert_eq!(vars.int("PerFrameCB.guardBand"), Some(128));
}

#[test]
fn vao_reflection_sizes_ray_bounds_by_the_stochastic_map() {
    let mut gpu = HeadlessGpu::new();
    let props = Properties::new().with(keys::USE_RAY_INTERVAL, true);
    let pass = AoPass::vao(&mut gpu, &props).unwrap();
    let r = pass.reflect(&CompileData::new(HD)).unwrap();
    let ray_min = r.field(vao::RAY_MIN_OUT).unwrap();
    assert_eq!(ray_min.resolve_size(HD), Resolution::new(736, 526));
    assert_eq!(ray_min.format, Some(ResourceFormat::R32Int));
    assert!(r.field(vao::AO_MASK_OUT).is_none());
    assert!(r.field(vao::AO_PREPASS_IN).is_none());
}

#[test]
fn prepass_dispatches_over_the_coarse_mask() {
    let mut gpu = HeadlessGpu::new();
    let mut pass = AoPass::prepass(&mut gpu, &Properties::new().with(keys::AO_THRESHOLD, 0.25f32)).unwrap();
    pass.set_scene(Some(scene()));
    let r = pass.reflect(&CompileData::new(HD)).unwrap();
    assert_eq!(
        r.field(prepass::AO_MASK_OUT).unwrap().resolve_size(HD),
        Resolution::new(240, 135)
    );
    let frame = frame_for(&mut gpu, &r, HD);
    let out = pass.execute(&mut gpu, &frame).unwrap();
    assert_eq!(
        out,
        ExecuteOutcome::Dispatched {
            frame_index: 1,
            threads: Resolution::new(256, 160)
        }
    );
    let (vars, _) = dispatches(&gpu).pop().unwrap();
    assert_eq!(vars.float("StaticCB.gAOThreshold"), Some(0.25));
    assert_eq!(vars.int("PerFrameCB.guardBand"), Some(0));
}

#[test]
fn svao_reads_the_stochastic_map() {
    let mut gpu = HeadlessGpu::new();
    let mut pass = AoPass::svao(&mut gpu, &Properties::new()).unwrap();
    pass.set_scene(Some(scene()));
    let frame = vao_frame(&mut gpu, &pass, HD);
    pass.execute(&mut gpu, &frame).unwrap();

    let data: &dyn svao_host::RenderData = &frame;
    let (vars, _) = dispatches(&gpu).pop().unwrap();
    assert_eq!(vars.texture("gLinearSDIn"), data.texture(svao::STOCH_DEPTH_IN));
    assert_eq!(vars.texture("gLinearDepthIn"), data.texture(svao::LINEAR_DEPTH_IN));
    assert_ne!(vars.texture("gLinearSDIn"), vars.texture("gLinearDepthIn"));
    assert!(vars.get("gStratifiedLookUp").is_some());
    // SVAO refines in place: nothing is cleared.
    assert!(!gpu.commands().iter().any(|c| matches!(c, Command::Clear { .. })));
    let desc = gpu.program(ProgramId(0)).unwrap();
    assert_eq!(desc.defines.get("SECONDARY_DEPTH_MODE"), Some("1"));
    assert_eq!(desc.defines.get("STOCHASTIC_DEPTH_SAMPLES"), Some("4"));
}

#[test]
fn invalid_construction_properties_fail_fast() {
    let mut gpu = HeadlessGpu::new();
    let cases = [
        Properties::new().with(keys::SAMPLE_COUNT, 12u32),
        Properties::new().with(keys::RESOLUTION_DIVISOR, 0u32),
        Properties::new().with(keys::RESOLUTION_DIVISOR, 5u32),
        Properties::new().with(keys::RADIUS, -1.0f32),
        Properties::new().with(keys::ADAPTIVE_SAMPLING_DISTANCES, vec![4.0f32, 2.0]),
    ];
    for props in &cases {
        assert!(matches!(
            AoPass::vao(&mut gpu, props),
            Err(PassError::InvalidProperty { .. })
        ));
    }
    assert!(matches!(
        AoPass::vao(&mut gpu, &Properties::new().with(keys::ENABLE_GUARD_BAND, 1u32)),
        Err(PassError::Host(_))
    ));
}

#[test]
fn properties_round_trip_through_construction() {
    let mut gpu = HeadlessGpu::new();
    let props = Properties::new()
        .with(keys::RADIUS, 1.5f32)
        .with(keys::SAMPLE_COUNT, 16u32)
        .with(keys::RESOLUTION_DIVISOR, 2u32)
        .with(keys::ENABLE_ADAPTIVE_SAMPLING, true)
        .with(keys::ADAPTIVE_SAMPLING_DISTANCES, vec![3.0f32, 9.0])
        .with(keys::USE_PREPASS, true)
        .with(keys::PREPASS_SAMPLING_MODE, "Griddy");
    let a = AoPass::vao(&mut gpu, &props).unwrap();
    let b = AoPass::vao(&mut gpu, &a.properties()).unwrap();
    assert_eq!(a.settings(), b.settings());
    assert_eq!(a.variant(), b.variant());
    assert_eq!(a.properties(), b.properties());

    let p = AoPass::prepass(&mut gpu, &Properties::new().with(keys::AO_THRESHOLD, 0.3f32)).unwrap();
    let q = AoPass::prepass(&mut gpu, &p.properties()).unwrap();
    assert_eq!(p.variant(), q.variant());

    let rt = RtStochasticDepth::new(&Properties::new().with(keys::USE_RAY_INTERVAL, true)).unwrap();
    assert_eq!(RtStochasticDepth::new(&rt.properties()).unwrap().config(), rt.config());

    let sd = StochasticDepthStratified::new(&mut gpu, &Properties::new().with(keys::NUM_SAMPLES, 12u32)).unwrap();
    let sd2 = StochasticDepthStratified::new(&mut gpu, &sd.properties()).unwrap();
    assert_eq!(sd.config(), sd2.config());
}

#[test]
fn rt_stochastic_depth_launches_over_the_map() {
    let mut gpu = HeadlessGpu::new();
    let props = Properties::new()
        .with(keys::RESOLUTION_DIVISOR, 4u32)
        .with(keys::USE_RAY_INTERVAL, true);
    let mut pass = RtStochasticDepth::new(&props).unwrap();
    pass.set_scene(Some(scene()));
    let r = pass.reflect(&CompileData::new(HD)).unwrap();
    let out = r.field(rt_stochastic_depth::STOCHASTIC_DEPTH_OUT).unwrap();
    assert_eq!(out.format, Some(ResourceFormat::Rgba32Float));
    let frame = frame_for(&mut gpu, &r, HD);
    let outcome = pass.execute(&mut gpu, &frame).unwrap();
    assert_eq!(
        outcome,
        ExecuteOutcome::Dispatched {
            frame_index: 1,
            threads: Resolution::new(736, 526)
        }
    );
    match gpu.commands().last().unwrap() {
        Command::RayTrace { vars, launch, .. } => {
            assert_eq!(*launch, Resolution::new(736, 526));
            assert!(vars.texture("gRayMinIn").is_some());
            assert_eq!(vars.int("PerFrameCB.guardBand"), Some(128));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn rt_stochastic_depth_skips_without_ray_bounds() {
    let mut gpu = HeadlessGpu::new();
    let mut pass = RtStochasticDepth::new(&Properties::new().with(keys::USE_RAY_INTERVAL, true)).unwrap();
    pass.set_scene(Some(scene()));
    let r = pass.reflect(&CompileData::new(HD)).unwrap();
    let mut frame = frame_for(&mut gpu, &r, HD);
    frame.remove(rt_stochastic_depth::RAY_MAX_IN);
    assert_eq!(
        pass.execute(&mut gpu, &frame),
        Ok(ExecuteOutcome::MissingResource(rt_stochastic_depth::RAY_MAX_IN))
    );
    assert_eq!(pass.frame_index(), 0);
}

#[test]
fn stratified_depth_rasterizes_into_the_layer_array() {
    let mut gpu = HeadlessGpu::new();
    let mut pass = StochasticDepthStratified::new(&mut gpu, &Properties::new()).unwrap();
    pass.set_scene(Some(scene()));
    let r = pass.reflect(&CompileData::new(HD)).unwrap();
    let out = r.field(stochastic_depth::STOCHASTIC_DEPTH_OUT).unwrap();
    assert_eq!(out.array_size, 8);
    assert_eq!(out.resolve_size(HD), Resolution::new(480, 270));

    let frame = frame_for(&mut gpu, &r, HD);
    assert!(pass.execute(&mut gpu, &frame).unwrap().dispatched());
    assert!(pass.execute(&mut gpu, &frame).unwrap().dispatched());
    assert_eq!(pass.table_builds(), 1);
    assert_eq!(gpu.buffer_count(), 2);
    let cmds = gpu.commands();
    assert!(matches!(cmds[0], Command::Clear { value: ClearValue::Float([1.0, 1.0, 1.0, 1.0]), .. }));
    match &cmds[1] {
        Command::Rasterize { vars, .. } => {
            assert_eq!(vars.float("gNear"), Some(0.1));
            assert_eq!(vars.float("gFar"), Some(1000.0));
            assert!(vars.get("gStratifiedIndices").is_some());
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn stratified_depth_without_input_is_skipped() {
    let mut gpu = HeadlessGpu::new();
    let mut pass = StochasticDepthStratified::new(&mut gpu, &Properties::new()).unwrap();
    pass.set_scene(Some(scene()));
    let frame = FrameResources::new(HD);
    assert_eq!(
        pass.execute(&mut gpu, &frame),
        Ok(ExecuteOutcome::MissingResource(stochastic_depth::DEPTH_IN))
    );
    assert!(gpu.commands().is_empty());
}

#[test]
fn stratified_depth_rejects_intractable_tables_up_front() {
    let mut gpu = HeadlessGpu::new();
    let err = StochasticDepthStratified::new(&mut gpu, &Properties::new().with(keys::NUM_SAMPLES, 24u32))
        .err()
        .unwrap();
    assert!(matches!(err, PassError::InvalidProperty { key: "numSamples", .. }));

    let mut pass =
        StochasticDepthStratified::new(&mut gpu, &Properties::new().with(keys::NUM_SAMPLES, 20u32)).unwrap();
    assert!(pass.apply_properties(&Properties::new().with(keys::NUM_SAMPLES, 21u32)).is_err());
    assert_eq!(pass.config().num_samples, 20);
    pass.compile(&mut gpu, &CompileData::new(Resolution::new(64, 64))).unwrap();
    assert_eq!(pass.table_builds(), 1);
}

#[test]
fn scene_handle_is_shared() {
    let s = scene();
    let as_dyn: Rc<dyn Scene> = s.clone();
    assert_eq!(Rc::strong_count(&s), 2);
    assert!(as_dyn.updates().is_empty());
}

#[test]
fn linearize_depth_binds_the_camera_planes() {
    let mut gpu = HeadlessGpu::new();
    let s = scene();
    let mut pass = LinearizeDepth::new(&mut gpu, &Properties::new()).unwrap();
    let r = pass.reflect(&CompileData::new(HD)).unwrap();
    let out = r.field(linearize_depth::LINEAR_DEPTH_OUT).unwrap();
    assert_eq!(out.format, Some(ResourceFormat::R32Float));
    let mut frame = frame_for(&mut gpu, &r, HD);
    assert_eq!(pass.execute(&mut gpu, &frame), Ok(ExecuteOutcome::Detached));

    pass.set_scene(Some(s.clone()));
    assert!(pass.execute(&mut gpu, &frame).unwrap().dispatched());
    let target = frame.remove(linearize_depth::LINEAR_DEPTH_OUT).unwrap();
    match gpu.commands().last().unwrap() {
        Command::Rasterize { vars, target: t, .. } => {
            assert_eq!(*t, target);
            assert_eq!(vars.float("gNearPlane"), Some(0.1));
            assert_eq!(vars.float("gFarPlane"), Some(1000.0));
            assert!(vars.texture("gInDepthTex").is_some());
        }
        other => panic!("unexpected {other:?}"),
    }

    s.raise(UpdateFlags::RECOMPILE_NEEDED);
    assert_eq!(
        pass.execute(&mut gpu, &frame),
        Ok(ExecuteOutcome::MissingResource(linearize_depth::LINEAR_DEPTH_OUT))
    );
    s.end_frame();
    frame.insert(linearize_depth::LINEAR_DEPTH_OUT, target);
    assert!(pass.execute(&mut gpu, &frame).unwrap().dispatched());
    assert_eq!(pass.compile_count(), 2);
    assert_eq!(pass.frame_index(), 2);
}

#[test]
fn normals_are_rotated_by_the_view_matrix() {
    let mut gpu = HeadlessGpu::new();
    let s = scene();
    let mut pass = NormalsToViewSpace::new(&Properties::new());
    pass.set_scene(Some(s.clone()));
    let r = pass.reflect(&CompileData::new(HD)).unwrap();
    let mut frame = frame_for(&mut gpu, &r, HD);
    assert!(pass.execute(&mut gpu, &frame).unwrap().dispatched());
    match gpu.commands().last().unwrap() {
        Command::Rasterize { vars, .. } => {
            assert_eq!(vars.get("PerFrameCB.gViewMat"), Some(&ShaderValue::Mat4(s.camera().view)));
            assert!(vars.texture("gNormalsWorldIn").is_some());
        }
        other => panic!("unexpected {other:?}"),
    }

    frame.remove(normals_to_view::NORMALS_WORLD_IN);
    assert_eq!(
        pass.execute(&mut gpu, &frame),
        Ok(ExecuteOutcome::MissingResource(normals_to_view::NORMALS_WORLD_IN))
    );
    assert_eq!(pass.frame_index(), 1);

    pass.set_scene(Some(s));
    assert_eq!(pass.lifecycle(), Lifecycle::Configured);
}

#[test]
fn blur_runs_without_a_scene_and_rebuilds_on_resize() {
    let mut gpu = HeadlessGpu::new();
    let props = Properties::new().with(bilateral_blur::KERNEL_SIZE, 4u32);
    let mut pass = BilateralBlur::new(&mut gpu, &props).unwrap();
    let r = pass.reflect(&CompileData::new(HD)).unwrap();
    assert_eq!(r.outputs().count(), 1);
    let frame = frame_for(&mut gpu, &r, HD);

    assert!(pass.execute(&mut gpu, &frame).unwrap().dispatched());
    assert!(pass.execute(&mut gpu, &frame).unwrap().dispatched());
    assert_eq!(pass.compile_count(), 1);
    assert_eq!(gpu.program_count(), 2);
    let horizontal = gpu.program(ProgramId(0)).unwrap();
    assert_eq!(horizontal.defines.get("KERNEL_RADIUS"), Some("4"));
    assert_eq!(horizontal.defines.get("DIRECTION"), Some("float2(1.f, 0.f)"));
    let vertical = gpu.program(ProgramId(1)).unwrap();
    assert_eq!(vertical.defines.get("DIRECTION"), Some("float2(0.f, 1.f)"));

    let small = Resolution::new(320, 180);
    let r = pass.reflect(&CompileData::new(small)).unwrap();
    let frame = frame_for(&mut gpu, &r, small);
    assert!(pass.execute(&mut gpu, &frame).unwrap().dispatched());
    assert_eq!(pass.compile_count(), 2);

    pass.apply_properties(&Properties::new().with(bilateral_blur::NUM_ITERATIONS, 3u32)).unwrap();
    assert!(pass.execute(&mut gpu, &frame).unwrap().dispatched());
    assert_eq!(pass.compile_count(), 2);
    assert_eq!(pass.frame_index(), 4);
}
