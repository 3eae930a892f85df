use std::rc::Rc;

use svao_geom::Resolution;
use svao_host::headless::{Command, HeadlessGpu, HeadlessScene};
use svao_host::{CompileData, FrameResources, Properties, RenderPassReflection, Scene, TextureDesc};

use super::*;
use crate::common::{AoCommonState, GUARD_BAND};

const HD: Resolution = Resolution::new(1920, 1080);

fn bind_reflection(gpu: &mut HeadlessGpu, r: &RenderPassReflection, dims: Resolution) -> FrameResources {
    let mut frame = FrameResources::new(dims);
    for f in r.fields() {
        let desc = TextureDesc::new_2d(
            f.resolve_size(dims),
            f.format.unwrap_or(svao_host::ResourceFormat::Rgba32Float),
        )
        .with_array_size(f.array_size);
        let t = svao_host::Device::create_texture_2d(gpu, &desc, None).unwrap();
        frame.insert(f.name, t);
    }
    frame
}

fn last_dispatch_vars(gpu: &HeadlessGpu) -> &svao_host::ShaderVars {
    gpu.commands()
        .iter()
        .rev()
        .find_map(|c| match c {
            Command::Dispatch { vars, .. } => Some(vars),
            _ => None,
        })
        .unwrap()
}

#[test]
fn guard_band_constant_follows_the_toggle() {
    for (guard, expected) in [(true, 128), (false, 0)] {
        let mut gpu = HeadlessGpu::new();
        let props = Properties::new().with(keys::ENABLE_GUARD_BAND, guard);
        let mut pass = AoPass::vao(&mut gpu, &props).unwrap();
        let scene: Rc<dyn Scene> = Rc::new(HeadlessScene::with_default_camera(16.0 / 9.0));
        pass.set_scene(Some(scene));
        let frame = bind_reflection(&mut gpu, &pass.reflect(&CompileData::new(HD)).unwrap(), HD);
        assert!(pass.execute(&mut gpu, &frame).unwrap().dispatched());
        assert_eq!(last_dispatch_vars(&gpu).int(GUARD_BAND), Some(expected));
        assert_eq!(pass.extra_guard_band(), expected as u32);
    }
}

#[test]
fn hd_stochastic_map_with_guard_band() {
    let mut gpu = HeadlessGpu::new();
    let mut pass = AoPass::vao(&mut gpu, &Properties::new()).unwrap();
    pass.compile(&mut gpu, &CompileData::new(HD)).unwrap();
    assert_eq!(pass.stochastic_map_size(), Resolution::new(736, 526));
    assert_eq!(pass.common.data.sd_guard, 128.0);
    assert_eq!(pass.common.data.low_resolution.x, 480.0);
}

#[test]
fn adaptive_defines_halve_per_band() {
    let mut settings = AoSettings::default();
    settings
        .apply(
            &Properties::new()
                .with(keys::SAMPLE_COUNT, 16u32)
                .with(keys::ENABLE_ADAPTIVE_SAMPLING, true)
                .with(keys::ADAPTIVE_SAMPLING_DISTANCES, vec![5.0f32, 10.0, 20.0]),
        )
        .unwrap();
    assert_eq!(settings.adaptive_band_samples(), vec![16, 8, 4, 4]);

    let mut gpu = HeadlessGpu::new();
    let shared = SharedResources::create(&mut gpu).unwrap();
    let state = AoCommonState::new("VAO", settings, shared);
    let scene = HeadlessScene::with_default_camera(1.0);
    let defines = state.common_defines(&scene, HD);
    assert_eq!(defines.get("ADAPTIVE_SAMPLING"), Some("1"));
    assert_eq!(defines.get("ADAPTIVE_BAND_COUNT"), Some("4"));
    assert_eq!(defines.get("ADAPTIVE_SAMPLE_COUNTS"), Some("16,8,4,4"));
    assert_eq!(defines.get("NUM_DIRECTIONS"), Some("16"));
    assert_eq!(defines.get("SCENE_GEOMETRY_TYPES"), Some("1"));
}

#[test]
fn rejected_properties_leave_settings_untouched() {
    let mut gpu = HeadlessGpu::new();
    let mut pass = AoPass::vao(&mut gpu, &Properties::new()).unwrap();
    let bad = Properties::new()
        .with(keys::RADIUS, 2.0f32)
        .with(keys::EXPONENT, 0.5f32);
    assert!(matches!(
        pass.apply_properties(&bad),
        Err(PassError::InvalidProperty { key: "kVaoExponent", .. })
    ));
    assert_eq!(pass.settings().radius, 0.5);

    let bad_mode = Properties::new()
        .with(keys::USE_PREPASS, true)
        .with(keys::PREPASS_SAMPLING_MODE, "Sloppy");
    assert!(pass.apply_properties(&bad_mode).is_err());
    assert!(matches!(pass.variant(), AoVariant::Primary(cfg) if !cfg.use_prepass));
}

#[test]
fn prepass_overrides_static_constants() {
    let mut gpu = HeadlessGpu::new();
    let mut pass = AoPass::prepass(&mut gpu, &Properties::new()).unwrap();
    pass.compile(&mut gpu, &CompileData::new(HD)).unwrap();
    assert_eq!(pass.common.data.ao_resolution, svao_geom::Float2::new(240.0, 135.0));
    assert_eq!(pass.common.data.sd_guard, 0.0);
    assert_eq!(pass.common.data.noise_scale, svao_geom::Float2::new(60.0, 33.75));
}

#[test]
fn prepass_program_drops_adaptive_bands() {
    let mut gpu = HeadlessGpu::new();
    let props = Properties::new()
        .with(keys::ENABLE_ADAPTIVE_SAMPLING, true)
        .with(keys::ADAPTIVE_SAMPLING_DISTANCES, vec![4.0f32]);
    let mut pass = AoPass::prepass(&mut gpu, &props).unwrap();
    pass.set_scene(Some(Rc::new(HeadlessScene::with_default_camera(1.0))));
    pass.compile(&mut gpu, &CompileData::new(HD)).unwrap();
    let desc = gpu.program(svao_host::ProgramId(0)).unwrap();
    assert_eq!(desc.defines.get("ADAPTIVE_SAMPLING"), Some("0"));
    assert_eq!(desc.defines.get("NUM_DIRECTIONS"), Some("8"));
    assert!(!desc.defines.contains("ADAPTIVE_BAND_COUNT"));
}

#[test]
fn svao_uploads_four_layer_tables_once() {
    let mut gpu = HeadlessGpu::new();
    let mut pass = AoPass::svao(&mut gpu, &Properties::new()).unwrap();
    pass.set_scene(Some(Rc::new(HeadlessScene::with_default_camera(1.0))));
    pass.compile(&mut gpu, &CompileData::new(HD)).unwrap();
    assert_eq!(gpu.buffer_count(), 2);
    let (label, lookup) = gpu.buffer(svao_host::BufferId(1)).unwrap();
    assert_eq!(label, "gStratifiedLookUp");
    assert_eq!(lookup.len(), 16);

    pass.set_radius(1.0).unwrap();
    pass.set_sample_count(SampleCount::Sixteen);
    pass.compile(&mut gpu, &CompileData::new(HD)).unwrap();
    assert_eq!(pass.compile_count(), 2);
    assert_eq!(gpu.buffer_count(), 2);
    assert_eq!(pass.common.tables.builds(), 1);
}
