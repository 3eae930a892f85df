use svao_geom::Resolution;
use svao_host::headless::{Command, HeadlessGpu, HeadlessScene};
use svao_host::{
    BindFlags, ClearValue, DefineList, Device, FrameResources, HostError, ProgramDesc, RenderContext, RenderData,
    RenderPassReflection, ResourceFormat, SamplerDesc, Scene, ShaderValue, ShaderVars,
    TextureDesc, TextureId, UpdateFlags,
};

#[test]
fn texture_initial_data_must_match_size() {
    let mut gpu = HeadlessGpu::new();
    let desc = TextureDesc::new_2d(Resolution::new(4, 4), ResourceFormat::R8Unorm);
    assert!(gpu.create_texture_2d(&desc, Some(&[0u8; 16])).is_ok());
    assert!(matches!(
        gpu.create_texture_2d(&desc, Some(&[0u8; 15])),
        Err(HostError::InvalidResource(_))
    ));
    let empty = TextureDesc::new_2d(Resolution::new(0, 4), ResourceFormat::R8Unorm);
    assert!(gpu.create_texture_2d(&empty, None).is_err());
}

#[test]
fn dispatch_records_vars_and_rejects_unknown_handles() {
    let mut gpu = HeadlessGpu::new();
    let tex = gpu
        .create_texture_2d(
            &TextureDesc::new_2d(Resolution::new(8, 8), ResourceFormat::R32Float),
            None,
        )
        .unwrap();
    let prog = gpu
        .create_program(&ProgramDesc::compute("Test.cs.slang", DefineList::new()))
        .unwrap();
    let mut vars = ShaderVars::new();
    vars.set("gOut", ShaderValue::Texture(tex));
    gpu.dispatch(prog, &vars, Resolution::new(32, 32)).unwrap();
    assert_eq!(gpu.commands().len(), 1);
    assert!(matches!(gpu.commands()[0], Command::Dispatch { threads, .. } if threads == Resolution::new(32, 32)));

    vars.set("gBogus", ShaderValue::Texture(TextureId(99)));
    assert_eq!(
        gpu.dispatch(prog, &vars, Resolution::new(32, 32)),
        Err(HostError::UnknownTexture(TextureId(99)))
    );
    assert_eq!(gpu.commands().len(), 1);
}

#[test]
fn clear_and_samplers() {
    let mut gpu = HeadlessGpu::new();
    let s = gpu.create_sampler(&SamplerDesc::POINT_WRAP).unwrap();
    assert_eq!(gpu.sampler(s), Some(SamplerDesc::POINT_WRAP));
    let tex = gpu
        .create_texture_2d(
            &TextureDesc::new_2d(Resolution::new(2, 2), ResourceFormat::R8Unorm),
            None,
        )
        .unwrap();
    gpu.clear_texture(tex, ClearValue::splat_f32(1.0)).unwrap();
    let cmds = gpu.take_commands();
    assert_eq!(
        cmds,
        vec![Command::Clear {
            texture: tex,
            value: ClearValue::Float([1.0; 4])
        }]
    );
    assert!(gpu.commands().is_empty());
}

#[test]
fn frame_resources_lookup() {
    let res = FrameResources::new(Resolution::new(640, 480)).with("linearDepthIn", TextureId(3));
    assert_eq!(res.texture("linearDepthIn"), Some(TextureId(3)));
    assert_eq!(res.texture("normalViewIn"), None);
    assert_eq!(res.default_texture_dims(), Resolution::new(640, 480));
}

#[test]
fn scene_flags_accumulate_until_end_of_frame() {
    let scene = HeadlessScene::with_default_camera(1.0);
    assert!(scene.updates().is_empty());
    scene.raise(UpdateFlags::RECOMPILE_NEEDED);
    scene.set_camera(scene.camera());
    assert!(scene.updates().contains(UpdateFlags::RECOMPILE_NEEDED | UpdateFlags::CAMERA_MOVED));
    scene.end_frame();
    assert!(scene.updates().is_empty());
}

#[test]
fn reflection_builder_replaces_duplicate_names() {
    let mut r = RenderPassReflection::new();
    r.add_input("linearDepthIn", "Linear Depth");
    r.add_output("aoOut", "AO")
        .format(ResourceFormat::R8Unorm)
        .bind_flags(BindFlags::ALL_COLOR_VIEWS);
    r.add_output("aoOut", "AO again").format(ResourceFormat::R32Float);
    assert_eq!(r.fields().len(), 2);
    assert_eq!(r.field("aoOut").and_then(|f| f.format), Some(ResourceFormat::R32Float));
    assert_eq!(r.inputs().count(), 1);
    assert_eq!(r.outputs().count(), 1);
}

#[test]
fn internal_fields_are_allocated_but_not_outputs() {
    let mut r = RenderPassReflection::new();
    r.add_input("colorIn", "Input Texture");
    r.add_internal("tempInternal", "Internal temp texture").format(ResourceFormat::R8Unorm);
    r.add_output("colorOut", "Output Texture").format(ResourceFormat::R8Unorm);
    assert_eq!(r.outputs().count(), 1);
    let temp = r.field("tempInternal").unwrap();
    assert!(temp.kind.allocates() && !temp.kind.reads() && !temp.kind.writes());
    assert!(!r.field("colorIn").unwrap().kind.allocates());
}
