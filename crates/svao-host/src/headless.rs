//! GPU-less backend that validates handles and records every command.
//!
//! Used by the CLI `simulate` command and as the test double for pass tests.

use std::cell::Cell;

use svao_geom::{Resolution, Vec3};

use crate::{
    BufferId, Camera, ClearValue, DefineList, Device, HostError, ProgramDesc, ProgramId,
    RenderContext, SamplerDesc, SamplerId, Scene, ShaderValue, ShaderVars,
    TextureDesc, TextureId, UpdateFlags,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Clear {
        texture: TextureId,
        value: ClearValue,
    },
    Dispatch {
        program: ProgramId,
        vars: ShaderVars,
        threads: Resolution,
    },
    Rasterize {
        program: ProgramId,
        vars: ShaderVars,
        target: TextureId,
    },
    RayTrace {
        program: ProgramId,
        vars: ShaderVars,
        launch: Resolution,
    },
}

impl Command {
    pub fn program(&self) -> Option<ProgramId> {
        match self {
            Command::Clear { .. } => None,
            Command::Dispatch { program, .. }
            | Command::Rasterize { program, .. }
            | Command::RayTrace { program, .. } => Some(*program),
        }
    }

    pub fn vars(&self) -> Option<&ShaderVars> {
        match self {
            Command::Clear { .. } => None,
            Command::Dispatch { vars, .. }
            | Command::Rasterize { vars, .. }
            | Command::RayTrace { vars, .. } => Some(vars),
        }
    }
}

struct TextureSlot {
    desc: TextureDesc,
    data: Option<Vec<u8>>,
}

#[derive(Default)]
pub struct HeadlessGpu {
    textures: Vec<TextureSlot>,
    samplers: Vec<SamplerDesc>,
    buffers: Vec<(String, Vec<u32>)>,
    programs: Vec<ProgramDesc>,
    commands: Vec<Command>,
}

impl HeadlessGpu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn program(&self, id: ProgramId) -> Option<&ProgramDesc> {
        self.programs.get(id.0 as usize)
    }

    /// Programs created so far; each recompile adds one.
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn texture_data(&self, id: TextureId) -> Option<&[u8]> {
        self.textures.get(id.0 as usize)?.data.as_deref()
    }

    pub fn sampler(&self, id: SamplerId) -> Option<SamplerDesc> {
        self.samplers.get(id.0 as usize).copied()
    }

    pub fn buffer(&self, id: BufferId) -> Option<(&str, &[u32])> {
        self.buffers
            .get(id.0 as usize)
            .map(|(label, data)| (label.as_str(), data.as_slice()))
    }

    fn check_program(&self, id: ProgramId) -> Result<(), HostError> {
        if (id.0 as usize) < self.programs.len() {
            Ok(())
        } else {
            Err(HostError::UnknownProgram(id))
        }
    }

    fn check_texture(&self, id: TextureId) -> Result<(), HostError> {
        if (id.0 as usize) < self.textures.len() {
            Ok(())
        } else {
            Err(HostError::UnknownTexture(id))
        }
    }

    fn check_vars(&self, vars: &ShaderVars) -> Result<(), HostError> {
        for (_, v) in vars.iter() {
            match v {
                ShaderValue::Texture(t) => self.check_texture(*t)?,
                ShaderValue::Sampler(s) if (s.0 as usize) >= self.samplers.len() => {
                    return Err(HostError::UnknownSampler(*s));
                }
                ShaderValue::Buffer(b) if (b.0 as usize) >= self.buffers.len() => {
                    return Err(HostError::UnknownBuffer(*b));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl Device for HeadlessGpu {
    fn create_texture_2d(
        &mut self,
        desc: &TextureDesc,
        data: Option<&[u8]>,
    ) -> Result<TextureId, HostError> {
        if desc.size.is_empty() || desc.array_size == 0 || desc.mip_levels == 0 {
            return Err(HostError::InvalidResource(format!(
                "texture {} x{} mips={}",
                desc.size, desc.array_size, desc.mip_levels
            )));
        }
        if let Some(bytes) = data {
            if bytes.len() as u64 != desc.byte_size() {
                return Err(HostError::InvalidResource(format!(
                    "initial data is {} bytes, texture needs {}",
                    bytes.len(),
                    desc.byte_size()
                )));
            }
        }
        let id = TextureId(self.textures.len() as u32);
        self.textures.push(TextureSlot {
            desc: *desc,
            data: data.map(<[u8]>::to_vec),
        });
        Ok(id)
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerId, HostError> {
        let id = SamplerId(self.samplers.len() as u32);
        self.samplers.push(*desc);
        Ok(id)
    }

    fn create_structured_buffer(&mut self, label: &str, data: &[u32]) -> Result<BufferId, HostError> {
        if data.is_empty() {
            return Err(HostError::InvalidResource(format!("empty buffer `{label}`")));
        }
        let id = BufferId(self.buffers.len() as u32);
        self.buffers.push((label.to_string(), data.to_vec()));
        Ok(id)
    }

    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, HostError> {
        let id = ProgramId(self.programs.len() as u32);
        log::debug!(target: "host", "program {:?} {} [{}]", id, desc.source, desc.defines);
        self.programs.push(desc.clone());
        Ok(id)
    }

    fn texture_desc(&self, id: TextureId) -> Option<TextureDesc> {
        self.textures.get(id.0 as usize).map(|t| t.desc)
    }
}

impl RenderContext for HeadlessGpu {
    fn clear_texture(&mut self, texture: TextureId, value: ClearValue) -> Result<(), HostError> {
        self.check_texture(texture)?;
        self.commands.push(Command::Clear { texture, value });
        Ok(())
    }

    fn dispatch(
        &mut self,
        program: ProgramId,
        vars: &ShaderVars,
        threads: Resolution,
    ) -> Result<(), HostError> {
        self.check_program(program)?;
        self.check_vars(vars)?;
        self.commands.push(Command::Dispatch {
            program,
            vars: vars.clone(),
            threads,
        });
        Ok(())
    }

    fn rasterize(
        &mut self,
        program: ProgramId,
        vars: &ShaderVars,
        target: TextureId,
    ) -> Result<(), HostError> {
        self.check_program(program)?;
        self.check_texture(target)?;
        self.check_vars(vars)?;
        self.commands.push(Command::Rasterize {
            program,
            vars: vars.clone(),
            target,
        });
        Ok(())
    }

    fn raytrace(
        &mut self,
        program: ProgramId,
        vars: &ShaderVars,
        launch: Resolution,
    ) -> Result<(), HostError> {
        self.check_program(program)?;
        self.check_vars(vars)?;
        self.commands.push(Command::RayTrace {
            program,
            vars: vars.clone(),
            launch,
        });
        Ok(())
    }
}

/// Fixed-camera scene with settable update flags.
pub struct HeadlessScene {
    camera: Cell<Camera>,
    defines: DefineList,
    updates: Cell<UpdateFlags>,
}

impl HeadlessScene {
    pub fn new(camera: Camera) -> Self {
        let mut defines = DefineList::new();
        defines.add("SCENE_GEOMETRY_TYPES", 1);
        Self {
            camera: Cell::new(camera),
            defines,
            updates: Cell::new(UpdateFlags::empty()),
        }
    }

    /// 60° camera five units back from the origin.
    pub fn with_default_camera(aspect: f32) -> Self {
        Self::new(Camera::look_at(
            Vec3::new(0.0, 1.0, 5.0),
            Vec3::ZERO,
            std::f32::consts::FRAC_PI_3,
            aspect,
            0.1,
            1000.0,
        ))
    }

    pub fn set_camera(&self, camera: Camera) {
        self.camera.set(camera);
        self.raise(UpdateFlags::CAMERA_MOVED);
    }

    pub fn raise(&self, flags: UpdateFlags) {
        self.updates.set(self.updates.get() | flags);
    }

    /// Called by the frame driver once every pass has run.
    pub fn end_frame(&self) {
        self.updates.set(UpdateFlags::empty());
    }
}

impl Scene for HeadlessScene {
    fn camera(&self) -> Camera {
        self.camera.get()
    }

    fn scene_defines(&self) -> DefineList {
        self.defines.clone()
    }

    fn updates(&self) -> UpdateFlags {
        self.updates.get()
    }
}
