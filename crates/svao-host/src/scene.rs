use svao_geom::{Mat4, Vec3};

use crate::{DefineList, ShaderValue, ShaderVars};

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct UpdateFlags: u32 {
        const CAMERA_MOVED     = 0x01;
        const GEOMETRY_CHANGED = 0x02;
        const RECOMPILE_NEEDED = 0x04;
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub view: Mat4,
    pub proj: Mat4,
    pub near: f32,
    pub far: f32,
    pub fov_y: f32,
}

impl Camera {
    pub fn look_at(position: Vec3, target: Vec3, fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            view: Mat4::look_at_rh(position, target, Vec3::UP),
            proj: Mat4::perspective_rh(fov_y, aspect, near, far),
            near,
            far,
            fov_y,
        }
    }

    /// Angle subtended by one pixel at the center of a `height`-pixel target.
    pub fn pixel_spread_angle(&self, height: u32) -> f32 {
        if height == 0 {
            return 0.0;
        }
        ((2.0 * (0.5 * self.fov_y).tan()) / height as f32).atan()
    }

    #[inline]
    pub fn inverse_view(&self) -> Mat4 {
        self.view.inverse_rigid()
    }

    /// Binds the camera block under `prefix` (e.g. `"PerFrameCB.gCamera"`).
    pub fn bind(&self, vars: &mut ShaderVars, prefix: &str) {
        vars.set(format!("{prefix}.viewMat"), ShaderValue::Mat4(self.view))
            .set(format!("{prefix}.projMat"), ShaderValue::Mat4(self.proj))
            .set(format!("{prefix}.viewProjMat"), ShaderValue::Mat4(self.proj * self.view))
            .set(format!("{prefix}.nearZ"), ShaderValue::Float(self.near))
            .set(format!("{prefix}.farZ"), ShaderValue::Float(self.far));
    }
}

/// Scene as seen by the AO passes.
pub trait Scene {
    fn camera(&self) -> Camera;
    fn scene_defines(&self) -> DefineList;
    /// Flags raised by the scene since the start of the current frame.
    fn updates(&self) -> UpdateFlags;
}
