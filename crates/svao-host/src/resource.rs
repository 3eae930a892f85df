//! Resource descriptions and opaque handles.

use svao_geom::Resolution;

macro_rules! handle {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);
    };
}

handle!(TextureId);
handle!(SamplerId);
handle!(BufferId);
handle!(ProgramId);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceFormat {
    R8Unorm,
    R32Uint,
    R32Int,
    R32Float,
    Rgba32Float,
    D32Float,
}

impl ResourceFormat {
    pub fn bytes_per_texel(self) -> u32 {
        match self {
            ResourceFormat::R8Unorm => 1,
            ResourceFormat::R32Uint
            | ResourceFormat::R32Int
            | ResourceFormat::R32Float
            | ResourceFormat::D32Float => 4,
            ResourceFormat::Rgba32Float => 16,
        }
    }

    #[inline]
    pub fn is_depth(self) -> bool {
        matches!(self, ResourceFormat::D32Float)
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct BindFlags: u32 {
        const SHADER_RESOURCE  = 0x01;
        const UNORDERED_ACCESS = 0x02;
        const RENDER_TARGET    = 0x04;
        const DEPTH_STENCIL    = 0x08;
        const ALL_COLOR_VIEWS  = Self::SHADER_RESOURCE.bits()
            | Self::UNORDERED_ACCESS.bits()
            | Self::RENDER_TARGET.bits();
        const ALL_DEPTH_VIEWS  = Self::SHADER_RESOURCE.bits() | Self::DEPTH_STENCIL.bits();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub size: Resolution,
    pub format: ResourceFormat,
    pub mip_levels: u32,
    pub array_size: u32,
    pub bind_flags: BindFlags,
}

impl TextureDesc {
    pub fn new_2d(size: Resolution, format: ResourceFormat) -> Self {
        Self {
            size,
            format,
            mip_levels: 1,
            array_size: 1,
            bind_flags: BindFlags::SHADER_RESOURCE,
        }
    }

    pub fn with_array_size(mut self, array_size: u32) -> Self {
        self.array_size = array_size;
        self
    }

    pub fn with_bind_flags(mut self, flags: BindFlags) -> Self {
        self.bind_flags = flags;
        self
    }

    /// Bytes in mip 0 across all slices.
    pub fn byte_size(&self) -> u64 {
        self.size.area() * u64::from(self.format.bytes_per_texel()) * u64::from(self.array_size)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Filter {
    Point,
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Clamp,
    Wrap,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub filter: Filter,
    pub address: AddressMode,
}

impl SamplerDesc {
    pub const POINT_WRAP: SamplerDesc = SamplerDesc {
        filter: Filter::Point,
        address: AddressMode::Wrap,
    };
    pub const POINT_CLAMP: SamplerDesc = SamplerDesc {
        filter: Filter::Point,
        address: AddressMode::Clamp,
    };
    pub const LINEAR_CLAMP: SamplerDesc = SamplerDesc {
        filter: Filter::Linear,
        address: AddressMode::Clamp,
    };
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClearValue {
    Float([f32; 4]),
    Int([i32; 4]),
    Uint([u32; 4]),
}

impl ClearValue {
    pub fn splat_f32(v: f32) -> Self {
        ClearValue::Float([v; 4])
    }
}
