//! Per-frame name → texture table handed to `execute`.

use hashbrown::HashMap;
use svao_geom::Resolution;

use crate::{RenderData, TextureId};

/// Name → texture table for one frame. Graphs build one per pass.
#[derive(Clone, Debug)]
pub struct FrameResources {
    textures: HashMap<String, TextureId>,
    default_dims: Resolution,
}

impl FrameResources {
    pub fn new(default_dims: Resolution) -> Self {
        Self {
            textures: HashMap::new(),
            default_dims,
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, texture: TextureId) -> Option<TextureId> {
        self.textures.insert(name.into(), texture)
    }

    pub fn with(mut self, name: impl Into<String>, texture: TextureId) -> Self {
        self.insert(name, texture);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<TextureId> {
        self.textures.remove(name)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

impl RenderData for FrameResources {
    fn texture(&self, name: &str) -> Option<TextureId> {
        self.textures.get(name).copied()
    }

    fn default_texture_dims(&self) -> Resolution {
        self.default_dims
    }
}
