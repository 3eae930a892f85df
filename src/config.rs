use std::error::Error;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use svao_geom::Resolution;
use svao_host::Properties;
use svao_passes::GraphDesc;

/// Graph file: target extent plus one property table per pass. A missing
/// table leaves that pass out of the graph.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphConfig {
    pub width: u32,
    pub height: u32,
    pub linearize_depth: Option<Properties>,
    pub normals_to_view: Option<Properties>,
    pub prepass: Option<Properties>,
    pub vao: Option<Properties>,
    pub rt_stochastic_depth: Option<Properties>,
    pub svao: Option<Properties>,
    pub stochastic_depth: Option<Properties>,
    pub bilateral_blur: Option<Properties>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            linearize_depth: None,
            normals_to_view: None,
            prepass: None,
            vao: None,
            rt_stochastic_depth: None,
            svao: None,
            stochastic_depth: None,
            bilateral_blur: None,
        }
    }
}

impl GraphConfig {
    pub fn from_toml_str(toml_str: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: GraphConfig = toml::from_str(toml_str)?;
        if cfg.width == 0 || cfg.height == 0 {
            return Err(format!("graph resolution must be non-zero (got {}x{})", cfg.width, cfg.height).into());
        }
        Ok(cfg)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let path = path.as_ref();
        let s = fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
        Self::from_toml_str(&s)
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn graph_desc(&self) -> GraphDesc {
        GraphDesc {
            linearize_depth: self.linearize_depth.clone(),
            normals_to_view: self.normals_to_view.clone(),
            prepass: self.prepass.clone(),
            vao: self.vao.clone(),
            rt_stochastic_depth: self.rt_stochastic_depth.clone(),
            svao: self.svao.clone(),
            stochastic_depth: self.stochastic_depth.clone(),
            bilateral_blur: self.bilateral_blur.clone(),
        }
    }
}
