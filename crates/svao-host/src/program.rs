//! Program descriptions, preprocessor defines and shader variable bindings.

use std::collections::BTreeMap;
use std::fmt;

use svao_geom::{Float2, Mat4};

use crate::{BufferId, SamplerId, TextureId};

/// Ordered preprocessor defines. Later inserts overwrite earlier ones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DefineList {
    entries: BTreeMap<String, String>,
}

impl DefineList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl ToString) -> &mut Self {
        self.entries.insert(name.into(), value.to_string());
        self
    }

    pub fn extend(&mut self, other: &DefineList) -> &mut Self {
        for (k, v) in &other.entries {
            self.entries.insert(k.clone(), v.clone());
        }
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for DefineList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.entries {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgramKind {
    Compute { entry: &'static str },
    Raster { vs: &'static str, ps: &'static str },
    RayTracing { raygen: &'static str, miss: &'static str, hit: &'static str },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramDesc {
    pub source: &'static str,
    pub kind: ProgramKind,
    pub defines: DefineList,
}

impl ProgramDesc {
    pub fn compute(source: &'static str, defines: DefineList) -> Self {
        Self {
            source,
            kind: ProgramKind::Compute { entry: "main" },
            defines,
        }
    }

    pub fn raster(source: &'static str, defines: DefineList) -> Self {
        Self {
            source,
            kind: ProgramKind::Raster {
                vs: "vsMain",
                ps: "psMain",
            },
            defines,
        }
    }

    pub fn ray_tracing(source: &'static str, defines: DefineList) -> Self {
        Self {
            source,
            kind: ProgramKind::RayTracing {
                raygen: "rayGen",
                miss: "miss",
                hit: "anyHit",
            },
            defines,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ShaderValue {
    Texture(TextureId),
    Sampler(SamplerId),
    Buffer(BufferId),
    Float(f32),
    Float2(Float2),
    Int(i32),
    Uint(u32),
    Mat4(Mat4),
    FloatArray(Vec<f32>),
}

/// Flat binding set keyed by dotted path (`"PerFrameCB.frameIndex"`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShaderVars {
    values: BTreeMap<String, ShaderValue>,
}

impl ShaderVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: impl Into<String>, value: ShaderValue) -> &mut Self {
        self.values.insert(path.into(), value);
        self
    }

    pub fn get(&self, path: &str) -> Option<&ShaderValue> {
        self.values.get(path)
    }

    pub fn texture(&self, path: &str) -> Option<TextureId> {
        match self.values.get(path) {
            Some(ShaderValue::Texture(t)) => Some(*t),
            _ => None,
        }
    }

    pub fn int(&self, path: &str) -> Option<i32> {
        match self.values.get(path) {
            Some(ShaderValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn uint(&self, path: &str) -> Option<u32> {
        match self.values.get(path) {
            Some(ShaderValue::Uint(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn float(&self, path: &str) -> Option<f32> {
        match self.values.get(path) {
            Some(ShaderValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ShaderValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
