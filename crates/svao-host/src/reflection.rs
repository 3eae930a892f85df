//! Declared pass inputs and outputs.

use svao_geom::Resolution;

use crate::{BindFlags, ResourceFormat};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Input,
    Output,
    InputOutput,
    /// Scratch texture owned by the pass; never wired to other passes.
    Internal,
}

impl FieldKind {
    #[inline]
    pub fn reads(self) -> bool {
        matches!(self, FieldKind::Input | FieldKind::InputOutput)
    }

    #[inline]
    pub fn writes(self) -> bool {
        matches!(self, FieldKind::Output | FieldKind::InputOutput)
    }

    /// Allocated by the graph rather than taken from a producer.
    #[inline]
    pub fn allocates(self) -> bool {
        matches!(self, FieldKind::Output | FieldKind::InputOutput | FieldKind::Internal)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldSize {
    /// Graph default resolution.
    Default,
    Fixed(Resolution),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: FieldKind,
    pub format: Option<ResourceFormat>,
    pub bind_flags: BindFlags,
    pub size: FieldSize,
    pub array_size: u32,
}

impl Field {
    fn new(name: &'static str, description: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            description,
            kind,
            format: None,
            bind_flags: BindFlags::SHADER_RESOURCE,
            size: FieldSize::Default,
            array_size: 1,
        }
    }

    pub fn format(&mut self, format: ResourceFormat) -> &mut Self {
        self.format = Some(format);
        self
    }

    pub fn bind_flags(&mut self, flags: BindFlags) -> &mut Self {
        self.bind_flags = flags;
        self
    }

    pub fn texture_2d(&mut self, size: Resolution) -> &mut Self {
        self.size = FieldSize::Fixed(size);
        self
    }

    pub fn array_size(&mut self, n: u32) -> &mut Self {
        self.array_size = n;
        self
    }

    /// Concrete extent given the graph default.
    pub fn resolve_size(&self, default_dims: Resolution) -> Resolution {
        match self.size {
            FieldSize::Default => default_dims,
            FieldSize::Fixed(r) => r,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderPassReflection {
    fields: Vec<Field>,
}

impl RenderPassReflection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_input(&mut self, name: &'static str, description: &'static str) -> &mut Field {
        self.push(Field::new(name, description, FieldKind::Input))
    }

    pub fn add_output(&mut self, name: &'static str, description: &'static str) -> &mut Field {
        self.push(Field::new(name, description, FieldKind::Output))
    }

    pub fn add_input_output(
        &mut self,
        name: &'static str,
        description: &'static str,
    ) -> &mut Field {
        self.push(Field::new(name, description, FieldKind::InputOutput))
    }

    pub fn add_internal(&mut self, name: &'static str, description: &'static str) -> &mut Field {
        self.push(Field::new(name, description, FieldKind::Internal))
    }

    fn push(&mut self, field: Field) -> &mut Field {
        self.fields.retain(|f| f.name != field.name);
        self.fields.push(field);
        let last = self.fields.len() - 1;
        &mut self.fields[last]
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.kind.reads())
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.kind.writes())
    }
}
