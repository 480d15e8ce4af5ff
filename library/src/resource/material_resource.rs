use crate::resource::parameter_schema::ParameterSchema;
use crate::resource::resource_error::ResourceError;
use crate::resource::texture_binding::{DescriptorSlot, TextureReference};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextureSlotDescriptor {
    name: String,
    #[serde(default)]
    default: TextureReference,
}

impl TextureSlotDescriptor {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn default_reference(&self) -> TextureReference {
        self.default
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SamplerDescriptor {
    name: String,
    #[serde(default)]
    default_slot: DescriptorSlot,
}

impl SamplerDescriptor {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn default_slot(&self) -> DescriptorSlot {
        self.default_slot
    }
}

/// Read-only description of a material asset. Any number of material objects
/// may be built from one instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialResource {
    name: String,
    #[serde(default = "ParameterSchema::empty")]
    parameters: ParameterSchema,
    #[serde(default)]
    textures: Vec<TextureSlotDescriptor>,
    #[serde(default)]
    samplers: Vec<SamplerDescriptor>,
}

impl MaterialResource {
    #[must_use]
    pub fn new(name: impl Into<String>, parameters: ParameterSchema) -> Self {
        Self { name: name.into(), parameters, textures: Vec::new(), samplers: Vec::new() }
    }

    #[must_use]
    pub fn with_texture(mut self, name: impl Into<String>, default: TextureReference) -> Self {
        self.textures.push(TextureSlotDescriptor { name: name.into(), default });
        self
    }

    #[must_use]
    pub fn with_sampler(mut self, name: impl Into<String>, default_slot: DescriptorSlot) -> Self {
        self.samplers.push(SamplerDescriptor { name: name.into(), default_slot });
        self
    }

    pub fn from_json(json: &str) -> Result<Self, ResourceError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ResourceError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn parameters(&self) -> &ParameterSchema {
        &self.parameters
    }

    #[must_use]
    pub fn textures(&self) -> &[TextureSlotDescriptor] {
        &self.textures
    }

    #[must_use]
    pub fn samplers(&self) -> &[SamplerDescriptor] {
        &self.samplers
    }

    #[must_use]
    pub fn block_size(&self) -> usize {
        self.parameters.block_size()
    }
}
