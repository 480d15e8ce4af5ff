use crate::resource::parameter_kind::{ParameterKind, WORD_SIZE_BYTES};
use crate::resource::parameter_schema::{ParameterDescriptor, ParameterSchema};
use crate::resource::resource_error::ResourceError;
use serde::{Deserialize, Serialize};

const KEY_WORD_BITS: u32 = u32::BITS;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShaderOption {
    name: String,
    choices: Vec<String>,
    #[serde(default)]
    default_choice: usize,
    #[serde(default)]
    uniform_offset: Option<usize>,
}

impl ShaderOption {
    #[must_use]
    pub fn new(name: impl Into<String>, choices: &[&str]) -> Self {
        Self {
            name: name.into(),
            choices: choices.iter().map(|choice| choice.to_string()).collect(),
            default_choice: 0,
            uniform_offset: None,
        }
    }

    #[must_use]
    pub fn with_default_choice(mut self, default_choice: usize) -> Self {
        self.default_choice = default_choice;
        self
    }

    #[must_use]
    pub fn with_uniform_offset(mut self, offset: usize) -> Self {
        self.uniform_offset = Some(offset);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    #[must_use]
    pub fn default_choice(&self) -> usize {
        self.default_choice
    }

    fn validate(&self) -> Result<(), ResourceError> {
        if self.choices.is_empty() {
            return Err(ResourceError::InvalidShaderOption { option: self.name.clone(), what: "no choices".to_string() });
        }
        if self.default_choice >= self.choices.len() {
            return Err(ResourceError::InvalidShaderOption {
                option: self.name.clone(),
                what: format!("default choice {} out of {} choices", self.default_choice, self.choices.len()),
            });
        }
        Ok(())
    }

    #[must_use]
    fn key_bits(&self) -> u32 {
        let choices = self.choices.len() as u32;
        (KEY_WORD_BITS - choices.saturating_sub(1).leading_zeros()).max(1)
    }
}

/// Position of one static option inside the packed shader key.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeySlot {
    word: usize,
    shift: u32,
    bits: u32,
}

impl KeySlot {
    #[must_use]
    pub fn word(&self) -> usize {
        self.word
    }

    #[must_use]
    pub fn mask(&self) -> u32 {
        (u32::MAX >> (KEY_WORD_BITS - self.bits)) << self.shift
    }

    #[must_use]
    pub fn encode(&self, choice: usize) -> u32 {
        ((choice as u32) << self.shift) & self.mask()
    }

    #[must_use]
    pub fn decode(&self, word: u32) -> usize {
        ((word & self.mask()) >> self.shift) as usize
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct ShadingModelSource {
    name: String,
    #[serde(default)]
    static_options: Vec<ShaderOption>,
    #[serde(default)]
    dynamic_options: Vec<ShaderOption>,
}

/// Shader options of one shading model. Static options select a shader
/// variant through a packed key; dynamic options are uploaded as `uint`
/// values into the option uniform block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ShadingModelSource", into = "ShadingModelSource")]
pub struct ShadingModelResource {
    name: String,
    static_options: Vec<ShaderOption>,
    dynamic_options: Vec<ShaderOption>,
    key_slots: Vec<KeySlot>,
    key_word_count: usize,
    option_parameters: ParameterSchema,
}

impl ShadingModelResource {
    pub fn new(name: impl Into<String>, static_options: Vec<ShaderOption>, dynamic_options: Vec<ShaderOption>) -> Result<Self, ResourceError> {
        for option in static_options.iter().chain(dynamic_options.iter()) {
            option.validate()?;
        }

        let mut key_slots = Vec::with_capacity(static_options.len());
        let mut word = 0;
        let mut shift = 0;
        for option in &static_options {
            let bits = option.key_bits();
            if shift + bits > KEY_WORD_BITS {
                word += 1;
                shift = 0;
            }
            key_slots.push(KeySlot { word, shift, bits });
            shift += bits;
        }
        let key_word_count = if static_options.is_empty() { 0 } else { word + 1 };

        let descriptors = dynamic_options
            .iter()
            .enumerate()
            .map(|(index, option)| {
                let descriptor = ParameterDescriptor::new(option.name.clone(), ParameterKind::UInt, index * WORD_SIZE_BYTES)
                    .with_default(&[option.default_choice as f64]);
                match option.uniform_offset {
                    Some(offset) => descriptor.with_block_offset(offset),
                    None => descriptor,
                }
            })
            .collect();
        let option_parameters = ParameterSchema::new(descriptors)?;

        Ok(Self { name: name.into(), static_options, dynamic_options, key_slots, key_word_count, option_parameters })
    }

    pub fn from_json(json: &str) -> Result<Self, ResourceError> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn static_options(&self) -> &[ShaderOption] {
        &self.static_options
    }

    #[must_use]
    pub fn dynamic_options(&self) -> &[ShaderOption] {
        &self.dynamic_options
    }

    #[must_use]
    pub fn key_slot(&self, static_option_index: usize) -> Option<KeySlot> {
        self.key_slots.get(static_option_index).copied()
    }

    #[must_use]
    pub fn key_word_count(&self) -> usize {
        self.key_word_count
    }

    #[must_use]
    pub fn default_key(&self) -> Vec<u32> {
        let mut key = vec![0_u32; self.key_word_count];
        for (option, slot) in self.static_options.iter().zip(self.key_slots.iter()) {
            key[slot.word()] |= slot.encode(option.default_choice());
        }
        key
    }

    #[must_use]
    pub fn option_parameters(&self) -> &ParameterSchema {
        &self.option_parameters
    }

    #[must_use]
    pub fn option_block_size(&self) -> usize {
        self.option_parameters.block_size()
    }
}

impl TryFrom<ShadingModelSource> for ShadingModelResource {
    type Error = ResourceError;

    fn try_from(source: ShadingModelSource) -> Result<Self, Self::Error> {
        ShadingModelResource::new(source.name, source.static_options, source.dynamic_options)
    }
}

impl From<ShadingModelResource> for ShadingModelSource {
    fn from(resource: ShadingModelResource) -> Self {
        ShadingModelSource { name: resource.name, static_options: resource.static_options, dynamic_options: resource.dynamic_options }
    }
}
