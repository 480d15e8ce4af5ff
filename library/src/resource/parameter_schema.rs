use crate::resource::parameter_kind::{ParameterKind, WORD_SIZE_BYTES};
use crate::resource::resource_error::ResourceError;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// One parameter of a resource: where its raw bytes live, where (if anywhere)
/// it lands in the uniform block, and its default value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    name: String,
    kind: ParameterKind,
    raw_offset: usize,
    #[serde(default)]
    block_offset: Option<usize>,
    #[serde(default)]
    volatile: bool,
    #[serde(default)]
    depended_index: Option<usize>,
    #[serde(default)]
    default: Vec<f64>,
}

impl ParameterDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ParameterKind, raw_offset: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            raw_offset,
            block_offset: None,
            volatile: false,
            depended_index: None,
            default: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_block_offset(mut self, block_offset: usize) -> Self {
        self.block_offset = Some(block_offset);
        self
    }

    #[must_use]
    pub fn with_default(mut self, values: &[f64]) -> Self {
        self.default = values.to_vec();
        self
    }

    #[must_use]
    pub fn with_depended_index(mut self, index: usize) -> Self {
        self.depended_index = Some(index);
        self
    }

    #[must_use]
    pub fn make_volatile(mut self) -> Self {
        self.volatile = true;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> ParameterKind {
        self.kind
    }

    #[must_use]
    pub fn raw_offset(&self) -> usize {
        self.raw_offset
    }

    #[must_use]
    pub fn raw_size(&self) -> usize {
        self.kind.raw_size()
    }

    #[must_use]
    pub fn raw_range(&self) -> Range<usize> {
        self.raw_offset..self.raw_offset + self.raw_size()
    }

    #[must_use]
    pub fn block_offset(&self) -> Option<usize> {
        self.block_offset
    }

    #[must_use]
    pub fn block_range(&self) -> Option<Range<usize>> {
        self.block_offset.map(|offset| offset..offset + self.kind.block_size())
    }

    #[must_use]
    pub fn is_volatile(&self) -> bool {
        self.volatile
    }

    #[must_use]
    pub fn depended_index(&self) -> Option<usize> {
        self.depended_index
    }

    /// Default value as host-order words; missing trailing values are zero.
    #[must_use]
    pub(crate) fn default_words(&self) -> Vec<u32> {
        let mut words = vec![0_u32; self.kind.raw_words()];
        for (word, value) in words.iter_mut().zip(self.default.iter()) {
            *word = match self.kind {
                ParameterKind::Bool => u32::from(*value != 0.0),
                ParameterKind::Int => (*value as i32) as u32,
                ParameterKind::UInt => *value as u32,
                _ => (*value as f32).to_bits(),
            };
        }
        words
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct ParameterSchemaSource {
    parameters: Vec<ParameterDescriptor>,
    #[serde(default)]
    raw_size: Option<usize>,
    #[serde(default)]
    block_size: Option<usize>,
}

/// Validated, ordered parameter table of a resource. Offsets are opaque to the
/// runtime: they come from the asset, not from any Rust struct layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ParameterSchemaSource", into = "ParameterSchemaSource")]
pub struct ParameterSchema {
    parameters: Vec<ParameterDescriptor>,
    raw_size: usize,
    block_size: usize,
    default_raw: Vec<u8>,
    has_volatile: bool,
}

impl ParameterSchema {
    /// Sizes are derived from the furthest parameter end.
    pub fn new(parameters: Vec<ParameterDescriptor>) -> Result<Self, ResourceError> {
        Self::with_sizes(parameters, None, None)
    }

    pub fn with_sizes(parameters: Vec<ParameterDescriptor>, raw_size: Option<usize>, block_size: Option<usize>) -> Result<Self, ResourceError> {
        let furthest_raw = parameters.iter().map(|parameter| parameter.raw_range().end).max().unwrap_or(0);
        let furthest_block = parameters.iter().filter_map(|parameter| parameter.block_range()).map(|range| range.end).max().unwrap_or(0);

        let raw_size = raw_size.unwrap_or(furthest_raw);
        let block_size = block_size.unwrap_or(furthest_block);

        validate(&parameters, raw_size, block_size)?;

        let mut default_raw = vec![0_u8; raw_size];
        for parameter in &parameters {
            let words = parameter.default_words();
            default_raw[parameter.raw_range()].copy_from_slice(bytemuck::cast_slice(&words));
        }

        let has_volatile = parameters.iter().any(|parameter| parameter.is_volatile());
        Ok(Self { parameters, raw_size, block_size, default_raw, has_volatile })
    }

    #[must_use]
    pub fn empty() -> Self {
        Self { parameters: Vec::new(), raw_size: 0, block_size: 0, default_raw: Vec::new(), has_volatile: false }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.parameters.len()
    }

    #[must_use]
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    #[must_use]
    pub fn parameter(&self, index: usize) -> Option<&ParameterDescriptor> {
        self.parameters.get(index)
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|parameter| parameter.name() == name)
    }

    #[must_use]
    pub fn raw_size(&self) -> usize {
        self.raw_size
    }

    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    #[must_use]
    pub fn default_raw(&self) -> &[u8] {
        &self.default_raw
    }

    #[must_use]
    pub fn has_volatile(&self) -> bool {
        self.has_volatile
    }
}

impl TryFrom<ParameterSchemaSource> for ParameterSchema {
    type Error = ResourceError;

    fn try_from(source: ParameterSchemaSource) -> Result<Self, Self::Error> {
        ParameterSchema::with_sizes(source.parameters, source.raw_size, source.block_size)
    }
}

impl From<ParameterSchema> for ParameterSchemaSource {
    fn from(schema: ParameterSchema) -> Self {
        ParameterSchemaSource {
            parameters: schema.parameters,
            raw_size: Some(schema.raw_size),
            block_size: Some(schema.block_size),
        }
    }
}

fn validate(parameters: &[ParameterDescriptor], raw_size: usize, block_size: usize) -> Result<(), ResourceError> {
    for (index, parameter) in parameters.iter().enumerate() {
        let name = || parameter.name().to_string();

        if parameter.raw_offset() % WORD_SIZE_BYTES != 0 {
            return Err(ResourceError::MisalignedOffset { parameter: name(), offset: parameter.raw_offset() });
        }
        if parameter.raw_range().end > raw_size {
            return Err(ResourceError::OutOfBounds { parameter: name(), end: parameter.raw_range().end, size: raw_size });
        }
        if let Some(range) = parameter.block_range() {
            if range.start % WORD_SIZE_BYTES != 0 {
                return Err(ResourceError::MisalignedOffset { parameter: name(), offset: range.start });
            }
            if range.end > block_size {
                return Err(ResourceError::OutOfBounds { parameter: name(), end: range.end, size: block_size });
            }
        }
        if parameter.default.len() > parameter.kind().raw_words() {
            return Err(ResourceError::DefaultLengthMismatch {
                parameter: name(),
                expected: parameter.kind().raw_words(),
                actual: parameter.default.len(),
            });
        }
        if let Some(depended) = parameter.depended_index() {
            if depended >= parameters.len() || depended == index {
                return Err(ResourceError::InvalidDependedIndex { parameter: name(), index: depended });
            }
        }

        for another in parameters.iter().skip(index + 1) {
            if ranges_overlap(&parameter.raw_range(), &another.raw_range()) {
                return Err(ResourceError::Overlap { first: name(), second: another.name().to_string() });
            }
            if let (Some(left), Some(right)) = (parameter.block_range(), another.block_range()) {
                if ranges_overlap(&left, &right) {
                    return Err(ResourceError::Overlap { first: name(), second: another.name().to_string() });
                }
            }
        }
    }
    Ok(())
}

#[must_use]
fn ranges_overlap(left: &Range<usize>, right: &Range<usize>) -> bool {
    left.start < right.end && right.start < left.end
}
