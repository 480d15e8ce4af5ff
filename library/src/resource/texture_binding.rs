use bytemuck::{Pod, Zeroable};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Opaque texture identifier owned by the embedding engine; zero means "no texture".
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Display, Pod, Zeroable, Serialize, Deserialize)]
pub struct TextureReference(pub u32);

impl TextureReference {
    pub const NONE: TextureReference = TextureReference(0);

    #[must_use]
    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

/// Index of a sampler (or texture view) in a descriptor pool.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Display, Pod, Zeroable, Serialize, Deserialize)]
pub struct DescriptorSlot(pub u64);

impl DescriptorSlot {
    pub const INVALID: DescriptorSlot = DescriptorSlot(u64::MAX);

    #[must_use]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl Default for DescriptorSlot {
    fn default() -> Self {
        Self::INVALID
    }
}
