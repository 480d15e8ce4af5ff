use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumCount, EnumIter};

pub(crate) const WORD_SIZE_BYTES: usize = size_of::<u32>();

/// Type of one shader parameter. Every kind is a sequence of 4-byte words,
/// booleans included.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, EnumIter, EnumCount, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    Bool,
    Int,
    #[serde(rename = "uint")]
    UInt,
    Float,
    Float2,
    Float3,
    Float4,
    Float2x2,
    Float3x4,
    Float4x4,
    /// Scale, rotation and translation in 2D; uploaded as a 2x3 matrix.
    Srt2d,
}

impl ParameterKind {
    #[must_use]
    pub const fn raw_words(self) -> usize {
        match self {
            ParameterKind::Bool | ParameterKind::Int | ParameterKind::UInt | ParameterKind::Float => 1,
            ParameterKind::Float2 => 2,
            ParameterKind::Float3 => 3,
            ParameterKind::Float4 | ParameterKind::Float2x2 => 4,
            ParameterKind::Float3x4 => 12,
            ParameterKind::Float4x4 => 16,
            ParameterKind::Srt2d => 5,
        }
    }

    #[must_use]
    pub const fn block_words(self) -> usize {
        match self {
            ParameterKind::Srt2d => 6,
            _ => self.raw_words(),
        }
    }

    #[must_use]
    pub const fn raw_size(self) -> usize {
        self.raw_words() * WORD_SIZE_BYTES
    }

    #[must_use]
    pub const fn block_size(self) -> usize {
        self.block_words() * WORD_SIZE_BYTES
    }
}
