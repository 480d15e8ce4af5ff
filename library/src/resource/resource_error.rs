use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("parameter '{parameter}' has offset {offset} not aligned to a 4-byte word")]
    MisalignedOffset {
        parameter: String,
        offset: usize,
    },
    #[error("parameter '{parameter}' ends at {end}, beyond the declared size {size}")]
    OutOfBounds {
        parameter: String,
        end: usize,
        size: usize,
    },
    #[error("parameters '{first}' and '{second}' overlap")]
    Overlap {
        first: String,
        second: String,
    },
    #[error("parameter '{parameter}' declares {actual} default values, at most {expected} expected")]
    DefaultLengthMismatch {
        parameter: String,
        expected: usize,
        actual: usize,
    },
    #[error("parameter '{parameter}' depends on invalid index {index}")]
    InvalidDependedIndex {
        parameter: String,
        index: usize,
    },
    #[error("shader option '{option}' is invalid: {what}")]
    InvalidShaderOption {
        option: String,
        what: String,
    },
    #[error("shape '{shape}' references missing material {material_index}")]
    MissingMaterial {
        shape: String,
        material_index: usize,
    },
    #[error("failed to parse resource description: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read resource description: {0}")]
    Io(#[from] std::io::Error),
}
