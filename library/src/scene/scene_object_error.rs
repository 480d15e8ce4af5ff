use crate::gpu::block_buffer::BlockBufferError;
use crate::gpu::block_device::DeviceError;
use crate::memory::memory_plan::PlanError;
use crate::memory::placement::BuildError;
use crate::scene::object_state::ObjectState;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParameterError {
    #[error("parameter index {index} is out of range, the object has {count} parameters")]
    IndexOutOfRange {
        index: usize,
        count: usize,
    },
    #[error("parameter '{parameter}' is {declared} bytes, but {requested} bytes were requested")]
    SizeMismatch {
        parameter: String,
        declared: usize,
        requested: usize,
    },
    #[error("parameter '{parameter}' can not be viewed as a type aligned to {alignment} bytes")]
    Misaligned {
        parameter: String,
        alignment: usize,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneObjectError {
    #[error("'{operation}' is not allowed in state {state}")]
    InvalidState {
        operation: &'static str,
        state: ObjectState,
    },
    #[error("buffering slot {slot} is out of range, the object has {buffering_count} slots")]
    SlotOutOfRange {
        slot: usize,
        buffering_count: usize,
    },
    #[error("{what} index {index} is out of range, the object has {count}")]
    ElementOutOfRange {
        what: &'static str,
        index: usize,
        count: usize,
    },
    #[error(transparent)]
    Parameter(#[from] ParameterError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    BlockBuffer(#[from] BlockBufferError),
    #[error(transparent)]
    Device(#[from] DeviceError),
}
