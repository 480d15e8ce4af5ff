use bytemuck::{Pod, Zeroable};
use derive_more::Display;
use thiserror::Error;

/// View of one buffering slot's uniform block inside a memory pool.
/// Zero is the null handle.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Display, Pod, Zeroable)]
pub struct BlockHandle(pub u64);

impl BlockHandle {
    pub const NULL: BlockHandle = BlockHandle(0);

    #[must_use]
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Display)]
pub struct MemoryPoolHandle(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    pub const HOST: Endianness = if cfg!(target_endian = "big") { Endianness::Big } else { Endianness::Little };
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("unknown memory pool {0}")]
    UnknownPool(MemoryPoolHandle),
    #[error("unknown block {0}")]
    UnknownBlock(BlockHandle),
    #[error("range at {offset} of {size} bytes exceeds capacity {capacity}")]
    OutOfRange {
        offset: usize,
        size: usize,
        capacity: usize,
    },
    #[error("offset {offset} is not aligned to {alignment}")]
    Misaligned {
        offset: usize,
        alignment: usize,
    },
    #[error("gpu read back failed: {what}")]
    ReadBack {
        what: String,
    },
}

/// The part of a GPU backend the block manager talks to: memory pools that
/// uniform blocks are carved from, and CPU writes into those blocks.
pub trait BlockDevice {
    /// Alignment of a block's offset inside a memory pool; backend dependent.
    #[must_use]
    fn block_alignment(&self) -> usize;

    #[must_use]
    fn block_endianness(&self) -> Endianness;

    #[must_use]
    fn memory_pool_size(&self, pool: MemoryPoolHandle) -> Option<usize>;

    fn create_block_view(&mut self, pool: MemoryPoolHandle, offset: usize, size: usize) -> Result<BlockHandle, DeviceError>;

    fn release_block_view(&mut self, handle: BlockHandle);

    fn write_block(&mut self, handle: BlockHandle, offset: usize, data: &[u8]) -> Result<(), DeviceError>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct BlockView {
    pub(crate) pool: MemoryPoolHandle,
    pub(crate) offset: usize,
    pub(crate) size: usize,
}

impl BlockView {
    pub(crate) fn check_write(&self, offset: usize, data_size: usize) -> Result<(), DeviceError> {
        if offset + data_size > self.size {
            return Err(DeviceError::OutOfRange { offset, size: data_size, capacity: self.size });
        }
        Ok(())
    }
}
