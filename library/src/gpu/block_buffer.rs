use crate::gpu::block_device::{BlockDevice, BlockHandle, DeviceError, MemoryPoolHandle};
use crate::memory::alignment::{align_up, is_aligned};
use log::{debug, warn};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockBufferError {
    #[error("block buffer is already set up")]
    AlreadyBound,
    #[error("memory pool offset {offset} is not aligned to {alignment}")]
    Misaligned {
        offset: usize,
        alignment: usize,
    },
    #[error("memory pool region of {provided} bytes is smaller than the required {required} bytes")]
    InsufficientMemory {
        required: usize,
        provided: usize,
    },
    #[error("memory pool region at {offset} of {size} bytes exceeds the pool size {pool_size}")]
    RegionOutsidePool {
        offset: usize,
        size: usize,
        pool_size: usize,
    },
    #[error("buffering slot {slot} is out of range, the buffer has {buffering_count} slots")]
    SlotOutOfRange {
        slot: usize,
        buffering_count: usize,
    },
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// GPU-visible uniform blocks of one scene object, one per buffering slot,
/// laid out back to back in a caller-supplied memory pool region. The
/// handle array itself lives in the object's work memory.
#[derive(Default)]
pub struct BlockBuffer<'a> {
    handles: &'a mut [BlockHandle],
    block_size: usize,
    valid: bool,
}

impl<'a> BlockBuffer<'a> {
    #[must_use]
    pub fn new(handles: &'a mut [BlockHandle], block_size: usize) -> Self {
        handles.fill(BlockHandle::NULL);
        Self { handles, block_size, valid: false }
    }

    #[must_use]
    pub fn buffering_count(&self) -> usize {
        self.handles.len()
    }

    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    #[must_use]
    pub fn slot_stride(&self, device: &dyn BlockDevice) -> usize {
        align_up(self.block_size, device.block_alignment())
    }

    /// Bytes the pool region must provide, padding between slots included.
    #[must_use]
    pub fn calculate_block_buffer_size(&self, device: &dyn BlockDevice) -> usize {
        if 0 == self.block_size {
            return 0;
        }
        self.slot_stride(device) * self.buffering_count()
    }

    #[must_use]
    pub fn block_buffer_alignment(&self, device: &dyn BlockDevice) -> usize {
        device.block_alignment()
    }

    pub fn setup(&mut self, device: &mut dyn BlockDevice, pool: MemoryPoolHandle, offset: usize, region_size: usize) -> Result<(), BlockBufferError> {
        if self.valid {
            return Err(BlockBufferError::AlreadyBound);
        }
        if 0 == self.block_size {
            self.valid = true;
            return Ok(());
        }

        let alignment = self.block_buffer_alignment(device);
        if !is_aligned(offset, alignment) {
            return Err(BlockBufferError::Misaligned { offset, alignment });
        }
        let required = self.calculate_block_buffer_size(device);
        if region_size < required {
            return Err(BlockBufferError::InsufficientMemory { required, provided: region_size });
        }
        let pool_size = device.memory_pool_size(pool).ok_or(DeviceError::UnknownPool(pool))?;
        if offset + required > pool_size {
            return Err(BlockBufferError::RegionOutsidePool { offset, size: required, pool_size });
        }

        let stride = self.slot_stride(device);
        for slot in 0..self.handles.len() {
            match device.create_block_view(pool, offset + slot * stride, self.block_size) {
                Ok(handle) => self.handles[slot] = handle,
                Err(error) => {
                    self.release_handles(device);
                    return Err(error.into());
                }
            }
        }

        self.valid = true;
        debug!("block buffer bound: pool {}, offset {}, {} slots of {} bytes", pool, offset, self.handles.len(), self.block_size);
        Ok(())
    }

    /// Releases the slot views. Calling it on an unbound buffer does nothing.
    pub fn cleanup(&mut self, device: &mut dyn BlockDevice) {
        if !self.valid {
            warn!("block buffer cleanup requested, but nothing is bound");
            return;
        }
        self.release_handles(device);
        self.valid = false;
    }

    fn release_handles(&mut self, device: &mut dyn BlockDevice) {
        for handle in self.handles.iter_mut().filter(|handle| !handle.is_null()) {
            device.release_block_view(*handle);
            *handle = BlockHandle::NULL;
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// `None` when unbound or when the block is empty.
    #[must_use]
    /// `None` for an unbound buffer, a zero block size or a slot out of range.
    #[must_use]
    pub fn block(&self, slot: usize) -> Option<BlockHandle> {
        self.handles.get(slot).copied().filter(|handle| self.valid && !handle.is_null())
    }

    /// Writing to a slot without a block is a no-op.
    pub fn write(&self, device: &mut dyn BlockDevice, slot: usize, offset: usize, data: &[u8]) -> Result<(), BlockBufferError> {
        if slot >= self.handles.len() {
            return Err(BlockBufferError::SlotOutOfRange { slot, buffering_count: self.handles.len() });
        }
        if let Some(handle) = self.block(slot) {
            device.write_block(handle, offset, data)?;
        }
        Ok(())
    }
}
