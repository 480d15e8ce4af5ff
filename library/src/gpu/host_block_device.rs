use crate::gpu::block_device::{BlockDevice, BlockHandle, BlockView, DeviceError, Endianness, MemoryPoolHandle};
use crate::memory::alignment::{is_aligned, is_power_of_two};
use crate::utils::uid_generator::UidGenerator;
use log::debug;
use std::collections::HashMap;

pub const DEFAULT_HOST_BLOCK_ALIGNMENT: usize = 256;

/// Block device whose memory pools live in ordinary CPU memory. Serves
/// headless tools and tests, and lets callers inspect uploaded bytes.
pub struct HostBlockDevice {
    alignment: usize,
    endianness: Endianness,
    pools: Vec<Vec<u8>>,
    views: HashMap<BlockHandle, BlockView>,
    handles: UidGenerator,
    write_count: usize,
}

impl HostBlockDevice {
    #[must_use]
    pub fn new(alignment: usize) -> Self {
        assert!(is_power_of_two(alignment), "block alignment must be a power of two");
        Self {
            alignment,
            endianness: Endianness::HOST,
            pools: Vec::new(),
            views: HashMap::new(),
            handles: UidGenerator::new(),
            write_count: 0,
        }
    }

    #[must_use]
    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    #[must_use]
    pub fn create_memory_pool(&mut self, size: usize) -> MemoryPoolHandle {
        self.pools.push(vec![0; size]);
        MemoryPoolHandle((self.pools.len() - 1) as u32)
    }

    #[must_use]
    pub fn pool_bytes(&self, pool: MemoryPoolHandle) -> Option<&[u8]> {
        self.pools.get(pool.0 as usize).map(|bytes| bytes.as_slice())
    }

    #[must_use]
    pub fn read_block(&self, handle: BlockHandle) -> Option<&[u8]> {
        let view = self.views.get(&handle)?;
        let pool = self.pools.get(view.pool.0 as usize)?;
        Some(&pool[view.offset..view.offset + view.size])
    }

    #[must_use]
    pub fn live_view_count(&self) -> usize {
        self.views.len()
    }

    /// Number of `write_block` calls served so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.write_count
    }
}

impl Default for HostBlockDevice {
    fn default() -> Self {
        Self::new(DEFAULT_HOST_BLOCK_ALIGNMENT)
    }
}

impl BlockDevice for HostBlockDevice {
    fn block_alignment(&self) -> usize {
        self.alignment
    }

    fn block_endianness(&self) -> Endianness {
        self.endianness
    }

    fn memory_pool_size(&self, pool: MemoryPoolHandle) -> Option<usize> {
        self.pools.get(pool.0 as usize).map(|bytes| bytes.len())
    }

    fn create_block_view(&mut self, pool: MemoryPoolHandle, offset: usize, size: usize) -> Result<BlockHandle, DeviceError> {
        let capacity = self.memory_pool_size(pool).ok_or(DeviceError::UnknownPool(pool))?;
        if !is_aligned(offset, self.alignment) {
            return Err(DeviceError::Misaligned { offset, alignment: self.alignment });
        }
        if offset + size > capacity {
            return Err(DeviceError::OutOfRange { offset, size, capacity });
        }

        let handle = BlockHandle(self.handles.next());
        self.views.insert(handle, BlockView { pool, offset, size });
        debug!("host block {} created: pool {}, offset {}, size {}", handle, pool, offset, size);
        Ok(handle)
    }

    fn release_block_view(&mut self, handle: BlockHandle) {
        if self.views.remove(&handle).is_some() {
            self.handles.put_back(handle.0);
        }
    }

    fn write_block(&mut self, handle: BlockHandle, offset: usize, data: &[u8]) -> Result<(), DeviceError> {
        let view = *self.views.get(&handle).ok_or(DeviceError::UnknownBlock(handle))?;
        view.check_write(offset, data.len())?;
        let pool = self.pools.get_mut(view.pool.0 as usize).ok_or(DeviceError::UnknownPool(view.pool))?;
        let start = view.offset + offset;
        pool[start..start + data.len()].copy_from_slice(data);
        self.write_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_write() {
        let mut system_under_test = HostBlockDevice::new(16);
        let pool = system_under_test.create_memory_pool(64);

        let handle = system_under_test.create_block_view(pool, 16, 8).unwrap();
        system_under_test.write_block(handle, 4, &[1, 2, 3, 4]).unwrap();

        assert_eq!(system_under_test.read_block(handle).unwrap(), &[0, 0, 0, 0, 1, 2, 3, 4]);
        assert_eq!(&system_under_test.pool_bytes(pool).unwrap()[20..24], &[1, 2, 3, 4]);
        assert_eq!(system_under_test.write_count(), 1);
    }

    #[test]
    fn test_misaligned_view() {
        let mut system_under_test = HostBlockDevice::new(16);
        let pool = system_under_test.create_memory_pool(64);

        let result = system_under_test.create_block_view(pool, 8, 8);

        assert_eq!(result, Err(DeviceError::Misaligned { offset: 8, alignment: 16 }));
    }

    #[test]
    fn test_view_beyond_pool() {
        let mut system_under_test = HostBlockDevice::new(16);
        let pool = system_under_test.create_memory_pool(32);

        let result = system_under_test.create_block_view(pool, 16, 32);

        assert_eq!(result, Err(DeviceError::OutOfRange { offset: 16, size: 32, capacity: 32 }));
    }

    #[test]
    fn test_unknown_pool() {
        let mut system_under_test = HostBlockDevice::default();

        let result = system_under_test.create_block_view(MemoryPoolHandle(3), 0, 4);

        assert_eq!(result, Err(DeviceError::UnknownPool(MemoryPoolHandle(3))));
    }

    #[test]
    fn test_write_after_release() {
        let mut system_under_test = HostBlockDevice::new(16);
        let pool = system_under_test.create_memory_pool(32);
        let handle = system_under_test.create_block_view(pool, 0, 8).unwrap();

        system_under_test.release_block_view(handle);

        assert_eq!(system_under_test.live_view_count(), 0);
        assert_eq!(system_under_test.write_block(handle, 0, &[1]), Err(DeviceError::UnknownBlock(handle)));
    }

    #[test]
    fn test_write_out_of_block() {
        let mut system_under_test = HostBlockDevice::new(16);
        let pool = system_under_test.create_memory_pool(32);
        let handle = system_under_test.create_block_view(pool, 0, 8).unwrap();

        let result = system_under_test.write_block(handle, 4, &[0; 8]);

        assert!(matches!(result, Err(DeviceError::OutOfRange { .. })));
        assert_eq!(system_under_test.write_count(), 0);
    }
}
