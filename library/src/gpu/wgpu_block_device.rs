use crate::gpu::block_device::{BlockDevice, BlockHandle, BlockView, DeviceError, Endianness, MemoryPoolHandle};
use crate::gpu::context::Context;
use crate::memory::alignment::{align_up, is_aligned};
use crate::utils::uid_generator::UidGenerator;
use futures_intrusive::channel::shared::oneshot_channel;
use log::debug;
use std::collections::HashMap;
use std::num::NonZeroU64;
use std::rc::Rc;
use wgpu::{BufferAddress, BufferUsages, PollType};

/// Block device backed by `wgpu` uniform buffers; each memory pool is one buffer.
pub struct WgpuBlockDevice {
    context: Rc<Context>,
    pools: Vec<wgpu::Buffer>,
    views: HashMap<BlockHandle, BlockView>,
    handles: UidGenerator,
}

impl WgpuBlockDevice {
    const LABEL_READ_BACK_MEDIATOR: &'static str = "block read back mediator";

    #[must_use]
    pub fn new(context: Rc<Context>) -> Self {
        Self { context, pools: Vec::new(), views: HashMap::new(), handles: UidGenerator::new() }
    }

    #[must_use]
    pub fn create_memory_pool(&mut self, label: &str, size: usize) -> MemoryPoolHandle {
        let size = align_up(size.max(1), wgpu::COPY_BUFFER_ALIGNMENT as usize);
        let buffer = self.context.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size as BufferAddress,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        self.pools.push(buffer);
        MemoryPoolHandle((self.pools.len() - 1) as u32)
    }

    /// Binding of the block for draw-command recording.
    #[must_use]
    pub fn binding(&self, handle: BlockHandle) -> Option<wgpu::BufferBinding<'_>> {
        let view = self.views.get(&handle)?;
        let buffer = self.pools.get(view.pool.0 as usize)?;
        Some(wgpu::BufferBinding {
            buffer,
            offset: view.offset as BufferAddress,
            size: NonZeroU64::new(view.size as u64),
        })
    }

    /// Copies the block back into CPU memory; blocks until the GPU is done.
    pub fn read_block(&self, handle: BlockHandle) -> Result<Vec<u8>, DeviceError> {
        let view = *self.views.get(&handle).ok_or(DeviceError::UnknownBlock(handle))?;
        let source = self.pools.get(view.pool.0 as usize).ok_or(DeviceError::UnknownPool(view.pool))?;
        let copy_size = align_up(view.size, wgpu::COPY_BUFFER_ALIGNMENT as usize) as BufferAddress;

        let mediator = self.context.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(Self::LABEL_READ_BACK_MEDIATOR),
            size: copy_size,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self.context.device().create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        encoder.copy_buffer_to_buffer(source, view.offset as BufferAddress, &mediator, 0, copy_size);
        self.context.queue().submit(Some(encoder.finish()));

        let mediator_slice = mediator.slice(..);
        let (sender, receiver) = oneshot_channel();
        mediator_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        self.context.device().poll(PollType::Wait).map_err(|error| DeviceError::ReadBack { what: error.to_string() })?;
        let map_result = pollster::block_on(receiver.receive())
            .ok_or_else(|| DeviceError::ReadBack { what: "map callback has been dropped".to_string() })?;
        map_result.map_err(|error| DeviceError::ReadBack { what: error.to_string() })?;

        let content = mediator_slice.get_mapped_range()[..view.size].to_vec();
        mediator.unmap();
        Ok(content)
    }
}

impl BlockDevice for WgpuBlockDevice {
    fn block_alignment(&self) -> usize {
        self.context.device().limits().min_uniform_buffer_offset_alignment as usize
    }

    fn block_endianness(&self) -> Endianness {
        Endianness::Little
    }

    fn memory_pool_size(&self, pool: MemoryPoolHandle) -> Option<usize> {
        self.pools.get(pool.0 as usize).map(|buffer| buffer.size() as usize)
    }

    fn create_block_view(&mut self, pool: MemoryPoolHandle, offset: usize, size: usize) -> Result<BlockHandle, DeviceError> {
        let capacity = self.memory_pool_size(pool).ok_or(DeviceError::UnknownPool(pool))?;
        let alignment = self.block_alignment();
        if !is_aligned(offset, alignment) {
            return Err(DeviceError::Misaligned { offset, alignment });
        }
        if offset + size > capacity {
            return Err(DeviceError::OutOfRange { offset, size, capacity });
        }

        let handle = BlockHandle(self.handles.next());
        self.views.insert(handle, BlockView { pool, offset, size });
        debug!("wgpu block {} created: pool {}, offset {}, size {}", handle, pool, offset, size);
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
        let copy_alignment = wgpu::COPY_BUFFER_ALIGNMENT as usize;
        if !is_aligned(offset, copy_alignment) || !is_aligned(data.len(), copy_alignment) {
            return Err(DeviceError::Misaligned { offset, alignment: copy_alignment });
        }
        let pool = self.pools.get(view.pool.0 as usize).ok_or(DeviceError::UnknownPool(view.pool))?;
        self.context.queue().write_buffer(pool, (view.offset + offset) as BufferAddress, data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::headless_device::tests::create_headless_wgpu_context;
    use more_asserts::assert_ge;

    #[test]
    #[ignore = "requires a Vulkan adapter"]
    fn test_alignment_comes_from_device_limits() {
        let context = create_headless_wgpu_context();
        let expected = context.device().limits().min_uniform_buffer_offset_alignment as usize;
        let system_under_test = WgpuBlockDevice::new(context);

        assert_eq!(system_under_test.block_alignment(), expected);
        assert_ge!(system_under_test.block_alignment(), 4);
    }

    #[test]
    #[ignore = "requires a Vulkan adapter"]
    fn test_write_and_read_back() {
        let mut system_under_test = WgpuBlockDevice::new(create_headless_wgpu_context());
        let alignment = system_under_test.block_alignment();
        let pool = system_under_test.create_memory_pool("test pool", alignment * 2);
        let handle = system_under_test.create_block_view(pool, alignment, 8).unwrap();

        system_under_test.write_block(handle, 4, &0xDEADBEEF_u32.to_le_bytes()).unwrap();

        let content = system_under_test.read_block(handle).unwrap();
        assert_eq!(content, vec![0, 0, 0, 0, 0xEF, 0xBE, 0xAD, 0xDE]);
        assert!(system_under_test.binding(handle).is_some());
    }

    #[test]
    #[ignore = "requires a Vulkan adapter"]
    fn test_unaligned_write_rejected() {
        let mut system_under_test = WgpuBlockDevice::new(create_headless_wgpu_context());
        let pool = system_under_test.create_memory_pool("test pool", 64);
        let handle = system_under_test.create_block_view(pool, 0, 16).unwrap();

        let result = system_under_test.write_block(handle, 2, &[1, 2]);

        assert!(matches!(result, Err(DeviceError::Misaligned { .. })));
    }
}
