use crate::dirty::dirty_flag_set::DirtyFlagSet;
use crate::geometry::alias::Vector2d;
use crate::geometry::transform::srt2d_to_rows;
use crate::gpu::block_buffer::BlockBuffer;
use crate::gpu::block_device::{BlockDevice, BlockHandle, Endianness, MemoryPoolHandle};
use crate::gpu::byte_order::{copy_words, write_words};
use crate::memory::alignment::{is_address_aligned, ALIGNMENT_BUFFER};
use crate::memory::memory_plan::{MemoryPlanner, SubBufferKind};
use crate::memory::placement::{BuildError, Placement};
use crate::resource::parameter_kind::{ParameterKind, WORD_SIZE_BYTES};
use crate::resource::parameter_schema::{ParameterDescriptor, ParameterSchema};
use crate::scene::object_state::{ensure_slot, ensure_state, ObjectState};
use crate::scene::scene_object_error::{ParameterError, SceneObjectError};
use bytemuck::Pod;
use cgmath::Rad;
use log::{debug, error, trace, warn};

/// Sub-buffer kinds a [`ParameterBlock`] occupies inside its owner's plan.
#[derive(Copy, Clone, Debug)]
pub(crate) struct ParameterBlockLayout<K> {
    pub(crate) dirty_flags: K,
    pub(crate) raw_parameters: K,
    pub(crate) block_staging: K,
    pub(crate) block_handles: K,
}

impl<K: SubBufferKind> ParameterBlockLayout<K> {
    /// Without `gpu_blocks` the parameters stay CPU-side and the block size is zero.
    #[must_use]
    pub(crate) fn request(&self, planner: MemoryPlanner<K>, schema: &ParameterSchema, buffering_count: usize, gpu_blocks: bool) -> MemoryPlanner<K> {
        let block_size = if gpu_blocks { schema.block_size() } else { 0 };
        planner
            .request_array::<u32>(self.dirty_flags, DirtyFlagSet::required_words(schema.count(), buffering_count))
            .request(self.raw_parameters, schema.raw_size(), ALIGNMENT_BUFFER)
            .request(self.block_staging, block_size, WORD_SIZE_BYTES)
            .request_array::<BlockHandle>(self.block_handles, buffering_count)
    }

    pub(crate) fn place<'a>(&self, placement: &mut Placement<'a, K>, schema: &'a ParameterSchema, buffering_count: usize) -> Result<ParameterBlock<'a>, BuildError> {
        let dirty_words = placement.take::<u32>(self.dirty_flags)?;
        let raw = placement.take_bytes(self.raw_parameters);
        let staging = placement.take_bytes(self.block_staging);
        let handles = placement.take::<BlockHandle>(self.block_handles)?;
        debug_assert_eq!(handles.len(), buffering_count);
        Ok(ParameterBlock::place(schema, raw, staging, dirty_words, handles))
    }
}

/// Raw parameter values of one scene object together with their dirty
/// flags and the GPU uniform blocks they are converted into.
///
/// Every byte lives in caller-owned memory: the raw values and the staging
/// copy of one converted block in the work memory, the blocks themselves in a
/// GPU memory pool region.
#[derive(Default)]
pub struct ParameterBlock<'a> {
    state: ObjectState,
    schema: Option<&'a ParameterSchema>,
    raw: &'a mut [u8],
    staging: &'a mut [u8],
    dirty: DirtyFlagSet<'a>,
    blocks: BlockBuffer<'a>,
}

impl<'a> ParameterBlock<'a> {
    #[must_use]
    fn place(schema: &'a ParameterSchema, raw: &'a mut [u8], staging: &'a mut [u8], dirty_words: &'a mut [u32], handles: &'a mut [BlockHandle]) -> Self {
        raw.copy_from_slice(schema.default_raw());
        staging.fill(0);
        let buffering_count = handles.len();
        let block_size = staging.len();
        Self {
            state: ObjectState::Built,
            schema: Some(schema),
            raw,
            staging,
            dirty: DirtyFlagSet::new(dirty_words, schema.count(), buffering_count),
            blocks: BlockBuffer::new(handles, block_size),
        }
    }

    #[must_use]
    pub fn state(&self) -> ObjectState {
        self.state
    }

    #[must_use]
    pub fn schema(&self) -> Option<&'a ParameterSchema> {
        self.schema
    }

    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.schema.map_or(0, |schema| schema.count())
    }

    #[must_use]
    pub fn buffering_count(&self) -> usize {
        self.blocks.buffering_count()
    }

    #[must_use]
    pub fn find_parameter(&self, name: &str) -> Option<usize> {
        self.schema?.find(name)
    }

    #[must_use]
    pub fn raw_parameters(&self) -> &[u8] {
        self.raw
    }

    fn descriptor(&self, operation: &'static str, index: usize) -> Result<&'a ParameterDescriptor, SceneObjectError> {
        ensure_state(operation, self.state, &[ObjectState::Built, ObjectState::BlockValid])?;
        let count = self.parameter_count();
        match self.schema.and_then(|schema| schema.parameter(index)) {
            Some(descriptor) => Ok(descriptor),
            None => {
                error!("'{}' addresses parameter {} of {}", operation, index, count);
                debug_assert!(false, "parameter index {} is out of range [0, {})", index, count);
                Err(ParameterError::IndexOutOfRange { index, count }.into())
            }
        }
    }

    fn mark_dirty(&mut self, index: usize, descriptor: &ParameterDescriptor) {
        self.dirty.set_dirty_flag(index);
        if let Some(depended) = descriptor.depended_index() {
            self.dirty.set_dirty_flag(depended);
        }
    }

    pub fn parameter_bytes(&self, index: usize) -> Result<&[u8], SceneObjectError> {
        let descriptor = self.descriptor("parameter_bytes", index)?;
        Ok(&self.raw[descriptor.raw_range()])
    }

    /// Marks the parameter, and the one it feeds if any, dirty in every slot.
    pub fn edit_parameter_bytes(&mut self, index: usize) -> Result<&mut [u8], SceneObjectError> {
        let descriptor = self.descriptor("edit_parameter_bytes", index)?;
        self.mark_dirty(index, descriptor);
        Ok(&mut self.raw[descriptor.raw_range()])
    }

    pub fn parameter<T: Pod>(&self, index: usize) -> Result<T, SceneObjectError> {
        let descriptor = self.descriptor("parameter", index)?;
        check_size::<T>(descriptor)?;
        Ok(bytemuck::pod_read_unaligned(&self.raw[descriptor.raw_range()]))
    }

    /// Nothing is marked dirty when the request is rejected.
    pub fn edit_parameter<T: Pod>(&mut self, index: usize) -> Result<&mut T, SceneObjectError> {
        let descriptor = self.descriptor("edit_parameter", index)?;
        check_size::<T>(descriptor)?;
        let range = descriptor.raw_range();
        if !is_address_aligned(&self.raw[range.clone()], align_of::<T>()) {
            return Err(ParameterError::Misaligned { parameter: descriptor.name().to_string(), alignment: align_of::<T>() }.into());
        }
        self.mark_dirty(index, descriptor);
        bytemuck::try_from_bytes_mut(&mut self.raw[range])
            .map_err(|_| ParameterError::Misaligned { parameter: descriptor.name().to_string(), alignment: align_of::<T>() }.into())
    }

    pub fn set_parameter<T: Pod>(&mut self, index: usize, value: T) -> Result<(), SceneObjectError> {
        let descriptor = self.descriptor("set_parameter", index)?;
        check_size::<T>(descriptor)?;
        self.raw[descriptor.raw_range()].copy_from_slice(bytemuck::bytes_of(&value));
        self.mark_dirty(index, descriptor);
        Ok(())
    }

    /// Restores resource defaults; every slot is re-converted on its next calculation.
    pub fn clear_parameters(&mut self) -> Result<(), SceneObjectError> {
        ensure_state("clear_parameters", self.state, &[ObjectState::Built, ObjectState::BlockValid])?;
        if let Some(schema) = self.schema {
            self.raw.copy_from_slice(schema.default_raw());
        }
        self.dirty.set_all();
        Ok(())
    }

    #[must_use]
    pub fn is_flag_dirty(&self) -> bool {
        self.dirty.is_flag_dirty()
    }

    #[must_use]
    pub fn is_slot_dirty(&self, slot: usize) -> bool {
        slot < self.dirty.slot_count() && self.dirty.is_slot_dirty(slot)
    }

    pub fn reset_dirty_flags(&mut self) {
        self.dirty.reset_dirty_flags();
    }

    #[must_use]
    pub fn block_size(&self) -> usize {
        self.blocks.block_size()
    }

    #[must_use]
    pub fn calculate_block_buffer_size(&self, device: &dyn BlockDevice) -> usize {
        self.blocks.calculate_block_buffer_size(device)
    }

    #[must_use]
    pub fn block_buffer_alignment(&self, device: &dyn BlockDevice) -> usize {
        self.blocks.block_buffer_alignment(device)
    }

    #[must_use]
    pub fn is_block_buffer_valid(&self) -> bool {
        self.blocks.is_valid()
    }

    #[must_use]
    pub fn block(&self, slot: usize) -> Option<BlockHandle> {
        if !self.state.is_built() {
            return None;
        }
        ensure_slot(slot, self.buffering_count()).ok()?;
        self.blocks.block(slot)
    }

    /// Binds the blocks and uploads the current values into every slot.
    pub fn setup_block_buffer(&mut self, device: &mut dyn BlockDevice, pool: MemoryPoolHandle, offset: usize, region_size: usize) -> Result<(), SceneObjectError> {
        ensure_state("setup_block_buffer", self.state, &[ObjectState::Built])?;
        self.blocks.setup(device, pool, offset, region_size)?;
        for slot in 0..self.buffering_count() {
            if let Err(error) = self.upload_full(device, slot) {
                self.blocks.cleanup(device);
                return Err(error);
            }
        }
        self.dirty.reset_dirty_flags();
        self.state = ObjectState::BlockValid;
        Ok(())
    }

    /// A repeated call is a logged no-op.
    pub fn cleanup_block_buffer(&mut self, device: &mut dyn BlockDevice) {
        if self.state != ObjectState::BlockValid {
            warn!("block buffer cleanup requested for an object in state {}; ignored", self.state);
            return;
        }
        self.blocks.cleanup(device);
        self.state = ObjectState::Built;
    }

    /// Converts pending edits into the slot's block. Without volatile
    /// parameters and edits since this slot's last calculation nothing is written.
    pub fn calculate(&mut self, device: &mut dyn BlockDevice, slot: usize) -> Result<(), SceneObjectError> {
        ensure_state("calculate", self.state, &[ObjectState::BlockValid])?;
        ensure_slot(slot, self.buffering_count())?;
        let has_volatile = self.schema.is_some_and(|schema| schema.has_volatile());

        if has_volatile {
            self.upload_full(device, slot)?;
        } else if self.dirty.is_slot_dirty(slot) {
            self.upload_dirty(device, slot)?;
        } else {
            trace!("slot {} is up to date", slot);
            return Ok(());
        }

        self.dirty.clear_slot(slot);
        Ok(())
    }

    pub fn calculate_all(&mut self, device: &mut dyn BlockDevice) -> Result<(), SceneObjectError> {
        for slot in 0..self.buffering_count() {
            self.calculate(device, slot)?;
        }
        Ok(())
    }

    fn upload_full(&mut self, device: &mut dyn BlockDevice, slot: usize) -> Result<(), SceneObjectError> {
        let Some(schema) = self.schema else {
            return Ok(());
        };
        if self.blocks.block(slot).is_none() {
            return Ok(());
        }
        let endianness = device.block_endianness();
        for descriptor in schema.parameters() {
            if let Some(range) = descriptor.block_range() {
                convert_parameter(descriptor.kind(), &self.raw[descriptor.raw_range()], &mut self.staging[range], endianness);
            }
        }
        self.blocks.write(device, slot, 0, &self.staging[..])?;
        debug!("slot {}: full conversion of {} parameters", slot, schema.count());
        Ok(())
    }

    fn upload_dirty(&mut self, device: &mut dyn BlockDevice, slot: usize) -> Result<(), SceneObjectError> {
        let Some(schema) = self.schema else {
            return Ok(());
        };
        if self.blocks.block(slot).is_none() {
            return Ok(());
        }
        let endianness = device.block_endianness();
        for index in self.dirty.dirty_indices(slot) {
            let Some(descriptor) = schema.parameter(index) else {
                continue;
            };
            let Some(range) = descriptor.block_range() else {
                continue;
            };
            trace!("slot {}: converting '{}'", slot, descriptor.name());
            convert_parameter(descriptor.kind(), &self.raw[descriptor.raw_range()], &mut self.staging[range.clone()], endianness);
            self.blocks.write(device, slot, range.start, &self.staging[range])?;
        }
        Ok(())
    }
}

fn check_size<T: Pod>(descriptor: &ParameterDescriptor) -> Result<(), ParameterError> {
    if size_of::<T>() != descriptor.raw_size() {
        return Err(ParameterError::SizeMismatch {
            parameter: descriptor.name().to_string(),
            declared: descriptor.raw_size(),
            requested: size_of::<T>(),
        });
    }
    Ok(())
}

fn read_native_words(raw: &[u8]) -> impl Iterator<Item = u32> + '_ {
    raw.chunks_exact(WORD_SIZE_BYTES).map(|word| u32::from_ne_bytes([word[0], word[1], word[2], word[3]]))
}

/// Scale, rotation (radians) and translation into a row-major 2x3 matrix.
#[must_use]
fn srt2d_to_matrix(raw: &[u8]) -> [u32; 6] {
    let mut srt = [0.0_f32; 5];
    for (value, word) in srt.iter_mut().zip(read_native_words(raw)) {
        *value = f32::from_bits(word);
    }
    let [scale_x, scale_y, rotation, translate_x, translate_y] = srt;
    srt2d_to_rows(Vector2d::new(scale_x, scale_y), Rad(rotation), Vector2d::new(translate_x, translate_y)).map(f32::to_bits)
}

/// Raw host-order parameter bytes into their uniform block form.
pub(crate) fn convert_parameter(kind: ParameterKind, raw: &[u8], block: &mut [u8], endianness: Endianness) {
    match kind {
        ParameterKind::Bool => {
            let value = read_native_words(raw).next().unwrap_or(0);
            write_words(block, &[u32::from(0 != value)], endianness);
        }
        ParameterKind::Srt2d => write_words(block, &srt2d_to_matrix(raw), endianness),
        _ => copy_words(block, raw, endianness),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::byte_order::read_word;
    use crate::gpu::host_block_device::HostBlockDevice;
    use crate::memory::placement::allocate_work_memory;
    use crate::resource::parameter_schema::ParameterDescriptor;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;
    use strum_macros::{Display, EnumCount, EnumIter};

    #[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumIter, EnumCount)]
    enum TestSubBuffer {
        DirtyFlags,
        RawParameters,
        BlockStaging,
        BlockHandles,
    }

    const LAYOUT: ParameterBlockLayout<TestSubBuffer> = ParameterBlockLayout {
        dirty_flags: TestSubBuffer::DirtyFlags,
        raw_parameters: TestSubBuffer::RawParameters,
        block_staging: TestSubBuffer::BlockStaging,
        block_handles: TestSubBuffer::BlockHandles,
    };

    const ALIGNMENT: usize = 64;
    const BUFFERING_COUNT: usize = 2;

    fn make_schema(volatile_time: bool) -> ParameterSchema {
        let time = ParameterDescriptor::new("time", ParameterKind::Float, 28).with_block_offset(40);
        ParameterSchema::new(vec![
            ParameterDescriptor::new("enabled", ParameterKind::Bool, 0).with_block_offset(0).with_default(&[1.0]),
            ParameterDescriptor::new("uv_transform", ParameterKind::Srt2d, 4).with_block_offset(4).with_default(&[1.0, 1.0, 0.0, 0.0, 0.0]),
            ParameterDescriptor::new("offset", ParameterKind::Int, 24).with_block_offset(28).with_depended_index(1),
            if volatile_time { time.make_volatile() } else { time },
        ])
        .unwrap()
    }

    fn build<'a>(schema: &'a ParameterSchema, memory: &'a mut [u64]) -> ParameterBlock<'a> {
        let plan = LAYOUT.request(MemoryPlanner::new(), schema, BUFFERING_COUNT, true).finish().unwrap();
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(memory);
        let mut placement = Placement::split(&plan, bytes).unwrap();
        LAYOUT.place(&mut placement, schema, BUFFERING_COUNT).unwrap()
    }

    fn bind(system_under_test: &mut ParameterBlock, device: &mut HostBlockDevice) {
        let size = system_under_test.calculate_block_buffer_size(device);
        let pool = device.create_memory_pool(size);
        system_under_test.setup_block_buffer(device, pool, 0, size).unwrap();
    }

    fn block_word(device: &HostBlockDevice, system_under_test: &ParameterBlock, slot: usize, offset: usize) -> u32 {
        let bytes = device.read_block(system_under_test.block(slot).unwrap()).unwrap();
        read_word(&bytes[offset..offset + WORD_SIZE_BYTES], device.block_endianness())
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 1)]
    #[case(7, 1)]
    #[case(u32::MAX, 1)]
    fn test_bool_is_normalized(#[case] raw: u32, #[case] expected: u32) {
        let mut block = [0_u8; 4];

        convert_parameter(ParameterKind::Bool, &raw.to_ne_bytes(), &mut block, Endianness::Little);

        assert_eq!(u32::from_le_bytes(block), expected);
    }

    #[test]
    fn test_srt2d_becomes_matrix() {
        let srt = [2.0_f32, 3.0, std::f32::consts::FRAC_PI_2, 5.0, 7.0];
        let mut block = [0_u8; 24];

        convert_parameter(ParameterKind::Srt2d, bytemuck::cast_slice(&srt), &mut block, Endianness::Little);

        let matrix: Vec<f32> = block.chunks_exact(4).map(|word| f32::from_le_bytes([word[0], word[1], word[2], word[3]])).collect();
        let expected = [0.0, -3.0, 5.0, 2.0, 0.0, 7.0];
        for (actual, expected) in matrix.iter().zip(expected.iter()) {
            assert_approx_eq!(f32, *actual, *expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_big_endian_conversion_swaps_bytes() {
        let mut block = [0_u8; 4];

        convert_parameter(ParameterKind::UInt, &0x11223344_u32.to_ne_bytes(), &mut block, Endianness::Big);

        assert_eq!(block, [0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn test_build_copies_defaults() {
        let schema = make_schema(false);
        let mut memory = allocate_work_memory(1024);

        let system_under_test = build(&schema, &mut memory);

        assert_eq!(system_under_test.state(), ObjectState::Built);
        assert_eq!(system_under_test.raw_parameters(), schema.default_raw());
        assert!(!system_under_test.is_flag_dirty());
    }

    #[test]
    fn test_depended_parameter_marked_dirty() {
        let schema = make_schema(false);
        let mut memory = allocate_work_memory(1024);
        let mut device = HostBlockDevice::new(ALIGNMENT);
        let mut system_under_test = build(&schema, &mut memory);
        bind(&mut system_under_test, &mut device);

        system_under_test.set_parameter(2, 42_i32).unwrap();
        *system_under_test.edit_parameter::<[f32; 5]>(1).unwrap() = [1.0, 1.0, 0.0, 9.0, 0.0];
        system_under_test.set_parameter(2, 43_i32).unwrap();

        assert!(system_under_test.is_slot_dirty(0));
        system_under_test.calculate(&mut device, 0).unwrap();
        assert_eq!(block_word(&device, &system_under_test, 0, 28), 43);
        assert_approx_eq!(f32, f32::from_bits(block_word(&device, &system_under_test, 0, 12)), 9.0);
        assert!(!system_under_test.is_slot_dirty(0));
        assert!(system_under_test.is_slot_dirty(1));
    }

    #[test]
    fn test_volatile_forces_full_conversion() {
        let schema = make_schema(true);
        let mut memory = allocate_work_memory(1024);
        let mut device = HostBlockDevice::new(ALIGNMENT);
        let mut system_under_test = build(&schema, &mut memory);
        bind(&mut system_under_test, &mut device);
        let writes_before = device.write_count();

        system_under_test.calculate(&mut device, 0).unwrap();
        system_under_test.calculate(&mut device, 0).unwrap();

        assert_eq!(device.write_count(), writes_before + 2);
    }

    #[test]
    fn test_clean_slot_skips_upload() {
        let schema = make_schema(false);
        let mut memory = allocate_work_memory(1024);
        let mut device = HostBlockDevice::new(ALIGNMENT);
        let mut system_under_test = build(&schema, &mut memory);
        bind(&mut system_under_test, &mut device);
        let writes_before = device.write_count();

        system_under_test.calculate(&mut device, 1).unwrap();

        assert_eq!(device.write_count(), writes_before);
    }

    #[test]
    fn test_clear_parameters_dirties_every_slot() {
        let schema = make_schema(false);
        let mut memory = allocate_work_memory(1024);
        let mut device = HostBlockDevice::new(ALIGNMENT);
        let mut system_under_test = build(&schema, &mut memory);
        bind(&mut system_under_test, &mut device);
        system_under_test.set_parameter(0, 0_u32).unwrap();
        system_under_test.calculate_all(&mut device).unwrap();
        assert_eq!(block_word(&device, &system_under_test, 1, 0), 0);

        system_under_test.clear_parameters().unwrap();

        assert_eq!(system_under_test.raw_parameters(), schema.default_raw());
        assert!(system_under_test.is_slot_dirty(0));
        assert!(system_under_test.is_slot_dirty(1));
        system_under_test.calculate_all(&mut device).unwrap();
        assert_eq!(block_word(&device, &system_under_test, 1, 0), 1);
        assert!(!system_under_test.is_flag_dirty());
    }

    #[test]
    fn test_misaligned_typed_view_rejected() {
        let schema = ParameterSchema::new(vec![
            ParameterDescriptor::new("padding", ParameterKind::Float, 0),
            ParameterDescriptor::new("pair", ParameterKind::Float2, 4),
        ])
        .unwrap();
        let mut memory = allocate_work_memory(1024);
        let mut system_under_test = build(&schema, &mut memory);

        let result = system_under_test.edit_parameter::<u64>(1);

        assert!(matches!(result, Err(SceneObjectError::Parameter(ParameterError::Misaligned { alignment: 8, .. }))));
        assert!(!system_under_test.is_flag_dirty());
        assert!(system_under_test.edit_parameter::<[f32; 2]>(1).is_ok());
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic)]
    fn test_index_out_of_range() {
        let schema = make_schema(false);
        let mut memory = allocate_work_memory(1024);
        let system_under_test = build(&schema, &mut memory);

        let result = system_under_test.parameter_bytes(4);

        assert!(matches!(result, Err(SceneObjectError::Parameter(ParameterError::IndexOutOfRange { index: 4, count: 4 }))));
    }

    #[test]
    fn test_cleanup_returns_to_built() {
        let schema = make_schema(false);
        let mut memory = allocate_work_memory(1024);
        let mut device = HostBlockDevice::new(ALIGNMENT);
        let mut system_under_test = build(&schema, &mut memory);
        bind(&mut system_under_test, &mut device);

        system_under_test.cleanup_block_buffer(&mut device);
        system_under_test.cleanup_block_buffer(&mut device);

        assert_eq!(system_under_test.state(), ObjectState::Built);
        assert!(!system_under_test.is_block_buffer_valid());
        assert_eq!(device.live_view_count(), 0);
    }
}
