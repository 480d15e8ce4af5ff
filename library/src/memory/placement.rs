use crate::memory::alignment::{is_address_aligned, ALIGNMENT_BUFFER};
use crate::memory::memory_plan::{MemoryPlan, SubBufferKind};
use bytemuck::{Pod, PodCastError};
use log::debug;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("memory size has not been calculated before build")]
    MemoryNotCalculated,
    #[error("object still has its block buffer bound")]
    BlockBufferBound,
    #[error("work memory of {provided} bytes is smaller than the required {required} bytes")]
    InsufficientMemory {
        required: usize,
        provided: usize,
    },
    #[error("work memory at {address:#x} is not aligned to {alignment} bytes")]
    Misaligned {
        address: usize,
        alignment: usize,
    },
    #[error("sub-buffer '{kind}' can not be viewed as the requested element type: {reason}")]
    InvalidView {
        kind: String,
        reason: String,
    },
}

/// Caller-owned work memory sliced into disjoint per-sub-buffer regions.
pub struct Placement<'a, K: SubBufferKind> {
    regions: Vec<(K, &'a mut [u8])>,
    head_address: usize,
}

impl<'a, K: SubBufferKind> Placement<'a, K> {
    pub fn split(plan: &MemoryPlan<K>, buffer: &'a mut [u8]) -> Result<Self, BuildError> {
        let required = plan.work_memory_size();
        if buffer.len() < required {
            return Err(BuildError::InsufficientMemory { required, provided: buffer.len() });
        }
        if !is_address_aligned(buffer, ALIGNMENT_BUFFER) {
            return Err(BuildError::Misaligned { address: buffer.as_ptr() as usize, alignment: ALIGNMENT_BUFFER });
        }

        let head_address = buffer.as_ptr() as usize;
        debug!("placing {} bytes of work memory at {:#x}", required, head_address);

        let mut ordered: Vec<_> = plan.entries().copied().collect();
        ordered.sort_by_key(|(_, range)| range.offset());

        let mut regions = Vec::with_capacity(ordered.len());
        let mut rest = buffer;
        let mut consumed = 0;
        for (kind, range) in ordered {
            let (_padding, tail) = std::mem::take(&mut rest).split_at_mut(range.offset() - consumed);
            let (region, tail) = tail.split_at_mut(range.size());
            regions.push((kind, region));
            consumed = range.end();
            rest = tail;
        }

        Ok(Self { regions, head_address })
    }

    #[must_use]
    pub fn head_address(&self) -> usize {
        self.head_address
    }

    /// Moves the region out; a second take of the same kind yields an empty slice.
    #[must_use]
    pub fn take_bytes(&mut self, kind: K) -> &'a mut [u8] {
        self.regions
            .iter_mut()
            .find(|(candidate, _)| *candidate == kind)
            .map(|(_, region)| std::mem::take(region))
            .unwrap_or_default()
    }

    pub fn take<T: Pod>(&mut self, kind: K) -> Result<&'a mut [T], BuildError> {
        let bytes = self.take_bytes(kind);
        bytemuck::try_cast_slice_mut(bytes).map_err(|reason| make_view_error(kind, reason))
    }
}

#[must_use]
fn make_view_error<K: SubBufferKind>(kind: K, reason: PodCastError) -> BuildError {
    BuildError::InvalidView { kind: kind.to_string(), reason: format!("{:?}", reason) }
}

/// Allocates zeroed, [`ALIGNMENT_BUFFER`]-aligned work memory of at least `size` bytes.
/// A convenience for callers without their own arena.
#[must_use]
pub fn allocate_work_memory(size: usize) -> Vec<u64> {
    vec![0_u64; size.div_ceil(size_of::<u64>())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::memory_plan::MemoryPlanner;
    use strum_macros::{Display, EnumCount, EnumIter};

    #[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumIter, EnumCount)]
    enum TestSubBuffer {
        Words,
        Handles,
    }

    #[must_use]
    fn make_plan() -> MemoryPlan<TestSubBuffer> {
        MemoryPlanner::new()
            .request_array::<u32>(TestSubBuffer::Words, 3)
            .request_array::<u64>(TestSubBuffer::Handles, 2)
            .finish()
            .unwrap()
    }

    #[test]
    fn test_split_exact_size() {
        let plan = make_plan();
        let mut backend = allocate_work_memory(plan.work_memory_size());
        let buffer: &mut [u8] = bytemuck::cast_slice_mut(&mut backend);

        let mut system_under_test = Placement::split(&plan, &mut buffer[..plan.work_memory_size()]).unwrap();

        let words = system_under_test.take::<u32>(TestSubBuffer::Words).unwrap();
        assert_eq!(words.len(), 3);
        words[2] = 42;
        let handles = system_under_test.take::<u64>(TestSubBuffer::Handles).unwrap();
        assert_eq!(handles.len(), 2);
        handles[0] = 7;

        assert_eq!(plan.range(TestSubBuffer::Handles).offset(), 16);
        assert_eq!(u32::from_ne_bytes(buffer[8..12].try_into().unwrap()), 42);
        assert_eq!(u64::from_ne_bytes(buffer[16..24].try_into().unwrap()), 7);
    }

    #[test]
    fn test_split_one_byte_short() {
        let plan = make_plan();
        let mut backend = allocate_work_memory(plan.work_memory_size());
        let buffer: &mut [u8] = bytemuck::cast_slice_mut(&mut backend);

        let result = Placement::split(&plan, &mut buffer[..plan.work_memory_size() - 1]);

        assert_eq!(result.err(), Some(BuildError::InsufficientMemory { required: 32, provided: 31 }));
    }

    #[test]
    fn test_split_misaligned() {
        let plan = make_plan();
        let mut backend = allocate_work_memory(plan.work_memory_size() + ALIGNMENT_BUFFER);
        let buffer: &mut [u8] = bytemuck::cast_slice_mut(&mut backend);

        let result = Placement::split(&plan, &mut buffer[4..]);

        assert!(matches!(result, Err(BuildError::Misaligned { alignment: ALIGNMENT_BUFFER, .. })));
    }

    #[test]
    fn test_take_twice_yields_empty() {
        let plan = make_plan();
        let mut backend = allocate_work_memory(plan.work_memory_size());
        let buffer: &mut [u8] = bytemuck::cast_slice_mut(&mut backend);
        let mut system_under_test = Placement::split(&plan, buffer).unwrap();

        let _ = system_under_test.take_bytes(TestSubBuffer::Words);

        assert!(system_under_test.take_bytes(TestSubBuffer::Words).is_empty());
    }
}
