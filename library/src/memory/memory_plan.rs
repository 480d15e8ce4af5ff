use crate::memory::alignment::{align_up, is_power_of_two, ALIGNMENT_BUFFER};
use bytemuck::Pod;
use log::trace;
use std::fmt::{Debug, Display};
use strum::{EnumCount, IntoEnumIterator};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("invalid configuration: {what}")]
    InvalidConfiguration {
        what: String,
    },
    #[error("sub-buffer '{kind}' requested more than once")]
    DuplicateSubBuffer {
        kind: String,
    },
    #[error("sub-buffer '{kind}' has not been requested")]
    MissingSubBuffer {
        kind: String,
    },
    #[error("sub-buffer '{kind}' requests unsupported alignment {alignment}")]
    InvalidAlignment {
        kind: String,
        alignment: usize,
    },
}

/// Names one placed region of a scene object's work memory.
pub trait SubBufferKind: Copy + Eq + Debug + Display + IntoEnumIterator + EnumCount {}

impl<T> SubBufferKind for T where T: Copy + Eq + Debug + Display + IntoEnumIterator + EnumCount {}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct SubBufferRange {
    offset: usize,
    size: usize,
    alignment: usize,
}

impl SubBufferRange {
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    #[must_use]
    pub fn end(&self) -> usize {
        self.offset + self.size
    }

    #[must_use]
    pub fn overlaps(&self, another: &SubBufferRange) -> bool {
        self.offset < another.end() && another.offset < self.end()
    }
}

struct Request<K> {
    kind: K,
    size: usize,
    alignment: usize,
}

/// Collects sub-buffer requests in layout order and turns them into a [`MemoryPlan`].
/// Nothing is allocated besides the plan itself.
pub struct MemoryPlanner<K: SubBufferKind> {
    requests: Vec<Request<K>>,
}

impl<K: SubBufferKind> MemoryPlanner<K> {
    #[must_use]
    pub fn new() -> Self {
        Self { requests: Vec::with_capacity(K::COUNT) }
    }

    #[must_use]
    pub fn request(mut self, kind: K, size: usize, alignment: usize) -> Self {
        self.requests.push(Request { kind, size, alignment });
        self
    }

    #[must_use]
    pub fn request_array<T: Pod>(self, kind: K, count: usize) -> Self {
        self.request(kind, size_of::<T>() * count, align_of::<T>())
    }

    pub fn finish(self) -> Result<MemoryPlan<K>, PlanError> {
        for kind in K::iter() {
            match self.requests.iter().filter(|request| request.kind == kind).count() {
                0 => return Err(PlanError::MissingSubBuffer { kind: kind.to_string() }),
                1 => {}
                _ => return Err(PlanError::DuplicateSubBuffer { kind: kind.to_string() }),
            }
        }

        let mut entries = Vec::with_capacity(self.requests.len());
        let mut head = 0;
        for request in self.requests {
            if !is_power_of_two(request.alignment) || request.alignment > ALIGNMENT_BUFFER {
                return Err(PlanError::InvalidAlignment { kind: request.kind.to_string(), alignment: request.alignment });
            }
            let offset = align_up(head, request.alignment);
            trace!("sub-buffer {}: offset {}, size {}", request.kind, offset, request.size);
            entries.push((request.kind, SubBufferRange { offset, size: request.size, alignment: request.alignment }));
            head = offset + request.size;
        }

        Ok(MemoryPlan { entries, work_memory_size: align_up(head, ALIGNMENT_BUFFER) })
    }
}

impl<K: SubBufferKind> Default for MemoryPlanner<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Offsets and sizes of every sub-buffer inside one work-memory block.
/// A planning artifact: owns no work memory and may be dropped once objects are built.
#[derive(Clone, Debug, PartialEq)]
pub struct MemoryPlan<K: SubBufferKind> {
    entries: Vec<(K, SubBufferRange)>,
    work_memory_size: usize,
}

impl<K: SubBufferKind> MemoryPlan<K> {
    #[must_use]
    pub fn work_memory_size(&self) -> usize {
        self.work_memory_size
    }

    #[must_use]
    pub fn range(&self, kind: K) -> SubBufferRange {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == kind)
            .map(|(_, range)| *range)
            .expect("every sub-buffer kind is planned")
    }

    pub fn entries(&self) -> impl Iterator<Item = &(K, SubBufferRange)> {
        self.entries.iter()
    }

    /// `None` when `head` is shorter than the planned range.
    #[must_use]
    pub fn buffer<'a>(&self, head: &'a [u8], kind: K) -> Option<&'a [u8]> {
        let range = self.range(kind);
        head.get(range.offset()..range.end())
    }

    #[must_use]
    pub fn buffer_mut<'a>(&self, head: &'a mut [u8], kind: K) -> Option<&'a mut [u8]> {
        let range = self.range(kind);
        head.get_mut(range.offset()..range.end())
    }
}
