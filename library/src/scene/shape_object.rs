use crate::geometry::transform::{affine_from_rows, affine_to_rows, Affine, AffineRows};
use crate::gpu::block_device::{BlockDevice, BlockHandle, MemoryPoolHandle};
use crate::memory::memory_plan::{MemoryPlan, MemoryPlanner, PlanError};
use crate::memory::placement::{BuildError, Placement};
use crate::resource::model_resource::{Bounds, ShapeResource, SHAPE_WORLD_MATRIX_INDEX};
use crate::resource::parameter_schema::ParameterSchema;
use crate::scene::buffering_config::{ModelConfig, ModelFeatures};
use crate::scene::object_state::{ensure_state, ObjectState};
use crate::scene::parameter_block::{ParameterBlock, ParameterBlockLayout};
use crate::scene::scene_object_error::SceneObjectError;
use strum_macros::{Display, EnumCount, EnumIter};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumIter, EnumCount)]
pub enum ShapeSubBuffer {
    DirtyFlags,
    RawParameters,
    BlockStaging,
    BlockHandles,
    WorldBounds,
}

const PARAMETER_LAYOUT: ParameterBlockLayout<ShapeSubBuffer> = ParameterBlockLayout {
    dirty_flags: ShapeSubBuffer::DirtyFlags,
    raw_parameters: ShapeSubBuffer::RawParameters,
    block_staging: ShapeSubBuffer::BlockStaging,
    block_handles: ShapeSubBuffer::BlockHandles,
};

pub(crate) fn plan_shape(schema: &ParameterSchema, config: ModelConfig) -> Result<MemoryPlan<ShapeSubBuffer>, PlanError> {
    config.validate()?;
    let bounds_count = if config.features().contains(ModelFeatures::BOUNDING) { 1 } else { 0 };
    PARAMETER_LAYOUT
        .request(MemoryPlanner::new(), schema, config.buffering_count(), config.features().contains(ModelFeatures::SHAPE_BLOCKS))
        .request_array::<Bounds>(ShapeSubBuffer::WorldBounds, bounds_count)
        .finish()
}

pub(crate) fn place_shape<'a>(placement: &mut Placement<'a, ShapeSubBuffer>, resource: &'a ShapeResource, schema: &'a ParameterSchema, config: ModelConfig) -> Result<ShapeObject<'a>, BuildError> {
    let parameters = PARAMETER_LAYOUT.place(placement, schema, config.buffering_count())?;
    let world_bounds = placement.take::<Bounds>(ShapeSubBuffer::WorldBounds)?;
    world_bounds.fill(resource.bounds());
    Ok(ShapeObject { resource: Some(resource), parameters, world_bounds })
}

/// One drawable part of a model: its world matrix and, when enabled, the
/// shape uniform block and world-space bounds.
#[derive(Default)]
pub struct ShapeObject<'a> {
    resource: Option<&'a ShapeResource>,
    parameters: ParameterBlock<'a>,
    world_bounds: &'a mut [Bounds],
}

impl<'a> ShapeObject<'a> {
    #[must_use]
    pub fn state(&self) -> ObjectState {
        self.parameters.state()
    }

    #[must_use]
    pub fn resource(&self) -> Option<&'a ShapeResource> {
        self.resource
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.resource.map_or("", |resource| resource.name())
    }

    #[must_use]
    pub fn material_index(&self) -> Option<usize> {
        self.resource.map(|resource| resource.material_index())
    }

    #[must_use]
    pub fn parameters(&self) -> &ParameterBlock<'a> {
        &self.parameters
    }

    #[must_use]
    pub fn parameters_mut(&mut self) -> &mut ParameterBlock<'a> {
        &mut self.parameters
    }

    pub fn world_matrix(&self) -> Result<Affine, SceneObjectError> {
        let rows: AffineRows = self.parameters.parameter(SHAPE_WORLD_MATRIX_INDEX)?;
        Ok(affine_from_rows(&rows))
    }

    /// Stored and uploaded as a row-major 3x4; the projective row is dropped.
    pub fn set_world_matrix(&mut self, matrix: &Affine) -> Result<(), SceneObjectError> {
        self.parameters.set_parameter(SHAPE_WORLD_MATRIX_INDEX, affine_to_rows(matrix))
    }

    /// `None` unless bounding is enabled.
    #[must_use]
    pub fn world_bounds(&self) -> Option<Bounds> {
        self.world_bounds.first().copied()
    }

    /// Moves the resource bounds into world space with the current matrix.
    pub fn calculate_bounding(&mut self) -> Result<(), SceneObjectError> {
        ensure_state("calculate_bounding", self.state(), &[ObjectState::Built, ObjectState::BlockValid])?;
        let matrix = self.world_matrix()?;
        if let (Some(resource), Some(target)) = (self.resource, self.world_bounds.first_mut()) {
            *target = resource.bounds().transformed(&matrix);
        }
        Ok(())
    }

    #[must_use]
    pub fn calculate_block_buffer_size(&self, device: &dyn BlockDevice) -> usize {
        self.parameters.calculate_block_buffer_size(device)
    }

    pub fn setup_block_buffer(&mut self, device: &mut dyn BlockDevice, pool: MemoryPoolHandle, offset: usize, region_size: usize) -> Result<(), SceneObjectError> {
        self.parameters.setup_block_buffer(device, pool, offset, region_size)
    }

    pub fn cleanup_block_buffer(&mut self, device: &mut dyn BlockDevice) {
        self.parameters.cleanup_block_buffer(device);
    }

    #[must_use]
    pub fn is_block_buffer_valid(&self) -> bool {
        self.parameters.is_block_buffer_valid()
    }

    #[must_use]
    pub fn shape_block(&self, slot: usize) -> Option<BlockHandle> {
        self.parameters.block(slot)
    }

    pub fn calculate_shape(&mut self, device: &mut dyn BlockDevice, slot: usize) -> Result<(), SceneObjectError> {
        self.parameters.calculate(device, slot)
    }
}
