use crate::gpu::block_buffer::BlockBufferError;
use crate::gpu::block_device::{BlockDevice, MemoryPoolHandle};
use crate::memory::alignment::{is_aligned, ALIGNMENT_BUFFER};
use crate::memory::memory_plan::{MemoryPlan, MemoryPlanner, PlanError};
use crate::memory::placement::{BuildError, Placement};
use crate::resource::model_resource::{Bounds, ModelResource};
use crate::scene::buffering_config::{ModelConfig, ModelFeatures};
use crate::scene::callbacks::VisibilityChangeCallback;
use crate::scene::material_object::{place_material, plan_material, MaterialObject, MaterialSubBuffer};
use crate::scene::object_state::{ensure_element, ensure_slot, ensure_state, ObjectState};
use crate::scene::scene_object_error::SceneObjectError;
use crate::scene::shape_object::{place_shape, plan_shape, ShapeObject, ShapeSubBuffer};
use log::{debug, warn};
use strum_macros::{Display, EnumCount, EnumIter};

const VISIBILITY_WORD_BITS: usize = u32::BITS as usize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumIter, EnumCount)]
pub enum ModelSubBuffer {
    MaterialMemory,
    ShapeMemory,
    Visibility,
    ModelBounds,
}

/// Layout of a model's work memory together with the layouts of the nested
/// objects carved from the `MaterialMemory` and `ShapeMemory` regions.
#[derive(Clone, Debug)]
pub struct ModelPlan {
    layout: MemoryPlan<ModelSubBuffer>,
    materials: Vec<MemoryPlan<MaterialSubBuffer>>,
    shape: MemoryPlan<ShapeSubBuffer>,
}

impl ModelPlan {
    #[must_use]
    pub fn layout(&self) -> &MemoryPlan<ModelSubBuffer> {
        &self.layout
    }

    #[must_use]
    pub fn material(&self, index: usize) -> Option<&MemoryPlan<MaterialSubBuffer>> {
        self.materials.get(index)
    }

    #[must_use]
    pub fn shape(&self) -> &MemoryPlan<ShapeSubBuffer> {
        &self.shape
    }

    #[must_use]
    pub fn work_memory_size(&self) -> usize {
        self.layout.work_memory_size()
    }
}

pub(crate) fn plan_model(resource: &ModelResource, config: ModelConfig) -> Result<ModelPlan, PlanError> {
    config.validate()?;
    let materials = resource
        .materials()
        .iter()
        .map(|material| plan_material(material, config.buffering()))
        .collect::<Result<Vec<_>, _>>()?;
    let shape = plan_shape(resource.shape_parameters(), config)?;

    let shape_count = resource.shapes().len();
    let material_bytes: usize = materials.iter().map(|plan| plan.work_memory_size()).sum();
    let visibility_words = (config.view_count() * shape_count).div_ceil(VISIBILITY_WORD_BITS);
    let bounds_count = if config.features().contains(ModelFeatures::BOUNDING) { 1 } else { 0 };

    let layout = MemoryPlanner::new()
        .request(ModelSubBuffer::MaterialMemory, material_bytes, ALIGNMENT_BUFFER)
        .request(ModelSubBuffer::ShapeMemory, shape.work_memory_size() * shape_count, ALIGNMENT_BUFFER)
        .request_array::<u32>(ModelSubBuffer::Visibility, visibility_words)
        .request_array::<Bounds>(ModelSubBuffer::ModelBounds, bounds_count)
        .finish()?;

    Ok(ModelPlan { layout, materials, shape })
}

/// Plans and places [`ModelObject`]s, nested materials and shapes included.
pub struct ModelObjectBuilder<'a> {
    resource: &'a ModelResource,
    config: ModelConfig,
    plan: Option<ModelPlan>,
}

impl<'a> ModelObjectBuilder<'a> {
    #[must_use]
    pub fn new(resource: &'a ModelResource) -> Self {
        Self { resource, config: ModelConfig::new(), plan: None }
    }

    #[must_use]
    pub fn with_config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self.plan = None;
        self
    }

    #[must_use]
    pub fn with_buffering_count(self, buffering_count: usize) -> Self {
        let config = self.config.with_buffering_count(buffering_count);
        self.with_config(config)
    }

    #[must_use]
    pub fn with_view_count(self, view_count: usize) -> Self {
        let config = self.config.with_view_count(view_count);
        self.with_config(config)
    }

    #[must_use]
    pub fn with_features(self, features: ModelFeatures) -> Self {
        let config = self.config.with_features(features);
        self.with_config(config)
    }

    pub fn calculate_memory_size(&mut self) -> Result<usize, PlanError> {
        let plan = plan_model(self.resource, self.config)?;
        let size = plan.work_memory_size();
        debug!(
            "model '{}': {} bytes of work memory for {} materials and {} shapes",
            self.resource.name(),
            size,
            self.resource.materials().len(),
            self.resource.shapes().len(),
        );
        self.plan = Some(plan);
        Ok(size)
    }

    #[must_use]
    pub fn is_memory_calculated(&self) -> bool {
        self.plan.is_some()
    }

    #[must_use]
    pub fn work_memory_size(&self) -> usize {
        self.plan.as_ref().map_or(0, |plan| plan.work_memory_size())
    }

    #[must_use]
    pub fn plan(&self) -> Option<&ModelPlan> {
        self.plan.as_ref()
    }

    /// Nested materials come first, in resource order, then the shapes.
    /// On failure `object` is left untouched.
    pub fn build(&self, object: &mut ModelObject<'a>, buffer: &'a mut [u8]) -> Result<(), BuildError> {
        let plan = self.plan.as_ref().ok_or(BuildError::MemoryNotCalculated)?;
        if object.state() == ObjectState::BlockValid {
            return Err(BuildError::BlockBufferBound);
        }
        let mut placement = Placement::split(&plan.layout, buffer)?;

        let mut material_memory = placement.take_bytes(ModelSubBuffer::MaterialMemory);
        let mut materials = Vec::with_capacity(plan.materials.len());
        for (resource, material_plan) in self.resource.materials().iter().zip(&plan.materials) {
            let (head, rest) = std::mem::take(&mut material_memory).split_at_mut(material_plan.work_memory_size());
            material_memory = rest;
            let mut nested = Placement::split(material_plan, head)?;
            materials.push(place_material(&mut nested, resource, self.config.buffering())?);
        }

        let mut shape_memory = placement.take_bytes(ModelSubBuffer::ShapeMemory);
        let mut shapes = Vec::with_capacity(self.resource.shapes().len());
        for resource in self.resource.shapes() {
            let (head, rest) = std::mem::take(&mut shape_memory).split_at_mut(plan.shape.work_memory_size());
            shape_memory = rest;
            let mut nested = Placement::split(&plan.shape, head)?;
            shapes.push(place_shape(&mut nested, resource, self.resource.shape_parameters(), self.config)?);
        }

        let mut result = ModelObject {
            state: ObjectState::Built,
            resource: Some(self.resource),
            config: self.config,
            materials,
            shapes,
            visibility: placement.take::<u32>(ModelSubBuffer::Visibility)?,
            model_bounds: placement.take::<Bounds>(ModelSubBuffer::ModelBounds)?,
            buffer_address: placement.head_address(),
            visibility_change_callback: None,
        };
        result.reset_visibility();
        result.merge_model_bounds();
        *object = result;
        Ok(())
    }
}

/// Runtime state of one model instance. Nested object headers are kept in
/// `Vec`s; everything they point to lives in the model's work memory.
#[derive(Default)]
pub struct ModelObject<'a> {
    state: ObjectState,
    resource: Option<&'a ModelResource>,
    config: ModelConfig,
    materials: Vec<MaterialObject<'a>>,
    shapes: Vec<ShapeObject<'a>>,
    visibility: &'a mut [u32],
    model_bounds: &'a mut [Bounds],
    buffer_address: usize,
    visibility_change_callback: Option<VisibilityChangeCallback>,
}

impl<'a> ModelObject<'a> {
    #[must_use]
    pub fn state(&self) -> ObjectState {
        self.state
    }

    #[must_use]
    pub fn resource(&self) -> Option<&'a ModelResource> {
        self.resource
    }

    #[must_use]
    pub fn config(&self) -> ModelConfig {
        self.config
    }

    #[must_use]
    pub fn buffer_ptr(&self) -> usize {
        self.buffer_address
    }

    #[must_use]
    pub fn buffering_count(&self) -> usize {
        self.config.buffering_count()
    }

    #[must_use]
    pub fn view_count(&self) -> usize {
        self.config.view_count()
    }

    #[must_use]
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn material(&self, index: usize) -> Result<&MaterialObject<'a>, SceneObjectError> {
        ensure_element("material", index, self.materials.len())?;
        Ok(&self.materials[index])
    }

    pub fn material_mut(&mut self, index: usize) -> Result<&mut MaterialObject<'a>, SceneObjectError> {
        ensure_element("material", index, self.materials.len())?;
        Ok(&mut self.materials[index])
    }

    #[must_use]
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn shape(&self, index: usize) -> Result<&ShapeObject<'a>, SceneObjectError> {
        ensure_element("shape", index, self.shapes.len())?;
        Ok(&self.shapes[index])
    }

    pub fn shape_mut(&mut self, index: usize) -> Result<&mut ShapeObject<'a>, SceneObjectError> {
        ensure_element("shape", index, self.shapes.len())?;
        Ok(&mut self.shapes[index])
    }

    fn visibility_bit(&self, view: usize, shape: usize) -> Result<(usize, u32), SceneObjectError> {
        ensure_element("view", view, self.view_count())?;
        ensure_element("shape", shape, self.shapes.len())?;
        let bit = view * self.shapes.len() + shape;
        Ok((bit / VISIBILITY_WORD_BITS, 1 << (bit % VISIBILITY_WORD_BITS)))
    }

    pub fn is_shape_visible(&self, view: usize, shape: usize) -> Result<bool, SceneObjectError> {
        ensure_state("is_shape_visible", self.state, &[ObjectState::Built, ObjectState::BlockValid])?;
        let (word, mask) = self.visibility_bit(view, shape)?;
        Ok(self.visibility[word] & mask != 0)
    }

    pub fn set_shape_visible(&mut self, view: usize, shape: usize, visible: bool) -> Result<(), SceneObjectError> {
        ensure_state("set_shape_visible", self.state, &[ObjectState::Built, ObjectState::BlockValid])?;
        let (word, mask) = self.visibility_bit(view, shape)?;
        let was_visible = self.visibility[word] & mask != 0;
        if was_visible == visible {
            return Ok(());
        }
        if visible {
            self.visibility[word] |= mask;
        } else {
            self.visibility[word] &= !mask;
        }
        if let Some(callback) = self.visibility_change_callback.as_mut() {
            callback(view, shape, visible);
        }
        Ok(())
    }

    pub fn set_visibility_change_callback(&mut self, callback: VisibilityChangeCallback) {
        self.visibility_change_callback = Some(callback);
    }

    /// Every shape visible in every view; the callback is not invoked.
    pub fn reset_visibility(&mut self) {
        self.visibility.fill(0);
        let bit_count = self.view_count() * self.shapes.len();
        for bit in 0..bit_count {
            self.visibility[bit / VISIBILITY_WORD_BITS] |= 1 << (bit % VISIBILITY_WORD_BITS);
        }
    }

    /// Bytes of the pool region shared by all nested blocks. Every nested
    /// size is a multiple of the block alignment, so no padding is needed.
    #[must_use]
    pub fn calculate_block_buffer_size(&self, device: &dyn BlockDevice) -> usize {
        let materials: usize = self.materials.iter().map(|material| material.calculate_block_buffer_size(device)).sum();
        let shapes: usize = self.shapes.iter().map(|shape| shape.calculate_block_buffer_size(device)).sum();
        materials + shapes
    }

    #[must_use]
    pub fn block_buffer_alignment(&self, device: &dyn BlockDevice) -> usize {
        device.block_alignment()
    }

    /// Partitions the region between nested materials, then shapes. When any
    /// of them fails, the already bound ones are released again.
    pub fn setup_block_buffer(&mut self, device: &mut dyn BlockDevice, pool: MemoryPoolHandle, offset: usize, region_size: usize) -> Result<(), SceneObjectError> {
        ensure_state("setup_block_buffer", self.state, &[ObjectState::Built])?;
        let alignment = self.block_buffer_alignment(device);
        if !is_aligned(offset, alignment) {
            return Err(BlockBufferError::Misaligned { offset, alignment }.into());
        }
        let required = self.calculate_block_buffer_size(device);
        if region_size < required {
            return Err(BlockBufferError::InsufficientMemory { required, provided: region_size }.into());
        }

        let mut bound = 0;
        if let Err(error) = self.bind_nested(device, pool, offset, &mut bound) {
            self.release_nested(device, bound);
            return Err(error);
        }
        self.state = ObjectState::BlockValid;
        debug!("model block buffer bound: pool {}, offset {}, {} bytes", pool, offset, required);
        Ok(())
    }

    /// `bound` counts the nested objects set up so far, materials first.
    fn bind_nested(&mut self, device: &mut dyn BlockDevice, pool: MemoryPoolHandle, offset: usize, bound: &mut usize) -> Result<(), SceneObjectError> {
        let mut cursor = offset;
        for material in self.materials.iter_mut() {
            let size = material.calculate_block_buffer_size(device);
            material.setup_block_buffer(device, pool, cursor, size)?;
            *bound += 1;
            cursor += size;
        }
        for shape in self.shapes.iter_mut() {
            let size = shape.calculate_block_buffer_size(device);
            shape.setup_block_buffer(device, pool, cursor, size)?;
            *bound += 1;
            cursor += size;
        }
        Ok(())
    }

    /// Releases the first `count` nested objects in partition order.
    fn release_nested(&mut self, device: &mut dyn BlockDevice, count: usize) {
        let material_count = count.min(self.materials.len());
        for material in self.materials.iter_mut().take(material_count).filter(|material| material.is_block_buffer_valid()) {
            material.cleanup_block_buffer(device);
        }
        for shape in self.shapes.iter_mut().take(count - material_count).filter(|shape| shape.is_block_buffer_valid()) {
            shape.cleanup_block_buffer(device);
        }
    }

    /// A repeated call is a logged no-op.
    pub fn cleanup_block_buffer(&mut self, device: &mut dyn BlockDevice) {
        if self.state != ObjectState::BlockValid {
            warn!("model block buffer cleanup requested in state {}; ignored", self.state);
            return;
        }
        self.release_nested(device, self.materials.len() + self.shapes.len());
        self.state = ObjectState::Built;
    }

    #[must_use]
    pub fn is_block_buffer_valid(&self) -> bool {
        self.state == ObjectState::BlockValid
    }

    pub fn calculate_materials(&mut self, device: &mut dyn BlockDevice, slot: usize) -> Result<(), SceneObjectError> {
        ensure_state("calculate_materials", self.state, &[ObjectState::BlockValid])?;
        ensure_slot(slot, self.buffering_count())?;
        for material in self.materials.iter_mut() {
            material.calculate_material(device, slot)?;
        }
        Ok(())
    }

    pub fn calculate_shapes(&mut self, device: &mut dyn BlockDevice, slot: usize) -> Result<(), SceneObjectError> {
        ensure_state("calculate_shapes", self.state, &[ObjectState::BlockValid])?;
        ensure_slot(slot, self.buffering_count())?;
        for shape in self.shapes.iter_mut() {
            shape.calculate_shape(device, slot)?;
        }
        Ok(())
    }

    pub fn calculate(&mut self, device: &mut dyn BlockDevice, slot: usize) -> Result<(), SceneObjectError> {
        self.calculate_materials(device, slot)?;
        self.calculate_shapes(device, slot)
    }

    /// Refreshes shape world bounds from their matrices, then the model
    /// bounds enclosing them. Does nothing without [`ModelFeatures::BOUNDING`].
    pub fn calculate_bounding(&mut self) -> Result<(), SceneObjectError> {
        ensure_state("calculate_bounding", self.state, &[ObjectState::Built, ObjectState::BlockValid])?;
        if !self.config.features().contains(ModelFeatures::BOUNDING) {
            return Ok(());
        }
        for shape in self.shapes.iter_mut() {
            shape.calculate_bounding()?;
        }
        self.merge_model_bounds();
        Ok(())
    }

    /// `None` unless bounding is enabled.
    #[must_use]
    pub fn model_bounds(&self) -> Option<Bounds> {
        self.model_bounds.first().copied()
    }

    fn merge_model_bounds(&mut self) {
        let Some(target) = self.model_bounds.first_mut() else {
            return;
        };
        *target = self
            .shapes
            .iter()
            .filter_map(|shape| shape.world_bounds())
            .reduce(|total, bounds| total.merged(&bounds))
            .unwrap_or_default();
    }
}
