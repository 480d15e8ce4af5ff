use crate::gpu::block_device::{BlockDevice, BlockHandle, MemoryPoolHandle};
use crate::memory::memory_plan::{MemoryPlan, MemoryPlanner, PlanError};
use crate::memory::placement::{BuildError, Placement};
use crate::resource::shading_model_resource::ShadingModelResource;
use crate::scene::buffering_config::BufferingConfig;
use crate::scene::object_state::{ensure_element, ensure_state, ObjectState};
use crate::scene::parameter_block::{ParameterBlock, ParameterBlockLayout};
use crate::scene::scene_object_error::SceneObjectError;
use log::debug;
use strum_macros::{Display, EnumCount, EnumIter};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumIter, EnumCount)]
pub enum ShadingModelSubBuffer {
    StaticKey,
    DirtyFlags,
    RawParameters,
    BlockStaging,
    BlockHandles,
}

const OPTION_LAYOUT: ParameterBlockLayout<ShadingModelSubBuffer> = ParameterBlockLayout {
    dirty_flags: ShadingModelSubBuffer::DirtyFlags,
    raw_parameters: ShadingModelSubBuffer::RawParameters,
    block_staging: ShadingModelSubBuffer::BlockStaging,
    block_handles: ShadingModelSubBuffer::BlockHandles,
};

pub struct ShadingModelObjectBuilder<'a> {
    resource: &'a ShadingModelResource,
    config: BufferingConfig,
    plan: Option<MemoryPlan<ShadingModelSubBuffer>>,
}

impl<'a> ShadingModelObjectBuilder<'a> {
    #[must_use]
    pub fn new(resource: &'a ShadingModelResource) -> Self {
        Self { resource, config: BufferingConfig::new(), plan: None }
    }

    #[must_use]
    pub fn with_buffering_count(mut self, buffering_count: usize) -> Self {
        self.config = self.config.with_buffering_count(buffering_count);
        self.plan = None;
        self
    }

    pub fn calculate_memory_size(&mut self) -> Result<usize, PlanError> {
        self.config.validate()?;
        let plan = OPTION_LAYOUT
            .request(MemoryPlanner::new(), self.resource.option_parameters(), self.config.buffering_count(), true)
            .request_array::<u32>(ShadingModelSubBuffer::StaticKey, self.resource.key_word_count())
            .finish()?;
        let size = plan.work_memory_size();
        debug!("shading model '{}': {} bytes of work memory", self.resource.name(), size);
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
    pub fn plan(&self) -> Option<&MemoryPlan<ShadingModelSubBuffer>> {
        self.plan.as_ref()
    }

    pub fn build(&self, object: &mut ShadingModelObject<'a>, buffer: &'a mut [u8]) -> Result<(), BuildError> {
        let plan = self.plan.as_ref().ok_or(BuildError::MemoryNotCalculated)?;
        if object.state() == ObjectState::BlockValid {
            return Err(BuildError::BlockBufferBound);
        }
        let mut placement = Placement::split(plan, buffer)?;
        let options = OPTION_LAYOUT.place(&mut placement, self.resource.option_parameters(), self.config.buffering_count())?;
        let static_key = placement.take::<u32>(ShadingModelSubBuffer::StaticKey)?;
        static_key.copy_from_slice(&self.resource.default_key());

        *object = ShadingModelObject { resource: Some(self.resource), static_key, options, buffer_address: placement.head_address() };
        Ok(())
    }
}

/// Shader option state of one draw: static choices packed into the shader
/// variant key, dynamic choices uploaded into the option uniform block.
#[derive(Default)]
pub struct ShadingModelObject<'a> {
    resource: Option<&'a ShadingModelResource>,
    static_key: &'a mut [u32],
    options: ParameterBlock<'a>,
    buffer_address: usize,
}

impl<'a> ShadingModelObject<'a> {
    #[must_use]
    pub fn state(&self) -> ObjectState {
        self.options.state()
    }

    #[must_use]
    pub fn resource(&self) -> Option<&'a ShadingModelResource> {
        self.resource
    }

    #[must_use]
    pub fn buffer_ptr(&self) -> usize {
        self.buffer_address
    }

    /// Packed static option choices selecting the shader variant.
    #[must_use]
    pub fn static_key(&self) -> &[u32] {
        self.static_key
    }

    #[must_use]
    pub fn find_static_option(&self, name: &str) -> Option<usize> {
        self.resource?.static_options().iter().position(|option| option.name() == name)
    }

    pub fn static_option(&self, index: usize) -> Result<usize, SceneObjectError> {
        let resource = self.require_resource("static_option")?;
        ensure_element("static option", index, resource.static_options().len())?;
        let Some(slot) = resource.key_slot(index) else {
            return Err(SceneObjectError::ElementOutOfRange { what: "static option", index, count: resource.static_options().len() });
        };
        Ok(slot.decode(self.static_key[slot.word()]))
    }

    pub fn write_static_option(&mut self, index: usize, choice: usize) -> Result<(), SceneObjectError> {
        let resource = self.require_resource("write_static_option")?;
        ensure_element("static option", index, resource.static_options().len())?;
        ensure_element("choice", choice, resource.static_options()[index].choices().len())?;
        let Some(slot) = resource.key_slot(index) else {
            return Err(SceneObjectError::ElementOutOfRange { what: "static option", index, count: resource.static_options().len() });
        };
        let word = &mut self.static_key[slot.word()];
        *word = (*word & !slot.mask()) | slot.encode(choice);
        Ok(())
    }

    pub fn clear_static_options(&mut self) -> Result<(), SceneObjectError> {
        let resource = self.require_resource("clear_static_options")?;
        self.static_key.copy_from_slice(&resource.default_key());
        Ok(())
    }

    fn require_resource(&self, operation: &'static str) -> Result<&'a ShadingModelResource, SceneObjectError> {
        ensure_state(operation, self.state(), &[ObjectState::Built, ObjectState::BlockValid])?;
        self.resource.ok_or(SceneObjectError::InvalidState { operation, state: ObjectState::Unbuilt })
    }

    #[must_use]
    pub fn options(&self) -> &ParameterBlock<'a> {
        &self.options
    }

    #[must_use]
    pub fn options_mut(&mut self) -> &mut ParameterBlock<'a> {
        &mut self.options
    }

    pub fn dynamic_option(&self, index: usize) -> Result<usize, SceneObjectError> {
        Ok(self.options.parameter::<u32>(index)? as usize)
    }

    pub fn write_dynamic_option(&mut self, index: usize, choice: usize) -> Result<(), SceneObjectError> {
        let resource = self.require_resource("write_dynamic_option")?;
        ensure_element("dynamic option", index, resource.dynamic_options().len())?;
        ensure_element("choice", choice, resource.dynamic_options()[index].choices().len())?;
        self.options.set_parameter(index, choice as u32)
    }

    #[must_use]
    pub fn calculate_block_buffer_size(&self, device: &dyn BlockDevice) -> usize {
        self.options.calculate_block_buffer_size(device)
    }

    #[must_use]
    pub fn block_buffer_alignment(&self, device: &dyn BlockDevice) -> usize {
        self.options.block_buffer_alignment(device)
    }

    pub fn setup_block_buffer(&mut self, device: &mut dyn BlockDevice, pool: MemoryPoolHandle, offset: usize, region_size: usize) -> Result<(), SceneObjectError> {
        self.options.setup_block_buffer(device, pool, offset, region_size)
    }

    pub fn cleanup_block_buffer(&mut self, device: &mut dyn BlockDevice) {
        self.options.cleanup_block_buffer(device);
    }

    #[must_use]
    pub fn is_block_buffer_valid(&self) -> bool {
        self.options.is_block_buffer_valid()
    }

    #[must_use]
    pub fn option_block(&self, slot: usize) -> Option<BlockHandle> {
        self.options.block(slot)
    }

    pub fn calculate_option_block(&mut self, device: &mut dyn BlockDevice, slot: usize) -> Result<(), SceneObjectError> {
        self.options.calculate(device, slot)
    }
}
