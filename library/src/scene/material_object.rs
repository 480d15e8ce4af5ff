use crate::gpu::block_device::{BlockDevice, BlockHandle, MemoryPoolHandle};
use crate::memory::memory_plan::{MemoryPlan, MemoryPlanner, PlanError};
use crate::memory::placement::{BuildError, Placement};
use crate::resource::material_resource::MaterialResource;
use crate::resource::texture_binding::{DescriptorSlot, TextureReference};
use crate::scene::buffering_config::BufferingConfig;
use crate::scene::callbacks::TextureChangeCallback;
use crate::scene::object_state::{ensure_element, ObjectState};
use crate::scene::parameter_block::{ParameterBlock, ParameterBlockLayout};
use crate::scene::scene_object_error::SceneObjectError;
use bytemuck::Pod;
use log::debug;
use strum_macros::{Display, EnumCount, EnumIter};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumIter, EnumCount)]
pub enum MaterialSubBuffer {
    DirtyFlags,
    RawParameters,
    BlockStaging,
    BlockHandles,
    TextureReferences,
    SamplerSlots,
}

const PARAMETER_LAYOUT: ParameterBlockLayout<MaterialSubBuffer> = ParameterBlockLayout {
    dirty_flags: MaterialSubBuffer::DirtyFlags,
    raw_parameters: MaterialSubBuffer::RawParameters,
    block_staging: MaterialSubBuffer::BlockStaging,
    block_handles: MaterialSubBuffer::BlockHandles,
};

pub(crate) fn plan_material(resource: &MaterialResource, config: BufferingConfig) -> Result<MemoryPlan<MaterialSubBuffer>, PlanError> {
    config.validate()?;
    PARAMETER_LAYOUT
        .request(MemoryPlanner::new(), resource.parameters(), config.buffering_count(), true)
        .request_array::<TextureReference>(MaterialSubBuffer::TextureReferences, resource.textures().len())
        .request_array::<DescriptorSlot>(MaterialSubBuffer::SamplerSlots, resource.samplers().len())
        .finish()
}

pub(crate) fn place_material<'a>(placement: &mut Placement<'a, MaterialSubBuffer>, resource: &'a MaterialResource, config: BufferingConfig) -> Result<MaterialObject<'a>, BuildError> {
    let parameters = PARAMETER_LAYOUT.place(placement, resource.parameters(), config.buffering_count())?;
    let textures = placement.take::<TextureReference>(MaterialSubBuffer::TextureReferences)?;
    let samplers = placement.take::<DescriptorSlot>(MaterialSubBuffer::SamplerSlots)?;

    let mut result = MaterialObject {
        resource: Some(resource),
        parameters,
        textures,
        samplers,
        buffer_address: placement.head_address(),
        texture_change_callback: None,
    };
    result.reset_bindings();
    Ok(result)
}

/// Plans and places [`MaterialObject`]s of one resource and configuration.
pub struct MaterialObjectBuilder<'a> {
    resource: &'a MaterialResource,
    config: BufferingConfig,
    plan: Option<MemoryPlan<MaterialSubBuffer>>,
}

impl<'a> MaterialObjectBuilder<'a> {
    #[must_use]
    pub fn new(resource: &'a MaterialResource) -> Self {
        Self { resource, config: BufferingConfig::new(), plan: None }
    }

    #[must_use]
    pub fn with_buffering_count(mut self, buffering_count: usize) -> Self {
        self.config = self.config.with_buffering_count(buffering_count);
        self.plan = None;
        self
    }

    pub fn calculate_memory_size(&mut self) -> Result<usize, PlanError> {
        let plan = plan_material(self.resource, self.config)?;
        let size = plan.work_memory_size();
        debug!("material '{}': {} bytes of work memory", self.resource.name(), size);
        self.plan = Some(plan);
        Ok(size)
    }

    #[must_use]
    pub fn is_memory_calculated(&self) -> bool {
        self.plan.is_some()
    }

    /// Zero until the size is calculated.
    #[must_use]
    pub fn work_memory_size(&self) -> usize {
        self.plan.as_ref().map_or(0, |plan| plan.work_memory_size())
    }

    #[must_use]
    pub fn plan(&self) -> Option<&MemoryPlan<MaterialSubBuffer>> {
        self.plan.as_ref()
    }

    /// On failure `object` is left untouched.
    pub fn build(&self, object: &mut MaterialObject<'a>, buffer: &'a mut [u8]) -> Result<(), BuildError> {
        let plan = self.plan.as_ref().ok_or(BuildError::MemoryNotCalculated)?;
        if object.state() == ObjectState::BlockValid {
            return Err(BuildError::BlockBufferBound);
        }
        let mut placement = Placement::split(plan, buffer)?;
        *object = place_material(&mut placement, self.resource, self.config)?;
        Ok(())
    }
}

/// Runtime state of one material instance: shader parameters, texture and
/// sampler bindings, and the per-slot material uniform blocks.
#[derive(Default)]
pub struct MaterialObject<'a> {
    resource: Option<&'a MaterialResource>,
    parameters: ParameterBlock<'a>,
    textures: &'a mut [TextureReference],
    samplers: &'a mut [DescriptorSlot],
    buffer_address: usize,
    texture_change_callback: Option<TextureChangeCallback>,
}

impl<'a> MaterialObject<'a> {
    #[must_use]
    pub fn state(&self) -> ObjectState {
        self.parameters.state()
    }

    #[must_use]
    pub fn resource(&self) -> Option<&'a MaterialResource> {
        self.resource
    }

    /// Address of the work memory the object was built into; zero when unbuilt.
    #[must_use]
    pub fn buffer_ptr(&self) -> usize {
        self.buffer_address
    }

    #[must_use]
    pub fn buffering_count(&self) -> usize {
        self.parameters.buffering_count()
    }

    #[must_use]
    pub fn shader_parameters(&self) -> &ParameterBlock<'a> {
        &self.parameters
    }

    #[must_use]
    pub fn shader_parameters_mut(&mut self) -> &mut ParameterBlock<'a> {
        &mut self.parameters
    }

    #[must_use]
    pub fn find_shader_parameter(&self, name: &str) -> Option<usize> {
        self.parameters.find_parameter(name)
    }

    pub fn shader_parameter<T: Pod>(&self, index: usize) -> Result<T, SceneObjectError> {
        self.parameters.parameter(index)
    }

    pub fn edit_shader_parameter<T: Pod>(&mut self, index: usize) -> Result<&mut T, SceneObjectError> {
        self.parameters.edit_parameter(index)
    }

    pub fn set_shader_parameter<T: Pod>(&mut self, index: usize, value: T) -> Result<(), SceneObjectError> {
        self.parameters.set_parameter(index, value)
    }

    pub fn clear_shader_parameters(&mut self) -> Result<(), SceneObjectError> {
        self.parameters.clear_parameters()
    }

    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn texture(&self, index: usize) -> Result<TextureReference, SceneObjectError> {
        ensure_element("texture", index, self.textures.len())?;
        Ok(self.textures[index])
    }

    pub fn set_texture(&mut self, index: usize, reference: TextureReference) -> Result<(), SceneObjectError> {
        ensure_element("texture", index, self.textures.len())?;
        let previous = std::mem::replace(&mut self.textures[index], reference);
        if let Some(callback) = self.texture_change_callback.as_mut() {
            callback(index, previous, reference);
        }
        Ok(())
    }

    pub fn set_texture_change_callback(&mut self, callback: TextureChangeCallback) {
        self.texture_change_callback = Some(callback);
    }

    #[must_use]
    pub fn sampler_count(&self) -> usize {
        self.samplers.len()
    }

    pub fn sampler_slot(&self, index: usize) -> Result<DescriptorSlot, SceneObjectError> {
        ensure_element("sampler", index, self.samplers.len())?;
        Ok(self.samplers[index])
    }

    pub fn set_sampler_slot(&mut self, index: usize, slot: DescriptorSlot) -> Result<(), SceneObjectError> {
        ensure_element("sampler", index, self.samplers.len())?;
        self.samplers[index] = slot;
        Ok(())
    }

    /// Textures and samplers back to resource defaults; the callback is not invoked.
    pub fn reset_bindings(&mut self) {
        let Some(resource) = self.resource else {
            return;
        };
        for (target, descriptor) in self.textures.iter_mut().zip(resource.textures()) {
            *target = descriptor.default_reference();
        }
        for (target, descriptor) in self.samplers.iter_mut().zip(resource.samplers()) {
            *target = descriptor.default_slot();
        }
    }

    #[must_use]
    pub fn material_block_size(&self) -> usize {
        self.parameters.block_size()
    }

    #[must_use]
    pub fn calculate_block_buffer_size(&self, device: &dyn BlockDevice) -> usize {
        self.parameters.calculate_block_buffer_size(device)
    }

    #[must_use]
    pub fn block_buffer_alignment(&self, device: &dyn BlockDevice) -> usize {
        self.parameters.block_buffer_alignment(device)
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
    pub fn material_block(&self, slot: usize) -> Option<BlockHandle> {
        self.parameters.block(slot)
    }

    pub fn calculate_material(&mut self, device: &mut dyn BlockDevice, slot: usize) -> Result<(), SceneObjectError> {
        self.parameters.calculate(device, slot)
    }

    pub fn calculate_all(&mut self, device: &mut dyn BlockDevice) -> Result<(), SceneObjectError> {
        self.parameters.calculate_all(device)
    }
}
