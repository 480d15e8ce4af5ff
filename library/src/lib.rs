//#![deny(warnings)]

#![allow(clippy::bool_assert_comparison)]
#![allow(clippy::bool_comparison)]
#![allow(clippy::needless_range_loop)]

pub mod dirty;
pub mod geometry;
pub mod gpu;
pub mod memory;
pub mod resource;
pub mod scene;
mod utils;

pub use crate::geometry::transform::Affine;
pub use crate::gpu::block_device::{BlockDevice, BlockHandle, Endianness, MemoryPoolHandle};
pub use crate::gpu::host_block_device::HostBlockDevice;
pub use crate::gpu::wgpu_block_device::WgpuBlockDevice;
pub use crate::memory::placement::allocate_work_memory;
pub use crate::resource::material_resource::MaterialResource;
pub use crate::resource::model_resource::ModelResource;
pub use crate::resource::shading_model_resource::ShadingModelResource;
pub use crate::scene::buffering_config::{BufferingConfig, ModelConfig, ModelFeatures};
pub use crate::scene::material_object::{MaterialObject, MaterialObjectBuilder};
pub use crate::scene::model_object::{ModelObject, ModelObjectBuilder};
pub use crate::scene::object_state::ObjectState;
pub use crate::scene::scene_object_error::SceneObjectError;
pub use crate::scene::shading_model_object::{ShadingModelObject, ShadingModelObjectBuilder};

#[must_use]
pub fn reasonable_log_filter() -> &'static str {
    "scene_blocks=info,wgpu=warn,naga=warn"
}
