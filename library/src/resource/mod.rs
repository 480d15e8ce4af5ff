pub mod material_resource;
pub mod model_resource;
pub mod parameter_kind;
pub mod parameter_schema;
pub mod resource_error;
pub mod shading_model_resource;
pub mod texture_binding;
