pub mod buffering_config;
pub mod callbacks;
pub mod material_object;
pub mod model_object;
pub mod object_state;
pub mod parameter_block;
pub mod scene_object_error;
pub mod shading_model_object;
pub mod shape_object;
