//#![deny(warnings)]

use anyhow::Context;
use log::info;
use scene_blocks::geometry::alias::Vector;
use scene_blocks::{allocate_work_memory, Affine, BlockDevice, HostBlockDevice, ModelFeatures, ModelObject, ModelObjectBuilder, ModelResource};
use std::env;
use std::path::Path;

const BUFFERING_COUNT: usize = 2;
const VIEW_COUNT: usize = 2;
const FRAME_COUNT: usize = 4;
const FRAME_TIME: f32 = 1.0 / 60.0;

const BUILT_IN_MODEL: &str = r#"
{
    "name": "lamp",
    "materials": [
        {
            "name": "painted_metal",
            "parameters": {
                "parameters": [
                    { "name": "tint", "kind": "float4", "raw_offset": 0, "block_offset": 0, "default": [0.8, 0.1, 0.1, 1.0] },
                    { "name": "roughness", "kind": "float", "raw_offset": 16, "block_offset": 16, "default": [0.4] },
                    { "name": "time", "kind": "float", "raw_offset": 20, "block_offset": 20, "volatile": true }
                ]
            },
            "textures": [ { "name": "albedo_map", "default": 3 } ],
            "samplers": [ { "name": "albedo_sampler", "default_slot": 1 } ]
        },
        {
            "name": "glass",
            "parameters": {
                "parameters": [
                    { "name": "opacity", "kind": "float", "raw_offset": 0, "block_offset": 0, "default": [0.25] }
                ]
            }
        }
    ],
    "shapes": [
        { "name": "pole", "material_index": 0, "bounds": { "center": [0.0, 1.0, 0.0], "radius": 1.0 } },
        { "name": "shade", "material_index": 1, "bounds": { "center": [0.0, 2.0, 0.0], "radius": 0.5 } }
    ]
}"#;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(scene_blocks::reasonable_log_filter())).init();

    let resource = match env::args().nth(1) {
        Some(path) => ModelResource::from_json_file(Path::new(&path)).with_context(|| format!("failed to load model from '{}'", path))?,
        None => ModelResource::from_json(BUILT_IN_MODEL).context("built-in model is malformed")?,
    };
    info!("model '{}': {} materials, {} shapes", resource.name(), resource.materials().len(), resource.shapes().len());

    let mut builder = ModelObjectBuilder::new(&resource)
        .with_buffering_count(BUFFERING_COUNT)
        .with_view_count(VIEW_COUNT)
        .with_features(ModelFeatures::all());
    let work_memory_size = builder.calculate_memory_size()?;
    let mut work_memory = allocate_work_memory(work_memory_size);

    let mut model = ModelObject::default();
    builder.build(&mut model, bytemuck::cast_slice_mut(&mut work_memory))?;
    model.set_visibility_change_callback(Box::new(|view, shape, visible| {
        info!("view {}: shape {} is now {}", view, shape, if visible { "visible" } else { "hidden" });
    }));

    let mut device = HostBlockDevice::default();
    let region_size = model.calculate_block_buffer_size(&device);
    let pool = device.create_memory_pool(region_size);
    model.setup_block_buffer(&mut device, pool, 0, region_size)?;
    info!("{} bytes of work memory, {} bytes of block memory", work_memory_size, region_size);

    for frame in 0..FRAME_COUNT {
        let slot = frame % BUFFERING_COUNT;
        animate(&mut model, frame)?;
        model.calculate(&mut device, slot)?;
        model.calculate_bounding()?;
        if frame == FRAME_COUNT / 2 && model.shape_count() > 1 {
            model.set_shape_visible(0, 1, false)?;
        }
        report(&model, &device, frame, slot)?;
    }

    model.cleanup_block_buffer(&mut device);
    Ok(())
}

fn animate(model: &mut ModelObject, frame: usize) -> anyhow::Result<()> {
    let material = model.material_mut(0)?;
    if let Some(time) = material.find_shader_parameter("time") {
        material.set_shader_parameter(time, frame as f32 * FRAME_TIME)?;
    }
    let lift = Affine::from_translation(Vector::new(0.0, frame as f32 * 0.5, 0.0));
    model.shape_mut(0)?.set_world_matrix(&lift)?;
    Ok(())
}

fn report(model: &ModelObject, device: &HostBlockDevice, frame: usize, slot: usize) -> anyhow::Result<()> {
    for index in 0..model.material_count() {
        let material = model.material(index)?;
        if let Some(bytes) = material.material_block(slot).and_then(|handle| device.read_block(handle)) {
            info!("frame {} slot {} material {}: {:02x?}", frame, slot, index, bytes);
        }
    }
    for index in 0..model.shape_count() {
        let shape = model.shape(index)?;
        let visible = model.is_shape_visible(0, index)?;
        info!("frame {} shape '{}': bounds {:?}, visible in view 0: {}", frame, shape.name(), shape.world_bounds(), visible);
    }
    info!("frame {} model bounds {:?}, block alignment {}", frame, model.model_bounds(), device.block_alignment());
    Ok(())
}
