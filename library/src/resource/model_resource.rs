use crate::geometry::alias::Point;
use crate::geometry::transform::{max_axis_scale, Affine};
use crate::resource::material_resource::MaterialResource;
use crate::resource::parameter_kind::ParameterKind;
use crate::resource::parameter_schema::{ParameterDescriptor, ParameterSchema};
use crate::resource::resource_error::ResourceError;
use bytemuck::{Pod, Zeroable};
use cgmath::{InnerSpace, Transform};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub(crate) const SHAPE_WORLD_MATRIX_INDEX: usize = 0;

const IDENTITY_3X4: [f64; 12] = [
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 1.0, 0.0,
];

/// Bounding sphere.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Bounds {
    pub center: [f32; 3],
    pub radius: f32,
}

impl Bounds {
    #[must_use]
    pub fn new(center: [f32; 3], radius: f32) -> Self {
        Self { center, radius }
    }

    #[must_use]
    pub fn center_point(&self) -> Point {
        Point::from(self.center)
    }

    /// Sphere enclosing this one after an affine transform.
    #[must_use]
    pub fn transformed(&self, matrix: &Affine) -> Self {
        let center = matrix.transform_point(self.center_point());
        Self { center: center.into(), radius: self.radius * max_axis_scale(matrix) }
    }

    /// Smallest sphere enclosing both.
    #[must_use]
    pub fn merged(&self, another: &Bounds) -> Self {
        let delta = another.center_point() - self.center_point();
        let distance = delta.magnitude();
        if distance + another.radius <= self.radius {
            return *self;
        }
        if distance + self.radius <= another.radius {
            return *another;
        }
        let radius = (distance + self.radius + another.radius) * 0.5;
        let center = self.center_point() + delta * ((radius - self.radius) / distance);
        Self { center: center.into(), radius }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeResource {
    name: String,
    material_index: usize,
    #[serde(default)]
    bounds: Bounds,
}

impl ShapeResource {
    #[must_use]
    pub fn new(name: impl Into<String>, material_index: usize, bounds: Bounds) -> Self {
        Self { name: name.into(), material_index, bounds }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn material_index(&self) -> usize {
        self.material_index
    }

    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct ModelSource {
    name: String,
    materials: Vec<MaterialResource>,
    shapes: Vec<ShapeResource>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ModelSource", into = "ModelSource")]
pub struct ModelResource {
    name: String,
    materials: Vec<MaterialResource>,
    shapes: Vec<ShapeResource>,
    shape_parameters: ParameterSchema,
}

impl ModelResource {
    pub fn new(name: impl Into<String>, materials: Vec<MaterialResource>, shapes: Vec<ShapeResource>) -> Result<Self, ResourceError> {
        if let Some(shape) = shapes.iter().find(|shape| shape.material_index >= materials.len()) {
            return Err(ResourceError::MissingMaterial { shape: shape.name.clone(), material_index: shape.material_index });
        }
        Ok(Self { name: name.into(), materials, shapes, shape_parameters: make_shape_parameters()? })
    }

    pub fn from_json(json: &str) -> Result<Self, ResourceError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ResourceError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn materials(&self) -> &[MaterialResource] {
        &self.materials
    }

    #[must_use]
    pub fn shapes(&self) -> &[ShapeResource] {
        &self.shapes
    }

    /// Layout of the per-shape uniform block, shared by every shape.
    #[must_use]
    pub fn shape_parameters(&self) -> &ParameterSchema {
        &self.shape_parameters
    }
}

fn make_shape_parameters() -> Result<ParameterSchema, ResourceError> {
    ParameterSchema::new(vec![
        ParameterDescriptor::new("world_matrix", ParameterKind::Float3x4, 0).with_block_offset(0).with_default(&IDENTITY_3X4),
    ])
}

impl TryFrom<ModelSource> for ModelResource {
    type Error = ResourceError;

    fn try_from(source: ModelSource) -> Result<Self, Self::Error> {
        ModelResource::new(source.name, source.materials, source.shapes)
    }
}

impl From<ModelResource> for ModelSource {
    fn from(resource: ModelResource) -> Self {
        ModelSource { name: resource.name, materials: resource.materials, shapes: resource.shapes }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::geometry::transform::affine_from_rows;
    use crate::resource::material_resource::tests::make_three_parameter_material;

    #[must_use]
    pub(crate) fn make_two_shape_model() -> ModelResource {
        ModelResource::new(
            "crate",
            vec![make_three_parameter_material(), make_three_parameter_material()],
            vec![
                ShapeResource::new("lid", 0, Bounds::new([0.0, 1.0, 0.0], 1.0)),
                ShapeResource::new("body", 1, Bounds::new([0.0, 0.0, 0.0], 2.0)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_shape_parameters_default_identity() {
        let system_under_test = make_two_shape_model();
        let words: &[u32] = bytemuck::cast_slice(system_under_test.shape_parameters().default_raw());

        assert_eq!(words.len(), 12);
        assert_eq!(f32::from_bits(words[0]), 1.0);
        assert_eq!(f32::from_bits(words[5]), 1.0);
        assert_eq!(f32::from_bits(words[10]), 1.0);
        assert_eq!(f32::from_bits(words[3]), 0.0);
    }

    #[test]
    fn test_missing_material_rejected() {
        let result = ModelResource::new("broken", vec![make_three_parameter_material()], vec![ShapeResource::new("s", 1, Bounds::default())]);

        assert!(matches!(result, Err(ResourceError::MissingMaterial { material_index: 1, .. })));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "name": "lamp",
            "materials": [ { "name": "metal" } ],
            "shapes": [ { "name": "pole", "material_index": 0, "bounds": { "center": [0.0, 1.0, 0.0], "radius": 1.5 } } ]
        }"#;

        let system_under_test = ModelResource::from_json(json).unwrap();

        assert_eq!(system_under_test.shapes()[0].bounds().radius, 1.5);
        assert_eq!(system_under_test.materials()[0].parameters().count(), 0);
    }

    #[test]
    fn test_bounds_transformed() {
        let system_under_test = Bounds::new([1.0, 0.0, 0.0], 2.0);
        let matrix = affine_from_rows(&[
            0.0, -3.0, 0.0, 5.0,
            3.0,  0.0, 0.0, 0.0,
            0.0,  0.0, 3.0, 1.0,
        ]);

        let actual = system_under_test.transformed(&matrix);

        assert_eq!(actual, Bounds::new([5.0, 3.0, 1.0], 6.0));
    }

    #[test]
    fn test_bounds_merged() {
        let left = Bounds::new([-2.0, 0.0, 0.0], 1.0);
        let right = Bounds::new([2.0, 0.0, 0.0], 1.0);
        let inner = Bounds::new([0.5, 0.0, 0.0], 0.25);

        let merged = left.merged(&right);

        assert_eq!(merged, Bounds::new([0.0, 0.0, 0.0], 3.0));
        assert_eq!(merged.merged(&inner), merged);
        assert_eq!(inner.merged(&merged), merged);
    }
}
