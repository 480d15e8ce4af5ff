use crate::resource::texture_binding::TextureReference;

/// Invoked synchronously from `MaterialObject::set_texture` with the texture
/// slot index, the previous reference and the new one.
pub type TextureChangeCallback = Box<dyn FnMut(usize, TextureReference, TextureReference)>;

/// Invoked synchronously from `ModelObject::set_shape_visible` with the view,
/// the shape index and the new visibility. Not invoked when nothing changes.
pub type VisibilityChangeCallback = Box<dyn FnMut(usize, usize, bool)>;
