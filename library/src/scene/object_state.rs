use crate::scene::scene_object_error::SceneObjectError;
use derive_more::Display;
use log::error;

/// Lifecycle of a placed scene object.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Display)]
pub enum ObjectState {
    /// Default constructed; nothing is placed yet.
    #[default]
    Unbuilt,
    /// Sub-arrays are placed into work memory; no GPU blocks are bound.
    Built,
    /// GPU blocks are bound; uploads are allowed.
    BlockValid,
}

impl ObjectState {
    #[must_use]
    pub fn is_built(self) -> bool {
        self != ObjectState::Unbuilt
    }
}

/// Reports an operation issued in the wrong lifecycle state. Fatal in debug
/// builds, a plain error otherwise.
pub(crate) fn ensure_state(operation: &'static str, actual: ObjectState, allowed: &[ObjectState]) -> Result<(), SceneObjectError> {
    if allowed.contains(&actual) {
        return Ok(());
    }
    error!("'{}' is not allowed for an object in state {}", operation, actual);
    debug_assert!(false, "'{}' is not allowed for an object in state {}", operation, actual);
    Err(SceneObjectError::InvalidState { operation, state: actual })
}

pub(crate) fn ensure_slot(slot: usize, buffering_count: usize) -> Result<(), SceneObjectError> {
    if slot < buffering_count {
        return Ok(());
    }
    error!("buffering slot {} is out of range [0, {})", slot, buffering_count);
    debug_assert!(false, "buffering slot {} is out of range [0, {})", slot, buffering_count);
    Err(SceneObjectError::SlotOutOfRange { slot, buffering_count })
}

pub(crate) fn ensure_element(what: &'static str, index: usize, count: usize) -> Result<(), SceneObjectError> {
    if index < count {
        return Ok(());
    }
    error!("{} index {} is out of range [0, {})", what, index, count);
    debug_assert!(false, "{} index {} is out of range [0, {})", what, index, count);
    Err(SceneObjectError::ElementOutOfRange { what, index, count })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_state_passes() {
        assert!(ensure_state("calculate", ObjectState::BlockValid, &[ObjectState::BlockValid]).is_ok());
        assert!(ensure_slot(1, 2).is_ok());
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic)]
    fn test_forbidden_state_reported() {
        let result = ensure_state("calculate", ObjectState::Built, &[ObjectState::BlockValid]);

        assert_eq!(result, Err(SceneObjectError::InvalidState { operation: "calculate", state: ObjectState::Built }));
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic)]
    fn test_slot_out_of_range_reported() {
        let result = ensure_slot(2, 2);

        assert_eq!(result, Err(SceneObjectError::SlotOutOfRange { slot: 2, buffering_count: 2 }));
    }

    #[test]
    fn test_default_is_unbuilt() {
        assert_eq!(ObjectState::default(), ObjectState::Unbuilt);
        assert!(!ObjectState::Unbuilt.is_built());
        assert!(ObjectState::BlockValid.is_built());
    }
}
