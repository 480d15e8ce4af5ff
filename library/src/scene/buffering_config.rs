use crate::memory::memory_plan::PlanError;
use bitflags::bitflags;

/// Number of independent GPU block copies, one per frame in flight.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BufferingConfig {
    buffering_count: usize,
}

impl BufferingConfig {
    pub const DEFAULT_BUFFERING_COUNT: usize = 1;

    #[must_use]
    pub fn new() -> Self {
        Self { buffering_count: Self::DEFAULT_BUFFERING_COUNT }
    }

    #[must_use]
    pub fn with_buffering_count(mut self, buffering_count: usize) -> Self {
        self.buffering_count = buffering_count;
        self
    }

    #[must_use]
    pub fn buffering_count(&self) -> usize {
        self.buffering_count
    }

    pub(crate) fn validate(&self) -> Result<(), PlanError> {
        if 0 == self.buffering_count {
            return Err(PlanError::InvalidConfiguration { what: "buffering count must be at least 1".to_string() });
        }
        Ok(())
    }
}

impl Default for BufferingConfig {
    fn default() -> Self {
        Self::new()
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct ModelFeatures: u32 {
        /// World-space bounds of every shape and of the model.
        const BOUNDING = 1 << 0;
        /// Per-shape uniform blocks holding the world matrix.
        const SHAPE_BLOCKS = 1 << 1;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ModelConfig {
    buffering: BufferingConfig,
    view_count: usize,
    features: ModelFeatures,
}

impl ModelConfig {
    pub const DEFAULT_VIEW_COUNT: usize = 1;

    #[must_use]
    pub fn new() -> Self {
        Self { buffering: BufferingConfig::new(), view_count: Self::DEFAULT_VIEW_COUNT, features: ModelFeatures::SHAPE_BLOCKS }
    }

    #[must_use]
    pub fn with_buffering_count(mut self, buffering_count: usize) -> Self {
        self.buffering = self.buffering.with_buffering_count(buffering_count);
        self
    }

    #[must_use]
    pub fn with_view_count(mut self, view_count: usize) -> Self {
        self.view_count = view_count;
        self
    }

    #[must_use]
    pub fn with_features(mut self, features: ModelFeatures) -> Self {
        self.features = features;
        self
    }

    #[must_use]
    pub fn buffering(&self) -> BufferingConfig {
        self.buffering
    }

    #[must_use]
    pub fn buffering_count(&self) -> usize {
        self.buffering.buffering_count()
    }

    #[must_use]
    pub fn view_count(&self) -> usize {
        self.view_count
    }

    #[must_use]
    pub fn features(&self) -> ModelFeatures {
        self.features
    }

    pub(crate) fn validate(&self) -> Result<(), PlanError> {
        self.buffering.validate()?;
        if 0 == self.view_count {
            return Err(PlanError::InvalidConfiguration { what: "view count must be at least 1".to_string() });
        }
        Ok(())
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_buffering_count_rejected() {
        let system_under_test = BufferingConfig::new().with_buffering_count(0);

        assert!(matches!(system_under_test.validate(), Err(PlanError::InvalidConfiguration { .. })));
    }

    #[test]
    fn test_zero_view_count_rejected() {
        let system_under_test = ModelConfig::new().with_view_count(0);

        assert!(matches!(system_under_test.validate(), Err(PlanError::InvalidConfiguration { .. })));
    }

    #[test]
    fn test_model_defaults() {
        let system_under_test = ModelConfig::default();

        assert_eq!(system_under_test.buffering_count(), 1);
        assert_eq!(system_under_test.view_count(), 1);
        assert!(system_under_test.features().contains(ModelFeatures::SHAPE_BLOCKS));
        assert!(!system_under_test.features().contains(ModelFeatures::BOUNDING));
        assert!(system_under_test.validate().is_ok());
    }
}
