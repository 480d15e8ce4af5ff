pub mod alignment;
pub mod memory_plan;
pub mod placement;
