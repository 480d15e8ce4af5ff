pub mod alias;
pub mod transform;
