pub mod ai;
pub mod factory;

pub use factory::build_generator;
