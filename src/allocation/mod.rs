pub mod engine;
pub mod participation;
