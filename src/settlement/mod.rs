pub mod engine;
pub mod payment;
