pub mod cost_event;
pub mod currency;
pub mod obligation;
pub mod participant;
