//! Consensus subdomain: the job entity, its state machine and the value
//! objects produced by each pipeline phase.

pub mod confidence;
pub mod job;
pub mod phase;
pub mod review_plan;
pub mod value_objects;
