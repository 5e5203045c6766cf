//! Cross-crate integration scenarios.

pub mod backpressure;
pub mod end_to_end;
pub mod service_tcp;
