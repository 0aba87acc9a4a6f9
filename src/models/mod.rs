//! Domain model module declarations.

pub mod agent;
pub mod alert;
pub mod call;
pub mod queue;
pub mod service_level;
pub mod snapshot;
