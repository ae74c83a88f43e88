//! Provider abstractions and the cloud provisioning state machine

pub mod lifecycle;
pub mod probe;
pub mod traits;
