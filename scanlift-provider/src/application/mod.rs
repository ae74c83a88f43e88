//! Provider selection, construction and the helpers every provider shares

pub mod artifacts;
pub mod factory;
pub mod readiness;
pub mod selector;
