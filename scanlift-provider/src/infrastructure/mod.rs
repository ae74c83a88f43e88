//! Concrete providers and the system capability probe

pub mod cloud;
pub mod local;
pub mod probe;
pub mod remote;
