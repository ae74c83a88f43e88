//! CLI Commands Module

pub mod run;
pub mod select;
pub mod validate_plan;
