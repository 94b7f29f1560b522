//! Operator commands

pub mod deploy;
pub mod emergency;
pub mod monitor;
pub mod status;
pub mod validate;
