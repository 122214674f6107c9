//! Data structures describing trajectory frames.

pub mod frame;
pub mod voigt;
