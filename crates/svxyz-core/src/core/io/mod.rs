//! Provides input/output functionality for trajectory file formats.
//!
//! Readers are lazy iterators over [`Frame`](crate::core::models::frame::Frame)s so
//! arbitrarily long trajectories are processed one snapshot at a time. Extended XYZ
//! is the only output format; VASP OUTCAR and `vasprun.xml` are read-only.

pub mod error;
pub mod extxyz;
pub mod format;
pub mod outcar;
pub mod sidecar;
pub mod traits;
pub mod vasprun;
