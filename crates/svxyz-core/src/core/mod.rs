//! # Core Module
//!
//! Data models and file I/O for atomistic trajectories.
//!
//! - **Frame representation** ([`models`]) - a single configuration snapshot with its
//!   cell, energy, forces and stress, plus the derived volume, pressure and virial
//! - **File I/O** ([`io`]) - lazy frame readers for extended XYZ and VASP OUTCAR, the
//!   extended XYZ writer, and sidecar data merged in from neighbouring files

pub mod io;
pub mod models;
