//! # svxyz Core Library
//!
//! Streaming readers, filters and extractors for atomistic simulation trajectories.
//!
//! ## Architecture
//!
//! The library follows a three-layer layout:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Frame`, `Voigt`) and the
//!   trajectory I/O (extended XYZ and VASP OUTCAR readers, the extended XYZ writer and
//!   the sidecar loaders for `TB.dat`/`ST.dat`/`OUTCAR`).
//!
//! - **[`engine`]: The Logic Core.** The JSON filter configuration and its resolver,
//!   the pure filter pipeline, and progress reporting.
//!
//! - **[`workflows`]: The Public API.** Complete single-pass procedures: filtering a set
//!   of trajectories into one output file, and extracting per-frame quantities into
//!   flat `.dat` tables.

pub mod core;
pub mod engine;
pub mod workflows;
