//! # Riffle
//! Riffle is a distributed, interactive 2d fluid solver based on
//! position-based fluids. A coordinator rank owns the tunable parameters
//! and the partition layout; worker ranks advance the solver over a 1-d
//! decomposition of the box, exchanging migrating particles and halo
//! mirrors with their slab neighbors every substep and streaming packed
//! coordinate frames back for display.
//!
//! Communication runs over MPI (`mpi` feature, one process per rank) or
//! over an in-process channel transport with one thread per rank, which
//! is also what the scenario tests use.

pub mod command_line_options;
pub mod communication;
pub mod controls;
pub mod coordinator;
pub mod display;
pub mod domain;
pub mod fluid;
pub mod messages;
pub mod parameters;
pub mod prelude;
pub mod sph;
