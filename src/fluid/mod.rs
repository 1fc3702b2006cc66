mod boundary;
mod solver;
mod store;
mod worker;

#[cfg(test)]
#[cfg(not(feature = "mpi"))]
mod tests;

pub use boundary::Mover;
pub use solver::SOLVER_ITERATIONS;
pub use solver::V_MAX;
pub use store::fill_slab;
pub use store::Particle;
pub use store::ParticleStore;
pub use worker::Worker;
