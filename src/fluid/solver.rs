//! The per-substep density projection: Jacobi iterations of the density
//! constraint followed by velocity finalization and XSPH smoothing.

use glam::Vec2;

use super::Mover;
use super::ParticleStore;
use crate::domain::Extent;
use crate::sph::kernels;
use crate::sph::NeighborLists;

/// Fixed Jacobi iteration count of the density projection.
pub const SOLVER_ITERATIONS: usize = 4;

/// Componentwise velocity bound.
pub const V_MAX: f32 = 20.0;

/// Relaxation term in the lambda denominator.
const LAMBDA_EPSILON: f32 = 1.0;

/// SPH density at every owned particle, including its own contribution.
pub fn compute_densities(store: &mut ParticleStore, lists: &NeighborLists, mass: f32, h: f32) {
    for i in 0..store.num_owned() {
        let x_i = store.get(i).predicted;
        let mut density = mass * kernels::poly6(0.0, h);
        for &j in lists.of(i) {
            let r = x_i.distance(store.get(j as usize).predicted);
            density += mass * kernels::poly6(r, h);
        }
        store.get_mut(i).density = density;
    }
}

/// Constraint multipliers for every owned particle. The denominator sums
/// the squared gradient of the constraint with respect to the particle
/// itself and with respect to each of its neighbors.
pub fn compute_lambdas(store: &mut ParticleStore, lists: &NeighborLists, h: f32, rest_density: f32) {
    for i in 0..store.num_owned() {
        let x_i = store.get(i).predicted;
        let constraint = store.get(i).density / rest_density - 1.0;
        let mut grad_sum = Vec2::ZERO;
        let mut grad_sq_sum = 0.0;
        for &j in lists.of(i) {
            let diff = x_i - store.get(j as usize).predicted;
            let grad = kernels::grad_spiky(diff.length(), h) * diff;
            grad_sum += grad;
            grad_sq_sum += grad.length_squared();
        }
        let denom =
            (grad_sum.length_squared() + grad_sq_sum) / (rest_density * rest_density) + LAMBDA_EPSILON;
        store.get_mut(i).lambda = -constraint / denom;
    }
}

/// Position corrections from the current lambdas, with the anti-clustering
/// term `s_corr` that keeps particles from collapsing onto each other.
pub fn compute_corrections(
    store: &mut ParticleStore,
    lists: &NeighborLists,
    h: f32,
    rest_density: f32,
    k_corr: f32,
    dq_corr: f32,
) {
    let w_dq = kernels::poly6(dq_corr, h);
    for i in 0..store.num_owned() {
        let x_i = store.get(i).predicted;
        let lambda_i = store.get(i).lambda;
        let mut correction = Vec2::ZERO;
        for &j in lists.of(i) {
            let neighbor = store.get(j as usize);
            let diff = x_i - neighbor.predicted;
            let r = diff.length();
            let s_corr = if w_dq > 0.0 {
                let ratio = kernels::poly6(r, h) / w_dq;
                -k_corr * ratio.powi(4)
            } else {
                0.0
            };
            correction += (lambda_i + neighbor.lambda + s_corr) * kernels::grad_spiky(r, h) * diff;
        }
        store.get_mut(i).correction = correction / rest_density;
    }
}

/// Move the predicted positions by their corrections, then project them
/// out of the walls and the mover.
pub fn apply_corrections(store: &mut ParticleStore, extent: &Extent, mover: &Mover) {
    for particle in store.owned_mut() {
        let target = particle.predicted + particle.correction;
        particle.predicted = mover.resolve(extent.clamp(target));
    }
}

/// Velocities from the position delta, for owned and halo particles
/// alike. Recomputing the halo velocities here reproduces the owner's
/// values exactly, since both sides run the same formula on the same
/// (x, x*) pair.
pub fn finalize_velocities(store: &mut ParticleStore, dt: f32) {
    let bound = Vec2::splat(V_MAX);
    for particle in store.all_mut() {
        let velocity = (particle.predicted - particle.pos) / dt;
        particle.velocity = velocity.clamp(-bound, bound);
    }
}

/// XSPH viscosity: nudge every owned velocity toward the kernel-weighted
/// velocities of its neighborhood. Two-phase so that all reads see the
/// pre-smoothing values.
pub fn apply_xsph(store: &mut ParticleStore, lists: &NeighborLists, viscosity: f32, h: f32) {
    let deltas: Vec<Vec2> = (0..store.num_owned())
        .map(|i| {
            let particle = store.get(i);
            let mut delta = Vec2::ZERO;
            for &j in lists.of(i) {
                let neighbor = store.get(j as usize);
                let r = particle.predicted.distance(neighbor.predicted);
                delta += (neighbor.velocity - particle.velocity) * kernels::poly6(r, h);
            }
            viscosity * delta
        })
        .collect();
    for (i, delta) in deltas.into_iter().enumerate() {
        store.get_mut(i).velocity += delta;
    }
}

pub fn commit_positions(store: &mut ParticleStore) {
    for particle in store.owned_mut() {
        particle.pos = particle.predicted;
    }
}
