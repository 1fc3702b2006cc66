//! The per-rank simulation loop: predict, migrate, exchange halos, run the
//! density projection and report positions to the coordinator.

use glam::Vec2;
use log::debug;
use log::info;
use log::trace;

use super::boundary::Mover;
use super::solver;
use super::store::fill_slab;
use super::store::Particle;
use super::store::ParticleStore;
use crate::communication::comms::Comms;
use crate::communication::DataByRank;
use crate::communication::Rank;
use crate::communication::WorldCommunicator;
use crate::communication::WorldRank;
use crate::domain::Extent;
use crate::messages::pack_coord;
use crate::messages::ParticlePayload;
use crate::messages::PositionUpdate;
use crate::messages::Tunables;
use crate::parameters::SimulationParameters;
use crate::sph::CellGrid;
use crate::sph::NeighborLists;

/// Extra pairing of the out-of-bounds phase that exists only for the one
/// substep in which a retired worker hands its slab contents to its left
/// neighbor.
enum Handoff {
    None,
    Send { to: Rank },
    Receive { from: Rank },
}

pub struct Worker {
    comms: Comms,
    extent: Extent,
    mass: f32,
    tunables: Tunables,
    store: ParticleStore,
    lists: NeighborLists,
    /// Scratch copy of all predicted positions, rebuilt each substep.
    positions: Vec<Vec2>,
    /// Peers of the current substep's halo round, ascending.
    halo_peers: Vec<Rank>,
    /// Owned indices sent to each halo peer, in transmission order. The
    /// intra-iteration publishes reuse exactly this order.
    halo_sent: DataByRank<Vec<usize>>,
    /// (first slot, length) of the halo block received from each peer.
    halo_slots: DataByRank<(usize, usize)>,
}

impl Worker {
    /// Await the initial tunables and fill the owned slab with a uniform
    /// grid of resting particles.
    pub fn new(comms: Comms, params: &SimulationParameters) -> Self {
        let mut worker = Self::empty(comms, params);
        let tunables = &worker.tunables;
        let particles = fill_slab(
            tunables.node_start_x,
            tunables.node_end_x,
            params.spacing,
            params.fill_fraction * params.max_y,
        );
        info!(
            "worker {} owns [{:.2}, {:.2}) with {} particles",
            worker.index(),
            tunables.node_start_x,
            tunables.node_end_x,
            particles.len()
        );
        worker.store = store_with_headroom(particles, params.capacity_factor);
        worker
    }

    /// Await the initial tunables but start from an explicit particle
    /// set. Keeps demo and scenario setups out of the init path.
    pub fn with_particles(
        comms: Comms,
        params: &SimulationParameters,
        particles: Vec<Particle>,
    ) -> Self {
        let mut worker = Self::empty(comms, params);
        worker.store = store_with_headroom(particles, params.capacity_factor);
        worker
    }

    fn empty(mut comms: Comms, params: &SimulationParameters) -> Self {
        let tunables = receive_tunables(&mut comms);
        Self {
            comms,
            extent: params.extent(),
            mass: params.particle_mass,
            tunables,
            store: ParticleStore::new(Vec::new(), 0),
            lists: NeighborLists::new(),
            positions: Vec::new(),
            halo_peers: Vec::new(),
            halo_sent: DataByRank::empty(),
            halo_slots: DataByRank::empty(),
        }
    }

    /// Zero-based worker index; the coordinator occupies rank 0.
    fn index(&self) -> usize {
        self.comms.rank.0 as usize - 1
    }

    pub fn num_owned(&self) -> usize {
        self.store.num_owned()
    }

    /// Run frames until the coordinator requests shutdown.
    pub fn run(&mut self) {
        loop {
            let steps = self.tunables.steps_per_frame.max(1);
            let mut kill = false;
            for step in 0..steps {
                kill = self.substep(step, steps);
            }
            if kill {
                break;
            }
        }
        self.comms.coords.finish_sends();
        debug!("worker {} exited cleanly", self.index());
    }

    /// One solver substep. Returns whether the coordinator asked this
    /// frame to be the last.
    fn substep(&mut self, step: i32, steps: i32) -> bool {
        let dt = self.tunables.dt;
        let gravity = self.tunables.gravity;
        for particle in self.store.owned_mut() {
            particle.velocity.y -= gravity * dt;
            particle.predicted = particle.pos + particle.velocity * dt;
        }
        if step == 0 {
            // The previous frame's coordinate send must be out the door
            // before its buffer can be refilled.
            self.comms.coords.finish_sends();
        }
        let mut kill = false;
        let mut handoff = Handoff::None;
        if step == steps - 1 {
            let new = receive_tunables(&mut self.comms);
            handoff = self.detect_handoff(&new);
            kill = new.kill_requested();
            if new.is_active() != self.tunables.is_active() {
                info!(
                    "worker {} is now {}",
                    self.index(),
                    if new.is_active() { "active" } else { "parked" }
                );
            }
            self.tunables = new;
        }
        self.migrate(handoff);
        self.exchange_halo();
        self.rebuild_lists();
        let tunables = self.tunables;
        let mover = Mover::from_tunables(&tunables);
        for _ in 0..solver::SOLVER_ITERATIONS {
            solver::compute_densities(
                &mut self.store,
                &self.lists,
                self.mass,
                tunables.smoothing_radius,
            );
            solver::compute_lambdas(
                &mut self.store,
                &self.lists,
                tunables.smoothing_radius,
                tunables.rest_density,
            );
            self.publish_lambdas();
            solver::compute_corrections(
                &mut self.store,
                &self.lists,
                tunables.smoothing_radius,
                tunables.rest_density,
                tunables.k_corr,
                tunables.dq_corr,
            );
            solver::apply_corrections(&mut self.store, &self.extent, &mover);
            self.publish_positions();
        }
        solver::finalize_velocities(&mut self.store, tunables.dt);
        solver::apply_xsph(
            &mut self.store,
            &self.lists,
            tunables.viscosity,
            tunables.smoothing_radius,
        );
        solver::commit_positions(&mut self.store);
        if step == steps - 1 {
            self.send_coords();
        }
        kill
    }

    /// Compare the freshly scattered tunables against the current
    /// snapshot. A retirement is visible on both of its endpoints: the
    /// retired worker sees the active count drop to its own index, the
    /// absorbing worker sees it drop from one past its slot.
    fn detect_handoff(&self, new: &Tunables) -> Handoff {
        let index = self.index() as i32;
        let old = &self.tunables;
        if old.is_active() && !new.is_active() && new.num_active == index {
            Handoff::Send {
                to: self.comms.rank.0 - 1,
            }
        } else if new.is_active() && old.num_active == index + 2 && new.num_active == index + 1 {
            Handoff::Receive {
                from: self.comms.rank.0 + 1,
            }
        } else {
            Handoff::None
        }
    }

    fn left_neighbor(&self) -> Option<Rank> {
        if self.tunables.is_active() && self.index() >= 1 {
            Some(self.comms.rank.0 - 1)
        } else {
            None
        }
    }

    fn right_neighbor(&self) -> Option<Rank> {
        if self.tunables.is_active() && (self.index() as i32) + 1 < self.tunables.num_active {
            Some(self.comms.rank.0 + 1)
        } else {
            None
        }
    }

    /// Move particles whose predicted position left the slab to the
    /// owning neighbor, and absorb whatever arrives in return.
    fn migrate(&mut self, handoff: Handoff) {
        let mut outgoing: DataByRank<Vec<ParticlePayload>> = DataByRank::empty();
        match handoff {
            Handoff::Send { to } => {
                let mut payloads = Vec::with_capacity(self.store.num_owned());
                while self.store.num_owned() > 0 {
                    let last = self.store.num_owned() - 1;
                    payloads.push((&self.store.remove_owned(last)).into());
                }
                info!(
                    "worker {} hands {} particles to its left neighbor",
                    self.index(),
                    payloads.len()
                );
                outgoing.insert(to, payloads);
            }
            Handoff::Receive { from } => {
                outgoing.insert(from, Vec::new());
                self.collect_out_of_bounds(&mut outgoing);
            }
            Handoff::None => {
                self.collect_out_of_bounds(&mut outgoing);
            }
        }
        if outgoing.is_empty() {
            return;
        }
        let received = self.comms.migration.exchange(outgoing);
        let arrived = received.total_len();
        if arrived > 0 {
            trace!("worker {} absorbs {} migrated particles", self.index(), arrived);
        }
        for (_, payloads) in received {
            for payload in payloads {
                self.store.push_owned(payload.into());
            }
        }
    }

    fn collect_out_of_bounds(&mut self, outgoing: &mut DataByRank<Vec<ParticlePayload>>) {
        let left = self.left_neighbor();
        let right = self.right_neighbor();
        for neighbor in [left, right].into_iter().flatten() {
            if !outgoing.contains(&neighbor) {
                outgoing.insert(neighbor, Vec::new());
            }
        }
        if left.is_none() && right.is_none() {
            return;
        }
        let start = self.tunables.node_start_x;
        let end = self.tunables.node_end_x;
        let mut i = 0;
        while i < self.store.num_owned() {
            let x = self.store.get(i).predicted.x;
            if x < start {
                if let Some(rank) = left {
                    outgoing[rank].push((&self.store.remove_owned(i)).into());
                    // The tail entry just swapped into slot i gets looked
                    // at on the next pass of the loop.
                    continue;
                }
            } else if x >= end {
                if let Some(rank) = right {
                    outgoing[rank].push((&self.store.remove_owned(i)).into());
                    continue;
                }
            }
            i += 1;
        }
    }

    /// Mirror boundary-band particles into the neighbors' halo regions
    /// and record the pairing order for the intra-iteration publishes.
    fn exchange_halo(&mut self) {
        self.store.clear_halo();
        self.halo_peers.clear();
        self.halo_sent = DataByRank::empty();
        self.halo_slots = DataByRank::empty();
        let h = self.tunables.smoothing_radius;
        let mut outgoing: DataByRank<Vec<ParticlePayload>> = DataByRank::empty();
        let bands = [
            (self.left_neighbor(), self.tunables.node_start_x, true),
            (self.right_neighbor(), self.tunables.node_end_x, false),
        ];
        for (neighbor, boundary, is_left) in bands {
            let Some(rank) = neighbor else { continue };
            // Band membership goes by the committed position; the predicted
            // one only decides ownership (the out-of-bounds test above).
            let indices: Vec<usize> = (0..self.store.num_owned())
                .filter(|i| {
                    let x = self.store.get(*i).pos.x;
                    if is_left {
                        x <= boundary + h
                    } else {
                        x >= boundary - h
                    }
                })
                .collect();
            outgoing.insert(
                rank,
                indices.iter().map(|i| self.store.get(*i).into()).collect(),
            );
            self.halo_sent.insert(rank, indices);
            self.halo_peers.push(rank);
        }
        if self.halo_peers.is_empty() {
            return;
        }
        let received = self.comms.halo.exchange(outgoing);
        for rank in received.ranks() {
            let payloads = &received[rank];
            let begin = self.store.num_total();
            for payload in payloads {
                self.store.push_halo((*payload).into());
            }
            self.halo_slots.insert(rank, (begin, payloads.len()));
        }
    }

    /// Let every halo mirror of an owned particle see the lambda its
    /// owner just computed. Without this the Jacobi update would be
    /// asymmetric across slab interfaces.
    fn publish_lambdas(&mut self) {
        if self.halo_peers.is_empty() {
            return;
        }
        let mut outgoing: DataByRank<Vec<f32>> = DataByRank::empty();
        for rank in &self.halo_peers {
            let lambdas = self.halo_sent[*rank]
                .iter()
                .map(|i| self.store.get(*i).lambda)
                .collect();
            outgoing.insert(*rank, lambdas);
        }
        let received = self.comms.lambda.exchange(outgoing);
        for (rank, values) in received {
            let (begin, len) = self.halo_slots[rank];
            debug_assert_eq!(values.len(), len);
            for (offset, lambda) in values.into_iter().enumerate() {
                self.store.get_mut(begin + offset).lambda = lambda;
            }
        }
    }

    /// Same pairing as the lambda publish, for the corrected predicted
    /// positions.
    fn publish_positions(&mut self) {
        if self.halo_peers.is_empty() {
            return;
        }
        let mut outgoing: DataByRank<Vec<PositionUpdate>> = DataByRank::empty();
        for rank in &self.halo_peers {
            let updates = self.halo_sent[*rank]
                .iter()
                .map(|i| {
                    let predicted = self.store.get(*i).predicted;
                    PositionUpdate {
                        px: predicted.x,
                        py: predicted.y,
                    }
                })
                .collect();
            outgoing.insert(*rank, updates);
        }
        let received = self.comms.positions.exchange(outgoing);
        for (rank, updates) in received {
            let (begin, len) = self.halo_slots[rank];
            debug_assert_eq!(updates.len(), len);
            for (offset, update) in updates.into_iter().enumerate() {
                self.store.get_mut(begin + offset).predicted = Vec2::new(update.px, update.py);
            }
        }
    }

    fn rebuild_lists(&mut self) {
        let h = self.tunables.smoothing_radius;
        if h <= 0.0 {
            // No kernel support, no interactions.
            self.lists.clear(self.store.num_owned());
            return;
        }
        self.positions.clear();
        self.positions
            .extend(self.store.all().iter().map(|p| p.predicted));
        let origin = Vec2::new(self.tunables.node_start_x - h, self.extent.min.y);
        let size = Vec2::new(
            self.tunables.node_end_x - self.tunables.node_start_x + 2.0 * h,
            self.extent.side_lengths().y,
        );
        let grid = CellGrid::build(origin, size, h, &self.positions);
        self.lists
            .rebuild(&grid, &self.positions, self.store.num_owned(), h);
    }

    /// Pack the committed positions into pixel-space 16-bit pairs and
    /// start an asynchronous send toward the coordinator.
    fn send_coords(&mut self) {
        let mut packed = Vec::with_capacity(2 * self.store.num_owned());
        for particle in self.store.owned() {
            packed.push(pack_coord(particle.pos.x, self.extent.max.x));
            packed.push(pack_coord(particle.pos.y, self.extent.max.y));
        }
        trace!(
            "worker {} reports {} coordinate pairs",
            self.index(),
            packed.len() / 2
        );
        self.comms.coords.send_vec(WorldRank::main(), packed);
    }
}

fn receive_tunables(comms: &mut Comms) -> Tunables {
    let mut received = comms.tunables.receive_vec(WorldRank::main());
    debug_assert_eq!(received.len(), 1);
    received.remove(0)
}

fn store_with_headroom(particles: Vec<Particle>, capacity_factor: f32) -> ParticleStore {
    let capacity = ((particles.len() as f32 * capacity_factor).ceil() as usize).max(64);
    ParticleStore::new(particles, capacity)
}
