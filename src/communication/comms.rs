use super::Communicator;
use super::ExchangeCommunicator;
use super::WorldRank;
use crate::messages::ParticlePayload;
use crate::messages::PositionUpdate;
use crate::messages::Tunables;

/// The typed communicators a rank owns, one per message kind, each on its
/// own tag so no two kinds can ever be confused for one another.
pub struct Comms {
    pub rank: WorldRank,
    pub size: usize,
    pub tunables: Communicator<Tunables>,
    pub migration: ExchangeCommunicator<ParticlePayload>,
    pub halo: ExchangeCommunicator<ParticlePayload>,
    pub lambda: ExchangeCommunicator<f32>,
    pub positions: ExchangeCommunicator<PositionUpdate>,
    pub coords: Communicator<i16>,
}

#[cfg(feature = "mpi")]
impl Comms {
    pub fn world() -> Self {
        use super::ExchangeCommunicator as Exchange;
        use super::SizedCommunicator;

        let tunables = Communicator::<Tunables>::new(super::TUNABLES_TAG);
        let rank = WorldRank(tunables.rank());
        let size = tunables.size();
        Self {
            rank,
            size,
            tunables,
            migration: Exchange::new(Communicator::new(super::MIGRATION_TAG)),
            halo: Exchange::new(Communicator::new(super::HALO_TAG)),
            lambda: Exchange::new(Communicator::new(super::LAMBDA_TAG)),
            positions: Exchange::new(Communicator::new(super::POSITION_TAG)),
            coords: Communicator::<i16>::new(super::COORDS_TAG),
        }
    }
}

#[cfg(not(feature = "mpi"))]
impl Comms {
    /// Build the channel meshes for an in-process world of `num_ranks`
    /// threads. Each returned element belongs to one rank.
    pub fn local(num_ranks: usize) -> Vec<Self> {
        use super::get_local_communicators;
        use super::Rank;

        let mut tunables = get_local_communicators::<Tunables>(num_ranks, super::TUNABLES_TAG);
        let mut migration =
            get_local_communicators::<ParticlePayload>(num_ranks, super::MIGRATION_TAG);
        let mut halo = get_local_communicators::<ParticlePayload>(num_ranks, super::HALO_TAG);
        let mut lambda = get_local_communicators::<f32>(num_ranks, super::LAMBDA_TAG);
        let mut positions =
            get_local_communicators::<PositionUpdate>(num_ranks, super::POSITION_TAG);
        let mut coords = get_local_communicators::<i16>(num_ranks, super::COORDS_TAG);
        (0..num_ranks as Rank)
            .map(|rank| Self {
                rank: WorldRank(rank),
                size: num_ranks,
                tunables: tunables.remove(&rank).unwrap(),
                migration: ExchangeCommunicator::new(migration.remove(&rank).unwrap()),
                halo: ExchangeCommunicator::new(halo.remove(&rank).unwrap()),
                lambda: ExchangeCommunicator::new(lambda.remove(&rank).unwrap()),
                positions: ExchangeCommunicator::new(positions.remove(&rank).unwrap()),
                coords: coords.remove(&rank).unwrap(),
            })
            .collect()
    }
}
