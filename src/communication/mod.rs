mod data_by_rank;
mod exchange_communicator;
mod sized_communicator;
mod world_communicator;

pub mod comms;

pub use data_by_rank::DataByRank;
pub use sized_communicator::SizedCommunicator;
pub use world_communicator::WorldCommunicator;

#[cfg(not(feature = "mpi"))]
mod local;

#[cfg(not(feature = "mpi"))]
pub use local_reexport::*;

#[cfg(not(feature = "mpi"))]
#[path = ""]
mod local_reexport {
    pub type Communicator<T> = super::local::LocalCommunicator<T>;
    pub type ExchangeCommunicator<T> =
        super::exchange_communicator::ExchangeCommunicator<super::local::LocalCommunicator<T>, T>;

    pub use super::local::get_local_communicators;
}

#[cfg(feature = "mpi")]
mod mpi_world;

#[cfg(feature = "mpi")]
pub use mpi_reexport::*;

#[cfg(feature = "mpi")]
#[path = ""]
mod mpi_reexport {
    pub type Communicator<T> = super::mpi_world::MpiWorld<T>;
    pub type ExchangeCommunicator<T> =
        super::exchange_communicator::ExchangeCommunicator<super::mpi_world::MpiWorld<T>, T>;

    pub use super::mpi_world::MPI_UNIVERSE;
}

#[cfg(feature = "mpi")]
pub type Rank = mpi::Rank;
#[cfg(not(feature = "mpi"))]
pub type Rank = i32;

#[cfg(feature = "mpi")]
pub type Tag = mpi::Tag;
#[cfg(not(feature = "mpi"))]
pub type Tag = i32;

pub const TUNABLES_TAG: Tag = 1;
pub const MIGRATION_TAG: Tag = 2;
pub const HALO_TAG: Tag = 3;
pub const LAMBDA_TAG: Tag = 4;
pub const POSITION_TAG: Tag = 5;
/// Tag of the per-frame packed coordinate message.
pub const COORDS_TAG: Tag = 17;

#[derive(Clone, Copy, PartialEq, Eq, Debug, derive_more::Deref)]
pub struct WorldRank(pub Rank);

impl WorldRank {
    pub fn is_main(&self) -> bool {
        self.0 == 0
    }

    pub fn main() -> Rank {
        0
    }
}
