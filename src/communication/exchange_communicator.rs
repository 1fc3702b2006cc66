use std::marker::PhantomData;

use super::DataByRank;
use super::Rank;
use super::SizedCommunicator;
use super::WorldCommunicator;

/// Symmetric pairwise exchange over an explicit peer set. Both sides of
/// every pair must pass the same peers in the same round, which makes the
/// exchange deadlock-free: all sends are posted before the first receive.
pub struct ExchangeCommunicator<C, T> {
    pub communicator: C,
    _marker: PhantomData<T>,
}

impl<C, T> ExchangeCommunicator<C, T> {
    pub fn new(communicator: C) -> Self {
        Self {
            communicator,
            _marker: PhantomData,
        }
    }
}

impl<C, T> ExchangeCommunicator<C, T>
where
    C: WorldCommunicator<T>,
    C: SizedCommunicator,
{
    /// Send `outgoing[rank]` to every rank present in `outgoing` and
    /// receive one message from each of them in ascending rank order.
    /// An empty `Vec` must still be passed for a peer that should take
    /// part in the round but has nothing to transmit.
    pub fn exchange(&mut self, outgoing: DataByRank<Vec<T>>) -> DataByRank<Vec<T>> {
        let peers = outgoing.ranks();
        for (rank, data) in outgoing.into_iter() {
            debug_assert!(rank != self.communicator.rank());
            self.communicator.send_vec(rank, data);
        }
        let mut received = DataByRank::empty();
        for rank in peers {
            received.insert(rank, self.communicator.receive_vec(rank));
        }
        self.communicator.finish_sends();
        received
    }
}

impl<C, T> SizedCommunicator for ExchangeCommunicator<C, T>
where
    C: SizedCommunicator,
{
    fn rank(&self) -> Rank {
        self.communicator.rank()
    }

    fn size(&self) -> usize {
        self.communicator.size()
    }
}
