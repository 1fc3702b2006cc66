use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::Mutex;

use derive_more::Deref;
use derive_more::DerefMut;
use lazy_static::lazy_static;
use mpi::environment::Universe;
use mpi::ffi::MPI_Request;
use mpi::request::scope;
use mpi::request::Request;
use mpi::request::Scope;
use mpi::topology::SystemCommunicator;
use mpi::traits::Communicator;
use mpi::traits::Destination;
use mpi::traits::Equivalence;
use mpi::traits::MatchedReceiveVec;
use mpi::traits::Source;
use mpi::Threading;

use super::DataByRank;
use super::Rank;
use super::SizedCommunicator;
use super::Tag;
use super::WorldCommunicator;

/// Wraps the universe in an Option so that `.drop()` can be called at
/// program completion, which runs MPI_FINALIZE. Necessary because nothing
/// in a lazy_static is ever dropped.
#[derive(Deref, DerefMut)]
pub struct StaticUniverse(Arc<Mutex<Option<Universe>>>);

impl StaticUniverse {
    pub fn world(&self) -> SystemCommunicator {
        self.0.lock().unwrap().as_ref().unwrap().world()
    }

    pub fn drop(&self) {
        let _ = self.0.lock().unwrap().take();
    }
}

lazy_static! {
    pub static ref MPI_UNIVERSE: StaticUniverse = {
        let threading = Threading::Multiple;
        let (mut universe, threading_initialized) =
            mpi::initialize_with_threading(threading).unwrap();
        universe.set_buffer_size(1024 * 16);
        assert_eq!(
            threading, threading_initialized,
            "Could not initialize MPI with Multithreading"
        );
        StaticUniverse(Arc::new(Mutex::new(Some(universe))))
    };
}

type OutstandingRequest = MPI_Request;

/// Point-to-point view of the MPI world for one message type. Sends are
/// posted immediately into per-destination buffers; a buffer is reused
/// only after its previous request has completed.
pub struct MpiWorld<T: Equivalence> {
    world: SystemCommunicator,
    tag: Tag,
    send_buffers: DataByRank<Vec<T>>,
    requests: DataByRank<OutstandingRequest>,
    _marker: PhantomData<T>,
}

impl<T: Equivalence> MpiWorld<T> {
    pub fn new(tag: Tag) -> Self {
        let world = MPI_UNIVERSE.world();
        Self {
            world,
            tag,
            send_buffers: DataByRank::empty(),
            requests: DataByRank::empty(),
            _marker: PhantomData,
        }
    }

    fn complete_send(&mut self, rank: Rank) {
        if let Some(request) = self.requests.remove(&rank) {
            let data = &self.send_buffers[rank];
            scope(|s| {
                self.to_scoped_request(s, data, request).wait();
            });
        }
    }

    fn to_scoped_request<'a, Sc: Scope<'a>>(
        &self,
        scope: Sc,
        data: &'a Vec<T>,
        request: OutstandingRequest,
    ) -> Request<'a, [T], Sc> {
        // SAFETY: the raw request came from an immediate send of exactly
        // this buffer, which has not been touched since.
        unsafe { Request::from_raw(request, &data, scope) }
    }
}

impl<T: Equivalence> WorldCommunicator<T> for MpiWorld<T> {
    fn send_vec(&mut self, rank: Rank, data: Vec<T>) {
        self.complete_send(rank);
        self.send_buffers.insert(rank, data);
        let world = self.world;
        let tag = self.tag;
        let buffer = &self.send_buffers[rank];
        let request = scope(|s| {
            let request = world
                .process_at_rank(rank)
                .immediate_send_with_tag(s, &buffer[..], tag);
            // SAFETY: the buffer outlives the scope and the raw request is
            // awaited before the buffer is dropped or overwritten.
            unsafe { request.into_raw().0 }
        });
        self.requests.insert(rank, request);
    }

    fn receive_vec(&mut self, rank: Rank) -> Vec<T> {
        let process = self.world.process_at_rank(rank);
        let result = process.matched_probe_with_tag(self.tag);
        let (data, _) = result.matched_receive_vec();
        data
    }

    fn finish_sends(&mut self) {
        for rank in self.requests.ranks() {
            self.complete_send(rank);
        }
    }
}

impl<T: Equivalence> SizedCommunicator for MpiWorld<T> {
    fn rank(&self) -> Rank {
        self.world.rank()
    }

    fn size(&self) -> usize {
        self.world.size() as usize
    }
}

impl<T: Equivalence> Drop for MpiWorld<T> {
    fn drop(&mut self) {
        self.finish_sends();
    }
}
