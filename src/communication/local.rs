use std::collections::HashMap;
use std::marker::PhantomData;
use std::mem;
use std::ptr;
use std::slice;
use std::sync::mpsc::channel;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::Sender;

use super::DataByRank;
use super::Rank;
use super::SizedCommunicator;
use super::Tag;
use super::WorldCommunicator;

pub(super) struct Payload {
    bytes: Vec<u8>,
}

/// Channel-backed stand-in for an MPI world: every rank runs as a thread
/// of the same process and each (pair, tag) owns a dedicated channel.
pub struct LocalCommunicator<T> {
    senders: DataByRank<Sender<Payload>>,
    receivers: DataByRank<Receiver<Payload>>,
    rank: Rank,
    size: usize,
    tag: Tag,
    marker_: PhantomData<T>,
}

impl<T> LocalCommunicator<T> {
    pub(super) fn new(
        receivers: DataByRank<Receiver<Payload>>,
        senders: DataByRank<Sender<Payload>>,
        tag: Tag,
        size: usize,
        rank: Rank,
    ) -> Self {
        Self {
            senders,
            receivers,
            rank,
            size,
            tag,
            marker_: PhantomData,
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }
}

impl<T: Sync + Send> WorldCommunicator<T> for LocalCommunicator<T> {
    fn send_vec(&mut self, rank: Rank, data: Vec<T>) {
        // Ship the elements as raw bytes, the same shape they would have
        // on an MPI wire. Wire types are plain bundles of scalars.
        let num_bytes = data.len() * mem::size_of::<T>();
        let bytes = unsafe { slice::from_raw_parts(data.as_ptr().cast::<u8>(), num_bytes) };
        self.senders[rank]
            .send(Payload {
                bytes: bytes.to_vec(),
            })
            .unwrap();
    }

    fn receive_vec(&mut self, rank: Rank) -> Vec<T> {
        let payload = self.receivers[rank].recv().unwrap();
        let item_size = mem::size_of::<T>();
        let mut items = Vec::with_capacity(payload.bytes.len() / item_size);
        for chunk in payload.bytes.chunks(item_size) {
            assert_eq!(
                chunk.len(),
                item_size,
                "truncated message on tag {}",
                self.tag
            );
            // Reading a value back out of the bytes it was written as is
            // sound for the scalar-only types this transport carries.
            items.push(unsafe { ptr::read(chunk.as_ptr().cast()) });
        }
        items
    }

    fn finish_sends(&mut self) {
        // Channel sends never block; nothing is outstanding.
    }
}

impl<T> SizedCommunicator for LocalCommunicator<T> {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }
}

/// Build the full channel mesh for one message type. Returns one
/// communicator per rank; the caller hands each to its rank's thread.
pub fn get_local_communicators<T>(num_ranks: usize, tag: Tag) -> HashMap<Rank, LocalCommunicator<T>> {
    let mut senders: HashMap<(Rank, Rank), Sender<Payload>> = HashMap::new();
    let mut receivers: HashMap<(Rank, Rank), Receiver<Payload>> = HashMap::new();
    for from in 0..num_ranks as Rank {
        for to in 0..num_ranks as Rank {
            if from == to {
                continue;
            }
            let (sender, receiver) = channel();
            senders.insert((from, to), sender);
            receivers.insert((to, from), receiver);
        }
    }
    (0..num_ranks as Rank)
        .map(|rank| {
            let mut rank_senders = DataByRank::empty();
            let mut rank_receivers = DataByRank::empty();
            for other in 0..num_ranks as Rank {
                if other == rank {
                    continue;
                }
                rank_senders.insert(other, senders.remove(&(rank, other)).unwrap());
                rank_receivers.insert(other, receivers.remove(&(rank, other)).unwrap());
            }
            (
                rank,
                LocalCommunicator::new(rank_receivers, rank_senders, tag, num_ranks, rank),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::get_local_communicators;
    use super::Rank;
    use crate::communication::WorldCommunicator;
    use crate::communication::COORDS_TAG;
    use crate::communication::HALO_TAG;
    use crate::communication::POSITION_TAG;
    use crate::communication::TUNABLES_TAG;
    use crate::messages::ParticlePayload;
    use crate::messages::PositionUpdate;
    use crate::messages::Tunables;

    fn payload(seed: f32) -> ParticlePayload {
        ParticlePayload {
            x: seed,
            y: seed + 0.5,
            px: seed + 1.0,
            py: seed + 1.5,
            vx: -seed,
            vy: 0.25 * seed,
        }
    }

    #[test]
    fn particle_payloads_cross_the_channel_intact() {
        let mut comms = get_local_communicators::<ParticlePayload>(2, HALO_TAG);
        let mut comm0 = comms.remove(&0).unwrap();
        let mut comm1 = comms.remove(&1).unwrap();
        let batch: Vec<_> = (0..100).map(|i| payload(i as f32 * 0.1)).collect();
        comm0.send_vec(1, batch.clone());
        assert_eq!(comm1.receive_vec(0), batch);
        comm0.send_vec(1, vec![]);
        assert!(comm1.receive_vec(0).is_empty());
    }

    #[test]
    fn tunables_arrive_field_for_field() {
        let mut comms = get_local_communicators::<Tunables>(2, TUNABLES_TAG);
        let mut comm0 = comms.remove(&0).unwrap();
        let mut comm1 = comms.remove(&1).unwrap();
        let tunables = Tunables {
            gravity: 9.0,
            smoothing_radius: 0.2,
            k_corr: 0.1,
            dq_corr: 0.06,
            rest_density: 1.0,
            viscosity: 0.05,
            dt: 1.0 / 60.0,
            mover_x: 10.0,
            mover_y: 5.0,
            mover_radius: 2.0,
            node_start_x: 0.0,
            node_end_x: 10.0,
            steps_per_frame: 3,
            num_active: 2,
            active: 1,
            kill_sim: 0,
        };
        comm0.send_vec(1, vec![tunables]);
        assert_eq!(comm1.receive_vec(0), vec![tunables]);
    }

    #[test]
    fn meshes_with_different_tags_stay_separate() {
        let mut updates = get_local_communicators::<PositionUpdate>(2, POSITION_TAG);
        let mut coords = get_local_communicators::<i16>(2, COORDS_TAG);
        let mut updates0 = updates.remove(&0).unwrap();
        let mut updates1 = updates.remove(&1).unwrap();
        let mut coords0 = coords.remove(&0).unwrap();
        let mut coords1 = coords.remove(&1).unwrap();
        let update = PositionUpdate { px: 1.25, py: -0.5 };
        let frame: Vec<i16> = vec![42, 0x0102, -3];
        coords0.send_vec(1, frame.clone());
        updates0.send_vec(1, vec![update]);
        assert_eq!(updates1.receive_vec(0), vec![update]);
        assert_eq!(coords1.receive_vec(0), frame);
    }

    #[test]
    fn local_communicator_many_ranks() {
        let num_ranks = 4;
        let mut comms = get_local_communicators::<i32>(num_ranks, 0);
        let threads: Vec<_> = (0..num_ranks as Rank)
            .map(|rank| {
                let mut comm = comms.remove(&rank).unwrap();
                thread::spawn(move || {
                    for other in 0..num_ranks as Rank {
                        if other != rank {
                            comm.send_vec(other, vec![rank]);
                        }
                    }
                    for other in 0..num_ranks as Rank {
                        if other != rank {
                            assert_eq!(comm.receive_vec(other), vec![other]);
                        }
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
    }
}
