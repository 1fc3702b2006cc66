use super::Rank;

pub trait WorldCommunicator<T> {
    /// Hand `data` to the transport for delivery to `rank`. The send may
    /// complete asynchronously; the transport owns the buffer until the
    /// matching receive has been posted.
    fn send_vec(&mut self, rank: Rank, data: Vec<T>);

    /// Block until a message from `rank` arrives. The element count is
    /// taken from the incoming message itself.
    fn receive_vec(&mut self, rank: Rank) -> Vec<T>;

    /// Block until every outstanding send has been delivered.
    fn finish_sends(&mut self);
}
