use log::debug;
use uuid::Uuid;

use crate::{
    connection::{
        connection::Connection, packet_type::PacketType, reliable_messenger::ReliableMessenger,
        stream_messenger::StreamMessenger,
    },
    constants::MTU_SIZE_BYTES,
    transport::DatagramSocket,
};

/// The slice of a session that handler callbacks are allowed to touch.
///
/// Callbacks fire while [`Session::update`] iterates its connections,
/// so they cannot be handed the session itself. The context borrows the
/// socket and connection list instead; sends enqueue onto the target
/// connection and disconnects mark the sticky flag for the deferred
/// removal sweep, so the list never changes shape mid-iteration.
///
/// [`Session::update`]: crate::Session::update
pub struct SessionContext<'a> {
    pub(crate) socket: &'a DatagramSocket,
    pub(crate) connections: &'a mut Vec<Connection>,
    pub(crate) local_uuid: Uuid,
}

impl SessionContext<'_> {
    /// This session's own identity.
    pub fn local_id(&self) -> Uuid {
        self.local_uuid
    }

    /// Endpoint of a connected peer, if any.
    pub fn find_address(&self, peer: &Uuid) -> Option<std::net::SocketAddr> {
        self.find(peer).map(Connection::remote_address)
    }

    /// Send a fire-and-forget payload to `peer`.
    pub fn send_unreliable(&mut self, payload: &[u8], peer: &Uuid) {
        if oversized(payload, 1) {
            return;
        }
        if let Some(connection) = self.find(peer) {
            connection.send_unreliable(payload, self.socket);
        }
    }

    /// Queue a payload for reliable, arrival-order delivery to `peer`.
    pub fn send_reliable(&mut self, payload: &[u8], peer: &Uuid) {
        if oversized(payload, ReliableMessenger::HEADER_LEN) {
            return;
        }
        if let Some(connection) = self.find_mut(peer) {
            connection.send_reliable(payload);
        }
    }

    /// Queue a payload for in-order delivery to `peer`.
    pub fn send_stream(&mut self, payload: &[u8], peer: &Uuid) {
        if oversized(payload, StreamMessenger::HEADER_LEN) {
            return;
        }
        if let Some(connection) = self.find_mut(peer) {
            connection.send_stream(payload);
        }
    }

    /// Drop the connection to `peer`: tell it we are leaving and mark
    /// the connection for silent removal at the end of the tick.
    pub fn disconnect(&mut self, peer: &Uuid) {
        let Some(connection) = self.find_mut(peer) else {
            return;
        };

        let frame = [u8::from(PacketType::Disconnecting)];
        let address = connection.remote_address();
        connection.close_locally();
        self.socket.send(&frame, &address);
    }

    fn find(&self, peer: &Uuid) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|connection| connection.remote_uuid() == *peer)
    }

    fn find_mut(&mut self, peer: &Uuid) -> Option<&mut Connection> {
        self.connections
            .iter_mut()
            .find(|connection| connection.remote_uuid() == *peer)
    }
}

/// MTU admission check, accounting for the delivery mode's header.
pub(crate) fn oversized(payload: &[u8], header_len: usize) -> bool {
    if payload.len() + header_len > MTU_SIZE_BYTES {
        debug!(
            "send of {} bytes refused, exceeds the {MTU_SIZE_BYTES} byte budget with {header_len} header bytes",
            payload.len()
        );
        return true;
    }
    false
}
