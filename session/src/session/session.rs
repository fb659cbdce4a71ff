use std::net::SocketAddr;

use log::{debug, info, trace};
use uuid::Uuid;

use tether_serde::{FrameReader, FrameWriter};

use crate::{
    clock::SessionClock,
    connection::{connection::Connection, packet_type::PacketType},
    constants::{MTU_SIZE_BYTES, PROTOCOL_VERSION},
    transport::{
        link_conditioner::{LinkConditioner, LinkConditionerConfig},
        DatagramSocket,
    },
};

use super::{
    config::SessionConfig,
    context::SessionContext,
    error::SessionError,
    handler::{QueryResult, SessionHandler},
    result::ConnectResult,
};

/// A peer-to-peer session: one UDP socket, one identity, and a
/// connection per remote peer.
///
/// The session is driven cooperatively — call [`update`] on every tick
/// of the owning thread. Nothing blocks: the drain loop stops when the
/// socket is empty, and the per-tick work is proportional to the number
/// of connections times the window size.
///
/// [`update`]: Session::update
pub struct Session {
    socket: DatagramSocket,
    clock: SessionClock,
    uuid: Uuid,
    config: SessionConfig,
    connections: Vec<Connection>,
    receive_buffer: Box<[u8]>,
}

impl Session {
    /// Bind to `addr` (port 0 picks an ephemeral port) and mint a fresh
    /// random identity. Binding is the only fatal failure; everything
    /// after creation fails quiet.
    pub fn new(addr: &str, config: SessionConfig) -> Result<Self, SessionError> {
        let mut socket = DatagramSocket::bind(addr).map_err(SessionError::Bind)?;

        if let Some(conditioner_config) = config.link_conditioner {
            socket.set_conditioner(Some(LinkConditioner::new(conditioner_config)));
        }

        let uuid = Uuid::new_v4();
        info!("session {uuid} bound to {:?}", socket.local_addr().ok());

        Ok(Self {
            socket,
            clock: SessionClock::new(),
            uuid,
            config,
            connections: Vec::new(),
            receive_buffer: vec![0u8; MTU_SIZE_BYTES].into_boxed_slice(),
        })
    }

    /// This session's own identity.
    pub fn local_id(&self) -> Uuid {
        self.uuid
    }

    /// The bound socket address; useful after binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }

    /// Identity of the peer connected at `addr`, or the nil UUID.
    pub fn find_id(&self, addr: &SocketAddr) -> Uuid {
        self.connections
            .iter()
            .find(|connection| connection.remote_address() == *addr)
            .map(Connection::remote_uuid)
            .unwrap_or_else(Uuid::nil)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Change the synthetic incoming loss at runtime. Tests use this to
    /// degrade or partition a link mid-session.
    pub fn set_link_conditioner(&mut self, config: Option<LinkConditionerConfig>) {
        self.socket.set_conditioner(config.map(LinkConditioner::new));
    }

    /// One cooperative tick: drain the socket, then service every
    /// connection. All handler callbacks fire from inside this call.
    pub fn update<H: SessionHandler>(&mut self, handler: &mut H) {
        self.receive_packets(handler);
        self.update_connections(handler);
    }

    /// Ask the peer at `addr` to accept us. The outcome arrives later
    /// through [`SessionHandler::on_connect_result`]; requests are not
    /// retried, callers reissue them at their own cadence.
    pub fn try_connect(&self, addr: &SocketAddr, password: u32) {
        let mut frame = [0u8; 25];
        let mut writer = FrameWriter::new(&mut frame);
        writer.write_u8(PacketType::ConnectionRequest.into());
        writer.write_u32(PROTOCOL_VERSION);
        writer.write_u32(password);
        writer.write_array(self.uuid.as_bytes());
        self.socket.send(&frame, addr);
    }

    /// Ask the peer at `addr` for its status; answered through
    /// [`SessionHandler::on_query_result`].
    pub fn query(&self, addr: &SocketAddr) {
        let frame = [u8::from(PacketType::Query)];
        self.socket.send(&frame, addr);
    }

    /// Drop the connection to `peer` immediately, telling it we are
    /// leaving. Does not fire [`SessionHandler::on_peer_disconnected`] —
    /// that callback reports the *peer* going away.
    pub fn disconnect(&mut self, peer: &Uuid) {
        let Some(index) = self
            .connections
            .iter()
            .position(|connection| connection.remote_uuid() == *peer)
        else {
            return;
        };

        let connection = self.connections.remove(index);
        let frame = [u8::from(PacketType::Disconnecting)];
        self.socket.send(&frame, &connection.remote_address());
        debug!("closed connection to {peer}");
    }

    /// Fire-and-forget send; no delivery guarantee of any kind.
    pub fn send_unreliable(&mut self, payload: &[u8], peer: &Uuid) {
        self.context().send_unreliable(payload, peer);
    }

    /// Reliable, arrival-order delivery.
    pub fn send_reliable(&mut self, payload: &[u8], peer: &Uuid) {
        self.context().send_reliable(payload, peer);
    }

    /// Reliable, send-order delivery.
    pub fn send_stream(&mut self, payload: &[u8], peer: &Uuid) {
        self.context().send_stream(payload, peer);
    }

    fn context(&mut self) -> SessionContext<'_> {
        SessionContext {
            socket: &self.socket,
            connections: &mut self.connections,
            local_uuid: self.uuid,
        }
    }

    fn receive_packets<H: SessionHandler>(&mut self, handler: &mut H) {
        loop {
            let Some((length, from)) = self.socket.try_receive(&mut self.receive_buffer) else {
                break;
            };
            let now = self.clock.microseconds();

            let index = self
                .connections
                .iter()
                .position(|connection| connection.remote_address() == from);

            let Some(index) = index else {
                self.handle_unconnected_packet(length, from, handler);
                continue;
            };

            let delivery = self.connections[index].receive_packet(
                &self.receive_buffer[..length],
                &self.socket,
                now,
            );

            if let Some(range) = delivery {
                let peer = self.connections[index].remote_uuid();
                let mut ctx = SessionContext {
                    socket: &self.socket,
                    connections: &mut self.connections,
                    local_uuid: self.uuid,
                };
                handler.on_message_received(&mut ctx, &self.receive_buffer[range], &peer);
            }

            if self.connections[index].is_disconnected() {
                let connection = self.connections.remove(index);
                self.notify_disconnected(connection, handler);
            }
        }
    }

    fn update_connections<H: SessionHandler>(&mut self, handler: &mut H) {
        for connection in &mut self.connections {
            let now = self.clock.microseconds();
            connection.update(&self.socket, now);
        }

        // removal is a deferred pass so that callbacks never observe the
        // vector mid-mutation; rescanning after each removal keeps it
        // correct when a callback disconnects further peers
        loop {
            let Some(index) = self
                .connections
                .iter()
                .position(Connection::is_disconnected)
            else {
                break;
            };
            let connection = self.connections.remove(index);
            self.notify_disconnected(connection, handler);
        }
    }

    fn notify_disconnected<H: SessionHandler>(&mut self, connection: Connection, handler: &mut H) {
        if connection.closed_locally() {
            return;
        }

        let peer = connection.remote_uuid();
        info!("peer {peer} disconnected");

        let mut ctx = SessionContext {
            socket: &self.socket,
            connections: &mut self.connections,
            local_uuid: self.uuid,
        };
        handler.on_peer_disconnected(&mut ctx, &peer);
    }

    /// The unconnected state machine: handshake and discovery frames
    /// from endpoints we hold no connection for. Anything else from a
    /// stranger is dropped.
    fn handle_unconnected_packet<H: SessionHandler>(
        &mut self,
        length: usize,
        from: SocketAddr,
        handler: &mut H,
    ) {
        let mut reader = FrameReader::new(&self.receive_buffer[..length]);
        let Ok(header) = reader.read_u8() else {
            return;
        };
        let Ok(packet_type) = PacketType::try_from(header) else {
            trace!("unknown header {header:#04x} from unconnected {from}");
            return;
        };

        match packet_type {
            PacketType::ConnectionRequest if length == 25 => {
                let Ok(protocol_version) = reader.read_u32() else {
                    return;
                };
                let Ok(password) = reader.read_u32() else {
                    return;
                };
                let Ok(uuid_bytes) = reader.read_array::<16>() else {
                    return;
                };
                self.answer_connection_request(
                    protocol_version,
                    password,
                    Uuid::from_bytes(uuid_bytes),
                    from,
                    handler,
                );
            }

            PacketType::ConnectionAccepted if length == 17 => {
                let Ok(uuid_bytes) = reader.read_array::<16>() else {
                    return;
                };
                let remote_uuid = Uuid::from_bytes(uuid_bytes);

                // live identities are unique within a session
                if self.find_connection(&remote_uuid).is_some() {
                    debug!("duplicate accept for {remote_uuid} dropped");
                    return;
                }

                self.register_peer(remote_uuid, from, handler);

                let mut ctx = SessionContext {
                    socket: &self.socket,
                    connections: &mut self.connections,
                    local_uuid: self.uuid,
                };
                handler.on_connect_result(&mut ctx, &remote_uuid, true, ConnectResult::Succeeded);
            }

            PacketType::ConnectionRejected if length == 5 => {
                let Ok(reason_raw) = reader.read_u32() else {
                    return;
                };
                let Ok(reason) = ConnectResult::try_from(reason_raw) else {
                    trace!("rejection with unknown reason {reason_raw} from {from}");
                    return;
                };

                debug!("connection refused by {from}: {reason:?}");
                let mut ctx = SessionContext {
                    socket: &self.socket,
                    connections: &mut self.connections,
                    local_uuid: self.uuid,
                };
                handler.on_connect_result(&mut ctx, &Uuid::nil(), false, reason);
            }

            PacketType::Query if length == 1 => {
                let mut frame = [0u8; 14];
                let mut writer = FrameWriter::new(&mut frame);
                writer.write_u8(PacketType::QueryResponse.into());
                writer.write_u32(PROTOCOL_VERSION);
                writer.write_u32(self.connections.len() as u32);
                writer.write_u32(self.config.max_connections);
                writer.write_u8(u8::from(self.config.password != 0));
                self.socket.send(&frame, &from);
            }

            PacketType::QueryResponse if length == 14 => {
                let Ok(protocol_version) = reader.read_u32() else {
                    return;
                };
                let Ok(connections) = reader.read_u32() else {
                    return;
                };
                let Ok(max_connections) = reader.read_u32() else {
                    return;
                };
                let Ok(has_password) = reader.read_u8() else {
                    return;
                };

                let result = QueryResult {
                    endpoint: from,
                    protocol_matches: protocol_version == PROTOCOL_VERSION,
                    has_password: has_password != 0,
                    connections,
                    max_connections,
                };

                let mut ctx = SessionContext {
                    socket: &self.socket,
                    connections: &mut self.connections,
                    local_uuid: self.uuid,
                };
                handler.on_query_result(&mut ctx, &result);
            }

            _ => {
                trace!("{packet_type:?} from unconnected {from} dropped");
            }
        }
    }

    fn answer_connection_request<H: SessionHandler>(
        &mut self,
        protocol_version: u32,
        password: u32,
        remote_uuid: Uuid,
        from: SocketAddr,
        handler: &mut H,
    ) {
        let result = if protocol_version != PROTOCOL_VERSION {
            ConnectResult::InvalidProtocol
        } else if password != self.config.password {
            ConnectResult::InvalidPassword
        } else if self.connections.len() >= self.config.max_connections as usize {
            ConnectResult::ServerFull
        } else {
            ConnectResult::Succeeded
        };

        if result != ConnectResult::Succeeded {
            debug!("rejecting {from}: {result:?}");
            let mut frame = [0u8; 5];
            let mut writer = FrameWriter::new(&mut frame);
            writer.write_u8(PacketType::ConnectionRejected.into());
            writer.write_u32(result.into());
            self.socket.send(&frame, &from);
            return;
        }

        // live identities are unique within a session; a duplicated
        // request (e.g. a resend racing our accept) is dropped
        if self.find_connection(&remote_uuid).is_some() {
            debug!("duplicate request for {remote_uuid} dropped");
            return;
        }

        let mut frame = [0u8; 17];
        let mut writer = FrameWriter::new(&mut frame);
        writer.write_u8(PacketType::ConnectionAccepted.into());
        writer.write_array(self.uuid.as_bytes());
        self.socket.send(&frame, &from);

        self.register_peer(remote_uuid, from, handler);
    }

    fn register_peer<H: SessionHandler>(
        &mut self,
        remote_uuid: Uuid,
        from: SocketAddr,
        handler: &mut H,
    ) {
        let now = self.clock.microseconds();
        self.connections
            .push(Connection::new(from, remote_uuid, &self.config, now));
        info!("peer {remote_uuid} joined from {from}");

        let mut ctx = SessionContext {
            socket: &self.socket,
            connections: &mut self.connections,
            local_uuid: self.uuid,
        };
        handler.on_peer_joined(&mut ctx, &remote_uuid);
    }

    fn find_connection(&self, peer: &Uuid) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|connection| connection.remote_uuid() == *peer)
    }
}

impl Drop for Session {
    // best-effort goodbye; peers that miss it fall back to the timeout
    fn drop(&mut self) {
        let frame = [u8::from(PacketType::Disconnecting)];
        for connection in &self.connections {
            self.socket.send(&frame, &connection.remote_address());
        }
    }
}
