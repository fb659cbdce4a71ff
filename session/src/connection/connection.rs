use std::{net::SocketAddr, ops::Range};

use log::trace;
use uuid::Uuid;

use tether_serde::{FrameReader, FrameWriter};

use crate::{session::config::SessionConfig, transport::DatagramSocket};

use super::{
    packet_type::PacketType, reliable_messenger::ReliableMessenger,
    stream_messenger::StreamMessenger,
};

/// The state held for one remote peer: its endpoint and identity, the
/// two reliable messengers, and the liveness clocks.
///
/// `disconnected` is sticky — once set (by a DISCONNECTING frame, a
/// double ack timeout, or a local close) it never clears, and the
/// session removes the connection on its next sweep.
pub struct Connection {
    remote_address: SocketAddr,
    remote_uuid: Uuid,

    last_ping_time: u64,
    ping_interval: u64,
    timeout_interval: u64,

    stream: StreamMessenger,
    reliable: ReliableMessenger,

    disconnected: bool,
    closed_locally: bool,
}

impl Connection {
    pub fn new(
        remote_address: SocketAddr,
        remote_uuid: Uuid,
        config: &SessionConfig,
        now: u64,
    ) -> Self {
        let resend_interval = config.resend_interval.as_micros() as u64;

        Self {
            remote_address,
            remote_uuid,
            last_ping_time: now,
            ping_interval: config.ping_interval.as_micros() as u64,
            timeout_interval: config.timeout_interval.as_micros() as u64,
            stream: StreamMessenger::new(config.stream_buffer_size, resend_interval, now),
            reliable: ReliableMessenger::new(config.reliable_buffer_size, resend_interval, now),
            disconnected: false,
            closed_locally: false,
        }
    }

    pub fn remote_address(&self) -> SocketAddr {
        self.remote_address
    }

    pub fn remote_uuid(&self) -> Uuid {
        self.remote_uuid
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    pub fn closed_locally(&self) -> bool {
        self.closed_locally
    }

    /// Mark the connection for silent removal on the next sweep.
    pub fn close_locally(&mut self) {
        self.disconnected = true;
        self.closed_locally = true;
    }

    /// Dispatch one incoming datagram by its header byte.
    ///
    /// Returns the payload range within `datagram` when the frame
    /// carries an application message that should reach the handler.
    /// Frames whose length does not match their type are dropped.
    pub fn receive_packet(
        &mut self,
        datagram: &[u8],
        socket: &DatagramSocket,
        now: u64,
    ) -> Option<Range<usize>> {
        let mut reader = FrameReader::new(datagram);
        let header = reader.read_u8().ok()?;
        let Ok(packet_type) = PacketType::try_from(header) else {
            trace!("unknown header {header:#04x} from {}", self.remote_address);
            return None;
        };

        match packet_type {
            PacketType::Disconnecting => {
                self.disconnected = true;
                None
            }

            PacketType::Ping => {
                if datagram.len() == 5 {
                    // the reply carries our receive state; the ping's own
                    // fields are not consumed, acks travel in responses
                    let mut pong = [0u8; 5];
                    let mut writer = FrameWriter::new(&mut pong);
                    writer.write_u8(PacketType::PingResponse.into());
                    writer.write_u8(self.stream.local_low_n_received());
                    writer.write_u8(self.reliable.local_low_n_received());
                    writer.write_u16(self.reliable.local_messages_received());
                    socket.send(&pong, &self.remote_address);
                }
                None
            }

            PacketType::PingResponse => {
                if datagram.len() == 5 {
                    if let (Ok(stream_lnr), Ok(reliable_lnr), Ok(reliable_lmr)) =
                        (reader.read_u8(), reader.read_u8(), reader.read_u16())
                    {
                        self.stream.receive_ack(stream_lnr, now);
                        self.reliable.receive_ack(reliable_lnr, reliable_lmr, now);
                    }
                }
                None
            }

            PacketType::Stream => self
                .stream
                .receive_message(reader.remaining(), socket, &self.remote_address, now)
                .map(|range| range.start + 1..range.end + 1),

            PacketType::StreamAck => {
                if datagram.len() == 2 {
                    if let Ok(receiver_lnr) = reader.read_u8() {
                        self.stream.receive_ack(receiver_lnr, now);
                    }
                }
                None
            }

            PacketType::Reliable => self
                .reliable
                .receive_message(reader.remaining(), socket, &self.remote_address, now)
                .map(|range| range.start + 1..range.end + 1),

            PacketType::ReliableAck => {
                if datagram.len() == 4 {
                    if let (Ok(receiver_lnr), Ok(receiver_lmr)) =
                        (reader.read_u8(), reader.read_u16())
                    {
                        self.reliable.receive_ack(receiver_lnr, receiver_lmr, now);
                    }
                }
                None
            }

            PacketType::Unreliable => Some(1..datagram.len()),

            // handshake and query headers mean nothing on a live
            // connection
            _ => None,
        }
    }

    /// Advance the connection's timers: timeout, messengers, ping.
    pub fn update(&mut self, socket: &DatagramSocket, now: u64) {
        // only give up when *both* messengers have gone silent; an
        // application using a single delivery mode keeps just one ack
        // clock fresh through pings
        let stream_silence = now - self.stream.last_ack_time();
        let reliable_silence = now - self.reliable.last_ack_time();
        if stream_silence > self.timeout_interval && reliable_silence > self.timeout_interval {
            self.disconnected = true;
            return;
        }

        self.stream.update(socket, &self.remote_address, now);
        self.reliable.update(socket, &self.remote_address, now);

        if now - self.last_ping_time > self.ping_interval {
            self.last_ping_time = now;

            let mut ping = [0u8; 5];
            let mut writer = FrameWriter::new(&mut ping);
            writer.write_u8(PacketType::Ping.into());
            writer.write_u8(self.stream.local_low_n_received());
            writer.write_u8(self.reliable.local_low_n_received());
            writer.write_u16(self.reliable.local_messages_received());
            socket.send(&ping, &self.remote_address);
        }
    }

    /// Fire-and-forget send: a header byte and the payload, no state.
    pub fn send_unreliable(&self, payload: &[u8], socket: &DatagramSocket) {
        let mut frame = vec![0u8; payload.len() + 1];
        let mut writer = FrameWriter::new(&mut frame);
        writer.write_u8(PacketType::Unreliable.into());
        writer.write_bytes(payload);
        socket.send(&frame, &self.remote_address);
    }

    pub fn send_stream(&mut self, payload: &[u8]) {
        self.stream.send(payload);
    }

    pub fn send_reliable(&mut self, payload: &[u8]) {
        self.reliable.send(payload);
    }
}
