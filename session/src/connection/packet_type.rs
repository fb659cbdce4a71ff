// The header byte carried by every datagram on the wire.

use tether_serde::SerdeErr;

/// Discriminates every frame the protocol sends.
///
/// The first six types only appear in the unconnected state (handshake
/// and discovery); the rest are dispatched per-connection.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum PacketType {
    /// protocol_version (u32), password (u32), sender uuid (16 bytes)
    ConnectionRequest = 0x01,
    /// sender uuid (16 bytes)
    ConnectionAccepted = 0x02,
    /// reason (u32)
    ConnectionRejected = 0x03,
    /// empty
    Disconnecting = 0x04,
    /// empty
    Query = 0x05,
    /// protocol_version (u32), connections (u32), max_connections (u32),
    /// has_password (u8)
    QueryResponse = 0x06,
    /// stream lnr (u8), reliable lnr (u8), reliable lmr (u16)
    Ping = 0x07,
    /// same body as Ping, echoed back with the responder's state
    PingResponse = 0x08,
    /// payload bytes
    Unreliable = 0x09,
    /// message id (u8), sender lnr (u8), sender lmr (u16), payload
    Reliable = 0x0A,
    /// receiver lnr (u8), receiver lmr (u16)
    ReliableAck = 0x0B,
    /// message id (u8), sender lnr (u8), payload
    Stream = 0x0C,
    /// receiver lnr (u8)
    StreamAck = 0x0D,
}

impl From<PacketType> for u8 {
    fn from(packet_type: PacketType) -> u8 {
        packet_type as u8
    }
}

impl TryFrom<u8> for PacketType {
    type Error = SerdeErr;

    // Unknown header bytes come straight off the network; they must be
    // an error, never a panic.
    fn try_from(byte: u8) -> Result<Self, SerdeErr> {
        match byte {
            0x01 => Ok(PacketType::ConnectionRequest),
            0x02 => Ok(PacketType::ConnectionAccepted),
            0x03 => Ok(PacketType::ConnectionRejected),
            0x04 => Ok(PacketType::Disconnecting),
            0x05 => Ok(PacketType::Query),
            0x06 => Ok(PacketType::QueryResponse),
            0x07 => Ok(PacketType::Ping),
            0x08 => Ok(PacketType::PingResponse),
            0x09 => Ok(PacketType::Unreliable),
            0x0A => Ok(PacketType::Reliable),
            0x0B => Ok(PacketType::ReliableAck),
            0x0C => Ok(PacketType::Stream),
            0x0D => Ok(PacketType::StreamAck),
            _ => Err(SerdeErr),
        }
    }
}
