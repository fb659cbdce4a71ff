//! # Tether Session
//! A peer-to-peer session layer over a single UDP socket.
//!
//! Three delivery modes are multiplexed per peer: unreliable (fire and
//! forget), reliable (delivered exactly once, in arrival order), and
//! stream (delivered exactly once, in send order). The session also
//! handles connection establishment, liveness pings, server queries, and
//! graceful teardown.
//!
//! Everything is single-threaded and cooperative: the application calls
//! [`Session::update`] each tick, which drains the socket and services
//! every connection. Decoded payloads and lifecycle events are pushed
//! into the [`SessionHandler`] the application passes in.

mod clock;
mod connection;
mod constants;
mod ring_allocator;
mod sequence;
mod session;
mod transport;

pub use clock::SessionClock;
pub use connection::packet_type::PacketType;
pub use constants::{
    DEFAULT_PACKET_BUFFER_SIZE, MTU_SIZE_BYTES, PROTOCOL_VERSION, WINDOW_SIZE,
};
pub use ring_allocator::RingAllocator;
pub use sequence::sequence_distance;
pub use session::{
    config::SessionConfig,
    context::SessionContext,
    error::SessionError,
    handler::{QueryResult, SessionHandler},
    result::ConnectResult,
    session::Session,
};
pub use transport::{link_conditioner::LinkConditionerConfig, DatagramSocket};

pub use uuid::Uuid;
