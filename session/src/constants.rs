use std::time::Duration;

/// Version tag carried in every connection request; peers with a
/// different value are rejected during the handshake.
pub const PROTOCOL_VERSION: u32 = 0x3336_6999;

/// Largest datagram the session will send or receive. Callers must keep
/// payloads below this minus the delivery mode's header overhead; there
/// is no fragmentation.
pub const MTU_SIZE_BYTES: usize = 800;

/// Number of in-flight slots per messenger. Sequence numbers are 8-bit
/// and wrap modulo 256; slots are indexed by `sequence % WINDOW_SIZE`.
pub const WINDOW_SIZE: usize = 16;

/// Default capacity of each messenger's send-side ring allocator.
pub const DEFAULT_PACKET_BUFFER_SIZE: usize = 4096;

/// How long a messenger waits before retransmitting unacknowledged
/// window slots.
pub const DEFAULT_RESEND_INTERVAL: Duration = Duration::from_millis(100);

/// How often an idle connection emits a PING frame.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(1);

/// How long both messengers' ack clocks must be silent before the
/// connection is declared dead.
pub const DEFAULT_TIMEOUT_INTERVAL: Duration = Duration::from_secs(10);
