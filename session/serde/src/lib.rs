//! # Tether Serde
//! Frame codec for the tether session protocol.
//!
//! Wire frames are byte-aligned with little-endian integers; the
//! [`FrameReader`]/[`FrameWriter`] pair covers everything the protocol
//! puts on a datagram. A bit-packed stream ([`BitReader`]/[`BitWriter`])
//! is available for payload encodings that want sub-byte packing.

mod bit_reader;
mod bit_writer;
mod error;
mod frame_reader;
mod frame_writer;

pub use bit_reader::BitReader;
pub use bit_writer::BitWriter;
pub use error::SerdeErr;
pub use frame_reader::FrameReader;
pub use frame_writer::FrameWriter;
