use std::{collections::VecDeque, net::SocketAddr, ops::Range};

use log::{debug, trace};

use tether_serde::{FrameReader, FrameWriter};

use crate::{
    constants::WINDOW_SIZE, ring_allocator::RingAllocator, sequence::sequence_distance,
    transport::DatagramSocket,
};

use super::packet_type::PacketType;

/// A framed message parked in the messenger's ring allocator.
#[derive(Clone, Copy)]
pub(crate) struct PacketSlot {
    pub offset: usize,
    pub length: usize,
}

/// The ordered ("stream") messenger: one direction of in-order,
/// exactly-once delivery to a single peer.
///
/// Sequence numbers are 8-bit and wrap; up to [`WINDOW_SIZE`] messages
/// are in flight at once, each parked in the ring allocator until the
/// peer's cumulative acknowledgment passes it. The receive side only
/// ever delivers the message at the head of the sequence — anything
/// else is a duplicate or early arrival and is dropped, to be
/// retransmitted by the sender in order.
pub struct StreamMessenger {
    local_low_n_sent: u8,
    local_low_n_received: u8,
    remote_low_n_received: u8,

    last_ack_time: u64,
    last_resend_time: u64,
    resend_interval: u64,

    allocator: RingAllocator,
    window: [Option<PacketSlot>; WINDOW_SIZE],
    queue: VecDeque<PacketSlot>,
}

impl StreamMessenger {
    /// type + message_id + sender_lnr
    pub const HEADER_LEN: usize = 3;

    pub fn new(buffer_capacity: usize, resend_interval: u64, now: u64) -> Self {
        Self {
            local_low_n_sent: 0,
            local_low_n_received: 0,
            remote_low_n_received: 0,
            last_ack_time: now,
            last_resend_time: now,
            resend_interval,
            allocator: RingAllocator::with_capacity(buffer_capacity),
            window: [None; WINDOW_SIZE],
            queue: VecDeque::new(),
        }
    }

    pub fn local_low_n_received(&self) -> u8 {
        self.local_low_n_received
    }

    pub fn last_ack_time(&self) -> u64 {
        self.last_ack_time
    }

    /// Sequences sent but not yet acknowledged by the peer.
    pub fn in_flight(&self) -> u8 {
        sequence_distance(self.local_low_n_sent, self.remote_low_n_received)
    }

    /// Queue a payload for ordered delivery.
    ///
    /// Backpressure is best-effort: when the ring cannot hold the
    /// message the send is silently dropped — the application is
    /// producing faster than the window drains.
    pub fn send(&mut self, payload: &[u8]) {
        let length = payload.len() + Self::HEADER_LEN;

        let Some(offset) = self.allocator.push_back(length) else {
            debug!("stream send dropped, ring allocator full ({} bytes queued)", self.allocator.allocated());
            return;
        };

        self.allocator
            .get_mut(offset + Self::HEADER_LEN, payload.len())
            .copy_from_slice(payload);
        self.queue.push_back(PacketSlot { offset, length });
    }

    /// Drain the queue into the send window and retransmit stale slots.
    pub fn update(&mut self, socket: &DatagramSocket, remote: &SocketAddr, now: u64) {
        // move queued messages into the window while it has room
        while (self.in_flight() as usize) < WINDOW_SIZE {
            let Some(slot) = self.queue.pop_front() else {
                break;
            };

            // sending counts as activity, hold off the resend sweep
            self.last_resend_time = now;

            let index = self.local_low_n_sent as usize % WINDOW_SIZE;

            let mut writer = FrameWriter::new(self.allocator.get_mut(slot.offset, slot.length));
            writer.write_u8(PacketType::Stream.into());
            writer.write_u8(self.local_low_n_sent);
            writer.write_u8(self.local_low_n_received);

            socket.send(self.allocator.get(slot.offset, slot.length), remote);

            self.window[index] = Some(slot);
            self.local_low_n_sent = self.local_low_n_sent.wrapping_add(1);
        }

        // retransmit the whole in-flight range if nothing has gone out
        // in a while; the stream protocol has no selective acks
        if now - self.last_resend_time > self.resend_interval && self.in_flight() > 0 {
            self.last_resend_time = now;

            let mut seq = self.remote_low_n_received;
            while seq != self.local_low_n_sent {
                self.resend(seq, socket, remote);
                seq = seq.wrapping_add(1);
            }
        }
    }

    /// Handle an incoming STREAM frame (minus the header byte).
    ///
    /// Returns the payload range within `frame` when the message is the
    /// one the sequence is waiting for.
    pub fn receive_message(
        &mut self,
        frame: &[u8],
        socket: &DatagramSocket,
        remote: &SocketAddr,
        now: u64,
    ) -> Option<Range<usize>> {
        let mut reader = FrameReader::new(frame);
        let message_id = reader.read_u8().ok()?;
        let sender_lnr = reader.read_u8().ok()?;

        self.receive_ack(sender_lnr, now);

        if message_id != self.local_low_n_received {
            trace!(
                "stream message {message_id} dropped, waiting for {}",
                self.local_low_n_received
            );
            return None;
        }

        self.local_low_n_received = self.local_low_n_received.wrapping_add(1);

        let mut ack = [0u8; 2];
        let mut writer = FrameWriter::new(&mut ack);
        writer.write_u8(PacketType::StreamAck.into());
        writer.write_u8(self.local_low_n_received);
        socket.send(&ack, remote);

        Some(reader.position()..frame.len())
    }

    /// Apply a cumulative acknowledgment.
    ///
    /// An ack may only hold position or move forward relative to what
    /// has been sent; anything else is stale or corrupt and is ignored.
    pub fn receive_ack(&mut self, new_remote_lnr: u8, now: u64) {
        let dist_old = sequence_distance(self.local_low_n_sent, self.remote_low_n_received);
        let dist_new = sequence_distance(self.local_low_n_sent, new_remote_lnr);

        if dist_new > dist_old {
            trace!("stream ack {new_remote_lnr} ignored, behind {}", self.remote_low_n_received);
            return;
        }

        self.last_ack_time = now;

        // every freshly acknowledged sequence releases its ring slot;
        // release order matches allocation order exactly
        let mut seq = self.remote_low_n_received;
        while seq != new_remote_lnr {
            self.allocator.pop_front();
            self.window[seq as usize % WINDOW_SIZE] = None;
            seq = seq.wrapping_add(1);
        }

        self.remote_low_n_received = new_remote_lnr;
    }

    fn resend(&mut self, seq: u8, socket: &DatagramSocket, remote: &SocketAddr) {
        let index = seq as usize % WINDOW_SIZE;
        let Some(slot) = self.window[index] else {
            return;
        };

        // the receiver's head may have moved since the original send;
        // refresh the piggybacked field before retransmitting
        let mut writer = FrameWriter::new(self.allocator.get_mut(slot.offset, slot.length));
        writer.skip(2);
        writer.write_u8(self.local_low_n_received);

        socket.send(self.allocator.get(slot.offset, slot.length), remote);
    }
}
