use std::{collections::VecDeque, net::SocketAddr, ops::Range};

use log::{debug, trace};

use tether_serde::{FrameReader, FrameWriter};

use crate::{
    constants::WINDOW_SIZE, ring_allocator::RingAllocator, sequence::sequence_distance,
    transport::DatagramSocket,
};

use super::{packet_type::PacketType, stream_messenger::PacketSlot};

/// The unordered reliable messenger: one direction of exactly-once
/// delivery that tolerates gaps at the head of the sequence.
///
/// The send side mirrors the stream messenger's window, but
/// acknowledgments carry a 16-bit bitmap alongside the cumulative head:
/// bit `k` set means the peer holds sequence `head + k`. Retransmission
/// is selective — only sequences whose bit is clear go out again.
///
/// The receive side hands a message to the application the moment it
/// first arrives (arrival order, not send order); the window and bitmap
/// exist to deduplicate and to bound how far ahead a sender may run.
pub struct ReliableMessenger {
    local_low_n_sent: u8,
    local_low_n_received: u8,
    local_messages_received: u16,

    remote_low_n_received: u8,
    remote_messages_received: u16,

    last_ack_time: u64,
    last_resend_time: u64,
    resend_interval: u64,

    allocator: RingAllocator,
    window: [Option<PacketSlot>; WINDOW_SIZE],
    queue: VecDeque<PacketSlot>,
}

impl ReliableMessenger {
    /// type + message_id + sender_lnr + sender_lmr
    pub const HEADER_LEN: usize = 5;

    pub fn new(buffer_capacity: usize, resend_interval: u64, now: u64) -> Self {
        Self {
            local_low_n_sent: 0,
            local_low_n_received: 0,
            local_messages_received: 0,
            remote_low_n_received: 0,
            remote_messages_received: 0,
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

    pub fn local_messages_received(&self) -> u16 {
        self.local_messages_received
    }

    pub fn last_ack_time(&self) -> u64 {
        self.last_ack_time
    }

    /// Sequences sent but not yet cumulatively acknowledged.
    pub fn in_flight(&self) -> u8 {
        sequence_distance(self.local_low_n_sent, self.remote_low_n_received)
    }

    /// Queue a payload for reliable delivery. Silently dropped when the
    /// ring allocator cannot hold it.
    pub fn send(&mut self, payload: &[u8]) {
        let length = payload.len() + Self::HEADER_LEN;

        let Some(offset) = self.allocator.push_back(length) else {
            debug!("reliable send dropped, ring allocator full ({} bytes queued)", self.allocator.allocated());
            return;
        };

        self.allocator
            .get_mut(offset + Self::HEADER_LEN, payload.len())
            .copy_from_slice(payload);
        self.queue.push_back(PacketSlot { offset, length });
    }

    /// Drain the queue into the send window and retransmit whatever the
    /// peer has not yet reported holding.
    pub fn update(&mut self, socket: &DatagramSocket, remote: &SocketAddr, now: u64) {
        while (self.in_flight() as usize) < WINDOW_SIZE {
            let Some(slot) = self.queue.pop_front() else {
                break;
            };

            // sending counts as activity, hold off the resend sweep
            self.last_resend_time = now;

            let index = self.local_low_n_sent as usize % WINDOW_SIZE;

            let mut writer = FrameWriter::new(self.allocator.get_mut(slot.offset, slot.length));
            writer.write_u8(PacketType::Reliable.into());
            writer.write_u8(self.local_low_n_sent);
            writer.write_u8(self.local_low_n_received);
            writer.write_u16(self.local_messages_received);

            socket.send(self.allocator.get(slot.offset, slot.length), remote);

            self.window[index] = Some(slot);
            self.local_low_n_sent = self.local_low_n_sent.wrapping_add(1);
        }

        if now - self.last_resend_time > self.resend_interval && self.in_flight() > 0 {
            self.last_resend_time = now;

            // walk the in-flight range with the peer's bitmap; bit k
            // covers sequence head + k, so the flag shifts in step
            let mut flag: u32 = 1;
            let mut seq = self.remote_low_n_received;
            while seq != self.local_low_n_sent {
                if u32::from(self.remote_messages_received) & flag == 0 {
                    self.resend(seq, socket, remote);
                }
                flag <<= 1;
                seq = seq.wrapping_add(1);
            }
        }
    }

    /// Handle an incoming RELIABLE frame (minus the header byte).
    ///
    /// Returns the payload range within `frame` on first arrival of an
    /// in-window sequence; duplicates and out-of-window messages yield
    /// nothing.
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
        let sender_lmr = reader.read_u16().ok()?;

        self.receive_ack(sender_lnr, sender_lmr, now);

        let index = sequence_distance(message_id, self.local_low_n_received);
        if index as usize >= WINDOW_SIZE {
            trace!(
                "reliable message {message_id} outside the window at {}",
                self.local_low_n_received
            );
            return None;
        }

        let flag = 1u16 << index;
        if self.local_messages_received & flag != 0 {
            trace!("reliable message {message_id} duplicated");
            return None;
        }

        self.local_messages_received |= flag;

        // slide the head over every contiguous received bit
        while self.local_messages_received & 1 != 0 {
            self.local_low_n_received = self.local_low_n_received.wrapping_add(1);
            self.local_messages_received >>= 1;
        }

        let mut ack = [0u8; 4];
        let mut writer = FrameWriter::new(&mut ack);
        writer.write_u8(PacketType::ReliableAck.into());
        writer.write_u8(self.local_low_n_received);
        writer.write_u16(self.local_messages_received);
        socket.send(&ack, remote);

        Some(reader.position()..frame.len())
    }

    /// Apply a cumulative + bitmap acknowledgment. Acks that would move
    /// the head backward relative to what has been sent are ignored.
    pub fn receive_ack(&mut self, new_remote_lnr: u8, new_remote_lmr: u16, now: u64) {
        let dist_old = sequence_distance(self.local_low_n_sent, self.remote_low_n_received);
        let dist_new = sequence_distance(self.local_low_n_sent, new_remote_lnr);

        if dist_new > dist_old {
            trace!("reliable ack {new_remote_lnr} ignored, behind {}", self.remote_low_n_received);
            return;
        }

        self.last_ack_time = now;

        let mut seq = self.remote_low_n_received;
        while seq != new_remote_lnr {
            self.allocator.pop_front();
            self.window[seq as usize % WINDOW_SIZE] = None;
            seq = seq.wrapping_add(1);
        }

        self.remote_messages_received = new_remote_lmr;
        self.remote_low_n_received = new_remote_lnr;
    }

    fn resend(&mut self, seq: u8, socket: &DatagramSocket, remote: &SocketAddr) {
        let index = seq as usize % WINDOW_SIZE;
        let Some(slot) = self.window[index] else {
            return;
        };

        // refresh the piggybacked ack fields before retransmitting
        let mut writer = FrameWriter::new(self.allocator.get_mut(slot.offset, slot.length));
        writer.skip(2);
        writer.write_u8(self.local_low_n_received);
        writer.write_u16(self.local_messages_received);

        socket.send(self.allocator.get(slot.offset, slot.length), remote);
    }
}
