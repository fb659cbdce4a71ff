use std::net::SocketAddr;

use uuid::Uuid;

use super::{context::SessionContext, result::ConnectResult};

/// A remote server's answer to a QUERY frame.
#[derive(Clone, Debug)]
pub struct QueryResult {
    /// Who answered.
    pub endpoint: SocketAddr,
    /// Whether the server speaks our protocol version.
    pub protocol_matches: bool,
    /// Whether joining requires a password.
    pub has_password: bool,
    /// Currently connected peers.
    pub connections: u32,
    /// Connection cap.
    pub max_connections: u32,
}

/// The application's event sink.
///
/// Every callback fires synchronously from inside [`Session::update`],
/// in the order the driving packets and timers are processed. The
/// [`SessionContext`] argument is the safe re-entry surface: handlers
/// may send and disconnect through it, while the session's own
/// lifecycle (creation, drop) stays out of reach by construction.
///
/// All methods default to doing nothing, so implementors only write
/// the ones they care about.
///
/// [`Session::update`]: crate::Session::update
pub trait SessionHandler {
    /// An application payload arrived from `peer`, on any of the three
    /// delivery modes.
    fn on_message_received(&mut self, ctx: &mut SessionContext, payload: &[u8], peer: &Uuid) {
        let _ = (ctx, payload, peer);
    }

    /// A connection to `peer` was established, either by accepting its
    /// request or by our own request being accepted.
    fn on_peer_joined(&mut self, ctx: &mut SessionContext, peer: &Uuid) {
        let _ = (ctx, peer);
    }

    /// A connection ended: the peer sent DISCONNECTING or went silent
    /// past the timeout. Locally initiated disconnects do not fire
    /// this.
    fn on_peer_disconnected(&mut self, ctx: &mut SessionContext, peer: &Uuid) {
        let _ = (ctx, peer);
    }

    /// Our connection request was answered. On rejection `peer` is the
    /// nil UUID and `reason` explains why.
    fn on_connect_result(
        &mut self,
        ctx: &mut SessionContext,
        peer: &Uuid,
        accepted: bool,
        reason: ConnectResult,
    ) {
        let _ = (ctx, peer, accepted, reason);
    }

    /// A server answered one of our queries.
    fn on_query_result(&mut self, ctx: &mut SessionContext, result: &QueryResult) {
        let _ = (ctx, result);
    }
}
