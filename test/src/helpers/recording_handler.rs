use tether_session::{ConnectResult, QueryResult, SessionContext, SessionHandler, Uuid};

/// Everything a handler can observe, in the order it was observed.
#[derive(Clone, Debug)]
pub enum Event {
    Message { peer: Uuid, payload: Vec<u8> },
    Joined(Uuid),
    Disconnected(Uuid),
    ConnectResult {
        peer: Uuid,
        accepted: bool,
        reason: ConnectResult,
    },
    QueryResult(QueryResult),
}

/// A handler that records every callback for later assertions.
#[derive(Default)]
pub struct RecordingHandler {
    pub events: Vec<Event>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<&[u8]> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Message { payload, .. } => Some(payload.as_slice()),
                _ => None,
            })
            .collect()
    }

    pub fn joined(&self) -> Vec<Uuid> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Joined(peer) => Some(*peer),
                _ => None,
            })
            .collect()
    }

    pub fn disconnected(&self) -> Vec<Uuid> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Disconnected(peer) => Some(*peer),
                _ => None,
            })
            .collect()
    }

    pub fn connect_results(&self) -> Vec<(Uuid, bool, ConnectResult)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::ConnectResult {
                    peer,
                    accepted,
                    reason,
                } => Some((*peer, *accepted, *reason)),
                _ => None,
            })
            .collect()
    }

    pub fn query_results(&self) -> Vec<&QueryResult> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::QueryResult(result) => Some(result),
                _ => None,
            })
            .collect()
    }
}

impl SessionHandler for RecordingHandler {
    fn on_message_received(&mut self, _ctx: &mut SessionContext, payload: &[u8], peer: &Uuid) {
        self.events.push(Event::Message {
            peer: *peer,
            payload: payload.to_vec(),
        });
    }

    fn on_peer_joined(&mut self, _ctx: &mut SessionContext, peer: &Uuid) {
        self.events.push(Event::Joined(*peer));
    }

    fn on_peer_disconnected(&mut self, _ctx: &mut SessionContext, peer: &Uuid) {
        self.events.push(Event::Disconnected(*peer));
    }

    fn on_connect_result(
        &mut self,
        _ctx: &mut SessionContext,
        peer: &Uuid,
        accepted: bool,
        reason: ConnectResult,
    ) {
        self.events.push(Event::ConnectResult {
            peer: *peer,
            accepted,
            reason,
        });
    }

    fn on_query_result(&mut self, _ctx: &mut SessionContext, result: &QueryResult) {
        self.events.push(Event::QueryResult(result.clone()));
    }
}
