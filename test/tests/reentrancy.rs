//! Handler re-entrancy: callbacks may send and disconnect through the
//! context they are handed, mid-update.

use std::time::{Duration, Instant};

use tether_session::{Session, SessionContext, SessionHandler, Uuid};

use tether_test::helpers::{fast_config, pump_until, TestPeer};

/// Replies to every message from inside the callback.
#[derive(Default)]
struct EchoHandler {
    received: Vec<Vec<u8>>,
}

impl SessionHandler for EchoHandler {
    fn on_message_received(&mut self, ctx: &mut SessionContext, payload: &[u8], peer: &Uuid) {
        self.received.push(payload.to_vec());
        let mut reply = b"echo:".to_vec();
        reply.extend_from_slice(payload);
        ctx.send_reliable(&reply, peer);
    }
}

/// Greets joiners from inside the callback, then kicks them on their
/// first message.
#[derive(Default)]
struct BouncerHandler {
    kicked: Vec<Uuid>,
}

impl SessionHandler for BouncerHandler {
    fn on_peer_joined(&mut self, ctx: &mut SessionContext, peer: &Uuid) {
        ctx.send_reliable(b"welcome", peer);
    }

    fn on_message_received(&mut self, ctx: &mut SessionContext, _payload: &[u8], peer: &Uuid) {
        self.kicked.push(*peer);
        ctx.disconnect(peer);
    }
}

fn drive(session: &mut Session, handler: &mut impl SessionHandler, duration: Duration) {
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        session.update(handler);
        std::thread::sleep(Duration::from_micros(500));
    }
}

#[test]
fn replies_sent_from_inside_callbacks_arrive() {
    let mut a = TestPeer::new(fast_config());
    let mut echo_session = Session::new("127.0.0.1:0", fast_config()).expect("bind");
    let mut echo = EchoHandler::default();

    // handshake: drive a with its recorder and the echo side manually
    let echo_addr = echo_session.local_addr().expect("bound");
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut last_request = Instant::now() - Duration::from_secs(1);
    while a.handler.joined().is_empty() {
        assert!(Instant::now() < deadline, "handshake failed");
        if Instant::now() - last_request >= Duration::from_millis(200) {
            a.session.try_connect(&echo_addr, 0);
            last_request = Instant::now();
        }
        a.tick();
        echo_session.update(&mut echo);
        std::thread::sleep(Duration::from_micros(500));
    }

    let echo_id = a.handler.joined()[0];
    a.session.send_reliable(b"marco", &echo_id);

    let deadline = Instant::now() + Duration::from_secs(10);
    while a.handler.messages().is_empty() {
        assert!(Instant::now() < deadline, "no echo arrived");
        a.tick();
        echo_session.update(&mut echo);
        std::thread::sleep(Duration::from_micros(500));
    }

    assert_eq!(echo.received, vec![b"marco".to_vec()]);
    assert_eq!(a.handler.messages()[0], b"echo:marco");
}

#[test]
fn disconnecting_from_inside_a_callback_is_safe() {
    let mut visitor = TestPeer::new(fast_config());
    let mut bouncer_session = Session::new("127.0.0.1:0", fast_config()).expect("bind");
    let mut bouncer = BouncerHandler::default();

    let bouncer_addr = bouncer_session.local_addr().expect("bound");
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut last_request = Instant::now() - Duration::from_secs(1);
    while visitor.handler.joined().is_empty() {
        assert!(Instant::now() < deadline, "handshake failed");
        if Instant::now() - last_request >= Duration::from_millis(200) {
            visitor.session.try_connect(&bouncer_addr, 0);
            last_request = Instant::now();
        }
        visitor.tick();
        bouncer_session.update(&mut bouncer);
        std::thread::sleep(Duration::from_micros(500));
    }

    let bouncer_id = visitor.handler.joined()[0];
    visitor.session.send_reliable(b"let me stay", &bouncer_id);

    let deadline = Instant::now() + Duration::from_secs(10);
    while bouncer.kicked.is_empty() {
        assert!(Instant::now() < deadline, "the bouncer never acted");
        visitor.tick();
        bouncer_session.update(&mut bouncer);
        std::thread::sleep(Duration::from_micros(500));
    }

    // the kick happened mid-update without disturbing the session; the
    // connection is gone on the bouncer's side
    drive(&mut bouncer_session, &mut bouncer, Duration::from_millis(50));
    assert_eq!(bouncer_session.connection_count(), 0);

    // the visitor hears the goodbye frame and reports the peer gone
    let notified = pump_until(
        &mut [&mut visitor],
        Duration::from_secs(5),
        |peers| !peers[0].handler.disconnected().is_empty(),
    );
    assert!(notified);
    assert_eq!(visitor.handler.disconnected(), vec![bouncer_id]);
}
