use std::{
    net::SocketAddr,
    sync::Once,
    thread,
    time::{Duration, Instant},
};

use tether_session::{Session, SessionConfig, Uuid};

use super::RecordingHandler;

static LOGGING: Once = Once::new();

/// Route the library's `log` records through a tracing subscriber;
/// `RUST_LOG=tether_session=debug` makes a failing scenario narrate
/// itself.
fn init_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Protocol timings shrunk so scenarios finish in test time rather
/// than wall-clock time.
pub fn fast_config() -> SessionConfig {
    SessionConfig {
        resend_interval: Duration::from_millis(5),
        ping_interval: Duration::from_millis(50),
        timeout_interval: Duration::from_millis(500),
        ..SessionConfig::default()
    }
}

/// One session bound to an ephemeral loopback port, plus its recorded
/// event log.
pub struct TestPeer {
    pub session: Session,
    pub handler: RecordingHandler,
}

impl TestPeer {
    pub fn new(config: SessionConfig) -> Self {
        init_logging();
        let session = Session::new("127.0.0.1:0", config).expect("loopback bind cannot fail");
        Self {
            session,
            handler: RecordingHandler::new(),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.session.local_addr().expect("bound socket has an address")
    }

    pub fn id(&self) -> Uuid {
        self.session.local_id()
    }

    pub fn tick(&mut self) {
        self.session.update(&mut self.handler);
    }
}

/// Drive every peer until `done` returns true or the timeout passes.
/// Returns whether the condition was met.
pub fn pump_until(
    peers: &mut [&mut TestPeer],
    timeout: Duration,
    mut done: impl FnMut(&[&mut TestPeer]) -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        for peer in peers.iter_mut() {
            peer.tick();
        }
        if done(peers) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_micros(500));
    }
}

/// Drive every peer for a fixed duration.
pub fn pump_for(peers: &mut [&mut TestPeer], duration: Duration) {
    pump_until(peers, duration, |_| false);
}

/// Establish a connection from `a` to `b`, retrying the request until
/// both sides report a new join.
pub fn connect(a: &mut TestPeer, b: &mut TestPeer, password: u32) {
    let b_addr = b.addr();
    let a_baseline = a.handler.joined().len();
    let b_baseline = b.handler.joined().len();
    let mut last_request = Instant::now() - Duration::from_secs(1);

    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if Instant::now() - last_request >= Duration::from_millis(200) {
            a.session.try_connect(&b_addr, password);
            last_request = Instant::now();
        }
        a.tick();
        b.tick();
        if a.handler.joined().len() > a_baseline && b.handler.joined().len() > b_baseline {
            return;
        }
        thread::sleep(Duration::from_micros(500));
    }
    panic!("handshake did not complete in time");
}
