//! Reliable-delivery stress pair.
//!
//! `serve` accepts one peer and verifies that every `u32` in
//! `[0..10000)` arrives exactly once, packed 100 to a message; `run`
//! connects and sends them. Both sides can degrade their own link with
//! `--loss` to exercise retransmission.

use std::{
    thread,
    time::{Duration, Instant},
};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use tether_session::{
    ConnectResult, DatagramSocket, LinkConditionerConfig, Session, SessionConfig, SessionContext,
    SessionHandler, Uuid,
};

/// 100 messages of 100 little-endian u32 values each.
const MESSAGE_COUNT: u32 = 100;
const VALUES_PER_MESSAGE: u32 = 100;
const TOTAL_VALUES: u32 = MESSAGE_COUNT * VALUES_PER_MESSAGE;

#[derive(Parser)]
#[command(name = "tether-stress", about = "reliable delivery stress test")]
struct Args {
    /// Fraction of incoming datagrams to drop, e.g. 0.25
    #[arg(long, default_value_t = 0.0)]
    loss: f32,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Accept one peer and verify everything it sends
    Serve {
        /// Address to host on
        #[arg(long, default_value = "0.0.0.0:5000")]
        listen: String,
    },
    /// Connect to a server and send the full sequence
    Run {
        /// Server address, e.g. 127.0.0.1:5000
        server: String,

        /// Address to bind locally
        #[arg(long, default_value = "0.0.0.0:0")]
        listen: String,
    },
}

fn config(loss: f32) -> SessionConfig {
    SessionConfig {
        max_connections: 1,
        // room for the whole burst to sit in flight
        reliable_buffer_size: 64 * 1024,
        link_conditioner: (loss > 0.0).then(|| LinkConditionerConfig::new(loss)),
        ..SessionConfig::default()
    }
}

#[derive(Default)]
struct StressHandler {
    peer: Option<Uuid>,
    received: Vec<Vec<u8>>,
}

impl SessionHandler for StressHandler {
    fn on_message_received(&mut self, _ctx: &mut SessionContext, payload: &[u8], _peer: &Uuid) {
        self.received.push(payload.to_vec());
    }

    fn on_peer_joined(&mut self, _ctx: &mut SessionContext, peer: &Uuid) {
        if self.peer.is_none() {
            self.peer = Some(*peer);
            println!("connected to [{peer}]");
        }
    }

    fn on_peer_disconnected(&mut self, _ctx: &mut SessionContext, peer: &Uuid) {
        if self.peer == Some(*peer) {
            self.peer = None;
            println!("disconnected from [{peer}]");
        }
    }

    fn on_connect_result(
        &mut self,
        _ctx: &mut SessionContext,
        _peer: &Uuid,
        accepted: bool,
        reason: ConnectResult,
    ) {
        if !accepted {
            println!("connection refused: {reason:?}");
        }
    }
}

fn serve(listen: &str, loss: f32) -> anyhow::Result<()> {
    let mut session =
        Session::new(listen, config(loss)).context("could not create the session")?;
    println!("local id = {}", session.local_id());
    if let Some(addr) = session.local_addr() {
        println!("hosting on {addr}");
    }

    let mut handler = StressHandler::default();
    let mut seen = vec![false; TOTAL_VALUES as usize];
    let mut count: u32 = 0;

    loop {
        session.update(&mut handler);

        for payload in handler.received.drain(..) {
            if payload.len() != (VALUES_PER_MESSAGE * 4) as usize {
                bail!("payload of {} bytes, expected {}", payload.len(), VALUES_PER_MESSAGE * 4);
            }
            for chunk in payload.chunks_exact(4) {
                let value = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                if value >= TOTAL_VALUES {
                    bail!("value {value} out of range");
                }
                if seen[value as usize] {
                    bail!("value {value} delivered twice");
                }
                seen[value as usize] = true;
                count += 1;
            }
        }

        if count == TOTAL_VALUES {
            println!("success: all {TOTAL_VALUES} values arrived exactly once");
            return Ok(());
        }

        thread::sleep(Duration::from_millis(1));
    }
}

fn run(server: &str, listen: &str, loss: f32) -> anyhow::Result<()> {
    let server_addr = DatagramSocket::resolve(server).context("could not resolve the server")?;
    let mut session =
        Session::new(listen, config(loss)).context("could not create the session")?;
    println!("local id = {}", session.local_id());

    let mut handler = StressHandler::default();

    // the handshake itself can be lost; redial once a second
    let mut attempts_left = 4u32;
    let mut next_attempt = Instant::now();
    while handler.peer.is_none() {
        if Instant::now() >= next_attempt {
            if attempts_left == 0 {
                bail!("could not connect to {server_addr}");
            }
            println!("attempting to connect...");
            session.try_connect(&server_addr, 0);
            attempts_left -= 1;
            next_attempt = Instant::now() + Duration::from_secs(1);
        }
        session.update(&mut handler);
        thread::sleep(Duration::from_millis(1));
    }

    let Some(peer) = handler.peer else {
        bail!("peer vanished during the handshake");
    };
    println!(
        "sending {MESSAGE_COUNT} reliable messages of {VALUES_PER_MESSAGE} u32 values each"
    );

    for i in 0..MESSAGE_COUNT {
        let mut payload = Vec::with_capacity((VALUES_PER_MESSAGE * 4) as usize);
        for j in 0..VALUES_PER_MESSAGE {
            payload.extend_from_slice(&(i * VALUES_PER_MESSAGE + j).to_le_bytes());
        }
        session.send_reliable(&payload, &peer);
    }

    // keep the windows pumping until everything has been acknowledged
    // or the peer goes away
    let deadline = Instant::now() + Duration::from_secs(60);
    while handler.peer.is_some() && Instant::now() < deadline {
        session.update(&mut handler);
        thread::sleep(Duration::from_millis(1));
    }

    println!("done");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &args.command {
        Command::Serve { listen } => serve(listen, args.loss),
        Command::Run { server, listen } => run(server, listen, args.loss),
    }
}
