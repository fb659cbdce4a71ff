//! Interactive chat peer.
//!
//! Every instance is simultaneously a host and a client: it accepts
//! connections on its listen port and can dial out with `/connect`.
//! Plain input lines are fanned out to every connected peer over the
//! reliable channel.

use std::{
    io::BufRead,
    sync::mpsc::{self, Receiver},
    thread,
    time::{Duration, Instant},
};

use anyhow::Context;
use clap::Parser;

use tether_session::{
    ConnectResult, DatagramSocket, QueryResult, Session, SessionConfig, SessionContext,
    SessionHandler, Uuid,
};

#[derive(Parser)]
#[command(name = "tether-chat", about = "peer-to-peer chat over tether-session")]
struct Args {
    /// Address to host on, e.g. 0.0.0.0:5000 (port 0 for ephemeral)
    #[arg(long, default_value = "0.0.0.0:0")]
    listen: String,

    /// Password peers must present to join us (0 = open)
    #[arg(long, default_value_t = 0)]
    password: u32,

    /// Most peers we will accept
    #[arg(long, default_value_t = 8)]
    max_peers: u32,

    /// Immediately connect to this address on startup
    #[arg(long)]
    connect: Option<String>,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

struct ChatHandler {
    peers: Vec<Uuid>,
}

impl SessionHandler for ChatHandler {
    fn on_message_received(&mut self, _ctx: &mut SessionContext, payload: &[u8], peer: &Uuid) {
        println!("[{peer}] {}", String::from_utf8_lossy(payload));
    }

    fn on_peer_joined(&mut self, _ctx: &mut SessionContext, peer: &Uuid) {
        self.peers.push(*peer);
        println!("[{peer}] joined");
    }

    fn on_peer_disconnected(&mut self, _ctx: &mut SessionContext, peer: &Uuid) {
        self.peers.retain(|known| known != peer);
        println!("[{peer}] disconnected");
    }

    fn on_connect_result(
        &mut self,
        _ctx: &mut SessionContext,
        peer: &Uuid,
        accepted: bool,
        reason: ConnectResult,
    ) {
        if accepted {
            println!("connected to [{peer}]");
        } else {
            println!("connection refused: {reason:?}");
        }
    }

    fn on_query_result(&mut self, _ctx: &mut SessionContext, result: &QueryResult) {
        println!("query result from {}:", result.endpoint);
        println!("  protocol_matches: {}", result.protocol_matches);
        println!("  has_password:     {}", result.has_password);
        println!(
            "  connections:      {}/{}",
            result.connections, result.max_connections
        );
    }
}

/// An outstanding `/connect` that is retried until a new peer joins.
struct PendingConnect {
    addr: std::net::SocketAddr,
    password: u32,
    attempts_left: u32,
    next_attempt: Instant,
    peers_before: usize,
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if sender.send(line).is_err() {
                break;
            }
        }
    });
    receiver
}

fn print_help() {
    println!("commands:");
    println!("  /help             print this menu");
    println!("  /connect <addr> [password]");
    println!("  /query <addr>     ask a host about its status");
    println!("  /peers            list connected peers");
    println!("  /disconnect       leave every connected peer");
    println!("  /quit             exit");
    println!("  anything else is sent to every connected peer");
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut session = Session::new(
        &args.listen,
        SessionConfig {
            password: args.password,
            max_connections: args.max_peers,
            ..SessionConfig::default()
        },
    )
    .context("could not create the session")?;

    println!("local id = {}", session.local_id());
    if let Some(addr) = session.local_addr() {
        println!("hosting on {addr}");
    }
    print_help();

    let mut handler = ChatHandler { peers: Vec::new() };
    let mut pending: Option<PendingConnect> = None;

    if let Some(target) = &args.connect {
        let addr = DatagramSocket::resolve(target).context("could not resolve --connect")?;
        pending = Some(PendingConnect {
            addr,
            password: 0,
            attempts_left: 4,
            next_attempt: Instant::now(),
            peers_before: 0,
        });
    }

    let input = spawn_stdin_reader();

    loop {
        session.update(&mut handler);

        // connection requests are not retried by the protocol; redial
        // once a second until someone answers
        let finished = if let Some(attempt) = &mut pending {
            if handler.peers.len() > attempt.peers_before {
                true
            } else if attempt.attempts_left == 0 {
                println!("giving up on {}", attempt.addr);
                true
            } else {
                if Instant::now() >= attempt.next_attempt {
                    println!("attempting to connect to {}...", attempt.addr);
                    session.try_connect(&attempt.addr, attempt.password);
                    attempt.attempts_left -= 1;
                    attempt.next_attempt = Instant::now() + Duration::from_secs(1);
                }
                false
            }
        } else {
            false
        };
        if finished {
            pending = None;
        }

        match input.try_recv() {
            Ok(line) => {
                let line = line.trim().to_owned();
                if line.is_empty() {
                    continue;
                }

                let mut words = line.split_whitespace();
                match words.next() {
                    Some("/help") | Some("?") => print_help(),
                    Some("/quit") | Some("/exit") => break,
                    Some("/peers") => {
                        for peer in &handler.peers {
                            println!("  {peer}");
                        }
                    }
                    Some("/disconnect") => {
                        for peer in handler.peers.clone() {
                            session.disconnect(&peer);
                            handler.peers.retain(|known| *known != peer);
                        }
                    }
                    Some("/connect") => match words.next().map(DatagramSocket::resolve) {
                        Some(Ok(addr)) => {
                            let password = words
                                .next()
                                .and_then(|word| word.parse().ok())
                                .unwrap_or(0);
                            pending = Some(PendingConnect {
                                addr,
                                password,
                                attempts_left: 4,
                                next_attempt: Instant::now(),
                                peers_before: handler.peers.len(),
                            });
                        }
                        Some(Err(error)) => println!("bad address: {error}"),
                        None => println!("usage: /connect <addr> [password]"),
                    },
                    Some("/query") => match words.next().map(DatagramSocket::resolve) {
                        Some(Ok(addr)) => session.query(&addr),
                        Some(Err(error)) => println!("bad address: {error}"),
                        None => println!("usage: /query <addr>"),
                    },
                    _ => {
                        for peer in &handler.peers {
                            session.send_reliable(line.as_bytes(), peer);
                        }
                    }
                }
            }
            Err(mpsc::TryRecvError::Empty) => {}
            Err(mpsc::TryRecvError::Disconnected) => break,
        }

        thread::sleep(Duration::from_millis(1));
    }

    println!("terminating...");
    Ok(())
}
