//! Reliable channel: exactly-once delivery of a large fan-in under
//! loss, order free.

use std::time::Duration;

use tether_session::{LinkConditionerConfig, SessionConfig};

use tether_test::helpers::{connect, fast_config, pump_until, TestPeer};

const MESSAGE_COUNT: u32 = 100;
const VALUES_PER_MESSAGE: u32 = 100;
const TOTAL_VALUES: u32 = MESSAGE_COUNT * VALUES_PER_MESSAGE;

fn lossy_config(loss: f32) -> SessionConfig {
    SessionConfig {
        // the whole burst sits in the ring while the window drains
        reliable_buffer_size: 64 * 1024,
        link_conditioner: (loss > 0.0).then(|| LinkConditionerConfig::new(loss)),
        ..fast_config()
    }
}

#[test]
fn reliable_fan_in_under_loss_is_exactly_once() {
    let mut a = TestPeer::new(lossy_config(0.25));
    let mut b = TestPeer::new(lossy_config(0.25));

    connect(&mut a, &mut b, 0);
    let b_id = b.id();

    // 100 messages of 100 consecutive u32 values each
    for i in 0..MESSAGE_COUNT {
        let mut payload = Vec::with_capacity((VALUES_PER_MESSAGE * 4) as usize);
        for j in 0..VALUES_PER_MESSAGE {
            payload.extend_from_slice(&(i * VALUES_PER_MESSAGE + j).to_le_bytes());
        }
        a.session.send_reliable(&payload, &b_id);
    }

    let delivered = pump_until(
        &mut [&mut a, &mut b],
        Duration::from_secs(60),
        |peers| peers[1].handler.messages().len() >= MESSAGE_COUNT as usize,
    );
    assert!(delivered, "reliable delivery did not finish in time");

    let mut seen = vec![false; TOTAL_VALUES as usize];
    for payload in b.handler.messages() {
        assert_eq!(payload.len(), (VALUES_PER_MESSAGE * 4) as usize);
        for chunk in payload.chunks_exact(4) {
            let value = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            assert!(value < TOTAL_VALUES, "value {value} out of range");
            assert!(!seen[value as usize], "value {value} delivered twice");
            seen[value as usize] = true;
        }
    }
    assert!(seen.iter().all(|&s| s), "some values never arrived");
}

#[test]
fn duplicate_datagrams_do_not_reach_the_handler_twice() {
    let mut a = TestPeer::new(fast_config());
    let mut b = TestPeer::new(fast_config());

    connect(&mut a, &mut b, 0);
    let b_id = b.id();

    // with an instant link and a hot resend timer, retransmissions of
    // already-delivered messages are common; none may surface twice
    for i in 0..32u8 {
        a.session.send_reliable(&[i], &b_id);
    }

    let delivered = pump_until(
        &mut [&mut a, &mut b],
        Duration::from_secs(30),
        |peers| peers[1].handler.messages().len() >= 32,
    );
    assert!(delivered);

    // give any stray retransmissions time to arrive, then recount
    std::thread::sleep(Duration::from_millis(50));
    b.tick();

    let mut payloads: Vec<u8> = b
        .handler
        .messages()
        .iter()
        .map(|message| message[0])
        .collect();
    payloads.sort_unstable();
    let expected: Vec<u8> = (0..32).collect();
    assert_eq!(payloads, expected);
}

#[test]
fn oversize_sends_are_refused_silently() {
    let mut a = TestPeer::new(fast_config());
    let mut b = TestPeer::new(fast_config());

    connect(&mut a, &mut b, 0);
    let b_id = b.id();

    // exceeds the MTU budget once any mode's header is added
    let oversize = vec![0u8; 798];
    a.session.send_reliable(&oversize, &b_id);
    a.session.send_stream(&oversize, &b_id);
    a.session.send_unreliable(&vec![0u8; 800], &b_id);

    // a payload that exactly fits still goes through
    let exact = vec![0xEEu8; 800 - 5];
    a.session.send_reliable(&exact, &b_id);

    let delivered = pump_until(
        &mut [&mut a, &mut b],
        Duration::from_secs(10),
        |peers| !peers[1].handler.messages().is_empty(),
    );
    assert!(delivered);

    let messages = b.handler.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0], exact.as_slice());
}

#[test]
fn unreliable_payloads_pass_straight_through() {
    let mut a = TestPeer::new(fast_config());
    let mut b = TestPeer::new(fast_config());

    connect(&mut a, &mut b, 0);
    let b_id = b.id();

    a.session.send_unreliable(b"fire and forget", &b_id);

    let delivered = pump_until(
        &mut [&mut a, &mut b],
        Duration::from_secs(10),
        |peers| !peers[1].handler.messages().is_empty(),
    );
    assert!(delivered);
    assert_eq!(b.handler.messages()[0], b"fire and forget");
}
