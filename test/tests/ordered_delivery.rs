//! Stream channel: exact send-order delivery, with and without loss.

use std::time::Duration;

use tether_session::{LinkConditionerConfig, SessionConfig};

use tether_test::helpers::{connect, fast_config, pump_until, TestPeer};

const MESSAGE_COUNT: usize = 300;

fn run_ordered_scenario(loss: f32) {
    let config = SessionConfig {
        link_conditioner: (loss > 0.0).then(|| LinkConditionerConfig::new(loss)),
        ..fast_config()
    };

    let mut a = TestPeer::new(config.clone());
    let mut b = TestPeer::new(config);

    // the handshake itself must survive the loss; peers keep their
    // conditioners from the start
    connect(&mut a, &mut b, 0);
    let b_id = b.id();

    for i in 0..MESSAGE_COUNT {
        a.session.send_stream(i.to_string().as_bytes(), &b_id);
    }

    let delivered = pump_until(
        &mut [&mut a, &mut b],
        Duration::from_secs(60),
        |peers| peers[1].handler.messages().len() >= MESSAGE_COUNT,
    );
    assert!(delivered, "stream delivery did not finish in time");

    let messages = b.handler.messages();
    assert_eq!(messages.len(), MESSAGE_COUNT);
    for (i, message) in messages.iter().enumerate() {
        assert_eq!(
            *message,
            i.to_string().as_bytes(),
            "message {i} out of order"
        );
    }
}

#[test]
fn ordered_delivery_on_a_clean_link() {
    run_ordered_scenario(0.0);
}

#[test]
fn ordered_delivery_survives_heavy_loss() {
    run_ordered_scenario(0.25);
}

#[test]
fn interleaved_modes_do_not_disturb_stream_order() {
    let mut a = TestPeer::new(fast_config());
    let mut b = TestPeer::new(fast_config());

    connect(&mut a, &mut b, 0);
    let b_id = b.id();

    for i in 0..50usize {
        a.session.send_stream(format!("s{i}").as_bytes(), &b_id);
        a.session.send_reliable(format!("r{i}").as_bytes(), &b_id);
    }

    let delivered = pump_until(
        &mut [&mut a, &mut b],
        Duration::from_secs(30),
        |peers| peers[1].handler.messages().len() >= 100,
    );
    assert!(delivered);

    // stream messages arrive in order relative to each other no matter
    // how the reliable channel interleaves
    let stream_only: Vec<_> = b
        .handler
        .messages()
        .into_iter()
        .filter(|message| message.first() == Some(&b's'))
        .collect();
    let expected: Vec<Vec<u8>> = (0..50).map(|i| format!("s{i}").into_bytes()).collect();
    assert_eq!(stream_only, expected);
}
