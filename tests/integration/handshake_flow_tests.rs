//! Configuration handshake and inbound command handling.

use crate::mock_hw::{Server, Station, config_json};

use solarstation::app::events::AppEvent;
use solarstation::error::ParseError;
use solarstation::fsm::StateId;
use solarstation::protocol;
use solarstation::publisher::AckKind;

/// Announce `ON`, have it acknowledged, and leave the server silent.
fn announced() -> Station {
    let mut st = Station::new(1000);
    st.server = Server::Silent;
    st.step();
    assert_eq!(st.broker.count_kind(AckKind::OnState), 1);
    st.ack(AckKind::OnState);
    st
}

#[test]
fn keeps_announcing_on_until_configured() {
    let mut st = Station::new(1000);
    // ON is acknowledged but no handshake ever arrives.
    for _ in 0..50 {
        st.step();
    }
    assert!(st.broker.count_kind(AckKind::OnState) >= 4);
    assert!(
        st.broker
            .published
            .iter()
            .all(|p| p.topic == protocol::POWER_TOPIC)
    );
    assert_eq!(st.ctl.state(), StateId::Idle);
    assert!(!st.hw.pump_ever_on());
}

#[test]
fn first_handshake_applies_credit_once() {
    let mut st = announced();
    let before = st.ctl.context().acks.attempts();
    assert_eq!(before, 1);

    st.deliver(protocol::CONFIG_TOPIC, &config_json(false, true, 5, 10)).unwrap();
    assert_eq!(st.ctl.context().acks.attempts(), before - 6);

    // QoS 1 redelivery after a reconnect: same cycle, no new credit.
    st.deliver(protocol::CONFIG_TOPIC, &config_json(false, true, 5, 10)).unwrap();
    assert_eq!(st.ctl.context().acks.attempts(), before - 6);

    assert!(st.sink.events.contains(&AppEvent::HandshakeApplied {
        upload_mode: false,
        pump_requested: true,
        fresh: true,
    }));
    assert!(st.sink.events.contains(&AppEvent::HandshakeApplied {
        upload_mode: false,
        pump_requested: true,
        fresh: false,
    }));
}

#[test]
fn idle_credit_is_smaller() {
    let mut st = announced();
    st.deliver(protocol::CONFIG_TOPIC, &config_json(false, false, 0, 10)).unwrap();
    assert_eq!(st.ctl.context().acks.attempts(), 1 - 4);
}

#[test]
fn handshake_restarts_resend_windows() {
    let mut st = announced();
    let t0 = st.now();
    st.deliver(protocol::CONFIG_TOPIC, &config_json(false, false, 0, 10)).unwrap();

    // Inactive path wants PUMP OFF, but the window restarted at the handshake.
    while st.now() < t0 + 900 {
        st.step();
    }
    assert_eq!(st.broker.count_kind(AckKind::PumpOff), 0);

    // Redelivery restarts every window again.
    let t1 = st.now();
    st.deliver(protocol::CONFIG_TOPIC, &config_json(false, false, 0, 10)).unwrap();
    while st.broker.count_kind(AckKind::PumpOff) == 0 {
        st.step();
        assert!(st.now() < t1 + 5_000);
    }
    let sent = st.broker.on(protocol::PUMP_POWER_TOPIC)[0].at_ms;
    assert!(sent > t1 + 1_000, "sent at {sent}, redelivered at {t1}");
}

#[test]
fn redelivery_does_not_restart_pump_timer() {
    let mut st = Station::new(1000);
    st.handshake = Some(config_json(false, true, 5, 10));
    while !st.hw.pump {
        st.step();
    }
    for _ in 0..20 {
        st.step();
    }
    st.deliver(protocol::CONFIG_TOPIC, &config_json(false, true, 5, 10)).unwrap();
    assert!(st.run_until_asleep(60_000));
    assert_eq!(st.hw.pump_on_ms(), 5_000);
}

#[test]
fn first_handshake_clears_stale_acks() {
    let mut st = announced();
    // An ack left over from before the handshake must not count.
    st.ack(AckKind::SensorState);
    st.deliver(protocol::CONFIG_TOPIC, &config_json(false, true, 5, 10)).unwrap();
    assert!(!st.ctl.context().acks.is_acked(AckKind::SensorState));
    assert!(st.ctl.context().acks.is_acked(AckKind::OnState));

    st.server = Server::AckAll;
    assert!(st.run_until_asleep(60_000));
    let first_state = st.broker.on(protocol::STATE_TOPIC)[0].at_ms;
    let pump_on = st.broker.on(protocol::PUMP_POWER_TOPIC)[0].at_ms;
    assert!(first_state < pump_on);
}

#[test]
fn malformed_config_keeps_previous() {
    let mut st = announced();
    st.deliver(protocol::CONFIG_TOPIC, &config_json(false, false, 0, 10)).unwrap();
    let before = st.ctl.config().clone();

    let err = st.deliver(protocol::CONFIG_TOPIC, br#"{"upload_mode":"ON"}"#);
    assert_eq!(err, Err(ParseError::Malformed("pump_active")));
    assert_eq!(st.ctl.config(), &before);
    assert!(!st.ctl.upload_mode());
    assert!(
        st.sink
            .events
            .contains(&AppEvent::HandshakeRejected(ParseError::Malformed("pump_active")))
    );
}

#[test]
fn malformed_first_config_is_not_a_handshake() {
    let mut st = announced();
    assert!(st.deliver(protocol::CONFIG_TOPIC, b"{not json").is_err());
    assert!(!st.ctl.config_received());
    assert_eq!(st.ctl.context().acks.attempts(), 1);

    st.step();
    st.step();
    assert_eq!(st.ctl.state(), StateId::Idle);
    assert_eq!(st.broker.count_kind(AckKind::PumpOff), 0);
}

#[test]
fn duplicate_acks_are_idempotent() {
    let mut st = announced();
    st.ack(AckKind::OnState);
    st.ack(AckKind::OnState);
    let n = st.sink.count(|e| matches!(e, AppEvent::AckReceived(AckKind::OnState)));
    assert_eq!(n, 1);
}

#[test]
fn ack_accepts_json_and_ignores_unknown_tokens() {
    let mut st = announced();
    st.deliver(protocol::ACK_TOPIC, br#"{"value":"sendSensorState"}"#).unwrap();
    assert!(st.ctl.context().acks.is_acked(AckKind::SensorState));

    let events = st.sink.events.len();
    st.deliver(protocol::ACK_TOPIC, b"sendSomethingElse").unwrap();
    st.deliver("cmnd/other/TOPIC", b"ON").unwrap();
    assert_eq!(st.sink.events.len(), events);
}

#[test]
fn upload_mode_command_overrides_without_touching_config() {
    let mut st = announced();
    st.deliver(protocol::CONFIG_TOPIC, &config_json(false, false, 0, 10)).unwrap();
    let received = st.ctl.config().clone();

    st.deliver(protocol::UPLOAD_MODE_TOPIC, br#"{"state":"ON"}"#).unwrap();
    assert!(st.ctl.upload_mode());
    assert!(st.sink.events.contains(&AppEvent::UploadMode(true)));
    assert_eq!(st.ctl.config(), &received);

    st.deliver(protocol::UPLOAD_MODE_TOPIC, b"OFF").unwrap();
    assert!(!st.ctl.upload_mode());
}

#[test]
fn redelivered_handshake_restores_upload_mode() {
    let mut st = announced();
    st.deliver(protocol::CONFIG_TOPIC, &config_json(false, false, 0, 10)).unwrap();
    st.deliver(protocol::UPLOAD_MODE_TOPIC, b"ON").unwrap();
    st.deliver(protocol::CONFIG_TOPIC, &config_json(false, false, 0, 10)).unwrap();
    assert!(!st.ctl.upload_mode());
}

#[test]
fn pump_active_command_replaces_intent() {
    let mut st = announced();
    st.deliver(protocol::CONFIG_TOPIC, &config_json(false, false, 0, 10)).unwrap();
    assert!(!st.ctl.context().pump.activation_intent);
    st.deliver(protocol::PUMP_ACTIVE_CMND_TOPIC, b"ON").unwrap();
    assert!(st.ctl.context().pump.activation_intent);
    assert!(!st.ctl.config().pump_activation_requested);
}

#[test]
fn redelivered_handshake_keeps_latched_pump_cutoff() {
    let mut st = Station::new(850);
    st.server = Server::AckAllBut(&[AckKind::SensorState]);
    st.handshake = Some(config_json(false, true, 5, 10));
    for _ in 0..30 {
        st.step();
    }
    assert_eq!(st.ctl.state(), StateId::Inactive);
    assert!(st.ctl.battery().pump_cutoff);

    // The cell recovers and the broker redelivers the config.
    st.hw.battery_raw = 1000;
    st.deliver(protocol::CONFIG_TOPIC, &config_json(false, true, 5, 10)).unwrap();
    assert!(st.ctl.battery().pump_cutoff);
    assert_eq!(st.ctl.battery().raw_level, 1000);

    st.server = Server::AckAll;
    assert!(st.run_until_asleep(60_000));
    assert!(!st.hw.pump_ever_on());
    assert_eq!(st.broker.count_kind(AckKind::PumpOn), 0);
}
