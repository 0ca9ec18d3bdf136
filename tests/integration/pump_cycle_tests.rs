//! Full wake cycles: announce, handshake, optional pump run, sleep.

use crate::mock_hw::{Server, Station, TICK_MS, config_json};

use solarstation::app::events::AppEvent;
use solarstation::error::ShutdownCause;
use solarstation::fsm::StateId;
use solarstation::power::SleepMode;
use solarstation::protocol;
use solarstation::publisher::AckKind;

fn station(pump: bool, pump_seconds: u32, sleep_minutes: u32) -> Station {
    let mut st = Station::new(1000);
    st.handshake = Some(config_json(false, pump, pump_seconds, sleep_minutes));
    st
}

// ── Happy path ────────────────────────────────────────────────

#[test]
fn five_second_run_then_ten_minute_sleep() {
    let mut st = station(true, 5, 10);

    assert!(st.run_until_asleep(60_000), "cycle should end within a minute");
    assert_eq!(st.hw.sleeps, vec![SleepMode::Timed { duration_us: 600_000_000 }]);
    assert_eq!(st.hw.pump_on_ms(), 5_000, "pump must run exactly the requested time");
    assert!(!st.hw.pump, "relay released before sleep");
    assert!(!st.hw.led);
    assert_eq!(st.hw.settles, vec![1_000]);
}

#[test]
fn run_follows_announcement_order() {
    let mut st = station(true, 5, 10);
    assert!(st.run_until_asleep(60_000));

    let kinds: Vec<AckKind> = st
        .broker
        .published
        .iter()
        .filter(|p| p.topic != protocol::STATE_TOPIC)
        .filter_map(|p| p.ack_kind())
        .collect();
    assert_eq!(
        kinds,
        vec![
            AckKind::OnState,
            AckKind::PumpOn,
            AckKind::PumpOff,
            AckKind::PumpActiveOff,
            AckKind::OffState,
        ]
    );

    // Telemetry is acknowledged before the pump is even announced.
    let first_state = st.broker.on(protocol::STATE_TOPIC)[0].at_ms;
    let pump_on_sent = st.broker.on(protocol::PUMP_POWER_TOPIC)[0].at_ms;
    assert!(first_state < pump_on_sent);

    // The relay only closes after the pump-on announcement was answered.
    let (relay_on_at, _) = st.hw.pump_edges[0];
    assert!(relay_on_at > pump_on_sent);
}

#[test]
fn running_telemetry_counts_down() {
    let mut st = station(true, 5, 10);
    assert!(st.run_until_asleep(60_000));

    let remaining: Vec<i64> = st
        .broker
        .on(protocol::STATE_TOPIC)
        .iter()
        .map(|p| p.json()["remaining_seconds"].as_i64().unwrap())
        .collect();
    assert_eq!(remaining, vec![5, 4, 3, 2, 1]);

    let frame = st.broker.on(protocol::STATE_TOPIC)[0].json();
    assert_eq!(frame["Whoami"], "solarstation-test");
    assert_eq!(frame["battery"], 1000);
    assert_eq!(frame["time"], "2024-06-01T06:00:00");
}

#[test]
fn power_payloads_carry_attempt_counter() {
    let mut st = station(true, 5, 10);
    assert!(st.run_until_asleep(60_000));

    let power = st.broker.on(protocol::POWER_TOPIC);
    assert_eq!(power.first().unwrap().text(), r#"{"state":"ON","number_of_attemps":0}"#);
    // One send per message, all covered by the handshake credit.
    assert_eq!(power.last().unwrap().json()["number_of_attemps"], 0);
    assert_eq!(st.ctl.context().acks.attempts(), 0);
}

#[test]
fn no_pump_request_sleeps_without_running() {
    let mut st = station(false, 5, 30);
    assert!(st.run_until_asleep(60_000));

    assert!(!st.hw.pump_ever_on());
    assert_eq!(st.broker.count_kind(AckKind::PumpOn), 0);
    assert_eq!(st.broker.count_kind(AckKind::PumpOff), 1);
    assert_eq!(st.broker.count_kind(AckKind::SensorState), 1);
    assert_eq!(st.hw.sleeps, vec![SleepMode::Timed { duration_us: 1_800_000_000 }]);
}

#[test]
fn seventy_minutes_means_sleep_forever() {
    let mut st = station(false, 0, 70);
    assert!(st.run_until_asleep(60_000));
    assert_eq!(st.hw.sleeps, vec![SleepMode::Indefinite]);
    assert_eq!(st.ctl.sleep_mode(), Some(SleepMode::Indefinite));
}

#[test]
fn sleep_waits_for_off_acknowledgment() {
    let mut st = station(false, 0, 10);
    st.server = Server::AckAllBut(&[AckKind::OffState]);

    // Long enough to resend OFF a few times, short of the retry budget.
    assert!(!st.run_until_asleep(5_000));
    assert!(st.broker.count_kind(AckKind::OffState) >= 2);
    assert_eq!(st.ctl.state(), StateId::Done);

    st.ack(AckKind::OffState);
    st.step();
    assert!(st.ctl.is_asleep());
}

// ── Cancellation ──────────────────────────────────────────────

#[test]
fn pump_active_off_stops_a_run_early() {
    let mut st = station(true, 60, 10);
    while !st.hw.pump {
        st.step();
        assert!(st.now() < 10_000, "pump should have started");
    }
    for _ in 0..20 {
        st.step();
    }
    st.deliver(protocol::PUMP_ACTIVE_CMND_TOPIC, b"OFF").unwrap();
    st.step();
    assert!(!st.hw.pump);
    assert!(matches!(
        st.ctl.state(),
        StateId::Deactivating | StateId::ConfirmingDeactivated
    ));

    assert!(st.run_until_asleep(30_000));
    assert!(st.hw.pump_on_ms() < 3_000);
}

// ── Retry budget ──────────────────────────────────────────────

#[test]
fn unanswered_pump_off_exhausts_budget_with_relay_open() {
    let mut st = station(true, 5, 10);
    st.server = Server::AckAllBut(&[AckKind::PumpOff]);

    assert!(st.run_until_asleep(200_000));
    assert!(
        st.sink
            .events
            .contains(&AppEvent::ForcedShutdown(ShutdownCause::RetryBudgetExhausted))
    );
    assert_eq!(st.hw.pump_on_ms(), 5_000);
    assert!(!st.hw.pump);
    // Attempts run from -3 (after the pump-on send) up to the ceiling of 50.
    assert_eq!(st.broker.count_kind(AckKind::PumpOff), 53);
    // Forced shutdown does not wait for the OFF acknowledgment.
    assert_eq!(st.broker.count_kind(AckKind::OffState), 0);
    assert_eq!(st.hw.sleeps, vec![SleepMode::Timed { duration_us: 600_000_000 }]);
}

#[test]
fn silent_server_exhausts_budget_announcing_on() {
    let mut st = station(true, 5, 10);
    st.server = Server::Silent;

    assert!(st.run_until_asleep(200_000));
    assert_eq!(st.broker.count_kind(AckKind::OnState), 50);
    assert!(!st.hw.pump_ever_on());
    assert!(!st.ctl.config_received());
}

#[test]
fn resends_are_spaced_by_the_resend_interval() {
    let mut st = station(true, 5, 10);
    st.server = Server::Silent;
    for _ in 0..60 {
        st.step();
    }
    let times: Vec<u64> = st.broker.on(protocol::POWER_TOPIC).iter().map(|p| p.at_ms).collect();
    assert!(times.len() >= 5);
    for pair in times.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap > 1_000 && gap <= 1_000 + TICK_MS, "gap {gap}");
    }
}

// ── Lifecycle ─────────────────────────────────────────────────

#[test]
fn asleep_controller_ignores_ticks_and_messages() {
    let mut st = station(false, 0, 10);
    assert!(st.run_until_asleep(60_000));
    let published = st.broker.published.len();

    for _ in 0..30 {
        st.step();
    }
    st.deliver(protocol::UPLOAD_MODE_TOPIC, b"ON").unwrap();
    assert_eq!(st.broker.published.len(), published);
    assert_eq!(st.hw.sleeps.len(), 1);
    assert!(!st.ctl.upload_mode());
}

#[test]
fn wake_starts_a_fresh_cycle() {
    let mut st = station(true, 5, 10);
    assert!(st.run_until_asleep(60_000));

    st.ctl.wake(&mut st.hw, &mut st.sink);
    assert!(!st.ctl.is_asleep());
    assert!(!st.ctl.config_received());
    assert_eq!(st.ctl.state(), StateId::Idle);
    assert_eq!(st.ctl.context().acks.attempts(), 0);
    assert!(AckKind::ALL.iter().all(|&k| !st.ctl.context().acks.is_acked(k)));

    let before = st.broker.count_kind(AckKind::OnState);
    assert!(st.run_until_asleep(60_000));
    assert_eq!(st.broker.count_kind(AckKind::OnState), before + 1);
    assert_eq!(st.hw.sleeps.len(), 2);
    assert_eq!(st.hw.pump_on_ms(), 10_000);
}

// ── Upload mode toggled inside a pump cycle ───────────────────

#[test]
fn upload_toggle_after_run_does_not_restart_pump() {
    let mut st = station(true, 5, 10);
    // Withholding the OFF ack keeps the cycle awake in Done.
    st.server = Server::AckAllBut(&[AckKind::OffState]);
    while st.ctl.state() != StateId::Done {
        st.step();
        assert!(st.now() < 30_000, "run should finish");
    }
    assert_eq!(st.hw.pump_edges.len(), 2);

    st.deliver(protocol::UPLOAD_MODE_TOPIC, b"ON").unwrap();
    st.step();
    st.deliver(protocol::UPLOAD_MODE_TOPIC, b"OFF").unwrap();
    for _ in 0..100 {
        st.step();
    }

    assert_eq!(st.ctl.state(), StateId::Done);
    assert_eq!(st.hw.pump_edges.len(), 2, "relay energised a second time");
    assert_eq!(st.hw.pump_on_ms(), 5_000);
    assert_eq!(st.broker.count_kind(AckKind::PumpOn), 1);
    assert!(!st.hw.led);
}

#[test]
fn upload_mode_mid_run_stops_and_reports() {
    let mut st = station(true, 30, 10);
    while !st.hw.pump {
        st.step();
        assert!(st.now() < 10_000, "pump should have started");
    }
    for _ in 0..5 {
        st.step();
    }

    st.deliver(protocol::UPLOAD_MODE_TOPIC, b"ON").unwrap();
    st.step();
    assert!(!st.hw.pump);
    assert!(st.hw.led);
    assert_eq!(st.ctl.state(), StateId::Deactivating);

    st.deliver(protocol::UPLOAD_MODE_TOPIC, b"OFF").unwrap();
    assert!(st.run_until_asleep(60_000));

    assert_eq!(st.hw.pump_edges.len(), 2, "relay energised a second time");
    assert!(st.hw.pump_on_ms() < 1_000);
    assert_eq!(st.broker.count_kind(AckKind::PumpOn), 1);
    assert_eq!(st.broker.count_kind(AckKind::PumpOff), 1);
    assert_eq!(st.hw.sleeps, vec![SleepMode::Timed { duration_us: 600_000_000 }]);
}
