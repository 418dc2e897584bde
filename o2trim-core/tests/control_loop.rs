//! Integration tests for the control cycle
//!
//! Drives `ControlLoop` against mock buses and a manual clock, covering the
//! cycle order, rate limiting, the pressure interlock, pulse timing and the
//! rollback guarantees on bus failures.

mod common;

use o2trim_core::{
    Action, BusFault, ControlError, ControllerConfig, CycleResult, FixedTime, RegulatorState,
    RelayChannel, SafetyWarning, SkipReason,
};

use common::{control_loop, p_only_config, steady, voltages, MockSensors};

fn applied(result: Result<CycleResult, ControlError>) -> o2trim_core::CycleReport {
    match result {
        Ok(CycleResult::Applied(report)) => report,
        other => panic!("expected an applied cycle, got {:?}", other),
    }
}

#[test]
fn proportional_step_pulses_up_for_impulse_duration() {
    let clock = FixedTime::new(0);
    let mut control = control_loop(voltages(3.0, 40.0, 3.5), p_only_config(0.8), &clock);

    let report = applied(control.run_once());
    assert!((report.error - 0.5).abs() < 1e-5);
    assert!((report.correction - 0.4).abs() < 1e-5);
    assert_eq!(report.action, Action::Up);
    assert_eq!(report.pulse, Some(RelayChannel::DEFAULT_UP));
    assert!(control.actuator_mut().is_on(4));

    clock.set(1_499);
    assert_eq!(control.poll_actuator(), Ok(None));
    assert!(control.actuator_mut().is_on(4));

    clock.set(1_500);
    assert_eq!(control.poll_actuator(), Ok(Some(RelayChannel::DEFAULT_UP)));
    assert_eq!(control.actuator_mut().telegrams, vec![(4, true), (4, false)]);
}

#[test]
fn report_carries_feed_forward_baseline() {
    let clock = FixedTime::new(0);
    let mut control = control_loop(voltages(3.5, 10.0, 3.5), ControllerConfig::default(), &clock);

    let report = applied(control.run_once());
    assert!((report.gas_flow - 10.0).abs() < 1e-4);
    assert!((report.air_target_base - 1.5).abs() < 1e-4);
    assert!((report.air_pressure - 3.5).abs() < 1e-4);
    assert!((report.o2_avg - 3.5).abs() < 1e-4);
}

#[test]
fn second_call_inside_interval_is_skipped() {
    let clock = FixedTime::new(0);
    let mut control = control_loop(voltages(3.0, 40.0, 3.5), ControllerConfig::default(), &clock);

    applied(control.run_once());
    let after_first = *control.state();
    let reads = control.sensors_mut().reads;

    clock.set(4_000);
    assert_eq!(
        control.run_once(),
        Ok(CycleResult::Skipped(SkipReason::RateLimited { remaining_ms: 6_000 }))
    );
    assert_eq!(*control.state(), after_first);
    assert_eq!(control.sensors_mut().reads, reads);

    clock.set(10_000);
    applied(control.run_once());
}

#[test]
fn deadband_holds_and_counts_as_run() {
    let clock = FixedTime::new(500);
    let mut control = control_loop(voltages(3.45, 40.0, 3.5), ControllerConfig::default(), &clock)
        .with_state(RegulatorState { integral: 7.0, last_error: 0.4, last_control_time: None });

    let report = applied(control.run_once());
    assert_eq!(report.action, Action::Hold);
    assert_eq!(report.correction, 0.0);
    assert_eq!(report.pulse, None);
    assert_eq!(
        *control.state(),
        RegulatorState { integral: 0.0, last_error: 0.0, last_control_time: Some(500) }
    );
    assert!(control.actuator_mut().telegrams.is_empty());
}

#[test]
fn gap_zone_correction_moves_nothing() {
    let clock = FixedTime::new(0);
    // error 0.3 outside the 0.1 deadband, correction 0.09 under the action threshold
    let mut control = control_loop(voltages(3.2, 40.0, 3.5), p_only_config(0.3), &clock);

    let report = applied(control.run_once());
    assert!(report.correction > 0.0);
    assert_eq!(report.action, Action::Hold);
    assert!(control.actuator_mut().telegrams.is_empty());
    assert!((control.state().last_error - 0.3).abs() < 1e-5);
}

#[test]
fn pressure_outside_window_is_a_warning_without_state_change() {
    let clock = FixedTime::new(0);
    let before = RegulatorState { integral: 3.0, last_error: 0.2, last_control_time: None };
    let mut control =
        control_loop(voltages(2.0, 40.0, 9.5), ControllerConfig::default(), &clock).with_state(before);

    match control.run_once() {
        Ok(CycleResult::Warning(SafetyWarning::PressureOutOfRange { pressure, min, max })) => {
            assert!((pressure - 9.5).abs() < 1e-4);
            assert_eq!((min, max), (0.5, 9.0));
        }
        other => panic!("expected a warning, got {:?}", other),
    }
    assert_eq!(*control.state(), before);
    assert!(control.actuator_mut().telegrams.is_empty());
}

#[test]
fn interlock_cuts_running_pulse() {
    let clock = FixedTime::new(0);
    let mut config = ControllerConfig::default();
    config.pid.impulse_duration_s = 30.0;
    let mut control = control_loop(voltages(2.0, 40.0, 3.5), config, &clock);

    applied(control.run_once());
    assert!(control.active_pulse().is_some());

    control.sensors_mut().readings = voltages(2.0, 40.0, 0.2);
    clock.set(10_000);
    assert!(matches!(control.run_once(), Ok(CycleResult::Warning(_))));
    assert!(control.active_pulse().is_none());
    assert!(!control.actuator_mut().is_on(4));
}

#[test]
fn direction_change_releases_other_relay_first() {
    let clock = FixedTime::new(0);
    let mut config = ControllerConfig::default();
    config.pid.impulse_duration_s = 30.0;
    let mut control = control_loop(voltages(2.0, 40.0, 3.5), config, &clock);

    applied(control.run_once());
    control.sensors_mut().readings = voltages(6.0, 40.0, 3.5);
    clock.set(10_000);
    let report = applied(control.run_once());

    assert_eq!(report.action, Action::Down);
    assert_eq!(control.actuator_mut().telegrams, vec![(4, true), (4, false), (3, true)]);
}

#[test]
fn run_once_services_due_release_first() {
    let clock = FixedTime::new(0);
    let mut control = control_loop(voltages(2.0, 40.0, 3.5), ControllerConfig::default(), &clock);

    applied(control.run_once());
    clock.set(2_000);
    assert!(matches!(control.run_once(), Ok(CycleResult::Skipped(_))));
    assert_eq!(control.actuator_mut().telegrams, vec![(4, true), (4, false)]);
}

#[test]
fn sensor_failure_aborts_cycle_untouched() {
    let clock = FixedTime::new(0);
    let mut control = control_loop(steady(), ControllerConfig::default(), &clock);
    control.sensors_mut().fail = Some(BusFault::Nack);

    assert_eq!(
        control.run_once(),
        Err(ControlError::SensorTransport { fault: BusFault::Nack })
    );
    assert_eq!(*control.state(), RegulatorState::default());
    assert!(control.actuator_mut().telegrams.is_empty());

    control.sensors_mut().fail = None;
    applied(control.run_once());
}

#[test]
fn actuator_failure_rolls_back_regulator_state() {
    let clock = FixedTime::new(0);
    let mut control = control_loop(voltages(2.0, 40.0, 3.5), ControllerConfig::default(), &clock);
    control.actuator_mut().fail_next = 1;

    assert!(matches!(control.run_once(), Err(ControlError::ActuatorTransport { .. })));
    assert_eq!(*control.state(), RegulatorState::default());
    // the unknown relay state was cleaned up straight away
    assert_eq!(control.actuator_mut().telegrams, vec![(4, false)]);

    // not rate limited: the failed cycle did not count as run
    let report = applied(control.run_once());
    assert_eq!(report.action, Action::Up);
}

#[test]
fn non_finite_oxygen_drops_cycle_and_recovers() {
    let clock = FixedTime::new(0);
    let mut control = control_loop([f32::NAN, f32::NAN, 0.4, 0.35], ControllerConfig::default(), &clock);

    assert_eq!(
        control.run_once(),
        Err(ControlError::NonFiniteReading { quantity: "O2" })
    );
    assert_eq!(*control.state(), RegulatorState::default());
    assert!(control.actuator_mut().telegrams.is_empty());

    // probes recover at O2 2.0 %, error 1.5
    control.sensors_mut().readings = voltages(2.0, 40.0, 3.5);
    for cycle in 0..3u64 {
        clock.set(cycle * 10_000);
        let report = applied(control.run_once());
        assert_eq!(report.action, Action::Up);
        assert!(report.correction > 0.1);
        assert!(control.state().integral.is_finite());
    }
}

#[test]
fn non_finite_gas_flow_drops_cycle() {
    let clock = FixedTime::new(0);
    let mut control = control_loop([0.14, 0.14, f32::INFINITY, 0.35], ControllerConfig::default(), &clock);

    assert_eq!(
        control.run_once(),
        Err(ControlError::NonFiniteReading { quantity: "gas flow" })
    );
    assert_eq!(*control.state(), RegulatorState::default());
}

#[test]
fn non_finite_pressure_trips_interlock() {
    let clock = FixedTime::new(0);
    let mut control = control_loop([0.08, 0.08, 0.4, f32::NAN], ControllerConfig::default(), &clock);

    assert!(matches!(control.run_once(), Ok(CycleResult::Warning(_))));
    assert_eq!(*control.state(), RegulatorState::default());
}

#[test]
fn zero_impulse_leaves_no_relay_energized() {
    let clock = FixedTime::new(0);
    let mut config = ControllerConfig::default();
    config.pid.impulse_duration_s = 0.0;
    let mut control = control_loop(voltages(2.0, 40.0, 3.5), config, &clock);

    let report = applied(control.run_once());
    assert_eq!(report.pulse, Some(RelayChannel::DEFAULT_UP));
    assert!(!control.actuator_mut().is_on(4));
    assert_eq!(control.actuator_mut().telegrams, vec![(4, true), (4, false)]);
    assert_eq!(control.active_pulse(), None);
}

#[test]
fn slow_sensor_sweep_times_out() {
    let clock = FixedTime::new(0);
    let mut control = o2trim_core::ControlLoop::new(
        MockSensors::slow(steady(), &clock, 300),
        common::MockRelays::default(),
        ControllerConfig::default(),
        &clock,
    );

    assert_eq!(
        control.run_once(),
        Err(ControlError::Timeout { elapsed_ms: 300, limit_ms: 250 })
    );
    assert_eq!(*control.state(), RegulatorState::default());

    let mut control = control.with_bus_timeout_ms(500);
    applied(control.run_once());
}

#[test]
fn disabled_controller_skips_everything() {
    let clock = FixedTime::new(0);
    let mut config = ControllerConfig::default();
    config.pid.enabled = false;
    let mut control = control_loop(voltages(2.0, 40.0, 12.0), config, &clock);

    assert_eq!(control.run_once(), Ok(CycleResult::Disabled));
    assert_eq!(control.sensors_mut().reads, 0);
}

#[test]
fn configuration_is_fetched_every_cycle() {
    let clock = FixedTime::new(0);
    let mut control = control_loop(voltages(3.5, 40.0, 3.5), ControllerConfig::default(), &clock);

    assert_eq!(applied(control.run_once()).action, Action::Hold);

    control.config_mut().pid.o2_setpoint = 5.0;
    clock.set(10_000);
    let report = applied(control.run_once());
    assert_eq!(report.action, Action::Up);
    assert!((report.error - 1.5).abs() < 1e-4);
}

#[test]
fn manual_command_replaces_running_pulse() {
    let clock = FixedTime::new(0);
    let mut control = control_loop(voltages(2.0, 40.0, 3.5), ControllerConfig::default(), &clock);

    applied(control.run_once());
    control.set_relay(4, true).unwrap();
    assert!(control.active_pulse().is_none());

    clock.set(5_000);
    assert_eq!(control.poll_actuator(), Ok(None));
    assert!(control.actuator_mut().is_on(4));

    assert_eq!(control.set_relay(5, true), Err(ControlError::InvalidChannel { channel: 5 }));
}

#[test]
fn custom_relay_assignment() {
    let clock = FixedTime::new(0);
    let up = RelayChannel::new(1).unwrap();
    let down = RelayChannel::new(2).unwrap();
    let mut control = control_loop(voltages(2.0, 40.0, 3.5), ControllerConfig::default(), &clock)
        .with_relays(up, down)
        .unwrap();

    assert_eq!(applied(control.run_once()).pulse, Some(up));
    assert!(control.actuator_mut().is_on(1));
}

#[test]
fn sample_and_shutdown() {
    let clock = FixedTime::new(0);
    let mut control = control_loop(voltages(2.0, 40.0, 3.5), ControllerConfig::default(), &clock);

    let sample = control.sample().unwrap();
    assert!((sample.values.o2_avg - 2.0).abs() < 1e-4);
    assert_eq!(sample.raw, voltages(2.0, 40.0, 3.5));
    assert_eq!(*control.state(), RegulatorState::default());

    applied(control.run_once());
    assert_eq!(control.shutdown(), Ok(Some(RelayChannel::DEFAULT_UP)));
    assert_eq!(control.shutdown(), Ok(None));
    assert!(!control.actuator_mut().is_on(4));
}
