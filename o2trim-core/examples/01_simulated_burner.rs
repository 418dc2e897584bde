//! Simulated Burner Example
//!
//! Runs the oxygen trim loop against a crude burner model for five simulated
//! minutes, with a load step from 50 to 70 m3/h gas half way through.
//!
//! ## What You'll Learn
//!
//! - Wiring a `ControlLoop` to your own `SensorBus` and `ActuatorBus`
//! - Driving it from a host loop with `run_once` and `poll_actuator`
//! - How pulses, rate limiting and the deadband look over time
//!
//! ## The Model
//!
//! ```text
//! air pressure   rises 0.05 kPa/s while relay 4 is on, falls while relay 3 is on
//! oxygen         3.5 % + 2 %/kPa * (pressure - air needed for the gas flow)
//! ```
//!
//! ## Running the Example
//!
//! ```bash
//! cargo run --example 01_simulated_burner
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use o2trim_core::{
    ActuatorBus, ControlLoop, ControlResult, ControllerConfig, CycleResult, FeedForwardTable,
    FixedTime, RawVoltages, RelayChannel, SensorBus,
};

const TICK_MS: u64 = 100;
const PRESSURE_RATE_KPA_PER_S: f32 = 0.05;

struct Burner {
    gas_flow: f32,
    air_pressure: f32,
    relays: [bool; 4],
    curve: FeedForwardTable,
}

impl Burner {
    fn oxygen(&self) -> f32 {
        let needed = self.curve.lookup(self.gas_flow);
        (3.5 + 2.0 * (self.air_pressure - needed)).clamp(0.0, 21.0)
    }

    fn step(&mut self, dt_s: f32) {
        if self.relays[3] {
            self.air_pressure += PRESSURE_RATE_KPA_PER_S * dt_s;
        }
        if self.relays[2] {
            self.air_pressure -= PRESSURE_RATE_KPA_PER_S * dt_s;
        }
    }
}

/// Transmitters wired to the burner
struct Transmitters(Rc<RefCell<Burner>>);

impl SensorBus for Transmitters {
    fn read_all_channels(&mut self) -> ControlResult<RawVoltages> {
        let burner = self.0.borrow();
        let o2 = burner.oxygen();
        Ok([o2 / 25.0, o2 / 25.0, burner.gas_flow / 100.0, burner.air_pressure / 10.0])
    }
}

/// Relay board wired to the air valve motor
struct RelayBoard(Rc<RefCell<Burner>>);

impl ActuatorBus for RelayBoard {
    fn set_relay(&mut self, channel: RelayChannel, energize: bool) -> ControlResult<()> {
        self.0.borrow_mut().relays[usize::from(channel.get() - 1)] = energize;
        Ok(())
    }
}

fn main() -> Result<(), o2trim_core::ControlError> {
    println!("O2 Trim Simulated Burner");
    println!("========================\n");

    let config = ControllerConfig::default();
    let burner = Rc::new(RefCell::new(Burner {
        gas_flow: 50.0,
        air_pressure: 3.0,
        relays: [false; 4],
        curve: config.feed_forward.clone(),
    }));

    let clock = FixedTime::new(0);
    let mut control = ControlLoop::new(
        Transmitters(Rc::clone(&burner)),
        RelayBoard(Rc::clone(&burner)),
        config,
        &clock,
    );

    println!("{:>7} {:>6} {:>7} {:>6} {:>7} {:>6}", "t [s]", "gas", "p_air", "O2", "corr", "action");

    for tick in 0..3_000u64 {
        let now = tick * TICK_MS;
        clock.set(now);

        if now == 150_000 {
            println!("--- load step: gas 50 -> 70 m3/h ---");
            burner.borrow_mut().gas_flow = 70.0;
        }

        match control.run_once() {
            Ok(CycleResult::Applied(report)) => println!(
                "{:>7.1} {:>6.1} {:>7.2} {:>6.2} {:>7.3} {:>6}",
                now as f32 / 1000.0,
                report.gas_flow,
                report.air_pressure,
                report.o2_avg,
                report.correction,
                report.action.as_str()
            ),
            Ok(CycleResult::Warning(warning)) => println!("{:>7.1} {}", now as f32 / 1000.0, warning),
            Ok(_) => {}
            Err(e) => println!("{:>7.1} cycle failed: {}", now as f32 / 1000.0, e),
        }

        control.poll_actuator()?;
        burner.borrow_mut().step(TICK_MS as f32 / 1000.0);
    }

    control.shutdown()?;
    let state = control.state();
    println!("\nFinal regulator state: integral {:.3}, last error {:.3}", state.integral, state.last_error);
    Ok(())
}
