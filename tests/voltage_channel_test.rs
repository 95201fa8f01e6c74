//! Integration tests for the voltage wrapper over the simulated DAQ card

use std::time::Duration;
use tokio::time::Instant;
use uedinst::daq::{SimulatedDaq, Transaction, VoltageChannel};
use uedinst::deadline::with_deadline;

#[tokio::test(start_paused = true)]
async fn test_set_voltage_with_auto_reset() {
    let daq = VoltageChannel::new(SimulatedDaq::new());

    let start = Instant::now();
    daq.set_voltage("Dev1/ao1", 2.5, Some(1.5)).await.unwrap();
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_millis(1500), "returned after {elapsed:?}");
    assert_eq!(daq.read_voltage("Dev1/ao1").await.unwrap(), 0.0);
    assert_eq!(
        daq.driver().transactions()[..2],
        [
            Transaction::Write {
                channel: "Dev1/ao1".into(),
                value: 2.5
            },
            Transaction::Write {
                channel: "Dev1/ao1".into(),
                value: 0.0
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_deadline_cuts_long_hold() {
    let daq = VoltageChannel::new(SimulatedDaq::new());

    let err = with_deadline(0.5, "voltage hold", daq.set_voltage("Dev1/ao0", -3.0, Some(10.0)))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("voltage hold"));
    // Cancelled mid-hold, so the reset write never happened
    assert_eq!(daq.driver().output("Dev1/ao0"), Some(-3.0));
}

#[tokio::test]
async fn test_envelope_bounds_are_inclusive() {
    let daq = VoltageChannel::new(SimulatedDaq::new());
    daq.set_voltage("Dev1/ao0", 10.0, None).await.unwrap();
    daq.set_voltage("Dev1/ao0", -10.0, None).await.unwrap();
    assert!(daq.set_voltage("Dev1/ao0", 10.000_001, None).await.unwrap_err().is_range());
    assert_eq!(daq.driver().output("Dev1/ao0"), Some(-10.0));
}

#[tokio::test]
async fn test_configured_limit_from_config() {
    let mut config = uedinst::config::UedConfig::default();
    config.daq.voltage_limit = 4.0;
    config.validate().unwrap();

    let daq = VoltageChannel::new(SimulatedDaq::new())
        .with_limit(config.daq.voltage_limit)
        .unwrap();
    assert!(daq.set_voltage("Dev1/ao0", 4.5, None).await.unwrap_err().is_range());
    daq.set_voltage("Dev1/ao0", -4.0, None).await.unwrap();
}

#[tokio::test]
async fn test_read_input_channel() {
    let sim = SimulatedDaq::new();
    sim.set_input("Dev1/ai0", 0.731);
    let daq = VoltageChannel::new(sim);
    assert_eq!(daq.read_voltage("Dev1/ai0").await.unwrap(), 0.731);
}

#[tokio::test]
async fn test_oversized_hold_is_range_error() {
    let daq = VoltageChannel::new(SimulatedDaq::new());
    let err = daq.set_voltage("Dev1/ao0", 1.0, Some(1e20)).await.unwrap_err();
    assert!(err.is_range(), "{err:?}");
    assert!(daq.driver().transactions().is_empty());
}
