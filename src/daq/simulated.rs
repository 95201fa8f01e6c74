//! In-memory analog I/O driver.
//!
//! Stands in for the vendor driver in tests and in the CLI's `--simulate`
//! mode. Output channels latch the last written value and read it back;
//! input channels return whatever was preset with [`SimulatedDaq::set_input`]
//! (0 V otherwise). Every transaction is logged for verification.

use super::AnalogDriver;
use crate::error::{InstrumentError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// One driver transaction, as seen by the simulated device.
#[derive(Debug, Clone, PartialEq)]
pub enum Transaction {
    /// One-shot input read
    Read { channel: String },
    /// One-shot output write
    Write { channel: String, value: f64 },
}

/// Simulated DAQ card.
#[derive(Debug, Default)]
pub struct SimulatedDaq {
    outputs: Mutex<HashMap<String, f64>>,
    inputs: Mutex<HashMap<String, f64>>,
    log: Mutex<Vec<Transaction>>,
    should_fail_next: AtomicBool,
}

impl SimulatedDaq {
    /// Create a card with every channel at 0 V.
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset the value returned by an input channel.
    pub fn set_input(&self, channel: &str, value: f64) {
        self.inputs.lock().insert(channel.to_string(), value);
    }

    /// Value currently latched on an output channel.
    pub fn output(&self, channel: &str) -> Option<f64> {
        self.outputs.lock().get(channel).copied()
    }

    /// Make the next transaction fail with a driver error.
    pub fn fail_next(&self) {
        self.should_fail_next.store(true, Ordering::SeqCst);
    }

    /// Copy of the transaction log.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.log.lock().clone()
    }

    fn check_failure(&self, channel: &str) -> Result<()> {
        if self.should_fail_next.swap(false, Ordering::SeqCst) {
            return Err(InstrumentError::Driver {
                message: format!("simulated failure on {channel}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AnalogDriver for SimulatedDaq {
    async fn read_analog(&self, channel: &str) -> Result<f64> {
        self.check_failure(channel)?;
        self.log.lock().push(Transaction::Read {
            channel: channel.to_string(),
        });

        let latched = self.outputs.lock().get(channel).copied();
        let value = latched
            .or_else(|| self.inputs.lock().get(channel).copied())
            .unwrap_or(0.0);
        Ok(value)
    }

    async fn write_analog(&self, channel: &str, value: f64) -> Result<()> {
        self.check_failure(channel)?;
        self.log.lock().push(Transaction::Write {
            channel: channel.to_string(),
            value,
        });
        self.outputs.lock().insert(channel.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_input_preset() {
        let daq = SimulatedDaq::new();
        assert_eq!(daq.read_analog("Dev1/ai0").await.unwrap(), 0.0);
        daq.set_input("Dev1/ai0", 1.25);
        assert_eq!(daq.read_analog("Dev1/ai0").await.unwrap(), 1.25);
    }

    #[tokio::test]
    async fn test_output_latches() {
        let daq = SimulatedDaq::new();
        daq.write_analog("Dev1/ao0", -2.0).await.unwrap();
        assert_eq!(daq.output("Dev1/ao0"), Some(-2.0));
        assert_eq!(daq.read_analog("Dev1/ao0").await.unwrap(), -2.0);
        assert_eq!(daq.output("Dev1/ao1"), None);
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let daq = SimulatedDaq::new();
        daq.fail_next();
        assert!(daq.read_analog("Dev1/ai0").await.is_err());
        assert!(daq.read_analog("Dev1/ai0").await.is_ok());
        assert_eq!(daq.transactions().len(), 1);
    }
}
