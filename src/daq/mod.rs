//! Analog voltage I/O with a safety envelope.
//!
//! [`VoltageChannel`] is a stateless wrapper over an [`AnalogDriver`]: every
//! call is a one-shot driver transaction, and output values are checked
//! against the ±10 V envelope before the driver is touched.
//!
//! Channels use the vendor's naming (`"Dev1/ai0"`, `"Dev1/ao1"`) and are
//! passed through unchanged.
//!
//! # Example
//!
//! ```rust
//! use uedinst::daq::{SimulatedDaq, VoltageChannel};
//!
//! # async fn run() -> uedinst::Result<()> {
//! let daq = VoltageChannel::new(SimulatedDaq::new());
//! daq.set_voltage("Dev1/ao1", 2.5, None).await?;
//! assert_eq!(daq.read_voltage("Dev1/ao1").await?, 2.5);
//! # Ok(())
//! # }
//! ```

mod simulated;

pub use simulated::{SimulatedDaq, Transaction};

use crate::error::{InstrumentError, Result};
use crate::validation::{validate_timeout, validate_voltage, MAX_ABS_VOLTAGE};
use async_trait::async_trait;

/// Binding to the analog I/O driver.
///
/// # Contract
/// - `read_analog` opens an input transaction, takes one sample and closes it
/// - `write_analog` opens an output transaction, writes and closes it; the
///   output keeps its value after the transaction ends
/// - No retries, no averaging
#[async_trait]
pub trait AnalogDriver: Send + Sync {
    /// Read the instantaneous voltage on an input channel.
    async fn read_analog(&self, channel: &str) -> Result<f64>;

    /// Latch `value` volts on an output channel.
    async fn write_analog(&self, channel: &str, value: f64) -> Result<()>;
}

/// Voltage I/O that never writes outside the safety envelope.
#[derive(Debug)]
pub struct VoltageChannel<D> {
    driver: D,
    limit: f64,
}

impl<D: AnalogDriver> VoltageChannel<D> {
    /// Wrap a driver with the full ±10 V envelope.
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            limit: MAX_ABS_VOLTAGE,
        }
    }

    /// Tighten the envelope to ±`limit` volts.
    ///
    /// The limit cannot exceed 10 V.
    pub fn with_limit(mut self, limit: f64) -> Result<Self> {
        if !(limit > 0.0 && limit <= MAX_ABS_VOLTAGE) {
            return Err(InstrumentError::range(format!(
                "Voltage limit {limit} must be in (0, {MAX_ABS_VOLTAGE}]"
            )));
        }
        self.limit = limit;
        Ok(self)
    }

    /// The active envelope, in volts.
    pub fn limit(&self) -> f64 {
        self.limit
    }

    /// The wrapped driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Read the instantaneous voltage on an input channel.
    pub async fn read_voltage(&self, channel: &str) -> Result<f64> {
        let value = self.driver.read_analog(channel).await?;
        tracing::debug!(channel, value, "Read voltage");
        Ok(value)
    }

    /// Set the voltage on an output channel.
    ///
    /// With a `timeout` (seconds), the call holds the value that long and
    /// then writes 0 V before returning. Without one, the value stays until
    /// the next write.
    ///
    /// # Errors
    ///
    /// [`InstrumentError::Range`] if `|value|` exceeds the envelope or the
    /// timeout is not strictly positive. Nothing is written in that case.
    pub async fn set_voltage(&self, channel: &str, value: f64, timeout: Option<f64>) -> Result<()> {
        let value = validate_voltage(value)?;
        if value.abs() > self.limit {
            return Err(InstrumentError::range(format!(
                "Voltage {value} is outside of the configured bound of +={}V",
                self.limit
            )));
        }
        let hold = validate_timeout(timeout)?;

        self.driver.write_analog(channel, value).await?;
        tracing::info!(channel, value, ?hold, "Voltage set");

        if let Some(hold) = hold {
            tokio::time::sleep(hold).await;
            self.driver.write_analog(channel, 0.0).await?;
            tracing::info!(channel, "Voltage auto-reset to 0 V");
        }

        Ok(())
    }
}
