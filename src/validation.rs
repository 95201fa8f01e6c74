//! Standalone precondition checks.
//!
//! These functions touch no hardware and hold no state, so the safety envelope
//! of the voltage wrapper and the sanity checks on configuration can be tested
//! in isolation.

use crate::error::{InstrumentError, Result};
use std::net::IpAddr;
use std::ops::RangeInclusive;
use std::time::Duration;

/// Absolute bound on any analog output voltage, in volts.
pub const MAX_ABS_VOLTAGE: f64 = 10.0;

/// Validates if a given u16 value is a valid port number.
/// By type, the port is already within the 0-65535 range.
/// This function checks that the port is not 0, which is reserved.
pub fn is_valid_port(port: u16) -> std::result::Result<(), &'static str> {
    if port > 0 {
        Ok(())
    } else {
        Err("Port number must be greater than 0")
    }
}

/// Validates if a given string is a valid IP address.
pub fn is_valid_ip(ip: &str) -> std::result::Result<(), &'static str> {
    ip.parse::<IpAddr>()
        .map(|_| ())
        .map_err(|_| "Invalid IP address")
}

/// Validates if a given string is usable as a file path.
pub fn is_valid_path(path: &str) -> std::result::Result<(), &'static str> {
    if path.is_empty() {
        return Err("File path cannot be empty");
    }
    if path.contains('\0') {
        return Err("File path cannot contain null bytes");
    }
    Ok(())
}

/// Validates if a given value is within a specified numeric range.
pub fn is_in_range<T: PartialOrd>(
    value: T,
    range: RangeInclusive<T>,
) -> std::result::Result<(), &'static str> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err("Value is outside the specified range")
    }
}

/// Check an analog output value against the ±10 V envelope.
///
/// Returns the value unchanged when it is safe to write. NaN and infinities
/// are rejected along with anything whose magnitude exceeds
/// [`MAX_ABS_VOLTAGE`].
pub fn validate_voltage(value: f64) -> Result<f64> {
    if is_in_range(value, -MAX_ABS_VOLTAGE..=MAX_ABS_VOLTAGE).is_err() {
        return Err(InstrumentError::range(format!(
            "Voltage {value} is outside of permissible bounds of +=10V"
        )));
    }
    Ok(value)
}

/// Convert seconds to a [`Duration`], rejecting values it cannot hold.
pub fn seconds_to_duration(seconds: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(seconds).map_err(|e| {
        InstrumentError::range(format!("{seconds} s is not a usable duration: {e}"))
    })
}

/// Check an optional auto-reset hold time, in seconds.
///
/// `None` means the voltage is held indefinitely. A provided value must be
/// strictly positive and small enough to fit a [`Duration`].
pub fn validate_timeout(timeout: Option<f64>) -> Result<Option<Duration>> {
    match timeout {
        None => Ok(None),
        Some(seconds) if seconds.is_finite() && seconds > 0.0 => {
            seconds_to_duration(seconds).map(Some)
        }
        Some(seconds) => Err(InstrumentError::range(format!(
            "A time-out value of {seconds} seconds is not valid."
        ))),
    }
}

/// Check an exposure time, in seconds.
///
/// No upper bound is enforced beyond what a [`Duration`] can represent: the
/// camera server decides what it can do.
/// The exposure doubles as the reply wait, so it cannot be negative.
pub fn validate_exposure(exposure: f64) -> Result<Duration> {
    if exposure.is_finite() && exposure >= 0.0 {
        seconds_to_duration(exposure)
    } else {
        Err(InstrumentError::range(format!(
            "Exposure {exposure} s is not a usable duration"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_and_ip() {
        assert!(is_valid_port(42057).is_ok());
        assert!(is_valid_port(0).is_err());
        assert!(is_valid_ip("127.0.0.1").is_ok());
        assert!(is_valid_ip("::1").is_ok());
        assert!(is_valid_ip("256.0.0.1").is_err());
        assert!(is_valid_ip("localhost").is_err());
    }

    #[test]
    fn test_path() {
        assert!(is_valid_path("/tmp/_uedinst_temp.dat").is_ok());
        assert!(is_valid_path("").is_err());
        assert!(is_valid_path("bad\0path").is_err());
    }

    #[test]
    fn test_voltage_envelope() {
        for v in [-10.0, -9.99, 0.0, 5.0, 10.0] {
            assert_eq!(validate_voltage(v).unwrap(), v);
        }
        for v in [-10.0001, 10.0001, 11.0, -250.0, f64::NAN, f64::INFINITY] {
            let err = validate_voltage(v).unwrap_err();
            assert!(err.is_range(), "{v} should be rejected");
        }
    }

    #[test]
    fn test_timeout_bounds() {
        assert!(validate_timeout(None).unwrap().is_none());
        assert_eq!(
            validate_timeout(Some(0.1)).unwrap(),
            Some(Duration::from_millis(100))
        );
        for t in [0.0, -0.0, -1.0, f64::NAN, f64::INFINITY, 1e20] {
            assert!(validate_timeout(Some(t)).unwrap_err().is_range());
        }
    }

    #[test]
    fn test_exposure() {
        assert_eq!(validate_exposure(0.0).unwrap(), Duration::ZERO);
        assert_eq!(validate_exposure(2.5).unwrap(), Duration::from_millis(2500));
        assert!(validate_exposure(-0.5).unwrap_err().is_range());
        assert!(validate_exposure(f64::NAN).unwrap_err().is_range());
        assert!(validate_exposure(1e20).unwrap_err().is_range());
        assert!(validate_exposure(86_400.0).is_ok());
    }
}
