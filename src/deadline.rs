//! Caller-side deadlines.
//!
//! Nothing in the instrument layers cancels itself: exposure waits and
//! voltage holds always run to completion. A caller that wants to give up
//! early wraps the operation here.
//!
//! ```rust,no_run
//! use uedinst::{camera::CameraController, deadline::with_deadline};
//!
//! # async fn run(camera: &mut CameraController) -> uedinst::Result<()> {
//! let image = with_deadline(10.0, "acquisition", camera.acquire_image(3.0, true)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Dropping a command future mid-flight leaves an unread reply on the socket,
//! so a controller whose command timed out should be discarded.

use crate::error::{InstrumentError, Result};
use crate::validation::seconds_to_duration;
use std::future::Future;
use std::time::Duration;

/// Run `future`, failing with [`InstrumentError::Timeout`] after `seconds`.
///
/// A negative or non-finite deadline is rejected before the future is polled.
pub async fn with_deadline<F, T>(seconds: f64, what: &str, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if !(seconds.is_finite() && seconds >= 0.0) {
        return Err(InstrumentError::range(format!(
            "Invalid timeout: {seconds}"
        )));
    }
    let after = seconds_to_duration(seconds)?;

    tokio::time::timeout(after, future)
        .await
        .map_err(|_| InstrumentError::Timeout {
            what: what.to_string(),
            after,
        })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_completes_in_time() {
        let value = with_deadline(1.0, "quick", async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(42)
        })
        .await
        .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires() {
        let err = with_deadline(0.5, "slow thing", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        match err {
            InstrumentError::Timeout { what, after } => {
                assert_eq!(what, "slow thing");
                assert_eq!(after, Duration::from_millis(500));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let err = with_deadline(1.0, "failing", async {
            Err::<(), _>(InstrumentError::range("nope"))
        })
        .await
        .unwrap_err();
        assert!(err.is_range());
    }

    #[tokio::test]
    async fn test_negative_deadline_rejected() {
        for seconds in [-1.0, f64::NAN, 1e20] {
            let err = with_deadline(seconds, "x", async { Ok(()) }).await.unwrap_err();
            assert!(err.is_range(), "{seconds} should be rejected");
        }
    }
}
