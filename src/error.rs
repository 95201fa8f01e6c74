//! Error types for the instrument adapters.
//!
//! Every failure surfaced by this crate is an [`InstrumentError`]. Transport
//! errors from the socket layer never leak out unwrapped: the link layer maps
//! them into `Connection` or `Transport` so callers only ever match on one type.
//!
//! ## Error Hierarchy
//!
//! - **`Connection`**: the camera server could not be reached, or the link was
//!   used after it was closed. Fatal to the controller instance.
//! - **`Capability`**: the camera server did not understand the version query.
//! - **`Command`**: the camera server answered `ERR`. Details live on the
//!   server's own result console; the protocol carries no error payload.
//! - **`Range`**: a local precondition failed before any hardware was touched.
//! - **`ImageTransfer`** / **`ImageShape`**: the server accepted an acquisition
//!   but the image file it was supposed to write is missing or malformed.
//! - **`Transport`**: socket I/O failed on an established link.
//! - **`Config`**: the configuration file or environment could not be parsed.
//! - **`Timeout`**: a caller-imposed deadline expired (see [`crate::deadline`]).
//! - **`Driver`**: the analog I/O driver reported a failure.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type Result<T> = std::result::Result<T, InstrumentError>;

/// Failures raised by the camera client, the DAQ wrapper and their configuration.
#[derive(Error, Debug)]
pub enum InstrumentError {
    #[error(
        "Could not connect to DigitalMicrograph at {addr}: {message}. Make sure it is open."
    )]
    Connection { addr: String, message: String },

    #[error("The uedinst plugin version installed in the GMS is too old: {message}")]
    Capability { message: String },

    #[error(
        "Command failed: {command}.\nAnswer received: {answer}.\nSee the GMS result console for details."
    )]
    Command { command: String, answer: String },

    #[error("Out of range: {message}")]
    Range { message: String },

    #[error("Image transfer through '{}' failed: {source}", path.display())]
    ImageTransfer {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Image file '{}' has {actual} bytes, expected {expected}",
        path.display()
    )]
    ImageShape {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Timed out after {after:?} while waiting for {what}")]
    Timeout { what: String, after: Duration },

    #[error("DAQ driver error: {message}")]
    Driver { message: String },
}

impl InstrumentError {
    pub(crate) fn range(message: impl Into<String>) -> Self {
        Self::Range {
            message: message.into(),
        }
    }

    /// True if the socket could not be opened or is no longer usable.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// True if the remote server answered `ERR`.
    pub fn is_command(&self) -> bool {
        matches!(self, Self::Command { .. })
    }

    /// True if a local precondition rejected the request.
    pub fn is_range(&self) -> bool {
        matches!(self, Self::Range { .. })
    }

    /// True if the remote accepted an acquisition but the image hand-off failed.
    pub fn is_transfer(&self) -> bool {
        matches!(self, Self::ImageTransfer { .. } | Self::ImageShape { .. })
    }
}

impl From<figment::Error> for InstrumentError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}
