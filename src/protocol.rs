//! Request/response framing for the camera server.
//!
//! A command is a set of ASCII fragments concatenated with no separator; the
//! caller embeds the `;`/`,` delimiters the server expects. The server answers
//! with a short status token, `OK` or `ERR`, which is read as a single frame of
//! at most [`REPLY_FRAME_SIZE`] bytes.
//!
//! Long-running remote operations (acquisitions) are not polled. The caller
//! passes a wait, and the protocol sleeps that long before reading the status.
//! How the wait is spent is pluggable through [`Settle`].

use crate::error::{InstrumentError, Result};
use crate::link::InstrumentLink;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Bytes read for every reply. Enough for either token plus padding.
pub const REPLY_FRAME_SIZE: usize = 10;

/// Status token returned by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `OK`
    Ok,
    /// `ERR`
    Err,
    /// Anything else. Treated as success.
    Other(String),
}

impl Reply {
    /// Decode a raw reply frame.
    ///
    /// NUL and whitespace padding around the token is ignored.
    pub fn parse(frame: &[u8]) -> Self {
        let text = String::from_utf8_lossy(frame);
        match text.trim_matches(|c: char| c == '\0' || c.is_whitespace()) {
            "OK" => Self::Ok,
            "ERR" => Self::Err,
            other => Self::Other(other.to_string()),
        }
    }

    /// Token text as received, minus padding.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ok => "OK",
            Self::Err => "ERR",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the protocol waits for a remote operation before reading its status.
#[async_trait]
pub trait Settle: Send + Sync {
    /// Wait for `duration`.
    async fn settle(&self, duration: Duration);
}

/// Fixed blocking delay: sleeps the full duration, no early completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedDelay;

#[async_trait]
impl Settle for FixedDelay {
    async fn settle(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Command/response layer over an [`InstrumentLink`].
pub struct CommandProtocol {
    link: InstrumentLink,
    settle: Box<dyn Settle>,
}

impl fmt::Debug for CommandProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandProtocol")
            .field("link", &self.link)
            .finish_non_exhaustive()
    }
}

impl CommandProtocol {
    /// Wrap a connected link, waiting with [`FixedDelay`].
    pub fn new(link: InstrumentLink) -> Self {
        Self::with_settle(link, Box::new(FixedDelay))
    }

    /// Wrap a connected link with a custom wait strategy.
    pub fn with_settle(link: InstrumentLink, settle: Box<dyn Settle>) -> Self {
        Self { link, settle }
    }

    /// The underlying link.
    pub fn link(&self) -> &InstrumentLink {
        &self.link
    }

    /// Send a command made of `fragments` and return the server's reply.
    ///
    /// If `wait` is non-zero the reply is read only after that long.
    ///
    /// # Errors
    ///
    /// - [`InstrumentError::Command`] if the server answers `ERR`
    /// - [`InstrumentError::Connection`] if the server closed the connection
    ///   instead of answering
    /// - [`InstrumentError::Transport`] on socket failure
    pub async fn send_command(&mut self, fragments: &[&str], wait: Duration) -> Result<Reply> {
        let command = fragments.concat();
        tracing::debug!(%command, ?wait, "Sending command");

        self.link.send(command.as_bytes()).await?;

        if !wait.is_zero() {
            self.settle.settle(wait).await;
        }

        let frame = self.link.receive(REPLY_FRAME_SIZE).await?;
        if frame.is_empty() {
            return Err(InstrumentError::Connection {
                addr: self.link.addr().to_string(),
                message: format!("connection closed while waiting for reply to {command}"),
            });
        }

        let reply = Reply::parse(&frame);
        tracing::debug!(%command, %reply, "Received reply");

        if reply == Reply::Err {
            return Err(InstrumentError::Command {
                command,
                answer: reply.to_string(),
            });
        }
        if let Reply::Other(token) = &reply {
            // Server vocabulary is only known to be OK/ERR
            tracing::warn!(%command, %token, "Unrecognised reply treated as success");
        }
        Ok(reply)
    }

    /// Close the underlying link.
    pub async fn close(&mut self) -> Result<()> {
        self.link.close().await
    }
}
