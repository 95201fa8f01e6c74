//! Gatan Ultrascan 895 camera controller.
//!
//! The camera is driven through a plugin running inside DigitalMicrograph
//! (Gatan Microscopy Suite). Control goes over a TCP command channel; image
//! data comes back out of band: the server writes a raw 2048×2048 `i32` dump
//! to a file, and the controller reads it once the exposure has elapsed.
//!
//! # Commands
//!
//! | Operation      | Wire command                                     |
//! |----------------|--------------------------------------------------|
//! | version query  | `ULTRASCAN;VERSION`                              |
//! | insert/retract | `ULTRASCAN;INSERT;TRUE` / `ULTRASCAN;INSERT;FALSE` |
//! | acquire        | `ULTRASCAN;ACQUIRE;<exp:.3>,<True/False>,<path>` |
//!
//! # Usage
//!
//! ```rust,no_run
//! use uedinst::camera::CameraController;
//! use uedinst::config::CameraConfig;
//!
//! # async fn run() -> uedinst::Result<()> {
//! let mut camera = CameraController::connect(CameraConfig::default()).await?;
//! camera.insert().await?;
//! let image = camera.acquire_image(3.0, true).await?;
//! assert_eq!(image.dim(), (2048, 2048));
//! camera.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! The hand-off file is owned by the controller's configuration. Two
//! controllers pointed at the same machine with the same path will race on
//! it; acquisitions on one controller are serialized by `&mut self`.

use crate::config::CameraConfig;
use crate::error::{InstrumentError, Result};
use crate::link::InstrumentLink;
use crate::protocol::{CommandProtocol, FixedDelay, Settle};
use crate::validation::validate_exposure;
use ndarray::Array2;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Side length of an Ultrascan 895 frame, in pixels.
pub const IMAGE_SIDE: usize = 2048;

/// Bytes per sample in the hand-off file.
const SAMPLE_BYTES: usize = std::mem::size_of::<i32>();

/// A downcast camera frame.
pub type CameraImage = Array2<i16>;

/// Controller lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Constructed, not yet connected and verified.
    Connecting,
    /// Connected and the server answered the version query.
    Ready,
    /// Connection or capability check failed, or the link broke. Terminal.
    Failed,
}

/// Client for the Ultrascan 895 camera server.
pub struct CameraController {
    config: CameraConfig,
    image_path: PathBuf,
    state: ControllerState,
    protocol: Option<CommandProtocol>,
    settle: Option<Box<dyn Settle>>,
    version: Option<String>,
}

impl std::fmt::Debug for CameraController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraController")
            .field("addr", &self.config.socket_addr())
            .field("image_path", &self.image_path)
            .field("state", &self.state)
            .field("version", &self.version)
            .finish()
    }
}

impl CameraController {
    /// Create an unconnected controller in the `Connecting` state.
    pub fn new(config: CameraConfig) -> Self {
        let image_path = config.image_path();
        Self {
            config,
            image_path,
            state: ControllerState::Connecting,
            protocol: None,
            settle: None,
            version: None,
        }
    }

    /// Replace the exposure wait used by acquisitions.
    ///
    /// Only takes effect if called before [`open`](Self::open).
    pub fn with_settle(mut self, settle: impl Settle + 'static) -> Self {
        self.settle = Some(Box::new(settle));
        self
    }

    /// Create, connect and verify in one step.
    pub async fn connect(config: CameraConfig) -> Result<Self> {
        let mut controller = Self::new(config);
        controller.open().await?;
        Ok(controller)
    }

    /// Connect to the server at `127.0.0.1:42057`.
    pub async fn connect_default() -> Result<Self> {
        Self::connect(CameraConfig::default()).await
    }

    /// Open the connection and run the version query.
    ///
    /// Moves to `Ready` on success. Any failure moves to `Failed`, which is
    /// terminal: a failed controller must be discarded.
    pub async fn open(&mut self) -> Result<()> {
        match self.state {
            ControllerState::Ready => return Ok(()),
            ControllerState::Failed => return Err(self.failed_error()),
            ControllerState::Connecting => {}
        }

        match self.handshake().await {
            Ok((protocol, version)) => {
                tracing::info!(
                    addr = %self.config.socket_addr(),
                    %version,
                    "Camera server ready"
                );
                self.protocol = Some(protocol);
                self.version = Some(version);
                self.state = ControllerState::Ready;
                Ok(())
            }
            Err(e) => {
                tracing::error!(addr = %self.config.socket_addr(), error = %e, "Camera server unusable");
                self.state = ControllerState::Failed;
                Err(e)
            }
        }
    }

    async fn handshake(&mut self) -> Result<(CommandProtocol, String)> {
        let link = InstrumentLink::connect(
            &self.config.address,
            self.config.port,
            self.config.connect_timeout(),
        )
        .await?;

        let settle = self
            .settle
            .take()
            .unwrap_or_else(|| Box::new(FixedDelay));
        let mut protocol = CommandProtocol::with_settle(link, settle);

        // Early plugin builds do not know VERSION and answer ERR
        let version = match protocol
            .send_command(&["ULTRASCAN;VERSION"], Duration::ZERO)
            .await
        {
            Ok(reply) => reply.to_string(),
            Err(InstrumentError::Command { command, answer }) => {
                close_after_failure(&mut protocol).await;
                return Err(InstrumentError::Capability {
                    message: format!("'{command}' was answered with {answer}"),
                });
            }
            Err(e) => {
                close_after_failure(&mut protocol).await;
                return Err(e);
            }
        };

        Ok((protocol, version))
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Version reported by the server at connection time.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Path of the image hand-off file.
    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    fn failed_error(&self) -> InstrumentError {
        InstrumentError::Connection {
            addr: self.config.socket_addr(),
            message: "controller has failed; construct a new one".into(),
        }
    }

    async fn command(&mut self, fragments: &[&str], wait: Duration) -> Result<String> {
        if self.state != ControllerState::Ready {
            return Err(match self.state {
                ControllerState::Failed => self.failed_error(),
                _ => InstrumentError::Connection {
                    addr: self.config.socket_addr(),
                    message: "controller is not connected; call open() first".into(),
                },
            });
        }
        let Some(protocol) = self.protocol.as_mut() else {
            return Err(self.failed_error());
        };

        match protocol.send_command(fragments, wait).await {
            Ok(reply) => Ok(reply.to_string()),
            Err(e @ (InstrumentError::Connection { .. } | InstrumentError::Transport(_))) => {
                // A broken link is fatal to this controller
                self.state = ControllerState::Failed;
                if let Some(mut protocol) = self.protocol.take() {
                    close_after_failure(&mut protocol).await;
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Insert the camera into the beam (`true`) or retract it (`false`).
    pub async fn set_inserted(&mut self, toggle: bool) -> Result<()> {
        let token = if toggle { "TRUE" } else { "FALSE" };
        self.command(&["ULTRASCAN;INSERT;", token], Duration::ZERO)
            .await?;
        tracing::info!(inserted = toggle, "Camera insertion changed");
        Ok(())
    }

    /// Insert the camera into the beam.
    pub async fn insert(&mut self) -> Result<()> {
        self.set_inserted(true).await
    }

    /// Retract the camera from the beam.
    pub async fn retract(&mut self) -> Result<()> {
        self.set_inserted(false).await
    }

    /// Acquire a gain-normalized image.
    ///
    /// The call takes at least `exposure` seconds: the reply is only read
    /// once the exposure has elapsed. With `remove_dark` the server subtracts
    /// the dark background before writing the frame.
    ///
    /// # Errors
    ///
    /// - [`InstrumentError::Range`] for a negative or non-finite exposure
    /// - [`InstrumentError::Command`] if the server refuses the acquisition
    /// - [`InstrumentError::ImageTransfer`] / [`InstrumentError::ImageShape`]
    ///   if the server accepted but the frame file is missing or malformed
    pub async fn acquire_image(&mut self, exposure: f64, remove_dark: bool) -> Result<CameraImage> {
        let wait = validate_exposure(exposure)?;
        let command = acquire_command(exposure, remove_dark, &self.image_path);

        tracing::info!(exposure, remove_dark, path = %self.image_path.display(), "Acquiring image");
        self.command(&[&command], wait).await?;

        let bytes = tokio::fs::read(&self.image_path)
            .await
            .map_err(|source| InstrumentError::ImageTransfer {
                path: self.image_path.clone(),
                source,
            })?;

        let image = decode_frame(&bytes, IMAGE_SIDE, IMAGE_SIDE, &self.image_path)?;
        tracing::info!(exposure, "Image acquired");
        Ok(image)
    }

    /// Close the connection. The controller cannot be reopened afterwards.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut protocol) = self.protocol.take() {
            protocol.close().await?;
        }
        if self.state == ControllerState::Ready {
            self.state = ControllerState::Failed;
        }
        Ok(())
    }
}

/// Release the socket of a protocol that is being abandoned. The original
/// failure is what the caller sees, so a close error is only logged.
async fn close_after_failure(protocol: &mut CommandProtocol) {
    if let Err(e) = protocol.close().await {
        tracing::debug!(addr = %protocol.link().addr(), error = %e, "Close after failure failed");
    }
}

/// Build the acquire command text.
///
/// The dark-subtraction flag is spelled `True`/`False`, the way the server
/// script parses it.
pub fn acquire_command(exposure: f64, remove_dark: bool, path: &Path) -> String {
    let flag = if remove_dark { "True" } else { "False" };
    format!(
        "ULTRASCAN;ACQUIRE;{exposure:.3},{flag},{}",
        path.display()
    )
}

/// Decode a raw little-endian `i32` frame into a clipped `i16` grid.
///
/// The detector saturates well below `i16::MAX`, so clipping loses nothing
/// in practice.
pub fn decode_frame(bytes: &[u8], rows: usize, cols: usize, path: &Path) -> Result<CameraImage> {
    let expected = rows * cols * SAMPLE_BYTES;
    if bytes.len() != expected {
        return Err(InstrumentError::ImageShape {
            path: path.to_path_buf(),
            expected,
            actual: bytes.len(),
        });
    }

    let samples: Vec<i16> = bytes
        .chunks_exact(SAMPLE_BYTES)
        .map(|chunk| {
            let raw = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            clip_to_i16(raw)
        })
        .collect();

    Array2::from_shape_vec((rows, cols), samples).map_err(|_| InstrumentError::ImageShape {
        path: path.to_path_buf(),
        expected,
        actual: bytes.len(),
    })
}

#[allow(clippy::cast_possible_truncation)]
fn clip_to_i16(value: i32) -> i16 {
    value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}
