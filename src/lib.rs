//! # uedinst
//!
//! Instrument adapters for the ultrafast electron diffraction lab. Two
//! independent components live here:
//!
//! - **Camera**: a TCP client for the Gatan Ultrascan 895 camera server
//!   hosted in DigitalMicrograph. Commands are short ASCII strings answered
//!   with `OK`/`ERR`; images come back through a shared raw file.
//! - **DAQ**: voltage I/O on an analog card, with a ±10 V envelope and an
//!   optional timed auto-reset to 0 V.
//!
//! ## Crate Structure
//!
//! - **`link`**: `InstrumentLink`, one owned TCP socket with send/receive/close.
//! - **`protocol`**: `CommandProtocol`, request framing, reply decoding, and
//!   the post-send wait used by long-running remote operations.
//! - **`camera`**: `CameraController`, connection lifecycle, version check,
//!   insert/retract and image acquisition.
//! - **`daq`**: `VoltageChannel` over the `AnalogDriver` seam, plus a
//!   simulated driver.
//! - **`validation`**: pure precondition checks (voltage, timeouts, addresses).
//! - **`deadline`**: caller-side timeouts for operations that never cancel
//!   themselves.
//! - **`config`**: Figment-based configuration (TOML + `UEDINST_` env vars).
//! - **`logging`**: `tracing-subscriber` setup for the CLI.
//! - **`error`**: the `InstrumentError` enum shared by everything above.
//!
//! The whole crate is sequential: every operation is a single awaited round
//! trip, and the only waits are fixed-duration sleeps.

pub mod camera;
pub mod config;
pub mod daq;
pub mod deadline;
pub mod error;
pub mod link;
pub mod logging;
pub mod protocol;
pub mod validation;

pub use camera::{CameraController, CameraImage, ControllerState};
pub use daq::{AnalogDriver, SimulatedDaq, VoltageChannel};
pub use error::{InstrumentError, Result};
pub use protocol::{CommandProtocol, Reply};
