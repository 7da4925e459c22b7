//! Host-side gateway session layer.
//!
//! Sits on top of [`tidelink_proto`] and owns everything stateful about
//! talking to a live device: the transport, the receive task, request
//! correlation, and event delivery.
//!
//! # Architecture
//!
//! - [`Transport`]: the byte-moving boundary. In-tree implementations
//!   cover loopback pairs ([`loopback`]), connected UDP ([`UdpTransport`]),
//!   and serial ports via platform glue ([`SerialTransport`] over a
//!   [`SerialPort`] implementation).
//! - [`Correlator`]: thread-safe map of in-flight commands keyed by
//!   `(response BST ID, command ID)`, with timeout sweeps and
//!   cancellation.
//! - [`Session`]: spawns the receive task, feeds received bytes through
//!   the decode stack, completes pending requests, and delivers
//!   everything else on the [`SessionChannels`] event/fault receivers.
//!
//! # Example
//!
//! ```no_run
//! use tidelink_client::{loopback, Session, SessionConfig};
//!
//! # async fn demo() {
//! let (ours, _theirs) = loopback::pair(16);
//! let (session, mut channels) = Session::open(ours, SessionConfig::default());
//!
//! let mode = session.get_operating_mode(None).await;
//! while let Some(event) = channels.events.recv().await {
//!     // pattern-match decoded frames and device status here
//!     let _ = &event;
//! }
//! # let _ = mode;
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod correlator;
pub mod device;
mod error;
mod event;
pub mod loopback;
mod serial;
mod session;
mod transport;
mod udp;

pub use correlator::{Correlator, PendingKey, Responder};
pub use error::{CancelReason, ClientError, TransportError};
pub use event::{GatewayEvent, ParsedMessage};
pub use loopback::LoopbackTransport;
pub use serial::{
    enumerate_serial_devices, Parity, SerialConfig, SerialDeviceInfo, SerialPort,
    SerialPortProvider, SerialTransport, DEFAULT_BAUD, DEFAULT_MAX_PENDING_MESSAGES,
    DEFAULT_READ_TIMEOUT,
};
pub use session::{
    SendProtocol, Session, SessionChannels, SessionConfig, SessionCounters,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_SWEEP_INTERVAL,
};
pub use transport::{Transport, TransportEvent, TransportKind};
pub use udp::UdpTransport;
