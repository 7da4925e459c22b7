//! Session orchestration.
//!
//! A [`Session`] wires one transport through the decode stack and out to
//! the user: received chunks feed the framer/datagram/message layers,
//! decoded traffic is delivered in arrival order on a bounded event
//! channel, recoverable violations on a separate fault channel. Command
//! traffic runs through the shared [`Correlator`]: callers await a
//! response future while the receive task matches replies and sweeps
//! timeouts.
//!
//! One spawned task owns the transport, the parser state, and the write
//! queue. Callers never touch the transport directly; sends are queued to
//! the task and acknowledged once written. Between receive polls the task
//! flushes queued writes and runs the timeout sweep, so worst-case
//! timeout overshoot is one sweep interval plus one receive poll.
//!
//! A response that correlates a pending request completes that request
//! and is not delivered as an event; responses nothing is waiting for are
//! delivered as unsolicited events.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use tidelink_proto::{
    bem, encode_frame, BemCommand, BemResponse, BstMessage, FramerConfig, ProtocolError,
    StreamDecoder, StreamEvent, SystemStatus, DEFAULT_MAX_FRAME_SIZE,
};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{
    correlator::Correlator,
    device,
    error::{CancelReason, ClientError, TransportError},
    event::{GatewayEvent, ParsedMessage},
    serial::{SerialConfig, SerialPortProvider, SerialTransport},
    transport::{Transport, TransportEvent},
};

/// Default timeout for command requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout-sweep cadence; also the receive-poll granularity.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Default event-channel depth.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Default fault-channel depth.
pub const DEFAULT_FAULT_CAPACITY: usize = 32;

/// Default write-queue depth.
const OUTGOING_CAPACITY: usize = 16;

/// Session tuning knobs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum accepted frame payload. Raise for large Type 2 traffic.
    pub max_frame_size: usize,
    /// Timeout applied when a command caller does not supply one.
    pub default_request_timeout: Duration,
    /// Timeout-sweep cadence. Also bounds how long a queued write waits
    /// while the line is idle.
    pub sweep_interval: Duration,
    /// Event-channel depth. A full channel backpressures the receive
    /// task until the consumer catches up.
    pub event_capacity: usize,
    /// Fault-channel depth. A full channel drops fault reports rather
    /// than stalling parsing.
    pub fault_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            default_request_timeout: DEFAULT_REQUEST_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            fault_capacity: DEFAULT_FAULT_CAPACITY,
        }
    }
}

/// Framing applied by [`Session::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendProtocol {
    /// Wrap the payload in stream framing.
    Bdtp,
    /// Wrap the payload in stream framing (alias kept for callers that
    /// think in datagrams).
    Bst,
    /// Write the bytes untouched.
    Raw,
}

/// Snapshot of a session's traffic counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionCounters {
    /// Datagrams decoded successfully.
    pub frames_received: u64,
    /// Command responses among them.
    pub bem_responses_received: u64,
    /// Frames dropped for framing or checksum violations.
    pub frames_dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    frames_received: AtomicU64,
    bem_responses_received: AtomicU64,
    frames_dropped: AtomicU64,
}

/// Receiving ends a session delivers on: decoded traffic and recoverable
/// faults.
#[derive(Debug)]
pub struct SessionChannels {
    /// Decoded messages and device status, in arrival order.
    pub events: mpsc::Receiver<GatewayEvent>,
    /// Non-fatal protocol violations and overflow reports. A terminal
    /// transport failure arrives here once, right before the channels
    /// close.
    pub faults: mpsc::Receiver<ClientError>,
}

enum Outgoing {
    Write { bytes: Vec<u8>, ack: Option<oneshot::Sender<Result<(), ClientError>>> },
    Close,
}

/// Handle to one gateway session.
///
/// Dropping the handle tears the session down: the receive task stops,
/// the transport closes, and every pending request fails with
/// `Canceled`.
#[derive(Debug)]
pub struct Session {
    outgoing: mpsc::Sender<Outgoing>,
    correlator: Arc<Correlator>,
    counters: Arc<Counters>,
    connected: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
    default_timeout: Duration,
}

impl Session {
    /// Start a session over an already-open transport.
    ///
    /// Must be called within a tokio runtime; the receive task is spawned
    /// immediately.
    pub fn open<T: Transport>(transport: T, config: SessionConfig) -> (Self, SessionChannels) {
        let (events_tx, events_rx) = mpsc::channel(config.event_capacity.max(1));
        let (faults_tx, faults_rx) = mpsc::channel(config.fault_capacity.max(1));
        let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTGOING_CAPACITY);

        let correlator = Arc::new(Correlator::new());
        let counters = Arc::new(Counters::default());
        let connected = Arc::new(AtomicBool::new(true));
        let default_timeout = config.default_request_timeout;

        let task = tokio::spawn(run_loop(
            transport,
            outgoing_rx,
            events_tx,
            faults_tx,
            Arc::clone(&correlator),
            Arc::clone(&counters),
            Arc::clone(&connected),
            config,
        ));

        (
            Self {
                outgoing: outgoing_tx,
                correlator,
                counters,
                connected,
                task: Some(task),
                default_timeout,
            },
            SessionChannels { events: events_rx, faults: faults_rx },
        )
    }

    /// Open a serial device through platform glue and start a session
    /// over it.
    pub fn open_serial<P: SerialPortProvider>(
        provider: &P,
        serial: &SerialConfig,
        config: SessionConfig,
    ) -> Result<(Self, SessionChannels), ClientError> {
        let port = provider
            .open(serial)
            .map_err(|e| ClientError::TransportOpenFailed { reason: e.to_string() })?;
        let transport = SerialTransport::start(port, serial)?;
        Ok(Self::open(transport, config))
    }

    /// Send raw or framed bytes, completing once they are written to the
    /// transport.
    pub async fn send(&self, protocol: SendProtocol, payload: &[u8]) -> Result<(), ClientError> {
        let bytes = match protocol {
            SendProtocol::Bdtp | SendProtocol::Bst => encode_frame(payload),
            SendProtocol::Raw => payload.to_vec(),
        };
        self.write(bytes).await
    }

    /// Queue bytes to the receive task and await the write
    /// acknowledgment. A closed queue or a dropped ack both mean the
    /// session is gone.
    async fn write(&self, bytes: Vec<u8>) -> Result<(), ClientError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.outgoing
            .send(Outgoing::Write { bytes, ack: Some(ack_tx) })
            .await
            .map_err(|_| ClientError::TransportClosed)?;
        ack_rx.await.map_err(|_| ClientError::TransportClosed)?
    }

    /// Issue a command and await its correlated response.
    ///
    /// The request is registered before the write goes out, so a reply
    /// racing the write acknowledgment still correlates. Exactly one of
    /// response, timeout, or cancellation resolves the future. A device
    /// answering with a non-zero result code resolves it with
    /// [`ClientError::DeviceError`] carrying the full decoded response.
    pub async fn send_bem_command(
        &self,
        command: &BemCommand,
        timeout: Option<Duration>,
    ) -> Result<BemResponse, ClientError> {
        let datagram = command
            .to_datagram()
            .map_err(|e| ClientError::InvalidArgument(e.to_string()))?;
        let wire = encode_frame(&datagram.encode());
        let timeout = timeout.unwrap_or(self.default_timeout);

        let (tx, rx) = oneshot::channel();
        let sequence = self.correlator.register(command.bst_id, command.bem_id, timeout, tx);
        tracing::debug!(
            bem_id = command.bem_id,
            sequence,
            ?timeout,
            "command registered, writing"
        );

        if let Err(err) = self.write(wire).await {
            // The pending entry is useless if the bytes never left; fail
            // it unless a racing sweep got there first.
            self.correlator.fail(command.bst_id, command.bem_id, err);
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Canceled(CancelReason::SessionClosed)),
        }
    }

    /// Read the device operating mode.
    pub async fn get_operating_mode(&self, timeout: Option<Duration>) -> Result<u16, ClientError> {
        let response = self.send_bem_command(&BemCommand::get_operating_mode(), timeout).await?;
        response.operating_mode().ok_or(ClientError::Protocol(ProtocolError::ResponseTooShort {
            len: response.data.len(),
            expected: 2,
        }))
    }

    /// Change the device operating mode.
    pub async fn set_operating_mode(
        &self,
        mode: u16,
        timeout: Option<Duration>,
    ) -> Result<BemResponse, ClientError> {
        self.send_bem_command(&BemCommand::set_operating_mode(mode), timeout).await
    }

    /// Fail every in-flight request with `Canceled` without closing the
    /// session.
    pub fn cancel_all(&self) {
        self.correlator.clear_all(CancelReason::Explicit);
    }

    /// Shut the session down: stop the receive task, close the transport,
    /// cancel pending requests. Idempotent; returns once the receive task
    /// has exited.
    pub async fn close(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = self.outgoing.send(Outgoing::Close).await;
            let _ = task.await;
        }
    }

    /// True until the transport closes or the session is shut down.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Snapshot of the traffic counters.
    #[must_use]
    pub fn counters(&self) -> SessionCounters {
        SessionCounters {
            frames_received: self.counters.frames_received.load(Ordering::Relaxed),
            bem_responses_received: self.counters.bem_responses_received.load(Ordering::Relaxed),
            frames_dropped: self.counters.frames_dropped.load(Ordering::Relaxed),
        }
    }

    /// Number of requests currently awaiting a response.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.correlator.pending_len()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = self.outgoing.try_send(Outgoing::Close);
            task.abort();
            self.connected.store(false, Ordering::Relaxed);
            self.correlator.clear_all(CancelReason::SessionClosed);
        }
    }
}

/// Receive task: flush writes, poll the transport, dispatch, sweep.
#[allow(clippy::too_many_arguments)]
async fn run_loop<T: Transport>(
    mut transport: T,
    mut outgoing: mpsc::Receiver<Outgoing>,
    events: mpsc::Sender<GatewayEvent>,
    faults: mpsc::Sender<ClientError>,
    correlator: Arc<Correlator>,
    counters: Arc<Counters>,
    connected: Arc<AtomicBool>,
    config: SessionConfig,
) {
    let mut decoder = StreamDecoder::new(FramerConfig { max_frame_size: config.max_frame_size });

    'session: loop {
        // Drain queued writes before parking in receive.
        loop {
            match outgoing.try_recv() {
                Ok(Outgoing::Write { bytes, ack }) => match transport.send(&bytes).await {
                    Ok(_) => {
                        if let Some(ack) = ack {
                            let _ = ack.send(Ok(()));
                        }
                    },
                    Err(TransportError::RateLimited { dropped }) => {
                        report_fault(&faults, ClientError::RateLimited { dropped });
                        if let Some(ack) = ack {
                            let _ = ack.send(Err(ClientError::RateLimited { dropped }));
                        }
                    },
                    Err(e) => {
                        let err = ClientError::from(e);
                        if let Some(ack) = ack {
                            let _ = ack.send(Err(err.clone()));
                        }
                        report_fault(&faults, err);
                        break 'session;
                    },
                },
                Ok(Outgoing::Close) => break 'session,
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => break 'session,
            }
        }

        match tokio::time::timeout(config.sweep_interval, transport.recv()).await {
            Ok(Some(TransportEvent::Data(chunk))) => {
                for event in decoder.push(&chunk) {
                    dispatch(event, &events, &faults, &correlator, &counters).await;
                }
            },
            Ok(Some(TransportEvent::Lagged(dropped))) => {
                report_fault(&faults, ClientError::RateLimited { dropped });
            },
            Ok(None) => {
                report_fault(&faults, ClientError::TransportClosed);
                break 'session;
            },
            Err(_elapsed) => {},
        }

        correlator.process_timeouts(Instant::now());
    }

    connected.store(false, Ordering::Relaxed);
    transport.close().await;
    correlator.clear_all(CancelReason::SessionClosed);
    tracing::debug!("session receive task stopped");
}

/// Route one decode output: correlate responses, deliver events, report
/// violations.
async fn dispatch(
    event: StreamEvent,
    events: &mpsc::Sender<GatewayEvent>,
    faults: &mpsc::Sender<ClientError>,
    correlator: &Correlator,
    counters: &Counters,
) {
    match event {
        StreamEvent::Message(message) => {
            counters.frames_received.fetch_add(1, Ordering::Relaxed);
            match message {
                BstMessage::BemResponse(response) => {
                    counters.bem_responses_received.fetch_add(1, Ordering::Relaxed);
                    if let Some(responder) = correlator.correlate(&response) {
                        let result = match response.header.error_code() {
                            0 => Ok(response),
                            code => Err(ClientError::DeviceError { code, response }),
                        };
                        let _ = responder.send(result);
                    } else {
                        deliver_unsolicited(response, events, faults).await;
                    }
                },
                BstMessage::Datagram(datagram) => {
                    report_fault(
                        faults,
                        ClientError::Protocol(ProtocolError::UnsupportedBstId(datagram.bst_id)),
                    );
                    let _ = events
                        .send(GatewayEvent::Message(ParsedMessage::from(BstMessage::Datagram(
                            datagram,
                        ))))
                        .await;
                },
                other => {
                    let _ = events.send(GatewayEvent::Message(ParsedMessage::from(other))).await;
                },
            }
        },
        StreamEvent::Malformed(err) => {
            counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
            report_fault(faults, ClientError::Protocol(err));
        },
    }
}

/// Deliver a response nothing was waiting for, expanding status reports
/// into device-status events.
async fn deliver_unsolicited(
    response: BemResponse,
    events: &mpsc::Sender<GatewayEvent>,
    faults: &mpsc::Sender<ClientError>,
) {
    let bem_id = response.header.bem_id();
    let model_id = response.header.model_id();
    let status =
        (bem_id == bem::bem_id::SYSTEM_STATUS).then(|| SystemStatus::decode(&response.data));

    let _ = events
        .send(GatewayEvent::Message(ParsedMessage::from(BstMessage::BemResponse(response))))
        .await;

    if bem_id == bem::bem_id::STARTUP_STATUS {
        let _ = events
            .send(GatewayEvent::DeviceStatus {
                key: "model",
                value: device::model_name(model_id).into_owned(),
            })
            .await;
    }

    match status {
        Some(Ok(status)) => {
            if let Some(mode) = status.operating_mode {
                let _ = events
                    .send(GatewayEvent::DeviceStatus {
                        key: "operating_mode",
                        value: device::operating_mode_name(mode).into_owned(),
                    })
                    .await;
            }
            if let Some(can) = status.can {
                let _ = events
                    .send(GatewayEvent::DeviceStatus {
                        key: "can_rx_errors",
                        value: can.rx_errors.to_string(),
                    })
                    .await;
                let _ = events
                    .send(GatewayEvent::DeviceStatus {
                        key: "can_tx_errors",
                        value: can.tx_errors.to_string(),
                    })
                    .await;
            }
        },
        Some(Err(err)) => report_fault(faults, ClientError::Protocol(err)),
        None => {},
    }
}

/// Fault reports must never stall parsing: drop on overflow.
fn report_fault(faults: &mpsc::Sender<ClientError>, err: ClientError) {
    if faults.try_send(err).is_err() {
        tracing::warn!("fault channel full, dropping fault report");
    }
}
