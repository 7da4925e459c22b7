//! Serial transport machinery.
//!
//! The OS-specific part of talking to a serial port lives behind two small
//! traits: [`SerialPort`] (blocking read/write on an open port) and
//! [`SerialPortProvider`] (enumeration and opening). Platform crates
//! implement those; everything above them is here and portable:
//! [`SerialTransport`] runs a single background reader thread that polls
//! the port at a fixed interval and hands whole message buffers to the
//! session through a bounded queue.
//!
//! The queue is bounded in **messages**, not bytes. When it is full the
//! newest message is dropped and the overflow is reported as a
//! [`TransportEvent::Lagged`] delivery ahead of the next data; the reader
//! thread itself never blocks on a slow consumer.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::{
    error::TransportError,
    transport::{Transport, TransportEvent, TransportKind},
};

/// Default baud rate for gateway devices.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Default poll interval for the reader thread. Bounds worst-case receive
/// latency; lower costs CPU, higher costs latency.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Default reader buffer per poll.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 512;

/// Default message-queue depth between the reader thread and the session.
pub const DEFAULT_MAX_PENDING_MESSAGES: usize = 16;

/// Parity setting for the serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,
    /// Even parity.
    Even,
    /// Odd parity.
    Odd,
}

/// One enumerated serial device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialDeviceInfo {
    /// OS port name, e.g. `/dev/ttyUSB0` or `COM3`.
    pub port_name: String,
    /// Human-readable device description.
    pub friendly_name: String,
}

/// Serial line configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// OS port name.
    pub port: String,
    /// Baud rate.
    pub baud: u32,
    /// Data bits per character.
    pub data_bits: u8,
    /// Parity setting.
    pub parity: Parity,
    /// Stop bits, 1 or 2.
    pub stop_bits: u8,
    /// Reader buffer per poll, in bytes.
    pub read_buffer_size: usize,
    /// Reader poll interval.
    pub read_timeout: Duration,
    /// Message-queue depth between reader and session.
    pub max_pending_messages: usize,
}

impl SerialConfig {
    /// Configuration for `port` with gateway defaults (115200 8N1).
    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud: DEFAULT_BAUD,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_pending_messages: DEFAULT_MAX_PENDING_MESSAGES,
        }
    }
}

/// Blocking I/O on one open serial port. Implemented by platform glue.
pub trait SerialPort: Send + Sized + 'static {
    /// Read up to `buf.len()` bytes, waiting at most `timeout`. `Ok(0)`
    /// means the interval elapsed without data.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    /// Write all of `bytes` to the port.
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Clone the handle so reads and writes can proceed from different
    /// threads.
    fn try_clone(&self) -> io::Result<Self>;
}

/// Enumerates and opens serial ports. Implemented by platform glue.
pub trait SerialPortProvider {
    /// Port type this provider opens.
    type Port: SerialPort;

    /// List attached serial devices.
    fn enumerate(&self) -> io::Result<Vec<SerialDeviceInfo>>;

    /// Open and configure a port.
    fn open(&self, config: &SerialConfig) -> io::Result<Self::Port>;
}

/// List attached serial devices through platform glue.
pub fn enumerate_serial_devices<P: SerialPortProvider>(
    provider: &P,
) -> Result<Vec<SerialDeviceInfo>, TransportError> {
    provider.enumerate().map_err(|e| TransportError::Open(e.to_string()))
}

/// Message-buffered transport over a [`SerialPort`].
#[derive(Debug)]
pub struct SerialTransport<P: SerialPort> {
    writer: P,
    rx: mpsc::Receiver<Bytes>,
    dropped: Arc<AtomicU64>,
    stop: Arc<AtomicBool>,
    reader: Option<thread::JoinHandle<()>>,
    open: bool,
}

impl<P: SerialPort> SerialTransport<P> {
    /// Start the reader thread over an already-opened port.
    pub fn start(port: P, config: &SerialConfig) -> Result<Self, TransportError> {
        let reader_port = port.try_clone().map_err(|e| TransportError::Open(e.to_string()))?;
        let (tx, rx) = mpsc::channel(config.max_pending_messages.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let stop = Arc::new(AtomicBool::new(false));

        let reader = thread::Builder::new()
            .name("serial-reader".into())
            .spawn({
                let dropped = Arc::clone(&dropped);
                let stop = Arc::clone(&stop);
                let read_buffer_size = config.read_buffer_size.max(1);
                let read_timeout = config.read_timeout;
                move || read_loop(reader_port, &tx, &dropped, &stop, read_buffer_size, read_timeout)
            })
            .map_err(|e| TransportError::Open(e.to_string()))?;

        Ok(Self { writer: port, rx, dropped, stop, reader: Some(reader), open: true })
    }
}

/// Body of the reader thread: poll, push, never block on the queue.
fn read_loop<P: SerialPort>(
    mut port: P,
    tx: &mpsc::Sender<Bytes>,
    dropped: &AtomicU64,
    stop: &AtomicBool,
    read_buffer_size: usize,
    read_timeout: Duration,
) {
    let mut buf = vec![0u8; read_buffer_size];
    while !stop.load(Ordering::Relaxed) {
        match port.read(&mut buf, read_timeout) {
            Ok(0) => {},
            Ok(n) => match tx.try_send(Bytes::copy_from_slice(&buf[..n])) {
                Ok(()) => {},
                Err(mpsc::error::TrySendError::Full(_)) => {
                    dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("serial message queue full, dropping newest message");
                },
                Err(mpsc::error::TrySendError::Closed(_)) => break,
            },
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {},
            Err(e) => {
                tracing::error!(error = %e, "serial read failed, stopping reader");
                break;
            },
        }
    }
    // Dropping `tx` lets the session observe end-of-stream.
}

impl<P: SerialPort> Transport for SerialTransport<P> {
    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        // Writes land in the OS buffer; at gateway frame sizes this does
        // not stall the runtime.
        self.writer.write_all(bytes)?;
        Ok(bytes.len())
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        if !self.open {
            return None;
        }
        let dropped = self.dropped.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            return Some(TransportEvent::Lagged(dropped));
        }
        match self.rx.recv().await {
            Some(bytes) => Some(TransportEvent::Data(bytes)),
            None => {
                self.open = false;
                None
            },
        }
    }

    async fn close(&mut self) {
        self.open = false;
        self.stop.store(true, Ordering::Relaxed);
        self.rx.close();
        if let Some(reader) = self.reader.take() {
            // The reader observes the stop flag within one poll interval.
            let _ = reader.join();
        }
    }
}

impl<P: SerialPort> Drop for SerialTransport<P> {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// In-memory port: reads pop from a shared script, writes accumulate.
    #[derive(Debug)]
    struct FakePort {
        incoming: Arc<Mutex<Vec<Vec<u8>>>>,
        written: Arc<Mutex<Vec<u8>>>,
    }

    impl FakePort {
        fn new() -> Self {
            Self {
                incoming: Arc::new(Mutex::new(Vec::new())),
                written: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn push_incoming(&self, bytes: &[u8]) {
            self.incoming.lock().unwrap().push(bytes.to_vec());
        }
    }

    impl SerialPort for FakePort {
        fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
            let next = self.incoming.lock().unwrap().pop();
            match next {
                Some(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    Ok(n)
                },
                None => {
                    thread::sleep(timeout);
                    Ok(0)
                },
            }
        }

        fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.written.lock().unwrap().extend_from_slice(bytes);
            Ok(())
        }

        fn try_clone(&self) -> io::Result<Self> {
            Ok(Self {
                incoming: Arc::clone(&self.incoming),
                written: Arc::clone(&self.written),
            })
        }
    }

    fn test_config() -> SerialConfig {
        let mut config = SerialConfig::new("fake0");
        config.read_timeout = Duration::from_millis(1);
        config
    }

    #[tokio::test]
    async fn reader_delivers_messages() {
        let port = FakePort::new();
        port.push_incoming(&[0x10, 0x02, 0xAA]);

        let mut transport = SerialTransport::start(port, &test_config()).unwrap();
        assert_eq!(transport.kind(), TransportKind::Serial);
        assert_eq!(
            transport.recv().await,
            Some(TransportEvent::Data(Bytes::from_static(&[0x10, 0x02, 0xAA])))
        );
        transport.close().await;
    }

    #[tokio::test]
    async fn writes_reach_the_port() {
        let port = FakePort::new();
        let written = Arc::clone(&port.written);

        let mut transport = SerialTransport::start(port, &test_config()).unwrap();
        transport.send(&[0x10, 0x02, 0x11]).await.unwrap();
        assert_eq!(written.lock().unwrap().as_slice(), &[0x10, 0x02, 0x11]);
        transport.close().await;
    }

    #[tokio::test]
    async fn close_stops_the_reader() {
        let port = FakePort::new();
        let mut transport = SerialTransport::start(port, &test_config()).unwrap();
        transport.close().await;
        assert!(!transport.is_open());
        assert_eq!(transport.recv().await, None);
        assert!(matches!(transport.send(&[1]).await, Err(TransportError::Closed)));
    }

    #[test]
    fn config_defaults() {
        let config = SerialConfig::new("/dev/ttyUSB0");
        assert_eq!(config.baud, DEFAULT_BAUD);
        assert_eq!(config.data_bits, 8);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, 1);
        assert_eq!(config.max_pending_messages, DEFAULT_MAX_PENDING_MESSAGES);
    }
}
