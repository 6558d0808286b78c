//! # Transport Reader
//!
//! Owns the serial connection. A background thread polls the port for inbound
//! bytes, assembles newline-terminated lines and pushes them, in order, through an
//! mpsc channel. The foreground writes through the same port handle, serialized
//! with a mutex so a `send` can run while a read is in flight.
//!
//! Every session ends with exactly one [`LinkEvent::Disconnected`], sent after the
//! last line of that session.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};
use serialport::SerialPort;

use crate::error::LinkError;
use crate::framing::LineBuffer;

/// Baud rates offered by the front-end.
pub const BAUD_RATES: [u32; 5] = [9600, 19200, 38400, 57600, 115200];

const READ_CHUNK: usize = 1024;

/// Byte-level access the reader needs from a port.
pub trait Port: Read + Write + Send {
    /// Bytes waiting in the input buffer.
    fn bytes_to_read(&self) -> io::Result<u32>;
}

impl Port for Box<dyn SerialPort> {
    fn bytes_to_read(&self) -> io::Result<u32> {
        SerialPort::bytes_to_read(self.as_ref()).map_err(io::Error::from)
    }
}

/// Tunables for the link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkConfig {
    /// Idle delay between polls when nothing is pending.
    pub poll_interval: Duration,
    /// Port-level read/write timeout.
    pub port_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            port_timeout: Duration::from_millis(100),
        }
    }
}

/// A serial endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub path: String,
    pub baud: u32,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ {} baud", self.path, self.baud)
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `disconnect()` was called.
    User,
    /// The port failed while polling.
    Lost(String),
}

/// Events produced by the reader thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// One received line, terminator and surrounding whitespace removed.
    Line(String),
    Disconnected(DisconnectReason),
}

type SharedPort = Arc<Mutex<Box<dyn Port>>>;

struct Session {
    endpoint: Endpoint,
    port: SharedPort,
    running: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

/// The serial connection plus its reader thread.
///
/// The event receiver returned by [`SerialLink::new`] outlives individual
/// connections, so the same stream resumes after a reconnect.
pub struct SerialLink {
    config: LinkConfig,
    events: Sender<LinkEvent>,
    session: Option<Session>,
}

impl SerialLink {
    /// Creates a closed link and the receiving end of its event stream.
    pub fn new(config: LinkConfig) -> (Self, Receiver<LinkEvent>) {
        let (events, rx) = mpsc::channel();
        let link = Self {
            config,
            events,
            session: None,
        };
        (link, rx)
    }

    /// Opens a serial device and starts the reader.
    ///
    /// Any previous session is closed first.
    pub fn connect(&mut self, path: &str, baud: u32) -> Result<&Endpoint, LinkError> {
        self.disconnect();
        let port = serialport::new(path, baud)
            .timeout(self.config.port_timeout)
            .open()
            .map_err(|source| LinkError::Connection {
                path: path.to_string(),
                baud,
                source,
            })?;
        let endpoint = Endpoint {
            path: path.to_string(),
            baud,
        };
        Ok(self.attach(endpoint, Box::new(port)))
    }

    /// Starts a session over an already-open port.
    pub fn attach(&mut self, endpoint: Endpoint, port: Box<dyn Port>) -> &Endpoint {
        self.disconnect();
        info!("Connected to {}", endpoint);

        let port: SharedPort = Arc::new(Mutex::new(port));
        let running = Arc::new(AtomicBool::new(true));
        let reader = {
            let port = Arc::clone(&port);
            let running = Arc::clone(&running);
            let events = self.events.clone();
            let poll_interval = self.config.poll_interval;
            thread::spawn(move || read_loop(port, running, events, poll_interval))
        };

        let session = self.session.insert(Session {
            endpoint,
            port,
            running,
            reader: Some(reader),
        });
        &session.endpoint
    }

    /// True while a session is open and its reader has not failed.
    pub fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| s.running.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.session.as_ref().map(|s| &s.endpoint)
    }

    /// Writes `line` plus `\n` as a single write.
    pub fn send(&self, line: &str) -> Result<(), LinkError> {
        let session = match &self.session {
            Some(s) if s.running.load(Ordering::Acquire) => s,
            _ => return Err(LinkError::NotConnected),
        };
        let frame = format!("{}\n", line);
        let mut port = session
            .port
            .lock()
            .map_err(|_| LinkError::Write(io::Error::new(io::ErrorKind::Other, "port lock poisoned")))?;
        port.write_all(frame.as_bytes()).map_err(LinkError::Write)?;
        port.flush().map_err(LinkError::Write)?;
        debug!("TX: {}", line);
        Ok(())
    }

    /// Stops the reader and releases the port. Calling it again is a no-op.
    pub fn disconnect(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.running.store(false, Ordering::Release);
        if let Some(reader) = session.reader.take() {
            if reader.join().is_err() {
                warn!("Reader thread for {} panicked", session.endpoint);
            }
        }
        info!("Disconnected from {}", session.endpoint);
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Reads whatever is pending without blocking on an empty port.
fn read_available(port: &mut dyn Port, buf: &mut [u8]) -> io::Result<usize> {
    let pending = port.bytes_to_read()? as usize;
    if pending == 0 {
        return Ok(0);
    }
    let len = pending.min(buf.len());
    match port.read(&mut buf[..len]) {
        Ok(n) => Ok(n),
        Err(ref e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
        Err(e) => Err(e),
    }
}

fn poll_once(port: &SharedPort, buf: &mut [u8]) -> io::Result<usize> {
    let mut guard = port
        .lock()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "port lock poisoned"))?;
    read_available(&mut **guard, buf)
}

fn read_loop(
    port: SharedPort,
    running: Arc<AtomicBool>,
    events: Sender<LinkEvent>,
    poll_interval: Duration,
) {
    let mut framer = LineBuffer::new();
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        // After a stop request the port is drained until empty before signalling.
        let stopping = !running.load(Ordering::Acquire);

        match poll_once(&port, &mut buf) {
            Ok(0) if stopping => break,
            Ok(0) => thread::sleep(poll_interval),
            Ok(n) => {
                for line in framer.push(&buf[..n]) {
                    debug!("RX: {}", line);
                    if events.send(LinkEvent::Line(line)).is_err() {
                        running.store(false, Ordering::Release);
                        return;
                    }
                }
            }
            Err(e) => {
                running.store(false, Ordering::Release);
                error!("Read error: {}", e);
                let _ = events.send(LinkEvent::Disconnected(DisconnectReason::Lost(e.to_string())));
                return;
            }
        }
    }

    if framer.pending() > 0 {
        debug!("Dropping {} bytes of unterminated input", framer.pending());
    }
    let _ = events.send(LinkEvent::Disconnected(DisconnectReason::User));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Instant;

    #[derive(Clone, Default)]
    struct MockPort {
        incoming: Arc<Mutex<VecDeque<u8>>>,
        written: Arc<Mutex<Vec<u8>>>,
        broken: Arc<AtomicBool>,
    }

    impl MockPort {
        fn feed(&self, bytes: &[u8]) {
            self.incoming.lock().unwrap().extend(bytes.iter().copied());
        }
    }

    impl Read for MockPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut incoming = self.incoming.lock().unwrap();
            let n = buf.len().min(incoming.len());
            for slot in buf.iter_mut().take(n) {
                *slot = incoming.pop_front().unwrap();
            }
            Ok(n)
        }
    }

    impl Write for MockPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Port for MockPort {
        fn bytes_to_read(&self) -> io::Result<u32> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
            }
            Ok(self.incoming.lock().unwrap().len() as u32)
        }
    }

    fn endpoint() -> Endpoint {
        Endpoint {
            path: "COM_TEST".into(),
            baud: 9600,
        }
    }

    fn next(rx: &Receiver<LinkEvent>) -> LinkEvent {
        rx.recv_timeout(Duration::from_secs(2)).expect("event")
    }

    #[test]
    fn send_without_connection_fails() {
        let (link, _rx) = SerialLink::new(LinkConfig::default());
        assert!(matches!(link.send("*IDN?"), Err(LinkError::NotConnected)));
    }

    #[test]
    fn send_appends_terminator() {
        let (mut link, _rx) = SerialLink::new(LinkConfig::default());
        let port = MockPort::default();
        link.attach(endpoint(), Box::new(port.clone()));
        link.send("AIN:ALL?").unwrap();
        link.send("*RST").unwrap();
        assert_eq!(port.written.lock().unwrap().as_slice(), b"AIN:ALL?\n*RST\n");
    }

    #[test]
    fn delivers_lines_in_order() {
        let (mut link, rx) = SerialLink::new(LinkConfig::default());
        let port = MockPort::default();
        link.attach(endpoint(), Box::new(port.clone()));
        port.feed(b"first\nsec");
        assert_eq!(next(&rx), LinkEvent::Line("first".into()));
        port.feed(b"ond\r\nthird\n");
        assert_eq!(next(&rx), LinkEvent::Line("second".into()));
        assert_eq!(next(&rx), LinkEvent::Line("third".into()));
    }

    #[test]
    fn disconnect_drains_pending_lines_then_signals_once() {
        let (mut link, rx) = SerialLink::new(LinkConfig {
            poll_interval: Duration::from_millis(50),
            ..LinkConfig::default()
        });
        let port = MockPort::default();
        link.attach(endpoint(), Box::new(port.clone()));
        port.feed(b"1\n2\n3\n");
        link.disconnect();
        link.disconnect();

        let events: Vec<LinkEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                LinkEvent::Line("1".into()),
                LinkEvent::Line("2".into()),
                LinkEvent::Line("3".into()),
                LinkEvent::Disconnected(DisconnectReason::User),
            ]
        );
        assert!(!link.is_connected());
        assert!(matches!(link.send("*IDN?"), Err(LinkError::NotConnected)));
    }

    #[test]
    fn disconnect_drains_more_than_one_read() {
        let (mut link, rx) = SerialLink::new(LinkConfig {
            poll_interval: Duration::from_millis(200),
            ..LinkConfig::default()
        });
        let port = MockPort::default();
        link.attach(endpoint(), Box::new(port.clone()));
        // Let the reader go idle before the burst arrives.
        thread::sleep(Duration::from_millis(50));

        let burst: String = (0..400).map(|i| format!("CH1:{},CH2:{}\n", i, i)).collect();
        assert!(burst.len() > READ_CHUNK * 4);
        port.feed(burst.as_bytes());
        link.disconnect();

        let events: Vec<LinkEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 401);
        assert_eq!(events[0], LinkEvent::Line("CH1:0,CH2:0".into()));
        assert_eq!(events[399], LinkEvent::Line("CH1:399,CH2:399".into()));
        assert_eq!(events[400], LinkEvent::Disconnected(DisconnectReason::User));
        assert!(port.incoming.lock().unwrap().is_empty());
    }

    #[test]
    fn idle_disconnect_returns_within_one_poll_interval() {
        let poll_interval = Duration::from_millis(200);
        let (mut link, rx) = SerialLink::new(LinkConfig {
            poll_interval,
            ..LinkConfig::default()
        });
        link.attach(endpoint(), Box::new(MockPort::default()));
        thread::sleep(Duration::from_millis(20));

        let started = Instant::now();
        link.disconnect();
        assert!(started.elapsed() < poll_interval + Duration::from_millis(150));
        assert_eq!(next(&rx), LinkEvent::Disconnected(DisconnectReason::User));
    }

    #[test]
    fn read_failure_signals_lost_and_closes() {
        let (mut link, rx) = SerialLink::new(LinkConfig::default());
        let port = MockPort::default();
        link.attach(endpoint(), Box::new(port.clone()));
        port.feed(b"42\n");
        assert_eq!(next(&rx), LinkEvent::Line("42".into()));
        port.broken.store(true, Ordering::SeqCst);
        match next(&rx) {
            LinkEvent::Disconnected(DisconnectReason::Lost(msg)) => assert!(msg.contains("unplugged")),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(!link.is_connected());
        assert!(matches!(link.send("*IDN?"), Err(LinkError::NotConnected)));

        // Cleaning up a lost session emits nothing further.
        link.disconnect();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn reconnect_reuses_event_stream() {
        let (mut link, rx) = SerialLink::new(LinkConfig::default());
        let first = MockPort::default();
        link.attach(endpoint(), Box::new(first.clone()));
        let second = MockPort::default();
        link.attach(endpoint(), Box::new(second.clone()));
        assert_eq!(next(&rx), LinkEvent::Disconnected(DisconnectReason::User));
        second.feed(b"hello\n");
        assert_eq!(next(&rx), LinkEvent::Line("hello".into()));
        assert_eq!(link.endpoint(), Some(&endpoint()));
    }
}
