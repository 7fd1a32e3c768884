// src/io/serial/reader.rs
//
// Serial session: owns an open port handle, runs the blocking read loop that
// assembles frames, and services transmit requests against the same handle.
// Frames and faults are delivered to the consumer through a FrameStream.

use std::io::{ErrorKind, Read, Write};
use std::sync::mpsc as std_mpsc;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

use super::delimiter::DelimiterMode;
use super::framer::FrameAssembler;
use super::ports::PortHandle;
use crate::io::error::IoError;
use crate::io::types::{Frame, SessionEvent, SessionState, WriteResult};

// ============================================================================
// Types and Configuration
// ============================================================================

/// Tunables for one session, taken from BridgeConfig at open time
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionOptions {
    /// Port read timeout; bounds how long the loop takes to notice close
    pub read_timeout: Duration,
    /// How long `send` waits for the loop to complete a write
    pub write_timeout: Duration,
    pub transmit_queue_depth: usize,
    pub read_buffer_size: usize,
    pub max_frame_length: Option<usize>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            read_timeout: Duration::from_millis(10),
            write_timeout: Duration::from_millis(500),
            transmit_queue_depth: 32,
            read_buffer_size: 256,
            max_frame_length: None,
        }
    }
}

/// Transmit request sent to the read loop
struct TransmitRequest {
    data: Vec<u8>,
    /// Caller's deadline; the loop drops the request unwritten once it passes
    deadline: Instant,
    result_tx: oneshot::Sender<Result<(), String>>,
}

/// Why the read loop stopped
enum LoopEnd {
    Stopped,
    Fault(String),
}

// ============================================================================
// Frame Stream
// ============================================================================

/// Consumer end of a session. Yields frames in device order and ends once
/// the session leaves Open. A faulted session sends `SessionEvent::Fault` last.
#[derive(Debug)]
pub struct FrameStream {
    rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl FrameStream {
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }

    /// Next queued event without waiting
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.rx.try_recv().ok()
    }

    /// Everything queued right now, without waiting
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Only the frames from `drain`, dropping fault notices
    pub fn drain_frames(&mut self) -> Vec<Frame> {
        self.drain()
            .into_iter()
            .filter_map(|event| match event {
                SessionEvent::Frame(frame) => Some(frame),
                SessionEvent::Fault { .. } => None,
            })
            .collect()
    }
}

// ============================================================================
// Serial Session
// ============================================================================

/// One open port. Dropping the session stops its read loop.
pub struct SerialSession {
    port_name: String,
    state: Arc<Mutex<SessionState>>,
    cancel_flag: Arc<AtomicBool>,
    transmit_tx: std_mpsc::SyncSender<TransmitRequest>,
    delimiter_tx: std_mpsc::Sender<DelimiterMode>,
    task_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    write_timeout: Duration,
    read_timeout: Duration,
}

impl SerialSession {
    /// Take ownership of an open handle and start the read loop.
    /// Must be called from within a tokio runtime.
    pub fn start(
        port_name: String,
        handle: Box<dyn PortHandle>,
        mode: DelimiterMode,
        options: SessionOptions,
    ) -> (Self, FrameStream) {
        let state = Arc::new(Mutex::new(SessionState::Open));
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let (transmit_tx, transmit_rx) =
            std_mpsc::sync_channel::<TransmitRequest>(options.transmit_queue_depth.max(1));
        let (delimiter_tx, delimiter_rx) = std_mpsc::channel::<DelimiterMode>();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let write_timeout = options.write_timeout;
        let read_timeout = options.read_timeout;
        let lease = PortLease {
            name: port_name.clone(),
            handle,
        };
        let loop_state = state.clone();
        let loop_cancel = cancel_flag.clone();

        let task_handle = tokio::task::spawn_blocking(move || {
            run_read_loop(
                lease,
                mode,
                options,
                loop_cancel,
                loop_state,
                delimiter_rx,
                transmit_rx,
                events_tx,
            )
        });

        let session = SerialSession {
            port_name,
            state,
            cancel_flag,
            transmit_tx,
            delimiter_tx,
            task_handle: Mutex::new(Some(task_handle)),
            write_timeout,
            read_timeout,
        };
        (session, FrameStream { rx: events_rx })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Open or Faulted
    pub fn state(&self) -> SessionState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(SessionState::Faulted)
    }

    /// Replace the delimiting mode; applied before the next received chunk
    pub fn configure(&self, mode: DelimiterMode) -> Result<(), IoError> {
        if self.state() != SessionState::Open {
            return Err(IoError::NotOpen);
        }
        self.delimiter_tx.send(mode).map_err(|_| IoError::NotOpen)
    }

    /// Write `data` through the read loop. Produces exactly one WriteResult;
    /// failures never change the session state.
    ///
    /// The loop answers every request itself, including ones whose deadline
    /// passed while queued, so an error result means nothing was written
    /// (or a write was cut short by the device).
    pub async fn send(&self, data: Vec<u8>) -> WriteResult {
        if data.is_empty() {
            return WriteResult::success(data);
        }

        let deadline = Instant::now() + self.write_timeout;
        let (result_tx, result_rx) = oneshot::channel();
        let request = TransmitRequest {
            data: data.clone(),
            deadline,
            result_tx,
        };
        if let Err(e) = self.transmit_tx.try_send(request) {
            let message = match e {
                std_mpsc::TrySendError::Full(_) => "Transmit queue full".to_string(),
                std_mpsc::TrySendError::Disconnected(_) => "Session closed".to_string(),
            };
            return WriteResult::error(data, message);
        }

        // A port write may overrun the deadline by one port timeout, and the
        // loop may be parked in a read for another
        let backstop = deadline + self.read_timeout * 2;
        match tokio::time::timeout_at(backstop.into(), result_rx).await {
            Ok(Ok(Ok(()))) => WriteResult::success(data),
            Ok(Ok(Err(message))) => WriteResult::error(data, message),
            Ok(Err(_)) => WriteResult::error(data, "Session closed before the write completed"),
            Err(_) => WriteResult::error(
                data,
                format!("Write timed out after {}ms", self.write_timeout.as_millis()),
            ),
        }
    }

    /// Stop the read loop and wait for the handle to be released.
    /// Writes still queued or in flight fail with a closed-session message.
    pub async fn close(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
        let task = self.task_handle.lock().ok().and_then(|mut guard| guard.take());
        if let Some(handle) = task {
            if let Err(e) = handle.await {
                twarn!("[serial] Read loop for {} panicked: {:?}", self.port_name, e);
            }
        }
    }
}

impl Drop for SerialSession {
    fn drop(&mut self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }
}

// ============================================================================
// Read Loop
// ============================================================================

/// Port handle scoped to the read loop. Released on every exit path.
struct PortLease {
    name: String,
    handle: Box<dyn PortHandle>,
}

impl Drop for PortLease {
    fn drop(&mut self) {
        tlog!("[serial] Released {}", self.name);
    }
}

fn deliver(events_tx: &mpsc::UnboundedSender<SessionEvent>, frame: Frame) {
    // Consumer may have dropped its stream; keep reading regardless
    let _ = events_tx.send(SessionEvent::Frame(frame));
}

fn is_timeout(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted)
}

/// Write all of `data`, retrying port timeouts until `deadline`.
/// Gives up between chunks once `cancel_flag` is set.
fn write_with_deadline(
    port: &mut dyn PortHandle,
    data: &[u8],
    deadline: Instant,
    cancel_flag: &AtomicBool,
) -> Result<(), String> {
    let mut offset = 0;
    while offset < data.len() {
        if cancel_flag.load(Ordering::Relaxed) {
            return Err("Session closing; write abandoned".to_string());
        }
        match port.write(&data[offset..]) {
            Ok(0) => return Err("Serial write error: device accepted no bytes".to_string()),
            Ok(n) => offset += n,
            Err(ref e) if is_timeout(e.kind()) => {
                if Instant::now() >= deadline {
                    return Err(format!("Serial write timed out after {} of {} bytes", offset, data.len()));
                }
            }
            Err(e) => return Err(format!("Serial write error: {}", e)),
        }
    }
    port.flush().map_err(|e| format!("Serial flush error: {}", e))
}

#[allow(clippy::too_many_arguments)]
fn run_read_loop(
    mut lease: PortLease,
    mode: DelimiterMode,
    options: SessionOptions,
    cancel_flag: Arc<AtomicBool>,
    state: Arc<Mutex<SessionState>>,
    delimiter_rx: std_mpsc::Receiver<DelimiterMode>,
    transmit_rx: std_mpsc::Receiver<TransmitRequest>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
) {
    let mut framer = FrameAssembler::new(mode).with_max_frame_length(options.max_frame_length);
    let mut buf = vec![0u8; options.read_buffer_size.max(1)];
    let mut total_bytes_read: u64 = 0;

    tlog!("[serial] Read loop started on {} [delimiter: {}]", lease.name, mode);

    let end = loop {
        if cancel_flag.load(Ordering::Relaxed) {
            break LoopEnd::Stopped;
        }

        // Delimiter changes take effect before the next chunk
        while let Ok(new_mode) = delimiter_rx.try_recv() {
            if let Some(frame) = framer.set_mode(new_mode) {
                deliver(&events_tx, frame);
            }
            tlog!("[serial] {} delimiter set to {}", lease.name, new_mode);
        }

        // Pending transmit requests, one at a time
        while let Ok(req) = transmit_rx.try_recv() {
            if req.result_tx.is_closed() {
                twarn!("[serial] {} TX dropped: caller gave up", lease.name);
                continue;
            }
            if Instant::now() >= req.deadline {
                twarn!("[serial] {} TX dropped: deadline passed while queued", lease.name);
                let _ = req.result_tx.send(Err(format!(
                    "Write timed out after {}ms before it was sent",
                    options.write_timeout.as_millis()
                )));
                continue;
            }
            let result = write_with_deadline(lease.handle.as_mut(), &req.data, req.deadline, &cancel_flag);
            match &result {
                Ok(()) => tlog!("[serial] {} TX {}", lease.name, hex::encode(&req.data)),
                Err(e) => twarn!("[serial] {} TX failed: {}", lease.name, e),
            }
            let _ = req.result_tx.send(result);
        }

        match lease.handle.read(&mut buf) {
            Ok(0) => break LoopEnd::Fault("Device disconnected".to_string()),
            Ok(n) => {
                total_bytes_read += n as u64;
                for frame in framer.extend_at(&buf[..n], Instant::now()) {
                    deliver(&events_tx, frame);
                }
            }
            Err(ref e) if is_timeout(e.kind()) => {}
            Err(e) => break LoopEnd::Fault(format!("Read error: {}", e)),
        }

        if let Some(frame) = framer.tick() {
            deliver(&events_tx, frame);
        }
    };

    if let Some(frame) = framer.flush() {
        deliver(&events_tx, frame);
    }

    let name = lease.name.clone();
    drop(lease);

    match end {
        LoopEnd::Stopped => {
            tlog!("[serial] Read loop on {} stopped ({} bytes read)", name, total_bytes_read);
        }
        LoopEnd::Fault(reason) => {
            twarn!("[serial] Read loop on {} faulted: {}", name, reason);
            if let Ok(mut guard) = state.lock() {
                *guard = SessionState::Faulted;
            }
            let _ = events_tx.send(SessionEvent::Fault { reason });
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
