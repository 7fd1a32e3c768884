// src/bridge.rs
//
// Command surface of the serial bridge: enumerate, open, close, configure and
// send. A Bridge owns at most one serial session at a time; callers hold the
// Bridge explicitly (no process-wide session state).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

use crate::io::serial::delimiter::DelimiterMode;
use crate::io::serial::ports::{self, PortDriver, PortHandle, SystemDriver};
use crate::io::serial::reader::{FrameStream, SerialSession};
use crate::io::serial::{input, utils};
use crate::io::{
    DelimiterSetting, IoError, PortSetting, PortSnapshot, SendRequest, SessionState, Validate,
    WriteResult,
};
use crate::settings::BridgeConfig;

/// One in-flight port acquisition
struct OpenAttempt {
    cancel: AtomicBool,
    /// Set once the attempt has settled and any handle it acquired is released
    settled: watch::Sender<bool>,
}

/// Lifecycle slot for the single session
enum Slot {
    Closed,
    Opening(Arc<OpenAttempt>),
    Active(Arc<SerialSession>),
    /// Teardown in progress, of a session or of a cancelled open
    Closing,
}

/// What `close` has to wait for once the slot reads Closing
enum Teardown {
    Session(Arc<SerialSession>),
    PendingOpen(watch::Receiver<bool>),
}

/// Settles an open attempt on every exit path of `Bridge::open`,
/// including the future being dropped mid-acquire.
struct PendingOpen<'a> {
    bridge: &'a Bridge,
    attempt: Arc<OpenAttempt>,
}

impl Drop for PendingOpen<'_> {
    fn drop(&mut self) {
        {
            let mut slot = self.bridge.lock_slot();
            let release = match &*slot {
                Slot::Opening(attempt) => Arc::ptr_eq(attempt, &self.attempt),
                // Only a close that cancelled this attempt leaves Closing behind it
                Slot::Closing => self.attempt.cancel.load(Ordering::SeqCst),
                _ => false,
            };
            if release {
                *slot = Slot::Closed;
            }
        }
        self.attempt.settled.send_replace(true);
    }
}

pub struct Bridge {
    config: BridgeConfig,
    driver: Arc<dyn PortDriver>,
    slot: Mutex<Slot>,
}

impl Bridge {
    pub fn new(config: BridgeConfig, driver: Arc<dyn PortDriver>) -> Self {
        Bridge {
            config,
            driver,
            slot: Mutex::new(Slot::Closed),
        }
    }

    /// Bridge over the host's real serial ports
    pub fn with_system_driver(config: BridgeConfig) -> Self {
        Bridge::new(config, Arc::new(SystemDriver))
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        // Slot transitions are single assignments; a poisoned guard is still consistent
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> SessionState {
        match &*self.lock_slot() {
            Slot::Closed => SessionState::Closed,
            Slot::Opening(_) => SessionState::Opening,
            Slot::Active(session) => session.state(),
            Slot::Closing => SessionState::Closing,
        }
    }

    /// Host port name of the active session
    pub fn port_name(&self) -> Option<String> {
        match &*self.lock_slot() {
            Slot::Active(session) => Some(session.port_name().to_string()),
            _ => None,
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    pub async fn enumerate_ports(&self) -> Result<PortSnapshot, IoError> {
        let snapshot = ports::enumerate(self.driver.clone(), self.config.discovery_timeout()).await;
        match &snapshot {
            Ok(s) => tlog!("[bridge] Enumerated {} port(s): {:?}", s.port_count, s.port_numbers),
            Err(e) => twarn!("[bridge] Port enumeration failed: {}", e),
        }
        snapshot
    }

    /// Open a port and start streaming. Fails with `Busy` while another
    /// session is opening, open or closing.
    pub async fn open(&self, setting: PortSetting) -> Result<FrameStream, IoError> {
        utils::validate_port_setting(&setting)?;
        let mode = self.config.initial_mode()?;

        let (settled, _) = watch::channel(false);
        let attempt = Arc::new(OpenAttempt {
            cancel: AtomicBool::new(false),
            settled,
        });
        {
            let mut slot = self.lock_slot();
            match &*slot {
                Slot::Closed => {}
                Slot::Active(session) if session.state() == SessionState::Faulted => {
                    return Err(IoError::Faulted)
                }
                _ => return Err(IoError::Busy),
            }
            *slot = Slot::Opening(attempt.clone());
        }
        // Declared before `acquired` so an unclaimed handle is dropped first
        let pending = PendingOpen {
            bridge: self,
            attempt,
        };

        tlog!("[bridge] Opening port {} at {}", setting.port_no, setting.line_format());
        let acquired = self.acquire(&setting).await;

        let mut slot = self.lock_slot();
        let still_ours = matches!(&*slot, Slot::Opening(a) if Arc::ptr_eq(a, &pending.attempt));
        if !still_ours {
            tlog!("[bridge] Open of port {} cancelled; releasing", setting.port_no);
            return Err(IoError::Cancelled);
        }

        match acquired {
            Ok((name, handle)) => {
                tlog!("[bridge] Opened {} ({}) [delimiter: {}]", name, setting.line_format(), mode);
                let (session, stream) =
                    SerialSession::start(name, handle, mode, self.config.session_options());
                *slot = Slot::Active(Arc::new(session));
                Ok(stream)
            }
            Err(e) => {
                twarn!("[bridge] {}", e);
                Err(e)
            }
        }
    }

    async fn acquire(&self, setting: &PortSetting) -> Result<(String, Box<dyn PortHandle>), IoError> {
        let name =
            ports::resolve_port_name(self.driver.clone(), setting, self.config.discovery_timeout())
                .await?;

        let driver = self.driver.clone();
        let read_timeout = self.config.read_timeout();
        let open_setting = setting.clone();
        let open_name = name.clone();
        let handle = tokio::task::spawn_blocking(move || {
            driver.open(&open_name, &open_setting, read_timeout)
        })
        .await
        .map_err(|e| IoError::open(&name, format!("open task failed: {}", e)))??;

        Ok((name, handle))
    }

    /// Close the session, if any. A pending open is cancelled, and close
    /// returns only after that open has released whatever it acquired.
    /// Safe to call when closed.
    pub async fn close(&self) {
        let teardown = {
            let mut slot = self.lock_slot();
            match std::mem::replace(&mut *slot, Slot::Closing) {
                Slot::Closed => {
                    *slot = Slot::Closed;
                    return;
                }
                // Another close owns the teardown
                Slot::Closing => return,
                Slot::Opening(attempt) => {
                    attempt.cancel.store(true, Ordering::SeqCst);
                    Teardown::PendingOpen(attempt.settled.subscribe())
                }
                Slot::Active(session) => Teardown::Session(session),
            }
        };

        match teardown {
            Teardown::Session(session) => {
                session.close().await;
                *self.lock_slot() = Slot::Closed;
                tlog!("[bridge] Closed {}", session.port_name());
            }
            Teardown::PendingOpen(mut settled) => {
                tlog!("[bridge] Close requested while opening; waiting for the open to settle");
                // The opener moves the slot to Closed before it signals
                let _ = settled.wait_for(|done| *done).await;
                tlog!("[bridge] Pending open discarded");
            }
        }
    }

    /// Replace the delimiting policy of the open session
    pub fn configure(&self, setting: DelimiterSetting) -> Result<(), IoError> {
        let mode = DelimiterMode::try_from(&setting)?;
        match &*self.lock_slot() {
            Slot::Active(session) => session.configure(mode),
            _ => Err(IoError::NotOpen),
        }
    }

    fn open_session(&self) -> Result<Arc<SerialSession>, IoError> {
        match &*self.lock_slot() {
            Slot::Active(session) if session.state() == SessionState::Open => Ok(session.clone()),
            _ => Err(IoError::NotOpen),
        }
    }

    /// Write bytes to the open session. Transport failures come back in the
    /// WriteResult and leave the session open.
    pub async fn send(&self, data: Vec<u8>) -> Result<WriteResult, IoError> {
        let session = self.open_session()?;
        Ok(session.send(data).await)
    }

    /// Parse transmit text and write it. A parse error is reported in the
    /// WriteResult and nothing is written.
    pub async fn send_text(&self, text: &str) -> Result<WriteResult, IoError> {
        let session = self.open_session()?;
        match input::parse_send_input(text) {
            Ok(data) => Ok(session.send(data).await),
            Err(e) => Ok(WriteResult::error(Vec::new(), e.to_string())),
        }
    }

    /// Send a decoded request record: `data` as raw bytes, `text` through the
    /// transmit text parser
    pub async fn send_request(&self, request: SendRequest) -> Result<WriteResult, IoError> {
        request.validate()?;
        match request {
            SendRequest { data: Some(data), .. } => self.send(data).await,
            SendRequest { text: Some(text), .. } => self.send_text(&text).await,
            SendRequest { .. } => Err(IoError::invalid_input("empty send request")),
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        // Sessions stop their own read loops on drop; discard a pending open
        if let Ok(Slot::Opening(attempt)) = self.slot.get_mut() {
            attempt.cancel.store(true, Ordering::SeqCst);
        }
    }
}
