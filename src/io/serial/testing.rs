// src/io/serial/testing.rs
//
// In-memory PortDriver for session and bridge tests. Reads are scripted,
// writes are recorded, and failures can be injected per call.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::io::error::IoError;
use crate::io::types::PortSetting;

use super::ports::{PortDriver, PortHandle};

enum MockRead {
    Data(Vec<u8>),
    Error(io::ErrorKind),
    Eof,
}

#[derive(Default)]
struct MockState {
    ports: Mutex<Vec<String>>,
    list_error: Mutex<Option<String>>,
    list_delay: Mutex<Duration>,
    open_error: Mutex<Option<String>>,
    open_delay: Mutex<Duration>,
    opened: Mutex<Vec<(String, PortSetting)>>,
    reads: Mutex<VecDeque<MockRead>>,
    written: Mutex<Vec<u8>>,
    write_failures: Mutex<VecDeque<String>>,
    stall_writes: AtomicBool,
    open_handles: AtomicUsize,
}

/// Scriptable in-memory serial host
#[derive(Clone, Default)]
pub(crate) struct MockDriver {
    state: Arc<MockState>,
}

impl MockDriver {
    pub fn with_ports(names: &[&str]) -> Self {
        let driver = MockDriver::default();
        if let Ok(mut ports) = driver.state.ports.lock() {
            *ports = names.iter().map(|s| s.to_string()).collect();
        }
        driver
    }

    pub fn shared(&self) -> Arc<dyn PortDriver> {
        Arc::new(self.clone())
    }

    pub fn fail_listing(&self, reason: &str) {
        *self.state.list_error.lock().unwrap() = Some(reason.to_string());
    }

    pub fn delay_listing(&self, delay: Duration) {
        *self.state.list_delay.lock().unwrap() = delay;
    }

    pub fn fail_open(&self, reason: &str) {
        *self.state.open_error.lock().unwrap() = Some(reason.to_string());
    }

    pub fn delay_open(&self, delay: Duration) {
        *self.state.open_delay.lock().unwrap() = delay;
    }

    /// Bytes the device will deliver on a future read
    pub fn push_read(&self, bytes: &[u8]) {
        self.state.reads.lock().unwrap().push_back(MockRead::Data(bytes.to_vec()));
    }

    pub fn push_read_error(&self, kind: io::ErrorKind) {
        self.state.reads.lock().unwrap().push_back(MockRead::Error(kind));
    }

    /// Device disappears (read returns 0)
    pub fn push_eof(&self) {
        self.state.reads.lock().unwrap().push_back(MockRead::Eof);
    }

    pub fn fail_next_write(&self, reason: &str) {
        self.state.write_failures.lock().unwrap().push_back(reason.to_string());
    }

    /// Writes make no progress and time out until cleared
    pub fn stall_writes(&self, stall: bool) {
        self.state.stall_writes.store(stall, Ordering::SeqCst);
    }

    pub fn written(&self) -> Vec<u8> {
        self.state.written.lock().unwrap().clone()
    }

    pub fn open_handles(&self) -> usize {
        self.state.open_handles.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> Vec<(String, PortSetting)> {
        self.state.opened.lock().unwrap().clone()
    }
}

impl PortDriver for MockDriver {
    fn list_ports(&self) -> Result<Vec<String>, IoError> {
        let delay = *self.state.list_delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if let Some(reason) = self.state.list_error.lock().unwrap().clone() {
            return Err(IoError::enumeration(reason));
        }
        Ok(self.state.ports.lock().unwrap().clone())
    }

    fn open(
        &self,
        name: &str,
        setting: &PortSetting,
        read_timeout: Duration,
    ) -> Result<Box<dyn PortHandle>, IoError> {
        let delay = *self.state.open_delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if let Some(reason) = self.state.open_error.lock().unwrap().clone() {
            return Err(IoError::open(name, reason));
        }
        self.state
            .opened
            .lock()
            .unwrap()
            .push((name.to_string(), setting.clone()));
        self.state.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockHandle {
            state: self.state.clone(),
            read_timeout,
        }))
    }
}

struct MockHandle {
    state: Arc<MockState>,
    read_timeout: Duration,
}

impl Read for MockHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let next = self.state.reads.lock().unwrap().pop_front();
        match next {
            Some(MockRead::Data(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    let rest = bytes.split_off(n);
                    self.state.reads.lock().unwrap().push_front(MockRead::Data(rest));
                }
                Ok(n)
            }
            Some(MockRead::Error(kind)) => Err(io::Error::new(kind, "mock read error")),
            Some(MockRead::Eof) => Ok(0),
            None => {
                std::thread::sleep(self.read_timeout);
                Err(io::Error::new(io::ErrorKind::TimedOut, "mock read timeout"))
            }
        }
    }
}

impl Write for MockHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.state.stall_writes.load(Ordering::SeqCst) {
            std::thread::sleep(self.read_timeout);
            return Err(io::Error::new(io::ErrorKind::TimedOut, "mock write timeout"));
        }
        if let Some(reason) = self.state.write_failures.lock().unwrap().pop_front() {
            return Err(io::Error::new(io::ErrorKind::Other, reason));
        }
        self.state.written.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.state.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}
