// src/io/serial/ports.rs
//
// Port discovery and the driver seam between the session and the OS serial
// subsystem. `SystemDriver` talks to the serialport crate; tests substitute
// an in-memory driver.

use std::collections::HashSet;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

use crate::io::error::IoError;
use crate::io::types::{PortDescriptor, PortSetting, PortSnapshot};

use super::utils::{
    port_number_from_name, to_serialport_data_bits, to_serialport_parity, to_serialport_stop_bits,
};

// ============================================================================
// Driver Traits
// ============================================================================

/// An open port handle. Reads must honour the timeout given at open time so
/// the read loop can notice cancellation.
pub trait PortHandle: Read + Write + Send {}

impl<T: Read + Write + Send + ?Sized> PortHandle for T {}

/// Access to the host's serial endpoints
pub trait PortDriver: Send + Sync {
    /// Host port names in host-reported order
    fn list_ports(&self) -> Result<Vec<String>, IoError>;

    /// Open `name` with the given electrical settings
    fn open(
        &self,
        name: &str,
        setting: &PortSetting,
        read_timeout: Duration,
    ) -> Result<Box<dyn PortHandle>, IoError>;
}

// ============================================================================
// System Driver
// ============================================================================

/// Driver backed by the serialport crate
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemDriver;

impl PortDriver for SystemDriver {
    /// On macOS, only /dev/cu.* devices are listed. The tty variants block on
    /// open waiting for carrier detect.
    fn list_ports(&self) -> Result<Vec<String>, IoError> {
        let ports = serialport::available_ports().map_err(IoError::enumeration)?;

        Ok(ports
            .into_iter()
            .map(|p| p.port_name)
            .filter(|_name| {
                #[cfg(target_os = "macos")]
                {
                    !_name.starts_with("/dev/tty.")
                }
                #[cfg(not(target_os = "macos"))]
                {
                    true
                }
            })
            .collect())
    }

    fn open(
        &self,
        name: &str,
        setting: &PortSetting,
        read_timeout: Duration,
    ) -> Result<Box<dyn PortHandle>, IoError> {
        let port = serialport::new(name, setting.baud)
            .data_bits(to_serialport_data_bits(setting.word_length)?)
            .stop_bits(to_serialport_stop_bits(setting.stop_bit)?)
            .parity(to_serialport_parity(setting.parity))
            .timeout(read_timeout)
            .open()
            .map_err(|e| IoError::open(name, e))?;

        Ok(Box::new(port))
    }
}

// ============================================================================
// Enumeration
// ============================================================================

/// Build a snapshot from host port names, keeping host order.
/// Names without a trailing number are skipped, as are numbers already taken.
pub fn snapshot_from_names(names: &[String]) -> PortSnapshot {
    let mut seen = HashSet::new();
    let mut ports = Vec::with_capacity(names.len());

    for name in names {
        let Some(number) = port_number_from_name(name) else {
            tlog!("[ports] Skipping {}: no port number in name", name);
            continue;
        };
        if !seen.insert(number) {
            tlog!("[ports] Skipping {}: port number {} already listed", name, number);
            continue;
        }
        ports.push(PortDescriptor {
            number,
            name: name.clone(),
        });
    }

    PortSnapshot::from_descriptors(ports)
}

/// Enumerate host ports without blocking longer than `discovery_timeout`.
/// An empty host gives an empty snapshot, not an error.
pub async fn enumerate(
    driver: Arc<dyn PortDriver>,
    discovery_timeout: Duration,
) -> Result<PortSnapshot, IoError> {
    let query = tokio::task::spawn_blocking(move || driver.list_ports());

    let names = match tokio::time::timeout(discovery_timeout, query).await {
        Ok(Ok(result)) => result?,
        Ok(Err(e)) => return Err(IoError::enumeration(format!("discovery task failed: {}", e))),
        Err(_) => {
            return Err(IoError::enumeration(format!(
                "discovery timed out after {}ms",
                discovery_timeout.as_millis()
            )))
        }
    };

    Ok(snapshot_from_names(&names))
}

/// Host port name to open for `setting`. An explicit `port_name` wins;
/// otherwise the number is looked up in a fresh snapshot.
pub async fn resolve_port_name(
    driver: Arc<dyn PortDriver>,
    setting: &PortSetting,
    discovery_timeout: Duration,
) -> Result<String, IoError> {
    if let Some(name) = &setting.port_name {
        return Ok(name.clone());
    }

    let snapshot = enumerate(driver, discovery_timeout).await?;
    if let Some(port) = snapshot.find(setting.port_no) {
        return Ok(port.name.clone());
    }

    // COM ports can be opened by name even when the host does not list them
    if cfg!(target_os = "windows") {
        return Ok(format!("COM{}", setting.port_no));
    }

    Err(IoError::open(
        &format!("port {}", setting.port_no),
        "no such port on this host",
    ))
}
