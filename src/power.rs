//! Module power sequencing
//!
//! Handhelds gate the reader's supply rail in vendor-specific ways, so power
//! control is a list of candidate backends tried in order.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

/// One way of switching the reader's supply
pub trait PowerControl: Send {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Enable the supply. Returns whether it took effect.
    fn power_on(&mut self) -> bool;

    /// Disable the supply. Backends that cannot switch off return `false`.
    fn power_off(&mut self) -> bool {
        false
    }
}

/// Writes `1` / `0` to a sysfs enable node
#[derive(Debug, Clone)]
pub struct SysfsPowerNode {
    path: PathBuf,
    name: String,
}

impl SysfsPowerNode {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = format!("sysfs:{}", path.display());
        Self { path, name }
    }

    fn write(&self, value: &[u8]) -> bool {
        match fs::write(&self.path, value) {
            Ok(()) => {
                debug!("Power node written: {} = {:?}", self.path.display(), value);
                true
            }
            Err(e) => {
                debug!("Cannot write {}: {}", self.path.display(), e);
                false
            }
        }
    }
}

impl PowerControl for SysfsPowerNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn power_on(&mut self) -> bool {
        self.write(b"1")
    }

    fn power_off(&mut self) -> bool {
        self.write(b"0")
    }
}

/// Ordered list of power backends, first success wins
#[derive(Default)]
pub struct PowerSequencer {
    backends: Vec<Box<dyn PowerControl>>,
}

impl PowerSequencer {
    /// No backends: the module is assumed to be always powered
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable nodes found on pogo-pin RFID handhelds
    pub fn handheld_defaults() -> Self {
        Self::new()
            .with(SysfsPowerNode::new(
                "/sys/devices/soc/soc:sectrl/ugp_ctrl/gp_pogo_5v_ctrl/enable",
            ))
            .with(SysfsPowerNode::new(
                "/sys/devices/platform/otg_typecdig/pogo_5v",
            ))
            .with(SysfsPowerNode::new("/sys/devices/platform/otg_iddig/pogo_5v"))
            .with(SysfsPowerNode::new("/sys/class/rfid_ctrl/enable"))
            .with(SysfsPowerNode::new("/sys/class/rfid_ctrl/power"))
    }

    pub fn with(mut self, backend: impl PowerControl + 'static) -> Self {
        self.backends.push(Box::new(backend));
        self
    }

    pub fn push(&mut self, backend: Box<dyn PowerControl>) {
        self.backends.push(backend);
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl PowerControl for PowerSequencer {
    fn name(&self) -> &str {
        "sequencer"
    }

    fn power_on(&mut self) -> bool {
        for backend in &mut self.backends {
            if backend.power_on() {
                info!("Reader powered on via {}", backend.name());
                return true;
            }
        }
        if !self.backends.is_empty() {
            warn!("No power backend succeeded");
        }
        false
    }

    /// Every backend is asked; the supply may be gated in more than one place.
    fn power_off(&mut self) -> bool {
        let mut any = false;
        for backend in &mut self.backends {
            if backend.power_off() {
                info!("Reader powered off via {}", backend.name());
                any = true;
            }
        }
        any
    }
}
