use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::command::{Command, InventoryParams};
use crate::frame::FrameDecoder;
use crate::observer::{InventoryEvent, InventoryObserver};
use crate::power::{PowerControl, PowerSequencer};
use crate::tag::{carries_tags, decode_tags};
use crate::transport::{RfidTransport, TransportOpener};
use crate::types::{
    bytes_to_hex, ReaderConfig, RfidError, SessionState, SessionTimings, TagRecord,
};

const READ_CHUNK: usize = 256;
const LOCK_RETRY: Duration = Duration::from_millis(1);

type Shared<T> = Arc<Mutex<T>>;

fn lock<T>(shared: &Mutex<T>) -> MutexGuard<'_, T> {
    // a poisoned transport is still a usable byte pipe
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Like [`lock`], but gives up at `deadline`
fn lock_until<T>(shared: &Mutex<T>, deadline: Instant) -> Option<MutexGuard<'_, T>> {
    loop {
        match shared.try_lock() {
            Ok(guard) => return Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => return Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) if Instant::now() < deadline => {
                thread::sleep(LOCK_RETRY)
            }
            Err(TryLockError::WouldBlock) => return None,
        }
    }
}

/// Handle on a running scan loop
struct ScanWorker {
    running: Arc<AtomicBool>,
    done: mpsc::Receiver<()>,
    handle: JoinHandle<()>,
}

/// Connection to one reader and the inventory loop driving it.
///
/// The session owns the transport. While scanning, a background worker
/// shares it: the worker polls for input and the caller may still send
/// configuration and stop commands, each write being atomic.
///
/// Observer callbacks run on the worker thread.
pub struct InventorySession<O: TransportOpener> {
    opener: O,
    power: Box<dyn PowerControl>,
    config: ReaderConfig,
    state: SessionState,
    transport: Option<Shared<O::Transport>>,
    observer: Option<Arc<dyn InventoryObserver>>,
    worker: Option<ScanWorker>,
}

impl<O: TransportOpener> InventorySession<O> {
    /// Create an idle session that opens transports through `opener`.
    ///
    /// The module is assumed to be powered; see [`with_power`](Self::with_power).
    pub fn new(opener: O) -> Self {
        Self {
            opener,
            power: Box::new(PowerSequencer::new()),
            config: ReaderConfig::default(),
            state: SessionState::Idle,
            transport: None,
            observer: None,
            worker: None,
        }
    }

    /// Use `power` to switch the module on before connecting
    pub fn with_power(mut self, power: impl PowerControl + 'static) -> Self {
        self.power = Box::new(power);
        self
    }

    pub fn state(&self) -> SessionState {
        match (&self.state, &self.worker) {
            (SessionState::Scanning, Some(worker)) if worker.handle.is_finished() => {
                SessionState::Connected
            }
            (state, _) => *state,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state(), SessionState::Connected | SessionState::Scanning)
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Register the observer for scan results, replacing any previous one.
    ///
    /// Takes effect at the next `start_inventory`.
    pub fn set_observer(&mut self, observer: impl InventoryObserver + 'static) {
        self.observer = Some(Arc::new(observer));
    }

    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    /// Register a channel as the observer and return its receiving end
    pub fn subscribe(&mut self) -> mpsc::Receiver<InventoryEvent> {
        let (tx, rx) = mpsc::channel();
        self.set_observer(tx);
        rx
    }

    /// Power the module, wait for it to settle and open the transport
    pub fn connect(&mut self, config: ReaderConfig) -> Result<(), RfidError> {
        if self.state != SessionState::Idle {
            return Err(RfidError::Configuration(format!(
                "Cannot connect while {}",
                self.state()
            )));
        }
        config.inventory.validate()?;

        self.state = SessionState::Connecting;
        let powered = self.power.power_on();
        debug!("Power on result: {}", powered);
        // the module needs the delay even when no backend reported success
        thread::sleep(config.timings.power_settle);

        info!("Connecting to {} at {}", config.endpoint, config.baud_rate);
        match self
            .opener
            .open(&config.endpoint, config.baud_rate, config.open_flags)
        {
            Ok(mut transport) => {
                if let Err(e) = transport.clear_input() {
                    warn!("Failed to clear stale input: {:?}", e);
                }
                self.transport = Some(Arc::new(Mutex::new(transport)));
                self.config = config;
                self.state = SessionState::Connected;
                info!("Connected successfully");
                Ok(())
            }
            Err(e) => {
                error!("Connect failed: {:?}", e);
                self.state = SessionState::Idle;
                Err(RfidError::Transport(format!("{:?}", e)))
            }
        }
    }

    /// Start the background scan loop and return immediately
    pub fn start_inventory(&mut self) -> Result<(), RfidError> {
        self.reap_worker();

        match self.state {
            SessionState::Connected => {}
            SessionState::Scanning => {
                return Err(RfidError::Configuration("Inventory already running".into()));
            }
            state => {
                return Err(RfidError::Configuration(format!(
                    "Cannot start inventory while {}",
                    state
                )));
            }
        }

        let transport = self.connected_transport()?;
        let running = Arc::new(AtomicBool::new(true));
        let (done_tx, done) = mpsc::channel();

        let scan = ScanLoop {
            transport,
            observer: self.observer.clone(),
            running: Arc::clone(&running),
            address: self.config.address,
            params: self.config.inventory,
            timings: self.config.timings,
        };

        let handle = thread::Builder::new()
            .name("rfid-inventory".into())
            .spawn(move || {
                scan.run();
                let _ = done_tx.send(());
            })?;

        self.worker = Some(ScanWorker {
            running,
            done,
            handle,
        });
        self.state = SessionState::Scanning;
        info!("Inventory started");
        Ok(())
    }

    /// Stop the scan loop.
    ///
    /// Blocks for at most the configured stop timeout, stop frame included.
    /// A worker stuck in a transport call keeps the transport to itself, in
    /// which case the stop frame is skipped and the worker is left to exit
    /// on its own. Does nothing when no scan is running.
    pub fn stop_inventory(&mut self) -> Result<(), RfidError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        self.state = SessionState::Stopping;
        worker.running.store(false, Ordering::Release);
        let deadline = Instant::now() + self.config.timings.stop_timeout;

        let sent = self.send_stop(deadline);
        if let Err(e) = &sent {
            warn!("Failed to send stop command: {}", e);
        }

        match worker
            .done
            .recv_timeout(deadline.saturating_duration_since(Instant::now()))
        {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    error!("Inventory worker panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Inventory worker did not exit within {:?}, detaching",
                    self.config.timings.stop_timeout
                );
            }
        }

        self.state = SessionState::Connected;
        info!("Inventory stopped");
        sent
    }

    /// Stop any scan and close the transport.
    ///
    /// Each of the two steps waits at most the stop timeout. A transport
    /// still held by a detached worker is dropped once that worker exits.
    pub fn disconnect(&mut self) -> Result<(), RfidError> {
        if let Err(e) = self.stop_inventory() {
            debug!("Ignoring stop failure during disconnect: {}", e);
        }

        let closed = match self.transport.take() {
            Some(transport) => close_within(&transport, self.config.timings.stop_timeout),
            None => Ok(()),
        };
        if let Err(e) = &closed {
            error!("Disconnect error: {}", e);
        }

        if self.state != SessionState::Idle {
            info!("Disconnected");
        }
        self.state = SessionState::Idle;
        closed
    }

    /// Disconnect and switch the module's supply off
    pub fn release(&mut self) -> Result<(), RfidError> {
        let result = self.disconnect();
        if !self.power.power_off() {
            debug!("Power off not supported by {}", self.power.name());
        }
        result
    }

    /// Set RF output power in dBm
    pub fn set_output_power(&mut self, dbm: i8) -> Result<(), RfidError> {
        self.send(Command::SetOutputPower(dbm))?;
        self.config.output_power = dbm;
        Ok(())
    }

    /// Select the working antennas
    pub fn set_antenna(&mut self, mask: u8) -> Result<(), RfidError> {
        self.send(Command::SetAntennaMux(mask))?;
        self.config.inventory.antenna_mask = mask;
        Ok(())
    }

    /// Apply power, antenna and inventory parameters from `config`.
    ///
    /// Inventory parameters take effect at the next `start_inventory`.
    /// Endpoint, baud rate and timings only change on reconnect.
    pub fn configure(&mut self, config: &ReaderConfig) -> Result<(), RfidError> {
        config.inventory.validate()?;
        Command::SetOutputPower(config.output_power).validate()?;

        self.set_output_power(config.output_power)?;
        self.set_antenna(config.inventory.antenna_mask)?;
        self.config.inventory = config.inventory;
        Ok(())
    }

    fn send(&self, command: Command) -> Result<(), RfidError> {
        command.validate()?;
        let transport = self.connected_transport()?;
        let mut transport = lock(&transport);
        write_command(&mut *transport, self.config.address, command)
    }

    fn send_stop(&self, deadline: Instant) -> Result<(), RfidError> {
        let transport = self.connected_transport()?;
        let Some(mut guard) = lock_until(&transport, deadline) else {
            warn!("Transport busy, stop command not sent");
            return Ok(());
        };
        write_command(&mut *guard, self.config.address, Command::StopInventory)
    }

    fn connected_transport(&self) -> Result<Shared<O::Transport>, RfidError> {
        match (&self.transport, self.state) {
            (Some(transport), SessionState::Connected)
            | (Some(transport), SessionState::Scanning)
            | (Some(transport), SessionState::Stopping) => Ok(Arc::clone(transport)),
            _ => Err(RfidError::Configuration("Not connected".into())),
        }
    }

    /// Drop the handle of a worker that already exited on its own
    fn reap_worker(&mut self) {
        if self
            .worker
            .as_ref()
            .is_some_and(|worker| worker.handle.is_finished())
        {
            if let Some(worker) = self.worker.take() {
                if worker.handle.join().is_err() {
                    error!("Inventory worker panicked");
                }
            }
            if self.state == SessionState::Scanning {
                self.state = SessionState::Connected;
            }
        }
    }
}

impl<O: TransportOpener> Drop for InventorySession<O> {
    fn drop(&mut self) {
        if self.transport.is_some() {
            let _ = self.disconnect();
        }
    }
}

fn write_command<T: RfidTransport>(
    transport: &mut T,
    address: u8,
    command: Command,
) -> Result<(), RfidError> {
    let frame = command.encode(address);
    debug!("Sending command: {}", bytes_to_hex(&frame));
    transport
        .write(&frame)
        .map(|_| ())
        .map_err(|e| RfidError::Transport(format!("{:?}", e)))
}

fn close_within<T: RfidTransport>(transport: &Mutex<T>, timeout: Duration) -> Result<(), RfidError> {
    let Some(mut guard) = lock_until(transport, Instant::now() + timeout) else {
        warn!("Transport still held by the inventory worker, not closing");
        return Ok(());
    };
    guard
        .close()
        .map_err(|e| RfidError::Transport(format!("{:?}", e)))
}

/// State owned by the worker thread
struct ScanLoop<T: RfidTransport> {
    transport: Shared<T>,
    observer: Option<Arc<dyn InventoryObserver>>,
    running: Arc<AtomicBool>,
    address: u8,
    params: InventoryParams,
    timings: SessionTimings,
}

impl<T: RfidTransport> ScanLoop<T> {
    fn run(self) {
        info!("Inventory loop started");
        let mut decoder = FrameDecoder::new();
        let mut rounds = 0usize;
        let mut total = 0usize;

        while self.running.load(Ordering::Acquire) {
            match self.round(&mut decoder) {
                Ok(None) => break,
                Ok(Some(tags)) => {
                    rounds += 1;
                    total += tags;
                    if let Some(observer) = &self.observer {
                        observer.on_round_complete(tags);
                    }
                }
                Err(e) => {
                    error!("Inventory loop error: {}", e);
                    if let Some(observer) = &self.observer {
                        observer.on_error(&e.to_string());
                    }
                    break;
                }
            }
        }

        self.running.store(false, Ordering::Release);
        if let Some(observer) = &self.observer {
            observer.on_inventory_end();
        }
        info!(
            "Inventory loop ended after {} rounds, {} tag reads",
            rounds, total
        );
    }

    /// Issue one inventory command and collect replies for its scan window.
    ///
    /// Returns `None` when a stop arrived before the command went out.
    fn round(&self, decoder: &mut FrameDecoder) -> Result<Option<usize>, RfidError> {
        {
            // checked under the lock so a stop command is never followed by
            // a fresh inventory command
            let mut transport = lock(&self.transport);
            if !self.running.load(Ordering::Acquire) {
                return Ok(None);
            }
            write_command(&mut *transport, self.address, Command::Inventory(self.params))?;
        }

        let window = self.params.scan_window();
        let start = Instant::now();
        let mut tags = 0;
        let mut chunk = [0u8; READ_CHUNK];

        while self.running.load(Ordering::Acquire) && start.elapsed() < window {
            let read = {
                let mut transport = lock(&self.transport);
                match transport.bytes_available() {
                    Ok(0) => Ok(0),
                    Ok(_) => transport.read(&mut chunk),
                    Err(e) => Err(e),
                }
            }
            .map_err(|e| RfidError::Transport(format!("{:?}", e)))?;

            if read == 0 {
                thread::sleep(self.timings.idle_poll);
                continue;
            }

            debug!("Received {} bytes", read);
            decoder.feed(&chunk[..read], |frame| {
                if carries_tags(&frame) {
                    tags += decode_tags(&frame, |tag| self.dispatch(tag));
                } else {
                    debug!(
                        "Ignoring frame cmd=0x{:02X} status={:?}",
                        frame.opcode(),
                        frame.status()
                    );
                }
            });
        }

        Ok(Some(tags))
    }

    fn dispatch(&self, tag: TagRecord) {
        debug!(">>> TAG: EPC={}, RSSI={}", tag.epc_hex(), tag.rssi);
        if let Some(observer) = &self.observer {
            observer.on_tag_read(&tag);
        }
    }
}
