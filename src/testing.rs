//! In-memory devices, network and clock for exercising the upgrade flows.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::config::{Config, DEFAULT_BASE_URL};
use crate::device::{REBOOT, RESOURCE_PRINT, ROUTERBOARD_PRINT, Session, Transport};
use crate::error::RosupError;
use crate::upgrade::image::Fetcher;
use crate::upgrade::reachability::Prober;

/// Simulated time. Sleeping advances it instantly.
#[derive(Clone)]
pub struct FakeClock {
    start: Instant,
    offset: Rc<Cell<Duration>>,
    sleeps: Rc<RefCell<Vec<Duration>>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: Rc::new(Cell::new(Duration::ZERO)),
            sleeps: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }

    /// Every sleep so far, in whole seconds.
    pub fn sleeps(&self) -> Vec<u64> {
        self.sleeps.borrow().iter().map(Duration::as_secs).collect()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.start + self.offset.get()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        self.offset.set(self.offset.get() + duration);
    }
}

/// Scripted device behavior.
///
/// Command output is picked by the number of reboots so far, sticking to
/// the last entry once they run out.
#[derive(Debug, Clone, Default)]
pub struct FakeDevice {
    pub resource: Vec<String>,
    pub routerboard: Vec<String>,
    /// Connection attempts that fail before one succeeds.
    pub failed_connects: u32,
    /// Connection attempts that fail once the device has rebooted.
    pub failed_connects_after_reboot: u32,
    /// Refuses every connection after this many sessions were opened.
    pub outage_after_sessions: Option<u32>,
    /// Boot time after a reboot before the device answers probes.
    pub up_after: Duration,
    /// Never answers probes once rebooted.
    pub never_returns: bool,
    pub rejects_uploads: bool,
}

impl FakeDevice {
    pub fn unreachable() -> Self {
        Self {
            failed_connects: u32::MAX,
            ..Default::default()
        }
    }

    fn output(outputs: &[String], boot: usize) -> String {
        outputs
            .get(boot)
            .or_else(|| outputs.last())
            .cloned()
            .unwrap_or_default()
    }
}

#[derive(Default)]
struct DeviceState {
    device: FakeDevice,
    connect_attempts: u32,
    sessions: u32,
    reboots: usize,
    rebooted_at: Option<Instant>,
    sent: Vec<String>,
    uploads: Vec<PathBuf>,
    closed: u32,
    probes: u32,
}

type Devices = Rc<RefCell<HashMap<String, DeviceState>>>;

/// A set of fake devices reachable by host name.
pub struct FakeNetwork {
    clock: FakeClock,
    devices: Devices,
}

impl FakeNetwork {
    pub fn new(clock: &FakeClock) -> Self {
        Self {
            clock: clock.clone(),
            devices: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    pub fn with_device(self, host: &str, device: FakeDevice) -> Self {
        self.devices.borrow_mut().insert(
            host.to_string(),
            DeviceState {
                device,
                ..Default::default()
            },
        );
        self
    }

    fn state<T>(&self, host: &str, read: impl FnOnce(&DeviceState) -> T) -> T {
        let devices = self.devices.borrow();
        read(&devices[host])
    }

    pub fn connect_attempts(&self, host: &str) -> u32 {
        self.state(host, |s| s.connect_attempts)
    }

    pub fn sent(&self, host: &str) -> Vec<String> {
        self.state(host, |s| s.sent.clone())
    }

    pub fn uploads(&self, host: &str) -> Vec<PathBuf> {
        self.state(host, |s| s.uploads.clone())
    }

    pub fn closed_sessions(&self, host: &str) -> u32 {
        self.state(host, |s| s.closed)
    }

    pub fn probes(&self, host: &str) -> u32 {
        self.state(host, |s| s.probes)
    }

    /// Uploads plus mutating commands sent to the device.
    pub fn mutations(&self, host: &str) -> usize {
        self.state(host, |s| s.uploads.len() + s.sent.len())
    }
}

impl Transport for FakeNetwork {
    fn open(
        &self,
        host: &str,
        _username: &str,
        _timeout: Duration,
    ) -> Result<Box<dyn Session>, RosupError> {
        let mut devices = self.devices.borrow_mut();
        let state = devices
            .get_mut(host)
            .ok_or_else(|| RosupError::Ssh(format!("unknown host {}", host)))?;

        state.connect_attempts += 1;
        let outage = state.device.outage_after_sessions;
        if outage.is_some_and(|limit| state.sessions >= limit) {
            return Err(RosupError::Ssh("no route to host".to_string()));
        }
        if state.device.failed_connects > 0 {
            state.device.failed_connects -= 1;
            return Err(RosupError::Ssh("connection refused".to_string()));
        }
        if state.reboots > 0 && state.device.failed_connects_after_reboot > 0 {
            state.device.failed_connects_after_reboot -= 1;
            return Err(RosupError::Ssh("connection refused".to_string()));
        }
        state.sessions += 1;

        Ok(Box::new(FakeSession {
            host: host.to_string(),
            clock: self.clock.clone(),
            devices: Rc::clone(&self.devices),
        }))
    }
}

impl Prober for FakeNetwork {
    fn probe(&self, host: &str) -> bool {
        let now = self.clock.now();
        let mut devices = self.devices.borrow_mut();
        let Some(state) = devices.get_mut(host) else {
            return false;
        };

        state.probes += 1;
        match state.rebooted_at {
            None => true,
            Some(_) if state.device.never_returns => false,
            Some(at) => now.duration_since(at) >= state.device.up_after,
        }
    }
}

struct FakeSession {
    host: String,
    clock: FakeClock,
    devices: Devices,
}

impl FakeSession {
    fn with_state<T>(&self, update: impl FnOnce(&mut DeviceState) -> T) -> T {
        let mut devices = self.devices.borrow_mut();
        let state = devices
            .get_mut(&self.host)
            .unwrap_or_else(|| panic!("session to unknown host {}", self.host));
        update(state)
    }
}

impl Session for FakeSession {
    fn exec(&mut self, command: &str) -> Result<String, RosupError> {
        self.with_state(|state| match command {
            RESOURCE_PRINT => Ok(FakeDevice::output(&state.device.resource, state.reboots)),
            ROUTERBOARD_PRINT => Ok(FakeDevice::output(&state.device.routerboard, state.reboots)),
            other => Err(RosupError::Ssh(format!("unexpected command {}", other))),
        })
    }

    fn send(&mut self, command: &str) -> Result<(), RosupError> {
        let now = self.clock.now();
        self.with_state(|state| {
            state.sent.push(command.to_string());
            if command == REBOOT {
                state.reboots += 1;
                state.rebooted_at = Some(now);
            }
        });
        Ok(())
    }

    fn upload(&mut self, path: &Path) -> Result<(), RosupError> {
        let host = self.host.clone();
        self.with_state(|state| {
            if state.device.rejects_uploads {
                return Err(RosupError::Transfer {
                    host,
                    reason: "no space left on device".to_string(),
                });
            }
            state.uploads.push(path.to_path_buf());
            Ok(())
        })
    }

    fn close(self: Box<Self>) {
        self.with_state(|state| state.closed += 1);
    }
}

/// Serves a fixed body, or fails every download.
pub struct FakeFetcher {
    body: Option<Vec<u8>>,
    requests: RefCell<Vec<String>>,
}

impl FakeFetcher {
    pub fn serving(body: &[u8]) -> Self {
        Self {
            body: Some(body.to_vec()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            body: None,
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl Fetcher for FakeFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<(), RosupError> {
        self.requests.borrow_mut().push(url.to_string());
        match &self.body {
            Some(body) => Ok(std::fs::write(dest, body)?),
            None => Err(RosupError::download(url, "404 Not Found")),
        }
    }
}

/// `/system resource print` output.
pub fn resource_output(version: &str, architecture: &str, board: &str, bad_blocks: &str) -> String {
    format!(
        "                   uptime: 1m12s\r\n\
         \x20                 version: {}\r\n\
         \x20       architecture-name: {}\r\n\
         \x20              board-name: {}\r\n\
         \x20              bad-blocks: {}\r\n",
        version, architecture, board, bad_blocks
    )
}

/// `/system routerboard print` output.
pub fn routerboard_output(current: &str, upgrade: &str) -> String {
    format!(
        "       routerboard: yes\r\n\
         \x20 current-firmware: {}\r\n\
         \x20 upgrade-firmware: {}\r\n",
        current, upgrade
    )
}

/// Run configuration with CLI defaults, upgrading to 7.1.5.
pub fn config(image_dir: &Path, hosts: &[&str]) -> Config {
    Config {
        target_version: "7.1.5".to_string(),
        downgrade: false,
        timeout: Duration::from_secs(10),
        ssh_stop: false,
        ssh_retries: 10,
        reboot_timeout: Duration::from_secs(180),
        username: "admin".to_string(),
        base_url: DEFAULT_BASE_URL.to_string(),
        download: false,
        image_dir: image_dir.to_path_buf(),
        firmware: false,
        dry_run: false,
        verbosity: 0,
        log_level: "warn".to_string(),
        hosts: hosts.iter().map(|h| h.to_string()).collect(),
    }
}
