//! WiFi station-mode adapter.
//!
//! Implements [`ConnectivityPort`], the hexagonal boundary for network
//! connectivity.  Reconnection lives here; the application core only sees
//! the running count of failed attempts, which feeds the link-loss policy
//! ([`LinkPolicy`](crate::safety::LinkPolicy)).
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: the ESP-IDF WiFi driver via
//!   `esp_idf_svc::wifi::EspWifi`, driven non-blocking so the control loop
//!   keeps ticking while the association is in flight.
//! - **all other targets**: simulation stubs; the access point can be
//!   switched off with [`sim_set_ap_available`] to exercise reconnects.
//!
//! ## Reconnection policy
//!
//! While disconnected the adapter retries on an exponential backoff
//! (500 ms → 1 s → 2 s … capped at 5 s).  Every retry counts as one
//! reconnect attempt; the counter resets on a successful association.

use core::fmt;
use log::{error, info, warn};

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};

// ───────────────────────────────────────────────────────────────
// Port trait
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
    AlreadyConnected,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)"),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::AlreadyConnected => write!(f, "already connected to AP"),
        }
    }
}

impl std::error::Error for ConnectivityError {}

pub trait ConnectivityPort {
    fn connect(&mut self) -> Result<(), ConnectivityError>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    /// Drive reconnection.  Call once per loop iteration.
    fn poll(&mut self, now_ms: u64);
    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError>;
    fn rssi(&self) -> Option<i8>;
    /// Station address, empty while disconnected.
    fn ip(&self) -> &str;
    /// Failed reconnects since the link was last up.
    fn reconnect_attempts(&self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

const INITIAL_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 5_000;

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Simulation access point
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
static SIM_AP_AVAILABLE: core::sync::atomic::AtomicBool = core::sync::atomic::AtomicBool::new(true);

/// Simulation: make the access point (un)reachable.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_ap_available(up: bool) {
    SIM_AP_AVAILABLE.store(up, core::sync::atomic::Ordering::Relaxed);
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    backoff_ms: u64,
    next_retry_at: u64,
    last_rssi: Option<i8>,
    ip: heapless::String<16>,
    #[cfg(target_os = "espidf")]
    driver: EspWifi<'static>,
}

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(driver: EspWifi<'static>) -> Self {
        Self::with_state(driver)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self::with_state()
    }

    fn with_state(#[cfg(target_os = "espidf")] driver: EspWifi<'static>) -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            backoff_ms: INITIAL_BACKOFF_MS,
            next_retry_at: 0,
            last_rssi: None,
            ip: heapless::String::new(),
            #[cfg(target_os = "espidf")]
            driver,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    fn on_link_up(&mut self) {
        self.state = WifiState::Connected;
        self.backoff_ms = INITIAL_BACKOFF_MS;
        self.last_rssi = self.platform_rssi();
        self.ip = self.platform_ip();
        info!("WiFi: connected ip={} (RSSI={:?})", self.ip, self.last_rssi);
    }

    fn on_link_down(&mut self) {
        self.last_rssi = None;
        self.ip.clear();
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        let ssid = self.ssid.as_str().try_into().map_err(|_| ConnectivityError::InvalidSsid)?;
        let password = self
            .password
            .as_str()
            .try_into()
            .map_err(|_| ConnectivityError::InvalidPassword)?;
        let auth_method = if self.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let conf = Configuration::Client(ClientConfiguration {
            ssid,
            password,
            auth_method,
            ..Default::default()
        });
        self.driver.set_configuration(&conf).map_err(|e| {
            error!("WiFi: set_configuration failed: {}", e);
            ConnectivityError::ConnectionFailed
        })?;
        if !self.driver.is_started().unwrap_or(false) {
            self.driver.start().map_err(|e| {
                error!("WiFi: start failed: {}", e);
                ConnectivityError::ConnectionFailed
            })?;
        }
        // Non-blocking: association completes in the driver task.
        self.driver.connect().map_err(|e| {
            warn!("WiFi: connect request failed: {}", e);
            ConnectivityError::ConnectionFailed
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        if SIM_AP_AVAILABLE.load(core::sync::atomic::Ordering::Relaxed) {
            Ok(())
        } else {
            Err(ConnectivityError::ConnectionFailed)
        }
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        let _ = self.driver.disconnect();
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        info!("WiFi(sim): disconnected");
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.driver.is_up().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        matches!(self.state, WifiState::Connected | WifiState::Connecting)
            && SIM_AP_AVAILABLE.load(core::sync::atomic::Ordering::Relaxed)
    }

    #[cfg(target_os = "espidf")]
    fn platform_rssi(&self) -> Option<i8> {
        let mut ap_info = esp_idf_svc::sys::wifi_ap_record_t::default();
        // SAFETY: ap_info is a valid out-pointer for the duration of the call.
        let ret = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
        (ret == esp_idf_svc::sys::ESP_OK).then_some(ap_info.rssi)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_rssi(&self) -> Option<i8> {
        Some(-62)
    }

    #[cfg(target_os = "espidf")]
    fn platform_ip(&self) -> heapless::String<16> {
        use core::fmt::Write;
        let mut s = heapless::String::new();
        if let Ok(info) = self.driver.sta_netif().get_ip_info() {
            let _ = write!(s, "{}", info.ip);
        }
        s
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_ip(&self) -> heapless::String<16> {
        let mut s = heapless::String::new();
        let _ = s.push_str("192.168.4.2");
        s
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// ConnectivityPort
// ───────────────────────────────────────────────────────────────

impl ConnectivityPort for WifiAdapter {
    fn connect(&mut self) -> Result<(), ConnectivityError> {
        if self.ssid.is_empty() {
            return Err(ConnectivityError::NoCredentials);
        }
        if self.state == WifiState::Connected {
            return Err(ConnectivityError::AlreadyConnected);
        }

        info!("WiFi: connecting to '{}'", self.ssid);
        self.state = WifiState::Connecting;

        match self.platform_connect() {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("WiFi: connection failed: {}", e);
                self.state = WifiState::Reconnecting { attempt: 0 };
                Err(e)
            }
        }
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        self.state = WifiState::Disconnected;
        self.on_link_down();
        info!("WiFi: disconnected");
    }

    fn is_connected(&self) -> bool {
        self.state == WifiState::Connected && self.platform_is_connected()
    }

    fn poll(&mut self, now_ms: u64) {
        match self.state {
            WifiState::Connecting => {
                if self.platform_is_connected() {
                    self.on_link_up();
                }
            }
            WifiState::Connected => {
                if self.platform_is_connected() {
                    self.last_rssi = self.platform_rssi();
                } else {
                    warn!("WiFi: connection lost, entering reconnect");
                    self.state = WifiState::Reconnecting { attempt: 0 };
                    self.next_retry_at = now_ms + self.backoff_ms;
                    self.on_link_down();
                }
            }
            WifiState::Reconnecting { attempt } => {
                if self.platform_is_connected() {
                    self.on_link_up();
                    return;
                }
                if now_ms < self.next_retry_at {
                    return;
                }
                let attempt = attempt + 1;
                info!("WiFi: reconnect attempt {} (backoff {} ms)", attempt, self.backoff_ms);
                self.state = WifiState::Reconnecting { attempt };
                self.backoff_ms = (self.backoff_ms * 2).min(MAX_BACKOFF_MS);
                self.next_retry_at = now_ms + self.backoff_ms;
                if self.platform_connect().is_ok() && self.platform_link_settles() {
                    self.on_link_up();
                }
            }
            WifiState::Disconnected => {}
        }
    }

    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.ssid.clear();
        self.ssid.push_str(ssid).map_err(|()| ConnectivityError::InvalidSsid)?;
        self.password.clear();
        self.password
            .push_str(password)
            .map_err(|()| ConnectivityError::InvalidPassword)?;
        info!("WiFi: credentials updated (SSID='{}')", self.ssid);
        Ok(())
    }

    fn rssi(&self) -> Option<i8> {
        self.last_rssi
    }

    fn ip(&self) -> &str {
        self.ip.as_str()
    }

    fn reconnect_attempts(&self) -> u32 {
        match self.state {
            WifiState::Reconnecting { attempt } => attempt,
            _ => 0,
        }
    }
}

impl WifiAdapter {
    /// On the board the association finishes asynchronously and the next
    /// poll picks it up; the simulation links immediately.
    fn platform_link_settles(&self) -> bool {
        cfg!(not(target_os = "espidf"))
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
