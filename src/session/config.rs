use std::fmt;
use std::time::Duration;

use crate::pdu::CommandId;
use crate::session::rate::RateLimiter;
use crate::session::Handler;

/// Which bind operation the session performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    Transmitter,
    Receiver,
    Transceiver,
}

impl BindMode {
    pub(crate) fn command(self) -> CommandId {
        match self {
            BindMode::Transmitter => CommandId::BindTransmitter,
            BindMode::Receiver => CommandId::BindReceiver,
            BindMode::Transceiver => CommandId::BindTransceiver,
        }
    }
}

/// SMPP v3.4 `interface_version` octet.
pub const INTERFACE_VERSION_34: u8 = 0x34;

/// Everything a session needs to reach and authenticate with an SMSC, plus
/// the knobs governing the request multiplexer.
#[derive(Clone)]
pub struct SessionConfig {
    /// SMSC `host:port`.
    pub addr: String,
    /// Bind credentials.
    pub system_id: String,
    pub password: String,
    pub system_type: String,
    pub bind_mode: BindMode,
    pub interface_version: u8,
    pub addr_ton: u8,
    pub addr_npi: u8,
    pub address_range: String,
    /// Maximum concurrent in-flight requests; 0 means unlimited. The
    /// default of 1 gives stop-and-wait behavior.
    pub window_size: u32,
    /// Per-request deadline. `None` falls back to 1s when a window is
    /// configured and to no deadline otherwise.
    pub resp_timeout: Option<Duration>,
    /// Keepalive interval; `Duration::ZERO` disables enquire_link.
    pub enquire_link: Duration,
    /// Token-bucket gate applied before each submit.
    pub rate_limiter: Option<RateLimiter>,
    /// Callback for unsolicited PDUs (deliver_sm and friends).
    pub handler: Option<Handler>,
}

impl SessionConfig {
    pub fn new(
        addr: impl Into<String>,
        system_id: impl Into<String>,
        password: impl Into<String>,
    ) -> SessionConfig {
        SessionConfig {
            addr: addr.into(),
            system_id: system_id.into(),
            password: password.into(),
            system_type: String::new(),
            bind_mode: BindMode::Transmitter,
            interface_version: INTERFACE_VERSION_34,
            addr_ton: 0,
            addr_npi: 0,
            address_range: String::new(),
            window_size: 1,
            resp_timeout: None,
            enquire_link: Duration::from_secs(10),
            rate_limiter: None,
            handler: None,
        }
    }

    pub fn bind_mode(mut self, mode: BindMode) -> SessionConfig {
        self.bind_mode = mode;
        self
    }

    pub fn system_type(mut self, system_type: impl Into<String>) -> SessionConfig {
        self.system_type = system_type.into();
        self
    }

    pub fn window_size(mut self, window_size: u32) -> SessionConfig {
        self.window_size = window_size;
        self
    }

    pub fn resp_timeout(mut self, timeout: Duration) -> SessionConfig {
        self.resp_timeout = Some(timeout);
        self
    }

    pub fn enquire_link(mut self, interval: Duration) -> SessionConfig {
        self.enquire_link = interval;
        self
    }

    pub fn rate_limiter(mut self, limiter: RateLimiter) -> SessionConfig {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn handler(mut self, handler: Handler) -> SessionConfig {
        self.handler = Some(handler);
        self
    }

    /// The deadline actually applied to requests.
    pub(crate) fn effective_resp_timeout(&self) -> Option<Duration> {
        match self.resp_timeout {
            Some(timeout) => Some(timeout),
            None if self.window_size > 0 => Some(Duration::from_secs(1)),
            None => None,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("addr", &self.addr)
            .field("system_id", &self.system_id)
            .field("system_type", &self.system_type)
            .field("bind_mode", &self.bind_mode)
            .field("window_size", &self.window_size)
            .field("resp_timeout", &self.resp_timeout)
            .field("enquire_link", &self.enquire_link)
            .field("rate_limiter", &self.rate_limiter)
            .field("handler", &self.handler.as_ref().map(|_| "…"))
            .finish()
    }
}
