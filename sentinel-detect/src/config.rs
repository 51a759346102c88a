//! Runtime configuration for the detection engine

use sentinel_capture::{filters, CaptureConfig};
use sentinel_core::{Error, MacAddr, Result};
use sentinel_dhcp::{DEFAULT_PROBE_INTERVAL, DEFAULT_WARMUP, MIN_PROBE_INTERVAL};
use std::fmt;
use std::time::Duration;

/// Default alert cooldown window
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(600);

/// Shortest accepted cooldown window
pub const MIN_COOLDOWN: Duration = Duration::from_secs(10);

/// Slack bot token and target channel
#[derive(Clone, PartialEq, Eq)]
pub struct SlackCredentials {
    pub token: String,
    pub channel: String,
}

impl SlackCredentials {
    pub fn new(token: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            channel: channel.into(),
        }
    }
}

impl fmt::Debug for SlackCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackCredentials")
            .field("token", &"<redacted>")
            .field("channel", &self.channel)
            .finish()
    }
}

/// Everything the engine needs to start
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Interface to monitor and probe on
    pub interface: String,
    /// Minimum time between two rogue alerts
    pub cooldown: Duration,
    pub probe_interval: Duration,
    /// Delay before the first probe
    pub warmup: Duration,
    /// Pre-seeded trusted server address
    pub trusted: Option<MacAddr>,
    /// When false, notices are only logged
    pub deliver: bool,
    pub slack: Option<SlackCredentials>,
    pub capture: CaptureConfig,
}

impl DetectorConfig {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            cooldown: DEFAULT_COOLDOWN,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            warmup: DEFAULT_WARMUP,
            trusted: None,
            deliver: true,
            slack: None,
            capture: CaptureConfig::default(),
        }
    }

    /// Check the settings once, before anything is opened
    pub fn validate(&self) -> Result<()> {
        if self.interface.trim().is_empty() {
            return Err(Error::configuration("an interface is required"));
        }
        if self.cooldown < MIN_COOLDOWN {
            return Err(Error::configuration(format!(
                "cooldown {}s is below the {}s minimum",
                self.cooldown.as_secs_f64(),
                MIN_COOLDOWN.as_secs()
            )));
        }
        if self.probe_interval < MIN_PROBE_INTERVAL {
            return Err(Error::configuration(format!(
                "probe interval {}s is below the {}s minimum",
                self.probe_interval.as_secs_f64(),
                MIN_PROBE_INTERVAL.as_secs()
            )));
        }
        if self.capture.queue_capacity == 0 {
            return Err(Error::configuration("capture queue capacity must be positive"));
        }
        if let Some(mac) = &self.trusted {
            if mac.is_zero() || mac.is_multicast() {
                return Err(Error::configuration(format!(
                    "trusted address {} is not a unicast hardware address",
                    mac
                )));
            }
        }

        if self.deliver {
            match &self.slack {
                None => {
                    return Err(Error::configuration(
                        "Slack credentials are required: set SLACK_TOKEN and SLACK_CHANNEL, or disable delivery",
                    ))
                }
                Some(creds) if creds.token.trim().is_empty() => {
                    return Err(Error::configuration("SLACK_TOKEN is empty"))
                }
                Some(creds) if creds.channel.trim().is_empty() => {
                    return Err(Error::configuration("SLACK_CHANNEL is empty"))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// BPF filter for this configuration
    pub fn filter(&self) -> String {
        match &self.trusted {
            Some(mac) => filters::dhcp_offer_filter_excluding(mac),
            None => filters::dhcp_offer_filter(),
        }
    }
}
