//! Active prober
//!
//! Broadcasts a DHCP DISCOVER on a fixed interval so that every server on
//! the segment answers with an offer the capture side can see. The prober
//! never reads replies; a failed send ends the task with an error and the
//! orchestrator shuts everything down.

use pnet_datalink::{Channel, DataLinkSender};
use sentinel_core::{Error, Interface, MacAddr, Result, Shutdown};
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::frame::discover_frame;
use crate::packet::DhcpPacket;

/// Shortest accepted probe interval
pub const MIN_PROBE_INTERVAL: Duration = Duration::from_secs(10);

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(60);

/// Delay before the first probe
pub const DEFAULT_WARMUP: Duration = Duration::from_secs(5);

/// Transport for fully-formed Ethernet frames
pub trait FrameSender: Send {
    fn send(&mut self, frame: &[u8]) -> Result<()>;
}

/// Raw Ethernet channel bound to one interface
pub struct RawSender {
    interface: String,
    tx: Box<dyn DataLinkSender>,
}

impl RawSender {
    pub fn open(interface: &Interface) -> Result<Self> {
        let datalink = interface.datalink()?;
        let tx = match pnet_datalink::channel(&datalink, Default::default()) {
            Ok(Channel::Ethernet(tx, _rx)) => tx,
            Ok(_) => {
                return Err(Error::probe_transmit(format!(
                    "unsupported channel type on {}",
                    interface.name
                )))
            }
            Err(e) => {
                return Err(Error::probe_transmit(format!(
                    "failed to open raw channel on {}: {}",
                    interface.name, e
                )))
            }
        };

        debug!(interface = %interface.name, "Raw sender opened");
        Ok(Self {
            interface: interface.name.clone(),
            tx,
        })
    }
}

impl FrameSender for RawSender {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.tx
            .send_to(frame, None)
            .ok_or_else(|| Error::probe_transmit(format!("send buffer full on {}", self.interface)))?
            .map_err(|e| Error::probe_transmit(format!("send on {}: {}", self.interface, e)))
    }
}

/// Prober settings, fixed at construction
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeConfig {
    pub interface: String,
    pub interval: Duration,
    /// Source and client hardware address of every DISCOVER
    pub source_mac: MacAddr,
}

impl ProbeConfig {
    pub fn new(interface: impl Into<String>, interval: Duration, source_mac: MacAddr) -> Result<Self> {
        if interval < MIN_PROBE_INTERVAL {
            return Err(Error::configuration(format!(
                "probe interval {}s is below the {}s minimum",
                interval.as_secs_f64(),
                MIN_PROBE_INTERVAL.as_secs()
            )));
        }
        Ok(Self {
            interface: interface.into(),
            interval,
            source_mac,
        })
    }
}

/// Periodic DISCOVER broadcaster
pub struct Prober {
    config: ProbeConfig,
    sender: Box<dyn FrameSender>,
    sent: u64,
}

impl std::fmt::Debug for Prober {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prober")
            .field("config", &self.config)
            .field("sent", &self.sent)
            .finish()
    }
}

impl Prober {
    pub fn new(config: ProbeConfig, sender: Box<dyn FrameSender>) -> Self {
        Self {
            config,
            sender,
            sent: 0,
        }
    }

    /// Probes sent so far
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Send one DISCOVER with a fresh transaction id
    pub fn disco(&mut self) -> Result<()> {
        let xid: u32 = rand::random();
        let mac = self.config.source_mac;

        let frame = DhcpPacket::new_discover(xid, mac)
            .build()
            .and_then(|payload| discover_frame(mac, &payload))
            .map_err(|e| Error::probe_transmit(format!("building DISCOVER: {}", e)))?;

        self.sender.send(&frame).map_err(|e| match e {
            Error::ProbeTransmit(_) => e,
            other => Error::probe_transmit(other.to_string()),
        })?;

        self.sent += 1;
        debug!(
            interface = %self.config.interface,
            xid = %format!("{:#010x}", xid),
            sent = self.sent,
            "DISCOVER sent"
        );
        Ok(())
    }

    /// Probe after `warmup`, then once per interval, until shutdown or the first failure
    pub async fn run(mut self, warmup: Duration, mut shutdown: Shutdown) -> Result<()> {
        info!(
            interface = %self.config.interface,
            interval_secs = self.config.interval.as_secs(),
            warmup_secs = warmup.as_secs(),
            "Prober started"
        );

        let mut ticker = time::interval_at(Instant::now() + warmup, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => break,
                _ = ticker.tick() => {}
            }

            // A tick racing the shutdown signal must not send
            if shutdown.is_triggered() {
                break;
            }

            if let Err(e) = self.disco() {
                error!(interface = %self.config.interface, error = %e, "Probe failed");
                return Err(e);
            }
        }

        info!(interface = %self.config.interface, sent = self.sent, "Prober stopped");
        Ok(())
    }
}
