//! Live offer capture around pcap
//!
//! pcap reads block, so frames are read on a dedicated thread and handed to
//! tokio over a bounded channel. The thread owns the capture handle and
//! drops it before the channel sender, which means a consumer that has seen
//! the end of the stream can rely on the handle being released.

use pcap::{Active, Capture, Device};
use sentinel_core::{Error, Interface, LinkType, Packet, Result, Shutdown};
use std::thread;
use std::time::{Duration, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::stats::{CaptureStats, StatsAccumulator};

/// Default snapshot length, enough for any DHCP offer on a 1500-byte MTU
const DEFAULT_SNAPLEN: i32 = 1600;

/// Default read timeout (milliseconds); bounds how late the thread sees cancellation
const DEFAULT_TIMEOUT_MS: i32 = 1000;

/// Default number of frames buffered between the capture thread and the consumer
const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Configuration for the capture handle
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Maximum bytes to capture per packet
    pub snaplen: i32,
    /// Read timeout in milliseconds
    pub timeout_ms: i32,
    /// Enable promiscuous mode
    pub promiscuous: bool,
    /// Enable immediate mode (deliver packets immediately)
    pub immediate_mode: bool,
    /// Bounded queue size between producer and consumer
    pub queue_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            snaplen: DEFAULT_SNAPLEN,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            promiscuous: true,
            immediate_mode: true,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// An opened, filtered capture handle which has not started reading yet
pub struct OfferCapture {
    interface: String,
    config: CaptureConfig,
    capture: Capture<Active>,
    link_type: LinkType,
}

impl std::fmt::Debug for OfferCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfferCapture")
            .field("interface", &self.interface)
            .field("config", &self.config)
            .field("link_type", &self.link_type)
            .finish()
    }
}

impl OfferCapture {
    /// Open a live capture on `interface` and install `filter`
    pub fn open(interface: &str, filter: &str, config: CaptureConfig) -> Result<Self> {
        let iface = Interface::by_name(interface)
            .map_err(|e| Error::CaptureOpen(e.to_string()))?;
        if !iface.is_up {
            return Err(Error::CaptureOpen(format!(
                "Interface '{}' is not up",
                interface
            )));
        }

        debug!(interface, "Initializing pcap capture");

        let mut capture = Capture::from_device(Device::from(interface))
            .map_err(|e| Error::CaptureOpen(format!("{}: {}", interface, e)))?
            .promisc(config.promiscuous)
            .snaplen(config.snaplen)
            .timeout(config.timeout_ms)
            .immediate_mode(config.immediate_mode)
            .open()
            .map_err(|e| Error::CaptureOpen(format!("{}: {}", interface, e)))?;

        capture
            .filter(filter, true)
            .map_err(|e| Error::CaptureOpen(format!("invalid filter '{}': {}", filter, e)))?;

        let link_type = LinkType::from_dlt(capture.get_datalink().0);
        if link_type != LinkType::Ethernet {
            warn!(interface, ?link_type, "Capture is not Ethernet, offers will be unclassifiable");
        }

        info!(interface, filter, "Capture opened");

        Ok(Self {
            interface: interface.to_string(),
            config,
            capture,
            link_type,
        })
    }

    /// Start the capture thread and return the consuming end
    pub fn start(self, shutdown: Shutdown) -> Result<OfferStream> {
        let OfferCapture {
            interface,
            config,
            mut capture,
            link_type,
        } = self;

        let name = interface.clone();
        let reader = move || {
            capture.next_packet().map(|raw| {
                let mut packet =
                    Packet::with_link_type(name.clone(), link_type, raw.data.to_vec());
                packet.timestamp = UNIX_EPOCH
                    + Duration::new(
                        raw.header.ts.tv_sec as u64,
                        (raw.header.ts.tv_usec as u32).saturating_mul(1000),
                    );
                packet.len = raw.header.len as usize;
                packet
            })
        };

        OfferStream::spawn(interface, config.queue_capacity, reader, shutdown)
    }
}

/// Consuming end of a running capture
pub struct OfferStream {
    interface: String,
    rx: mpsc::Receiver<Packet>,
    shutdown: Shutdown,
    producer: Option<thread::JoinHandle<()>>,
    stats: StatsAccumulator,
}

impl std::fmt::Debug for OfferStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfferStream")
            .field("interface", &self.interface)
            .field("running", &self.producer.is_some())
            .finish()
    }
}

impl OfferStream {
    /// Run `reader` on a new thread until cancellation, a read error, or
    /// the consumer going away
    fn spawn<R>(
        interface: String,
        queue_capacity: usize,
        reader: R,
        shutdown: Shutdown,
    ) -> Result<Self>
    where
        R: FnMut() -> std::result::Result<Packet, pcap::Error> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let stats = StatsAccumulator::new();

        let producer = {
            let stats = stats.clone();
            let shutdown = shutdown.clone();
            let interface = interface.clone();
            thread::Builder::new()
                .name(format!("capture-{}", interface))
                .spawn(move || produce(&interface, reader, tx, shutdown, stats))?
        };

        info!(interface = %interface, "Capture thread started");

        Ok(Self {
            interface,
            rx,
            shutdown,
            producer: Some(producer),
            stats,
        })
    }

    /// Next captured frame, or `None` once cancelled or the producer has stopped
    ///
    /// After cancellation `None` is returned only once the producer has
    /// released the capture handle.
    pub async fn next(&mut self) -> Option<Packet> {
        if !self.shutdown.is_triggered() {
            tokio::select! {
                biased;
                _ = self.shutdown.triggered() => {}
                packet = self.rx.recv() => return packet,
            }
        }
        self.drain().await;
        None
    }

    /// Discard queued frames until the producer drops its sender
    async fn drain(&mut self) {
        let mut discarded = 0u64;
        while self.rx.recv().await.is_some() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!(interface = %self.interface, discarded, "Dropped frames queued after cancellation");
        }
    }

    /// Stop consuming and wait for the capture thread to release the handle
    pub async fn close(&mut self) -> CaptureStats {
        self.rx.close();

        if let Some(producer) = self.producer.take() {
            match tokio::task::spawn_blocking(move || producer.join()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => error!(interface = %self.interface, "Capture thread panicked"),
                Err(e) => error!(interface = %self.interface, error = %e, "Failed to join capture thread"),
            }
        }

        let stats = self.stats.snapshot();
        info!(interface = %self.interface, "Capture closed: {}", stats.format());
        stats
    }
}

fn produce<R>(
    interface: &str,
    mut reader: R,
    tx: mpsc::Sender<Packet>,
    shutdown: Shutdown,
    stats: StatsAccumulator,
) where
    R: FnMut() -> std::result::Result<Packet, pcap::Error>,
{
    loop {
        if shutdown.is_triggered() || tx.is_closed() {
            debug!(interface, "Capture stopped");
            break;
        }

        match reader() {
            Ok(packet) => {
                stats.record_captured(packet.data.len());
                if shutdown.is_triggered() {
                    break;
                }
                // Blocks while the queue is full
                if tx.blocking_send(packet).is_err() {
                    debug!(interface, "Consumer gone, stopping capture");
                    break;
                }
                stats.record_forwarded();
            }
            Err(pcap::Error::TimeoutExpired) => continue,
            Err(e) => {
                stats.record_error();
                error!(interface, error = %e, "Packet capture error");
                break;
            }
        }
    }

    // Handle first, then the sender: the consumer sees the end only after release
    drop(reader);
    debug!(interface, "Capture handle released");
    drop(tx);
    info!(interface, "Capture thread finished");
}
