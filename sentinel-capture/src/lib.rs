//! Filtered packet capture for dhcp-sentinel
//!
//! This crate wraps pcap into a bounded, cancellable stream of DHCP offer
//! frames.
//!
//! ## Features
//!
//! - **BPF Filters**: the offer filter is evaluated in the kernel
//! - **Bounded Queue**: frames are handed to tokio over a fixed-size channel
//! - **Cancellation**: the capture handle is released before the stream ends
//! - **Statistics**: captured/forwarded/error counters for the session
//!
//! ## Example
//!
//! ```no_run
//! use sentinel_capture::{filters, CaptureConfig, OfferCapture};
//!
//! # async fn run() -> sentinel_core::Result<()> {
//! let (trigger, shutdown) = sentinel_core::shutdown::channel();
//! let capture = OfferCapture::open("eth0", &filters::dhcp_offer_filter(), CaptureConfig::default())?;
//! let mut stream = capture.start(shutdown)?;
//!
//! while let Some(packet) = stream.next().await {
//!     println!("offer from {:?}", packet.source_mac());
//! #   trigger.trigger();
//! }
//! let stats = stream.close().await;
//! println!("{}", stats.format());
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod filters;
pub mod source;
pub mod stats;

// Re-export main types
pub use capture::{CaptureConfig, OfferCapture, OfferStream};
pub use source::{ChannelSource, FrameSource};
pub use stats::{CaptureStats, StatsAccumulator};
