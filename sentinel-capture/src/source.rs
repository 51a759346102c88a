//! Frame source abstraction consumed by the detection loop

use async_trait::async_trait;
use sentinel_core::{Packet, Shutdown};
use tokio::sync::mpsc;

use crate::capture::OfferStream;
use crate::stats::{CaptureStats, StatsAccumulator};

/// A cancellable, ordered sequence of captured frames
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, or `None` when the sequence has ended
    async fn next_frame(&mut self) -> Option<Packet>;

    /// Release the underlying capture and return its statistics
    async fn close(&mut self) -> CaptureStats;
}

#[async_trait]
impl FrameSource for OfferStream {
    async fn next_frame(&mut self) -> Option<Packet> {
        OfferStream::next(self).await
    }

    async fn close(&mut self) -> CaptureStats {
        OfferStream::close(self).await
    }
}

/// Frames fed through an in-process channel, for replay and tests
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<Packet>,
    shutdown: Shutdown,
    stats: StatsAccumulator,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<Packet>, shutdown: Shutdown) -> Self {
        Self {
            rx,
            shutdown,
            stats: StatsAccumulator::new(),
        }
    }
}

#[async_trait]
impl FrameSource for ChannelSource {
    async fn next_frame(&mut self) -> Option<Packet> {
        if self.shutdown.is_triggered() {
            return None;
        }
        let packet = tokio::select! {
            biased;
            _ = self.shutdown.triggered() => None,
            packet = self.rx.recv() => packet,
        }?;
        self.stats.record_captured(packet.data.len());
        self.stats.record_forwarded();
        Some(packet)
    }

    async fn close(&mut self) -> CaptureStats {
        self.rx.close();
        self.stats.snapshot()
    }
}
