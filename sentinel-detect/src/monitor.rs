//! Detection engine orchestration
//!
//! [`Monitor`] owns the process-wide shutdown signal. Three roles run
//! concurrently once [`Monitor::run`] is called: the capture producer
//! thread, the prober task and the classifying loop on the caller's task.
//! Any fatal error, an external signal, or the end of the capture stream
//! makes every role unwind. The capture handle is always released before
//! `run` returns.

use sentinel_capture::{FrameSource, OfferCapture};
use sentinel_core::{shutdown, Error, Interface, Result, ShutdownTrigger};
use sentinel_dhcp::{ProbeConfig, Prober, RawSender};
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::classifier::Classifier;
use crate::config::DetectorConfig;
use crate::notifier::{DryRunNotifier, Notice, Notifier, SlackNotifier};

/// Fixed inputs to the engine loop
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub interface: String,
    /// Reported in the startup notice
    pub hostname: String,
    /// Delay before the first probe
    pub warmup: Duration,
}

impl MonitorSettings {
    pub fn new(interface: impl Into<String>, warmup: Duration) -> Self {
        Self {
            interface: interface.into(),
            hostname: local_hostname(),
            warmup,
        }
    }
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "[unknown]".to_string())
}

enum Frames {
    /// Opened but not reading yet
    Pending(OfferCapture),
    Running(Box<dyn FrameSource>),
}

pub struct Monitor {
    trigger: ShutdownTrigger,
    frames: Frames,
    prober: Prober,
    notifier: Box<dyn Notifier>,
    classifier: Classifier,
    settings: MonitorSettings,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("settings", &self.settings)
            .field("prober", &self.prober)
            .field("classifier", &self.classifier)
            .finish()
    }
}

impl Monitor {
    /// Open every resource the engine needs
    ///
    /// Nothing is spawned here, so an error leaves nothing running.
    pub async fn start(config: DetectorConfig) -> Result<Self> {
        config.validate()?;

        let interface = Interface::by_name(&config.interface)
            .map_err(|e| Error::CaptureOpen(e.to_string()))?;
        if interface.mac_address.is_zero() {
            return Err(Error::configuration(format!(
                "interface {} has no hardware address",
                interface.name
            )));
        }
        info!(interface = %interface, "Using interface");

        let filter = config.filter();
        let capture = OfferCapture::open(&interface.name, &filter, config.capture.clone())?;
        debug!(interface = %interface.name, filter = %filter, "DHCP snoop initialized");

        let notifier: Box<dyn Notifier> = if config.deliver {
            let credentials = config
                .slack
                .clone()
                .ok_or_else(|| Error::configuration("Slack credentials are required"))?;
            Box::new(SlackNotifier::connect(credentials).await?)
        } else {
            info!("Delivery disabled, notices will only be logged");
            Box::new(DryRunNotifier)
        };

        let probe_config =
            ProbeConfig::new(&interface.name, config.probe_interval, interface.mac_address)?;
        let prober = Prober::new(probe_config, Box::new(RawSender::open(&interface)?));

        let classifier = match config.trusted {
            Some(mac) => {
                info!(mac = %mac, "Using configured trusted DHCP server");
                Classifier::with_baseline(mac, config.cooldown)
            }
            None => Classifier::new(config.cooldown),
        };

        let (trigger, _) = shutdown::channel();
        let settings = MonitorSettings::new(&interface.name, config.warmup);

        Ok(Self {
            trigger,
            frames: Frames::Pending(capture),
            prober,
            notifier,
            classifier,
            settings,
        })
    }

    /// Assemble an engine from already-built parts
    ///
    /// `source` should stop yielding once `trigger` fires.
    pub fn from_parts(
        trigger: ShutdownTrigger,
        source: Box<dyn FrameSource>,
        prober: Prober,
        notifier: Box<dyn Notifier>,
        classifier: Classifier,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            trigger,
            frames: Frames::Running(source),
            prober,
            notifier,
            classifier,
            settings,
        }
    }

    /// Handle for external termination
    pub fn trigger(&self) -> ShutdownTrigger {
        self.trigger.clone()
    }

    /// Run until cancellation, stream closure, or a fatal error
    pub async fn run(self) -> Result<()> {
        let Monitor {
            trigger,
            frames,
            prober,
            notifier,
            mut classifier,
            settings,
        } = self;

        let mut source: Box<dyn FrameSource> = match frames {
            Frames::Pending(capture) => Box::new(capture.start(trigger.subscribe())?),
            Frames::Running(source) => source,
        };

        let outcome = drive(
            &trigger,
            source.as_mut(),
            prober,
            notifier.as_ref(),
            &mut classifier,
            &settings,
        )
        .await;

        trigger.trigger();
        let stats = source.close().await;
        debug!(interface = %settings.interface, "Capture statistics: {}", stats.format());

        match &outcome {
            Ok(()) => info!(interface = %settings.interface, "Monitor stopped"),
            Err(e) => error!(
                interface = %settings.interface,
                component = e.component(),
                error = %e,
                "Monitor stopped on fatal error"
            ),
        }
        outcome
    }
}

async fn drive(
    trigger: &ShutdownTrigger,
    source: &mut dyn FrameSource,
    prober: Prober,
    notifier: &dyn Notifier,
    classifier: &mut Classifier,
    settings: &MonitorSettings,
) -> Result<()> {
    let startup = Notice::Startup {
        hostname: settings.hostname.clone(),
        interface: settings.interface.clone(),
    };
    notifier.notify(&startup.to_string()).await?;

    let mut prober_task = tokio::spawn(prober.run(settings.warmup, trigger.subscribe()));
    let mut prober_done = false;
    let mut shutdown = trigger.subscribe();

    if classifier.baseline().is_none() {
        info!(interface = %settings.interface, "Waiting for first DHCP offer");
    }

    let mut outcome = loop {
        tokio::select! {
            biased;
            _ = shutdown.triggered() => {
                info!("Shutdown requested");
                break Ok(());
            }
            joined = &mut prober_task => {
                prober_done = true;
                break prober_result(joined);
            }
            frame = source.next_frame() => {
                let Some(packet) = frame else {
                    info!(interface = %settings.interface, "Observation stream closed");
                    break Ok(());
                };
                let verdict = classifier.classify(packet, Instant::now());
                let Some(notice) = verdict.notice() else {
                    continue;
                };
                let text = notice.to_string();
                // Delivery can take up to the client timeout
                tokio::select! {
                    biased;
                    _ = shutdown.triggered() => {
                        info!(notice = %text, "Shutdown requested while delivering notice");
                        break Ok(());
                    }
                    joined = &mut prober_task => {
                        prober_done = true;
                        break prober_result(joined);
                    }
                    delivered = notifier.notify(&text) => {
                        if let Err(e) = delivered {
                            break Err(e);
                        }
                    }
                }
            }
        }
    };

    trigger.trigger();
    if !prober_done {
        let stopped = join_prober(prober_task).await;
        if outcome.is_ok() {
            outcome = stopped;
        }
    }
    outcome
}

async fn join_prober(task: JoinHandle<Result<()>>) -> Result<()> {
    prober_result(task.await)
}

fn prober_result(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    match joined {
        Ok(result) => result,
        Err(e) => Err(Error::probe_transmit(format!("prober task aborted: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sentinel_capture::ChannelSource;
    use sentinel_core::{MacAddr, Packet};
    use sentinel_dhcp::FrameSender;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;
    use tokio::time;

    const TRUSTED: MacAddr = MacAddr::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    const ROGUE_A: MacAddr = MacAddr::new([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    const ROGUE_B: MacAddr = MacAddr::new([0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc]);
    const LOCAL: MacAddr = MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);

    #[derive(Clone, Default)]
    struct RecordingNotifier {
        messages: Arc<Mutex<Vec<String>>>,
        fail_prefix: Option<&'static str>,
        stall_prefix: Option<&'static str>,
    }

    impl RecordingNotifier {
        fn failing_on(prefix: &'static str) -> Self {
            Self {
                fail_prefix: Some(prefix),
                ..Self::default()
            }
        }

        fn stalling_on(prefix: &'static str) -> Self {
            Self {
                stall_prefix: Some(prefix),
                ..Self::default()
            }
        }

        fn messages(&self) -> Vec<String> {
            self.messages.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, message: &str) -> Result<()> {
            if let Some(prefix) = self.stall_prefix {
                if message.starts_with(prefix) {
                    std::future::pending::<()>().await;
                }
            }
            if let Some(prefix) = self.fail_prefix {
                if message.starts_with(prefix) {
                    return Err(Error::notify("channel_not_found"));
                }
            }
            self.messages.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct CountingSender {
        sent: Arc<Mutex<usize>>,
        fail: bool,
    }

    impl CountingSender {
        fn count(&self) -> usize {
            *self.sent.lock().unwrap()
        }
    }

    impl FrameSender for CountingSender {
        fn send(&mut self, _frame: &[u8]) -> Result<()> {
            if self.fail {
                return Err(Error::probe_transmit("network is down"));
            }
            *self.sent.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn offer_from(mac: MacAddr) -> Packet {
        let mut data = vec![0xff; 6];
        data.extend_from_slice(mac.as_bytes());
        data.extend_from_slice(&[0x08, 0x00]);
        data.extend_from_slice(&[0u8; 28]);
        Packet::new("test0".to_string(), data)
    }

    struct Harness {
        trigger: ShutdownTrigger,
        frames: mpsc::Sender<Packet>,
        notifier: RecordingNotifier,
        sender: CountingSender,
        monitor: Monitor,
    }

    fn harness(notifier: RecordingNotifier, sender: CountingSender, classifier: Classifier) -> Harness {
        let (trigger, _) = shutdown::channel();
        let (frames, rx) = mpsc::channel(16);
        let source = ChannelSource::new(rx, trigger.subscribe());
        let probe_config = ProbeConfig::new("test0", Duration::from_secs(60), LOCAL).unwrap();
        let prober = Prober::new(probe_config, Box::new(sender.clone()));
        let settings = MonitorSettings {
            interface: "test0".to_string(),
            hostname: "test-host".to_string(),
            warmup: Duration::from_secs(5),
        };

        let monitor = Monitor::from_parts(
            trigger.clone(),
            Box::new(source),
            prober,
            Box::new(notifier.clone()),
            classifier,
            settings,
        );

        Harness {
            trigger,
            frames,
            notifier,
            sender,
            monitor,
        }
    }

    fn minutes(n: u64) -> Duration {
        Duration::from_secs(n * 60)
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_alerts() {
        let h = harness(
            RecordingNotifier::default(),
            CountingSender::default(),
            Classifier::new(minutes(10)),
        );
        let task = tokio::spawn(h.monitor.run());

        h.frames.send(offer_from(TRUSTED)).await.unwrap();
        h.frames.send(offer_from(ROGUE_A)).await.unwrap();
        time::sleep(minutes(2)).await;
        h.frames.send(offer_from(ROGUE_A)).await.unwrap();
        time::sleep(minutes(9)).await;
        h.frames.send(offer_from(ROGUE_B)).await.unwrap();
        time::sleep(Duration::from_secs(1)).await;

        // Closing the stream ends monitoring cleanly
        drop(h.frames);
        task.await.unwrap().unwrap();

        assert_eq!(
            h.notifier.messages(),
            vec![
                "Starting DHCP sentinel on test-host (interface test0)".to_string(),
                "Trusted DHCP server established: aa:bb:cc:dd:ee:ff".to_string(),
                "Rogue DHCP server detected: 11:22:33:44:55:66".to_string(),
                "Rogue DHCP server detected: 77:88:99:aa:bb:cc".to_string(),
            ]
        );
        // Warm-up at 5s, then every minute until +11min
        assert_eq!(h.sender.count(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prober_failure_stops_engine() {
        let sender = CountingSender {
            fail: true,
            ..CountingSender::default()
        };
        let h = harness(RecordingNotifier::default(), sender, Classifier::new(minutes(10)));

        let started = Instant::now();
        let result = h.monitor.run().await;

        assert!(matches!(result, Err(Error::ProbeTransmit(_))));
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert!(h.trigger.is_triggered());
        assert!(h.frames.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_cancellation() {
        let h = harness(
            RecordingNotifier::default(),
            CountingSender::default(),
            Classifier::new(minutes(10)),
        );
        let trigger = h.monitor.trigger();
        let task = tokio::spawn(h.monitor.run());

        time::sleep(Duration::from_secs(30)).await;
        trigger.trigger();

        task.await.unwrap().unwrap();
        assert_eq!(h.sender.count(), 1);
        assert!(h.frames.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_alert_delivery_failure_is_fatal() {
        let h = harness(
            RecordingNotifier::failing_on("Rogue"),
            CountingSender::default(),
            Classifier::with_baseline(TRUSTED, minutes(10)),
        );
        let task = tokio::spawn(h.monitor.run());

        h.frames.send(offer_from(TRUSTED)).await.unwrap();
        h.frames.send(offer_from(ROGUE_A)).await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(Error::Notify(_))));
        assert!(h.trigger.is_triggered());
        assert_eq!(h.notifier.messages().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_notice_failure_starts_nothing() {
        let h = harness(
            RecordingNotifier::failing_on("Starting"),
            CountingSender::default(),
            Classifier::new(minutes(10)),
        );

        let result = h.monitor.run().await;
        assert!(matches!(result, Err(Error::Notify(_))));

        time::sleep(minutes(5)).await;
        assert_eq!(h.sender.count(), 0);
        assert!(h.frames.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unclassifiable_frames_do_not_notify() {
        let h = harness(
            RecordingNotifier::default(),
            CountingSender::default(),
            Classifier::new(minutes(10)),
        );
        let task = tokio::spawn(h.monitor.run());

        h.frames
            .send(Packet::new("test0".to_string(), vec![0xff; 8]))
            .await
            .unwrap();
        h.frames.send(offer_from(TRUSTED)).await.unwrap();
        h.frames
            .send(Packet::new("test0".to_string(), Vec::new()))
            .await
            .unwrap();
        drop(h.frames);

        task.await.unwrap().unwrap();
        assert_eq!(
            h.notifier.messages(),
            vec![
                "Starting DHCP sentinel on test-host (interface test0)".to_string(),
                "Trusted DHCP server established: aa:bb:cc:dd:ee:ff".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_slow_delivery() {
        let h = harness(
            RecordingNotifier::stalling_on("Rogue"),
            CountingSender::default(),
            Classifier::with_baseline(TRUSTED, minutes(10)),
        );
        let trigger = h.monitor.trigger();
        let task = tokio::spawn(h.monitor.run());

        h.frames.send(offer_from(ROGUE_A)).await.unwrap();
        time::sleep(Duration::from_secs(1)).await;
        trigger.trigger();

        task.await.unwrap().unwrap();
        assert!(h.frames.is_closed());
        assert_eq!(h.notifier.messages().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prober_failure_during_slow_delivery() {
        let sender = CountingSender {
            fail: true,
            ..CountingSender::default()
        };
        let h = harness(
            RecordingNotifier::stalling_on("Rogue"),
            sender,
            Classifier::with_baseline(TRUSTED, minutes(10)),
        );
        let started = Instant::now();
        let task = tokio::spawn(h.monitor.run());

        h.frames.send(offer_from(ROGUE_A)).await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(Error::ProbeTransmit(_))));
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert!(h.trigger.is_triggered());
    }

    #[tokio::test]
    async fn test_start_unknown_interface() {
        let mut config = DetectorConfig::new("nonexistent_interface_xyz");
        config.deliver = false;
        match Monitor::start(config).await {
            Err(Error::CaptureOpen(msg)) => assert!(msg.contains("nonexistent_interface_xyz")),
            other => panic!("Expected CaptureOpen error, got {:?}", other),
        }
    }

    #[test]
    fn test_settings_hostname_never_empty() {
        let settings = MonitorSettings::new("eth0", Duration::from_secs(5));
        assert!(!settings.hostname.is_empty());
    }
}
