//! Baseline tracking and offer classification
//!
//! The classifier starts in [`ClassifierState::AwaitingBaseline`]. The first
//! classifiable offer fixes the trusted address for the rest of the process;
//! later offers are either trusted, suppressed by the cooldown, or rogue.
//! All state lives here and is only touched by the consuming task.

use sentinel_core::{MacAddr, Packet};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::notifier::Notice;
use crate::offer::ObservedOffer;

/// Where the trusted address came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineOrigin {
    /// First offer seen on the wire
    Learned,
    /// Supplied by the operator
    Configured,
}

/// The trusted responder, fixed once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Baseline {
    pub trusted: MacAddr,
    pub established_at: Instant,
    pub origin: BaselineOrigin,
}

/// Global alert bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertState {
    /// `None` means no alert has been raised yet
    pub last_alert_at: Option<Instant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifierState {
    AwaitingBaseline,
    Monitoring(Baseline),
}

/// Outcome of classifying one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// First offer; its source is now trusted
    BaselineEstablished(MacAddr),
    /// From the trusted address
    Trusted,
    /// From another address, inside the cooldown window
    Suppressed,
    /// From another address; an alert must go out
    Rogue(MacAddr),
    /// No link-layer source address
    Unclassifiable,
}

impl Verdict {
    /// Notice to deliver for this verdict, if any
    pub fn notice(&self) -> Option<Notice> {
        match self {
            Verdict::BaselineEstablished(mac) => Some(Notice::BaselineEstablished { mac: *mac }),
            Verdict::Rogue(mac) => Some(Notice::RogueDetected { mac: *mac }),
            Verdict::Trusted | Verdict::Suppressed | Verdict::Unclassifiable => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Classifier {
    state: ClassifierState,
    alerts: AlertState,
    cooldown: Duration,
}

impl Classifier {
    /// Learn the baseline from the first offer
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: ClassifierState::AwaitingBaseline,
            alerts: AlertState::default(),
            cooldown,
        }
    }

    /// Start with an operator-supplied trusted address
    pub fn with_baseline(trusted: MacAddr, cooldown: Duration) -> Self {
        Self {
            state: ClassifierState::Monitoring(Baseline {
                trusted,
                established_at: Instant::now(),
                origin: BaselineOrigin::Configured,
            }),
            alerts: AlertState::default(),
            cooldown,
        }
    }

    pub fn state(&self) -> &ClassifierState {
        &self.state
    }

    pub fn baseline(&self) -> Option<&Baseline> {
        match &self.state {
            ClassifierState::AwaitingBaseline => None,
            ClassifierState::Monitoring(baseline) => Some(baseline),
        }
    }

    pub fn last_alert_at(&self) -> Option<Instant> {
        self.alerts.last_alert_at
    }

    /// Classify one captured frame observed at `now`
    pub fn classify(&mut self, packet: Packet, now: Instant) -> Verdict {
        let offer = match ObservedOffer::from_packet(packet, now) {
            Ok(offer) => offer,
            Err(e) => {
                warn!(component = e.component(), error = %e, "Skipping frame");
                return Verdict::Unclassifiable;
            }
        };

        match offer.details() {
            Some(details) => debug!(mac = %offer.source, "Got DHCP offer: {}", details),
            None => debug!(mac = %offer.source, "Got DHCP offer"),
        }

        let trusted = match &self.state {
            ClassifierState::AwaitingBaseline => {
                info!(mac = %offer.source, "Got first DHCP offer, trusting this server");
                self.state = ClassifierState::Monitoring(Baseline {
                    trusted: offer.source,
                    established_at: now,
                    origin: BaselineOrigin::Learned,
                });
                return Verdict::BaselineEstablished(offer.source);
            }
            ClassifierState::Monitoring(baseline) => baseline.trusted,
        };

        if offer.source == trusted {
            debug!(mac = %offer.source, "Offer from trusted server");
            return Verdict::Trusted;
        }

        if let Some(last) = self.alerts.last_alert_at {
            // Saturates when `now` precedes the last alert
            if now.saturating_duration_since(last) < self.cooldown {
                info!(mac = %offer.source, "Ignoring rogue offer, too soon since last alert");
                return Verdict::Suppressed;
            }
        }

        self.alerts.last_alert_at = Some(match self.alerts.last_alert_at {
            Some(last) => last.max(now),
            None => now,
        });
        warn!(mac = %offer.source, trusted = %trusted, "Rogue DHCP server detected");
        Verdict::Rogue(offer.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRUSTED: MacAddr = MacAddr::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    const ROGUE_A: MacAddr = MacAddr::new([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    const ROGUE_B: MacAddr = MacAddr::new([0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc]);
    const COOLDOWN: Duration = Duration::from_secs(600);

    fn offer_from(mac: MacAddr) -> Packet {
        let mut data = vec![0xff; 6];
        data.extend_from_slice(mac.as_bytes());
        data.extend_from_slice(&[0x08, 0x00]);
        data.extend_from_slice(&[0u8; 28]);
        Packet::new("eth0".to_string(), data)
    }

    fn minutes(n: u64) -> Duration {
        Duration::from_secs(n * 60)
    }

    #[test]
    fn test_baseline_traffic_never_alerts() {
        let mut classifier = Classifier::new(COOLDOWN);
        let t0 = Instant::now();

        assert_eq!(
            classifier.classify(offer_from(TRUSTED), t0),
            Verdict::BaselineEstablished(TRUSTED)
        );
        for i in 1..50u64 {
            let verdict = classifier.classify(offer_from(TRUSTED), t0 + Duration::from_secs(i * 7));
            assert_eq!(verdict, Verdict::Trusted);
        }
        assert_eq!(classifier.last_alert_at(), None);
    }

    #[test]
    fn test_first_offer_fixes_baseline() {
        let mut classifier = Classifier::new(COOLDOWN);
        let t0 = Instant::now();

        classifier.classify(offer_from(TRUSTED), t0);
        let baseline = classifier.baseline().unwrap();
        assert_eq!(baseline.trusted, TRUSTED);
        assert_eq!(baseline.origin, BaselineOrigin::Learned);
        assert_eq!(baseline.established_at, t0);

        assert_eq!(classifier.classify(offer_from(ROGUE_A), t0), Verdict::Rogue(ROGUE_A));
        // Never overwritten by later offers
        assert_eq!(classifier.baseline().unwrap().trusted, TRUSTED);
    }

    #[test]
    fn test_cooldown_window() {
        let t0 = Instant::now();

        let mut close = Classifier::with_baseline(TRUSTED, COOLDOWN);
        assert_eq!(close.classify(offer_from(ROGUE_A), t0), Verdict::Rogue(ROGUE_A));
        assert_eq!(
            close.classify(offer_from(ROGUE_A), t0 + COOLDOWN - Duration::from_secs(1)),
            Verdict::Suppressed
        );

        let mut apart = Classifier::with_baseline(TRUSTED, COOLDOWN);
        assert_eq!(apart.classify(offer_from(ROGUE_A), t0), Verdict::Rogue(ROGUE_A));
        assert_eq!(
            apart.classify(offer_from(ROGUE_A), t0 + COOLDOWN),
            Verdict::Rogue(ROGUE_A)
        );
        assert_eq!(apart.last_alert_at(), Some(t0 + COOLDOWN));
    }

    #[test]
    fn test_cooldown_is_global() {
        let t0 = Instant::now();
        let mut classifier = Classifier::with_baseline(TRUSTED, COOLDOWN);

        assert_eq!(classifier.classify(offer_from(ROGUE_A), t0), Verdict::Rogue(ROGUE_A));
        assert_eq!(
            classifier.classify(offer_from(ROGUE_B), t0 + minutes(1)),
            Verdict::Suppressed
        );
    }

    #[test]
    fn test_trusted_offer_does_not_touch_cooldown() {
        let t0 = Instant::now();
        let mut classifier = Classifier::with_baseline(TRUSTED, COOLDOWN);

        classifier.classify(offer_from(ROGUE_A), t0);
        classifier.classify(offer_from(TRUSTED), t0 + minutes(9));
        assert_eq!(classifier.last_alert_at(), Some(t0));
        assert_eq!(
            classifier.classify(offer_from(ROGUE_A), t0 + minutes(10)),
            Verdict::Rogue(ROGUE_A)
        );
    }

    #[test]
    fn test_unclassifiable_frame_changes_nothing() {
        let t0 = Instant::now();
        let mut classifier = Classifier::new(COOLDOWN);

        let truncated = Packet::new("eth0".to_string(), vec![0xff; 8]);
        assert_eq!(classifier.classify(truncated, t0), Verdict::Unclassifiable);
        assert_eq!(classifier.state(), &ClassifierState::AwaitingBaseline);

        classifier.classify(offer_from(TRUSTED), t0);
        classifier.classify(offer_from(ROGUE_A), t0);
        let before = classifier.last_alert_at();

        let cooked = Packet::with_link_type(
            "any".to_string(),
            sentinel_core::LinkType::Other(113),
            offer_from(ROGUE_B).data,
        );
        let verdict = classifier.classify(cooked, t0 + minutes(20));
        assert_eq!(verdict, Verdict::Unclassifiable);
        assert_eq!(verdict.notice(), None);
        assert_eq!(classifier.last_alert_at(), before);
    }

    #[test]
    fn test_redelivered_frame_classified_twice() {
        let t0 = Instant::now();
        let mut classifier = Classifier::with_baseline(TRUSTED, Duration::from_secs(10));
        let frame = offer_from(ROGUE_A);

        assert_eq!(classifier.classify(frame.clone(), t0), Verdict::Rogue(ROGUE_A));
        assert_eq!(classifier.classify(frame.clone(), t0), Verdict::Suppressed);
        assert_eq!(
            classifier.classify(frame, t0 + Duration::from_secs(10)),
            Verdict::Rogue(ROGUE_A)
        );
    }

    #[test]
    fn test_out_of_order_timestamps() {
        let t0 = Instant::now();
        let mut classifier = Classifier::with_baseline(TRUSTED, COOLDOWN);

        classifier.classify(offer_from(ROGUE_A), t0 + minutes(30));
        assert_eq!(classifier.classify(offer_from(ROGUE_B), t0), Verdict::Suppressed);
        assert_eq!(classifier.last_alert_at(), Some(t0 + minutes(30)));
    }

    #[test]
    fn test_configured_baseline() {
        let classifier = Classifier::with_baseline(TRUSTED, COOLDOWN);
        let baseline = classifier.baseline().unwrap();
        assert_eq!(baseline.trusted, TRUSTED);
        assert_eq!(baseline.origin, BaselineOrigin::Configured);
    }

    #[test]
    fn test_end_to_end_sequence() {
        let t0 = Instant::now();
        let mut classifier = Classifier::new(COOLDOWN);

        let verdicts = [
            classifier.classify(offer_from(TRUSTED), t0),
            classifier.classify(offer_from(ROGUE_A), t0),
            classifier.classify(offer_from(ROGUE_A), t0 + minutes(2)),
            classifier.classify(offer_from(ROGUE_B), t0 + minutes(11)),
        ];

        assert_eq!(
            verdicts,
            [
                Verdict::BaselineEstablished(TRUSTED),
                Verdict::Rogue(ROGUE_A),
                Verdict::Suppressed,
                Verdict::Rogue(ROGUE_B),
            ]
        );
        assert_eq!(classifier.last_alert_at(), Some(t0 + minutes(11)));

        // New window starts at +11min
        assert_eq!(
            classifier.classify(offer_from(ROGUE_A), t0 + minutes(20)),
            Verdict::Suppressed
        );
    }
}
