//! Rogue DHCP detection engine
//!
//! The engine learns (or is told) which hardware address the legitimate DHCP
//! server uses, then raises an alert whenever an offer arrives from any other
//! address. Alerts share one global cooldown window.
//!
//! ## Components
//!
//! - [`classifier`]: baseline and alert state, one verdict per captured offer
//! - [`notifier`]: Slack delivery, or a dry-run sink that only logs
//! - [`monitor`]: wires capture, prober, classifier and notifier together
//! - [`config`]: validated runtime settings

pub mod classifier;
pub mod config;
pub mod monitor;
pub mod notifier;
pub mod offer;

pub use classifier::{AlertState, Baseline, BaselineOrigin, Classifier, ClassifierState, Verdict};
pub use config::{DetectorConfig, SlackCredentials, DEFAULT_COOLDOWN, MIN_COOLDOWN};
pub use monitor::{Monitor, MonitorSettings};
pub use notifier::{DryRunNotifier, Notice, Notifier, SlackNotifier};
pub use offer::{ObservedOffer, OfferDetails};
