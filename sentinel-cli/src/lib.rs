//! Command-line front end for dhcp-sentinel
//!
//! Argument parsing, logging setup and the translation of flags into a
//! validated [`sentinel_detect::DetectorConfig`].

pub mod args;
pub mod logging;
pub mod signal;

pub use args::Cli;
