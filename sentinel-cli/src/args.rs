//! CLI argument parsing

use clap::Parser;
use sentinel_core::{Error, MacAddr, Result};
use sentinel_detect::{DetectorConfig, SlackCredentials};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "dhcp-sentinel")]
#[command(version, about = "Detect rogue DHCP servers on the local segment", long_about = None)]
pub struct Cli {
    /// Network interface to monitor
    #[arg(
        short = 'i',
        long,
        value_name = "IFACE",
        required_unless_present = "list_interfaces"
    )]
    pub interface: Option<String>,

    /// Enable debug output
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Minimum time between two rogue alerts
    #[arg(long, value_name = "SECONDS", default_value_t = 600)]
    pub cooldown: u64,

    /// Time between two DISCOVER probes
    #[arg(long, value_name = "SECONDS", default_value_t = 60)]
    pub interval: u64,

    /// Delay before the first probe
    #[arg(long, value_name = "SECONDS", default_value_t = 5)]
    pub warmup: u64,

    /// Trust this server address instead of learning it from the first offer
    #[arg(long, value_name = "MAC")]
    pub trusted: Option<MacAddr>,

    /// Log notices instead of posting them to Slack
    #[arg(short = 'n', long, env = "SENTINEL_NO_DELIVER")]
    pub no_deliver: bool,

    /// Slack bot token
    #[arg(long, env = "SLACK_TOKEN", value_name = "TOKEN", hide_env_values = true)]
    pub slack_token: Option<String>,

    /// Slack channel to post to
    #[arg(long, env = "SLACK_CHANNEL", value_name = "ID")]
    pub slack_channel: Option<String>,

    /// List interfaces that can be monitored and exit
    #[arg(long)]
    pub list_interfaces: bool,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validated engine configuration
    pub fn into_config(self) -> Result<DetectorConfig> {
        let interface = self.interface.ok_or_else(|| {
            Error::configuration("please provide the interface to listen on using -i")
        })?;

        let mut config = DetectorConfig::new(interface);
        config.cooldown = Duration::from_secs(self.cooldown);
        config.probe_interval = Duration::from_secs(self.interval);
        config.warmup = Duration::from_secs(self.warmup);
        config.trusted = self.trusted;
        config.deliver = !self.no_deliver;

        config.slack = match (self.slack_token, self.slack_channel) {
            (Some(token), Some(channel)) => Some(SlackCredentials::new(token, channel)),
            (None, _) if config.deliver => {
                return Err(Error::configuration(
                    "please set the SLACK_TOKEN environment variable",
                ))
            }
            (_, None) if config.deliver => {
                return Err(Error::configuration(
                    "please set the SLACK_CHANNEL environment variable",
                ))
            }
            _ => None,
        };

        config.validate()?;
        Ok(config)
    }
}
