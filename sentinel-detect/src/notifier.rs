//! Notification delivery
//!
//! Every notice is delivered at most once. A failed delivery is returned to
//! the caller and never retried.

use async_trait::async_trait;
use reqwest::Client;
use sentinel_core::{Error, MacAddr, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::SlackCredentials;

const SLACK_API_BASE: &str = "https://slack.com/api";

/// Sink for human-readable notices
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<()>;
}

/// Messages the engine sends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Startup { hostname: String, interface: String },
    BaselineEstablished { mac: MacAddr },
    RogueDetected { mac: MacAddr },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Startup {
                hostname,
                interface,
            } => write!(
                f,
                "Starting DHCP sentinel on {} (interface {})",
                hostname, interface
            ),
            Notice::BaselineEstablished { mac } => {
                write!(f, "Trusted DHCP server established: {}", mac)
            }
            Notice::RogueDetected { mac } => write!(f, "Rogue DHCP server detected: {}", mac),
        }
    }
}

/// Response envelope shared by every Slack Web API method
#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    team: Option<String>,
}

impl SlackResponse {
    fn parse(body: &str) -> std::result::Result<Self, String> {
        let response: SlackResponse =
            serde_json::from_str(body).map_err(|e| format!("invalid response: {}", e))?;
        if response.ok {
            Ok(response)
        } else {
            Err(response
                .error
                .unwrap_or_else(|| "unknown_error".to_string()))
        }
    }
}

#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
}

/// Posts notices to a Slack channel through the Web API
pub struct SlackNotifier {
    client: Client,
    api_base: String,
    credentials: SlackCredentials,
}

impl fmt::Debug for SlackNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackNotifier")
            .field("api_base", &self.api_base)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl SlackNotifier {
    /// Build the client and verify the token with `auth.test`
    pub async fn connect(credentials: SlackCredentials) -> Result<Self> {
        Self::connect_to(SLACK_API_BASE, credentials).await
    }

    pub async fn connect_to(api_base: &str, credentials: SlackCredentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| Error::Authentication(format!("building HTTP client: {}", e)))?;

        let notifier = Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            credentials,
        };

        let response = notifier
            .call("auth.test", None)
            .await
            .map_err(Error::Authentication)?;
        info!(
            user = response.user.as_deref().unwrap_or("?"),
            team = response.team.as_deref().unwrap_or("?"),
            "Slack authentication successful"
        );
        Ok(notifier)
    }

    async fn call(
        &self,
        method: &str,
        body: Option<&PostMessage<'_>>,
    ) -> std::result::Result<SlackResponse, String> {
        let url = format!("{}/{}", self.api_base, method);
        let mut request = self
            .client
            .post(&url)
            .bearer_auth(&self.credentials.token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| format!("{} request failed: {}", method, e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| format!("{} response unreadable: {}", method, e))?;

        if !status.is_success() {
            return Err(format!("{} returned HTTP {}", method, status));
        }
        SlackResponse::parse(&text).map_err(|e| format!("{}: {}", method, e))
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        info!(channel = %self.credentials.channel, text = message, "Posting message to Slack");
        let body = PostMessage {
            channel: &self.credentials.channel,
            text: message,
        };
        self.call("chat.postMessage", Some(&body))
            .await
            .map_err(Error::notify)?;
        debug!("Slack message posted");
        Ok(())
    }
}

/// Logs notices instead of delivering them
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunNotifier;

#[async_trait]
impl Notifier for DryRunNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        info!(text = message, "Delivery disabled, not posting message");
        Ok(())
    }
}
