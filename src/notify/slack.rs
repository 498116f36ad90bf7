use eyre::Result;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

/// Slack notifier for executed and aborted cycles
#[derive(Debug)]
pub struct SlackNotifier {
    /// The Slack OAuth token
    token: String,
    /// The HTTP client
    client: Client,
}

impl SlackNotifier {
    /// Create a new Slack notifier
    ///
    /// # Errors
    /// * If `SLACK_OAUTH_TOKEN` is not set
    /// * If the HTTP client cannot be built
    pub fn new() -> Result<Self> {
        let token = std::env::var("SLACK_OAUTH_TOKEN")
            .map_err(|_| eyre::eyre!("SLACK_OAUTH_TOKEN not set"))?;

        // Create a client with a timeout
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self { token, client })
    }

    /// Create a notifier only when the token is configured; notifications
    /// are optional and the engine runs without them
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Self::new().ok()
    }

    /// Send a message to a specific channel
    ///
    /// # Errors
    /// * If the HTTP call fails or Slack reports an error
    pub async fn send_to(&self, msg: &str, channel: &str) -> Result<()> {
        let payload = json!({
            "channel": channel,
            "text": msg,
            "username": "Trine Bot",
            "icon_emoji": ":recycle:"
        });

        let response = self
            .client
            .post("https://slack.com/api/chat.postMessage")
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?
            .json::<serde_json::Value>()
            .await?;

        // Check if Slack API returned success
        if !response["ok"].as_bool().unwrap_or(false) {
            return Err(eyre::eyre!(
                "Slack API error: {}",
                response["error"].as_str().unwrap_or("unknown error")
            ));
        }

        Ok(())
    }

    /// Send a message to the default channel
    ///
    /// # Errors
    /// * If the HTTP call fails or Slack reports an error
    pub async fn send(&self, msg: &str) -> Result<()> {
        self.send_to(msg, "#trine").await
    }

    /// Send an error message to the error channel
    ///
    /// # Errors
    /// * If the HTTP call fails or Slack reports an error
    pub async fn send_error(&self, error: &str) -> Result<()> {
        self.send_to(&format!(":warning: Error: {error}"), "#trine-errors")
            .await
    }
}
