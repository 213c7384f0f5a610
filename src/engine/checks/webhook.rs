//! Customer-supplied webhook check.
//!
//! The one check that performs its own outbound HTTP call: the rule's URL
//! receives a POST describing the evaluation subject and answers with a
//! 2xx (trigger) or non-2xx (do not trigger). Timeouts and transport
//! failures resolve per the rule's configured `failureMode`, so a flaky
//! receiver degrades predictably instead of erroring the whole evaluation.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::engine::check::{Check, CheckContext, CheckOutcome, parse_args};
use crate::engine::rule::CheckKind;
use crate::errors::RuleError;

/// Default cap on the webhook round trip.
pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// Behavior when the webhook cannot be reached in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum FailureMode {
    #[serde(rename = "trigger")]
    Trigger,
    #[serde(rename = "doNotTrigger")]
    DoNotTrigger,
}

impl Default for FailureMode {
    fn default() -> Self {
        FailureMode::DoNotTrigger
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookArgs {
    url: String,
    #[serde(default)]
    failure_mode: FailureMode,
}

/// Optional response body shape. A missing or unparseable body falls back
/// to status-only interpretation.
#[derive(Deserialize)]
struct WebhookResponse {
    #[serde(default)]
    message: Option<String>,
}

pub struct WebhookCheck {
    client: reqwest::Client,
    timeout: Duration,
}

impl WebhookCheck {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_WEBHOOK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn validate_url(raw: &str) -> Result<Url, RuleError> {
        let parsed = Url::parse(raw).map_err(|e| RuleError::InvalidArgs {
            check: CheckKind::Webhook.as_str().to_string(),
            details: format!("invalid webhook url: {}", e),
        })?;
        if parsed.scheme() != "https" {
            return Err(RuleError::InvalidArgs {
                check: CheckKind::Webhook.as_str().to_string(),
                details: format!("webhook url must use https, got: {}", raw),
            });
        }
        Ok(parsed)
    }

    fn failure_outcome(mode: FailureMode, details: &str) -> CheckOutcome {
        match mode {
            FailureMode::Trigger => CheckOutcome::triggered(format!(
                "Webhook unreachable ({}), configured to trigger on failure",
                details
            )),
            FailureMode::DoNotTrigger => CheckOutcome::not_triggered(format!(
                "Webhook unreachable ({}), configured not to trigger on failure",
                details
            )),
        }
    }
}

#[async_trait]
impl Check for WebhookCheck {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let args: WebhookArgs = parse_args(CheckKind::Webhook, ctx.args)?;
        let url = Self::validate_url(&args.url)?;

        let payload = json!({
            "channel": ctx.channel.id,
            "user": ctx.user,
            "cast": ctx.cast,
        });

        debug!(url = %url, "Calling webhook check");
        let response = self
            .client
            .post(url.clone())
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "Webhook check transport failure");
                let details = if e.is_timeout() { "timeout" } else { "transport error" };
                return Ok(Self::failure_outcome(args.failure_mode, details));
            }
        };

        let status = response.status();
        let body: Option<WebhookResponse> = response.json().await.ok();
        let message = body.and_then(|b| b.message);

        if status.is_success() {
            Ok(CheckOutcome::triggered(message.unwrap_or_else(|| {
                format!("Webhook at {} triggered", url.host_str().unwrap_or("?"))
            })))
        } else if status.is_server_error() {
            // Receiver is down, same policy as unreachable.
            warn!(url = %url, status = %status, "Webhook check server error");
            Ok(Self::failure_outcome(
                args.failure_mode,
                &format!("status {}", status.as_u16()),
            ))
        } else {
            Ok(CheckOutcome::not_triggered(message.unwrap_or_else(|| {
                format!(
                    "Webhook at {} did not trigger",
                    url.host_str().unwrap_or("?")
                )
            })))
        }
    }
}
