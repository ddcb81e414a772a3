// # Webhook Arrival Notifier
//
// Delivers the "arrived home" event as a single HTTP POST.
//
// ## Behavior
//
// - One request per dispatch, no retries (a failed arrival is dropped for
//   the cycle; the tracker's cooldown is already consumed)
// - HTTP timeout configured (30 seconds); the tracker applies its own,
//   usually shorter, bound on top
// - Transport timeouts map to `DispatchError::Timeout`, everything else
//   to `DispatchError::Rejected`
// - Dry-run mode (`SAFEHOME_MODE=dry-run`) logs the payload instead of sending
//
// ### Trust Level: Untrusted (Arrival Notifier)
//
// **Allowed Capabilities**:
// - ✅ POST to the configured endpoint only
//
// **Forbidden Capabilities**:
// - ❌ Spawn tasks or threads
// - ❌ Retry or back off
// - ❌ Access the state store
//
// ## Security Requirements
//
// - The bearer token NEVER appears in logs or Debug output
//
// ## Wire Format
//
// ```http
// POST <url>
// Authorization: Bearer <token>
// Content-Type: application/json
//
// {"event": "arrived_home", "label": "Home", "arrivedAt": 1736424090000}
// ```

use std::time::Duration;

use async_trait::async_trait;
use safehome_core::config::NotifierConfig;
use safehome_core::traits::{ArrivalNotifier, NotifierFactory};
use safehome_core::{ArrivalNotice, ComponentRegistry, DispatchError, Result, TrackingError};
use serde::Serialize;

/// Default HTTP timeout for webhook requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable selecting dry-run mode
const MODE_ENV: &str = "SAFEHOME_MODE";

/// Body of the arrival POST
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ArrivalPayload<'a> {
    event: &'static str,
    label: &'a str,
    arrived_at: i64,
}

impl<'a> From<&'a ArrivalNotice> for ArrivalPayload<'a> {
    fn from(notice: &'a ArrivalNotice) -> Self {
        Self {
            event: "arrived_home",
            label: &notice.label,
            arrived_at: notice.arrived_at.timestamp_millis(),
        }
    }
}

/// Webhook notifier
///
/// # Trust Level: Untrusted
///
/// Stateless and single-shot. Whether to notify at all is decided by the
/// tracker before this is ever called.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true the payload is logged and the call succeeds
/// without touching the network.
pub struct WebhookNotifier {
    /// Endpoint receiving the POST
    url: String,

    /// Bearer token
    /// ⚠️ NEVER log this value
    api_token: Option<String>,

    /// HTTP client for requests
    client: reqwest::Client,

    /// Dry-run mode: log instead of POST
    dry_run: bool,
}

// Custom Debug implementation that hides the token
impl std::fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookNotifier")
            .field("url", &self.url)
            .field("api_token", &self.api_token.as_ref().map(|_| "<REDACTED>"))
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl WebhookNotifier {
    /// Create a new webhook notifier
    ///
    /// # Errors
    ///
    /// `TrackingError::Config` if the URL is not http(s), the token is
    /// present but empty, or the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, api_token: Option<String>, dry_run: bool) -> Result<Self> {
        let url = url.into();
        NotifierConfig::Webhook {
            url: url.clone(),
            api_token: None,
        }
        .validate()?;

        if api_token.as_deref().is_some_and(str::is_empty) {
            return Err(TrackingError::config("Webhook API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| TrackingError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url,
            api_token,
            client,
            dry_run,
        })
    }

    /// Create a notifier that sends requests
    pub fn new_live(url: impl Into<String>, api_token: Option<String>) -> Result<Self> {
        Self::new(url, api_token, false)
    }

    /// Create a notifier that only logs what it would send
    pub fn new_dry_run(url: impl Into<String>, api_token: Option<String>) -> Result<Self> {
        Self::new(url, api_token, true)
    }
}

#[async_trait]
impl ArrivalNotifier for WebhookNotifier {
    async fn dispatch_arrival(&self, notice: &ArrivalNotice) -> std::result::Result<(), DispatchError> {
        let payload = ArrivalPayload::from(notice);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would POST arrival to {}: {}",
                self.url,
                serde_json::to_string(&payload).unwrap_or_default()
            );
            return Ok(());
        }

        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DispatchError::Timeout(DEFAULT_HTTP_TIMEOUT)
            } else {
                DispatchError::rejected(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(classify_status(status.as_u16(), &error_text));
        }

        tracing::debug!("Webhook accepted arrival for '{}' ({})", notice.label, status);
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "webhook"
    }
}

/// Map a non-success HTTP status to a dispatch error
fn classify_status(status: u16, error_text: &str) -> DispatchError {
    match status {
        401 | 403 => DispatchError::rejected(format!(
            "Authentication failed: invalid or missing API token. Status: {}",
            status
        )),
        404 => DispatchError::rejected(format!("Webhook endpoint not found. Status: {}", status)),
        429 => DispatchError::rejected(format!("Rate limit exceeded. Status: {}", status)),
        500..=599 => DispatchError::rejected(format!(
            "Webhook server error: {} - {}",
            status, error_text
        )),
        _ => DispatchError::rejected(format!("Webhook rejected arrival: {} - {}", status, error_text)),
    }
}

/// Factory for creating webhook notifiers
pub struct WebhookFactory;

impl NotifierFactory for WebhookFactory {
    fn create(&self, config: &NotifierConfig) -> Result<Box<dyn ArrivalNotifier>> {
        match config {
            NotifierConfig::Webhook { url, api_token } => {
                let dry_run = std::env::var(MODE_ENV)
                    .unwrap_or_default()
                    .eq_ignore_ascii_case("dry-run");

                if dry_run {
                    tracing::warn!("Webhook notifier running in DRY-RUN mode - no requests will be sent");
                }

                Ok(Box::new(WebhookNotifier::new(
                    url.clone(),
                    api_token.clone(),
                    dry_run,
                )?))
            }
            _ => Err(TrackingError::config("Invalid config for webhook notifier")),
        }
    }
}

/// Register the webhook notifier with a registry
///
/// # Example
///
/// ```rust
/// use safehome_core::ComponentRegistry;
///
/// let registry = ComponentRegistry::new();
/// safehome_notify_webhook::register(&registry);
/// assert!(registry.has_notifier("webhook"));
/// ```
pub fn register(registry: &ComponentRegistry) {
    registry.register_notifier("webhook", Box::new(WebhookFactory));
}
