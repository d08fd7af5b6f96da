//! Server-sent events realtime transport.
//!
//! One `GET /realtime/subscribe?topic=..` stream per subscription. Each
//! event's data is a JSON [`RealtimeEvent`]. Reconnection is disabled: when
//! the stream fails or ends the subscription is over, and missed messages
//! are picked up by the next REST reconciliation.

use futures_util::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use farmlink_core::realtime::{EventStream, RealtimeTransport};
use farmlink_types::config::ClientConfig;
use farmlink_types::error::SyncError;
use farmlink_types::realtime::RealtimeEvent;

use crate::auth::TokenProvider;
use crate::http::error::{status_error, transport_error};

pub struct SseTransport<T: TokenProvider> {
    client: reqwest::Client,
    base_url: String,
    tokens: T,
}

impl<T: TokenProvider + 'static> SseTransport<T> {
    /// The stream is long-lived, so only connection setup is bounded by the
    /// configured timeout.
    pub fn new(config: &ClientConfig, tokens: T) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout())
            .build()
            .map_err(|e| SyncError::NetworkUnavailable(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }
}

fn failed(err: SyncError) -> EventStream {
    Box::pin(futures_util::stream::once(async move { Err(err) }))
}

async fn map_error(err: reqwest_eventsource::Error) -> SyncError {
    use reqwest_eventsource::Error;

    match err {
        Error::Transport(err) => transport_error(err),
        Error::InvalidStatusCode(status, response) => {
            let body = response.text().await.unwrap_or_default();
            status_error(status, &body)
        }
        Error::InvalidContentType(content_type, _) => SyncError::DecodeFailed(format!(
            "unexpected content type {content_type:?} for event stream"
        )),
        other => SyncError::DecodeFailed(other.to_string()),
    }
}

impl<T: TokenProvider + 'static> RealtimeTransport for SseTransport<T> {
    fn subscribe(&self, topic: &str) -> EventStream {
        let token = match self.tokens.token() {
            Ok(token) => token,
            Err(err) => return failed(err),
        };

        let request = self
            .client
            .get(format!("{}/realtime/subscribe", self.base_url))
            .query(&[("topic", topic)])
            .bearer_auth(token.expose_secret());

        let mut source = match EventSource::new(request) {
            Ok(source) => source,
            Err(err) => return failed(SyncError::NetworkUnavailable(err.to_string())),
        };
        source.set_retry_policy(Box::new(reqwest_eventsource::retry::Never));

        let topic = topic.to_string();
        Box::pin(async_stream::stream! {
            while let Some(event) = source.next().await {
                match event {
                    Ok(Event::Open) => debug!(%topic, "realtime stream opened"),
                    Ok(Event::Message(message)) => {
                        match serde_json::from_str::<RealtimeEvent>(&message.data) {
                            Ok(event) => yield Ok(event),
                            // One bad payload does not end the subscription.
                            Err(err) => warn!(%topic, error = %err, "skipping malformed realtime event"),
                        }
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => {
                        debug!(%topic, "realtime stream ended");
                        break;
                    }
                    Err(err) => {
                        yield Err(map_error(err).await);
                        break;
                    }
                }
            }
            source.close();
        })
    }
}
