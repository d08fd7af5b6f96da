//! HttpMarketplaceClient -- concrete [`MarketplaceApi`] over the REST API.
//!
//! Every call carries the bearer token from a [`TokenProvider`] and is
//! bounded by the configured client timeout. Failures are mapped onto the
//! `SyncError` taxonomy and never retried here.

use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::debug;

use farmlink_core::api::MarketplaceApi;
use farmlink_types::approval::{ApprovalRequest, ApprovalRequestId};
use farmlink_types::config::ClientConfig;
use farmlink_types::error::SyncError;
use farmlink_types::message::{MessageDraft, OutgoingMessage, WireMessage};
use farmlink_types::offer::NewOffer;
use farmlink_types::session::SessionId;
use farmlink_types::{ProductId, UserId};

use crate::auth::TokenProvider;

use super::error::{status_error, transport_error};
use super::wire::{MaxSessionResponse, PostMessageResponse, SessionResponse};

/// Marketplace REST client.
///
/// Does not derive `Debug`; the token provider may hold a secret.
pub struct HttpMarketplaceClient<T: TokenProvider> {
    client: reqwest::Client,
    base_url: String,
    tokens: T,
}

impl<T: TokenProvider> HttpMarketplaceClient<T> {
    pub fn new(config: &ClientConfig, tokens: T) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SyncError::NetworkUnavailable(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, SyncError> {
        let token = self.tokens.token()?;
        let response = request
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(%status, "marketplace request failed");
        Err(status_error(status, &body))
    }

    async fn get_json<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<R, SyncError> {
        debug!(path, "GET");
        let response = self.send(self.client.get(self.url(path)).query(query)).await?;
        decode(response).await
    }

    async fn post_empty(&self, path: &str) -> Result<(), SyncError> {
        debug!(path, "POST");
        self.send(self.client.post(self.url(path))).await?;
        Ok(())
    }
}

async fn decode<R: DeserializeOwned>(response: Response) -> Result<R, SyncError> {
    let bytes = response.bytes().await.map_err(transport_error)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| SyncError::DecodeFailed(format!("failed to parse response: {e}")))
}

fn conversation_query(
    product_id: ProductId,
    sender_id: UserId,
    receiver_id: UserId,
) -> [(&'static str, String); 3] {
    [
        ("product_id", product_id.to_string()),
        ("sender_id", sender_id.to_string()),
        ("receiver_id", receiver_id.to_string()),
    ]
}

fn message_form(message: &OutgoingMessage) -> Result<Form, SyncError> {
    let form = Form::new()
        .text("sender_id", message.sender_id.to_string())
        .text("receiver_id", message.receiver_id.to_string())
        .text("product_id", message.product_id.to_string())
        .text("session", message.session.to_string());

    Ok(match &message.draft {
        MessageDraft::Text(text) => form.text("message", text.clone()),
        MessageDraft::Image {
            file_name,
            mime_type,
            bytes,
        } => {
            let part = Part::bytes(bytes.clone())
                .file_name(file_name.clone())
                .mime_str(mime_type)
                .map_err(|e| SyncError::ValidationFailed(format!("invalid image type '{mime_type}': {e}")))?;
            form.part("image", part)
        }
    })
}

impl<T: TokenProvider> MarketplaceApi for HttpMarketplaceClient<T> {
    async fn find_session(
        &self,
        product_id: ProductId,
        sender_id: UserId,
        receiver_id: UserId,
    ) -> Result<Option<SessionId>, SyncError> {
        let query = conversation_query(product_id, sender_id, receiver_id);
        let response: SessionResponse = self.get_json("/chat/session", &query).await?;
        Ok(response.session)
    }

    async fn max_session(&self) -> Result<SessionId, SyncError> {
        let response: MaxSessionResponse = self.get_json("/chat/max-session", &[]).await?;
        Ok(response.max_session.unwrap_or(SessionId(0)))
    }

    async fn fetch_messages(
        &self,
        product_id: ProductId,
        sender_id: UserId,
        receiver_id: UserId,
    ) -> Result<Vec<WireMessage>, SyncError> {
        let query = conversation_query(product_id, sender_id, receiver_id);
        self.get_json("/chat/messages", &query).await
    }

    async fn post_message(&self, message: &OutgoingMessage) -> Result<WireMessage, SyncError> {
        let form = message_form(message)?;
        debug!(session = %message.session, product_id = message.product_id, "POST /chat/messages");
        let response = self
            .send(self.client.post(self.url("/chat/messages")).multipart(form))
            .await?;
        let body: PostMessageResponse = decode(response).await?;
        Ok(body.message)
    }

    async fn post_offer(&self, offer: &NewOffer) -> Result<(), SyncError> {
        debug!(session = %offer.session, product_id = offer.product_id, "POST /offers");
        self.send(self.client.post(self.url("/offers")).json(offer))
            .await?;
        Ok(())
    }

    async fn approval_requests(&self, user_id: UserId) -> Result<Vec<ApprovalRequest>, SyncError> {
        self.get_json("/offers/requests", &[("user_id", user_id.to_string())])
            .await
    }

    async fn approve_request(&self, request_id: ApprovalRequestId) -> Result<(), SyncError> {
        self.post_empty(&format!("/offers/requests/{request_id}/approve"))
            .await
    }

    async fn decline_request(&self, request_id: ApprovalRequestId) -> Result<(), SyncError> {
        self.post_empty(&format!("/offers/requests/{request_id}/decline"))
            .await
    }
}
