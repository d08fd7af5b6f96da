//! MarketplaceApi trait definition.
//!
//! One method per logical REST contract consumed by the engine. Uses native
//! async fn in traits (RPITIT, Rust 2024 edition) with `Send` futures so
//! callers can drive them from spawned tasks.

use farmlink_types::approval::{ApprovalRequest, ApprovalRequestId};
use farmlink_types::error::SyncError;
use farmlink_types::message::{OutgoingMessage, WireMessage};
use farmlink_types::offer::NewOffer;
use farmlink_types::session::SessionId;
use farmlink_types::{ProductId, UserId};

/// Client-side view of the marketplace backend.
///
/// Implementations must map failures onto the [`SyncError`] taxonomy:
/// transport problems and timeouts to `NetworkUnavailable`, 4xx to
/// `ServerRejected` (401/403 to `AuthExpired`), 5xx to `ServerFault`, and
/// unparseable bodies to `DecodeFailed`. Implementations never retry.
pub trait MarketplaceApi: Send + Sync {
    /// Look up the existing session for a (product, sender, receiver) triple.
    fn find_session(
        &self,
        product_id: ProductId,
        sender_id: UserId,
        receiver_id: UserId,
    ) -> impl std::future::Future<Output = Result<Option<SessionId>, SyncError>> + Send;

    /// Current maximum session id across all users.
    fn max_session(&self) -> impl std::future::Future<Output = Result<SessionId, SyncError>> + Send;

    /// Full message history for a conversation.
    fn fetch_messages(
        &self,
        product_id: ProductId,
        sender_id: UserId,
        receiver_id: UserId,
    ) -> impl std::future::Future<Output = Result<Vec<WireMessage>, SyncError>> + Send;

    /// Post a text or image message; returns the server's stored copy.
    fn post_message(
        &self,
        message: &OutgoingMessage,
    ) -> impl std::future::Future<Output = Result<WireMessage, SyncError>> + Send;

    /// Create an offer record.
    fn post_offer(
        &self,
        offer: &NewOffer,
    ) -> impl std::future::Future<Output = Result<(), SyncError>> + Send;

    /// Pending approval requests addressed to `user_id` (as seller).
    fn approval_requests(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<Vec<ApprovalRequest>, SyncError>> + Send;

    /// Approve a request. The server re-validates against live stock.
    fn approve_request(
        &self,
        request_id: ApprovalRequestId,
    ) -> impl std::future::Future<Output = Result<(), SyncError>> + Send;

    /// Decline a request.
    fn decline_request(
        &self,
        request_id: ApprovalRequestId,
    ) -> impl std::future::Future<Output = Result<(), SyncError>> + Send;
}
