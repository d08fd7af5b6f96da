//! Seller-side approval of pending offers.
//!
//! Quantity checks made when the buyer submitted an offer are advisory. The
//! server re-validates each approval against live stock, and that answer is
//! the only one that counts.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use farmlink_types::UserId;
use farmlink_types::approval::{ApprovalRequest, ApprovalRequestId};
use farmlink_types::error::SyncError;

use crate::api::MarketplaceApi;

pub struct ApprovalWorkflow<A: MarketplaceApi> {
    api: Arc<A>,
    user_id: UserId,
    pending: Mutex<Vec<ApprovalRequest>>,
}

impl<A: MarketplaceApi> ApprovalWorkflow<A> {
    pub fn new(api: Arc<A>, user_id: UserId) -> Self {
        Self {
            api,
            user_id,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Replace the local pending list with the server's.
    #[instrument(skip(self), fields(user_id = self.user_id))]
    pub async fn refresh(&self) -> Result<Vec<ApprovalRequest>, SyncError> {
        let requests = self.api.approval_requests(self.user_id).await?;
        info!(count = requests.len(), "loaded approval requests");
        let mut pending = self.pending.lock().await;
        *pending = requests;
        Ok(pending.clone())
    }

    pub async fn pending(&self) -> Vec<ApprovalRequest> {
        self.pending.lock().await.clone()
    }

    /// Approve a request.
    ///
    /// The request leaves the pending list before the server answers and is
    /// not restored on failure. A rejection (typically insufficient stock)
    /// comes back as `ValidationFailed` carrying the server's message.
    #[instrument(skip(self), fields(user_id = self.user_id))]
    pub async fn approve(&self, request_id: ApprovalRequestId) -> Result<(), SyncError> {
        if let Some(request) = self.take(request_id).await {
            if !request.snapshot_covers_request() {
                warn!(
                    requested = %request.requested(),
                    stock = %request.stock(),
                    "stock snapshot does not cover request, asking server anyway"
                );
            }
        }

        match self.api.approve_request(request_id).await {
            Ok(()) => {
                info!("approval request accepted");
                Ok(())
            }
            Err(SyncError::ServerRejected { status, message }) => {
                warn!(status, %message, "approval rejected by server");
                Err(SyncError::ValidationFailed(message))
            }
            Err(err) => Err(err),
        }
    }

    /// Decline a request. Removal is optimistic; a server failure is logged
    /// and returned but the request stays removed.
    #[instrument(skip(self), fields(user_id = self.user_id))]
    pub async fn decline(&self, request_id: ApprovalRequestId) -> Result<(), SyncError> {
        self.take(request_id).await;

        self.api.decline_request(request_id).await.map_err(|err| {
            warn!(error = %err, "decline failed on server");
            err
        })?;
        info!("approval request declined");
        Ok(())
    }

    async fn take(&self, request_id: ApprovalRequestId) -> Option<ApprovalRequest> {
        let mut pending = self.pending.lock().await;
        let index = pending.iter().position(|r| r.id == request_id)?;
        Some(pending.remove(index))
    }
}
