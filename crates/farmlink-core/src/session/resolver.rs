//! Conversation session lookup and allocation.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use farmlink_types::error::SyncError;
use farmlink_types::session::{SessionAllocation, SessionId};
use farmlink_types::{ProductId, UserId};

use crate::api::MarketplaceApi;

/// Largest integer a JSON number carries without precision loss.
const MAX_SAFE_SESSION: u64 = (1 << 53) - 1;

/// Deterministic session id for a (product, buyer, seller) triple.
///
/// The first eight bytes of SHA-256 over the canonical triple, folded into
/// `1..=2^53-1`.
pub fn derive_session_id(product_id: ProductId, buyer_id: UserId, seller_id: UserId) -> SessionId {
    let digest = Sha256::digest(format!("farmlink-session:{product_id}:{buyer_id}:{seller_id}"));
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);

    let folded = u64::from_be_bytes(prefix) & MAX_SAFE_SESSION;
    // Zero is never a valid session on the server.
    SessionId(folded.max(1) as i64)
}

/// Resolves the session threading a buyer/seller conversation, allocating
/// one when the server has none yet.
pub struct SessionResolver<A: MarketplaceApi> {
    api: Arc<A>,
    allocation: SessionAllocation,
}

impl<A: MarketplaceApi> SessionResolver<A> {
    pub fn new(api: Arc<A>, allocation: SessionAllocation) -> Self {
        Self { api, allocation }
    }

    pub fn allocation(&self) -> SessionAllocation {
        self.allocation
    }

    /// Existing session for the triple, or a newly allocated id.
    ///
    /// An allocated id is only a proposal: it becomes the server's session
    /// once the first message carrying it is posted. Network failures are
    /// returned as-is; no local fallback id is made up.
    #[instrument(skip(self), fields(allocation = %self.allocation))]
    pub async fn resolve(
        &self,
        product_id: ProductId,
        buyer_id: UserId,
        seller_id: UserId,
    ) -> Result<SessionId, SyncError> {
        if let Some(session) = self.api.find_session(product_id, buyer_id, seller_id).await? {
            debug!(%session, "reusing existing session");
            return Ok(session);
        }

        let session = match self.allocation {
            SessionAllocation::Derived => derive_session_id(product_id, buyer_id, seller_id),
            SessionAllocation::GlobalMaxPlusOne => {
                let max = self.api.max_session().await?;
                warn!(
                    %max,
                    "allocating session as global max + 1; concurrent allocations may collide"
                );
                max.next()
            }
        };

        info!(%session, "allocated new session");
        Ok(session)
    }
}
