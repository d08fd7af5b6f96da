//! Seller-side approval request types.

use serde::{Deserialize, Serialize};

use crate::offer::OfferStatus;
use crate::product::Quantity;
use crate::session::SessionId;
use crate::{ProductId, UserId};

/// Server-assigned identifier of an approval request.
pub type ApprovalRequestId = i64;

/// A pending offer as projected by the server for the seller, with a
/// snapshot of the product's stock taken when the list was fetched.
///
/// The snapshot is informational only; the server re-checks live stock when
/// the request is approved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: ApprovalRequestId,
    pub session: SessionId,
    pub product_id: ProductId,
    #[serde(default)]
    pub product_title: String,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub requested_quantity: u32,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub status: OfferStatus,
    /// Annotated stock string at fetch time, e.g. `"5 kg"`.
    pub current_stock: String,
}

impl ApprovalRequest {
    pub fn requested(&self) -> Quantity {
        Quantity::new(self.requested_quantity, self.unit.clone())
    }

    pub fn stock(&self) -> Quantity {
        Quantity::parse(&self.current_stock)
    }

    /// Whether the fetched snapshot still covers the request.
    pub fn snapshot_covers_request(&self) -> bool {
        self.stock().magnitude >= self.requested_quantity
    }
}
