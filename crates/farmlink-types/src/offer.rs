//! Purchase offer types.
//!
//! An offer is created by two dependent writes: a marker chat message in the
//! conversation, then the offer record carrying the same session id.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::product::Quantity;
use crate::session::SessionId;
use crate::{ProductId, UserId};

/// Chat text posted into the conversation when an offer is submitted.
pub const OFFER_MARKER_TEXT: &str = "Offer sent";

/// Lifecycle status of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    #[default]
    Pending,
    Approved,
    Declined,
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfferStatus::Pending => write!(f, "pending"),
            OfferStatus::Approved => write!(f, "approved"),
            OfferStatus::Declined => write!(f, "declined"),
        }
    }
}

impl FromStr for OfferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(OfferStatus::Pending),
            "approved" => Ok(OfferStatus::Approved),
            "declined" => Ok(OfferStatus::Declined),
            other => Err(format!("invalid offer status: '{other}'")),
        }
    }
}

/// Body of the offer POST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOffer {
    pub session: SessionId,
    pub location: String,
    /// Requested magnitude, in the listing's unit.
    pub offer: u32,
    pub unit: String,
    pub product_id: ProductId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
}

impl NewOffer {
    pub fn requested(&self) -> Quantity {
        Quantity::new(self.offer, self.unit.clone())
    }
}

/// What the buyer gets back after a successful submission.
///
/// The status is always `Pending`: approval is decided later by the seller
/// against live stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferReceipt {
    pub session: SessionId,
    pub product_id: ProductId,
    pub requested: Quantity,
    pub status: OfferStatus,
}
