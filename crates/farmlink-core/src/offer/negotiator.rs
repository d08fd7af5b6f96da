//! Buyer-side purchase offer workflow.
//!
//! An offer is two dependent writes: a `"Offer sent"` marker message in the
//! product conversation, then the offer record carrying the same session.
//! Quantity bounds are checked here only as a courtesy; the seller's
//! approval step re-validates against live stock.

use tracing::{info, instrument, warn};

use farmlink_types::UserId;
use farmlink_types::error::SyncError;
use farmlink_types::message::MessageDraft;
use farmlink_types::offer::{NewOffer, OFFER_MARKER_TEXT, OfferReceipt, OfferStatus};
use farmlink_types::product::{Product, Quantity};

use crate::api::MarketplaceApi;
use crate::chat::MessageStore;
use crate::session::SessionResolver;
use crate::storage::ConversationCache;

/// Draft offer for one product, owned by the offer form.
#[derive(Debug, Clone)]
pub struct OfferNegotiator {
    product: Product,
    available: Quantity,
    buyer_id: UserId,
    offer: u32,
    location: String,
    warning: Option<String>,
}

impl OfferNegotiator {
    pub fn new(product: Product, buyer_id: UserId) -> Self {
        let available = product.parsed_quantity();
        Self {
            product,
            available,
            buyer_id,
            offer: 0,
            location: String::new(),
            warning: None,
        }
    }

    pub fn product(&self) -> &Product {
        &self.product
    }

    pub fn offer(&self) -> u32 {
        self.offer
    }

    pub fn unit(&self) -> &str {
        &self.available.unit
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Stock left on the listing if this offer were accepted. Never negative.
    pub fn remaining_quantity(&self) -> u32 {
        self.available.magnitude.saturating_sub(self.offer)
    }

    /// Inline warning from the last rejected `set_offer`, if any.
    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    pub fn set_location(&mut self, location: impl Into<String>) {
        self.location = location.into();
    }

    /// Set the offered amount.
    ///
    /// Values outside `[0, available]` are rejected and not committed; the
    /// previous offer stays and the warning is kept for display.
    pub fn set_offer(&mut self, value: i64) -> Result<(), SyncError> {
        let max = self.available.magnitude;
        match u32::try_from(value) {
            Ok(offer) if offer <= max => {
                self.offer = offer;
                self.warning = None;
                Ok(())
            }
            _ => {
                let message = format!(
                    "Offer must be between 0 and {}",
                    Quantity::new(max, self.available.unit.clone())
                );
                self.warning = Some(message.clone());
                Err(SyncError::ValidationFailed(message))
            }
        }
    }

    /// Post the marker message and then the offer record.
    ///
    /// `store` must be the buyer's conversation with the seller about this
    /// product. On success the draft resets and a `pending` receipt is
    /// returned; whether the offer is accepted is decided later by the
    /// seller.
    #[instrument(skip_all, fields(product_id = self.product.id, offer = self.offer))]
    pub async fn submit<A, C>(
        &mut self,
        resolver: &SessionResolver<A>,
        store: &MessageStore<A, C>,
        api: &A,
    ) -> Result<OfferReceipt, SyncError>
    where
        A: MarketplaceApi,
        C: ConversationCache,
    {
        let seller_id = self.product.owner_id;
        let key = store.key();
        if key.product_id != self.product.id || key.self_id != self.buyer_id || key.peer_id != seller_id {
            return Err(SyncError::ValidationFailed(format!(
                "conversation {key} does not match product {} between buyer {} and seller {seller_id}",
                self.product.id, self.buyer_id
            )));
        }
        if self.buyer_id == seller_id {
            return Err(SyncError::ValidationFailed(
                "You cannot make an offer on your own product".to_string(),
            ));
        }
        if self.offer == 0 {
            return Err(SyncError::ValidationFailed(
                "Offer must be greater than 0".to_string(),
            ));
        }
        let location = self.location.trim();
        if location.is_empty() {
            return Err(SyncError::ValidationFailed("Location is required".to_string()));
        }

        let session = resolver
            .resolve(self.product.id, self.buyer_id, seller_id)
            .await?;

        store
            .send(MessageDraft::Text(OFFER_MARKER_TEXT.to_string()), session)
            .await?;

        let offer = NewOffer {
            session,
            location: location.to_string(),
            offer: self.offer,
            unit: self.available.unit.clone(),
            product_id: self.product.id,
            buyer_id: self.buyer_id,
            seller_id,
        };
        if let Err(err) = api.post_offer(&offer).await {
            warn!(%session, error = %err, "offer record rejected after marker message was sent");
            return Err(err);
        }

        info!(%session, "offer submitted");
        let receipt = OfferReceipt {
            session,
            product_id: self.product.id,
            requested: offer.requested(),
            status: OfferStatus::Pending,
        };

        self.offer = 0;
        self.warning = None;
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use farmlink_types::error::Presentation;
    use farmlink_types::message::{ConversationKey, MessageContent};
    use farmlink_types::session::{SessionAllocation, SessionId};

    use crate::testing::{FakeMarketplace, MemoryConversationCache, wire_message};

    const BUYER: i64 = 1;
    const SELLER: i64 = 2;

    fn product(quantity: &str) -> Product {
        Product {
            id: 3,
            title: "Maize".to_string(),
            quantity: quantity.to_string(),
            price: 35.0,
            image: None,
            owner_id: SELLER,
        }
    }

    struct Harness {
        api: Arc<FakeMarketplace>,
        resolver: SessionResolver<FakeMarketplace>,
        store: MessageStore<FakeMarketplace, MemoryConversationCache>,
    }

    fn harness(api: FakeMarketplace) -> Harness {
        let api = Arc::new(api);
        Harness {
            resolver: SessionResolver::new(api.clone(), SessionAllocation::Derived),
            store: MessageStore::new(
                ConversationKey::new(3, BUYER, SELLER),
                api.clone(),
                Arc::new(MemoryConversationCache::new()),
            ),
            api,
        }
    }

    #[test]
    fn offer_of_twenty_from_fifty_kg_leaves_thirty() {
        let mut negotiator = OfferNegotiator::new(product("50 kg"), BUYER);

        negotiator.set_offer(20).unwrap();

        assert_eq!(negotiator.offer(), 20);
        assert_eq!(negotiator.remaining_quantity(), 30);
        assert_eq!(negotiator.unit(), "kg");
    }

    #[test]
    fn out_of_range_offer_is_rejected_not_clamped() {
        let mut negotiator = OfferNegotiator::new(product("50 kg"), BUYER);
        negotiator.set_offer(10).unwrap();

        let too_much = negotiator.set_offer(51).unwrap_err();
        assert_eq!(too_much.presentation(), Presentation::Inline);
        assert_eq!(negotiator.offer(), 10);
        assert_eq!(negotiator.warning(), Some("Offer must be between 0 and 50 kg"));

        assert!(negotiator.set_offer(-1).is_err());
        assert_eq!(negotiator.offer(), 10);

        negotiator.set_offer(50).unwrap();
        assert_eq!(negotiator.remaining_quantity(), 0);
        assert!(negotiator.warning().is_none());

        negotiator.set_offer(0).unwrap();
        assert_eq!(negotiator.remaining_quantity(), 50);
    }

    #[test]
    fn unparseable_stock_allows_only_zero() {
        let mut negotiator = OfferNegotiator::new(product("plenty"), BUYER);
        assert_eq!(negotiator.unit(), "plenty");
        assert!(negotiator.set_offer(1).is_err());
        assert_eq!(negotiator.remaining_quantity(), 0);
    }

    #[tokio::test]
    async fn submit_threads_session_into_marker_and_offer() {
        let mut seeded = wire_message(1, SELLER, BUYER, 3, "welcome", 0);
        seeded.session = SessionId(41);
        let api = FakeMarketplace::new();
        api.seed_message(seeded);
        let h = harness(api);

        let mut negotiator = OfferNegotiator::new(product("50 kg"), BUYER);
        negotiator.set_offer(20).unwrap();
        negotiator.set_location("Nakuru");

        let receipt = negotiator
            .submit(&h.resolver, &h.store, h.api.as_ref())
            .await
            .unwrap();

        assert_eq!(receipt.session, SessionId(41));
        assert_eq!(receipt.status, OfferStatus::Pending);
        assert_eq!(receipt.requested, Quantity::new(20, "kg"));

        let offers = h.api.state.lock().unwrap().offers.clone();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].session, SessionId(41));
        assert_eq!(offers[0].location, "Nakuru");
        assert_eq!(offers[0].seller_id, SELLER);

        let marker = h.store.messages().await.pop().unwrap();
        assert_eq!(marker.content, MessageContent::text(OFFER_MARKER_TEXT));
        assert_eq!(marker.session, SessionId(41));

        // The draft resets.
        assert_eq!(negotiator.offer(), 0);
        assert_eq!(negotiator.remaining_quantity(), 50);
    }

    #[tokio::test]
    async fn submit_rejects_zero_offer_and_missing_location() {
        let h = harness(FakeMarketplace::new());
        let mut negotiator = OfferNegotiator::new(product("50 kg"), BUYER);
        negotiator.set_location("Nakuru");

        let zero = negotiator
            .submit(&h.resolver, &h.store, h.api.as_ref())
            .await
            .unwrap_err();
        assert!(matches!(zero, SyncError::ValidationFailed(_)));

        negotiator.set_offer(5).unwrap();
        negotiator.set_location("   ");
        let no_location = negotiator
            .submit(&h.resolver, &h.store, h.api.as_ref())
            .await
            .unwrap_err();
        assert!(matches!(no_location, SyncError::ValidationFailed(_)));

        assert_eq!(h.api.calls("find_session"), 0);
        assert_eq!(h.api.calls("post_message"), 0);
    }

    #[tokio::test]
    async fn submit_rejects_mismatched_conversation() {
        let api = Arc::new(FakeMarketplace::new());
        let resolver = SessionResolver::new(api.clone(), SessionAllocation::Derived);
        let store = MessageStore::new(
            ConversationKey::new(99, BUYER, SELLER),
            api.clone(),
            Arc::new(MemoryConversationCache::new()),
        );
        let mut negotiator = OfferNegotiator::new(product("50 kg"), BUYER);
        negotiator.set_offer(5).unwrap();
        negotiator.set_location("Nakuru");

        let err = negotiator
            .submit(&resolver, &store, api.as_ref())
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::ValidationFailed(_)));
        assert_eq!(api.calls("post_message"), 0);
    }

    #[tokio::test]
    async fn failures_keep_distinct_categories_and_the_draft() {
        let h = harness(FakeMarketplace::new());
        let mut negotiator = OfferNegotiator::new(product("50 kg"), BUYER);
        negotiator.set_offer(20).unwrap();
        negotiator.set_location("Nakuru");

        h.api
            .fail_next(SyncError::NetworkUnavailable("offline".to_string()));
        let network = negotiator
            .submit(&h.resolver, &h.store, h.api.as_ref())
            .await
            .unwrap_err();

        h.api.state.lock().unwrap().fail_offer = Some(SyncError::ServerRejected {
            status: 400,
            message: "Offer exceeds available stock".to_string(),
        });
        let rejected = negotiator
            .submit(&h.resolver, &h.store, h.api.as_ref())
            .await
            .unwrap_err();

        h.api.state.lock().unwrap().fail_offer = Some(SyncError::ServerFault {
            status: 502,
            message: "bad gateway".to_string(),
        });
        let fault = negotiator
            .submit(&h.resolver, &h.store, h.api.as_ref())
            .await
            .unwrap_err();

        assert!(network.is_network());
        assert_eq!(rejected.user_message(), "Offer exceeds available stock");
        assert!(matches!(fault, SyncError::ServerFault { .. }));
        assert_ne!(network.user_message(), rejected.user_message());
        assert_ne!(network.user_message(), fault.user_message());
        assert_ne!(rejected.user_message(), fault.user_message());

        // Nothing was accepted, so the draft survives for a retry.
        assert_eq!(negotiator.offer(), 20);
        assert!(h.api.state.lock().unwrap().offers.is_empty());
    }

    #[tokio::test]
    async fn new_conversation_gets_derived_session() {
        let h = harness(FakeMarketplace::new());
        let mut negotiator = OfferNegotiator::new(product("50 kg"), BUYER);
        negotiator.set_offer(1).unwrap();
        negotiator.set_location("Nakuru");

        let receipt = negotiator
            .submit(&h.resolver, &h.store, h.api.as_ref())
            .await
            .unwrap();

        assert_eq!(receipt.session, crate::session::derive_session_id(3, BUYER, SELLER));
        // The marker message made the session known to the server.
        assert_eq!(h.resolver.resolve(3, BUYER, SELLER).await.unwrap(), receipt.session);
    }
}
