pub mod negotiator;

pub use negotiator::OfferNegotiator;
