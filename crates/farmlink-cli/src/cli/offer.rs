//! `farmlink offer`: submit an offer on a product listing as the buyer.

use anyhow::Result;
use clap::Args;
use console::style;

use farmlink_core::offer::OfferNegotiator;
use farmlink_types::message::ConversationKey;
use farmlink_types::product::Product;
use farmlink_types::{ProductId, UserId};

use crate::state::AppState;

#[derive(Args)]
pub struct OfferArgs {
    /// Product to make an offer on.
    #[arg(long)]
    pub product: ProductId,

    /// Seller who owns the listing.
    #[arg(long)]
    pub seller: UserId,

    /// Listing stock as shown on the product page, e.g. "50 kg".
    #[arg(long)]
    pub stock: String,

    /// Listing title, for display.
    #[arg(long, default_value = "")]
    pub title: String,

    /// Requested quantity, in the listing's unit.
    #[arg(long, allow_hyphen_values = true)]
    pub quantity: i64,

    /// Where the produce should be delivered or collected.
    #[arg(long)]
    pub location: String,
}

pub async fn run(state: &AppState, user_id: UserId, args: &OfferArgs, json: bool) -> Result<()> {
    let product = Product {
        id: args.product,
        title: args.title.clone(),
        quantity: args.stock.clone(),
        price: 0.0,
        image: None,
        owner_id: args.seller,
    };

    let mut negotiator = OfferNegotiator::new(product, user_id);
    negotiator.set_offer(args.quantity)?;
    negotiator.set_location(args.location.clone());
    let remaining = negotiator.remaining_quantity();
    let unit = negotiator.unit().to_string();

    let store = state.store(ConversationKey::new(args.product, user_id, args.seller));
    store.hydrate().await?;

    let receipt = negotiator
        .submit(&state.resolver(), &store, state.api.as_ref())
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&receipt)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Offer of {} {} sent for product #{}",
        style("✓").green().bold(),
        style(receipt.requested.magnitude).cyan().bold(),
        receipt.requested.unit,
        receipt.product_id
    );
    println!(
        "  {} Status: {} (the seller approves against live stock)",
        style("·").dim(),
        style(receipt.status).yellow()
    );
    println!(
        "  {} {} {unit} would remain at the listed stock",
        style("·").dim(),
        remaining
    );
    println!();
    Ok(())
}
