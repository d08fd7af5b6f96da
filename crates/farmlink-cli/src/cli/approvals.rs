//! Seller-side approval CLI commands: list, approve, decline.

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use farmlink_core::approval::ApprovalWorkflow;
use farmlink_types::UserId;
use farmlink_types::approval::ApprovalRequestId;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum ApprovalsCommand {
    /// List pending offers on your listings.
    #[command(alias = "ls")]
    List,

    /// Approve an offer. The server checks it against live stock.
    Approve {
        /// Approval request id.
        id: ApprovalRequestId,
    },

    /// Decline an offer.
    Decline {
        /// Approval request id.
        id: ApprovalRequestId,
    },
}

pub async fn run(
    state: &AppState,
    user_id: UserId,
    action: &ApprovalsCommand,
    json: bool,
) -> Result<()> {
    let workflow = ApprovalWorkflow::new(state.api.clone(), user_id);

    match action {
        ApprovalsCommand::List => list(&workflow, json).await,
        ApprovalsCommand::Approve { id } => {
            workflow.approve(*id).await?;
            done(json, *id, "approved", "Approved")
        }
        ApprovalsCommand::Decline { id } => {
            workflow.decline(*id).await?;
            done(json, *id, "declined", "Declined")
        }
    }
}

async fn list<A: farmlink_core::api::MarketplaceApi>(
    workflow: &ApprovalWorkflow<A>,
    json: bool,
) -> Result<()> {
    let requests = workflow.refresh().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&requests)?);
        return Ok(());
    }

    if requests.is_empty() {
        println!();
        println!("  {} No pending offers.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Product").fg(Color::White),
        Cell::new("Buyer").fg(Color::White),
        Cell::new("Requested").fg(Color::White),
        Cell::new("Stock").fg(Color::White),
        Cell::new("Location").fg(Color::White),
    ]);

    for request in &requests {
        let product = if request.product_title.is_empty() {
            format!("#{}", request.product_id)
        } else {
            format!("{} (#{})", request.product_title, request.product_id)
        };
        // Snapshot only; approval re-checks live stock.
        let stock = if request.snapshot_covers_request() {
            Cell::new(&request.current_stock).fg(Color::Green)
        } else {
            Cell::new(&request.current_stock).fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(request.id).fg(Color::Cyan),
            Cell::new(product),
            Cell::new(request.buyer_id),
            Cell::new(format!("{} {}", request.requested_quantity, request.unit)),
            stock,
            Cell::new(&request.location).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} pending offer{}",
        style(requests.len()).bold(),
        if requests.len() == 1 { "" } else { "s" }
    );
    println!();
    Ok(())
}

fn done(json: bool, id: ApprovalRequestId, status: &str, verb: &str) -> Result<()> {
    if json {
        let body = serde_json::json!({ "id": id, "status": status });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!();
        println!("  {} {verb} offer {}", style("✓").green().bold(), style(id).cyan());
        println!();
    }
    Ok(())
}
