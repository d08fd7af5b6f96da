//! CLI command definitions for the `farmlink` binary.
//!
//! Uses clap derive macros. Conversation and offer commands act as the
//! local user given by `--user` (or `FARMLINK_USER`); the bearer token comes
//! from `FARMLINK_TOKEN`.

pub mod approvals;
pub mod chat;
pub mod image;
pub mod offer;

use anyhow::Context;
use clap::{Parser, Subcommand};
use clap_complete::Shell;

use farmlink_types::UserId;

/// Chat with buyers and sellers and negotiate offers on the Farmlink marketplace.
#[derive(Parser)]
#[command(name = "farmlink", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Also export tracing spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    /// Id of the signed-in user.
    #[arg(long, global = true, env = "FARMLINK_USER")]
    pub user: Option<UserId>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn user_id(&self) -> anyhow::Result<UserId> {
        self.user
            .context("no user given; pass --user <ID> or set FARMLINK_USER")
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read, send and follow conversation messages.
    Chat {
        #[command(subcommand)]
        action: chat::ChatCommand,
    },

    /// Make an offer on a product listing.
    Offer(offer::OfferArgs),

    /// Review offers on your listings (list, approve, decline).
    Approvals {
        #[command(subcommand)]
        action: approvals::ApprovalsCommand,
    },

    /// Download images into the local cache.
    Image {
        #[command(subcommand)]
        action: image::ImageCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_chat_send() {
        let cli = Cli::try_parse_from([
            "farmlink", "--user", "1", "chat", "send", "--product", "3", "--peer", "2", "--text", "hi",
        ])
        .unwrap();
        assert_eq!(cli.user_id().unwrap(), 1);
        assert!(matches!(
            cli.command,
            Commands::Chat {
                action: chat::ChatCommand::Send { product: 3, peer: 2, .. }
            }
        ));
    }

    #[test]
    fn test_parse_chat_send_as_seller() {
        let cli = Cli::try_parse_from([
            "farmlink", "chat", "send", "--product", "3", "--peer", "2", "--text", "hi", "--as-seller",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Chat {
                action: chat::ChatCommand::Send { as_seller: true, .. }
            }
        ));
    }

    #[test]
    fn test_parse_chat_forget() {
        let cli = Cli::try_parse_from(["farmlink", "chat", "forget", "--product", "3", "--peer", "2"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Chat {
                action: chat::ChatCommand::Forget { product: 3, peer: 2 }
            }
        ));
    }

    #[test]
    fn test_send_requires_exactly_one_payload() {
        let both = Cli::try_parse_from([
            "farmlink", "chat", "send", "--product", "3", "--peer", "2", "--text", "hi", "--image", "a.jpg",
        ]);
        assert!(both.is_err());

        let neither = Cli::try_parse_from(["farmlink", "chat", "send", "--product", "3", "--peer", "2"]);
        assert!(neither.is_err());
    }

    #[test]
    fn test_missing_user_is_an_error() {
        let cli = Cli::try_parse_from(["farmlink", "approvals", "list"]).unwrap();
        if std::env::var_os("FARMLINK_USER").is_none() {
            assert!(cli.user_id().is_err());
        }
    }
}
