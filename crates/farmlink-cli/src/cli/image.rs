//! `farmlink image get`: resolve an image reference to a cached local file.

use anyhow::Result;
use clap::Subcommand;
use console::style;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum ImageCommand {
    /// Download an image (once) and print its local path.
    Get {
        /// Image reference as stored by the server: a file name, a path on
        /// the image host, or an absolute URL.
        uri: String,
    },
}

pub async fn run(state: &AppState, action: &ImageCommand, json: bool) -> Result<()> {
    match action {
        ImageCommand::Get { uri } => {
            let path = state.images.get(uri).await?;
            if json {
                let body = serde_json::json!({ "uri": uri, "path": path });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                println!("{}", style(path.display()).cyan());
            }
            Ok(())
        }
    }
}
