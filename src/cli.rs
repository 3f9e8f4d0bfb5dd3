use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP service
    Serve {
        /// Port to listen on (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Process a single clip and print the result as JSON
    Process {
        /// Source URL of the clip
        #[arg(short, long)]
        url: String,

        /// Identifier for the uploaded clip
        #[arg(short, long)]
        id: String,

        /// Do not forward the result to the webhook
        #[arg(long)]
        no_dispatch: bool,
    },

    /// Process a batch of clips read from a JSON file ({"clips": [...]})
    Batch {
        /// Input JSON file
        #[arg(short, long)]
        input: PathBuf,
    },
}
