use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "onceurl", about = "Single-use signed URL gateway", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the gateway (issuance API + redemption gate). Default.
    Serve {
        /// Listen port; overrides ONCEURL_PORT.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Mint a single-use signed URL from the command line.
    Issue {
        /// Protected resource path, e.g. videos/demo.mp4
        #[arg(long)]
        resource: String,
        /// Lifetime in seconds.
        #[arg(long, default_value_t = 300)]
        lifetime: i64,
    },
    /// Delete expired, unconsumed tokens once and exit.
    Reap,
}
