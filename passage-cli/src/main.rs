//! Passage CLI - runs the rewriting proxy and mints URL tokens.
//!
//! ```bash
//! passage serve --config passage.toml
//! passage encode https://example.com/ --scheme aes
//! passage decode aHR0cHM6Ly9leGFtcGxlLmNvbS8
//! ```

mod commands;

use clap::{Parser, Subcommand};
use passage_core::EncodingScheme;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "passage", about = "Rewriting forward proxy", version)]
struct Cli {
    /// Configuration file (missing file means defaults plus PX_* variables)
    #[arg(long, short, global = true, default_value = "passage.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the proxy server
    Serve {
        /// Override server.host
        #[arg(long)]
        host: Option<String>,

        /// Override server.port
        #[arg(long, short)]
        port: Option<u16>,
    },
    /// Encode a URL into a /proxy/{token} token
    Encode {
        url: String,

        /// base64, xor or aes (defaults to urlEncoding.scheme)
        #[arg(long, short)]
        scheme: Option<EncodingScheme>,
    },
    /// Decode a token back into its URL
    Decode { token: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { host, port } => commands::serve::run(&cli.config, host, port).await,
        Commands::Encode { url, scheme } => {
            commands::token::encode(&cli.config, &url, scheme).map(|token| println!("{}", token))
        }
        Commands::Decode { token } => {
            commands::token::decode(&cli.config, &token).map(|url| println!("{}", url))
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
