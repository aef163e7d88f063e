//! webpipe Language Server.
//!
//! Usage:
//!   wp-lsp              # Start LSP server (stdio)
//!   wp-lsp --version    # Print version
//!   wp-lsp --help       # Print help

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Parse simple args (no clap needed for LSP server)
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("wp-lsp {}", webpipe_lsp::VERSION);
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("webpipe Language Server");
        println!();
        println!("Usage: wp-lsp [OPTIONS]");
        println!();
        println!("Options:");
        println!("  -h, --help     Print help");
        println!("  -V, --version  Print version");
        println!();
        println!("The server communicates via stdio using the Language Server Protocol.");
        println!();
        println!("Environment variables:");
        println!("  RUST_LOG       Set log level (e.g., RUST_LOG=webpipe_lsp=debug)");
        return ExitCode::SUCCESS;
    }

    // Logs go to stderr; stdout carries the protocol
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("webpipe_lsp=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match webpipe_lsp::start_stdio() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}
