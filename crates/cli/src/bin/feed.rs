use clap::Parser;
use distill_cli::{run, Cli, Source};

/// Reads RSS feeds from the seed file and summarizes every entry.
#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli, Source::Feed).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
