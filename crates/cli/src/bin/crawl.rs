use clap::Parser;
use distill_cli::{run, Cli, Source};

/// Crawls websites from the seed file and summarizes every page found.
#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli, Source::Crawl).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
