use clap::Parser;
use hydroprep::cli::{run, Cli};
use hydroprep::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli).await
}
