use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = understudy::cli::Cli::parse();
    if let Err(e) = understudy::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
