use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::Cli;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let code = match commands::dispatch(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("fatal: {e:?}");
            1
        }
    };
    std::process::exit(code);
}
