mod args;
mod daemon;

use {anyhow::Result, clap::Parser, tracing_subscriber::EnvFilter};

use crate::args::Args;

fn init_tracing(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if args.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    if let Err(e) = daemon::run(args).await {
        tracing::error!(error = ?e, "daemon failed");
        return Err(e);
    }
    Ok(())
}
