use clap::Parser;

use redcore::Server;

#[derive(Parser)]
#[command(name = "redcore")]
#[command(about = "In-memory, multi-model Redis-protocol key-value server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    addr: String,

    /// Require password for connections (like Redis requirepass)
    #[arg(long)]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    if args.password.is_some() {
        tracing::info!("authentication enabled");
    }

    let server = Server::new(args.password);
    server.run(&args.addr).await?;

    Ok(())
}
