use clap::Parser;
use tracing_subscriber::EnvFilter;

use felon_entrepreneur::config::Config;
use felon_entrepreneur::daemon;
use felon_entrepreneur::error::Result;

#[derive(Parser, Debug)]
#[command(name = "felon-entrepreneurd")]
#[command(about = "Felon Entrepreneur local daemon")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 8787)]
    port: u16,

    #[arg(long, default_value = "./data/felon-entrepreneur.db")]
    db: String,

    #[arg(long, env = "FE_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,felon_entrepreneur=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    daemon::run(&cli.host, cli.port, &cli.db, config).await
}
