use anyhow::Result;
use clap::{Parser, Subcommand};
use portval::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Value the configured portfolio and display a summary
    Summary,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(Commands::Summary) | None => portval::run(cli.config_path.as_deref()).await,
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

fn setup() -> Result<()> {
    use anyhow::Context;

    let path = portval::config::AppConfig::default_config_path()?;

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let default_config = r#"---
portfolio:
  name: "Minha Carteira"
  holdings:
    - symbol: "PETR4.SA"
      quantity: 100
      average_cost: 28.50
      category: stock

market_data:
  base_url: "https://query1.finance.yahoo.com/v8/finance/chart"
  timeout_ms: 5000

cache:
  quote_ttl_secs: 60

valuation:
  concurrency: 4
  timeout_ms: 15000

fallback_prices:
  PETR4:
    price: 31.95
    change_percent: -1.33
  VALE3:
    price: 53.00
    change_percent: 0.87
  ITUB4:
    price: 35.31
    change_percent: 2.15
"#;

    std::fs::write(&path, default_config)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}
