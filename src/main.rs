//! clickctl: inspect a click manager configuration.
//!
//! Validates configuration files, shows which pages a policy activates on and
//! how requests would be routed.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use click_manager::{BrowserContext, ClickManager, ClickManagerConfig};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

/// Command-line arguments for clickctl
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the JSON configuration
    #[arg(short, long, default_value = "click-manager.json")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the configuration and print it with defaults filled in
    Check,

    /// Show whether enforcement activates on a page
    Gate {
        #[arg(required = true)]
        url: String,
    },

    /// Show how a request from a page would be routed
    Route {
        #[arg(required = true)]
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    fmt().with_env_filter(filter).init();

    let config = ClickManagerConfig::load(&args.config)?;
    debug!(path = %args.config.display(), "configuration loaded");
    let manager = ClickManager::new(&config)
        .with_context(|| format!("invalid configuration in {}", args.config.display()))?;

    match args.command {
        Commands::Check => {
            let mut normalized = config.clone();
            normalized.policy = manager.policy().to_config();
            println!("{}", serde_json::to_string_pretty(&normalized)?);
        }
        Commands::Gate { url } => {
            let url = Url::parse(&url).with_context(|| format!("invalid url {url:?}"))?;
            let decision = manager.policy().activation().evaluate(&url);
            info!(url = %url, active = decision.is_active(), "activation decided");
            println!(
                "{url}: {} ({decision:?})",
                if decision.is_active() { "active" } else { "skipped" }
            );
        }
        Commands::Route { url } => {
            let url = Url::parse(&url).with_context(|| format!("invalid url {url:?}"))?;
            let context = BrowserContext::new("clickctl");
            manager.install(&context).await?;
            let decision = context.request(&url).await;
            debug!(url = %url, ?decision, "request routed");
            println!("{}", serde_json::to_string(&decision)?);
        }
    }
    Ok(())
}
