use anyhow::{anyhow, Result};
use dnsproxy::{Config, RuleStore, SharedConfig};
use is_terminal::IsTerminal;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    let mut first_args = std::env::args().take(2);
    let (program_name, config_file) = (
        first_args.next().unwrap_or("dnsproxy".to_string()),
        first_args.next(),
    );

    let config = config_init(&program_name, config_file).await?;
    let rules = RuleStore::new(config.rule_table()?);

    let dns_server = dnsproxy::dns::new(config.clone(), rules.clone()).await?;
    tracing::info!("DNS listening on UDP {}", dns_server.local_addr()?);
    let dns_handle = tokio::spawn(dns_server.block_until_done());

    let api_handle = if config.api.enabled {
        let api_server = dnsproxy::api::new(config.clone(), rules.clone())?;
        tracing::info!("API listening on {}", &config.api.bind_addr);
        Some(tokio::spawn(api_server))
    } else {
        None
    };

    if config.reload_config {
        if let Some(path) = config.path.clone() {
            tracing::info!("watching {} for changes", path.display());
            tokio::spawn(dnsproxy::reload::watch(
                path,
                rules.clone(),
                config.reload_interval,
            ));
        }
    }

    let api_done = async {
        match api_handle {
            Some(handle) => handle.await,
            None => std::future::pending().await,
        }
    };

    // TODO(XXX): proper graceful shutdown, draining queries still waiting on upstreams.
    tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::info!("quitting from signal");
        },
        _ = dns_handle => {
            return Err(anyhow!("DNS listener stopped"));
        }
        Ok(api_res) = api_done => {
            if let Err(err) = api_res {
                return Err(err.into())
            }
        }
    }
    tracing::info!("goodbye");
    Ok(())
}

fn tracing_init() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_ansi(std::io::stdout().is_terminal()))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dnsproxy=info".into()),
        )
        .init();
}

async fn config_init(program_name: &str, config_file: Option<String>) -> Result<SharedConfig> {
    match config_file {
        None => Err(anyhow!("usage: {program_name} /path/to/config.json")),
        Some(config_file) => {
            let config = Config::try_from_file(&config_file).await?;
            tracing::debug!("loaded config from {config_file}");
            Ok(Arc::new(config))
        }
    }
}
