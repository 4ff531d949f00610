//! Config file reloading.
//!
//! The config file's modification time is polled; when it changes the file is re-read and, if
//! valid, its rules replace the running ones. A config that fails to load is logged and the
//! running rules are kept. Only rules are reloaded: bind addresses, timeouts other than
//! `fallback_timeout` and API settings take effect on restart.
use crate::config::Config;
use crate::error::Error;
use crate::rules::RuleStore;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

/// Watch the config file at `path` every `every`, reloading rules into `rules` when it changes.
/// Runs forever.
pub async fn watch(path: PathBuf, rules: RuleStore, every: Duration) {
    let mut last_modified = modified(&path).await;
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let current = modified(&path).await;
        if current == last_modified {
            continue;
        }
        last_modified = current;
        info!("config file changed, reloading rules");
        if let Err(err) = reload(&path, &rules).await {
            error!("error reloading configuration from {}: {err}", path.display());
        }
    }
}

/// Load the config at `path` and publish its rules.
///
/// # Errors
///
/// Returns any error [`Config::try_from_file`] returns. `rules` is unchanged on error.
pub async fn reload(path: &Path, rules: &RuleStore) -> Result<(), Error> {
    let config = Config::try_from_file(path).await?;
    rules.replace(config.rule_table()?);
    Ok(())
}

async fn modified(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path)
        .await
        .and_then(|meta| meta.modified())
        .ok()
}
